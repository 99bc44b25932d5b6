//! Record shapes flowing through the pipeline.
//!
//! `Raw*` types are what a site profile pulls off a page: every field is optional
//! and numbers may still be strings. The canonical types are what the cleaner emits
//! and what the store persists; a numeric field is present only if it validated.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scalar as found on the page: already numeric, or text still to be coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        RawValue::Number(f64::from(v))
    }
}

impl From<u32> for RawValue {
    fn from(v: u32) -> Self {
        RawValue::Number(f64::from(v))
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

// ── Raw (pre-cleaning) ──

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEngine {
    pub kind: Option<String>,
    pub displacement: Option<RawValue>,
    pub bore: Option<RawValue>,
    pub stroke: Option<RawValue>,
    pub compression_ratio: Option<String>,
    pub cooling: Option<String>,
    pub fuel_system: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPerformance {
    pub power_hp: Option<RawValue>,
    pub power_kw: Option<RawValue>,
    pub torque_nm: Option<RawValue>,
    pub torque_lbft: Option<RawValue>,
    pub top_speed_mph: Option<RawValue>,
    pub top_speed_kmh: Option<RawValue>,
    pub acceleration_0_60: Option<RawValue>,
    pub quarter_mile: Option<RawValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDimensions {
    pub length: Option<RawValue>,
    pub width: Option<RawValue>,
    pub height: Option<RawValue>,
    pub wheelbase: Option<RawValue>,
    pub ground_clearance: Option<RawValue>,
    pub seat_height: Option<RawValue>,
    pub dry_weight: Option<RawValue>,
    pub wet_weight: Option<RawValue>,
    pub fuel_capacity: Option<RawValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPrice {
    pub msrp: Option<RawValue>,
    pub currency: Option<String>,
    pub year: Option<RawValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRating {
    pub overall: Option<RawValue>,
    pub performance: Option<RawValue>,
    pub comfort: Option<RawValue>,
    pub build_quality: Option<RawValue>,
    pub value: Option<RawValue>,
    pub scale: Option<RawValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawVehicle {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<RawValue>,
    pub category: Option<String>,
    pub engine: Option<RawEngine>,
    pub performance: Option<RawPerformance>,
    pub dimensions: Option<RawDimensions>,
    pub price: Option<RawPrice>,
    pub rating: Option<RawRating>,
    pub source_url: String,
    pub scraped_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub images: Vec<String>,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub colors: Vec<String>,
}

// ── Canonical ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSpecs {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub displacement: Option<f64>,
    pub bore: Option<f64>,
    pub stroke: Option<f64>,
    pub compression_ratio: Option<String>,
    pub cooling: Option<String>,
    pub fuel_system: Option<String>,
}

impl EngineSpecs {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.displacement.is_none()
            && self.bore.is_none()
            && self.stroke.is_none()
            && self.compression_ratio.is_none()
            && self.cooling.is_none()
            && self.fuel_system.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Performance {
    pub power_hp: Option<f64>,
    pub power_kw: Option<f64>,
    pub torque_nm: Option<f64>,
    pub torque_lbft: Option<f64>,
    pub top_speed_mph: Option<f64>,
    pub top_speed_kmh: Option<f64>,
    pub acceleration_0_60: Option<f64>,
    pub quarter_mile: Option<f64>,
}

impl Performance {
    pub fn is_empty(&self) -> bool {
        [
            self.power_hp,
            self.power_kw,
            self.torque_nm,
            self.torque_lbft,
            self.top_speed_mph,
            self.top_speed_kmh,
            self.acceleration_0_60,
            self.quarter_mile,
        ]
        .iter()
        .all(Option::is_none)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dimensions {
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub wheelbase: Option<f64>,
    pub ground_clearance: Option<f64>,
    pub seat_height: Option<f64>,
    pub dry_weight: Option<f64>,
    pub wet_weight: Option<f64>,
    pub fuel_capacity: Option<f64>,
}

impl Dimensions {
    pub fn is_empty(&self) -> bool {
        [
            self.length,
            self.width,
            self.height,
            self.wheelbase,
            self.ground_clearance,
            self.seat_height,
            self.dry_weight,
            self.wet_weight,
            self.fuel_capacity,
        ]
        .iter()
        .all(Option::is_none)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceInfo {
    pub msrp: Option<f64>,
    pub currency: Option<String>,
    pub year: Option<i32>,
}

impl PriceInfo {
    pub fn is_empty(&self) -> bool {
        self.msrp.is_none() && self.currency.is_none() && self.year.is_none()
    }
}

pub const DEFAULT_RATING_SCALE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rating {
    pub overall: Option<f64>,
    pub performance: Option<f64>,
    pub comfort: Option<f64>,
    pub build_quality: Option<f64>,
    pub value: Option<f64>,
    pub scale: u32,
}

impl Default for Rating {
    fn default() -> Self {
        Rating {
            overall: None,
            performance: None,
            comfort: None,
            build_quality: None,
            value: None,
            scale: DEFAULT_RATING_SCALE,
        }
    }
}

impl Rating {
    /// A rating with only a scale carries no information.
    pub fn is_empty(&self) -> bool {
        [
            self.overall,
            self.performance,
            self.comfort,
            self.build_quality,
            self.value,
        ]
        .iter()
        .all(Option::is_none)
    }
}

/// Canonical record: the unit of storage and of query results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vehicle {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub category: Option<String>,
    pub engine: Option<EngineSpecs>,
    pub performance: Option<Performance>,
    pub dimensions: Option<Dimensions>,
    pub price: Option<PriceInfo>,
    pub rating: Option<Rating>,
    pub source_url: String,
    pub scraped_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub images: BTreeSet<String>,
    pub description: Option<String>,
    pub features: BTreeSet<String>,
    pub colors: BTreeSet<String>,
}

// Canonical → raw, so a cleaned record can be fed back through the cleaner.

fn num(v: Option<f64>) -> Option<RawValue> {
    v.map(RawValue::Number)
}

impl From<EngineSpecs> for RawEngine {
    fn from(e: EngineSpecs) -> Self {
        RawEngine {
            kind: e.kind,
            displacement: num(e.displacement),
            bore: num(e.bore),
            stroke: num(e.stroke),
            compression_ratio: e.compression_ratio,
            cooling: e.cooling,
            fuel_system: e.fuel_system,
        }
    }
}

impl From<Performance> for RawPerformance {
    fn from(p: Performance) -> Self {
        RawPerformance {
            power_hp: num(p.power_hp),
            power_kw: num(p.power_kw),
            torque_nm: num(p.torque_nm),
            torque_lbft: num(p.torque_lbft),
            top_speed_mph: num(p.top_speed_mph),
            top_speed_kmh: num(p.top_speed_kmh),
            acceleration_0_60: num(p.acceleration_0_60),
            quarter_mile: num(p.quarter_mile),
        }
    }
}

impl From<Dimensions> for RawDimensions {
    fn from(d: Dimensions) -> Self {
        RawDimensions {
            length: num(d.length),
            width: num(d.width),
            height: num(d.height),
            wheelbase: num(d.wheelbase),
            ground_clearance: num(d.ground_clearance),
            seat_height: num(d.seat_height),
            dry_weight: num(d.dry_weight),
            wet_weight: num(d.wet_weight),
            fuel_capacity: num(d.fuel_capacity),
        }
    }
}

impl From<PriceInfo> for RawPrice {
    fn from(p: PriceInfo) -> Self {
        RawPrice {
            msrp: num(p.msrp),
            currency: p.currency,
            year: p.year.map(RawValue::from),
        }
    }
}

impl From<Rating> for RawRating {
    fn from(r: Rating) -> Self {
        RawRating {
            overall: num(r.overall),
            performance: num(r.performance),
            comfort: num(r.comfort),
            build_quality: num(r.build_quality),
            value: num(r.value),
            scale: Some(RawValue::from(r.scale)),
        }
    }
}

impl From<Vehicle> for RawVehicle {
    fn from(v: Vehicle) -> Self {
        RawVehicle {
            brand: Some(v.brand),
            model: Some(v.model),
            year: Some(RawValue::from(v.year)),
            category: v.category,
            engine: v.engine.map(RawEngine::from),
            performance: v.performance.map(RawPerformance::from),
            dimensions: v.dimensions.map(RawDimensions::from),
            price: v.price.map(RawPrice::from),
            rating: v.rating.map(RawRating::from),
            source_url: v.source_url,
            scraped_at: v.scraped_at,
            updated_at: v.updated_at,
            images: v.images.into_iter().collect(),
            description: v.description,
            features: v.features.into_iter().collect(),
            colors: v.colors.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_uses_type_key_for_engine_kind() {
        let engine = EngineSpecs {
            kind: Some("inline-4".into()),
            displacement: Some(999.0),
            ..Default::default()
        };
        let json = serde_json::to_value(&engine).unwrap();
        assert_eq!(json["type"], "inline-4");
        assert_eq!(json["displacement"], 999.0);
    }

    #[test]
    fn vehicle_snapshot_survives_json() {
        let mut v = Vehicle {
            brand: "Honda".into(),
            model: "CBR600RR".into(),
            year: 2023,
            rating: Some(Rating {
                overall: Some(4.5),
                scale: 5,
                ..Default::default()
            }),
            source_url: "https://example.com/cbr".into(),
            ..Default::default()
        };
        v.images.insert("https://example.com/a.jpg".into());
        let json = serde_json::to_string(&v).unwrap();
        let back: Vehicle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn rating_with_only_scale_is_empty() {
        assert!(Rating::default().is_empty());
        assert_eq!(Rating::default().scale, DEFAULT_RATING_SCALE);
    }
}
