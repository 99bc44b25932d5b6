//! Raw → canonical record.
//!
//! Every sub-cleaner degrades to absence (or, for years, the current year) instead
//! of failing. Out-of-range numbers are dropped, never clamped.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;

use crate::model::*;
use crate::patterns::extract_number;

static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\w\s\-().,;:!?'"/]"#).unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());

pub const DISPLACEMENT: RangeInclusive<f64> = 50.0..=2500.0;
pub const BORE_STROKE: RangeInclusive<f64> = 20.0..=120.0;

pub const POWER_HP: RangeInclusive<f64> = 5.0..=300.0;
pub const POWER_KW: RangeInclusive<f64> = 3.0..=250.0;
pub const TORQUE_NM: RangeInclusive<f64> = 5.0..=250.0;
pub const TORQUE_LBFT: RangeInclusive<f64> = 5.0..=200.0;
pub const TOP_SPEED_MPH: RangeInclusive<f64> = 30.0..=250.0;
pub const TOP_SPEED_KMH: RangeInclusive<f64> = 50.0..=400.0;
pub const ACCELERATION_0_60: RangeInclusive<f64> = 1.0..=15.0;
pub const QUARTER_MILE: RangeInclusive<f64> = 8.0..=20.0;

pub const LENGTH: RangeInclusive<f64> = 1500.0..=3000.0;
pub const WIDTH: RangeInclusive<f64> = 600.0..=1200.0;
pub const HEIGHT: RangeInclusive<f64> = 800.0..=1800.0;
pub const WHEELBASE: RangeInclusive<f64> = 1200.0..=2000.0;
pub const GROUND_CLEARANCE: RangeInclusive<f64> = 100.0..=300.0;
pub const SEAT_HEIGHT: RangeInclusive<f64> = 600.0..=900.0;
pub const DRY_WEIGHT: RangeInclusive<f64> = 80.0..=400.0;
pub const WET_WEIGHT: RangeInclusive<f64> = 90.0..=450.0;
pub const FUEL_CAPACITY: RangeInclusive<f64> = 5.0..=30.0;

pub const MSRP: RangeInclusive<f64> = 1000.0..=100000.0;

pub const FEATURE_LEN: RangeInclusive<usize> = 5..=200;
pub const COLOR_LEN: RangeInclusive<usize> = 2..=50;

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// Raw synonym → canonical category. Keys are matched after lower-casing and trimming.
const CATEGORY_SYNONYMS: &[(&str, &str)] = &[
    ("sportbike", "sport"),
    ("supersport", "sport"),
    ("superbike", "sport"),
    ("streetfighter", "naked"),
    ("standard", "naked"),
    ("dual-sport", "adventure"),
    ("dual sport", "adventure"),
    ("adv", "adventure"),
    ("motocross", "dirt"),
    ("mx", "dirt"),
    ("off-road", "dirt"),
    ("electric", "electric"),
    ("e-bike", "electric"),
];

pub fn current_year() -> i32 {
    Utc::now().year()
}

pub fn clean_vehicle(raw: RawVehicle) -> Vehicle {
    Vehicle {
        brand: clean_text(raw.brand.as_deref().unwrap_or_default()),
        model: clean_text(raw.model.as_deref().unwrap_or_default()),
        year: clean_year(raw.year.as_ref()),
        category: clean_category(raw.category.as_deref()),
        engine: raw.engine.map(clean_engine).filter(|e| !e.is_empty()),
        performance: raw.performance.map(clean_performance).filter(|p| !p.is_empty()),
        dimensions: raw.dimensions.map(clean_dimensions).filter(|d| !d.is_empty()),
        price: raw.price.map(clean_price).filter(|p| !p.is_empty()),
        rating: raw.rating.map(clean_rating).filter(|r| !r.is_empty()),
        source_url: raw.source_url.trim().to_string(),
        scraped_at: raw.scraped_at,
        updated_at: raw.updated_at,
        images: clean_image_urls(&raw.images),
        description: clean_optional_text(raw.description.as_deref()),
        features: clean_text_set(&raw.features, &FEATURE_LEN),
        colors: clean_text_set(&raw.colors, &COLOR_LEN),
    }
}

/// Drop characters outside the punctuation allow-list, then collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let kept = DISALLOWED_RE.replace_all(text, "");
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_optional_text(text: Option<&str>) -> Option<String> {
    text.map(clean_text).filter(|t| !t.is_empty())
}

/// Always yields a year: anything unusable becomes the current year.
pub fn clean_year(value: Option<&RawValue>) -> i32 {
    let now = current_year();
    let plausible = 1900..=now + 2;
    let candidate = match value {
        Some(RawValue::Number(n)) if n.is_finite() => Some(n.trunc() as i64),
        Some(RawValue::Text(s)) => YEAR_RE
            .captures(s)
            .and_then(|caps| caps[1].parse::<i64>().ok()),
        _ => None,
    };
    candidate
        .and_then(|y| i32::try_from(y).ok())
        .filter(|y| plausible.contains(y))
        .unwrap_or(now)
}

pub fn clean_category(category: Option<&str>) -> Option<String> {
    let category = category?.trim().to_lowercase();
    if category.is_empty() {
        return None;
    }
    let mapped = CATEGORY_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == category)
        .map(|(_, canonical)| canonical.to_string());
    Some(mapped.unwrap_or(category))
}

pub fn clean_number(value: Option<&RawValue>) -> Option<f64> {
    match value? {
        RawValue::Number(n) if n.is_finite() => Some(*n),
        RawValue::Number(_) => None,
        RawValue::Text(s) => extract_number(s),
    }
}

fn in_range(value: Option<&RawValue>, range: &RangeInclusive<f64>) -> Option<f64> {
    clean_number(value).filter(|v| range.contains(v))
}

fn clean_engine(raw: RawEngine) -> EngineSpecs {
    EngineSpecs {
        kind: clean_optional_text(raw.kind.as_deref()),
        displacement: in_range(raw.displacement.as_ref(), &DISPLACEMENT),
        bore: in_range(raw.bore.as_ref(), &BORE_STROKE),
        stroke: in_range(raw.stroke.as_ref(), &BORE_STROKE),
        compression_ratio: clean_optional_text(raw.compression_ratio.as_deref()),
        cooling: clean_optional_text(raw.cooling.as_deref()),
        fuel_system: clean_optional_text(raw.fuel_system.as_deref()),
    }
}

fn clean_performance(raw: RawPerformance) -> Performance {
    Performance {
        power_hp: in_range(raw.power_hp.as_ref(), &POWER_HP),
        power_kw: in_range(raw.power_kw.as_ref(), &POWER_KW),
        torque_nm: in_range(raw.torque_nm.as_ref(), &TORQUE_NM),
        torque_lbft: in_range(raw.torque_lbft.as_ref(), &TORQUE_LBFT),
        top_speed_mph: in_range(raw.top_speed_mph.as_ref(), &TOP_SPEED_MPH),
        top_speed_kmh: in_range(raw.top_speed_kmh.as_ref(), &TOP_SPEED_KMH),
        acceleration_0_60: in_range(raw.acceleration_0_60.as_ref(), &ACCELERATION_0_60),
        quarter_mile: in_range(raw.quarter_mile.as_ref(), &QUARTER_MILE),
    }
}

fn clean_dimensions(raw: RawDimensions) -> Dimensions {
    Dimensions {
        length: in_range(raw.length.as_ref(), &LENGTH),
        width: in_range(raw.width.as_ref(), &WIDTH),
        height: in_range(raw.height.as_ref(), &HEIGHT),
        wheelbase: in_range(raw.wheelbase.as_ref(), &WHEELBASE),
        ground_clearance: in_range(raw.ground_clearance.as_ref(), &GROUND_CLEARANCE),
        seat_height: in_range(raw.seat_height.as_ref(), &SEAT_HEIGHT),
        dry_weight: in_range(raw.dry_weight.as_ref(), &DRY_WEIGHT),
        wet_weight: in_range(raw.wet_weight.as_ref(), &WET_WEIGHT),
        fuel_capacity: in_range(raw.fuel_capacity.as_ref(), &FUEL_CAPACITY),
    }
}

fn clean_price(raw: RawPrice) -> PriceInfo {
    PriceInfo {
        msrp: in_range(raw.msrp.as_ref(), &MSRP),
        currency: clean_optional_text(raw.currency.as_deref()),
        year: raw.year.as_ref().map(|y| clean_year(Some(y))),
    }
}

/// The scale is settled first; every score is then checked against `[0, scale]`.
fn clean_rating(raw: RawRating) -> Rating {
    let scale = clean_number(raw.scale.as_ref())
        .filter(|s| *s > 0.0)
        .map(|s| s.trunc())
        .filter(|s| *s >= 1.0 && *s <= f64::from(u32::MAX))
        .map(|s| s as u32)
        .unwrap_or(DEFAULT_RATING_SCALE);
    let bounds = 0.0..=f64::from(scale);
    Rating {
        overall: in_range(raw.overall.as_ref(), &bounds),
        performance: in_range(raw.performance.as_ref(), &bounds),
        comfort: in_range(raw.comfort.as_ref(), &bounds),
        build_quality: in_range(raw.build_quality.as_ref(), &bounds),
        value: in_range(raw.value.as_ref(), &bounds),
        scale,
    }
}

pub fn clean_image_urls(urls: &[String]) -> BTreeSet<String> {
    urls.iter()
        .map(|u| u.trim())
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .filter(|u| {
            let lower = u.to_lowercase();
            IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext))
        })
        .map(str::to_string)
        .collect()
}

fn clean_text_set(items: &[String], length: &RangeInclusive<usize>) -> BTreeSet<String> {
    items
        .iter()
        .map(|item| clean_text(item))
        .filter(|item| length.contains(&item.chars().count()))
        .collect()
}
