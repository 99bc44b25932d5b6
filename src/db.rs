use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::model::{Dimensions, EngineSpecs, Performance, Vehicle};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS vehicles (
            id          INTEGER PRIMARY KEY,
            fingerprint TEXT UNIQUE NOT NULL,
            brand       TEXT NOT NULL,
            model       TEXT NOT NULL,
            year        INTEGER NOT NULL,
            category    TEXT,
            source_url  TEXT NOT NULL,
            scraped_at  TEXT,
            updated_at  TEXT NOT NULL,
            raw_data    TEXT NOT NULL
        );
        -- Not unique: the same bike reviewed on two sites is two rows.
        CREATE INDEX IF NOT EXISTS idx_vehicles_identity ON vehicles(brand, model, year);
        CREATE INDEX IF NOT EXISTS idx_vehicles_year ON vehicles(year);
        CREATE INDEX IF NOT EXISTS idx_vehicles_category ON vehicles(category);

        CREATE TABLE IF NOT EXISTS engine_specs (
            vehicle_id        INTEGER NOT NULL UNIQUE REFERENCES vehicles(id),
            type              TEXT,
            displacement      REAL,
            bore              REAL,
            stroke            REAL,
            compression_ratio TEXT,
            cooling           TEXT,
            fuel_system       TEXT
        );

        CREATE TABLE IF NOT EXISTS performance (
            vehicle_id        INTEGER NOT NULL UNIQUE REFERENCES vehicles(id),
            power_hp          REAL,
            power_kw          REAL,
            torque_nm         REAL,
            torque_lbft       REAL,
            top_speed_mph     REAL,
            top_speed_kmh     REAL,
            acceleration_0_60 REAL,
            quarter_mile      REAL
        );

        CREATE TABLE IF NOT EXISTS dimensions (
            vehicle_id       INTEGER NOT NULL UNIQUE REFERENCES vehicles(id),
            length           REAL,
            width            REAL,
            height           REAL,
            wheelbase        REAL,
            ground_clearance REAL,
            seat_height      REAL,
            dry_weight       REAL,
            wet_weight       REAL,
            fuel_capacity    REAL
        );
        ",
    )?;
    Ok(())
}

// ── Identity ──

/// Field order is alphabetical so the JSON has sorted keys.
#[derive(Serialize)]
struct Identity<'a> {
    brand: &'a str,
    model: &'a str,
    source_url: &'a str,
    year: i32,
}

/// SHA-256 hex over the sorted-key JSON of brand, model, source URL and year.
pub fn fingerprint(v: &Vehicle) -> String {
    let identity = Identity {
        brand: &v.brand,
        model: &v.model,
        source_url: &v.source_url,
        year: v.year,
    };
    // Serializing a struct of strings and an integer cannot fail.
    let json = serde_json::to_string(&identity).unwrap_or_default();
    hex::encode(Sha256::digest(json.as_bytes()))
}

// ── Upsert ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated(i64),
}

impl UpsertOutcome {
    pub fn id(self) -> i64 {
        match self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Updated(id) => id,
        }
    }
}

fn ts(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(|t| t.to_rfc3339())
}

/// Insert a new vehicle or refresh the one with the same fingerprint. Child rows are
/// always replaced wholesale by whatever the new record carries.
pub fn upsert_vehicle(conn: &Connection, v: &Vehicle) -> Result<UpsertOutcome> {
    let fp = fingerprint(v);
    let now = Utc::now();
    let mut snapshot = v.clone();
    snapshot.updated_at = Some(now);
    let raw_data = serde_json::to_string(&snapshot).context("Failed to serialize vehicle")?;

    let tx = conn.unchecked_transaction()?;
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM vehicles WHERE fingerprint = ?1",
            rusqlite::params![fp],
            |r| r.get(0),
        )
        .optional()?;

    let outcome = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE vehicles SET updated_at = ?1, raw_data = ?2 WHERE id = ?3",
                rusqlite::params![now.to_rfc3339(), raw_data, id],
            )?;
            UpsertOutcome::Updated(id)
        }
        None => {
            tx.execute(
                "INSERT INTO vehicles (fingerprint, brand, model, year, category,
                                       source_url, scraped_at, updated_at, raw_data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    fp,
                    v.brand,
                    v.model,
                    v.year,
                    v.category,
                    v.source_url,
                    ts(v.scraped_at),
                    now.to_rfc3339(),
                    raw_data,
                ],
            )?;
            UpsertOutcome::Inserted(tx.last_insert_rowid())
        }
    };

    let id = outcome.id();
    save_engine(&tx, id, v.engine.as_ref())?;
    save_performance(&tx, id, v.performance.as_ref())?;
    save_dimensions(&tx, id, v.dimensions.as_ref())?;
    tx.commit()?;
    Ok(outcome)
}

fn save_engine(conn: &Connection, id: i64, engine: Option<&EngineSpecs>) -> Result<()> {
    conn.execute("DELETE FROM engine_specs WHERE vehicle_id = ?1", [id])?;
    if let Some(e) = engine {
        conn.execute(
            "INSERT INTO engine_specs (vehicle_id, type, displacement, bore, stroke,
                                       compression_ratio, cooling, fuel_system)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                id,
                e.kind,
                e.displacement,
                e.bore,
                e.stroke,
                e.compression_ratio,
                e.cooling,
                e.fuel_system,
            ],
        )?;
    }
    Ok(())
}

fn save_performance(conn: &Connection, id: i64, perf: Option<&Performance>) -> Result<()> {
    conn.execute("DELETE FROM performance WHERE vehicle_id = ?1", [id])?;
    if let Some(p) = perf {
        conn.execute(
            "INSERT INTO performance (vehicle_id, power_hp, power_kw, torque_nm, torque_lbft,
                                      top_speed_mph, top_speed_kmh, acceleration_0_60, quarter_mile)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                id,
                p.power_hp,
                p.power_kw,
                p.torque_nm,
                p.torque_lbft,
                p.top_speed_mph,
                p.top_speed_kmh,
                p.acceleration_0_60,
                p.quarter_mile,
            ],
        )?;
    }
    Ok(())
}

fn save_dimensions(conn: &Connection, id: i64, dims: Option<&Dimensions>) -> Result<()> {
    conn.execute("DELETE FROM dimensions WHERE vehicle_id = ?1", [id])?;
    if let Some(d) = dims {
        conn.execute(
            "INSERT INTO dimensions (vehicle_id, length, width, height, wheelbase,
                                     ground_clearance, seat_height, dry_weight, wet_weight,
                                     fuel_capacity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                id,
                d.length,
                d.width,
                d.height,
                d.wheelbase,
                d.ground_clearance,
                d.seat_height,
                d.dry_weight,
                d.wet_weight,
                d.fuel_capacity,
            ],
        )?;
    }
    Ok(())
}

// ── Search ──

#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Case-insensitive substring.
    pub brand: Option<String>,
    /// Case-insensitive substring.
    pub model: Option<String>,
    pub year: Option<i32>,
    /// Case-insensitive exact match.
    pub category: Option<String>,
}

/// Stored snapshots matching every filter that is set.
pub fn search(conn: &Connection, filter: &SearchFilter) -> Result<Vec<Vehicle>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(b) = filter.brand.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(format!("instr(lower(brand), lower(?{})) > 0", params.len() + 1));
        params.push(Box::new(b.to_string()));
    }
    if let Some(m) = filter.model.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(format!("instr(lower(model), lower(?{})) > 0", params.len() + 1));
        params.push(Box::new(m.to_string()));
    }
    if let Some(y) = filter.year {
        conditions.push(format!("year = ?{}", params.len() + 1));
        params.push(Box::new(y));
    }
    if let Some(c) = filter.category.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(format!("lower(category) = lower(?{})", params.len() + 1));
        params.push(Box::new(c.to_string()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    let sql = format!("SELECT id, raw_data FROM vehicles{} ORDER BY id", where_clause);

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, json)| match serde_json::from_str::<Vehicle>(&json) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Skipping vehicle {} with unreadable snapshot: {}", id, e);
                None
            }
        })
        .collect())
}

// ── Stats ──

#[derive(Debug, Serialize)]
pub struct Stats {
    pub total: usize,
    pub by_brand: Vec<(String, usize)>,
    pub by_year: Vec<(i32, usize)>,
    pub by_category: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM vehicles", [], |r| r.get(0))?;
    let by_brand = count_by(
        conn,
        "SELECT brand, COUNT(*) FROM vehicles GROUP BY brand ORDER BY COUNT(*) DESC, brand",
    )?;
    let by_year = count_by(
        conn,
        "SELECT year, COUNT(*) FROM vehicles GROUP BY year ORDER BY year DESC",
    )?;
    let by_category = count_by(
        conn,
        "SELECT category, COUNT(*) FROM vehicles WHERE category IS NOT NULL
         GROUP BY category ORDER BY COUNT(*) DESC, category",
    )?;
    Ok(Stats {
        total,
        by_brand,
        by_year,
        by_category,
    })
}

fn count_by<K: rusqlite::types::FromSql>(conn: &Connection, sql: &str) -> Result<Vec<(K, usize)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Export ──

/// One row of the flat main/child-table join.
#[derive(Debug, Serialize)]
pub struct ExportRow {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub category: Option<String>,
    pub engine_type: Option<String>,
    pub displacement: Option<f64>,
    pub bore: Option<f64>,
    pub stroke: Option<f64>,
    pub power_hp: Option<f64>,
    pub torque_nm: Option<f64>,
    pub top_speed_mph: Option<f64>,
    pub acceleration_0_60: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub seat_height: Option<f64>,
    pub dry_weight: Option<f64>,
    pub source_url: String,
    pub scraped_at: Option<String>,
}

pub fn fetch_export_rows(conn: &Connection) -> Result<Vec<ExportRow>> {
    let mut stmt = conn.prepare(
        "SELECT v.brand, v.model, v.year, v.category,
                e.type, e.displacement, e.bore, e.stroke,
                p.power_hp, p.torque_nm, p.top_speed_mph, p.acceleration_0_60,
                d.length, d.width, d.height, d.seat_height, d.dry_weight,
                v.source_url, v.scraped_at
         FROM vehicles v
         LEFT JOIN engine_specs e ON e.vehicle_id = v.id
         LEFT JOIN performance p ON p.vehicle_id = v.id
         LEFT JOIN dimensions d ON d.vehicle_id = v.id
         ORDER BY v.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ExportRow {
                brand: row.get(0)?,
                model: row.get(1)?,
                year: row.get(2)?,
                category: row.get(3)?,
                engine_type: row.get(4)?,
                displacement: row.get(5)?,
                bore: row.get(6)?,
                stroke: row.get(7)?,
                power_hp: row.get(8)?,
                torque_nm: row.get(9)?,
                top_speed_mph: row.get(10)?,
                acceleration_0_60: row.get(11)?,
                length: row.get(12)?,
                width: row.get(13)?,
                height: row.get(14)?,
                seat_height: row.get(15)?,
                dry_weight: row.get(16)?,
                source_url: row.get(17)?,
                scraped_at: row.get(18)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn vehicle(brand: &str, model: &str, year: i32, category: Option<&str>) -> Vehicle {
        Vehicle {
            brand: brand.into(),
            model: model.into(),
            year,
            category: category.map(str::to_string),
            source_url: format!(
                "https://example.com/{}-{}",
                brand.to_lowercase(),
                model.to_lowercase()
            ),
            ..Default::default()
        }
    }

    fn count(conn: &Connection, table: &str) -> usize {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn fingerprint_covers_identity_only() {
        let a = vehicle("Honda", "CBR1000RR", 2023, Some("sport"));
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
        assert_eq!(fingerprint(&a).len(), 64);

        let mut recategorized = a.clone();
        recategorized.category = Some("touring".into());
        recategorized.description = Some("new text".into());
        assert_eq!(fingerprint(&a), fingerprint(&recategorized));

        let mut moved = a.clone();
        moved.source_url = "https://other.example.com/cbr".into();
        assert_ne!(fingerprint(&a), fingerprint(&moved));
        let mut older = a.clone();
        older.year = 2022;
        assert_ne!(fingerprint(&a), fingerprint(&older));
    }

    #[test]
    fn second_upsert_updates_in_place() {
        let conn = memory_db();
        let v = vehicle("Honda", "CBR1000RR", 2023, Some("sport"));
        let first = upsert_vehicle(&conn, &v).unwrap();
        let second = upsert_vehicle(&conn, &v).unwrap();
        assert!(matches!(first, UpsertOutcome::Inserted(_)));
        assert_eq!(second, UpsertOutcome::Updated(first.id()));
        assert_eq!(count(&conn, "vehicles"), 1);
    }

    #[test]
    fn child_rows_are_replaced_not_merged() {
        let conn = memory_db();
        let mut v = vehicle("Honda", "CBR1000RR", 2023, Some("sport"));
        v.engine = Some(EngineSpecs {
            displacement: Some(999.0),
            ..Default::default()
        });
        v.performance = Some(Performance {
            power_hp: Some(214.0),
            ..Default::default()
        });
        upsert_vehicle(&conn, &v).unwrap();
        assert_eq!(count(&conn, "engine_specs"), 1);
        assert_eq!(count(&conn, "performance"), 1);

        v.engine = Some(EngineSpecs {
            displacement: Some(1000.0),
            ..Default::default()
        });
        v.performance = None;
        upsert_vehicle(&conn, &v).unwrap();

        let displacement: f64 = conn
            .query_row("SELECT displacement FROM engine_specs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(displacement, 1000.0);
        assert_eq!(count(&conn, "engine_specs"), 1);
        assert_eq!(count(&conn, "performance"), 0);

        v.engine = None;
        upsert_vehicle(&conn, &v).unwrap();
        assert_eq!(count(&conn, "engine_specs"), 0);
    }

    #[test]
    fn update_refreshes_snapshot_only() {
        let conn = memory_db();
        let mut v = vehicle("Honda", "CBR1000RR", 2023, Some("sport"));
        upsert_vehicle(&conn, &v).unwrap();
        v.category = Some("touring".into());
        upsert_vehicle(&conn, &v).unwrap();

        let column: String = conn
            .query_row("SELECT category FROM vehicles", [], |r| r.get(0))
            .unwrap();
        assert_eq!(column, "sport");
        let stored = search(&conn, &SearchFilter::default()).unwrap();
        assert_eq!(stored[0].category.as_deref(), Some("touring"));
        assert!(stored[0].updated_at.is_some());
    }

    #[test]
    fn same_bike_from_two_sources_is_two_rows() {
        let conn = memory_db();
        let a = vehicle("Honda", "CBR1000RR", 2023, Some("sport"));
        let mut b = a.clone();
        b.source_url = "https://other.example.com/cbr".into();
        upsert_vehicle(&conn, &a).unwrap();
        assert!(matches!(upsert_vehicle(&conn, &b).unwrap(), UpsertOutcome::Inserted(_)));
        assert_eq!(count(&conn, "vehicles"), 2);
    }

    fn fixture() -> Connection {
        let conn = memory_db();
        for v in [
            vehicle("Honda", "CBR1000RR", 2023, Some("sport")),
            vehicle("Yamaha", "R1", 2023, Some("sport")),
            vehicle("Honda", "GoldWing", 2022, Some("touring")),
        ] {
            upsert_vehicle(&conn, &v).unwrap();
        }
        conn
    }

    fn filter(brand: Option<&str>, category: Option<&str>) -> SearchFilter {
        SearchFilter {
            brand: brand.map(str::to_string),
            category: category.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn search_filters_are_anded() {
        let conn = fixture();
        assert_eq!(search(&conn, &filter(Some("Honda"), None)).unwrap().len(), 2);
        assert_eq!(search(&conn, &filter(None, Some("sport"))).unwrap().len(), 2);
        let both = search(&conn, &filter(Some("Honda"), Some("sport"))).unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].model, "CBR1000RR");
    }

    #[test]
    fn search_matching_rules() {
        let conn = fixture();
        assert_eq!(search(&conn, &filter(Some("hon"), None)).unwrap().len(), 2);
        assert_eq!(search(&conn, &filter(None, Some("SPORT"))).unwrap().len(), 2);
        assert_eq!(search(&conn, &filter(None, Some("spo"))).unwrap().len(), 0);
        let by_model = SearchFilter {
            model: Some("wing".into()),
            ..Default::default()
        };
        assert_eq!(search(&conn, &by_model).unwrap().len(), 1);
        let by_year = SearchFilter {
            year: Some(2023),
            ..Default::default()
        };
        assert_eq!(search(&conn, &by_year).unwrap().len(), 2);
        assert_eq!(search(&conn, &SearchFilter::default()).unwrap().len(), 3);
    }

    #[test]
    fn stats_are_live_aggregates() {
        let conn = fixture();
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_brand[0], ("Honda".to_string(), 2));
        assert_eq!(stats.by_year, vec![(2023, 2), (2022, 1)]);
        assert_eq!(
            stats.by_category,
            vec![("sport".to_string(), 2), ("touring".to_string(), 1)]
        );

        upsert_vehicle(&conn, &vehicle("Zero", "SR/F", 2022, None)).unwrap();
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_category.len(), 2);
    }

    #[test]
    fn export_rows_join_children() {
        let conn = memory_db();
        let mut v = vehicle("Ducati", "Panigale V4", 2022, Some("sport"));
        v.engine = Some(EngineSpecs {
            kind: Some("V4".into()),
            displacement: Some(1103.0),
            ..Default::default()
        });
        upsert_vehicle(&conn, &v).unwrap();
        upsert_vehicle(&conn, &vehicle("Zero", "SR/F", 2022, None)).unwrap();

        let rows = fetch_export_rows(&conn).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].engine_type.as_deref(), Some("V4"));
        assert_eq!(rows[0].displacement, Some(1103.0));
        assert_eq!(rows[0].power_hp, None);
        assert_eq!(rows[1].engine_type, None);
    }

    #[test]
    fn connect_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/sqlite/motorcycles.db");
        let conn = connect(&path).unwrap();
        init_schema(&conn).unwrap();
        assert!(path.exists());
    }
}
