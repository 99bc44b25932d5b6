use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use rusqlite::Connection;
use tracing::info;

use crate::db::{self, SearchFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Csv,
    Json,
}

/// Write every stored record to `path`. Returns the number of records written.
pub fn export(conn: &Connection, format: Format, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let count = match format {
        Format::Csv => export_csv(conn, path)?,
        Format::Json => export_json(conn, path)?,
    };
    info!("Exported {} records to {}", count, path.display());
    Ok(count)
}

/// Pretty-printed JSON array of the stored snapshots.
pub fn export_json(conn: &Connection, path: &Path) -> Result<usize> {
    let vehicles = db::search(conn, &SearchFilter::default())?;
    let json = serde_json::to_string_pretty(&vehicles)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(vehicles.len())
}

/// Flat CSV view joining the vehicle row with its engine, performance and dimension rows.
pub fn export_csv(conn: &Connection, path: &Path) -> Result<usize> {
    let rows = db::fetch_export_rows(conn)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(rows.len())
}
