use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "moto_scraper.toml";
pub const ENV_PREFIX: &str = "MOTO";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Http,
    Spider,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    /// Politeness delay between requests, drawn uniformly from `[min, max]`.
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
    pub backend: Backend,
    pub spider_api_key: Option<String>,
}

/// Defaults, then `moto_scraper.toml` if present, then `MOTO_*` environment variables.
pub fn load() -> Result<Settings> {
    build(Some(Path::new(CONFIG_FILE)), Environment::with_prefix(ENV_PREFIX))
}

pub fn build(file: Option<&Path>, env: Environment) -> Result<Settings> {
    let mut builder = Config::builder()
        .set_default("db_path", "data/sqlite/motorcycles.db")?
        .set_default("min_delay_ms", 1000)?
        .set_default("max_delay_ms", 3000)?
        .set_default("max_retries", 3)?
        .set_default("backoff_ms", 2000)?
        .set_default("timeout_secs", 30)?
        .set_default("backend", "http")?;
    if let Some(path) = file {
        builder = builder.add_source(File::from(path).required(false));
    }
    let settings: Settings = builder
        .add_source(env.try_parsing(true))
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            bail!(
                "min_delay_ms ({}) is greater than max_delay_ms ({})",
                self.min_delay_ms,
                self.max_delay_ms
            );
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be positive");
        }
        if self.backend == Backend::Spider
            && self.spider_api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            bail!("{}_SPIDER_API_KEY must be set for the spider backend", ENV_PREFIX);
        }
        Ok(())
    }
}
