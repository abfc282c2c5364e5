use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::parser::page::Pairing;

pub const DEFAULT_CONFIG_PATH: &str = "meetings.toml";
const ENV_PREFIX: &str = "MEETINGS";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_intermediate_dir")]
    pub intermediate_dir: PathBuf,
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    #[serde(default)]
    pub crawl: CrawlSettings,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub timeout_ms: u64,
    pub settle_ms: u64,
    pub subpage_settle_ms: u64,
    pub max_records_per_page: usize,
    pub pairing: Pairing,
    /// Keep only meetings dated on the reference day (daily runs).
    pub only_reference_date: bool,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        CrawlSettings {
            timeout_ms: 60_000,
            settle_ms: 10_000,
            subpage_settle_ms: 5_000,
            max_records_per_page: 999,
            pairing: Pairing::ByIndex,
            only_reference_date: false,
        }
    }
}

impl CrawlSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn subpage_settle(&self) -> Duration {
        Duration::from_millis(self.subpage_settle_ms)
    }
}

/// A named page (or set of subpages) to crawl.
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// When present, these are visited instead of `url` and their names
    /// become the records' subcategory.
    #[serde(default)]
    pub subpages: Vec<Subpage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subpage {
    pub name: String,
    pub url: String,
}

fn default_intermediate_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("output")
}

fn enabled_by_default() -> bool {
    true
}

impl Settings {
    /// Optional TOML file at `path`, overridden by `MEETINGS_*` env vars
    /// (`__` separates nested keys, e.g. `MEETINGS_CRAWL__SETTLE_MS`).
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    #[cfg(test)]
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for cat in &self.categories {
            if cat.name.trim().is_empty() {
                bail!("category with empty name");
            }
            if cat.subpages.iter().any(|s| s.name.trim().is_empty()) {
                bail!("category {:?} has a subpage with an empty name", cat.name);
            }
            if cat.enabled && cat.url.is_none() && cat.subpages.is_empty() {
                bail!("category {:?} has neither a url nor subpages", cat.name);
            }
        }
        Ok(())
    }

    /// Enabled categories in file order, optionally narrowed to one name.
    pub fn enabled_categories(&self, only: Option<&str>) -> Vec<&Category> {
        self.categories
            .iter()
            .filter(|c| c.enabled)
            .filter(|c| only.map_or(true, |name| c.name == name))
            .collect()
    }
}
