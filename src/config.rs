//! Configuration management for scan tuning, report output, and paths.

use std::{
   fs,
   path::{Path, PathBuf},
   sync::OnceLock,
};

use directories::BaseDirs;
use figment::{
   Figment,
   providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

static CONFIG: OnceLock<Config> = OnceLock::new();

/// `RFC_READ_TABLE` rejects larger `ROWCOUNT` values on most kernels.
pub const MAX_BATCH_SIZE_CAP: usize = 100_000;
/// Upper bound for identifiers packed into one `IN ( ... )` clause.
pub const MAX_ID_CHUNK_CAP: usize = 1000;

/// Application configuration loaded from config file and environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
   pub batch_size:          usize,
   pub max_rows:            u64,
   pub enable_sampling:     bool,
   pub id_chunk_size:       usize,
   pub relationship_filter: String,

   pub scan_budget_secs:     u64,
   pub request_timeout_secs: u64,
   pub language:             String,
   pub trace:                String,

   pub output_dir:      PathBuf,
   pub report_title:    String,
   pub report_max_rows: usize,

   pub storage_kb_per_row: f64,
   pub cost_per_gb_usd:    f64,
}

impl Default for Config {
   fn default() -> Self {
      Self {
         batch_size: 5000,
         max_rows: 50_000,
         enable_sampling: false,
         id_chunk_size: 200,
         relationship_filter: "RELTYPE = 'ATTA'".to_string(),
         scan_budget_secs: 7 * 60,
         request_timeout_secs: 60,
         language: "EN".to_string(),
         trace: "0".to_string(),
         output_dir: PathBuf::from("./reports"),
         report_title: "GOS Integrity Audit".to_string(),
         report_max_rows: 500,
         storage_kb_per_row: 2.0,
         cost_per_gb_usd: 50.0,
      }
   }
}

impl Config {
   pub fn load() -> Self {
      let config_path = ensure_global_config();
      Self::load_from(Some(&config_path))
   }

   /// Loads defaults, an optional TOML file, then `GOSSCAN_*` overrides.
   pub fn load_from(config_path: Option<&Path>) -> Self {
      let mut figment = Figment::from(Serialized::defaults(Self::default()));
      if let Some(path) = config_path {
         figment = figment.merge(Toml::file(path));
      }

      figment
         .merge(Env::prefixed("GOSSCAN_").lowercase(true))
         .extract()
         .inspect_err(|e| tracing::warn!("failed to parse config: {e}"))
         .unwrap_or_default()
   }

   fn create_default_config(path: &Path) {
      if let Some(parent) = path.parent() {
         let _ = fs::create_dir_all(parent);
      }
      let default_config = Self::default();
      if let Ok(toml) = toml::to_string_pretty(&default_config) {
         let _ = fs::write(path, toml);
      }
   }

   /// Row cap applied to every table read, if sampling is on.
   pub const fn row_cap(&self) -> Option<u64> {
      if self.enable_sampling { Some(self.max_rows) } else { None }
   }

   pub fn effective_batch_size(&self) -> usize {
      self.batch_size.clamp(1, MAX_BATCH_SIZE_CAP)
   }

   pub fn effective_id_chunk_size(&self) -> usize {
      self.id_chunk_size.clamp(1, MAX_ID_CHUNK_CAP)
   }

   pub fn validate(&self) -> Result<()> {
      if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE_CAP {
         return Err(
            ConfigError::InvalidSetting {
               key:    "batch_size",
               reason: format!("must be between 1 and {MAX_BATCH_SIZE_CAP}"),
            }
            .into(),
         );
      }
      if self.id_chunk_size == 0 || self.id_chunk_size > MAX_ID_CHUNK_CAP {
         return Err(
            ConfigError::InvalidSetting {
               key:    "id_chunk_size",
               reason: format!("must be between 1 and {MAX_ID_CHUNK_CAP}"),
            }
            .into(),
         );
      }
      if self.enable_sampling && self.max_rows == 0 {
         return Err(
            ConfigError::InvalidSetting {
               key:    "max_rows",
               reason: "must be positive when sampling is enabled".to_string(),
            }
            .into(),
         );
      }
      if self.scan_budget_secs == 0 {
         return Err(
            ConfigError::InvalidSetting {
               key:    "scan_budget_secs",
               reason: "must be positive".to_string(),
            }
            .into(),
         );
      }
      if self.storage_kb_per_row < 0.0 || self.cost_per_gb_usd < 0.0 {
         return Err(
            ConfigError::InvalidSetting {
               key:    "storage_kb_per_row",
               reason: "storage and cost factors must not be negative".to_string(),
            }
            .into(),
         );
      }
      Ok(())
   }
}

/// Returns the global configuration instance
pub fn get() -> &'static Config {
   CONFIG.get_or_init(Config::load)
}

/// Returns the base directory for gosscan configuration
pub fn base_dir() -> &'static PathBuf {
   static ONCE: OnceLock<PathBuf> = OnceLock::new();
   ONCE.get_or_init(|| resolve_base_dir(".gosscan"))
}

pub fn config_file_path() -> &'static PathBuf {
   static ONCE: OnceLock<PathBuf> = OnceLock::new();
   ONCE.get_or_init(|| base_dir().join("config.toml"))
}

fn ensure_global_config() -> PathBuf {
   let config_path = config_file_path();
   if !config_path.exists() {
      Config::create_default_config(config_path);
   }
   config_path.clone()
}

fn resolve_base_dir(dir_name: &str) -> PathBuf {
   BaseDirs::new()
      .map(|d| d.home_dir().join(dir_name))
      .or_else(|| {
         std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(dir_name))
      })
      .unwrap_or_else(|| {
         std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(dir_name)
      })
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn defaults_match_seven_minute_scan() {
      let cfg = Config::default();
      assert_eq!(cfg.batch_size, 5000);
      assert_eq!(cfg.scan_budget_secs, 420);
      assert_eq!(cfg.row_cap(), None);
      cfg.validate().expect("defaults are valid");
   }

   #[test]
   fn toml_file_overrides_defaults() {
      let dir = tempfile::TempDir::new().expect("tempdir");
      let path = dir.path().join("config.toml");
      fs::write(&path, "batch_size = 250\nenable_sampling = true\nmax_rows = 1000\n")
         .expect("write config");

      let cfg = Config::load_from(Some(&path));
      assert_eq!(cfg.batch_size, 250);
      assert_eq!(cfg.row_cap(), Some(1000));
      assert_eq!(cfg.report_title, "GOS Integrity Audit");
   }

   #[test]
   fn rejects_zero_batch_size() {
      let cfg = Config { batch_size: 0, ..Config::default() };
      assert!(cfg.validate().is_err());
   }

   #[test]
   fn sampling_needs_positive_cap() {
      let cfg = Config { enable_sampling: true, max_rows: 0, ..Config::default() };
      assert!(cfg.validate().is_err());
   }
}
