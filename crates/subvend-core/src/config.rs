//! Engine configuration.
//!
//! A single JSON settings file with built-in defaults; every field is
//! optional in the file. CLI arguments in the daemon binary override
//! the paths resolved here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PurchaseError;

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub topup: TopupLimits,
    #[serde(default)]
    pub expiry: ExpiryConfig,
}

/// Paths to the durable stores.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Ledger database path. Defaults to `~/.subvend/ledger.db` when unset.
    pub database_path: Option<PathBuf>,
    /// Inventory file path. Defaults to `~/.subvend/inventory.json` when unset.
    pub inventory_path: Option<PathBuf>,
    /// Catalog file path. Defaults to `~/.subvend/catalog.json` when unset.
    pub catalog_path: Option<PathBuf>,
}

/// Bounds for manual top-up amounts (card method, minor currency unit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupLimits {
    pub min_amount: i64,
    pub max_amount: i64,
}

impl Default for TopupLimits {
    fn default() -> Self {
        Self { min_amount: 200_000, max_amount: 10_000_000 }
    }
}

/// Expiry-reminder scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryConfig {
    /// Remind when a purchase expires within this many days.
    pub horizon_days: u32,
    /// Seconds between scans.
    pub interval_secs: u64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self { horizon_days: 3, interval_secs: 3600 }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file, falling back to defaults
    /// when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, PurchaseError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data =
            std::fs::read_to_string(path).map_err(|e| PurchaseError::Storage(e.to_string()))?;
        serde_json::from_str(&data)
            .map_err(|e| PurchaseError::Storage(format!("Failed to parse config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_storefront_policy() {
        let config = EngineConfig::default();
        assert_eq!(config.topup.min_amount, 200_000);
        assert_eq!(config.topup.max_amount, 10_000_000);
        assert_eq!(config.expiry.horizon_days, 3);
        assert_eq!(config.expiry.interval_secs, 3600);
    }

    #[test]
    fn missing_file_returns_defaults() {
        let config = EngineConfig::load(Path::new("/nonexistent/settings.json")).unwrap();
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"topup": {"min_amount": 1000, "max_amount": 5000}}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.topup.min_amount, 1000);
        assert_eq!(config.expiry.horizon_days, 3);
    }
}
