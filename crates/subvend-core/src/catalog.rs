//! Pricing catalog for the storefront.
//!
//! The catalog is a JSON file mapping duration tiers to the traffic
//! options sold for that duration. It is display/pricing data only;
//! historical plan rows live in the ledger and are never mutated when
//! the catalog changes.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PurchaseError;

/// A duration tier offered by the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationTier {
    /// Stable tier identifier (also the inventory bucket key).
    pub id: u32,
    /// Human-readable name, e.g. "3 months".
    pub name: String,
    /// Plan length in days.
    pub days: u32,
}

/// A traffic option sold under a duration tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficOption {
    /// Traffic quota in GB; 0 means unlimited.
    pub traffic_gb: u32,
    /// Price in the minor currency unit.
    pub price: i64,
    /// Concurrent connection cap; 0 means unlimited.
    pub connections: u32,
}

/// The full catalog: duration tiers plus the options keyed by
/// stringified duration id (matching the persisted JSON shape).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Catalog {
    pub durations: Vec<DurationTier>,
    #[serde(default)]
    pub options: HashMap<String, Vec<TrafficOption>>,
}

/// A fully resolved plan selection, ready for the purchase coordinator.
#[derive(Debug, Clone)]
pub struct PlanSelection {
    pub duration_tier: u32,
    pub duration_name: String,
    pub duration_days: u32,
    pub traffic_gb: u32,
    pub price: i64,
    pub connections: u32,
}

impl Catalog {
    /// Load the catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self, PurchaseError> {
        let data =
            std::fs::read_to_string(path).map_err(|e| PurchaseError::Storage(e.to_string()))?;
        serde_json::from_str(&data)
            .map_err(|e| PurchaseError::Storage(format!("Failed to parse catalog: {e}")))
    }

    /// Resolve a (duration tier, traffic) pair into a plan selection.
    pub fn lookup(&self, duration_tier: u32, traffic_gb: u32) -> Option<PlanSelection> {
        let duration = self.durations.iter().find(|d| d.id == duration_tier)?;
        let option = self
            .options
            .get(&duration_tier.to_string())?
            .iter()
            .find(|o| o.traffic_gb == traffic_gb)?;

        Some(PlanSelection {
            duration_tier,
            duration_name: duration.name.clone(),
            duration_days: duration.days,
            traffic_gb: option.traffic_gb,
            price: option.price,
            connections: option.connections,
        })
    }

    /// Traffic options listed under a duration tier.
    pub fn options_for(&self, duration_tier: u32) -> &[TrafficOption] {
        self.options
            .get(&duration_tier.to_string())
            .map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        let mut options = HashMap::new();
        options.insert(
            "3".to_string(),
            vec![
                TrafficOption { traffic_gb: 30, price: 50_000, connections: 2 },
                TrafficOption { traffic_gb: 0, price: 120_000, connections: 0 },
            ],
        );
        Catalog {
            durations: vec![DurationTier { id: 3, name: "3 months".into(), days: 90 }],
            options,
        }
    }

    #[test]
    fn lookup_resolves_price_and_days() {
        let catalog = sample();
        let plan = catalog.lookup(3, 30).unwrap();
        assert_eq!(plan.duration_days, 90);
        assert_eq!(plan.price, 50_000);
        assert_eq!(plan.connections, 2);
    }

    #[test]
    fn lookup_unknown_tier_is_none() {
        let catalog = sample();
        assert!(catalog.lookup(6, 30).is_none());
        assert!(catalog.lookup(3, 999).is_none());
    }

    #[test]
    fn options_for_missing_duration_is_empty() {
        let catalog = sample();
        assert!(catalog.options_for(12).is_empty());
        assert_eq!(catalog.options_for(3).len(), 2);
    }

    #[test]
    fn load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, serde_json::to_string(&sample()).unwrap()).unwrap();

        let loaded = Catalog::load(&path).unwrap();
        assert_eq!(loaded.durations.len(), 1);
        assert!(loaded.lookup(3, 0).is_some());
    }
}
