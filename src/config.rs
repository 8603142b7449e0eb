use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::engine::EngineError;
use crate::model::Facility;
use crate::store::{InMemoryDirectory, Member};

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_TENANT: &str = "default";
const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;

/// Process settings, read from `SLOTBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub tenant: String,
    pub seed: Option<PathBuf>,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            tenant: DEFAULT_TENANT.into(),
            seed: None,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("SLOTBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            tenant: lookup("SLOTBOOK_TENANT").unwrap_or(defaults.tenant),
            seed: lookup("SLOTBOOK_SEED").map(PathBuf::from),
            compact_threshold: lookup("SLOTBOOK_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
            metrics_port: lookup("SLOTBOOK_METRICS_PORT").and_then(|s| s.parse().ok()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("cannot read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed seed file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid facility {name}: {source}")]
    Facility { name: String, source: EngineError },
}

/// Facilities and members to preload into a tenant's directory.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Seed {
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Insert everything into `directory`. Stops at the first invalid facility.
    pub fn apply(self, directory: &InMemoryDirectory) -> Result<(), SeedError> {
        for facility in self.facilities {
            let name = facility.name.clone();
            directory
                .upsert_facility(facility)
                .map_err(|source| SeedError::Facility { name, source })?;
        }
        for member in self.members {
            directory.add_member(member);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::store::{FacilityDirectory, MemberDirectory};

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), Config::default());
    }

    #[test]
    fn reads_every_variable() {
        let cfg = config(&[
            ("SLOTBOOK_DATA_DIR", "/var/lib/slotbook"),
            ("SLOTBOOK_TENANT", "club_north"),
            ("SLOTBOOK_SEED", "/etc/slotbook/seed.json"),
            ("SLOTBOOK_COMPACT_THRESHOLD", "50"),
            ("SLOTBOOK_METRICS_PORT", "9100"),
        ]);
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/slotbook"));
        assert_eq!(cfg.tenant, "club_north");
        assert_eq!(cfg.seed, Some(PathBuf::from("/etc/slotbook/seed.json")));
        assert_eq!(cfg.compact_threshold, 50);
        assert_eq!(cfg.metrics_port, Some(9100));
    }

    #[test]
    fn bad_numbers_fall_back() {
        let cfg = config(&[
            ("SLOTBOOK_COMPACT_THRESHOLD", "lots"),
            ("SLOTBOOK_METRICS_PORT", "99999"),
        ]);
        assert_eq!(cfg.compact_threshold, DEFAULT_COMPACT_THRESHOLD);
        assert_eq!(cfg.metrics_port, None);
    }

    const SEED: &str = r#"{
        "facilities": [{
            "id": "01J5Z8Q0000000000000000001",
            "name": "Court 1",
            "status": "ACTIVE",
            "policy": {
                "min_booking_minutes": 60,
                "max_booking_minutes": 120,
                "booking_window_days": 14,
                "operating_hours": [
                    {"day_of_week": 1, "open_time": "09:00:00", "close_time": "12:00:00"},
                    {"day_of_week": 7, "open_time": "00:00:00", "close_time": "00:00:00", "is_closed": true}
                ]
            }
        }],
        "members": [
            {"id": "01J5Z8Q00000000000000000M1", "subscriptions": ["01J5Z8Q0000000000000000001"]},
            {"id": "01J5Z8Q00000000000000000M2"}
        ]
    }"#;

    #[tokio::test]
    async fn seed_loads_into_directory() {
        let seed = Seed::parse(SEED).unwrap();
        assert_eq!(seed.facilities.len(), 1);
        assert_eq!(seed.facilities[0].policy.buffer_minutes, 0);

        let facility_id = seed.facilities[0].id;
        let subscriber = seed.members[0].id;
        let plain = seed.members[1].id;
        let dir = InMemoryDirectory::new();
        seed.apply(&dir).unwrap();

        assert!(dir.get_facility(facility_id).await.unwrap().is_some());
        assert!(dir.member_exists(plain).await.unwrap());
        assert!(dir.has_active_subscription(subscriber, facility_id).await.unwrap());
        assert!(!dir.has_active_subscription(plain, facility_id).await.unwrap());
    }

    #[test]
    fn seed_with_bad_policy_rejected() {
        let bad = SEED.replace("\"min_booking_minutes\": 60", "\"min_booking_minutes\": 0");
        let seed = Seed::parse(&bad).unwrap();
        let err = seed.apply(&InMemoryDirectory::new()).unwrap_err();
        assert!(matches!(err, SeedError::Facility { ref name, .. } if name == "Court 1"));
    }

    #[test]
    fn malformed_seed_rejected() {
        assert!(matches!(Seed::parse("{\"facilities\": 3}"), Err(SeedError::Json(_))));
    }
}
