use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::engine::Engine;
use crate::limits::*;
use crate::notify::NotifyHub;
use crate::store::{InMemoryDirectory, WalStore};

/// One tenant's engine together with the stores behind it.
pub struct Tenant {
    pub engine: Arc<Engine>,
    pub store: Arc<WalStore>,
    pub directory: Arc<InMemoryDirectory>,
}

/// Manages per-tenant engines. Each tenant gets its own WAL and directory.
pub struct TenantManager {
    tenants: DashMap<String, Arc<Tenant>>,
    data_dir: PathBuf,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            tenants: DashMap::new(),
            data_dir,
        }
    }

    /// Get or lazily open the given tenant. Names that sanitize to the same
    /// WAL file name are the same tenant.
    pub fn get_or_create(&self, tenant: &str) -> std::io::Result<Arc<Tenant>> {
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }

        // Keep the WAL inside data_dir.
        let safe_name: String = tenant
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty tenant name",
            ));
        }

        if let Some(existing) = self.tenants.get(&safe_name) {
            return Ok(existing.value().clone());
        }
        if self.tenants.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many tenants"));
        }

        // Two callers racing on a new name must not open the WAL twice.
        let entry = self.tenants.entry(safe_name.clone());
        let opened = match entry {
            Entry::Occupied(e) => return Ok(e.get().clone()),
            Entry::Vacant(e) => {
                let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
                let store = Arc::new(WalStore::open(&wal_path)?);
                let directory = Arc::new(InMemoryDirectory::new());
                let engine = Engine::new(
                    store.clone(),
                    directory.clone(),
                    directory.clone(),
                    Arc::new(NotifyHub::new()),
                );
                let opened = Arc::new(Tenant {
                    engine: Arc::new(engine),
                    store,
                    directory,
                });
                e.insert(opened.clone());
                info!(tenant, wal = %wal_path.display(), "tenant opened");
                opened
            }
        };
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.tenants.len() as f64);
        Ok(opened)
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use chrono::{NaiveDate, NaiveTime};
    use ulid::Ulid;

    use crate::model::*;
    use crate::policy::{FacilityPolicy, OperatingHours};

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotbook_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn facility(id: Ulid) -> Facility {
        Facility {
            id,
            name: "Court".into(),
            status: FacilityStatus::Active,
            policy: FacilityPolicy {
                min_booking_minutes: 60,
                max_booking_minutes: 60,
                buffer_minutes: 0,
                booking_window_days: 730,
                requires_subscription: false,
                operating_hours: (1..=7)
                    .map(|d| {
                        OperatingHours::open(
                            d,
                            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                            NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                        )
                    })
                    .collect(),
            },
        }
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let dir = test_data_dir("isolation");
        let tm = TenantManager::new(dir);

        let a = tm.get_or_create("tenant_a").unwrap();
        let b = tm.get_or_create("tenant_b").unwrap();

        // Same facility id registered in both tenants.
        let fid = Ulid::new();
        a.directory.upsert_facility(facility(fid)).unwrap();
        b.directory.upsert_facility(facility(fid)).unwrap();

        let date = chrono::Utc::now().date_naive() + chrono::Days::new(1);
        let created = a.engine.generate_slots(fid, date, date).await.unwrap();
        assert_eq!(created.len(), 2);

        let in_b = b
            .engine
            .list_slots(fid, SlotQuery::Date(date), false)
            .await
            .unwrap();
        assert!(in_b.is_empty());
    }

    #[tokio::test]
    async fn tenant_unknown_facility_in_other_tenant() {
        let dir = test_data_dir("unknown_facility");
        let tm = TenantManager::new(dir);
        let a = tm.get_or_create("a").unwrap();
        let b = tm.get_or_create("b").unwrap();

        let fid = Ulid::new();
        a.directory.upsert_facility(facility(fid)).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let result = b.engine.list_slots(fid, SlotQuery::Date(date), false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tenant_lazy_creation() {
        let dir = test_data_dir("lazy");
        let tm = TenantManager::new(dir.clone());

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());
        assert!(tm.is_empty());

        let _tenant = tm.get_or_create("my_club").unwrap();
        assert!(dir.join("my_club.wal").exists());
        assert_eq!(tm.len(), 1);
    }

    #[tokio::test]
    async fn tenant_same_instance_returned() {
        let dir = test_data_dir("same_instance");
        let tm = TenantManager::new(dir);

        let t1 = tm.get_or_create("foo").unwrap();
        let t2 = tm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&t1, &t2));
        assert!(Arc::ptr_eq(&t1.engine, &t2.engine));
    }

    #[tokio::test]
    async fn tenant_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let tm = TenantManager::new(dir.clone());

        let _tenant = tm.get_or_create("../evil").unwrap();
        assert!(dir.join("evil.wal").exists());

        let result = tm.get_or_create("../..");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn names_sharing_a_wal_share_a_tenant() {
        let dir = test_data_dir("shared_wal");
        let tm = TenantManager::new(dir.clone());

        let dotted = tm.get_or_create("club.a").unwrap();
        let plain = tm.get_or_create("cluba").unwrap();
        assert!(Arc::ptr_eq(&dotted, &plain));
        assert!(Arc::ptr_eq(&dotted.store, &plain.store));
        assert_eq!(tm.len(), 1);
        assert!(dir.join("cluba.wal").exists());

        let fid = Ulid::new();
        dotted.directory.upsert_facility(facility(fid)).unwrap();
        let date = chrono::Utc::now().date_naive() + chrono::Days::new(1);
        let created = dotted.engine.generate_slots(fid, date, date).await.unwrap();
        let seen = plain
            .engine
            .list_slots(fid, SlotQuery::Date(date), false)
            .await
            .unwrap();
        assert_eq!(seen, created);
    }

    #[tokio::test]
    async fn tenant_name_too_long() {
        let dir = test_data_dir("name_too_long");
        let tm = TenantManager::new(dir);

        let long_name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        let err = tm.get_or_create(&long_name).err().unwrap();
        assert!(err.to_string().contains("tenant name too long"));
    }

    #[tokio::test]
    async fn tenant_count_limit() {
        let dir = test_data_dir("count_limit");
        let tm = TenantManager::new(dir);

        for i in 0..MAX_TENANTS {
            tm.get_or_create(&format!("t{i}")).unwrap();
        }
        let err = tm.get_or_create("one_more").err().unwrap();
        assert!(err.to_string().contains("too many tenants"));
    }
}
