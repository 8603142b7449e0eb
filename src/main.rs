use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use slotbook::config::{Config, Seed};
use slotbook::engine::{Engine, EngineError};
use slotbook::limits::MAX_GENERATION_DAYS;
use slotbook::model::Facility;
use slotbook::tenant::TenantManager;

/// Materialize slots for every active facility of one tenant, from today through
/// the end of each facility's booking window, then exit.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slotbook=info,warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    slotbook::observability::init(config.metrics_port);

    std::fs::create_dir_all(&config.data_dir)?;
    info!("slotbook materialization run");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  tenant: {}", config.tenant);
    info!(
        "  seed: {}",
        config
            .seed
            .as_deref()
            .map_or("none".to_string(), |p| p.display().to_string())
    );

    let tenants = TenantManager::new(PathBuf::from(&config.data_dir));
    let tenant = tenants.get_or_create(&config.tenant)?;

    if let Some(path) = &config.seed {
        Seed::load(path)?.apply(&tenant.directory)?;
    }

    let today = chrono::Utc::now().date_naive();
    let mut created = 0usize;
    let mut failed = 0usize;
    for facility in tenant.directory.facilities() {
        if !facility.is_active() {
            info!(facility_id = %facility.id, name = %facility.name, "skipping inactive facility");
            continue;
        }
        match materialize(&tenant.engine, &facility, today).await {
            Ok(count) => {
                info!(facility_id = %facility.id, name = %facility.name, created = count, "facility materialized");
                created += count;
            }
            Err(e) => {
                warn!(facility_id = %facility.id, name = %facility.name, error = %e, "slot generation failed");
                failed += 1;
            }
        }
    }

    tenant.store.compact_if_needed(config.compact_threshold).await?;
    tenant.engine.prune_locks();

    info!(
        created,
        failed,
        slots = tenant.store.state().slot_count(),
        bookings = tenant.store.state().booking_count(),
        "materialization finished"
    );
    if failed > 0 {
        return Err(format!("{failed} facilities failed to generate").into());
    }
    Ok(())
}

/// Generate `[today, window_end]` in chunks the engine accepts in one call.
async fn materialize(engine: &Engine, facility: &Facility, today: NaiveDate) -> Result<usize, EngineError> {
    let end = facility.policy.window_end(today);
    let mut created = 0;
    let mut start = today;
    while start <= end {
        let chunk_end = (start + Days::new(MAX_GENERATION_DAYS as u64 - 1)).min(end);
        created += engine.generate_slots(facility.id, start, chunk_end).await?.len();
        start = chunk_end + Days::new(1);
    }
    Ok(created)
}
