//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here.

use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use studio_crm::adapters::gateway::{CachedGateway, RestGateway, SnapshotGateway};
use studio_crm::adapters::ui::tui::TuiInputPort;
use studio_crm::ports::{DataGateway, InputPort};
use studio_crm::shared::AppConfig;
use studio_crm::usecases::{DashboardService, DashboardWatcher, PaymentService, PricingService};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "invalid configuration, using defaults");
        AppConfig::default()
    });

    // --- Backend: hosted REST when configured, otherwise the local JSON snapshot ---
    let (backend, source): (Arc<dyn DataGateway>, String) = if cfg.is_backend_configured() {
        let url = cfg.backend_url.clone().unwrap_or_default();
        let gateway = RestGateway::new(
            &url,
            cfg.backend_key.clone().unwrap_or_default(),
            cfg.bearer_token().unwrap_or_default(),
            Duration::from_secs(cfg.request_timeout_secs_or_default()),
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?;
        if cfg.access_token.is_none() {
            warn!("CRM_ACCESS_TOKEN not set; requests use the API key role");
        }
        info!(url = %url, "using REST backend");
        (Arc::new(gateway), url)
    } else {
        let path = cfg.snapshot_path_or_default();
        let gateway = SnapshotGateway::new(&path);
        gateway.load().await.map_err(|e| anyhow::anyhow!("{}", e))?;
        warn!(path = %path, "CRM_BACKEND_URL / CRM_BACKEND_KEY not set, using local snapshot");
        (Arc::new(gateway), path)
    };

    studio_crm::adapters::ui::init_ui(&source);

    let cache_ttl_secs = cfg.cache_ttl_secs_or_default();
    info!(cache_ttl_secs, "cache TTL: {} s", cache_ttl_secs);
    let gateway = Arc::new(CachedGateway::new(
        backend,
        Duration::from_secs(cache_ttl_secs),
    ));
    let data: Arc<dyn DataGateway> = Arc::clone(&gateway) as Arc<dyn DataGateway>;

    // --- Services ---
    let dashboard = Arc::new(DashboardService::new(Arc::clone(&data)));
    let pricing = Arc::new(PricingService::new(Arc::clone(&data)));
    let payments = Arc::new(PaymentService::new(Arc::clone(&data)));

    let refresh_secs = cfg.refresh_secs_or_default();
    let watcher = Arc::new(DashboardWatcher::new(
        Arc::clone(&dashboard),
        Duration::from_secs(refresh_secs),
    ));

    let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(
        gateway,
        dashboard,
        pricing,
        payments,
        watcher,
        PathBuf::from(cfg.export_dir_or_default()),
    ));

    // --- Run (main menu) ---
    input_port
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
