pub mod api;
pub mod core;
pub mod error;
pub mod models;
pub mod settings;
pub mod storage;

use std::path::Path;
use std::sync::{Arc, RwLock as StdRwLock};

use tokio::sync::RwLock;

use crate::core::hooks::{self, PublishedState, SharedPublished};
use crate::core::AdminEngine;
use crate::models::SectionId;
use crate::settings::{BackendSettings, Settings};
use crate::storage::file::FileBackend;
use crate::storage::http::HttpAdminClient;
use crate::storage::{AdminBackend, EndpointProber};

const SETTINGS_FILE: &str = "admin-sync.json";

fn build_collaborators(
    settings: &Settings,
) -> error::Result<(Arc<dyn AdminBackend>, Arc<dyn EndpointProber>)> {
    let Some(probe_url) = settings.probe_url() else {
        return Err(error::SyncError::Load(
            "file backend requires probe_base_url for endpoint probing".to_string(),
        ));
    };
    let prober = Arc::new(HttpAdminClient::new(probe_url, settings.request_timeout())?);

    let backend: Arc<dyn AdminBackend> = match &settings.backend {
        BackendSettings::Http { base_url } if settings.probe_base_url.is_none() => {
            tracing::info!(%base_url, "using remote admin service");
            prober.clone()
        }
        BackendSettings::Http { base_url } => {
            tracing::info!(%base_url, "using remote admin service");
            Arc::new(HttpAdminClient::new(base_url, settings.request_timeout())?)
        }
        BackendSettings::File { path } => {
            tracing::info!(path = ?path, "using local admin data file");
            Arc::new(FileBackend::new(path))
        }
    };
    Ok((backend, prober as Arc<dyn EndpointProber>))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let settings = Settings::load(Path::new(SETTINGS_FILE)).with_env();

    let (backend, prober) = match build_collaborators(&settings) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Failed to initialize: {}", e);
            std::process::exit(1);
        }
    };

    let published: SharedPublished = Arc::new(StdRwLock::new(PublishedState::default()));
    let flags_hook = hooks::feature_flag_hook(published.clone(), settings.user_email.clone());
    let models_hook = hooks::supported_models_hook(published.clone());

    let mut engine = AdminEngine::new(backend, prober, settings.load_options());
    engine.register_hook(SectionId::FeatureFlags, flags_hook.clone());
    engine.register_hook(SectionId::SupportedModels, models_hook.clone());

    if let Err(e) = engine.load().await {
        eprintln!("Failed to load admin configurations: {}", e);
        std::process::exit(1);
    }
    // 启动时按已加载的数据发布一次
    flags_hook(engine.state());
    models_hook(engine.state());

    let progress = engine.subscribe_progress();
    let state = api::AppState {
        engine: Arc::new(RwLock::new(engine)),
        published,
        progress,
    };
    let app = api::create_router(state);

    let listener = match tokio::net::TcpListener::bind(&settings.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", settings.listen_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %settings.listen_addr, "admin config sync listening");

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
