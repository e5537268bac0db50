use profile_service::{
    AppState, build_router,
    config::ProfileConfig,
    db,
    services::{
        Collaborators, ConfigCache, ConfigRefresher, Database, Decryptor, ExternalIdentityStore,
        HttpDecryptor, HttpLocationSearch, LocationSearch, ManagedTokenService, ProfileReadService,
        ProfileStore, RedisService, SnapshotStore, TokenIssuer,
    },
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = ProfileConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    profile_service::services::metrics::init_metrics()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to init metrics: {}", e)))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting profile service"
    );

    let pool = db::create_pool(&config.database).await?;
    if config.database.run_migrations {
        db::run_migrations(&pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
    }
    let database = Arc::new(Database::new(pool));
    tracing::info!("Database initialized successfully");

    let redis: Arc<dyn ConfigCache> = Arc::new(
        RedisService::new(&config.redis)
            .await
            .map_err(AppError::InternalError)?,
    );
    tracing::info!("Redis service initialized");

    let search: Arc<dyn LocationSearch> =
        Arc::new(HttpLocationSearch::new(&config.search).map_err(AppError::ConfigError)?);
    let decryptor: Arc<dyn Decryptor> =
        Arc::new(HttpDecryptor::new(&config.decryption).map_err(AppError::ConfigError)?);
    let tokens: Arc<dyn TokenIssuer> =
        Arc::new(ManagedTokenService::new(&config.managed_token).map_err(AppError::ConfigError)?);
    tracing::info!("Collaborator clients initialized");

    let snapshots = Arc::new(SnapshotStore::new());
    let refresher = ConfigRefresher::new(
        redis.clone(),
        snapshots.clone(),
        Duration::from_secs(config.config_refresh_seconds),
    );
    match refresher.refresh_once().await {
        Ok(version) => tracing::info!(version, "Configuration snapshot loaded"),
        Err(e) => tracing::warn!(error = %e, "Initial configuration load failed, starting empty"),
    }
    let _refresh_task = refresher.spawn();

    let profiles: Arc<dyn ProfileStore> = database.clone();
    let identities: Arc<dyn ExternalIdentityStore> = database;
    let state = AppState {
        config: config.clone(),
        profiles: ProfileReadService::new(Collaborators {
            profiles: profiles.clone(),
            identities,
            search,
            decryptor,
            tokens,
            snapshots,
        }),
        store: profiles,
        cache: redis,
    };

    let app = build_router(state);

    let addr = config.common.bind_address();

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
