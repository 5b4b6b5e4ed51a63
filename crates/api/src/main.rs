use api::{routes, AppState, SessionHost};
use config::{AppConfig, LoggingConfig};
use database::Database;
use services::common::TracingNotifier;
use services::config_store::{ConfigStoreAdapter, FileCacheStore};
use services::enrichment::{
    EnrichmentPipeline, FunctionTransport, GraphDirectoryClient, InternalProfileTransport,
    ReverseProxyTransport, UpstreamDirectoryClient,
};
use services::session::FileUserStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Load configuration first to get logging settings
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Application cannot start without a valid configuration.");
        std::process::exit(1);
    });

    init_tracing(&config.logging);

    let database = Database::from_config(&config.database).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to connect to the database");
        std::process::exit(1);
    });

    if let Err(e) = database.run_migrations().await {
        tracing::error!(error = %e, "Failed to run database migrations");
        std::process::exit(1);
    }

    let cache = FileCacheStore::open(&config.cache.path).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to open the local identity cache");
        std::process::exit(1);
    });

    let notifier = Arc::new(TracingNotifier);
    let config_store = Arc::new(ConfigStoreAdapter::new(
        database.provider_configs.clone(),
        Arc::new(cache),
        notifier.clone(),
        Duration::from_secs(config.identity.config_load_timeout_secs),
    ));

    // Enrichment pipeline: directory first, then the two-tier internal
    // transports in fallback order
    let directory = GraphDirectoryClient::from_config(&config.directory).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid directory configuration");
        std::process::exit(1);
    });
    let tier_a = ReverseProxyTransport::from_config(&config.identity.origin, &config.internal_directory)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Invalid reverse-proxy configuration");
            std::process::exit(1);
        });
    let tier_b = FunctionTransport::from_config(&config.internal_directory).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid function-endpoint configuration");
        std::process::exit(1);
    });
    let transports: Vec<Arc<dyn InternalProfileTransport>> =
        vec![Arc::new(tier_a), Arc::new(tier_b)];

    let pipeline = Arc::new(EnrichmentPipeline::new(
        Arc::new(directory),
        database.user_profiles.clone(),
        database.internal_profiles.clone(),
        transports,
    ));

    let upstream = Arc::new(
        UpstreamDirectoryClient::from_config(&config.internal_directory).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Invalid upstream-directory configuration");
            std::process::exit(1);
        }),
    );

    let user_store = Arc::new(FileUserStore::new(
        PathBuf::from(&config.cache.path).with_file_name("session-user.json"),
    ));
    let sessions = Arc::new(SessionHost::new(
        &config.identity,
        user_store,
        pipeline,
        notifier,
    ));

    // Resolve config once at startup; the session manager stays quiescent
    // until valid values exist.
    sessions.reconfigure(&config_store.load().await).await;

    let state = AppState {
        config_store,
        upstream,
        sessions,
    };

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to bind {bind_address}");
            std::process::exit(1);
        });

    tracing::info!("Listening on {bind_address}");
    tracing::info!("Routes:");
    tracing::info!("  - GET  /v1/health");
    tracing::info!("  - GET  /v1/auth/login");
    tracing::info!("  - GET  /v1/auth/callback");
    tracing::info!("  - POST /v1/auth/logout");
    tracing::info!("  - GET  /v1/auth/session");
    tracing::info!("  - GET  /v1/auth/guard");
    tracing::info!("  - GET/POST /v1/auth-config");
    tracing::info!("  - GET  /v1/auth-config/check");
    tracing::info!("  - POST /v1/functions/fetch-internal-user");

    axum::serve(listener, app).await.unwrap();
}

fn init_tracing(logging_config: &LoggingConfig) {
    // Build the filter string from the logging configuration
    let mut filter = logging_config.level.clone();

    for (module, level) in &logging_config.modules {
        filter.push_str(&format!(",{}={}", module, level));
    }

    // Initialize tracing based on the format specified in config
    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        "pretty" => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
    }
}
