//! HTTP server implementation

use std::sync::Arc;

use tower_http::compression::CompressionLayer;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use tracing::info;

use crate::api::handlers::AppState;
use crate::api::routes;
use crate::channels::ChannelService;
use crate::channels::MessengerClient;
use crate::channels::TelegramClient;
use crate::config::AppConfig;
use crate::database::Database;
use crate::memory::InMemoryStore;
use crate::memory::MemoryStore;
use crate::rag::RagService;
use crate::rate_limit::InMemoryRateLimiter;
use crate::retry::build_http_client;
use crate::retry::RetryPolicy;
use crate::Result;

/// Wire the production services: PostgreSQL, configured providers, Graph API
/// and Bot API clients
///
/// With `ephemeral_memory` conversations are kept in process memory instead
/// of the database.
pub async fn build_state(config: Arc<AppConfig>, ephemeral_memory: bool) -> Result<AppState> {
    let database = Arc::new(Database::from_config(&config).await?);
    database.verify_schema_or_error().await?;

    let rag = Arc::new(RagService::new(&config, database.clone())?);

    let http = build_http_client(&config.http)?;
    let retry = RetryPolicy::from_config(&config.http);
    let messenger = Arc::new(MessengerClient::new(http.clone(), &config.messenger, retry));
    let telegram = Arc::new(TelegramClient::new(http, &config.telegram, retry));

    let memory: Arc<dyn MemoryStore> = if ephemeral_memory {
        info!("Conversation memory is ephemeral");
        Arc::new(InMemoryStore::new())
    } else {
        database.clone()
    };

    let limiter = InMemoryRateLimiter::from_config(&config.rate_limit);
    drop(limiter.spawn_cleanup());

    let channels = ChannelService::new(
        database,
        memory,
        rag,
        Arc::new(limiter),
        messenger,
        telegram,
        &config.rag,
    );
    Ok(AppState::new(config, channels))
}

/// Start the API server and run until Ctrl+C or SIGTERM
pub async fn serve_api(state: AppState) -> Result<()> {
    info!("Starting shoprag server...");

    let server = state.config.server.clone();
    let mut app = routes::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if server.enable_cors {
        info!("CORS enabled");
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  GET    /webhooks/messenger          - Messenger verification");
    info!("  POST   /webhooks/messenger          - Messenger events");
    info!("  POST   /webhooks/telegram/:secret   - Telegram updates");
    info!("  GET    /api/health                  - Health check");
    info!("  POST   /api/rag/query               - RAG query");
    info!("  DELETE /api/memory/:owner_id        - Clear conversation memory");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
