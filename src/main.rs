use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lead_broker_api::auth;
use lead_broker_api::config::Config;
use lead_broker_api::db::Database;
use lead_broker_api::handlers::{self, AppState};
use lead_broker_api::ringba::RingbaClient;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool, and the Ringba
/// client, then starts the Axum server with rate limiting and a 10 MB body
/// limit. The `/vici` and `/admin` surfaces require the shared-secret
/// bearer token; `/webhook` and `/ringba` do not.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_broker_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool and run migrations
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Initialize Ringba client when credentials are present; ping triggers
    // return a configuration error otherwise.
    let ringba = match RingbaClient::from_config(&config) {
        Ok(Some(client)) => {
            tracing::info!("Ringba client initialized: {}", config.ringba_ping_url);
            Some(client)
        }
        Ok(None) => {
            tracing::warn!("Ringba client not configured; ping triggers disabled");
            None
        }
        Err(e) => {
            tracing::error!("Failed to initialize Ringba client: {}", e);
            None
        }
    };

    // Build application state
    let app_state = Arc::new(AppState {
        db: db.pool.clone(),
        config: config.clone(),
        ringba,
    });

    // Configure rate limiter per client IP
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Unauthenticated surfaces: lead intake and bid-partner postbacks
    let public_routes = Router::new()
        .route("/webhook/lead", post(handlers::receive_lead))
        .route("/webhook/stats", get(handlers::webhook_stats))
        .route("/ringba/postback", post(handlers::ringba_postback));

    // Dialer and admin surfaces behind the shared-secret bearer token
    let protected_routes = Router::new()
        .route("/vici/trigger-ping/:lead_id", post(handlers::trigger_ping))
        .route("/vici/lead/:lead_id", get(handlers::get_lead))
        .route("/admin/leads", get(handlers::admin_leads))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::require_bearer,
        ));

    let api_routes = public_routes.merge(protected_routes).layer(
        ServiceBuilder::new()
            // Request size limit: 10MB max payload
            .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024))
            // Rate limiting per client IP
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Lead broker API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM so in-flight requests can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, shutting down gracefully");
}
