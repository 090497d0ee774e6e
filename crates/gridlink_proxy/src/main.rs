use axum::http::{header, HeaderValue, Method};
use gridlink_proxy::{proxy_routes, Config, PlatformUpstream, ProxyState};
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridlink_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting Gridlink proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("Upstream: {}", config.upstream_base_url);
    info!("Allowed tables: {:?}", config.allowed_tables);
    info!("CORS origins: {:?}", config.cors_origins);
    if !config.links_configured() {
        info!("Record tokens disabled (no signing key configured)");
    }

    let upstream = Arc::new(PlatformUpstream::new(
        config.upstream_base_url.clone(),
        config.upstream_api_key.clone(),
        config.doc_id.clone(),
    ));
    let state = ProxyState::new(config.clone(), upstream);

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = proxy_routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Listening on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_err() {
        error!("Failed to install ctrl-c handler");
    }
    info!("Shutting down");
}
