use std::error::Error;
use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use realtime_gateway::adapters::auth::{InMemoryUserDirectory, JwtAccessTokenVerifier, JwtConfig};
use realtime_gateway::adapters::notification_store::RedisNotificationStore;
use realtime_gateway::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig};
use realtime_gateway::adapters::websocket::{gateway_router, ConnectionGateway, GatewayConfig};
use realtime_gateway::application::{NotificationQueue, NotificationQueueConfig};
use realtime_gateway::config::{AppConfig, LogFormat, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let mut jwt = JwtConfig::new(config.auth.jwt_secret.clone());
    jwt.leeway_secs = config.auth.jwt_leeway_secs;
    if let Some(issuer) = &config.auth.jwt_issuer {
        jwt = jwt.with_issuer(issuer.clone());
    }

    let directory = InMemoryUserDirectory::new();
    for user in config.auth.directory_users()? {
        directory.add_user(user);
    }
    if directory.user_count() == 0 {
        tracing::warn!("User directory is empty, every handshake will be rejected");
    }

    let store = RedisNotificationStore::new(redis::Client::open(config.redis.url.as_str())?);
    match tokio::time::timeout(config.redis.timeout(), store.connect()).await {
        Ok(Ok(())) => tracing::info!("Connected to Redis"),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Redis unavailable, offline notifications are dropped until it recovers")
        }
        Err(_) => tracing::warn!(
            timeout_secs = config.redis.timeout_secs,
            "Redis connect timed out, offline notifications are dropped until it recovers"
        ),
    }

    let queue = NotificationQueue::new(
        Arc::new(store),
        NotificationQueueConfig {
            ttl: config.realtime.notification_ttl(),
            store_timeout: config.realtime.store_timeout(),
        },
    );

    let gateway = Arc::new(ConnectionGateway::new(
        Arc::new(JwtAccessTokenVerifier::new(jwt)),
        Arc::new(directory),
        Arc::new(InMemoryRateLimiter::new(RateLimitConfig::new(
            config.realtime.rate_limit_max_events,
            config.realtime.rate_limit_window_secs,
        ))),
        queue,
        GatewayConfig {
            outbound_buffer: config.realtime.outbound_buffer,
        },
    ));

    let app = gateway_router(gateway.clone())
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "realtime gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(gateway))
        .await?;

    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn shutdown_signal(gateway: Arc<ConnectionGateway>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received");
    gateway.shutdown().await;
}
