use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketd::authn::StaticAuthenticationManager;
use ticketd::cas::CentralAuthService;
use ticketd::config::{Config, RegistryBackend};
use ticketd::logout::http::ReqwestLogoutClient;
use ticketd::logout::LogoutManager;
use ticketd::registry::cleaner::start_registry_cleaner;
use ticketd::registry::memory::MemoryTicketRegistry;
use ticketd::registry::redb::RedbTicketRegistry;
use ticketd::registry::redis::RedisTicketRegistry;
use ticketd::registry::TicketRegistry;
use ticketd::services::InMemoryServicesManager;
use ticketd::ticket::expiration::ExpirationPolicy;
use ticketd::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "ticketd starting");

    // Load configuration
    let config = Config::load()?;

    // Build the ticket registry
    let registry: Arc<dyn TicketRegistry> = match config.registry.backend {
        RegistryBackend::Memory => Arc::new(MemoryTicketRegistry::new()),
        RegistryBackend::Redb => {
            let registry = RedbTicketRegistry::open(&config.registry.data_dir)?;
            info!("Ticket registry opened at: {}", config.registry.data_dir);
            Arc::new(registry)
        }
        RegistryBackend::Redis => {
            let url = config
                .registry
                .redis_url
                .as_deref()
                .expect("validated: REDIS_URL is set for the redis backend");
            Arc::new(RedisTicketRegistry::connect(url).await?)
        }
    };

    // External collaborators
    let authentication_manager = Arc::new(StaticAuthenticationManager::new(
        config.authn.users.clone(),
    ));
    let services_manager = Arc::new(InMemoryServicesManager::from_spec(
        &config.slo.services_spec,
    ));
    let http_client = Arc::new(ReqwestLogoutClient::new(Duration::from_secs(
        config.slo.http_timeout_seconds,
    ))?);

    let logout_manager = LogoutManager::new(
        services_manager,
        http_client,
        config.slo.disabled,
        config.slo.concurrency,
    );

    let cas = CentralAuthService::new(
        Arc::clone(&registry),
        authentication_manager,
        logout_manager,
        ExpirationPolicy::Sliding {
            max_time_to_live_seconds: config.tickets.tgt_max_time_to_live_seconds,
            time_to_idle_seconds: config.tickets.tgt_time_to_idle_seconds,
        },
        ExpirationPolicy::Hard {
            max_time_to_live_seconds: config.tickets.st_time_to_live_seconds,
        },
    );

    // Create shared state
    let state = Arc::new(AppState {
        cas,
        config: config.clone(),
    });

    // Start the background sweeper (a no-op for Redis, where the store's
    // TTL is the eviction authority)
    let cleaner_handle = start_registry_cleaner(
        Arc::clone(&registry),
        Duration::from_secs(config.tickets.cleanup_interval_seconds),
    );

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup: abort background tasks
    info!("Shutting down background tasks");
    cleaner_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
