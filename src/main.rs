//! Dunning engine service.
//!
//! Wires adapters from configuration, starts the scheduler workers and the
//! HTTP API, and drains both on SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use http::HeaderValue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dunning_engine::adapters::events::LoggingEventPublisher;
use dunning_engine::adapters::gateway::{
    HttpGatewayConfig, HttpPaymentGateway, MockPaymentGateway, SignatureVerifier,
};
use dunning_engine::adapters::http::{dunning_router, DunningAppState};
use dunning_engine::adapters::memory::{
    InMemoryCampaignRepository, InMemoryCustomerStore, InMemoryLeaseManager,
    InMemoryProcessedEventStore, InMemoryRuleRepository, InMemoryWorkflowRepository,
    StaticConfigurationStore,
};
use dunning_engine::adapters::notifications::{
    LoggingDispatcher, WebhookDispatcherConfig, WebhookNotificationDispatcher,
};
use dunning_engine::adapters::postgres::{
    run_migrations, PostgresCampaignRepository, PostgresCustomerStore,
    PostgresProcessedEventStore, PostgresRuleRepository, PostgresWorkflowRepository,
};
use dunning_engine::adapters::redis::RedisLeaseManager;
use dunning_engine::adapters::settings::FileConfigurationStore;
use dunning_engine::application::{CoordinatorPorts, DunningCoordinator, Scheduler};
use dunning_engine::config::{AppConfig, LogFormat, ServerConfig};
use dunning_engine::domain::foundation::Timestamp;
use dunning_engine::ports::{
    CampaignRepository, ConfigurationStore, CustomerStore, DunningSettings, LeaseManager,
    NotificationDispatcher, PaymentGateway, ProcessedEventStore, RuleRepository,
    WorkflowRepository,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Processed-event keys older than this are pruned.
const DEDUPE_RETENTION_DAYS: i64 = 30;
const DEDUPE_PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

struct Stores {
    campaigns: Arc<dyn CampaignRepository>,
    rules: Arc<dyn RuleRepository>,
    workflows: Arc<dyn WorkflowRepository>,
    processed_events: Arc<dyn ProcessedEventStore>,
    customers: Arc<dyn CustomerStore>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let stores = build_stores(&config).await?;
    let leases = build_leases(&config).await?;
    let configuration = build_configuration(&config).await?;
    let gateway = build_gateway(&config)?;
    let dispatcher = build_dispatcher(&config)?;

    let coordinator = Arc::new(DunningCoordinator::new(
        CoordinatorPorts {
            campaigns: stores.campaigns.clone(),
            rules: stores.rules.clone(),
            workflows: stores.workflows.clone(),
            leases,
            processed_events: stores.processed_events.clone(),
            configuration,
            customers: stores.customers.clone(),
            gateway,
            dispatcher,
            publisher: Arc::new(LoggingEventPublisher::new()),
        },
        config.scheduler.lease_ttl(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut background: Vec<JoinHandle<()>> = Vec::new();

    for _ in 0..config.scheduler.workers {
        let scheduler = Scheduler::new(
            coordinator.clone(),
            stores.campaigns.clone(),
            config.scheduler.scheduler_config(),
        );
        let shutdown = shutdown_rx.clone();
        background.push(tokio::spawn(async move {
            if let Err(e) = scheduler.run(shutdown).await {
                tracing::error!(worker_id = %scheduler.worker_id(), error = %e, "scheduler stopped");
            }
        }));
    }
    background.push(tokio::spawn(prune_processed_events(
        stores.processed_events.clone(),
        shutdown_rx.clone(),
    )));

    let state = DunningAppState {
        coordinator,
        campaign_repository: stores.campaigns,
        rule_repository: stores.rules,
        workflow_repository: stores.workflows,
        signature_verifier: config
            .gateway
            .webhook_secret
            .clone()
            .map(|secret| Arc::new(SignatureVerifier::new(secret))),
    };
    if state.signature_verifier.is_none() {
        tracing::warn!("no gateway webhook secret configured, inbound events are not verified");
    }

    let app = dunning_router()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors_layer(&config.server))
        .with_state(state);

    let addr = config.server.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, workers = config.scheduler.workers, "dunning engine listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("http server stopped, draining schedulers");
    shutdown_tx.send(true).ok();
    let drain = futures::future::join_all(background);
    match tokio::time::timeout(config.server.shutdown_timeout(), drain).await {
        Ok(results) => {
            for e in results.into_iter().filter_map(Result::err) {
                tracing::error!(error = %e, "background task panicked");
            }
        }
        Err(_) => tracing::warn!("background tasks did not stop in time, abandoning in-flight ticks"),
    }
    tracing::info!("dunning engine shut down");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(server.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);
    match server.log_format() {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_stores(config: &AppConfig) -> Result<Stores, BoxError> {
    let Some(database) = &config.database else {
        tracing::warn!("no database configured, using in-memory stores");
        return Ok(Stores {
            campaigns: Arc::new(InMemoryCampaignRepository::new()),
            rules: Arc::new(InMemoryRuleRepository::new()),
            workflows: Arc::new(InMemoryWorkflowRepository::new()),
            processed_events: Arc::new(InMemoryProcessedEventStore::new()),
            customers: Arc::new(InMemoryCustomerStore::new()),
        });
    };

    let pool = database.connect().await?;
    if database.run_migrations {
        run_migrations(&pool).await?;
        tracing::info!("database migrations applied");
    }
    Ok(Stores {
        campaigns: Arc::new(PostgresCampaignRepository::new(pool.clone())),
        rules: Arc::new(PostgresRuleRepository::new(pool.clone())),
        workflows: Arc::new(PostgresWorkflowRepository::new(pool.clone())),
        processed_events: Arc::new(PostgresProcessedEventStore::new(pool.clone())),
        customers: Arc::new(PostgresCustomerStore::new(pool)),
    })
}

async fn build_leases(config: &AppConfig) -> Result<Arc<dyn LeaseManager>, BoxError> {
    match &config.redis {
        Some(redis) => {
            let conn = redis.connect().await?;
            Ok(Arc::new(RedisLeaseManager::new(conn, redis.lease_key_prefix.clone())))
        }
        None => {
            if config.scheduler.workers > 0 {
                tracing::warn!("no redis configured, leases are local to this process");
            }
            Ok(Arc::new(InMemoryLeaseManager::new()))
        }
    }
}

async fn build_configuration(config: &AppConfig) -> Result<Arc<dyn ConfigurationStore>, BoxError> {
    match &config.dunning.settings_path {
        Some(path) => Ok(Arc::new(FileConfigurationStore::open(path.clone()).await?)),
        None => Ok(Arc::new(StaticConfigurationStore::new(DunningSettings::default()))),
    }
}

fn build_gateway(config: &AppConfig) -> Result<Arc<dyn PaymentGateway>, BoxError> {
    let gateway = &config.gateway;
    match (&gateway.base_url, &gateway.api_key) {
        (Some(base_url), Some(api_key)) => Ok(Arc::new(HttpPaymentGateway::new(HttpGatewayConfig {
            base_url: base_url.clone(),
            api_key: api_key.clone(),
            timeout: gateway.timeout(),
        })?)),
        _ => {
            tracing::warn!("no payment gateway configured, retries are simulated and always decline");
            Ok(Arc::new(MockPaymentGateway::new()))
        }
    }
}

fn build_dispatcher(config: &AppConfig) -> Result<Arc<dyn NotificationDispatcher>, BoxError> {
    let notifications = &config.notifications;
    match &notifications.webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotificationDispatcher::new(WebhookDispatcherConfig {
            url: url.clone(),
            signing_secret: notifications.signing_secret.clone(),
            timeout: notifications.timeout(),
        })?)),
        None => Ok(Arc::new(LoggingDispatcher::new())),
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins()
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn prune_processed_events(
    store: Arc<dyn ProcessedEventStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(DEDUPE_PRUNE_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            _ = interval.tick() => {
                let cutoff = Timestamp::now().add_days(-DEDUPE_RETENTION_DAYS);
                match store.delete_before(cutoff).await {
                    Ok(0) => {}
                    Ok(deleted) => tracing::info!(deleted, "pruned processed event keys"),
                    Err(e) => tracing::warn!(error = %e, "processed event pruning failed"),
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
