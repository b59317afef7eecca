//! Rolegate background worker.
//!
//! Keeps a warm role cache in step with the event bus, removes expired role
//! assignments on an interval and prunes stale cache entries.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use rolegate_application::{RoleCacheConfig, RoleService};
use rolegate_core::{AppError, AppResult};
use rolegate_infrastructure::{
    ConsoleNotificationSink, DEFAULT_ROLE_EVENT_CHANNEL, PostgresInstancePolicyProvider,
    PostgresModerationLogRepository, PostgresRoleRepository, PostgresUserStatsProvider,
    RedisRoleEventBus,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    redis_url: String,
    role_event_channel: String,
    role_cache_ttl_seconds: u64,
    sweep_interval_ms: u64,
    sweep_batch_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let redis_client = redis::Client::open(config.redis_url.as_str())
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
    let role_service = build_role_service(pool, redis_client, &config);

    let sync_handle = role_service.start_cache_sync().await?;
    info!(
        role_event_channel = %config.role_event_channel,
        role_cache_ttl_seconds = config.role_cache_ttl_seconds,
        sweep_interval_ms = config.sweep_interval_ms,
        sweep_batch_size = config.sweep_batch_size,
        "rolegate-worker started"
    );

    let mut interval = tokio::time::interval(Duration::from_millis(config.sweep_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                run_maintenance(&role_service, config.sweep_batch_size).await;
            }
        }
    }

    sync_handle.shutdown().await;
    role_service.clear_cache().await;
    info!("rolegate-worker stopped");

    Ok(())
}

async fn run_maintenance(role_service: &RoleService, sweep_batch_size: usize) {
    match role_service.sweep_expired_assignments(sweep_batch_size).await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "removed expired role assignments"),
        Err(error) => warn!(error = %error, "failed to sweep expired role assignments"),
    }

    let pruned = role_service.prune_cache().await;
    if pruned > 0 {
        info!(pruned, "pruned stale role cache entries");
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_role_service(
    pool: PgPool,
    redis_client: redis::Client,
    config: &WorkerConfig,
) -> RoleService {
    let repository = Arc::new(PostgresRoleRepository::new(pool.clone()));
    let user_stats = Arc::new(PostgresUserStatsProvider::new(pool.clone()));
    let event_bus = Arc::new(RedisRoleEventBus::new(
        redis_client,
        config.role_event_channel.clone(),
    ));

    RoleService::new(repository, user_stats, event_bus)
        .with_cache_config(RoleCacheConfig::with_ttl(Duration::from_secs(
            config.role_cache_ttl_seconds,
        )))
        .with_instance_policies(Arc::new(PostgresInstancePolicyProvider::new(pool.clone())))
        .with_moderation_log(Arc::new(PostgresModerationLogRepository::new(pool)))
        .with_notification_sink(Arc::new(ConsoleNotificationSink::new()))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = required_env("REDIS_URL")?;
        let role_event_channel = env::var("ROLE_EVENT_CHANNEL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE_EVENT_CHANNEL.to_owned());
        let role_cache_ttl_seconds = parse_env_u64("ROLE_CACHE_TTL_SECONDS", 3600)?;
        let sweep_interval_ms = parse_env_u64("ASSIGNMENT_SWEEP_INTERVAL_MS", 60_000)?;
        let sweep_batch_size = parse_env_usize("ASSIGNMENT_SWEEP_BATCH_SIZE", 500)?;

        if role_cache_ttl_seconds == 0 {
            return Err(AppError::Validation(
                "ROLE_CACHE_TTL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if sweep_interval_ms == 0 {
            return Err(AppError::Validation(
                "ASSIGNMENT_SWEEP_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        if sweep_batch_size == 0 {
            return Err(AppError::Validation(
                "ASSIGNMENT_SWEEP_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            redis_url,
            role_event_channel,
            role_cache_ttl_seconds,
            sweep_interval_ms,
            sweep_batch_size,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
