mod backfill;
mod cache;
mod config;
mod decode;
mod processor;
mod realtime;
mod registry;

use std::sync::Arc;
use std::time::Duration;

use config::IndexerConfig;
use hub_client::{HubClient, HubClientSettings, HubEndpoint};
use indexer_queue::{PostgresQueue, QueueName};
use miette::IntoDiagnostic;
use processor::{EventProcessor, ProcessEventJob, ProcessorSettings};
use realtime::RealtimeWorker;
use registry::TargetRegistry;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const HEALTHCHECK_INTERVAL: Duration = Duration::from_secs(60);
const CLAIM_POLL_INTERVAL: Duration = Duration::from_millis(500);
const MAX_JOB_ATTEMPTS: i32 = 5;
const BASE_BACKOFF: chrono::Duration = chrono::Duration::seconds(1);

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = IndexerConfig::config().into_diagnostic()?;

    info!("running pending migrations");
    indexer_db::run_migrations().into_diagnostic()?;

    let pool = indexer_db::get_pool(config.db_pool_size).into_diagnostic()?;

    let queue = Arc::new(PostgresQueue::new(pool.clone()));
    let registry = Arc::new(TargetRegistry::new(pool.clone(), queue.clone()));

    info!("bootstrapping target registry from SQL");
    registry.bootstrap().into_diagnostic()?;

    seed_strategy(&config, &registry).into_diagnostic()?;

    let shutdown = CancellationToken::new();

    let mut backfill_handles = Vec::new();
    for worker_index in 0..config.concurrency.backfill.max(1) {
        let worker_id = format!("backfill-{worker_index}");
        let hub = build_hub_client(&config);
        let pool = pool.clone();
        let queue = queue.clone();
        let registry = registry.clone();
        let shutdown = shutdown.clone();
        backfill_handles.push(tokio::spawn(async move {
            run_backfill_worker(worker_id, hub, pool, queue, registry, shutdown).await
        }));
    }

    let mut process_handles = Vec::new();
    let event_processor = Arc::new(EventProcessor::with_settings(
        pool.clone(),
        ProcessorSettings {
            batch_size: config.batch_size,
            batch_timeout: Duration::from_millis(config.batch_timeout_ms),
        },
    ));
    for worker_index in 0..2 {
        let worker_id = format!("process-event-{worker_index}");
        let queue = queue.clone();
        let processor = event_processor.clone();
        let shutdown = shutdown.clone();
        process_handles.push(tokio::spawn(async move {
            run_process_event_worker(worker_id, queue, processor, shutdown).await
        }));
    }

    let realtime_handle = {
        let realtime_hub = build_hub_client(&config);
        let worker = RealtimeWorker::new(realtime_hub, pool.clone(), queue.clone(), registry.clone());
        let shutdown = shutdown.clone();
        tokio::spawn(async move { worker.run(shutdown).await })
    };

    let healthcheck_handle = {
        let registry = registry.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { run_healthchecks(registry, shutdown).await })
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping workers");
    shutdown.cancel();

    for handle in backfill_handles {
        let _ = handle.await;
    }
    for handle in process_handles {
        let _ = handle.await;
    }
    if let Err(err) = realtime_handle.await {
        warn!("realtime worker task panicked: {err}");
    }
    let _ = healthcheck_handle.await;

    info!("flushing event processor buffers before exit");
    if let Err(err) = event_processor.shutdown().await {
        error!("final flush failed: {err}");
    }

    info!("shutdown complete");
    Ok(())
}

/// Builds a [`HubClient`] from the configured endpoint list, applying each
/// hub's `auth_header` as a per-request `Authorization` transform and the
/// configured rate-limit/retry/timeout tunables. Every worker gets its own
/// instance -- a `HubClient` serializes its own requests, so sharing one
/// across workers would serialize work that should run in parallel.
fn build_hub_client(config: &IndexerConfig) -> HubClient {
    let endpoints = config
        .hubs
        .iter()
        .map(|hub| match hub.auth_header.clone() {
            Some(header) => HubEndpoint::new(hub.url.clone())
                .with_transform(move |builder| builder.header("Authorization", header.clone())),
            None => HubEndpoint::new(hub.url.clone()),
        })
        .collect();
    let settings = HubClientSettings {
        min_request_spacing: Duration::from_millis(config.rate_limit_delay_ms),
        max_attempts: config.max_retries,
        request_timeout: Duration::from_millis(config.request_timeout_ms),
    };
    HubClient::with_settings(endpoints, settings)
}

/// Seeds configured root targets and client targets, idempotently --
/// `ensure` treats an already-present fid as a no-op rather than an error,
/// so this is safe to run on every startup.
fn seed_strategy(config: &IndexerConfig, registry: &TargetRegistry) -> Result<(), registry::RegistryError> {
    for &fid in &config.strategy.root_targets {
        registry.ensure(fid, true)?;
    }
    if config.strategy.enable_client_discovery {
        for &fid in &config.strategy.target_clients {
            registry.add_client_target(fid)?;
        }
    }
    Ok(())
}

/// Polls the backfill queue, claiming and running one job at a time per
/// worker -- `concurrency.backfill` separate tasks is what gives this the
/// parallelism, not any concurrency inside a single worker's loop.
async fn run_backfill_worker(
    worker_id: String,
    hub: HubClient,
    pool: indexer_db::ConnectionPool,
    queue: Arc<PostgresQueue>,
    registry: Arc<TargetRegistry>,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let claimed = queue.claim_next(QueueName::Backfill, &worker_id);
        let job = match claimed {
            Ok(Some(job)) => job,
            Ok(None) => {
                tokio::select! {
                    _ = tokio::time::sleep(CLAIM_POLL_INTERVAL) => {}
                    _ = shutdown.cancelled() => { break; }
                }
                continue;
            }
            Err(err) => {
                error!("{worker_id}: failed to claim backfill job: {err}");
                tokio::time::sleep(CLAIM_POLL_INTERVAL).await;
                continue;
            }
        };

        let parsed: Result<backfill::BackfillJob, _> = serde_json::from_value(job.payload.clone());
        let result = match parsed {
            Ok(parsed_job) => backfill::run_backfill_job(&parsed_job, &hub, &pool, &registry)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(format!("malformed backfill job payload: {err}")),
        };

        match result {
            Ok(()) => {
                debug!("{worker_id}: completed job {}", job.id);
                if let Err(err) = queue.complete(job.id) {
                    error!("{worker_id}: failed to mark job {} complete: {err}", job.id);
                }
            }
            Err(err) => {
                warn!("{worker_id}: job {} failed: {err}", job.id);
                if let Err(err) = queue.fail(job.id, MAX_JOB_ATTEMPTS, BASE_BACKOFF) {
                    error!("{worker_id}: failed to record failure for job {}: {err}", job.id);
                }
            }
        }
    }
}

/// Polls the process-event queue, handing each claimed job to the shared
/// [`EventProcessor`] -- multiple workers are safe here because the
/// processor's own buffers are mutex-guarded and inserts are conflict-safe.
async fn run_process_event_worker(
    worker_id: String,
    queue: Arc<PostgresQueue>,
    processor: Arc<EventProcessor>,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let claimed = queue.claim_next(QueueName::ProcessEvent, &worker_id);
        let job = match claimed {
            Ok(Some(job)) => job,
            Ok(None) => {
                tokio::select! {
                    _ = tokio::time::sleep(CLAIM_POLL_INTERVAL) => {}
                    _ = shutdown.cancelled() => { break; }
                }
                continue;
            }
            Err(err) => {
                error!("{worker_id}: failed to claim process-event job: {err}");
                tokio::time::sleep(CLAIM_POLL_INTERVAL).await;
                continue;
            }
        };

        let parsed: Result<ProcessEventJob, _> = serde_json::from_value(job.payload.clone());
        let result = match parsed {
            Ok(parsed_job) => processor.handle(&parsed_job).await.map_err(|err| err.to_string()),
            Err(err) => Err(format!("malformed process-event job payload: {err}")),
        };

        match result {
            Ok(()) => {
                if let Err(err) = queue.complete(job.id) {
                    error!("{worker_id}: failed to mark job {} complete: {err}", job.id);
                }
            }
            Err(err) => {
                warn!("{worker_id}: job {} failed: {err}", job.id);
                if let Err(err) = queue.fail(job.id, MAX_JOB_ATTEMPTS, BASE_BACKOFF) {
                    error!("{worker_id}: failed to record failure for job {}: {err}", job.id);
                }
            }
        }
    }
}

async fn run_healthchecks(registry: Arc<TargetRegistry>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(HEALTHCHECK_INTERVAL) => {
                if let Err(err) = registry.healthcheck() {
                    error!("registry healthcheck failed: {err}");
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

/// Waits for either SIGTERM or SIGINT, matching how the teacher's deployment
/// environment signals a graceful stop.
async fn wait_for_shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(err) => {
            warn!("failed to install SIGTERM handler: {err}");
            std::future::pending().await
        }
    };
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}
