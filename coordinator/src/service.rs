//! TCP service adapter and eviction sweep for the coordinator.

use std::{
    io,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use comms::msg::{CoordinatorRequest, CoordinatorResponse, WorkerInfo, WorkerStatus};
use log::{debug, info};
use tokio::net::{TcpListener, TcpStream};

use crate::registry::Registry;

/// Timing knobs for the liveness sweep.
///
/// The stale timeout must exceed the worker heartbeat period by at least 5x
/// so a single delayed heartbeat never evicts a live worker.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub sweep_interval: Duration,
    pub stale_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            stale_timeout: Duration::from_secs(30),
        }
    }
}

/// Accepts connections on `listener` and serves each on its own task.
pub async fn serve(listener: TcpListener, registry: Arc<Registry>) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("accepted connection from {peer}");

        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, registry).await {
                debug!("connection from {peer} closed: {e}");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, registry: Arc<Registry>) -> io::Result<()> {
    let (rx, tx) = stream.into_split();
    let (mut rx, mut tx) = comms::channel(rx, tx);

    loop {
        let request: CoordinatorRequest = rx.recv().await?;
        let response = dispatch(&registry, request);
        tx.send(&response).await?;
    }
}

fn dispatch(registry: &Registry, request: CoordinatorRequest) -> CoordinatorResponse {
    match request {
        CoordinatorRequest::RegisterWorker {
            worker_id,
            address,
            port,
            hostname,
        } => {
            let info = WorkerInfo {
                worker_id,
                address,
                port,
                hostname,
                status: WorkerStatus::Idle,
            };

            let (aggregator_address, aggregator_port, total_workers) =
                registry.register_worker(info);
            info!("registered worker {worker_id} ({total_workers} total)");

            CoordinatorResponse::Register {
                success: true,
                message: "worker registered".to_string(),
                aggregator_address,
                aggregator_port,
                total_workers,
            }
        }

        CoordinatorRequest::Heartbeat { worker_id, status } => {
            let success = registry.heartbeat(worker_id, status);
            if !success {
                debug!("heartbeat from unregistered worker {worker_id}");
            }

            CoordinatorResponse::Heartbeat {
                success,
                timestamp: unix_timestamp(),
            }
        }

        CoordinatorRequest::ListWorkers => {
            let workers = registry.list_workers();
            let total_workers = workers.len() as u32;

            CoordinatorResponse::Workers {
                workers,
                total_workers,
            }
        }

        CoordinatorRequest::GetAggregatorAddress => {
            let (address, port) = registry.aggregator_address();
            CoordinatorResponse::AggregatorAddress { address, port }
        }
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Evicts stale workers on a fixed cadence for as long as the coordinator
/// runs.
pub async fn run_eviction_sweep(registry: Arc<Registry>, config: CoordinatorConfig) {
    loop {
        tokio::time::sleep(config.sweep_interval).await;

        let evicted = registry.remove_stale(config.stale_timeout);
        if evicted > 0 {
            info!("evicted {evicted} stale workers");
        }
    }
}
