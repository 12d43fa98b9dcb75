//! TCP service adapter exposing the aggregator core to workers.

use std::{io, path::Path, sync::Arc, time::Duration};

use comms::msg::{AggregatorRequest, AggregatorResponse};
use log::{debug, info, warn};
use tokio::{
    net::{TcpListener, TcpStream},
    task,
};

use crate::{checkpoint, core::AggregatorCore};

/// Shared service state handed to every connection task.
pub struct AggregatorService {
    core: AggregatorCore,
}

impl AggregatorService {
    pub fn new(core: AggregatorCore) -> Arc<Self> {
        Arc::new(Self { core })
    }

    pub fn core(&self) -> &AggregatorCore {
        &self.core
    }

    async fn dispatch(&self, request: AggregatorRequest) -> AggregatorResponse {
        match request {
            AggregatorRequest::PushGradients {
                worker_id,
                iteration,
                gradients,
            } => {
                let complete = self.core.receive_gradients(worker_id, iteration, gradients);
                let status = self.core.check_sync_status(iteration);

                AggregatorResponse::Push {
                    success: true,
                    message: "gradients received".to_string(),
                    iteration,
                    aggregation_complete: complete,
                    workers_received: status.workers_received,
                    total_workers: self.core.total_workers(),
                }
            }

            AggregatorRequest::PullParameters {
                worker_id,
                iteration,
            } => {
                debug!("serving parameters: worker_id={worker_id} iteration={iteration}");
                let parameters = self.core.serve_parameters();
                let status = self.core.check_sync_status(iteration);

                AggregatorResponse::Pull {
                    iteration,
                    ready: status.aggregated,
                    parameters,
                }
            }

            AggregatorRequest::CheckSyncStatus { iteration } => {
                let status = self.core.check_sync_status(iteration);

                AggregatorResponse::SyncStatus {
                    iteration,
                    ready: status.aggregated,
                    workers_received: status.workers_received,
                    total_workers: self.core.total_workers(),
                }
            }

            AggregatorRequest::SaveCheckpoint { epoch, path } => {
                let path = if path.is_empty() {
                    checkpoint::default_path(epoch)
                } else {
                    path
                };

                let params = self.core.serve_parameters();
                let save_path = path.clone();
                let result =
                    task::spawn_blocking(move || {
                        checkpoint::save(&params, epoch, Path::new(&save_path))
                    })
                    .await;

                match result {
                    Ok(Ok(())) => {
                        info!("saved checkpoint: {path} (epoch {epoch})");
                        AggregatorResponse::SaveCheckpoint {
                            success: true,
                            message: "checkpoint saved".to_string(),
                            checkpoint_path: path,
                        }
                    }
                    Ok(Err(e)) => {
                        warn!("failed to save checkpoint to {path}: {e}");
                        AggregatorResponse::SaveCheckpoint {
                            success: false,
                            message: e.to_string(),
                            checkpoint_path: String::new(),
                        }
                    }
                    Err(e) => AggregatorResponse::SaveCheckpoint {
                        success: false,
                        message: format!("checkpoint task failed: {e}"),
                        checkpoint_path: String::new(),
                    },
                }
            }

            AggregatorRequest::LoadCheckpoint { path } => {
                let load_path = path.clone();
                let result =
                    task::spawn_blocking(move || checkpoint::load(Path::new(&load_path))).await;

                match result {
                    Ok(Ok((epoch, parameters))) => {
                        self.core.initialize_parameters(parameters.clone());
                        info!("restored checkpoint from {path}: epoch={epoch}");
                        AggregatorResponse::LoadCheckpoint {
                            success: true,
                            message: "checkpoint loaded".to_string(),
                            epoch,
                            parameters,
                        }
                    }
                    Ok(Err(e)) => {
                        warn!("failed to load checkpoint from {path}: {e}");
                        AggregatorResponse::LoadCheckpoint {
                            success: false,
                            message: e.to_string(),
                            epoch: 0,
                            parameters: Vec::new(),
                        }
                    }
                    Err(e) => AggregatorResponse::LoadCheckpoint {
                        success: false,
                        message: format!("checkpoint task failed: {e}"),
                        epoch: 0,
                        parameters: Vec::new(),
                    },
                }
            }
        }
    }
}

/// Accepts connections on `listener` and serves each on its own task.
pub async fn serve(listener: TcpListener, service: Arc<AggregatorService>) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("accepted connection from {peer}");

        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, service).await {
                debug!("connection from {peer} closed: {e}");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, service: Arc<AggregatorService>) -> io::Result<()> {
    let (rx, tx) = stream.into_split();
    let (mut rx, mut tx) = comms::channel(rx, tx);

    loop {
        let request: AggregatorRequest = rx.recv().await?;
        let response = service.dispatch(request).await;
        tx.send(&response).await?;
    }
}

/// Periodically writes a checkpoint as training progresses.
///
/// Wakes every `poll_period`, derives the epoch from the highest observed
/// iteration and saves once per epoch advance. Iteration 0 is skipped. The
/// parameter copy is taken under the params lock; serialization and file I/O
/// happen on the blocking pool.
pub async fn run_periodic_checkpointer(
    service: Arc<AggregatorService>,
    checkpoint_interval: u64,
    poll_period: Duration,
) {
    let mut last_epoch: Option<u64> = None;

    loop {
        tokio::time::sleep(poll_period).await;

        let iteration = service.core.current_iteration();
        if iteration == 0 {
            continue;
        }

        let epoch = iteration / checkpoint_interval;
        if last_epoch.is_some_and(|last| epoch <= last) {
            continue;
        }

        let params = service.core.serve_parameters();
        let path = checkpoint::default_path(epoch);
        let save_path = path.clone();
        let result =
            task::spawn_blocking(move || checkpoint::save(&params, epoch, Path::new(&save_path)))
                .await;

        match result {
            Ok(Ok(())) => {
                info!("saved checkpoint: {path} (epoch {epoch})");
                last_epoch = Some(epoch);
            }
            Ok(Err(e)) => warn!("periodic checkpoint failed: {e}"),
            Err(e) => warn!("periodic checkpoint task failed: {e}"),
        }
    }
}
