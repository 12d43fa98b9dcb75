//! One-shot RPC clients for the coordinator and aggregator services.
//!
//! Every call opens a fresh connection, sends a single framed request and
//! awaits the single framed response, so a failed call never poisons a later
//! retry.

use std::io;

use comms::{
    msg::{
        AggregatorRequest, AggregatorResponse, CoordinatorRequest, CoordinatorResponse,
        WorkerInfo, WorkerStatus,
    },
    tensor::Tensor,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::net::TcpStream;

use crate::error::{Result, WorkerError};

/// Endpoint and cohort information returned at registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub aggregator_address: String,
    pub aggregator_port: u16,
    pub total_workers: u32,
}

/// Result of a gradient push.
#[derive(Debug, Clone, Copy)]
pub struct PushOutcome {
    pub aggregation_complete: bool,
    pub workers_received: u32,
    pub total_workers: u32,
}

/// Result of a sync-status probe.
#[derive(Debug, Clone, Copy)]
pub struct SyncProbe {
    pub ready: bool,
    pub workers_received: u32,
    pub total_workers: u32,
}

async fn call<Request, Response>(addr: &str, request: &Request) -> io::Result<Response>
where
    Request: Serialize,
    Response: DeserializeOwned,
{
    let stream = TcpStream::connect(addr).await?;
    let (rx, tx) = stream.into_split();
    let (mut rx, mut tx) = comms::channel(rx, tx);

    tx.send(request).await?;
    rx.recv().await
}

/// Client for the coordinator's membership service.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    addr: String,
}

impl CoordinatorClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Looks up the aggregator endpoint.
    pub async fn get_aggregator_address(&self) -> Result<(String, u16)> {
        match call(&self.addr, &CoordinatorRequest::GetAggregatorAddress).await? {
            CoordinatorResponse::AggregatorAddress { address, port } => Ok((address, port)),
            _ => Err(WorkerError::UnexpectedResponse {
                operation: "get_aggregator_address",
            }),
        }
    }

    /// Registers this worker, returning the authoritative aggregator endpoint.
    pub async fn register_worker(&self, info: &WorkerInfo) -> Result<Registration> {
        let request = CoordinatorRequest::RegisterWorker {
            worker_id: info.worker_id,
            address: info.address.clone(),
            port: info.port,
            hostname: info.hostname.clone(),
        };

        match call(&self.addr, &request).await? {
            CoordinatorResponse::Register {
                success: true,
                aggregator_address,
                aggregator_port,
                total_workers,
                ..
            } => Ok(Registration {
                aggregator_address,
                aggregator_port,
                total_workers,
            }),
            _ => Err(WorkerError::UnexpectedResponse {
                operation: "register_worker",
            }),
        }
    }

    /// Reports liveness. Returns `false` if the registration lapsed.
    pub async fn heartbeat(&self, worker_id: u32, status: WorkerStatus) -> Result<bool> {
        let request = CoordinatorRequest::Heartbeat { worker_id, status };

        match call(&self.addr, &request).await? {
            CoordinatorResponse::Heartbeat { success, .. } => Ok(success),
            _ => Err(WorkerError::UnexpectedResponse {
                operation: "heartbeat",
            }),
        }
    }
}

/// Client for the aggregator's training service.
#[derive(Debug, Clone)]
pub struct AggregatorClient {
    addr: String,
}

impl AggregatorClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Pulls the current parameter snapshot. Empty before initialization.
    pub async fn pull_parameters(&self, worker_id: u32, iteration: u64) -> Result<Vec<Tensor>> {
        let request = AggregatorRequest::PullParameters {
            worker_id,
            iteration,
        };

        match call(&self.addr, &request).await? {
            AggregatorResponse::Pull { parameters, .. } => Ok(parameters),
            _ => Err(WorkerError::UnexpectedResponse {
                operation: "pull_parameters",
            }),
        }
    }

    /// Pushes this worker's gradient contribution for `iteration`.
    pub async fn push_gradients(
        &self,
        worker_id: u32,
        iteration: u64,
        gradients: Vec<Tensor>,
    ) -> Result<PushOutcome> {
        let request = AggregatorRequest::PushGradients {
            worker_id,
            iteration,
            gradients,
        };

        match call(&self.addr, &request).await? {
            AggregatorResponse::Push {
                aggregation_complete,
                workers_received,
                total_workers,
                ..
            } => Ok(PushOutcome {
                aggregation_complete,
                workers_received,
                total_workers,
            }),
            _ => Err(WorkerError::UnexpectedResponse {
                operation: "push_gradients",
            }),
        }
    }

    /// Probes the barrier state for `iteration`.
    pub async fn check_sync_ready(&self, iteration: u64) -> Result<SyncProbe> {
        let request = AggregatorRequest::CheckSyncStatus { iteration };

        match call(&self.addr, &request).await? {
            AggregatorResponse::SyncStatus {
                ready,
                workers_received,
                total_workers,
                ..
            } => Ok(SyncProbe {
                ready,
                workers_received,
                total_workers,
            }),
            _ => Err(WorkerError::UnexpectedResponse {
                operation: "check_sync_ready",
            }),
        }
    }
}
