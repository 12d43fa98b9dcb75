//! The application layer messages for both services.

use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Liveness status a worker reports to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Running,
    Error,
}

impl WorkerStatus {
    /// Compact code for lock-free storage in an atomic.
    pub fn code(self) -> u8 {
        match self {
            WorkerStatus::Idle => 0,
            WorkerStatus::Running => 1,
            WorkerStatus::Error => 2,
        }
    }

    /// Inverse of [`WorkerStatus::code`]; unknown codes decode as `Idle`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => WorkerStatus::Running,
            2 => WorkerStatus::Error,
            _ => WorkerStatus::Idle,
        }
    }
}

/// Registry-facing description of a worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub worker_id: u32,
    pub address: String,
    pub port: u16,
    pub hostname: String,
    pub status: WorkerStatus,
}

/// Requests served by the aggregator.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorRequest {
    PushGradients {
        worker_id: u32,
        iteration: u64,
        gradients: Vec<Tensor>,
    },
    PullParameters {
        worker_id: u32,
        iteration: u64,
    },
    CheckSyncStatus {
        iteration: u64,
    },
    SaveCheckpoint {
        epoch: u64,
        path: String,
    },
    LoadCheckpoint {
        path: String,
    },
}

/// Responses produced by the aggregator, one variant per request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorResponse {
    Push {
        success: bool,
        message: String,
        iteration: u64,
        aggregation_complete: bool,
        workers_received: u32,
        total_workers: u32,
    },
    Pull {
        iteration: u64,
        ready: bool,
        parameters: Vec<Tensor>,
    },
    SyncStatus {
        iteration: u64,
        ready: bool,
        workers_received: u32,
        total_workers: u32,
    },
    SaveCheckpoint {
        success: bool,
        message: String,
        checkpoint_path: String,
    },
    LoadCheckpoint {
        success: bool,
        message: String,
        epoch: u64,
        parameters: Vec<Tensor>,
    },
}

/// Requests served by the coordinator.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorRequest {
    RegisterWorker {
        worker_id: u32,
        address: String,
        port: u16,
        hostname: String,
    },
    Heartbeat {
        worker_id: u32,
        status: WorkerStatus,
    },
    ListWorkers,
    GetAggregatorAddress,
}

/// Responses produced by the coordinator, one variant per request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorResponse {
    Register {
        success: bool,
        message: String,
        aggregator_address: String,
        aggregator_port: u16,
        total_workers: u32,
    },
    Heartbeat {
        success: bool,
        timestamp: u64,
    },
    Workers {
        workers: Vec<WorkerInfo>,
        total_workers: u32,
    },
    AggregatorAddress {
        address: String,
        port: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for status in [
            WorkerStatus::Idle,
            WorkerStatus::Running,
            WorkerStatus::Error,
        ] {
            assert_eq!(WorkerStatus::from_code(status.code()), status);
        }
        assert_eq!(WorkerStatus::from_code(0xFF), WorkerStatus::Idle);
    }
}
