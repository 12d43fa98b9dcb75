//! The synchronization barrier and authoritative parameter store.

use std::collections::HashMap;

use comms::tensor::Tensor;
use log::{debug, info};
use parking_lot::Mutex;

/// Progress report for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub workers_received: u32,
    pub aggregated: bool,
}

#[derive(Default)]
struct IterationState {
    worker_gradients: HashMap<u32, Vec<Tensor>>,
    aggregated: bool,
}

#[derive(Default)]
struct SyncState {
    iterations: HashMap<u64, IterationState>,
    current_iteration: u64,
}

/// Authoritative parameter store and per-iteration gradient barrier for a
/// fixed cohort of workers.
///
/// Two disjoint mutexes split the shared state: `state` guards the iteration
/// map and the high-water iteration, `params` guards the parameter set.
/// `receive_gradients` takes `params` only inside its `state` critical
/// section; no path takes the locks in the opposite order. Parameter reads
/// and status probes each touch a single lock, so neither queues behind
/// in-flight gradient bookkeeping.
pub struct AggregatorCore {
    total_workers: u32,
    params: Mutex<Vec<Tensor>>,
    state: Mutex<SyncState>,
}

impl AggregatorCore {
    /// Creates a core waiting on `total_workers` submissions per iteration.
    pub fn new(total_workers: u32) -> Self {
        Self {
            total_workers,
            params: Mutex::new(Vec::new()),
            state: Mutex::new(SyncState::default()),
        }
    }

    /// The fixed cohort size.
    pub fn total_workers(&self) -> u32 {
        self.total_workers
    }

    /// Installs the initial parameter set, replacing any prior one.
    pub fn initialize_parameters(&self, initial: Vec<Tensor>) {
        *self.params.lock() = initial;
    }

    /// Records a gradient submission and aggregates once the cohort is full.
    ///
    /// Returns `true` iff this submission completed the barrier and performed
    /// the averaging-and-update step. Re-submission by the same worker for
    /// the same iteration overwrites the prior gradients without advancing
    /// progress, and an iteration aggregates at most once.
    pub fn receive_gradients(
        &self,
        worker_id: u32,
        iteration: u64,
        gradients: Vec<Tensor>,
    ) -> bool {
        let mut state = self.state.lock();

        if iteration > state.current_iteration {
            state.current_iteration = iteration;
        }

        let entry = state.iterations.entry(iteration).or_default();
        entry.worker_gradients.insert(worker_id, gradients);

        debug!(
            "gradients recorded: worker_id={worker_id} iteration={iteration} received={}/{}",
            entry.worker_gradients.len(),
            self.total_workers
        );

        if entry.aggregated || entry.worker_gradients.len() < self.total_workers as usize {
            return false;
        }

        let reference = &entry.worker_gradients[&worker_id];
        let averaged = average(reference, &entry.worker_gradients, self.total_workers);

        {
            let mut params = self.params.lock();
            apply_update(&mut params, averaged);
        }

        entry.aggregated = true;
        info!(
            "aggregated iteration {iteration} across {} workers",
            self.total_workers
        );
        true
    }

    /// Deep copy of the current parameter set.
    ///
    /// Reads are not gated on any iteration having completed; callers that
    /// need a post-aggregation snapshot check the sync status first.
    pub fn serve_parameters(&self) -> Vec<Tensor> {
        self.params.lock().clone()
    }

    /// Progress of the given iteration, `(0, false)` if it was never seen.
    pub fn check_sync_status(&self, iteration: u64) -> SyncStatus {
        let state = self.state.lock();

        match state.iterations.get(&iteration) {
            Some(entry) => SyncStatus {
                workers_received: entry.worker_gradients.len() as u32,
                aggregated: entry.aggregated,
            },
            None => SyncStatus {
                workers_received: 0,
                aggregated: false,
            },
        }
    }

    /// Highest iteration index observed in any gradient submission.
    pub fn current_iteration(&self) -> u64 {
        self.state.lock().current_iteration
    }
}

/// Elementwise mean of the cohort's submissions, shaped by `reference` (the
/// submission that completed the barrier).
///
/// A submission lacking a position contributes nothing there; ragged payloads
/// truncate to the reference length. The divisor is always the cohort size,
/// keeping the result order-independent.
fn average(
    reference: &[Tensor],
    submissions: &HashMap<u32, Vec<Tensor>>,
    total_workers: u32,
) -> Vec<Tensor> {
    let scale = 1.0 / total_workers as f32;
    let mut averaged = Vec::with_capacity(reference.len());

    for (pos, proto) in reference.iter().enumerate() {
        let mut sum = vec![0.0f32; proto.data.len()];

        for gradients in submissions.values() {
            if let Some(tensor) = gradients.get(pos) {
                for (dst, src) in sum.iter_mut().zip(&tensor.data) {
                    *dst += src;
                }
            }
        }

        for v in &mut sum {
            *v *= scale;
        }

        averaged.push(Tensor::new(
            proto.name.clone(),
            proto.shape.clone(),
            sum,
            proto.dtype,
        ));
    }

    averaged
}

/// Applies the averaged update to the parameter set.
///
/// Empty parameters bootstrap from the update itself. Positions whose name or
/// shape disagree are skipped, ragged payloads truncate to the shorter
/// length. No learning rate is applied at this layer; submissions are treated
/// as pre-scaled updates.
fn apply_update(params: &mut Vec<Tensor>, update: Vec<Tensor>) {
    if params.is_empty() {
        *params = update;
        return;
    }

    for (param, grad) in params.iter_mut().zip(&update) {
        if !param.compatible_with(grad) {
            debug!("skipping incompatible update for tensor {}", param.name);
            continue;
        }

        for (p, g) in param.data.iter_mut().zip(&grad.data) {
            *p -= g;
        }
    }
}
