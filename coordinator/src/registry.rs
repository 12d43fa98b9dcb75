//! The worker membership registry.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use comms::msg::{WorkerInfo, WorkerStatus};
use parking_lot::Mutex;

/// A registered worker plus its liveness stamp.
#[derive(Debug, Clone)]
struct RegistryEntry {
    info: WorkerInfo,
    last_heartbeat: Instant,
}

/// Membership registry with heartbeat-based liveness.
///
/// The advertised aggregator endpoint is fixed at construction. A single
/// mutex guards the worker map; every operation, including the eviction
/// sweep, holds it for its whole critical section.
pub struct Registry {
    aggregator_address: String,
    aggregator_port: u16,
    workers: Mutex<HashMap<u32, RegistryEntry>>,
}

impl Registry {
    /// Creates a registry advertising the given aggregator endpoint.
    pub fn new(aggregator_address: impl Into<String>, aggregator_port: u16) -> Self {
        Self {
            aggregator_address: aggregator_address.into(),
            aggregator_port,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts or replaces the entry keyed by `info.worker_id`, stamping its
    /// heartbeat to now and resetting its status to idle.
    ///
    /// # Returns
    /// The aggregator endpoint and the registry size after insertion.
    pub fn register_worker(&self, mut info: WorkerInfo) -> (String, u16, u32) {
        info.status = WorkerStatus::Idle;

        let mut workers = self.workers.lock();
        workers.insert(
            info.worker_id,
            RegistryEntry {
                info,
                last_heartbeat: Instant::now(),
            },
        );

        (
            self.aggregator_address.clone(),
            self.aggregator_port,
            workers.len() as u32,
        )
    }

    /// Refreshes the heartbeat stamp and status for `worker_id`.
    ///
    /// Returns `false` iff the worker is not currently registered.
    pub fn heartbeat(&self, worker_id: u32, status: WorkerStatus) -> bool {
        let mut workers = self.workers.lock();

        match workers.get_mut(&worker_id) {
            Some(entry) => {
                entry.last_heartbeat = Instant::now();
                entry.info.status = status;
                true
            }
            None => false,
        }
    }

    /// Snapshot of the registry. Order is unspecified.
    pub fn list_workers(&self) -> Vec<WorkerInfo> {
        self.workers
            .lock()
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// The aggregator endpoint supplied at startup.
    pub fn aggregator_address(&self) -> (String, u16) {
        (self.aggregator_address.clone(), self.aggregator_port)
    }

    /// Evicts every entry whose last heartbeat lapsed past `timeout`.
    ///
    /// # Returns
    /// The number of evicted entries.
    pub fn remove_stale(&self, timeout: Duration) -> usize {
        let mut workers = self.workers.lock();
        let now = Instant::now();

        let before = workers.len();
        workers.retain(|_, entry| now.duration_since(entry.last_heartbeat) <= timeout);
        before - workers.len()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn info(worker_id: u32) -> WorkerInfo {
        WorkerInfo {
            worker_id,
            address: "10.0.0.9".to_string(),
            port: 9000,
            hostname: "node-9".to_string(),
            status: WorkerStatus::Running,
        }
    }

    #[test]
    fn advertises_the_configured_endpoint() {
        let registry = Registry::new("10.0.0.1", 50051);
        assert_eq!(
            registry.aggregator_address(),
            ("10.0.0.1".to_string(), 50051)
        );
    }

    #[test]
    fn registration_returns_endpoint_and_size() {
        let registry = Registry::new("10.0.0.1", 50051);

        let (address, port, total) = registry.register_worker(info(7));
        assert_eq!(address, "10.0.0.1");
        assert_eq!(port, 50051);
        assert_eq!(total, 1);

        // Registration resets the caller-supplied status.
        assert_eq!(registry.list_workers()[0].status, WorkerStatus::Idle);
    }

    #[test]
    fn reregistration_replaces_the_entry() {
        let registry = Registry::new("ps", 1);

        registry.register_worker(info(1));
        let mut replacement = info(1);
        replacement.hostname = "node-x".to_string();
        let (_, _, total) = registry.register_worker(replacement);

        assert_eq!(total, 1);
        assert_eq!(registry.list_workers()[0].hostname, "node-x");
    }

    #[test]
    fn heartbeat_requires_registration() {
        let registry = Registry::new("ps", 1);
        assert!(!registry.heartbeat(3, WorkerStatus::Running));

        registry.register_worker(info(3));
        assert!(registry.heartbeat(3, WorkerStatus::Running));
        assert_eq!(registry.list_workers()[0].status, WorkerStatus::Running);
    }

    #[test]
    fn heartbeat_refreshes_liveness() {
        let registry = Registry::new("ps", 1);
        registry.register_worker(info(1));

        thread::sleep(Duration::from_millis(30));
        assert!(registry.heartbeat(1, WorkerStatus::Idle));

        // The refreshed stamp keeps the entry ahead of a timeout that would
        // have evicted the registration-time stamp.
        assert_eq!(registry.remove_stale(Duration::from_millis(20)), 0);
        assert_eq!(registry.list_workers().len(), 1);
    }

    #[test]
    fn stale_entries_are_evicted() {
        let registry = Registry::new("ps", 1);
        registry.register_worker(info(1));
        registry.register_worker(info(2));

        thread::sleep(Duration::from_millis(30));
        registry.heartbeat(2, WorkerStatus::Running);

        assert_eq!(registry.remove_stale(Duration::from_millis(20)), 1);

        let remaining = registry.list_workers();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].worker_id, 2);
    }

    #[test]
    fn fresh_entries_survive_the_sweep() {
        let registry = Registry::new("ps", 1);
        registry.register_worker(info(1));

        assert_eq!(registry.remove_stale(Duration::from_secs(30)), 0);
        assert_eq!(registry.list_workers().len(), 1);
    }
}
