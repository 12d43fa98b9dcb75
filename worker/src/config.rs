use std::time::Duration;

/// Identity, endpoints and retry policy for a worker instance.
///
/// The defaults carry the deployment constants; tests shrink the timing
/// fields to keep runs fast.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: u32,
    pub coordinator_addr: String,
    /// Address advertised to the coordinator registry. May be empty.
    pub advertised_addr: String,
    pub advertised_port: u16,

    /// Backoff base for the startup calls against the coordinator.
    pub startup_backoff: Duration,
    pub startup_attempts: u32,
    pub heartbeat_period: Duration,

    /// Pull retries tolerated while the aggregator is still uninitialized.
    pub cold_start_attempts: u32,
    pub cold_start_delay: Duration,

    pub poll_interval: Duration,
    pub max_polls: u32,
    pub iteration_attempts: u32,
    pub iteration_retry_delay: Duration,
}

impl WorkerConfig {
    /// Creates a configuration with the deployment defaults.
    pub fn new(worker_id: u32, coordinator_addr: impl Into<String>) -> Self {
        Self {
            worker_id,
            coordinator_addr: coordinator_addr.into(),
            advertised_addr: String::new(),
            advertised_port: 0,
            startup_backoff: Duration::from_millis(100),
            startup_attempts: 5,
            heartbeat_period: Duration::from_secs(5),
            cold_start_attempts: 3,
            cold_start_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
            max_polls: 200,
            iteration_attempts: 3,
            iteration_retry_delay: Duration::from_secs(1),
        }
    }
}
