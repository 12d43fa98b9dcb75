use std::{env, error::Error, sync::Arc, time::Duration};

use log::info;
use tokio::net::TcpListener;

use aggregator::{AggregatorCore, AggregatorService, service};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:50051";
const DEFAULT_TOTAL_WORKERS: u32 = 2;
const CHECKPOINT_POLL_PERIOD: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let listen_addr = args
        .next()
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
    let total_workers: u32 = match args.next() {
        Some(raw) => raw.parse()?,
        None => DEFAULT_TOTAL_WORKERS,
    };
    let checkpoint_interval: u64 = match args.next() {
        Some(raw) => raw.parse()?,
        None => 0,
    };

    let service_state = AggregatorService::new(AggregatorCore::new(total_workers));

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("aggregator listening on {listen_addr} (cohort size {total_workers})");

    if checkpoint_interval > 0 {
        info!("periodic checkpointing every {checkpoint_interval} iterations");
        tokio::spawn(service::run_periodic_checkpointer(
            Arc::clone(&service_state),
            checkpoint_interval,
            CHECKPOINT_POLL_PERIOD,
        ));
    }

    service::serve(listener, service_state).await?;
    Ok(())
}
