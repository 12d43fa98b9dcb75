use std::{env, error::Error, process};

use log::error;

use worker::{ConstGradient, Worker, WorkerConfig};

const DEFAULT_COORDINATOR_ADDR: &str = "localhost:50052";
const HARNESS_GRADIENT: f32 = 0.01;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let coordinator_addr = args
        .next()
        .unwrap_or_else(|| DEFAULT_COORDINATOR_ADDR.to_string());
    let worker_id: u32 = match args.next() {
        Some(raw) => raw.parse()?,
        None => 0,
    };
    let iterations: u64 = match args.next() {
        Some(raw) => raw.parse()?,
        None => 1,
    };
    let advertised_addr = args.next().unwrap_or_default();
    let advertised_port: u16 = match args.next() {
        Some(raw) => raw.parse()?,
        None => 0,
    };

    let mut config = WorkerConfig::new(worker_id, coordinator_addr);
    config.advertised_addr = advertised_addr;
    config.advertised_port = advertised_port;

    let mut runner = Worker::new(config, ConstGradient(HARNESS_GRADIENT));
    runner.initialize().await?;

    let mut failed = false;
    for iteration in 0..iterations {
        let done = match runner.run_iteration(iteration).await {
            Ok(()) => true,
            Err(e) => {
                error!("iteration {iteration} failed: {e}");
                failed = true;
                false
            }
        };

        println!("worker {worker_id} iter {iteration} done={done}");
    }

    runner.shutdown().await;

    if failed {
        process::exit(1);
    }
    Ok(())
}
