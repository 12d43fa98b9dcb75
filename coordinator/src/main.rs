use std::{env, error::Error, sync::Arc};

use log::info;
use tokio::net::TcpListener;

use coordinator::{CoordinatorConfig, Registry, service};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:50052";
const DEFAULT_AGGREGATOR_ENDPOINT: &str = "localhost:50051";
const DEFAULT_AGGREGATOR_PORT: u16 = 50051;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let listen_addr = args
        .next()
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
    let endpoint = args
        .next()
        .unwrap_or_else(|| DEFAULT_AGGREGATOR_ENDPOINT.to_string());

    let (aggregator_address, aggregator_port) = match endpoint.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse()?),
        None => (endpoint, DEFAULT_AGGREGATOR_PORT),
    };

    let registry = Arc::new(Registry::new(aggregator_address.clone(), aggregator_port));

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("coordinator listening on {listen_addr}");
    info!("aggregator: {aggregator_address}:{aggregator_port}");

    tokio::spawn(service::run_eviction_sweep(
        Arc::clone(&registry),
        CoordinatorConfig::default(),
    ));

    service::serve(listener, registry).await?;
    Ok(())
}
