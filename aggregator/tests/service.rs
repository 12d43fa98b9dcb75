use std::{env, net::SocketAddr, sync::Arc};

use aggregator::{AggregatorCore, AggregatorService, service};
use comms::{
    msg::{AggregatorRequest, AggregatorResponse},
    tensor::{DTYPE_F32, Tensor},
};
use tokio::net::{TcpListener, TcpStream};

async fn start_service(total_workers: u32) -> (SocketAddr, Arc<AggregatorService>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let state = AggregatorService::new(AggregatorCore::new(total_workers));
    tokio::spawn(service::serve(listener, Arc::clone(&state)));

    (addr, state)
}

async fn call(addr: SocketAddr, request: &AggregatorRequest) -> AggregatorResponse {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (rx, tx) = stream.into_split();
    let (mut rx, mut tx) = comms::channel(rx, tx);

    tx.send(request).await.unwrap();
    rx.recv().await.unwrap()
}

fn grad(value: f32) -> Vec<Tensor> {
    vec![Tensor::new("w", vec![2], vec![value, value], DTYPE_F32)]
}

#[tokio::test]
async fn barrier_completes_over_the_wire() {
    let (addr, state) = start_service(2).await;
    state
        .core()
        .initialize_parameters(vec![Tensor::new("w", vec![2], vec![1.0, 2.0], DTYPE_F32)]);

    let first = call(
        addr,
        &AggregatorRequest::PushGradients {
            worker_id: 0,
            iteration: 0,
            gradients: grad(0.1),
        },
    )
    .await;

    match first {
        AggregatorResponse::Push {
            success,
            aggregation_complete,
            workers_received,
            total_workers,
            ..
        } => {
            assert!(success);
            assert!(!aggregation_complete);
            assert_eq!(workers_received, 1);
            assert_eq!(total_workers, 2);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    let second = call(
        addr,
        &AggregatorRequest::PushGradients {
            worker_id: 1,
            iteration: 0,
            gradients: grad(0.1),
        },
    )
    .await;

    match second {
        AggregatorResponse::Push {
            aggregation_complete,
            workers_received,
            ..
        } => {
            assert!(aggregation_complete);
            assert_eq!(workers_received, 2);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    let pull = call(
        addr,
        &AggregatorRequest::PullParameters {
            worker_id: 0,
            iteration: 0,
        },
    )
    .await;

    match pull {
        AggregatorResponse::Pull {
            ready, parameters, ..
        } => {
            assert!(ready);
            assert!((parameters[0].data[0] - 0.9).abs() < 1e-6);
            assert!((parameters[0].data[1] - 1.9).abs() < 1e-6);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn fresh_aggregator_serves_empty_parameters() {
    let (addr, _state) = start_service(2).await;

    let pull = call(
        addr,
        &AggregatorRequest::PullParameters {
            worker_id: 0,
            iteration: 0,
        },
    )
    .await;

    match pull {
        AggregatorResponse::Pull {
            iteration,
            ready,
            parameters,
        } => {
            assert_eq!(iteration, 0);
            assert!(!ready);
            assert!(parameters.is_empty());
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn sync_status_of_unseen_iteration_is_empty() {
    let (addr, _state) = start_service(3).await;

    let status = call(addr, &AggregatorRequest::CheckSyncStatus { iteration: 11 }).await;

    match status {
        AggregatorResponse::SyncStatus {
            iteration,
            ready,
            workers_received,
            total_workers,
        } => {
            assert_eq!(iteration, 11);
            assert!(!ready);
            assert_eq!(workers_received, 0);
            assert_eq!(total_workers, 3);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn checkpoint_rpcs_round_trip() {
    let (addr, state) = start_service(1).await;
    let params = vec![Tensor::new("w", vec![2], vec![4.0, 5.0], DTYPE_F32)];
    state.core().initialize_parameters(params.clone());

    let path = env::temp_dir()
        .join(format!("aggregator_service_{}.ckpt", std::process::id()))
        .to_string_lossy()
        .into_owned();

    let saved = call(
        addr,
        &AggregatorRequest::SaveCheckpoint {
            epoch: 2,
            path: path.clone(),
        },
    )
    .await;

    match saved {
        AggregatorResponse::SaveCheckpoint {
            success,
            checkpoint_path,
            ..
        } => {
            assert!(success);
            assert_eq!(checkpoint_path, path);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    // Wipe the live parameters, then restore them from disk.
    state.core().initialize_parameters(Vec::new());

    let loaded = call(addr, &AggregatorRequest::LoadCheckpoint { path: path.clone() }).await;
    let _ = std::fs::remove_file(&path);

    match loaded {
        AggregatorResponse::LoadCheckpoint {
            success,
            epoch,
            parameters,
            ..
        } => {
            assert!(success);
            assert_eq!(epoch, 2);
            assert_eq!(parameters, params);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    assert_eq!(state.core().serve_parameters(), params);
}

#[tokio::test]
async fn load_of_missing_checkpoint_reports_failure() {
    let (addr, _state) = start_service(1).await;

    let loaded = call(
        addr,
        &AggregatorRequest::LoadCheckpoint {
            path: "/nonexistent/checkpoint.ckpt".to_string(),
        },
    )
    .await;

    match loaded {
        AggregatorResponse::LoadCheckpoint {
            success, message, ..
        } => {
            assert!(!success);
            assert!(!message.is_empty());
        }
        other => panic!("unexpected response: {other:?}"),
    }
}
