use comms::{
    msg::{AggregatorRequest, AggregatorResponse, CoordinatorRequest, CoordinatorResponse},
    tensor::{DTYPE_F32, Tensor},
};
use tokio::io;

#[tokio::test]
async fn send_recv_gradient_push() {
    const SIZE: usize = 4096;

    let (one, two) = io::duplex(SIZE);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);

    let msg = AggregatorRequest::PushGradients {
        worker_id: 3,
        iteration: 7,
        gradients: vec![Tensor::new("w", vec![2], vec![0.1, 0.2], DTYPE_F32)],
    };
    tx.send(&msg).await.unwrap();

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    let got: AggregatorRequest = rx.recv().await.unwrap();
    match got {
        AggregatorRequest::PushGradients {
            worker_id,
            iteration,
            gradients,
        } => {
            assert_eq!(worker_id, 3);
            assert_eq!(iteration, 7);
            assert_eq!(gradients.len(), 1);
            assert_eq!(gradients[0].data, vec![0.1, 0.2]);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn buffers_survive_consecutive_frames() {
    const SIZE: usize = 4096;

    let (one, two) = io::duplex(SIZE);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);
    let (rx2, tx2) = io::split(two);
    let (mut rx, _) = comms::channel(rx2, tx2);

    tx.send(&CoordinatorRequest::GetAggregatorAddress)
        .await
        .unwrap();
    tx.send(&CoordinatorRequest::Heartbeat {
        worker_id: 1,
        status: comms::msg::WorkerStatus::Running,
    })
    .await
    .unwrap();

    let first: CoordinatorRequest = rx.recv().await.unwrap();
    assert!(matches!(first, CoordinatorRequest::GetAggregatorAddress));

    let second: CoordinatorRequest = rx.recv().await.unwrap();
    assert!(matches!(
        second,
        CoordinatorRequest::Heartbeat { worker_id: 1, .. }
    ));
}

#[tokio::test]
async fn eof_between_frames_is_unexpected_eof() {
    const SIZE: usize = 64;

    let (one, two) = io::duplex(SIZE);
    drop(one);

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    let err = rx.recv::<CoordinatorResponse>().await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn pull_response_round_trips_parameters() {
    const SIZE: usize = 4096;

    let (one, two) = io::duplex(SIZE);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);
    let (rx2, tx2) = io::split(two);
    let (mut rx, _) = comms::channel(rx2, tx2);

    let msg = AggregatorResponse::Pull {
        iteration: 0,
        ready: false,
        parameters: vec![Tensor::zeros("weight", vec![10, 10], DTYPE_F32)],
    };
    tx.send(&msg).await.unwrap();

    let got: AggregatorResponse = rx.recv().await.unwrap();
    match got {
        AggregatorResponse::Pull {
            ready, parameters, ..
        } => {
            assert!(!ready);
            assert_eq!(parameters[0].element_count(), 100);
            assert_eq!(parameters[0].data.len(), 100);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}
