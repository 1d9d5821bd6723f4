use std::sync::Arc;
use std::time::Duration;

use fanout::FanOutPool;
use fanout::concurrency::shutdown::create_shutdown_channel;
use fanout::test_utils::notify::TimedNotify;
use fanout::test_utils::work::{GatedWork, squares, stalled};
use fanout::types::BatchPhase;
use fanout::workers::base::WorkerHandle;
use fanout_config::shared::FanOutConfig;
use fanout_telemetry::init_test_tracing;
use futures::StreamExt;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn pool(channel_capacity: usize, shutdown_grace_ms: u64) -> FanOutPool {
    FanOutPool::new(FanOutConfig {
        channel_capacity,
        shutdown_grace_ms,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_aborts_stalled_producers_after_the_grace_period() {
    init_test_tracing();

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let (stream, mut handle) = pool(0, 100).run(3, stalled(), shutdown_rx).split();

    timeout(TEST_TIMEOUT, handle.wait_for_phase(BatchPhase::Running))
        .await
        .unwrap();
    assert_eq!(handle.pending(), 3);

    shutdown_tx.shutdown();

    let items = timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .unwrap();
    assert!(items.is_empty());
    assert_eq!(handle.pending(), 0);

    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.launched, 3);
    assert_eq!(summary.aborted, 3);
    assert!(summary.cancelled);
    assert!(!summary.is_complete());
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_lets_in_flight_producers_finish_within_the_grace_period() {
    init_test_tracing();

    let work = GatedWork::new();
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let (stream, handle) = pool(3, 5_000)
        .run(3, work.clone(), shutdown_rx)
        .split();

    timeout(TEST_TIMEOUT, work.wait_started(3)).await.unwrap();
    shutdown_tx.shutdown();

    sleep(Duration::from_millis(50)).await;
    work.release_all();

    let items = timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| item.is_ok()));

    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.aborted, 0);
    assert!(summary.cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_keeps_producers_waiting_for_a_slot_from_starting() {
    init_test_tracing();

    let work = GatedWork::new();
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let pool = FanOutPool::new(FanOutConfig {
        channel_capacity: 64,
        max_concurrency: 1,
        shutdown_grace_ms: 5_000,
    })
    .unwrap();
    let (stream, handle) = pool.run(20, work.clone(), shutdown_rx).split();

    timeout(TEST_TIMEOUT, work.wait_started(1)).await.unwrap();
    shutdown_tx.shutdown();

    sleep(Duration::from_millis(50)).await;
    work.release_all();

    let items = timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].is_ok());
    assert_eq!(work.started(), 1);

    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.launched, 20);
    assert_eq!(summary.not_started, 19);
    assert_eq!(summary.aborted, 0);
    assert!(summary.cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn aborted_rendezvous_producer_does_not_deliver_its_value() {
    init_test_tracing();

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let (stream, mut handle) = pool(0, 50).run(1, squares(), shutdown_rx).split();

    timeout(TEST_TIMEOUT, handle.wait_for_phase(BatchPhase::Running))
        .await
        .unwrap();

    // Nobody reads yet, so the producer waits for the consumer to take its value.
    sleep(Duration::from_millis(50)).await;
    shutdown_tx.shutdown();

    timeout(TEST_TIMEOUT, handle.wait_for_phase(BatchPhase::Closed))
        .await
        .unwrap();

    let items = timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .unwrap();
    assert!(items.is_empty());

    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.launched, 1);
    assert_eq!(summary.aborted, 1);
    assert_eq!(summary.not_started, 0);
    assert!(summary.cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_before_launch_closes_an_empty_batch() {
    init_test_tracing();

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    shutdown_tx.shutdown();

    let (items, summary) = timeout(
        TEST_TIMEOUT,
        pool(0, 100).run(10, squares(), shutdown_rx).collect_all(),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(items.is_empty());
    assert_eq!(summary.requested, 10);
    assert_eq!(summary.launched, 0);
    assert!(summary.cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn phase_watchers_observe_the_close_before_any_read() {
    init_test_tracing();

    let (stream, mut handle) = pool(4, 100)
        .run(4, squares(), create_shutdown_channel().1)
        .split();

    let closed = Arc::new(Notify::new());
    let closed_notify = TimedNotify::with_timeout(closed.clone(), TEST_TIMEOUT);

    tokio::spawn(async move {
        handle.wait_for_phase(BatchPhase::Closed).await;
        closed.notify_one();
        handle
    });

    closed_notify.notified().await;

    let items = stream.collect::<Vec<_>>().await;
    assert_eq!(items.len(), 4);
}
