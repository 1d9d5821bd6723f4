use std::time::Duration;

use fanout::concurrency::shutdown::create_shutdown_channel;
use fanout::error::ErrorKind;
use fanout::test_utils::work::{GatedWork, delayed_squares, failing_at, panicking_at, squares};
use fanout::types::{BatchItem, BatchPhase};
use fanout::workers::base::WorkerHandle;
use fanout::{FanOutPool, run_fan_out};
use fanout_config::shared::FanOutConfig;
use fanout_telemetry::init_test_tracing;
use futures::StreamExt;
use tokio::time::{sleep, timeout};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn pool(channel_capacity: usize, max_concurrency: usize) -> FanOutPool {
    FanOutPool::new(FanOutConfig {
        channel_capacity,
        max_concurrency,
        ..Default::default()
    })
    .unwrap()
}

fn sorted_values(mut items: Vec<BatchItem<usize>>) -> Vec<usize> {
    items.sort_by_key(|item| item.index);
    items
        .into_iter()
        .map(|item| item.into_outcome().unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn fan_out_yields_one_item_per_work_item() {
    init_test_tracing();

    let (items, summary) = timeout(TEST_TIMEOUT, run_fan_out(5, squares()).collect_all())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(sorted_values(items), vec![0, 1, 4, 9, 16]);
    assert_eq!(summary.requested, 5);
    assert_eq!(summary.launched, 5);
    assert!(summary.is_complete());
}

#[tokio::test(flavor = "multi_thread")]
async fn fan_out_with_no_work_ends_immediately() {
    init_test_tracing();

    let (items, summary) = timeout(TEST_TIMEOUT, run_fan_out(0, squares()).collect_all())
        .await
        .unwrap()
        .unwrap();

    assert!(items.is_empty());
    assert_eq!(summary.launched, 0);
    assert!(summary.is_complete());
}

#[tokio::test(flavor = "multi_thread")]
async fn fan_out_with_random_delays_delivers_every_item() {
    init_test_tracing();

    for channel_capacity in [0, 1, 4, 64] {
        let (stream, handle) = pool(channel_capacity, 0)
            .run(
                50,
                delayed_squares(Duration::from_millis(20)),
                create_shutdown_channel().1,
            )
            .split();

        let items = timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
            .await
            .unwrap();
        let summary = handle.wait().await.unwrap();

        let expected = (0..50).map(|index| index * index).collect::<Vec<_>>();
        assert_eq!(sorted_values(items), expected);
        assert!(summary.is_complete());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_work_is_delivered_as_a_failed_item() {
    init_test_tracing();

    let (items, summary) = timeout(TEST_TIMEOUT, run_fan_out(5, failing_at(2)).collect_all())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(items.len(), 5);
    assert_eq!(items.iter().filter(|item| item.is_ok()).count(), 4);

    let failed = items.iter().find(|item| !item.is_ok()).unwrap();
    assert_eq!(failed.index, 2);
    assert_eq!(
        failed.outcome.as_ref().unwrap_err().kind(),
        ErrorKind::WorkFailed
    );

    // Failed work does not fail the batch itself.
    assert!(summary.is_complete());
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_work_is_delivered_as_a_worker_panic() {
    init_test_tracing();

    let (items, summary) = timeout(TEST_TIMEOUT, run_fan_out(4, panicking_at(1)).collect_all())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(items.len(), 4);

    let panicked = items.iter().find(|item| item.index == 1).unwrap();
    let err = panicked.outcome.as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WorkerPanic);
    assert!(err.detail().unwrap().contains("panicked on purpose"));
    assert!(summary.is_complete());
}

#[tokio::test(flavor = "multi_thread")]
async fn rendezvous_channel_stays_open_until_the_last_producer_is_done() {
    init_test_tracing();

    let (mut stream, handle) = pool(0, 0)
        .run(3, squares(), create_shutdown_channel().1)
        .split();

    for _ in 0..2 {
        timeout(TEST_TIMEOUT, stream.next()).await.unwrap().unwrap();
    }

    // The last producer is parked on its send, so its slot is still taken.
    sleep(Duration::from_millis(50)).await;
    assert!(handle.pending() >= 1);
    assert!(handle.state() <= BatchPhase::Running);

    timeout(TEST_TIMEOUT, stream.next()).await.unwrap().unwrap();
    assert!(timeout(TEST_TIMEOUT, stream.next()).await.unwrap().is_none());

    assert_eq!(stream.received(), 3);
    assert_eq!(handle.pending(), 0);
    assert_eq!(handle.state(), BatchPhase::Done);

    let summary = handle.wait().await.unwrap();
    assert!(summary.is_complete());
}

#[tokio::test(flavor = "multi_thread")]
async fn rendezvous_producers_wait_for_the_consumer() {
    init_test_tracing();

    let (stream, mut handle) = pool(0, 0)
        .run(2, squares(), create_shutdown_channel().1)
        .split();

    // Without a reader no producer can complete, so the batch cannot start draining.
    let draining = timeout(
        Duration::from_millis(200),
        handle.wait_for_phase(BatchPhase::Draining),
    )
    .await;
    assert!(draining.is_err());
    assert_eq!(handle.pending(), 2);

    let items = timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(sorted_values(items), vec![0, 1]);
    assert!(handle.wait().await.unwrap().is_complete());
}

#[tokio::test(flavor = "multi_thread")]
async fn buffered_producers_finish_without_a_consumer() {
    init_test_tracing();

    let (stream, mut handle) = pool(5, 0)
        .run(5, squares(), create_shutdown_channel().1)
        .split();

    // Every result fits in the buffer, so the channel gets closed before anything is read.
    let phase = timeout(TEST_TIMEOUT, handle.wait_for_phase(BatchPhase::Closed))
        .await
        .unwrap();
    assert!(phase >= BatchPhase::Closed);
    assert_eq!(handle.pending(), 0);

    let items = timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(sorted_values(items), vec![0, 1, 4, 9, 16]);
    assert_eq!(handle.state(), BatchPhase::Done);
}

#[tokio::test(flavor = "multi_thread")]
async fn max_concurrency_bounds_running_work() {
    init_test_tracing();

    let work = GatedWork::new();
    let (stream, handle) = pool(6, 2)
        .run(6, work.clone(), create_shutdown_channel().1)
        .split();

    timeout(TEST_TIMEOUT, work.wait_started(2)).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(work.running(), 2);

    work.release_all();

    let items = timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(sorted_values(items), vec![0, 1, 2, 3, 4, 5]);
    assert!(work.max_running() <= 2);
    assert!(handle.wait().await.unwrap().is_complete());
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_the_stream_early_lets_the_batch_complete() {
    init_test_tracing();

    let (mut stream, handle) = pool(0, 0)
        .run(5, squares(), create_shutdown_channel().1)
        .split();

    timeout(TEST_TIMEOUT, stream.next()).await.unwrap().unwrap();
    drop(stream);

    let summary = timeout(TEST_TIMEOUT, handle.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.launched, 5);
    assert_eq!(summary.aborted, 0);
    assert!(!summary.cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_batches_never_lose_items() {
    init_test_tracing();

    for round in 0..20 {
        let channel_capacity = round % 3;
        let count = 1 + round * 3;

        let (items, summary) = timeout(
            TEST_TIMEOUT,
            pool(channel_capacity, 0)
                .run(
                    count,
                    delayed_squares(Duration::from_millis(5)),
                    create_shutdown_channel().1,
                )
                .collect_all(),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(items.len(), count);
        assert!(summary.is_complete());
    }
}
