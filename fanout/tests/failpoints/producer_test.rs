use std::time::Duration;

use fanout::error::ErrorKind;
use fanout::failpoints::{PRODUCER_BEFORE_SEND, PRODUCER_BEFORE_WORK};
use fanout::run_fan_out;
use fanout::test_utils::failpoints::ScopedFailScenario;
use fanout::test_utils::work::squares;
use fanout::workers::base::WorkerHandle;
use fanout_telemetry::init_test_tracing;
use futures::StreamExt;
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test(flavor = "multi_thread")]
async fn failing_fail_point_before_work_is_delivered_as_a_failed_item() {
    init_test_tracing();
    let _scenario = ScopedFailScenario::setup(&[(PRODUCER_BEFORE_WORK, "1*return(boom)")]);

    let (items, summary) = timeout(TEST_TIMEOUT, run_fan_out(4, squares()).collect_all())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(items.len(), 4);

    let failed = items
        .iter()
        .filter_map(|item| item.outcome.as_ref().err())
        .collect::<Vec<_>>();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].kind(), ErrorKind::WithNoRetry);
    assert!(failed[0].detail().unwrap().contains("boom"));
    assert!(summary.is_complete());
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_fail_point_before_send_is_delivered_as_a_failed_item() {
    init_test_tracing();
    let _scenario = ScopedFailScenario::setup(&[(PRODUCER_BEFORE_SEND, "1*return")]);

    let (items, summary) = timeout(TEST_TIMEOUT, run_fan_out(4, squares()).collect_all())
        .await
        .unwrap()
        .unwrap();

    // The injected failure replaces the computed value, the item still reaches the consumer.
    assert_eq!(items.len(), 4);

    let failed = items
        .iter()
        .filter_map(|item| item.outcome.as_ref().err())
        .collect::<Vec<_>>();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].kind(), ErrorKind::WithNoRetry);
    assert!(summary.is_complete());
}

#[tokio::test(flavor = "multi_thread")]
async fn producer_panicking_outside_its_work_is_reported_by_the_coordinator() {
    init_test_tracing();
    let _scenario = ScopedFailScenario::setup(&[(PRODUCER_BEFORE_SEND, "1*panic(producer died)")]);

    let (stream, handle) = run_fan_out(3, squares()).split();

    let items = timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(items.len(), 2);

    let err = handle.wait().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WorkerPanic);
}
