//! # 扇出执行器集成测试

use std::sync::Mutex;
use std::time::Duration;

use certdeploy::DeployError;
use certdeploy::fanout::FanOut;
use certdeploy::sdk_error;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

#[rstest]
#[case(5, vec![])]
#[case(5, vec![1, 3])]
#[case(4, vec![0, 1, 2, 3])]
#[tokio::test]
async fn every_item_is_attempted(#[case] total: usize, #[case] failing: Vec<usize>) {
    let cancel = CancellationToken::new();
    let attempted = Mutex::new(Vec::new());

    let outcome = FanOut::new()
        .run(&cancel, 0..total, |i| {
            attempted.lock().unwrap().push(i);
            let fail = failing.contains(&i);
            async move {
                if fail {
                    Err(DeployError::config(format!("item {i} rejected")))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert_eq!(*attempted.lock().unwrap(), (0..total).collect::<Vec<_>>());
    match outcome {
        Ok(report) => {
            assert!(failing.is_empty());
            assert_eq!(report.len(), total);
        }
        Err(DeployError::Aggregate(aggregate)) => assert_eq!(aggregate.len(), failing.len()),
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn rate_limited_listener_is_reported_and_others_updated() {
    let cancel = CancellationToken::new();
    let updated = Mutex::new(Vec::new());
    let listeners = ["listener-1", "listener-2", "listener-3"];

    let err = FanOut::new()
        .run(&cancel, listeners, |listener| {
            let updated = &updated;
            async move {
                if listener == "listener-2" {
                    return Err(sdk_error!("slb.SetListenerCertificate", "rate limited"));
                }
                updated.lock().unwrap().push(listener);
                Ok(())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(*updated.lock().unwrap(), vec!["listener-1", "listener-3"]);
    let DeployError::Aggregate(aggregate) = err else {
        panic!("expected aggregate error");
    };
    assert_eq!(aggregate.item_ids(), vec!["listener-2"]);
    let cause = aggregate.error_for("listener-2").unwrap();
    assert!(matches!(cause, DeployError::Sdk { .. }));
    assert!(cause.to_string().contains("rate limited"));
    assert!(aggregate.to_string().contains("listener-2"));
}

#[tokio::test]
async fn cancellation_after_second_item_skips_the_rest() {
    let cancel = CancellationToken::new();
    let invoked = Mutex::new(Vec::new());

    let err = FanOut::new()
        .run(&cancel, 1..=5, |i| {
            invoked.lock().unwrap().push(i);
            let cancel = cancel.clone();
            async move {
                if i == 2 {
                    cancel.cancel();
                }
                Ok(())
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Cancelled));
    assert_eq!(*invoked.lock().unwrap(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn interval_spaces_items() {
    let cancel = CancellationToken::new();
    let started = tokio::time::Instant::now();

    let report = FanOut::new()
        .with_interval(Duration::from_millis(500))
        .run(&cancel, ["a", "b", "c"], |_| async { Ok(()) })
        .await
        .unwrap();

    assert_eq!(report.succeeded, vec!["a", "b", "c"]);
    assert!(started.elapsed() >= Duration::from_millis(1000));
}
