//! Admission under concurrent load.
//!
//! These tests verify observable outcomes (who got in, who was told the server is busy, how
//! long they waited) rather than bucket internals.

use chaingate_core::{
    admission::{
        AdmissionController, AdmissionError, RequestContext, TokenBucket, TokenCost, WaitError,
    },
    config::PolicyConfig,
    metrics::MetricsCollector,
};
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn controller(policy: &PolicyConfig) -> (Arc<AdmissionController>, Arc<MetricsCollector>) {
    let metrics = Arc::new(MetricsCollector::new());
    (Arc::new(AdmissionController::new(policy, metrics.clone())), metrics)
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_burst_split_between_admitted_and_busy() {
    let policy = PolicyConfig::builder()
        .rate_limit(10)
        .rate_limit_timeout(Duration::from_millis(1050))
        .build();
    let (controller, metrics) = controller(&policy);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let controller = controller.clone();
        handles.push(tokio::spawn(async move {
            controller.admit(&RequestContext::new(), None, TokenCost::Basic).await
        }));
    }

    let mut admitted = 0;
    let mut busy = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => admitted += 1,
            Err(AdmissionError::ServerBusy(WaitError::Timeout { .. })) => busy += 1,
            Err(other) => panic!("unexpected denial: {other}"),
        }
    }

    // 3 from the initial burst plus 10 that mature within ~1s.
    assert_eq!(admitted, 13);
    assert_eq!(busy, 7);
    let summary = metrics.summary();
    assert_eq!(summary.admitted, 13);
    assert_eq!(summary.rate_limit_rejections, 7);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_requests_do_not_consume_tokens() {
    let policy = PolicyConfig::builder().rate_limit(2).rate_limit_timeout(Duration::ZERO).build();
    let (controller, metrics) = controller(&policy);
    let ctx = RequestContext::new();

    controller.admit(&ctx, None, TokenCost::State).await.unwrap();
    for _ in 0..5 {
        assert!(controller.admit(&ctx, None, TokenCost::Basic).await.is_err());
    }

    // Half a second refills one token; the five rejections took nothing.
    tokio::time::sleep(Duration::from_millis(500)).await;
    controller.admit(&ctx, None, TokenCost::Basic).await.unwrap();
    assert_eq!(metrics.summary().rate_limit_rejections, 5);
}

#[tokio::test(start_paused = true)]
async fn test_burst_available_again_after_quiet_period() {
    let policy = PolicyConfig::builder().rate_limit(2).rate_limit_timeout(Duration::ZERO).build();
    let (controller, _metrics) = controller(&policy);
    let ctx = RequestContext::new();

    for _ in 0..3 {
        controller.admit(&ctx, None, TokenCost::Wallet).await.unwrap();
    }
    assert!(controller.admit(&ctx, None, TokenCost::Wallet).await.is_err());

    tokio::time::sleep(Duration::from_secs(60)).await;

    // Idle time never accumulates past the burst.
    assert!(controller.global_limiter().available() <= f64::from(TokenCost::MAX_TOKENS));
    for _ in 0..3 {
        controller.admit(&ctx, None, TokenCost::Wallet).await.unwrap();
    }
    assert!(controller.admit(&ctx, None, TokenCost::Wallet).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_connections_are_limited_independently() {
    let policy = PolicyConfig::builder()
        .per_connection_rate_limit(1)
        .rate_limit_timeout(Duration::from_millis(100))
        .build();
    let (controller, metrics) = controller(&policy);
    let noisy = policy.new_connection_limiter().unwrap();
    let quiet = policy.new_connection_limiter().unwrap();
    let ctx = RequestContext::new();

    controller.admit(&ctx, Some(&noisy), TokenCost::State).await.unwrap();
    let err = controller.admit(&ctx, Some(&noisy), TokenCost::Basic).await.unwrap_err();
    assert!(matches!(err, AdmissionError::ConnectionLimited(_)));
    assert!(err.to_string().starts_with("connection limited. "));

    controller.admit(&ctx, Some(&quiet), TokenCost::State).await.unwrap();

    let summary = metrics.summary();
    assert_eq!(summary.connection_limited, 1);
    assert_eq!(summary.rate_limit_rejections, 0);
    assert_eq!(summary.admitted, 2);
}

#[tokio::test(start_paused = true)]
async fn test_connection_denial_leaves_global_budget_untouched() {
    let policy = PolicyConfig::builder().rate_limit(1).rate_limit_timeout(Duration::ZERO).build();
    let (controller, _metrics) = controller(&policy);
    let connection = TokenBucket::per_second(1, 1);
    let ctx = RequestContext::new();

    let err = controller.admit(&ctx, Some(&connection), TokenCost::State).await.unwrap_err();
    assert!(matches!(err, AdmissionError::ConnectionLimited(WaitError::ExceedsBurst { .. })));

    // The global bucket still holds its full burst.
    controller.admit(&ctx, None, TokenCost::State).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_waiters_are_released_in_order() {
    let policy =
        PolicyConfig::builder().rate_limit(1).rate_limit_timeout(Duration::from_secs(10)).build();
    let (controller, _metrics) = controller(&policy);
    controller.admit(&RequestContext::new(), None, TokenCost::State).await.unwrap();
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let controller = controller.clone();
        handles.push(tokio::spawn(async move {
            controller.admit(&RequestContext::new(), None, TokenCost::Chain).await.unwrap();
            start.elapsed()
        }));
    }

    let mut finished = Vec::new();
    for handle in handles {
        finished.push(handle.await.unwrap());
    }
    finished.sort();

    assert!(finished[0] >= Duration::from_secs(2) && finished[0] < Duration::from_millis(2100));
    assert!(finished[1] >= Duration::from_secs(4) && finished[1] < Duration::from_millis(4100));
    assert!(finished[2] >= Duration::from_secs(6) && finished[2] < Duration::from_millis(6100));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_waiter_returns_its_reservation() {
    let policy =
        PolicyConfig::builder().rate_limit(1).rate_limit_timeout(Duration::from_secs(5)).build();
    let (controller, metrics) = controller(&policy);
    controller.admit(&RequestContext::new(), None, TokenCost::State).await.unwrap();

    let cancel = CancellationToken::new();
    let waiter = {
        let controller = controller.clone();
        let ctx = RequestContext::with_cancellation(cancel.clone());
        tokio::spawn(async move { controller.admit(&ctx, None, TokenCost::State).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    let err = waiter.await.unwrap().unwrap_err();
    assert_eq!(err, AdmissionError::ServerBusy(WaitError::Cancelled));
    assert!(err.is_cancellation());
    assert_eq!(metrics.summary().rate_limit_rejections, 1);

    // One second of refill plus the returned reservation leaves a token right now.
    let ctx = RequestContext::new().with_timeout(Duration::ZERO);
    controller.admit(&ctx, None, TokenCost::Basic).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_context_is_rejected_without_waiting() {
    let policy = PolicyConfig::builder().rate_limit(1).build();
    let (controller, _metrics) = controller(&policy);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = controller
        .admit(&RequestContext::with_cancellation(cancel), None, TokenCost::Basic)
        .await
        .unwrap_err();
    assert_eq!(err, AdmissionError::ServerBusy(WaitError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn test_caller_deadline_tighter_than_admission_timeout() {
    let policy =
        PolicyConfig::builder().rate_limit(1).rate_limit_timeout(Duration::from_secs(5)).build();
    let (controller, _metrics) = controller(&policy);
    controller.admit(&RequestContext::new(), None, TokenCost::State).await.unwrap();

    let ctx = RequestContext::new().with_deadline(Instant::now() + Duration::from_millis(500));
    let err = controller.admit(&ctx, None, TokenCost::Basic).await.unwrap_err();
    assert!(matches!(err, AdmissionError::ServerBusy(WaitError::CallerDeadline { .. })));
    assert!(err.is_cancellation());

    // With the caller's deadline out of the way the same request fits in the admission timeout.
    controller.admit(&RequestContext::new(), None, TokenCost::Basic).await.unwrap();
}
