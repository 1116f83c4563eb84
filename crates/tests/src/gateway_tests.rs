//! End-to-end behaviour of [`GatewayNode`] in front of a mock node.

use crate::mock_infrastructure::{gateway_with, mainnet_like_node, MockNode};
use chaingate_core::{
    admission::{AdmissionError, RequestContext, TokenCost, WaitError},
    chain::{BackendError, TipSet, TipSetKey},
    config::{PolicyConfig, SubscriptionHandler},
    gateway::{Caller, GatewayError, GatewayNode},
    metrics::MetricsState,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

fn throttled_gateway(node: Arc<MockNode>) -> GatewayNode<MockNode> {
    gateway_with(
        node,
        PolicyConfig::builder().rate_limit(1).rate_limit_timeout(Duration::ZERO).build(),
    )
}

#[tokio::test]
async fn test_unthrottled_calls_pass_through() {
    let node = Arc::new(mainnet_like_node());
    node.set_balance("f1alice", 1_000_000);
    let gw = gateway_with(node.clone(), PolicyConfig::default());
    let caller = Caller::default();

    assert_eq!(gw.version(&caller).await.unwrap().version, "mock/1.0.0");
    assert_eq!(gw.chain_head(&caller).await.unwrap().height(), 10_000);
    assert_eq!(gw.wallet_balance(&caller, "f1alice").await.unwrap(), 1_000_000);
    assert_eq!(gw.wallet_balance(&caller, "f1bob").await.unwrap(), 0);

    assert_eq!(node.calls(), vec!["Version", "ChainHead", "WalletBalance", "WalletBalance"]);
    assert_eq!(gw.metrics().summary().admitted, 4);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_requests_never_reach_backend() {
    let node = Arc::new(mainnet_like_node());
    let gw = throttled_gateway(node.clone());
    let caller = Caller::default();

    gw.state_search_msg(&caller, &TipSetKey::head(), "bafy-any", None, false).await.unwrap();
    let calls_after_first = node.calls().len();

    let err = gw.chain_get_tipset(&caller, &TipSetKey::head()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Admission(AdmissionError::ServerBusy(_))));
    assert_eq!(err.rpc_code(), -32005);
    assert_eq!(err.as_metric_str(), "server_busy");
    assert!(err.to_string().starts_with("server busy. "));
    assert_eq!(node.calls().len(), calls_after_first);
}

#[tokio::test(start_paused = true)]
async fn test_each_operation_charges_its_class() {
    let node = Arc::new(mainnet_like_node());
    let gw = throttled_gateway(node);
    let caller = Caller::default();

    // Chain (2) + Basic (1) drains the burst of 3.
    gw.chain_head(&caller).await.unwrap();
    gw.version(&caller).await.unwrap();
    assert!(gw.wallet_balance(&caller, "f1alice").await.is_err());

    tokio::time::sleep(Duration::from_secs(3)).await;
    // State (3) needs the whole bucket.
    gw.state_search_msg(&caller, &TipSetKey::head(), "bafy-any", None, false).await.unwrap();
    assert!(gw.version(&caller).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_guard_method_uses_method_cost() {
    let node = Arc::new(mainnet_like_node());
    let gw = throttled_gateway(node);
    let caller = Caller::default();

    gw.guard_method(&caller, "Filecoin.MpoolPush").await.unwrap();
    gw.guard_method(&caller, "Filecoin.GasEstimateMessageGas").await.unwrap();
    let err = gw.guard_method(&caller, "Filecoin.WalletBalance").await.unwrap_err();
    assert!(matches!(err, GatewayError::Admission(_)));

    tokio::time::sleep(Duration::from_secs(3)).await;
    gw.guard(&caller, TokenCost::State).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_callers_on_one_connection_share_its_limiter() {
    let node = Arc::new(mainnet_like_node());
    let gw = gateway_with(
        node,
        PolicyConfig::builder()
            .per_connection_rate_limit(1)
            .rate_limit_timeout(Duration::from_millis(10))
            .build(),
    );
    let connection = gw.new_connection_limiter();
    let first = Caller::default().with_limiter(connection.clone());
    let second = Caller::default().with_limiter(connection);
    let other_connection = Caller::default().with_limiter(gw.new_connection_limiter());

    gw.chain_head(&first).await.unwrap();
    gw.version(&second).await.unwrap();
    let err = gw.version(&first).await.unwrap_err();
    assert!(matches!(err, GatewayError::Admission(AdmissionError::ConnectionLimited(_))));
    assert_eq!(err.as_metric_str(), "connection_limited");

    gw.chain_head(&other_connection).await.unwrap();
    assert_eq!(gw.metrics().summary().connection_limited, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_caller_reported_as_cancellation() {
    let node = Arc::new(mainnet_like_node());
    let gw = Arc::new(gateway_with(
        node.clone(),
        PolicyConfig::builder().rate_limit(1).rate_limit_timeout(Duration::from_secs(5)).build(),
    ));
    gw.guard(&Caller::default(), TokenCost::State).await.unwrap();

    let cancel = CancellationToken::new();
    let pending = {
        let gw = gw.clone();
        let caller = Caller::new(RequestContext::with_cancellation(cancel.clone()));
        tokio::spawn(async move { gw.chain_head(&caller).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.is_cancellation());
    assert!(matches!(
        err,
        GatewayError::Admission(AdmissionError::ServerBusy(WaitError::Cancelled))
    ));
    assert_eq!(node.call_count("ChainHead"), 0);
}

#[tokio::test]
async fn test_backend_failures_are_not_policy_rejections() {
    let node = Arc::new(mainnet_like_node());
    let gw = gateway_with(node.clone(), PolicyConfig::default());
    node.set_unavailable(true);

    let err = gw.chain_head(&Caller::default()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Backend(BackendError::Unavailable(_))));
    assert!(!err.is_policy_rejection());
    assert_eq!(err.rpc_code(), -32000);

    // A lookup failure during a lookback check is also a backend failure, not a rejection.
    let missing = TipSetKey::new(vec!["x".to_string()]);
    let err =
        gw.chain_get_tipset_by_height(&Caller::default(), 9_000, &missing).await.unwrap_err();
    assert!(matches!(err, GatewayError::Backend(_)));
    assert_eq!(gw.metrics().summary().lookback_rejections, 0);
}

#[tokio::test]
async fn test_unrepresentable_block_time_is_a_backend_error() {
    let node = Arc::new(mainnet_like_node());
    let far = TipSet::single("bafy-far", 5_000, u64::MAX);
    node.push_tipset(far.clone());
    let gw = gateway_with(node, PolicyConfig::default());

    let err = gw.chain_get_tipset(&Caller::default(), &far.key()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Backend(BackendError::InvalidResponse(_))));
    assert!(!err.is_policy_rejection());
    assert_eq!(err.rpc_code(), -32000);
    assert_eq!(gw.metrics().summary().lookback_rejections, 0);
}

#[tokio::test]
async fn test_unlimited_gateway_admits_concurrent_callers() {
    let node = Arc::new(mainnet_like_node());
    let gw = Arc::new(gateway_with(node.clone(), PolicyConfig::default()));

    let mut handles = Vec::new();
    for _ in 0..64 {
        let gw = gw.clone();
        handles.push(tokio::spawn(async move { gw.chain_head(&Caller::default()).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(node.call_count("ChainHead"), 64);
    assert_eq!(gw.metrics().summary().rate_limit_rejections, 0);
}

#[test]
fn test_pass_through_settings_exposed() {
    let handler: SubscriptionHandler = Arc::new(String::from("eth-subscriptions"));
    let gw = gateway_with(
        Arc::new(mainnet_like_node()),
        PolicyConfig::builder().eth_max_filters_per_conn(8).subscription_handler(handler).build(),
    );

    assert_eq!(gw.eth_max_filters_per_conn(), 8);
    let handler = gw.subscription_handler().unwrap();
    assert_eq!(handler.downcast_ref::<String>().map(String::as_str), Some("eth-subscriptions"));
    assert!(gw.new_connection_limiter().is_none());
}
