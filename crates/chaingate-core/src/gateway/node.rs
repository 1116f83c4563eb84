use super::{
    errors::GatewayError,
    target::{MsgLookup, NodeVersion, TargetApi, TokenAmount},
};
use crate::{
    admission::{AdmissionController, RequestContext, TokenBucket, TokenCost},
    chain::{ChainEpoch, TipSet, TipSetKey},
    config::{PolicyConfig, SubscriptionHandler},
    lookback::{Clock, LookbackError, LookbackValidator, SystemClock},
    metrics::{MetricsCollector, MetricsState},
};
use std::sync::Arc;
use tracing::debug;

/// Who is calling: the request context plus the connection's limiter, if it has one.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    ctx: RequestContext,
    limiter: Option<Arc<TokenBucket>>,
}

impl Caller {
    #[must_use]
    pub fn new(ctx: RequestContext) -> Self {
        Self { ctx, limiter: None }
    }

    /// Charges this caller's requests to `limiter` as well as the global bucket.
    #[must_use]
    pub fn with_limiter(mut self, limiter: Option<Arc<TokenBucket>>) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    #[must_use]
    pub fn limiter(&self) -> Option<&TokenBucket> {
        self.limiter.as_deref()
    }
}

/// Admission and lookback policy in front of a [`TargetApi`].
pub struct GatewayNode<B: TargetApi + ?Sized> {
    target: Arc<B>,
    admission: AdmissionController,
    lookback: LookbackValidator<B>,
    policy: PolicyConfig,
    metrics: Arc<MetricsCollector>,
}

impl<B: TargetApi + ?Sized> GatewayNode<B> {
    #[must_use]
    pub fn new(target: Arc<B>, policy: PolicyConfig) -> Self {
        Self::from_parts(target, policy, Arc::new(MetricsCollector::new()), Arc::new(SystemClock))
    }

    #[must_use]
    pub fn from_parts(
        target: Arc<B>,
        policy: PolicyConfig,
        metrics: Arc<MetricsCollector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let admission = AdmissionController::new(&policy, metrics.clone());
        let lookback = LookbackValidator::with_clock(&policy, target.clone(), clock);
        Self { target, admission, lookback, policy, metrics }
    }

    #[must_use]
    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    #[must_use]
    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    #[must_use]
    pub fn lookback(&self) -> &LookbackValidator<B> {
        &self.lookback
    }

    #[must_use]
    pub fn eth_max_filters_per_conn(&self) -> usize {
        self.policy.eth_max_filters_per_conn()
    }

    #[must_use]
    pub fn subscription_handler(&self) -> Option<&SubscriptionHandler> {
        self.policy.subscription_handler()
    }

    /// Limiter for a newly accepted connection, shared by all of that connection's callers.
    #[must_use]
    pub fn new_connection_limiter(&self) -> Option<Arc<TokenBucket>> {
        self.policy.new_connection_limiter().map(Arc::new)
    }

    /// Charges `cost` to the caller. Operations without a dedicated method call this and
    /// then forward on their own.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Admission`] when either bucket denies the request.
    pub async fn guard(&self, caller: &Caller, cost: TokenCost) -> Result<(), GatewayError> {
        self.admission.admit(caller.context(), caller.limiter(), cost).await?;
        Ok(())
    }

    /// [`guard`](Self::guard) with the cost derived from a method name.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Admission`] when either bucket denies the request.
    pub async fn guard_method(&self, caller: &Caller, method: &str) -> Result<(), GatewayError> {
        self.guard(caller, TokenCost::for_method(method)).await
    }

    /// # Errors
    ///
    /// Admission denial or backend failure.
    pub async fn version(&self, caller: &Caller) -> Result<NodeVersion, GatewayError> {
        self.guard(caller, TokenCost::Basic).await?;
        Ok(self.target.version().await?)
    }

    /// # Errors
    ///
    /// Admission denial or backend failure.
    pub async fn chain_head(&self, caller: &Caller) -> Result<TipSet, GatewayError> {
        self.guard(caller, TokenCost::Chain).await?;
        Ok(self.target.chain_head().await?)
    }

    /// Returns the tip set for `key`, which must be inside the lookback window unless it is
    /// the head key.
    ///
    /// # Errors
    ///
    /// Admission denial, lookback rejection, or backend failure.
    pub async fn chain_get_tipset(
        &self,
        caller: &Caller,
        key: &TipSetKey,
    ) -> Result<TipSet, GatewayError> {
        self.guard(caller, TokenCost::Chain).await?;
        if key.is_empty() {
            return Ok(self.target.chain_head().await?);
        }
        let ts = self.target.chain_get_tipset(key).await?;
        self.checked(self.lookback.check_tipset(&ts))?;
        Ok(ts)
    }

    /// # Errors
    ///
    /// Admission denial, lookback rejection (including heights above the reference tip
    /// set), or backend failure.
    pub async fn chain_get_tipset_by_height(
        &self,
        caller: &Caller,
        height: ChainEpoch,
        key: &TipSetKey,
    ) -> Result<TipSet, GatewayError> {
        self.guard(caller, TokenCost::Chain).await?;
        self.check_height_against(height, key).await?;
        Ok(self.target.chain_get_tipset_by_height(height, key).await?)
    }

    /// # Errors
    ///
    /// Admission denial, lookback rejection, or backend failure.
    pub async fn chain_get_tipset_after_height(
        &self,
        caller: &Caller,
        height: ChainEpoch,
        key: &TipSetKey,
    ) -> Result<TipSet, GatewayError> {
        self.guard(caller, TokenCost::Chain).await?;
        self.check_height_against(height, key).await?;
        Ok(self.target.chain_get_tipset_after_height(height, key).await?)
    }

    /// Searches for `message` at most `limit` epochs back from `from`. `None` searches as far
    /// as the message lookback cap allows.
    ///
    /// # Errors
    ///
    /// Admission denial, a limit above the cap, a `from` key outside the window, or backend
    /// failure.
    pub async fn state_search_msg(
        &self,
        caller: &Caller,
        from: &TipSetKey,
        message: &str,
        limit: Option<ChainEpoch>,
        allow_replaced: bool,
    ) -> Result<Option<MsgLookup>, GatewayError> {
        self.guard(caller, TokenCost::State).await?;
        let limit = self.checked(self.lookback.clamp_message_lookback(limit))?;
        self.checked(self.lookback.check_tipset_key(from).await)?;
        Ok(self.target.state_search_msg(from, message, limit, allow_replaced).await?)
    }

    /// # Errors
    ///
    /// Admission denial or backend failure.
    pub async fn wallet_balance(
        &self,
        caller: &Caller,
        address: &str,
    ) -> Result<TokenAmount, GatewayError> {
        self.guard(caller, TokenCost::Wallet).await?;
        Ok(self.target.wallet_balance(address).await?)
    }

    async fn check_height_against(
        &self,
        height: ChainEpoch,
        key: &TipSetKey,
    ) -> Result<(), GatewayError> {
        let ts = if key.is_empty() {
            self.target.chain_head().await?
        } else {
            self.target.chain_get_tipset(key).await?
        };
        self.checked(self.lookback.check_tipset_height(&ts, height))
    }

    fn checked<T>(&self, result: Result<T, LookbackError>) -> Result<T, GatewayError> {
        result.map_err(|e| {
            let err = GatewayError::from(e);
            if let GatewayError::Lookback(rejection) = &err {
                self.metrics.record_lookback_rejection(rejection);
                debug!(reason = rejection.as_metric_str(), error = %rejection, "lookback rejected");
            }
            err
        })
    }
}
