//! ============================================================================
//! Asset Resolver - Does an account hold the access credential?
//! ============================================================================
//! Lookup order for one call (no tier is retried):
//! 1. ownership cache
//! 2. enhanced tier: recent NFT mint events for the account
//! 3. baseline tier: DAS `getAssetsByOwner`
//!
//! The enhanced tier falls through on transport errors, malformed bodies or
//! zero mint events. If the baseline tier fails too the answer is `false`.
//! Whatever tier answers, the result is cached.
//! ============================================================================

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{GateCaches, OwnershipLookup};
use crate::config::GateConfig;
use crate::dispatch::JitteredDispatcher;
use crate::error::GateResult;
use crate::indexer::LedgerIndexer;

/// Which source produced an ownership answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Cache,
    Enhanced,
    Baseline,
    /// Both tiers failed; safe-by-default deny
    Unreachable,
}

/// Resolves credential ownership against the indexer tiers
pub struct AssetResolver {
    indexer: Arc<dyn LedgerIndexer>,
    caches: Arc<GateCaches>,
    enhanced_dispatcher: JitteredDispatcher,
    baseline_dispatcher: JitteredDispatcher,
}

impl AssetResolver {
    pub fn new(
        indexer: Arc<dyn LedgerIndexer>,
        caches: Arc<GateCaches>,
        enhanced_dispatcher: JitteredDispatcher,
        baseline_dispatcher: JitteredDispatcher,
    ) -> Self {
        Self {
            indexer,
            caches,
            enhanced_dispatcher,
            baseline_dispatcher,
        }
    }

    /// Resolver with dispatchers built from the config's jitter and timeout
    pub fn from_config(
        config: &GateConfig,
        indexer: Arc<dyn LedgerIndexer>,
        caches: Arc<GateCaches>,
    ) -> Self {
        let enhanced = JitteredDispatcher::new(
            Duration::from_millis(config.max_jitter_ms),
            config.upstream_timeout(),
        );
        let baseline = enhanced.with_max_jitter(Duration::from_millis(config.fallback_jitter_ms));
        Self::new(indexer, caches, enhanced, baseline)
    }

    /// Whether `account` owns a credential named `credential_name`
    pub async fn resolve_ownership(&self, account: &str, credential_name: &str) -> bool {
        self.resolve_credential(account, credential_name).await.0.owned
    }

    /// Full lookup result plus the source that produced it
    pub async fn resolve_credential(
        &self,
        account: &str,
        credential_name: &str,
    ) -> (OwnershipLookup, ResolutionSource) {
        if let Some(cached) = self.caches.ownership.get(account).await {
            debug!("Ownership for {} served from cache: {}", account, cached.owned);
            return (cached, ResolutionSource::Cache);
        }

        let (lookup, source) = match self.query_enhanced(account, credential_name).await {
            Ok(Some(lookup)) => (lookup, ResolutionSource::Enhanced),
            Ok(None) => {
                debug!("Enhanced tier had no mint events for {}, trying baseline", account);
                self.query_baseline_or_deny(account, credential_name).await
            }
            Err(e) => {
                warn!("Enhanced tier failed for {}: {} - falling back to baseline", account, e);
                self.query_baseline_or_deny(account, credential_name).await
            }
        };

        self.caches.ownership.set(account, lookup.clone()).await;
        info!(
            "Ownership for {}: {} (via {:?})",
            account, lookup.owned, source
        );
        (lookup, source)
    }

    /// Drop the cached answer for an account
    pub async fn invalidate(&self, account: &str) -> bool {
        self.caches.ownership.invalidate(account).await
    }

    /// `Ok(None)` when the tier has nothing to say (no mint events)
    async fn query_enhanced(
        &self,
        account: &str,
        credential_name: &str,
    ) -> GateResult<Option<OwnershipLookup>> {
        let indexer = Arc::clone(&self.indexer);
        let txs = self
            .enhanced_dispatcher
            .dispatch("enhanced transactions", || async move {
                indexer.nft_transactions(account).await
            })
            .await?;

        let credentials: Vec<_> = txs
            .iter()
            .filter(|tx| tx.is_mint())
            .map(|tx| tx.to_credential(account))
            .collect();

        if credentials.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            credentials
                .into_iter()
                .find(|c| c.metadata_name == credential_name)
                .map(|c| OwnershipLookup::owned(c.asset_id))
                .unwrap_or_else(OwnershipLookup::not_owned),
        ))
    }

    async fn query_baseline_or_deny(
        &self,
        account: &str,
        credential_name: &str,
    ) -> (OwnershipLookup, ResolutionSource) {
        match self.query_baseline(account, credential_name).await {
            Ok(lookup) => (lookup, ResolutionSource::Baseline),
            Err(e) => {
                warn!("Baseline tier failed for {}: {} - assuming no credential", account, e);
                (OwnershipLookup::not_owned(), ResolutionSource::Unreachable)
            }
        }
    }

    async fn query_baseline(
        &self,
        account: &str,
        credential_name: &str,
    ) -> GateResult<OwnershipLookup> {
        let indexer = Arc::clone(&self.indexer);
        let assets = self
            .baseline_dispatcher
            .dispatch("getAssetsByOwner", || async move {
                indexer.assets_by_owner(account).await
            })
            .await?;

        Ok(assets
            .iter()
            .map(|a| a.to_credential())
            .find(|c| c.metadata_name == credential_name)
            .map(|c| OwnershipLookup::owned(c.asset_id))
            .unwrap_or_else(OwnershipLookup::not_owned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;
    use crate::testing::{asset, mint_tx, MockIndexer};
    use tokio::time::advance;

    const PASS: &str = "ZKChat VIP Access Pass";

    fn resolver(indexer: MockIndexer) -> (AssetResolver, Arc<MockIndexer>) {
        let indexer = Arc::new(indexer);
        let caches = Arc::new(GateCaches::new(
            Duration::from_secs(300),
            Duration::from_secs(3600),
            Duration::from_secs(600),
        ));
        let dispatcher = JitteredDispatcher::new(Duration::from_millis(50), Duration::from_secs(5));
        let resolver = AssetResolver::new(
            indexer.clone(),
            caches,
            dispatcher,
            dispatcher.with_max_jitter(Duration::from_millis(20)),
        );
        (resolver, indexer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_enhanced_answer_wins() {
        let (resolver, indexer) = resolver(
            MockIndexer::new()
                .with_enhanced(Ok(vec![mint_tx(PASS, "Mint1")]))
                .with_baseline(Ok(vec![])),
        );

        let (lookup, source) = resolver.resolve_credential("W1", PASS).await;
        assert_eq!(lookup, OwnershipLookup::owned("Mint1"));
        assert_eq!(source, ResolutionSource::Enhanced);
        assert_eq!(indexer.enhanced_calls(), 1);
        assert_eq!(indexer.baseline_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enhanced_negative_answer_is_final() {
        let (resolver, indexer) = resolver(
            MockIndexer::new()
                .with_enhanced(Ok(vec![mint_tx("Some Other Collectible", "Mint2")]))
                .with_baseline(Ok(vec![asset("A1", "W1", PASS)])),
        );

        assert!(!resolver.resolve_ownership("W1", PASS).await);
        assert_eq!(indexer.baseline_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_enhanced_falls_back_to_baseline() {
        let mut sale = mint_tx(PASS, "Mint3");
        sale.tx_type = "NFT_SALE".to_string();
        let (resolver, indexer) = resolver(
            MockIndexer::new()
                .with_enhanced(Ok(vec![sale]))
                .with_baseline(Ok(vec![asset("Asset9", "W1", PASS)])),
        );

        let (lookup, source) = resolver.resolve_credential("W1", PASS).await;
        assert_eq!(lookup, OwnershipLookup::owned("Asset9"));
        assert_eq!(source, ResolutionSource::Baseline);
        assert_eq!(indexer.enhanced_calls(), 1);
        assert_eq!(indexer.baseline_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enhanced_error_falls_back_to_baseline() {
        let (resolver, _) = resolver(
            MockIndexer::new()
                .with_enhanced(Err(GateError::Transport("HTTP 503".into())))
                .with_baseline(Ok(vec![asset("Asset9", "W1", "Other"), asset("Asset10", "W1", PASS)])),
        );

        let (lookup, source) = resolver.resolve_credential("W1", PASS).await;
        assert_eq!(lookup.asset_id.as_deref(), Some("Asset10"));
        assert_eq!(source, ResolutionSource::Baseline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_tiers_failing_denies() {
        let (resolver, indexer) = resolver(
            MockIndexer::new()
                .with_enhanced(Err(GateError::UpstreamFormat("not an array".into())))
                .with_baseline(Err(GateError::Transport("connection refused".into()))),
        );

        let (lookup, source) = resolver.resolve_credential("W1", PASS).await;
        assert!(!lookup.owned);
        assert_eq!(source, ResolutionSource::Unreachable);
        assert_eq!(indexer.enhanced_calls(), 1);
        assert_eq!(indexer.baseline_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_tiers_until_ttl() {
        let (resolver, indexer) = resolver(
            MockIndexer::new().with_baseline(Ok(vec![asset("Asset9", "W1", PASS)])),
        );

        assert!(resolver.resolve_ownership("W1", PASS).await);
        assert!(resolver.resolve_ownership("W1", PASS).await);
        assert_eq!(indexer.enhanced_calls(), 1);
        assert_eq!(indexer.baseline_calls(), 1);

        // Revocation stays masked until the entry expires
        indexer.set_baseline(Ok(vec![]));
        advance(Duration::from_secs(299)).await;
        assert!(resolver.resolve_ownership("W1", PASS).await);
        assert_eq!(indexer.baseline_calls(), 1);

        advance(Duration::from_secs(2)).await;
        assert!(!resolver.resolve_ownership("W1", PASS).await);
        assert_eq!(indexer.enhanced_calls(), 2);
        assert_eq!(indexer.baseline_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_results_are_cached_too() {
        let (resolver, indexer) = resolver(MockIndexer::new());

        assert!(!resolver.resolve_ownership("W2", PASS).await);
        indexer.set_baseline(Ok(vec![asset("New", "W2", PASS)]));
        assert!(!resolver.resolve_ownership("W2", PASS).await);

        assert!(resolver.invalidate("W2").await);
        assert!(resolver.resolve_ownership("W2", PASS).await);
    }
}
