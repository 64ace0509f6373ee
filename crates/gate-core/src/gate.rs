//! ============================================================================
//! Access Gate - Per-(account, room) entry decisions
//! ============================================================================
//! Drives one account through the gating pipeline:
//!
//! Unchecked -> CheckingCache -> CheckingLocalSignal -> CheckingOwnership
//!           -> GeneratingProof -> Verifying -> Granted | Denied
//!
//! First match wins:
//! - a held Granted decision or a stored room grant admits immediately
//! - a recorded mint skips live ownership resolution
//! - otherwise the resolver must report the credential, or the account is denied
//! - a commitment is generated (or reused while unexpired) and verified
//!
//! Callers only ever see Granted / Denied / Pending. Concurrent checks for the
//! same pair are not deduplicated; every step is idempotent.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{GateCaches, TtlCache, MAX_CACHE_SIZE};
use crate::commitment::{Commitment, CommitmentEngine};
use crate::config::GateConfig;
use crate::dispatch::JitteredDispatcher;
use crate::indexer::LedgerIndexer;
use crate::resolver::AssetResolver;
use crate::signals::{SignalStore, StoredCommitment};

/// Pipeline states, in transition order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessState {
    Unchecked,
    CheckingCache,
    CheckingLocalSignal,
    CheckingOwnership,
    GeneratingProof,
    Verifying,
    Granted,
    Denied,
}

/// What a caller observes for an (account, room) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Granted,
    Denied,
    Pending,
}

impl From<bool> for AccessDecision {
    fn from(granted: bool) -> Self {
        if granted {
            AccessDecision::Granted
        } else {
            AccessDecision::Denied
        }
    }
}

/// Orchestrates resolver, commitment engine, caches and local signals
pub struct AccessGate {
    config: GateConfig,
    resolver: AssetResolver,
    engine: CommitmentEngine,
    caches: Arc<GateCaches>,
    signals: Arc<dyn SignalStore>,
    /// Held decisions per (account, room), bounded and expiring with verifications
    decisions: TtlCache<AccessDecision>,
}

impl AccessGate {
    /// Gate with its own caches
    pub fn new(
        config: GateConfig,
        indexer: Arc<dyn LedgerIndexer>,
        signals: Arc<dyn SignalStore>,
    ) -> Self {
        let caches = Arc::new(GateCaches::from_config(&config));
        Self::with_caches(config, indexer, signals, caches)
    }

    /// Gate sharing an existing set of caches
    pub fn with_caches(
        config: GateConfig,
        indexer: Arc<dyn LedgerIndexer>,
        signals: Arc<dyn SignalStore>,
        caches: Arc<GateCaches>,
    ) -> Self {
        let resolver = AssetResolver::from_config(&config, Arc::clone(&indexer), Arc::clone(&caches));
        let engine = CommitmentEngine::new(
            indexer,
            JitteredDispatcher::new(
                Duration::from_millis(config.max_jitter_ms),
                config.upstream_timeout(),
            ),
        );

        let decisions =
            TtlCache::with_capacity("decision", config.verification_ttl(), MAX_CACHE_SIZE);

        Self {
            config,
            resolver,
            engine,
            caches,
            signals,
            decisions,
        }
    }

    pub fn caches(&self) -> &Arc<GateCaches> {
        &self.caches
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    pub fn engine(&self) -> &CommitmentEngine {
        &self.engine
    }

    /// Last decision held for the pair, if any
    pub async fn decision(&self, account: &str, room: &str) -> Option<AccessDecision> {
        self.decisions.get(&decision_key(account, room)).await
    }

    /// Decide whether `account` may enter `room`
    pub async fn check_access(&self, account: &str, room: &str) -> AccessDecision {
        if !self.config.is_gated(room) {
            debug!("Room {} is open, granting {}", room, account);
            return AccessDecision::Granted;
        }

        self.transition(account, room, AccessState::Unchecked);

        // CheckingCache
        self.transition(account, room, AccessState::CheckingCache);
        if self.decision(account, room).await == Some(AccessDecision::Granted) {
            debug!("Held decision for {} in {}: Granted", account, room);
            self.transition(account, room, AccessState::Granted);
            return AccessDecision::Granted;
        }

        self.hold(account, room, AccessDecision::Pending).await;
        let decision = self.run_pipeline(account, room).await;
        self.hold(account, room, decision).await;

        info!("Access decision for {} in {}: {:?}", account, room, decision);
        decision
    }

    /// Forget every local reason to admit the pair
    pub async fn revoke(&self, account: &str, room: &str) -> anyhow::Result<bool> {
        self.decisions.invalidate(&decision_key(account, room)).await;
        self.resolver.invalidate(account).await;

        let removed = self.signals.revoke_room_access(account, room).await?;
        info!("Revoked {} in {} (stored grant removed: {})", account, room, removed);
        Ok(removed)
    }

    async fn run_pipeline(&self, account: &str, room: &str) -> AccessDecision {
        // CheckingLocalSignal
        self.transition(account, room, AccessState::CheckingLocalSignal);
        match self.signals.has_room_access(account, room).await {
            Ok(true) => {
                debug!("Stored room grant found for {} in {}", account, room);
                self.transition(account, room, AccessState::Granted);
                return AccessDecision::Granted;
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to read room grant for {}: {}", account, e),
        }

        let minted_asset = match self.signals.mint_record(account).await {
            Ok(Some(record)) => {
                debug!(
                    "Mint {} recorded for {}, skipping ownership lookup",
                    record.signature, account
                );
                Some(
                    record
                        .asset_id
                        .unwrap_or_else(|| self.config.default_asset_id.clone()),
                )
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read mint record for {}: {}", account, e);
                None
            }
        };

        let asset_id = match minted_asset {
            Some(asset_id) => asset_id,
            None => {
                self.transition(account, room, AccessState::CheckingOwnership);
                let (lookup, source) = self
                    .resolver
                    .resolve_credential(account, &self.config.credential_name)
                    .await;
                if !lookup.owned {
                    debug!("{} does not hold the credential ({:?})", account, source);
                    self.transition(account, room, AccessState::Denied);
                    return AccessDecision::Denied;
                }
                lookup
                    .asset_id
                    .unwrap_or_else(|| self.config.default_asset_id.clone())
            }
        };

        self.transition(account, room, AccessState::GeneratingProof);
        let commitment = self.commitment_for(account, room, &asset_id).await;

        self.transition(account, room, AccessState::Verifying);
        if !self.verify_cached(account, &commitment).await {
            self.transition(account, room, AccessState::Denied);
            return AccessDecision::Denied;
        }

        if let Err(e) = self.signals.grant_room_access(account, room).await {
            warn!("Failed to persist room grant for {} in {}: {}", account, room, e);
        }
        self.transition(account, room, AccessState::Granted);
        AccessDecision::Granted
    }

    /// Cached commitment while it is within its lifetime, else a fresh one
    async fn commitment_for(&self, account: &str, room: &str, asset_id: &str) -> Commitment {
        let key = format!("{}_{}", account, asset_id);
        let lifetime = self.config.proof_lifetime();
        let now_ms = chrono::Utc::now().timestamp_millis();

        if let Some(cached) = self.caches.commitments.get(&key).await {
            if !cached.is_expired(now_ms, lifetime) {
                debug!("Reusing cached commitment for {} / {}", account, asset_id);
                return cached;
            }
            debug!("Cached commitment for {} / {} expired", account, asset_id);
        }

        let commitment = self.engine.generate(account, asset_id).await;
        self.caches.commitments.set(&key, commitment.clone()).await;

        let record = StoredCommitment::new(account, room, &commitment, lifetime);
        if let Err(e) = self.signals.store_commitment(&record).await {
            warn!("Failed to store commitment for {}: {}", account, e);
        }
        commitment
    }

    async fn verify_cached(&self, account: &str, commitment: &Commitment) -> bool {
        let key = format!(
            "{}_{}_{}",
            account,
            commitment.issued_at_ms().unwrap_or_default(),
            commitment.digest().unwrap_or_default()
        );

        if let Some(verified) = self.caches.verifications.get(&key).await {
            debug!("Verification for {} served from cache: {}", account, verified);
            return verified;
        }

        match self.engine.verify_detailed(commitment) {
            Ok(verification) => {
                if let Some(reason) = &verification.reason {
                    warn!("Commitment for {} rejected: {}", account, reason);
                }
                self.caches
                    .verifications
                    .set(&key, verification.verified)
                    .await;
                verification.verified
            }
            Err(e) => {
                warn!("Commitment for {} is malformed: {}", account, e);
                false
            }
        }
    }

    async fn hold(&self, account: &str, room: &str, decision: AccessDecision) {
        self.decisions.set(&decision_key(account, room), decision).await;
    }

    fn transition(&self, account: &str, room: &str, state: AccessState) {
        debug!("[{} / {}] -> {:?}", account, room, state);
    }
}

fn decision_key(account: &str, room: &str) -> String {
    format!("{}:{}:{}", account.len(), account, room)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{MemorySignalStore, MintRecord};
    use crate::testing::{asset, MockIndexer};

    const PASS: &str = "ZKChat VIP Access Pass";

    fn gate_with(
        config: GateConfig,
        indexer: MockIndexer,
    ) -> (AccessGate, Arc<MockIndexer>, Arc<MemorySignalStore>) {
        let indexer = Arc::new(indexer);
        let signals = Arc::new(MemorySignalStore::new());
        let gate = AccessGate::new(config, indexer.clone(), signals.clone());
        (gate, indexer, signals)
    }

    fn gate(indexer: MockIndexer) -> (AccessGate, Arc<MockIndexer>, Arc<MemorySignalStore>) {
        gate_with(GateConfig::new("test-key"), indexer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_owner_denied_without_generating() {
        let (gate, indexer, signals) = gate(MockIndexer::new());

        assert_eq!(gate.check_access("A1", "vip").await, AccessDecision::Denied);
        assert_eq!(gate.decision("A1", "vip").await, Some(AccessDecision::Denied));
        assert_eq!(indexer.asset_calls(), 0);
        assert!(!signals.has_room_access("A1", "vip").await.unwrap());
        assert!(signals.list_commitments("A1").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mint_record_skips_resolution() {
        let (gate, indexer, signals) = gate(MockIndexer::new());
        signals
            .record_mint("A2", &MintRecord::new("5mintsig", None))
            .await
            .unwrap();

        assert_eq!(gate.check_access("A2", "vip").await, AccessDecision::Granted);
        assert_eq!(indexer.enhanced_calls(), 0);
        assert_eq!(indexer.baseline_calls(), 0);
        assert_eq!(indexer.asset_calls(), 1);
        assert!(signals.has_room_access("A2", "vip").await.unwrap());

        let stored = signals.list_commitments("A2").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].inputs[1], "zkchat-vip-access");
    }

    #[tokio::test(start_paused = true)]
    async fn test_owner_granted_on_ledger_path() {
        let (gate, indexer, signals) = gate(
            MockIndexer::new()
                .with_baseline(Ok(vec![asset("Asset7", "W1", PASS)]))
                .with_asset(asset("Asset7", "W1", PASS)),
        );

        assert_eq!(gate.check_access("W1", "vip").await, AccessDecision::Granted);
        assert_eq!(indexer.baseline_calls(), 1);

        let stored = signals.list_commitments("W1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].path, Some(crate::commitment::CommitmentPath::Ledger));
        assert_eq!(stored[0].inputs[1], "Asset7");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stored_grant_short_circuits() {
        let (gate, indexer, signals) = gate(MockIndexer::new());
        signals.grant_room_access("W1", "vip").await.unwrap();

        assert_eq!(gate.check_access("W1", "vip").await, AccessDecision::Granted);
        assert_eq!(indexer.enhanced_calls(), 0);
        assert_eq!(indexer.baseline_calls(), 0);
        assert_eq!(indexer.asset_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_grant_is_reused() {
        let (gate, indexer, signals) = gate(MockIndexer::new());
        signals.record_mint("W1", &MintRecord::new("sig", None)).await.unwrap();

        assert_eq!(gate.check_access("W1", "vip").await, AccessDecision::Granted);
        assert_eq!(gate.check_access("W1", "vip").await, AccessDecision::Granted);
        assert_eq!(indexer.asset_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_room_granted_without_pipeline() {
        let (gate, indexer, _) = gate(MockIndexer::new());

        assert_eq!(gate.check_access("W9", "general").await, AccessDecision::Granted);
        assert_eq!(indexer.enhanced_calls(), 0);
        assert_eq!(indexer.baseline_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_room_checks_hold_nothing() {
        let (gate, _, _) = gate(MockIndexer::new());

        for i in 0..10_000 {
            let account = format!("W{}", i);
            assert_eq!(gate.check_access(&account, "general").await, AccessDecision::Granted);
        }
        assert_eq!(gate.decision("W0", "general").await, None);
        assert_eq!(gate.decisions.stats().await.total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_decisions_are_bounded() {
        let (gate, _, _) = gate(MockIndexer::new());

        for i in 0..(MAX_CACHE_SIZE + 50) {
            let account = format!("A{}", i);
            assert_eq!(gate.check_access(&account, "vip").await, AccessDecision::Denied);
        }
        assert!(gate.decisions.stats().await.total <= MAX_CACHE_SIZE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_decision_expires_with_verification_ttl() {
        let (gate, _, _) = gate(MockIndexer::new());

        assert_eq!(gate.check_access("A1", "vip").await, AccessDecision::Denied);
        assert_eq!(gate.decision("A1", "vip").await, Some(AccessDecision::Denied));

        tokio::time::advance(gate.config.verification_ttl() + Duration::from_secs(1)).await;
        assert_eq!(gate.decision("A1", "vip").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revoke_forces_full_recheck() {
        let (gate, indexer, signals) = gate(
            MockIndexer::new().with_baseline(Ok(vec![asset("Asset7", "W1", PASS)])),
        );

        assert_eq!(gate.check_access("W1", "vip").await, AccessDecision::Granted);
        assert!(gate.revoke("W1", "vip").await.unwrap());
        assert_eq!(gate.decision("W1", "vip").await, None);
        assert!(!signals.has_room_access("W1", "vip").await.unwrap());

        indexer.set_baseline(Ok(vec![]));
        assert_eq!(gate.check_access("W1", "vip").await, AccessDecision::Denied);
        assert_eq!(indexer.baseline_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commitment_reused_within_lifetime() {
        let (gate, indexer, signals) = gate(MockIndexer::new());

        let first = gate.commitment_for("W1", "vip", "X").await;
        let second = gate.commitment_for("W1", "vip", "X").await;
        assert_eq!(first, second);
        assert_eq!(indexer.asset_calls(), 1);
        assert_eq!(signals.list_commitments("W1").await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_commitment_is_regenerated() {
        let mut config = GateConfig::new("test-key");
        config.proof_lifetime_secs = 0;
        let (gate, indexer, signals) = gate_with(config, MockIndexer::new());

        gate.commitment_for("W1", "vip", "X").await;
        gate.commitment_for("W1", "vip", "X").await;
        assert_eq!(indexer.asset_calls(), 2);
        assert_eq!(signals.list_commitments("W1").await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tampered_commitment_fails_verification() {
        let (gate, _, _) = gate(MockIndexer::new());

        let mut commitment = gate.commitment_for("W1", "vip", "X").await;
        assert!(gate.verify_cached("W1", &commitment).await);

        commitment.inputs[0] = "W2".to_string();
        assert!(!gate.verify_cached("W2", &commitment).await);

        commitment.inputs.truncate(2);
        assert!(!gate.verify_cached("W2", &commitment).await);
    }
}
