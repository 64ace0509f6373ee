//! ============================================================================
//! GATE-CORE: Credential-gated room access
//! ============================================================================
//! Decides whether an account may enter a gated room by:
//! - resolving credential ownership through two indexer tiers (enhanced, baseline)
//! - committing to (account, asset) and verifying the commitment locally
//! - caching each step with its own TTL and remembering grants as local signals
//!
//! Every upstream call goes through a jittered, time-bounded dispatcher.
//! ============================================================================

pub mod cache;
pub mod commitment;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod indexer;
pub mod resolver;
pub mod signals;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use cache::{CacheStats, GateCaches, OwnershipLookup, TtlCache};
pub use commitment::{
    fallback_commitment, verify_commitment, Commitment, CommitmentEngine, CommitmentPath,
    Verification,
};
pub use config::GateConfig;
pub use dispatch::JitteredDispatcher;
pub use error::{GateError, GateResult};
pub use gate::{AccessDecision, AccessGate, AccessState};
pub use indexer::{HeliusIndexer, LedgerIndexer};
pub use resolver::{AssetResolver, ResolutionSource};
pub use signals::{GateDb, MemorySignalStore, MintRecord, SignalStats, SignalStore, StoredCommitment};
