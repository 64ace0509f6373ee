//! ============================================================================
//! Signals Module - Local shortcuts that skip repeated verification
//! ============================================================================
//! Per-account flags the access gate consults before going upstream:
//! - `room_access:{len}:{account}:{room}` - access was granted before
//! - `mint_signature:{account}` - a mint succeeded for this account
//! plus the ledger of commitments the gate has issued.
//!
//! Multi-part keys length-prefix the account so no (account, room) pair can
//! spell another pair's key. Writes are last-writer-wins.
//! ============================================================================

mod db;
mod memory;
mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use db::GateDb;
pub use memory::MemorySignalStore;
pub use types::{MintRecord, RoomGrant, SignalStats, StoredCommitment};

/// Persisted per-account signals
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn has_room_access(&self, account: &str, room: &str) -> Result<bool>;

    async fn grant_room_access(&self, account: &str, room: &str) -> Result<()>;

    /// Returns whether a grant existed
    async fn revoke_room_access(&self, account: &str, room: &str) -> Result<bool>;

    async fn mint_record(&self, account: &str) -> Result<Option<MintRecord>>;

    async fn record_mint(&self, account: &str, record: &MintRecord) -> Result<()>;

    async fn store_commitment(&self, record: &StoredCommitment) -> Result<()>;

    async fn list_commitments(&self, account: &str) -> Result<Vec<StoredCommitment>>;

    /// Delete commitments past their lifetime; returns how many were removed
    async fn prune_expired_commitments(&self, now_ms: i64) -> Result<usize>;

    async fn stats(&self) -> Result<SignalStats>;
}

fn account_scope(account: &str) -> String {
    format!("{}:{}:", account.len(), account)
}

fn room_prefix(account: &str) -> String {
    format!("room_access:{}", account_scope(account))
}

fn room_key(account: &str, room: &str) -> String {
    format!("{}{}", room_prefix(account), room)
}

fn mint_key(account: &str) -> String {
    format!("mint_signature:{}", account)
}

fn commitment_prefix(account: &str) -> String {
    format!("commitments:{}", account_scope(account))
}

fn commitment_key(record: &StoredCommitment) -> String {
    format!("{}{}", commitment_prefix(&record.account), record.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_keys_do_not_collide_across_separators() {
        assert_ne!(room_key("a", "b:vip"), room_key("a:b", "vip"));
        assert!(!room_key("a:b", "vip").starts_with(&room_prefix("a")));
    }

    #[test]
    fn test_commitment_prefix_is_account_exact() {
        assert!(!commitment_prefix("A:x").starts_with(&commitment_prefix("A")));
        assert!(!commitment_prefix("A1").starts_with(&commitment_prefix("A")));
    }
}
