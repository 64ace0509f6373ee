//! In-memory `SignalStore` for tests and ephemeral gates.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::types::{MintRecord, RoomGrant, SignalStats, StoredCommitment};
use super::{commitment_key, room_key, SignalStore};

#[derive(Default)]
struct Signals {
    grants: HashMap<String, RoomGrant>,
    mints: HashMap<String, MintRecord>,
    commitments: HashMap<String, StoredCommitment>,
}

#[derive(Default)]
pub struct MemorySignalStore {
    inner: RwLock<Signals>,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Signals) -> T) -> Result<T> {
        let guard = self
            .inner
            .read()
            .map_err(|_| anyhow!("signal store lock poisoned"))?;
        Ok(f(&guard))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Signals) -> T) -> Result<T> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| anyhow!("signal store lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

#[async_trait]
impl SignalStore for MemorySignalStore {
    async fn has_room_access(&self, account: &str, room: &str) -> Result<bool> {
        self.read(|s| s.grants.contains_key(&room_key(account, room)))
    }

    async fn grant_room_access(&self, account: &str, room: &str) -> Result<()> {
        let grant = RoomGrant {
            account: account.to_string(),
            room: room.to_string(),
            granted_at: chrono::Utc::now().timestamp(),
        };
        self.write(|s| {
            s.grants.insert(room_key(account, room), grant);
        })
    }

    async fn revoke_room_access(&self, account: &str, room: &str) -> Result<bool> {
        self.write(|s| s.grants.remove(&room_key(account, room)).is_some())
    }

    async fn mint_record(&self, account: &str) -> Result<Option<MintRecord>> {
        self.read(|s| s.mints.get(account).cloned())
    }

    async fn record_mint(&self, account: &str, record: &MintRecord) -> Result<()> {
        self.write(|s| {
            s.mints.insert(account.to_string(), record.clone());
        })
    }

    async fn store_commitment(&self, record: &StoredCommitment) -> Result<()> {
        self.write(|s| {
            s.commitments.insert(commitment_key(record), record.clone());
        })
    }

    async fn list_commitments(&self, account: &str) -> Result<Vec<StoredCommitment>> {
        self.read(|s| {
            s.commitments
                .values()
                .filter(|c| c.account == account)
                .cloned()
                .collect()
        })
    }

    async fn prune_expired_commitments(&self, now_ms: i64) -> Result<usize> {
        self.write(|s| {
            let before = s.commitments.len();
            s.commitments.retain(|_, c| !c.is_expired(now_ms));
            before - s.commitments.len()
        })
    }

    async fn stats(&self) -> Result<SignalStats> {
        self.read(|s| SignalStats {
            room_grants: s.grants.len(),
            mint_records: s.mints.len(),
            commitments: s.commitments.len(),
        })
    }
}
