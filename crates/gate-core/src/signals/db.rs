// ============================================================================
// GateDb - Local Signal Store (redb)
// ============================================================================
// Persistent local storage for room grants, mint records and issued
// commitments. Default path: ~/.vipgate/signals.redb (override via
// GATE_DB_PATH)
//
// redb transactions block (commits fsync), so every async entry point runs
// on tokio's blocking pool.
// ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redb::{Database, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::types::{MintRecord, RoomGrant, SignalStats, StoredCommitment};
use super::{commitment_key, commitment_prefix, mint_key, room_key, room_prefix, SignalStore};

type SignalTable = TableDefinition<'static, &'static str, &'static [u8]>;

// Table definitions
const ROOM_GRANTS: SignalTable = TableDefinition::new("signals");
const MINTS: SignalTable = TableDefinition::new("mints");
const COMMITMENTS: SignalTable = TableDefinition::new("commitments");

/// Embedded signal database; clones share one handle
#[derive(Clone)]
pub struct GateDb {
    db: Arc<Database>,
    path: PathBuf,
}

impl GateDb {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses ~/.vipgate/signals.redb
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let db_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let home =
                    dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
                let gate_dir = home.join(".vipgate");
                std::fs::create_dir_all(&gate_dir)
                    .map_err(|e| anyhow!("Failed to create .vipgate directory: {}", e))?;
                gate_dir.join("signals.redb")
            }
        };

        info!("Opening signal database at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Ensure tables exist by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        for table in [ROOM_GRANTS, MINTS, COMMITMENTS] {
            write_txn
                .open_table(table)
                .map_err(|e| anyhow!("Failed to create table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self {
            db: Arc::new(db),
            path: db_path,
        })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every room grant for an account
    pub async fn list_room_grants(&self, account: &str) -> Result<Vec<RoomGrant>> {
        let account = account.to_string();
        self.blocking(move |db| {
            Ok(db
                .scan::<RoomGrant>(ROOM_GRANTS, &room_prefix(&account))?
                .into_iter()
                .map(|(_, grant)| grant)
                .filter(|grant| grant.account == account)
                .collect())
        })
        .await
    }

    /// Commitments across all accounts that are past their lifetime
    pub async fn expired_commitments(&self, now_ms: i64) -> Result<Vec<StoredCommitment>> {
        self.blocking(move |db| {
            Ok(db
                .scan::<StoredCommitment>(COMMITMENTS, "")?
                .into_iter()
                .map(|(_, record)| record)
                .filter(|record| record.is_expired(now_ms))
                .collect())
        })
        .await
    }

    /// Run a blocking closure against this database on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&GateDb) -> Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| anyhow!("Signal store task failed: {}", e))?
    }

    // ========================================================================
    // Table helpers
    // ========================================================================

    fn put<T: Serialize>(&self, table: SignalTable, key: &str, value: &T) -> Result<()> {
        let bytes =
            bincode::serialize(value).map_err(|e| anyhow!("Failed to serialize {}: {}", key, e))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn
                .open_table(table)
                .map_err(|e| anyhow!("Failed to open table: {}", e))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(|e| anyhow!("Failed to insert {}: {}", key, e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, table: SignalTable, key: &str) -> Result<Option<T>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(table)
            .map_err(|e| anyhow!("Failed to open table: {}", e))?;

        match table.get(key).map_err(|e| anyhow!("Failed to get {}: {}", key, e))? {
            Some(value) => {
                let decoded = bincode::deserialize(value.value())
                    .map_err(|e| anyhow!("Failed to deserialize {}: {}", key, e))?;
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, table: SignalTable, keys: &[String]) -> Result<usize> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let mut removed = 0;
        {
            let mut table = write_txn
                .open_table(table)
                .map_err(|e| anyhow!("Failed to open table: {}", e))?;
            for key in keys {
                if table
                    .remove(key.as_str())
                    .map_err(|e| anyhow!("Failed to remove {}: {}", key, e))?
                    .is_some()
                {
                    removed += 1;
                }
            }
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;
        Ok(removed)
    }

    /// All (key, value) pairs whose key starts with `prefix`
    fn scan<T: DeserializeOwned>(
        &self,
        table: SignalTable,
        prefix: &str,
    ) -> Result<Vec<(String, T)>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(table)
            .map_err(|e| anyhow!("Failed to open table: {}", e))?;

        let mut results = Vec::new();
        let iter = table
            .range::<&str>(prefix..)
            .map_err(|e| anyhow!("Failed to iterate: {}", e))?;
        for entry in iter {
            let (key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            let decoded: T = bincode::deserialize(value.value())
                .map_err(|e| anyhow!("Failed to deserialize {}: {}", key, e))?;
            results.push((key.to_string(), decoded));
        }
        Ok(results)
    }

    fn count(&self, table: SignalTable) -> Result<usize> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(table)
            .map_err(|e| anyhow!("Failed to open table: {}", e))?;
        Ok(table
            .range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate: {}", e))?
            .count())
    }
}

#[async_trait]
impl SignalStore for GateDb {
    async fn has_room_access(&self, account: &str, room: &str) -> Result<bool> {
        let key = room_key(account, room);
        self.blocking(move |db| Ok(db.fetch::<RoomGrant>(ROOM_GRANTS, &key)?.is_some()))
            .await
    }

    async fn grant_room_access(&self, account: &str, room: &str) -> Result<()> {
        let key = room_key(account, room);
        let grant = RoomGrant {
            account: account.to_string(),
            room: room.to_string(),
            granted_at: chrono::Utc::now().timestamp(),
        };
        self.blocking(move |db| db.put(ROOM_GRANTS, &key, &grant)).await?;
        debug!("Stored room grant: {} -> {}", account, room);
        Ok(())
    }

    async fn revoke_room_access(&self, account: &str, room: &str) -> Result<bool> {
        let key = room_key(account, room);
        let removed = self.blocking(move |db| db.delete(ROOM_GRANTS, &[key])).await? > 0;
        if removed {
            debug!("Revoked room grant: {} -> {}", account, room);
        }
        Ok(removed)
    }

    async fn mint_record(&self, account: &str) -> Result<Option<MintRecord>> {
        let key = mint_key(account);
        self.blocking(move |db| db.fetch(MINTS, &key)).await
    }

    async fn record_mint(&self, account: &str, record: &MintRecord) -> Result<()> {
        let key = mint_key(account);
        let value = record.clone();
        self.blocking(move |db| db.put(MINTS, &key, &value)).await?;
        debug!("Stored mint signature for {}: {}", account, record.signature);
        Ok(())
    }

    async fn store_commitment(&self, record: &StoredCommitment) -> Result<()> {
        let key = commitment_key(record);
        let value = record.clone();
        self.blocking(move |db| db.put(COMMITMENTS, &key, &value)).await?;
        debug!("Stored commitment {} for {}", record.id, record.account);
        Ok(())
    }

    async fn list_commitments(&self, account: &str) -> Result<Vec<StoredCommitment>> {
        let account = account.to_string();
        self.blocking(move |db| {
            Ok(db
                .scan::<StoredCommitment>(COMMITMENTS, &commitment_prefix(&account))?
                .into_iter()
                .map(|(_, record)| record)
                .filter(|record| record.account == account)
                .collect())
        })
        .await
    }

    async fn prune_expired_commitments(&self, now_ms: i64) -> Result<usize> {
        let deleted = self
            .blocking(move |db| {
                let expired: Vec<String> = db
                    .scan::<StoredCommitment>(COMMITMENTS, "")?
                    .into_iter()
                    .filter(|(_, record)| record.is_expired(now_ms))
                    .map(|(key, _)| key)
                    .collect();
                db.delete(COMMITMENTS, &expired)
            })
            .await?;

        if deleted > 0 {
            info!("Pruned {} expired commitments", deleted);
        }
        Ok(deleted)
    }

    async fn stats(&self) -> Result<SignalStats> {
        self.blocking(|db| {
            Ok(SignalStats {
                room_grants: db.count(ROOM_GRANTS)?,
                mint_records: db.count(MINTS)?,
                commitments: db.count(COMMITMENTS)?,
            })
        })
        .await
    }
}
