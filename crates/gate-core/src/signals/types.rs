//! ============================================================================
//! Signal Types - Serializable records for the local signal store
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::commitment::{Commitment, CommitmentPath};

/// A successful credential mint observed for an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRecord {
    /// Mint transaction signature
    pub signature: String,
    /// Minted asset id, when the mint endpoint reported one
    pub asset_id: Option<String>,
    pub recorded_at: i64,
}

impl MintRecord {
    pub fn new(signature: impl Into<String>, asset_id: Option<String>) -> Self {
        Self {
            signature: signature.into(),
            asset_id,
            recorded_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Persisted "room access granted" flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomGrant {
    pub account: String,
    pub room: String,
    pub granted_at: i64,
}

/// A commitment issued by the gate, kept for audit and later presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCommitment {
    pub id: String,
    pub account: String,
    pub room: String,
    pub payload: String,
    pub inputs: Vec<String>,
    pub path: Option<CommitmentPath>,
    /// Unix milliseconds; 0 when the commitment's timestamp was unreadable
    pub expires_at_ms: i64,
    pub stored_at: i64,
}

impl StoredCommitment {
    pub fn new(account: &str, room: &str, commitment: &Commitment, lifetime: Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account: account.to_string(),
            room: room.to_string(),
            payload: commitment.payload.clone(),
            inputs: commitment.inputs.clone(),
            path: commitment.path,
            expires_at_ms: commitment.expires_at_ms(lifetime).unwrap_or(0),
            stored_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn commitment(&self) -> Commitment {
        Commitment {
            payload: self.payload.clone(),
            inputs: self.inputs.clone(),
            path: self.path,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Entry counts across the signal store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalStats {
    pub room_grants: usize,
    pub mint_records: usize,
    pub commitments: usize,
}
