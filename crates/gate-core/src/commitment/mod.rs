//! ============================================================================
//! Commitment Module - Ownership commitments exchanged with the gate
//! ============================================================================
//! A commitment binds (account, asset, issued-at) into a short digest. It is a
//! disclosed assertion, not a zero-knowledge proof: account and asset travel
//! in the clear inside `inputs`.
//!
//! ## Wire shape
//! ```text
//! { "proof": <payload>, "inputs": [account, asset_id, issued_at_ms, digest] }
//! ```
//! `payload` is either a serialized ledger record (ledger path) or
//! hex(sha256(account:asset:ts)) ++ hex(sha256("verify:" ++ that))[..32]
//! (fallback path).
//! ============================================================================

mod engine;

pub use engine::{fallback_commitment, verify_commitment, CommitmentEngine, Verification};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::error::{GateError, GateResult};

/// Hex characters kept from a digest as the commitment
pub const COMMITMENT_DIGEST_LEN: usize = 16;

/// Hex characters of the verification digest appended to fallback payloads
pub const VERIFY_DIGEST_LEN: usize = 32;

/// Number of entries in `inputs`
pub const COMMITMENT_INPUT_COUNT: usize = 4;

/// Which generation path produced a commitment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentPath {
    /// Payload is the indexer's asset record
    Ledger,
    /// Payload is a pair of local hash digests
    Fallback,
}

/// Ownership commitment ("proof")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    #[serde(rename = "proof")]
    pub payload: String,
    /// [account, asset_id, issued_at_ms, digest]
    pub inputs: Vec<String>,
    /// Observability only; verification never reads it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<CommitmentPath>,
}

/// Borrowed, validated view of a commitment's inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitmentInputs<'a> {
    pub account: &'a str,
    pub asset_id: &'a str,
    pub issued_at: &'a str,
    pub digest: &'a str,
}

impl Commitment {
    /// The four inputs, or an error if any is missing or empty
    pub fn parsed_inputs(&self) -> GateResult<CommitmentInputs<'_>> {
        if self.inputs.len() != COMMITMENT_INPUT_COUNT {
            return Err(GateError::MalformedCommitment(format!(
                "expected {} inputs, got {}",
                COMMITMENT_INPUT_COUNT,
                self.inputs.len()
            )));
        }
        const NAMES: [&str; COMMITMENT_INPUT_COUNT] = ["account", "asset_id", "issued_at", "digest"];
        for (value, name) in self.inputs.iter().zip(NAMES) {
            if value.is_empty() {
                return Err(GateError::MalformedCommitment(format!("{} is empty", name)));
            }
        }
        Ok(CommitmentInputs {
            account: &self.inputs[0],
            asset_id: &self.inputs[1],
            issued_at: &self.inputs[2],
            digest: &self.inputs[3],
        })
    }

    pub fn account(&self) -> Option<&str> {
        self.inputs.first().map(String::as_str)
    }

    pub fn asset_id(&self) -> Option<&str> {
        self.inputs.get(1).map(String::as_str)
    }

    pub fn digest(&self) -> Option<&str> {
        self.inputs.get(3).map(String::as_str)
    }

    /// Issue time in unix milliseconds
    pub fn issued_at_ms(&self) -> GateResult<i64> {
        let inputs = self.parsed_inputs()?;
        inputs.issued_at.parse::<i64>().map_err(|e| {
            GateError::MalformedCommitment(format!("issued_at {:?}: {}", inputs.issued_at, e))
        })
    }

    pub fn expires_at_ms(&self, lifetime: Duration) -> GateResult<i64> {
        Ok(self.issued_at_ms()?.saturating_add(lifetime.as_millis() as i64))
    }

    /// Past its validity window; malformed commitments count as expired
    pub fn is_expired(&self, now_ms: i64, lifetime: Duration) -> bool {
        match self.expires_at_ms(lifetime) {
            Ok(expires_at) => now_ms >= expires_at,
            Err(_) => true,
        }
    }
}

/// SHA-256 over `account:asset_id:issued_at`
pub fn binding_digest(account: &str, asset_id: &str, issued_at: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(account.as_bytes());
    hasher.update(b":");
    hasher.update(asset_id.as_bytes());
    hasher.update(b":");
    hasher.update(issued_at.as_bytes());
    hasher.finalize().into()
}

/// First 16 hex characters of the binding digest
pub fn commitment_digest(account: &str, asset_id: &str, issued_at: &str) -> String {
    let mut digest = hex::encode(binding_digest(account, asset_id, issued_at));
    digest.truncate(COMMITMENT_DIGEST_LEN);
    digest
}
