//! ============================================================================
//! Commitment Engine - Generate and verify ownership commitments
//! ============================================================================
//! Generation prefers the ledger path (asset record from `getAsset`) and
//! degrades to the local-digest fallback on any indexer failure; it never
//! fails the caller. Verification is pure: no network, only the commitment's
//! own fields.
//! ============================================================================

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    binding_digest, Commitment, CommitmentPath, COMMITMENT_DIGEST_LEN, VERIFY_DIGEST_LEN,
};
use crate::dispatch::JitteredDispatcher;
use crate::error::{GateError, GateResult};
use crate::indexer::{AssetContent, AssetRecord, LedgerIndexer};

/// Ledger-path payload: the asset record as the indexer reported it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerPayload {
    id: String,
    ownership: PayloadOwnership,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<AssetContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PayloadOwnership {
    owner: String,
    #[serde(default)]
    delegate: Option<String>,
}

/// Outcome of a verification, with the path it was checked on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub path: CommitmentPath,
    pub verified: bool,
    /// Why a commitment failed to reconcile (diagnostics only)
    pub reason: Option<String>,
}

impl Verification {
    fn matched(path: CommitmentPath) -> Self {
        Self {
            path,
            verified: true,
            reason: None,
        }
    }

    fn mismatch(path: CommitmentPath, reason: String) -> Self {
        Self {
            path,
            verified: false,
            reason: Some(reason),
        }
    }
}

/// Produces and checks ownership commitments
pub struct CommitmentEngine {
    indexer: Arc<dyn LedgerIndexer>,
    dispatcher: JitteredDispatcher,
}

impl CommitmentEngine {
    pub fn new(indexer: Arc<dyn LedgerIndexer>, dispatcher: JitteredDispatcher) -> Self {
        Self { indexer, dispatcher }
    }

    /// Commit to (account, asset) at the current time
    pub async fn generate(&self, account: &str, asset_id: &str) -> Commitment {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.generate_at(account, asset_id, now_ms).await
    }

    /// Commit to (account, asset) at `issued_at_ms`
    pub async fn generate_at(&self, account: &str, asset_id: &str, issued_at_ms: i64) -> Commitment {
        let issued_at = issued_at_ms.to_string();

        match self.fetch_ledger_payload(account, asset_id).await {
            Ok((payload, ledger_id)) => {
                let digest: String = ledger_id.chars().take(COMMITMENT_DIGEST_LEN).collect();
                info!(
                    "Generated ledger commitment for {} / {}",
                    account, asset_id
                );
                Commitment {
                    payload,
                    inputs: vec![account.to_string(), asset_id.to_string(), issued_at, digest],
                    path: Some(CommitmentPath::Ledger),
                }
            }
            Err(e) => {
                warn!(
                    "Ledger commitment unavailable for {} ({}), using fallback digest",
                    asset_id, e
                );
                let commitment = fallback_commitment(account, asset_id, &issued_at);
                info!(
                    "Generated fallback commitment for {} / {}",
                    account, asset_id
                );
                commitment
            }
        }
    }

    /// Fetch the asset record and serialize it as owned by `account`;
    /// errors trigger the fallback path
    async fn fetch_ledger_payload(
        &self,
        account: &str,
        asset_id: &str,
    ) -> GateResult<(String, String)> {
        let indexer = Arc::clone(&self.indexer);
        let asset: AssetRecord = self
            .dispatcher
            .dispatch("getAsset", || async move { indexer.get_asset(asset_id).await })
            .await?;

        if asset.id.is_empty() {
            return Err(GateError::UpstreamFormat("asset record has no id".into()));
        }
        if asset.id != asset_id {
            return Err(GateError::UpstreamFormat(format!(
                "requested asset {} but indexer returned {}",
                asset_id, asset.id
            )));
        }
        if let Some(ledger_owner) = asset.owner().filter(|o| *o != account) {
            debug!(
                "Asset {} is held by {} on the ledger, committing for {}",
                asset.id, ledger_owner, account
            );
        }

        let payload = LedgerPayload {
            id: asset.id.clone(),
            ownership: PayloadOwnership {
                owner: account.to_string(),
                delegate: asset.ownership.as_ref().and_then(|o| o.delegate.clone()),
            },
            content: asset.content.clone(),
        };
        let serialized = serde_json::to_string(&payload)
            .map_err(|e| GateError::UpstreamFormat(format!("Failed to serialize asset: {}", e)))?;

        Ok((serialized, asset.id))
    }

    pub fn verify(&self, commitment: &Commitment) -> GateResult<bool> {
        verify_commitment(commitment).map(|v| v.verified)
    }

    pub fn verify_detailed(&self, commitment: &Commitment) -> GateResult<Verification> {
        verify_commitment(commitment)
    }
}

/// Fallback-path commitment from local digests only
pub fn fallback_commitment(account: &str, asset_id: &str, issued_at: &str) -> Commitment {
    let primary = hex::encode(binding_digest(account, asset_id, issued_at));
    let verify_hex = hex::encode(Sha256::digest(format!("verify:{}", primary).as_bytes()));

    let payload = format!("{}{}", primary, &verify_hex[..VERIFY_DIGEST_LEN]);
    let digest = primary[..COMMITMENT_DIGEST_LEN].to_string();

    Commitment {
        payload,
        inputs: vec![
            account.to_string(),
            asset_id.to_string(),
            issued_at.to_string(),
            digest,
        ],
        path: Some(CommitmentPath::Fallback),
    }
}

/// Check a commitment against its own fields.
///
/// A payload that parses as a ledger record is checked by id and owner;
/// anything else is treated as a fallback payload and the digest is
/// recomputed from `inputs`. Missing inputs are an error, not a mismatch.
pub fn verify_commitment(commitment: &Commitment) -> GateResult<Verification> {
    let inputs = commitment.parsed_inputs()?;

    match serde_json::from_str::<LedgerPayload>(&commitment.payload) {
        Ok(record) => {
            if record.id != inputs.asset_id {
                debug!("Ledger payload id {} != {}", record.id, inputs.asset_id);
                return Ok(Verification::mismatch(
                    CommitmentPath::Ledger,
                    format!("payload asset {} does not match {}", record.id, inputs.asset_id),
                ));
            }
            if record.ownership.owner != inputs.account {
                debug!(
                    "Ledger payload owner {} != {}",
                    record.ownership.owner, inputs.account
                );
                return Ok(Verification::mismatch(
                    CommitmentPath::Ledger,
                    format!(
                        "asset {} is owned by {}, not {}",
                        record.id, record.ownership.owner, inputs.account
                    ),
                ));
            }
            Ok(Verification::matched(CommitmentPath::Ledger))
        }
        Err(_) => {
            let recomputed = super::commitment_digest(inputs.account, inputs.asset_id, inputs.issued_at);
            if recomputed == inputs.digest {
                Ok(Verification::matched(CommitmentPath::Fallback))
            } else {
                Ok(Verification::mismatch(
                    CommitmentPath::Fallback,
                    format!("digest {} does not match recomputed {}", inputs.digest, recomputed),
                ))
            }
        }
    }
}
