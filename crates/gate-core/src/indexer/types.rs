//! ============================================================================
//! Indexer Types - Tagged response shapes for both indexer tiers
//! ============================================================================
//! Upstream JSON is validated at the boundary into these types. Anything that
//! doesn't fit is an UpstreamFormat error, never a half-parsed value.
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{GateError, GateResult};

/// Enhanced transaction types that count as a credential mint
pub const MINT_TRANSACTION_TYPES: [&str; 2] = ["NFT_MINT", "COMPRESSED_NFT_MINT"];

/// Metadata name used when a mint event carries no description
const UNNAMED_CREDENTIAL: &str = "NFT";

/// The NFT-like object a caller claims to hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub asset_id: String,
    pub owner_account: Option<String>,
    pub metadata_name: String,
    #[serde(default)]
    pub metadata_attributes: Vec<Attribute>,
    #[serde(default)]
    pub image: Option<String>,
}

/// NFT metadata attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default)]
    pub trait_type: String,
    pub value: serde_json::Value,
}

// ============================================================================
// Enhanced tier: GET /addresses/{account}/transactions?type=NFT
// ============================================================================

/// Body of the enhanced transactions endpoint
pub type EnhancedTxResponse = Vec<EnhancedTransaction>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedTransaction {
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub token_transfers: Vec<TokenTransfer>,
    #[serde(default)]
    pub events: Option<EnhancedEvents>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTransfer {
    #[serde(default)]
    pub mint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedEvents {
    #[serde(default)]
    pub nft: Option<NftEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftEvent {
    #[serde(default)]
    pub image: Option<String>,
}

impl EnhancedTransaction {
    pub fn is_mint(&self) -> bool {
        MINT_TRANSACTION_TYPES.contains(&self.tx_type.as_str())
    }

    /// Synthetic credential record for a mint event seen on `account`
    pub fn to_credential(&self, account: &str) -> CredentialRecord {
        let asset_id = self
            .token_transfers
            .first()
            .and_then(|t| t.mint.clone())
            .unwrap_or_else(|| self.signature.clone());

        CredentialRecord {
            asset_id,
            owner_account: Some(account.to_string()),
            metadata_name: self
                .description
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| UNNAMED_CREDENTIAL.to_string()),
            metadata_attributes: Vec::new(),
            image: self.image().map(str::to_string),
        }
    }

    pub fn image(&self) -> Option<&str> {
        self.events
            .as_ref()
            .and_then(|e| e.nft.as_ref())
            .and_then(|n| n.image.as_deref())
    }
}

// ============================================================================
// Baseline tier: JSON-RPC getAssetsByOwner / getAsset
// ============================================================================

/// JSON-RPC envelope
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl<T> RpcResponse<T> {
    /// Unwrap the envelope; an error object or a missing result is a format error
    pub fn into_result(self, method: &str) -> GateResult<T> {
        if let Some(err) = self.error {
            return Err(GateError::UpstreamFormat(format!(
                "{} returned error {}: {}",
                method, err.code, err.message
            )));
        }
        self.result
            .ok_or_else(|| GateError::UpstreamFormat(format!("{} returned no result", method)))
    }
}

/// Body of `getAssetsByOwner`
pub type BaselineAssetResponse = RpcResponse<AssetPage>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPage {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub items: Vec<AssetRecord>,
}

/// DAS asset as returned by `getAsset` and inside `getAssetsByOwner` pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: String,
    #[serde(default)]
    pub content: Option<AssetContent>,
    #[serde(default)]
    pub ownership: Option<AssetOwnership>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetContent {
    #[serde(default)]
    pub metadata: Option<AssetMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetOwnership {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub delegate: Option<String>,
}

impl AssetRecord {
    pub fn metadata(&self) -> Option<&AssetMetadata> {
        self.content.as_ref().and_then(|c| c.metadata.as_ref())
    }

    pub fn metadata_name(&self) -> Option<&str> {
        self.metadata().and_then(|m| m.name.as_deref())
    }

    pub fn owner(&self) -> Option<&str> {
        self.ownership.as_ref().and_then(|o| o.owner.as_deref())
    }

    pub fn to_credential(&self) -> CredentialRecord {
        CredentialRecord {
            asset_id: self.id.clone(),
            owner_account: self.owner().map(str::to_string),
            metadata_name: self.metadata_name().unwrap_or_default().to_string(),
            metadata_attributes: self
                .metadata()
                .map(|m| m.attributes.clone())
                .unwrap_or_default(),
            image: self.metadata().and_then(|m| m.image.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhanced_mint_maps_to_credential() {
        let body = r#"[
            {
                "type": "COMPRESSED_NFT_MINT",
                "signature": "5sig",
                "description": "ZKChat VIP Access Pass",
                "tokenTransfers": [{"mint": "AssetMint111"}],
                "events": {"nft": {"image": "https://placehold.co/300"}}
            },
            {"type": "NFT_SALE", "signature": "6sig"}
        ]"#;
        let txs: EnhancedTxResponse = serde_json::from_str(body).unwrap();
        assert_eq!(txs.len(), 2);
        assert!(txs[0].is_mint());
        assert!(!txs[1].is_mint());

        let record = txs[0].to_credential("Owner111");
        assert_eq!(record.asset_id, "AssetMint111");
        assert_eq!(record.owner_account.as_deref(), Some("Owner111"));
        assert_eq!(record.metadata_name, "ZKChat VIP Access Pass");
        assert_eq!(record.image.as_deref(), Some("https://placehold.co/300"));
    }

    #[test]
    fn test_enhanced_mint_without_transfer_uses_signature() {
        let tx: EnhancedTransaction =
            serde_json::from_str(r#"{"type": "NFT_MINT", "signature": "5sig"}"#).unwrap();
        let record = tx.to_credential("Owner111");
        assert_eq!(record.asset_id, "5sig");
        assert_eq!(record.metadata_name, "NFT");
    }

    #[test]
    fn test_baseline_page_parses() {
        let body = r#"{
            "jsonrpc": "2.0",
            "id": "gate-assets",
            "result": {
                "total": 1,
                "items": [{
                    "id": "Asset1",
                    "content": {"metadata": {"name": "ZKChat VIP Access Pass", "symbol": "ZKVIP",
                        "attributes": [{"trait_type": "Access Level", "value": "VIP"}]}},
                    "ownership": {"owner": "Owner111", "delegate": null}
                }]
            }
        }"#;
        let response: BaselineAssetResponse = serde_json::from_str(body).unwrap();
        let page = response.into_result("getAssetsByOwner").unwrap();
        assert_eq!(page.items.len(), 1);

        let record = page.items[0].to_credential();
        assert_eq!(record.asset_id, "Asset1");
        assert_eq!(record.owner_account.as_deref(), Some("Owner111"));
        assert_eq!(record.metadata_name, "ZKChat VIP Access Pass");
        assert_eq!(record.metadata_attributes[0].trait_type, "Access Level");
    }

    #[test]
    fn test_rpc_error_envelope_is_format_error() {
        let body = r#"{"jsonrpc": "2.0", "error": {"code": -32602, "message": "Invalid params"}}"#;
        let response: BaselineAssetResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            response.into_result("getAssetsByOwner"),
            Err(GateError::UpstreamFormat(_))
        ));

        let response: BaselineAssetResponse = serde_json::from_str(r#"{"jsonrpc": "2.0"}"#).unwrap();
        assert!(matches!(
            response.into_result("getAssetsByOwner"),
            Err(GateError::UpstreamFormat(_))
        ));
    }
}
