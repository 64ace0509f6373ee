//! ============================================================================
//! Indexer Module - Upstream ledger views used for credential lookups
//! ============================================================================
//! Two tiers sit behind one trait:
//! - **Enhanced**: parsed NFT transaction history for an address (REST)
//! - **Baseline**: DAS JSON-RPC (`getAssetsByOwner`, `getAsset`)
//!
//! Callers hold an `Arc<dyn LedgerIndexer>` so tests can swap in doubles.
//! ============================================================================

mod helius;
mod types;

use async_trait::async_trait;

use crate::error::GateResult;

pub use helius::HeliusIndexer;
pub use types::{
    AssetContent, AssetMetadata, AssetOwnership, AssetPage, AssetRecord, Attribute,
    BaselineAssetResponse, CredentialRecord, EnhancedEvents, EnhancedTransaction,
    EnhancedTxResponse, NftEvent, RpcError, RpcResponse, TokenTransfer, MINT_TRANSACTION_TYPES,
};

/// Read access to ledger state through the indexer tiers
#[async_trait]
pub trait LedgerIndexer: Send + Sync {
    /// Enhanced tier: recent NFT transactions touching `account`
    async fn nft_transactions(&self, account: &str) -> GateResult<Vec<EnhancedTransaction>>;

    /// Baseline tier: assets currently owned by `account`
    async fn assets_by_owner(&self, account: &str) -> GateResult<Vec<AssetRecord>>;

    /// Baseline tier: a single asset by id
    async fn get_asset(&self, asset_id: &str) -> GateResult<AssetRecord>;
}
