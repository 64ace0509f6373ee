//! Counting indexer double shared by the unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{GateError, GateResult};
use crate::indexer::{
    AssetContent, AssetMetadata, AssetOwnership, AssetRecord, EnhancedTransaction, LedgerIndexer,
    TokenTransfer,
};

pub(crate) struct MockIndexer {
    enhanced: Mutex<GateResult<Vec<EnhancedTransaction>>>,
    baseline: Mutex<GateResult<Vec<AssetRecord>>>,
    assets: Mutex<HashMap<String, AssetRecord>>,
    pub enhanced_calls: AtomicUsize,
    pub baseline_calls: AtomicUsize,
    pub asset_calls: AtomicUsize,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self {
            enhanced: Mutex::new(Ok(Vec::new())),
            baseline: Mutex::new(Ok(Vec::new())),
            assets: Mutex::new(HashMap::new()),
            enhanced_calls: AtomicUsize::new(0),
            baseline_calls: AtomicUsize::new(0),
            asset_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_enhanced(self, result: GateResult<Vec<EnhancedTransaction>>) -> Self {
        *self.enhanced.lock().unwrap() = result;
        self
    }

    pub fn with_baseline(self, result: GateResult<Vec<AssetRecord>>) -> Self {
        *self.baseline.lock().unwrap() = result;
        self
    }

    pub fn with_asset(self, asset: AssetRecord) -> Self {
        self.assets.lock().unwrap().insert(asset.id.clone(), asset);
        self
    }

    /// Serve `asset` for lookups of `asset_id`, whatever id the record carries
    pub fn insert_asset(&self, asset_id: &str, asset: AssetRecord) {
        self.assets.lock().unwrap().insert(asset_id.to_string(), asset);
    }

    pub fn set_baseline(&self, result: GateResult<Vec<AssetRecord>>) {
        *self.baseline.lock().unwrap() = result;
    }

    pub fn enhanced_calls(&self) -> usize {
        self.enhanced_calls.load(Ordering::SeqCst)
    }

    pub fn baseline_calls(&self) -> usize {
        self.baseline_calls.load(Ordering::SeqCst)
    }

    pub fn asset_calls(&self) -> usize {
        self.asset_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerIndexer for MockIndexer {
    async fn nft_transactions(&self, _account: &str) -> GateResult<Vec<EnhancedTransaction>> {
        self.enhanced_calls.fetch_add(1, Ordering::SeqCst);
        self.enhanced.lock().unwrap().clone()
    }

    async fn assets_by_owner(&self, _account: &str) -> GateResult<Vec<AssetRecord>> {
        self.baseline_calls.fetch_add(1, Ordering::SeqCst);
        self.baseline.lock().unwrap().clone()
    }

    async fn get_asset(&self, asset_id: &str) -> GateResult<AssetRecord> {
        self.asset_calls.fetch_add(1, Ordering::SeqCst);
        self.assets
            .lock()
            .unwrap()
            .get(asset_id)
            .cloned()
            .ok_or_else(|| GateError::NotFound(format!("asset {}", asset_id)))
    }
}

pub(crate) fn mint_tx(description: &str, mint: &str) -> EnhancedTransaction {
    EnhancedTransaction {
        tx_type: "COMPRESSED_NFT_MINT".to_string(),
        signature: format!("sig-{}", mint),
        description: Some(description.to_string()),
        token_transfers: vec![TokenTransfer {
            mint: Some(mint.to_string()),
        }],
        events: None,
    }
}

pub(crate) fn asset(id: &str, owner: &str, name: &str) -> AssetRecord {
    AssetRecord {
        id: id.to_string(),
        content: Some(AssetContent {
            metadata: Some(AssetMetadata {
                name: Some(name.to_string()),
                symbol: Some("ZKVIP".to_string()),
                image: None,
                attributes: Vec::new(),
            }),
        }),
        ownership: Some(AssetOwnership {
            owner: Some(owner.to_string()),
            delegate: None,
        }),
    }
}
