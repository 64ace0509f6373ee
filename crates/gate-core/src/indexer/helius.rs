//! ============================================================================
//! Helius Indexer - reqwest client for the enhanced and DAS endpoints
//! ============================================================================
//! - Enhanced: GET {enhanced}/addresses/{account}/transactions?type=NFT
//! - Baseline: POST {rpc} JSON-RPC getAssetsByOwner / getAsset
//! ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::types::{AssetPage, AssetRecord, EnhancedTransaction, EnhancedTxResponse, RpcResponse};
use super::LedgerIndexer;
use crate::config::GateConfig;
use crate::error::{GateError, GateResult};

const USER_AGENT: &str = "vipgate/0.1";

/// Page size for `getAssetsByOwner`
const ASSETS_PAGE_LIMIT: u32 = 100;

/// Indexer client for Helius devnet/mainnet
pub struct HeliusIndexer {
    client: Client,
    api_key: String,
    rpc_url: String,
    enhanced_api_url: String,
}

impl HeliusIndexer {
    /// Create a client from the gate config
    pub fn new(config: &GateConfig) -> GateResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GateError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            rpc_url: config.rpc_url.trim_end_matches('/').to_string(),
            enhanced_api_url: config.enhanced_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Issue a JSON-RPC call and return the raw envelope
    async fn rpc_envelope<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> GateResult<RpcResponse<T>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": format!("vipgate-{}", method),
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .query(&[("api-key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| GateError::Transport(format!("{} request failed: {}", method, e)))?;

        let text = read_body(method, response).await?;
        parse_json(method, &text)
    }

    /// Issue a JSON-RPC call against the baseline endpoint
    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> GateResult<T> {
        self.rpc_envelope::<T>(method, params)
            .await?
            .into_result(method)
    }
}

#[async_trait]
impl LedgerIndexer for HeliusIndexer {
    async fn nft_transactions(&self, account: &str) -> GateResult<Vec<EnhancedTransaction>> {
        let url = format!("{}/addresses/{}/transactions", self.enhanced_api_url, account);
        debug!("Enhanced lookup for {}", account);

        let response = self
            .client
            .get(&url)
            .query(&[("api-key", self.api_key.as_str()), ("type", "NFT")])
            .send()
            .await
            .map_err(|e| GateError::Transport(format!("enhanced request failed: {}", e)))?;

        let text = read_body("enhanced API", response).await?;
        let txs: EnhancedTxResponse = parse_json("enhanced transactions", &text)?;
        debug!("Enhanced tier returned {} transactions for {}", txs.len(), account);
        Ok(txs)
    }

    async fn assets_by_owner(&self, account: &str) -> GateResult<Vec<AssetRecord>> {
        let page: AssetPage = self
            .rpc_call(
                "getAssetsByOwner",
                json!({
                    "ownerAddress": account,
                    "page": 1,
                    "limit": ASSETS_PAGE_LIMIT,
                    "displayOptions": { "showCompressedState": true },
                }),
            )
            .await?;
        debug!("Baseline tier returned {} assets for {}", page.items.len(), account);
        Ok(page.items)
    }

    async fn get_asset(&self, asset_id: &str) -> GateResult<AssetRecord> {
        let envelope = self
            .rpc_envelope::<AssetRecord>("getAsset", json!({ "id": asset_id }))
            .await?;
        asset_from_envelope(asset_id, envelope)
    }
}

/// A null result, or an error object reporting a missing asset, is `NotFound`
fn asset_from_envelope(
    asset_id: &str,
    envelope: RpcResponse<AssetRecord>,
) -> GateResult<AssetRecord> {
    match envelope.error {
        Some(err) if is_not_found(&err.message) => Err(GateError::NotFound(format!(
            "asset {}: {}",
            asset_id, err.message
        ))),
        Some(err) => Err(GateError::UpstreamFormat(format!(
            "getAsset returned error {}: {}",
            err.code, err.message
        ))),
        None => envelope
            .result
            .ok_or_else(|| GateError::NotFound(format!("asset {}", asset_id))),
    }
}

async fn read_body(what: &str, response: reqwest::Response) -> GateResult<String> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| GateError::Transport(format!("{} body read failed: {}", what, e)))?;

    if !status.is_success() {
        return Err(GateError::Transport(format!(
            "{} returned HTTP {}: {}",
            what,
            status,
            truncate(&text)
        )));
    }
    Ok(text)
}

fn parse_json<T: DeserializeOwned>(what: &str, text: &str) -> GateResult<T> {
    serde_json::from_str(text)
        .map_err(|e| GateError::UpstreamFormat(format!("Failed to parse {} response: {}", what, e)))
}

fn is_not_found(message: &str) -> bool {
    message.to_lowercase().contains("not found")
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
