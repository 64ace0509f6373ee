//! ============================================================================
//! Gate Config - Endpoints, cache TTLs and pacing for the access gate
//! ============================================================================
//! Loaded from environment variables (a `.env` file is honoured by the CLI).
//! Only the API key is mandatory; everything else falls back to devnet
//! defaults.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{GateError, GateResult};

pub const DEFAULT_RPC_URL: &str = "https://devnet.helius-rpc.com";
pub const DEFAULT_ENHANCED_API_URL: &str = "https://api-devnet.helius-rpc.com/v0";

/// Metadata name carried by the access pass NFT
pub const DEFAULT_CREDENTIAL_NAME: &str = "ZKChat VIP Access Pass";

/// Asset id committed to when no concrete asset is known
pub const DEFAULT_ASSET_ID: &str = "zkchat-vip-access";

pub const DEFAULT_OWNERSHIP_TTL_SECS: u64 = 300;
pub const DEFAULT_COMMITMENT_TTL_SECS: u64 = 3600;
pub const DEFAULT_VERIFICATION_TTL_SECS: u64 = 600;
pub const DEFAULT_MAX_JITTER_MS: u64 = 500;
pub const DEFAULT_FALLBACK_JITTER_MS: u64 = 200;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PROOF_LIFETIME_SECS: u64 = 3600;

/// Runtime configuration for the access gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Indexer API key (Helius)
    pub api_key: String,
    /// Baseline JSON-RPC endpoint, without the api-key query
    pub rpc_url: String,
    /// Enhanced REST endpoint
    pub enhanced_api_url: String,
    pub credential_name: String,
    pub default_asset_id: String,
    pub ownership_ttl_secs: u64,
    pub commitment_ttl_secs: u64,
    pub verification_ttl_secs: u64,
    pub max_jitter_ms: u64,
    pub fallback_jitter_ms: u64,
    pub upstream_timeout_secs: u64,
    pub proof_lifetime_secs: u64,
    /// Rooms that require the credential; every other room is open
    pub gated_rooms: Vec<String>,
    /// Local signal database path (None = ~/.vipgate/signals.redb)
    pub db_path: Option<PathBuf>,
}

impl GateConfig {
    /// Config with every default filled in
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            enhanced_api_url: DEFAULT_ENHANCED_API_URL.to_string(),
            credential_name: DEFAULT_CREDENTIAL_NAME.to_string(),
            default_asset_id: DEFAULT_ASSET_ID.to_string(),
            ownership_ttl_secs: DEFAULT_OWNERSHIP_TTL_SECS,
            commitment_ttl_secs: DEFAULT_COMMITMENT_TTL_SECS,
            verification_ttl_secs: DEFAULT_VERIFICATION_TTL_SECS,
            max_jitter_ms: DEFAULT_MAX_JITTER_MS,
            fallback_jitter_ms: DEFAULT_FALLBACK_JITTER_MS,
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            proof_lifetime_secs: DEFAULT_PROOF_LIFETIME_SECS,
            gated_rooms: vec!["vip".to_string()],
            db_path: None,
        }
    }

    /// Load from process environment
    pub fn from_env() -> GateResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> GateResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("HELIUS_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GateError::Configuration("HELIUS_API_KEY is not set".into()))?;

        let mut config = Self::new(api_key.trim());

        if let Some(v) = lookup("GATE_RPC_URL") {
            config.rpc_url = v;
        }
        if let Some(v) = lookup("GATE_ENHANCED_API_URL") {
            config.enhanced_api_url = v;
        }
        if let Some(v) = lookup("GATE_CREDENTIAL_NAME") {
            config.credential_name = v;
        }
        if let Some(v) = lookup("GATE_DEFAULT_ASSET_ID") {
            config.default_asset_id = v;
        }

        config.ownership_ttl_secs =
            parse_u64(&lookup, "GATE_OWNERSHIP_TTL_SECS", config.ownership_ttl_secs)?;
        config.commitment_ttl_secs =
            parse_u64(&lookup, "GATE_COMMITMENT_TTL_SECS", config.commitment_ttl_secs)?;
        config.verification_ttl_secs =
            parse_u64(&lookup, "GATE_VERIFICATION_TTL_SECS", config.verification_ttl_secs)?;
        config.max_jitter_ms = parse_u64(&lookup, "GATE_MAX_JITTER_MS", config.max_jitter_ms)?;
        config.fallback_jitter_ms =
            parse_u64(&lookup, "GATE_FALLBACK_JITTER_MS", config.fallback_jitter_ms)?;
        config.upstream_timeout_secs =
            parse_u64(&lookup, "GATE_UPSTREAM_TIMEOUT_SECS", config.upstream_timeout_secs)?;
        config.proof_lifetime_secs =
            parse_u64(&lookup, "GATE_PROOF_LIFETIME_SECS", config.proof_lifetime_secs)?;

        if let Some(rooms) = lookup("GATE_GATED_ROOMS") {
            config.gated_rooms = rooms
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
        }

        config.db_path = lookup("GATE_DB_PATH").map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Reject configs the gate cannot run with
    pub fn validate(&self) -> GateResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(GateError::Configuration("API key is empty".into()));
        }
        if self.rpc_url.trim().is_empty() {
            return Err(GateError::Configuration("baseline RPC URL is empty".into()));
        }
        if self.enhanced_api_url.trim().is_empty() {
            return Err(GateError::Configuration("enhanced API URL is empty".into()));
        }
        if self.credential_name.trim().is_empty() {
            return Err(GateError::Configuration("credential name is empty".into()));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(GateError::Configuration(
                "upstream timeout must be at least one second".into(),
            ));
        }
        Ok(())
    }

    pub fn ownership_ttl(&self) -> Duration {
        Duration::from_secs(self.ownership_ttl_secs)
    }

    pub fn commitment_ttl(&self) -> Duration {
        Duration::from_secs(self.commitment_ttl_secs)
    }

    pub fn verification_ttl(&self) -> Duration {
        Duration::from_secs(self.verification_ttl_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn proof_lifetime(&self) -> Duration {
        Duration::from_secs(self.proof_lifetime_secs)
    }

    /// Whether a room requires the credential
    pub fn is_gated(&self, room: &str) -> bool {
        self.gated_rooms.iter().any(|r| r == room)
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> GateResult<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| GateError::Configuration(format!("{} = {:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}
