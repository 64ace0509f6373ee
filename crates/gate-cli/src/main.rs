// ============================================================================
// vipgate - CLI for the credential-gated access subsystem
// ============================================================================
// Usage:
//   vipgate check <ACCOUNT> [--room vip]           Run the access pipeline
//   vipgate resolve <ACCOUNT>                       Ownership lookup only
//   vipgate prove <ACCOUNT> [--asset-id ID]         Generate a commitment (JSON)
//   vipgate verify --file proof.json                Verify a commitment offline
//   vipgate record-mint <ACCOUNT> <SIGNATURE>       Store a mint signal
//   vipgate revoke <ACCOUNT> [--room vip]           Drop a stored room grant
//   vipgate signals [ACCOUNT]                       Show stored signals / stats
//   vipgate prune [--dry-run]                       Delete expired commitments
// ============================================================================

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use gate_core::{
    verify_commitment, AccessGate, Commitment, GateConfig, GateDb, HeliusIndexer, LedgerIndexer,
    MintRecord, SignalStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Credential-gated room access
#[derive(Parser)]
#[command(name = "vipgate", version, about = "Check and manage credential-gated room access")]
struct Cli {
    /// Path to the signal database (default: GATE_DB_PATH or ~/.vipgate/signals.redb)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether an account may enter a room
    Check {
        account: String,
        #[arg(long, default_value = "vip")]
        room: String,
    },

    /// Look up credential ownership without generating a commitment
    Resolve {
        account: String,
        /// Credential metadata name (default: GATE_CREDENTIAL_NAME)
        #[arg(long)]
        name: Option<String>,
    },

    /// Generate an ownership commitment and print it as JSON
    Prove {
        account: String,
        /// Asset to commit to (default: GATE_DEFAULT_ASSET_ID)
        #[arg(long)]
        asset_id: Option<String>,
    },

    /// Verify a commitment JSON document
    Verify {
        /// Read the commitment from a file
        #[arg(long, conflicts_with = "commitment")]
        file: Option<PathBuf>,
        /// Commitment JSON given inline
        #[arg(long)]
        commitment: Option<String>,
    },

    /// Record a successful credential mint for an account
    RecordMint {
        account: String,
        signature: String,
        #[arg(long)]
        asset_id: Option<String>,
    },

    /// Revoke a stored room grant
    Revoke {
        account: String,
        #[arg(long, default_value = "vip")]
        room: String,
    },

    /// Show stored signals for an account, or store statistics
    Signals { account: Option<String> },

    /// Delete commitments past their lifetime
    Prune {
        /// Show what would be pruned without deleting
        #[arg(long)]
        dry_run: bool,
    },
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ts))
}

fn format_timestamp_ms(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ms))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Could not load .env file: {}", e);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gate_core=info".parse()?)
                .add_directive("vipgate=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Configuration errors are fatal
    let mut config = GateConfig::from_env().context("Invalid gate configuration")?;
    if let Some(path) = cli.db_path {
        config.db_path = Some(path);
    }

    let db = Arc::new(GateDb::open(config.db_path.as_deref())?);

    match cli.command {
        Commands::Check { account, room } => cmd_check(config, db, &account, &room).await,
        Commands::Resolve { account, name } => cmd_resolve(config, db, &account, name).await,
        Commands::Prove { account, asset_id } => cmd_prove(config, db, &account, asset_id).await,
        Commands::Verify { file, commitment } => cmd_verify(file, commitment),
        Commands::RecordMint {
            account,
            signature,
            asset_id,
        } => cmd_record_mint(&db, &account, &signature, asset_id).await,
        Commands::Revoke { account, room } => cmd_revoke(config, db, &account, &room).await,
        Commands::Signals { account } => cmd_signals(&db, account.as_deref()).await,
        Commands::Prune { dry_run } => cmd_prune(&db, dry_run).await,
    }
}

fn build_gate(config: GateConfig, db: Arc<GateDb>) -> Result<AccessGate> {
    let indexer: Arc<dyn LedgerIndexer> = Arc::new(HeliusIndexer::new(&config)?);
    Ok(AccessGate::new(config, indexer, db))
}

async fn cmd_check(config: GateConfig, db: Arc<GateDb>, account: &str, room: &str) -> Result<()> {
    let gated = config.is_gated(room);
    let gate = build_gate(config, db)?;
    let decision = gate.check_access(account, room).await;

    println!("Account:  {}", account);
    println!("Room:     {}{}", room, if gated { "" } else { " (open)" });
    println!("Decision: {:?}", decision);
    Ok(())
}

async fn cmd_resolve(
    config: GateConfig,
    db: Arc<GateDb>,
    account: &str,
    name: Option<String>,
) -> Result<()> {
    let credential_name = name.unwrap_or_else(|| config.credential_name.clone());
    let gate = build_gate(config, db)?;
    let (lookup, source) = gate
        .resolver()
        .resolve_credential(account, &credential_name)
        .await;

    println!("Account:    {}", account);
    println!("Credential: {}", credential_name);
    println!("Owned:      {}", lookup.owned);
    println!("Asset:      {}", lookup.asset_id.as_deref().unwrap_or("-"));
    println!("Source:     {:?}", source);
    Ok(())
}

async fn cmd_prove(
    config: GateConfig,
    db: Arc<GateDb>,
    account: &str,
    asset_id: Option<String>,
) -> Result<()> {
    let asset_id = asset_id.unwrap_or_else(|| config.default_asset_id.clone());
    let gate = build_gate(config, db)?;

    let commitment = gate.engine().generate(account, &asset_id).await;
    info!("Commitment path: {:?}", commitment.path);
    println!("{}", serde_json::to_string_pretty(&commitment)?);
    Ok(())
}

fn cmd_verify(file: Option<PathBuf>, inline: Option<String>) -> Result<()> {
    let raw = match (file, inline) {
        (Some(path), _) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, Some(json)) => json,
        (None, None) => anyhow::bail!("Provide a commitment with --file or --commitment"),
    };

    let commitment: Commitment =
        serde_json::from_str(&raw).context("Commitment is not valid JSON")?;
    let verification = verify_commitment(&commitment)?;

    println!("Account:  {}", commitment.account().unwrap_or("-"));
    println!("Asset:    {}", commitment.asset_id().unwrap_or("-"));
    println!("Path:     {:?}", verification.path);
    println!("Verified: {}", verification.verified);
    if let Some(reason) = &verification.reason {
        println!("Reason:   {}", reason);
    }
    if let Ok(issued_at) = commitment.issued_at_ms() {
        println!("Issued:   {}", format_timestamp_ms(issued_at));
    }
    Ok(())
}

async fn cmd_record_mint(
    db: &GateDb,
    account: &str,
    signature: &str,
    asset_id: Option<String>,
) -> Result<()> {
    db.record_mint(account, &MintRecord::new(signature, asset_id))
        .await?;
    println!("Recorded mint {} for {}", signature, account);
    Ok(())
}

async fn cmd_revoke(config: GateConfig, db: Arc<GateDb>, account: &str, room: &str) -> Result<()> {
    let gate = build_gate(config, db)?;
    if gate.revoke(account, room).await? {
        println!("Revoked access to {} for {}", room, account);
    } else {
        println!("No stored grant for {} in {}", account, room);
    }
    Ok(())
}

async fn cmd_signals(db: &GateDb, account: Option<&str>) -> Result<()> {
    let Some(account) = account else {
        let stats = db.stats().await?;
        println!("=== Signal Store Stats ===");
        println!("Database:    {}", db.path().display());
        println!();
        println!("Room grants: {}", stats.room_grants);
        println!("Mints:       {}", stats.mint_records);
        println!("Commitments: {}", stats.commitments);
        return Ok(());
    };

    println!("=== Signals for {} ===", account);

    let grants = db.list_room_grants(account).await?;
    if grants.is_empty() {
        println!("Room grants: none");
    } else {
        println!("Room grants:");
        for grant in &grants {
            println!("  {:<16} {}", grant.room, format_timestamp(grant.granted_at));
        }
    }

    match db.mint_record(account).await? {
        Some(mint) => println!(
            "Mint:        {} (asset: {}, recorded {})",
            mint.signature,
            mint.asset_id.as_deref().unwrap_or("-"),
            format_timestamp(mint.recorded_at)
        ),
        None => println!("Mint:        none"),
    }

    let commitments = db.list_commitments(account).await?;
    if commitments.is_empty() {
        println!("Commitments: none");
        return Ok(());
    }

    let now_ms = Utc::now().timestamp_millis();
    println!();
    println!(
        "{:<36}  {:<10}  {:<9}  {:<22}  {}",
        "COMMITMENT ID", "ROOM", "PATH", "EXPIRES", "STATE"
    );
    println!("{}", "-".repeat(95));
    for record in &commitments {
        println!(
            "{:<36}  {:<10}  {:<9}  {:<22}  {}",
            record.id,
            record.room,
            record
                .path
                .map(|p| format!("{:?}", p))
                .unwrap_or_else(|| "-".into()),
            format_timestamp_ms(record.expires_at_ms),
            if record.is_expired(now_ms) { "expired" } else { "live" }
        );
    }
    println!("\nTotal: {} commitments", commitments.len());
    Ok(())
}

async fn cmd_prune(db: &GateDb, dry_run: bool) -> Result<()> {
    let now_ms = Utc::now().timestamp_millis();

    if dry_run {
        println!("=== DRY RUN - no data will be deleted ===\n");
        let expired = db.expired_commitments(now_ms).await?;
        println!("Would prune {} expired commitments", expired.len());
        for record in &expired {
            println!(
                "  - {} ({} in {}, expired: {})",
                record.id,
                record.account,
                record.room,
                format_timestamp_ms(record.expires_at_ms)
            );
        }
        return Ok(());
    }

    let pruned = db.prune_expired_commitments(now_ms).await?;
    println!("Pruned {} expired commitments", pruned);
    Ok(())
}
