//! namesake - claim planner for namespace identity tokens

use std::sync::Arc;

use clap::Parser;
use solana_sdk::pubkey::MAX_SEED_LEN;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use namesake::{
    config::{Args, ClaimConfig, Command, PlanArgs},
    ledger::{Namespace, Signer},
    signing::generate_keypair,
    state::{AccountSource, InMemoryLedger, RpcLedger},
    ClaimService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Logs go to stderr; stdout carries the envelopes
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("namesake={},warn", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let mut config = args.claim_config()?;
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Namespaces program: {}", config.program_ids.namespaces);
    info!("Approve authorities: {:?}", config.approve_authorities);

    let Command::Plan(plan) = &args.command;

    let source: Arc<dyn AccountSource> = if args.dev_mode {
        Arc::new(dev_ledger(&mut config, plan)?)
    } else {
        info!("Ledger RPC: {}", args.rpc_url);
        Arc::new(RpcLedger::new(args.rpc_config())?)
    };

    let service = ClaimService::new(source, config);
    let planned = service
        .plan_claim_detailed(&plan.namespace, &plan.entry, &plan.wallet)
        .await?;

    if plan.explain {
        println!("{}", serde_json::to_string_pretty(&planned)?);
    } else {
        for tx in &planned.transactions {
            println!("{tx}");
        }
    }

    Ok(())
}

/// In-memory ledger holding every configured namespace. The requested
/// namespace gets a generated authority if none is configured.
fn dev_ledger(config: &mut ClaimConfig, plan: &PlanArgs) -> anyhow::Result<InMemoryLedger> {
    if plan.namespace.is_empty() || plan.namespace.len() > MAX_SEED_LEN {
        anyhow::bail!("namespace name must be 1 to {MAX_SEED_LEN} bytes");
    }
    if config.approve_authorities.get(&plan.namespace).is_none() {
        warn!(
            namespace = %plan.namespace,
            "No approve authority configured (dev mode, generating one)"
        );
        let (key, _) = generate_keypair();
        config.approve_authorities.insert(plan.namespace.clone(), key);
    }

    let ledger = InMemoryLedger::new(config.program_ids);
    for name in config.approve_authorities.namespaces() {
        if let Some(key) = config.approve_authorities.get(name) {
            ledger.put_namespace(&Namespace::new(name, key.pubkey()))?;
        }
    }
    Ok(ledger)
}
