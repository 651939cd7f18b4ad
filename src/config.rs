//! Configuration for namesake
//!
//! CLI arguments and environment variable handling using clap, plus the
//! explicit [`ClaimConfig`] handed to the claim service.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use solana_sdk::pubkey::MAX_SEED_LEN;
use crate::ledger::{Keypair, ProgramIds, Pubkey, Signer};
use crate::signing::parse_secret_key;
use crate::state::RpcConfig;
use crate::types::{ClaimError, Result};

/// namesake - claim planner for namespace identity tokens
#[derive(Parser, Debug, Clone)]
#[command(name = "namesake")]
#[command(about = "Plans and co-signs identity claim transactions for namespace entries")]
pub struct Args {
    /// Ledger JSON-RPC endpoint
    #[arg(long, env = "RPC_URL", default_value = "http://localhost:8899")]
    pub rpc_url: String,

    /// Commitment level for ledger reads
    #[arg(long, env = "RPC_COMMITMENT", default_value = "confirmed")]
    pub commitment: String,

    /// Namespaces program id override (base58)
    #[arg(long, env = "NAMESPACE_PROGRAM_ID")]
    pub namespace_program_id: Option<String>,

    /// Approve authority secret keys per namespace
    /// Format: "twitter=<base58 secret>,discord=<base58 secret>"
    #[arg(long, env = "APPROVE_AUTHORITIES", hide_env_values = true)]
    pub approve_authorities: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Enable development mode (in-memory ledger, generated authorities)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Plan a claim and print the partially-signed envelopes
    Plan(PlanArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    /// Namespace name (e.g. "twitter")
    #[arg(long)]
    pub namespace: String,

    /// Entry name (the external handle)
    #[arg(long)]
    pub entry: String,

    /// Requestor wallet (base58)
    #[arg(long)]
    pub wallet: String,

    /// Print the planned steps and signers alongside the envelopes
    #[arg(long, default_value = "false")]
    pub explain: bool,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.dev_mode && self.approve_authorities.is_none() {
            return Err("APPROVE_AUTHORITIES is required in production mode".to_string());
        }

        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(format!("RPC_URL must be an http(s) URL, got '{}'", self.rpc_url));
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Program ids, with the namespaces program overridden if configured
    pub fn program_ids(&self) -> Result<ProgramIds> {
        let ids = ProgramIds::default();
        match self.namespace_program_id.as_deref() {
            Some(id) => {
                let program = id
                    .parse::<Pubkey>()
                    .map_err(|e| ClaimError::Config(format!("NAMESPACE_PROGRAM_ID: {e}")))?;
                Ok(ids.with_namespaces(program))
            }
            None => Ok(ids),
        }
    }

    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            url: self.rpc_url.clone(),
            commitment: self.commitment.clone(),
            timeout_ms: self.request_timeout_ms,
        }
    }

    /// Build the claim service configuration.
    pub fn claim_config(&self) -> Result<ClaimConfig> {
        let approve_authorities = match self.approve_authorities.as_deref() {
            Some(raw) => ApproveAuthorities::parse(raw)?,
            None => ApproveAuthorities::default(),
        };

        Ok(ClaimConfig {
            program_ids: self.program_ids()?,
            approve_authorities,
        })
    }
}

/// Approve authority signing keys by namespace name.
#[derive(Clone, Default)]
pub struct ApproveAuthorities {
    keys: HashMap<String, Arc<Keypair>>,
}

impl ApproveAuthorities {
    /// Parse `name=<base58 secret>` pairs separated by commas.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut authorities = Self::default();
        for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, secret) = pair.split_once('=').ok_or_else(|| {
                ClaimError::Config("APPROVE_AUTHORITIES entries must be name=<secret>".to_string())
            })?;
            let name = name.trim();
            if name.is_empty() || name.len() > MAX_SEED_LEN {
                return Err(ClaimError::Config(format!(
                    "APPROVE_AUTHORITIES namespace name '{name}' must be 1 to {MAX_SEED_LEN} bytes"
                )));
            }
            if authorities.keys.contains_key(name) {
                return Err(ClaimError::Config(format!(
                    "duplicate approve authority for namespace '{name}'"
                )));
            }
            let key = parse_secret_key(secret)
                .map_err(|e| ClaimError::Config(format!("approve authority for '{name}': {e}")))?;
            authorities.keys.insert(name.to_string(), Arc::new(key));
        }
        Ok(authorities)
    }

    pub fn insert(&mut self, namespace: impl Into<String>, key: Keypair) {
        self.keys.insert(namespace.into(), Arc::new(key));
    }

    pub fn with(mut self, namespace: impl Into<String>, key: Keypair) -> Self {
        self.insert(namespace, key);
        self
    }

    pub fn get(&self, namespace: &str) -> Option<&Keypair> {
        self.keys.get(namespace).map(Arc::as_ref)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// Public keys only
impl fmt::Debug for ApproveAuthorities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.keys.iter().map(|(name, key)| (name, key.pubkey())))
            .finish()
    }
}

/// Everything the claim service needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct ClaimConfig {
    pub program_ids: ProgramIds,
    pub approve_authorities: ApproveAuthorities,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{encode_keypair, generate_keypair};

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["namesake"];
        argv.extend_from_slice(extra);
        argv.extend_from_slice(&["plan", "--namespace", "twitter", "--entry", "alice", "--wallet", "w"]);
        Args::parse_from(argv)
    }

    #[test]
    fn test_parse_authorities() {
        let (twitter, _) = generate_keypair();
        let (discord, _) = generate_keypair();
        let raw = format!(
            "twitter={}, discord={}",
            encode_keypair(&twitter).as_str(),
            bs58::encode(discord.to_bytes()).into_string()
        );

        let authorities = ApproveAuthorities::parse(&raw).unwrap();
        assert_eq!(authorities.len(), 2);
        assert_eq!(
            authorities.get("twitter").unwrap().to_bytes(),
            twitter.to_bytes()
        );
        assert!(authorities.get("github").is_none());
    }

    #[test]
    fn test_parse_authorities_rejects_malformed() {
        let (key, _) = generate_keypair();
        let secret = bs58::encode(key.to_bytes()).into_string();

        assert!(matches!(
            ApproveAuthorities::parse("twitter"),
            Err(ClaimError::Config(_))
        ));
        assert!(ApproveAuthorities::parse(&format!("={secret}")).is_err());
        let long = "n".repeat(33);
        assert!(ApproveAuthorities::parse(&format!("{long}={secret}")).is_err());
        assert!(ApproveAuthorities::parse("twitter=xyz0").is_err());
        assert!(ApproveAuthorities::parse(&format!("twitter={secret},twitter={secret}")).is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let (key, _) = generate_keypair();
        let secret = bs58::encode(key.to_bytes()).into_string();
        let authorities = ApproveAuthorities::default().with("twitter", key);
        let rendered = format!("{authorities:?}");
        assert!(rendered.contains("twitter"));
        assert!(!rendered.contains(&secret));
    }

    #[test]
    fn test_validate() {
        assert!(args(&[]).validate().is_err());
        assert!(args(&["--dev-mode"]).validate().is_ok());
        assert!(args(&["--dev-mode", "--rpc-url", "localhost:8899"]).validate().is_err());
    }

    #[test]
    fn test_program_id_override() {
        let program = Pubkey::new_unique();
        let parsed = args(&["--dev-mode", "--namespace-program-id", &program.to_string()]);
        assert_eq!(parsed.claim_config().unwrap().program_ids.namespaces, program);

        let bad = args(&["--dev-mode", "--namespace-program-id", "nope"]);
        assert!(matches!(bad.claim_config(), Err(ClaimError::Config(_))));
    }
}
