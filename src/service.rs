//! Claim Service
//!
//! Top-level pipeline for one claim request:
//!
//! ```text
//! wallet ──▶ parse ──▶ [verify identity] ──▶ resolve_state ──▶ plan
//!                                                               │
//!   encoded envelopes ◀── sign ◀── assemble ◀── recency token ◀─┘
//! ```
//!
//! Every call re-reads ledger state; nothing is cached between requests.
//! Any failure aborts the whole request.

use std::sync::Arc;

use serde::Serialize;
use solana_sdk::pubkey::MAX_SEED_LEN;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::assembler::TransactionAssembler;
use crate::config::ClaimConfig;
use crate::identity::{canonical_handle, IdentityProof, IdentityVerifier};
use crate::ledger::{NamespaceProgram, Pubkey};
use crate::planner::{self, Step};
use crate::signing::{EncodedTransaction, SigningCoordinator};
use crate::state::{resolve_state, AccountSource, ClaimTarget, LedgerStateReader};
use crate::types::{ClaimError, Result};

/// Outcome of a successful planning call.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedClaim {
    pub plan_id: Uuid,
    pub namespace: String,
    pub entry: String,
    pub requestor: String,

    /// Steps in submission order
    pub steps: Vec<String>,

    /// Mint bound to the entry once the batch lands
    pub mint: String,

    /// Whether the batch creates a new mint
    pub fresh_mint: bool,

    pub set_global_reverse_entry: bool,

    /// Envelopes must land before this block height
    pub last_valid_block_height: u64,

    /// Signers still missing per envelope (the requestor's wallet)
    pub missing_signers: Vec<Vec<String>>,

    pub transactions: Vec<EncodedTransaction>,
}

/// Plans claims against a ledger.
#[derive(Clone)]
pub struct ClaimService {
    reader: LedgerStateReader,
    assembler: TransactionAssembler,
    config: ClaimConfig,
    verifier: Option<Arc<dyn IdentityVerifier>>,
}

impl ClaimService {
    pub fn new(source: Arc<dyn AccountSource>, config: ClaimConfig) -> Self {
        let ids = config.program_ids;
        Self {
            reader: LedgerStateReader::new(source, ids),
            assembler: TransactionAssembler::new(NamespaceProgram::new(ids)),
            config,
            verifier: None,
        }
    }

    /// Attach the identity verifier used by [`Self::plan_verified_claim`].
    pub fn with_verifier(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn config(&self) -> &ClaimConfig {
        &self.config
    }

    /// Plan a claim of `entry_name` in `namespace` for `requestor_wallet`.
    ///
    /// The entry name is canonicalized with [`canonical_handle`], the same
    /// form identity verifiers return, so "Alice" and "alice" are one entry.
    ///
    /// Returns the envelopes in submission order, base64 encoded and signed
    /// by every server-held key. The requestor signs each before submitting.
    pub async fn plan_claim(
        &self,
        namespace: &str,
        entry_name: &str,
        requestor_wallet: &str,
    ) -> Result<Vec<EncodedTransaction>> {
        Ok(self
            .plan_claim_detailed(namespace, entry_name, requestor_wallet)
            .await?
            .transactions)
    }

    /// Like [`Self::plan_claim`], with the plan summary.
    pub async fn plan_claim_detailed(
        &self,
        namespace: &str,
        entry_name: &str,
        requestor_wallet: &str,
    ) -> Result<PlannedClaim> {
        let requestor = parse_requestor(requestor_wallet)?;
        self.run(namespace, entry_name, requestor).await
    }

    /// Verify an identity proof, then plan a claim of the verified handle.
    pub async fn plan_verified_claim(&self, namespace: &str, proof: &IdentityProof) -> Result<PlannedClaim> {
        let requestor = parse_requestor(&proof.wallet)?;
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| ClaimError::Config("no identity verifier configured".to_string()))?;

        let verdict = verifier.verify(proof).await?;
        if !verdict.verified {
            let reason = verdict
                .reason
                .unwrap_or_else(|| format!("proof for '{}' rejected", proof.handle));
            info!(namespace, handle = %proof.handle, %reason, "Identity proof rejected");
            return Err(ClaimError::IdentityNotVerified(reason));
        }

        self.run(namespace, &verdict.handle, requestor).await
    }

    async fn run(&self, namespace: &str, entry_name: &str, requestor: Pubkey) -> Result<PlannedClaim> {
        // A name that cannot be a seed has no namespace record
        if namespace.is_empty() || namespace.len() > MAX_SEED_LEN {
            return Err(ClaimError::NamespaceNotFound(namespace.to_string()));
        }
        let entry_name = canonical_entry_name(entry_name)?;
        let plan_id = Uuid::new_v4();
        let span = info_span!("plan_claim", %plan_id, namespace, entry = %entry_name, %requestor);
        self.run_pipeline(plan_id, namespace, &entry_name, requestor)
            .instrument(span)
            .await
    }

    async fn run_pipeline(
        &self,
        plan_id: Uuid,
        namespace: &str,
        entry_name: &str,
        requestor: Pubkey,
    ) -> Result<PlannedClaim> {
        let authority = self
            .config
            .approve_authorities
            .get(namespace)
            .ok_or_else(|| ClaimError::NoApproveAuthorityConfigured(namespace.to_string()))?;
        let coordinator = SigningCoordinator::new(authority);
        let authority_pubkey = coordinator.authority();

        let target = ClaimTarget {
            namespace: namespace.to_string(),
            entry: entry_name.to_string(),
            requestor,
        };
        let snapshot = resolve_state(&self.reader, target).await?;

        if snapshot.namespace.approve_authority != authority_pubkey {
            return Err(ClaimError::ApproveAuthorityMismatch {
                namespace: namespace.to_string(),
                configured: authority_pubkey,
                expected: snapshot.namespace.approve_authority,
            });
        }

        let plan = planner::plan(&snapshot);
        let recency = self.reader.latest_recency_token().await?;
        let batch = self
            .assembler
            .assemble(&snapshot, &plan, &authority_pubkey, &recency)?;
        let mint = batch.mint;
        let fresh_mint = batch.fresh_mint.is_some();

        let transactions = coordinator.sign(batch)?;
        let missing_signers = missing_signers(&transactions)?;

        info!(
            steps = ?plan.steps,
            envelopes = transactions.len(),
            %mint,
            fresh_mint,
            last_valid_block_height = recency.last_valid_block_height,
            "Claim planned"
        );

        Ok(PlannedClaim {
            plan_id,
            namespace: namespace.to_string(),
            entry: entry_name.to_string(),
            requestor: requestor.to_string(),
            steps: step_names(&plan.steps),
            mint: mint.to_string(),
            fresh_mint,
            set_global_reverse_entry: plan.reverse_entries.set_global,
            last_valid_block_height: recency.last_valid_block_height,
            missing_signers,
            transactions,
        })
    }
}

fn parse_requestor(wallet: &str) -> Result<Pubkey> {
    wallet
        .trim()
        .parse::<Pubkey>()
        .map_err(|e| ClaimError::InvalidRequestorKey(format!("'{wallet}': {e}")))
}

/// Canonical handle, checked to fit a single address seed.
fn canonical_entry_name(entry_name: &str) -> Result<String> {
    let name = canonical_handle(entry_name);
    if name.is_empty() || name.len() > MAX_SEED_LEN {
        return Err(ClaimError::InvalidEntryName(format!(
            "'{entry_name}' must be 1 to {MAX_SEED_LEN} bytes"
        )));
    }
    Ok(name)
}

fn step_names(steps: &[Step]) -> Vec<String> {
    steps.iter().map(Step::to_string).collect()
}

fn missing_signers(transactions: &[EncodedTransaction]) -> Result<Vec<Vec<String>>> {
    transactions
        .iter()
        .map(|tx| {
            Ok(tx
                .decode()?
                .missing_signers()?
                .iter()
                .map(Pubkey::to_string)
                .collect())
        })
        .collect()
}
