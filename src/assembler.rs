//! Transaction Assembler
//!
//! Turns a [`ClaimPlan`] into the ordered list of envelopes a client
//! submits. Each step fills one slot:
//!
//! ```text
//! slot 0  Revoke            revoke_entry
//! slot 1  MigrateAndClaim   migrate_entry_mint, claim_entry(new mint)
//! slot 2  Claim             claim_entry(existing mint)
//!         InitAndClaim      init_entry, init_entry_mint, claim_entry(new mint)
//! ```
//!
//! Empty slots are dropped. Approval instructions go to the front of the
//! first remaining envelope and reverse-entry updates to the end of the last.

use tracing::debug;

use crate::ledger::{
    EntryRef, Keypair, NamespaceProgram, Pubkey, RecencyToken, Signer, TransactionEnvelope,
};
use crate::planner::{ApprovalPlan, ClaimPlan, MintPlan, Step};
use crate::signing::keys::generate_keypair;
use crate::state::StateSnapshot;
use crate::types::{ClaimError, Result};

const SLOT_COUNT: usize = 3;

/// Keypair for a mint created by this batch.
///
/// Owned by the batch until the signing coordinator consumes it.
pub struct FreshMint {
    keypair: Keypair,
}

impl FreshMint {
    pub fn generate() -> Self {
        let (keypair, _) = generate_keypair();
        Self { keypair }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub(crate) fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl std::fmt::Debug for FreshMint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshMint")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

/// Envelopes for one claim, not yet signed.
#[derive(Debug)]
pub struct AssembledBatch {
    pub envelopes: Vec<TransactionEnvelope>,

    /// Present iff the plan mints a new token
    pub fresh_mint: Option<FreshMint>,

    /// Mint the entry is bound to after the batch lands
    pub mint: Pubkey,

    pub steps: Vec<Step>,
}

/// Builds envelope batches from plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionAssembler {
    program: NamespaceProgram,
}

impl TransactionAssembler {
    pub fn new(program: NamespaceProgram) -> Self {
        Self { program }
    }

    /// Assemble the batch for `plan`.
    ///
    /// `approve_authority` signs the approval; `recency` is shared by every
    /// envelope.
    pub fn assemble(
        &self,
        snapshot: &StateSnapshot,
        plan: &ClaimPlan,
        approve_authority: &Pubkey,
        recency: &RecencyToken,
    ) -> Result<AssembledBatch> {
        let target = &snapshot.target;
        let entry = EntryRef {
            namespace: &target.namespace,
            entry: &target.entry,
        };
        let requestor = &target.requestor;

        let (fresh_mint, mint) = match plan.mint {
            MintPlan::Existing(mint) => (None, mint),
            MintPlan::Fresh => {
                let fresh = FreshMint::generate();
                let mint = fresh.pubkey();
                (Some(fresh), mint)
            }
        };

        let mut slots: [TransactionEnvelope; SLOT_COUNT] = Default::default();
        for step in &plan.steps {
            match step {
                Step::Revoke => {
                    let state = snapshot.entry.as_ref().ok_or_else(|| {
                        ClaimError::Encode("revoke planned for an absent entry".into())
                    })?;
                    let holder = state
                        .holder
                        .as_ref()
                        .ok_or(ClaimError::NoOwnerFound(state.entry.mint))?;
                    self.program.revoke_entry(
                        &mut slots[0],
                        entry,
                        &state.entry.mint,
                        &holder.token_account,
                        requestor,
                    )?;
                }
                Step::MigrateAndClaim => {
                    let state = snapshot.entry.as_ref().ok_or_else(|| {
                        ClaimError::Encode("migration planned for an absent entry".into())
                    })?;
                    self.program
                        .migrate_entry_mint(&mut slots[1], entry, &state.entry.mint, &mint, requestor)?;
                    self.program.claim_entry(&mut slots[1], entry, &mint, requestor)?;
                }
                Step::Claim => {
                    self.program.claim_entry(&mut slots[2], entry, &mint, requestor)?;
                }
                Step::InitAndClaim => {
                    self.program.init_entry(&mut slots[2], entry, requestor)?;
                    self.program
                        .init_entry_mint(&mut slots[2], entry, &mint, requestor)?;
                    self.program.claim_entry(&mut slots[2], entry, &mint, requestor)?;
                }
            }
        }

        let mut envelopes: Vec<TransactionEnvelope> =
            slots.into_iter().filter(|env| !env.is_empty()).collect();
        if envelopes.is_empty() {
            return Err(ClaimError::Encode("claim plan produced no instructions".into()));
        }

        let mut approval = TransactionEnvelope::new();
        if plan.approval.creates_request() {
            self.program.create_claim_request(&mut approval, entry, requestor)?;
        }
        self.program
            .approve_claim_request(&mut approval, entry, requestor, approve_authority)?;
        envelopes[0].prepend(approval.instructions().to_vec());

        let last = envelopes.len() - 1;
        if plan.reverse_entries.set_namespace {
            self.program
                .set_namespace_reverse_entry(&mut envelopes[last], entry, &mint, requestor)?;
        }
        if plan.reverse_entries.set_global {
            self.program
                .set_global_reverse_entry(&mut envelopes[last], entry, &mint, requestor)?;
        }

        for envelope in &mut envelopes {
            envelope.set_fee_payer(*requestor);
            envelope.set_recent_blockhash(recency.blockhash);
        }

        debug!(
            namespace = %target.namespace,
            entry = %target.entry,
            envelopes = envelopes.len(),
            %mint,
            fresh_mint = fresh_mint.is_some(),
            create_request = matches!(plan.approval, ApprovalPlan::CreateAndApprove),
            "Assembled claim batch"
        );

        Ok(AssembledBatch {
            envelopes,
            fresh_mint,
            mint,
            steps: plan.steps.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{instruction_names, Hash};
    use crate::planner::plan;
    use crate::planner::tests::SnapshotBuilder;

    fn recency() -> RecencyToken {
        RecencyToken {
            blockhash: Hash::new_from_array([3u8; 32]),
            last_valid_block_height: 200,
        }
    }

    fn assemble(snapshot: &StateSnapshot) -> AssembledBatch {
        TransactionAssembler::default()
            .assemble(snapshot, &plan(snapshot), &Pubkey::new_unique(), &recency())
            .unwrap()
    }

    fn names(batch: &AssembledBatch) -> Vec<Vec<&'static str>> {
        let program = NamespaceProgram::default();
        batch
            .envelopes
            .iter()
            .map(|env| instruction_names(env, &program))
            .collect()
    }

    #[test]
    fn test_absent_entry_single_envelope() {
        let snapshot = SnapshotBuilder::new("twitter", "alice").build();
        let batch = assemble(&snapshot);

        assert_eq!(
            names(&batch),
            vec![vec![
                "create_claim_request",
                "approve_claim_request",
                "init_entry",
                "init_entry_mint",
                "claim_entry",
                "set_namespace_reverse_entry",
                "set_global_reverse_entry",
            ]]
        );
        let fresh = batch.fresh_mint.as_ref().unwrap();
        assert_eq!(batch.mint, fresh.pubkey());
    }

    #[test]
    fn test_revoke_and_migrate_split_across_envelopes() {
        let snapshot = SnapshotBuilder::new("twitter", "alice")
            .entry(true, true, false)
            .claim_request(true, 1)
            .build();
        let batch = assemble(&snapshot);

        assert_eq!(
            names(&batch),
            vec![
                vec!["approve_claim_request", "revoke_entry"],
                vec![
                    "migrate_entry_mint",
                    "claim_entry",
                    "set_namespace_reverse_entry",
                    "set_global_reverse_entry",
                ],
            ]
        );
    }

    #[test]
    fn test_existing_mint_is_reused() {
        let snapshot = SnapshotBuilder::new("twitter", "alice")
            .entry(true, false, true)
            .build();
        let existing = snapshot.entry.as_ref().unwrap().entry.mint;
        let batch = assemble(&snapshot);

        assert!(batch.fresh_mint.is_none());
        assert_eq!(batch.mint, existing);
        assert_eq!(batch.envelopes.len(), 1);
    }

    #[test]
    fn test_shared_fee_payer_and_blockhash() {
        let requestor = Pubkey::new_unique();
        let snapshot = SnapshotBuilder::new("twitter", "alice")
            .requestor(requestor)
            .entry(true, false, false)
            .build();
        let batch = assemble(&snapshot);

        assert_eq!(batch.envelopes.len(), 2);
        for envelope in &batch.envelopes {
            assert_eq!(envelope.fee_payer(), Some(&requestor));
            assert_eq!(envelope.recent_blockhash(), Some(&recency().blockhash));
        }
    }

    #[test]
    fn test_global_reverse_entry_skipped_for_other_namespace() {
        let snapshot = SnapshotBuilder::new("twitter", "alice")
            .global_reverse_entry("discord")
            .build();
        let batch = assemble(&snapshot);

        let last = names(&batch).pop().unwrap();
        assert!(last.contains(&"set_namespace_reverse_entry"));
        assert!(!last.contains(&"set_global_reverse_entry"));
    }

    #[test]
    fn test_missing_holder_fails() {
        let mut snapshot = SnapshotBuilder::new("twitter", "alice")
            .entry(true, false, false)
            .build();
        snapshot.entry.as_mut().unwrap().holder = None;

        let err = TransactionAssembler::default()
            .assemble(&snapshot, &plan(&snapshot), &Pubkey::new_unique(), &recency())
            .unwrap_err();
        assert!(matches!(err, ClaimError::NoOwnerFound(_)));
    }
}
