//! Claim planner
//!
//! Pure decision logic over a [`StateSnapshot`]. Given the resolved state it
//! chooses which ledger steps reach the desired state, in order, plus the
//! claim-request approval and reverse-entry updates that go with them.
//!
//! # Decision table
//!
//! Rows are evaluated top-down; the first match wins.
//!
//! ```text
//! entry     legacy  escrowed   steps
//! absent    -       -          InitAndClaim              (fresh mint)
//! unclaimed yes     -          MigrateAndClaim           (fresh mint)
//! unclaimed no      -          Claim                     (existing mint)
//! claimed   yes     no         Revoke, MigrateAndClaim   (fresh mint)
//! claimed   yes     yes        MigrateAndClaim           (fresh mint)
//! claimed   no      no         Revoke, Claim             (existing mint)
//! claimed   no      yes        Claim                     (existing mint)
//! ```

use std::fmt;

use tracing::{debug, warn};

use crate::ledger::Pubkey;
use crate::state::{EntryState, StateSnapshot};

/// One logical ledger operation; each becomes at most one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Take the token back from an external holder
    Revoke,
    /// Replace a legacy certificate with a managed edition, then claim it
    MigrateAndClaim,
    /// Claim the existing token out of custody
    Claim,
    /// Create the entry and its token, then claim it
    InitAndClaim,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Revoke => "revoke",
            Step::MigrateAndClaim => "migrate_and_claim",
            Step::Claim => "claim",
            Step::InitAndClaim => "init_and_claim",
        })
    }
}

/// Which mint the claim ends up bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintPlan {
    /// Keep the entry's current mint
    Existing(Pubkey),
    /// Generate a new mint keypair
    Fresh,
}

/// How the requestor's claim request gets approved.
///
/// Approval is always emitted exactly once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPlan {
    /// No request on the ledger: create it, then approve it
    CreateAndApprove,
    /// Request exists: approve it against the current entry counter
    Approve {
        /// Request was left over from an earlier claim cycle
        stale: bool,
    },
}

impl ApprovalPlan {
    pub fn creates_request(&self) -> bool {
        matches!(self, Self::CreateAndApprove)
    }
}

/// Reverse-entry updates appended after the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverseEntryPlan {
    /// Always true: the namespace-scoped entry is set unconditionally
    pub set_namespace: bool,
    /// Only when the wallet has no primary identity, or it is already in
    /// this namespace
    pub set_global: bool,
}

/// The planner's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimPlan {
    pub steps: Vec<Step>,
    pub mint: MintPlan,
    pub approval: ApprovalPlan,
    pub reverse_entries: ReverseEntryPlan,
}

impl ClaimPlan {
    pub fn contains(&self, step: Step) -> bool {
        self.steps.contains(&step)
    }
}

/// Choose steps for the snapshot.
pub fn plan(snapshot: &StateSnapshot) -> ClaimPlan {
    let (steps, mint) = plan_steps(snapshot.entry.as_ref());
    let approval = plan_approval(snapshot);
    let reverse_entries = plan_reverse_entries(snapshot);

    debug!(
        namespace = %snapshot.target.namespace,
        entry = %snapshot.target.entry,
        steps = ?steps,
        ?mint,
        ?approval,
        set_global_reverse_entry = reverse_entries.set_global,
        "Planned claim"
    );

    ClaimPlan {
        steps,
        mint,
        approval,
        reverse_entries,
    }
}

/// The decision table.
pub fn plan_steps(entry: Option<&EntryState>) -> (Vec<Step>, MintPlan) {
    let Some(state) = entry else {
        return (vec![Step::InitAndClaim], MintPlan::Fresh);
    };

    let legacy = state.representation.requires_migration();
    let mut steps = Vec::with_capacity(2);
    if state.needs_revoke() {
        steps.push(Step::Revoke);
    }

    if legacy {
        steps.push(Step::MigrateAndClaim);
        (steps, MintPlan::Fresh)
    } else {
        steps.push(Step::Claim);
        (steps, MintPlan::Existing(state.entry.mint))
    }
}

/// Create the request if it is missing, otherwise (re-)approve it.
pub fn plan_approval(snapshot: &StateSnapshot) -> ApprovalPlan {
    let Some(request) = snapshot.claim_request.as_ref() else {
        return ApprovalPlan::CreateAndApprove;
    };

    let stale = match request.ensure_current(snapshot.entry_counter()) {
        Ok(()) => false,
        Err(err) => {
            warn!(error = %err, "Re-approving claim request from an earlier claim cycle");
            true
        }
    };
    ApprovalPlan::Approve { stale }
}

/// A wallet's primary identity is never moved to a different namespace.
pub fn plan_reverse_entries(snapshot: &StateSnapshot) -> ReverseEntryPlan {
    let set_global = match snapshot.global_reverse_entry.as_ref() {
        None => true,
        Some(existing) => existing.namespace_name == snapshot.target.namespace,
    };

    ReverseEntryPlan {
        set_namespace: true,
        set_global,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use crate::classify::{Custody, TokenRepresentation};
    use crate::ledger::{ClaimRequest, NameEntry, Namespace, ReverseEntry};
    use crate::state::{ClaimTarget, TokenHolder};

    /// Synthetic snapshot builder for planner and assembler tests.
    pub(crate) struct SnapshotBuilder {
        snapshot: StateSnapshot,
    }

    impl SnapshotBuilder {
        pub(crate) fn new(namespace: &str, entry: &str) -> Self {
            Self {
                snapshot: StateSnapshot {
                    target: ClaimTarget {
                        namespace: namespace.into(),
                        entry: entry.into(),
                        requestor: Pubkey::new_unique(),
                    },
                    namespace: Namespace::new(namespace, Pubkey::new_unique()),
                    entry: None,
                    claim_request: None,
                    global_reverse_entry: None,
                    namespace_reverse_entry: None,
                },
            }
        }

        pub(crate) fn requestor(mut self, requestor: Pubkey) -> Self {
            self.snapshot.target.requestor = requestor;
            self
        }

        /// Existing entry. `escrowed` is ignored for unclaimed entries.
        pub(crate) fn entry(mut self, claimed: bool, legacy: bool, escrowed: bool) -> Self {
            let mint = Pubkey::new_unique();
            let representation = if legacy {
                TokenRepresentation::LegacyCertificate { mint }
            } else {
                TokenRepresentation::ManagedEdition {
                    mint,
                    master_edition: Pubkey::new_unique(),
                }
            };
            let custody = claimed.then_some(if escrowed {
                Custody::Escrowed
            } else {
                Custody::ExternallyHeld
            });
            let holder = (claimed && !escrowed).then(|| TokenHolder {
                token_account: Pubkey::new_unique(),
                owner: Pubkey::new_unique(),
            });

            self.snapshot.entry = Some(EntryState {
                entry: NameEntry {
                    bump: 255,
                    namespace: Pubkey::new_unique(),
                    name: self.snapshot.target.entry.clone(),
                    reverse_entry: None,
                    mint,
                    is_claimed: claimed,
                    claim_request_counter: 1,
                },
                representation,
                custody,
                holder,
            });
            self
        }

        pub(crate) fn claim_request(mut self, approved: bool, counter: u32) -> Self {
            self.snapshot.claim_request = Some(ClaimRequest {
                bump: 255,
                namespace: Pubkey::new_unique(),
                entry_name: self.snapshot.target.entry.clone(),
                requestor: self.snapshot.target.requestor,
                is_approved: approved,
                counter,
            });
            self
        }

        pub(crate) fn global_reverse_entry(mut self, namespace: &str) -> Self {
            self.snapshot.global_reverse_entry = Some(ReverseEntry::new(
                self.snapshot.target.requestor,
                namespace,
                "someone",
            ));
            self
        }

        pub(crate) fn build(self) -> StateSnapshot {
            self.snapshot
        }
    }

    fn steps_for(snapshot: &StateSnapshot) -> Vec<Step> {
        plan(snapshot).steps
    }

    #[test]
    fn test_absent_entry_inits() {
        let snapshot = SnapshotBuilder::new("twitter", "alice").build();
        let plan = plan(&snapshot);
        assert_eq!(plan.steps, vec![Step::InitAndClaim]);
        assert_eq!(plan.mint, MintPlan::Fresh);
    }

    #[test]
    fn test_unclaimed_legacy_migrates() {
        let snapshot = SnapshotBuilder::new("twitter", "alice")
            .entry(false, true, false)
            .build();
        let plan = plan(&snapshot);
        assert_eq!(plan.steps, vec![Step::MigrateAndClaim]);
        assert_eq!(plan.mint, MintPlan::Fresh);
    }

    #[test]
    fn test_unclaimed_managed_claims_existing_mint() {
        let snapshot = SnapshotBuilder::new("twitter", "alice")
            .entry(false, false, false)
            .build();
        let mint = snapshot.entry.as_ref().unwrap().entry.mint;
        let plan = plan(&snapshot);
        assert_eq!(plan.steps, vec![Step::Claim]);
        assert_eq!(plan.mint, MintPlan::Existing(mint));
    }

    #[test]
    fn test_claimed_legacy_external_revokes_then_migrates() {
        let snapshot = SnapshotBuilder::new("twitter", "alice")
            .entry(true, true, false)
            .build();
        assert_eq!(steps_for(&snapshot), vec![Step::Revoke, Step::MigrateAndClaim]);
        assert_eq!(plan(&snapshot).mint, MintPlan::Fresh);
    }

    #[test]
    fn test_claimed_legacy_escrowed_migrates() {
        let snapshot = SnapshotBuilder::new("twitter", "alice")
            .entry(true, true, true)
            .build();
        assert_eq!(steps_for(&snapshot), vec![Step::MigrateAndClaim]);
    }

    #[test]
    fn test_claimed_managed_external_revokes_then_claims() {
        let snapshot = SnapshotBuilder::new("twitter", "alice")
            .entry(true, false, false)
            .build();
        let mint = snapshot.entry.as_ref().unwrap().entry.mint;
        assert_eq!(steps_for(&snapshot), vec![Step::Revoke, Step::Claim]);
        assert_eq!(plan(&snapshot).mint, MintPlan::Existing(mint));
    }

    #[test]
    fn test_claimed_managed_escrowed_claims() {
        let snapshot = SnapshotBuilder::new("twitter", "alice")
            .entry(true, false, true)
            .build();
        assert_eq!(steps_for(&snapshot), vec![Step::Claim]);
    }

    #[test]
    fn test_planning_is_repeatable() {
        let snapshot = SnapshotBuilder::new("twitter", "alice")
            .entry(false, false, false)
            .build();
        assert_eq!(plan(&snapshot), plan(&snapshot));
    }

    #[test]
    fn test_approval_variants() {
        let missing = SnapshotBuilder::new("twitter", "alice").build();
        assert_eq!(plan_approval(&missing), ApprovalPlan::CreateAndApprove);

        // entry counter is 1
        let current = SnapshotBuilder::new("twitter", "alice")
            .entry(false, false, false)
            .claim_request(true, 1)
            .build();
        assert_eq!(plan_approval(&current), ApprovalPlan::Approve { stale: false });

        let stale = SnapshotBuilder::new("twitter", "alice")
            .entry(false, false, false)
            .claim_request(true, 0)
            .build();
        assert_eq!(plan_approval(&stale), ApprovalPlan::Approve { stale: true });

        let unapproved = SnapshotBuilder::new("twitter", "alice")
            .claim_request(false, 0)
            .build();
        assert_eq!(plan_approval(&unapproved), ApprovalPlan::Approve { stale: false });
    }

    #[test]
    fn test_global_reverse_entry_never_crosses_namespaces() {
        let none = SnapshotBuilder::new("twitter", "alice").build();
        assert!(plan_reverse_entries(&none).set_global);

        let same = SnapshotBuilder::new("twitter", "alice")
            .global_reverse_entry("twitter")
            .build();
        assert!(plan_reverse_entries(&same).set_global);

        let other = SnapshotBuilder::new("twitter", "alice")
            .global_reverse_entry("discord")
            .build();
        let plan = plan_reverse_entries(&other);
        assert!(!plan.set_global);
        assert!(plan.set_namespace);
    }
}
