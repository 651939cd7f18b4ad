//! Fully-resolved state for one claim request.
//!
//! [`resolve_state`] performs every ledger read the planner needs and
//! nothing else. The planner then works on the snapshot without I/O. A
//! snapshot is never reused across requests.

use tracing::{debug, info};

use crate::classify::{self, Custody, TokenRepresentation};
use crate::ledger::{ClaimRequest, NameEntry, Namespace, Pubkey, ReverseEntry};
use crate::types::{ClaimError, Result};

use super::{LedgerStateReader, TokenHolder};

/// What is being claimed, and by whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimTarget {
    pub namespace: String,
    pub entry: String,
    pub requestor: Pubkey,
}

/// An existing entry plus the facts the decision table needs about it.
#[derive(Debug, Clone)]
pub struct EntryState {
    pub entry: NameEntry,

    pub representation: TokenRepresentation,

    /// Only resolved for claimed entries
    pub custody: Option<Custody>,

    /// Only resolved when the token is held outside custody
    pub holder: Option<TokenHolder>,
}

impl EntryState {
    /// Whether a holder outside the namespace must relinquish the token.
    pub fn needs_revoke(&self) -> bool {
        self.entry.is_claimed && self.custody.is_some_and(|c| c.should_revoke())
    }
}

/// Ledger state relevant to one claim.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub target: ClaimTarget,
    pub namespace: Namespace,
    pub entry: Option<EntryState>,
    pub claim_request: Option<ClaimRequest>,
    pub global_reverse_entry: Option<ReverseEntry>,
    pub namespace_reverse_entry: Option<ReverseEntry>,
}

impl StateSnapshot {
    /// Counter a claim request must carry to be current. Absent entries
    /// start at zero.
    pub fn entry_counter(&self) -> u32 {
        self.entry
            .as_ref()
            .map(|e| e.entry.claim_request_counter)
            .unwrap_or(0)
    }
}

/// Read everything needed to plan a claim.
///
/// Independent reads run concurrently. Fails with `NamespaceNotFound` if the
/// namespace does not exist and `NoOwnerFound` if an entry token is out of
/// custody but no holder can be located.
pub async fn resolve_state(reader: &LedgerStateReader, target: ClaimTarget) -> Result<StateSnapshot> {
    let (namespace, entry, claim_request) = tokio::try_join!(
        reader.try_fetch_namespace(&target.namespace),
        reader.try_fetch_name_entry(&target.namespace, &target.entry),
        reader.try_fetch_claim_request(&target.namespace, &target.entry, &target.requestor),
    )?;
    let namespace = namespace.ok_or_else(|| ClaimError::NamespaceNotFound(target.namespace.clone()))?;

    let (global_reverse_entry, namespace_reverse_entry) = tokio::try_join!(
        reader.fetch_global_reverse_entry(&target.requestor),
        reader.fetch_namespace_reverse_entry(&target.requestor, &target.namespace),
    )?;

    let entry = match entry {
        Some(entry) => Some(resolve_entry(reader, &target, entry).await?),
        None => None,
    };

    info!(
        namespace = %target.namespace,
        entry = %target.entry,
        requestor = %target.requestor,
        entry_present = entry.is_some(),
        claim_request_present = claim_request.is_some(),
        global_reverse_entry = ?global_reverse_entry.as_ref().map(|r| r.namespace_name.as_str()),
        "Resolved claim state"
    );

    Ok(StateSnapshot {
        target,
        namespace,
        entry,
        claim_request,
        global_reverse_entry,
        namespace_reverse_entry,
    })
}

async fn resolve_entry(reader: &LedgerStateReader, target: &ClaimTarget, entry: NameEntry) -> Result<EntryState> {
    let representation = classify::classify(reader, &entry.mint).await?;

    if !entry.is_claimed {
        return Ok(EntryState {
            entry,
            representation,
            custody: None,
            holder: None,
        });
    }

    let custody = classify::custody(reader, &entry.mint, &target.namespace).await?;
    let holder = if custody.should_revoke() {
        let holder = reader
            .find_token_holder(&entry.mint)
            .await?
            .ok_or(ClaimError::NoOwnerFound(entry.mint))?;
        debug!(
            mint = %entry.mint,
            owner = %holder.owner,
            "Entry token held outside namespace custody"
        );
        Some(holder)
    } else {
        None
    };

    Ok(EntryState {
        entry,
        representation,
        custody: Some(custody),
        holder,
    })
}
