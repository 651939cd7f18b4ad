//! Token representation and custody checks.
//!
//! An entry token is either a legacy certificate or a managed edition. The
//! only signal is the master edition record derived from the mint: if it
//! exists the token is managed, otherwise it is legacy and must be migrated
//! before it can be claimed again. A default (unset) mint has no master
//! edition and classifies as legacy.

use tracing::debug;

use crate::ledger::Pubkey;
use crate::state::LedgerStateReader;
use crate::types::Result;

/// How an entry's ownership token is encoded on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRepresentation {
    /// Pre-edition certificate token; requires migration
    LegacyCertificate { mint: Pubkey },

    /// Managed edition with a master edition record
    ManagedEdition { mint: Pubkey, master_edition: Pubkey },
}

impl TokenRepresentation {
    pub fn mint(&self) -> &Pubkey {
        match self {
            Self::LegacyCertificate { mint } | Self::ManagedEdition { mint, .. } => mint,
        }
    }

    /// Legacy tokens must be migrated before any further claim.
    pub fn requires_migration(&self) -> bool {
        matches!(self, Self::LegacyCertificate { .. })
    }
}

/// Whether the namespace still escrows an entry token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Custody {
    /// Namespace custodial account holds the token
    Escrowed,

    /// Namespace custodial account is empty; someone else holds the token
    ExternallyHeld,
}

impl Custody {
    pub fn should_revoke(&self) -> bool {
        matches!(self, Self::ExternallyHeld)
    }
}

/// Classify a mint by probing for its master edition record.
pub async fn classify(reader: &LedgerStateReader, mint: &Pubkey) -> Result<TokenRepresentation> {
    let master_edition = reader.ids().master_edition_address(mint);
    let representation = if reader.account_exists(&master_edition).await? {
        TokenRepresentation::ManagedEdition {
            mint: *mint,
            master_edition,
        }
    } else {
        TokenRepresentation::LegacyCertificate { mint: *mint }
    };

    debug!(%mint, ?representation, "Classified entry token");
    Ok(representation)
}

/// Custody of `mint` by the namespace's custodial token account.
///
/// A missing custodial account counts as an empty one.
pub async fn custody(reader: &LedgerStateReader, mint: &Pubkey, namespace_name: &str) -> Result<Custody> {
    let ids = reader.ids();
    let namespace = ids.namespace_address(namespace_name);
    let custodial = ids.token_account_address(&namespace, mint);

    let balance = reader
        .try_fetch_token_account(&custodial)
        .await?
        .map(|account| account.amount)
        .unwrap_or(0);

    Ok(if balance == 0 {
        Custody::ExternallyHeld
    } else {
        Custody::Escrowed
    })
}

/// True iff the namespace no longer escrows the token.
pub async fn should_revoke(reader: &LedgerStateReader, mint: &Pubkey, namespace_name: &str) -> Result<bool> {
    Ok(custody(reader, mint, namespace_name).await?.should_revoke())
}
