//! Program-derived account addresses.
//!
//! Every record the claim flow touches lives at an address derived from its
//! seeds and owning program, so state can be looked up without an index.

use solana_sdk::pubkey::Pubkey;

/// Namespaces program (entries, claim requests, reverse entries)
pub const NAMESPACES_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("nameXpT2PwZ2iA6DTNYTotTmiMYusBCYqwBLN2QgF4w");

/// Associated token account program
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Token metadata program (metadata + master edition records)
pub const TOKEN_METADATA_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

pub const NAMESPACE_SEED: &[u8] = b"namespace";
pub const ENTRY_SEED: &[u8] = b"entry";
pub const CLAIM_REQUEST_SEED: &[u8] = b"claim-request";
pub const REVERSE_ENTRY_SEED: &[u8] = b"reverse-entry";
pub const GLOBAL_REVERSE_ENTRY_SEED: &[u8] = b"global-reverse-entry";
pub const METADATA_SEED: &[u8] = b"metadata";
pub const EDITION_SEED: &[u8] = b"edition";

/// Canonical program-derived address (highest off-curve bump) for `seeds`.
///
/// Each seed must be at most 32 bytes; callers validate names first.
pub fn derive_address(seeds: &[&[u8]], program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(seeds, program_id).0
}

/// Program identifiers the claim flow talks to.
///
/// Defaults to the mainnet deployments; tests and local ledgers override
/// the namespaces program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramIds {
    pub namespaces: Pubkey,
    pub token: Pubkey,
    pub associated_token: Pubkey,
    pub token_metadata: Pubkey,
    pub system: Pubkey,
}

impl Default for ProgramIds {
    fn default() -> Self {
        Self {
            namespaces: NAMESPACES_PROGRAM_ID,
            token: spl_token::ID,
            associated_token: ASSOCIATED_TOKEN_PROGRAM_ID,
            token_metadata: TOKEN_METADATA_PROGRAM_ID,
            system: solana_sdk::system_program::ID,
        }
    }
}

impl ProgramIds {
    /// Override the namespaces program id.
    pub fn with_namespaces(mut self, program_id: Pubkey) -> Self {
        self.namespaces = program_id;
        self
    }

    pub fn namespace_address(&self, namespace_name: &str) -> Pubkey {
        derive_address(&[NAMESPACE_SEED, namespace_name.as_bytes()], &self.namespaces)
    }

    pub fn entry_address(&self, namespace: &Pubkey, entry_name: &str) -> Pubkey {
        derive_address(
            &[ENTRY_SEED, namespace.as_ref(), entry_name.as_bytes()],
            &self.namespaces,
        )
    }

    pub fn claim_request_address(
        &self,
        namespace: &Pubkey,
        entry_name: &str,
        requestor: &Pubkey,
    ) -> Pubkey {
        derive_address(
            &[
                CLAIM_REQUEST_SEED,
                namespace.as_ref(),
                entry_name.as_bytes(),
                requestor.as_ref(),
            ],
            &self.namespaces,
        )
    }

    /// Namespace-scoped reverse entry: one per wallet per namespace.
    pub fn namespace_reverse_entry_address(&self, namespace: &Pubkey, wallet: &Pubkey) -> Pubkey {
        derive_address(
            &[REVERSE_ENTRY_SEED, namespace.as_ref(), wallet.as_ref()],
            &self.namespaces,
        )
    }

    /// Global reverse entry: at most one per wallet.
    pub fn global_reverse_entry_address(&self, wallet: &Pubkey) -> Pubkey {
        derive_address(&[GLOBAL_REVERSE_ENTRY_SEED, wallet.as_ref()], &self.namespaces)
    }

    pub fn metadata_address(&self, mint: &Pubkey) -> Pubkey {
        derive_address(
            &[METADATA_SEED, self.token_metadata.as_ref(), mint.as_ref()],
            &self.token_metadata,
        )
    }

    /// Master edition record; its existence marks a managed token.
    pub fn master_edition_address(&self, mint: &Pubkey) -> Pubkey {
        derive_address(
            &[
                METADATA_SEED,
                self.token_metadata.as_ref(),
                mint.as_ref(),
                EDITION_SEED,
            ],
            &self.token_metadata,
        )
    }

    /// Associated token account of `owner` for `mint`.
    pub fn token_account_address(&self, owner: &Pubkey, mint: &Pubkey) -> Pubkey {
        derive_address(
            &[owner.as_ref(), self.token.as_ref(), mint.as_ref()],
            &self.associated_token,
        )
    }
}
