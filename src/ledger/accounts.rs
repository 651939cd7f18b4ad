//! Account records owned by the namespaces program, plus token accounts.
//!
//! Namespaces records use the Anchor layout: an 8-byte discriminator
//! (`sha256("account:<Name>")[..8]`) followed by the borsh body. Token
//! accounts use the token program's packed layout.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use spl_token::state::AccountState;

use crate::types::{ClaimError, Result};

/// Token balance record (token program layout)
pub use spl_token::state::Account as TokenAccount;

/// Discriminator length prefixing every namespaces record and instruction
pub const DISCRIMINATOR_LEN: usize = 8;

/// First 8 bytes of `sha256("<namespace>:<name>")`.
pub(crate) fn discriminator(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

/// A record stored by the namespaces program.
pub trait AccountRecord: BorshSerialize + BorshDeserialize {
    /// Record type name, hashed into the discriminator
    const NAME: &'static str;

    fn discriminator() -> [u8; DISCRIMINATOR_LEN] {
        discriminator("account", Self::NAME)
    }

    /// Decode account data, checking the discriminator.
    ///
    /// Accounts are allocated with spare space, so trailing bytes after the
    /// body are ignored.
    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < DISCRIMINATOR_LEN {
            return Err(ClaimError::Decode(format!(
                "{} account too short: {} bytes",
                Self::NAME,
                data.len()
            )));
        }
        let (tag, mut body) = data.split_at(DISCRIMINATOR_LEN);
        if tag != Self::discriminator() {
            return Err(ClaimError::Decode(format!(
                "account is not a {} (discriminator {})",
                Self::NAME,
                hex::encode(tag)
            )));
        }
        Self::deserialize(&mut body).map_err(|e| ClaimError::Decode(format!("{}: {e}", Self::NAME)))
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut data = Self::discriminator().to_vec();
        self.serialize(&mut data)
            .map_err(|e| ClaimError::Encode(format!("{}: {e}", Self::NAME)))?;
        Ok(data)
    }
}

/// A category of claimable identities (e.g. "twitter").
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Namespace {
    pub bump: u8,

    /// Namespace name
    pub name: String,

    /// Authority that approves claim requests
    pub approve_authority: Pubkey,

    /// Whether claimed entry tokens may move between wallets
    pub transferable_entries: bool,

    /// Daily rental price (0 = free)
    pub payment_amount_daily: u64,

    /// Mint payments are made in
    pub payment_mint: Pubkey,

    /// Minimum rental duration in seconds
    pub min_rental_seconds: i64,

    /// Maximum rental duration in seconds (None = unlimited)
    pub max_rental_seconds: Option<i64>,

    /// Unix time after which claims expire (None = never)
    pub max_expiration: Option<i64>,

    /// Number of entries initialized in this namespace
    pub count: u32,
}

impl AccountRecord for Namespace {
    const NAME: &'static str = "Namespace";
}

impl Namespace {
    /// Namespace with free, non-expiring, non-transferable entries.
    pub fn new(name: impl Into<String>, approve_authority: Pubkey) -> Self {
        Self {
            bump: 0,
            name: name.into(),
            approve_authority,
            transferable_entries: false,
            payment_amount_daily: 0,
            payment_mint: Pubkey::default(),
            min_rental_seconds: 0,
            max_rental_seconds: None,
            max_expiration: None,
            count: 0,
        }
    }
}

/// The slot for one handle inside a namespace.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NameEntry {
    pub bump: u8,

    /// Owning namespace address
    pub namespace: Pubkey,

    /// Handle
    pub name: String,

    /// Namespace-scoped reverse entry currently pointing at this entry
    pub reverse_entry: Option<Pubkey>,

    /// Token mint bound to this entry (default key = none)
    pub mint: Pubkey,

    /// Whether a wallet currently holds the claim
    pub is_claimed: bool,

    /// Bumped on every completed claim; invalidates older claim requests
    pub claim_request_counter: u32,
}

impl AccountRecord for NameEntry {
    const NAME: &'static str = "Entry";
}

impl NameEntry {
    pub fn has_mint(&self) -> bool {
        self.mint != Pubkey::default()
    }
}

/// Authorization for one (entry, requestor) pair.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ClaimRequest {
    pub bump: u8,

    /// Namespace address
    pub namespace: Pubkey,

    /// Entry the request is for
    pub entry_name: String,

    /// Wallet asking to claim
    pub requestor: Pubkey,

    /// Set by the namespace approve authority
    pub is_approved: bool,

    /// Entry counter this request was approved against
    pub counter: u32,
}

impl AccountRecord for ClaimRequest {
    const NAME: &'static str = "ClaimRequest";
}

impl ClaimRequest {
    /// Check the request belongs to the entry's current claim cycle.
    ///
    /// An absent entry has counter 0.
    pub fn ensure_current(&self, entry_counter: u32) -> Result<()> {
        if self.counter != entry_counter {
            return Err(ClaimError::StaleClaimRequest {
                entry: self.entry_name.clone(),
                request_counter: self.counter,
                entry_counter,
            });
        }
        Ok(())
    }

    /// Approved and current.
    pub fn is_valid_for(&self, entry_counter: u32) -> bool {
        self.is_approved && self.ensure_current(entry_counter).is_ok()
    }
}

/// Wallet → identity pointer.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ReverseEntry {
    pub bump: u8,

    /// Wallet this entry resolves
    pub wallet: Pubkey,

    /// Namespace of the identity
    pub namespace_name: String,

    /// Handle of the identity
    pub entry_name: String,
}

impl AccountRecord for ReverseEntry {
    const NAME: &'static str = "ReverseEntry";
}

impl ReverseEntry {
    pub fn new(wallet: Pubkey, namespace_name: impl Into<String>, entry_name: impl Into<String>) -> Self {
        Self {
            bump: 0,
            wallet,
            namespace_name: namespace_name.into(),
            entry_name: entry_name.into(),
        }
    }
}

/// Parse an initialized token account.
pub fn unpack_token_account(data: &[u8]) -> Result<TokenAccount> {
    TokenAccount::unpack(data).map_err(|e| ClaimError::Decode(format!("token account: {e}")))
}

/// Packed layout of an initialized token account holding `amount` of `mint`.
pub fn pack_token_account(mint: Pubkey, owner: Pubkey, amount: u64) -> Result<Vec<u8>> {
    let account = TokenAccount {
        mint,
        owner,
        amount,
        state: AccountState::Initialized,
        ..TokenAccount::default()
    };
    let mut data = vec![0u8; TokenAccount::LEN];
    TokenAccount::pack(account, &mut data)
        .map_err(|e| ClaimError::Encode(format!("token account: {e}")))?;
    Ok(data)
}
