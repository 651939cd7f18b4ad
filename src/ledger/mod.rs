//! Ledger primitives
//!
//! Thin layer over `solana-sdk` and `spl-token` with everything the claim
//! flow needs to talk about ledger state:
//!
//! - **address**: program ids and program-derived record addresses
//! - **accounts**: namespace, entry, claim request, reverse entry and token records
//! - **instructions**: namespaces-program instruction builders
//! - **transaction**: envelopes, partial signatures and the wire format

pub mod accounts;
pub mod address;
pub mod instructions;
pub mod transaction;

pub use accounts::{
    pack_token_account, unpack_token_account, AccountRecord, ClaimRequest, NameEntry, Namespace,
    ReverseEntry, TokenAccount,
};
pub use address::{derive_address, ProgramIds};
pub use instructions::{instruction_names, EntryRef, NamespaceInstruction, NamespaceProgram};
pub use transaction::{RecencyToken, SerializeConfig, TransactionEnvelope};

pub use solana_sdk::hash::Hash;
pub use solana_sdk::instruction::{AccountMeta, Instruction};
pub use solana_sdk::message::Message;
pub use solana_sdk::pubkey::Pubkey;
pub use solana_sdk::signature::{Keypair, Signature, Signer};
pub use solana_sdk::transaction::Transaction;
