//! namesake - claim planner for namespace identity tokens
//!
//! Binds an externally verified handle to a single non-fungible ledger token
//! inside a namespace, and keeps each wallet's primary identity pointer
//! consistent across namespaces.
//!
//! Given a claim request the planner reads current ledger state, decides the
//! minimal ordered set of ledger operations (init, migrate, revoke, claim),
//! packs them into envelopes with the right fee payer, recency token and
//! signers, and returns them partially signed for the requestor's wallet.
//!
//! ## Modules
//!
//! - **ledger**: derived addresses, account records, instruction builders, envelopes (on `solana-sdk`)
//! - **state**: ledger reads (JSON-RPC and in-memory) and snapshot resolution
//! - **classify**: legacy vs managed token representation, custody check
//! - **planner**: pure decision table over a snapshot
//! - **assembler**: plan to ordered envelopes
//! - **signing**: server-held signatures and wire encoding
//! - **service**: the end-to-end claim pipeline

pub mod assembler;
pub mod classify;
pub mod config;
pub mod identity;
pub mod ledger;
pub mod planner;
pub mod service;
pub mod signing;
pub mod state;
pub mod types;

pub use config::{ApproveAuthorities, Args, ClaimConfig};
pub use identity::{
    canonical_handle, IdentityProof, IdentityVerification, IdentityVerifier, StaticVerifier,
};
pub use service::{ClaimService, PlannedClaim};
pub use signing::EncodedTransaction;
pub use types::{ClaimError, Result};
