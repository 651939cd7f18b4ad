//! Server-side signing for claim batches.
//!
//! The server holds two kinds of keys: namespace approve authorities (long
//! lived, loaded from configuration) and fresh mint keypairs (generated per
//! batch, dropped once signed). The requestor's wallet signature is never
//! produced here.

pub mod coordinator;
pub mod keys;

pub use coordinator::{EncodedTransaction, SigningCoordinator};
pub use keys::{encode_keypair, generate_keypair, parse_secret_key};
