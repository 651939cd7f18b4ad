//! Identity verification.
//!
//! Checking an external identity (OAuth grant, signed social post) happens
//! outside this crate. The claim service only consumes the verdict through
//! [`IdentityVerifier`]. [`StaticVerifier`] answers from a fixed allowlist for
//! tests and development mode.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::Result;

/// Canonical form of an external handle: trimmed and lowercased.
///
/// Entry addresses are derived from this form, so every path that turns a
/// handle into an entry name goes through it.
pub fn canonical_handle(handle: &str) -> String {
    handle.trim().to_lowercase()
}

/// Evidence that a wallet controls an external handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProof {
    /// Wallet the handle should be bound to (base58)
    pub wallet: String,

    /// Handle the requestor claims to control
    pub handle: String,

    /// Opaque proof material (OAuth token, post URL, ...)
    pub proof: String,
}

/// Verifier verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityVerification {
    pub verified: bool,

    /// Canonical handle; becomes the entry name
    pub handle: String,

    /// Rejection reason
    pub reason: Option<String>,
}

impl IdentityVerification {
    pub fn verified(handle: impl Into<String>) -> Self {
        Self {
            verified: true,
            handle: handle.into(),
            reason: None,
        }
    }

    pub fn rejected(handle: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            verified: false,
            handle: handle.into(),
            reason: Some(reason.into()),
        }
    }
}

/// External identity check.
///
/// `Err` means the check itself could not run; a failed proof is an
/// `Ok` verdict with `verified: false`.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, proof: &IdentityProof) -> Result<IdentityVerification>;
}

/// Allowlist verifier.
///
/// Accepts a proof iff its `(wallet, handle)` pair was registered. Handles
/// are compared and returned in [`canonical_handle`] form.
#[derive(Debug, Default)]
pub struct StaticVerifier {
    allowed: HashSet<(String, String)>,
    call_count: AtomicU32,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `wallet` to claim `handle`.
    pub fn allow(mut self, wallet: impl Into<String>, handle: &str) -> Self {
        self.allowed.insert((wallet.into(), canonical_handle(handle)));
        self
    }

    /// Number of times verify was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, proof: &IdentityProof) -> Result<IdentityVerification> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let handle = canonical_handle(&proof.handle);
        if proof.proof.is_empty() {
            return Ok(IdentityVerification::rejected(handle, "empty proof"));
        }
        if self.allowed.contains(&(proof.wallet.clone(), handle.clone())) {
            Ok(IdentityVerification::verified(handle))
        } else {
            Ok(IdentityVerification::rejected(
                handle,
                "handle not linked to wallet",
            ))
        }
    }
}
