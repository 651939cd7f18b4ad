//! Error types shared across the claim pipeline.

use thiserror::Error;

use crate::ledger::Pubkey;

/// Claim pipeline error
///
/// Every stage (state reads, classification, planning, assembly, signing)
/// reports through this one type so a failed request surfaces as a single
/// value and never as a partial envelope set.
#[derive(Debug, Error)]
pub enum ClaimError {
    /// External identity proof was rejected
    #[error("Identity not verified: {0}")]
    IdentityNotVerified(String),

    /// No server-held approve authority for the namespace
    #[error("No approve authority configured for namespace '{0}'")]
    NoApproveAuthorityConfigured(String),

    /// Configured authority is not the namespace's approve authority on the ledger
    #[error("Approve authority mismatch for namespace '{namespace}': configured {configured}, ledger expects {expected}")]
    ApproveAuthorityMismatch {
        namespace: String,
        configured: Pubkey,
        expected: Pubkey,
    },

    /// Namespace record does not exist
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    /// Claim request belongs to a previous claim cycle
    #[error("Stale claim request for '{entry}': request counter {request_counter}, entry counter {entry_counter}")]
    StaleClaimRequest {
        entry: String,
        request_counter: u32,
        entry_counter: u32,
    },

    /// Token is not escrowed but no holder could be found
    #[error("No owner found for mint {0}")]
    NoOwnerFound(Pubkey),

    /// Entry name is empty or too long to derive an address from
    #[error("Invalid entry name: {0}")]
    InvalidEntryName(String),

    /// Requestor wallet address is malformed
    #[error("Invalid requestor key: {0}")]
    InvalidRequestorKey(String),

    /// Ledger transport or RPC failure
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Account or envelope bytes could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Envelope or instruction could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Signature could not be applied or verified
    #[error("Signing error: {0}")]
    Signing(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<base64::DecodeError> for ClaimError {
    fn from(e: base64::DecodeError) -> Self {
        ClaimError::Decode(format!("base64: {e}"))
    }
}

impl From<bs58::decode::Error> for ClaimError {
    fn from(e: bs58::decode::Error) -> Self {
        ClaimError::Decode(format!("base58: {e}"))
    }
}

impl ClaimError {
    /// Whether the caller can fix this by re-planning with fresh state.
    ///
    /// Configuration and input errors are permanent for the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClaimError::Ledger(_) | ClaimError::Http(_) | ClaimError::StaleClaimRequest { .. }
        )
    }
}

/// Result type for claim operations
pub type Result<T> = std::result::Result<T, ClaimError>;
