//! Signing Coordinator
//!
//! Applies the server-held signatures to an assembled batch and encodes it
//! for the requestor's wallet, which adds the remaining signatures.

use std::fmt;

use serde::{Deserialize, Serialize};
use solana_sdk::packet::PACKET_DATA_SIZE;
use tracing::{debug, warn};

use crate::assembler::AssembledBatch;
use crate::ledger::{Keypair, Pubkey, SerializeConfig, Signer, TransactionEnvelope};
use crate::types::{ClaimError, Result};

/// Base64 wire encoding of a partially-signed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedTransaction(String);

impl EncodedTransaction {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Decode back into an envelope without verifying signatures.
    pub fn decode(&self) -> Result<TransactionEnvelope> {
        TransactionEnvelope::from_base64(&self.0)
    }
}

impl fmt::Display for EncodedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signs batches with the approve authority and any fresh mint.
pub struct SigningCoordinator<'a> {
    approve_authority: &'a Keypair,
}

impl<'a> SigningCoordinator<'a> {
    pub fn new(approve_authority: &'a Keypair) -> Self {
        Self { approve_authority }
    }

    pub fn authority(&self) -> Pubkey {
        self.approve_authority.pubkey()
    }

    /// Sign and encode every envelope of the batch, in order.
    ///
    /// 1. approve authority signs envelope 0, which carries the approval
    /// 2. the fresh mint, if any, signs the last envelope
    /// 3. each envelope goes through encode, decode and re-encode without
    ///    requiring the requestor's signature
    ///
    /// Consumes the batch, so the fresh mint keypair is dropped afterwards.
    pub fn sign(&self, batch: AssembledBatch) -> Result<Vec<EncodedTransaction>> {
        let AssembledBatch {
            mut envelopes,
            fresh_mint,
            ..
        } = batch;

        let first = envelopes
            .first_mut()
            .ok_or_else(|| ClaimError::Signing("batch has no envelopes".into()))?;
        first.partial_sign(self.approve_authority)?;

        if let Some(fresh) = fresh_mint.as_ref() {
            let last = envelopes
                .last_mut()
                .ok_or_else(|| ClaimError::Signing("batch has no envelopes".into()))?;
            last.partial_sign(fresh.keypair())?;
        }

        envelopes
            .iter()
            .enumerate()
            .map(|(index, envelope)| {
                let bytes = envelope.serialize(SerializeConfig::partial())?;
                let decoded = TransactionEnvelope::from_bytes(&bytes)?;
                let encoded = decoded.to_base64(SerializeConfig::partial())?;
                let missing = decoded.missing_signers()?;
                if bytes.len() > PACKET_DATA_SIZE {
                    warn!(
                        index,
                        bytes = bytes.len(),
                        limit = PACKET_DATA_SIZE,
                        "Envelope exceeds the ledger packet size"
                    );
                }
                debug!(
                    index,
                    bytes = bytes.len(),
                    missing_signers = ?missing,
                    "Encoded envelope"
                );
                Ok(EncodedTransaction(encoded))
            })
            .collect()
    }
}
