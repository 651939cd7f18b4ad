//! Transaction envelopes and their wire form.
//!
//! An envelope is an ordered instruction list with a fee payer, a recent
//! block hash and any partial signatures collected so far. Before signing or
//! encoding it is compiled into a legacy [`Message`]: account keys are
//! deduplicated into one table ordered fee payer first, then writable
//! signers, read-only signers, writable non-signers and read-only
//! non-signers. On the wire it is a bincode-encoded [`Transaction`].

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;

use crate::types::{ClaimError, Result};

/// Account keys addressable by one message (u8 indices)
pub const MAX_ACCOUNT_KEYS: usize = 256;

/// Freshness marker shared by every envelope of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyToken {
    /// Recent block hash
    pub blockhash: Hash,

    /// Last block height at which envelopes using this hash are accepted
    pub last_valid_block_height: u64,
}

/// Reject instruction sets whose key table or header counts do not fit the
/// message format.
fn check_key_limits(instructions: &[Instruction], payer: &Pubkey) -> Result<()> {
    let mut flags: HashMap<Pubkey, (bool, bool)> = HashMap::new();
    flags.insert(*payer, (true, true));
    for ix in instructions {
        flags.entry(ix.program_id).or_insert((false, false));
        for meta in &ix.accounts {
            let entry = flags.entry(meta.pubkey).or_insert((false, false));
            entry.0 |= meta.is_signer;
            entry.1 |= meta.is_writable;
        }
    }

    if flags.len() > MAX_ACCOUNT_KEYS {
        return Err(ClaimError::Encode(format!(
            "message references {} accounts, limit is {MAX_ACCOUNT_KEYS}",
            flags.len()
        )));
    }

    let signers = flags.values().filter(|(signer, _)| *signer).count();
    let readonly_signed = flags.values().filter(|f| **f == (true, false)).count();
    let readonly_unsigned = flags.values().filter(|f| **f == (false, false)).count();
    for (what, count) in [
        ("signers", signers),
        ("read-only signed accounts", readonly_signed),
        ("read-only unsigned accounts", readonly_unsigned),
    ] {
        if count > u8::MAX as usize {
            return Err(ClaimError::Encode(format!(
                "message has {count} {what}, limit is {}",
                u8::MAX
            )));
        }
    }
    Ok(())
}

/// Rebuild instructions from a compiled message.
///
/// Account flags come from the key table, so an account listed with mixed
/// flags across instructions decompiles with the merged flags.
fn decompile(message: &Message) -> Result<Vec<Instruction>> {
    let header = &message.header;
    let n_keys = message.account_keys.len();
    let num_signed = header.num_required_signatures as usize;
    if num_signed > n_keys
        || header.num_readonly_signed_accounts > header.num_required_signatures
        || header.num_readonly_unsigned_accounts as usize > n_keys - num_signed
    {
        return Err(ClaimError::Decode("message header inconsistent with key table".into()));
    }

    let is_writable = |index: usize| {
        if index < num_signed {
            index < num_signed - header.num_readonly_signed_accounts as usize
        } else {
            index < n_keys - header.num_readonly_unsigned_accounts as usize
        }
    };
    let key_at = |i: u8| -> Result<Pubkey> {
        message
            .account_keys
            .get(i as usize)
            .copied()
            .ok_or_else(|| ClaimError::Decode(format!("account index {i} out of range ({n_keys} keys)")))
    };

    message
        .instructions
        .iter()
        .map(|ci| {
            let accounts = ci
                .accounts
                .iter()
                .map(|&i| {
                    Ok(AccountMeta {
                        pubkey: key_at(i)?,
                        is_signer: (i as usize) < num_signed,
                        is_writable: is_writable(i as usize),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Instruction {
                program_id: key_at(ci.program_id_index)?,
                accounts,
                data: ci.data.clone(),
            })
        })
        .collect()
}

/// Options for [`TransactionEnvelope::serialize`].
#[derive(Debug, Clone, Copy)]
pub struct SerializeConfig {
    /// Fail if any required signature is missing
    pub require_all_signatures: bool,

    /// Verify every present signature against the message
    pub verify_signatures: bool,
}

impl Default for SerializeConfig {
    fn default() -> Self {
        Self {
            require_all_signatures: true,
            verify_signatures: true,
        }
    }
}

impl SerializeConfig {
    /// Partially-signed output for a co-signing client.
    pub fn partial() -> Self {
        Self {
            require_all_signatures: false,
            verify_signatures: false,
        }
    }
}

/// An instruction batch submitted as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionEnvelope {
    instructions: Vec<Instruction>,
    fee_payer: Option<Pubkey>,
    recent_blockhash: Option<Hash>,
    signatures: Vec<(Pubkey, Signature)>,
}

impl TransactionEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.fee_payer.as_ref()
    }

    pub fn recent_blockhash(&self) -> Option<&Hash> {
        self.recent_blockhash.as_ref()
    }

    /// Append an instruction. Clears collected signatures.
    pub fn add(&mut self, instruction: Instruction) {
        self.signatures.clear();
        self.instructions.push(instruction);
    }

    /// Append instructions in order. Clears collected signatures.
    pub fn extend(&mut self, instructions: impl IntoIterator<Item = Instruction>) {
        self.signatures.clear();
        self.instructions.extend(instructions);
    }

    /// Insert instructions ahead of the existing ones. Clears collected signatures.
    pub fn prepend(&mut self, instructions: Vec<Instruction>) {
        self.signatures.clear();
        self.instructions.splice(0..0, instructions);
    }

    pub fn set_fee_payer(&mut self, fee_payer: Pubkey) {
        self.signatures.clear();
        self.fee_payer = Some(fee_payer);
    }

    pub fn set_recent_blockhash(&mut self, blockhash: Hash) {
        self.signatures.clear();
        self.recent_blockhash = Some(blockhash);
    }

    /// Compile the current instruction list.
    pub fn compile_message(&self) -> Result<Message> {
        let payer = self
            .fee_payer
            .ok_or_else(|| ClaimError::Encode("envelope has no fee payer".into()))?;
        let blockhash = self
            .recent_blockhash
            .ok_or_else(|| ClaimError::Encode("envelope has no recent block hash".into()))?;
        check_key_limits(&self.instructions, &payer)?;
        Ok(Message::new_with_blockhash(&self.instructions, Some(&payer), &blockhash))
    }

    /// Keys that must sign this envelope, in signature-slot order.
    pub fn required_signers(&self) -> Result<Vec<Pubkey>> {
        let message = self.compile_message()?;
        let n = message.header.num_required_signatures as usize;
        Ok(message.account_keys[..n].to_vec())
    }

    /// Required signers that have not signed yet.
    pub fn missing_signers(&self) -> Result<Vec<Pubkey>> {
        Ok(self
            .required_signers()?
            .into_iter()
            .filter(|key| self.signature_of(key).is_none())
            .collect())
    }

    pub fn signature_of(&self, key: &Pubkey) -> Option<Signature> {
        self.signatures
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, sig)| *sig)
    }

    /// Sign with a key the message requires, replacing any earlier signature
    /// from the same key.
    pub fn partial_sign(&mut self, keypair: &Keypair) -> Result<()> {
        let message = self.compile_message()?;
        let pubkey = keypair.pubkey();
        let n = message.header.num_required_signatures as usize;
        if !message.account_keys[..n].contains(&pubkey) {
            return Err(ClaimError::Signing(format!(
                "{pubkey} is not a required signer of this envelope"
            )));
        }

        let signature = keypair.sign_message(&message.serialize());
        self.signatures.retain(|(k, _)| *k != pubkey);
        self.signatures.push((pubkey, signature));
        Ok(())
    }

    /// Compile into a ledger transaction with one signature slot per
    /// required signer. Unsigned slots hold the default signature.
    pub fn to_transaction(&self, config: SerializeConfig) -> Result<Transaction> {
        let message = self.compile_message()?;
        let message_bytes = message.serialize();
        let n = message.header.num_required_signatures as usize;

        let mut signatures = Vec::with_capacity(n);
        for key in &message.account_keys[..n] {
            match self.signature_of(key) {
                Some(sig) => {
                    if config.verify_signatures && !sig.verify(key.as_ref(), &message_bytes) {
                        return Err(ClaimError::Signing(format!(
                            "signature verification failed for {key}"
                        )));
                    }
                    signatures.push(sig);
                }
                None if config.require_all_signatures => {
                    return Err(ClaimError::Signing(format!("missing signature for {key}")));
                }
                None => signatures.push(Signature::default()),
            }
        }

        Ok(Transaction { signatures, message })
    }

    /// Wrap a ledger transaction. Signatures are carried over without
    /// verification.
    pub fn from_transaction(transaction: &Transaction) -> Result<Self> {
        let message = &transaction.message;
        let n = message.header.num_required_signatures as usize;
        if transaction.signatures.len() != n {
            return Err(ClaimError::Decode(format!(
                "expected {n} signatures, found {}",
                transaction.signatures.len()
            )));
        }
        let instructions = decompile(message)?;

        let signatures = message
            .account_keys
            .iter()
            .zip(&transaction.signatures)
            .filter(|(_, sig)| **sig != Signature::default())
            .map(|(key, sig)| (*key, *sig))
            .collect();

        Ok(Self {
            instructions,
            fee_payer: message.account_keys.first().copied(),
            recent_blockhash: Some(message.recent_blockhash),
            signatures,
        })
    }

    /// Encode to wire bytes.
    pub fn serialize(&self, config: SerializeConfig) -> Result<Vec<u8>> {
        bincode::serialize(&self.to_transaction(config)?)
            .map_err(|e| ClaimError::Encode(format!("transaction: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let transaction: Transaction = bincode::deserialize(bytes)
            .map_err(|e| ClaimError::Decode(format!("transaction: {e}")))?;
        Self::from_transaction(&transaction)
    }

    pub fn to_base64(&self, config: SerializeConfig) -> Result<String> {
        Ok(BASE64.encode(self.serialize(config)?))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        Self::from_bytes(&BASE64.decode(encoded)?)
    }
}
