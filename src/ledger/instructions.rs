//! Instruction builders for the namespaces program.
//!
//! Each builder appends exactly one instruction to the envelope it is given
//! and has no other effect. Instruction data follows the Anchor convention:
//! `sha256("global:<instruction_name>")[..8]` followed by the borsh-encoded
//! arguments.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::types::{ClaimError, Result};

use super::accounts::{discriminator, DISCRIMINATOR_LEN};
use super::address::ProgramIds;
use super::transaction::TransactionEnvelope;

const INSTRUCTION_NAMES: [&str; 9] = [
    "init_entry",
    "init_entry_mint",
    "claim_entry",
    "revoke_entry",
    "migrate_entry_mint",
    "set_namespace_reverse_entry",
    "set_global_reverse_entry",
    "create_claim_request",
    "approve_claim_request",
];

/// Instruction payloads understood by the namespaces program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceInstruction {
    InitEntry { name: String },
    InitEntryMint,
    ClaimEntry,
    RevokeEntry,
    MigrateEntryMint,
    SetNamespaceReverseEntry,
    SetGlobalReverseEntry,
    CreateClaimRequest { entry_name: String },
    ApproveClaimRequest { is_approved: bool },
}

impl NamespaceInstruction {
    /// Instruction data: discriminator, then borsh arguments.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut data = discriminator("global", self.name()).to_vec();
        match self {
            Self::InitEntry { name } => name.serialize(&mut data),
            Self::CreateClaimRequest { entry_name } => entry_name.serialize(&mut data),
            Self::ApproveClaimRequest { is_approved } => is_approved.serialize(&mut data),
            _ => Ok(()),
        }
        .map_err(|e| ClaimError::Encode(format!("{}: {e}", self.name())))?;
        Ok(data)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < DISCRIMINATOR_LEN {
            return Err(ClaimError::Decode(format!(
                "instruction data too short: {} bytes",
                data.len()
            )));
        }
        let (tag, mut args) = data.split_at(DISCRIMINATOR_LEN);
        let name = INSTRUCTION_NAMES
            .iter()
            .find(|name| discriminator("global", name) == tag)
            .ok_or_else(|| ClaimError::Decode(format!("unknown instruction {}", hex::encode(tag))))?;

        let arg_err = |e: std::io::Error| ClaimError::Decode(format!("{name}: {e}"));
        Ok(match *name {
            "init_entry" => Self::InitEntry {
                name: String::deserialize(&mut args).map_err(arg_err)?,
            },
            "init_entry_mint" => Self::InitEntryMint,
            "claim_entry" => Self::ClaimEntry,
            "revoke_entry" => Self::RevokeEntry,
            "migrate_entry_mint" => Self::MigrateEntryMint,
            "set_namespace_reverse_entry" => Self::SetNamespaceReverseEntry,
            "set_global_reverse_entry" => Self::SetGlobalReverseEntry,
            "create_claim_request" => Self::CreateClaimRequest {
                entry_name: String::deserialize(&mut args).map_err(arg_err)?,
            },
            "approve_claim_request" => Self::ApproveClaimRequest {
                is_approved: bool::deserialize(&mut args).map_err(arg_err)?,
            },
            other => return Err(ClaimError::Decode(format!("unknown instruction {other}"))),
        })
    }

    /// Stable snake_case name, used in logs and tests.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitEntry { .. } => "init_entry",
            Self::InitEntryMint => "init_entry_mint",
            Self::ClaimEntry => "claim_entry",
            Self::RevokeEntry => "revoke_entry",
            Self::MigrateEntryMint => "migrate_entry_mint",
            Self::SetNamespaceReverseEntry => "set_namespace_reverse_entry",
            Self::SetGlobalReverseEntry => "set_global_reverse_entry",
            Self::CreateClaimRequest { .. } => "create_claim_request",
            Self::ApproveClaimRequest { .. } => "approve_claim_request",
        }
    }
}

/// Identifies the entry an instruction operates on.
#[derive(Debug, Clone, Copy)]
pub struct EntryRef<'a> {
    pub namespace: &'a str,
    pub entry: &'a str,
}

/// Builds namespaces-program instructions against a set of program ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamespaceProgram {
    ids: ProgramIds,
}

impl NamespaceProgram {
    pub fn new(ids: ProgramIds) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &ProgramIds {
        &self.ids
    }

    fn push(
        &self,
        envelope: &mut TransactionEnvelope,
        payload: NamespaceInstruction,
        accounts: Vec<AccountMeta>,
    ) -> Result<()> {
        envelope.add(Instruction {
            program_id: self.ids.namespaces,
            accounts,
            data: payload.encode()?,
        });
        Ok(())
    }

    /// Create the claim request record for `requestor`.
    pub fn create_claim_request(
        &self,
        envelope: &mut TransactionEnvelope,
        entry: EntryRef<'_>,
        requestor: &Pubkey,
    ) -> Result<()> {
        let ids = &self.ids;
        let namespace = ids.namespace_address(entry.namespace);
        let accounts = vec![
            AccountMeta::new_readonly(namespace, false),
            AccountMeta::new(ids.claim_request_address(&namespace, entry.entry, requestor), false),
            AccountMeta::new(*requestor, true),
            AccountMeta::new_readonly(ids.system, false),
        ];
        self.push(
            envelope,
            NamespaceInstruction::CreateClaimRequest {
                entry_name: entry.entry.to_string(),
            },
            accounts,
        )
    }

    /// Approve the claim request; signed by the namespace approve authority.
    /// Approval also resets the request counter to the entry's current one.
    pub fn approve_claim_request(
        &self,
        envelope: &mut TransactionEnvelope,
        entry: EntryRef<'_>,
        requestor: &Pubkey,
        approve_authority: &Pubkey,
    ) -> Result<()> {
        let ids = &self.ids;
        let namespace = ids.namespace_address(entry.namespace);
        let accounts = vec![
            AccountMeta::new_readonly(namespace, false),
            AccountMeta::new_readonly(ids.entry_address(&namespace, entry.entry), false),
            AccountMeta::new(ids.claim_request_address(&namespace, entry.entry, requestor), false),
            AccountMeta::new_readonly(*approve_authority, true),
        ];
        self.push(
            envelope,
            NamespaceInstruction::ApproveClaimRequest { is_approved: true },
            accounts,
        )
    }

    /// Create the entry slot.
    pub fn init_entry(
        &self,
        envelope: &mut TransactionEnvelope,
        entry: EntryRef<'_>,
        payer: &Pubkey,
    ) -> Result<()> {
        let ids = &self.ids;
        let namespace = ids.namespace_address(entry.namespace);
        let accounts = vec![
            AccountMeta::new(namespace, false),
            AccountMeta::new(ids.entry_address(&namespace, entry.entry), false),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(ids.system, false),
        ];
        self.push(
            envelope,
            NamespaceInstruction::InitEntry {
                name: entry.entry.to_string(),
            },
            accounts,
        )
    }

    /// Mint the managed-edition token for an entry into namespace custody.
    /// `mint` is a fresh keypair and must sign.
    pub fn init_entry_mint(
        &self,
        envelope: &mut TransactionEnvelope,
        entry: EntryRef<'_>,
        mint: &Pubkey,
        payer: &Pubkey,
    ) -> Result<()> {
        let ids = &self.ids;
        let namespace = ids.namespace_address(entry.namespace);
        let accounts = vec![
            AccountMeta::new_readonly(namespace, false),
            AccountMeta::new(ids.entry_address(&namespace, entry.entry), false),
            AccountMeta::new(*mint, true),
            AccountMeta::new(ids.metadata_address(mint), false),
            AccountMeta::new(ids.master_edition_address(mint), false),
            AccountMeta::new(ids.token_account_address(&namespace, mint), false),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(ids.token, false),
            AccountMeta::new_readonly(ids.associated_token, false),
            AccountMeta::new_readonly(ids.token_metadata, false),
            AccountMeta::new_readonly(ids.system, false),
        ];
        self.push(envelope, NamespaceInstruction::InitEntryMint, accounts)
    }

    /// Move the entry token from namespace custody to the requestor,
    /// consuming the approved claim request.
    pub fn claim_entry(
        &self,
        envelope: &mut TransactionEnvelope,
        entry: EntryRef<'_>,
        mint: &Pubkey,
        requestor: &Pubkey,
    ) -> Result<()> {
        let ids = &self.ids;
        let namespace = ids.namespace_address(entry.namespace);
        let accounts = vec![
            AccountMeta::new(namespace, false),
            AccountMeta::new(ids.entry_address(&namespace, entry.entry), false),
            AccountMeta::new(*requestor, true),
            AccountMeta::new(ids.claim_request_address(&namespace, entry.entry, requestor), false),
            AccountMeta::new(*mint, false),
            AccountMeta::new(ids.token_account_address(&namespace, mint), false),
            AccountMeta::new(ids.token_account_address(requestor, mint), false),
            AccountMeta::new_readonly(ids.token, false),
            AccountMeta::new_readonly(ids.associated_token, false),
            AccountMeta::new_readonly(ids.system, false),
        ];
        self.push(envelope, NamespaceInstruction::ClaimEntry, accounts)
    }

    /// Force the current holder to relinquish the entry token back to the
    /// namespace. Authorized by the requestor's claim request.
    pub fn revoke_entry(
        &self,
        envelope: &mut TransactionEnvelope,
        entry: EntryRef<'_>,
        mint: &Pubkey,
        holder_token_account: &Pubkey,
        requestor: &Pubkey,
    ) -> Result<()> {
        let ids = &self.ids;
        let namespace = ids.namespace_address(entry.namespace);
        let accounts = vec![
            AccountMeta::new_readonly(namespace, false),
            AccountMeta::new(ids.entry_address(&namespace, entry.entry), false),
            AccountMeta::new_readonly(ids.claim_request_address(&namespace, entry.entry, requestor), false),
            AccountMeta::new(*mint, false),
            AccountMeta::new(ids.token_account_address(&namespace, mint), false),
            AccountMeta::new(*holder_token_account, false),
            AccountMeta::new(*requestor, true),
            AccountMeta::new_readonly(ids.token, false),
        ];
        self.push(envelope, NamespaceInstruction::RevokeEntry, accounts)
    }

    /// Burn the legacy certificate token held in custody and bind the entry
    /// to a freshly minted managed edition. `new_mint` must sign.
    pub fn migrate_entry_mint(
        &self,
        envelope: &mut TransactionEnvelope,
        entry: EntryRef<'_>,
        old_mint: &Pubkey,
        new_mint: &Pubkey,
        payer: &Pubkey,
    ) -> Result<()> {
        let ids = &self.ids;
        let namespace = ids.namespace_address(entry.namespace);
        let accounts = vec![
            AccountMeta::new_readonly(namespace, false),
            AccountMeta::new(ids.entry_address(&namespace, entry.entry), false),
            AccountMeta::new(*old_mint, false),
            AccountMeta::new(ids.token_account_address(&namespace, old_mint), false),
            AccountMeta::new(*new_mint, true),
            AccountMeta::new(ids.metadata_address(new_mint), false),
            AccountMeta::new(ids.master_edition_address(new_mint), false),
            AccountMeta::new(ids.token_account_address(&namespace, new_mint), false),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(ids.token, false),
            AccountMeta::new_readonly(ids.associated_token, false),
            AccountMeta::new_readonly(ids.token_metadata, false),
            AccountMeta::new_readonly(ids.system, false),
        ];
        self.push(envelope, NamespaceInstruction::MigrateEntryMint, accounts)
    }

    /// Point the wallet's namespace-scoped reverse entry at this entry.
    pub fn set_namespace_reverse_entry(
        &self,
        envelope: &mut TransactionEnvelope,
        entry: EntryRef<'_>,
        mint: &Pubkey,
        wallet: &Pubkey,
    ) -> Result<()> {
        let ids = &self.ids;
        let namespace = ids.namespace_address(entry.namespace);
        let accounts = vec![
            AccountMeta::new_readonly(namespace, false),
            AccountMeta::new(ids.entry_address(&namespace, entry.entry), false),
            AccountMeta::new(ids.namespace_reverse_entry_address(&namespace, wallet), false),
            AccountMeta::new_readonly(ids.token_account_address(wallet, mint), false),
            AccountMeta::new(*wallet, true),
            AccountMeta::new_readonly(ids.system, false),
        ];
        self.push(envelope, NamespaceInstruction::SetNamespaceReverseEntry, accounts)
    }

    /// Point the wallet's global (primary) reverse entry at this entry.
    pub fn set_global_reverse_entry(
        &self,
        envelope: &mut TransactionEnvelope,
        entry: EntryRef<'_>,
        mint: &Pubkey,
        wallet: &Pubkey,
    ) -> Result<()> {
        let ids = &self.ids;
        let namespace = ids.namespace_address(entry.namespace);
        let accounts = vec![
            AccountMeta::new_readonly(namespace, false),
            AccountMeta::new_readonly(ids.entry_address(&namespace, entry.entry), false),
            AccountMeta::new(ids.global_reverse_entry_address(wallet), false),
            AccountMeta::new_readonly(ids.token_account_address(wallet, mint), false),
            AccountMeta::new(*wallet, true),
            AccountMeta::new_readonly(ids.system, false),
        ];
        self.push(envelope, NamespaceInstruction::SetGlobalReverseEntry, accounts)
    }
}

/// Names of the namespaces-program instructions in an envelope, in order.
/// Instructions for other programs are skipped.
pub fn instruction_names(envelope: &TransactionEnvelope, program: &NamespaceProgram) -> Vec<&'static str> {
    envelope
        .instructions()
        .iter()
        .filter(|ix| ix.program_id == program.ids().namespaces)
        .filter_map(|ix| NamespaceInstruction::decode(&ix.data).ok())
        .map(|ix| ix.name())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: EntryRef<'static> = EntryRef {
        namespace: "twitter",
        entry: "alice",
    };

    #[test]
    fn test_builders_append_in_order() {
        let program = NamespaceProgram::default();
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let mut envelope = TransactionEnvelope::new();

        program.init_entry(&mut envelope, ALICE, &wallet).unwrap();
        program.init_entry_mint(&mut envelope, ALICE, &mint, &wallet).unwrap();
        program.claim_entry(&mut envelope, ALICE, &mint, &wallet).unwrap();

        assert_eq!(
            instruction_names(&envelope, &program),
            vec!["init_entry", "init_entry_mint", "claim_entry"]
        );
    }

    #[test]
    fn test_payload_roundtrip() {
        let program = NamespaceProgram::default();
        let mut envelope = TransactionEnvelope::new();
        program
            .create_claim_request(&mut envelope, ALICE, &Pubkey::new_unique())
            .unwrap();

        let decoded = NamespaceInstruction::decode(&envelope.instructions()[0].data).unwrap();
        assert_eq!(
            decoded,
            NamespaceInstruction::CreateClaimRequest {
                entry_name: "alice".into()
            }
        );
    }

    #[test]
    fn test_data_is_anchor_discriminator_then_borsh() {
        use sha2::{Digest, Sha256};

        let data = NamespaceInstruction::ApproveClaimRequest { is_approved: true }
            .encode()
            .unwrap();
        let digest = Sha256::digest(b"global:approve_claim_request");
        assert_eq!(&data[..8], &digest[..8]);
        assert_eq!(&data[8..], &[1]);

        let data = NamespaceInstruction::ClaimEntry.encode().unwrap();
        assert_eq!(data.len(), 8);
        assert_eq!(
            NamespaceInstruction::decode(&data).unwrap(),
            NamespaceInstruction::ClaimEntry
        );
        assert!(NamespaceInstruction::decode(&[0u8; 8]).is_err());
        assert!(NamespaceInstruction::decode(&data[..4]).is_err());
    }

    #[test]
    fn test_approval_requires_authority_signature() {
        let program = NamespaceProgram::default();
        let authority = Pubkey::new_unique();
        let mut envelope = TransactionEnvelope::new();
        program
            .approve_claim_request(&mut envelope, ALICE, &Pubkey::new_unique(), &authority)
            .unwrap();

        let meta = envelope.instructions()[0]
            .accounts
            .iter()
            .find(|m| m.pubkey == authority)
            .unwrap();
        assert!(meta.is_signer);
        assert!(!meta.is_writable);
    }

    #[test]
    fn test_fresh_mints_sign() {
        let program = NamespaceProgram::default();
        let old_mint = Pubkey::new_unique();
        let new_mint = Pubkey::new_unique();
        let mut envelope = TransactionEnvelope::new();
        program
            .migrate_entry_mint(&mut envelope, ALICE, &old_mint, &new_mint, &Pubkey::new_unique())
            .unwrap();

        let accounts = &envelope.instructions()[0].accounts;
        assert!(accounts.iter().any(|m| m.pubkey == new_mint && m.is_signer));
        assert!(accounts.iter().any(|m| m.pubkey == old_mint && !m.is_signer));
    }
}
