//! In-memory ledger for tests and development mode.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use spl_token::state::AccountState;

use crate::ledger::{
    pack_token_account, AccountRecord, ClaimRequest, Hash, NameEntry, Namespace, ProgramIds, Pubkey,
    RecencyToken, ReverseEntry, TokenAccount,
};
use crate::types::Result;

use super::{AccountSource, TokenBalance};

/// Dev-mode recency window, in blocks
const RECENCY_WINDOW_BLOCKS: u64 = 150;

/// Ledger backed by concurrent maps.
///
/// Records are written at their derived addresses so the typed reader finds
/// them exactly as it would on a real ledger.
pub struct InMemoryLedger {
    ids: ProgramIds,
    accounts: DashMap<Pubkey, Vec<u8>>,
    token_accounts: DashMap<Pubkey, TokenAccount>,
    block_height: AtomicU64,
    reads: AtomicU64,
}

impl InMemoryLedger {
    pub fn new(ids: ProgramIds) -> Self {
        Self {
            ids,
            accounts: DashMap::new(),
            token_accounts: DashMap::new(),
            block_height: AtomicU64::new(1),
            reads: AtomicU64::new(0),
        }
    }

    pub fn ids(&self) -> &ProgramIds {
        &self.ids
    }

    /// Number of account reads served.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Advance the chain, so the next recency token differs.
    pub fn advance_block(&self) {
        self.block_height.fetch_add(1, Ordering::SeqCst);
    }

    pub fn put_account(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.insert(address, data);
    }

    pub fn remove_account(&self, address: &Pubkey) {
        self.accounts.remove(address);
        self.token_accounts.remove(address);
    }

    pub fn put_namespace(&self, namespace: &Namespace) -> Result<()> {
        let address = self.ids.namespace_address(&namespace.name);
        self.put_account(address, namespace.encode()?);
        Ok(())
    }

    /// Store an entry under the namespace named `namespace_name`.
    pub fn put_entry(&self, namespace_name: &str, entry: &NameEntry) -> Result<()> {
        let namespace = self.ids.namespace_address(namespace_name);
        self.put_account(self.ids.entry_address(&namespace, &entry.name), entry.encode()?);
        Ok(())
    }

    pub fn put_claim_request(&self, namespace_name: &str, request: &ClaimRequest) -> Result<()> {
        let namespace = self.ids.namespace_address(namespace_name);
        let address = self
            .ids
            .claim_request_address(&namespace, &request.entry_name, &request.requestor);
        self.put_account(address, request.encode()?);
        Ok(())
    }

    pub fn put_namespace_reverse_entry(&self, reverse: &ReverseEntry) -> Result<()> {
        let namespace = self.ids.namespace_address(&reverse.namespace_name);
        let address = self
            .ids
            .namespace_reverse_entry_address(&namespace, &reverse.wallet);
        self.put_account(address, reverse.encode()?);
        Ok(())
    }

    pub fn put_global_reverse_entry(&self, reverse: &ReverseEntry) -> Result<()> {
        let address = self.ids.global_reverse_entry_address(&reverse.wallet);
        self.put_account(address, reverse.encode()?);
        Ok(())
    }

    /// Mark a mint as a managed edition.
    pub fn put_master_edition(&self, mint: &Pubkey) {
        self.put_account(self.ids.master_edition_address(mint), b"master-edition".to_vec());
    }

    /// Store an initialized token account at the owner's associated
    /// address; returns that address.
    pub fn put_token_account(&self, mint: Pubkey, owner: Pubkey, amount: u64) -> Pubkey {
        let address = self.ids.token_account_address(&owner, &mint);
        self.token_accounts.insert(
            address,
            TokenAccount {
                mint,
                owner,
                amount,
                state: AccountState::Initialized,
                ..TokenAccount::default()
            },
        );
        address
    }
}

#[async_trait]
impl AccountSource for InMemoryLedger {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(account) = self.token_accounts.get(address) {
            return Ok(Some(pack_token_account(account.mint, account.owner, account.amount)?));
        }
        Ok(self.accounts.get(address).map(|data| data.value().clone()))
    }

    async fn largest_token_accounts(&self, mint: &Pubkey) -> Result<Vec<TokenBalance>> {
        let mut balances: Vec<TokenBalance> = self
            .token_accounts
            .iter()
            .filter(|entry| entry.value().mint == *mint)
            .map(|entry| TokenBalance {
                address: *entry.key(),
                amount: entry.value().amount,
            })
            .collect();
        balances.sort_by(|a, b| b.amount.cmp(&a.amount));
        Ok(balances)
    }

    async fn latest_recency_token(&self) -> Result<RecencyToken> {
        let height = self.block_height.load(Ordering::SeqCst);
        let mut blockhash = [0u8; 32];
        blockhash[..8].copy_from_slice(&height.to_le_bytes());
        blockhash[8] = 0xb1;
        Ok(RecencyToken {
            blockhash: Hash::new_from_array(blockhash),
            last_valid_block_height: height + RECENCY_WINDOW_BLOCKS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use solana_sdk::program_pack::Pack;

    use crate::state::LedgerStateReader;

    #[tokio::test]
    async fn test_typed_reads_find_stored_records() {
        let ledger = Arc::new(InMemoryLedger::new(ProgramIds::default()));
        let authority = Pubkey::new_unique();
        ledger.put_namespace(&Namespace::new("twitter", authority)).unwrap();

        let reader = LedgerStateReader::new(ledger.clone(), ProgramIds::default());
        let ns = reader.try_fetch_namespace("twitter").await.unwrap().unwrap();
        assert_eq!(ns.approve_authority, authority);
        assert!(reader.try_fetch_namespace("discord").await.unwrap().is_none());
        assert!(reader
            .try_fetch_name_entry("twitter", "alice")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_token_holder_lookup() {
        let ledger = Arc::new(InMemoryLedger::new(ProgramIds::default()));
        let mint = Pubkey::new_unique();
        let holder = Pubkey::new_unique();
        ledger.put_token_account(mint, Pubkey::new_unique(), 0);
        let holder_account = ledger.put_token_account(mint, holder, 1);

        let reader = LedgerStateReader::new(ledger, ProgramIds::default());
        let found = reader.find_token_holder(&mint).await.unwrap().unwrap();
        assert_eq!(found.owner, holder);
        assert_eq!(found.token_account, holder_account);
        assert!(reader
            .find_token_holder(&Pubkey::new_unique())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_recency_token_follows_blocks() {
        let ledger = InMemoryLedger::new(ProgramIds::default());
        let first = ledger.latest_recency_token().await.unwrap();
        assert_eq!(first, ledger.latest_recency_token().await.unwrap());
        ledger.advance_block();
        let second = ledger.latest_recency_token().await.unwrap();
        assert_ne!(first.blockhash, second.blockhash);
        assert!(second.last_valid_block_height > first.last_valid_block_height);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let ledger = Arc::new(InMemoryLedger::new(ProgramIds::default()));
        let address = ledger.ids().namespace_address("twitter");
        ledger.put_account(address, vec![0u8; 4]);

        let reader = LedgerStateReader::new(ledger, ProgramIds::default());
        assert!(reader.try_fetch_namespace("twitter").await.is_err());
    }

    #[tokio::test]
    async fn test_token_accounts_served_in_token_program_layout() {
        let ledger = InMemoryLedger::new(ProgramIds::default());
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let address = ledger.put_token_account(mint, owner, 1);

        let data = ledger.get_account_data(&address).await.unwrap().unwrap();
        let account = spl_token::state::Account::unpack(&data).unwrap();
        assert_eq!(account.mint, mint);
        assert_eq!(account.owner, owner);
        assert_eq!(account.amount, 1);
    }
}
