//! Ledger state reads.
//!
//! [`AccountSource`] is the transport seam: raw account bytes, token
//! balances and the recency token. [`LedgerStateReader`] layers typed,
//! address-derived queries on top of any source.
//!
//! "Not found" is always `Ok(None)`. Transport and decoding failures are
//! errors and abort the request.

pub mod memory;
pub mod rpc;
pub mod snapshot;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::ledger::{
    unpack_token_account, AccountRecord, ClaimRequest, NameEntry, Namespace, ProgramIds, Pubkey,
    RecencyToken, ReverseEntry, TokenAccount,
};
use crate::types::Result;

pub use memory::InMemoryLedger;
pub use rpc::{RpcConfig, RpcLedger};
pub use snapshot::{resolve_state, ClaimTarget, EntryState, StateSnapshot};

/// Balance of one token account, as reported by a largest-holders query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    pub address: Pubkey,
    pub amount: u64,
}

/// Who currently holds an entry token outside namespace custody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHolder {
    /// Token account holding the token
    pub token_account: Pubkey,

    /// Wallet owning that token account
    pub owner: Pubkey,
}

/// Raw ledger access.
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// Account data, or `None` if the account does not exist.
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>>;

    /// Token accounts for a mint, largest balance first.
    async fn largest_token_accounts(&self, mint: &Pubkey) -> Result<Vec<TokenBalance>>;

    /// A fresh recency token.
    async fn latest_recency_token(&self) -> Result<RecencyToken>;
}

/// Typed read-only queries over an [`AccountSource`].
#[derive(Clone)]
pub struct LedgerStateReader {
    source: Arc<dyn AccountSource>,
    ids: ProgramIds,
}

impl LedgerStateReader {
    pub fn new(source: Arc<dyn AccountSource>, ids: ProgramIds) -> Self {
        Self { source, ids }
    }

    pub fn ids(&self) -> &ProgramIds {
        &self.ids
    }

    async fn try_fetch<T: AccountRecord>(&self, address: &Pubkey) -> Result<Option<T>> {
        match self.source.get_account_data(address).await? {
            Some(data) => Ok(Some(T::decode(&data)?)),
            None => {
                debug!(%address, record = T::NAME, "Account not found");
                Ok(None)
            }
        }
    }

    pub async fn try_fetch_namespace(&self, namespace_name: &str) -> Result<Option<Namespace>> {
        self.try_fetch(&self.ids.namespace_address(namespace_name)).await
    }

    pub async fn try_fetch_name_entry(
        &self,
        namespace_name: &str,
        entry_name: &str,
    ) -> Result<Option<NameEntry>> {
        let namespace = self.ids.namespace_address(namespace_name);
        self.try_fetch(&self.ids.entry_address(&namespace, entry_name)).await
    }

    pub async fn try_fetch_claim_request(
        &self,
        namespace_name: &str,
        entry_name: &str,
        requestor: &Pubkey,
    ) -> Result<Option<ClaimRequest>> {
        let namespace = self.ids.namespace_address(namespace_name);
        self.try_fetch(&self.ids.claim_request_address(&namespace, entry_name, requestor))
            .await
    }

    pub async fn fetch_global_reverse_entry(&self, wallet: &Pubkey) -> Result<Option<ReverseEntry>> {
        self.try_fetch(&self.ids.global_reverse_entry_address(wallet)).await
    }

    pub async fn fetch_namespace_reverse_entry(
        &self,
        wallet: &Pubkey,
        namespace_name: &str,
    ) -> Result<Option<ReverseEntry>> {
        let namespace = self.ids.namespace_address(namespace_name);
        self.try_fetch(&self.ids.namespace_reverse_entry_address(&namespace, wallet))
            .await
    }

    pub async fn account_exists(&self, address: &Pubkey) -> Result<bool> {
        Ok(self.source.get_account_data(address).await?.is_some())
    }

    pub async fn try_fetch_token_account(&self, address: &Pubkey) -> Result<Option<TokenAccount>> {
        match self.source.get_account_data(address).await? {
            Some(data) => Ok(Some(unpack_token_account(&data)?)),
            None => Ok(None),
        }
    }

    /// The non-empty token account currently holding `mint`, if any.
    pub async fn find_token_holder(&self, mint: &Pubkey) -> Result<Option<TokenHolder>> {
        let largest = self.source.largest_token_accounts(mint).await?;
        let Some(balance) = largest.into_iter().find(|b| b.amount > 0) else {
            return Ok(None);
        };

        Ok(self
            .try_fetch_token_account(&balance.address)
            .await?
            .map(|account| TokenHolder {
                token_account: balance.address,
                owner: account.owner,
            }))
    }

    pub async fn latest_recency_token(&self) -> Result<RecencyToken> {
        self.source.latest_recency_token().await
    }
}
