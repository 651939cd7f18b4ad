//! JSON-RPC ledger client.
//!
//! Speaks the ledger node's HTTP JSON-RPC interface:
//!
//! - `getAccountInfo` with base64 encoding for account data
//! - `getTokenLargestAccounts` for current token holders
//! - `getLatestBlockhash` for the recency token

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::ledger::{Hash, Pubkey, RecencyToken};
use crate::types::{ClaimError, Result};

use super::{AccountSource, TokenBalance};

/// RPC client configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// JSON-RPC endpoint
    pub url: String,

    /// Commitment level for reads
    pub commitment: String,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8899".to_string(),
            commitment: "confirmed".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    /// `[data, encoding]`
    data: (String, String),
}

#[derive(Debug, Deserialize)]
struct LargestAccount {
    address: String,
    /// Raw amount as a decimal string
    amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

/// Ledger reader over HTTP JSON-RPC.
pub struct RpcLedger {
    config: RpcConfig,
    client: Client,
    next_id: AtomicU64,
}

impl RpcLedger {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            config,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: JsonValue) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "RPC request");
        let response = self.client.post(&self.config.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(method, status = status.as_u16(), "RPC request failed");
            return Err(ClaimError::Ledger(format!(
                "{method} returned HTTP {}: {message}",
                status.as_u16()
            )));
        }

        let parsed: RpcResponse<T> = response.json().await?;
        if let Some(err) = parsed.error {
            return Err(ClaimError::Ledger(format!(
                "{method} failed ({}): {}",
                err.code, err.message
            )));
        }
        parsed
            .result
            .ok_or_else(|| ClaimError::Ledger(format!("{method} returned no result")))
    }
}

#[async_trait]
impl AccountSource for RpcLedger {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let result: WithContext<Option<AccountInfo>> = self
            .call(
                "getAccountInfo",
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": self.config.commitment }
                ]),
            )
            .await?;

        let Some(info) = result.value else {
            return Ok(None);
        };
        let (data, encoding) = info.data;
        if encoding != "base64" {
            return Err(ClaimError::Decode(format!(
                "unexpected account encoding '{encoding}' for {address}"
            )));
        }
        Ok(Some(BASE64.decode(data)?))
    }

    async fn largest_token_accounts(&self, mint: &Pubkey) -> Result<Vec<TokenBalance>> {
        let result: WithContext<Vec<LargestAccount>> = self
            .call(
                "getTokenLargestAccounts",
                json!([mint.to_string(), { "commitment": self.config.commitment }]),
            )
            .await?;

        result
            .value
            .into_iter()
            .map(|account| {
                let address = account
                    .address
                    .parse::<Pubkey>()
                    .map_err(|e| ClaimError::Decode(format!("token account address: {e}")))?;
                let amount = account
                    .amount
                    .parse::<u64>()
                    .map_err(|e| ClaimError::Decode(format!("token amount: {e}")))?;
                Ok(TokenBalance { address, amount })
            })
            .collect()
    }

    async fn latest_recency_token(&self) -> Result<RecencyToken> {
        let result: WithContext<LatestBlockhash> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.config.commitment }]),
            )
            .await?;

        let blockhash: Hash = result
            .value
            .blockhash
            .parse()
            .map_err(|e| ClaimError::Decode(format!("blockhash: {e}")))?;
        Ok(RecencyToken {
            blockhash,
            last_valid_block_height: result.value.last_valid_block_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::ledger::{AccountRecord, Namespace, ProgramIds};
    use crate::state::LedgerStateReader;
    use std::sync::Arc;

    async fn ledger_for(server: &MockServer) -> RpcLedger {
        RpcLedger::new(RpcConfig {
            url: server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_account_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getAccountInfo" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": { "context": { "slot": 10 }, "value": null }
            })))
            .mount(&server)
            .await;

        let ledger = ledger_for(&server).await;
        assert!(ledger
            .get_account_data(&Pubkey::new_unique())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_account_data_decodes_into_records() {
        let server = MockServer::start().await;
        let namespace = Namespace::new("twitter", Pubkey::new_unique());
        let data = BASE64.encode(namespace.encode().unwrap());

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getAccountInfo" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "context": { "slot": 10 },
                    "value": {
                        "data": [data, "base64"],
                        "executable": false,
                        "lamports": 1000,
                        "owner": ProgramIds::default().namespaces.to_string()
                    }
                }
            })))
            .mount(&server)
            .await;

        let reader = LedgerStateReader::new(Arc::new(ledger_for(&server).await), ProgramIds::default());
        let fetched = reader.try_fetch_namespace("twitter").await.unwrap();
        assert_eq!(fetched, Some(namespace));
    }

    #[tokio::test]
    async fn test_rpc_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32005, "message": "Node is behind" }
            })))
            .mount(&server)
            .await;

        let ledger = ledger_for(&server).await;
        let err = ledger.latest_recency_token().await.unwrap_err();
        assert!(matches!(err, ClaimError::Ledger(ref m) if m.contains("Node is behind")));
    }

    #[tokio::test]
    async fn test_http_failure_is_ledger_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let ledger = ledger_for(&server).await;
        let err = ledger.get_account_data(&Pubkey::new_unique()).await.unwrap_err();
        assert!(matches!(err, ClaimError::Ledger(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_latest_blockhash_and_largest_accounts() {
        let server = MockServer::start().await;
        let blockhash = Hash::new_from_array([9u8; 32]);
        let holder = Pubkey::new_unique();

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getLatestBlockhash" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "context": { "slot": 10 },
                    "value": { "blockhash": blockhash.to_string(), "lastValidBlockHeight": 300 }
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getTokenLargestAccounts" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": {
                    "context": { "slot": 10 },
                    "value": [
                        { "address": holder.to_string(), "amount": "1", "decimals": 0, "uiAmount": 1.0 }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let ledger = ledger_for(&server).await;
        let token = ledger.latest_recency_token().await.unwrap();
        assert_eq!(token.blockhash, blockhash);
        assert_eq!(token.last_valid_block_height, 300);

        let largest = ledger.largest_token_accounts(&Pubkey::new_unique()).await.unwrap();
        assert_eq!(largest, vec![TokenBalance { address: holder, amount: 1 }]);
    }
}
