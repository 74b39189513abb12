//! JSON-RPC 2.0 ledger backend for Solana-compatible endpoints.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

use super::{AccountInfo, Commitment, LedgerClient, TxStatus};
use crate::error::LedgerError;
use crate::keys::Address;
use crate::transaction::Transaction;

/// Monotonic request id shared across clients.
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Slot-context wrapper most query responses carry.
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatusValue {
    confirmation_status: Option<String>,
    err: Option<Value>,
}

/// Account as returned under base64 encoding: `data` is a
/// `[content, encoding]` pair.
#[derive(Debug, Deserialize)]
struct UiAccount {
    lamports: u64,
    owner: String,
    data: (String, String),
}

#[derive(Debug, Deserialize)]
struct KeyedUiAccount {
    pubkey: String,
    account: UiAccount,
}

/// JSON-RPC client bound to one endpoint and commitment level.
pub struct RpcLedgerClient {
    endpoint: String,
    commitment: Commitment,
    client: reqwest::Client,
}

impl RpcLedgerClient {
    pub fn new(endpoint: impl Into<String>, commitment: Commitment) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            endpoint: endpoint.into(),
            commitment,
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, LedgerError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        trace!(method, "rpc request");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("{method}: {e}")))?;
        let body: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::Transport(format!("{method}: invalid response: {e}")))?;
        if let Some(error) = body.error {
            return Err(classify_rpc_error(error.code, error.message));
        }
        body.result
            .ok_or_else(|| LedgerError::Transport(format!("{method}: empty result")))
    }
}

/// Map a JSON-RPC error onto the typed taxonomy where the message is
/// recognizable; everything else stays a raw code/message pair.
fn classify_rpc_error(code: i64, message: String) -> LedgerError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient funds") || lower.contains("insufficient lamports") {
        LedgerError::InsufficientFunds(message)
    } else {
        LedgerError::Rpc { code, message }
    }
}

fn decode_ui_account(ui: UiAccount) -> Result<AccountInfo, LedgerError> {
    let (content, encoding) = ui.data;
    if encoding != "base64" {
        return Err(LedgerError::MalformedAccount(format!(
            "unexpected account encoding {encoding}"
        )));
    }
    let data = BASE64
        .decode(content.as_bytes())
        .map_err(|e| LedgerError::MalformedAccount(format!("account data: {e}")))?;
    let owner = Address::from_base58(&ui.owner)
        .map_err(|e| LedgerError::MalformedAccount(e.to_string()))?;
    Ok(AccountInfo {
        lamports: ui.lamports,
        owner,
        data,
    })
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn submit_transaction(&self, tx: &Transaction) -> Result<String, LedgerError> {
        let encoded = BASE64.encode(tx.serialize());
        let params = json!([
            encoded,
            { "encoding": "base64", "preflightCommitment": self.commitment.as_str() }
        ]);
        let signature: String = self.call("sendTransaction", params).await?;
        debug!(%signature, "transaction submitted");
        Ok(signature)
    }

    async fn signature_status(&self, signature: &str) -> Result<TxStatus, LedgerError> {
        let statuses: WithContext<Vec<Option<SignatureStatusValue>>> =
            self.call("getSignatureStatuses", json!([[signature]])).await?;
        let Some(Some(status)) = statuses.value.into_iter().next() else {
            return Ok(TxStatus::Unknown);
        };
        if let Some(err) = status.err {
            return Ok(TxStatus::Failed(err.to_string()));
        }
        Ok(match status.confirmation_status.as_deref() {
            Some("processed") => TxStatus::Processed,
            Some("confirmed") => TxStatus::Confirmed,
            Some("finalized") => TxStatus::Finalized,
            _ => TxStatus::Unknown,
        })
    }

    async fn latest_blockhash(&self) -> Result<[u8; 32], LedgerError> {
        let response: WithContext<BlockhashValue> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment.as_str() }]),
            )
            .await?;
        let bytes = bs58::decode(&response.value.blockhash)
            .into_vec()
            .map_err(|e| LedgerError::Transport(format!("blockhash: {e}")))?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| LedgerError::Transport(format!("blockhash length {}", bytes.len())))
    }

    async fn minimum_balance_for_rent_exemption(&self, size: usize) -> Result<u64, LedgerError> {
        self.call("getMinimumBalanceForRentExemption", json!([size]))
            .await
    }

    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, LedgerError> {
        let params = json!([
            address.to_base58(),
            { "encoding": "base64", "commitment": self.commitment.as_str() }
        ]);
        let response: WithContext<Option<UiAccount>> = self.call("getAccountInfo", params).await?;
        response.value.map(decode_ui_account).transpose()
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        offset: usize,
        bytes: &[u8],
    ) -> Result<Vec<(Address, AccountInfo)>, LedgerError> {
        let params = json!([
            program.to_base58(),
            {
                "encoding": "base64",
                "commitment": self.commitment.as_str(),
                "filters": [
                    { "memcmp": { "offset": offset, "bytes": bs58::encode(bytes).into_string() } }
                ]
            }
        ]);
        let keyed: Vec<KeyedUiAccount> = self.call("getProgramAccounts", params).await?;
        keyed
            .into_iter()
            .map(|entry| {
                let address = Address::from_base58(&entry.pubkey)
                    .map_err(|e| LedgerError::MalformedAccount(e.to_string()))?;
                Ok((address, decode_ui_account(entry.account)?))
            })
            .collect()
    }

    async fn get_balance(&self, address: &Address) -> Result<u64, LedgerError> {
        let params = json!([
            address.to_base58(),
            { "commitment": self.commitment.as_str() }
        ]);
        let response: WithContext<u64> = self.call("getBalance", params).await?;
        Ok(response.value)
    }

    async fn request_airdrop(
        &self,
        address: &Address,
        lamports: u64,
    ) -> Result<String, LedgerError> {
        self.call("requestAirdrop", json!([address.to_base58(), lamports]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_insufficient_funds() {
        let err = classify_rpc_error(-32002, "Transfer: insufficient lamports 5, need 10".into());
        assert!(matches!(err, LedgerError::InsufficientFunds(_)));

        let err = classify_rpc_error(-32602, "Invalid param: WrongSize".into());
        assert!(matches!(err, LedgerError::Rpc { code: -32602, .. }));
    }

    #[test]
    fn ui_account_parses_tuple_data() {
        let raw = r#"{
            "lamports": 2039280,
            "owner": "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb",
            "data": ["AQID", "base64"],
            "executable": false,
            "rentEpoch": 361
        }"#;
        let ui: UiAccount = serde_json::from_str(raw).unwrap();
        let info = decode_ui_account(ui).unwrap();
        assert_eq!(info.lamports, 2_039_280);
        assert_eq!(info.data, vec![1, 2, 3]);
    }

    #[test]
    fn unexpected_encoding_is_rejected() {
        let ui = UiAccount {
            lamports: 1,
            owner: Address([0u8; 32]).to_base58(),
            data: ("00".into(), "base58".into()),
        };
        assert!(decode_ui_account(ui).is_err());
    }

    #[test]
    fn signature_status_value_parses() {
        let raw = r#"{ "slot": 9, "confirmations": null, "confirmationStatus": "finalized", "err": null }"#;
        let status: SignatureStatusValue = serde_json::from_str(raw).unwrap();
        assert_eq!(status.confirmation_status.as_deref(), Some("finalized"));
        assert!(status.err.is_none());

        let raw = r#"{ "confirmationStatus": "processed", "err": {"InstructionError": [0, "Custom"]} }"#;
        let status: SignatureStatusValue = serde_json::from_str(raw).unwrap();
        assert!(status.err.is_some());
    }
}
