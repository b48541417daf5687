//! TronGrid adapters.
//!
//! Reads go through the node's Ethereum-compatible `/jsonrpc` endpoint with an
//! ethers `Provider<Http>`. Submissions use the REST API: the node builds the
//! transaction, we sign its id locally and broadcast it back.

use super::abi::{self, ContractCall};
use super::{CallOptions, ChainClient, InclusionStatus};
use crate::address::TronAddress;
use crate::types::TxId;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::LocalWallet;
use ethers::types::{TransactionRequest, H256, U256};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;
use url::Url;

const API_KEY_HEADER: &str = "tron-pro-api-key";

fn http_client(api_key: Option<&str>) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(key) = api_key {
        headers.insert(API_KEY_HEADER, HeaderValue::from_str(key).context("Invalid API key")?);
    }
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .context("Failed to build HTTP client")
}

fn normalize_host(full_host: &str) -> Result<String> {
    let url = Url::parse(full_host.trim()).with_context(|| format!("Invalid node URL '{}'", full_host))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Read-only contract queries against one TronGrid-compatible node.
pub struct TronGridClient {
    full_host: String,
    provider: Arc<Provider<Http>>,
}

impl TronGridClient {
    pub fn new(full_host: &str, api_key: Option<&str>) -> Result<Self> {
        let full_host = normalize_host(full_host)?;
        let rpc_url = Url::parse(&format!("{}/jsonrpc", full_host))?;
        let provider = Provider::new(Http::new_with_client(rpc_url, http_client(api_key)?));
        Ok(Self {
            full_host,
            provider: Arc::new(provider),
        })
    }

    async fn call_uint(&self, call: ContractCall) -> Result<U256> {
        let tx = TransactionRequest::new()
            .to(call.contract.to_evm())
            .data(call.calldata());
        let output = self
            .provider
            .call(&tx.into(), None)
            .await
            .with_context(|| format!("{} on {} via {}", call.signature, call.contract, self.full_host))?;
        abi::decode_uint(&output)
    }
}

#[async_trait]
impl ChainClient for TronGridClient {
    fn endpoint(&self) -> &str {
        &self.full_host
    }

    async fn balance_of(&self, token: TronAddress, owner: TronAddress) -> Result<U256> {
        self.call_uint(abi::balance_of(token, owner)).await
    }

    async fn allowance(&self, token: TronAddress, owner: TronAddress, spender: TronAddress) -> Result<U256> {
        self.call_uint(abi::allowance(token, owner, spender)).await
    }

    async fn contract_exists(&self, contract: TronAddress) -> Result<bool> {
        let code = self
            .provider
            .get_code(contract.to_evm(), None)
            .await
            .with_context(|| format!("eth_getCode for {} via {}", contract, self.full_host))?;
        Ok(!code.is_empty())
    }
}

/// Tron messages in error responses are usually hex-encoded UTF-8.
fn decode_node_message(message: &str) -> String {
    hex::decode(message)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| message.to_string())
}

#[derive(Debug, Deserialize)]
struct TriggerResult {
    #[serde(default)]
    result: bool,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    result: TriggerResult,
    transaction: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    #[serde(default)]
    result: bool,
    txid: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReceiptInfo {
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionInfo {
    id: Option<String>,
    block_number: Option<u64>,
    receipt: Option<ReceiptInfo>,
    result: Option<String>,
    res_message: Option<String>,
}

impl TransactionInfo {
    fn status(&self) -> InclusionStatus {
        if self.id.is_none() {
            return InclusionStatus::Pending;
        }
        let receipt_result = self.receipt.as_ref().and_then(|r| r.result.as_deref());
        let failed = self.result.as_deref() == Some("FAILED")
            || matches!(receipt_result, Some(r) if r != "SUCCESS");
        if failed {
            let reason = self
                .res_message
                .as_deref()
                .map(decode_node_message)
                .or_else(|| receipt_result.map(str::to_string))
                .unwrap_or_else(|| "transaction failed".to_string());
            return InclusionStatus::Reverted(reason);
        }
        InclusionStatus::Confirmed {
            block_number: self.block_number,
        }
    }
}

/// Parameters for `deploycontract`.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub name: String,
    pub abi: Value,
    pub bytecode: String,
    pub fee_limit: u64,
    pub user_fee_percentage: u64,
    pub origin_energy_limit: u64,
}

/// An unsigned transaction built by the node.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub tx_id: TxId,
    pub body: Value,
}

/// REST client for one full node (`/wallet/*`).
#[derive(Clone)]
pub struct TronHttpApi {
    full_host: String,
    http: reqwest::Client,
}

impl TronHttpApi {
    pub fn new(full_host: &str, api_key: Option<&str>) -> Result<Self> {
        Ok(Self {
            full_host: normalize_host(full_host)?,
            http: http_client(api_key)?,
        })
    }

    pub fn full_host(&self) -> &str {
        &self.full_host
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.full_host, path);
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("{} returned {}: {}", url, status, text));
        }
        response
            .json::<Value>()
            .await
            .with_context(|| format!("Invalid JSON from {}", url))
    }

    /// Ask the node to build a contract-call transaction for `owner`.
    pub async fn trigger_smart_contract(
        &self,
        owner: TronAddress,
        call: &ContractCall,
        options: &CallOptions,
    ) -> Result<UnsignedTransaction> {
        let body = json!({
            "owner_address": owner.to_hex(),
            "contract_address": call.contract.to_hex(),
            "function_selector": call.signature,
            "parameter": hex::encode(call.encoded_params()),
            "fee_limit": options.fee_limit,
            "call_value": options.call_value,
            "visible": false,
        });
        let raw = self.post("/wallet/triggersmartcontract", &body).await?;
        let response: TriggerResponse =
            serde_json::from_value(raw).context("Unexpected triggersmartcontract response")?;

        if !response.result.result {
            let message = response
                .result
                .message
                .as_deref()
                .map(decode_node_message)
                .or(response.result.code)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(anyhow!("{} rejected by node: {}", call.signature, message));
        }
        let transaction = response
            .transaction
            .ok_or_else(|| anyhow!("Node returned no transaction for {}", call.signature))?;
        unsigned_from_value(transaction)
    }

    /// Ask the node to build a contract-creation transaction.
    /// Returns the transaction and the address the contract will have.
    pub async fn deploy_contract(
        &self,
        owner: TronAddress,
        request: &DeployRequest,
    ) -> Result<(UnsignedTransaction, TronAddress)> {
        let body = json!({
            "owner_address": owner.to_hex(),
            "name": request.name,
            "abi": request.abi.to_string(),
            "bytecode": request.bytecode.trim_start_matches("0x"),
            "fee_limit": request.fee_limit,
            "call_value": 0,
            "consume_user_resource_percent": request.user_fee_percentage,
            "origin_energy_limit": request.origin_energy_limit,
            "visible": false,
        });
        let raw = self.post("/wallet/deploycontract", &body).await?;
        if let Some(error) = raw.get("Error").and_then(Value::as_str) {
            return Err(anyhow!("Deploying {} rejected by node: {}", request.name, error));
        }
        let contract_address = raw
            .get("contract_address")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Node returned no contract address for {}", request.name))
            .and_then(TronAddress::from_hex)?;
        Ok((unsigned_from_value(raw)?, contract_address))
    }

    pub async fn broadcast(&self, signed: &Value) -> Result<TxId> {
        let raw = self.post("/wallet/broadcasttransaction", signed).await?;
        let response: BroadcastResponse =
            serde_json::from_value(raw).context("Unexpected broadcasttransaction response")?;
        if !response.result {
            let message = response
                .message
                .as_deref()
                .map(decode_node_message)
                .or(response.code)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(anyhow!("Broadcast rejected: {}", message));
        }
        let tx_id = response
            .txid
            .or_else(|| signed.get("txID").and_then(Value::as_str).map(str::to_string))
            .ok_or_else(|| anyhow!("Broadcast succeeded but no transaction id was returned"))?;
        Ok(TxId(tx_id))
    }

    pub async fn transaction_status(&self, tx: &TxId) -> Result<InclusionStatus> {
        let raw = self
            .post("/wallet/gettransactioninfobyid", &json!({ "value": tx.0 }))
            .await?;
        let info: TransactionInfo =
            serde_json::from_value(raw).context("Unexpected gettransactioninfobyid response")?;
        Ok(info.status())
    }
}

fn unsigned_from_value(body: Value) -> Result<UnsignedTransaction> {
    let tx_id = body
        .get("txID")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Transaction has no txID"))?
        .to_string();
    Ok(UnsignedTransaction {
        tx_id: TxId(tx_id),
        body,
    })
}

/// Sign the transaction id and attach the signature.
///
/// The id must equal `sha256(raw_data_hex)`; anything else means the node sent
/// a transaction that does not match what it claims to be.
pub fn sign_transaction(signer: &LocalWallet, tx: &UnsignedTransaction) -> Result<Value> {
    let raw_hex = tx
        .body
        .get("raw_data_hex")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Transaction has no raw_data_hex"))?;
    let raw = hex::decode(raw_hex).context("raw_data_hex is not valid hex")?;
    let digest = Sha256::digest(&raw);
    if hex::encode(digest) != tx.tx_id.0.to_lowercase() {
        return Err(anyhow!("Transaction id {} does not match its raw data", tx.tx_id));
    }

    let signature = signer
        .sign_hash(H256::from_slice(&digest))
        .map_err(|e| anyhow!("Signing failed: {}", e))?;

    let mut signed = tx.body.clone();
    signed["signature"] = json!([hex::encode(signature.to_vec())]);
    Ok(signed)
}
