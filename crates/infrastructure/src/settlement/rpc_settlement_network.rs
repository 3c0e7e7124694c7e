//! 基于HTTP的链上结算网络适配器
//!
//! Lookups go to the chain's JSON-RPC endpoint (`getTransaction`); transfers
//! are handed to a custody signer service that holds the platform key.

use std::time::Duration;

use async_trait::async_trait;
use mechaworks_domain::{SettlementNetwork, TransactionDetails, TransferOutcome, WalletAddress};
use mechaworks_errors::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

pub struct RpcSettlementNetwork {
    rpc_url: String,
    signer_url: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    meta: Option<RpcTransactionMeta>,
    transaction: RpcTransactionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransactionMeta {
    err: Option<serde_json::Value>,
    pre_balances: Vec<u64>,
    post_balances: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct RpcTransactionBody {
    signatures: Vec<String>,
    message: RpcMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMessage {
    account_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    from: &'a str,
    to: &'a str,
    lamports: u64,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    signature: Option<String>,
    error: Option<String>,
}

impl RpcSettlementNetwork {
    pub fn new(
        rpc_url: impl Into<String>,
        signer_url: impl Into<String>,
        request_timeout: Duration,
    ) -> MarketResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| MarketError::config_error(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            signer_url: signer_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn into_details(signature: &str, tx: RpcTransaction) -> MarketResult<TransactionDetails> {
        let meta = tx
            .meta
            .ok_or_else(|| MarketError::payment_invalid(format!("交易缺少执行结果: {signature}")))?;
        if let Some(err) = meta.err {
            return Err(MarketError::payment_invalid(format!(
                "交易执行失败: {signature} ({err})"
            )));
        }

        Ok(TransactionDetails {
            signature: tx
                .transaction
                .signatures
                .into_iter()
                .next()
                .unwrap_or_else(|| signature.to_string()),
            account_keys: tx.transaction.message.account_keys,
            pre_balances: meta.pre_balances,
            post_balances: meta.post_balances,
        })
    }
}

#[async_trait]
impl SettlementNetwork for RpcSettlementNetwork {
    async fn lookup_transaction(
        &self,
        signature: &str,
    ) -> MarketResult<Option<TransactionDetails>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getTransaction",
            "params": [
                signature,
                { "encoding": "json", "commitment": "confirmed", "maxSupportedTransactionVersion": 0 }
            ]
        });

        let response = self.http_client.post(&self.rpc_url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MarketError::Network(format!(
                "查询交易失败: HTTP {status} - {text}"
            )));
        }

        let rpc: RpcResponse<RpcTransaction> = response.json().await?;
        if let Some(err) = rpc.error {
            return Err(MarketError::Network(format!(
                "查询交易失败: RPC {} - {}",
                err.code, err.message
            )));
        }

        match rpc.result {
            Some(tx) => {
                debug!("查询到链上交易: {}", signature);
                Self::into_details(signature, tx).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn transfer(
        &self,
        from: &WalletAddress,
        to: &WalletAddress,
        lamports: u64,
    ) -> TransferOutcome {
        let url = format!("{}/v1/transfers", self.signer_url);
        let request = TransferRequest {
            from: from.as_str(),
            to: to.as_str(),
            lamports,
        };

        let response = match self.http_client.post(&url).json(&request).send().await {
            Ok(response) => response,
            // 请求未发出, 资金不可能移动
            Err(e) if e.is_connect() => {
                warn!("连接签名服务失败: {}", e);
                return TransferOutcome::Rejected(format!("签名服务不可达: {e}"));
            }
            Err(e) => {
                warn!("转账请求结果未知: {}", e);
                return TransferOutcome::Unknown(e.to_string());
            }
        };

        let status = response.status();
        if status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            warn!("签名服务返回服务器错误: HTTP {} - {}", status, text);
            return TransferOutcome::Unknown(format!("HTTP {status} - {text}"));
        }

        let client_error = status.is_client_error();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if client_error => return TransferOutcome::Rejected(format!("HTTP {status} - {e}")),
            Err(e) => return TransferOutcome::Unknown(format!("读取转账响应失败: {e}")),
        };

        match serde_json::from_str::<TransferResponse>(&text) {
            Ok(TransferResponse {
                error: Some(reason), ..
            }) => TransferOutcome::Rejected(reason),
            _ if client_error => TransferOutcome::Rejected(format!("HTTP {status} - {text}")),
            Ok(TransferResponse {
                signature: Some(signature),
                ..
            }) => TransferOutcome::Confirmed(signature),
            _ => TransferOutcome::Unknown(format!("无法解析转账响应: {text}")),
        }
    }
}
