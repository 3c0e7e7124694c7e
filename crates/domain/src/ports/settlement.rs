//! 链上结算网络端口

use async_trait::async_trait;
use mechaworks_errors::MarketResult;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::WalletAddress;

/// Index of the paying account in a funding transaction.
pub const PAYER_ACCOUNT_INDEX: usize = 0;
/// Index of the collection wallet in a funding transaction.
pub const RECIPIENT_ACCOUNT_INDEX: usize = 1;

/// 已确认的链上交易摘要
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionDetails {
    pub signature: String,
    pub account_keys: Vec<String>,
    /// lamport balances per account key before the transaction
    pub pre_balances: Vec<u64>,
    /// lamport balances per account key after the transaction
    pub post_balances: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMismatch {
    MissingAccount { index: usize },
    WrongSource { expected: String, actual: String },
    WrongDestination { expected: String, actual: String },
    WrongAmount { expected: i128, actual: i128 },
}

impl fmt::Display for PaymentMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMismatch::MissingAccount { index } => {
                write!(f, "交易缺少账户 #{index}")
            }
            PaymentMismatch::WrongSource { expected, actual } => {
                write!(f, "付款地址错误: 期望 {expected}, 实际 {actual}")
            }
            PaymentMismatch::WrongDestination { expected, actual } => {
                write!(f, "收款地址错误: 期望 {expected}, 实际 {actual}")
            }
            PaymentMismatch::WrongAmount { expected, actual } => {
                write!(f, "交易金额错误: 期望 {expected} lamports, 实际 {actual} lamports")
            }
        }
    }
}

impl TransactionDetails {
    fn account(&self, index: usize) -> Result<&str, PaymentMismatch> {
        self.account_keys
            .get(index)
            .map(String::as_str)
            .ok_or(PaymentMismatch::MissingAccount { index })
    }

    fn balance_delta(&self, index: usize) -> Result<i128, PaymentMismatch> {
        let pre = self
            .pre_balances
            .get(index)
            .ok_or(PaymentMismatch::MissingAccount { index })?;
        let post = self
            .post_balances
            .get(index)
            .ok_or(PaymentMismatch::MissingAccount { index })?;
        Ok(i128::from(*post) - i128::from(*pre))
    }

    /// Checks that exactly `expected_lamports` moved from `expected_from`
    /// (account 0) into `expected_to` (account 1).
    pub fn verify_incoming_payment(
        &self,
        expected_from: &WalletAddress,
        expected_to: &WalletAddress,
        expected_lamports: u64,
    ) -> Result<(), PaymentMismatch> {
        let received = self.balance_delta(RECIPIENT_ACCOUNT_INDEX)?;
        if received != i128::from(expected_lamports) {
            return Err(PaymentMismatch::WrongAmount {
                expected: i128::from(expected_lamports),
                actual: received,
            });
        }

        let recipient = self.account(RECIPIENT_ACCOUNT_INDEX)?;
        if recipient != expected_to.as_str() {
            return Err(PaymentMismatch::WrongDestination {
                expected: expected_to.to_string(),
                actual: recipient.to_string(),
            });
        }

        let payer = self.account(PAYER_ACCOUNT_INDEX)?;
        if payer != expected_from.as_str() {
            return Err(PaymentMismatch::WrongSource {
                expected: expected_from.to_string(),
                actual: payer.to_string(),
            });
        }

        Ok(())
    }
}

/// 转账结果
///
/// Timeouts are never folded into `Rejected`: only a confirmed rejection may
/// be compensated in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Confirmed(String),
    Rejected(String),
    Unknown(String),
}

/// 链上结算网络
#[async_trait]
pub trait SettlementNetwork: Send + Sync {
    async fn lookup_transaction(&self, signature: &str)
        -> MarketResult<Option<TransactionDetails>>;

    async fn transfer(
        &self,
        from: &WalletAddress,
        to: &WalletAddress,
        lamports: u64,
    ) -> TransferOutcome;
}
