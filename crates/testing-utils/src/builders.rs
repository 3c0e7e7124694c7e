//! Test data builders

use mechaworks_domain::TransactionDetails;

use crate::helpers::{PLATFORM_WALLET, REQUESTER_WALLET};

/// Builder for confirmed funding transactions as returned by a chain lookup
pub struct FundingTransactionBuilder {
    signature: String,
    payer: String,
    recipient: String,
    lamports: u64,
    payer_balance: u64,
    fee: u64,
}

impl FundingTransactionBuilder {
    pub fn new(signature: &str) -> Self {
        Self {
            signature: signature.to_string(),
            payer: REQUESTER_WALLET.to_string(),
            recipient: PLATFORM_WALLET.to_string(),
            lamports: 100_000_000,
            payer_balance: 10_000_000_000,
            fee: 5_000,
        }
    }

    pub fn payer(mut self, address: &str) -> Self {
        self.payer = address.to_string();
        self
    }

    pub fn recipient(mut self, address: &str) -> Self {
        self.recipient = address.to_string();
        self
    }

    pub fn lamports(mut self, lamports: u64) -> Self {
        self.lamports = lamports;
        self
    }

    pub fn build(self) -> TransactionDetails {
        let recipient_before = 1_000;
        TransactionDetails {
            signature: self.signature,
            account_keys: vec![self.payer, self.recipient],
            pre_balances: vec![self.payer_balance, recipient_before],
            post_balances: vec![
                self.payer_balance.saturating_sub(self.lamports + self.fee),
                recipient_before + self.lamports,
            ],
        }
    }
}

/// A correct 0.1 unit payment from the default requester to the platform wallet.
pub fn funding_transaction(signature: &str) -> TransactionDetails {
    FundingTransactionBuilder::new(signature).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{wallet, STRANGER_WALLET};

    #[test]
    fn test_default_funding_transaction_verifies() {
        let tx = funding_transaction("sig");
        assert!(tx
            .verify_incoming_payment(&wallet(REQUESTER_WALLET), &wallet(PLATFORM_WALLET), 100_000_000)
            .is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let tx = FundingTransactionBuilder::new("sig")
            .recipient(STRANGER_WALLET)
            .lamports(7)
            .build();
        assert_eq!(tx.account_keys[1], STRANGER_WALLET);
        assert_eq!(tx.post_balances[1] - tx.pre_balances[1], 7);
    }
}
