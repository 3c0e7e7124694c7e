use std::fmt;
use std::str::FromStr;

use mechaworks_errors::MarketError;
use serde::{Deserialize, Serialize};

/// 金额，以固定精度的最小单位表示
///
/// All ledger arithmetic happens on this integer representation. Conversion to
/// the settlement network's native unit only happens through [`CurrencyScale`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(units: i64) -> Self {
        Self(units)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Share of this amount earned by one of `parts` equal contributors, rounded down.
    pub fn share_of(self, parts: i32) -> Amount {
        if parts <= 0 {
            return Amount::ZERO;
        }
        Amount(self.0 / i64::from(parts))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 内部金额精度与链上最小单位(lamports)之间的换算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyScale {
    /// minor units per whole settlement-currency unit
    pub total_decimals: i64,
    /// lamports per whole settlement-currency unit
    pub lamports_per_unit: u64,
}

impl Default for CurrencyScale {
    fn default() -> Self {
        Self {
            total_decimals: 1_000_000,
            lamports_per_unit: 1_000_000_000,
        }
    }
}

impl CurrencyScale {
    pub fn new(total_decimals: i64, lamports_per_unit: u64) -> Self {
        Self {
            total_decimals,
            lamports_per_unit,
        }
    }

    /// Rounds down, so a payout never sends more than the ledger holds.
    /// `None` when the result does not fit in a `u64`.
    pub fn to_lamports(&self, amount: Amount) -> Option<u64> {
        if amount.minor_units() <= 0 || self.total_decimals <= 0 {
            return Some(0);
        }
        let lamports = (amount.minor_units() as u128) * u128::from(self.lamports_per_unit)
            / self.total_decimals as u128;
        u64::try_from(lamports).ok()
    }
}

/// 经过认证的Worker身份
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub i64);

/// 经过认证的任务发布者身份
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(pub i64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 链上钱包地址 (base58 编码的 32 字节公钥)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for WalletAddress {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bytes = bs58::decode(trimmed).into_vec().map_err(|e| {
            MarketError::validation_error(format!("钱包地址不是有效的base58: {trimmed} ({e})"))
        })?;
        if bytes.len() != 32 {
            return Err(MarketError::validation_error(format!(
                "钱包地址长度无效: {trimmed} ({} 字节)",
                bytes.len()
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "6anbDQNCcVh2f6okexjaX1VGj6tEnizJ1kV5UTBS8Zhi";

    #[test]
    fn test_share_of_rounds_down() {
        assert_eq!(Amount::from_minor(100_000).share_of(100), Amount::from_minor(1_000));
        assert_eq!(Amount::from_minor(199).share_of(100), Amount::from_minor(1));
        assert_eq!(Amount::from_minor(500).share_of(0), Amount::ZERO);
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Amount::from_minor(5);
        assert_eq!(a.checked_add(Amount::from_minor(3)), Some(Amount::from_minor(8)));
        assert_eq!(Amount::from_minor(i64::MAX).checked_add(a), None);
        assert!(!Amount::ZERO.is_positive());
    }

    #[test]
    fn test_to_lamports() {
        let scale = CurrencyScale::default();
        // 0.1 unit
        assert_eq!(scale.to_lamports(Amount::from_minor(100_000)), Some(100_000_000));
        // 5 units
        assert_eq!(scale.to_lamports(Amount::from_minor(5_000_000)), Some(5_000_000_000));
        assert_eq!(scale.to_lamports(Amount::ZERO), Some(0));
        assert_eq!(scale.to_lamports(Amount::from_minor(-10)), Some(0));

        let coarse = CurrencyScale::new(3, 10);
        assert_eq!(coarse.to_lamports(Amount::from_minor(1)), Some(3));
    }

    #[test]
    fn test_to_lamports_refuses_overflow() {
        let scale = CurrencyScale::default();
        assert_eq!(scale.to_lamports(Amount::from_minor(i64::MAX)), None);
        // largest amount that still fits: u64::MAX / 1000 minor units
        let edge = Amount::from_minor((u64::MAX / 1_000) as i64);
        assert_eq!(scale.to_lamports(edge), Some(u64::MAX / 1_000 * 1_000));
    }

    #[test]
    fn test_wallet_address_parsing() {
        let address: WalletAddress = ADDRESS.parse().unwrap();
        assert_eq!(address.as_str(), ADDRESS);
        assert_eq!(address.to_string(), ADDRESS);

        assert!("not-base58-0OIl".parse::<WalletAddress>().is_err());
        assert!("abc".parse::<WalletAddress>().is_err());
        assert!("".parse::<WalletAddress>().is_err());
    }

    #[test]
    fn test_wallet_address_serde() {
        let json = format!("\"{ADDRESS}\"");
        let address: WalletAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&address).unwrap(), json);
        assert!(serde_json::from_str::<WalletAddress>("\"short\"").is_err());
    }
}
