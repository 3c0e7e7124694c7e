use mechaworks_domain::{Amount, CurrencyScale};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TASK_TITLE: &str = "Select the most clickable thumbnail";

/// 市场经济参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// minor units per settlement-currency unit
    pub total_decimals: i64,
    pub lamports_per_unit: u64,
    /// submissions a task accepts before it stops being handed out
    pub completion_quota: i32,
    /// price of one task in minor units
    pub task_price: i64,
    pub default_title: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            total_decimals: 1_000_000,
            lamports_per_unit: 1_000_000_000,
            completion_quota: 100,
            task_price: 100_000,
            default_title: DEFAULT_TASK_TITLE.to_string(),
        }
    }
}

impl MarketConfig {
    pub fn currency_scale(&self) -> CurrencyScale {
        CurrencyScale::new(self.total_decimals, self.lamports_per_unit)
    }

    pub fn task_price(&self) -> Amount {
        Amount::from_minor(self.task_price)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.total_decimals <= 0 {
            return Err(anyhow::anyhow!("total_decimals 必须大于0"));
        }

        if self.lamports_per_unit == 0 {
            return Err(anyhow::anyhow!("lamports_per_unit 必须大于0"));
        }

        if self.completion_quota <= 0 {
            return Err(anyhow::anyhow!("任务完成配额必须大于0"));
        }

        if self.task_price <= 0 {
            return Err(anyhow::anyhow!("任务价格必须大于0"));
        }

        if self.task_price < i64::from(self.completion_quota) {
            return Err(anyhow::anyhow!(
                "任务价格 {} 不足以支付 {} 次提交",
                self.task_price,
                self.completion_quota
            ));
        }

        Ok(())
    }
}
