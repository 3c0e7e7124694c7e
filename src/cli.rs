//! 运维命令行
//!
//! Every subcommand prints one JSON document on stdout.

use clap::{Args, Parser, Subcommand};
use mechaworks_application::{FundTaskRequest, Marketplace, Resolution};
use mechaworks_domain::{RequesterId, WorkerId};
use mechaworks_errors::{MarketError, MarketResult};
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "mechaworks")]
#[command(version = "1.0.0")]
#[command(about = "任务众包市场 - 任务分配与链上结算")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// 配置文件路径
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<String>,

    /// 日志级别 (覆盖配置文件)
    #[arg(short, long, value_parser = ["trace", "debug", "info", "warn", "error"], global = true)]
    pub log_level: Option<String>,

    /// 日志格式 (覆盖配置文件)
    #[arg(long, value_parser = ["json", "pretty"], global = true)]
    pub log_format: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// 执行数据库迁移
    Migrate,
    /// 按钱包地址登记Worker
    RegisterWorker { address: String },
    /// 按钱包地址登记任务发布者
    RegisterRequester { address: String },
    /// 核验付款并发布任务
    FundTask(FundTaskArgs),
    /// 获取Worker的下一个任务
    NextTask {
        #[arg(long)]
        worker: i64,
    },
    /// 提交任务答案
    Submit {
        #[arg(long)]
        worker: i64,
        #[arg(long)]
        task: i64,
        #[arg(long)]
        option: i64,
    },
    /// 提现全部待结算余额
    Payout {
        #[arg(long)]
        worker: i64,
    },
    /// 查询Worker余额
    Balance {
        #[arg(long)]
        worker: i64,
    },
    /// 查询任务各选项的提交数
    TaskResults {
        #[arg(long)]
        requester: i64,
        #[arg(long)]
        task: i64,
    },
    /// 列出处理中的提现
    StuckPayouts,
    /// 人工处理一笔卡住的提现
    ResolvePayout(ResolvePayoutArgs),
}

#[derive(Args, Debug, PartialEq)]
pub struct FundTaskArgs {
    #[arg(long)]
    pub requester: i64,
    /// 付款交易签名
    #[arg(long)]
    pub signature: String,
    #[arg(long)]
    pub title: Option<String>,
    /// 选项图片地址, 可重复
    #[arg(long = "option", required = true)]
    pub options: Vec<String>,
}

#[derive(Args, Debug, PartialEq)]
pub struct ResolvePayoutArgs {
    #[arg(long)]
    pub payout: i64,
    /// 链上已确认的转账签名
    #[arg(long, required_unless_present = "revert", conflicts_with = "revert")]
    pub signature: Option<String>,
    /// 转账未发生, 退回待结算余额
    #[arg(long)]
    pub revert: bool,
}

impl ResolvePayoutArgs {
    pub fn resolution(&self) -> Resolution {
        match &self.signature {
            Some(signature) => Resolution::Settled {
                signature: signature.clone(),
            },
            None => Resolution::Reverted,
        }
    }
}

/// Runs a ledger command. `Migrate` is handled by the caller.
pub async fn execute(command: Command, market: &Marketplace) -> MarketResult<Value> {
    let value = match command {
        Command::Migrate => json!({ "migrated": true }),
        Command::RegisterWorker { address } => {
            serde_json::to_value(market.accounts.register_worker(&address).await?)?
        }
        Command::RegisterRequester { address } => {
            serde_json::to_value(market.accounts.register_requester(&address).await?)?
        }
        Command::FundTask(args) => {
            let request = FundTaskRequest {
                title: args.title,
                options: args.options,
                payment_signature: args.signature,
            };
            let assignment = market
                .funding
                .fund_task(RequesterId(args.requester), request)
                .await?;
            serde_json::to_value(assignment)?
        }
        Command::NextTask { worker } => {
            serde_json::to_value(market.allocation.next_task(WorkerId(worker)).await?)?
        }
        Command::Submit {
            worker,
            task,
            option,
        } => serde_json::to_value(
            market
                .allocation
                .submit(WorkerId(worker), task, option)
                .await?,
        )?,
        Command::Payout { worker } => {
            serde_json::to_value(market.payouts.request_payout(WorkerId(worker)).await?)?
        }
        Command::Balance { worker } => {
            serde_json::to_value(market.queries.get_balance(WorkerId(worker)).await?)?
        }
        Command::TaskResults { requester, task } => serde_json::to_value(
            market
                .queries
                .task_results(RequesterId(requester), task)
                .await?,
        )?,
        Command::StuckPayouts => {
            serde_json::to_value(market.reconciliation.list_stuck_payouts().await?)?
        }
        Command::ResolvePayout(args) => serde_json::to_value(
            market
                .reconciliation
                .resolve_payout(args.payout, args.resolution())
                .await?,
        )?,
    };
    Ok(value)
}

/// JSON body printed for a failed command.
pub fn error_body(err: &MarketError) -> Value {
    let mut body = json!({
        "error": err.user_message(),
        "detail": err.to_string(),
        "retryable": err.is_retryable(),
    });
    if let MarketError::SettlementUncertain { payout_id, amount } = err {
        body["payout_id"] = json!(payout_id);
        body["amount"] = json!(amount);
        body["status"] = json!("Processing");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fund_task() {
        let cli = Cli::try_parse_from([
            "mechaworks",
            "fund-task",
            "--requester",
            "3",
            "--signature",
            "5sig",
            "--option",
            "https://cdn.example/a.png",
            "--option",
            "https://cdn.example/b.png",
        ])
        .unwrap();
        match cli.command {
            Command::FundTask(args) => {
                assert_eq!(args.requester, 3);
                assert_eq!(args.options.len(), 2);
                assert!(args.title.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_fund_task_requires_an_option() {
        assert!(Cli::try_parse_from([
            "mechaworks",
            "fund-task",
            "--requester",
            "3",
            "--signature",
            "5sig",
        ])
        .is_err());
    }

    #[test]
    fn test_resolve_payout_needs_exactly_one_resolution() {
        let cli = Cli::try_parse_from(["mechaworks", "resolve-payout", "--payout", "9", "--revert"])
            .unwrap();
        match cli.command {
            Command::ResolvePayout(args) => assert_eq!(args.resolution(), Resolution::Reverted),
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["mechaworks", "resolve-payout", "--payout", "9"]).is_err());
        assert!(Cli::try_parse_from([
            "mechaworks",
            "resolve-payout",
            "--payout",
            "9",
            "--revert",
            "--signature",
            "5sig",
        ])
        .is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mechaworks",
            "balance",
            "--worker",
            "1",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.command, Command::Balance { worker: 1 });
        assert_eq!(cli.log_format.as_deref(), Some("json"));
    }

    #[test]
    fn test_uncertain_payout_error_body() {
        let body = error_body(&MarketError::SettlementUncertain {
            payout_id: 4,
            amount: 5_000_000,
        });
        assert_eq!(body["status"], "Processing");
        assert_eq!(body["payout_id"], 4);
        assert_eq!(body["retryable"], false);
    }
}
