use std::sync::Arc;

use mechaworks::cli::{error_body, execute, Command, FundTaskArgs, ResolvePayoutArgs};
use mechaworks_application::{MarketSettings, Marketplace};
use mechaworks_core::config::models::{AppConfig, DatabaseConfig};
use mechaworks_domain::TransferOutcome;
use mechaworks_errors::MarketError;
use mechaworks_infrastructure::DatabaseManager;
use mechaworks_testing_utils::{
    funding_transaction, ScriptedSettlementNetwork, OTHER_WORKER_WALLET, PLATFORM_WALLET,
    REQUESTER_WALLET, WORKER_WALLET,
};
use serde_json::Value;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    manager: DatabaseManager,
    network: Arc<ScriptedSettlementNetwork>,
    market: Marketplace,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        database: DatabaseConfig {
            url: format!("sqlite:{}", dir.path().join("market.db").display()),
            max_connections: 4,
            min_connections: 1,
            connection_timeout_seconds: 5,
            run_migrations: true,
        },
        ..AppConfig::default()
    };

    let manager = DatabaseManager::new(&config.database).await.unwrap();
    let network = Arc::new(ScriptedSettlementNetwork::new());
    let settings = MarketSettings::from_config(&config).unwrap();
    let market = Marketplace::new(manager.ledger_store(), network.clone(), settings);

    Harness {
        _dir: dir,
        manager,
        network,
        market,
    }
}

async fn run(h: &Harness, command: Command) -> Value {
    execute(command, &h.market).await.unwrap()
}

async fn register(h: &Harness) -> (i64, i64) {
    let requester = run(
        h,
        Command::RegisterRequester {
            address: REQUESTER_WALLET.to_string(),
        },
    )
    .await;
    let worker = run(
        h,
        Command::RegisterWorker {
            address: WORKER_WALLET.to_string(),
        },
    )
    .await;
    (
        requester["id"].as_i64().unwrap(),
        worker["id"].as_i64().unwrap(),
    )
}

fn fund_args(requester: i64, signature: &str) -> FundTaskArgs {
    FundTaskArgs {
        requester,
        signature: signature.to_string(),
        title: None,
        options: vec![
            "https://cdn.example/a.png".to_string(),
            "https://cdn.example/b.png".to_string(),
        ],
    }
}

#[tokio::test]
async fn test_fund_work_and_payout() {
    let h = harness().await;
    let (requester, worker) = register(&h).await;
    h.network.add_transaction(funding_transaction("fund-1"));

    let task = run(&h, Command::FundTask(fund_args(requester, "fund-1"))).await;
    let task_id = task["task"]["id"].as_i64().unwrap();
    assert_eq!(task["task"]["amount"], 100_000);
    assert_eq!(
        task["task"]["title"],
        "Select the most clickable thumbnail"
    );
    let option_id = task["options"][1]["id"].as_i64().unwrap();

    let next = run(&h, Command::NextTask { worker }).await;
    assert_eq!(next["task"]["id"].as_i64(), Some(task_id));

    let receipt = run(
        &h,
        Command::Submit {
            worker,
            task: task_id,
            option: option_id,
        },
    )
    .await;
    assert_eq!(receipt["amount"], 1_000);
    assert!(receipt["next_task"].is_null());

    let balance = run(&h, Command::Balance { worker }).await;
    assert_eq!(balance["pending"], 1_000);
    assert_eq!(balance["locked"], 0);

    let results = run(
        &h,
        Command::TaskResults {
            requester,
            task: task_id,
        },
    )
    .await;
    let counts: Vec<i64> = results["tallies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["count"].as_i64().unwrap())
        .collect();
    assert_eq!(counts, vec![0, 1]);

    let payout = run(&h, Command::Payout { worker }).await;
    assert_eq!(payout["status"], "Success");
    assert_eq!(payout["signature"], "transfer-1");

    let transfers = h.network.transfers();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].from, PLATFORM_WALLET);
    assert_eq!(transfers[0].to, WORKER_WALLET);
    assert_eq!(transfers[0].lamports, 1_000_000);

    let balance = run(&h, Command::Balance { worker }).await;
    assert_eq!(balance["pending"], 0);
    assert_eq!(balance["locked"], 1_000);

    h.manager.close().await;
}

#[tokio::test]
async fn test_replayed_funding_signature_is_refused() {
    let h = harness().await;
    let (requester, _) = register(&h).await;
    h.network.add_transaction(funding_transaction("fund-2"));

    run(&h, Command::FundTask(fund_args(requester, "fund-2"))).await;
    let err = execute(Command::FundTask(fund_args(requester, "fund-2")), &h.market)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::PaymentAlreadyUsed { .. }));
}

#[tokio::test]
async fn test_uncertain_payout_resolved_by_operator() {
    let h = harness().await;
    let (requester, worker) = register(&h).await;
    h.network.add_transaction(funding_transaction("fund-3"));
    let task = run(&h, Command::FundTask(fund_args(requester, "fund-3"))).await;
    run(
        &h,
        Command::Submit {
            worker,
            task: task["task"]["id"].as_i64().unwrap(),
            option: task["options"][0]["id"].as_i64().unwrap(),
        },
    )
    .await;

    h.network
        .push_outcome(TransferOutcome::Unknown("签名服务无响应".to_string()));
    let err = execute(Command::Payout { worker }, &h.market)
        .await
        .unwrap_err();
    let body = error_body(&err);
    assert_eq!(body["status"], "Processing");
    let payout_id = body["payout_id"].as_i64().unwrap();

    let stuck = run(&h, Command::StuckPayouts).await;
    assert_eq!(stuck.as_array().unwrap().len(), 1);

    let resolved = run(
        &h,
        Command::ResolvePayout(ResolvePayoutArgs {
            payout: payout_id,
            signature: None,
            revert: true,
        }),
    )
    .await;
    assert_eq!(resolved["status"], "Failure");

    let balance = run(&h, Command::Balance { worker }).await;
    assert_eq!(balance["pending"], 1_000);
    assert_eq!(balance["locked"], 0);
    assert!(run(&h, Command::StuckPayouts).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_second_worker_sees_task_first_worker_finished() {
    let h = harness().await;
    let (requester, worker) = register(&h).await;
    let other = run(
        &h,
        Command::RegisterWorker {
            address: OTHER_WORKER_WALLET.to_string(),
        },
    )
    .await["id"]
        .as_i64()
        .unwrap();
    h.network.add_transaction(funding_transaction("fund-4"));
    let task = run(&h, Command::FundTask(fund_args(requester, "fund-4"))).await;
    let task_id = task["task"]["id"].as_i64().unwrap();

    run(
        &h,
        Command::Submit {
            worker,
            task: task_id,
            option: task["options"][0]["id"].as_i64().unwrap(),
        },
    )
    .await;

    assert!(run(&h, Command::NextTask { worker }).await.is_null());
    let next = run(&h, Command::NextTask { worker: other }).await;
    assert_eq!(next["task"]["id"].as_i64(), Some(task_id));
    assert_eq!(next["task"]["submission_count"], 1);
}
