use std::sync::Arc;

use futures::future::join_all;
use mechaworks_application::{FundTaskRequest, MarketSettings, Marketplace};
use mechaworks_core::config::models::{AppConfig, DatabaseConfig};
use mechaworks_domain::{Amount, LedgerStore, RequesterId, Worker};
use mechaworks_errors::MarketError;
use mechaworks_infrastructure::DatabaseManager;
use mechaworks_testing_utils::{
    funding_transaction, ScriptedSettlementNetwork, OTHER_WORKER_WALLET, PLATFORM_WALLET,
    REQUESTER_WALLET, STRANGER_WALLET, WORKER_WALLET,
};
use tempfile::TempDir;

const CROWD: [&str; 6] = [
    WORKER_WALLET,
    OTHER_WORKER_WALLET,
    STRANGER_WALLET,
    PLATFORM_WALLET,
    REQUESTER_WALLET,
    "B1rADWGjAKbZYVHMYhS5ZKyMbqFB65vmNNxUXdgFBoh3",
];

struct Harness {
    _dir: TempDir,
    store: Arc<dyn LedgerStore>,
    network: Arc<ScriptedSettlementNetwork>,
    market: Arc<Marketplace>,
    requester_id: RequesterId,
}

/// File database behind an 8-connection pool, so transactions really overlap.
async fn harness(completion_quota: i32) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig {
        database: DatabaseConfig {
            url: format!("sqlite:{}", dir.path().join("race.db").display()),
            max_connections: 8,
            min_connections: 1,
            connection_timeout_seconds: 10,
            run_migrations: true,
        },
        ..AppConfig::default()
    };
    config.market.completion_quota = completion_quota;

    let manager = DatabaseManager::new(&config.database).await.unwrap();
    let store = manager.ledger_store();
    let network = Arc::new(ScriptedSettlementNetwork::new());
    let settings = MarketSettings::from_config(&config).unwrap();
    let market = Arc::new(Marketplace::new(store.clone(), network.clone(), settings));
    let requester = market
        .accounts
        .register_requester(REQUESTER_WALLET)
        .await
        .unwrap();

    Harness {
        _dir: dir,
        store,
        network,
        market,
        requester_id: requester.requester_id(),
    }
}

async fn fund(h: &Harness, signature: &str) -> (i64, i64) {
    h.network.add_transaction(funding_transaction(signature));
    let assignment = h
        .market
        .funding
        .fund_task(
            h.requester_id,
            FundTaskRequest {
                title: None,
                options: vec!["https://cdn.example/a.png".to_string()],
                payment_signature: signature.to_string(),
            },
        )
        .await
        .unwrap();
    (assignment.id(), assignment.options[0].id)
}

async fn register_workers(h: &Harness, count: usize) -> Vec<Worker> {
    let mut workers = Vec::new();
    for address in CROWD.iter().take(count) {
        workers.push(h.market.accounts.register_worker(address).await.unwrap());
    }
    workers
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_submits_across_connections_credit_once() {
    let h = harness(100).await;
    let (task_id, option_id) = fund(&h, "race-dup").await;
    let workers = register_workers(&h, 5).await;

    let mut attempts = Vec::new();
    for w in &workers {
        for _ in 0..4 {
            let market = h.market.clone();
            let worker_id = w.worker_id();
            attempts.push(tokio::spawn(async move {
                market.allocation.submit(worker_id, task_id, option_id).await
            }));
        }
    }
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 5);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, MarketError::StaleOrInvalidTask { .. })));

    let mut total_pending = 0;
    for w in &workers {
        let balance = h.market.queries.get_balance(w.worker_id()).await.unwrap();
        assert_eq!(balance.pending, Amount::from_minor(1_000));
        total_pending += balance.pending.minor_units();
    }
    assert_eq!(total_pending, 5_000);

    let task = h.store.task_with_options(task_id).await.unwrap().unwrap();
    assert_eq!(task.task.submission_count, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_more_workers_than_quota_across_connections() {
    let h = harness(3).await;
    let (task_id, option_id) = fund(&h, "race-quota").await;
    let workers = register_workers(&h, 6).await;

    let attempts = workers.iter().map(|w| {
        let market = h.market.clone();
        let worker_id = w.worker_id();
        tokio::spawn(async move { market.allocation.submit(worker_id, task_id, option_id).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        MarketError::StaleOrInvalidTask { .. } | MarketError::QuotaExceeded { .. }
    )));

    let task = h.store.task_with_options(task_id).await.unwrap().unwrap();
    assert_eq!(task.task.submission_count, 3);
    assert_eq!(h.store.option_tallies(task_id).await.unwrap()[0].count, 3);

    let mut credited = 0;
    for w in &workers {
        let balance = h.market.queries.get_balance(w.worker_id()).await.unwrap();
        if balance.pending.is_positive() {
            credited += 1;
        }
    }
    assert_eq!(credited, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payouts_for_one_worker_transfer_once() {
    let h = harness(100).await;
    let (task_id, option_id) = fund(&h, "race-payout").await;
    let worker = register_workers(&h, 1).await.remove(0);
    h.market
        .allocation
        .submit(worker.worker_id(), task_id, option_id)
        .await
        .unwrap();

    let attempts = (0..6).map(|_| {
        let market = h.market.clone();
        let worker_id = worker.worker_id();
        tokio::spawn(async move { market.payouts.request_payout(worker_id).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let paid: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].amount, Amount::from_minor(1_000));
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, MarketError::NothingToPayout)));

    let transfers = h.network.transfers();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].to, WORKER_WALLET);

    let balance = h.market.queries.get_balance(worker.worker_id()).await.unwrap();
    assert_eq!(balance.pending, Amount::ZERO);
    assert_eq!(balance.locked, Amount::from_minor(1_000));
}
