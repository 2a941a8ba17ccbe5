//! Integration tests for the deposit flow.
//!
//! Runs the deposit manager against the mock gateway and a live PostgreSQL
//! database. Skipped when `DATABASE_URL` is not set.

use fightbook::db::{Database, DatabaseConfig};
use fightbook::funding::{DepositManager, FundingError};
use fightbook::journal::{JournalStatus, JournalStore};
use fightbook::payment::{GatewayStatus, MockGateway, PaymentGateway};
use fightbook::wallet::WalletLedger;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

fn unique_key(prefix: &str) -> String {
    format!(
        "{}_{}",
        prefix,
        chrono::Utc::now().timestamp_nanos_opt().unwrap()
    )
}

async fn try_pool() -> Option<Arc<PgPool>> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        database_url,
        max_connections: 5,
        min_connections: 1,
        connection_timeout_secs: 5,
        idle_timeout_secs: 300,
        max_lifetime_secs: 1800,
    };
    let db = Database::new(&config)
        .await
        .expect("Failed to connect to test database");
    Some(Arc::new(db.pool().clone()))
}

async fn fund_user(pool: &PgPool, balance: i64) -> i64 {
    let user_id = chrono::Utc::now().timestamp_nanos_opt().unwrap();
    sqlx::query("INSERT INTO wallets (user_id, balance) VALUES ($1, $2)")
        .bind(user_id)
        .bind(balance)
        .execute(pool)
        .await
        .expect("Should create test wallet");
    user_id
}

#[tokio::test]
async fn test_deposit_pends_until_confirmed() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let deposits = DepositManager::new(pool.clone(), Arc::new(MockGateway::instant()));
    let user = fund_user(&pool, 1_000).await;

    let outcome = deposits
        .initiate(user, 5_000, "0712345678", unique_key("dep"))
        .await
        .expect("Initiate should succeed");
    assert!(outcome.success);

    // Initiation alone never credits.
    let wallet = ledger.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, 1_000);

    let entry = deposits
        .confirm(&outcome.transaction_id)
        .await
        .expect("Confirm should succeed");
    assert_eq!(entry.amount, 5_000);

    let wallet = ledger.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, 6_000);

    // The confirmed journal row records the balance its credit produced,
    // not the pre-credit balance the pending row was written with.
    let entry = JournalStore::new(pool.clone())
        .find_by_external_ref(&outcome.transaction_id)
        .await
        .unwrap()
        .expect("Confirmed deposit should be journaled");
    assert_eq!(entry.status, JournalStatus::Confirmed);
    assert_eq!(entry.balance_after, 6_000);
}

#[tokio::test]
async fn test_confirm_is_applied_exactly_once() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let deposits = DepositManager::new(pool.clone(), Arc::new(MockGateway::instant()));
    let user = fund_user(&pool, 0).await;

    let outcome = deposits
        .initiate(user, 2_000, "0712345678", unique_key("dep"))
        .await
        .unwrap();
    deposits.confirm(&outcome.transaction_id).await.unwrap();

    let replay = deposits.confirm(&outcome.transaction_id).await;
    assert!(
        matches!(replay, Err(FundingError::UnknownReference(_))),
        "confirmed entries must not confirm twice, got {replay:?}"
    );

    let wallet = ledger.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, 2_000);
}

#[tokio::test]
async fn test_failed_deposit_leaves_ledger_untouched() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let deposits = DepositManager::new(pool.clone(), Arc::new(MockGateway::instant()));
    let user = fund_user(&pool, 1_000).await;

    let outcome = deposits
        .initiate(user, 2_000, "0712345678", unique_key("dep"))
        .await
        .unwrap();
    let entry = deposits.fail(&outcome.transaction_id).await.unwrap();
    assert_eq!(entry.status, JournalStatus::Failed);

    let wallet = ledger.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, 1_000);
}

#[tokio::test]
async fn test_reconcile_records_provider_refund_as_refunded() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let gateway = Arc::new(MockGateway::instant());
    let deposits = DepositManager::new(pool.clone(), gateway.clone());
    let user = fund_user(&pool, 1_000).await;

    let outcome = deposits
        .initiate(user, 2_000, "0712345678", unique_key("dep"))
        .await
        .unwrap();
    // Provider completes, then reverses the payment before we confirm it.
    assert!(gateway.refund(&outcome.transaction_id, 2_000).await.unwrap());

    let entry = deposits
        .pending_deposits(100)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.external_ref.as_deref() == Some(outcome.transaction_id.as_str()))
        .expect("Initiated deposit should be pending");
    let verdict = deposits.reconcile_one(&entry).await.unwrap();
    assert_eq!(verdict, GatewayStatus::Refunded);

    // The journal keeps the provider's actual disposition; no credit applied.
    let entry = JournalStore::new(pool.clone())
        .find_by_external_ref(&outcome.transaction_id)
        .await
        .unwrap()
        .expect("Reconciled deposit should be journaled");
    assert_eq!(entry.status, JournalStatus::Refunded);
    assert_eq!(ledger.get_wallet(user).await.unwrap().balance, 1_000);
}

#[tokio::test]
async fn test_reconcile_confirms_completed_payment() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let gateway = Arc::new(MockGateway::with_behavior(
        1.0,
        Duration::from_millis(30)..Duration::from_millis(40),
    ));
    let deposits = DepositManager::new(pool.clone(), gateway);
    let user = fund_user(&pool, 0).await;

    let outcome = deposits
        .initiate(user, 3_000, "0712345678", unique_key("dep"))
        .await
        .unwrap();
    let entry = deposits
        .pending_deposits(100)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.external_ref.as_deref() == Some(outcome.transaction_id.as_str()))
        .expect("Initiated deposit should be pending");

    // Provider has not resolved yet: the entry is left for the next pass.
    let verdict = deposits.reconcile_one(&entry).await.unwrap();
    assert_eq!(verdict, GatewayStatus::Pending);
    assert_eq!(ledger.get_wallet(user).await.unwrap().balance, 0);

    tokio::time::sleep(Duration::from_millis(60)).await;
    let verdict = deposits.reconcile_one(&entry).await.unwrap();
    assert_eq!(verdict, GatewayStatus::Completed);
    assert_eq!(ledger.get_wallet(user).await.unwrap().balance, 3_000);
}

#[tokio::test]
async fn test_initiate_rejects_non_positive_amount() {
    let Some(pool) = try_pool().await else { return };
    let deposits = DepositManager::new(pool.clone(), Arc::new(MockGateway::instant()));
    let user = fund_user(&pool, 0).await;

    let result = deposits.initiate(user, 0, "0712345678", unique_key("dep")).await;
    assert!(matches!(result, Err(FundingError::Validation(_))));
}
