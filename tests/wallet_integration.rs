//! Integration tests for the wallet ledger.
//!
//! Tests lock/unlock/credit/debit primitives, journal coupling, and the
//! idempotency guard against a live PostgreSQL database. Skipped when
//! `DATABASE_URL` is not set.

use fightbook::db::{Database, DatabaseConfig};
use fightbook::idempotency::IdempotencyStore;
use fightbook::journal::{JournalKind, JournalStore};
use fightbook::wallet::{WalletError, WalletLedger};
use sqlx::PgPool;
use std::sync::Arc;

/// Generate unique idempotency key
fn unique_key(prefix: &str) -> String {
    format!(
        "{}_{}",
        prefix,
        chrono::Utc::now().timestamp_nanos_opt().unwrap()
    )
}

/// Connect to the test database, or skip the test when none is configured
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

/// Create a wallet holding `balance`, keyed by a fresh user ID
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
async fn test_lock_then_unlock_round_trips() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let user = fund_user(&pool, 10_000).await;

    let after = ledger
        .lock(user, 3_000, unique_key("lock"), None)
        .await
        .expect("Lock should succeed");
    assert_eq!(after.balance, 7_000);
    assert_eq!(after.locked_balance, 3_000);

    let after = ledger
        .unlock(user, 3_000, unique_key("unlock"), None)
        .await
        .expect("Unlock should succeed");
    assert_eq!(after.balance, 10_000);
    assert_eq!(after.locked_balance, 0);
}

#[tokio::test]
async fn test_lock_rejects_insufficient_funds() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let user = fund_user(&pool, 1_000).await;

    let result = ledger.lock(user, 3_000, unique_key("lock"), None).await;
    match result {
        Err(WalletError::InsufficientFunds { available, required }) => {
            assert_eq!(available, 1_000);
            assert_eq!(required, 3_000);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    // Nothing moved.
    let wallet = ledger.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, 1_000);
    assert_eq!(wallet.locked_balance, 0);
}

#[tokio::test]
async fn test_unlock_beyond_locked_is_invalid_state() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let user = fund_user(&pool, 5_000).await;

    let result = ledger.unlock(user, 100, unique_key("unlock"), None).await;
    assert!(
        matches!(result, Err(WalletError::InvalidState(_))),
        "unlocking funds that were never locked must signal a bug, got {result:?}"
    );
}

#[tokio::test]
async fn test_credit_and_debit_write_journal_rows() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let journal = JournalStore::new(pool.clone());
    let user = fund_user(&pool, 0).await;

    ledger
        .credit(user, 8_000, JournalKind::Deposit, unique_key("credit"), None)
        .await
        .expect("Credit should succeed");
    ledger
        .debit(user, 3_000, JournalKind::Withdrawal, unique_key("debit"), None)
        .await
        .expect("Debit should succeed");

    let wallet = ledger.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, 5_000);

    let entries = journal.entries_for_user(user, 10).await.unwrap();
    assert_eq!(entries.len(), 2, "each mutation must journal exactly once");
    // Newest first: the debit.
    assert_eq!(entries[0].amount, -3_000);
    assert_eq!(entries[0].balance_after, 5_000);
    assert_eq!(entries[1].amount, 8_000);
    assert_eq!(entries[1].balance_after, 8_000);
}

#[tokio::test]
async fn test_duplicate_idempotency_key_rejected() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let user = fund_user(&pool, 10_000).await;
    let key = unique_key("dup");

    ledger
        .lock(user, 1_000, key.clone(), None)
        .await
        .expect("First lock should succeed");

    let result = ledger.lock(user, 1_000, key, None).await;
    assert!(
        matches!(result, Err(WalletError::DuplicateTransaction(_))),
        "replayed key must be rejected, got {result:?}"
    );

    // The duplicate rolled back: only one lock applied.
    let wallet = ledger.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, 9_000);
    assert_eq!(wallet.locked_balance, 1_000);
}

#[tokio::test]
async fn test_transfer_locked_moves_across_wallets_atomically() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let loser = fund_user(&pool, 3_000).await;
    let winner = fund_user(&pool, 500).await;

    ledger
        .lock(loser, 3_000, unique_key("stake"), None)
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let (loser_after, winner_after) =
        WalletLedger::transfer_locked_tx(&mut tx, loser, winner, 3_000)
            .await
            .expect("Transfer should succeed");
    tx.commit().await.unwrap();

    assert_eq!(loser_after.locked_balance, 0);
    assert_eq!(winner_after.balance, 3_500);

    let loser_wallet = ledger.get_wallet(loser).await.unwrap();
    let winner_wallet = ledger.get_wallet(winner).await.unwrap();
    assert_eq!(loser_wallet.total_held(), 0);
    assert_eq!(winner_wallet.total_held(), 3_500);
}

#[tokio::test]
async fn test_get_or_create_wallet_is_idempotent() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let user = chrono::Utc::now().timestamp_nanos_opt().unwrap();

    let first = ledger.get_or_create_wallet(user).await.unwrap();
    assert_eq!(first.balance, 0);

    ledger
        .credit(user, 2_000, JournalKind::Deposit, unique_key("seed"), None)
        .await
        .unwrap();

    let second = ledger.get_or_create_wallet(user).await.unwrap();
    assert_eq!(second.balance, 2_000, "re-creation must not reset the wallet");
}

#[tokio::test]
async fn test_idempotency_store_replays_first_response() {
    let Some(pool) = try_pool().await else { return };
    let store = IdempotencyStore::new(pool.clone(), 24);
    let key = unique_key("idem");

    assert!(store.check(&key).await.unwrap().is_none());

    let response = serde_json::json!({"bet_id": 7, "status": "pending"});
    store.store(&key, &response).await.unwrap();

    // First writer wins; the retry's response is discarded.
    let retry = serde_json::json!({"bet_id": 8});
    store.store(&key, &retry).await.unwrap();

    assert_eq!(store.check(&key).await.unwrap(), Some(response));
}

#[tokio::test]
async fn test_idempotency_store_expires_by_ttl() {
    let Some(pool) = try_pool().await else { return };
    let store = IdempotencyStore::new(pool.clone(), 24);
    let key = unique_key("idem_old");

    store
        .store(&key, &serde_json::json!({"ok": true}))
        .await
        .unwrap();
    sqlx::query(
        "UPDATE idempotency_keys SET created_at = NOW() - INTERVAL '25 hours' WHERE key = $1",
    )
    .bind(&key)
    .execute(pool.as_ref())
    .await
    .unwrap();

    assert!(
        store.check(&key).await.unwrap().is_none(),
        "lapsed entries count as misses"
    );
    assert!(store.sweep_expired().await.unwrap() >= 1);
}
