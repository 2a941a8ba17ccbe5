//! Integration tests for settlement and withdrawals.
//!
//! Drives full fight lifecycles through result validation and checks money
//! conservation, idempotency, and the two-phase withdrawal flow against a
//! live PostgreSQL database. Skipped when `DATABASE_URL` is not set.

use chrono::{Duration, Utc};
use fightbook::bet::BetManager;
use fightbook::config::PlatformConfig;
use fightbook::db::{Database, DatabaseConfig};
use fightbook::events::{LogAudit, LogNotifier};
use fightbook::fight::{FightSide, FightStore, FightWinner};
use fightbook::journal::{JournalKind, JournalStore};
use fightbook::settlement::{SettlementError, SettlementManager};
use fightbook::wallet::WalletLedger;
use fightbook::withdrawal::{WithdrawalError, WithdrawalManager, WithdrawalStatus};
use sqlx::PgPool;
use std::sync::Arc;

const ADMIN_ID: i64 = 1;

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

fn settlement(pool: Arc<PgPool>) -> SettlementManager {
    SettlementManager::new(
        pool,
        PlatformConfig::default(),
        Arc::new(LogNotifier),
        Arc::new(LogAudit),
    )
}

fn withdrawals(pool: Arc<PgPool>) -> WithdrawalManager {
    WithdrawalManager::new(
        pool,
        PlatformConfig::default(),
        Arc::new(LogNotifier),
        Arc::new(LogAudit),
    )
}

/// Fight with one accepted bet: creator stakes `amount` on side A
async fn matched_fight(
    pool: &Arc<PgPool>,
    creator: i64,
    acceptor: i64,
    amount: i64,
) -> (i64, i64) {
    let fight_id = FightStore::new(pool.clone())
        .create(Utc::now() + Duration::hours(6))
        .await
        .expect("Should create test fight");
    let bets = BetManager::new(pool.clone());
    let bet = bets
        .create(creator, fight_id, amount, FightSide::A, unique_key("create"))
        .await
        .expect("Create should succeed");
    bets.accept(acceptor, bet.id, unique_key("accept"))
        .await
        .expect("Accept should succeed");
    (fight_id, bet.id)
}

#[tokio::test]
async fn test_decided_fight_pays_winner_minus_commission() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let creator = fund_user(&pool, 10_000).await;
    let acceptor = fund_user(&pool, 5_000).await;
    let (fight_id, bet_id) = matched_fight(&pool, creator, acceptor, 3_000).await;

    let report = settlement(pool.clone())
        .validate_result(ADMIN_ID, fight_id, FightWinner::A)
        .await
        .expect("Settlement should succeed");

    assert_eq!(report.bets_settled, 1);
    assert_eq!(report.total_matched, 3_000);
    assert_eq!(report.total_commission, 300);

    // Creator backed A: own stake back, plus opponent's stake, minus 10%.
    let winner = ledger.get_wallet(creator).await.unwrap();
    assert_eq!(winner.balance, 12_700);
    assert_eq!(winner.locked_balance, 0);
    assert_eq!(winner.total_won, 3_000);

    let loser = ledger.get_wallet(acceptor).await.unwrap();
    assert_eq!(loser.balance, 2_000);
    assert_eq!(loser.locked_balance, 0);
    assert_eq!(loser.total_lost, 3_000);

    // Commission was recorded against the bet.
    let row: (i64,) =
        sqlx::query_as("SELECT amount FROM commissions WHERE bet_id = $1")
            .bind(bet_id)
            .fetch_one(pool.as_ref())
            .await
            .unwrap();
    assert_eq!(row.0, 300);
}

#[tokio::test]
async fn test_draw_refunds_both_stakes_without_commission() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let creator = fund_user(&pool, 10_000).await;
    let acceptor = fund_user(&pool, 5_000).await;
    let (fight_id, bet_id) = matched_fight(&pool, creator, acceptor, 3_000).await;

    let report = settlement(pool.clone())
        .validate_result(ADMIN_ID, fight_id, FightWinner::Draw)
        .await
        .expect("Settlement should succeed");
    assert_eq!(report.total_commission, 0);

    let creator_wallet = ledger.get_wallet(creator).await.unwrap();
    let acceptor_wallet = ledger.get_wallet(acceptor).await.unwrap();
    assert_eq!(creator_wallet.balance, 10_000);
    assert_eq!(creator_wallet.locked_balance, 0);
    assert_eq!(acceptor_wallet.balance, 5_000);
    assert_eq!(acceptor_wallet.locked_balance, 0);

    // No win/loss recorded on a push.
    assert_eq!(creator_wallet.total_won, 0);
    assert_eq!(acceptor_wallet.total_lost, 0);

    let journal = JournalStore::new(pool.clone());
    let refunds = journal
        .count_for_bet(bet_id, JournalKind::BetRefund)
        .await
        .unwrap();
    assert_eq!(refunds, 2, "one refund row per side");
}

#[tokio::test]
async fn test_settlement_is_applied_exactly_once() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let creator = fund_user(&pool, 10_000).await;
    let acceptor = fund_user(&pool, 5_000).await;
    let (fight_id, bet_id) = matched_fight(&pool, creator, acceptor, 3_000).await;

    let manager = settlement(pool.clone());
    manager
        .validate_result(ADMIN_ID, fight_id, FightWinner::A)
        .await
        .expect("First validation should succeed");

    let second = manager
        .validate_result(ADMIN_ID, fight_id, FightWinner::B)
        .await;
    assert!(
        matches!(second, Err(SettlementError::AlreadySettled(id)) if id == fight_id),
        "replayed validation must be rejected, got {second:?}"
    );

    // Balances unchanged by the replay attempt.
    let winner = ledger.get_wallet(creator).await.unwrap();
    assert_eq!(winner.balance, 12_700);

    let journal = JournalStore::new(pool.clone());
    let payouts = journal
        .count_for_bet(bet_id, JournalKind::BetPayout)
        .await
        .unwrap();
    assert_eq!(payouts, 2, "one payout row per side, applied once");
}

#[tokio::test]
async fn test_settling_fight_with_no_bets_succeeds() {
    let Some(pool) = try_pool().await else { return };
    let fight_id = FightStore::new(pool.clone())
        .create(Utc::now() + Duration::hours(6))
        .await
        .unwrap();

    let report = settlement(pool.clone())
        .validate_result(ADMIN_ID, fight_id, FightWinner::B)
        .await
        .expect("Empty settlement should succeed");
    assert_eq!(report.bets_settled, 0);
    assert_eq!(report.total_commission, 0);
}

#[tokio::test]
async fn test_settlement_leaves_pending_bets_to_the_sweep() {
    let Some(pool) = try_pool().await else { return };
    let bets = BetManager::new(pool.clone());
    let creator = fund_user(&pool, 10_000).await;
    let fight_id = FightStore::new(pool.clone())
        .create(Utc::now() + Duration::hours(6))
        .await
        .unwrap();
    let bet = bets
        .create(creator, fight_id, 2_000, FightSide::B, unique_key("create"))
        .await
        .unwrap();

    let report = settlement(pool.clone())
        .validate_result(ADMIN_ID, fight_id, FightWinner::A)
        .await
        .expect("Settlement should succeed");
    assert_eq!(report.bets_settled, 0);

    // Unmatched bets are never paid out; the expiry sweep releases them.
    let bet = bets.get(bet.id).await.unwrap();
    assert_eq!(bet.status, fightbook::bet::BetStatus::Pending);
}

#[tokio::test]
async fn test_withdrawal_request_locks_funds() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let user = fund_user(&pool, 10_000).await;

    let request = withdrawals(pool.clone())
        .request(user, 4_000, unique_key("wd"))
        .await
        .expect("Request should succeed");
    assert_eq!(request.status, WithdrawalStatus::Pending);

    let wallet = ledger.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, 6_000);
    assert_eq!(wallet.locked_balance, 4_000);
}

#[tokio::test]
async fn test_withdrawal_below_minimum_rejected() {
    let Some(pool) = try_pool().await else { return };
    let user = fund_user(&pool, 10_000).await;

    let result = withdrawals(pool.clone())
        .request(user, 500, unique_key("wd"))
        .await;
    assert!(matches!(result, Err(WithdrawalError::Validation(_))));
}

#[tokio::test]
async fn test_approve_debits_locked_funds_permanently() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let manager = withdrawals(pool.clone());
    let user = fund_user(&pool, 10_000).await;

    let request = manager.request(user, 4_000, unique_key("wd")).await.unwrap();
    let request = manager
        .approve(ADMIN_ID, request.id, unique_key("payout_ref"))
        .await
        .expect("Approve should succeed");

    assert_eq!(request.status, WithdrawalStatus::Approved);
    assert_eq!(request.approved_by, Some(ADMIN_ID));
    assert!(
        request.processed_at.is_some(),
        "decision must stamp the returned request"
    );

    let wallet = ledger.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, 6_000);
    assert_eq!(wallet.locked_balance, 0);
    assert_eq!(wallet.total_withdrawn, 4_000);
}

#[tokio::test]
async fn test_reject_returns_locked_funds() {
    let Some(pool) = try_pool().await else { return };
    let ledger = WalletLedger::new(pool.clone());
    let manager = withdrawals(pool.clone());
    let user = fund_user(&pool, 10_000).await;

    let request = manager.request(user, 4_000, unique_key("wd")).await.unwrap();
    let request = manager
        .reject(ADMIN_ID, request.id, "kyc check failed".to_string())
        .await
        .expect("Reject should succeed");

    assert_eq!(request.status, WithdrawalStatus::Rejected);
    assert_eq!(request.reason.as_deref(), Some("kyc check failed"));
    assert!(
        request.processed_at.is_some(),
        "decision must stamp the returned request"
    );

    let wallet = ledger.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, 10_000);
    assert_eq!(wallet.locked_balance, 0);
    assert_eq!(wallet.total_withdrawn, 0);
}

#[tokio::test]
async fn test_decided_request_cannot_be_redecided() {
    let Some(pool) = try_pool().await else { return };
    let manager = withdrawals(pool.clone());
    let user = fund_user(&pool, 10_000).await;

    let request = manager.request(user, 4_000, unique_key("wd")).await.unwrap();
    manager
        .approve(ADMIN_ID, request.id, unique_key("payout_ref"))
        .await
        .unwrap();

    let reject = manager
        .reject(ADMIN_ID, request.id, "too late".to_string())
        .await;
    assert!(matches!(reject, Err(WithdrawalError::Conflict(_))));

    let approve = manager
        .approve(ADMIN_ID, request.id, unique_key("payout_ref"))
        .await;
    assert!(matches!(approve, Err(WithdrawalError::Conflict(_))));
}
