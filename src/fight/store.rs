//! Fight persistence and the completion compare-and-swap.

use super::models::{Fight, FightId, FightStatus, FightWinner};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Fight errors
#[derive(Debug, Error)]
pub enum FightError {
    #[error("Fight not found: {0}")]
    NotFound(FightId),

    #[error("Fight {fight_id} not in correct state: expected {expected}, got {actual}")]
    InvalidState {
        fight_id: FightId,
        expected: FightStatus,
        actual: FightStatus,
    },

    /// Result was already validated; the second caller lost the race
    #[error("Fight {0} already completed")]
    AlreadyCompleted(FightId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt fight row: {0}")]
    CorruptRow(String),
}

pub type FightResult<T> = Result<T, FightError>;

/// Fight store
#[derive(Clone)]
pub struct FightStore {
    pool: Arc<PgPool>,
}

impl FightStore {
    /// Create a new fight store
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a scheduled fight (admin collaborator / test fixture)
    pub async fn create(&self, starts_at: DateTime<Utc>) -> FightResult<FightId> {
        let row = sqlx::query(
            "INSERT INTO fights (status, starts_at) VALUES ('scheduled', $1) RETURNING id",
        )
        .bind(starts_at.naive_utc())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.get("id"))
    }

    /// Get a fight by ID
    pub async fn get(&self, fight_id: FightId) -> FightResult<Fight> {
        let row = sqlx::query(
            "SELECT id, status, winner, starts_at, created_at FROM fights WHERE id = $1",
        )
        .bind(fight_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(FightError::NotFound(fight_id))?;

        fight_from_row(&row)
    }

    /// Mark a fight as started, which closes it to new bets
    pub async fn mark_ongoing(&self, fight_id: FightId) -> FightResult<()> {
        let result =
            sqlx::query("UPDATE fights SET status = 'ongoing' WHERE id = $1 AND status = 'scheduled'")
                .bind(fight_id)
                .execute(self.pool.as_ref())
                .await?;

        if result.rows_affected() == 0 {
            let fight = self.get(fight_id).await?;
            return Err(FightError::InvalidState {
                fight_id,
                expected: FightStatus::Scheduled,
                actual: fight.status,
            });
        }
        Ok(())
    }

    /// Record the validated result inside an open transaction
    ///
    /// Compare-and-swap on `status != 'completed'`: the first settlement run
    /// wins, any repeat gets `AlreadyCompleted` and the enclosing transaction
    /// aborts before touching a single wallet.
    pub async fn complete_tx(
        tx: &mut Transaction<'_, Postgres>,
        fight_id: FightId,
        winner: FightWinner,
    ) -> FightResult<()> {
        let result = sqlx::query(
            "UPDATE fights
             SET status = 'completed', winner = $1
             WHERE id = $2 AND status != 'completed' AND status != 'cancelled'",
        )
        .bind(winner.to_string())
        .bind(fight_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            let row = sqlx::query("SELECT status FROM fights WHERE id = $1")
                .bind(fight_id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or(FightError::NotFound(fight_id))?;

            let status = FightStatus::from_str(&row.get::<String, _>("status"))
                .map_err(FightError::CorruptRow)?;
            return Err(match status {
                FightStatus::Completed => FightError::AlreadyCompleted(fight_id),
                actual => FightError::InvalidState {
                    fight_id,
                    expected: FightStatus::Ongoing,
                    actual,
                },
            });
        }
        Ok(())
    }
}

fn fight_from_row(row: &sqlx::postgres::PgRow) -> FightResult<Fight> {
    let status = FightStatus::from_str(&row.get::<String, _>("status"))
        .map_err(FightError::CorruptRow)?;
    let winner = row
        .get::<Option<String>, _>("winner")
        .map(|w| FightWinner::from_str(&w).map_err(FightError::CorruptRow))
        .transpose()?;

    Ok(Fight {
        id: row.get("id"),
        status,
        winner,
        starts_at: row.get::<chrono::NaiveDateTime, _>("starts_at").and_utc(),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    })
}
