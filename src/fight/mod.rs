//! Fight records: scheduled matches that wagers reference.

pub mod models;
pub mod store;

pub use models::{Fight, FightId, FightSide, FightStatus, FightWinner};
pub use store::{FightError, FightResult, FightStore};
