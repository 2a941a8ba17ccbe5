//! Platform configuration.
//!
//! Money-related knobs (commission rate, withdrawal bounds) and worker
//! intervals, read from environment variables with sensible defaults.

/// Platform configuration shared by the ledger, managers, and workers
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Commission taken from a winner's payout, in basis points (1000 = 10%)
    pub commission_rate_bps: i64,

    /// Minimum withdrawal amount (smallest currency unit)
    pub withdrawal_min: i64,

    /// Maximum withdrawal amount (smallest currency unit)
    pub withdrawal_max: i64,

    /// Idempotency replay window in hours
    pub idempotency_ttl_hours: i64,

    /// Payment gateway call timeout in seconds
    pub gateway_timeout_secs: u64,

    /// Interval between expired-bet sweeps in seconds
    pub expiry_sweep_interval_secs: u64,

    /// Interval between pending-deposit reconciliation passes in seconds
    pub reconcile_interval_secs: u64,

    /// Maximum pending deposits verified per reconciliation pass
    pub reconcile_batch: i64,
}

impl PlatformConfig {
    /// Read configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            commission_rate_bps: env_or("COMMISSION_RATE_BPS", 1000),
            withdrawal_min: env_or("WITHDRAWAL_MIN", 1_000),
            withdrawal_max: env_or("WITHDRAWAL_MAX", 10_000_000),
            idempotency_ttl_hours: env_or("IDEMPOTENCY_TTL_HOURS", 24),
            gateway_timeout_secs: env_or("GATEWAY_TIMEOUT_SECS", 30),
            expiry_sweep_interval_secs: env_or("EXPIRY_SWEEP_INTERVAL_SECS", 60),
            reconcile_interval_secs: env_or("RECONCILE_INTERVAL_SECS", 5),
            reconcile_batch: env_or("RECONCILE_BATCH", 50),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            commission_rate_bps: 1000,
            withdrawal_min: 1_000,
            withdrawal_max: 10_000_000,
            idempotency_ttl_hours: 24,
            gateway_timeout_secs: 30,
            expiry_sweep_interval_secs: 60,
            reconcile_interval_secs: 5,
            reconcile_batch: 50,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
