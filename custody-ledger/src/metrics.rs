//! Metrics collection for observability
//!
//! Prometheus metrics for ledger activity. Each [`Metrics`] owns its own
//! registry so several ledgers can live in one process.
//!
//! # Metrics
//!
//! - `custody_deposits_total` - Deposits committed
//! - `custody_withdrawals_total` - Withdraw / WithdrawAll operations committed
//! - `custody_reward_claims_total` - Non-empty reward claims committed
//! - `custody_rejected_operations_total` - Operations rejected with a recoverable error
//! - `custody_swept_rows_total` - Deposit rows matured by the sweep
//! - `custody_last_swept_epoch` - Last epoch day swept
//! - `custody_sweep_duration_seconds` - Histogram of epoch tick latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Deposits committed
    pub deposits_total: IntCounter,

    /// Withdrawals committed
    pub withdrawals_total: IntCounter,

    /// Reward claims committed
    pub claims_total: IntCounter,

    /// Recoverable rejections
    pub rejected_total: IntCounter,

    /// Rows matured by the sweep
    pub swept_rows_total: IntCounter,

    /// Last swept epoch day
    pub last_swept_epoch: IntGauge,

    /// Epoch tick duration histogram
    pub sweep_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("deposits_total", &self.deposits_total.get())
            .field("withdrawals_total", &self.withdrawals_total.get())
            .field("claims_total", &self.claims_total.get())
            .field("rejected_total", &self.rejected_total.get())
            .field("swept_rows_total", &self.swept_rows_total.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let deposits_total = IntCounter::new("custody_deposits_total", "Deposits committed")?;
        registry.register(Box::new(deposits_total.clone()))?;

        let withdrawals_total =
            IntCounter::new("custody_withdrawals_total", "Withdrawals committed")?;
        registry.register(Box::new(withdrawals_total.clone()))?;

        let claims_total =
            IntCounter::new("custody_reward_claims_total", "Reward claims committed")?;
        registry.register(Box::new(claims_total.clone()))?;

        let rejected_total = IntCounter::new(
            "custody_rejected_operations_total",
            "Operations rejected with a recoverable error",
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let swept_rows_total = IntCounter::new(
            "custody_swept_rows_total",
            "Deposit rows matured by the sweep",
        )?;
        registry.register(Box::new(swept_rows_total.clone()))?;

        let last_swept_epoch =
            IntGauge::new("custody_last_swept_epoch", "Last epoch day swept")?;
        registry.register(Box::new(last_swept_epoch.clone()))?;

        let sweep_duration = Histogram::with_opts(
            HistogramOpts::new(
                "custody_sweep_duration_seconds",
                "Histogram of epoch tick latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(sweep_duration.clone()))?;

        Ok(Self {
            deposits_total,
            withdrawals_total,
            claims_total,
            rejected_total,
            swept_rows_total,
            last_swept_epoch,
            sweep_duration,
            registry,
        })
    }

    /// Record a committed deposit
    pub fn record_deposit(&self) {
        self.deposits_total.inc();
    }

    /// Record a committed withdrawal
    pub fn record_withdrawal(&self) {
        self.withdrawals_total.inc();
    }

    /// Record a committed reward claim
    pub fn record_claim(&self) {
        self.claims_total.inc();
    }

    /// Record a recoverable rejection
    pub fn record_rejection(&self) {
        self.rejected_total.inc();
    }

    /// Record a committed epoch tick
    pub fn record_sweep(&self, epoch_day: u64, rows: usize, duration_seconds: f64) {
        self.swept_rows_total.inc_by(rows as u64);
        self.last_swept_epoch.set(epoch_day as i64);
        self.sweep_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
