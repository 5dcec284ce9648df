//! Collaborators outside the ledger engine
//!
//! The engine only calls [`TransferService`]. The parameter store and price
//! oracle are consulted by the request router (see [`crate::policy`]), and
//! the clock drives [`crate::CustodyLedger::begin_epoch`].
//!
//! The in-process implementations here back the node binary and tests.

use crate::coins::CoinSet;
use crate::config::DepositParams;
use crate::error::{Error, Result};
use crate::types::{Denom, EpochDay};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Moves custody funds between accounts
pub trait TransferService: Send + Sync {
    /// Move `coins` from `from` to `to`. An error means nothing moved.
    fn move_funds(&self, from: &str, to: &str, coins: &CoinSet) -> Result<()>;
}

/// Governance parameters for deposit policy
pub trait ParameterStore: Send + Sync {
    /// Minimum value of a single deposit of `denom`
    fn min_deposit_value(&self, denom: &Denom) -> Decimal;

    /// Denoms accepted for deposit
    fn whitelisted_denoms(&self) -> BTreeSet<Denom>;
}

/// Spot prices in a common quote unit
pub trait PriceOracle: Send + Sync {
    /// Price of one unit of `denom`
    fn price(&self, denom: &Denom) -> Result<Decimal>;
}

/// Source of the current epoch day
pub trait EpochClock: Send + Sync {
    /// Current epoch day
    fn current_epoch_day(&self) -> EpochDay;
}

/// One completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Paying account
    pub from: String,
    /// Receiving account
    pub to: String,
    /// Funds moved
    pub coins: CoinSet,
}

/// Transfer service that records every movement in memory
#[derive(Debug, Default)]
pub struct RecordingTransfers {
    records: Mutex<Vec<TransferRecord>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingTransfers {
    /// Accept every transfer
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following transfer with `reason` until cleared
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.fail_with.lock() = Some(reason.into());
    }

    /// Accept transfers again
    pub fn clear_failure(&self) {
        *self.fail_with.lock() = None;
    }

    /// Transfers completed so far
    pub fn records(&self) -> Vec<TransferRecord> {
        self.records.lock().clone()
    }
}

impl TransferService for RecordingTransfers {
    fn move_funds(&self, from: &str, to: &str, coins: &CoinSet) -> Result<()> {
        if let Some(reason) = self.fail_with.lock().clone() {
            return Err(Error::Transfer(reason));
        }
        self.records.lock().push(TransferRecord {
            from: from.to_string(),
            to: to.to_string(),
            coins: coins.clone(),
        });
        tracing::debug!(from, to, coins = %coins, "Funds moved");
        Ok(())
    }
}

/// Parameters loaded once from configuration
#[derive(Debug, Clone)]
pub struct StaticParams {
    whitelist: BTreeSet<Denom>,
    min_deposit_value: Decimal,
}

impl StaticParams {
    /// Build from the `[params]` config section
    pub fn from_config(params: &DepositParams) -> Result<Self> {
        let whitelist = params
            .whitelisted_denoms
            .iter()
            .map(|d| Denom::new(d.as_str()))
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self {
            whitelist,
            min_deposit_value: params.min_deposit_value,
        })
    }
}

impl ParameterStore for StaticParams {
    fn min_deposit_value(&self, _denom: &Denom) -> Decimal {
        self.min_deposit_value
    }

    fn whitelisted_denoms(&self) -> BTreeSet<Denom> {
        self.whitelist.clone()
    }
}

/// Oracle over a fixed price table
#[derive(Debug, Clone, Default)]
pub struct FixedPriceOracle {
    prices: HashMap<Denom, Decimal>,
}

impl FixedPriceOracle {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a price
    pub fn with_price(mut self, denom: Denom, price: Decimal) -> Self {
        self.prices.insert(denom, price);
        self
    }
}

impl PriceOracle for FixedPriceOracle {
    fn price(&self, denom: &Denom) -> Result<Decimal> {
        self.prices
            .get(denom)
            .copied()
            .ok_or_else(|| Error::validation(format!("no price for {}", denom)))
    }
}

/// Clock advanced by hand
#[derive(Debug, Default)]
pub struct ManualClock {
    day: AtomicU64,
}

impl ManualClock {
    /// Start at `day`
    pub fn new(day: EpochDay) -> Self {
        Self {
            day: AtomicU64::new(day),
        }
    }

    /// Move forward `days`
    pub fn advance(&self, days: EpochDay) -> EpochDay {
        self.day.fetch_add(days, Ordering::SeqCst) + days
    }
}

impl EpochClock for ManualClock {
    fn current_epoch_day(&self) -> EpochDay {
        self.day.load(Ordering::SeqCst)
    }
}
