//! Custody ledger operations
//!
//! [`CustodyLedger`] composes the named ledgers into the externally
//! triggered operations. Each operation checks its preconditions, stages
//! every write in one [`Transaction`] and commits it as a single batch.
//! Operations that pay out funds call the [`TransferService`] after staging
//! and commit only when the transfer succeeded, so a failed transfer leaves
//! the ledger untouched.
//!
//! # Example
//!
//! ```no_run
//! use custody_ledger::{Coin, Config, CustodyLedger, Depositor, LockupPeriod, RecordingTransfers};
//! use std::sync::Arc;
//!
//! fn main() -> custody_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = CustodyLedger::open(&config, Arc::new(RecordingTransfers::new()))?;
//!
//!     let alice = Depositor::new("alice")?;
//!     ledger.deposit(&alice, &Coin::parse("uqsr", 50)?, LockupPeriod::Days7, 1)?;
//!     ledger.begin_epoch(8)?;
//!     Ok(())
//! }
//! ```

use crate::{
    bindings::Ledgers,
    coins::CoinSet,
    config::{Config, StorageBackend},
    external::{EpochClock, TransferService},
    keys::{DepositorDenomKey, DepositorKey, DepositorVaultKey, EpochLockupKey},
    metrics::Metrics,
    storage::{KvStore, MemStore, RocksStore, Transaction},
    sweep::{self, CatchUp, MaturitySweep, SweepReport},
    types::{Coin, Denom, Depositor, EpochDay, LockupPeriod, Vault},
    Error, Result,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// The custody ledger engine
pub struct CustodyLedger {
    /// Backing key-value store
    store: Arc<dyn KvStore>,

    /// Named ledger handles
    ledgers: Ledgers,

    /// Maturity sweep over `ledgers`
    sweep: MaturitySweep,

    /// Pays out withdrawals and reward claims
    transfers: Arc<dyn TransferService>,

    /// Account funds are paid from
    custody_account: String,

    /// Vaults accepted by withdraw / claim / accrue
    vaults: BTreeSet<Vault>,

    /// Treatment of days skipped by a clock jump
    catch_up: CatchUp,

    /// Serializes state transitions
    write_lock: Mutex<()>,

    metrics: Metrics,
}

impl fmt::Debug for CustodyLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodyLedger")
            .field("custody_account", &self.custody_account)
            .field("vaults", &self.vaults)
            .field("catch_up", &self.catch_up)
            .finish()
    }
}

impl CustodyLedger {
    /// Open the configured backend
    pub fn open(config: &Config, transfers: Arc<dyn TransferService>) -> Result<Self> {
        let store: Arc<dyn KvStore> = match config.backend {
            StorageBackend::Memory => Arc::new(MemStore::new()),
            StorageBackend::RocksDb => Arc::new(RocksStore::open(config)?),
        };
        Self::with_store(store, config, transfers)
    }

    /// Run over an existing store
    pub fn with_store(
        store: Arc<dyn KvStore>,
        config: &Config,
        transfers: Arc<dyn TransferService>,
    ) -> Result<Self> {
        config.validate()?;
        let vaults = config
            .vaults
            .iter()
            .map(|v| Vault::new(v.as_str()))
            .collect::<Result<BTreeSet<_>>>()?;
        let ledgers = Ledgers::new();

        tracing::info!(
            service = %config.service_name,
            custody_account = %config.custody_account,
            vaults = vaults.len(),
            "Custody ledger ready"
        );

        Ok(Self {
            store,
            ledgers,
            sweep: MaturitySweep::new(ledgers),
            transfers,
            custody_account: config.custody_account.clone(),
            vaults,
            catch_up: config.sweep.catch_up(),
            write_lock: Mutex::new(()),
            metrics: Metrics::new()?,
        })
    }

    /// Start a read or write transaction on the backing store
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self.store.as_ref())
    }

    /// Backing store
    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    /// Named ledger handles
    pub fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    /// Maturity sweep
    pub fn sweep(&self) -> &MaturitySweep {
        &self.sweep
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Vaults accepted by this ledger
    pub fn vaults(&self) -> &BTreeSet<Vault> {
        &self.vaults
    }

    fn observe<T>(&self, op: &'static str, run: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.write_lock.lock();
        run().map_err(|e| {
            if e.is_fatal() {
                tracing::error!(op, error = %e, "State transition aborted");
            } else {
                tracing::warn!(op, error = %e, "Operation rejected");
                self.metrics.record_rejection();
            }
            e
        })
    }

    fn check_vault(&self, vault: &Vault) -> Result<()> {
        if self.vaults.contains(vault) {
            Ok(())
        } else {
            Err(Error::UnknownVault(vault.to_string()))
        }
    }

    fn check_amount(coin: &Coin) -> Result<()> {
        if coin.is_zero() {
            return Err(Error::validation(format!("amount of {} must be positive", coin.denom)));
        }
        Ok(())
    }

    /// Record a deposit that already reached custody.
    ///
    /// Updates TotalDeposit, DenomDeposit and EpochLockupDeposit together.
    pub fn deposit(
        &self,
        depositor: &Depositor,
        coin: &Coin,
        lockup: LockupPeriod,
        epoch_day: EpochDay,
    ) -> Result<()> {
        self.observe("deposit", || {
            Self::check_amount(coin)?;

            let mut tx = self.begin();
            self.ledgers
                .total_deposit
                .add(&mut tx, &DepositorKey::new(depositor), coin)?;
            self.ledgers.denom_deposit.add(
                &mut tx,
                &DepositorDenomKey::new(depositor, &coin.denom),
                coin,
            )?;
            self.ledgers.epoch_lockup_deposit.add(
                &mut tx,
                &EpochLockupKey::new(epoch_day, lockup, depositor, &coin.denom),
                coin,
            )?;
            tx.commit()?;

            self.metrics.record_deposit();
            tracing::info!(%depositor, %coin, %lockup, epoch_day, "Deposit recorded");
            Ok(())
        })
    }

    /// Withdraw `coin` from the depositor's actual withdrawable balance into
    /// `vault`'s withdrawn total and pay it out.
    pub fn withdraw(&self, depositor: &Depositor, coin: &Coin, vault: &Vault) -> Result<()> {
        self.observe("withdraw", || {
            Self::check_amount(coin)?;
            self.check_vault(vault)?;

            let mut tx = self.begin();
            let available = self
                .ledgers
                .actual_withdrawable
                .get(&tx, depositor, &coin.denom)?
                .map(|c| c.amount)
                .unwrap_or(0);
            if available < coin.amount {
                return Err(Error::InsufficientFunds {
                    denom: coin.denom.to_string(),
                    requested: coin.amount,
                    available,
                });
            }

            self.ledgers
                .actual_withdrawable
                .debit(&mut tx, depositor, coin)?;
            self.ledgers.total_withdrawn.add(
                &mut tx,
                &DepositorVaultKey::new(depositor, vault),
                coin,
            )?;

            self.transfers.move_funds(
                &self.custody_account,
                depositor.as_str(),
                &CoinSet::from(coin.clone()),
            )?;
            tx.commit()?;

            self.metrics.record_withdrawal();
            tracing::info!(%depositor, %coin, %vault, "Withdrawal paid");
            Ok(())
        })
    }

    /// Withdraw every actual withdrawable denom of a depositor in one
    /// transfer. Returns what was paid; nothing withdrawable is a no-op.
    pub fn withdraw_all(&self, depositor: &Depositor, vault: &Vault) -> Result<CoinSet> {
        self.observe("withdraw_all", || {
            self.check_vault(vault)?;

            let mut tx = self.begin();
            let balances = self.ledgers.actual_withdrawable.entries(&tx, depositor)?;
            if balances.is_empty() {
                tracing::debug!(%depositor, "Nothing to withdraw");
                return Ok(CoinSet::new());
            }

            let mut total = CoinSet::new();
            for coin in &balances {
                total = total.add(coin)?;
                self.ledgers
                    .actual_withdrawable
                    .drain(&mut tx, depositor, &coin.denom)?;
            }
            self.ledgers.total_withdrawn.add_coins(
                &mut tx,
                &DepositorVaultKey::new(depositor, vault),
                &total,
            )?;

            self.transfers
                .move_funds(&self.custody_account, depositor.as_str(), &total)?;
            tx.commit()?;

            self.metrics.record_withdrawal();
            tracing::info!(%depositor, coins = %total, %vault, "Full withdrawal paid");
            Ok(total)
        })
    }

    /// Pay out every claimable reward for `(depositor, vault)`. Returns what
    /// was paid; an empty claim is a no-op.
    pub fn claim_rewards(&self, depositor: &Depositor, vault: &Vault) -> Result<CoinSet> {
        self.observe("claim_rewards", || {
            self.check_vault(vault)?;

            let key = DepositorVaultKey::new(depositor, vault);
            let mut tx = self.begin();
            let rewards = match self.ledgers.claimable_reward.get(&tx, &key)? {
                Some(rewards) if !rewards.is_zero() => rewards,
                _ => {
                    tracing::debug!(%depositor, %vault, "No rewards to claim");
                    return Ok(CoinSet::new());
                }
            };

            self.ledgers.claimable_reward.remove(&mut tx, &key)?;
            self.ledgers
                .claimed_reward
                .add_coins(&mut tx, &key, &rewards)?;

            self.transfers
                .move_funds(&self.custody_account, depositor.as_str(), &rewards)?;
            tx.commit()?;

            self.metrics.record_claim();
            tracing::info!(%depositor, %vault, coins = %rewards, "Rewards claimed");
            Ok(rewards)
        })
    }

    /// Settlement entry point: credit funds the depositor may withdraw
    pub fn credit_withdrawable(&self, depositor: &Depositor, coin: &Coin) -> Result<Coin> {
        self.observe("credit_withdrawable", || {
            Self::check_amount(coin)?;
            let mut tx = self.begin();
            let balance = self
                .ledgers
                .actual_withdrawable
                .credit(&mut tx, depositor, coin)?;
            tx.commit()?;
            tracing::info!(%depositor, %coin, balance = %balance, "Withdrawable credited");
            Ok(balance)
        })
    }

    /// Settlement entry point: remove a withdrawable entry whatever it
    /// holds. Returns the removed balance.
    pub fn drain_withdrawable(&self, depositor: &Depositor, denom: &Denom) -> Result<Option<Coin>> {
        self.observe("drain_withdrawable", || {
            let mut tx = self.begin();
            let previous = self
                .ledgers
                .actual_withdrawable
                .get(&tx, depositor, denom)?;
            if previous.is_some() {
                self.ledgers
                    .actual_withdrawable
                    .drain(&mut tx, depositor, denom)?;
                tx.commit()?;
                tracing::info!(%depositor, %denom, "Withdrawable drained");
            }
            Ok(previous)
        })
    }

    /// Accrual entry point: add rewards claimable from `vault`
    pub fn accrue_reward(
        &self,
        depositor: &Depositor,
        vault: &Vault,
        coins: &CoinSet,
    ) -> Result<CoinSet> {
        self.observe("accrue_reward", || {
            self.check_vault(vault)?;
            if coins.is_zero() {
                return Err(Error::validation("reward accrual must not be empty"));
            }

            let mut tx = self.begin();
            let claimable = self.ledgers.claimable_reward.add_coins(
                &mut tx,
                &DepositorVaultKey::new(depositor, vault),
                coins,
            )?;
            tx.commit()?;
            tracing::info!(%depositor, %vault, coins = %coins, "Reward accrued");
            Ok(claimable)
        })
    }

    /// Epoch tick: run the maturity sweep for `epoch_day`, exactly once.
    ///
    /// Rejects a day at or before the last swept day. Skipped days are swept
    /// first when catch-up is enabled, up to `sweep.max_catch_up_days`.
    pub fn begin_epoch(&self, epoch_day: EpochDay) -> Result<Vec<SweepReport>> {
        self.observe("begin_epoch", || {
            let started = Instant::now();
            let mut tx = self.begin();
            let reports = self.sweep.advance(&mut tx, epoch_day, self.catch_up)?;
            tx.commit()?;

            let rows: usize = reports.iter().map(|r| r.rows).sum();
            self.metrics
                .record_sweep(epoch_day, rows, started.elapsed().as_secs_f64());
            tracing::info!(epoch_day, days = reports.len(), rows, "Epoch swept");
            Ok(reports)
        })
    }

    /// Epoch tick driven by a clock
    pub fn tick(&self, clock: &dyn EpochClock) -> Result<Vec<SweepReport>> {
        self.begin_epoch(clock.current_epoch_day())
    }

    /// Last epoch day swept by [`CustodyLedger::begin_epoch`]
    pub fn last_swept_epoch(&self) -> Result<Option<EpochDay>> {
        sweep::last_swept_epoch(&self.begin())
    }
}
