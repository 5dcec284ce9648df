//! Maturity sweep
//!
//! Once per epoch tick at day `D`, every deposit recorded under
//! `(D - days(L), L)` matures and is added to the expected withdrawable
//! ledgers. The raw pass ([`MaturitySweep::run_for_day`]) keeps no memory of
//! what it already swept; [`MaturitySweep::advance`] adds the persisted
//! last-swept marker that makes each day run exactly once.

use crate::bindings::Ledgers;
use crate::coins::CoinSet;
use crate::error::{Error, Result};
use crate::keys::{DenomLockupKey, EpochLockupKey, Namespace};
use crate::storage::Transaction;
use crate::types::{EpochDay, LockupPeriod};

const LAST_SWEPT_KEY: &[u8] = b"last_swept_epoch";

fn marker_key() -> Vec<u8> {
    Namespace::Meta.prefixed(LAST_SWEPT_KEY)
}

/// Last epoch day swept through [`MaturitySweep::advance`]
pub fn last_swept_epoch(tx: &Transaction<'_>) -> Result<Option<EpochDay>> {
    match tx.get(&marker_key())? {
        Some(bytes) => {
            let day: EpochDay = bincode::deserialize(&bytes)
                .map_err(|e| Error::corruption(format!("last swept epoch marker: {}", e)))?;
            Ok(Some(day))
        }
        None => Ok(None),
    }
}

/// Stage the last-swept marker
pub fn record_swept_epoch(tx: &mut Transaction<'_>, day: EpochDay) -> Result<()> {
    tx.put(marker_key(), bincode::serialize(&day)?);
    Ok(())
}

/// Outcome of sweeping one epoch day
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Day swept
    pub epoch_day: EpochDay,
    /// Deposit rows matured
    pub rows: usize,
    /// Sum of matured coins
    pub matured: CoinSet,
}

/// How [`MaturitySweep::advance`] treats days skipped since the last tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchUp {
    /// Log the gap and sweep only the supplied day
    Skip,
    /// Sweep every skipped day, refusing gaps longer than the bound
    UpTo(u64),
}

/// Moves matured deposits into the expected withdrawable ledgers
#[derive(Debug, Clone, Copy, Default)]
pub struct MaturitySweep {
    ledgers: Ledgers,
}

impl MaturitySweep {
    /// Sweep over the given ledgers
    pub fn new(ledgers: Ledgers) -> Self {
        Self { ledgers }
    }

    /// Mature every deposit whose lockup ends on `day`.
    ///
    /// Not idempotent: running twice for the same day counts the same
    /// deposits twice. Use [`MaturitySweep::advance`] from a clock tick.
    pub fn run_for_day(&self, tx: &mut Transaction<'_>, day: EpochDay) -> Result<SweepReport> {
        let mut report = SweepReport {
            epoch_day: day,
            ..SweepReport::default()
        };

        for lockup in LockupPeriod::ALL {
            let Some(source_day) = day.checked_sub(lockup.days()) else {
                continue;
            };

            let rows = self
                .ledgers
                .epoch_lockup_deposit
                .entries(tx, &EpochLockupKey::day_lockup_prefix(source_day, lockup))
                .map_err(|e| {
                    tracing::error!(epoch_day = day, lockup = %lockup, error = %e, "Sweep scan failed");
                    e
                })?;

            for (key, coin) in rows {
                self.ledgers
                    .expected_withdrawable
                    .accrue(tx, &key.depositor, &coin)?;
                let by_lockup = DenomLockupKey::new(&key.depositor, &key.denom, lockup);
                self.ledgers.expected_by_lockup.add(tx, &by_lockup, &coin)?;

                report.matured = report.matured.add(&coin)?;
                report.rows += 1;
            }
        }

        tracing::debug!(
            epoch_day = day,
            rows = report.rows,
            matured = %report.matured,
            "Maturity sweep pass"
        );
        Ok(report)
    }

    /// Sweep up to and including `day`, exactly once per day.
    ///
    /// Rejects `day <= last swept` with `EpochAlreadyProcessed`. Days
    /// skipped since the last tick are swept first under [`CatchUp::UpTo`];
    /// a longer gap fails with `EpochGapTooLarge` before anything is staged.
    /// The first tick ever sweeps only `day`.
    pub fn advance(
        &self,
        tx: &mut Transaction<'_>,
        day: EpochDay,
        catch_up: CatchUp,
    ) -> Result<Vec<SweepReport>> {
        let last = last_swept_epoch(tx)?;

        let first = match last {
            Some(last) if day <= last => {
                return Err(Error::EpochAlreadyProcessed {
                    requested: day,
                    last,
                })
            }
            Some(last) if day - last > 1 => {
                let skipped = day - last - 1;
                match catch_up {
                    CatchUp::UpTo(max) if skipped > max => {
                        return Err(Error::EpochGapTooLarge {
                            requested: day,
                            last,
                            max,
                        })
                    }
                    CatchUp::UpTo(_) => {
                        tracing::info!(from = last + 1, to = day, "Catching up skipped epoch days");
                        last + 1
                    }
                    CatchUp::Skip => {
                        tracing::warn!(
                            last_swept = last,
                            epoch_day = day,
                            skipped,
                            "Epoch days skipped without sweep"
                        );
                        day
                    }
                }
            }
            _ => day,
        };

        let mut reports = Vec::new();
        for d in first..=day {
            reports.push(self.run_for_day(tx, d)?);
        }
        record_swept_epoch(tx, day)?;
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvStore, MemStore};
    use crate::types::{Coin, Denom, Depositor};

    fn deposit(
        tx: &mut Transaction<'_>,
        ledgers: &Ledgers,
        day: EpochDay,
        lockup: LockupPeriod,
        who: &str,
        amount: u128,
    ) {
        let who = Depositor::new(who).unwrap();
        let denom = Denom::new("QSR").unwrap();
        let key = EpochLockupKey::new(day, lockup, &who, &denom);
        ledgers
            .epoch_lockup_deposit
            .add(tx, &key, &Coin::new(denom, amount))
            .unwrap();
    }

    fn expected(tx: &Transaction<'_>, ledgers: &Ledgers, who: &str) -> u128 {
        let who = Depositor::new(who).unwrap();
        ledgers
            .expected_withdrawable
            .get(tx, &who, &Denom::new("QSR").unwrap())
            .unwrap()
            .map(|c| c.amount)
            .unwrap_or(0)
    }

    #[test]
    fn test_sweep_matures_by_lockup_duration() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let sweep = MaturitySweep::new(ledgers);
        let mut tx = store.begin();

        deposit(&mut tx, &ledgers, 1, LockupPeriod::Days7, "alice", 10);
        deposit(&mut tx, &ledgers, 1, LockupPeriod::Days21, "alice", 20);

        let report = sweep.run_for_day(&mut tx, 8).unwrap();
        assert_eq!(report.rows, 1);
        assert_eq!(expected(&tx, &ledgers, "alice"), 10);

        let report = sweep.run_for_day(&mut tx, 22).unwrap();
        assert_eq!(report.rows, 1);
        assert_eq!(expected(&tx, &ledgers, "alice"), 30);
    }

    #[test]
    fn test_early_days_have_no_source() {
        let store = MemStore::new();
        let sweep = MaturitySweep::default();
        let mut tx = store.begin();
        let report = sweep.run_for_day(&mut tx, 3).unwrap();
        assert_eq!(report.rows, 0);
        assert_eq!(tx.pending(), 0);
    }

    #[test]
    fn test_advance_rejects_repeated_day() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let sweep = MaturitySweep::new(ledgers);
        let mut tx = store.begin();
        deposit(&mut tx, &ledgers, 1, LockupPeriod::Days7, "bob", 5);

        sweep.advance(&mut tx, 8, CatchUp::UpTo(30)).unwrap();
        let err = sweep.advance(&mut tx, 8, CatchUp::UpTo(30)).unwrap_err();
        assert!(matches!(err, Error::EpochAlreadyProcessed { requested: 8, last: 8 }));
        assert!(!err.is_fatal());
        assert_eq!(expected(&tx, &ledgers, "bob"), 5);
        assert_eq!(last_swept_epoch(&tx).unwrap(), Some(8));
    }

    #[test]
    fn test_advance_catches_up_skipped_days() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let sweep = MaturitySweep::new(ledgers);
        let mut tx = store.begin();
        deposit(&mut tx, &ledgers, 1, LockupPeriod::Days7, "bob", 5);
        deposit(&mut tx, &ledgers, 2, LockupPeriod::Days7, "bob", 7);

        sweep.advance(&mut tx, 7, CatchUp::UpTo(30)).unwrap();
        let reports = sweep.advance(&mut tx, 10, CatchUp::UpTo(30)).unwrap();
        let days: Vec<_> = reports.iter().map(|r| r.epoch_day).collect();
        assert_eq!(days, vec![8, 9, 10]);
        assert_eq!(expected(&tx, &ledgers, "bob"), 12);
    }

    #[test]
    fn test_advance_without_catch_up_skips_gap() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let sweep = MaturitySweep::new(ledgers);
        let mut tx = store.begin();
        deposit(&mut tx, &ledgers, 1, LockupPeriod::Days7, "bob", 5);

        sweep.advance(&mut tx, 7, CatchUp::Skip).unwrap();
        let reports = sweep.advance(&mut tx, 10, CatchUp::Skip).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(expected(&tx, &ledgers, "bob"), 0);

        // Without catch-up a huge jump is a single pass
        let reports = sweep.advance(&mut tx, EpochDay::MAX, CatchUp::Skip).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(last_swept_epoch(&tx).unwrap(), Some(EpochDay::MAX));
    }

    #[test]
    fn test_advance_refuses_oversized_gap() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let sweep = MaturitySweep::new(ledgers);
        let mut tx = store.begin();
        deposit(&mut tx, &ledgers, 1, LockupPeriod::Days7, "bob", 5);
        sweep.advance(&mut tx, 1, CatchUp::UpTo(3)).unwrap();
        let pending = tx.pending();

        let err = sweep
            .advance(&mut tx, EpochDay::MAX, CatchUp::UpTo(3))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::EpochGapTooLarge { last: 1, max: 3, .. }
        ));
        assert!(!err.is_fatal());
        assert_eq!(tx.pending(), pending);
        assert_eq!(last_swept_epoch(&tx).unwrap(), Some(1));

        // Exactly at the bound still catches up
        let reports = sweep.advance(&mut tx, 5, CatchUp::UpTo(3)).unwrap();
        assert_eq!(reports.len(), 4);
        let err = sweep.advance(&mut tx, 10, CatchUp::UpTo(3)).unwrap_err();
        assert!(matches!(err, Error::EpochGapTooLarge { requested: 10, last: 5, max: 3 }));
    }
}
