//! Read-only aggregation, genesis export / import and state hashing
//!
//! Queries run over a [`Transaction`] so they see staged writes; pass a
//! fresh transaction to read committed state.

use crate::bindings::{EntryValue, Ledger, LedgerValue, Ledgers};
use crate::codec::Field;
use crate::coins::CoinSet;
use crate::error::{Error, Result};
use crate::keys::{depositor_prefix, EpochLockupKey, LedgerKey, Namespace};
use crate::storage::Transaction;
use crate::sweep;
use crate::types::{Coin, Denom, Depositor, EpochDay, LockupPeriod, Vault};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Sum of every depositor's lifetime deposits
pub fn total_deposits(tx: &Transaction<'_>, ledgers: &Ledgers) -> Result<CoinSet> {
    ledgers.total_deposit.sum(tx, &[])
}

/// Lifetime deposits keyed by depositor
pub fn deposits_by_depositor(
    tx: &Transaction<'_>,
    ledgers: &Ledgers,
) -> Result<BTreeMap<Depositor, CoinSet>> {
    let mut out = BTreeMap::new();
    ledgers.total_deposit.iterate(tx, &[], |key, coins| {
        out.insert(key.depositor, coins);
        Ok(())
    })?;
    Ok(out)
}

/// Everything deposited on `epoch_day`, all lockups and depositors
pub fn epoch_day_total(
    tx: &Transaction<'_>,
    ledgers: &Ledgers,
    epoch_day: EpochDay,
) -> Result<CoinSet> {
    ledgers
        .epoch_lockup_deposit
        .sum(tx, &EpochLockupKey::day_prefix(epoch_day))
}

/// A depositor's deposits on `epoch_day` across every lockup
pub fn depositor_epoch_deposits(
    tx: &Transaction<'_>,
    ledgers: &Ledgers,
    depositor: &Depositor,
    epoch_day: EpochDay,
) -> Result<CoinSet> {
    let mut total = CoinSet::new();
    for lockup in LockupPeriod::ALL {
        let prefix = EpochLockupKey::day_lockup_depositor_prefix(epoch_day, lockup, depositor);
        total = total.add_all(&ledgers.epoch_lockup_deposit.sum(tx, &prefix)?)?;
    }
    Ok(total)
}

/// One deposit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositInfo {
    /// Day recorded
    pub epoch_day: EpochDay,
    /// Lockup chosen
    pub lockup: LockupPeriod,
    /// Owner
    pub depositor: Depositor,
    /// Amount recorded under this key
    pub coin: Coin,
}

/// Every deposit record in key order (epoch day, lockup, depositor, denom)
pub fn deposit_infos(tx: &Transaction<'_>, ledgers: &Ledgers) -> Result<Vec<DepositInfo>> {
    Ok(ledgers
        .epoch_lockup_deposit
        .entries(tx, &[])?
        .into_iter()
        .map(|(key, coin)| DepositInfo {
            epoch_day: key.epoch_day,
            lockup: key.lockup,
            depositor: key.depositor,
            coin,
        })
        .collect())
}

/// Deposits of `depositor` still inside their lockup window on `today`
pub fn active_deposits(
    tx: &Transaction<'_>,
    ledgers: &Ledgers,
    depositor: &Depositor,
    today: EpochDay,
) -> Result<CoinSet> {
    let mut total = CoinSet::new();
    for lockup in LockupPeriod::ALL {
        // Active window is [today - days + 1, today]
        let first = today.saturating_sub(lockup.days() - 1);
        for day in first..=today {
            let prefix = EpochLockupKey::day_lockup_depositor_prefix(day, lockup, depositor);
            total = total.add_all(&ledgers.epoch_lockup_deposit.sum(tx, &prefix)?)?;
        }
    }
    Ok(total)
}

/// Deposits still inside their lockup window on `today`, keyed by depositor
pub fn all_active_deposits(
    tx: &Transaction<'_>,
    ledgers: &Ledgers,
    today: EpochDay,
) -> Result<BTreeMap<Depositor, CoinSet>> {
    let mut out: BTreeMap<Depositor, CoinSet> = BTreeMap::new();
    for lockup in LockupPeriod::ALL {
        let first = today.saturating_sub(lockup.days() - 1);
        for day in first..=today {
            let prefix = EpochLockupKey::day_lockup_prefix(day, lockup);
            ledgers.epoch_lockup_deposit.iterate(tx, &prefix, |key, coin| {
                let entry = out.entry(key.depositor).or_default();
                *entry = entry.add(&coin)?;
                Ok(())
            })?;
        }
    }
    Ok(out)
}

/// Every `(depositor, coin)` row recorded on `epoch_day`, grouped by lockup
pub fn epoch_coins_by_lockup(
    tx: &Transaction<'_>,
    ledgers: &Ledgers,
    epoch_day: EpochDay,
) -> Result<BTreeMap<LockupPeriod, Vec<(Depositor, Coin)>>> {
    let mut out: BTreeMap<LockupPeriod, Vec<(Depositor, Coin)>> = BTreeMap::new();
    ledgers
        .epoch_lockup_deposit
        .iterate(tx, &EpochLockupKey::day_prefix(epoch_day), |key, coin| {
            out.entry(key.lockup).or_default().push((key.depositor, coin));
            Ok(())
        })?;
    Ok(out)
}

/// `(depositor, coin)` rows recorded under `(epoch_day, lockup)`
pub fn epoch_lockup_coins(
    tx: &Transaction<'_>,
    ledgers: &Ledgers,
    epoch_day: EpochDay,
    lockup: LockupPeriod,
) -> Result<Vec<(Depositor, Coin)>> {
    Ok(ledgers
        .epoch_lockup_deposit
        .entries(tx, &EpochLockupKey::day_lockup_prefix(epoch_day, lockup))?
        .into_iter()
        .map(|(key, coin)| (key.depositor, coin))
        .collect())
}

/// Actual withdrawable balances keyed by depositor
pub fn all_actual_withdrawables(
    tx: &Transaction<'_>,
    ledgers: &Ledgers,
) -> Result<BTreeMap<Depositor, CoinSet>> {
    let mut out: BTreeMap<Depositor, CoinSet> = BTreeMap::new();
    ledgers
        .actual_withdrawable
        .ledger()
        .iterate(tx, &[], |key, coin| {
            let entry = out.entry(key.depositor).or_default();
            *entry = entry.add(&coin)?;
            Ok(())
        })?;
    Ok(out)
}

/// Lifetime withdrawn totals per `(depositor, vault)`
pub fn all_total_withdrawn(
    tx: &Transaction<'_>,
    ledgers: &Ledgers,
) -> Result<Vec<(Depositor, Vault, CoinSet)>> {
    Ok(ledgers
        .total_withdrawn
        .entries(tx, &[])?
        .into_iter()
        .map(|(key, coins)| (key.depositor, key.vault, coins))
        .collect())
}

/// Expected withdrawable for one depositor and denom, split by lockup
pub fn expected_by_lockup(
    tx: &Transaction<'_>,
    ledgers: &Ledgers,
    depositor: &Depositor,
    denom: &Denom,
) -> Result<BTreeMap<LockupPeriod, Coin>> {
    let mut prefix = depositor_prefix(depositor);
    prefix.push(Field::Str(denom.as_str().to_string()));

    Ok(ledgers
        .expected_by_lockup
        .entries(tx, &prefix)?
        .into_iter()
        .map(|(key, coin)| (key.lockup, coin))
        .collect())
}

/// One exported ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisEntry {
    /// Ledger the entry belongs to
    pub namespace: Namespace,
    /// Key fields in schema order
    pub key: Vec<Field>,
    /// Stored value
    pub value: EntryValue,
}

/// Full ledger state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    /// Last epoch day swept
    pub last_swept_epoch: Option<EpochDay>,
    /// Entries by namespace tag, then key order
    pub entries: Vec<GenesisEntry>,
}

impl GenesisState {
    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::validation(format!("genesis: {}", e)))
    }

    /// Render as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::validation(format!("genesis: {}", e)))
    }

    /// Load a genesis file
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Write a genesis file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn export_ledger<K: LedgerKey, V: LedgerValue>(
    tx: &Transaction<'_>,
    ledger: &Ledger<K, V>,
    out: &mut Vec<GenesisEntry>,
) -> Result<()> {
    ledger.iterate(tx, &[], |key, value| {
        out.push(GenesisEntry {
            namespace: ledger.namespace(),
            key: key.fields(),
            value: value.to_entry(),
        });
        Ok(())
    })
}

/// Export every ledger entry and the epoch marker
pub fn export_genesis(tx: &Transaction<'_>, ledgers: &Ledgers) -> Result<GenesisState> {
    let mut entries = Vec::new();
    for namespace in Namespace::LEDGERS {
        match namespace {
            Namespace::DenomDeposit => export_ledger(tx, &ledgers.denom_deposit, &mut entries)?,
            Namespace::EpochLockupDeposit => {
                export_ledger(tx, &ledgers.epoch_lockup_deposit, &mut entries)?
            }
            Namespace::TotalDeposit => export_ledger(tx, &ledgers.total_deposit, &mut entries)?,
            Namespace::ExpectedWithdrawable => {
                export_ledger(tx, ledgers.expected_withdrawable.ledger(), &mut entries)?
            }
            Namespace::ActualWithdrawable => {
                export_ledger(tx, ledgers.actual_withdrawable.ledger(), &mut entries)?
            }
            Namespace::TotalWithdrawn => export_ledger(tx, &ledgers.total_withdrawn, &mut entries)?,
            Namespace::ClaimableReward => {
                export_ledger(tx, &ledgers.claimable_reward, &mut entries)?
            }
            Namespace::ClaimedReward => export_ledger(tx, &ledgers.claimed_reward, &mut entries)?,
            Namespace::ExpectedWithdrawableByLockup => {
                export_ledger(tx, &ledgers.expected_by_lockup, &mut entries)?
            }
            Namespace::Meta => {}
        }
    }

    Ok(GenesisState {
        last_swept_epoch: sweep::last_swept_epoch(tx)?,
        entries,
    })
}

/// Check one entry against `ledger`'s key schema; with `apply` set, replay
/// it through `add`.
fn replay_entry<K: LedgerKey, V: LedgerValue>(
    tx: &mut Transaction<'_>,
    ledger: &Ledger<K, V>,
    entry: &GenesisEntry,
    apply: bool,
) -> Result<()> {
    let key = K::from_fields(entry.key.clone())
        .map_err(|e| Error::validation(format!("genesis {} entry: {}", entry.namespace, e)))?;

    let coins = entry.value.coins();
    if coins.is_empty() || coins.iter().any(Coin::is_zero) {
        return Err(Error::validation(format!(
            "genesis {} entry {} has an empty or zero value",
            entry.namespace,
            key.describe()
        )));
    }
    if let Some(denom) = key.denom() {
        if coins.iter().any(|c| c.denom != *denom) {
            return Err(Error::validation(format!(
                "genesis {} entry {} holds a foreign denom",
                entry.namespace,
                key.describe()
            )));
        }
    }

    if apply {
        for coin in &coins {
            ledger.add(tx, &key, coin)?;
        }
    }
    Ok(())
}

fn replay_all(
    tx: &mut Transaction<'_>,
    ledgers: &Ledgers,
    genesis: &GenesisState,
    apply: bool,
) -> Result<()> {
    for entry in &genesis.entries {
        match entry.namespace {
            Namespace::DenomDeposit => replay_entry(tx, &ledgers.denom_deposit, entry, apply)?,
            Namespace::EpochLockupDeposit => {
                replay_entry(tx, &ledgers.epoch_lockup_deposit, entry, apply)?
            }
            Namespace::TotalDeposit => replay_entry(tx, &ledgers.total_deposit, entry, apply)?,
            Namespace::ExpectedWithdrawable => {
                replay_entry(tx, ledgers.expected_withdrawable.ledger(), entry, apply)?
            }
            Namespace::ActualWithdrawable => {
                replay_entry(tx, ledgers.actual_withdrawable.ledger(), entry, apply)?
            }
            Namespace::TotalWithdrawn => replay_entry(tx, &ledgers.total_withdrawn, entry, apply)?,
            Namespace::ClaimableReward => {
                replay_entry(tx, &ledgers.claimable_reward, entry, apply)?
            }
            Namespace::ClaimedReward => replay_entry(tx, &ledgers.claimed_reward, entry, apply)?,
            Namespace::ExpectedWithdrawableByLockup => {
                replay_entry(tx, &ledgers.expected_by_lockup, entry, apply)?
            }
            Namespace::Meta => {
                return Err(Error::validation(
                    "genesis entries must not target the meta namespace",
                ))
            }
        }
    }
    Ok(())
}

/// Stage a genesis state into an empty store. Every entry is checked
/// before the first write. Returns the number of entries replayed.
pub fn import_genesis(
    tx: &mut Transaction<'_>,
    ledgers: &Ledgers,
    genesis: &GenesisState,
) -> Result<usize> {
    if !tx.scan_prefix(&[])?.is_empty() {
        return Err(Error::validation("genesis import requires an empty store"));
    }

    replay_all(tx, ledgers, genesis, false)?;
    replay_all(tx, ledgers, genesis, true)?;
    if let Some(day) = genesis.last_swept_epoch {
        sweep::record_swept_epoch(tx, day)?;
    }

    tracing::info!(
        entries = genesis.entries.len(),
        last_swept_epoch = ?genesis.last_swept_epoch,
        "Genesis imported"
    );
    Ok(genesis.entries.len())
}

/// SHA-256 over every stored key and value in key order. Equal states hash
/// equal.
pub fn state_hash(tx: &Transaction<'_>) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    for (key, value) in tx.scan_prefix(&[])? {
        hasher.update((key.len() as u64).to_be_bytes());
        hasher.update(&key);
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(&value);
    }
    Ok(hasher.finalize().into())
}

/// Lowercase hex rendering of a hash
pub fn hash_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Headline numbers for logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSummary {
    /// Depositors with a lifetime deposit
    pub depositors: usize,
    /// Lifetime deposits across depositors
    pub total_deposits: CoinSet,
    /// Last epoch day swept
    pub last_swept_epoch: Option<EpochDay>,
    /// [`state_hash`] as hex
    pub state_hash: String,
}

/// Summarize committed state
pub fn summarize(tx: &Transaction<'_>, ledgers: &Ledgers) -> Result<LedgerSummary> {
    Ok(LedgerSummary {
        depositors: deposits_by_depositor(tx, ledgers)?.len(),
        total_deposits: total_deposits(tx, ledgers)?,
        last_swept_epoch: sweep::last_swept_epoch(tx)?,
        state_hash: hash_hex(&state_hash(tx)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::DenomLockupKey;
    use crate::storage::{KvStore, MemStore};

    fn who(id: &str) -> Depositor {
        Depositor::new(id).unwrap()
    }

    fn coin(denom: &str, amount: u128) -> Coin {
        Coin::parse(denom, amount).unwrap()
    }

    fn deposit(
        tx: &mut Transaction<'_>,
        l: &Ledgers,
        day: EpochDay,
        lockup: LockupPeriod,
        d: &Depositor,
        c: &Coin,
    ) {
        l.epoch_lockup_deposit
            .add(tx, &EpochLockupKey::new(day, lockup, d, &c.denom), c)
            .unwrap();
    }

    #[test]
    fn test_active_deposits_window() {
        let store = MemStore::new();
        let l = Ledgers::new();
        let mut tx = store.begin();
        let alice = who("alice");

        deposit(&mut tx, &l, 1, LockupPeriod::Days7, &alice, &coin("QSR", 10));
        deposit(&mut tx, &l, 1, LockupPeriod::Days21, &alice, &coin("QSR", 20));
        deposit(&mut tx, &l, 5, LockupPeriod::Days7, &alice, &coin("ABC", 3));

        let qsr = Denom::new("QSR").unwrap();
        assert_eq!(active_deposits(&tx, &l, &alice, 1).unwrap().amount_of(&qsr), 30);
        // Day 8: the Days7 row from day 1 has matured
        let active = active_deposits(&tx, &l, &alice, 8).unwrap();
        assert_eq!(active.amount_of(&qsr), 20);
        assert_eq!(active.amount_of(&Denom::new("ABC").unwrap()), 3);
        assert!(active_deposits(&tx, &l, &alice, 22).unwrap().is_zero());
    }

    #[test]
    fn test_all_active_deposits() {
        let store = MemStore::new();
        let l = Ledgers::new();
        let mut tx = store.begin();
        let (alice, bob) = (who("alice"), who("bob"));

        deposit(&mut tx, &l, 1, LockupPeriod::Days7, &alice, &coin("QSR", 10));
        deposit(&mut tx, &l, 3, LockupPeriod::Days7, &alice, &coin("QSR", 1));
        deposit(&mut tx, &l, 2, LockupPeriod::Days21, &bob, &coin("ABC", 4));

        let active = all_active_deposits(&tx, &l, 8).unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[&alice], CoinSet::from(coin("QSR", 1)));
        assert_eq!(active[&bob], CoinSet::from(coin("ABC", 4)));
        assert_eq!(active[&alice], active_deposits(&tx, &l, &alice, 8).unwrap());

        assert!(all_active_deposits(&tx, &l, 30).unwrap().is_empty());
    }

    #[test]
    fn test_epoch_queries() {
        let store = MemStore::new();
        let l = Ledgers::new();
        let mut tx = store.begin();
        let (alice, bob) = (who("alice"), who("bob"));

        deposit(&mut tx, &l, 2, LockupPeriod::Days7, &alice, &coin("QSR", 1));
        deposit(&mut tx, &l, 2, LockupPeriod::Months1, &alice, &coin("QSR", 2));
        deposit(&mut tx, &l, 2, LockupPeriod::Days7, &bob, &coin("QSR", 4));
        deposit(&mut tx, &l, 3, LockupPeriod::Days7, &bob, &coin("QSR", 8));

        let qsr = Denom::new("QSR").unwrap();
        assert_eq!(epoch_day_total(&tx, &l, 2).unwrap().amount_of(&qsr), 7);
        assert_eq!(depositor_epoch_deposits(&tx, &l, &alice, 2).unwrap().amount_of(&qsr), 3);
        assert_eq!(
            epoch_lockup_coins(&tx, &l, 2, LockupPeriod::Days7).unwrap(),
            vec![(alice.clone(), coin("QSR", 1)), (bob.clone(), coin("QSR", 4))]
        );
        let by_lockup = epoch_coins_by_lockup(&tx, &l, 2).unwrap();
        assert_eq!(by_lockup.len(), 2);
        assert_eq!(by_lockup[&LockupPeriod::Days7].len(), 2);
        assert_eq!(
            by_lockup[&LockupPeriod::Months1],
            vec![(alice.clone(), coin("QSR", 2))]
        );
        assert!(epoch_coins_by_lockup(&tx, &l, 4).unwrap().is_empty());

        let infos = deposit_infos(&tx, &l).unwrap();
        assert_eq!(infos.len(), 4);
        assert_eq!(infos[3].epoch_day, 3);
    }

    #[test]
    fn test_expected_by_lockup_query() {
        let store = MemStore::new();
        let l = Ledgers::new();
        let mut tx = store.begin();
        let alice = who("alice");
        let qsr = Denom::new("QSR").unwrap();

        for (lockup, amt) in [(LockupPeriod::Days21, 5), (LockupPeriod::Days7, 2)] {
            l.expected_by_lockup
                .add(&mut tx, &DenomLockupKey::new(&alice, &qsr, lockup), &coin("QSR", amt))
                .unwrap();
        }
        let split = expected_by_lockup(&tx, &l, &alice, &qsr).unwrap();
        assert_eq!(split.len(), 2);
        assert_eq!(split[&LockupPeriod::Days7], coin("QSR", 2));
    }

    #[test]
    fn test_genesis_rejects_bad_entry_before_writing() {
        let store = MemStore::new();
        let l = Ledgers::new();
        let genesis = GenesisState {
            last_swept_epoch: Some(4),
            entries: vec![
                GenesisEntry {
                    namespace: Namespace::TotalDeposit,
                    key: vec![Field::Str("alice".into())],
                    value: EntryValue::Coins(CoinSet::from(coin("QSR", 1))),
                },
                GenesisEntry {
                    namespace: Namespace::DenomDeposit,
                    key: vec![Field::Str("alice".into()), Field::Str("QSR".into())],
                    value: EntryValue::Coin(coin("ABC", 1)),
                },
            ],
        };

        let mut tx = store.begin();
        let err = import_genesis(&mut tx, &l, &genesis).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(tx.pending(), 0);
    }

    #[test]
    fn test_genesis_rejects_malformed_value_denom() {
        let genesis = GenesisState {
            last_swept_epoch: None,
            entries: vec![GenesisEntry {
                namespace: Namespace::TotalDeposit,
                key: vec![Field::Str("alice".into())],
                value: EntryValue::Coins(CoinSet::from(coin("QSR", 5))),
            }],
        };
        let json = genesis.to_json().unwrap();
        assert!(GenesisState::from_json(&json).is_ok());

        for bad in ["\"\"", "\"a b\\u0000\""] {
            let tampered = json.replace("\"QSR\"", bad);
            assert_ne!(tampered, json);
            let err = GenesisState::from_json(&tampered).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    #[test]
    fn test_state_hash_tracks_content() {
        let store = MemStore::new();
        let l = Ledgers::new();
        let empty = state_hash(&store.begin()).unwrap();

        let mut tx = store.begin();
        deposit(&mut tx, &l, 1, LockupPeriod::Days7, &who("alice"), &coin("QSR", 1));
        let staged = state_hash(&tx).unwrap();
        assert_ne!(empty, staged);
        tx.commit().unwrap();
        assert_eq!(state_hash(&store.begin()).unwrap(), staged);
        assert_eq!(hash_hex(&staged).len(), 64);
    }
}
