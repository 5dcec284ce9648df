//! Ledger store bindings
//!
//! A [`Ledger`] pairs a [`Namespace`] with a typed key ([`LedgerKey`]) and a
//! value type ([`LedgerValue`], either a single [`Coin`] or a [`CoinSet`]).
//! All reads and writes go through a [`Transaction`], so a multi-ledger
//! operation either commits every write or none of them.
//!
//! Zero values are never stored: a `set`, `add` or `sub` that leaves an
//! entry at zero deletes the key, keeping prefix scans proportional to the
//! number of live balances.

use crate::codec::Field;
use crate::coins::CoinSet;
use crate::error::{Error, Result};
use crate::keys::{
    DenomLockupKey, DepositorDenomKey, DepositorKey, DepositorVaultKey, EpochLockupKey, LedgerKey,
    Namespace,
};
use crate::storage::Transaction;
use crate::types::{Coin, Denom, Depositor};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Exported form of a ledger value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryValue {
    /// Single-denom value
    Coin(Coin),
    /// Multi-denom value
    Coins(CoinSet),
}

impl EntryValue {
    /// Coins carried by this value
    pub fn coins(&self) -> Vec<Coin> {
        match self {
            EntryValue::Coin(c) => vec![c.clone()],
            EntryValue::Coins(set) => set.iter().cloned().collect(),
        }
    }
}

/// Value stored under a ledger key
pub trait LedgerValue: Clone + fmt::Debug + Serialize + DeserializeOwned {
    /// Value holding exactly `coin`
    fn from_coin(coin: &Coin) -> Self;

    /// `self + coin`
    fn plus(&self, coin: &Coin) -> Result<Self>;

    /// `self - coin`, failing with `NegativeBalance`
    fn minus(&self, coin: &Coin) -> Result<Self>;

    /// Nothing held?
    fn is_zero(&self) -> bool;

    /// Decoded value is in canonical form?
    fn is_canonical(&self) -> bool;

    /// Value as a multi-denom set
    fn to_coin_set(&self) -> CoinSet;

    /// Exported form
    fn to_entry(&self) -> EntryValue;

    /// Denom of a single-denom value
    fn denom(&self) -> Option<&Denom> {
        None
    }
}

impl LedgerValue for Coin {
    fn from_coin(coin: &Coin) -> Self {
        coin.clone()
    }

    fn plus(&self, coin: &Coin) -> Result<Self> {
        self.checked_add(coin)
    }

    fn minus(&self, coin: &Coin) -> Result<Self> {
        self.checked_sub(coin)
    }

    fn is_zero(&self) -> bool {
        Coin::is_zero(self)
    }

    fn is_canonical(&self) -> bool {
        !Coin::is_zero(self)
    }

    fn to_coin_set(&self) -> CoinSet {
        CoinSet::from(self.clone())
    }

    fn to_entry(&self) -> EntryValue {
        EntryValue::Coin(self.clone())
    }

    fn denom(&self) -> Option<&Denom> {
        Some(&self.denom)
    }
}

impl LedgerValue for CoinSet {
    fn from_coin(coin: &Coin) -> Self {
        CoinSet::from(coin.clone())
    }

    fn plus(&self, coin: &Coin) -> Result<Self> {
        self.add(coin)
    }

    fn minus(&self, coin: &Coin) -> Result<Self> {
        self.sub(coin)
    }

    fn is_zero(&self) -> bool {
        CoinSet::is_zero(self)
    }

    fn is_canonical(&self) -> bool {
        !CoinSet::is_zero(self) && CoinSet::is_canonical(self)
    }

    fn to_coin_set(&self) -> CoinSet {
        self.clone()
    }

    fn to_entry(&self) -> EntryValue {
        EntryValue::Coins(self.clone())
    }
}

/// Typed handle over one namespace
pub struct Ledger<K, V> {
    namespace: Namespace,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for Ledger<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Ledger<K, V> {}

impl<K, V> fmt::Debug for Ledger<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl<K: LedgerKey, V: LedgerValue> Ledger<K, V> {
    /// Bind a namespace
    pub const fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            _marker: PhantomData,
        }
    }

    /// Namespace this ledger writes under
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    fn store_key(&self, key: &K) -> Result<Vec<u8>> {
        Ok(self.namespace.prefixed(&K::SCHEMA.encode(&key.fields())?))
    }

    fn store_prefix(&self, prefix: &[Field]) -> Result<Vec<u8>> {
        Ok(self.namespace.prefixed(&K::SCHEMA.encode_prefix(prefix)?))
    }

    fn decode_value(&self, raw_key: &[u8], bytes: &[u8]) -> Result<V> {
        let value: V = bincode::deserialize(bytes).map_err(|e| {
            Error::corruption(format!(
                "{} value at {:02x?}: {}",
                self.namespace, raw_key, e
            ))
        })?;
        if !value.is_canonical() {
            return Err(Error::corruption(format!(
                "{} value at {:02x?} is not canonical",
                self.namespace, raw_key
            )));
        }
        Ok(value)
    }

    fn decode_key(&self, raw_key: &[u8]) -> Result<K> {
        match raw_key.split_first() {
            Some((tag, rest)) if *tag == self.namespace.tag() => {
                K::from_fields(K::SCHEMA.decode(rest)?)
            }
            _ => Err(Error::corruption(format!(
                "key {:02x?} outside namespace {}",
                raw_key, self.namespace
            ))),
        }
    }

    fn check_denom(&self, key: &K, denom: &Denom) -> Result<()> {
        match key.denom() {
            Some(held) if held != denom => Err(Error::InvariantViolation(format!(
                "{} key {} holds {}, got {}",
                self.namespace,
                key.describe(),
                held,
                denom
            ))),
            _ => Ok(()),
        }
    }

    fn check_amount(&self, op: &str, coin: &Coin) -> Result<()> {
        if coin.is_zero() {
            return Err(Error::validation(format!(
                "{}: cannot {} a zero amount of {}",
                self.namespace, op, coin.denom
            )));
        }
        Ok(())
    }

    /// Current value, `None` when absent
    pub fn get(&self, tx: &Transaction<'_>, key: &K) -> Result<Option<V>> {
        let raw_key = self.store_key(key)?;
        match tx.get(&raw_key)? {
            Some(bytes) => Ok(Some(self.decode_value(&raw_key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Overwrite the value. A zero value deletes the key.
    pub fn set(&self, tx: &mut Transaction<'_>, key: &K, value: &V) -> Result<()> {
        if let Some(denom) = value.denom() {
            self.check_denom(key, denom)?;
        }
        let raw_key = self.store_key(key)?;
        if value.is_zero() {
            tx.delete(raw_key);
            tracing::debug!(ledger = %self.namespace, key = %key.describe(), "Deleted zero entry");
        } else {
            tx.put(raw_key, bincode::serialize(value)?);
            tracing::debug!(ledger = %self.namespace, key = %key.describe(), value = ?value, "Set entry");
        }
        Ok(())
    }

    /// Delete the entry, whatever it holds
    pub fn remove(&self, tx: &mut Transaction<'_>, key: &K) -> Result<()> {
        tx.delete(self.store_key(key)?);
        tracing::debug!(ledger = %self.namespace, key = %key.describe(), "Removed entry");
        Ok(())
    }

    /// Merge `coin` into the entry, creating it when absent
    pub fn add(&self, tx: &mut Transaction<'_>, key: &K, coin: &Coin) -> Result<V> {
        self.check_amount("add", coin)?;
        self.check_denom(key, &coin.denom)?;

        let updated = match self.get(tx, key)? {
            Some(current) => current.plus(coin)?,
            None => V::from_coin(coin),
        };
        self.set(tx, key, &updated)?;
        Ok(updated)
    }

    /// Subtract `coin` from an existing entry.
    ///
    /// Subtracting from an absent entry is an invariant violation. Going
    /// below zero is a recoverable `NegativeBalance` and leaves the entry
    /// untouched. Returns `None` once the entry has been drained and deleted.
    pub fn sub(&self, tx: &mut Transaction<'_>, key: &K, coin: &Coin) -> Result<Option<V>> {
        self.check_amount("subtract", coin)?;
        self.check_denom(key, &coin.denom)?;

        let current = self.get(tx, key)?.ok_or_else(|| Error::MissingBalance {
            namespace: self.namespace.name(),
            key: key.describe(),
        })?;
        let updated = current.minus(coin)?;
        self.set(tx, key, &updated)?;
        Ok(if updated.is_zero() { None } else { Some(updated) })
    }

    /// Visit entries under `prefix` in key order. Stops at the first error
    /// returned by `visit`.
    pub fn iterate<F>(&self, tx: &Transaction<'_>, prefix: &[Field], mut visit: F) -> Result<()>
    where
        F: FnMut(K, V) -> Result<()>,
    {
        let raw_prefix = self.store_prefix(prefix)?;
        for (raw_key, bytes) in tx.scan_prefix(&raw_prefix)? {
            let key = self.decode_key(&raw_key)?;
            let value = self.decode_value(&raw_key, &bytes)?;
            visit(key, value)?;
        }
        Ok(())
    }

    /// Collect entries under `prefix`
    pub fn entries(&self, tx: &Transaction<'_>, prefix: &[Field]) -> Result<Vec<(K, V)>> {
        let mut out = Vec::new();
        self.iterate(tx, prefix, |k, v| {
            out.push((k, v));
            Ok(())
        })?;
        Ok(out)
    }

    /// Sum of every value under `prefix`
    pub fn sum(&self, tx: &Transaction<'_>, prefix: &[Field]) -> Result<CoinSet> {
        let mut total = CoinSet::new();
        self.iterate(tx, prefix, |_, v| {
            total = total.add_all(&v.to_coin_set())?;
            Ok(())
        })?;
        Ok(total)
    }
}

impl<K: LedgerKey> Ledger<K, CoinSet> {
    /// Merge every coin of `coins` into the entry
    pub fn add_coins(&self, tx: &mut Transaction<'_>, key: &K, coins: &CoinSet) -> Result<CoinSet> {
        let current = self.get(tx, key)?.unwrap_or_default();
        let updated = current.add_all(coins)?;
        self.set(tx, key, &updated)?;
        Ok(updated)
    }
}

/// Withdrawable derived by the maturity sweep. Never paid out directly.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedWithdrawable(Ledger<DepositorDenomKey, Coin>);

impl ExpectedWithdrawable {
    /// Bound to [`Namespace::ExpectedWithdrawable`]
    pub const fn new() -> Self {
        Self(Ledger::new(Namespace::ExpectedWithdrawable))
    }

    /// Underlying binding
    pub fn ledger(&self) -> &Ledger<DepositorDenomKey, Coin> {
        &self.0
    }

    /// Current amount
    pub fn get(&self, tx: &Transaction<'_>, depositor: &Depositor, denom: &Denom) -> Result<Option<Coin>> {
        self.0.get(tx, &DepositorDenomKey::new(depositor, denom))
    }

    /// Add a matured amount
    pub fn accrue(&self, tx: &mut Transaction<'_>, depositor: &Depositor, coin: &Coin) -> Result<Coin> {
        self.0
            .add(tx, &DepositorDenomKey::new(depositor, &coin.denom), coin)
    }

    /// Reduce the expected amount
    pub fn reduce(
        &self,
        tx: &mut Transaction<'_>,
        depositor: &Depositor,
        coin: &Coin,
    ) -> Result<Option<Coin>> {
        self.0
            .sub(tx, &DepositorDenomKey::new(depositor, &coin.denom), coin)
    }

    /// All denoms for a depositor
    pub fn total(&self, tx: &Transaction<'_>, depositor: &Depositor) -> Result<CoinSet> {
        self.0.sum(tx, &crate::keys::depositor_prefix(depositor))
    }
}

impl Default for ExpectedWithdrawable {
    fn default() -> Self {
        Self::new()
    }
}

/// Withdrawable credited by external settlement. The only balance a
/// withdrawal may draw on.
#[derive(Debug, Clone, Copy)]
pub struct ActualWithdrawable(Ledger<DepositorDenomKey, Coin>);

impl ActualWithdrawable {
    /// Bound to [`Namespace::ActualWithdrawable`]
    pub const fn new() -> Self {
        Self(Ledger::new(Namespace::ActualWithdrawable))
    }

    /// Underlying binding
    pub fn ledger(&self) -> &Ledger<DepositorDenomKey, Coin> {
        &self.0
    }

    /// Current amount
    pub fn get(&self, tx: &Transaction<'_>, depositor: &Depositor, denom: &Denom) -> Result<Option<Coin>> {
        self.0.get(tx, &DepositorDenomKey::new(depositor, denom))
    }

    /// Credit a settled amount
    pub fn credit(&self, tx: &mut Transaction<'_>, depositor: &Depositor, coin: &Coin) -> Result<Coin> {
        self.0
            .add(tx, &DepositorDenomKey::new(depositor, &coin.denom), coin)
    }

    /// Debit a withdrawn amount
    pub fn debit(
        &self,
        tx: &mut Transaction<'_>,
        depositor: &Depositor,
        coin: &Coin,
    ) -> Result<Option<Coin>> {
        self.0
            .sub(tx, &DepositorDenomKey::new(depositor, &coin.denom), coin)
    }

    /// Delete the entry regardless of amount
    pub fn drain(&self, tx: &mut Transaction<'_>, depositor: &Depositor, denom: &Denom) -> Result<()> {
        self.0.remove(tx, &DepositorDenomKey::new(depositor, denom))
    }

    /// Every live entry for a depositor, in denom order
    pub fn entries(&self, tx: &Transaction<'_>, depositor: &Depositor) -> Result<Vec<Coin>> {
        Ok(self
            .0
            .entries(tx, &crate::keys::depositor_prefix(depositor))?
            .into_iter()
            .map(|(_, coin)| coin)
            .collect())
    }

    /// All denoms for a depositor
    pub fn total(&self, tx: &Transaction<'_>, depositor: &Depositor) -> Result<CoinSet> {
        self.0.sum(tx, &crate::keys::depositor_prefix(depositor))
    }
}

impl Default for ActualWithdrawable {
    fn default() -> Self {
        Self::new()
    }
}

/// The named ledgers
#[derive(Debug, Clone, Copy)]
pub struct Ledgers {
    /// Lifetime deposit per depositor
    pub total_deposit: Ledger<DepositorKey, CoinSet>,
    /// Lifetime deposit per depositor and denom
    pub denom_deposit: Ledger<DepositorDenomKey, Coin>,
    /// Deposit record by epoch day and lockup
    pub epoch_lockup_deposit: Ledger<EpochLockupKey, Coin>,
    /// Sweep-computed withdrawable
    pub expected_withdrawable: ExpectedWithdrawable,
    /// Sweep-computed withdrawable split by lockup
    pub expected_by_lockup: Ledger<DenomLockupKey, Coin>,
    /// Externally credited withdrawable
    pub actual_withdrawable: ActualWithdrawable,
    /// Lifetime withdrawn per vault
    pub total_withdrawn: Ledger<DepositorVaultKey, CoinSet>,
    /// Rewards pending per vault
    pub claimable_reward: Ledger<DepositorVaultKey, CoinSet>,
    /// Rewards paid per vault
    pub claimed_reward: Ledger<DepositorVaultKey, CoinSet>,
}

impl Ledgers {
    /// Bind every ledger to its namespace
    pub const fn new() -> Self {
        Self {
            total_deposit: Ledger::new(Namespace::TotalDeposit),
            denom_deposit: Ledger::new(Namespace::DenomDeposit),
            epoch_lockup_deposit: Ledger::new(Namespace::EpochLockupDeposit),
            expected_withdrawable: ExpectedWithdrawable::new(),
            expected_by_lockup: Ledger::new(Namespace::ExpectedWithdrawableByLockup),
            actual_withdrawable: ActualWithdrawable::new(),
            total_withdrawn: Ledger::new(Namespace::TotalWithdrawn),
            claimable_reward: Ledger::new(Namespace::ClaimableReward),
            claimed_reward: Ledger::new(Namespace::ClaimedReward),
        }
    }
}

impl Default for Ledgers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvStore, MemStore};
    use crate::types::{Amount, LockupPeriod};

    fn alice() -> Depositor {
        Depositor::new("alice").unwrap()
    }

    fn coin(denom: &str, amount: Amount) -> Coin {
        Coin::parse(denom, amount).unwrap()
    }

    fn denom(s: &str) -> Denom {
        Denom::new(s).unwrap()
    }

    #[test]
    fn test_add_creates_then_merges() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let mut tx = store.begin();
        let key = DepositorKey::new(&alice());

        ledgers.total_deposit.add(&mut tx, &key, &coin("DEF", 100)).unwrap();
        ledgers.total_deposit.add(&mut tx, &key, &coin("ABC", 50)).unwrap();
        let total = ledgers.total_deposit.add(&mut tx, &key, &coin("DEF", 1)).unwrap();

        assert_eq!(total.to_string(), "50ABC,101DEF");
        tx.commit().unwrap();

        let tx = store.begin();
        assert_eq!(ledgers.total_deposit.get(&tx, &key).unwrap(), Some(total));
    }

    #[test]
    fn test_add_zero_rejected() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let mut tx = store.begin();
        let key = DepositorDenomKey::new(&alice(), &denom("ABC"));
        let err = ledgers.denom_deposit.add(&mut tx, &key, &coin("ABC", 0)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(tx.pending(), 0);
    }

    #[test]
    fn test_coin_ledger_rejects_foreign_denom() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let mut tx = store.begin();
        let key = DepositorDenomKey::new(&alice(), &denom("ABC"));
        let err = ledgers.denom_deposit.add(&mut tx, &key, &coin("DEF", 1)).unwrap_err();
        assert!(err.is_fatal());

        let err = ledgers.denom_deposit.set(&mut tx, &key, &coin("DEF", 5)).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(tx.pending(), 0);

        // A matching set still goes through, and add keeps merging
        ledgers.denom_deposit.set(&mut tx, &key, &coin("ABC", 5)).unwrap();
        ledgers.denom_deposit.add(&mut tx, &key, &coin("ABC", 1)).unwrap();
        assert_eq!(ledgers.denom_deposit.get(&tx, &key).unwrap(), Some(coin("ABC", 6)));
    }

    #[test]
    fn test_sub_zero_rejected() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let mut tx = store.begin();
        let key = DepositorDenomKey::new(&alice(), &denom("ABC"));
        ledgers.denom_deposit.add(&mut tx, &key, &coin("ABC", 3)).unwrap();

        let err = ledgers.denom_deposit.sub(&mut tx, &key, &coin("ABC", 0)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!err.is_fatal());
        assert_eq!(ledgers.denom_deposit.get(&tx, &key).unwrap(), Some(coin("ABC", 3)));
    }

    #[test]
    fn test_sub_semantics() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let mut tx = store.begin();
        let key = DepositorDenomKey::new(&alice(), &denom("ABC"));

        // Absent entry: caller defect
        let err = ledgers.denom_deposit.sub(&mut tx, &key, &coin("ABC", 1)).unwrap_err();
        assert!(matches!(err, Error::MissingBalance { .. }));
        assert!(err.is_fatal());

        ledgers.denom_deposit.add(&mut tx, &key, &coin("ABC", 10)).unwrap();

        // Insufficient: recoverable, entry unchanged
        let err = ledgers.denom_deposit.sub(&mut tx, &key, &coin("ABC", 11)).unwrap_err();
        assert!(matches!(err, Error::NegativeBalance { .. }));
        assert!(!err.is_fatal());
        assert_eq!(ledgers.denom_deposit.get(&tx, &key).unwrap(), Some(coin("ABC", 10)));

        assert_eq!(
            ledgers.denom_deposit.sub(&mut tx, &key, &coin("ABC", 4)).unwrap(),
            Some(coin("ABC", 6))
        );
        assert_eq!(ledgers.denom_deposit.sub(&mut tx, &key, &coin("ABC", 6)).unwrap(), None);
        assert_eq!(ledgers.denom_deposit.get(&tx, &key).unwrap(), None);

        tx.commit().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_iterate_prefix_and_early_exit() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let mut tx = store.begin();
        let alice = alice();
        let alicea = Depositor::new("alicea").unwrap();

        for (who, d, amt) in [(&alice, "ABC", 1), (&alice, "DEF", 2), (&alicea, "ABC", 3)] {
            ledgers
                .actual_withdrawable
                .credit(&mut tx, who, &coin(d, amt))
                .unwrap();
        }

        let coins = ledgers.actual_withdrawable.entries(&tx, &alice).unwrap();
        assert_eq!(coins, vec![coin("ABC", 1), coin("DEF", 2)]);
        assert_eq!(ledgers.actual_withdrawable.total(&tx, &alicea).unwrap().len(), 1);

        let mut seen = 0;
        let result = ledgers.actual_withdrawable.ledger().iterate(&tx, &[], |_, _| {
            seen += 1;
            Err(Error::validation("stop"))
        });
        assert!(result.is_err());
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_expected_and_actual_are_separate() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let mut tx = store.begin();

        ledgers
            .expected_withdrawable
            .accrue(&mut tx, &alice(), &coin("QSR", 5))
            .unwrap();
        assert_eq!(
            ledgers.actual_withdrawable.get(&tx, &alice(), &denom("QSR")).unwrap(),
            None
        );
        assert!(ledgers
            .actual_withdrawable
            .debit(&mut tx, &alice(), &coin("QSR", 1))
            .is_err());
    }

    #[test]
    fn test_epoch_lockup_sum_by_prefix() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let mut tx = store.begin();
        let bob = Depositor::new("bob").unwrap();

        for (day, lockup, who, amt) in [
            (1, LockupPeriod::Days7, alice(), 10),
            (1, LockupPeriod::Days7, bob.clone(), 5),
            (1, LockupPeriod::Days21, bob.clone(), 7),
            (2, LockupPeriod::Days7, bob.clone(), 9),
        ] {
            let key = EpochLockupKey::new(day, lockup, &who, &denom("QSR"));
            ledgers
                .epoch_lockup_deposit
                .add(&mut tx, &key, &coin("QSR", amt))
                .unwrap();
        }

        let sum = ledgers
            .epoch_lockup_deposit
            .sum(&tx, &EpochLockupKey::day_lockup_prefix(1, LockupPeriod::Days7))
            .unwrap();
        assert_eq!(sum.amount_of(&denom("QSR")), 15);

        let sum = ledgers
            .epoch_lockup_deposit
            .sum(&tx, &EpochLockupKey::day_prefix(1))
            .unwrap();
        assert_eq!(sum.amount_of(&denom("QSR")), 22);
    }

    #[test]
    fn test_corrupt_value_detected() {
        let store = MemStore::new();
        let ledgers = Ledgers::new();
        let key = DepositorKey::new(&alice());

        let mut tx = store.begin();
        let raw_key = Namespace::TotalDeposit.prefixed(
            &DepositorKey::SCHEMA.encode(&key.fields()).unwrap(),
        );
        tx.put(raw_key, vec![0xff, 0xff, 0xff]);
        tx.commit().unwrap();

        let tx = store.begin();
        let err = ledgers.total_deposit.get(&tx, &key).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }
}
