//! Namespaces and typed ledger keys
//!
//! Each named ledger lives under a one-byte tag in the shared key space and
//! fixes its own field order through a [`KeySchema`].

use crate::codec::{Field, FieldKind, KeySchema};
use crate::error::{Error, Result};
use crate::types::{Denom, Depositor, EpochDay, LockupPeriod, Vault};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Disjoint byte-prefix regions of the ledger key space
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Namespace {
    /// Lifetime deposit per depositor and denom
    DenomDeposit = 0x01,
    /// Granular deposit record by epoch day and lockup
    EpochLockupDeposit = 0x02,
    /// Lifetime deposit per depositor
    TotalDeposit = 0x03,
    /// Sweep-computed withdrawable
    ExpectedWithdrawable = 0x04,
    /// Externally credited withdrawable
    ActualWithdrawable = 0x05,
    /// Lifetime withdrawn per vault
    TotalWithdrawn = 0x06,
    /// Rewards pending
    ClaimableReward = 0x07,
    /// Rewards paid
    ClaimedReward = 0x08,
    /// Sweep-computed withdrawable split by lockup
    ExpectedWithdrawableByLockup = 0x09,
    /// Ledger bookkeeping (last swept epoch day)
    Meta = 0x7f,
}

impl Namespace {
    /// Ledger namespaces in tag order (excludes [`Namespace::Meta`])
    pub const LEDGERS: [Namespace; 9] = [
        Namespace::DenomDeposit,
        Namespace::EpochLockupDeposit,
        Namespace::TotalDeposit,
        Namespace::ExpectedWithdrawable,
        Namespace::ActualWithdrawable,
        Namespace::TotalWithdrawn,
        Namespace::ClaimableReward,
        Namespace::ClaimedReward,
        Namespace::ExpectedWithdrawableByLockup,
    ];

    /// Leading key byte
    pub fn tag(&self) -> u8 {
        *self as u8
    }

    /// Snake-case name
    pub fn name(&self) -> &'static str {
        match self {
            Namespace::DenomDeposit => "denom_deposit",
            Namespace::EpochLockupDeposit => "epoch_lockup_deposit",
            Namespace::TotalDeposit => "total_deposit",
            Namespace::ExpectedWithdrawable => "expected_withdrawable",
            Namespace::ActualWithdrawable => "actual_withdrawable",
            Namespace::TotalWithdrawn => "total_withdrawn",
            Namespace::ClaimableReward => "claimable_reward",
            Namespace::ClaimedReward => "claimed_reward",
            Namespace::ExpectedWithdrawableByLockup => "expected_withdrawable_by_lockup",
            Namespace::Meta => "meta",
        }
    }

    /// Build a full store key from an encoded composite key
    pub fn prefixed(&self, encoded: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(encoded.len() + 1);
        key.push(self.tag());
        key.extend_from_slice(encoded);
        key
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A typed key with a fixed schema
pub trait LedgerKey: Sized + Clone + fmt::Debug {
    /// Field layout
    const SCHEMA: KeySchema;

    /// Fields in schema order
    fn fields(&self) -> Vec<Field>;

    /// Rebuild from decoded fields
    fn from_fields(fields: Vec<Field>) -> Result<Self>;

    /// Denom fixed by the key, if the schema carries one. Coin-valued
    /// ledgers only accept coins of this denom.
    fn denom(&self) -> Option<&Denom> {
        None
    }

    /// Human readable rendering for logs and errors
    fn describe(&self) -> String {
        self.fields()
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

struct FieldReader {
    schema: &'static str,
    fields: std::vec::IntoIter<Field>,
}

impl FieldReader {
    fn new(schema: &KeySchema, fields: Vec<Field>) -> Self {
        Self {
            schema: schema.name,
            fields: fields.into_iter(),
        }
    }

    fn bad(&self, what: &str) -> Error {
        Error::corruption(format!("{} key: {}", self.schema, what))
    }

    fn text(&mut self) -> Result<String> {
        match self.fields.next() {
            Some(Field::Str(s)) => Ok(s),
            _ => Err(self.bad("expected string field")),
        }
    }

    fn depositor(&mut self) -> Result<Depositor> {
        let raw = self.text()?;
        Depositor::new(raw).map_err(|e| self.bad(&e.to_string()))
    }

    fn denom(&mut self) -> Result<Denom> {
        let raw = self.text()?;
        Denom::new(raw).map_err(|e| self.bad(&e.to_string()))
    }

    fn vault(&mut self) -> Result<Vault> {
        let raw = self.text()?;
        Vault::new(raw).map_err(|e| self.bad(&e.to_string()))
    }

    fn epoch_day(&mut self) -> Result<EpochDay> {
        match self.fields.next() {
            Some(Field::U64(v)) => Ok(v),
            _ => Err(self.bad("expected epoch day")),
        }
    }

    fn lockup(&mut self) -> Result<LockupPeriod> {
        match self.fields.next() {
            Some(Field::U32(v)) => {
                LockupPeriod::from_ordinal(v).ok_or_else(|| self.bad("unknown lockup ordinal"))
            }
            _ => Err(self.bad("expected lockup ordinal")),
        }
    }

    fn finish<T>(mut self, value: T) -> Result<T> {
        match self.fields.next() {
            None => Ok(value),
            Some(_) => Err(self.bad("too many fields")),
        }
    }
}

fn text(s: &str) -> Field {
    Field::Str(s.to_string())
}

/// `depositor`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepositorKey {
    /// Account
    pub depositor: Depositor,
}

impl DepositorKey {
    /// Construct
    pub fn new(depositor: &Depositor) -> Self {
        Self {
            depositor: depositor.clone(),
        }
    }
}

impl LedgerKey for DepositorKey {
    const SCHEMA: KeySchema = KeySchema {
        name: "depositor",
        fields: &[FieldKind::Str],
    };

    fn fields(&self) -> Vec<Field> {
        vec![text(self.depositor.as_str())]
    }

    fn from_fields(fields: Vec<Field>) -> Result<Self> {
        let mut r = FieldReader::new(&Self::SCHEMA, fields);
        let depositor = r.depositor()?;
        r.finish(Self { depositor })
    }
}

/// `depositor, denom`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepositorDenomKey {
    /// Account
    pub depositor: Depositor,
    /// Asset
    pub denom: Denom,
}

impl DepositorDenomKey {
    /// Construct
    pub fn new(depositor: &Depositor, denom: &Denom) -> Self {
        Self {
            depositor: depositor.clone(),
            denom: denom.clone(),
        }
    }
}

impl LedgerKey for DepositorDenomKey {
    const SCHEMA: KeySchema = KeySchema {
        name: "depositor_denom",
        fields: &[FieldKind::Str, FieldKind::Str],
    };

    fn fields(&self) -> Vec<Field> {
        vec![text(self.depositor.as_str()), text(self.denom.as_str())]
    }

    fn denom(&self) -> Option<&Denom> {
        Some(&self.denom)
    }

    fn from_fields(fields: Vec<Field>) -> Result<Self> {
        let mut r = FieldReader::new(&Self::SCHEMA, fields);
        let depositor = r.depositor()?;
        let denom = r.denom()?;
        r.finish(Self { depositor, denom })
    }
}

/// `depositor, vault`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepositorVaultKey {
    /// Account
    pub depositor: Depositor,
    /// Vault
    pub vault: Vault,
}

impl DepositorVaultKey {
    /// Construct
    pub fn new(depositor: &Depositor, vault: &Vault) -> Self {
        Self {
            depositor: depositor.clone(),
            vault: vault.clone(),
        }
    }
}

impl LedgerKey for DepositorVaultKey {
    const SCHEMA: KeySchema = KeySchema {
        name: "depositor_vault",
        fields: &[FieldKind::Str, FieldKind::Str],
    };

    fn fields(&self) -> Vec<Field> {
        vec![text(self.depositor.as_str()), text(self.vault.as_str())]
    }

    fn from_fields(fields: Vec<Field>) -> Result<Self> {
        let mut r = FieldReader::new(&Self::SCHEMA, fields);
        let depositor = r.depositor()?;
        let vault = r.vault()?;
        r.finish(Self { depositor, vault })
    }
}

/// `epochDay, lockup, depositor, denom`
///
/// Day and lockup lead so that one prefix selects everything deposited on a
/// given day under a given lockup, across all depositors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpochLockupKey {
    /// Day the deposit was recorded
    pub epoch_day: EpochDay,
    /// Lockup chosen at deposit time
    pub lockup: LockupPeriod,
    /// Account
    pub depositor: Depositor,
    /// Asset
    pub denom: Denom,
}

impl EpochLockupKey {
    /// Construct
    pub fn new(
        epoch_day: EpochDay,
        lockup: LockupPeriod,
        depositor: &Depositor,
        denom: &Denom,
    ) -> Self {
        Self {
            epoch_day,
            lockup,
            depositor: depositor.clone(),
            denom: denom.clone(),
        }
    }

    /// Prefix selecting every row of one epoch day
    pub fn day_prefix(epoch_day: EpochDay) -> Vec<Field> {
        vec![Field::U64(epoch_day)]
    }

    /// Prefix selecting every row of one (epoch day, lockup) pair
    pub fn day_lockup_prefix(epoch_day: EpochDay, lockup: LockupPeriod) -> Vec<Field> {
        vec![Field::U64(epoch_day), Field::U32(lockup.ordinal())]
    }

    /// Prefix selecting one depositor's rows for an (epoch day, lockup) pair
    pub fn day_lockup_depositor_prefix(
        epoch_day: EpochDay,
        lockup: LockupPeriod,
        depositor: &Depositor,
    ) -> Vec<Field> {
        vec![
            Field::U64(epoch_day),
            Field::U32(lockup.ordinal()),
            text(depositor.as_str()),
        ]
    }

    /// Still locked on `today`?
    pub fn is_active_on(&self, today: EpochDay) -> bool {
        self.epoch_day <= today && today < self.epoch_day.saturating_add(self.lockup.days())
    }
}

impl LedgerKey for EpochLockupKey {
    const SCHEMA: KeySchema = KeySchema {
        name: "epoch_lockup_depositor_denom",
        fields: &[FieldKind::U64, FieldKind::U32, FieldKind::Str, FieldKind::Str],
    };

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::U64(self.epoch_day),
            Field::U32(self.lockup.ordinal()),
            text(self.depositor.as_str()),
            text(self.denom.as_str()),
        ]
    }

    fn denom(&self) -> Option<&Denom> {
        Some(&self.denom)
    }

    fn from_fields(fields: Vec<Field>) -> Result<Self> {
        let mut r = FieldReader::new(&Self::SCHEMA, fields);
        let epoch_day = r.epoch_day()?;
        let lockup = r.lockup()?;
        let depositor = r.depositor()?;
        let denom = r.denom()?;
        r.finish(Self {
            epoch_day,
            lockup,
            depositor,
            denom,
        })
    }
}

/// `depositor, denom, lockup`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DenomLockupKey {
    /// Account
    pub depositor: Depositor,
    /// Asset
    pub denom: Denom,
    /// Lockup the amount matured from
    pub lockup: LockupPeriod,
}

impl DenomLockupKey {
    /// Construct
    pub fn new(depositor: &Depositor, denom: &Denom, lockup: LockupPeriod) -> Self {
        Self {
            depositor: depositor.clone(),
            denom: denom.clone(),
            lockup,
        }
    }
}

impl LedgerKey for DenomLockupKey {
    const SCHEMA: KeySchema = KeySchema {
        name: "depositor_denom_lockup",
        fields: &[FieldKind::Str, FieldKind::Str, FieldKind::U32],
    };

    fn fields(&self) -> Vec<Field> {
        vec![
            text(self.depositor.as_str()),
            text(self.denom.as_str()),
            Field::U32(self.lockup.ordinal()),
        ]
    }

    fn denom(&self) -> Option<&Denom> {
        Some(&self.denom)
    }

    fn from_fields(fields: Vec<Field>) -> Result<Self> {
        let mut r = FieldReader::new(&Self::SCHEMA, fields);
        let depositor = r.depositor()?;
        let denom = r.denom()?;
        let lockup = r.lockup()?;
        r.finish(Self {
            depositor,
            denom,
            lockup,
        })
    }
}

/// Prefix selecting every entry owned by `depositor` in a ledger whose key
/// starts with the depositor
pub fn depositor_prefix(depositor: &Depositor) -> Vec<Field> {
    vec![text(depositor.as_str())]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Depositor {
        Depositor::new("alice").unwrap()
    }

    #[test]
    fn test_namespace_tags_unique() {
        let mut tags: Vec<u8> = Namespace::LEDGERS.iter().map(|n| n.tag()).collect();
        tags.push(Namespace::Meta.tag());
        let before = tags.len();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), before);
    }

    #[test]
    fn test_epoch_key_fields_round_trip() {
        let key = EpochLockupKey::new(
            8,
            LockupPeriod::Days7,
            &alice(),
            &Denom::new("ABC").unwrap(),
        );
        let bytes = EpochLockupKey::SCHEMA.encode(&key.fields()).unwrap();
        let decoded = EpochLockupKey::from_fields(EpochLockupKey::SCHEMA.decode(&bytes).unwrap());
        assert_eq!(decoded.unwrap(), key);
    }

    #[test]
    fn test_unknown_lockup_ordinal_is_corruption() {
        let fields = vec![Field::U64(1), Field::U32(9), "alice".into(), "ABC".into()];
        let err = EpochLockupKey::from_fields(fields).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }

    #[test]
    fn test_is_active_on() {
        let key = EpochLockupKey::new(
            1,
            LockupPeriod::Days7,
            &alice(),
            &Denom::new("ABC").unwrap(),
        );
        assert!(!key.is_active_on(0));
        assert!(key.is_active_on(1));
        assert!(key.is_active_on(7));
        assert!(!key.is_active_on(8));
    }

    #[test]
    fn test_describe() {
        let key = DepositorVaultKey::new(&alice(), &Vault::new("orion").unwrap());
        assert_eq!(key.describe(), "alice/orion");
    }
}
