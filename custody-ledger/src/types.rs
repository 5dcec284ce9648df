//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Validation at construction (identifiers never contain the key separator)
//! - Exact integer arithmetic for amounts

use crate::codec::SEPARATOR;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Non-negative integer magnitude of an asset
pub type Amount = u128;

/// Host-supplied epoch tick counter
pub type EpochDay = u64;

/// Longest accepted depositor / vault identifier, in bytes
pub const MAX_ID_LEN: usize = 256;

fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::validation(format!("{} must not be empty", kind)));
    }
    if id.len() > MAX_ID_LEN {
        return Err(Error::validation(format!(
            "{} exceeds {} bytes",
            kind, MAX_ID_LEN
        )));
    }
    if id.as_bytes().contains(&SEPARATOR) {
        return Err(Error::validation(format!(
            "{} contains the reserved separator byte",
            kind
        )));
    }
    Ok(())
}

/// Depositor account identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Depositor(String);

impl Depositor {
    /// Create a validated depositor id
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_id("depositor", &id)?;
        Ok(Self(id))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Depositor {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Depositor> for String {
    fn from(value: Depositor) -> Self {
        value.0
    }
}

impl fmt::Display for Depositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Downstream vault / strategy identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Vault(String);

impl Vault {
    /// Create a validated vault id
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_id("vault", &id)?;
        Ok(Self(id))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Vault {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Vault> for String {
    fn from(value: Vault) -> Self {
        value.0
    }
}

impl fmt::Display for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset type identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Denom(String);

impl Denom {
    /// Create a validated denom.
    ///
    /// 3 to 128 characters; the first is an ASCII letter, the rest are ASCII
    /// alphanumerics or one of `/ : . _ -`.
    pub fn new(denom: impl Into<String>) -> Result<Self> {
        let denom = denom.into();
        let bytes = denom.as_bytes();
        if !(3..=128).contains(&bytes.len()) {
            return Err(Error::validation(format!(
                "invalid denom '{}': length must be 3..=128",
                denom
            )));
        }
        if !bytes[0].is_ascii_alphabetic() {
            return Err(Error::validation(format!(
                "invalid denom '{}': must start with a letter",
                denom
            )));
        }
        let valid_tail = bytes[1..]
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b':' | b'.' | b'_' | b'-'));
        if !valid_tail {
            return Err(Error::validation(format!(
                "invalid denom '{}': illegal character",
                denom
            )));
        }
        Ok(Self(denom))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Denom {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Denom> for String {
    fn from(value: Denom) -> Self {
        value.0
    }
}

impl fmt::Display for Denom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single (denom, amount) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    /// Asset type
    pub denom: Denom,
    /// Magnitude
    pub amount: Amount,
}

impl Coin {
    /// Create a coin
    pub fn new(denom: Denom, amount: Amount) -> Self {
        Self { denom, amount }
    }

    /// Parse the denom and build a coin in one step
    pub fn parse(denom: &str, amount: Amount) -> Result<Self> {
        Ok(Self::new(Denom::new(denom)?, amount))
    }

    /// Zero amount?
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Add a coin of the same denom
    pub fn checked_add(&self, other: &Coin) -> Result<Coin> {
        self.ensure_same_denom(other)?;
        let amount = self.amount.checked_add(other.amount).ok_or_else(|| {
            Error::InvariantViolation(format!("amount overflow adding {} to {}", other, self))
        })?;
        Ok(Coin::new(self.denom.clone(), amount))
    }

    /// Subtract a coin of the same denom, refusing to go below zero
    pub fn checked_sub(&self, other: &Coin) -> Result<Coin> {
        self.ensure_same_denom(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| Error::NegativeBalance {
                denom: self.denom.to_string(),
                requested: other.amount,
                available: self.amount,
            })?;
        Ok(Coin::new(self.denom.clone(), amount))
    }

    fn ensure_same_denom(&self, other: &Coin) -> Result<()> {
        if self.denom != other.denom {
            return Err(Error::InvariantViolation(format!(
                "denom mismatch: {} vs {}",
                self.denom, other.denom
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Lockup period attached to a deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum LockupPeriod {
    /// 7 days
    Days7 = 1,
    /// 21 days
    Days21 = 2,
    /// 1 month (30 days)
    Months1 = 3,
    /// 3 months (90 days)
    Months3 = 4,
}

impl LockupPeriod {
    /// Every valid lockup period, in ordinal order
    pub const ALL: [LockupPeriod; 4] = [
        LockupPeriod::Days7,
        LockupPeriod::Days21,
        LockupPeriod::Months1,
        LockupPeriod::Months3,
    ];

    /// Duration in epoch days
    pub fn days(&self) -> EpochDay {
        match self {
            LockupPeriod::Days7 => 7,
            LockupPeriod::Days21 => 21,
            LockupPeriod::Months1 => 30,
            LockupPeriod::Months3 => 90,
        }
    }

    /// Ordinal used in persisted keys
    pub fn ordinal(&self) -> u32 {
        *self as u32
    }

    /// Inverse of [`LockupPeriod::ordinal`]
    pub fn from_ordinal(ordinal: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.ordinal() == ordinal)
    }

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            LockupPeriod::Days7 => "Days_7",
            LockupPeriod::Days21 => "Days_21",
            LockupPeriod::Months1 => "Months_1",
            LockupPeriod::Months3 => "Months_3",
        }
    }
}

impl FromStr for LockupPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.name() == s)
            .ok_or_else(|| Error::validation(format!("unknown lockup period '{}'", s)))
    }
}

impl fmt::Display for LockupPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denom_validation() {
        assert!(Denom::new("ABC").is_ok());
        assert!(Denom::new("ibc/BE1BB42D4BE3C30D").is_ok());
        assert!(Denom::new("uqsr").is_ok());
        assert!(Denom::new("AB").is_err());
        assert!(Denom::new("1ABC").is_err());
        assert!(Denom::new("AB C").is_err());
    }

    #[test]
    fn test_identifier_rejects_separator() {
        assert!(Depositor::new("alice").is_ok());
        assert!(Depositor::new("").is_err());
        assert!(Depositor::new("ali\0ce").is_err());
        assert!(Vault::new("x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_deserialize_validates_identifiers() {
        let denom: Denom = serde_json::from_str("\"uatom\"").unwrap();
        assert_eq!(denom.as_str(), "uatom");
        assert_eq!(serde_json::to_string(&denom).unwrap(), "\"uatom\"");

        assert!(serde_json::from_str::<Denom>("\"\"").is_err());
        assert!(serde_json::from_str::<Denom>("\"a b\\u0000\"").is_err());
        assert!(serde_json::from_str::<Depositor>("\"ali\\u0000ce\"").is_err());

        let coin: std::result::Result<Coin, _> =
            serde_json::from_str(r#"{"denom":"","amount":5}"#);
        assert!(coin.is_err());

        // bincode goes through the same check
        let bytes = bincode::serialize("a b").unwrap();
        assert!(bincode::deserialize::<Denom>(&bytes).is_err());
    }

    #[test]
    fn test_coin_arithmetic() {
        let a = Coin::parse("QSR", 10).unwrap();
        let b = Coin::parse("QSR", 4).unwrap();
        assert_eq!(a.checked_add(&b).unwrap().amount, 14);
        assert_eq!(a.checked_sub(&b).unwrap().amount, 6);
        assert!(matches!(
            b.checked_sub(&a),
            Err(Error::NegativeBalance { requested: 10, available: 4, .. })
        ));

        let other = Coin::parse("ABC", 1).unwrap();
        assert!(matches!(a.checked_add(&other), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_lockup_period_mapping() {
        assert_eq!(LockupPeriod::Days7.days(), 7);
        assert_eq!(LockupPeriod::Months3.days(), 90);
        assert_eq!(LockupPeriod::from_ordinal(2), Some(LockupPeriod::Days21));
        assert_eq!(LockupPeriod::from_ordinal(0), None);
        assert_eq!("Months_1".parse::<LockupPeriod>().unwrap(), LockupPeriod::Months1);
        assert!("Days_8".parse::<LockupPeriod>().is_err());
    }
}
