//! Canonical multi-denom amount collection
//!
//! A [`CoinSet`] is kept sorted ascending by denom with at most one entry per
//! denom and no zero entries. Every mutation re-normalizes, so two equal sets
//! always serialize to identical bytes.

use crate::error::{Error, Result};
use crate::types::{Amount, Coin, Denom};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sorted, denom-unique list of positive coins
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoinSet {
    coins: Vec<Coin>,
}

impl CoinSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary coins, merging duplicates
    pub fn from_coins(coins: impl IntoIterator<Item = Coin>) -> Result<Self> {
        let mut set = Self::new();
        for coin in coins {
            set = set.add(&coin)?;
        }
        Ok(set)
    }

    /// Merge a coin into the set
    pub fn add(&self, coin: &Coin) -> Result<Self> {
        let mut coins = self.coins.clone();
        if coin.is_zero() {
            return Ok(Self { coins });
        }
        match coins.binary_search_by(|c| c.denom.cmp(&coin.denom)) {
            Ok(idx) => coins[idx] = coins[idx].checked_add(coin)?,
            Err(idx) => coins.insert(idx, coin.clone()),
        }
        Ok(Self { coins })
    }

    /// Merge every coin of another set
    pub fn add_all(&self, other: &CoinSet) -> Result<Self> {
        other.iter().try_fold(self.clone(), |acc, coin| acc.add(coin))
    }

    /// Subtract a coin. A missing denom counts as zero; going below zero is
    /// an error and `self` is left untouched.
    pub fn sub(&self, coin: &Coin) -> Result<Self> {
        let mut coins = self.coins.clone();
        match coins.binary_search_by(|c| c.denom.cmp(&coin.denom)) {
            Ok(idx) => {
                let remaining = coins[idx].checked_sub(coin)?;
                if remaining.is_zero() {
                    coins.remove(idx);
                } else {
                    coins[idx] = remaining;
                }
            }
            Err(_) if coin.is_zero() => {}
            Err(_) => {
                return Err(Error::NegativeBalance {
                    denom: coin.denom.to_string(),
                    requested: coin.amount,
                    available: 0,
                })
            }
        }
        Ok(Self { coins })
    }

    /// Subtract every coin of another set
    pub fn sub_all(&self, other: &CoinSet) -> Result<Self> {
        other.iter().try_fold(self.clone(), |acc, coin| acc.sub(coin))
    }

    /// Amount held for `denom` (zero when absent)
    pub fn amount_of(&self, denom: &Denom) -> Amount {
        self.coins
            .binary_search_by(|c| c.denom.cmp(denom))
            .map(|idx| self.coins[idx].amount)
            .unwrap_or(0)
    }

    /// No entries?
    pub fn is_zero(&self) -> bool {
        self.coins.is_empty()
    }

    /// Number of denoms held
    pub fn len(&self) -> usize {
        self.coins.len()
    }

    /// Same as [`CoinSet::is_zero`]
    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    /// Coins in denom order
    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.coins.iter()
    }

    /// Borrow the canonical coin list
    pub fn as_slice(&self) -> &[Coin] {
        &self.coins
    }

    /// True when the list is sorted, deduplicated and free of zero entries.
    /// Decoded values are checked with this before use.
    pub fn is_canonical(&self) -> bool {
        self.coins.iter().all(|c| !c.is_zero())
            && self.coins.windows(2).all(|w| w[0].denom < w[1].denom)
    }
}

impl From<Coin> for CoinSet {
    fn from(coin: Coin) -> Self {
        if coin.is_zero() {
            Self::new()
        } else {
            Self { coins: vec![coin] }
        }
    }
}

impl<'a> IntoIterator for &'a CoinSet {
    type Item = &'a Coin;
    type IntoIter = std::slice::Iter<'a, Coin>;

    fn into_iter(self) -> Self::IntoIter {
        self.coins.iter()
    }
}

impl fmt::Display for CoinSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.coins.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}
