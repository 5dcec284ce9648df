//! Custody Ledger
//!
//! Funds-accounting engine for a multi-asset custody system: deposits,
//! their maturation through fixed lockup periods, withdrawable balances and
//! reward claims.
//!
//! # Architecture
//!
//! - **Composite keys**: every ledger owns a one-byte prefix region of one
//!   ordered key space, keys encoded by a per-namespace schema
//! - **Typed bindings**: `Get/Set/Add/Sub/Iterate` over `Coin` or `CoinSet` values
//! - **Overlay transactions**: an operation commits all of its writes in one batch or none
//! - **Maturity sweep**: once per epoch day, matured deposits become expected withdrawable
//!
//! # Invariants
//!
//! - Σ DenomDeposit[d, *] == TotalDeposit[d]
//! - No balance ever goes negative; zero balances are deleted
//! - EpochLockupDeposit rows are never deleted by normal operation
//! - Each epoch day is swept exactly once through [`CustodyLedger::begin_epoch`]

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod bindings;
pub mod codec;
pub mod coins;
pub mod config;
pub mod error;
pub mod external;
pub mod keys;
pub mod ledger;
pub mod metrics;
pub mod policy;
pub mod reporting;
pub mod storage;
pub mod sweep;
pub mod types;

// Re-exports
pub use bindings::{ActualWithdrawable, ExpectedWithdrawable, Ledger, Ledgers};
pub use coins::CoinSet;
pub use config::Config;
pub use error::{Error, ErrorClass, Result};
pub use external::{
    EpochClock, FixedPriceOracle, ManualClock, ParameterStore, PriceOracle, RecordingTransfers,
    StaticParams, TransferService,
};
pub use ledger::CustodyLedger;
pub use reporting::{GenesisState, LedgerSummary};
pub use storage::{KvStore, MemStore, RocksStore, Transaction};
pub use sweep::{CatchUp, MaturitySweep, SweepReport};
pub use types::{Amount, Coin, Denom, Depositor, EpochDay, LockupPeriod, Vault};
