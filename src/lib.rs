#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

pub mod booker;
pub mod broadcaster;
pub mod chain;
pub mod config;
pub mod confirmer;
pub mod context;
pub mod crypto;
pub mod error;
pub mod health;
pub mod keys;
pub mod metrics;
pub mod storage;
pub mod supervisor;
#[cfg(feature = "testing")]
pub mod testing;
pub mod validator;
pub mod watcher;

/// Package version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of block-confirmations a chain operation needs before its order
/// leg is considered final. See `spec.md` §3 and §4.E.
pub const REQUIRED_CONFIRMATIONS: i64 = 5;
