//! The Chain Adapter boundary (`spec.md` §4.A).
//!
//! The concrete blockchain SDK is a collaborator concern (`spec.md` §1
//! Non-goals); this module defines the trait the rest of the gateway
//! programs against, plus a `fake` double used by every other component's
//! tests. Shaped after the teacher crate's `BitcoinInteract`/`StacksInteract`
//! traits (`src/block_observer.rs`), which play the same "swap the chain
//! client behind a trait" role for a Bitcoin/Stacks signer.

pub mod fake;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// A single native-transfer operation as emitted by chain history, before
/// validation. Field names follow the wire shape in `spec.md` §4.C:
/// `{id: "x.y.seq", op: [type, payload], block_num}`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOperation {
    /// Chain-assigned operation id, unique per account history.
    pub seq_num: i64,
    /// Operation type discriminant; only `0` (native transfer) is processed.
    pub op_type: i64,
    /// Source account name.
    pub from: String,
    /// Destination account name.
    pub to: String,
    /// Transfer amount.
    pub amount: BigDecimal,
    /// Asset code, e.g. `"FINTEHTEST.ETH"`.
    pub asset: String,
    /// Decrypted memo, if the transfer carried one.
    pub memo: Option<String>,
    /// Block the operation was included in.
    pub block_num: i64,
}

/// A chain block as needed by `tx-hash-from-op` (`spec.md` §4.C): enough to
/// enumerate single-operation transactions and recompute their signed ids.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainBlock {
    /// Block height.
    pub block_num: i64,
    /// Transactions included in the block.
    pub transactions: Vec<ChainTransaction>,
}

/// One transaction within a [`ChainBlock`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTransaction {
    /// Signed transaction id, as computed by the chain.
    pub tx_id: String,
    /// The transaction's operations. `tx-hash-from-op` only matches
    /// transactions carrying exactly one.
    pub operations: Vec<RawOperation>,
}

/// Result of a successful [`ChainAdapter::broadcast`].
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastResult {
    /// Broadcast transaction id.
    pub id: String,
    /// Block the transaction landed in.
    pub block_num: i64,
    /// Chain-side expiration timestamp, if the chain uses one.
    pub expiration: Option<DateTime<Utc>>,
}

/// An unbroadcast transaction built by [`ChainAdapter::transfer`],
/// [`ChainAdapter::issue`], or [`ChainAdapter::burn`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    /// Destination account.
    pub to: String,
    /// Asset code.
    pub asset: String,
    /// Amount to move.
    pub amount: BigDecimal,
    /// Optional memo to attach (used for withdrawal-confirmation transfers).
    pub memo: Option<String>,
}

/// The boundary between the gateway core and a concrete blockchain client.
///
/// Every method is a suspension point; the adapter owns its own connection
/// and serializes concurrent calls internally (`spec.md` §5).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Connect to the first reachable node in `nodes`, authenticating the
    /// `default_account` with `keys`. Fails with
    /// [`crate::error::Error::NodeUnreachable`] if none respond.
    async fn connect(&self, nodes: &[String], default_account: &str) -> Result<()>;

    /// Highest irreversible block height.
    async fn get_current_block_num(&self) -> Result<i64>;

    /// Sequence number of `account`'s most recent operation, or `0` if the
    /// account has no history yet.
    async fn get_last_op_num(&self, account: &str) -> Result<i64>;

    /// Operations for `account` with `seq_num > since_op`, oldest first.
    /// Suspends (does not busy-loop) while no new operation exists; callers
    /// drive the polling cadence by awaiting this once per iteration.
    async fn tail_history(&self, account: &str, since_op: i64) -> Result<Vec<RawOperation>>;

    /// Fetch a block and its transactions. Fails with
    /// [`crate::error::Error::BlockMissing`] until the block is produced.
    async fn get_block(&self, height: i64) -> Result<ChainBlock>;

    /// True iff `name` resolves to an existing account.
    async fn validate_address(&self, name: &str) -> Result<bool>;

    /// Build an unbroadcast transfer transaction.
    fn transfer(&self, to: &str, asset: &str, amount: BigDecimal, memo: Option<String>) -> UnsignedTransaction {
        UnsignedTransaction { to: to.to_string(), asset: asset.to_string(), amount, memo }
    }

    /// Build an unbroadcast asset-issue transaction.
    fn issue(&self, to: &str, asset: &str, amount: BigDecimal) -> UnsignedTransaction {
        UnsignedTransaction { to: to.to_string(), asset: asset.to_string(), amount, memo: None }
    }

    /// Build an unbroadcast asset-burn transaction.
    fn burn(&self, asset: &str, amount: BigDecimal) -> UnsignedTransaction {
        UnsignedTransaction { to: String::new(), asset: asset.to_string(), amount, memo: None }
    }

    /// Submit `tx` to the network.
    async fn broadcast(&self, tx: UnsignedTransaction) -> Result<BroadcastResult>;
}
