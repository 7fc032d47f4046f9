//! Persisted entities and their invariants. See `spec.md` §3.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// One row per chain account the gateway controls.
///
/// `last_operation` and `last_parsed_block` never decrease (`spec.md` §3
/// invariant); the only mutation path is [`crate::storage::DbWrite::advance_wallet_cursor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayWallet {
    /// Unique key: the chain account name this wallet tracks.
    pub account_name: String,
    /// Highest operation sequence number already ingested.
    pub last_operation: i64,
    /// Highest block number already scanned.
    pub last_parsed_block: i64,
}

/// `order_type` discriminant for an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum OrderType {
    /// Not part of a booker order (reserved for future use; never produced
    /// by the current validator, kept for wire compatibility).
    Trash,
    /// Inbound leg: chain transfer from the gateway account to a user.
    Deposit,
    /// Outbound leg: chain transfer from a user to the gateway account.
    Withdrawal,
}

/// `status` discriminant for an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum TxStatus {
    /// Terminal: `error != NoError`.
    Error,
    /// Planned outbound transfer not yet broadcast; `tx_hash` is null.
    Wait,
    /// Observed on chain, not yet past [`crate::REQUIRED_CONFIRMATIONS`].
    ReceivedNotConfirmed,
    /// Observed on chain and confirmed.
    ReceivedAndConfirmed,
}

/// `error` discriminant for an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
pub enum TxError {
    /// No error; the default value.
    #[default]
    NoError,
    /// The validator or chain adapter hit an unexpected failure.
    UnknownError,
    /// `asset` did not match the configured gateway asset.
    BadAsset,
    /// `amount` was below the configured minimum for this direction.
    LessMin,
    /// `amount` was above the configured maximum for this direction.
    GreaterMax,
    /// A withdrawal transfer carried no memo.
    NoMemo,
    /// A withdrawal transfer's memo failed the `ASSET:DEST` mask.
    FloodMemo,
    /// `tx-hash-from-op` matched more than one transaction in the block.
    OpCollision,
    /// `tx-hash-from-op` matched no transaction in the block.
    TxHashNotFound,
}

/// One row per observed or planned chain transfer (one leg of an order).
///
/// See `spec.md` §3 for the full invariant list; the most important ones are
/// repeated here:
/// - `(asset, tx_hash)` is unique when both are present.
/// - `status = ReceivedAndConfirmed ⇒ confirmations >= REQUIRED_CONFIRMATIONS`.
/// - `error != NoError ⇒ status = Error`.
/// - `status = Wait ⇒ tx_hash` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Database surrogate primary key. `None` before the row is persisted.
    pub id: Option<i64>,
    /// Chain sequence number, unique when not null.
    pub op_id: Option<i64>,
    /// Links this operation to a booker order, unique when not null.
    pub order_id: Option<Uuid>,
    /// Which leg of an order this operation represents.
    pub order_type: OrderType,
    /// Asset code, e.g. `"FINTEHTEST.ETH"`.
    pub asset: String,
    /// Source account name.
    pub from_account: String,
    /// Destination account name.
    pub to_account: String,
    /// Transfer amount, fixed-point decimal (78 digits, 36 fractional).
    pub amount: BigDecimal,
    /// Current lifecycle status.
    pub status: TxStatus,
    /// Current error classification; `NoError` unless `status = Error`.
    pub error: TxError,
    /// Confirmations observed so far.
    pub confirmations: i64,
    /// Block height the operation was included in.
    pub block_num: i64,
    /// Chain transaction hash, once broadcast/observed.
    pub tx_hash: Option<String>,
    /// Memo attached to the transfer, if any.
    pub memo: Option<String>,
    /// Timestamp the underlying transaction was created/observed.
    pub tx_created_at: Option<DateTime<Utc>>,
    /// Chain-side expiration of the transaction, if applicable.
    pub tx_expiration: Option<DateTime<Utc>>,
}

impl Operation {
    /// Construct a planned outbound transfer (`status = Wait`), as created by
    /// the booker-server handler for `init_new_tx` (`spec.md` §8 scenario S5).
    pub fn new_planned_withdrawal(
        order_id: Uuid,
        asset: String,
        from_account: String,
        to_account: String,
        amount: BigDecimal,
    ) -> Self {
        Self {
            id: None,
            op_id: None,
            order_id: Some(order_id),
            order_type: OrderType::Deposit,
            asset,
            from_account,
            to_account,
            amount,
            status: TxStatus::Wait,
            error: TxError::NoError,
            confirmations: 0,
            block_num: 0,
            tx_hash: None,
            memo: None,
            tx_created_at: None,
            tx_expiration: None,
        }
    }

    /// True iff this row's error classification forces `status = Error`
    /// (`spec.md` §3 invariant).
    pub fn is_errored(&self) -> bool {
        !matches!(self.error, TxError::NoError)
    }
}
