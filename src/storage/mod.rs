//! Persistence layer: the [`DbRead`]/[`DbWrite`] traits and their two
//! implementations (`postgres`, backed by sqlx, and `memory`, an in-process
//! double used in tests).
//!
//! The teacher crate splits storage similarly (`signer::storage::{DbRead,
//! DbWrite, postgres, in_memory}`); the split here keeps that shape and adds
//! the gateway-specific row types.

pub mod memory;
pub mod model;
pub mod postgres;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

pub use model::{GatewayWallet, Operation, OrderType, TxError, TxStatus};

use crate::error::Result;

/// Read-side storage operations. Implemented by both the real store and the
/// in-memory test double so that component tests never depend on Postgres.
#[async_trait]
pub trait DbRead: Send + Sync {
    /// Fetch the wallet cursor row for `account_name`, if it has been
    /// synchronized before.
    async fn get_wallet(&self, account_name: &str) -> Result<Option<GatewayWallet>>;

    /// Fetch an operation by its chain `op_id`.
    async fn get_operation_by_op_id(&self, op_id: i64) -> Result<Option<Operation>>;

    /// Fetch an operation by its booker `order_id`.
    async fn get_operation_by_order_id(&self, order_id: uuid::Uuid) -> Result<Option<Operation>>;

    /// Fetch an operation by `(asset, tx_hash)`, used by the validator's
    /// duplicate-broadcast check and the confirmer's lookup.
    async fn get_operation_by_tx_hash(&self, asset: &str, tx_hash: &str)
        -> Result<Option<Operation>>;

    /// All operations with `status = ReceivedNotConfirmed`, in ascending
    /// `block_num` order, as consumed by the Confirmer main loop.
    async fn get_unconfirmed_operations(&self) -> Result<Vec<Operation>>;

    /// All planned withdrawals (`status = Wait`), in insertion order, as
    /// consumed by the Broadcaster main loop.
    async fn get_waiting_operations(&self) -> Result<Vec<Operation>>;
}

/// Write-side storage operations. Every mutation that must be atomic with a
/// read is expressed as a single method here so the real implementation can
/// wrap it in one SERIALIZABLE transaction (`spec.md` §7).
#[async_trait]
pub trait DbWrite: DbRead {
    /// Insert the wallet row for `account_name` if absent, seeding its
    /// cursors from `seed_last_operation`/`seed_last_parsed_block`. Returns
    /// the row as it exists after the call, and whether it was newly
    /// created. Mirrors `synchronize()` in the original app wiring: chain
    /// history prior to the first run is never processed.
    async fn ensure_wallet(
        &self,
        account_name: &str,
        seed_last_operation: i64,
        seed_last_parsed_block: i64,
    ) -> Result<(GatewayWallet, bool)>;

    /// Advance `last_operation` for `account_name`. Rejects (returns
    /// `Ok(false)`) if `new_value` is not strictly greater than the current
    /// cursor, preserving the monotonic invariant.
    async fn advance_last_operation(&self, account_name: &str, new_value: i64) -> Result<bool>;

    /// Advance `last_parsed_block` for `account_name`, same monotonic rule.
    async fn advance_last_parsed_block(&self, account_name: &str, new_value: i64) -> Result<bool>;

    /// Insert a newly validated operation. Fails with
    /// [`crate::error::Error::Storage`] wrapping a unique-violation if
    /// `op_id`, `order_id`, or `(asset, tx_hash)` collides with an existing
    /// row.
    async fn insert_operation(&self, op: Operation) -> Result<Operation>;

    /// Insert a planned withdrawal row (`status = Wait`) created by the
    /// booker-server `init_new_tx` handler.
    async fn insert_planned_withdrawal(&self, op: Operation) -> Result<Operation>;

    /// Update confirmations and, if the threshold is crossed, status for an
    /// existing operation. `change` mirrors the original's `confirm_op`
    /// return value: callers skip the booker push when `false`.
    async fn update_confirmations(
        &self,
        id: i64,
        confirmations: i64,
        status: TxStatus,
    ) -> Result<bool>;

    /// Attach a broadcast `tx_hash`/`block_num`/`tx_expiration` to a
    /// previously planned (`Wait`) withdrawal row, as performed by the
    /// Broadcaster after a successful chain submission.
    async fn attach_broadcast(
        &self,
        id: i64,
        tx_hash: String,
        block_num: i64,
        amount: BigDecimal,
        tx_expiration: Option<DateTime<Utc>>,
    ) -> Result<Operation>;

    /// Complete a deposit match: attach the chain `op_id`/`memo`/
    /// `tx_created_at` observed on this leg to a previously planned row and
    /// advance it to `ReceivedNotConfirmed` with `confirmations = 0`
    /// (`spec.md` §4.D). Kept separate from [`DbWrite::update_confirmations`]
    /// so the Confirmer's routine ticks can never clobber these fields back
    /// to null.
    async fn complete_deposit_match(
        &self,
        id: i64,
        op_id: Option<i64>,
        memo: Option<String>,
        tx_created_at: Option<DateTime<Utc>>,
    ) -> Result<Operation>;

    /// Mark an operation as errored, setting `status = Error` and the given
    /// `error` classification.
    async fn mark_errored(&self, id: i64, error: TxError) -> Result<Operation>;
}
