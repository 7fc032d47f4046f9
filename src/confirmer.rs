//! The Confirmer (`spec.md` §4.E): periodically advances confirmation
//! counts on operations already observed on chain.
//!
//! Ported from `confirm_op()`/`watch_unconfirmed_operations()` in the
//! original `src/app.py`.

use tracing::{info, instrument};

use crate::chain::ChainAdapter;
use crate::context::Context;
use crate::error::Result;
use crate::storage::{DbWrite, Operation, TxStatus};

/// Advances confirmation counts for operations with
/// `status = ReceivedNotConfirmed`, pushing updates to the booker when
/// confirmations change.
pub struct Confirmer<Ctx> {
    context: Ctx,
}

impl<Ctx: Context> Confirmer<Ctx> {
    /// Build a confirmer bound to `context`.
    pub fn new(context: Ctx) -> Self {
        Self { context }
    }

    /// Run one sweep. Returns the operations whose confirmation state
    /// changed, so the caller (`notify_booker`, `spec.md` §5) can push
    /// updates; if the push fails, the persisted change stands and is
    /// retried on the next sweep (`spec.md` §4.E).
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<Vec<Operation>> {
        let chain = self.context.get_chain_adapter();
        let storage = self.context.get_storage();

        let height = chain.get_current_block_num().await?;
        let pending = storage.get_unconfirmed_operations().await?;

        let mut changed = Vec::new();
        for op in pending {
            if let Some(updated) = confirm_one(storage.as_ref(), &op, height).await? {
                changed.push(updated);
            }
        }
        if !changed.is_empty() {
            info!(count = changed.len(), height, "confirmations advanced");
        }
        Ok(changed)
    }
}

async fn confirm_one<S: DbWrite>(storage: &S, op: &Operation, height: i64) -> Result<Option<Operation>> {
    if height <= op.block_num {
        return Ok(None);
    }
    let confirmations = height - op.block_num;
    let status = if confirmations >= crate::REQUIRED_CONFIRMATIONS {
        TxStatus::ReceivedAndConfirmed
    } else {
        TxStatus::ReceivedNotConfirmed
    };

    let id = op.id.expect("persisted row always has an id");
    let changed = storage.update_confirmations(id, confirmations, status).await?;
    if !changed {
        return Ok(None);
    }
    crate::metrics::confirmation_advanced();
    Ok(Some(Operation { confirmations, status, ..op.clone() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::Store;
    use crate::storage::{DbRead, OrderType, TxError};

    fn unconfirmed_op(block_num: i64) -> Operation {
        Operation {
            id: None,
            op_id: Some(1),
            order_id: None,
            order_type: OrderType::Deposit,
            asset: "FINTEHTEST.ETH".to_string(),
            from_account: "gateway".to_string(),
            to_account: "user".to_string(),
            amount: "1".parse().unwrap(),
            status: TxStatus::ReceivedNotConfirmed,
            error: TxError::NoError,
            confirmations: 0,
            block_num,
            tx_hash: Some("tx-1".to_string()),
            memo: None,
            tx_created_at: None,
            tx_expiration: None,
        }
    }

    #[tokio::test]
    async fn no_change_when_height_not_past_block() {
        let store = Store::new();
        let op = store.insert_operation(unconfirmed_op(100)).await.unwrap();
        let result = confirm_one(&store, &op, 100).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn advances_confirmations_below_threshold() {
        let store = Store::new();
        let op = store.insert_operation(unconfirmed_op(100)).await.unwrap();
        let result = confirm_one(&store, &op, 103).await.unwrap().unwrap();
        assert_eq!(result.confirmations, 3);
        assert_eq!(result.status, TxStatus::ReceivedNotConfirmed);
    }

    #[tokio::test]
    async fn crosses_threshold_to_confirmed() {
        let store = Store::new();
        let op = store.insert_operation(unconfirmed_op(100)).await.unwrap();
        let result = confirm_one(&store, &op, 105).await.unwrap().unwrap();
        assert_eq!(result.confirmations, 5);
        assert_eq!(result.status, TxStatus::ReceivedAndConfirmed);
    }
}
