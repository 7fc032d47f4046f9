//! The Broadcaster (`spec.md` §4.F): the sole creator of planned outbound
//! `WAIT` rows, and the task that turns them into broadcast transactions.
//!
//! Ported from the withdrawal-broadcast half of the original design; the
//! original source does not isolate this into its own coroutine as cleanly
//! as the Watcher/Confirmer, so the task shape here follows the teacher
//! crate's single-purpose event-loop struct convention instead.

use tracing::{instrument, warn};

use crate::chain::ChainAdapter;
use crate::context::Context;
use crate::error::Result;
use crate::storage::{DbWrite, Operation, TxStatus};

/// Broadcasts planned withdrawal rows (`order_id != null, tx_hash = null,
/// status = WAIT`) to the chain.
pub struct Broadcaster<Ctx> {
    context: Ctx,
}

impl<Ctx: Context> Broadcaster<Ctx> {
    /// Build a broadcaster bound to `context`.
    pub fn new(context: Ctx) -> Self {
        Self { context }
    }

    /// Create a new planned withdrawal row (`status = WAIT`), as invoked by
    /// the booker-server `init_new_tx` handler (`spec.md` §8 scenario S5).
    /// Broadcasting itself happens on the next [`Broadcaster::tick`].
    #[instrument(skip(self, op))]
    pub async fn plan_withdrawal(&self, op: Operation) -> Result<Operation> {
        let storage = self.context.get_storage();
        storage.insert_planned_withdrawal(op).await
    }

    /// One sweep: broadcast every row still waiting. Rows that fail to
    /// broadcast are left in `WAIT` and retried on the next sweep
    /// (`spec.md` §4.F: "repeated failures do not advance state
    /// automatically").
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<Vec<Operation>> {
        let chain = self.context.get_chain_adapter();
        let storage = self.context.get_storage();

        let waiting = storage.get_waiting_operations().await?;
        let mut broadcast = Vec::new();
        for op in waiting {
            debug_assert_eq!(op.status, TxStatus::Wait);
            debug_assert!(op.tx_hash.is_none());
            let tx = chain.transfer(&op.to_account, &op.asset, op.amount.clone(), op.memo.clone());
            match chain.broadcast(tx).await {
                Ok(result) => {
                    let id = op.id.expect("persisted row always has an id");
                    let updated = storage
                        .attach_broadcast(
                            id,
                            result.id,
                            result.block_num,
                            op.amount.clone(),
                            result.expiration,
                        )
                        .await?;
                    broadcast.push(updated);
                }
                Err(err) => {
                    crate::metrics::broadcast_failed();
                    warn!(error = %err, op_id = ?op.id, "broadcast failed, row stays WAIT for retry");
                }
            }
        }
        Ok(broadcast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::FakeChainAdapter;
    use crate::config::{BookerSettings, DatabaseSettings, GatewaySettings, HttpSettings, Settings, ZmqSettings};
    use crate::context::GatewayContext;
    use crate::storage::memory::Store;
    use crate::storage::{DbRead, OrderType, TxError};
    use uuid::Uuid;

    fn test_settings() -> Settings {
        Settings {
            database: DatabaseSettings { driver: "postgres".to_string(), host: "localhost".to_string(), port: 5432, username: "u".to_string(), password: "p".to_string(), name: "gw".to_string() },
            http: HttpSettings { host: "0.0.0.0".to_string(), port: 8080 },
            booker: BookerSettings { host: "localhost".to_string(), port: 9001 },
            zmq: ZmqSettings { proto: "tcp".to_string(), host: "0.0.0.0".to_string(), port: 5555 },
            gateway: GatewaySettings {
                core_asset: "TEST".to_string(), gateway_prefix: "FINTEHTEST".to_string(), gateway_distribute_asset: "ETH".to_string(),
                account: "gateway".to_string(), nodes: vec![],
                min_deposit: "0.1".parse().unwrap(), min_withdrawal: "0.1".parse().unwrap(),
                max_deposit: "1000".parse().unwrap(), max_withdrawal: "1000".parse().unwrap(),
            },
        }
    }

    fn planned_op() -> Operation {
        Operation {
            id: None, op_id: None, order_id: Some(Uuid::new_v4()), order_type: OrderType::Deposit,
            asset: "FINTEHTEST.ETH".to_string(), from_account: "gateway".to_string(), to_account: "user".to_string(),
            amount: "1.0".parse().unwrap(), status: TxStatus::Wait, error: TxError::NoError,
            confirmations: 0, block_num: 0, tx_hash: None, memo: None, tx_created_at: None, tx_expiration: None,
        }
    }

    #[tokio::test]
    async fn successful_broadcast_attaches_tx_hash_and_clears_wait() {
        let chain = FakeChainAdapter::new();
        chain.set_next_broadcast_block(42);
        let context = GatewayContext::new(Store::new(), chain, test_settings());
        let broadcaster = Broadcaster::new(context.clone());

        broadcaster.plan_withdrawal(planned_op()).await.unwrap();
        let broadcast = broadcaster.tick().await.unwrap();

        assert_eq!(broadcast.len(), 1);
        assert_eq!(broadcast[0].status, TxStatus::ReceivedNotConfirmed);
        assert_eq!(broadcast[0].block_num, 42);
        assert!(broadcast[0].tx_hash.is_some());
    }

    #[tokio::test]
    async fn failed_broadcast_leaves_row_in_wait() {
        struct AlwaysFails;
        #[async_trait::async_trait]
        impl ChainAdapter for AlwaysFails {
            async fn connect(&self, _: &[String], _: &str) -> Result<()> { Ok(()) }
            async fn get_current_block_num(&self) -> Result<i64> { Ok(0) }
            async fn get_last_op_num(&self, _: &str) -> Result<i64> { Ok(0) }
            async fn tail_history(&self, _: &str, _: i64) -> Result<Vec<crate::chain::RawOperation>> { Ok(vec![]) }
            async fn get_block(&self, height: i64) -> Result<crate::chain::ChainBlock> {
                Err(crate::error::Error::BlockMissing(height as u64))
            }
            async fn validate_address(&self, _: &str) -> Result<bool> { Ok(true) }
            async fn broadcast(&self, _: crate::chain::UnsignedTransaction) -> Result<crate::chain::BroadcastResult> {
                Err(crate::error::Error::NodeUnreachable(vec![]))
            }
        }

        let context = GatewayContext::new(Store::new(), AlwaysFails, test_settings());
        let broadcaster = Broadcaster::new(context.clone());
        let planned = broadcaster.plan_withdrawal(planned_op()).await.unwrap();
        let broadcast = broadcaster.tick().await.unwrap();

        assert!(broadcast.is_empty());
        let stored = context.get_storage().get_operation_by_order_id(planned.order_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.status, TxStatus::Wait);
        assert!(stored.tx_hash.is_none());
        assert!(stored.tx_expiration.is_none());
    }
}
