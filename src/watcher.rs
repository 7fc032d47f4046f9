//! The Watcher (`spec.md` §4.D): the sole writer of new `Operation` rows
//! created from chain events.
//!
//! `synchronize` and the main loop are ported from `synchronize()` and
//! `watch_account_history()` in the original `src/app.py`, restructured
//! into an explicit task struct in the teacher crate's idiom
//! (`BlockObserver` in `src/block_observer.rs`): a `run` method that
//! `tokio::select!`s between its work and the shared shutdown signal.

use tracing::{info, instrument, warn};

use crate::chain::ChainAdapter;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::storage::{Operation, OrderType, TxStatus};
use crate::validator::Validator;

/// Watches chain history for the configured gateway account and persists
/// validated operations.
pub struct Watcher<Ctx> {
    context: Ctx,
}

impl<Ctx: Context> Watcher<Ctx> {
    /// Build a watcher bound to `context`.
    pub fn new(context: Ctx) -> Self {
        Self { context }
    }

    /// Ensure a [`crate::storage::GatewayWallet`] row exists for the
    /// configured account, seeding its cursors from the chain if this is
    /// the first run. Operations and blocks prior to first run are never
    /// processed (`spec.md` §9).
    #[instrument(skip(self))]
    pub async fn synchronize(&self) -> Result<()> {
        let settings = self.context.get_settings();
        let chain = self.context.get_chain_adapter();
        let storage = self.context.get_storage();

        let account = &settings.gateway.account;
        let seed_last_operation = chain.get_last_op_num(account).await?;
        let seed_last_parsed_block = chain.get_current_block_num().await?;

        let (wallet, created) = storage
            .ensure_wallet(account, seed_last_operation, seed_last_parsed_block)
            .await?;
        if created {
            info!(account, last_operation = wallet.last_operation, "gateway wallet initialized");
        }
        Ok(())
    }

    /// Run one full sweep of the main loop described in `spec.md` §4.D:
    /// fetch new history since the persisted cursor, validate and persist
    /// each operation in order, advancing the cursor as it goes. Returns
    /// once `tail_history` yields a batch (it suspends internally while
    /// there is nothing new).
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<()> {
        let settings = self.context.get_settings();
        let chain = self.context.get_chain_adapter();
        let storage = self.context.get_storage();
        let account = &settings.gateway.account;

        let wallet = storage
            .get_wallet(account)
            .await?
            .ok_or_else(|| Error::WalletNotFound(account.clone()))?;

        let ops = chain.tail_history(account, wallet.last_operation).await?;
        let validator = Validator::new(chain.as_ref(), &settings.gateway);

        for raw_op in &ops {
            let decided = validator.validate(raw_op).await?;
            match decided {
                None => {
                    storage.advance_last_operation(account, raw_op.seq_num).await?;
                }
                Some(op) => {
                    self.apply(&op, &storage).await?;
                    storage.advance_last_operation(account, raw_op.seq_num).await?;
                }
            }
        }

        Ok(())
    }

    async fn apply<S: crate::storage::DbWrite>(&self, op: &Operation, storage: &S) -> Result<()> {
        match op.order_type {
            OrderType::Withdrawal | OrderType::Trash => {
                storage.insert_operation(op.clone()).await?;
                crate::metrics::operation_ingested();
            }
            OrderType::Deposit => {
                let tx_hash = op.tx_hash.as_deref().unwrap_or("Unknown");
                match storage.get_operation_by_tx_hash(&op.asset, tx_hash).await? {
                    None => {
                        let err = Error::UnmatchedDeposit(tx_hash.to_string());
                        warn!(error = %err, "deposit observed with no matching planned withdrawal row, ignoring");
                    }
                    Some(existing) => {
                        debug_assert!(existing.op_id.is_none());
                        debug_assert_eq!(existing.block_num, op.block_num);
                        let id = existing.id.expect("persisted row always has an id");
                        storage
                            .complete_deposit_match(id, op.op_id, op.memo.clone(), op.tx_created_at)
                            .await?;
                        if op.is_errored() {
                            storage.mark_errored(id, op.error).await?;
                        }
                        crate::metrics::operation_ingested();
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::FakeChainAdapter;
    use crate::chain::{ChainBlock, ChainTransaction, RawOperation};
    use crate::config::{BookerSettings, DatabaseSettings, GatewaySettings, HttpSettings, Settings, ZmqSettings};
    use crate::context::GatewayContext;
    use crate::storage::memory::Store;
    use bigdecimal::BigDecimal;

    fn test_settings() -> Settings {
        Settings {
            database: DatabaseSettings {
                driver: "postgres".to_string(),
                host: "localhost".to_string(),
                port: 5432,
                username: "u".to_string(),
                password: "p".to_string(),
                name: "gw".to_string(),
            },
            http: HttpSettings { host: "0.0.0.0".to_string(), port: 8080 },
            booker: BookerSettings { host: "localhost".to_string(), port: 9001 },
            zmq: ZmqSettings { proto: "tcp".to_string(), host: "0.0.0.0".to_string(), port: 5555 },
            gateway: GatewaySettings {
                core_asset: "TEST".to_string(),
                gateway_prefix: "FINTEHTEST".to_string(),
                gateway_distribute_asset: "ETH".to_string(),
                account: "gateway".to_string(),
                nodes: vec![],
                min_deposit: "0.1".parse().unwrap(),
                min_withdrawal: "0.1".parse().unwrap(),
                max_deposit: "1000".parse().unwrap(),
                max_withdrawal: "1000".parse().unwrap(),
            },
        }
    }

    fn raw_op(seq_num: i64, from: &str, to: &str, amount: &str) -> RawOperation {
        RawOperation {
            seq_num,
            op_type: 0,
            from: from.to_string(),
            to: to.to_string(),
            amount: amount.parse::<BigDecimal>().unwrap(),
            asset: "FINTEHTEST.ETH".to_string(),
            memo: None,
            block_num: 100,
        }
    }

    #[tokio::test]
    async fn synchronize_skips_history_before_first_run() {
        let chain = FakeChainAdapter::new();
        chain.set_current_block(500);
        chain.push_operation(raw_op(42, "gateway", "user", "1"));

        let context = GatewayContext::new(Store::new(), chain, test_settings());
        let watcher = Watcher::new(context.clone());
        watcher.synchronize().await.unwrap();

        let wallet = context.get_storage().get_wallet("gateway").await.unwrap().unwrap();
        assert_eq!(wallet.last_operation, 42);
        assert_eq!(wallet.last_parsed_block, 500);

        // Re-running synchronize must not reset the cursor even if chain state changes.
        context.get_chain_adapter().set_current_block(999);
        watcher.synchronize().await.unwrap();
        let wallet = context.get_storage().get_wallet("gateway").await.unwrap().unwrap();
        assert_eq!(wallet.last_parsed_block, 500);
    }

    #[tokio::test]
    async fn tick_inserts_withdrawal_and_advances_cursor() {
        let chain = FakeChainAdapter::new();
        let op = raw_op(1, "user", "gateway", "0.1");
        chain.push_block(ChainBlock {
            block_num: op.block_num,
            transactions: vec![ChainTransaction { tx_id: "tx-1".to_string(), operations: vec![op.clone()] }],
        });
        chain.push_operation(op.clone());

        let context = GatewayContext::new(Store::new(), chain, test_settings());
        context.get_storage().ensure_wallet("gateway", 0, 0).await.unwrap();

        let watcher = Watcher::new(context.clone());
        watcher.tick().await.unwrap();

        let wallet = context.get_storage().get_wallet("gateway").await.unwrap().unwrap();
        assert_eq!(wallet.last_operation, 1);

        let persisted = context
            .get_storage()
            .get_operation_by_op_id(1)
            .await
            .unwrap()
            .expect("withdrawal row inserted");
        assert_eq!(persisted.order_type, OrderType::Withdrawal);
    }

    #[tokio::test]
    async fn tick_propagates_node_unreachable_without_advancing_cursor() {
        use crate::chain::MockChainAdapter;

        let mut chain = MockChainAdapter::new();
        chain
            .expect_tail_history()
            .returning(|_, _| Err(Error::NodeUnreachable(vec!["node1".to_string()])));

        let context = GatewayContext::new(Store::new(), chain, test_settings());
        context.get_storage().ensure_wallet("gateway", 0, 0).await.unwrap();

        let watcher = Watcher::new(context.clone());
        let result = watcher.tick().await;
        assert!(matches!(result, Err(Error::NodeUnreachable(_))));

        let wallet = context.get_storage().get_wallet("gateway").await.unwrap().unwrap();
        assert_eq!(wallet.last_operation, 0);
    }

    #[tokio::test]
    async fn tick_matches_deposit_to_planned_withdrawal_row() {
        let chain = FakeChainAdapter::new();
        let op = raw_op(1, "gateway", "user", "1.0");
        chain.push_block(ChainBlock {
            block_num: op.block_num,
            transactions: vec![ChainTransaction { tx_id: "tx-1".to_string(), operations: vec![op.clone()] }],
        });
        chain.push_operation(op.clone());

        let context = GatewayContext::new(Store::new(), chain, test_settings());
        context.get_storage().ensure_wallet("gateway", 0, 0).await.unwrap();

        let planned = Operation::new_planned_withdrawal(
            uuid::Uuid::new_v4(),
            "FINTEHTEST.ETH".to_string(),
            "gateway".to_string(),
            "user".to_string(),
            "1.0".parse().unwrap(),
        );
        let planned = context.get_storage().insert_planned_withdrawal(planned).await.unwrap();
        context
            .get_storage()
            .attach_broadcast(planned.id.unwrap(), "tx-1".to_string(), op.block_num, "1.0".parse().unwrap(), None)
            .await
            .unwrap();

        let watcher = Watcher::new(context.clone());
        watcher.tick().await.unwrap();

        let persisted = context
            .get_storage()
            .get_operation_by_tx_hash("FINTEHTEST.ETH", "tx-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.status, TxStatus::ReceivedNotConfirmed);
        assert_eq!(persisted.op_id, Some(1));
        assert!(persisted.memo.is_none());
        assert!(persisted.tx_created_at.is_some());
    }

    #[tokio::test]
    async fn tick_ignores_deposit_with_no_planned_match() {
        let chain = FakeChainAdapter::new();
        let op = raw_op(1, "gateway", "user", "1.0");
        chain.push_block(ChainBlock {
            block_num: op.block_num,
            transactions: vec![ChainTransaction { tx_id: "tx-1".to_string(), operations: vec![op.clone()] }],
        });
        chain.push_operation(op.clone());

        let context = GatewayContext::new(Store::new(), chain, test_settings());
        context.get_storage().ensure_wallet("gateway", 0, 0).await.unwrap();

        let watcher = Watcher::new(context.clone());
        watcher.tick().await.unwrap();

        assert!(context
            .get_storage()
            .get_operation_by_tx_hash("FINTEHTEST.ETH", "tx-1")
            .await
            .unwrap()
            .is_none());
        let wallet = context.get_storage().get_wallet("gateway").await.unwrap().unwrap();
        assert_eq!(wallet.last_operation, 1);
    }
}
