//! In-memory [`ChainAdapter`] double. Scripted by tests to produce specific
//! history/block/broadcast sequences, the same role the teacher crate's
//! `TestHarness` (`src/block_observer.rs`) plays for `BitcoinInteract`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BroadcastResult, ChainAdapter, ChainBlock, RawOperation, UnsignedTransaction};
use crate::error::{Error, Result};

/// Scriptable chain double: history and blocks are pre-seeded, broadcasts
/// are recorded for assertions.
#[derive(Default)]
pub struct FakeChainAdapter {
    current_block: AtomicI64,
    history: Mutex<Vec<RawOperation>>,
    blocks: Mutex<Vec<ChainBlock>>,
    broadcasts: Mutex<Vec<UnsignedTransaction>>,
    next_broadcast_block: AtomicI64,
}

impl FakeChainAdapter {
    /// Construct an adapter with no seeded state.
    pub fn new() -> Self {
        Self {
            current_block: AtomicI64::new(0),
            history: Mutex::new(Vec::new()),
            blocks: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            next_broadcast_block: AtomicI64::new(1),
        }
    }

    /// Set the irreversible height returned by `get_current_block_num`.
    pub fn set_current_block(&self, height: i64) {
        self.current_block.store(height, Ordering::SeqCst);
    }

    /// Append an operation to the scripted account history.
    pub fn push_operation(&self, op: RawOperation) {
        self.history.lock().unwrap().push(op);
    }

    /// Register a block so `get_block` can resolve it.
    pub fn push_block(&self, block: ChainBlock) {
        self.blocks.lock().unwrap().push(block);
    }

    /// Block height subsequent `broadcast` calls will report.
    pub fn set_next_broadcast_block(&self, height: i64) {
        self.next_broadcast_block.store(height, Ordering::SeqCst);
    }

    /// Transactions submitted via `broadcast`, in call order.
    pub fn broadcasts(&self) -> Vec<UnsignedTransaction> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainAdapter for FakeChainAdapter {
    async fn connect(&self, nodes: &[String], _default_account: &str) -> Result<()> {
        if nodes.is_empty() {
            return Err(Error::NodeUnreachable(vec![]));
        }
        Ok(())
    }

    async fn get_current_block_num(&self) -> Result<i64> {
        Ok(self.current_block.load(Ordering::SeqCst))
    }

    async fn get_last_op_num(&self, _account: &str) -> Result<i64> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .map(|op| op.seq_num)
            .max()
            .unwrap_or(0))
    }

    async fn tail_history(&self, _account: &str, since_op: i64) -> Result<Vec<RawOperation>> {
        let mut ops: Vec<RawOperation> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|op| op.seq_num > since_op)
            .cloned()
            .collect();
        ops.sort_by_key(|op| op.seq_num);
        Ok(ops)
    }

    async fn get_block(&self, height: i64) -> Result<ChainBlock> {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.block_num == height)
            .cloned()
            .ok_or_else(|| Error::BlockMissing(height as u64))
    }

    async fn validate_address(&self, name: &str) -> Result<bool> {
        Ok(!name.is_empty())
    }

    async fn broadcast(&self, tx: UnsignedTransaction) -> Result<BroadcastResult> {
        let block_num = self.next_broadcast_block.load(Ordering::SeqCst);
        let id = format!("fake-tx-{}", self.broadcasts.lock().unwrap().len());
        self.broadcasts.lock().unwrap().push(tx);
        Ok(BroadcastResult { id, block_num, expiration: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_fails_with_no_nodes() {
        let adapter = FakeChainAdapter::new();
        assert!(adapter.connect(&[], "gateway").await.is_err());
    }

    #[tokio::test]
    async fn tail_history_respects_cursor_and_order() {
        let adapter = FakeChainAdapter::new();
        adapter.push_operation(op(2));
        adapter.push_operation(op(1));
        adapter.push_operation(op(3));
        let ops = adapter.tail_history("gateway", 1).await.unwrap();
        assert_eq!(ops.iter().map(|o| o.seq_num).collect::<Vec<_>>(), vec![2, 3]);
    }

    fn op(seq_num: i64) -> RawOperation {
        RawOperation {
            seq_num,
            op_type: 0,
            from: "gateway".to_string(),
            to: "user".to_string(),
            amount: "1".parse().unwrap(),
            asset: "FINTEHTEST.ETH".to_string(),
            memo: None,
            block_num: 10,
        }
    }
}
