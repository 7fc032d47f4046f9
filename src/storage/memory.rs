//! In-process storage double. Mirrors the teacher crate's
//! `storage::in_memory::Store`: an `Arc<Mutex<..>>` over plain collections,
//! good enough to exercise every `DbRead`/`DbWrite` invariant in unit tests
//! without a Postgres instance.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::model::{GatewayWallet, Operation, TxError, TxStatus};
use super::{DbRead, DbWrite};

#[derive(Default)]
struct Inner {
    wallets: HashMap<String, GatewayWallet>,
    operations: Vec<Operation>,
    next_id: i64,
}

/// In-memory [`DbRead`]/[`DbWrite`] implementation.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<Inner>>,
}

impl Store {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Construct an empty store behind an `Arc`, matching the teacher's
    /// `new_shared` convenience constructor used throughout its test
    /// harnesses.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn collides(existing: &Operation, candidate: &Operation) -> bool {
    if let (Some(a), Some(b)) = (existing.op_id, candidate.op_id) {
        if a == b {
            return true;
        }
    }
    if let (Some(a), Some(b)) = (existing.order_id, candidate.order_id) {
        if a == b {
            return true;
        }
    }
    if let (Some(a), Some(b)) = (&existing.tx_hash, &candidate.tx_hash) {
        if a == b && existing.asset == candidate.asset {
            return true;
        }
    }
    false
}

#[async_trait]
impl DbRead for Store {
    async fn get_wallet(&self, account_name: &str) -> Result<Option<GatewayWallet>> {
        Ok(self.inner.lock().await.wallets.get(account_name).cloned())
    }

    async fn get_operation_by_op_id(&self, op_id: i64) -> Result<Option<Operation>> {
        Ok(self
            .inner
            .lock()
            .await
            .operations
            .iter()
            .find(|op| op.op_id == Some(op_id))
            .cloned())
    }

    async fn get_operation_by_order_id(&self, order_id: Uuid) -> Result<Option<Operation>> {
        Ok(self
            .inner
            .lock()
            .await
            .operations
            .iter()
            .find(|op| op.order_id == Some(order_id))
            .cloned())
    }

    async fn get_operation_by_tx_hash(
        &self,
        asset: &str,
        tx_hash: &str,
    ) -> Result<Option<Operation>> {
        Ok(self
            .inner
            .lock()
            .await
            .operations
            .iter()
            .find(|op| op.asset == asset && op.tx_hash.as_deref() == Some(tx_hash))
            .cloned())
    }

    async fn get_unconfirmed_operations(&self) -> Result<Vec<Operation>> {
        let mut ops: Vec<Operation> = self
            .inner
            .lock()
            .await
            .operations
            .iter()
            .filter(|op| op.status == TxStatus::ReceivedNotConfirmed)
            .cloned()
            .collect();
        ops.sort_by_key(|op| op.block_num);
        Ok(ops)
    }

    async fn get_waiting_operations(&self) -> Result<Vec<Operation>> {
        Ok(self
            .inner
            .lock()
            .await
            .operations
            .iter()
            .filter(|op| op.status == TxStatus::Wait)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DbWrite for Store {
    async fn ensure_wallet(
        &self,
        account_name: &str,
        seed_last_operation: i64,
        seed_last_parsed_block: i64,
    ) -> Result<(GatewayWallet, bool)> {
        let mut guard = self.inner.lock().await;
        if let Some(existing) = guard.wallets.get(account_name) {
            return Ok((existing.clone(), false));
        }
        let wallet = GatewayWallet {
            account_name: account_name.to_string(),
            last_operation: seed_last_operation,
            last_parsed_block: seed_last_parsed_block,
        };
        guard.wallets.insert(account_name.to_string(), wallet.clone());
        Ok((wallet, true))
    }

    async fn advance_last_operation(&self, account_name: &str, new_value: i64) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        let wallet = guard
            .wallets
            .get_mut(account_name)
            .ok_or_else(|| Error::WalletNotFound(account_name.to_string()))?;
        if new_value <= wallet.last_operation {
            return Ok(false);
        }
        wallet.last_operation = new_value;
        Ok(true)
    }

    async fn advance_last_parsed_block(&self, account_name: &str, new_value: i64) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        let wallet = guard
            .wallets
            .get_mut(account_name)
            .ok_or_else(|| Error::WalletNotFound(account_name.to_string()))?;
        if new_value <= wallet.last_parsed_block {
            return Ok(false);
        }
        wallet.last_parsed_block = new_value;
        Ok(true)
    }

    async fn insert_operation(&self, mut op: Operation) -> Result<Operation> {
        let mut guard = self.inner.lock().await;
        if guard.operations.iter().any(|existing| collides(existing, &op)) {
            return Err(Error::Storage(sqlx::Error::RowNotFound));
        }
        guard.next_id += 1;
        op.id = Some(guard.next_id);
        guard.operations.push(op.clone());
        Ok(op)
    }

    async fn insert_planned_withdrawal(&self, op: Operation) -> Result<Operation> {
        self.insert_operation(op).await
    }

    async fn update_confirmations(
        &self,
        id: i64,
        confirmations: i64,
        status: TxStatus,
    ) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        let op = guard
            .operations
            .iter_mut()
            .find(|op| op.id == Some(id))
            .ok_or(Error::Storage(sqlx::Error::RowNotFound))?;
        let changed = op.confirmations != confirmations || op.status != status;
        op.confirmations = confirmations;
        op.status = status;
        Ok(changed)
    }

    async fn attach_broadcast(
        &self,
        id: i64,
        tx_hash: String,
        block_num: i64,
        amount: BigDecimal,
        tx_expiration: Option<DateTime<Utc>>,
    ) -> Result<Operation> {
        let mut guard = self.inner.lock().await;
        let op = guard
            .operations
            .iter_mut()
            .find(|op| op.id == Some(id))
            .ok_or(Error::Storage(sqlx::Error::RowNotFound))?;
        op.tx_hash = Some(tx_hash);
        op.block_num = block_num;
        op.amount = amount;
        op.tx_expiration = tx_expiration;
        op.status = TxStatus::ReceivedNotConfirmed;
        Ok(op.clone())
    }

    async fn complete_deposit_match(
        &self,
        id: i64,
        op_id: Option<i64>,
        memo: Option<String>,
        tx_created_at: Option<DateTime<Utc>>,
    ) -> Result<Operation> {
        let mut guard = self.inner.lock().await;
        let op = guard
            .operations
            .iter_mut()
            .find(|op| op.id == Some(id))
            .ok_or(Error::Storage(sqlx::Error::RowNotFound))?;
        op.op_id = op_id;
        op.memo = memo;
        op.tx_created_at = tx_created_at;
        op.confirmations = 0;
        op.status = TxStatus::ReceivedNotConfirmed;
        Ok(op.clone())
    }

    async fn mark_errored(&self, id: i64, error: TxError) -> Result<Operation> {
        let mut guard = self.inner.lock().await;
        let op = guard
            .operations
            .iter_mut()
            .find(|op| op.id == Some(id))
            .ok_or(Error::Storage(sqlx::Error::RowNotFound))?;
        op.error = error;
        op.status = TxStatus::Error;
        Ok(op.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::OrderType;

    fn op(op_id: i64) -> Operation {
        Operation {
            id: None,
            op_id: Some(op_id),
            order_id: None,
            order_type: OrderType::Deposit,
            asset: "FINTEHTEST.ETH".to_string(),
            from_account: "alice".to_string(),
            to_account: "gateway".to_string(),
            amount: "1.5".parse().unwrap(),
            status: TxStatus::ReceivedNotConfirmed,
            error: TxError::NoError,
            confirmations: 0,
            block_num: 100,
            tx_hash: Some(format!("hash-{op_id}")),
            memo: None,
            tx_created_at: None,
            tx_expiration: None,
        }
    }

    #[tokio::test]
    async fn wallet_cursor_is_monotonic() {
        let store = Store::new();
        store.ensure_wallet("gateway", 10, 20).await.unwrap();
        assert!(store.advance_last_operation("gateway", 11).await.unwrap());
        assert!(!store.advance_last_operation("gateway", 11).await.unwrap());
        assert!(!store.advance_last_operation("gateway", 5).await.unwrap());
    }

    #[tokio::test]
    async fn ensure_wallet_seeds_only_once() {
        let store = Store::new();
        let (w1, created1) = store.ensure_wallet("gateway", 10, 20).await.unwrap();
        assert!(created1);
        assert_eq!(w1.last_operation, 10);
        let (w2, created2) = store.ensure_wallet("gateway", 999, 999).await.unwrap();
        assert!(!created2);
        assert_eq!(w2.last_operation, 10);
    }

    #[tokio::test]
    async fn duplicate_op_id_is_rejected() {
        let store = Store::new();
        store.insert_operation(op(1)).await.unwrap();
        assert!(store.insert_operation(op(1)).await.is_err());
    }

    #[tokio::test]
    async fn unconfirmed_operations_sorted_by_block() {
        let store = Store::new();
        let mut a = op(1);
        a.block_num = 200;
        let mut b = op(2);
        b.block_num = 100;
        store.insert_operation(a).await.unwrap();
        store.insert_operation(b).await.unwrap();
        let pending = store.get_unconfirmed_operations().await.unwrap();
        assert_eq!(pending[0].op_id, Some(2));
        assert_eq!(pending[1].op_id, Some(1));
    }
}
