//! Postgres-backed [`DbRead`]/[`DbWrite`] implementation.
//!
//! SQL dialect and migrations are a collaborator concern (`spec.md` §6); this
//! module only assumes three tables (`gateway_wallets`, `operations`) exist
//! with columns matching [`super::model`]. Every write that must be atomic
//! with a read runs inside a single `SERIALIZABLE` transaction, retried on a
//! `40001` serialization-failure error code (`spec.md` §7).

use std::str::FromStr;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::model::{GatewayWallet, Operation, OrderType, TxError, TxStatus};
use super::{DbRead, DbWrite};

const SERIALIZATION_FAILURE: &str = "40001";

/// Postgres connection pool wrapper implementing the storage traits.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect to `database_url`, sizing the pool at `max_connections`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an already-constructed pool, as used by tests that spin up a
    /// throwaway database.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run `f` inside a fresh `SERIALIZABLE` transaction, retrying on
    /// serialization failure until it commits. The teacher crate does not
    /// need this pattern (its writes are single-statement); it is grounded
    /// instead in the original `booker/db`'s reliance on Postgres
    /// `SERIALIZABLE` isolation for concurrent operation inserts.
    async fn serializable<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'c> Fn(
            &'c mut Transaction<'_, Postgres>,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<T>> + Send + 'c>,
        >,
    {
        loop {
            let mut tx = self.pool.begin().await?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut *tx)
                .await?;
            match f(&mut tx).await {
                Ok(value) => {
                    tx.commit().await?;
                    return Ok(value);
                }
                Err(Error::Storage(sqlx::Error::Database(db_err)))
                    if db_err.code().as_deref() == Some(SERIALIZATION_FAILURE) =>
                {
                    tx.rollback().await.ok();
                    continue;
                }
                Err(other) => {
                    tx.rollback().await.ok();
                    return Err(other);
                }
            }
        }
    }
}

fn row_to_operation(row: OperationRow) -> Result<Operation> {
    Ok(Operation {
        id: Some(row.id),
        op_id: row.op_id,
        order_id: row.order_id,
        order_type: OrderType::from_str(&row.order_type)
            .map_err(|_| Error::Storage(sqlx::Error::Decode("bad order_type".into())))?,
        asset: row.asset,
        from_account: row.from_account,
        to_account: row.to_account,
        amount: row.amount,
        status: TxStatus::from_str(&row.status)
            .map_err(|_| Error::Storage(sqlx::Error::Decode("bad status".into())))?,
        error: TxError::from_str(&row.error)
            .map_err(|_| Error::Storage(sqlx::Error::Decode("bad error".into())))?,
        confirmations: row.confirmations,
        block_num: row.block_num,
        tx_hash: row.tx_hash,
        memo: row.memo,
        tx_created_at: row.tx_created_at,
        tx_expiration: row.tx_expiration,
    })
}

#[derive(sqlx::FromRow)]
struct OperationRow {
    id: i64,
    op_id: Option<i64>,
    order_id: Option<Uuid>,
    order_type: String,
    asset: String,
    from_account: String,
    to_account: String,
    amount: BigDecimal,
    status: String,
    error: String,
    confirmations: i64,
    block_num: i64,
    tx_hash: Option<String>,
    memo: Option<String>,
    tx_created_at: Option<chrono::DateTime<chrono::Utc>>,
    tx_expiration: Option<chrono::DateTime<chrono::Utc>>,
}

#[async_trait]
impl DbRead for Store {
    async fn get_wallet(&self, account_name: &str) -> Result<Option<GatewayWallet>> {
        let row = sqlx::query_as!(
            GatewayWallet,
            r#"SELECT account_name, last_operation, last_parsed_block
               FROM gateway_wallets WHERE account_name = $1"#,
            account_name,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_operation_by_op_id(&self, op_id: i64) -> Result<Option<Operation>> {
        let row = sqlx::query_as::<_, OperationRow>(
            "SELECT id, op_id, order_id, order_type, asset, from_account, to_account, amount, \
             status, error, confirmations, block_num, tx_hash, memo, tx_created_at, tx_expiration \
             FROM operations WHERE op_id = $1",
        )
        .bind(op_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_operation).transpose()
    }

    async fn get_operation_by_order_id(&self, order_id: Uuid) -> Result<Option<Operation>> {
        let row = sqlx::query_as::<_, OperationRow>(
            "SELECT id, op_id, order_id, order_type, asset, from_account, to_account, amount, \
             status, error, confirmations, block_num, tx_hash, memo, tx_created_at, tx_expiration \
             FROM operations WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_operation).transpose()
    }

    async fn get_operation_by_tx_hash(
        &self,
        asset: &str,
        tx_hash: &str,
    ) -> Result<Option<Operation>> {
        let row = sqlx::query_as::<_, OperationRow>(
            "SELECT id, op_id, order_id, order_type, asset, from_account, to_account, amount, \
             status, error, confirmations, block_num, tx_hash, memo, tx_created_at, tx_expiration \
             FROM operations WHERE asset = $1 AND tx_hash = $2",
        )
        .bind(asset)
        .bind(tx_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_operation).transpose()
    }

    async fn get_unconfirmed_operations(&self) -> Result<Vec<Operation>> {
        let rows = sqlx::query_as::<_, OperationRow>(
            "SELECT id, op_id, order_id, order_type, asset, from_account, to_account, amount, \
             status, error, confirmations, block_num, tx_hash, memo, tx_created_at, tx_expiration \
             FROM operations WHERE status = $1 ORDER BY block_num ASC",
        )
        .bind(TxStatus::ReceivedNotConfirmed.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_operation).collect()
    }

    async fn get_waiting_operations(&self) -> Result<Vec<Operation>> {
        let rows = sqlx::query_as::<_, OperationRow>(
            "SELECT id, op_id, order_id, order_type, asset, from_account, to_account, amount, \
             status, error, confirmations, block_num, tx_hash, memo, tx_created_at, tx_expiration \
             FROM operations WHERE status = $1 ORDER BY id ASC",
        )
        .bind(TxStatus::Wait.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_operation).collect()
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
        let account_name = account_name.to_string();
        self.serializable(move |tx| {
            let account_name = account_name.clone();
            Box::pin(async move {
                if let Some(existing) = sqlx::query_as!(
                    GatewayWallet,
                    r#"SELECT account_name, last_operation, last_parsed_block
                       FROM gateway_wallets WHERE account_name = $1 FOR UPDATE"#,
                    account_name,
                )
                .fetch_optional(&mut **tx)
                .await?
                {
                    return Ok((existing, false));
                }
                sqlx::query!(
                    "INSERT INTO gateway_wallets (account_name, last_operation, last_parsed_block) \
                     VALUES ($1, $2, $3)",
                    account_name,
                    seed_last_operation,
                    seed_last_parsed_block,
                )
                .execute(&mut **tx)
                .await?;
                Ok((
                    GatewayWallet {
                        account_name,
                        last_operation: seed_last_operation,
                        last_parsed_block: seed_last_parsed_block,
                    },
                    true,
                ))
            })
        })
        .await
    }

    async fn advance_last_operation(&self, account_name: &str, new_value: i64) -> Result<bool> {
        let result = sqlx::query!(
            "UPDATE gateway_wallets SET last_operation = $1 \
             WHERE account_name = $2 AND last_operation < $1",
            new_value,
            account_name,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn advance_last_parsed_block(&self, account_name: &str, new_value: i64) -> Result<bool> {
        let result = sqlx::query!(
            "UPDATE gateway_wallets SET last_parsed_block = $1 \
             WHERE account_name = $2 AND last_parsed_block < $1",
            new_value,
            account_name,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_operation(&self, op: Operation) -> Result<Operation> {
        let row = sqlx::query_as::<_, OperationRow>(
            "INSERT INTO operations \
             (op_id, order_id, order_type, asset, from_account, to_account, amount, status, \
              error, confirmations, block_num, tx_hash, memo, tx_created_at, tx_expiration) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15) \
             RETURNING id, op_id, order_id, order_type, asset, from_account, to_account, amount, \
                       status, error, confirmations, block_num, tx_hash, memo, tx_created_at, tx_expiration",
        )
        .bind(op.op_id)
        .bind(op.order_id)
        .bind(op.order_type.to_string())
        .bind(&op.asset)
        .bind(&op.from_account)
        .bind(&op.to_account)
        .bind(&op.amount)
        .bind(op.status.to_string())
        .bind(op.error.to_string())
        .bind(op.confirmations)
        .bind(op.block_num)
        .bind(&op.tx_hash)
        .bind(&op.memo)
        .bind(op.tx_created_at)
        .bind(op.tx_expiration)
        .fetch_one(&self.pool)
        .await?;
        row_to_operation(row)
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
        let result = sqlx::query!(
            "UPDATE operations SET confirmations = $1, status = $2 \
             WHERE id = $3 AND (confirmations != $1 OR status != $2)",
            confirmations,
            status.to_string(),
            id,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn attach_broadcast(
        &self,
        id: i64,
        tx_hash: String,
        block_num: i64,
        amount: BigDecimal,
        tx_expiration: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Operation> {
        let row = sqlx::query_as::<_, OperationRow>(
            "UPDATE operations SET tx_hash = $1, block_num = $2, amount = $3, status = $4, \
                                    tx_expiration = $5 \
             WHERE id = $6 \
             RETURNING id, op_id, order_id, order_type, asset, from_account, to_account, amount, \
                       status, error, confirmations, block_num, tx_hash, memo, tx_created_at, tx_expiration",
        )
        .bind(tx_hash)
        .bind(block_num)
        .bind(amount)
        .bind(TxStatus::ReceivedNotConfirmed.to_string())
        .bind(tx_expiration)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        row_to_operation(row)
    }

    async fn complete_deposit_match(
        &self,
        id: i64,
        op_id: Option<i64>,
        memo: Option<String>,
        tx_created_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Operation> {
        let row = sqlx::query_as::<_, OperationRow>(
            "UPDATE operations SET op_id = $1, memo = $2, tx_created_at = $3, \
                                    confirmations = 0, status = $4 \
             WHERE id = $5 \
             RETURNING id, op_id, order_id, order_type, asset, from_account, to_account, amount, \
                       status, error, confirmations, block_num, tx_hash, memo, tx_created_at, tx_expiration",
        )
        .bind(op_id)
        .bind(memo)
        .bind(tx_created_at)
        .bind(TxStatus::ReceivedNotConfirmed.to_string())
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        row_to_operation(row)
    }

    async fn mark_errored(&self, id: i64, error: TxError) -> Result<Operation> {
        let row = sqlx::query_as::<_, OperationRow>(
            "UPDATE operations SET error = $1, status = $2 WHERE id = $3 \
             RETURNING id, op_id, order_id, order_type, asset, from_account, to_account, amount, \
                       status, error, confirmations, block_num, tx_hash, memo, tx_created_at, tx_expiration",
        )
        .bind(error.to_string())
        .bind(TxStatus::Error.to_string())
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        row_to_operation(row)
    }
}
