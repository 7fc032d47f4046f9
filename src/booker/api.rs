//! Booker API DTOs and the two concrete service contracts (`spec.md`
//! §4.G, §6).
//!
//! DTO field names are kept identical to the wire schema so `serde_json`
//! (de)serialization round-trips without renaming. Ported from
//! `ws_booker_api.py`'s `Tx`/`Order` dataclasses and `gw_dto.py`'s
//! `BitSharesOperation`/`op_to_order` conversion.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::storage::{Operation, OrderType as StorageOrderType, TxError as StorageTxError};

/// Wire `OrderType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum OrderType {
    /// See [`StorageOrderType::Trash`].
    Trash,
    /// See [`StorageOrderType::Deposit`].
    Deposit,
    /// See [`StorageOrderType::Withdrawal`].
    Withdrawal,
}

impl From<StorageOrderType> for OrderType {
    fn from(value: StorageOrderType) -> Self {
        match value {
            StorageOrderType::Trash => OrderType::Trash,
            StorageOrderType::Deposit => OrderType::Deposit,
            StorageOrderType::Withdrawal => OrderType::Withdrawal,
        }
    }
}

/// Wire `TxError`, field-for-field identical to [`StorageTxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
pub enum TxError {
    /// No error.
    #[default]
    NoError,
    /// See [`StorageTxError::UnknownError`].
    UnknownError,
    /// See [`StorageTxError::BadAsset`].
    BadAsset,
    /// See [`StorageTxError::LessMin`].
    LessMin,
    /// See [`StorageTxError::GreaterMax`].
    GreaterMax,
    /// See [`StorageTxError::NoMemo`].
    NoMemo,
    /// See [`StorageTxError::FloodMemo`].
    FloodMemo,
    /// See [`StorageTxError::OpCollision`].
    OpCollision,
    /// See [`StorageTxError::TxHashNotFound`].
    TxHashNotFound,
}

impl From<StorageTxError> for TxError {
    fn from(value: StorageTxError) -> Self {
        match value {
            StorageTxError::NoError => TxError::NoError,
            StorageTxError::UnknownError => TxError::UnknownError,
            StorageTxError::BadAsset => TxError::BadAsset,
            StorageTxError::LessMin => TxError::LessMin,
            StorageTxError::GreaterMax => TxError::GreaterMax,
            StorageTxError::NoMemo => TxError::NoMemo,
            StorageTxError::FloodMemo => TxError::FloodMemo,
            StorageTxError::OpCollision => TxError::OpCollision,
            StorageTxError::TxHashNotFound => TxError::TxHashNotFound,
        }
    }
}

/// One leg of an order on the wire (`spec.md` §6 *Transaction* schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Wire transaction id.
    pub tx_id: Uuid,
    /// Asset/coin code.
    pub coin: String,
    /// Chain transaction hash, once known.
    pub tx_hash: Option<String>,
    /// Source account.
    pub tx_from: Option<String>,
    /// Destination account.
    pub tx_to: Option<String>,
    /// Transfer amount.
    pub tx_amount: Option<BigDecimal>,
    /// Creation timestamp, as a unix epoch second count.
    pub tx_created_at: Option<i64>,
    /// Current error classification.
    #[serde(default)]
    pub tx_error: TxError,
    /// Confirmations observed so far.
    #[serde(default)]
    pub tx_confirmations: i64,
    /// Confirmations required for finality.
    #[serde(default)]
    pub tx_max_confirmations: i64,
    /// Destination memo, for withdrawal transactions.
    pub memo_to: Option<String>,
}

impl Transaction {
    /// Build a wire [`Transaction`] from a persisted [`Operation`],
    /// mirroring `op_to_order`'s transaction half in `gw_dto.py`.
    pub fn from_operation(op: &Operation, order_id: Uuid) -> Self {
        Self {
            tx_id: order_id,
            coin: op.asset.clone(),
            tx_hash: op.tx_hash.clone(),
            tx_from: Some(op.from_account.clone()),
            tx_to: Some(op.to_account.clone()),
            tx_amount: Some(op.amount.clone()),
            tx_created_at: op.tx_created_at.map(|t| t.timestamp()),
            tx_error: op.error.into(),
            tx_confirmations: op.confirmations,
            tx_max_confirmations: crate::REQUIRED_CONFIRMATIONS,
            memo_to: op.memo.clone(),
        }
    }
}

/// A full order, both legs (`spec.md` §6 *Order* schema). One leg may be
/// absent until its counterpart arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order id, shared by both legs.
    pub order_id: Uuid,
    /// Which direction this order represents.
    pub order_type: OrderType,
    /// Inbound leg.
    pub in_tx: Option<Transaction>,
    /// Outbound leg.
    pub out_tx: Option<Transaction>,
}

/// `validate_address` arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateAddressParams {
    /// Candidate destination account name.
    pub tx_to: String,
}

/// `validate_address` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateAddressResult {
    /// True iff `tx_to` resolves to an existing account.
    pub valid: bool,
}

/// `get_deposit_address` arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDepositAddressParams {
    /// Optional hint of the withdrawal destination this deposit address
    /// will ultimately forward to.
    pub out_tx_to: Option<String>,
}

/// `get_deposit_address` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDepositAddressResult {
    /// The deposit account/memo the user should send funds to.
    pub tx_to: String,
}

/// `new_in_order_request` arguments (booker requesting the gateway
/// initialize a new inbound order, e.g. an issue flow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInOrderRequest {
    /// Order id assigned by the booker.
    pub order_id: Uuid,
    /// Outbound leg the booker wants the gateway to broadcast.
    pub out_tx: Transaction,
}

/// The service the gateway calls on the booker
/// (`spec.md` §4.G *GatewayBookerOrder*).
#[async_trait::async_trait]
pub trait GatewayBookerOrder: Send + Sync {
    /// True iff `tx_to` resolves to an existing account on the chain.
    async fn validate_address(&self, params: ValidateAddressParams) -> crate::error::Result<ValidateAddressResult>;

    /// Ask the booker for a deposit address/memo to hand to a user.
    async fn get_deposit_address(&self, params: GetDepositAddressParams) -> crate::error::Result<GetDepositAddressResult>;

    /// Notify the booker of a newly observed inbound order leg.
    async fn new_in_order(&self, order: Order) -> crate::error::Result<()>;

    /// Notify the booker of a newly observed outbound order leg.
    async fn new_out_order(&self, order: Order) -> crate::error::Result<()>;
}

/// The service the booker calls on the gateway
/// (`spec.md` §4.G *BookerGatewayOrder*).
#[async_trait::async_trait]
pub trait BookerGatewayOrder: Send + Sync {
    /// Booker asks the gateway to plan a new outbound transfer.
    async fn new_in_order_request(&self, request: NewInOrderRequest) -> crate::error::Result<()>;

    /// Booker informs the gateway of a new inbound transaction record.
    async fn new_in_tx_order(&self, tx: Transaction) -> crate::error::Result<()>;

    /// Booker informs the gateway of an update to an inbound transaction.
    async fn update_in_tx_order(&self, tx: Transaction) -> crate::error::Result<()>;

    /// Booker informs the gateway of a new outbound transaction record.
    async fn new_out_tx_order(&self, tx: Transaction) -> crate::error::Result<()>;

    /// Booker informs the gateway of an update to an outbound transaction.
    async fn update_out_tx_order(&self, tx: Transaction) -> crate::error::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn transaction_dto_round_trips() {
        let tx = Transaction {
            tx_id: Uuid::new_v4(),
            coin: "FINTEHTEST.ETH".to_string(),
            tx_hash: Some("abc".to_string()),
            tx_from: Some("gateway".to_string()),
            tx_to: Some("user".to_string()),
            tx_amount: Some("0.5".parse().unwrap()),
            tx_created_at: Some(1_700_000_000),
            tx_error: TxError::NoError,
            tx_confirmations: 3,
            tx_max_confirmations: 5,
            memo_to: None,
        };
        let encoded = serde_json::to_string(&tx).unwrap();
        let decoded: Transaction = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn order_type_conversion_matches_storage_type() {
        assert_eq!(OrderType::from(StorageOrderType::Deposit), OrderType::Deposit);
        assert_eq!(OrderType::from(StorageOrderType::Withdrawal), OrderType::Withdrawal);
    }

    #[test]
    fn from_operation_carries_required_confirmations() {
        let op = Operation {
            id: Some(1), op_id: Some(1), order_id: None, order_type: StorageOrderType::Deposit,
            asset: "FINTEHTEST.ETH".to_string(), from_account: "gateway".to_string(), to_account: "user".to_string(),
            amount: "1".parse().unwrap(), status: crate::storage::TxStatus::ReceivedNotConfirmed,
            error: StorageTxError::NoError, confirmations: 2, block_num: 10, tx_hash: Some("h".to_string()),
            memo: None, tx_created_at: Some(Utc::now()), tx_expiration: None,
        };
        let tx = Transaction::from_operation(&op, Uuid::new_v4());
        assert_eq!(tx.tx_max_confirmations, crate::REQUIRED_CONFIRMATIONS);
        assert_eq!(tx.tx_confirmations, 2);
    }}
