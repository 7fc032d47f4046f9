//! The Validator component (`spec.md` §4.C): turns a raw chain operation
//! into a decided [`Operation`] row, or `None` if it should be skipped.
//!
//! Ported field-for-field from `validate_op`/`get_tx_hash_from_op`/
//! `validate_withdrawal_memo` in `bitshares_utils.py`, including the
//! `amount > max_withdrawal` check applied to deposits — `spec.md` §9 calls
//! this out as a deliberate quirk to preserve, not a bug to fix.

use chrono::Utc;

use crate::chain::{ChainAdapter, RawOperation};
use crate::config::GatewaySettings;
use crate::error::{Error, Result};
use crate::storage::{Operation, OrderType, TxError, TxStatus};

/// Validates raw chain operations against gateway business rules.
pub struct Validator<'a, C> {
    chain: &'a C,
    settings: &'a GatewaySettings,
}

impl<'a, C: ChainAdapter> Validator<'a, C> {
    /// Build a validator bound to a chain adapter and the gateway's
    /// configured asset/bounds.
    pub fn new(chain: &'a C, settings: &'a GatewaySettings) -> Self {
        Self { chain, settings }
    }

    /// Apply the full decision procedure to `raw_op`. Returns `None` if the
    /// operation type is not a native transfer (`spec.md` §4.C: "any other
    /// type yields no operation DTO").
    pub async fn validate(&self, raw_op: &RawOperation) -> Result<Option<Operation>> {
        if raw_op.op_type != 0 {
            return Ok(None);
        }

        let order_type = if raw_op.from == self.settings.account {
            OrderType::Deposit
        } else if raw_op.to == self.settings.account {
            OrderType::Withdrawal
        } else {
            return Err(Error::OperationNotForGateway(format!(
                "op {} involves neither account as gateway",
                raw_op.seq_num
            )));
        };

        let mut error = self.check_business_rules(raw_op, order_type);

        let tx_hash = if error == TxError::NoError {
            match self.tx_hash_from_op(raw_op).await {
                Ok(hash) => Some(hash),
                Err(Error::OperationsCollision { .. }) => {
                    error = TxError::OpCollision;
                    Some("Unknown".to_string())
                }
                Err(Error::TransactionNotFound { .. }) => {
                    error = TxError::TxHashNotFound;
                    Some("Unknown".to_string())
                }
                Err(_) => {
                    error = TxError::UnknownError;
                    Some("Unknown".to_string())
                }
            }
        } else {
            None
        };

        let status = if error == TxError::NoError {
            TxStatus::ReceivedNotConfirmed
        } else {
            TxStatus::Error
        };

        Ok(Some(Operation {
            id: None,
            op_id: Some(raw_op.seq_num),
            order_id: None,
            order_type,
            asset: raw_op.asset.clone(),
            from_account: raw_op.from.clone(),
            to_account: raw_op.to.clone(),
            amount: raw_op.amount.clone(),
            status,
            error,
            confirmations: 0,
            block_num: raw_op.block_num,
            tx_hash,
            memo: raw_op.memo.clone(),
            tx_created_at: Some(Utc::now()),
            tx_expiration: None,
        }))
    }

    fn check_business_rules(&self, raw_op: &RawOperation, order_type: OrderType) -> TxError {
        if raw_op.asset != self.settings.asset_code() {
            return TxError::BadAsset;
        }

        // `spec.md` §9: deposits are bounds-checked against `max_withdrawal`,
        // not `max_deposit`. This mirrors the original source exactly.
        let (min_bound, max_bound) = match order_type {
            OrderType::Deposit => (&self.settings.min_deposit, &self.settings.max_withdrawal),
            OrderType::Withdrawal => (&self.settings.min_withdrawal, &self.settings.max_withdrawal),
            OrderType::Trash => return TxError::NoError,
        };

        if raw_op.amount < *min_bound {
            return TxError::LessMin;
        }
        if raw_op.amount > *max_bound {
            return TxError::GreaterMax;
        }

        if order_type == OrderType::Withdrawal {
            return match &raw_op.memo {
                None => TxError::NoMemo,
                Some(memo) => match validate_withdrawal_memo(memo, &self.settings.gateway_distribute_asset) {
                    Ok(()) => TxError::NoError,
                    Err(_) => TxError::FloodMemo,
                },
            };
        }

        TxError::NoError
    }

    /// `tx-hash-from-op` (`spec.md` §4.C): fetch the block containing the
    /// operation, match single-operation transactions on
    /// `(amount, asset, from, to)`, and require exactly one match.
    async fn tx_hash_from_op(&self, raw_op: &RawOperation) -> Result<String> {
        let block = self.chain.get_block(raw_op.block_num).await?;
        let matches: Vec<&str> = block
            .transactions
            .iter()
            .filter(|tx| tx.operations.len() == 1)
            .filter(|tx| operation_matches(&tx.operations[0], raw_op))
            .map(|tx| tx.tx_id.as_str())
            .collect();

        match matches.len() {
            0 => Err(Error::TransactionNotFound {
                op_id: raw_op.seq_num.to_string(),
                block_num: raw_op.block_num as u64,
            }),
            1 => Ok(matches[0].to_string()),
            count => Err(Error::OperationsCollision {
                op_id: raw_op.seq_num.to_string(),
                block_num: raw_op.block_num as u64,
                count,
            }),
        }
    }
}

fn operation_matches(candidate: &RawOperation, target: &RawOperation) -> bool {
    candidate.amount == target.amount
        && candidate.asset == target.asset
        && candidate.from == target.from
        && candidate.to == target.to
}

/// Validate a withdrawal memo against the `<ASSET_CODE>:<non-empty>` mask
/// (`spec.md` §4.C). `gateway_distribute_asset` is the short asset code
/// (e.g. `"ETH"`), matched case-insensitively against the memo's left part.
pub fn validate_withdrawal_memo(memo: &str, gateway_distribute_asset: &str) -> Result<()> {
    let parts: Vec<&str> = memo.split(':').collect();
    if parts.len() != 2 {
        return Err(Error::InvalidMemoMask(memo.to_string()));
    }
    let (asset_part, dest_part) = (parts[0], parts[1]);
    if asset_part.to_uppercase() != gateway_distribute_asset.to_uppercase() || dest_part.is_empty() {
        return Err(Error::InvalidMemoMask(memo.to_string()));
    }
    Ok(())
}

/// Sanity-check a chain account name (`validate_bitshares_account` in the
/// original source). Non-empty, no whitespace.
pub fn validate_account_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::FakeChainAdapter;
    use crate::chain::{ChainBlock, ChainTransaction};
    use test_case::test_case;

    fn settings() -> GatewaySettings {
        GatewaySettings {
            core_asset: "TEST".to_string(),
            gateway_prefix: "FINTEHTEST".to_string(),
            gateway_distribute_asset: "ETH".to_string(),
            account: "gateway".to_string(),
            nodes: vec![],
            min_deposit: "0.1".parse().unwrap(),
            min_withdrawal: "0.1".parse().unwrap(),
            max_deposit: "1000".parse().unwrap(),
            max_withdrawal: "1000".parse().unwrap(),
        }
    }

    fn raw_op(from: &str, to: &str, amount: &str, memo: Option<&str>) -> RawOperation {
        RawOperation {
            seq_num: 1,
            op_type: 0,
            from: from.to_string(),
            to: to.to_string(),
            amount: amount.parse().unwrap(),
            asset: "FINTEHTEST.ETH".to_string(),
            memo: memo.map(str::to_string),
            block_num: 100,
        }
    }

    fn single_match_block(op: &RawOperation) -> ChainBlock {
        ChainBlock {
            block_num: op.block_num,
            transactions: vec![ChainTransaction {
                tx_id: "tx-1".to_string(),
                operations: vec![op.clone()],
            }],
        }
    }

    #[test_case("ETH:dst123", "ETH", true ; "matching asset and non-empty dest")]
    #[test_case(":x", "ETH", false ; "empty asset part")]
    #[test_case("x:", "ETH", false ; "empty dest part")]
    #[test_case("", "ETH", false ; "empty memo")]
    #[test_case("eth:abc:def", "ETH", false ; "too many parts")]
    fn memo_mask(memo: &str, asset: &str, should_pass: bool) {
        assert_eq!(validate_withdrawal_memo(memo, asset).is_ok(), should_pass);
    }

    #[tokio::test]
    async fn successful_deposit_is_received_not_confirmed() {
        let chain = FakeChainAdapter::new();
        let settings = settings();
        let op = raw_op("gateway", "user", "0.5", None);
        chain.push_block(single_match_block(&op));

        let validator = Validator::new(&chain, &settings);
        let result = validator.validate(&op).await.unwrap().unwrap();
        assert_eq!(result.order_type, OrderType::Deposit);
        assert_eq!(result.error, TxError::NoError);
        assert_eq!(result.status, TxStatus::ReceivedNotConfirmed);
        assert_eq!(result.tx_hash.as_deref(), Some("tx-1"));
    }

    #[tokio::test]
    async fn withdrawal_flood_memo() {
        let chain = FakeChainAdapter::new();
        let settings = settings();
        let op = raw_op("user", "gateway", "0.1", Some(":"));
        chain.push_block(single_match_block(&op));

        let validator = Validator::new(&chain, &settings);
        let result = validator.validate(&op).await.unwrap().unwrap();
        assert_eq!(result.order_type, OrderType::Withdrawal);
        assert_eq!(result.error, TxError::FloodMemo);
        assert_eq!(result.status, TxStatus::Error);
    }

    #[tokio::test]
    async fn withdrawal_below_minimum() {
        let chain = FakeChainAdapter::new();
        let mut settings = settings();
        settings.min_withdrawal = "0.1".parse().unwrap();
        let op = raw_op("user", "gateway", "0.05", Some("ETH:dst123"));
        chain.push_block(single_match_block(&op));

        let validator = Validator::new(&chain, &settings);
        let result = validator.validate(&op).await.unwrap().unwrap();
        assert_eq!(result.error, TxError::LessMin);
        assert_eq!(result.status, TxStatus::Error);
    }

    #[tokio::test]
    async fn bad_asset() {
        let chain = FakeChainAdapter::new();
        let settings = settings();
        let mut op = raw_op("user", "gateway", "0.1", Some("ETH:dst123"));
        op.asset = "FINTEHTEST.USDT".to_string();
        chain.push_block(single_match_block(&op));

        let validator = Validator::new(&chain, &settings);
        let result = validator.validate(&op).await.unwrap().unwrap();
        assert_eq!(result.error, TxError::BadAsset);
    }

    #[tokio::test]
    async fn deposit_amount_is_checked_against_max_withdrawal_not_max_deposit() {
        let chain = FakeChainAdapter::new();
        let mut settings = settings();
        settings.max_deposit = "1".parse().unwrap();
        settings.max_withdrawal = "10".parse().unwrap();
        let op = raw_op("gateway", "user", "5", None);
        chain.push_block(single_match_block(&op));

        let validator = Validator::new(&chain, &settings);
        let result = validator.validate(&op).await.unwrap().unwrap();
        assert_eq!(result.error, TxError::NoError);
    }

    #[tokio::test]
    async fn collision_marks_both_operations() {
        let chain = FakeChainAdapter::new();
        let settings = settings();
        let op = raw_op("gateway", "user", "0.5", None);
        chain.push_block(ChainBlock {
            block_num: op.block_num,
            transactions: vec![
                ChainTransaction { tx_id: "tx-1".to_string(), operations: vec![op.clone()] },
                ChainTransaction { tx_id: "tx-2".to_string(), operations: vec![op.clone()] },
            ],
        });

        let validator = Validator::new(&chain, &settings);
        let result = validator.validate(&op).await.unwrap().unwrap();
        assert_eq!(result.error, TxError::OpCollision);
        assert_eq!(result.status, TxStatus::Error);
        assert_eq!(result.tx_hash.as_deref(), Some("Unknown"));
    }

    #[tokio::test]
    async fn no_matching_transaction_in_block() {
        let chain = FakeChainAdapter::new();
        let settings = settings();
        let op = raw_op("gateway", "user", "0.5", None);
        chain.push_block(ChainBlock { block_num: op.block_num, transactions: vec![] });

        let validator = Validator::new(&chain, &settings);
        let result = validator.validate(&op).await.unwrap().unwrap();
        assert_eq!(result.error, TxError::TxHashNotFound);
        assert_eq!(result.status, TxStatus::Error);
    }

    #[tokio::test]
    async fn non_transfer_operation_is_skipped() {
        let chain = FakeChainAdapter::new();
        let settings = settings();
        let mut op = raw_op("gateway", "user", "0.5", None);
        op.op_type = 1;

        let validator = Validator::new(&chain, &settings);
        assert!(validator.validate(&op).await.unwrap().is_none());
    }
}
