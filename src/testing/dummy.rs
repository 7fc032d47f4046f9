//! Dummy value generators for gateway domain types, following the teacher
//! crate's `fake::Dummy` conventions (`signer::testing::dummy`): free
//! functions taking a `&fake::Faker` and an `RngCore`, rather than
//! implementing `Dummy` directly on every type, so callers can shape a
//! batch of related values from one seeded rng.

use bigdecimal::BigDecimal;
use chrono::{TimeZone, Utc};
use fake::Fake;
use rand::Rng;
use uuid::Uuid;

use crate::booker::api::{Order, OrderType as WireOrderType, Transaction};
use crate::chain::RawOperation;
use crate::storage::{GatewayWallet, Operation, OrderType, TxError, TxStatus};

/// A dummy decimal amount in `[0, 1000)` with up to 6 fractional digits,
/// comfortably within the `NUMERIC(78,36)` column the real amounts occupy.
pub fn amount<R: Rng + ?Sized>(_config: &fake::Faker, rng: &mut R) -> BigDecimal {
    let whole: u32 = rng.gen_range(0..1000);
    let frac: u32 = rng.gen_range(0..1_000_000);
    format!("{whole}.{frac:06}").parse().expect("well-formed decimal literal")
}

/// A dummy account name, distinct from the reserved `"gateway"` account so
/// tests can freely use it as a counterparty.
pub fn account_name<R: Rng + ?Sized>(config: &fake::Faker, rng: &mut R) -> String {
    format!("user-{}", config.fake_with_rng::<u32, _>(rng))
}

/// A dummy raw chain operation (`spec.md` §4.C wire shape), `op_type = 0`
/// so it always survives the Validator's type filter.
pub fn raw_operation<R: Rng + ?Sized>(config: &fake::Faker, rng: &mut R) -> RawOperation {
    RawOperation {
        seq_num: config.fake_with_rng::<u32, _>(rng) as i64,
        op_type: 0,
        from: account_name(config, rng),
        to: account_name(config, rng),
        amount: amount(config, rng),
        asset: "FINTEHTEST.ETH".to_string(),
        memo: None,
        block_num: config.fake_with_rng::<u32, _>(rng) as i64,
    }
}

/// A dummy persisted operation, `status = ReceivedNotConfirmed` with no
/// error, suitable as a baseline for property tests that mutate specific
/// fields.
pub fn operation<R: Rng + ?Sized>(config: &fake::Faker, rng: &mut R) -> Operation {
    Operation {
        id: Some(config.fake_with_rng::<u32, _>(rng) as i64),
        op_id: Some(config.fake_with_rng::<u32, _>(rng) as i64),
        order_id: Some(Uuid::new_v4()),
        order_type: OrderType::Deposit,
        asset: "FINTEHTEST.ETH".to_string(),
        from_account: "gateway".to_string(),
        to_account: account_name(config, rng),
        amount: amount(config, rng),
        status: TxStatus::ReceivedNotConfirmed,
        error: TxError::NoError,
        confirmations: 0,
        block_num: config.fake_with_rng::<u32, _>(rng) as i64,
        tx_hash: Some(format!("tx-{}", config.fake_with_rng::<u32, _>(rng))),
        memo: None,
        tx_created_at: Some(Utc.timestamp_opt(config.fake_with_rng::<u32, _>(rng) as i64, 0).unwrap()),
        tx_expiration: None,
    }
}

/// A dummy wallet cursor row.
pub fn gateway_wallet<R: Rng + ?Sized>(config: &fake::Faker, rng: &mut R) -> GatewayWallet {
    GatewayWallet {
        account_name: "gateway".to_string(),
        last_operation: config.fake_with_rng::<u32, _>(rng) as i64,
        last_parsed_block: config.fake_with_rng::<u32, _>(rng) as i64,
    }
}

/// A dummy wire transaction DTO.
pub fn wire_transaction<R: Rng + ?Sized>(config: &fake::Faker, rng: &mut R) -> Transaction {
    Transaction {
        tx_id: Uuid::new_v4(),
        coin: "FINTEHTEST.ETH".to_string(),
        tx_hash: Some(format!("tx-{}", config.fake_with_rng::<u32, _>(rng))),
        tx_from: Some(account_name(config, rng)),
        tx_to: Some(account_name(config, rng)),
        tx_amount: Some(amount(config, rng)),
        tx_created_at: Some(config.fake_with_rng::<u32, _>(rng) as i64),
        tx_error: Default::default(),
        tx_confirmations: 0,
        tx_max_confirmations: crate::REQUIRED_CONFIRMATIONS,
        memo_to: None,
    }
}

/// A dummy wire order DTO with both legs present.
pub fn wire_order<R: Rng + ?Sized>(config: &fake::Faker, rng: &mut R) -> Order {
    Order {
        order_id: Uuid::new_v4(),
        order_type: WireOrderType::Deposit,
        in_tx: Some(wire_transaction(config, rng)),
        out_tx: Some(wire_transaction(config, rng)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_is_within_expected_precision() {
        let mut rng = rand::thread_rng();
        let value = amount(&fake::Faker, &mut rng);
        assert!(value >= "0".parse().unwrap());
        assert!(value < "1000".parse().unwrap());
    }

    #[test]
    fn operation_dummy_satisfies_error_status_invariant() {
        let mut rng = rand::thread_rng();
        let op = operation(&fake::Faker, &mut rng);
        assert_eq!(op.error, TxError::NoError);
        assert_ne!(op.status, TxStatus::Error);
    }
}
