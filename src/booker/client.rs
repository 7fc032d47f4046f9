//! Booker RPC client: calls the booker's `GatewayBookerOrder` service over
//! any [`Transport`] (`spec.md` §4.G).

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use super::api::{
    GatewayBookerOrder, GetDepositAddressParams, GetDepositAddressResult, Order,
    ValidateAddressParams, ValidateAddressResult,
};
use super::rpc::{Request, Response, RpcError};
use super::transport::Transport;
use crate::error::{Error, Result};

/// Calls `GatewayBookerOrder` methods on the booker over a single
/// [`Transport`] connection. Calls are serialized (one in flight at a
/// time), matching the ZeroMQ REQ/REP alternation this client also has to
/// support.
pub struct RpcClient<T> {
    transport: Mutex<T>,
}

impl<T: Transport> RpcClient<T> {
    /// Wrap an already-connected transport.
    pub fn new(transport: T) -> Self {
        Self { transport: Mutex::new(transport) }
    }

    #[instrument(skip(self, params))]
    async fn call(&self, method: &str, params: Value) -> std::result::Result<Value, RpcError> {
        let request = Request::new(method, params, Uuid::new_v4());
        let frame = serde_json::to_string(&request).map_err(|_| RpcError::ParseError)?;

        let mut transport = self.transport.lock().await;
        transport.send(frame).await.map_err(|_| RpcError::InternalError)?;
        let reply = transport
            .recv()
            .await
            .map_err(|_| RpcError::InternalError)?
            .ok_or(RpcError::EndOfStream)?;
        drop(transport);

        let response: Response = serde_json::from_str(&reply).map_err(|_| RpcError::ParseError)?;
        if response.id != request.id {
            return Err(RpcError::InvalidRequest);
        }
        response.into_result()
    }
}

fn internal_error_to_rpc(err: RpcError) -> Error {
    Error::Rpc(err)
}

#[async_trait]
impl<T: Transport> GatewayBookerOrder for RpcClient<T> {
    async fn validate_address(&self, params: ValidateAddressParams) -> Result<ValidateAddressResult> {
        let result = self
            .call("GatewayBookerOrder.validate_address", json!(params))
            .await
            .map_err(internal_error_to_rpc)?;
        serde_json::from_value(result).map_err(Error::Json)
    }

    async fn get_deposit_address(&self, params: GetDepositAddressParams) -> Result<GetDepositAddressResult> {
        let result = self
            .call("GatewayBookerOrder.get_deposit_address", json!(params))
            .await
            .map_err(internal_error_to_rpc)?;
        serde_json::from_value(result).map_err(Error::Json)
    }

    async fn new_in_order(&self, order: Order) -> Result<()> {
        self.call("GatewayBookerOrder.new_in_order", json!({ "order": order }))
            .await
            .map_err(internal_error_to_rpc)?;
        Ok(())
    }

    async fn new_out_order(&self, order: Order) -> Result<()> {
        self.call("GatewayBookerOrder.new_out_order", json!({ "order": order }))
            .await
            .map_err(internal_error_to_rpc)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct LoopbackTransport {
        inbox: VecDeque<String>,
        sent: Vec<String>,
    }

    #[async_trait]
    impl Transport for LoopbackTransport {
        async fn send(&mut self, frame: String) -> Result<()> {
            self.sent.push(frame);
            Ok(())
        }

        async fn recv(&mut self) -> Result<Option<String>> {
            Ok(self.inbox.pop_front())
        }
    }

    #[tokio::test]
    async fn mismatched_response_id_is_rejected() {
        let response = Response { jsonrpc: "2.0".to_string(), id: Uuid::new_v4(), result: Some(json!({"valid": true})), error: None };
        let mut inbox = VecDeque::new();
        inbox.push_back(serde_json::to_string(&response).unwrap());
        let transport = LoopbackTransport { inbox, sent: vec![] };
        let client = RpcClient::new(transport);
        let err = client.call("GatewayBookerOrder.validate_address", json!({})).await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidRequest));
    }

    #[tokio::test]
    async fn end_of_stream_when_transport_closes() {
        let transport = LoopbackTransport { inbox: VecDeque::new(), sent: vec![] };
        let client = RpcClient::new(transport);
        let err = client.call("GatewayBookerOrder.validate_address", json!({})).await.unwrap_err();
        assert!(matches!(err, RpcError::EndOfStream));
    }
}
