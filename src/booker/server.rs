//! Booker RPC server: dispatches inbound `BookerGatewayOrder` calls from
//! the booker to a handler implementation, over any [`Transport`]
//! (`spec.md` §4.G).
//!
//! `message_dispatch` in the original strips `_coroutine_id` before calling
//! the matched method and catches handler exceptions into the `-32601`/
//! `-32602`/`-32603` code map; this is that dispatch loop reframed as
//! explicit request/response (`spec.md` §9).

use std::sync::Arc;

use serde_json::json;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::api::{BookerGatewayOrder, NewInOrderRequest, Transaction};
use super::registry::CoroutineRegistry;
use super::rpc::{Request, Response, RpcError};
use super::transport::Transport;
use crate::error::Result;

/// Runs the dispatch loop for one connected transport, routing
/// `BookerGatewayOrder.*` calls to `handler`.
pub struct RpcServer<H> {
    handler: Arc<H>,
    coroutines: CoroutineRegistry,
}

impl<H: BookerGatewayOrder> RpcServer<H> {
    /// Build a server dispatching to `handler`.
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler, coroutines: CoroutineRegistry::new() }
    }

    /// Serve `transport` until it closes, dispatching one request at a
    /// time (matching REQ/REP's strict alternation; a WebSocket transport
    /// could pipeline, but none of the concrete methods benefit from it).
    #[instrument(skip(self, transport))]
    pub async fn serve<T: Transport>(&self, mut transport: T) -> Result<()> {
        loop {
            let Some(frame) = transport.recv().await? else {
                return Ok(());
            };
            let response = self.dispatch(&frame).await;
            let encoded = serde_json::to_string(&response)?;
            transport.send(encoded).await?;
        }
    }

    async fn dispatch(&self, frame: &str) -> Response {
        let request: Request = match serde_json::from_str(frame) {
            Ok(request) => request,
            Err(_) => {
                return Response::err(Uuid::new_v4(), &RpcError::ParseError);
            }
        };

        let Some(coroutine_id) = request.coroutine_id() else {
            return Response::err(request.id, &RpcError::InvalidRequest);
        };
        if let Err(err) = self.coroutines.begin(coroutine_id) {
            return Response::err(request.id, &err);
        }

        let result = self.dispatch_method(&request).await;
        self.coroutines.end(coroutine_id);

        match result {
            Ok(value) => Response::ok(request.id, value),
            Err(err) => {
                warn!(method = %request.method, error = %err, "booker RPC call failed");
                Response::err(request.id, &err)
            }
        }
    }

    async fn dispatch_method(&self, request: &Request) -> std::result::Result<serde_json::Value, RpcError> {
        let params = request.params_without_coroutine_id();
        match request.method.as_str() {
            "BookerGatewayOrder.new_in_order_request" => {
                let req: NewInOrderRequest = serde_json::from_value(params).map_err(|_| RpcError::InvalidParams)?;
                self.handler.new_in_order_request(req).await.map_err(|_| RpcError::InternalError)?;
                Ok(json!(null))
            }
            "BookerGatewayOrder.new_in_tx_order" => {
                let tx: Transaction = serde_json::from_value(params).map_err(|_| RpcError::InvalidParams)?;
                self.handler.new_in_tx_order(tx).await.map_err(|_| RpcError::InternalError)?;
                Ok(json!(null))
            }
            "BookerGatewayOrder.update_in_tx_order" => {
                let tx: Transaction = serde_json::from_value(params).map_err(|_| RpcError::InvalidParams)?;
                self.handler.update_in_tx_order(tx).await.map_err(|_| RpcError::InternalError)?;
                Ok(json!(null))
            }
            "BookerGatewayOrder.new_out_tx_order" => {
                let tx: Transaction = serde_json::from_value(params).map_err(|_| RpcError::InvalidParams)?;
                self.handler.new_out_tx_order(tx).await.map_err(|_| RpcError::InternalError)?;
                Ok(json!(null))
            }
            "BookerGatewayOrder.update_out_tx_order" => {
                let tx: Transaction = serde_json::from_value(params).map_err(|_| RpcError::InvalidParams)?;
                self.handler.update_out_tx_order(tx).await.map_err(|_| RpcError::InternalError)?;
                Ok(json!(null))
            }
            _ => Err(RpcError::MethodNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BookerGatewayOrder for RecordingHandler {
        async fn new_in_order_request(&self, _request: NewInOrderRequest) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn new_in_tx_order(&self, _tx: Transaction) -> Result<()> { Ok(()) }
        async fn update_in_tx_order(&self, _tx: Transaction) -> Result<()> { Ok(()) }
        async fn new_out_tx_order(&self, _tx: Transaction) -> Result<()> { Ok(()) }
        async fn update_out_tx_order(&self, _tx: Transaction) -> Result<()> { Ok(()) }
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let server = RpcServer::new(Arc::new(RecordingHandler::default()));
        let request = Request::new("BookerGatewayOrder.bogus", json!({}), Uuid::new_v4());
        let response = server.dispatch(&serde_json::to_string(&request).unwrap()).await;
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, RpcError::MethodNotFound));
    }

    #[tokio::test]
    async fn missing_coroutine_id_is_invalid_request() {
        let server = RpcServer::new(Arc::new(RecordingHandler::default()));
        let request = Request {
            jsonrpc: "2.0".to_string(),
            method: "BookerGatewayOrder.new_in_tx_order".to_string(),
            id: Uuid::new_v4(),
            params: json!({}),
        };
        let response = server.dispatch(&serde_json::to_string(&request).unwrap()).await;
        assert!(matches!(response.into_result().unwrap_err(), RpcError::InvalidRequest));
    }

    #[tokio::test]
    async fn dispatches_to_handler() {
        let handler = Arc::new(RecordingHandler::default());
        let server = RpcServer::new(handler.clone());
        let params = json!({
            "order_id": Uuid::new_v4(),
            "out_tx": Transaction {
                tx_id: Uuid::new_v4(), coin: "FINTEHTEST.ETH".to_string(), tx_hash: None,
                tx_from: None, tx_to: Some("user".to_string()), tx_amount: Some("1.0".parse().unwrap()),
                tx_created_at: None, tx_error: Default::default(), tx_confirmations: 0,
                tx_max_confirmations: 0, memo_to: None,
            },
        });
        let request = Request::new("BookerGatewayOrder.new_in_order_request", params, Uuid::new_v4());
        let response = server.dispatch(&serde_json::to_string(&request).unwrap()).await;
        assert!(response.into_result().is_ok());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }
}
