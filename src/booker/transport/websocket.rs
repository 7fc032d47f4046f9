//! WebSocket transport: a client built on `tokio-tungstenite`, and a server
//! accept loop built on `axum`'s WebSocket upgrade, following the teacher
//! crate's `axum` usage conventions for its own HTTP surface.

use async_trait::async_trait;
use axum::extract::ws::{Message as AxumMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::error::{Error, Result};

use super::Transport;

/// Client-side WebSocket transport.
pub struct WebSocketClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketClient {
    /// Connect to a booker RPC WebSocket endpoint at `url`.
    #[instrument]
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _response) = connect_async(url).await?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl Transport for WebSocketClient {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.stream.send(TungsteniteMessage::Text(frame)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Ok(TungsteniteMessage::Text(text))) => return Ok(Some(text)),
                Some(Ok(TungsteniteMessage::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(Error::WebSocket(err)),
            }
        }
    }
}

/// Server-side WebSocket transport, handed to the RPC server's accept loop
/// once a peer has upgraded.
pub struct WebSocketServerConn {
    socket: WebSocket,
}

#[async_trait]
impl Transport for WebSocketServerConn {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.socket
            .send(AxumMessage::Text(frame))
            .await
            .map_err(|err| Error::Io(std::io::Error::other(err)))?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        loop {
            match self.socket.next().await {
                None => return Ok(None),
                Some(Ok(AxumMessage::Text(text))) => return Ok(Some(text)),
                Some(Ok(AxumMessage::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(Error::Io(std::io::Error::other(err))),
            }
        }
    }
}

/// Build the axum router accepting booker RPC WebSocket connections. Each
/// accepted connection is handed off on `connections`; the caller owns
/// pulling from that channel and running one RPC server loop per
/// connection.
pub fn router(connections: mpsc::Sender<WebSocketServerConn>) -> Router {
    Router::new()
        .route("/rpc", get(upgrade_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(connections)
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    State(connections): State<mpsc::Sender<WebSocketServerConn>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let _ = connections.send(WebSocketServerConn { socket }).await;
    })
}
