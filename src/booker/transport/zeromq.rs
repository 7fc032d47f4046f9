//! ZeroMQ REQ/REP transport (`spec.md` §4.G).
//!
//! The teacher crate only uses `bitcoincore-zmq`, a Bitcoin-specific
//! pub/sub client, so this module reaches into the wider pack's choice of
//! the generic `zeromq` crate for a REQ/REP socket pair instead of
//! fabricating one.

use async_trait::async_trait;
use zeromq::{Socket, SocketRecv, SocketSend, ZmqMessage};

use crate::error::Result;

use super::Transport;

/// Client-side ZeroMQ transport: one REQ socket per booker connection.
pub struct ZmqClient {
    socket: zeromq::ReqSocket,
}

impl ZmqClient {
    /// Connect a REQ socket to `endpoint` (e.g. `"tcp://127.0.0.1:5555"`).
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let mut socket = zeromq::ReqSocket::new();
        socket.connect(endpoint).await?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl Transport for ZmqClient {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.socket.send(ZmqMessage::from(frame)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        let message = self.socket.recv().await?;
        let bytes = message.into_vec();
        let text = bytes
            .first()
            .map(|frame| String::from_utf8_lossy(frame).into_owned())
            .unwrap_or_default();
        Ok(Some(text))
    }
}

/// Server-side ZeroMQ transport: one REP socket, request-then-reply,
/// matching REQ/REP's strict alternation.
pub struct ZmqServer {
    socket: zeromq::RepSocket,
}

impl ZmqServer {
    /// Bind a REP socket at `endpoint`.
    pub async fn bind(endpoint: &str) -> Result<Self> {
        let mut socket = zeromq::RepSocket::new();
        socket.bind(endpoint).await?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl Transport for ZmqServer {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.socket.send(ZmqMessage::from(frame)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        let message = self.socket.recv().await?;
        let bytes = message.into_vec();
        let text = bytes
            .first()
            .map(|frame| String::from_utf8_lossy(frame).into_owned())
            .unwrap_or_default();
        Ok(Some(text))
    }
}
