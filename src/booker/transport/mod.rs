//! Pluggable transports for the booker RPC (`spec.md` §4.G): at minimum
//! WebSocket and ZeroMQ, both symmetric (a process can be client on one and
//! server on another).

pub mod websocket;
pub mod zeromq;

use async_trait::async_trait;

use crate::error::Result;

/// One full-duplex message stream, framed at the transport boundary. A
/// `Transport` moves raw JSON-RPC text frames; the booker client/server
/// layers own parsing.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one JSON-RPC text frame.
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Receive one JSON-RPC text frame. Returns `Ok(None)` when the peer
    /// closed the stream cleanly.
    async fn recv(&mut self) -> Result<Option<String>>;
}
