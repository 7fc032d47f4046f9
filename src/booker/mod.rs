//! Booker RPC (`spec.md` §4.G): the bidirectional JSON-RPC 2.0 protocol
//! between the gateway and the back-office order coordinator.
//!
//! Layered as the spec describes: [`rpc`] is the wire envelope, [`transport`]
//! is the pluggable byte-stream layer (WebSocket, ZeroMQ), and [`api`] is
//! the pair of typed service contracts. [`client`]/[`server`] wire those
//! layers together for each direction of the connection.

pub mod api;
pub mod client;
pub mod registry;
pub mod rpc;
pub mod server;
pub mod transport;

pub use api::{BookerGatewayOrder, GatewayBookerOrder};
pub use client::RpcClient;
pub use server::RpcServer;
