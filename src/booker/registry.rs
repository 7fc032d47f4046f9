//! Server-side `coroutine_id → state` bookkeeping (`spec.md` §4.G, §9).
//!
//! The original source models each RPC method as a Python async generator:
//! the client can keep "sending" values into an already-open call, and the
//! server keeps per-call generator state alive across round-trips keyed by
//! `_coroutine_id`. None of the two concrete APIs in `spec.md` §4.G
//! actually needs more than one round trip per call, so this registry only
//! tracks *liveness* of a coroutine id across the single request/response
//! pair it spans: a server rejects a `_coroutine_id` it has already seen
//! and closed (replay), and a call that is still open when the connection
//! drops is reported via [`RpcError::EndOfStream`] rather than left
//! dangling.

use std::collections::HashSet;
use std::sync::Mutex;

use uuid::Uuid;

use super::rpc::RpcError;

/// Tracks which `_coroutine_id`s currently have an open call in flight.
#[derive(Default)]
pub struct CoroutineRegistry {
    open: Mutex<HashSet<Uuid>>,
}

impl CoroutineRegistry {
    /// Build an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as open. Fails if `id` is already open (duplicate
    /// `_coroutine_id`, e.g. a replayed request).
    pub fn begin(&self, id: Uuid) -> Result<(), RpcError> {
        let mut open = self.open.lock().unwrap();
        if !open.insert(id) {
            return Err(RpcError::InvalidRequest);
        }
        Ok(())
    }

    /// Mark `id` as closed, as the server does once a method has produced
    /// its one result (or its `EndOfStream` terminator).
    pub fn end(&self, id: Uuid) {
        self.open.lock().unwrap().remove(&id);
    }

    /// True iff `id` is currently open.
    pub fn is_open(&self, id: Uuid) -> bool {
        self.open.lock().unwrap().contains(&id)
    }
}
