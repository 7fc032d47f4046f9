//! Application context: the single place the rest of the gateway reaches
//! for the chain adapter, the store, configuration, and the shutdown
//! signal.
//!
//! The original source keeps a process-global "shared instance" of the
//! chain client (`init_bitshares()` in `bitshares_utils.py`); `spec.md` §9
//! calls this out as an idiom to re-architect. This module is that
//! re-architecture: an explicit [`Context`] trait threaded through every
//! task constructor instead of global state, mirroring the teacher crate's
//! own `Context` trait (used throughout `signer::block_observer` as
//! `self.context.get_storage()`, `get_bitcoin_client()`,
//! `get_termination_handle()`).

use std::sync::Arc;

use tokio::sync::watch;

use crate::chain::ChainAdapter;
use crate::config::Settings;
use crate::storage::{DbRead, DbWrite};

/// A handle that lets a task observe and request application shutdown.
#[derive(Clone)]
pub struct TerminationHandle {
    shutdown_rx: watch::Receiver<bool>,
    shutdown_tx: watch::Sender<bool>,
}

impl TerminationHandle {
    /// True once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Resolves once shutdown has been requested. Intended for use in a
    /// `tokio::select!` alongside a task's normal work.
    pub async fn wait_for_shutdown(&mut self) {
        let _ = self.shutdown_rx.changed().await;
    }

    /// Request shutdown. Idempotent.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Everything a task needs to do its job, without reaching for global
/// state. Implementations are cheap to clone (an `Arc` bundle) so each
/// spawned task gets its own handle.
pub trait Context: Clone + Send + Sync + 'static {
    /// Storage backend, typed as the full read/write trait.
    type Storage: DbRead + DbWrite + Clone + Send + Sync + 'static;
    /// Chain adapter implementation.
    type Chain: ChainAdapter + Send + Sync + 'static;

    /// The store.
    fn get_storage(&self) -> Arc<Self::Storage>;

    /// The chain adapter.
    fn get_chain_adapter(&self) -> Arc<Self::Chain>;

    /// Gateway configuration.
    fn get_settings(&self) -> Arc<Settings>;

    /// Shutdown signal handle.
    fn get_termination_handle(&self) -> TerminationHandle;
}

/// The production [`Context`] implementation: a real store and chain
/// adapter behind `Arc`s, plus a shared shutdown broadcast.
pub struct GatewayContext<S, C> {
    storage: Arc<S>,
    chain: Arc<C>,
    settings: Arc<Settings>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

// Written by hand rather than `#[derive(Clone)]`: the derive would add
// `S: Clone` / `C: Clone` bounds even though every field is an `Arc`.
impl<S, C> Clone for GatewayContext<S, C> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            chain: self.chain.clone(),
            settings: self.settings.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
            shutdown_rx: self.shutdown_rx.clone(),
        }
    }
}

impl<S, C> GatewayContext<S, C>
where
    S: DbRead + DbWrite + Clone + Send + Sync + 'static,
    C: ChainAdapter + Send + Sync + 'static,
{
    /// Build a new context from a store, a chain adapter, and settings.
    pub fn new(storage: S, chain: C, settings: Settings) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            storage: Arc::new(storage),
            chain: Arc::new(chain),
            settings: Arc::new(settings),
            shutdown_tx,
            shutdown_rx,
        }
    }
}

impl<S, C> Context for GatewayContext<S, C>
where
    S: DbRead + DbWrite + Clone + Send + Sync + 'static,
    C: ChainAdapter + Send + Sync + 'static,
{
    type Storage = S;
    type Chain = C;

    fn get_storage(&self) -> Arc<S> {
        self.storage.clone()
    }

    fn get_chain_adapter(&self) -> Arc<C> {
        self.chain.clone()
    }

    fn get_settings(&self) -> Arc<Settings> {
        self.settings.clone()
    }

    fn get_termination_handle(&self) -> TerminationHandle {
        TerminationHandle {
            shutdown_rx: self.shutdown_rx.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }
}
