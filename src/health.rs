//! HTTP health endpoint (`spec.md` §5, §7): returns `200 "Ok"` iff every
//! core task is alive.
//!
//! A minimal collaborator surface per `spec.md` §1 Non-goals, but still
//! wired through `axum` the way the teacher crate serves its own HTTP
//! surfaces rather than hand-rolling a listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderName, StatusCode};
use axum::routing::get;
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared liveness flags for the core tasks named in `spec.md` §5's task
/// set. Each task sets its flag to `false` if it exits unexpectedly; the
/// supervisor clears it back to `true` after a successful restart.
#[derive(Clone, Default)]
pub struct HealthState {
    watcher_alive: Arc<AtomicBool>,
    confirmer_alive: Arc<AtomicBool>,
    broadcaster_alive: Arc<AtomicBool>,
    notify_booker_alive: Arc<AtomicBool>,
    rpc_server_alive: Arc<AtomicBool>,
}

impl HealthState {
    /// Construct a health state with every task marked alive.
    pub fn new() -> Self {
        Self {
            watcher_alive: Arc::new(AtomicBool::new(true)),
            confirmer_alive: Arc::new(AtomicBool::new(true)),
            broadcaster_alive: Arc::new(AtomicBool::new(true)),
            notify_booker_alive: Arc::new(AtomicBool::new(true)),
            rpc_server_alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A handle tracking one named task's liveness.
    pub fn watcher(&self) -> Arc<AtomicBool> {
        self.watcher_alive.clone()
    }

    /// A handle tracking the confirmer task's liveness.
    pub fn confirmer(&self) -> Arc<AtomicBool> {
        self.confirmer_alive.clone()
    }

    /// A handle tracking the broadcaster task's liveness.
    pub fn broadcaster(&self) -> Arc<AtomicBool> {
        self.broadcaster_alive.clone()
    }

    /// A handle tracking the booker-notification task's liveness.
    pub fn notify_booker(&self) -> Arc<AtomicBool> {
        self.notify_booker_alive.clone()
    }

    /// A handle tracking the RPC server task's liveness.
    pub fn rpc_server(&self) -> Arc<AtomicBool> {
        self.rpc_server_alive.clone()
    }

    /// True iff every tracked task is currently alive.
    pub fn all_alive(&self) -> bool {
        self.watcher_alive.load(Ordering::SeqCst)
            && self.confirmer_alive.load(Ordering::SeqCst)
            && self.broadcaster_alive.load(Ordering::SeqCst)
            && self.notify_booker_alive.load(Ordering::SeqCst)
            && self.rpc_server_alive.load(Ordering::SeqCst)
    }
}

/// Build the health-check router. Every response carries an `x-request-id`
/// header so a probe failure can be correlated against the task logs it
/// triggered.
pub fn router(state: HealthState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    Router::new()
        .route("/health", get(health_handler))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

async fn health_handler(State(state): State<HealthState>) -> (StatusCode, &'static str) {
    if state.all_alive() {
        (StatusCode::OK, "Ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Degraded")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_alive_by_default() {
        let state = HealthState::new();
        assert!(state.all_alive());
    }

    #[test]
    fn one_dead_task_marks_unhealthy() {
        let state = HealthState::new();
        state.confirmer().store(false, Ordering::SeqCst);
        assert!(!state.all_alive());
    }
}
