//! Process entry point: loads configuration, builds the application
//! context, and runs the supervised task set until a shutdown signal
//! arrives (`spec.md` §5, §6).
//!
//! Wiring mirrors the bottom section of the original `src/app.py` (one
//! `loop.create_task` per component, `loop.run_forever()`), restructured
//! into the teacher crate's `main.rs` shape: parse CLI, build context,
//! spawn tasks, join.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chain_gateway::booker::api::{BookerGatewayOrder, GatewayBookerOrder, NewInOrderRequest, Order, Transaction};
use chain_gateway::booker::client::RpcClient;
use chain_gateway::booker::transport::websocket::WebSocketClient;
use chain_gateway::booker::transport::zeromq::ZmqServer;
use chain_gateway::booker::transport::Transport;
use chain_gateway::booker::RpcServer;
use chain_gateway::chain::fake::FakeChainAdapter;
use chain_gateway::chain::ChainAdapter;
use chain_gateway::config::{Cli, Settings};
use chain_gateway::context::{Context, GatewayContext};
use chain_gateway::error::Result;
use chain_gateway::storage::{postgres, Operation, OrderType};
use chain_gateway::{broadcaster::Broadcaster, confirmer::Confirmer, health, metrics, supervisor, watcher::Watcher};
use clap::Parser;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Implements the gateway side of the booker RPC (`BookerGatewayOrder`),
/// delegating withdrawal planning to the [`Broadcaster`].
struct GatewayRpcHandler<Ctx> {
    context: Ctx,
}

#[async_trait::async_trait]
impl<Ctx: Context> BookerGatewayOrder for GatewayRpcHandler<Ctx> {
    async fn new_in_order_request(&self, request: NewInOrderRequest) -> Result<()> {
        let out_tx = request.out_tx;
        let op = Operation::new_planned_withdrawal(
            request.order_id,
            out_tx.coin,
            self.context.get_settings().gateway.account.clone(),
            out_tx.tx_to.unwrap_or_default(),
            out_tx.tx_amount.unwrap_or_default(),
        );
        Broadcaster::new(self.context.clone()).plan_withdrawal(op).await?;
        Ok(())
    }

    async fn new_in_tx_order(&self, tx: Transaction) -> Result<()> {
        info!(tx_id = %tx.tx_id, "booker reported new inbound transaction order");
        Ok(())
    }

    async fn update_in_tx_order(&self, tx: Transaction) -> Result<()> {
        info!(tx_id = %tx.tx_id, "booker reported update to inbound transaction order");
        Ok(())
    }

    async fn new_out_tx_order(&self, tx: Transaction) -> Result<()> {
        info!(tx_id = %tx.tx_id, "booker reported new outbound transaction order");
        Ok(())
    }

    async fn update_out_tx_order(&self, tx: Transaction) -> Result<()> {
        info!(tx_id = %tx.tx_id, "booker reported update to outbound transaction order");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    let store = postgres::Store::connect(&settings.database.url(), 10).await?;
    // The concrete blockchain SDK integration is a collaborator concern
    // (`spec.md` §1); production wiring plugs a real `ChainAdapter` in here.
    let chain = FakeChainAdapter::new();
    chain.connect(&settings.gateway.nodes, &settings.gateway.account).await?;

    let health_state = health::HealthState::new();
    let http_addr: SocketAddr = format!("{}:{}", settings.http.host, settings.http.port).parse()?;
    // Prometheus gets its own listener one port above the health endpoint;
    // `spec.md`'s collaborator-owned Non-goals exclude a metrics surface but
    // not the ambient instrumentation itself.
    let metrics_addr = SocketAddr::new(http_addr.ip(), http_addr.port() + 1);
    metrics::install(metrics_addr)?;

    let context = GatewayContext::new(store, chain, settings.clone());
    Watcher::new(context.clone()).synchronize().await?;

    let supervisor = Arc::new(supervisor::Supervisor::new());
    let (notify_tx, notify_rx) = mpsc::unbounded_channel::<Operation>();

    let http_router = health::router(health_state.clone());
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_task = tokio::spawn(async move {
        axum::serve(http_listener, http_router).await.expect("health listener crashed");
    });

    let watcher_task = spawn_watcher(context.clone(), supervisor.clone(), health_state.watcher());
    let confirmer_task = spawn_confirmer(context.clone(), supervisor.clone(), health_state.confirmer(), notify_tx.clone());
    let broadcaster_task = spawn_broadcaster(context.clone(), supervisor.clone(), health_state.broadcaster(), notify_tx);
    let rpc_task = spawn_rpc_server(context.clone(), supervisor.clone(), health_state.rpc_server());
    let notify_task = spawn_notify_booker(
        notify_rx,
        context.get_settings(),
        supervisor.clone(),
        health_state.notify_booker(),
    );

    let signal_supervisor = supervisor.clone();
    let signal_task = tokio::spawn(async move { signal_supervisor.wait_for_signal().await });

    tokio::select! {
        _ = http_task => {},
        _ = watcher_task => {},
        _ = confirmer_task => {},
        _ = broadcaster_task => {},
        _ = rpc_task => {},
        _ = notify_task => {},
        _ = signal_task => {},
    }

    Ok(())
}

/// Spawns `watch_account_history` (`spec.md` §5): repeats [`Watcher::tick`]
/// until shutdown, restarting it on transport errors via the supervisor.
fn spawn_watcher<C: Context>(
    context: C,
    supervisor: Arc<supervisor::Supervisor>,
    alive: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let watcher = Watcher::new(context);
        loop {
            let result = supervisor
                .supervise(supervisor::RestartableTask::Watcher, || async { watcher.tick().await })
                .await;
            if result.is_err() || supervisor.is_shutdown() {
                alive.store(result.is_ok(), Ordering::SeqCst);
                return;
            }
        }
    })
}

/// Spawns `watch_unconfirmed_operations`, sweeping every few seconds and
/// forwarding every operation whose confirmation state changed to
/// `notify_booker`.
fn spawn_confirmer<C: Context>(
    context: C,
    supervisor: Arc<supervisor::Supervisor>,
    alive: Arc<AtomicBool>,
    notify_tx: mpsc::UnboundedSender<Operation>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let confirmer = Confirmer::new(context);
        loop {
            let result = supervisor
                .supervise(supervisor::RestartableTask::Confirmer, || async {
                    let changed = confirmer.tick().await?;
                    for op in changed {
                        let _ = notify_tx.send(op);
                    }
                    Ok(())
                })
                .await;
            if result.is_err() {
                alive.store(false, Ordering::SeqCst);
                return;
            }
            if supervisor.is_shutdown() {
                return;
            }
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
    })
}

/// Spawns `broadcast_transactions`, sweeping planned withdrawals every
/// second and forwarding every row that broadcast successfully to
/// `notify_booker`.
fn spawn_broadcaster<C: Context>(
    context: C,
    supervisor: Arc<supervisor::Supervisor>,
    alive: Arc<AtomicBool>,
    notify_tx: mpsc::UnboundedSender<Operation>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let broadcaster = Broadcaster::new(context);
        loop {
            let result = supervisor
                .supervise(supervisor::RestartableTask::Broadcaster, || async {
                    let broadcast = broadcaster.tick().await?;
                    for op in broadcast {
                        let _ = notify_tx.send(op);
                    }
                    Ok(())
                })
                .await;
            if result.is_err() {
                alive.store(false, Ordering::SeqCst);
                return;
            }
            if supervisor.is_shutdown() {
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    })
}

/// Builds the booker-facing leg of an operation update and calls the
/// matching `GatewayBookerOrder` method (`spec.md` §4.G): a `Deposit` row
/// is the inbound leg, a `Withdrawal` row the outbound leg. Rows with no
/// `order_id` are not part of a booker order and are skipped.
async fn push_to_booker<T: Transport>(client: &RpcClient<T>, op: Operation) -> Result<()> {
    let Some(order_id) = op.order_id else {
        return Ok(());
    };
    let tx = Transaction::from_operation(&op, order_id);
    let order_type = op.order_type.into();
    // `DEPOSIT` rows have `from_account = gateway` (`spec.md` §3): the
    // observed transaction is the order's outbound leg. `WITHDRAWAL` rows
    // have `to_account = gateway`: the observed transaction is the inbound
    // leg (`spec.md` §4.E, scenarios S1/S2).
    match op.order_type {
        OrderType::Deposit => {
            client
                .new_out_order(Order { order_id, order_type, in_tx: None, out_tx: Some(tx) })
                .await
        }
        OrderType::Withdrawal => {
            client
                .new_in_order(Order { order_id, order_type, in_tx: Some(tx), out_tx: None })
                .await
        }
        OrderType::Trash => Ok(()),
    }
}

/// Spawns `notify_booker`: drains operation updates from the Confirmer and
/// Broadcaster and pushes them to the booker over a persistent WebSocket
/// connection, reconnecting on failure.
fn spawn_notify_booker(
    rx: mpsc::UnboundedReceiver<Operation>,
    settings: Arc<Settings>,
    supervisor: Arc<supervisor::Supervisor>,
    alive: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut updates = UnboundedReceiverStream::new(rx);
        let endpoint = format!("ws://{}:{}/rpc", settings.booker.host, settings.booker.port);
        loop {
            if supervisor.is_shutdown() {
                return;
            }
            let client = match WebSocketClient::connect(&endpoint).await {
                Ok(transport) => RpcClient::new(transport),
                Err(err) => {
                    warn!(error = %err, "failed to connect to booker, retrying");
                    alive.store(false, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };
            alive.store(true, Ordering::SeqCst);

            while let Some(op) = updates.next().await {
                if let Err(err) = push_to_booker(&client, op).await {
                    warn!(error = %err, "failed to push operation update to booker");
                    metrics::booker_push_failed();
                    break;
                }
                if supervisor.is_shutdown() {
                    return;
                }
            }
        }
    })
}

/// Spawns `rpc_server.poll`: binds the ZeroMQ REQ/REP endpoint and serves
/// `BookerGatewayOrder` calls until the socket closes, then rebinds.
fn spawn_rpc_server<C: Context>(
    context: C,
    supervisor: Arc<supervisor::Supervisor>,
    alive: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let settings = context.get_settings();
        let endpoint = format!("{}://{}:{}", settings.zmq.proto, settings.zmq.host, settings.zmq.port);
        let handler = Arc::new(GatewayRpcHandler { context });
        let server = RpcServer::new(handler);

        loop {
            let result = supervisor
                .supervise(supervisor::RestartableTask::RpcServer, || async {
                    let transport = ZmqServer::bind(&endpoint).await?;
                    server.serve(transport).await
                })
                .await;
            if result.is_err() || supervisor.is_shutdown() {
                alive.store(result.is_ok(), Ordering::SeqCst);
                return;
            }
        }
    })
}
