//! Top-level error type for the gateway.
//!
//! Mirrors the teacher crate's style of a single [`thiserror::Error`] enum
//! with one variant per failure mode rather than a hierarchy of exception
//! types (REDESIGN FLAGS, `spec.md` §9).

/// Errors produced anywhere in the gateway core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// All configured chain nodes were unreachable during `connect`.
    #[error("all chain nodes unreachable: {0:?}")]
    NodeUnreachable(Vec<String>),

    /// A requested block has not been produced yet.
    #[error("block {0} is not yet available")]
    BlockMissing(u64),

    /// A raw chain operation referenced an account that is neither the
    /// gateway account's source nor destination. This indicates the chain
    /// history feed was not filtered to the gateway account and is a
    /// programmer error, not a recoverable condition.
    #[error("operation {0} does not involve the gateway account")]
    OperationNotForGateway(String),

    /// `tx-hash-from-op` found zero matching transactions in the op's block.
    #[error("no transaction in block {block_num} matches operation {op_id}")]
    TransactionNotFound {
        /// Chain operation id.
        op_id: String,
        /// Block height searched.
        block_num: u64,
    },

    /// `tx-hash-from-op` found more than one matching transaction.
    #[error("{count} transactions in block {block_num} match operation {op_id}")]
    OperationsCollision {
        /// Chain operation id.
        op_id: String,
        /// Block height searched.
        block_num: u64,
        /// Number of matching transactions found.
        count: usize,
    },

    /// A withdrawal memo failed the `ASSET:DEST` mask.
    #[error("memo `{0}` does not match the required ASSET:DEST mask")]
    InvalidMemoMask(String),

    /// Decryption of an encrypted private key failed, either because the
    /// password was wrong or the ciphertext was corrupt.
    #[error("failed to decrypt key material")]
    DecryptionError,

    /// An `Operation` row that the Watcher expected to already exist (a
    /// planned `WAIT` row awaiting confirmation) was not found.
    #[error("no pending WAIT operation matches tx_hash {0}")]
    UnmatchedDeposit(String),

    /// A `GatewayWallet` row was looked up for an account that has not been
    /// synchronized yet.
    #[error("no gateway wallet row for account {0}")]
    WalletNotFound(String),

    /// Wraps a booker RPC error surfaced to or from this process.
    #[error(transparent)]
    Rpc(#[from] crate::booker::rpc::RpcError),

    /// Wraps a SQL/connection-pool error from the storage layer.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Wraps an HTTP client error (e.g. a booker push over HTTP/websocket
    /// handshake, or a chain RPC call in the collaborator adapter).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Wraps a websocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Wraps a ZeroMQ transport error.
    #[error("zeromq error: {0}")]
    ZeroMq(#[from] zeromq::ZmqError),

    /// Wraps a JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wraps configuration loading errors.
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Wraps file I/O errors (key storage file, config file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A task's channel peer was dropped before a reply arrived.
    #[error("internal channel closed unexpectedly")]
    ChannelClosed,

    /// Task was cancelled as part of supervisor shutdown.
    #[error("cancelled")]
    Cancelled,

    /// A configured `host:port` pair did not parse as a socket address.
    #[error("invalid socket address: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
