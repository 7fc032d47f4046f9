//! Configuration loading: environment variables for connection endpoints,
//! `gateway.yml` for gateway business parameters (`spec.md` §6).
//!
//! Grounded in the teacher crate's layered `config::Config` + `clap` CLI
//! (`signer` binary), generalized from Stacks-specific fields to the
//! gateway's own environment/file split. The `.env`-then-`gateway.yml`
//! layering matches `config.py`'s `with_environment()` in the original
//! source.

use std::path::{Path, PathBuf};

use bigdecimal::BigDecimal;
use serde::Deserialize;

use crate::error::Result;

/// Database connection parameters, sourced from `DATABASE_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database driver name (collaborator-defined, e.g. `"postgres"`).
    pub driver: String,
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database user.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub name: String,
}

impl DatabaseSettings {
    /// Build a Postgres connection URL from these settings.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.name
        )
    }
}

/// Health endpoint bind address, from `HTTP_HOST`/`HTTP_PORT`.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

/// Booker RPC endpoint, from `BOOKER_HOST`/`BOOKER_PORT`.
#[derive(Debug, Clone, Deserialize)]
pub struct BookerSettings {
    /// Booker host.
    pub host: String,
    /// Booker port.
    pub port: u16,
}

/// ZeroMQ transport endpoint, from `ZMQ_PROTO`/`ZMQ_HOST`/`ZMQ_PORT`.
#[derive(Debug, Clone, Deserialize)]
pub struct ZmqSettings {
    /// Transport scheme, e.g. `"tcp"`.
    pub proto: String,
    /// Bind/connect host.
    pub host: String,
    /// Bind/connect port.
    pub port: u16,
}

/// Gateway business parameters, loaded from `gateway.yml`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Chain-native asset code, e.g. `"TEST"`.
    pub core_asset: String,
    /// Gateway's asset namespace prefix, e.g. `"FINTEHTEST"`.
    pub gateway_prefix: String,
    /// Short asset code the gateway distributes, e.g. `"ETH"`.
    pub gateway_distribute_asset: String,
    /// Chain account this gateway instance controls.
    pub account: String,
    /// Chain node URLs, tried in order by the adapter.
    pub nodes: Vec<String>,
    /// Minimum accepted deposit amount.
    pub min_deposit: BigDecimal,
    /// Minimum accepted withdrawal amount.
    pub min_withdrawal: BigDecimal,
    /// Maximum accepted deposit amount.
    pub max_deposit: BigDecimal,
    /// Maximum accepted withdrawal amount.
    pub max_withdrawal: BigDecimal,
}

impl GatewaySettings {
    /// The fully-qualified asset code the gateway distributes, e.g.
    /// `"FINTEHTEST.ETH"`.
    pub fn asset_code(&self) -> String {
        format!("{}.{}", self.gateway_prefix, self.gateway_distribute_asset)
    }
}

/// Top-level settings assembled from environment and `gateway.yml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Database connection settings.
    pub database: DatabaseSettings,
    /// Health endpoint settings.
    pub http: HttpSettings,
    /// Booker RPC endpoint settings.
    pub booker: BookerSettings,
    /// ZeroMQ transport settings.
    pub zmq: ZmqSettings,
    /// Gateway business parameters.
    pub gateway: GatewaySettings,
}

impl Settings {
    /// Load settings from process environment plus `gateway_yml_path`.
    ///
    /// Environment variables always take the `DATABASE_*`/`HTTP_*`/
    /// `BOOKER_*`/`ZMQ_*` names listed in `spec.md` §6; `gateway.yml` supplies
    /// everything under [`GatewaySettings`].
    pub fn load(gateway_yml_path: impl AsRef<Path>) -> Result<Self> {
        Self::load_from(gateway_yml_path, &config::Environment::default())
    }

    fn load_from(
        gateway_yml_path: impl AsRef<Path>,
        env_source: &config::Environment,
    ) -> Result<Self> {
        let gateway_yml_path: PathBuf = gateway_yml_path.as_ref().to_path_buf();
        let builder = config::Config::builder()
            .add_source(config::File::from(gateway_yml_path).required(true))
            .add_source(env_source.clone().separator("_"));
        let raw = builder.build()?;
        Ok(raw.try_deserialize()?)
    }
}

/// Command-line entry point. The supervisor accepts no flags (`spec.md`
/// §6); the only argument is the path to `gateway.yml`, defaulted via
/// `GATEWAY_CONFIG` so the process can still run with zero flags in
/// production.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "chain-gateway", version = crate::VERSION)]
pub struct Cli {
    /// Path to the `gateway.yml` file.
    #[arg(long, env = "GATEWAY_CONFIG", default_value = "gateway.yml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn asset_code_joins_prefix_and_distribute_asset() {
        let settings = GatewaySettings {
            core_asset: "TEST".to_string(),
            gateway_prefix: "FINTEHTEST".to_string(),
            gateway_distribute_asset: "ETH".to_string(),
            account: "gateway".to_string(),
            nodes: vec![],
            min_deposit: "0.1".parse().unwrap(),
            min_withdrawal: "0.1".parse().unwrap(),
            max_deposit: "1000".parse().unwrap(),
            max_withdrawal: "1000".parse().unwrap(),
        };
        assert_eq!(settings.asset_code(), "FINTEHTEST.ETH");
    }

    #[test]
    fn load_reads_gateway_yml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "core_asset: TEST\n\
             gateway_prefix: FINTEHTEST\n\
             gateway_distribute_asset: ETH\n\
             account: gateway\n\
             nodes: [\"wss://node1\"]\n\
             min_deposit: 0.1\n\
             min_withdrawal: 0.1\n\
             max_deposit: 1000\n\
             max_withdrawal: 1000\n\
             database:\n  driver: postgres\n  host: localhost\n  port: 5432\n  username: u\n  password: p\n  name: gw\n\
             http:\n  host: 0.0.0.0\n  port: 8080\n\
             booker:\n  host: localhost\n  port: 9001\n\
             zmq:\n  proto: tcp\n  host: 0.0.0.0\n  port: 5555\n"
        )
        .unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.gateway.asset_code(), "FINTEHTEST.ETH");
        assert_eq!(settings.database.url(), "postgres://u:p@localhost:5432/gw");
    }
}
