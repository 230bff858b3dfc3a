// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! CLI flags and coin-config JSON, merged into one effective [`DaemonConfig`].
//!
//! Precedence is CLI flag (when explicitly supplied) > coin-config JSON
//! field (when present) > hardcoded default. Boolean coin-config fields are
//! `Option<bool>` so "unset" and "false" are distinguishable; the merge
//! never consults one field's value to decide another's, unlike the
//! original daemon this is modeled on.

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

/// Errors produced while loading or merging configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The coin-config file could not be read.
    #[error("reading coin config {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The coin-config file was not valid JSON.
    #[error("parsing coin config {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// `bootstrap_chains` was present but not valid JSON.
    #[error("parsing bootstrap_chains: {0}")]
    BootstrapChains(serde_json::Error),
}

/// Command-line flags, matching the external interface documented in
/// `SPEC_FULL.md` §6.
#[derive(Parser, Clone, Debug)]
#[command(name = "phantomd", about = "Phantom masternode liveness daemon")]
pub struct CliArgs {
    /// Path to a coin-config JSON file overlaying these defaults. Attempted
    /// unconditionally (warn-and-continue if absent) even when the flag is
    /// omitted, per spec §6's documented default.
    #[arg(long, default_value = "coinconf.json")]
    pub coin_conf: Option<String>,
    /// Path to the masternode credentials file.
    #[arg(long)]
    pub masternode_conf: Option<String>,
    /// Minimum live connections before the watchdog requests a restart.
    #[arg(long)]
    pub min_connections: Option<u32>,
    /// Maximum simultaneous outbound connections.
    #[arg(long)]
    pub max_connections: Option<u32>,
    /// Minutes without a new block before the watchdog requests a restart.
    #[arg(long)]
    pub noblock_minutes: Option<u32>,
    /// Network magic bytes, hex encoded (e.g. `bf0c6bbd`).
    #[arg(long)]
    pub magicbytes: Option<String>,
    /// Default peer TCP port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Protocol version number advertised in `version` messages.
    #[arg(long)]
    pub protocol_number: Option<u32>,
    /// Prefix used in the legacy signing message.
    #[arg(long)]
    pub magic_message: Option<String>,
    /// Whether the magic message is newline-terminated before signing.
    #[arg(long)]
    pub magic_message_newline: Option<bool>,
    /// Comma-separated bootstrap peer IPs.
    #[arg(long)]
    pub bootstrap_ips: Option<String>,
    /// Comma-separated DNS seed hostnames.
    #[arg(long)]
    pub dns_seeds: Option<String>,
    /// Fallback block hash (hex) used if no bootstrap chain responds.
    #[arg(long)]
    pub bootstrap_hash: Option<String>,
    /// JSON array of remote-chain bootstrap connection definitions.
    #[arg(long)]
    pub bootstrap_chains: Option<String>,
    /// Static sentinel version as `a.b.c`, bypassing auto-sense when set
    /// together with `daemon_version`.
    #[arg(long)]
    pub sentinel_version: Option<String>,
    /// Static daemon version as `a.b.c`, bypassing auto-sense when set
    /// together with `sentinel_version`.
    #[arg(long)]
    pub daemon_version: Option<String>,
    /// User agent string advertised in `version` messages.
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Whether to relay masternode broadcasts to peers.
    #[arg(long)]
    pub broadcast_listen: Option<bool>,
    /// Whether to run the auto-sense analyzer before pinging.
    #[arg(long)]
    pub autosense: Option<bool>,
    /// Path to the persistent peer cache database.
    #[arg(long)]
    pub db_path: Option<String>,
    /// Raise logging to debug level.
    #[arg(long)]
    pub debug: bool,
}

/// Coin-config JSON overlay. Every field is optional; absence means "defer
/// to the CLI flag or hardcoded default".
#[derive(Deserialize, Clone, Debug, Default)]
pub struct CoinConf {
    #[serde(default)]
    pub min_connections: Option<u32>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub noblock_minutes: Option<u32>,
    #[serde(default)]
    pub magicbytes: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol_number: Option<u32>,
    #[serde(default)]
    pub magic_message: Option<String>,
    #[serde(default)]
    pub magic_message_newline: Option<bool>,
    #[serde(default)]
    pub bootstrap_ips: Option<String>,
    #[serde(default)]
    pub dns_seeds: Option<String>,
    #[serde(default)]
    pub bootstrap_hash: Option<String>,
    #[serde(default)]
    pub bootstrap_chains: Option<serde_json::Value>,
    #[serde(default)]
    pub sentinel_version: Option<String>,
    #[serde(default)]
    pub daemon_version: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub broadcast_listen: Option<bool>,
    #[serde(default)]
    pub autosense: Option<bool>,
}

/// One entry of a parsed `bootstrap_chains` definition.
#[derive(Deserialize, Clone, Debug)]
pub struct BootstrapChainDef {
    /// Explorer format (`iquidus`, `insight`, `bulwark`, `cryptoid`,
    /// `coinexplorer`, `blockbook`, `rpc`), case-insensitive.
    pub format: String,
    /// Base URL of the explorer or RPC endpoint.
    pub url: String,
    /// Optional RPC basic-auth username.
    #[serde(default)]
    pub username: Option<String>,
    /// Optional RPC basic-auth password.
    #[serde(default)]
    pub password: Option<String>,
}

/// Fully merged, ready-to-use daemon configuration.
#[derive(Clone, Debug)]
pub struct DaemonConfig {
    pub coin_conf: Option<String>,
    pub masternode_conf: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub noblock_minutes: u32,
    pub magicbytes: [u8; 4],
    pub port: u16,
    pub protocol_number: u32,
    pub magic_message: String,
    pub magic_message_newline: bool,
    pub bootstrap_ips: Vec<String>,
    pub dns_seeds: Vec<String>,
    pub bootstrap_hash: Option<[u8; 32]>,
    pub bootstrap_chains: Vec<BootstrapChainDef>,
    pub sentinel_version: Option<u32>,
    pub daemon_version: Option<u32>,
    pub user_agent: String,
    pub broadcast_listen: bool,
    pub autosense: bool,
    pub db_path: String,
    pub debug: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            coin_conf: Some("coinconf.json".to_string()),
            masternode_conf: "masternode.conf".to_string(),
            min_connections: 0,
            max_connections: 10,
            noblock_minutes: 0,
            magicbytes: [0xbf, 0x0c, 0x6b, 0xbd],
            port: 9999,
            protocol_number: 70_208,
            magic_message: "DarkNet Signed Message:".to_string(),
            magic_message_newline: true,
            bootstrap_ips: Vec::new(),
            dns_seeds: Vec::new(),
            bootstrap_hash: None,
            bootstrap_chains: Vec::new(),
            sentinel_version: None,
            daemon_version: None,
            user_agent: "/phantomd:1.0.0/".to_string(),
            broadcast_listen: true,
            autosense: true,
            db_path: "./peers.db".to_string(),
            debug: false,
        }
    }
}

fn parse_magicbytes(s: &str, default: [u8; 4]) -> [u8; 4] {
    match hex::decode(s) {
        Ok(bytes) if bytes.len() == 4 => {
            let mut out = [0u8; 4];
            out.copy_from_slice(&bytes);
            out
        }
        _ => default,
    }
}

/// Parse a `a.b.c` version string into its encoded `u32` form (spec §6
/// "Version-encoded integers": `a*10^6 + b*10^3 + c`). Malformed input is
/// ignored rather than treated as fatal, mirroring [`parse_magicbytes`]'s
/// silent-fallback behavior for other string-encoded flags.
fn parse_version_triple(s: &str) -> Option<u32> {
    let mut parts = s.split('.');
    let a: u32 = parts.next()?.parse().ok()?;
    let b: u32 = parts.next()?.parse().ok()?;
    let c: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || a > 255 || b > 255 || c > 255 {
        return None;
    }
    Some(crate::core::types::encode_version(a, b, c))
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Load the coin-config JSON file referenced by `path`, if any.
pub fn load_coin_conf(path: &str) -> Result<CoinConf, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

/// Merge CLI flags and an optional coin-config overlay into an effective
/// configuration. CLI flags win when present; otherwise the coin-config
/// value is used; otherwise the hardcoded default.
pub fn merge(cli: &CliArgs, coin: Option<&CoinConf>) -> Result<DaemonConfig, ConfigError> {
    let defaults = DaemonConfig::default();
    let coin = coin.cloned().unwrap_or_default();

    let magicbytes_str = cli
        .magicbytes
        .clone()
        .or(coin.magicbytes.clone());
    let bootstrap_hash_str = cli.bootstrap_hash.clone().or(coin.bootstrap_hash.clone());
    let bootstrap_chains_value = cli
        .bootstrap_chains
        .as_ref()
        .map(|s| serde_json::from_str::<serde_json::Value>(s))
        .transpose()
        .map_err(ConfigError::BootstrapChains)?
        .or(coin.bootstrap_chains.clone());

    let bootstrap_chains = match bootstrap_chains_value {
        Some(v) => serde_json::from_value::<Vec<BootstrapChainDef>>(v)
            .map_err(ConfigError::BootstrapChains)?,
        None => Vec::new(),
    };

    Ok(DaemonConfig {
        coin_conf: cli.coin_conf.clone().or(defaults.coin_conf.clone()),
        masternode_conf: cli
            .masternode_conf
            .clone()
            .unwrap_or(defaults.masternode_conf),
        min_connections: cli
            .min_connections
            .or(coin.min_connections)
            .unwrap_or(defaults.min_connections),
        max_connections: cli
            .max_connections
            .or(coin.max_connections)
            .unwrap_or(defaults.max_connections),
        noblock_minutes: cli
            .noblock_minutes
            .or(coin.noblock_minutes)
            .unwrap_or(defaults.noblock_minutes),
        magicbytes: magicbytes_str
            .map(|s| parse_magicbytes(&s, defaults.magicbytes))
            .unwrap_or(defaults.magicbytes),
        port: cli.port.or(coin.port).unwrap_or(defaults.port),
        protocol_number: cli
            .protocol_number
            .or(coin.protocol_number)
            .unwrap_or(defaults.protocol_number),
        magic_message: cli
            .magic_message
            .clone()
            .or(coin.magic_message.clone())
            .unwrap_or(defaults.magic_message),
        magic_message_newline: cli
            .magic_message_newline
            .or(coin.magic_message_newline)
            .unwrap_or(defaults.magic_message_newline),
        bootstrap_ips: cli
            .bootstrap_ips
            .clone()
            .or(coin.bootstrap_ips.clone())
            .map(|s| split_csv(&s))
            .unwrap_or_default(),
        dns_seeds: cli
            .dns_seeds
            .clone()
            .or(coin.dns_seeds.clone())
            .map(|s| split_csv(&s))
            .unwrap_or_default(),
        bootstrap_hash: bootstrap_hash_str.and_then(|s| {
            let bytes = hex::decode(s).ok()?;
            if bytes.len() != 32 {
                return None;
            }
            let mut out = [0u8; 32];
            out.copy_from_slice(&bytes);
            Some(out)
        }),
        bootstrap_chains,
        sentinel_version: cli
            .sentinel_version
            .clone()
            .or(coin.sentinel_version.clone())
            .and_then(|s| parse_version_triple(&s)),
        daemon_version: cli
            .daemon_version
            .clone()
            .or(coin.daemon_version.clone())
            .and_then(|s| parse_version_triple(&s)),
        user_agent: cli
            .user_agent
            .clone()
            .or(coin.user_agent.clone())
            .unwrap_or(defaults.user_agent),
        broadcast_listen: cli
            .broadcast_listen
            .or(coin.broadcast_listen)
            .unwrap_or(defaults.broadcast_listen),
        autosense: cli.autosense.or(coin.autosense).unwrap_or(defaults.autosense),
        db_path: cli.db_path.clone().unwrap_or(defaults.db_path),
        debug: cli.debug,
    })
}
