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

//! Remote-chain bootstrap clients.
//!
//! At startup, before any peer has been dialed, the daemon needs a recent
//! block hash (to seed the block-hash ring) and a handful of peer
//! addresses. These are fetched from operator-configured block explorers
//! or a coin daemon's JSON-RPC endpoint rather than from the P2P network
//! itself, since the network isn't reachable yet. A failing chain is
//! logged and skipped; the remaining configured chains, `bootstrap_hash`,
//! and `bootstrap_ips` are still tried (`BootstrapError`, spec §7).

use crate::core::types::Peer;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to a remote-chain bootstrap source.
#[derive(Debug, Error)]
pub enum RemoteChainError {
    /// The configured `format` string did not match a known explorer kind.
    #[error("unknown remote chain format {0:?}")]
    UnknownFormat(String),
    /// The HTTP request itself failed (timeout, DNS, connection refused).
    #[error("http request to {url}: {source}")]
    Request {
        /// URL that failed.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The response body did not parse as the expected JSON shape.
    #[error("decoding response from {url}: {source}")]
    Decode {
        /// URL whose response failed to decode.
        url: String,
        /// Underlying JSON error.
        #[source]
        source: reqwest::Error,
    },
    /// A field in the response was present but not a valid value (e.g. an
    /// unparseable hex hash or peer address).
    #[error("malformed field in response from {url}: {field}")]
    MalformedField {
        /// URL whose response contained the bad field.
        url: String,
        /// Name of the offending field.
        field: String,
    },
}

/// Shared capability set every remote-chain backend exposes, mirroring the
/// Go original's `RemoteChain` interface.
#[async_trait::async_trait]
pub trait RemoteChain: Send + Sync {
    /// Fetch the block hash at `height`.
    async fn get_block_hash(&self, height: u64) -> Result<[u8; 32], RemoteChainError>;
    /// Fetch a list of peer addresses filtered to `port_filter`.
    async fn get_peers(&self, port_filter: u16) -> Result<Vec<Peer>, RemoteChainError>;
    /// Fetch the current chain height.
    async fn get_chain_height(&self) -> Result<u64, RemoteChainError>;
    /// Fetch a raw transaction by id (hex encoded, as the explorer returns
    /// it); the daemon never parses transactions, only forwards the hex.
    async fn get_transaction(&self, txid: &str) -> Result<String, RemoteChainError>;
}

fn parse_hash_hex(url: &str, field: &str, s: &str) -> Result<[u8; 32], RemoteChainError> {
    let bytes = hex::decode(s.trim()).map_err(|_| RemoteChainError::MalformedField {
        url: url.to_string(),
        field: field.to_string(),
    })?;
    if bytes.len() != 32 {
        return Err(RemoteChainError::MalformedField {
            url: url.to_string(),
            field: field.to_string(),
        });
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn parse_peer_addr(addr: &str) -> Option<(Ipv4Addr, u16)> {
    let sock: std::net::SocketAddrV4 = addr.trim().parse().ok()?;
    Some((*sock.ip(), sock.port()))
}

/// Common HTTP plumbing shared by every explorer-backed variant.
struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpBackend {
    fn new(base_url: String, username: Option<String>, password: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url,
            username,
            password,
        }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut req = self.client.get(url);
        if let Some(user) = &self.username {
            req = req.basic_auth(user, self.password.clone());
        }
        req
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, RemoteChainError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let resp = self
            .request(path)
            .send()
            .await
            .map_err(|source| RemoteChainError::Request {
                url: url.clone(),
                source,
            })?;
        resp.json::<T>()
            .await
            .map_err(|source| RemoteChainError::Decode { url, source })
    }
}

#[derive(Deserialize)]
struct PeerInfoEntry {
    addr: String,
}

fn peers_from_addrs(url: &str, addrs: &[String], port_filter: u16) -> Vec<Peer> {
    let mut peers = Vec::new();
    for addr in addrs {
        match parse_peer_addr(addr) {
            Some((ip, port)) if port == port_filter => {
                if !peers.iter().any(|p: &Peer| p.address == ip && p.port == port) {
                    peers.push(Peer {
                        address: ip,
                        port,
                        last_seen_unix: 0,
                    });
                }
            }
            Some(_) => {}
            None => tracing::debug!(url, addr, "skipping unparseable peer address"),
        }
    }
    peers
}

/// Iquidus-style block explorer (`/api/getblockhash`, `/api/getpeerinfo`).
pub struct IquidusExplorer(HttpBackend);

/// Insight-style block explorer (`/api/block-index`, `/api/status`).
pub struct InsightExplorer(HttpBackend);

/// Bulwark explorer, a Iquidus fork with the same JSON shapes.
pub struct BulwarkExplorer(HttpBackend);

/// Cryptoid explorer (`/api.dws`).
pub struct CryptoidExplorer(HttpBackend);

/// CoinExplorer.io-style explorer.
pub struct CoinExplorerExplorer(HttpBackend);

/// Blockbook (trezor) explorer (`/api/v2/block-index`).
pub struct BlockbookExplorer(HttpBackend);

/// A coin daemon's own JSON-RPC endpoint.
pub struct RpcExplorer(HttpBackend);

macro_rules! iquidus_style_impl {
    ($ty:ident) => {
        #[async_trait::async_trait]
        impl RemoteChain for $ty {
            async fn get_block_hash(&self, height: u64) -> Result<[u8; 32], RemoteChainError> {
                let path = format!("/api/getblockhash?index={height}");
                let hash_str: String = self.0.get_json(&path).await?;
                parse_hash_hex(&self.0.base_url, "blockhash", &hash_str)
            }

            async fn get_peers(&self, port_filter: u16) -> Result<Vec<Peer>, RemoteChainError> {
                #[derive(Deserialize)]
                struct Resp {
                    #[serde(default)]
                    peers: Vec<PeerInfoEntry>,
                }
                let resp: Resp = self.0.get_json("/api/getpeerinfo").await?;
                let addrs: Vec<String> = resp.peers.into_iter().map(|p| p.addr).collect();
                Ok(peers_from_addrs(&self.0.base_url, &addrs, port_filter))
            }

            async fn get_chain_height(&self) -> Result<u64, RemoteChainError> {
                #[derive(Deserialize)]
                struct Info {
                    blocks: u64,
                }
                #[derive(Deserialize)]
                struct Resp {
                    info: Info,
                }
                let resp: Resp = self.0.get_json("/api/status?q=getInfo").await?;
                Ok(resp.info.blocks)
            }

            async fn get_transaction(&self, txid: &str) -> Result<String, RemoteChainError> {
                let path = format!("/api/rawtx/{txid}");
                self.0.get_json(&path).await
            }
        }
    };
}

iquidus_style_impl!(IquidusExplorer);
iquidus_style_impl!(BulwarkExplorer);

#[async_trait::async_trait]
impl RemoteChain for InsightExplorer {
    async fn get_block_hash(&self, height: u64) -> Result<[u8; 32], RemoteChainError> {
        #[derive(Deserialize)]
        struct Resp {
            #[serde(rename = "blockHash")]
            block_hash: String,
        }
        let path = format!("/api/block-index/{height}");
        let resp: Resp = self.0.get_json(&path).await?;
        parse_hash_hex(&self.0.base_url, "blockHash", &resp.block_hash)
    }

    async fn get_peers(&self, port_filter: u16) -> Result<Vec<Peer>, RemoteChainError> {
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            peers: Vec<PeerInfoEntry>,
        }
        let resp: Resp = self.0.get_json("/api/peer").await?;
        let addrs: Vec<String> = resp.peers.into_iter().map(|p| p.addr).collect();
        Ok(peers_from_addrs(&self.0.base_url, &addrs, port_filter))
    }

    async fn get_chain_height(&self) -> Result<u64, RemoteChainError> {
        #[derive(Deserialize)]
        struct Resp {
            height: u64,
        }
        let resp: Resp = self.0.get_json("/api/status?q=getBestBlockHash").await?;
        Ok(resp.height)
    }

    async fn get_transaction(&self, txid: &str) -> Result<String, RemoteChainError> {
        let path = format!("/api/rawtx/{txid}");
        self.0.get_json(&path).await
    }
}

#[async_trait::async_trait]
impl RemoteChain for CryptoidExplorer {
    async fn get_block_hash(&self, height: u64) -> Result<[u8; 32], RemoteChainError> {
        #[derive(Deserialize)]
        struct Resp {
            hash: String,
        }
        let path = format!("/api.dws?q=blockhash&height={height}");
        let resp: Resp = self.0.get_json(&path).await?;
        parse_hash_hex(&self.0.base_url, "hash", &resp.hash)
    }

    async fn get_peers(&self, _port_filter: u16) -> Result<Vec<Peer>, RemoteChainError> {
        // Cryptoid does not expose a peer list endpoint.
        Ok(Vec::new())
    }

    async fn get_chain_height(&self) -> Result<u64, RemoteChainError> {
        #[derive(Deserialize)]
        struct Resp {
            height: u64,
        }
        let resp: Resp = self.0.get_json("/api.dws?q=getblockcount").await?;
        Ok(resp.height)
    }

    async fn get_transaction(&self, txid: &str) -> Result<String, RemoteChainError> {
        let path = format!("/api.dws?q=txinfo&id={txid}");
        self.0.get_json(&path).await
    }
}

#[async_trait::async_trait]
impl RemoteChain for CoinExplorerExplorer {
    async fn get_block_hash(&self, height: u64) -> Result<[u8; 32], RemoteChainError> {
        #[derive(Deserialize)]
        struct Resp {
            hash: String,
        }
        let path = format!("/api/block/{height}");
        let resp: Resp = self.0.get_json(&path).await?;
        parse_hash_hex(&self.0.base_url, "hash", &resp.hash)
    }

    async fn get_peers(&self, _port_filter: u16) -> Result<Vec<Peer>, RemoteChainError> {
        Ok(Vec::new())
    }

    async fn get_chain_height(&self) -> Result<u64, RemoteChainError> {
        #[derive(Deserialize)]
        struct Resp {
            height: u64,
        }
        let resp: Resp = self.0.get_json("/api/stats").await?;
        Ok(resp.height)
    }

    async fn get_transaction(&self, txid: &str) -> Result<String, RemoteChainError> {
        let path = format!("/api/tx/{txid}");
        self.0.get_json(&path).await
    }
}

#[async_trait::async_trait]
impl RemoteChain for BlockbookExplorer {
    async fn get_block_hash(&self, height: u64) -> Result<[u8; 32], RemoteChainError> {
        #[derive(Deserialize)]
        struct Resp {
            #[serde(rename = "blockHash")]
            block_hash: String,
        }
        let path = format!("/api/v2/block-index/{height}");
        let resp: Resp = self.0.get_json(&path).await?;
        parse_hash_hex(&self.0.base_url, "blockHash", &resp.block_hash)
    }

    async fn get_peers(&self, _port_filter: u16) -> Result<Vec<Peer>, RemoteChainError> {
        // Blockbook does not expose a peer list; it only indexes chain data.
        Ok(Vec::new())
    }

    async fn get_chain_height(&self) -> Result<u64, RemoteChainError> {
        #[derive(Deserialize)]
        struct Blockbook {
            #[serde(rename = "bestHeight")]
            best_height: u64,
        }
        #[derive(Deserialize)]
        struct Resp {
            blockbook: Blockbook,
        }
        let resp: Resp = self.0.get_json("/api").await?;
        Ok(resp.blockbook.best_height)
    }

    async fn get_transaction(&self, txid: &str) -> Result<String, RemoteChainError> {
        let path = format!("/api/v2/tx-specific/{txid}");
        self.0.get_json(&path).await
    }
}

#[async_trait::async_trait]
impl RemoteChain for RpcExplorer {
    async fn get_block_hash(&self, height: u64) -> Result<[u8; 32], RemoteChainError> {
        #[derive(Deserialize)]
        struct Resp {
            result: String,
        }
        let resp: Resp = self.rpc_call("getblockhash", serde_json::json!([height])).await?;
        parse_hash_hex(&self.0.base_url, "result", &resp.result)
    }

    async fn get_peers(&self, port_filter: u16) -> Result<Vec<Peer>, RemoteChainError> {
        #[derive(Deserialize)]
        struct PeerEntry {
            addr: String,
        }
        #[derive(Deserialize)]
        struct Resp {
            result: Vec<PeerEntry>,
        }
        let resp: Resp = self
            .rpc_call("getpeerinfo", serde_json::Value::Array(vec![]))
            .await?;
        let addrs: Vec<String> = resp.result.into_iter().map(|p| p.addr).collect();
        Ok(peers_from_addrs(&self.0.base_url, &addrs, port_filter))
    }

    async fn get_chain_height(&self) -> Result<u64, RemoteChainError> {
        #[derive(Deserialize)]
        struct Resp {
            result: u64,
        }
        let resp: Resp = self
            .rpc_call("getblockcount", serde_json::Value::Array(vec![]))
            .await?;
        Ok(resp.result)
    }

    async fn get_transaction(&self, txid: &str) -> Result<String, RemoteChainError> {
        #[derive(Deserialize)]
        struct Resp {
            result: String,
        }
        let resp: Resp = self
            .rpc_call("getrawtransaction", serde_json::json!([txid]))
            .await?;
        Ok(resp.result)
    }
}

impl RpcExplorer {
    async fn rpc_call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RemoteChainError> {
        let body = serde_json::json!({
            "jsonrpc": "1.0",
            "id": "phantomd",
            "method": method,
            "params": params,
        });
        let mut req = self.0.client.post(&self.0.base_url).json(&body);
        if let Some(user) = &self.0.username {
            req = req.basic_auth(user, self.0.password.clone());
        }
        let resp = req.send().await.map_err(|source| RemoteChainError::Request {
            url: self.0.base_url.clone(),
            source,
        })?;
        resp.json::<T>()
            .await
            .map_err(|source| RemoteChainError::Decode {
                url: self.0.base_url.clone(),
                source,
            })
    }
}

/// Build the [`RemoteChain`] implementation named by `format`
/// (case-insensitive), mirroring the Go original's `StringToRemoteChain`.
pub fn from_format(
    format: &str,
    url: String,
    username: Option<String>,
    password: Option<String>,
) -> Result<Box<dyn RemoteChain>, RemoteChainError> {
    let backend = HttpBackend::new(url, username, password);
    match format.to_ascii_uppercase().as_str() {
        "IQUIDUS" => Ok(Box::new(IquidusExplorer(backend))),
        "INSIGHT" => Ok(Box::new(InsightExplorer(backend))),
        "BULWARK" => Ok(Box::new(BulwarkExplorer(backend))),
        "CRYPTOID" => Ok(Box::new(CryptoidExplorer(backend))),
        "COINEXPLORER" => Ok(Box::new(CoinExplorerExplorer(backend))),
        "BLOCKBOOK" => Ok(Box::new(BlockbookExplorer(backend))),
        "RPC" => Ok(Box::new(RpcExplorer(backend))),
        other => Err(RemoteChainError::UnknownFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        let err = from_format("nonsense", "http://x".to_string(), None, None);
        assert!(matches!(err, Err(RemoteChainError::UnknownFormat(_))));
    }

    #[test]
    fn format_dispatch_is_case_insensitive() {
        assert!(from_format("Iquidus", "http://x".to_string(), None, None).is_ok());
        assert!(from_format("BLOCKBOOK", "http://x".to_string(), None, None).is_ok());
    }

    #[test]
    fn peers_from_addrs_filters_by_port_and_dedupes() {
        let addrs = vec![
            "1.2.3.4:9999".to_string(),
            "1.2.3.4:9999".to_string(),
            "5.6.7.8:8888".to_string(),
            "not-an-addr".to_string(),
        ];
        let peers = peers_from_addrs("http://x", &addrs, 9999);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].port, 9999);
    }

    #[test]
    fn parse_hash_hex_rejects_wrong_length() {
        let err = parse_hash_hex("http://x", "h", "abcd");
        assert!(matches!(err, Err(RemoteChainError::MalformedField { .. })));
    }
}
