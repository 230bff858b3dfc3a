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

//! Parser for the masternode credentials file: one whitespace-separated
//! record per line, `#`-prefixed lines and blank lines ignored.
//!
//! ```text
//! alias ip:port privkey_wif collateral_txid collateral_output_index
//! ```

use crate::core::types::MasternodeEntry;
use std::net::SocketAddrV4;
use thiserror::Error;

/// Errors encountered while reading or parsing the credentials file.
#[derive(Debug, Error)]
pub enum MasternodeConfError {
    /// The file could not be opened or read.
    #[error("reading masternode conf {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// One malformed line, reported but not fatal to the overall parse.
#[derive(Debug, Clone)]
pub struct MalformedLine {
    /// 1-based line number within the file.
    pub line_number: usize,
    /// Reason the line was rejected.
    pub reason: String,
}

/// Parse result: successfully parsed entries plus any malformed lines,
/// reported separately so a single bad alias doesn't abort ping generation
/// for the rest.
pub struct ParsedMasternodeConf {
    /// Valid entries, in file order.
    pub entries: Vec<MasternodeEntry>,
    /// Lines that failed to parse.
    pub malformed: Vec<MalformedLine>,
}

/// Load and parse the masternode credentials file at `path`.
pub fn load(path: &str) -> Result<ParsedMasternodeConf, MasternodeConfError> {
    let data = std::fs::read_to_string(path).map_err(|source| MasternodeConfError::Read {
        path: path.to_string(),
        source,
    })?;
    Ok(parse(&data))
}

/// Parse masternode credentials file contents already read into memory.
pub fn parse(data: &str) -> ParsedMasternodeConf {
    let mut entries = Vec::new();
    let mut malformed = Vec::new();

    for (idx, raw_line) in data.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            malformed.push(MalformedLine {
                line_number: idx + 1,
                reason: format!("expected 5 fields, found {}", fields.len()),
            });
            continue;
        }
        let [alias, addr_str, privkey_wif, txid, vout_str] = [
            fields[0], fields[1], fields[2], fields[3], fields[4],
        ];
        let address = match addr_str.parse::<SocketAddrV4>() {
            Ok(a) => a,
            Err(e) => {
                malformed.push(MalformedLine {
                    line_number: idx + 1,
                    reason: format!("bad address {addr_str:?}: {e}"),
                });
                continue;
            }
        };
        let funding_output_index = match vout_str.parse::<u32>() {
            Ok(v) => v,
            Err(e) => {
                malformed.push(MalformedLine {
                    line_number: idx + 1,
                    reason: format!("bad output index {vout_str:?}: {e}"),
                });
                continue;
            }
        };
        entries.push(MasternodeEntry {
            alias: alias.to_string(),
            address,
            private_key_wif: privkey_wif.to_string(),
            funding_txid: txid.to_string(),
            funding_output_index,
        });
    }

    ParsedMasternodeConf { entries, malformed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_entries_and_skips_comments() {
        let data = "\
# comment
mn1 1.2.3.4:9999 7r... abcd1234 0

mn2 5.6.7.8:9999 7s... ef001122 1
";
        let parsed = parse(data);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].alias, "mn1");
        assert_eq!(parsed.entries[1].funding_output_index, 1);
        assert!(parsed.malformed.is_empty());
    }

    #[test]
    fn reports_malformed_lines_without_aborting() {
        let data = "\
mn1 not-an-address key txid 0
mn2 1.2.3.4:9999 key txid 0
";
        let parsed = parse(data);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.malformed.len(), 1);
        assert_eq!(parsed.malformed[0].line_number, 1);
    }
}
