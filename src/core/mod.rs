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

#![allow(missing_docs)]

//! Core protocol primitives: wire data types, configuration, and the
//! in-memory bookkeeping structures (block-hash ring, broadcast store,
//! auto-sense analyzer) shared by the networking and supervisor layers.

pub mod analyzer;
pub mod block_ring;
pub mod broadcast_store;
pub mod config;
pub mod masternode_conf;
pub mod security;
pub mod types;
