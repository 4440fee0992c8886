// Copyright 2025 ScreenGraph Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! screengraph: streams tab-delimited title/name/principal extracts into a
//! SurrealDB property graph of `work` and `person` nodes joined by
//! `participated_in` edges, keyed by the extracts' stable external ids.
//!
//! The pipeline is a strict sequence of phases (index bootstrap, node
//! loads, cross-file membership filtering, edge load) where every mutation
//! is batched and idempotent, so a run can be repeated or resumed after a
//! partial failure without duplicating graph state.

pub mod batcher;
pub mod config;
pub mod db_writer;
pub mod errors;
pub mod ingest;
pub mod membership;
pub mod pipeline;
pub mod progress;

pub use config::AppConfig;
pub use errors::{EtlError, Result};
pub use pipeline::{Phase, Pipeline};
