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

mod config;
pub mod connection;
pub mod schema;
pub mod sql;
mod writer;

pub use config::{DbWriterConfig, SpawnResult, WriterStats};
pub use connection::{connect, SurrealConnection};
pub use sql::{MutationBatch, EDGE_TABLE, PERSON_TABLE, WORK_TABLE};
pub use writer::spawn_db_writer;
