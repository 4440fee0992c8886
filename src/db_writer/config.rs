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

use std::sync::mpsc::SyncSender;
use std::thread;

use super::sql::MutationBatch;
use crate::errors::EtlError;

#[derive(Clone, Debug)]
pub struct DbWriterConfig {
    pub channel_capacity: usize,
    /// Statements per BEGIN/COMMIT chunk.
    pub statement_group: usize,
    pub max_retries: usize,
    /// Consecutive failed batches tolerated before the phase aborts.
    pub max_batch_failures: usize,
    pub surreal_url: Option<String>,
    pub surreal_username: Option<String>,
    pub surreal_password: Option<String>,
    pub surreal_ns: String,
    pub surreal_db: String,
}

impl Default for DbWriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 4,
            statement_group: 200,
            max_retries: 3,
            max_batch_failures: 10,
            surreal_url: None,
            surreal_username: None,
            surreal_password: None,
            surreal_ns: "screengraph".into(),
            surreal_db: "credits".into(),
        }
    }
}

/// Totals reported by a writer when its phase drains.
#[derive(Debug, Default, Clone)]
pub struct WriterStats {
    pub batches: usize,
    pub rows_written: usize,
    pub failures: usize,
    pub retries: usize,
    pub sum_ms: u128,
    pub min_ms: Option<u128>,
    pub max_ms: Option<u128>,
}

impl WriterStats {
    pub fn avg_ms(&self) -> f64 {
        if self.batches == 0 {
            0.0
        } else {
            self.sum_ms as f64 / self.batches as f64
        }
    }
}

pub type SpawnResult = Result<
    (
        SyncSender<MutationBatch>,
        thread::JoinHandle<Result<WriterStats, EtlError>>,
    ),
    EtlError,
>;
