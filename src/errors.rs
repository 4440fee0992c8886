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

//! Error taxonomy for the load pipeline.
//!
//! Row-scoped errors (`MalformedRecord`, `FieldConversion`) are skipped and
//! counted by the phase that hits them. `BatchWrite` is recoverable at batch
//! granularity until the writer's consecutive-failure threshold trips.
//! `SourceUnavailable` and `IndexCreation` abort the run.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("source unavailable: {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    #[error("line {line}: field `{field}` value {value:?} is not numeric")]
    FieldConversion {
        field: &'static str,
        line: u64,
        value: String,
    },

    #[error("batch write failed after {attempts} attempt(s): {message}")]
    BatchWrite { attempts: usize, message: String },

    #[error("index creation failed: {0}")]
    IndexCreation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] surrealdb::Error),

    #[error("{phase} phase failed: {source}")]
    Phase {
        phase: &'static str,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    /// Row- or batch-scoped errors that a phase may skip past without
    /// aborting. Everything else propagates.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EtlError::MalformedRecord { .. }
                | EtlError::FieldConversion { .. }
                | EtlError::BatchWrite { .. }
        )
    }
}
