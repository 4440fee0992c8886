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

//! Run configuration: an optional TOML file, every field defaulted, with
//! CLI flags layered on top by the binary. Store credentials may also come
//! from the environment (see `db_writer::connection`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::db_writer::DbWriterConfig;
use crate::errors::EtlError;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_titles_file")]
    pub titles_file: String,
    #[serde(default = "default_names_file")]
    pub names_file: String,
    #[serde(default = "default_principals_file")]
    pub principals_file: String,

    /// Work rows are kept only when their type is in this set.
    #[serde(default = "default_title_types")]
    pub title_types: Vec<String>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_statement_group")]
    pub statement_group: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_max_batch_failures")]
    pub max_batch_failures: usize,
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
    /// Page size for the burn-down teardown.
    #[serde(default = "default_delete_batch")]
    pub delete_batch: usize,

    #[serde(default)]
    pub surreal_url: Option<String>,
    #[serde(default)]
    pub surreal_username: Option<String>,
    #[serde(default)]
    pub surreal_password: Option<String>,
    #[serde(default = "default_ns")]
    pub surreal_ns: String,
    #[serde(default = "default_db")]
    pub surreal_db: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_titles_file() -> String {
    "titles.tsv".into()
}
fn default_names_file() -> String {
    "names.tsv".into()
}
fn default_principals_file() -> String {
    "principals.tsv".into()
}
fn default_title_types() -> Vec<String> {
    vec!["movie".into(), "tvSeries".into()]
}
fn default_batch_size() -> usize {
    5000
}
// the producer may run ahead of the writer by only a few batch groups,
// keeping memory bounded on multi-gigabyte inputs
fn default_channel_capacity() -> usize {
    4
}
fn default_statement_group() -> usize {
    200
}
fn default_max_retries() -> usize {
    3
}
fn default_max_batch_failures() -> usize {
    10
}
fn default_report_interval() -> u64 {
    100_000
}
fn default_delete_batch() -> usize {
    5000
}
fn default_ns() -> String {
    "screengraph".into()
}
fn default_db() -> String {
    "credits".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        // every field is serde-defaulted, so the empty document is the default
        toml::from_str("").expect("empty config parses")
    }
}

impl AppConfig {
    /// Loads the TOML config when present; a missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<(AppConfig, PathBuf), EtlError> {
        let cfg_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("screengraph.toml"));
        if cfg_path.exists() {
            let s = std::fs::read_to_string(&cfg_path).map_err(|e| {
                EtlError::Config(format!("cannot read {}: {e}", cfg_path.display()))
            })?;
            let cfg: AppConfig = toml::from_str(&s)
                .map_err(|e| EtlError::Config(format!("{}: {e}", cfg_path.display())))?;
            Ok((cfg, cfg_path))
        } else {
            Ok((AppConfig::default(), cfg_path))
        }
    }

    pub fn titles_path(&self) -> PathBuf {
        self.data_dir.join(&self.titles_file)
    }

    pub fn names_path(&self) -> PathBuf {
        self.data_dir.join(&self.names_file)
    }

    pub fn principals_path(&self) -> PathBuf {
        self.data_dir.join(&self.principals_file)
    }

    pub fn writer_config(&self) -> DbWriterConfig {
        DbWriterConfig {
            channel_capacity: self.channel_capacity,
            statement_group: self.statement_group,
            max_retries: self.max_retries,
            max_batch_failures: self.max_batch_failures,
            surreal_url: self.surreal_url.clone(),
            surreal_username: self.surreal_username.clone(),
            surreal_password: self.surreal_password.clone(),
            surreal_ns: self.surreal_ns.clone(),
            surreal_db: self.surreal_db.clone(),
        }
    }
}
