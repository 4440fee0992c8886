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

//! Shared fixtures for the end-to-end tests. Each test binary runs as its
//! own process and therefore gets its own embedded store; pipeline re-runs
//! inside one test observe the same graph.

// not every test binary uses every helper
#![allow(dead_code)]

use std::path::Path;

use screengraph::db_writer::{connect, SurrealConnection};
use screengraph::AppConfig;

pub const NS: &str = "screengraph_test";

pub fn test_config(data_dir: &Path, db: &str) -> AppConfig {
    // keep connect() away from any ambient SURREALDB_URL
    std::env::set_var("SG_DISABLE_STORE_ENV", "1");
    let mut cfg = AppConfig::default();
    cfg.data_dir = data_dir.to_path_buf();
    cfg.batch_size = 2; // force multiple batches plus a partial flush
    cfg.report_interval = 1000;
    cfg.surreal_ns = NS.to_string();
    cfg.surreal_db = db.to_string();
    cfg
}

pub fn write_extracts(dir: &Path, titles: &[&str], names: &[&str], principals: &[&str]) {
    let titles_header =
        "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres";
    let names_header =
        "nconst\tprimaryName\tbirthYear\tdeathYear\tprimaryProfession\tknownForTitles";
    let principals_header = "tconst\tordering\tnconst\tcategory\tjob\tcharacters";
    let join = |header: &str, rows: &[&str]| {
        let mut s = header.to_string();
        for row in rows {
            s.push('\n');
            s.push_str(row);
        }
        s.push('\n');
        s
    };
    std::fs::write(dir.join("titles.tsv"), join(titles_header, titles)).unwrap();
    std::fs::write(dir.join("names.tsv"), join(names_header, names)).unwrap();
    std::fs::write(dir.join("principals.tsv"), join(principals_header, principals)).unwrap();
}

pub struct Store {
    rt: tokio::runtime::Runtime,
    db: SurrealConnection,
}

impl Store {
    pub fn open(database: &str) -> Store {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let db = rt
            .block_on(connect(&None, &None, &None, NS, database))
            .unwrap();
        Store { rt, db }
    }

    pub fn count(&self, table: &str) -> i64 {
        self.rt.block_on(async {
            let mut resp = self
                .db
                .query_checked(&format!("SELECT count() FROM {table} GROUP ALL;"))
                .await
                .unwrap();
            let rows: Vec<serde_json::Value> = resp.take(0).unwrap();
            rows.first()
                .and_then(|o| o.get("count"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0)
        })
    }

    pub fn rows(&self, sql: &str) -> Vec<serde_json::Value> {
        self.rt.block_on(async {
            let mut resp = self.db.query_checked(sql).await.unwrap();
            resp.take(0).unwrap()
        })
    }
}
