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

//! Graph teardown: drop the pipeline's indexes, then delete edges and
//! nodes in bounded pages so no single transaction holds the whole graph.

use std::time::Instant;

use log::{info, warn};

use crate::db_writer::schema::owned_indexes;
use crate::db_writer::sql::{extract_record_id, group_statements};
use crate::db_writer::{SurrealConnection, EDGE_TABLE, PERSON_TABLE, WORK_TABLE};
use crate::errors::EtlError;

pub(crate) async fn burn_down(db: &SurrealConnection, page: usize) -> Result<u64, EtlError> {
    let page = page.max(1);
    let started = Instant::now();

    for (table, index) in owned_indexes() {
        let variants = [
            format!("REMOVE INDEX IF EXISTS {index} ON {table};"),
            format!("REMOVE INDEX {index} ON {table};"),
        ];
        let mut removed = false;
        for stmt in &variants {
            if db.query_checked(stmt).await.is_ok() {
                info!("dropped index {} on {}", index, table);
                removed = true;
                break;
            }
        }
        if !removed {
            warn!("could not drop index {} on {} (may not exist)", index, table);
        }
    }

    let mut total = 0u64;
    // edges first so no dangling relation survives a partial teardown
    for table in [EDGE_TABLE, PERSON_TABLE, WORK_TABLE] {
        loop {
            let mut resp = db
                .query_checked(&format!("SELECT id FROM {table} LIMIT {page};"))
                .await?;
            let rows: Vec<serde_json::Value> = resp.take(0)?;
            if rows.is_empty() {
                break;
            }
            let ids: Vec<String> = rows
                .iter()
                .filter_map(|row| row.get("id").and_then(extract_record_id))
                .collect();
            if ids.is_empty() {
                // id shape not recognized; fall back to a whole-table delete
                db.query_checked(&format!("DELETE {table};")).await?;
                warn!("fell back to whole-table delete for {}", table);
                total += rows.len() as u64;
                break;
            }
            let stmts: Vec<String> = ids.iter().map(|rid| format!("DELETE {rid};")).collect();
            for chunk in group_statements(&stmts, stmts.len()) {
                db.query_checked(&chunk).await?;
            }
            total += ids.len() as u64;
            info!(
                "deleted {} records from {} (total {} in {:.2}s)",
                ids.len(),
                table,
                total,
                started.elapsed().as_secs_f64()
            );
        }
    }
    info!(
        "burn-down complete: {} records deleted in {:.2}s",
        total,
        started.elapsed().as_secs_f64()
    );
    Ok(total)
}
