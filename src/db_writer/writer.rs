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

//! Batch upsert executor.
//!
//! One writer thread per phase, fed pre-sized batches over a bounded
//! channel; the writer is the only stage allowed to block on the store.
//! Each batch is retried with exponential backoff; a batch that exhausts
//! its retries is logged with its leading record and dropped, and only a
//! run of consecutive drops aborts the phase.

use std::sync::mpsc::sync_channel;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use super::config::{DbWriterConfig, SpawnResult, WriterStats};
use super::connection::{connect, SurrealConnection};
use super::sql::{build_batch_sql, group_statements, BatchStatements, MutationBatch};
use crate::errors::EtlError;

pub fn spawn_db_writer(cfg: DbWriterConfig) -> SpawnResult {
    let (tx, rx) = sync_channel::<MutationBatch>(cfg.channel_capacity);
    let join = thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("rt");
        rt.block_on(async move {
            let db = connect(
                &cfg.surreal_url,
                &cfg.surreal_username,
                &cfg.surreal_password,
                &cfg.surreal_ns,
                &cfg.surreal_db,
            )
            .await?;
            info!(
                "db_writer connected ns={} db={}",
                cfg.surreal_ns, cfg.surreal_db
            );
            let mut stats = WriterStats::default();
            let mut consecutive_failures = 0usize;
            while let Ok(batch) = rx.recv() {
                if batch.is_empty() {
                    continue;
                }
                match write_batch(&db, &cfg, &batch, &mut stats).await {
                    Ok(()) => {
                        consecutive_failures = 0;
                    }
                    Err(attempts) => {
                        stats.failures += 1;
                        consecutive_failures += 1;
                        warn!(
                            "dropping {} batch size={} after {} attempt(s), leading sample {}",
                            batch.kind(),
                            batch.len(),
                            attempts,
                            batch.leading_sample()
                        );
                        if consecutive_failures > cfg.max_batch_failures {
                            return Err(EtlError::BatchWrite {
                                attempts,
                                message: format!(
                                    "{} consecutive {} batches failed, aborting phase",
                                    consecutive_failures,
                                    batch.kind()
                                ),
                            });
                        }
                    }
                }
            }
            info!(
                "writer drained: batches={} rows={} failures={} retries={} avg_batch_ms={:.2} min_ms={:?} max_ms={:?}",
                stats.batches,
                stats.rows_written,
                stats.failures,
                stats.retries,
                stats.avg_ms(),
                stats.min_ms,
                stats.max_ms
            );
            Ok(stats)
        })
    });
    Ok((tx, join))
}

/// Executes one batch with retries. Returns the attempt count on exhaustion.
async fn write_batch(
    db: &SurrealConnection,
    cfg: &DbWriterConfig,
    batch: &MutationBatch,
    stats: &mut WriterStats,
) -> Result<(), usize> {
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let stmts = build_batch_sql(batch);
        let start = std::time::Instant::now();
        match execute_statements(db, cfg, &stmts).await {
            Ok(()) => {
                let dur = start.elapsed().as_millis();
                stats.batches += 1;
                stats.rows_written += batch.len();
                stats.sum_ms += dur;
                stats.min_ms = Some(stats.min_ms.map_or(dur, |m| m.min(dur)));
                stats.max_ms = Some(stats.max_ms.map_or(dur, |m| m.max(dur)));
                info!(
                    "batch success kind={} size={} attempt={} ms={}",
                    batch.kind(),
                    batch.len(),
                    attempt,
                    dur
                );
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "{} batch failed attempt {}: {}",
                    batch.kind(),
                    attempt,
                    e
                );
                if attempt >= cfg.max_retries {
                    return Err(attempt);
                }
                stats.retries += 1;
                tokio::time::sleep(Duration::from_millis(100 * (1 << (attempt - 1)).min(8))).await;
            }
        }
    }
}

fn is_duplicate_error(msg: &str) -> bool {
    msg.contains("already exists") || msg.contains("already contains")
}

async fn execute_statements(
    db: &SurrealConnection,
    cfg: &DbWriterConfig,
    stmts: &BatchStatements,
) -> Result<(), String> {
    // Node upserts: transactional chunks, any failure fails the batch.
    for chunk in group_statements(&stmts.upserts, cfg.statement_group) {
        db.query_checked(&chunk).await.map_err(|e| e.to_string())?;
    }
    if stmts.edges.is_empty() {
        return Ok(());
    }
    // Edges: try the whole batch as one transaction first. On a fresh load
    // nothing conflicts and this is a single round trip.
    let all: Vec<String> = stmts.edges.iter().map(|e| e.relate.clone()).collect();
    let joined = format!("BEGIN; {} COMMIT;", all.join(" "));
    if db.query_checked(&joined).await.is_ok() {
        return Ok(());
    }
    // Re-run path: the transaction aborted, usually because a relation id
    // already exists (the abort can mask the underlying duplicate error).
    // Execute edges individually so duplicates downgrade to attribute
    // overlays without losing the rest of the batch.
    for edge in &stmts.edges {
        match db.query_checked(&edge.relate).await {
            Ok(_) => {}
            Err(e) => {
                let msg = e.to_string();
                if is_duplicate_error(&msg) {
                    db.query_checked(&edge.overlay)
                        .await
                        .map_err(|oe| format!("edge overlay failed: {oe}"))?;
                } else {
                    return Err(msg);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_errors_are_recognized() {
        assert!(is_duplicate_error(
            "Database index `idx` already contains 'p_x'"
        ));
        assert!(is_duplicate_error("Database record `work:tt1` already exists"));
        assert!(!is_duplicate_error("connection refused"));
    }
}
