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

//! Index bootstrap. Without a unique key index every per-row merge degrades
//! to a table scan, so index creation failures are fatal to the run.
//!
//! Statements are applied as ordered variant groups (first variant that the
//! server accepts wins) because relation/index syntax differs between store
//! versions.

use log::{debug, info, trace};

use super::connection::SurrealConnection;
use super::sql::{EDGE_TABLE, PERSON_TABLE, WORK_TABLE};
use crate::errors::EtlError;

const PROBE_ID: &str = "bootstrap_index_probe";

async fn apply_variant_group(
    db: &SurrealConnection,
    group: &[String],
) -> Result<(), EtlError> {
    let mut last_err = String::new();
    for stmt in group {
        match db.query_checked(stmt).await {
            Ok(_) => {
                debug!("schema applied: {}", stmt);
                return Ok(());
            }
            Err(e) => {
                trace!("schema variant failed: {} -> {}", stmt, e);
                last_err = e.to_string();
            }
        }
    }
    Err(EtlError::IndexCreation(format!(
        "no variant of `{}` applied: {}",
        group.first().map(String::as_str).unwrap_or(""),
        last_err
    )))
}

/// Table definitions for all three entity types. Run once before the first
/// bulk phase; every statement is idempotent or has a tolerated fallback.
pub async fn ensure_base_schema(db: &SurrealConnection) -> Result<(), EtlError> {
    let groups: Vec<Vec<String>> = vec![
        vec![
            format!("DEFINE TABLE IF NOT EXISTS {WORK_TABLE} SCHEMALESS;"),
            format!("DEFINE TABLE {WORK_TABLE};"),
        ],
        vec![
            format!("DEFINE TABLE IF NOT EXISTS {PERSON_TABLE} SCHEMALESS;"),
            format!("DEFINE TABLE {PERSON_TABLE};"),
        ],
        vec![
            format!(
                "DEFINE TABLE IF NOT EXISTS {EDGE_TABLE} TYPE RELATION FROM {PERSON_TABLE} TO {WORK_TABLE};"
            ),
            format!("DEFINE TABLE IF NOT EXISTS {EDGE_TABLE} TYPE RELATION;"),
            format!("DEFINE TABLE {EDGE_TABLE};"),
        ],
    ];
    for group in &groups {
        apply_variant_group(db, group).await?;
    }
    Ok(())
}

/// Unique key index for one node table, forced into existence before the
/// bulk load by inserting and removing a throwaway probe record. The probe
/// sidesteps index-creation races against concurrent writers: by the time
/// it is deleted the index demonstrably covers the table.
pub async fn bootstrap_node_index(
    db: &SurrealConnection,
    table: &str,
    key_field: &str,
) -> Result<(), EtlError> {
    let probe = format!(
        "UPSERT {table}:{PROBE_ID} MERGE {{\"{key_field}\": \"{PROBE_ID}\"}};"
    );
    db.query_checked(&probe)
        .await
        .map_err(|e| EtlError::IndexCreation(format!("probe insert on {table} failed: {e}")))?;

    let group = vec![
        format!(
            "DEFINE INDEX IF NOT EXISTS idx_{table}_{key_field} ON {table} COLUMNS {key_field} UNIQUE;"
        ),
        format!("DEFINE INDEX idx_{table}_{key_field} ON {table} COLUMNS {key_field} UNIQUE;"),
    ];
    apply_variant_group(db, &group).await?;

    db.query_checked(&format!("DELETE {table}:{PROBE_ID};"))
        .await
        .map_err(|e| EtlError::IndexCreation(format!("probe delete on {table} failed: {e}")))?;
    info!("unique index ready on {}.{}", table, key_field);
    Ok(())
}

/// Lookup indexes over the participation relation, created (or replaced)
/// after the edge load completes.
pub async fn bootstrap_edge_indexes(db: &SurrealConnection) -> Result<(), EtlError> {
    let groups: Vec<Vec<String>> = vec![
        vec![
            format!(
                "DEFINE INDEX OVERWRITE idx_{EDGE_TABLE}_key ON {EDGE_TABLE} COLUMNS in, out, category, ordering UNIQUE;"
            ),
            format!(
                "DEFINE INDEX IF NOT EXISTS idx_{EDGE_TABLE}_key ON {EDGE_TABLE} COLUMNS in, out, category, ordering UNIQUE;"
            ),
            format!(
                "DEFINE INDEX idx_{EDGE_TABLE}_key ON {EDGE_TABLE} COLUMNS in, out, category, ordering UNIQUE;"
            ),
        ],
        vec![
            format!(
                "DEFINE INDEX OVERWRITE idx_{EDGE_TABLE}_category ON {EDGE_TABLE} COLUMNS category;"
            ),
            format!(
                "DEFINE INDEX IF NOT EXISTS idx_{EDGE_TABLE}_category ON {EDGE_TABLE} COLUMNS category;"
            ),
            format!("DEFINE INDEX idx_{EDGE_TABLE}_category ON {EDGE_TABLE} COLUMNS category;"),
        ],
    ];
    for group in &groups {
        apply_variant_group(db, group).await?;
    }
    info!("participation indexes ready");
    Ok(())
}

/// Index names owned by this pipeline, for teardown.
pub fn owned_indexes() -> Vec<(String, String)> {
    vec![
        (WORK_TABLE.to_string(), format!("idx_{WORK_TABLE}_work_id")),
        (
            PERSON_TABLE.to_string(),
            format!("idx_{PERSON_TABLE}_person_id"),
        ),
        (EDGE_TABLE.to_string(), format!("idx_{EDGE_TABLE}_key")),
        (EDGE_TABLE.to_string(), format!("idx_{EDGE_TABLE}_category")),
    ]
}
