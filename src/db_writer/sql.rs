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

//! Batch-to-statement translation.
//!
//! Node batches become `UPSERT <table>:<id> MERGE { ... }` statements grouped
//! into transactional chunks; because absent fields are omitted from the
//! merge payload, re-applying a batch never clobbers a previously set value
//! with nothing (last-non-null-wins). Edge batches become `RELATE`
//! statements with deterministic relation ids plus a precomputed `MERGE`
//! overlay used when the relation already exists.

use serde_json::Value;

use crate::ingest::{ParticipationEdge, PersonRecord, WorkRecord};

pub const WORK_TABLE: &str = "work";
pub const PERSON_TABLE: &str = "person";
pub const EDGE_TABLE: &str = "participated_in";

/// One unit of work for the writer: a homogeneous batch of normalized
/// records bound for a single table.
pub enum MutationBatch {
    Works(Vec<WorkRecord>),
    Persons(Vec<PersonRecord>),
    Participations(Vec<ParticipationEdge>),
}

impl MutationBatch {
    pub fn len(&self) -> usize {
        match self {
            MutationBatch::Works(v) => v.len(),
            MutationBatch::Persons(v) => v.len(),
            MutationBatch::Participations(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MutationBatch::Works(_) => WORK_TABLE,
            MutationBatch::Persons(_) => PERSON_TABLE,
            MutationBatch::Participations(_) => EDGE_TABLE,
        }
    }

    /// Leading record key, logged as the sample when a batch fails.
    pub fn leading_sample(&self) -> String {
        match self {
            MutationBatch::Works(v) => v
                .first()
                .map(|r| r.work_id.clone())
                .unwrap_or_default(),
            MutationBatch::Persons(v) => v
                .first()
                .map(|r| r.person_id.clone())
                .unwrap_or_default(),
            MutationBatch::Participations(v) => v
                .first()
                .map(|r| format!("{}->{}", r.person_id, r.work_id))
                .unwrap_or_default(),
        }
    }
}

/// A `RELATE` plus the overlay applied when the relation id already exists.
pub struct EdgeStatements {
    pub relate: String,
    pub overlay: String,
}

pub struct BatchStatements {
    pub upserts: Vec<String>,
    pub edges: Vec<EdgeStatements>,
}

pub fn build_batch_sql(batch: &MutationBatch) -> BatchStatements {
    let mut upserts = Vec::new();
    let mut edges = Vec::new();
    match batch {
        MutationBatch::Works(records) => {
            for rec in records {
                if let Ok(v) = serde_json::to_value(rec) {
                    let id = sanitize_id(&rec.work_id);
                    upserts.push(format!("UPSERT {WORK_TABLE}:{id} MERGE {v};"));
                }
            }
        }
        MutationBatch::Persons(records) => {
            for rec in records {
                if let Ok(v) = serde_json::to_value(rec) {
                    let id = sanitize_id(&rec.person_id);
                    upserts.push(format!("UPSERT {PERSON_TABLE}:{id} MERGE {v};"));
                }
            }
        }
        MutationBatch::Participations(records) => {
            for rec in records {
                let payload = edge_payload(rec);
                let eid = rec.edge_id();
                let pid = sanitize_id(&rec.person_id);
                let wid = sanitize_id(&rec.work_id);
                edges.push(EdgeStatements {
                    relate: format!(
                        "RELATE {PERSON_TABLE}:{pid}->{EDGE_TABLE}:{eid}->{WORK_TABLE}:{wid} CONTENT {payload};"
                    ),
                    overlay: format!("UPDATE {EDGE_TABLE}:{eid} MERGE {payload};"),
                });
            }
        }
    }
    BatchStatements { upserts, edges }
}

/// Edge attribute payload. Absent job/characters are omitted so a re-run
/// overlay never erases a previously set value.
fn edge_payload(rec: &ParticipationEdge) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert(
        "category".to_string(),
        Value::String(rec.category.as_str().to_string()),
    );
    if let Some(ord) = rec.ordering {
        obj.insert("ordering".to_string(), Value::Number(ord.into()));
    }
    if let Some(job) = &rec.job {
        obj.insert("job".to_string(), Value::String(job.clone()));
    }
    if let Some(chars) = &rec.characters {
        obj.insert(
            "characters".to_string(),
            Value::Array(chars.iter().cloned().map(Value::String).collect()),
        );
    }
    Value::Object(obj)
}

/// Record-id part derived from an external key: alphanumerics pass through,
/// runs of anything else collapse to a single underscore.
pub fn sanitize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_us = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_us = false;
        } else {
            if !last_was_us {
                out.push('_');
            }
            last_was_us = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Wrap consecutive statements in `BEGIN; ...; COMMIT;` chunks of at most
/// `group_size` statements to cut round trips while keeping each chunk
/// all-or-nothing.
pub fn group_statements(stmts: &[String], group_size: usize) -> Vec<String> {
    if group_size <= 1 {
        return stmts
            .iter()
            .map(|s| format!("BEGIN; {} COMMIT;", s))
            .collect();
    }
    let mut out = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for s in stmts {
        if count == 0 {
            current.push_str("BEGIN; ");
        }
        current.push_str(s);
        if !s.ends_with(';') {
            current.push(';');
        }
        current.push(' ');
        count += 1;
        if count >= group_size {
            current.push_str("COMMIT;");
            out.push(current);
            current = String::new();
            count = 0;
        }
    }
    if count > 0 {
        current.push_str("COMMIT;");
        out.push(current);
    }
    out
}

/// Pull a `table:id` token out of a row returned by `SELECT id FROM ...`.
/// Different client backends return record ids either as plain strings or
/// as `{tb, id}` objects; probe both shapes.
pub fn extract_record_id(v: &Value) -> Option<String> {
    if let Some(s) = v.as_str() {
        if s.contains(':') {
            return Some(s.to_string());
        }
        return None;
    }
    if let Some(obj) = v.as_object() {
        if let (Some(tb), Some(id)) = (
            obj.get("tb").and_then(|x| x.as_str()),
            obj.get("id").and_then(|x| x.as_str()),
        ) {
            return Some(format!("{}:{}", tb, id));
        }
        if let Some(inner) = obj.get("id") {
            return extract_record_id(inner);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{Category, ParticipationRecord};

    #[test]
    fn sanitize_id_collapses_runs() {
        assert_eq!(sanitize_id("tt0000001"), "tt0000001");
        assert_eq!(sanitize_id("a b//c"), "a_b_c");
        assert_eq!(sanitize_id("___"), "_");
    }

    #[test]
    fn work_upserts_merge_by_key() {
        let batch = MutationBatch::Works(vec![WorkRecord {
            work_id: "tt1".into(),
            title_type: Some("movie".into()),
            primary_title: Some("Carmencita".into()),
            original_title: None,
            is_adult: Some(false),
            start_year: Some(1894),
            end_year: None,
            runtime_minutes: None,
            genres: None,
        }]);
        let stmts = build_batch_sql(&batch);
        assert_eq!(stmts.edges.len(), 0);
        assert_eq!(stmts.upserts.len(), 1);
        let s = &stmts.upserts[0];
        assert!(s.starts_with("UPSERT work:tt1 MERGE {"), "{s}");
        assert!(s.contains(r#""start_year":1894"#));
        // absent fields stay out of the payload
        assert!(!s.contains("end_year"));
        assert!(!s.contains(r"\N"));
    }

    #[test]
    fn edge_statements_carry_overlay() {
        let rec = ParticipationEdge::from_record(ParticipationRecord {
            work_id: "tt1".into(),
            person_id: "nm1".into(),
            ordering: Some(1),
            category: Category::Actor,
            job: None,
            characters_raw: Some(r#"["Lead"]"#.into()),
        });
        let eid = rec.edge_id();
        let stmts = build_batch_sql(&MutationBatch::Participations(vec![rec]));
        assert_eq!(stmts.upserts.len(), 0);
        assert_eq!(stmts.edges.len(), 1);
        let e = &stmts.edges[0];
        assert!(e
            .relate
            .starts_with(&format!("RELATE person:nm1->participated_in:{eid}->work:tt1")));
        assert!(e.relate.contains(r#""characters":["Lead"]"#));
        assert!(e.overlay.starts_with(&format!("UPDATE participated_in:{eid} MERGE")));
        // no job on a plain actor row: the overlay must not mention it
        assert!(!e.overlay.contains("job"));
    }

    #[test]
    fn statements_group_into_transactions() {
        let stmts: Vec<String> = (0..5).map(|i| format!("UPSERT work:t{i} MERGE {{}};")).collect();
        let grouped = group_statements(&stmts, 2);
        assert_eq!(grouped.len(), 3);
        assert!(grouped.iter().all(|c| c.starts_with("BEGIN; ") && c.ends_with("COMMIT;")));
        assert!(grouped[0].contains("work:t0") && grouped[0].contains("work:t1"));
        assert!(grouped[2].contains("work:t4"));
    }

    #[test]
    fn record_id_extraction_handles_both_shapes() {
        assert_eq!(
            extract_record_id(&serde_json::json!("work:tt1")),
            Some("work:tt1".to_string())
        );
        assert_eq!(
            extract_record_id(&serde_json::json!({"tb": "work", "id": "tt1"})),
            Some("work:tt1".to_string())
        );
        assert_eq!(
            extract_record_id(&serde_json::json!({"id": "work:tt1"})),
            Some("work:tt1".to_string())
        );
        assert_eq!(extract_record_id(&serde_json::json!(42)), None);
    }
}
