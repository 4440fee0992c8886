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

//! Pipeline orchestrator.
//!
//! Phases run strictly in order; each drains its input stream and flushes
//! its final partial batch before the next phase starts. Within a load
//! phase the reading/normalizing/batching side runs on the calling thread
//! and feeds a writer thread over a bounded channel, so at most one batch
//! group is in flight per stage. Any phase failure surfaces tagged with the
//! phase name; committed batches from earlier phases stand (idempotent
//! re-run, not whole-run rollback).

mod burn_down;

use std::fmt;
use std::path::Path;

use log::{info, warn};

use crate::batcher::Batcher;
use crate::config::AppConfig;
use crate::db_writer::{
    connect, schema, spawn_db_writer, MutationBatch, SurrealConnection, PERSON_TABLE, WORK_TABLE,
};
use crate::errors::EtlError;
use crate::ingest::{
    ParticipationEdge, ParticipationRecord, PersonRecord, RawRow, TsvReader, WorkRecord,
};
use crate::membership::{MembershipBuilder, MembershipIndex};
use crate::progress::{PhaseStats, Progress, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BootstrapWorkIndex,
    LoadWorks,
    BuildWorkMembership,
    ScanParticipations,
    BootstrapPersonIndex,
    LoadPersons,
    LoadParticipations,
    BootstrapEdgeIndexes,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::BootstrapWorkIndex => "bootstrap-work-index",
            Phase::LoadWorks => "load-works",
            Phase::BuildWorkMembership => "build-work-membership",
            Phase::ScanParticipations => "scan-participations",
            Phase::BootstrapPersonIndex => "bootstrap-person-index",
            Phase::LoadPersons => "load-persons",
            Phase::LoadParticipations => "load-participations",
            Phase::BootstrapEdgeIndexes => "bootstrap-edge-indexes",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn tag<T>(phase: Phase, result: Result<T, EtlError>) -> Result<T, EtlError> {
    result.map_err(|e| EtlError::Phase {
        phase: phase.name(),
        source: Box::new(e),
    })
}

/// Owns the run configuration, a runtime for orchestrator-side store calls,
/// and the store connection, all injected at construction; writer threads
/// get their own connections from the same parameters.
pub struct Pipeline {
    cfg: AppConfig,
    rt: tokio::runtime::Runtime,
    db: SurrealConnection,
}

impl Pipeline {
    pub fn connect(cfg: AppConfig) -> Result<Pipeline, EtlError> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| EtlError::Config(format!("runtime: {e}")))?;
        let db = rt.block_on(connect(
            &cfg.surreal_url,
            &cfg.surreal_username,
            &cfg.surreal_password,
            &cfg.surreal_ns,
            &cfg.surreal_db,
        ))?;
        Ok(Pipeline { cfg, rt, db })
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    /// Runs the full load: every phase, in order, to completion.
    pub fn run(&self) -> Result<RunSummary, EtlError> {
        let mut summary = RunSummary::default();

        info!("phase {}", Phase::BootstrapWorkIndex);
        tag(
            Phase::BootstrapWorkIndex,
            self.rt.block_on(async {
                schema::ensure_base_schema(&self.db).await?;
                schema::bootstrap_node_index(&self.db, WORK_TABLE, "work_id").await
            }),
        )?;

        info!("phase {}", Phase::LoadWorks);
        let stats = tag(Phase::LoadWorks, self.load_works())?;
        summary.record(Phase::LoadWorks.name(), stats);

        info!("phase {}", Phase::BuildWorkMembership);
        let works = tag(
            Phase::BuildWorkMembership,
            self.rt
                .block_on(MembershipIndex::from_store_keys(&self.db, WORK_TABLE, "work_id")),
        )?;
        info!("work membership holds {} keys", works.len());

        info!("phase {}", Phase::ScanParticipations);
        let (relevant_persons, stats) =
            tag(Phase::ScanParticipations, self.scan_participations(&works))?;
        summary.record(Phase::ScanParticipations.name(), stats);
        info!("person membership holds {} keys", relevant_persons.len());

        info!("phase {}", Phase::BootstrapPersonIndex);
        tag(
            Phase::BootstrapPersonIndex,
            self.rt
                .block_on(schema::bootstrap_node_index(&self.db, PERSON_TABLE, "person_id")),
        )?;

        info!("phase {}", Phase::LoadPersons);
        let stats = tag(Phase::LoadPersons, self.load_persons(&relevant_persons))?;
        summary.record(Phase::LoadPersons.name(), stats);

        info!("phase {}", Phase::LoadParticipations);
        let stats = tag(Phase::LoadParticipations, self.load_participations(&works))?;
        summary.record(Phase::LoadParticipations.name(), stats);

        info!("phase {}", Phase::BootstrapEdgeIndexes);
        tag(
            Phase::BootstrapEdgeIndexes,
            self.rt.block_on(schema::bootstrap_edge_indexes(&self.db)),
        )?;

        summary.log();
        Ok(summary)
    }

    /// Drops the pipeline's indexes and deletes all nodes and edges in
    /// bounded batches.
    pub fn burn_down(&self) -> Result<u64, EtlError> {
        self.rt
            .block_on(burn_down::burn_down(&self.db, self.cfg.delete_batch))
    }

    fn load_works(&self) -> Result<PhaseStats, EtlError> {
        let title_types = &self.cfg.title_types;
        self.run_load_phase(
            "works",
            &self.cfg.titles_path(),
            |row| {
                let rec = WorkRecord::from_row(row)?;
                let keep = rec
                    .title_type
                    .as_deref()
                    .is_some_and(|t| title_types.iter().any(|q| q == t));
                Ok(keep.then_some(rec))
            },
            MutationBatch::Works,
        )
    }

    fn load_persons(&self, relevant: &MembershipIndex) -> Result<PhaseStats, EtlError> {
        self.run_load_phase(
            "persons",
            &self.cfg.names_path(),
            |row| {
                let rec = PersonRecord::from_row(row)?;
                Ok(relevant.contains(&rec.person_id).then_some(rec))
            },
            MutationBatch::Persons,
        )
    }

    fn load_participations(&self, works: &MembershipIndex) -> Result<PhaseStats, EtlError> {
        // Edge endpoints must exist in the store at creation time, so the
        // person side is rebuilt from store keys rather than reusing the
        // scan-phase set (a relevant person can still be missing from the
        // names extract).
        let persons = self.rt.block_on(MembershipIndex::from_store_keys(
            &self.db,
            PERSON_TABLE,
            "person_id",
        ))?;
        info!("person store membership holds {} keys", persons.len());
        self.run_load_phase(
            "participations",
            &self.cfg.principals_path(),
            |row| {
                let rec = ParticipationRecord::from_row(row)?;
                if !rec.qualifies_for_edge()
                    || !works.contains(&rec.work_id)
                    || !persons.contains(&rec.person_id)
                {
                    return Ok(None);
                }
                Ok(Some(ParticipationEdge::from_record(rec)))
            },
            MutationBatch::Participations,
        )
    }

    /// Pass over the principals extract that collects the person keys
    /// relevant to at least one retained work. Read-only: no writer.
    fn scan_participations(
        &self,
        works: &MembershipIndex,
    ) -> Result<(MembershipIndex, PhaseStats), EtlError> {
        let mut builder = MembershipBuilder::new();
        let mut stats = PhaseStats::default();
        let mut progress = Progress::new("scan-participations", self.cfg.report_interval);
        for row in TsvReader::open(&self.cfg.principals_path())? {
            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_recoverable() => {
                    warn!("skipping row: {}", e);
                    stats.rows_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            stats.rows_read += 1;
            progress.tick();
            let rec = match ParticipationRecord::from_row(&row) {
                Ok(rec) => rec,
                Err(e) if e.is_recoverable() => {
                    warn!("skipping row: {}", e);
                    stats.rows_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if works.contains(&rec.work_id) && rec.qualifies_for_person() {
                stats.rows_accepted += 1;
                builder.insert(rec.person_id);
            } else {
                stats.rows_filtered += 1;
            }
        }
        progress.done();
        Ok((builder.freeze(), stats))
    }

    /// Common shape of the three load phases: stream, normalize, filter,
    /// batch, hand off to the writer, then join it for its totals.
    fn run_load_phase<T>(
        &self,
        label: &'static str,
        path: &Path,
        mut accept: impl FnMut(&RawRow) -> Result<Option<T>, EtlError>,
        wrap: impl Fn(Vec<T>) -> MutationBatch,
    ) -> Result<PhaseStats, EtlError> {
        let reader = TsvReader::open(path)?;
        let (tx, join) = spawn_db_writer(self.cfg.writer_config())?;
        let mut batcher = Batcher::new(self.cfg.batch_size);
        let mut stats = PhaseStats::default();
        let mut progress = Progress::new(label, self.cfg.report_interval);
        let mut writer_gone = false;

        for row in reader {
            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_recoverable() => {
                    warn!("skipping row: {}", e);
                    stats.rows_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            stats.rows_read += 1;
            progress.tick();
            match accept(&row) {
                Ok(Some(item)) => {
                    stats.rows_accepted += 1;
                    if let Some(batch) = batcher.push(item) {
                        if tx.send(wrap(batch)).is_err() {
                            writer_gone = true;
                            break;
                        }
                    }
                }
                Ok(None) => stats.rows_filtered += 1,
                Err(e) if e.is_recoverable() => {
                    warn!("skipping row: {}", e);
                    stats.rows_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        if !writer_gone {
            if let Some(batch) = batcher.flush() {
                let _ = tx.send(wrap(batch));
            }
        }
        drop(tx);
        progress.done();

        let writer_stats = join
            .join()
            .map_err(|_| EtlError::BatchWrite {
                attempts: 0,
                message: "writer thread panicked".to_string(),
            })??;
        stats.writer = Some(writer_stats);
        Ok(stats)
    }
}
