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

//! Progress counters and the end-of-run summary. Pure observers: nothing
//! here feeds back into the pipeline.

use std::time::Instant;

use log::info;

use crate::db_writer::WriterStats;

pub struct Progress {
    label: &'static str,
    interval: u64,
    rows: u64,
    started: Instant,
}

impl Progress {
    pub fn new(label: &'static str, interval: u64) -> Progress {
        Progress {
            label,
            interval: interval.max(1),
            rows: 0,
            started: Instant::now(),
        }
    }

    pub fn tick(&mut self) {
        self.rows += 1;
        if self.rows % self.interval == 0 {
            info!(
                "{}: {} rows in {:.2}s",
                self.label,
                self.rows,
                self.started.elapsed().as_secs_f64()
            );
        }
    }

    pub fn done(&self) {
        info!(
            "{}: finished {} rows in {:.2}s",
            self.label,
            self.rows,
            self.started.elapsed().as_secs_f64()
        );
    }
}

/// Per-phase counters. `rows_skipped` counts malformed/unconvertible rows,
/// `rows_filtered` counts well-formed rows the phase's filter rejected.
#[derive(Debug, Default, Clone)]
pub struct PhaseStats {
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub rows_filtered: u64,
    pub rows_accepted: u64,
    pub writer: Option<WriterStats>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub phases: Vec<(&'static str, PhaseStats)>,
}

impl RunSummary {
    pub fn record(&mut self, phase: &'static str, stats: PhaseStats) {
        self.phases.push((phase, stats));
    }

    pub fn log(&self) {
        let mut processed = 0u64;
        let mut committed = 0usize;
        for (phase, stats) in &self.phases {
            match &stats.writer {
                Some(w) => info!(
                    "{}: read={} skipped={} filtered={} accepted={} written={} batches={} batch_failures={}",
                    phase,
                    stats.rows_read,
                    stats.rows_skipped,
                    stats.rows_filtered,
                    stats.rows_accepted,
                    w.rows_written,
                    w.batches,
                    w.failures
                ),
                None => info!(
                    "{}: read={} skipped={} filtered={} accepted={}",
                    phase, stats.rows_read, stats.rows_skipped, stats.rows_filtered, stats.rows_accepted
                ),
            }
            processed += stats.rows_read;
            if let Some(w) = &stats.writer {
                committed += w.rows_written;
            }
        }
        info!(
            "run complete: {} source rows processed, {} records committed",
            processed, committed
        );
    }
}
