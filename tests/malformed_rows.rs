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

mod common;

use common::{test_config, write_extracts, Store};
use screengraph::Pipeline;

#[test]
fn malformed_rows_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_extracts(
        dir.path(),
        &[
            "tt0000021\tmovie\tKept\tKept\t0\t1911\t\\N\t21\tDrama",
            // wrong column count: skipped with a warning
            "tt0000022\tmovie\tTruncated",
            // non-numeric year: conversion failure, row skipped
            "tt0000023\tmovie\tBad Year\tBad Year\t0\tnineteen\t\\N\t23\tDrama",
        ],
        &[],
        &[],
    );
    let cfg = test_config(dir.path(), "e2e_malformed");
    let pipeline = Pipeline::connect(cfg).unwrap();
    let summary = pipeline.run().unwrap();

    let store = Store::open("e2e_malformed");
    assert_eq!(store.count("work"), 1);
    let (_, load_works) = summary
        .phases
        .iter()
        .find(|(phase, _)| *phase == "load-works")
        .expect("load-works stats");
    assert_eq!(load_works.rows_skipped, 2);
    assert_eq!(load_works.rows_accepted, 1);
}
