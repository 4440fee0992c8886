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
fn burn_down_empties_the_graph() {
    let dir = tempfile::tempdir().unwrap();
    write_extracts(
        dir.path(),
        &["tt0000030\tmovie\tGone Soon\tGone Soon\t0\t1920\t\\N\t30\tDrama"],
        &["nm0000030\tDel Delta\t1890\t\\N\tactor\ttt0000030"],
        &["tt0000030\t1\tnm0000030\tactor\t\\N\t[\"Hero\"]"],
    );
    let cfg = test_config(dir.path(), "e2e_burn_down");
    let pipeline = Pipeline::connect(cfg).unwrap();
    pipeline.run().unwrap();

    let store = Store::open("e2e_burn_down");
    assert_eq!(store.count("work"), 1);
    assert_eq!(store.count("person"), 1);
    assert_eq!(store.count("participated_in"), 1);

    let deleted = pipeline.burn_down().unwrap();
    assert!(deleted >= 3, "expected at least 3 deletions, got {deleted}");
    assert_eq!(store.count("work"), 0);
    assert_eq!(store.count("person"), 0);
    assert_eq!(store.count("participated_in"), 0);

    // a fresh load after teardown comes back clean
    pipeline.run().unwrap();
    assert_eq!(store.count("work"), 1);
    assert_eq!(store.count("participated_in"), 1);
}
