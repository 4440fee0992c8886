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
fn rerunning_the_pipeline_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_extracts(
        dir.path(),
        &[
            "tt0000010\tmovie\tFirst\tFirst\t0\t1900\t\\N\t10\tDrama",
            "tt0000011\tmovie\tSecond\tSecond\t0\t1901\t\\N\t12\tDrama",
            "tt0000012\tmovie\tThird\tThird\t0\t1902\t\\N\t14\tDrama,Short",
        ],
        &[
            "nm0000010\tAda Alpha\t1870\t\\N\tactress\ttt0000010",
            "nm0000011\tBen Beta\t1872\t\\N\tdirector\ttt0000011",
        ],
        &[
            "tt0000010\t1\tnm0000010\tactress\t\\N\t[\"Heroine\"]",
            "tt0000011\t1\tnm0000011\tdirector\t\\N\t\\N",
            "tt0000012\t1\tnm0000010\tactress\t\\N\t[\"Queen\"]",
        ],
    );
    let cfg = test_config(dir.path(), "e2e_idempotent");
    let pipeline = Pipeline::connect(cfg).unwrap();
    pipeline.run().unwrap();

    let store = Store::open("e2e_idempotent");
    let first = (
        store.count("work"),
        store.count("person"),
        store.count("participated_in"),
    );
    assert_eq!(first, (3, 2, 3));

    // second run over identical input: same counts, no duplicates, and the
    // director edge keeps its derived job
    pipeline.run().unwrap();
    let second = (
        store.count("work"),
        store.count("person"),
        store.count("participated_in"),
    );
    assert_eq!(first, second);

    let jobs = store.rows("SELECT job FROM participated_in WHERE category = 'director';");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["job"], "director");
}
