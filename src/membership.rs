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

//! Membership index: a set of known-valid external keys used to gate
//! later-phase node and edge creation.
//!
//! Built single-writer during one phase, then frozen into a cheaply
//! cloneable read-only index consumed by subsequent phases. Rebuilt from
//! scratch on every run; never persisted.

use std::collections::HashSet;
use std::sync::Arc;

use crate::db_writer::SurrealConnection;
use crate::errors::EtlError;

#[derive(Default)]
pub struct MembershipBuilder {
    keys: HashSet<String>,
}

impl MembershipBuilder {
    pub fn new() -> MembershipBuilder {
        MembershipBuilder::default()
    }

    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn freeze(self) -> MembershipIndex {
        MembershipIndex {
            keys: Arc::new(self.keys),
        }
    }
}

/// Frozen, read-only key set. Clones share the underlying storage.
#[derive(Clone)]
pub struct MembershipIndex {
    keys: Arc<HashSet<String>>,
}

impl MembershipIndex {
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Builds the index from the key field of every row currently in a
    /// store table (the "which nodes already exist" use).
    pub async fn from_store_keys(
        db: &SurrealConnection,
        table: &str,
        key_field: &str,
    ) -> Result<MembershipIndex, EtlError> {
        let mut resp = db
            .query_checked(&format!("SELECT VALUE {key_field} FROM {table};"))
            .await?;
        let keys: Vec<Option<String>> = resp.take(0)?;
        let mut builder = MembershipBuilder::new();
        for key in keys.into_iter().flatten() {
            builder.insert(key);
        }
        Ok(builder.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_then_freeze() {
        let mut b = MembershipBuilder::new();
        assert!(b.insert("tt1"));
        assert!(!b.insert("tt1"));
        b.insert("tt2");
        assert_eq!(b.len(), 2);
        let idx = b.freeze();
        assert!(idx.contains("tt1"));
        assert!(!idx.contains("tt3"));
        let shared = idx.clone();
        assert_eq!(shared.len(), 2);
    }
}
