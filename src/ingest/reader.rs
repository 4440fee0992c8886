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

//! Streaming tab-delimited reader.
//!
//! Yields one [`RawRow`] per source row without ever materializing the file;
//! the inputs run to multiple gigabytes. Quoting is disabled because the
//! `characters` column carries literal JSON text that would otherwise
//! confuse a quote-aware parser.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::EtlError;

#[derive(Debug)]
pub struct TsvReader {
    reader: csv::Reader<File>,
    columns: Arc<HashMap<String, usize>>,
    path: PathBuf,
    /// 1-based line of the most recently read row; the header is line 1.
    line: u64,
}

/// A single source row: field lookup by header name over the raw record.
#[derive(Debug)]
pub struct RawRow {
    record: csv::StringRecord,
    columns: Arc<HashMap<String, usize>>,
    pub line: u64,
}

impl RawRow {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns.get(name).and_then(|&i| self.record.get(i))
    }
}

impl TsvReader {
    pub fn open(path: &Path) -> Result<TsvReader, EtlError> {
        let file = File::open(path).map_err(|e| EtlError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(file);
        let headers = reader.headers().map_err(|e| EtlError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: format!("unreadable header row: {e}"),
        })?;
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Ok(TsvReader {
            reader,
            columns: Arc::new(columns),
            path: path.to_path_buf(),
            line: 1,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for TsvReader {
    type Item = Result<RawRow, EtlError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = csv::StringRecord::new();
        self.line += 1;
        match self.reader.read_record(&mut record) {
            Ok(false) => None,
            Ok(true) => {
                if record.len() != self.columns.len() {
                    let raw = record.iter().collect::<Vec<_>>().join("\t");
                    Some(Err(EtlError::MalformedRecord {
                        line: self.line,
                        reason: format!(
                            "expected {} fields, found {}: {}",
                            self.columns.len(),
                            record.len(),
                            truncate(&raw, 200)
                        ),
                    }))
                } else {
                    Some(Ok(RawRow {
                        record,
                        columns: Arc::clone(&self.columns),
                        line: self.line,
                    }))
                }
            }
            Err(e) => {
                // encoding problems are row-scoped; real IO failures abort
                if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) {
                    Some(Err(EtlError::MalformedRecord {
                        line: self.line,
                        reason: format!("invalid UTF-8: {e}"),
                    }))
                } else {
                    Some(Err(EtlError::SourceUnavailable {
                        path: self.path.clone(),
                        reason: format!("read failed at line {}: {e}", self.line),
                    }))
                }
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tsv(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let err = TsvReader::open(Path::new("/nonexistent/titles.tsv")).unwrap_err();
        assert!(matches!(err, EtlError::SourceUnavailable { .. }));
    }

    #[test]
    fn rows_resolve_fields_by_header_name() {
        let f = write_tsv("tconst\ttitleType\tprimaryTitle\ntt1\tmovie\tCarmencita\n");
        let mut reader = TsvReader::open(f.path()).unwrap();
        let row = reader.next().unwrap().unwrap();
        assert_eq!(row.line, 2);
        assert_eq!(row.get("tconst"), Some("tt1"));
        assert_eq!(row.get("primaryTitle"), Some("Carmencita"));
        assert_eq!(row.get("nope"), None);
        assert!(reader.next().is_none());
    }

    #[test]
    fn wrong_column_count_is_malformed_and_recoverable() {
        let f = write_tsv("a\tb\tc\n1\t2\n1\t2\t3\n");
        let mut reader = TsvReader::open(f.path()).unwrap();
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, EtlError::MalformedRecord { line: 2, .. }));
        assert!(err.is_recoverable());
        // the stream continues past the bad row
        let row = reader.next().unwrap().unwrap();
        assert_eq!(row.get("c"), Some("3"));
    }

    #[test]
    fn quotes_are_passed_through_verbatim() {
        let f = write_tsv("tconst\tcharacters\ntt1\t[\"Lead\",\"Nandu\"]\n");
        let mut reader = TsvReader::open(f.path()).unwrap();
        let row = reader.next().unwrap().unwrap();
        assert_eq!(row.get("characters"), Some(r#"["Lead","Nandu"]"#));
    }
}
