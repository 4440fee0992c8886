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

//! Typed records for the three source extracts and the sentinel-null
//! normalization rules.
//!
//! The source format marks missing values with the literal `\N` and packs
//! multi-valued fields into comma-joined strings. Everything here maps those
//! conventions onto `Option`s and `Vec`s; the marker string never survives
//! normalization. Optional fields carry `skip_serializing_if` so absent
//! values are omitted from store payloads entirely, which is what makes the
//! upsert merges last-non-null-wins.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::EtlError;
use crate::ingest::reader::RawRow;

/// Reserved null marker in the source files.
pub const SENTINEL: &str = r"\N";

const LIST_SEPARATOR: char = ',';

pub fn opt_str(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() || t == SENTINEL {
        None
    } else {
        Some(t.to_string())
    }
}

pub fn opt_i32(raw: &str, field: &'static str, line: u64) -> Result<Option<i32>, EtlError> {
    match opt_str(raw) {
        None => Ok(None),
        Some(v) => v.parse::<i32>().map(Some).map_err(|_| EtlError::FieldConversion {
            field,
            line,
            value: v,
        }),
    }
}

/// Source encodes booleans as `0`/`1`.
pub fn opt_flag(raw: &str, field: &'static str, line: u64) -> Result<Option<bool>, EtlError> {
    Ok(opt_i32(raw, field, line)?.map(|v| v != 0))
}

/// Comma-joined list field. Sentinel maps to absent, never to an empty list.
pub fn opt_list(raw: &str) -> Option<Vec<String>> {
    opt_str(raw).map(|v| {
        v.split(LIST_SEPARATOR)
            .map(|s| s.trim().to_string())
            .collect()
    })
}

/// The `characters` column holds JSON-array text (`["Lead","Nandu"]`) in
/// most rows but occasionally bare or quoted text. Parse the JSON forms,
/// fall back to a single-element list otherwise.
pub fn parse_characters(raw: &str) -> Vec<String> {
    let t = raw.trim();
    if t.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(t) {
            return list;
        }
    } else if t.starts_with('"') {
        if let Ok(one) = serde_json::from_str::<String>(t) {
            return vec![one];
        }
    }
    vec![t.to_string()]
}

fn require<'r>(row: &'r RawRow, name: &'static str) -> Result<&'r str, EtlError> {
    row.get(name).ok_or_else(|| EtlError::MalformedRecord {
        line: row.line,
        reason: format!("missing column `{name}`"),
    })
}

fn require_key(row: &RawRow, name: &'static str) -> Result<String, EtlError> {
    opt_str(require(row, name)?).ok_or_else(|| EtlError::MalformedRecord {
        line: row.line,
        reason: format!("empty key column `{name}`"),
    })
}

/// Participation role category. The source value set is open-ended
/// (`producer`, `cinematographer`, ...); everything outside the five
/// categories the pipeline cares about collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Actor,
    Actress,
    Director,
    Writer,
    SelfAppearance,
    Other,
}

impl Category {
    pub fn parse(raw: &str) -> Category {
        match raw.trim() {
            "actor" => Category::Actor,
            "actress" => Category::Actress,
            "director" => Category::Director,
            "writer" => Category::Writer,
            "self" => Category::SelfAppearance,
            _ => Category::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Actor => "actor",
            Category::Actress => "actress",
            Category::Director => "director",
            Category::Writer => "writer",
            Category::SelfAppearance => "self",
            Category::Other => "other",
        }
    }
}

/// One row of the titles extract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkRecord {
    pub work_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_adult: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
}

impl WorkRecord {
    pub fn from_row(row: &RawRow) -> Result<WorkRecord, EtlError> {
        Ok(WorkRecord {
            work_id: require_key(row, "tconst")?,
            title_type: opt_str(require(row, "titleType")?),
            primary_title: opt_str(require(row, "primaryTitle")?),
            original_title: opt_str(require(row, "originalTitle")?),
            is_adult: opt_flag(require(row, "isAdult")?, "isAdult", row.line)?,
            start_year: opt_i32(require(row, "startYear")?, "startYear", row.line)?,
            end_year: opt_i32(require(row, "endYear")?, "endYear", row.line)?,
            runtime_minutes: opt_i32(
                require(row, "runtimeMinutes")?,
                "runtimeMinutes",
                row.line,
            )?,
            genres: opt_list(require(row, "genres")?),
        })
    }
}

/// One row of the names extract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    pub person_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_profession: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_for_works: Option<Vec<String>>,
}

impl PersonRecord {
    pub fn from_row(row: &RawRow) -> Result<PersonRecord, EtlError> {
        Ok(PersonRecord {
            person_id: require_key(row, "nconst")?,
            primary_name: opt_str(require(row, "primaryName")?),
            birth_year: opt_i32(require(row, "birthYear")?, "birthYear", row.line)?,
            death_year: opt_i32(require(row, "deathYear")?, "deathYear", row.line)?,
            primary_profession: opt_list(require(row, "primaryProfession")?),
            known_for_works: opt_list(require(row, "knownForTitles")?),
        })
    }
}

/// One row of the principals extract, before category rules are applied.
#[derive(Debug, Clone)]
pub struct ParticipationRecord {
    pub work_id: String,
    pub person_id: String,
    pub ordering: Option<i32>,
    pub category: Category,
    pub job: Option<String>,
    /// Raw characters text, sentinel-normalized but not yet parsed.
    pub characters_raw: Option<String>,
}

impl ParticipationRecord {
    pub fn from_row(row: &RawRow) -> Result<ParticipationRecord, EtlError> {
        Ok(ParticipationRecord {
            work_id: require_key(row, "tconst")?,
            person_id: require_key(row, "nconst")?,
            ordering: opt_i32(require(row, "ordering")?, "ordering", row.line)?,
            category: Category::parse(require(row, "category")?),
            job: opt_str(require(row, "job")?),
            characters_raw: opt_str(require(row, "characters")?),
        })
    }

    /// A `self` row counts as a real appearance only when its characters
    /// value is present and is not the `"Self"` placeholder.
    pub fn is_real_self_appearance(&self) -> bool {
        self.category == Category::SelfAppearance
            && self
                .characters_raw
                .as_deref()
                .is_some_and(|raw| parse_characters(raw) != ["Self"])
    }

    /// Membership rule for person materialization: actor, actress or
    /// director, or a real self-appearance.
    pub fn qualifies_for_person(&self) -> bool {
        matches!(
            self.category,
            Category::Actor | Category::Actress | Category::Director
        ) || self.is_real_self_appearance()
    }

    /// Edge rule: writers additionally qualify for participation edges even
    /// though they do not pull a person into the membership set on their own.
    pub fn qualifies_for_edge(&self) -> bool {
        matches!(
            self.category,
            Category::Actor | Category::Actress | Category::Director | Category::Writer
        ) || self.is_real_self_appearance()
    }
}

/// Normalized participation edge payload, one per qualifying principals row.
#[derive(Debug, Clone)]
pub struct ParticipationEdge {
    pub work_id: String,
    pub person_id: String,
    pub category: Category,
    pub ordering: Option<i32>,
    pub job: Option<String>,
    pub characters: Option<Vec<String>>,
}

impl ParticipationEdge {
    /// Applies the category-derived attribute rules: directors and writers
    /// get a fixed `job`, cast rows with no characters value get the
    /// `Undefined` placeholder list, everything else carries the parsed
    /// characters through.
    pub fn from_record(rec: ParticipationRecord) -> ParticipationEdge {
        let job = match rec.category {
            Category::Director => Some("director".to_string()),
            Category::Writer => Some("writer".to_string()),
            _ => rec.job,
        };
        let characters = match (&rec.category, rec.characters_raw.as_deref()) {
            (Category::Actor | Category::Actress, None) => {
                Some(vec!["Undefined".to_string()])
            }
            (_, Some(raw)) => Some(parse_characters(raw)),
            (_, None) => None,
        };
        ParticipationEdge {
            work_id: rec.work_id,
            person_id: rec.person_id,
            category: rec.category,
            ordering: rec.ordering,
            job,
            characters,
        }
    }

    /// Deterministic record id over the edge's composite natural key, so
    /// re-applying the same input always targets the same relation row.
    pub fn edge_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.work_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.person_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.category.as_str().as_bytes());
        hasher.update(b"|");
        if let Some(ord) = self.ordering {
            hasher.update(ord.to_string().as_bytes());
        }
        format!("p_{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participation(category: &str, characters: Option<&str>) -> ParticipationRecord {
        ParticipationRecord {
            work_id: "tt0000001".into(),
            person_id: "nm0000001".into(),
            ordering: Some(1),
            category: Category::parse(category),
            job: None,
            characters_raw: characters.map(|s| s.to_string()),
        }
    }

    #[test]
    fn sentinel_maps_to_absent() {
        assert_eq!(opt_str(r"\N"), None);
        assert_eq!(opt_str(""), None);
        assert_eq!(opt_str("x"), Some("x".to_string()));
    }

    #[test]
    fn numeric_fields_convert_or_fail_per_row() {
        assert_eq!(opt_i32("1894", "startYear", 2).unwrap(), Some(1894));
        assert_eq!(opt_i32(r"\N", "startYear", 2).unwrap(), None);
        // semantically odd but well-typed values pass through
        assert_eq!(opt_i32("-5", "startYear", 2).unwrap(), Some(-5));
        let err = opt_i32("abc", "startYear", 7).unwrap_err();
        assert!(matches!(err, EtlError::FieldConversion { line: 7, .. }));
    }

    #[test]
    fn list_fields_split_in_order() {
        assert_eq!(
            opt_list("a,b,c"),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        // sentinel is absent, not an empty list
        assert_eq!(opt_list(r"\N"), None);
    }

    #[test]
    fn characters_parse_json_and_fallback() {
        assert_eq!(parse_characters(r#"["Lead","Nandu"]"#), ["Lead", "Nandu"]);
        assert_eq!(parse_characters(r#""Self""#), ["Self"]);
        assert_eq!(parse_characters("Lead"), ["Lead"]);
    }

    #[test]
    fn person_membership_categories() {
        assert!(participation("actor", None).qualifies_for_person());
        assert!(participation("actress", None).qualifies_for_person());
        assert!(participation("director", None).qualifies_for_person());
        assert!(!participation("writer", None).qualifies_for_person());
        assert!(!participation("cinematographer", None).qualifies_for_person());
    }

    #[test]
    fn self_rows_need_real_characters() {
        assert!(!participation("self", None).qualifies_for_person());
        assert!(!participation("self", Some(r"\N")).qualifies_for_person());
        assert!(!participation("self", Some(r#""Self""#)).qualifies_for_person());
        assert!(!participation("self", Some(r#"["Self"]"#)).qualifies_for_person());
        assert!(participation("self", Some(r#"["Herself - Host"]"#)).qualifies_for_person());
    }

    #[test]
    fn edge_categories_include_writers() {
        assert!(participation("writer", None).qualifies_for_edge());
        assert!(!participation("producer", None).qualifies_for_edge());
    }

    #[test]
    fn edge_attribute_rules() {
        let e = ParticipationEdge::from_record(participation("director", None));
        assert_eq!(e.job.as_deref(), Some("director"));
        assert_eq!(e.characters, None);

        let e = ParticipationEdge::from_record(participation("actor", None));
        assert_eq!(e.characters, Some(vec!["Undefined".to_string()]));

        let e = ParticipationEdge::from_record(participation("actor", Some(r#"["Lead"]"#)));
        assert_eq!(e.characters, Some(vec!["Lead".to_string()]));
    }

    #[test]
    fn edge_id_is_stable_over_the_composite_key() {
        let a = ParticipationEdge::from_record(participation("actor", Some("Lead")));
        let b = ParticipationEdge::from_record(participation("actor", Some("Lead")));
        assert_eq!(a.edge_id(), b.edge_id());
        let mut other = participation("actor", Some("Lead"));
        other.ordering = Some(2);
        assert_ne!(a.edge_id(), ParticipationEdge::from_record(other).edge_id());
    }

    #[test]
    fn absent_fields_are_omitted_from_payloads() {
        let rec = WorkRecord {
            work_id: "tt0000001".into(),
            title_type: Some("movie".into()),
            primary_title: Some("Carmencita".into()),
            original_title: None,
            is_adult: Some(false),
            start_year: Some(1894),
            end_year: None,
            runtime_minutes: None,
            genres: Some(vec!["Documentary".into(), "Short".into()]),
        };
        let v = serde_json::to_value(&rec).unwrap();
        let obj = v.as_object().unwrap();
        assert!(!obj.contains_key("end_year"));
        assert!(!obj.contains_key("runtime_minutes"));
        assert_eq!(obj["genres"], serde_json::json!(["Documentary", "Short"]));
    }
}
