use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::Serialize;
use tracing::trace;

use super::{FieldValue, Record};

/// Scalar value of a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(v) => f.write_str(v),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for TagValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Attribute dimensions attached to every sample of one record instance.
///
/// Keys are unique; inserting an existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, TagValue>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TagValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.0.get(key)
    }

    /// String value of `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(TagValue::Str(v)) => Some(v),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, TagValue> {
        self.0.iter()
    }

    /// Copies every tag of `other` into `self`; `other` wins on collisions.
    pub fn merge(&mut self, other: &TagSet) {
        for (k, v) in other.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = (&'a String, &'a TagValue);
    type IntoIter = btree_map::Iter<'a, String, TagValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<TagValue>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Self::new();
        for (k, v) in iter {
            tags.insert(k, v);
        }
        tags
    }
}

/// Builds the lower-cased `prefix + field` name used for both tag keys and
/// metric names.
pub fn qualified_name(prefix: &str, field: &str) -> String {
    let mut name = String::with_capacity(prefix.len() + field.len());
    name.push_str(prefix);
    name.push_str(field);
    name.make_ascii_lowercase();
    name
}

/// Renders integers as a `sep`-joined decimal string. Empty input gives `""`.
pub fn join_ints(values: &[i64], sep: &str) -> String {
    values
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

/// Builds the tag set of one record instance.
///
/// Starts from a copy of `base` and adds every string field verbatim and every
/// integer-list field comma-joined, keyed by `prefix + field`. Nested records
/// are not descended into; tags live at the instance level only.
pub fn collect_tags<R: Record + ?Sized>(record: &R, base: &TagSet, prefix: &str) -> TagSet {
    let mut tags = base.clone();

    record.visit_fields(&mut |field| {
        let value = match field.value {
            FieldValue::Str(s) => s.to_string(),
            FieldValue::IntList(ids) => join_ints(ids, ","),
            _ => return,
        };

        let key = qualified_name(prefix, field.name);
        trace!(key = %key, value = %value, "adding tag");
        tags.insert(key, value);
    });

    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_fields;

    struct Limits {
        label: String,
        max: i64,
    }

    struct Job {
        name: String,
        status: String,
        stage_ids: Vec<i64>,
        num_tasks: i32,
        done: bool,
        limits: Limits,
    }

    record_fields!(Limits { "Label" => label, "Max" => max });
    record_fields!(Job {
        "Name" => name,
        "Status" => status,
        "StageIds" => stage_ids,
        "NumTasks" => num_tasks,
        "Done" => done,
        "Limits" => limits as nested,
    });

    fn job() -> Job {
        Job {
            name: "job-5".to_string(),
            status: "RUNNING".to_string(),
            stage_ids: vec![1, 2, 3],
            num_tasks: 10,
            done: false,
            limits: Limits {
                label: "inner".to_string(),
                max: 4,
            },
        }
    }

    #[test]
    fn test_join_ints() {
        assert_eq!(join_ints(&[], ","), "");
        assert_eq!(join_ints(&[7], ","), "7");
        assert_eq!(join_ints(&[1, 2, 3], ","), "1,2,3");
        assert_eq!(join_ints(&[-1, 20], ";"), "-1;20");
    }

    #[test]
    fn test_qualified_name_lowercases() {
        assert_eq!(qualified_name("spark.job.", "NumTasks"), "spark.job.numtasks");
        assert_eq!(qualified_name("", "ID"), "id");
    }

    #[test]
    fn test_collect_tags_strings_and_int_lists() {
        let tags = collect_tags(&job(), &TagSet::new(), "spark.job.");

        assert_eq!(tags.get_str("spark.job.name"), Some("job-5"));
        assert_eq!(tags.get_str("spark.job.status"), Some("RUNNING"));
        assert_eq!(tags.get_str("spark.job.stageids"), Some("1,2,3"));
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn test_collect_tags_skips_metrics_and_nested() {
        let tags = collect_tags(&job(), &TagSet::new(), "spark.job.");

        assert!(!tags.contains_key("spark.job.numtasks"));
        assert!(!tags.contains_key("spark.job.done"));
        assert!(!tags.contains_key("spark.job.limits"));
        assert!(!tags.contains_key("spark.job.label"));
    }

    #[test]
    fn test_collect_tags_empty_int_list() {
        let mut j = job();
        j.stage_ids.clear();
        let tags = collect_tags(&j, &TagSet::new(), "spark.job.");
        assert_eq!(tags.get_str("spark.job.stageids"), Some(""));
    }

    #[test]
    fn test_collect_tags_keeps_base_tags() {
        let base: TagSet = [
            ("spark.app.name", TagValue::from("etl")),
            ("spark.app.cores", TagValue::Int(8)),
        ]
        .into_iter()
        .collect();

        let tags = collect_tags(&job(), &base, "spark.job.");
        assert_eq!(tags.get_str("spark.app.name"), Some("etl"));
        assert_eq!(tags.get("spark.app.cores"), Some(&TagValue::Int(8)));
        assert_eq!(tags.len(), 5);
    }

    #[test]
    fn test_collect_tags_derived_tag_wins_on_collision() {
        let base: TagSet = [("spark.job.name", "from-base")].into_iter().collect();
        let tags = collect_tags(&job(), &base, "spark.job.");
        assert_eq!(tags.get_str("spark.job.name"), Some("job-5"));
    }

    #[test]
    fn test_collect_tags_idempotent() {
        let base: TagSet = [("spark.clusterName", "prod")].into_iter().collect();
        let once = collect_tags(&job(), &base, "spark.job.");
        let twice = collect_tags(&job(), &once, "spark.job.");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_collect_tags_does_not_mutate_base() {
        let base: TagSet = [("spark.app.id", "app-1")].into_iter().collect();
        let _ = collect_tags(&job(), &base, "spark.job.");
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut a: TagSet = [("k", "a"), ("only_a", "1")].into_iter().collect();
        let b: TagSet = [("k", "b")].into_iter().collect();
        a.merge(&b);
        assert_eq!(a.get_str("k"), Some("b"));
        assert_eq!(a.get_str("only_a"), Some("1"));
    }

    #[test]
    fn test_tag_set_serializes_as_flat_map() {
        let tags: TagSet = [
            ("b", TagValue::from(true)),
            ("a", TagValue::from("x")),
            ("c", TagValue::from(2_i64)),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&tags).expect("serialize");
        assert_eq!(json, r#"{"a":"x","b":true,"c":2}"#);
    }
}
