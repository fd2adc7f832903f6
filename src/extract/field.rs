use std::fmt;

use super::FieldValue;

/// What the extractor does with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// String value, becomes a tag verbatim.
    TagString,
    /// Integer list, becomes a comma-joined tag.
    TagIntList,
    /// Integer or floating point value, becomes a gauge.
    MetricNumeric,
    /// Boolean value, becomes a 1.0/0.0 gauge.
    MetricBool,
    /// Nested record, walked with the parent's prefix and tags.
    Nested,
    /// No rule applies; contributes nothing.
    Ignored,
}

impl FieldKind {
    /// Classifies a field by its runtime type. Total over every [`FieldValue`].
    pub const fn of(value: &FieldValue<'_>) -> Self {
        match value {
            FieldValue::Str(_) => Self::TagString,
            FieldValue::IntList(_) => Self::TagIntList,
            FieldValue::Int(_)
            | FieldValue::Int64(_)
            | FieldValue::UInt64(_)
            | FieldValue::Float(_) => Self::MetricNumeric,
            FieldValue::Bool(_) => Self::MetricBool,
            FieldValue::Nested(_) => Self::Nested,
            FieldValue::Other => Self::Ignored,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TagString => "tag_string",
            Self::TagIntList => "tag_int_list",
            Self::MetricNumeric => "metric_numeric",
            Self::MetricBool => "metric_bool",
            Self::Nested => "nested",
            Self::Ignored => "ignored",
        }
    }

    /// Whether fields of this kind contribute a tag.
    pub const fn is_tag(self) -> bool {
        matches!(self, Self::TagString | Self::TagIntList)
    }

    /// Whether fields of this kind emit a metric sample.
    pub const fn is_metric(self) -> bool {
        matches!(self, Self::MetricNumeric | Self::MetricBool)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Widens a metric-eligible field to `f64`. `None` for every other kind.
pub fn gauge_value(value: &FieldValue<'_>) -> Option<f64> {
    match *value {
        FieldValue::Int(v) => Some(f64::from(v)),
        FieldValue::Int64(v) => Some(v as f64),
        FieldValue::UInt64(v) => Some(v as f64),
        FieldValue::Float(v) => Some(v),
        FieldValue::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
        FieldValue::Str(_) | FieldValue::IntList(_) | FieldValue::Nested(_) | FieldValue::Other => {
            None
        }
    }
}
