//! Structural metric/tag extraction.
//!
//! Every entity schema declares its field table once with [`record_fields!`].
//! The collectors in [`tags`] and [`metrics`] walk that table for each
//! instance, so no per-entity extraction code is needed.

pub mod field;
pub mod metrics;
pub mod tags;

use std::collections::HashMap;

pub use field::FieldKind;
pub use metrics::{collect_metrics, MetricRecorder, MetricSample, NestedNaming};
pub use tags::{collect_tags, join_ints, TagSet, TagValue};

/// Runtime value of one record field, borrowed from the record.
#[derive(Clone, Copy)]
pub enum FieldValue<'a> {
    Str(&'a str),
    Int(i32),
    Int64(i64),
    UInt64(u64),
    Float(f64),
    Bool(bool),
    IntList(&'a [i64]),
    Nested(&'a dyn Record),
    /// Any type the extractor has no rule for (maps, lists of strings, ...).
    Other,
}

impl std::fmt::Debug for FieldValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::Int64(v) => f.debug_tuple("Int64").field(v).finish(),
            Self::UInt64(v) => f.debug_tuple("UInt64").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::IntList(v) => f.debug_tuple("IntList").field(v).finish(),
            Self::Nested(_) => f.write_str("Nested(..)"),
            Self::Other => f.write_str("Other"),
        }
    }
}

/// One named field of a record instance.
#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    pub name: &'static str,
    pub value: FieldValue<'a>,
}

impl<'a> Field<'a> {
    pub fn new(name: &'static str, value: FieldValue<'a>) -> Self {
        Self { name, value }
    }

    /// Classification of this field.
    pub fn kind(&self) -> FieldKind {
        FieldKind::of(&self.value)
    }
}

/// A typed entity whose fields can be enumerated in declaration order.
///
/// Implementations are normally generated by [`record_fields!`].
pub trait Record {
    /// Calls `visit` once per field, in declaration order.
    fn visit_fields<'a>(&'a self, visit: &mut dyn FnMut(Field<'a>));
}

impl<'a> From<&'a String> for FieldValue<'a> {
    fn from(v: &'a String) -> Self {
        Self::Str(v.as_str())
    }
}

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(v: &'a str) -> Self {
        Self::Str(v)
    }
}

impl From<&i32> for FieldValue<'_> {
    fn from(v: &i32) -> Self {
        Self::Int(*v)
    }
}

impl From<&i64> for FieldValue<'_> {
    fn from(v: &i64) -> Self {
        Self::Int64(*v)
    }
}

impl From<&u64> for FieldValue<'_> {
    fn from(v: &u64) -> Self {
        Self::UInt64(*v)
    }
}

impl From<&f64> for FieldValue<'_> {
    fn from(v: &f64) -> Self {
        Self::Float(*v)
    }
}

impl From<&bool> for FieldValue<'_> {
    fn from(v: &bool) -> Self {
        Self::Bool(*v)
    }
}

impl<'a> From<&'a Vec<i64>> for FieldValue<'a> {
    fn from(v: &'a Vec<i64>) -> Self {
        Self::IntList(v.as_slice())
    }
}

impl<'a> From<&'a Vec<String>> for FieldValue<'a> {
    fn from(_: &'a Vec<String>) -> Self {
        Self::Other
    }
}

impl<'a, K, V> From<&'a HashMap<K, V>> for FieldValue<'a> {
    fn from(_: &'a HashMap<K, V>) -> Self {
        Self::Other
    }
}

/// Declares the field table of a record type and implements [`Record`] for it.
///
/// Scalar and list fields are converted with `FieldValue::from`; fields marked
/// `as nested` must themselves implement [`Record`]. Fields marked `as ignored`
/// classify as [`FieldKind::Ignored`] whatever their type.
///
/// ```
/// use spark_harvester::record_fields;
///
/// struct Inner { used: i64 }
/// struct Outer { name: String, inner: Inner }
///
/// record_fields!(Inner { "Used" => used });
/// record_fields!(Outer { "Name" => name, "Inner" => inner as nested });
/// ```
#[macro_export]
macro_rules! record_fields {
    (@value nested $field:expr) => {
        $crate::extract::FieldValue::Nested(&$field)
    };
    (@value ignored $field:expr) => {{
        let _ = &$field;
        $crate::extract::FieldValue::Other
    }};
    (@value $field:expr) => {
        $crate::extract::FieldValue::from(&$field)
    };
    ($ty:ty { $($name:literal => $field:ident $(as $marker:ident)?),* $(,)? }) => {
        impl $crate::extract::Record for $ty {
            fn visit_fields<'a>(
                &'a self,
                visit: &mut dyn FnMut($crate::extract::Field<'a>),
            ) {
                $(
                    visit($crate::extract::Field::new(
                        $name,
                        $crate::record_fields!(@value $($marker)? self.$field),
                    ));
                )*
            }
        }
    };
}
