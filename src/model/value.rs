// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Attribute values shared by shadows and stored rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::container::ShadowRef;

/// Primary identity of a persisted row.
///
/// Most rows get a store-assigned serial. Lookup tables (net types,
/// categories, usages, organizations) use natural names as ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RowId {
    Serial(i64),
    Name(String),
}

impl RowId {
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// The natural name, if this is a named id.
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Serial(_) => None,
        }
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial(n) => write!(f, "{}", n),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for RowId {
    fn from(n: i64) -> Self {
        Self::Serial(n)
    }
}

impl From<&str> for RowId {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// An attribute value.
///
/// `Ref` only lives inside a [`crate::ShadowContainer`]; it is replaced by
/// the target's `Id` when the shadow is committed. `Bytes` holds raw
/// collector octets that have not been proven to be valid text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
    #[serde(skip)]
    Ref(ShadowRef),
    Id(RowId),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_shadow(&self) -> Option<ShadowRef> {
        match self {
            Self::Ref(r) => Some(*r),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_id(&self) -> Option<&RowId> {
        match self {
            Self::Id(id) => Some(id),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Time(t)
    }
}

impl From<ShadowRef> for Value {
    fn from(r: ShadowRef) -> Self {
        Self::Ref(r)
    }
}

impl From<RowId> for Value {
    fn from(id: RowId) -> Self {
        Self::Id(id)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Bytes(b) => write!(f, "b\"{}\"", b.escape_ascii()),
            Self::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Ref(r) => write!(f, "{}", r),
            Self::Id(id) => write!(f, "#{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<&str>), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::Int(3));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from("x").as_text(), Some("x"));
        assert_eq!(Value::Int(1).as_text(), None);
        assert_eq!(Value::from(RowId::name("lan")).as_id(), Some(&RowId::name("lan")));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bytes(vec![0xff, b'a']).to_string(), "b\"\\xffa\"");
        assert_eq!(Value::Id(RowId::Serial(7)).to_string(), "#7");
    }
}
