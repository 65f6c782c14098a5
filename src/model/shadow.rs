// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shadow entities.
//!
//! A [`Shadow`] mirrors one persisted record but is not a live object:
//! reading or writing its attributes never touches the store. It holds the
//! attributes observed during a polling round, references to other shadows
//! in the same container, and, once resolved, the identity of the row it
//! corresponds to.

use std::collections::BTreeMap;

use crate::container::ShadowRef;
use super::kind::EntityKind;
use super::value::{RowId, Value};

/// Key a shadow is registered under in its container.
///
/// `Root` is the distinguished singleton slot, used for the netbox being
/// polled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShadowKey {
    Root,
    Int(i64),
    Text(String),
    Tuple(Vec<ShadowKey>),
}

impl std::fmt::Display for ShadowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => f.write_str("None"),
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Tuple(parts) => {
                f.write_str("(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", part)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<i64> for ShadowKey {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for ShadowKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ShadowKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl<A: Into<ShadowKey>, B: Into<ShadowKey>> From<(A, B)> for ShadowKey {
    fn from((a, b): (A, B)) -> Self {
        Self::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<ShadowKey>, B: Into<ShadowKey>, C: Into<ShadowKey>> From<(A, B, C)> for ShadowKey {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

/// Detached staging record for one persisted entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Shadow {
    kind: EntityKind,
    key: ShadowKey,
    id: Option<RowId>,
    fields: BTreeMap<String, Value>,
}

impl Shadow {
    #[must_use]
    pub fn new(kind: EntityKind, key: ShadowKey) -> Self {
        Self {
            kind,
            key,
            id: None,
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Container key this shadow was registered under.
    #[must_use]
    pub fn key(&self) -> &ShadowKey {
        &self.key
    }

    /// Persisted identity, once resolved or created.
    #[must_use]
    pub fn id(&self) -> Option<&RowId> {
        self.id.as_ref()
    }

    pub fn set_id(&mut self, id: RowId) -> &mut Self {
        self.id = Some(id);
        self
    }

    /// Set an attribute. Chainable.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Attribute value; `None` when the attribute was never observed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Text attribute. `None` for absent, NULL or non-text values.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_text)
    }

    #[must_use]
    pub fn int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_int)
    }

    /// Referenced shadow, if `field` holds a shadow reference.
    #[must_use]
    pub fn reference(&self, field: &str) -> Option<ShadowRef> {
        self.get(field).and_then(Value::as_shadow)
    }

    /// Whether the attribute is present and not NULL.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.is_null())
    }

    /// Observed-but-empty: sets the attribute to NULL so the commit clears it.
    pub fn clear(&mut self, field: &str) -> &mut Self {
        self.fields.insert(field.to_string(), Value::Null);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn fields_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.fields.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Shadows this one references, with the field holding each reference.
    pub fn references(&self) -> impl Iterator<Item = (&str, ShadowRef)> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.as_shadow().map(|r| (k.as_str(), r)))
    }
}

impl std::fmt::Display for Shadow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}[{}] (id: {})", self.kind, self.key, id),
            None => write!(f, "{}[{}]", self.kind, self.key),
        }
    }
}
