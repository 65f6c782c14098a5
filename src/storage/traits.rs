// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Persisted-store collaborator interface.
//!
//! The engine never holds a live handle to inventory rows. Everything it
//! needs from the store goes through a [`UnitOfWork`] opened for one round:
//! keyed lookups, filtered reads and counts, create/update/delete. A unit
//! is all-or-nothing; dropping it without [`UnitOfWork::commit`] discards
//! every write made through it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{EntityKind, RowId, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("{kind} #{id} not found")]
    NotFound { kind: EntityKind, id: RowId },
    #[error("duplicate {kind}.{field} value {value}")]
    UniqueViolation {
        kind: EntityKind,
        field: String,
        value: String,
    },
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("{count} {kind} rows match a key expected to be unique")]
    MultipleRows { kind: EntityKind, count: usize },
    #[error("unit of work already closed")]
    UnitClosed,
}

/// Field values of a persisted row, keyed by field name.
pub type Fields = BTreeMap<String, Value>;

/// A persisted row as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub fields: Fields,
}

impl Row {
    /// Field value; NULL when the row has no such field.
    #[must_use]
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&Value::Null)
    }

    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).as_text()
    }

    #[must_use]
    pub fn int(&self, field: &str) -> Option<i64> {
        self.get(field).as_int()
    }

    /// Identity held by a reference field.
    #[must_use]
    pub fn reference(&self, field: &str) -> Option<&RowId> {
        self.get(field).as_id()
    }
}

/// Row predicate understood by every store.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    /// Field equals value. A NULL value never matches; use `IsNull`.
    Eq(String, Value),
    IsNull(String),
    In(String, Vec<Value>),
    /// Primary identity is one of the given ids.
    IdIn(Vec<RowId>),
    /// Follow the reference `field` and apply `filter` to the target row.
    /// Rows with a NULL reference never match.
    Related { field: String, filter: Box<Filter> },
    /// Some row of `kind` references this row through `field` and matches
    /// `filter`.
    ReferencedBy {
        kind: EntityKind,
        field: String,
        filter: Box<Filter>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull(field.into())
    }

    pub fn is_in(field: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Self::In(field.into(), values.into_iter().collect())
    }

    pub fn id_in(ids: impl IntoIterator<Item = RowId>) -> Self {
        Self::IdIn(ids.into_iter().collect())
    }

    pub fn related(field: impl Into<String>, filter: Filter) -> Self {
        Self::Related {
            field: field.into(),
            filter: Box::new(filter),
        }
    }

    pub fn referenced_by(kind: EntityKind, field: impl Into<String>) -> Self {
        Self::ReferencedBy {
            kind,
            field: field.into(),
            filter: Box::new(Self::All),
        }
    }

    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::All => other,
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            this => Self::And(vec![this, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut parts) => {
                parts.push(other);
                Self::Or(parts)
            }
            this => Self::Or(vec![this, other]),
        }
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Conjunction of equality tests.
    pub fn key<'a>(pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        pairs
            .into_iter()
            .fold(Self::All, |acc, (field, value)| acc.and(Self::equals(field, value)))
    }
}

/// Source of units of work.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Open a unit of work. Units are independent; what one sees of
    /// another's writes is up to the store's own concurrency control.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError>;
}

/// One all-or-nothing batch of reads and writes.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn get(&mut self, kind: EntityKind, id: &RowId) -> Result<Option<Row>, StorageError>;

    /// Rows of `kind` matching `filter`, ordered by id.
    async fn find(&mut self, kind: EntityKind, filter: &Filter) -> Result<Vec<Row>, StorageError>;

    /// Create a row. A given id is used as is; otherwise the store assigns one.
    async fn create(
        &mut self,
        kind: EntityKind,
        id: Option<RowId>,
        fields: Fields,
    ) -> Result<RowId, StorageError>;

    /// Overwrite the given fields of one row; other fields are untouched.
    async fn update(&mut self, kind: EntityKind, id: &RowId, fields: Fields) -> Result<(), StorageError>;

    /// Delete matching rows, applying the reference schema's on-delete
    /// rules to dependants. Returns the number of `kind` rows deleted.
    async fn delete_matching(&mut self, kind: EntityKind, filter: &Filter) -> Result<u64, StorageError>;

    async fn commit(&mut self) -> Result<(), StorageError>;

    async fn rollback(&mut self) -> Result<(), StorageError>;

    /// The single row whose fields equal `key`.
    async fn find_by_key(
        &mut self,
        kind: EntityKind,
        key: &[(&str, Value)],
    ) -> Result<Option<Row>, StorageError> {
        let filter = Filter::key(key.iter().map(|(f, v)| (*f, v.clone())));
        let mut rows = self.find(kind, &filter).await?;
        match rows.len() {
            0 | 1 => Ok(rows.pop()),
            count => Err(StorageError::MultipleRows { kind, count }),
        }
    }

    async fn count_matching(&mut self, kind: EntityKind, filter: &Filter) -> Result<u64, StorageError> {
        Ok(self.find(kind, filter).await?.len() as u64)
    }

    /// Apply the same field values to every matching row.
    async fn update_matching(
        &mut self,
        kind: EntityKind,
        filter: &Filter,
        fields: Fields,
    ) -> Result<u64, StorageError> {
        let rows = self.find(kind, filter).await?;
        for row in &rows {
            self.update(kind, &row.id, fields.clone()).await?;
        }
        Ok(rows.len() as u64)
    }
}
