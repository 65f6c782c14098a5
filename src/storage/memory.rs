// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory inventory store.
//!
//! A complete [`InventoryStore`] backed by plain maps. Units of work are
//! serialized through an async mutex and rolled back by restoring the
//! snapshot taken when the unit was opened. The store enforces the parts of
//! the schema the engine relies on:
//!
//! - unique fields from [`EntityKind::unique_fields`] (NULL never collides)
//! - references must point at existing rows
//! - deletes follow the `Cascade` / `SetNull` rules of [`EntityKind::references`]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::model::{EntityKind, OnDelete, RowId, Value};
use super::traits::{Fields, Filter, InventoryStore, Row, StorageError, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<EntityKind, BTreeMap<RowId, Fields>>,
    next_serial: i64,
}

impl Tables {
    fn table(&self, kind: EntityKind) -> impl Iterator<Item = (&RowId, &Fields)> {
        self.rows.get(&kind).into_iter().flatten()
    }

    fn fetch(&self, kind: EntityKind, id: &RowId) -> Option<&Fields> {
        self.rows.get(&kind).and_then(|t| t.get(id))
    }

    fn matches(&self, kind: EntityKind, id: &RowId, fields: &Fields, filter: &Filter) -> bool {
        let field_value = |name: &str| fields.get(name).unwrap_or(&Value::Null);
        match filter {
            Filter::All => true,
            Filter::Eq(name, value) => !value.is_null() && field_value(name) == value,
            Filter::IsNull(name) => field_value(name).is_null(),
            Filter::In(name, values) => {
                let v = field_value(name);
                !v.is_null() && values.contains(v)
            }
            Filter::IdIn(ids) => ids.contains(id),
            Filter::Related { field, filter } => {
                let Some(target) = kind.reference_target(field) else {
                    return false;
                };
                let Some(target_id) = field_value(field).as_id() else {
                    return false;
                };
                self.fetch(target, target_id)
                    .is_some_and(|target_fields| self.matches(target, target_id, target_fields, filter))
            }
            Filter::ReferencedBy { kind: referrer, field, filter } => self
                .table(*referrer)
                .any(|(rid, rfields)| {
                    rfields.get(field).and_then(Value::as_id) == Some(id)
                        && self.matches(*referrer, rid, rfields, filter)
                }),
            Filter::And(parts) => parts.iter().all(|f| self.matches(kind, id, fields, f)),
            Filter::Or(parts) => parts.iter().any(|f| self.matches(kind, id, fields, f)),
            Filter::Not(inner) => !self.matches(kind, id, fields, inner),
        }
    }

    fn find(&self, kind: EntityKind, filter: &Filter) -> Vec<Row> {
        self.table(kind)
            .filter(|(id, fields)| self.matches(kind, id, fields, filter))
            .map(|(id, fields)| Row { id: id.clone(), fields: fields.clone() })
            .collect()
    }

    fn check_row(&self, kind: EntityKind, id: &RowId, fields: &Fields) -> Result<(), StorageError> {
        for field in kind.unique_fields() {
            let Some(value) = fields.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = self
                .table(kind)
                .any(|(other, other_fields)| other != id && other_fields.get(*field) == Some(value));
            if clash {
                return Err(StorageError::UniqueViolation {
                    kind,
                    field: (*field).to_string(),
                    value: value.to_string(),
                });
            }
        }
        for reference in kind.references() {
            if let Some(target_id) = fields.get(reference.field).and_then(Value::as_id) {
                if self.fetch(reference.target, target_id).is_none() {
                    return Err(StorageError::Backend(format!(
                        "{}.{} references missing {} #{}",
                        kind, reference.field, reference.target, target_id
                    )));
                }
            }
        }
        Ok(())
    }

    fn create(&mut self, kind: EntityKind, id: Option<RowId>, fields: Fields) -> Result<RowId, StorageError> {
        let id = match id {
            Some(id) => id,
            None => {
                self.next_serial += 1;
                RowId::Serial(self.next_serial)
            }
        };
        if self.fetch(kind, &id).is_some() {
            return Err(StorageError::UniqueViolation {
                kind,
                field: "id".to_string(),
                value: id.to_string(),
            });
        }
        self.check_row(kind, &id, &fields)?;
        if let RowId::Serial(n) = id {
            self.next_serial = self.next_serial.max(n);
        }
        self.rows.entry(kind).or_default().insert(id.clone(), fields);
        Ok(id)
    }

    fn update(&mut self, kind: EntityKind, id: &RowId, fields: Fields) -> Result<(), StorageError> {
        let mut merged = self
            .fetch(kind, id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { kind, id: id.clone() })?;
        merged.extend(fields);
        self.check_row(kind, id, &merged)?;
        self.rows.entry(kind).or_default().insert(id.clone(), merged);
        Ok(())
    }

    fn delete(&mut self, kind: EntityKind, ids: Vec<RowId>) -> u64 {
        let mut deleted = 0;
        let mut queue: VecDeque<(EntityKind, RowId)> = ids.into_iter().map(|id| (kind, id)).collect();
        while let Some((k, id)) = queue.pop_front() {
            let removed = self.rows.get_mut(&k).and_then(|t| t.remove(&id));
            if removed.is_none() {
                continue;
            }
            if k == kind {
                deleted += 1;
            }
            for dependant in EntityKind::ALL {
                for reference in dependant.references().iter().filter(|r| r.target == k) {
                    let Some(table) = self.rows.get_mut(&dependant) else {
                        continue;
                    };
                    for (dep_id, dep_fields) in table.iter_mut() {
                        if dep_fields.get(reference.field).and_then(Value::as_id) != Some(&id) {
                            continue;
                        }
                        match reference.on_delete {
                            OnDelete::Cascade => queue.push_back((dependant, dep_id.clone())),
                            OnDelete::SetNull => {
                                dep_fields.insert(reference.field.to_string(), Value::Null);
                            }
                        }
                    }
                }
            }
        }
        deleted
    }
}

/// In-memory [`InventoryStore`].
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one row in its own unit of work.
    pub async fn insert<'a>(
        &self,
        kind: EntityKind,
        fields: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<RowId, StorageError> {
        self.insert_row(kind, None, fields).await
    }

    /// Insert one row with a caller-chosen id.
    pub async fn insert_with_id<'a>(
        &self,
        kind: EntityKind,
        id: RowId,
        fields: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<RowId, StorageError> {
        self.insert_row(kind, Some(id), fields).await
    }

    async fn insert_row<'a>(
        &self,
        kind: EntityKind,
        id: Option<RowId>,
        fields: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<RowId, StorageError> {
        let fields: Fields = fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        self.tables.lock().await.create(kind, id, fields)
    }

    /// Snapshot of every row of one kind, ordered by id.
    pub async fn rows(&self, kind: EntityKind) -> Vec<Row> {
        self.tables.lock().await.find(kind, &Filter::All)
    }

    pub async fn row(&self, kind: EntityKind, id: &RowId) -> Option<Row> {
        self.tables
            .lock()
            .await
            .fetch(kind, id)
            .map(|fields| Row { id: id.clone(), fields: fields.clone() })
    }

    pub async fn count(&self, kind: EntityKind) -> usize {
        self.tables.lock().await.table(kind).count()
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError> {
        let guard = self.tables.clone().lock_owned().await;
        let backup = guard.clone();
        Ok(Box::new(MemoryUnit {
            guard: Some(guard),
            backup: Some(backup),
        }))
    }
}

/// Unit of work over an [`InMemoryStore`]; holds the store lock until it is
/// committed, rolled back or dropped.
struct MemoryUnit {
    guard: Option<OwnedMutexGuard<Tables>>,
    backup: Option<Tables>,
}

impl MemoryUnit {
    fn tables(&mut self) -> Result<&mut Tables, StorageError> {
        self.guard.as_deref_mut().ok_or(StorageError::UnitClosed)
    }

    fn restore(&mut self) {
        if let (Some(mut guard), Some(backup)) = (self.guard.take(), self.backup.take()) {
            *guard = backup;
        }
    }
}

impl Drop for MemoryUnit {
    fn drop(&mut self) {
        if self.guard.is_some() {
            debug!("Uncommitted unit of work dropped, rolling back");
            self.restore();
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn get(&mut self, kind: EntityKind, id: &RowId) -> Result<Option<Row>, StorageError> {
        Ok(self
            .tables()?
            .fetch(kind, id)
            .map(|fields| Row { id: id.clone(), fields: fields.clone() }))
    }

    async fn find(&mut self, kind: EntityKind, filter: &Filter) -> Result<Vec<Row>, StorageError> {
        Ok(self.tables()?.find(kind, filter))
    }

    async fn create(
        &mut self,
        kind: EntityKind,
        id: Option<RowId>,
        fields: Fields,
    ) -> Result<RowId, StorageError> {
        self.tables()?.create(kind, id, fields)
    }

    async fn update(&mut self, kind: EntityKind, id: &RowId, fields: Fields) -> Result<(), StorageError> {
        self.tables()?.update(kind, id, fields)
    }

    async fn delete_matching(&mut self, kind: EntityKind, filter: &Filter) -> Result<u64, StorageError> {
        let tables = self.tables()?;
        let ids = tables.find(kind, filter).into_iter().map(|row| row.id).collect();
        Ok(tables.delete(kind, ids))
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        if self.guard.take().is_none() {
            return Err(StorageError::UnitClosed);
        }
        self.backup = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StorageError> {
        if self.guard.is_none() {
            return Err(StorageError::UnitClosed);
        }
        self.restore();
        Ok(())
    }
}
