// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use thiserror::Error;

use crate::model::EntityKind;
use crate::storage::StorageError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    #[error("{kind} {key} matches {candidates} stored rows")]
    AmbiguousIdentity {
        kind: EntityKind,
        key: String,
        candidates: usize,
    },
    #[error("container has no root netbox")]
    MissingRoot,
    #[error("{kind}.{field} references a shadow that was never committed")]
    UnresolvedReference { kind: EntityKind, field: String },
    #[error("reference cycle among {pending} uncommitted shadows")]
    ReferenceCycle { pending: usize },
    #[error("expected a {expected} shadow, got {actual}")]
    WrongKind {
        expected: EntityKind,
        actual: EntityKind,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReconcileError {
    /// Short label used as the metrics outcome.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::AmbiguousIdentity { .. } => "ambiguous",
            Self::MissingRoot => "missing_root",
            Self::UnresolvedReference { .. } => "unresolved",
            Self::ReferenceCycle { .. } => "cycle",
            Self::WrongKind { .. } => "wrong_kind",
            Self::Storage(_) => "storage",
        }
    }
}

pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
