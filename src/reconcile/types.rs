// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Outcome types returned by the reconciler.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::diagnostics::Correction;
use crate::events::Event;
use crate::model::{EntityKind, RowId};

/// What committing one shadow did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Created,
    Updated,
    /// Matched a stored row that already held every observed value.
    Unchanged,
}

impl CommitOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Per-kind commit counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl KindStats {
    pub fn record(&mut self, outcome: CommitOutcome) {
        match outcome {
            CommitOutcome::Created => self.created += 1,
            CommitOutcome::Updated => self.updated += 1,
            CommitOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Rows created or updated.
    #[must_use]
    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

/// Rows touched by cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub modules_down: usize,
    pub modules_up: usize,
    pub interfaces_gone: u64,
    pub interfaces_deleted: u64,
    pub prefixes_deleted: u64,
    pub vlans_deleted: u64,
}

impl CleanupStats {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Result of one committed polling round.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round_id: Uuid,
    pub sysname: String,
    /// Identity of the polled netbox.
    pub netbox: RowId,
    pub stats: BTreeMap<EntityKind, KindStats>,
    pub cleanup: CleanupStats,
    pub corrections: Vec<Correction>,
    /// Events handed to the sink after commit.
    pub events: Vec<Event>,
    /// Events the sink refused. The round stays committed; the caller may
    /// redeliver these.
    pub undelivered: Vec<Event>,
}

impl RoundReport {
    /// Counters for one kind; zero when the kind was not in the round.
    #[must_use]
    pub fn kind(&self, kind: EntityKind) -> KindStats {
        self.stats.get(&kind).copied().unwrap_or_default()
    }

    /// Rows created or updated across all kinds.
    #[must_use]
    pub fn written(&self) -> usize {
        self.stats.values().map(KindStats::written).sum()
    }

    /// True when the round left the store exactly as it found it.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.written() == 0 && self.cleanup.is_empty()
    }
}

impl std::fmt::Display for RoundReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (created, updated, unchanged) = self.stats.values().fold((0, 0, 0), |acc, s| {
            (acc.0 + s.created, acc.1 + s.updated, acc.2 + s.unchanged)
        });
        write!(
            f,
            "round {} for {} (netbox {}): {} created, {} updated, {} unchanged, {} corrections, {} events",
            self.round_id,
            self.sysname,
            self.netbox,
            created,
            updated,
            unchanged,
            self.corrections.len(),
            self.events.len()
        )
    }
}

/// Result of a netbox type change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeChangeReport {
    pub netbox: RowId,
    pub netbox_type: RowId,
    pub modules_deleted: u64,
    pub interfaces_deleted: u64,
}

impl std::fmt::Display for TypeChangeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "netbox {} now of type {}: {} modules and {} interfaces removed",
            self.netbox, self.netbox_type, self.modules_deleted, self.interfaces_deleted
        )
    }
}
