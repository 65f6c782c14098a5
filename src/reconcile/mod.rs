// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Round driver.
//!
//! The [`Reconciler`] takes one device's [`ShadowContainer`] and turns it
//! into store writes:
//!
//! ```text
//! root → begin → prepare → snapshot modules → commit (topological) → cleanup → commit unit → events
//! ```
//!
//! Everything between `begin` and the unit's commit happens in one unit of
//! work. Any error rolls the whole round back, cleanup included, so a
//! failed round leaves the store as it was. Events are only dispatched once
//! the unit has committed.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use inventory_sync::{
//!     EntityKind, InMemoryStore, MemoryEventSink, ReconcileConfig, Reconciler,
//!     ShadowContainer, ShadowKey,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = InMemoryStore::new();
//! let reconciler = Reconciler::new(
//!     Arc::new(store.clone()),
//!     Arc::new(MemoryEventSink::new()),
//!     ReconcileConfig::default(),
//! );
//!
//! let mut container = ShadowContainer::new();
//! let netbox = container.factory(ShadowKey::Root, EntityKind::Netbox);
//! container[netbox].set("sysname", "gw1.example.org").set("ip", "10.0.0.1");
//! let iface = container.factory(1i64, EntityKind::Interface);
//! container[iface].set("netbox", netbox).set("ifname", "Gi0/1").set("ifindex", 1i64);
//!
//! let report = reconciler.run_round(container).await.expect("round failed");
//! assert_eq!(report.kind(EntityKind::Interface).created, 1);
//! assert_eq!(store.count(EntityKind::Interface).await, 1);
//! # }
//! ```

mod cleanup;
mod persist;
mod prepare;
mod resolve;
pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ReconcileConfig;
use crate::container::{ShadowContainer, ShadowRef};
use crate::diagnostics::Diagnostics;
use crate::error::{ReconcileError, Result};
use crate::events::{Event, EventSink};
use crate::metrics;
use crate::model::{EntityKind, RowId, Shadow, Value};
use crate::storage::{Fields, Filter, InventoryStore, Row, StorageError, UnitOfWork};

pub use types::{CleanupStats, CommitOutcome, KindStats, RoundReport, TypeChangeReport};

/// State of one round, owned by the round.
struct RoundContext<'a> {
    container: ShadowContainer,
    diag: Diagnostics,
    config: &'a ReconcileConfig,
    now: DateTime<Utc>,
    root: ShadowRef,
    /// Stored modules of the device before anything was written.
    modules_before: Vec<Row>,
    /// Buffered until the round has committed.
    events: Vec<Event>,
    stats: BTreeMap<EntityKind, KindStats>,
    cleanup: CleanupStats,
}

/// Reconciles polled inventory with the store.
///
/// Holds no per-round state; one reconciler can run rounds for many
/// devices concurrently.
pub struct Reconciler {
    store: Arc<dyn InventoryStore>,
    events: Arc<dyn EventSink>,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(store: Arc<dyn InventoryStore>, events: Arc<dyn EventSink>, config: ReconcileConfig) -> Self {
        Self { store, events, config }
    }

    #[must_use]
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Run one polling round, stamping absences with the current time.
    ///
    /// Events are dispatched after the round has committed. A sink error
    /// does not fail the round; events the sink refused are returned in
    /// [`RoundReport::undelivered`].
    pub async fn run_round(&self, container: ShadowContainer) -> Result<RoundReport> {
        self.run_round_at(container, Utc::now()).await
    }

    /// Run one polling round with an explicit clock.
    #[tracing::instrument(skip(self, container, now), fields(round_id, sysname))]
    pub async fn run_round_at(&self, container: ShadowContainer, now: DateTime<Utc>) -> Result<RoundReport> {
        let _timer = metrics::RoundTimer::new();
        let round_id = Uuid::new_v4();
        tracing::Span::current().record("round_id", tracing::field::display(round_id));

        let Some(root) = container.root() else {
            metrics::record_round(ReconcileError::MissingRoot.label());
            return Err(ReconcileError::MissingRoot);
        };
        let sysname = container[root].text("sysname").unwrap_or("unknown").to_string();
        tracing::Span::current().record("sysname", sysname.as_str());

        let mut ctx = RoundContext {
            container,
            diag: Diagnostics::new(sysname.clone()),
            config: &self.config,
            now,
            root,
            modules_before: Vec::new(),
            events: Vec::new(),
            stats: BTreeMap::new(),
            cleanup: CleanupStats::default(),
        };

        let netbox = match self.round(&mut ctx).await {
            Ok(netbox) => netbox,
            Err(e) => {
                metrics::record_round(e.label());
                return Err(e);
            }
        };
        metrics::record_round("committed");

        let mut undelivered = Vec::new();
        for event in &ctx.events {
            metrics::record_event(event.kind.as_str());
            if let Err(e) = self.events.emit(event.clone()).await {
                warn!(error = %e, event = %event, "Failed to dispatch event");
                undelivered.push(event.clone());
            }
        }

        let report = RoundReport {
            round_id,
            sysname: ctx.container[root].text("sysname").map_or(sysname, str::to_string),
            netbox,
            stats: ctx.stats,
            cleanup: ctx.cleanup,
            corrections: ctx.diag.into_corrections(),
            events: ctx.events,
            undelivered,
        };
        info!(%report, "Round committed");
        Ok(report)
    }

    /// One unit of work around the whole round.
    async fn round(&self, ctx: &mut RoundContext<'_>) -> Result<RowId> {
        let mut uow = self.store.begin().await?;
        let result = match Self::execute(ctx, uow.as_mut()).await {
            Ok(netbox) => uow.commit().await.map(|()| netbox).map_err(ReconcileError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!(error = %e, "Round failed, rolling back");
            if let Err(rollback) = uow.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
        }
        result
    }

    async fn execute(ctx: &mut RoundContext<'_>, uow: &mut dyn UnitOfWork) -> Result<RowId> {
        prepare::prepare(ctx, uow).await?;

        if let Some(netbox) = ctx.container[ctx.root].id().cloned() {
            ctx.modules_before = uow
                .find(EntityKind::Module, &Filter::equals("netbox", netbox))
                .await?;
        }

        for r in persist::commit_order(&ctx.container)? {
            let outcome = persist::commit_shadow(&mut ctx.container, uow, &mut ctx.diag, r).await?;
            let kind = ctx.container[r].kind();
            ctx.stats.entry(kind).or_default().record(outcome);
        }
        let netbox = persist::committed_id(&ctx.container, ctx.root)?;

        cleanup::cleanup(ctx, uow).await?;
        Ok(netbox)
    }

    /// Reset a netbox whose type changed: store the new type, clear
    /// `up_to_date` and delete all its modules and interfaces.
    ///
    /// Runs in its own unit of work. On failure nothing is changed and the
    /// error is returned.
    #[tracing::instrument(skip(self, new_type), fields(netbox = %netbox_id, sysobjectid))]
    pub async fn change_netbox_type(&self, netbox_id: &RowId, new_type: Shadow) -> Result<TypeChangeReport> {
        if new_type.kind() != EntityKind::NetboxType {
            return Err(ReconcileError::WrongKind {
                expected: EntityKind::NetboxType,
                actual: new_type.kind(),
            });
        }
        if let Some(oid) = new_type.text("sysobjectid") {
            tracing::Span::current().record("sysobjectid", oid);
        }

        let mut uow = self.store.begin().await?;
        let result = match Self::replace_inventory(netbox_id, new_type, uow.as_mut()).await {
            Ok(report) => uow.commit().await.map(|()| report).map_err(ReconcileError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(report) => {
                metrics::record_type_change("committed");
                info!(%report, "Netbox type changed");
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Netbox type change failed, rolling back");
                if let Err(rollback) = uow.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                metrics::record_type_change(e.label());
                Err(e)
            }
        }
    }

    async fn replace_inventory(
        netbox_id: &RowId,
        new_type: Shadow,
        uow: &mut dyn UnitOfWork,
    ) -> Result<TypeChangeReport> {
        let netbox = uow
            .get(EntityKind::Netbox, netbox_id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                kind: EntityKind::Netbox,
                id: netbox_id.clone(),
            })?;
        let sysname = netbox.text("sysname").unwrap_or("unknown");

        let mut container = ShadowContainer::new();
        let r = container.insert(new_type);
        let mut diag = Diagnostics::new(sysname);
        persist::commit_shadow(&mut container, uow, &mut diag, r).await?;
        let netbox_type = persist::committed_id(&container, r)?;

        warn!(sysname = %sysname, "Removing stored inventory info");
        let fields: Fields = [
            ("type".to_string(), Value::Id(netbox_type.clone())),
            ("up_to_date".to_string(), Value::Bool(false)),
        ]
        .into_iter()
        .collect();
        uow.update(EntityKind::Netbox, netbox_id, fields).await?;

        let mine = Filter::equals("netbox", netbox_id.clone());
        let modules_deleted = uow.delete_matching(EntityKind::Module, &mine).await?;
        let interfaces_deleted = uow.delete_matching(EntityKind::Interface, &mine).await?;
        metrics::record_deleted(EntityKind::Module.as_str(), modules_deleted);
        metrics::record_deleted(EntityKind::Interface.as_str(), interfaces_deleted);

        Ok(TypeChangeReport {
            netbox: netbox_id.clone(),
            netbox_type,
            modules_deleted,
            interfaces_deleted,
        })
    }
}
