// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Inventory Sync
//!
//! Reconciles the inventory observed while polling one network device with
//! the inventory already stored for it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Collector (caller)                     │
//! │  • Fills a ShadowContainer through factory()               │
//! │  • One container per device per polling round              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Reconciler                          │
//! │  • Prepare: fix garbage, serial conflicts, VLAN derivation │
//! │  • Commit: topological order, resolve + create/update      │
//! │  • Cleanup: module/interface presence, prefix/VLAN GC      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                  (one UnitOfWork per round)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       InventoryStore                        │
//! │  • Keyed and filtered reads, create/update/delete          │
//! │  • All-or-nothing unit of work                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                       (after commit)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          EventSink                          │
//! │  • Module up/down transitions                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use inventory_sync::{
//!     EntityKind, InMemoryStore, MemoryEventSink, ReconcileConfig, Reconciler,
//!     ShadowContainer, ShadowKey,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let store = InMemoryStore::new();
//!     let reconciler = Reconciler::new(
//!         Arc::new(store.clone()),
//!         Arc::new(MemoryEventSink::new()),
//!         ReconcileConfig::default(),
//!     );
//!
//!     let mut container = ShadowContainer::new();
//!     let netbox = container.factory(ShadowKey::Root, EntityKind::Netbox);
//!     container[netbox].set("sysname", "sw1.example.org");
//!
//!     let report = reconciler.run_round(container).await.unwrap();
//!     println!("{}", report);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`container`]: the round's shadow arena
//! - [`model`]: entity kinds, shadows, values, network addresses
//! - [`reconcile`]: the [`Reconciler`] round driver
//! - [`storage`]: the store interface and an in-memory store
//! - [`events`]: lifecycle events and sinks
//! - [`descr`]: router-port description conventions

pub mod config;
pub mod container;
pub mod descr;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod metrics;
pub mod model;
pub mod reconcile;
pub mod storage;
pub mod text;

pub use config::{DescriptionConvention, ReconcileConfig};
pub use container::{ShadowContainer, ShadowRef};
pub use diagnostics::{Correction, Diagnostics};
pub use error::ReconcileError;
pub use events::{ChannelEventSink, Event, EventKind, EventSink, EventSinkError, EventState, MemoryEventSink};
pub use model::{EntityKind, NetAddress, RowId, Shadow, ShadowKey, Value};
pub use reconcile::{CleanupStats, CommitOutcome, KindStats, Reconciler, RoundReport, TypeChangeReport};
pub use storage::{Fields, Filter, InMemoryStore, InventoryStore, Row, StorageError, UnitOfWork};
