// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Chaos Testing for Inventory Sync
//!
//! This module tests failure scenarios using:
//! 1. **FailingStore wrappers** - precise error injection at specific call counts
//! 2. **Kind-targeted failures** - one write operation failing for one entity kind
//! 3. **Failing event sinks** - delivery errors after the round committed
//!
//! Whatever fails inside a unit of work, the store must look exactly as it
//! did before the round started.
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos -- --nocapture
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use inventory_sync::{
    EntityKind, Event, EventSink, EventSinkError, Fields, Filter, InMemoryStore, InventoryStore,
    ReconcileConfig, ReconcileError, Reconciler, Row, RowId, Shadow, ShadowContainer, ShadowKey,
    StorageError, UnitOfWork,
};

// =============================================================================
// Failing Store Wrappers - Precise Error Injection
// =============================================================================

/// Unit-of-work operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Update,
    Delete,
    Commit,
}

/// Shared failure plan, consulted on every unit-of-work call.
struct Plan {
    call_count: AtomicU64,
    /// Fail every call after this many (0 = first call fails).
    fail_after: Option<u64>,
    /// Fail this operation on this kind.
    fail_on: Option<(Op, Option<EntityKind>)>,
    error_msg: String,
    tripped: AtomicBool,
}

impl Plan {
    fn should_fail(&self, op: Option<Op>, kind: Option<EntityKind>) -> bool {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        let fail = match (self.fail_after, self.fail_on) {
            (Some(n), _) => count > n,
            (None, Some((target_op, target_kind))) => {
                op == Some(target_op) && (target_kind.is_none() || target_kind == kind)
            }
            (None, None) => false,
        };
        if fail {
            self.tripped.store(true, Ordering::SeqCst);
        }
        fail
    }

    fn maybe_fail(&self, op: Option<Op>, kind: Option<EntityKind>) -> Result<(), StorageError> {
        if self.should_fail(op, kind) {
            Err(StorageError::Backend(self.error_msg.clone()))
        } else {
            Ok(())
        }
    }
}

/// Wraps an [`InMemoryStore`] and injects backend errors into its units.
pub struct FailingStore {
    inner: InMemoryStore,
    plan: Arc<Plan>,
}

impl FailingStore {
    fn with_plan(inner: InMemoryStore, fail_after: Option<u64>, fail_on: Option<(Op, Option<EntityKind>)>) -> Self {
        Self {
            inner,
            plan: Arc::new(Plan {
                call_count: AtomicU64::new(0),
                fail_after,
                fail_on,
                error_msg: "injected failure".to_string(),
                tripped: AtomicBool::new(false),
            }),
        }
    }

    /// A store whose units fail permanently after N calls.
    pub fn fail_after(inner: InMemoryStore, n: u64) -> Self {
        Self::with_plan(inner, Some(n), None)
    }

    /// A store whose units fail one operation on one kind.
    pub fn fail_on(inner: InMemoryStore, op: Op, kind: EntityKind) -> Self {
        Self::with_plan(inner, None, Some((op, Some(kind))))
    }

    /// A store whose units fail to commit.
    pub fn fail_commit(inner: InMemoryStore) -> Self {
        Self::with_plan(inner, None, Some((Op::Commit, None)))
    }

    pub fn tripped(&self) -> bool {
        self.plan.tripped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventoryStore for FailingStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(FailingUnit {
            inner,
            plan: self.plan.clone(),
        }))
    }
}

struct FailingUnit {
    inner: Box<dyn UnitOfWork>,
    plan: Arc<Plan>,
}

#[async_trait]
impl UnitOfWork for FailingUnit {
    async fn get(&mut self, kind: EntityKind, id: &RowId) -> Result<Option<Row>, StorageError> {
        self.plan.maybe_fail(None, Some(kind))?;
        self.inner.get(kind, id).await
    }

    async fn find(&mut self, kind: EntityKind, filter: &Filter) -> Result<Vec<Row>, StorageError> {
        self.plan.maybe_fail(None, Some(kind))?;
        self.inner.find(kind, filter).await
    }

    async fn create(&mut self, kind: EntityKind, id: Option<RowId>, fields: Fields) -> Result<RowId, StorageError> {
        self.plan.maybe_fail(Some(Op::Create), Some(kind))?;
        self.inner.create(kind, id, fields).await
    }

    async fn update(&mut self, kind: EntityKind, id: &RowId, fields: Fields) -> Result<(), StorageError> {
        self.plan.maybe_fail(Some(Op::Update), Some(kind))?;
        self.inner.update(kind, id, fields).await
    }

    async fn delete_matching(&mut self, kind: EntityKind, filter: &Filter) -> Result<u64, StorageError> {
        self.plan.maybe_fail(Some(Op::Delete), Some(kind))?;
        self.inner.delete_matching(kind, filter).await
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        self.plan.maybe_fail(Some(Op::Commit), None)?;
        self.inner.commit().await
    }

    // Rollback always reaches the inner unit so the store is restored.
    async fn rollback(&mut self) -> Result<(), StorageError> {
        self.inner.rollback().await
    }
}

/// Event sink whose backend is down.
struct BrokenSink {
    attempts: AtomicU64,
}

#[async_trait]
impl EventSink for BrokenSink {
    async fn emit(&self, _event: Event) -> Result<(), EventSinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(EventSinkError::Backend("queue unreachable".to_string()))
    }
}

// =============================================================================
// Helpers
// =============================================================================

type Snapshot = BTreeMap<EntityKind, Vec<Row>>;

async fn snapshot(store: &InMemoryStore) -> Snapshot {
    let mut tables = BTreeMap::new();
    for kind in EntityKind::ALL {
        tables.insert(kind, store.rows(kind).await);
    }
    tables
}

fn reconciler_over(store: impl InventoryStore + 'static) -> Reconciler {
    Reconciler::new(
        Arc::new(store),
        Arc::new(inventory_sync::MemoryEventSink::new()),
        ReconcileConfig::default(),
    )
}

/// A router with a module, two ports and one routed prefix.
fn poll(modules: &[&str], ports: &[(i64, &str)]) -> ShadowContainer {
    let mut c = ShadowContainer::new();
    let cat = c.factory("GW", EntityKind::Category);
    c[cat].set_id(RowId::name("GW"));
    let root = c.factory(ShadowKey::Root, EntityKind::Netbox);
    c[root].set("sysname", "gw1.example.org").set("category", cat);

    for name in modules {
        let module = c.factory(*name, EntityKind::Module);
        c[module].set("netbox", root).set("name", *name).set("up", "y");
    }
    for (ifindex, ifname) in ports {
        let iface = c.factory(*ifindex, EntityKind::Interface);
        c[iface].set("netbox", root).set("ifname", *ifname).set("ifindex", *ifindex);
    }

    let Some(iface) = c.get(ports[0].0, EntityKind::Interface) else {
        return c;
    };
    iface_with_prefix(&mut c, iface);
    c
}

fn iface_with_prefix(c: &mut ShadowContainer, iface: inventory_sync::ShadowRef) {
    c[iface].set("ifalias", "lan,it,staff");
    let vlan = c.factory("10.0.1.0/24", EntityKind::Vlan);
    c[vlan].set("vlan", 101i64);
    let prefix = c.factory("10.0.1.0/24", EntityKind::Prefix);
    c[prefix].set("net_address", "10.0.1.0/24").set("vlan", vlan);
    let binding = c.factory("10.0.1.1", EntityKind::GwPortPrefix);
    c[binding]
        .set("gw_ip", "10.0.1.1")
        .set("interface", iface)
        .set("prefix", prefix);
}

/// Store holding one committed round for gw1, plus an orphan prefix for
/// the collector to find.
async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    let reconciler = reconciler_over(store.clone());
    reconciler
        .run_round(poll(&["Slot 1", "Slot 2"], &[(1, "Gi0/1"), (2, "Gi0/2"), (3, "Gi0/3")]))
        .await
        .unwrap();
    store
        .insert(EntityKind::Prefix, [("net_address", inventory_sync::Value::from("192.0.2.0/24"))])
        .await
        .unwrap();
    store
}

/// A round that creates, updates, stamps and deletes against the seed.
fn changed_poll() -> ShadowContainer {
    let mut c = poll(&["Slot 1", "Slot 3"], &[(1, "Gi0/1"), (3, "Gi0/3"), (4, "Gi0/4")]);
    let root = c.root().unwrap();
    c[root].set("ip", "10.0.0.1");
    c
}

// =============================================================================
// Rollback Tests
// =============================================================================

#[tokio::test]
async fn chaos_create_failure_rolls_back_round() {
    let store = seeded_store().await;
    let before = snapshot(&store).await;
    let failing = FailingStore::fail_on(store.clone(), Op::Create, EntityKind::Interface);
    let reconciler = reconciler_over(failing);

    let err = reconciler.run_round(changed_poll()).await.unwrap_err();

    assert_eq!(
        err,
        ReconcileError::Storage(StorageError::Backend("injected failure".to_string()))
    );
    assert_eq!(snapshot(&store).await, before);
}

#[tokio::test]
async fn chaos_cleanup_failure_rolls_back_committed_shadows() {
    let store = seeded_store().await;
    let before = snapshot(&store).await;
    // Every shadow is written before the prefix collector fails.
    let failing = FailingStore::fail_on(store.clone(), Op::Delete, EntityKind::Prefix);
    let reconciler = reconciler_over(failing);

    let err = reconciler.run_round(changed_poll()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Storage(StorageError::Backend(_))));
    assert_eq!(snapshot(&store).await, before);
    assert!(store
        .rows(EntityKind::Module)
        .await
        .iter()
        .all(|m| m.text("name") != Some("Slot 3")));
}

#[tokio::test]
async fn chaos_commit_failure_rolls_back_round() {
    let store = seeded_store().await;
    let before = snapshot(&store).await;
    let reconciler = reconciler_over(FailingStore::fail_commit(store.clone()));

    let result = reconciler.run_round(changed_poll()).await;

    assert!(result.is_err());
    assert_eq!(snapshot(&store).await, before);
}

#[tokio::test]
async fn chaos_fail_after_every_call_count() {
    // Sweep the failure point through the whole round. Each run either
    // commits completely or leaves the store untouched.
    let mut committed_at = None;
    for n in 0..200 {
        let store = seeded_store().await;
        let before = snapshot(&store).await;
        let failing = FailingStore::fail_after(store.clone(), n);
        let reconciler = reconciler_over(failing);

        match reconciler.run_round(changed_poll()).await {
            Ok(report) => {
                assert!(!report.is_noop());
                assert_ne!(snapshot(&store).await, before);
                committed_at = Some(n);
                break;
            }
            Err(e) => {
                assert!(
                    matches!(e, ReconcileError::Storage(StorageError::Backend(_))),
                    "call {}: unexpected error {}",
                    n,
                    e
                );
                assert_eq!(snapshot(&store).await, before, "call {} left partial writes", n);
            }
        }
    }
    assert!(committed_at.is_some(), "round never completed within 200 calls");
}

#[tokio::test]
async fn chaos_type_change_interface_delete_failure() {
    let store = seeded_store().await;
    let netbox = store.rows(EntityKind::Netbox).await.remove(0).id;
    let before = snapshot(&store).await;
    let failing = FailingStore::fail_on(store.clone(), Op::Delete, EntityKind::Interface);
    assert!(!failing.tripped());
    let reconciler = reconciler_over(failing);

    let mut new_type = Shadow::new(EntityKind::NetboxType, ShadowKey::from("1.3.6.1.4.1.9.1.1208"));
    new_type.set("sysobjectid", "1.3.6.1.4.1.9.1.1208");
    let err = reconciler.change_netbox_type(&netbox, new_type).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Storage(StorageError::Backend(_))));
    // Type, flag and modules all survive.
    assert_eq!(snapshot(&store).await, before);
    assert_eq!(store.count(EntityKind::NetboxType).await, 0);
    assert_eq!(store.count(EntityKind::Module).await, 2);
}

#[tokio::test]
async fn chaos_begin_failure_surfaces_as_storage_error() {
    struct DownStore;

    #[async_trait]
    impl InventoryStore for DownStore {
        async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError> {
            Err(StorageError::Backend("connection refused".to_string()))
        }
    }

    let reconciler = reconciler_over(DownStore);
    let err = reconciler
        .run_round(poll(&[], &[(1, "Gi0/1")]))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ReconcileError::Storage(StorageError::Backend("connection refused".to_string()))
    );
}

// =============================================================================
// Event Delivery
// =============================================================================

#[tokio::test]
async fn chaos_broken_event_sink_does_not_fail_round() {
    let store = seeded_store().await;
    let sink = Arc::new(BrokenSink { attempts: AtomicU64::new(0) });
    let reconciler = Reconciler::new(Arc::new(store.clone()), sink.clone(), ReconcileConfig::default());

    // Slot 2 disappears and Slot 3 is new: one module-down event.
    let report = reconciler.run_round(changed_poll()).await.unwrap();

    assert_eq!(report.cleanup.modules_down, 1);
    assert_eq!(report.events.len(), 1);
    assert_eq!(report.undelivered, report.events);
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
    let slot2 = store
        .rows(EntityKind::Module)
        .await
        .into_iter()
        .find(|m| m.text("name") == Some("Slot 2"))
        .unwrap();
    assert_eq!(slot2.text("up"), Some("n"));
}
