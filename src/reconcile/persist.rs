// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Commit of shadows to the store.
//!
//! Shadows are committed in topological order over their references, so a
//! referenced shadow always has an identity by the time a shadow pointing
//! at it is written. Each shadow is resolved right before its own commit;
//! references are swapped for identities as the field set is built, which
//! is the back-fill of newly assigned identities.

use std::collections::BTreeSet;

use tracing::debug;

use super::resolve;
use super::types::CommitOutcome;
use crate::container::{ShadowContainer, ShadowRef};
use crate::diagnostics::Diagnostics;
use crate::error::{ReconcileError, Result};
use crate::metrics;
use crate::model::{RowId, Value};
use crate::storage::{Fields, UnitOfWork};

/// Every shadow in commit order: referenced before referencing, ties
/// broken by kind rank and then registration order.
pub(crate) fn commit_order(container: &ShadowContainer) -> Result<Vec<ShadowRef>> {
    let n = container.len();
    let mut blocking = vec![0usize; n];
    let mut dependants: Vec<Vec<ShadowRef>> = vec![Vec::new(); n];
    for r in container.refs() {
        for (_, target) in container[r].references() {
            blocking[r.index()] += 1;
            dependants[target.index()].push(r);
        }
    }

    let mut ready: BTreeSet<(usize, ShadowRef)> = container
        .refs()
        .filter(|r| blocking[r.index()] == 0)
        .map(|r| (container[r].kind().rank(), r))
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some((_, r)) = ready.pop_first() {
        order.push(r);
        for dependant in &dependants[r.index()] {
            blocking[dependant.index()] -= 1;
            if blocking[dependant.index()] == 0 {
                ready.insert((container[*dependant].kind().rank(), *dependant));
            }
        }
    }

    if order.len() < n {
        return Err(ReconcileError::ReferenceCycle { pending: n - order.len() });
    }
    Ok(order)
}

/// Identity of a shadow that has been committed.
pub(crate) fn committed_id(container: &ShadowContainer, r: ShadowRef) -> Result<RowId> {
    container[r]
        .id()
        .cloned()
        .ok_or_else(|| ReconcileError::UnresolvedReference {
            kind: container[r].kind(),
            field: "id".to_string(),
        })
}

/// Field values as the store should hold them.
fn stored_fields(container: &ShadowContainer, r: ShadowRef) -> Result<Fields> {
    let shadow = &container[r];
    let kind = shadow.kind();
    let mut fields = Fields::new();
    for (name, value) in shadow.fields() {
        let value = match value {
            Value::Ref(target) => match container[*target].id() {
                Some(id) => Value::Id(id.clone()),
                None => {
                    return Err(ReconcileError::UnresolvedReference {
                        kind,
                        field: name.to_string(),
                    })
                }
            },
            other => other.clone(),
        };
        fields.insert(name.to_string(), value);
    }
    Ok(fields)
}

/// Resolve and write one shadow. Only fields whose value differs from the
/// stored row are written.
pub(crate) async fn commit_shadow(
    container: &mut ShadowContainer,
    uow: &mut dyn UnitOfWork,
    diag: &mut Diagnostics,
    r: ShadowRef,
) -> Result<CommitOutcome> {
    let stored = resolve::resolve(container, uow, diag, r).await?;
    let fields = stored_fields(container, r)?;
    let kind = container[r].kind();

    let outcome = match (container[r].id().cloned(), stored) {
        (Some(id), Some(row)) => {
            let changed: Fields = fields
                .into_iter()
                .filter(|(name, value)| row.get(name) != value)
                .collect();
            if changed.is_empty() {
                CommitOutcome::Unchanged
            } else {
                debug!(shadow = %container[r], fields = ?changed.keys().collect::<Vec<_>>(), "Updating");
                uow.update(kind, &id, changed).await?;
                CommitOutcome::Updated
            }
        }
        (id, _) => {
            let id = uow.create(kind, id, fields).await?;
            debug!(kind = %kind, id = %id, "Created");
            container[r].set_id(id);
            CommitOutcome::Created
        }
    };

    metrics::record_entity(kind.as_str(), outcome.as_str());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, ShadowKey};
    use crate::storage::{InMemoryStore, InventoryStore};

    #[test]
    fn test_commit_order_puts_targets_first() {
        let mut container = ShadowContainer::new();
        // Registered in reverse dependency order on purpose.
        let gwport = container.factory("10.0.0.1", EntityKind::GwPortPrefix);
        let prefix = container.factory("10.0.0.0/30", EntityKind::Prefix);
        let vlan = container.factory(10i64, EntityKind::Vlan);
        let nettype = container.factory("link", EntityKind::NetType);
        container[gwport].set("prefix", prefix);
        container[prefix].set("vlan", vlan);
        container[vlan].set("net_type", nettype);

        let order = commit_order(&container).unwrap();
        assert_eq!(order, vec![nettype, vlan, prefix, gwport]);
    }

    #[test]
    fn test_commit_order_ties_by_rank_then_registration() {
        let mut container = ShadowContainer::new();
        let if2 = container.factory(2i64, EntityKind::Interface);
        let if1 = container.factory(1i64, EntityKind::Interface);
        let root = container.factory(ShadowKey::Root, EntityKind::Netbox);

        let order = commit_order(&container).unwrap();
        assert_eq!(order, vec![root, if2, if1]);
    }

    #[test]
    fn test_commit_order_detects_cycle() {
        let mut container = ShadowContainer::new();
        let a = container.factory(1i64, EntityKind::Module);
        let b = container.factory(2i64, EntityKind::Module);
        container.factory(3i64, EntityKind::Module);
        container[a].set("parent", b);
        container[b].set("parent", a);

        let err = commit_order(&container).unwrap_err();
        assert_eq!(err, ReconcileError::ReferenceCycle { pending: 2 });
    }

    #[tokio::test]
    async fn test_commit_creates_then_is_unchanged() {
        let store = InMemoryStore::new();
        let mut container = ShadowContainer::new();
        let r = container.factory("lan", EntityKind::NetType);
        container[r].set_id(RowId::name("lan")).set("descr", "LAN");
        let mut diag = Diagnostics::new("gw1");

        let mut uow = store.begin().await.unwrap();
        let first = commit_shadow(&mut container, uow.as_mut(), &mut diag, r).await.unwrap();
        let second = commit_shadow(&mut container, uow.as_mut(), &mut diag, r).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(first, CommitOutcome::Created);
        assert_eq!(second, CommitOutcome::Unchanged);
        assert!(store.row(EntityKind::NetType, &RowId::name("lan")).await.is_some());
    }

    #[tokio::test]
    async fn test_commit_backfills_references() {
        let store = InMemoryStore::new();
        let mut container = ShadowContainer::new();
        let root = container.factory(ShadowKey::Root, EntityKind::Netbox);
        container[root].set("sysname", "gw1");
        let iface = container.factory(1i64, EntityKind::Interface);
        container[iface].set("netbox", root).set("ifname", "Gi0/1").set("ifindex", 1i64);
        let mut diag = Diagnostics::new("gw1");

        let mut uow = store.begin().await.unwrap();
        for r in commit_order(&container).unwrap() {
            commit_shadow(&mut container, uow.as_mut(), &mut diag, r).await.unwrap();
        }
        uow.commit().await.unwrap();

        let netbox_id = container[root].id().cloned().unwrap();
        let stored = store
            .row(EntityKind::Interface, container[iface].id().unwrap())
            .await
            .unwrap();
        assert_eq!(stored.reference("netbox"), Some(&netbox_id));
    }

    #[tokio::test]
    async fn test_commit_only_writes_changed_fields() {
        let store = InMemoryStore::new();
        let id = store
            .insert(
                EntityKind::Netbox,
                [("sysname", Value::from("gw1")), ("up_to_date", Value::from(true))],
            )
            .await
            .unwrap();

        let mut container = ShadowContainer::new();
        let root = container.factory(ShadowKey::Root, EntityKind::Netbox);
        container[root].set("sysname", "gw1").set("ip", "10.0.0.1");
        let mut diag = Diagnostics::new("gw1");

        let mut uow = store.begin().await.unwrap();
        let outcome = commit_shadow(&mut container, uow.as_mut(), &mut diag, root).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(outcome, CommitOutcome::Updated);
        let row = store.row(EntityKind::Netbox, &id).await.unwrap();
        assert_eq!(row.text("ip"), Some("10.0.0.1"));
        assert_eq!(row.get("up_to_date"), &Value::Bool(true));
    }

    #[tokio::test]
    async fn test_unresolved_reference_is_an_error() {
        let store = InMemoryStore::new();
        let mut container = ShadowContainer::new();
        let root = container.factory(ShadowKey::Root, EntityKind::Netbox);
        let iface = container.factory(1i64, EntityKind::Interface);
        container[iface].set("netbox", root);
        let mut diag = Diagnostics::new("gw1");

        let mut uow = store.begin().await.unwrap();
        let err = commit_shadow(&mut container, uow.as_mut(), &mut diag, iface).await.unwrap_err();
        assert_eq!(
            err,
            ReconcileError::UnresolvedReference {
                kind: EntityKind::Interface,
                field: "netbox".into(),
            }
        );
    }
}
