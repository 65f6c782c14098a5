// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Identity resolution.
//!
//! Matching a shadow to a stored row is a strategy selected by the shadow's
//! [`EntityKind`]. Most kinds use their declared lookup keys; interfaces,
//! VLANs and devices need more than a key tuple can express.
//!
//! Resolution reads the store but never writes it. On a match the row's
//! identity is adopted by the shadow and the row is returned, so the
//! commit step can diff against it without a second read.

use tracing::debug;

use crate::container::{ShadowContainer, ShadowRef};
use crate::diagnostics::Diagnostics;
use crate::error::{ReconcileError, Result};
use crate::model::{EntityKind, Value};
use crate::storage::{Filter, Row, StorageError, UnitOfWork};
use crate::text;

/// Find the stored row for `r`, adopting its identity.
///
/// A shadow that already carries an identity is looked up by it; `None`
/// then means the row has to be created under that identity.
pub(crate) async fn resolve(
    container: &mut ShadowContainer,
    uow: &mut dyn UnitOfWork,
    diag: &mut Diagnostics,
    r: ShadowRef,
) -> Result<Option<Row>> {
    text::fix_binary_garbage(&mut container[r], diag);
    let kind = container[r].kind();
    if let Some(id) = container[r].id().cloned() {
        return Ok(uow.get(kind, &id).await?);
    }

    let found = match kind {
        EntityKind::Interface => resolve_interface(container, uow, r).await?,
        EntityKind::Vlan => resolve_vlan(container, uow, r).await?,
        EntityKind::Device => resolve_device(container, uow, r).await?,
        _ => lookup(container, uow, r).await?,
    };

    match &found {
        Some(row) => {
            debug!(shadow = %container[r], id = %row.id, "Matched stored row");
            container[r].set_id(row.id.clone());
        }
        None => debug!(shadow = %container[r], "No stored row, will create"),
    }
    Ok(found)
}

/// Value usable in a store query: references become identities, NULL and
/// references to shadows without identity are unusable.
fn query_value(container: &ShadowContainer, value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Ref(target) => container[*target].id().cloned().map(Value::Id),
        other => Some(other.clone()),
    }
}

fn ambiguous(container: &ShadowContainer, r: ShadowRef, candidates: usize) -> ReconcileError {
    ReconcileError::AmbiguousIdentity {
        kind: container[r].kind(),
        key: container[r].key().to_string(),
        candidates,
    }
}

/// Default strategy: try each declared lookup key in order.
///
/// Key tuples with a missing value, or a reference to a shadow that has no
/// identity yet, are skipped.
pub(crate) async fn lookup(
    container: &ShadowContainer,
    uow: &mut dyn UnitOfWork,
    r: ShadowRef,
) -> Result<Option<Row>> {
    let shadow = &container[r];
    'keys: for fields in shadow.kind().lookups() {
        let mut key = Vec::with_capacity(fields.len());
        for field in fields.iter() {
            let Some(value) = shadow.get(field).and_then(|v| query_value(container, v)) else {
                continue 'keys;
            };
            key.push((*field, value));
        }
        match uow.find_by_key(shadow.kind(), &key).await {
            Ok(Some(row)) => return Ok(Some(row)),
            Ok(None) => {}
            Err(StorageError::MultipleRows { count, .. }) => {
                return Err(ambiguous(container, r, count));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

/// Interfaces: ifName first, then the legacy ifDescr-as-name match,
/// narrowed by ifIndex when several rows share the name, and ifIndex alone
/// as the last resort. More than one surviving candidate is an error.
async fn resolve_interface(
    container: &ShadowContainer,
    uow: &mut dyn UnitOfWork,
    r: ShadowRef,
) -> Result<Option<Row>> {
    let shadow = &container[r];
    let Some(netbox) = shadow.get("netbox").and_then(|v| query_value(container, v)) else {
        return Ok(None);
    };
    let base = Filter::equals("netbox", netbox);
    let ifindex = shadow.int("ifindex");

    let mut candidates = Vec::new();
    if let Some(ifname) = shadow.text("ifname") {
        let filter = base.clone().and(Filter::equals("ifname", ifname));
        candidates = uow.find(EntityKind::Interface, &filter).await?;
    }
    if candidates.is_empty() {
        if let Some(ifdescr) = shadow.text("ifdescr") {
            let filter = base
                .clone()
                .and(Filter::equals("ifname", ifdescr))
                .and(Filter::equals("ifdescr", ifdescr));
            candidates = uow.find(EntityKind::Interface, &filter).await?;
        }
    }
    if candidates.len() > 1 {
        if let Some(ifindex) = ifindex {
            candidates.retain(|row| row.int("ifindex") == Some(ifindex));
        }
    }
    if candidates.is_empty() {
        if let Some(ifindex) = ifindex {
            let filter = base.and(Filter::equals("ifindex", ifindex));
            candidates = uow.find(EntityKind::Interface, &filter).await?;
        }
    }

    match candidates.len() {
        0 | 1 => Ok(candidates.pop()),
        n => {
            debug!(shadow = %shadow, candidates = n, "Interface matches several stored rows");
            Err(ambiguous(container, r, n))
        }
    }
}

/// VLANs: numbers are not globally unique, so match on network identifier
/// first and otherwise follow this round's prefixes to the VLAN they are
/// already stored with.
async fn resolve_vlan(
    container: &ShadowContainer,
    uow: &mut dyn UnitOfWork,
    r: ShadowRef,
) -> Result<Option<Row>> {
    let shadow = &container[r];
    let number = shadow.int("vlan");

    if let Some(net_ident) = shadow.text("net_ident") {
        let by_number = match number {
            Some(n) => Filter::equals("vlan", n),
            None => Filter::is_null("vlan"),
        };
        let rows = uow
            .find(EntityKind::Vlan, &by_number.and(Filter::equals("net_ident", net_ident)))
            .await?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(Some(row));
        }
    }

    let prefixes: Vec<ShadowRef> = container.referrers(EntityKind::Prefix, "vlan", r).collect();
    for prefix in prefixes {
        let stored = match container[prefix].id() {
            Some(id) => uow.get(EntityKind::Prefix, id).await?,
            None => lookup(container, uow, prefix).await?,
        };
        let Some(vlan_id) = stored.as_ref().and_then(|row| row.reference("vlan")) else {
            continue;
        };
        let Some(vlan) = uow.get(EntityKind::Vlan, vlan_id).await? else {
            return Ok(None);
        };
        debug!(shadow = %shadow, prefix = %container[prefix], vlan = %vlan.id, "Candidate VLAN via stored prefix");
        return Ok(match vlan.int("vlan") {
            None => Some(vlan),
            Some(n) if Some(n) == number => Some(vlan),
            Some(_) => None,
        });
    }
    Ok(None)
}

/// Devices: serial number. A device whose serial had to be dropped keeps
/// the serial-less device its netbox already points at, instead of adding
/// a new one every round.
async fn resolve_device(
    container: &ShadowContainer,
    uow: &mut dyn UnitOfWork,
    r: ShadowRef,
) -> Result<Option<Row>> {
    if let Some(row) = lookup(container, uow, r).await? {
        return Ok(Some(row));
    }
    if container[r].has("serial") {
        return Ok(None);
    }
    let owners: Vec<ShadowRef> = container.referrers(EntityKind::Netbox, "device", r).collect();
    for owner in owners {
        let Some(netbox_id) = container[owner].id() else {
            continue;
        };
        let Some(netbox) = uow.get(EntityKind::Netbox, netbox_id).await? else {
            continue;
        };
        let Some(device_id) = netbox.reference("device") else {
            continue;
        };
        if let Some(device) = uow.get(EntityKind::Device, device_id).await? {
            if device.get("serial").is_null() {
                return Ok(Some(device));
            }
        }
    }
    Ok(None)
}
