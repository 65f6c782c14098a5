// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cleanup hooks, run once every shadow of the round has an identity.
//!
//! Cleanup compares what the round observed with what the store holds for
//! the device. Nothing here deletes merely unseen inventory except the two
//! narrow cases below:
//!
//! - gone interfaces whose ifIndex was taken over by a present interface
//! - prefixes and VLANs nothing refers to anymore

use std::collections::HashSet;

use tracing::info;

use super::RoundContext;
use crate::error::Result;
use crate::events::{Event, EventKind, EventState};
use crate::metrics;
use crate::model::{EntityKind, RowId, Value};
use crate::storage::{Fields, Filter, UnitOfWork};

pub(super) const MODULE_UP: &str = "y";
const MODULE_DOWN: &str = "n";

pub(super) async fn cleanup(ctx: &mut RoundContext<'_>, uow: &mut dyn UnitOfWork) -> Result<()> {
    let Some(netbox) = ctx.container[ctx.root].id().cloned() else {
        return Ok(());
    };
    for kind in ctx.container.kinds() {
        match kind {
            EntityKind::Module => reconcile_modules(ctx, &netbox, uow).await?,
            EntityKind::Interface => reconcile_interfaces(ctx, &netbox, uow).await?,
            EntityKind::Prefix if ctx.config.collect_unused_prefixes => {
                collect_unused_prefixes(ctx, uow).await?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Identities of this round's shadows of one kind.
fn observed(ctx: &RoundContext<'_>, kind: EntityKind) -> Vec<RowId> {
    ctx.container
        .all(kind)
        .filter_map(|r| ctx.container[r].id().cloned())
        .collect()
}

fn fields(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Fields {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Three-way module diff: stored state before the round against this
/// round's observations. Missing modules that were up go down, modules
/// that were down and are back go up; each transition raises an event.
async fn reconcile_modules(ctx: &mut RoundContext<'_>, netbox: &RowId, uow: &mut dyn UnitOfWork) -> Result<()> {
    let seen: HashSet<RowId> = observed(ctx, EntityKind::Module).into_iter().collect();

    let mut went_down = Vec::new();
    let mut came_up = Vec::new();
    for module in &ctx.modules_before {
        // NULL is the store default and means up.
        match (module.text("up").unwrap_or(MODULE_UP), seen.contains(&module.id)) {
            (MODULE_UP, false) => went_down.push(module.clone()),
            (MODULE_DOWN, true) => came_up.push(module.clone()),
            _ => {}
        }
    }

    if !went_down.is_empty() {
        let shortlist: Vec<&str> = went_down.iter().filter_map(|m| m.text("name")).collect();
        info!(
            sysname = %ctx.diag.sysname(),
            count = went_down.len(),
            modules = %shortlist.join(", "),
            "Modules went missing"
        );
    }
    if !came_up.is_empty() {
        let shortlist: Vec<&str> = came_up.iter().filter_map(|m| m.text("name")).collect();
        info!(
            sysname = %ctx.diag.sysname(),
            count = came_up.len(),
            modules = %shortlist.join(", "),
            "Modules reappeared"
        );
    }

    for (modules, up, state) in [
        (&went_down, MODULE_DOWN, EventState::Start),
        (&came_up, MODULE_UP, EventState::End),
    ] {
        for module in modules {
            uow.update(EntityKind::Module, &module.id, fields([("up", Value::from(up))]))
                .await?;
            ctx.events.push(Event {
                source: ctx.config.event_source.clone(),
                target: ctx.config.event_target.clone(),
                kind: EventKind::ModuleState,
                netbox: netbox.clone(),
                device: module.reference("device").cloned(),
                subject: module.id.clone(),
                state,
            });
        }
    }
    ctx.cleanup.modules_down += went_down.len();
    ctx.cleanup.modules_up += came_up.len();
    Ok(())
}

/// Stamp unseen interfaces as gone, then hard-delete gone interfaces whose
/// ifIndex is now used by a present one.
async fn reconcile_interfaces(ctx: &mut RoundContext<'_>, netbox: &RowId, uow: &mut dyn UnitOfWork) -> Result<()> {
    let seen = observed(ctx, EntityKind::Interface);
    let mine = Filter::equals("netbox", netbox.clone());
    let unseen = Filter::id_in(seen).negate();

    let missing = mine
        .clone()
        .and(Filter::is_null("gone_since"))
        .and(unseen.clone());
    let marked = uow
        .update_matching(EntityKind::Interface, &missing, fields([("gone_since", Value::from(ctx.now))]))
        .await?;
    if marked > 0 {
        info!(sysname = %ctx.diag.sysname(), count = marked, "Marking interfaces as gone");
    }
    ctx.cleanup.interfaces_gone += marked;

    if !ctx.config.delete_duplicate_interfaces {
        return Ok(());
    }

    let present: HashSet<i64> = uow
        .find(EntityKind::Interface, &mine.clone().and(Filter::is_null("gone_since")))
        .await?
        .iter()
        .filter_map(|row| row.int("ifindex"))
        .collect();
    let gone = mine.and(Filter::is_null("gone_since").negate()).and(unseen);
    let deletable: Vec<RowId> = uow
        .find(EntityKind::Interface, &gone)
        .await?
        .into_iter()
        .filter(|row| row.int("ifindex").is_some_and(|ifindex| present.contains(&ifindex)))
        .map(|row| row.id)
        .collect();
    if deletable.is_empty() {
        return Ok(());
    }

    let deleted = uow
        .delete_matching(EntityKind::Interface, &Filter::id_in(deletable))
        .await?;
    info!(sysname = %ctx.diag.sysname(), count = deleted, "Deleting missing interfaces");
    metrics::record_deleted(EntityKind::Interface.as_str(), deleted);
    ctx.cleanup.interfaces_deleted += deleted;
    Ok(())
}

/// Delete prefixes with no router port whose VLAN is not worth keeping,
/// then VLANs left without prefixes. Prefixes go first so a VLAN orphaned
/// by that step is collected in the same pass.
async fn collect_unused_prefixes(ctx: &mut RoundContext<'_>, uow: &mut dyn UnitOfWork) -> Result<()> {
    let scope = Filter::equals("net_type", RowId::name(ctx.config.scope_net_type.as_str()));
    let keep_vlans = scope
        .clone()
        .or(Filter::referenced_by(EntityKind::SwPortVlan, "vlan"));

    let unused_prefixes = Filter::referenced_by(EntityKind::GwPortPrefix, "prefix")
        .negate()
        .and(Filter::related("vlan", keep_vlans).negate())
        .and(Filter::id_in(observed(ctx, EntityKind::Prefix)).negate());
    let prefixes = uow.delete_matching(EntityKind::Prefix, &unused_prefixes).await?;
    if prefixes > 0 {
        info!(count = prefixes, "Deleted unused prefixes");
    }

    let unused_vlans = scope
        .or(Filter::referenced_by(EntityKind::SwPortVlan, "vlan"))
        .or(Filter::referenced_by(EntityKind::Prefix, "vlan"))
        .negate()
        .and(Filter::id_in(observed(ctx, EntityKind::Vlan)).negate());
    let vlans = uow.delete_matching(EntityKind::Vlan, &unused_vlans).await?;
    if vlans > 0 {
        info!(count = vlans, "Deleted unused VLANs");
    }

    metrics::record_deleted(EntityKind::Prefix.as_str(), prefixes);
    metrics::record_deleted(EntityKind::Vlan.as_str(), vlans);
    ctx.cleanup.prefixes_deleted += prefixes;
    ctx.cleanup.vlans_deleted += vlans;
    Ok(())
}
