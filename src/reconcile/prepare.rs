// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Preparation hooks, run over the whole container before anything is
//! written.
//!
//! Hooks fix what would otherwise break the commit (binary garbage,
//! colliding serial numbers) and derive VLAN attributes from router-port
//! descriptions and prefixes.

use tracing::debug;

use super::{cleanup, resolve, RoundContext};
use crate::container::{ShadowContainer, ShadowRef};
use crate::descr;
use crate::error::Result;
use crate::model::{EntityKind, NetAddress, RowId, ShadowKey, Value};
use crate::storage::{Filter, UnitOfWork};
use crate::text;

/// Hook order. Description parsing runs before VLAN derivation so a
/// documented network type wins over the heuristic.
const PREPARE_ORDER: [EntityKind; 5] = [
    EntityKind::Netbox,
    EntityKind::Module,
    EntityKind::Interface,
    EntityKind::GwPortPrefix,
    EntityKind::Vlan,
];

pub(super) async fn prepare(ctx: &mut RoundContext<'_>, uow: &mut dyn UnitOfWork) -> Result<()> {
    // Raw octets first: serials, names and descriptions below are read as text.
    let all: Vec<ShadowRef> = ctx.container.refs().collect();
    for r in all {
        text::fix_binary_garbage(&mut ctx.container[r], &mut ctx.diag);
    }

    for kind in PREPARE_ORDER {
        let refs: Vec<ShadowRef> = ctx.container.all(kind).collect();
        for r in refs {
            match kind {
                EntityKind::Netbox => prepare_netbox(ctx, uow, r).await?,
                EntityKind::Module => {
                    if !ctx.container[r].has("up") {
                        ctx.container[r].set("up", cleanup::MODULE_UP);
                    }
                }
                EntityKind::Interface => {
                    ctx.container[r].clear("gone_since");
                }
                EntityKind::GwPortPrefix => prepare_gwportprefix(ctx, r),
                EntityKind::Vlan => prepare_vlan(ctx, uow, r).await?,
                _ => {}
            }
        }
    }
    Ok(())
}

/// Resolve the netbox, then drop its device's serial number if another
/// stored netbox already owns it.
async fn prepare_netbox(ctx: &mut RoundContext<'_>, uow: &mut dyn UnitOfWork, r: ShadowRef) -> Result<()> {
    resolve::resolve(&mut ctx.container, uow, &mut ctx.diag, r).await?;

    let Some(device) = ctx.container[r].reference("device") else {
        return Ok(());
    };
    let Some(serial) = ctx.container[device].text("serial").map(str::to_string) else {
        return Ok(());
    };

    let owners = uow
        .find(
            EntityKind::Netbox,
            &Filter::related("device", Filter::equals("serial", serial.as_str())),
        )
        .await?;
    let me = ctx.container[r].id().cloned();
    if let Some(other) = owners.into_iter().find(|row| Some(&row.id) != me.as_ref()) {
        let message = format!(
            "Serial number conflict, attempting peaceful resolution ({}): {} [{}] (id: {}) <-> {} [{}] (id: {})",
            serial,
            ctx.container[r].text("sysname").unwrap_or("?"),
            ctx.container[r].text("ip").unwrap_or("?"),
            me.map_or_else(|| "new".to_string(), |id| id.to_string()),
            other.text("sysname").unwrap_or("?"),
            other.text("ip").unwrap_or("?"),
            other.id,
        );
        let key = ctx.container[device].key().to_string();
        ctx.diag.correction(EntityKind::Device, &key, "serial", message);
        ctx.container[device].clear("serial");
    }
    Ok(())
}

/// Net type shadow with its natural id.
fn net_type(container: &mut ShadowContainer, name: &str) -> ShadowRef {
    named(container, EntityKind::NetType, name)
}

fn named(container: &mut ShadowContainer, kind: EntityKind, name: &str) -> ShadowRef {
    let r = container.factory(name, kind);
    container[r].set_id(RowId::name(name));
    r
}

/// Push what the router port's description says onto the port's VLAN.
fn prepare_gwportprefix(ctx: &mut RoundContext<'_>, r: ShadowRef) {
    let container = &ctx.container;
    let Some(interface) = container[r].reference("interface") else {
        return;
    };
    let Some(ifalias) = container[interface].text("ifalias").map(str::to_string) else {
        return;
    };
    let Some(vlan) = container[r]
        .reference("prefix")
        .and_then(|prefix| container[prefix].reference("vlan"))
    else {
        return;
    };
    let sysname = container[interface]
        .reference("netbox")
        .and_then(|netbox| container[netbox].text("sysname"))
        .unwrap_or(ctx.diag.sysname())
        .to_string();

    let Some(parsed) = descr::parse(&ctx.config.description_conventions, &sysname, &ifalias) else {
        ctx.diag.note(
            EntityKind::GwPortPrefix,
            format!("ifalias did not match any known router port description conventions: {}", ifalias),
        );
        ctx.container[vlan].set("net_ident", ifalias);
        return;
    };

    debug!(sysname = %sysname, ifalias = %ifalias, parsed = ?parsed, "Parsed router port description");
    if let Some(name) = &parsed.net_type {
        let t = net_type(&mut ctx.container, name);
        ctx.container[vlan].set("net_type", t);
    }
    if let Some(net_ident) = parsed.net_ident {
        ctx.container[vlan].set("net_ident", net_ident);
    }
    if let Some(usage) = &parsed.usage {
        let u = named(&mut ctx.container, EntityKind::Usage, usage);
        ctx.container[vlan].set("usage", u);
    }
    if let Some(comment) = parsed.comment {
        ctx.container[vlan].set("description", comment);
    }
    if let Some(org) = &parsed.organization {
        let o = named(&mut ctx.container, EntityKind::Organization, org);
        ctx.container[vlan].set("organization", o);
    }
    if let Some(number) = parsed.vlan {
        if !ctx.container[vlan].has("vlan") {
            ctx.container[vlan].set("vlan", number);
        }
    }
}

/// Name of the net type a VLAN currently points at.
fn current_net_type<'a>(container: &'a ShadowContainer, vlan: ShadowRef) -> Option<&'a str> {
    match container[vlan].get("net_type")? {
        Value::Ref(t) => container[*t]
            .id()
            .and_then(RowId::as_name)
            .or_else(|| match container[*t].key() {
                ShadowKey::Text(name) => Some(name.as_str()),
                _ => None,
            }),
        Value::Id(id) => id.as_name(),
        Value::Text(name) => Some(name.as_str()),
        _ => None,
    }
}

async fn prepare_vlan(ctx: &mut RoundContext<'_>, uow: &mut dyn UnitOfWork, r: ShadowRef) -> Result<()> {
    match current_net_type(&ctx.container, r) {
        Some(name) if name != ctx.config.unknown_net_type => return Ok(()),
        _ => {}
    }
    let derived = derive_net_type(ctx, uow, r).await?;
    debug!(vlan = %ctx.container[r], net_type = %derived, "Derived net type");
    let t = net_type(&mut ctx.container, &derived);
    ctx.container[r].set("net_type", t);
    Ok(())
}

/// Net type from a VLAN's first prefix and the router ports attached to it.
pub(super) fn classify(net: &NetAddress, router_ports: u64) -> &'static str {
    if net.is_host() {
        return "loopback";
    }
    let by_length = if net.version() == 4 && net.prefix_len() == 30 {
        if router_ports == 1 {
            "elink"
        } else {
            "link"
        }
    } else {
        "lan"
    };
    match router_ports {
        n if n > 2 => "core",
        2 => "link",
        _ => by_length,
    }
}

async fn derive_net_type(ctx: &mut RoundContext<'_>, uow: &mut dyn UnitOfWork, vlan: ShadowRef) -> Result<String> {
    let address = ctx
        .container
        .referrers(EntityKind::Prefix, "vlan", vlan)
        .find_map(|prefix| ctx.container[prefix].text("net_address"))
        .map(str::to_string);
    let Some(address) = address else {
        return Ok(ctx.config.unknown_net_type.clone());
    };
    let net: NetAddress = match address.parse() {
        Ok(net) => net,
        Err(e) => {
            ctx.diag.note(EntityKind::Vlan, format!("cannot derive net type from {}: {}", address, e));
            return Ok(ctx.config.unknown_net_type.clone());
        }
    };
    let ports = router_port_count(ctx, uow, &net).await?;
    Ok(classify(&net, ports).to_string())
}

/// Router ports attached to prefixes with the same network address: the
/// stored bindings of other routers plus this round's own bindings when the
/// polled netbox is a router. Counting our own bindings from the round
/// rather than the store keeps the result stable between rounds.
async fn router_port_count(ctx: &RoundContext<'_>, uow: &mut dyn UnitOfWork, net: &NetAddress) -> Result<u64> {
    let routers = Filter::is_in(
        "category",
        ctx.config
            .router_categories
            .iter()
            .map(|c| Value::Id(RowId::name(c.as_str()))),
    );
    let root_id = ctx.container[ctx.root].id().cloned();
    let others = match &root_id {
        Some(id) => routers.and(Filter::id_in([id.clone()]).negate()),
        None => routers,
    };
    let filter = Filter::related("prefix", Filter::equals("net_address", net.to_string()))
        .and(Filter::related("interface", Filter::related("netbox", others)));
    let mut count = uow.count_matching(EntityKind::GwPortPrefix, &filter).await?;

    let root_is_router = root_category(ctx, uow, root_id.as_ref())
        .await?
        .is_some_and(|category| ctx.config.is_router_category(&category));
    if root_is_router {
        let own = ctx
            .container
            .all(EntityKind::GwPortPrefix)
            .filter_map(|gwport| ctx.container[gwport].reference("prefix"))
            .filter_map(|prefix| ctx.container[prefix].text("net_address"))
            .filter(|address| address.parse::<NetAddress>().is_ok_and(|a| a == *net))
            .count();
        count += own as u64;
    }
    Ok(count)
}

/// Category of the polled netbox, as observed or else as stored.
async fn root_category(
    ctx: &RoundContext<'_>,
    uow: &mut dyn UnitOfWork,
    root_id: Option<&RowId>,
) -> Result<Option<String>> {
    let observed = match ctx.container[ctx.root].get("category") {
        Some(Value::Ref(c)) => ctx.container[*c]
            .id()
            .and_then(RowId::as_name)
            .map(str::to_string),
        Some(Value::Id(id)) => id.as_name().map(str::to_string),
        Some(Value::Text(name)) => Some(name.clone()),
        _ => None,
    };
    if observed.is_some() {
        return Ok(observed);
    }
    let Some(id) = root_id else {
        return Ok(None);
    };
    Ok(uow
        .get(EntityKind::Netbox, id)
        .await?
        .and_then(|row| row.reference("category").and_then(RowId::as_name).map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> NetAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_classify_slash_30() {
        assert_eq!(classify(&net("10.0.0.0/30"), 0), "link");
        assert_eq!(classify(&net("10.0.0.0/30"), 1), "elink");
        assert_eq!(classify(&net("10.0.0.0/30"), 2), "link");
    }

    #[test]
    fn test_classify_loopback_ignores_port_count() {
        assert_eq!(classify(&net("10.0.0.1/32"), 0), "loopback");
        assert_eq!(classify(&net("10.0.0.1/32"), 5), "loopback");
        assert_eq!(classify(&net("2001:db8::1/128"), 3), "loopback");
    }

    #[test]
    fn test_classify_by_port_count() {
        assert_eq!(classify(&net("10.0.0.0/24"), 0), "lan");
        assert_eq!(classify(&net("10.0.0.0/24"), 1), "lan");
        assert_eq!(classify(&net("10.0.0.0/24"), 2), "link");
        assert_eq!(classify(&net("10.0.0.0/24"), 3), "core");
        assert_eq!(classify(&net("2001:db8::/64"), 4), "core");
    }
}
