// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic inventory-sync usage example.
//!
//! Demonstrates:
//! 1. Building a shadow container the way a collector would
//! 2. Running a round against the in-memory store
//! 3. Re-running the same round (nothing is written)
//! 4. A module going missing, with its event delivered over a channel
//! 5. Displaying metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_round
//! ```

use std::sync::Arc;

use inventory_sync::{
    ChannelEventSink, EntityKind, InMemoryStore, ReconcileConfig, Reconciler, RowId, ShadowContainer, ShadowKey,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// What a collector hands over after polling gw1.
fn poll(modules: &[&str]) -> ShadowContainer {
    let mut c = ShadowContainer::new();
    let category = c.factory("GW", EntityKind::Category);
    c[category].set_id(RowId::name("GW"));

    let netbox = c.factory(ShadowKey::Root, EntityKind::Netbox);
    c[netbox].set("sysname", "gw1.example.org").set("category", category);

    let device = c.factory(ShadowKey::Root, EntityKind::Device);
    c[device].set("serial", "FOC1234X0AB");
    c[netbox].set("device", device);

    for name in modules {
        let module = c.factory(*name, EntityKind::Module);
        c[module].set("netbox", netbox).set("name", *name).set("up", "y");
    }

    let iface = c.factory(10i64, EntityKind::Interface);
    c[iface]
        .set("netbox", netbox)
        .set("ifindex", 10i64)
        .set("ifname", "Vl10")
        .set("ifalias", "lan,it,student");
    let vlan = c.factory("10.0.10.0/24", EntityKind::Vlan);
    c[vlan].set("vlan", 10i64);
    let prefix = c.factory("10.0.10.0/24", EntityKind::Prefix);
    c[prefix].set("net_address", "10.0.10.0/24").set("vlan", vlan);
    let binding = c.factory("10.0.10.1", EntityKind::GwPortPrefix);
    c[binding]
        .set("gw_ip", "10.0.10.1")
        .set("interface", iface)
        .set("prefix", prefix);
    c
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║          inventory-sync: Basic Round Example                  ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Wire up store, event sink and reconciler
    // ─────────────────────────────────────────────────────────────────────────
    let store = InMemoryStore::new();
    let (sink, mut events) = ChannelEventSink::channel();
    let reconciler = Reconciler::new(Arc::new(store.clone()), Arc::new(sink), ReconcileConfig::default());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. First round: everything is new
    // ─────────────────────────────────────────────────────────────────────────
    println!("📝 First round...");
    let report = reconciler.run_round(poll(&["Supervisor", "Linecard 1"])).await?;
    println!("   └─ {}", report);
    for kind in [EntityKind::Netbox, EntityKind::Module, EntityKind::Interface, EntityKind::Vlan] {
        println!("   └─ {}: {} rows", kind, store.count(kind).await);
    }
    if let Some(vlan) = store.rows(EntityKind::Vlan).await.first() {
        println!(
            "   └─ vlan {:?}: net_ident={:?} net_type={}",
            vlan.int("vlan"),
            vlan.text("net_ident"),
            vlan.get("net_type")
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Same observation again
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔁 Second round, nothing changed...");
    let report = reconciler.run_round(poll(&["Supervisor", "Linecard 1"])).await?;
    println!("   └─ no-op: {}", report.is_noop());

    // ─────────────────────────────────────────────────────────────────────────
    // 4. A linecard disappears
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔌 Third round, Linecard 1 missing...");
    let report = reconciler.run_round(poll(&["Supervisor"])).await?;
    println!("   └─ modules down: {}", report.cleanup.modules_down);
    while let Ok(event) = events.try_recv() {
        println!("   └─ event: {}", event);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Raw Metrics:");
    dump_metrics(&snapshotter);

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Dump all captured metrics, sorted by name
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();
    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let rendered = match value {
            DebugValue::Counter(v) => v.to_string(),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={} sum={:.6}s", samples.len(), sum)
            }
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }
    lines.sort();
    for line in lines {
        println!("   └─ {}", line);
    }
}
