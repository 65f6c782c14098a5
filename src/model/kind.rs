// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Entity type tags and the static schema attached to them.
//!
//! Every persisted inventory type has one [`EntityKind`]. The kind carries
//! everything the engine needs to know about the type without touching the
//! store:
//!
//! - declared lookup keys, tried in order by the default identity resolver
//! - reference fields, with the target kind and on-delete behaviour
//! - fields the store keeps unique
//! - a commit rank, used to order preparation and break topological ties

use serde::{Deserialize, Serialize};

/// Persisted inventory record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    NetType,
    Organization,
    Usage,
    Location,
    Room,
    Category,
    Vendor,
    NetboxType,
    Device,
    Netbox,
    NetboxInfo,
    Module,
    Interface,
    Vlan,
    Prefix,
    GwPortPrefix,
    SwPortVlan,
    SwPortAllowedVlan,
    Arp,
    Cam,
    SnmpOid,
    NetboxSnmpOid,
}

/// What happens to a referencing row when its target is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
}

/// A reference field declared on a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub target: EntityKind,
    pub on_delete: OnDelete,
}

const fn cascade(field: &'static str, target: EntityKind) -> Reference {
    Reference { field, target, on_delete: OnDelete::Cascade }
}

const fn set_null(field: &'static str, target: EntityKind) -> Reference {
    Reference { field, target, on_delete: OnDelete::SetNull }
}

impl EntityKind {
    /// All kinds in commit rank order.
    pub const ALL: [EntityKind; 22] = [
        Self::NetType,
        Self::Organization,
        Self::Usage,
        Self::Location,
        Self::Room,
        Self::Category,
        Self::Vendor,
        Self::NetboxType,
        Self::Device,
        Self::Netbox,
        Self::NetboxInfo,
        Self::Module,
        Self::Interface,
        Self::Vlan,
        Self::Prefix,
        Self::GwPortPrefix,
        Self::SwPortVlan,
        Self::SwPortAllowedVlan,
        Self::Arp,
        Self::Cam,
        Self::SnmpOid,
        Self::NetboxSnmpOid,
    ];

    /// Lowercase name used in logs and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetType => "nettype",
            Self::Organization => "organization",
            Self::Usage => "usage",
            Self::Location => "location",
            Self::Room => "room",
            Self::Category => "category",
            Self::Vendor => "vendor",
            Self::NetboxType => "netboxtype",
            Self::Device => "device",
            Self::Netbox => "netbox",
            Self::NetboxInfo => "netboxinfo",
            Self::Module => "module",
            Self::Interface => "interface",
            Self::Vlan => "vlan",
            Self::Prefix => "prefix",
            Self::GwPortPrefix => "gwportprefix",
            Self::SwPortVlan => "swportvlan",
            Self::SwPortAllowedVlan => "swportallowedvlan",
            Self::Arp => "arp",
            Self::Cam => "cam",
            Self::SnmpOid => "snmpoid",
            Self::NetboxSnmpOid => "netboxsnmpoid",
        }
    }

    /// Position in [`EntityKind::ALL`]. Referenced types rank lower than
    /// the types referencing them.
    #[must_use]
    pub fn rank(&self) -> usize {
        *self as usize
    }

    /// Declared lookup keys, tried in order. An empty slice means the kind
    /// can only be matched through a pre-assigned id.
    #[must_use]
    pub fn lookups(&self) -> &'static [&'static [&'static str]] {
        match self {
            Self::Netbox => &[&["sysname"], &["ip"]],
            Self::NetboxType => &[&["sysobjectid"]],
            Self::NetboxInfo => &[&["netbox", "key", "variable"]],
            Self::Module => &[&["netbox", "name"], &["device"]],
            Self::Device => &[&["serial"]],
            Self::Prefix => &[&["net_address", "vlan"], &["net_address"]],
            Self::GwPortPrefix => &[&["gw_ip"]],
            Self::Arp => &[&["netbox", "ip", "mac", "end_time"]],
            Self::Cam => &[&["netbox", "ifindex", "mac", "miss_count"]],
            Self::SwPortAllowedVlan => &[&["interface"]],
            Self::SnmpOid => &[&["oidkey"]],
            _ => &[],
        }
    }

    /// Reference fields declared on this kind.
    #[must_use]
    pub fn references(&self) -> &'static [Reference] {
        use EntityKind::*;
        const ROOM: &[Reference] = &[set_null("location", Location)];
        const NETBOX_TYPE: &[Reference] = &[set_null("vendor", Vendor)];
        const NETBOX: &[Reference] = &[
            set_null("device", Device),
            set_null("type", NetboxType),
            set_null("category", Category),
            set_null("room", Room),
            set_null("organization", Organization),
        ];
        const NETBOX_INFO: &[Reference] = &[cascade("netbox", Netbox)];
        const MODULE: &[Reference] = &[cascade("netbox", Netbox), set_null("device", Device)];
        const INTERFACE: &[Reference] = &[cascade("netbox", Netbox), set_null("module", Module)];
        const VLAN: &[Reference] = &[
            set_null("net_type", NetType),
            set_null("organization", Organization),
            set_null("usage", Usage),
        ];
        const PREFIX: &[Reference] = &[set_null("vlan", Vlan)];
        const GW_PORT_PREFIX: &[Reference] = &[cascade("interface", Interface), cascade("prefix", Prefix)];
        const SW_PORT_VLAN: &[Reference] = &[cascade("interface", Interface), cascade("vlan", Vlan)];
        const SW_PORT_ALLOWED_VLAN: &[Reference] = &[cascade("interface", Interface)];
        const ARP: &[Reference] = &[set_null("netbox", Netbox), set_null("prefix", Prefix)];
        const CAM: &[Reference] = &[set_null("netbox", Netbox)];
        const NETBOX_SNMP_OID: &[Reference] = &[cascade("netbox", Netbox), cascade("snmp_oid", SnmpOid)];

        match self {
            Room => ROOM,
            NetboxType => NETBOX_TYPE,
            Netbox => NETBOX,
            NetboxInfo => NETBOX_INFO,
            Module => MODULE,
            Interface => INTERFACE,
            Vlan => VLAN,
            Prefix => PREFIX,
            GwPortPrefix => GW_PORT_PREFIX,
            SwPortVlan => SW_PORT_VLAN,
            SwPortAllowedVlan => SW_PORT_ALLOWED_VLAN,
            Arp => ARP,
            Cam => CAM,
            NetboxSnmpOid => NETBOX_SNMP_OID,
            _ => &[],
        }
    }

    /// Target kind of a reference field, if `field` is one.
    #[must_use]
    pub fn reference_target(&self, field: &str) -> Option<EntityKind> {
        self.references()
            .iter()
            .find(|r| r.field == field)
            .map(|r| r.target)
    }

    /// Fields the store keeps unique. NULL values never collide.
    #[must_use]
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Netbox => &["sysname"],
            Self::Device => &["serial"],
            Self::NetboxType => &["sysobjectid"],
            Self::SnmpOid => &["oidkey"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
