// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the reconciler.
//!
//! # Example
//!
//! ```
//! use inventory_sync::{DescriptionConvention, ReconcileConfig};
//!
//! // Minimal config (uses defaults)
//! let config = ReconcileConfig::default();
//! assert_eq!(config.router_categories, vec!["GSW", "GW"]);
//!
//! // Site that only documents router ports the UNINETT way
//! let config = ReconcileConfig {
//!     description_conventions: vec![DescriptionConvention::Uninett],
//!     collect_unused_prefixes: false,
//!     ..Default::default()
//! };
//! assert!(!config.collect_unused_prefixes);
//! ```

use serde::Deserialize;

/// Router-port description convention, tried in configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionConvention {
    Ntnu,
    Uninett,
}

/// Configuration for the reconciler.
///
/// All fields have defaults matching a stock installation.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    /// Netbox categories whose ports count as router ports when deriving
    /// the VLAN network type.
    #[serde(default = "default_router_categories")]
    pub router_categories: Vec<String>,

    /// Net type id of scope VLANs, which are never collected.
    #[serde(default = "default_scope_net_type")]
    pub scope_net_type: String,

    /// Net type id used when a VLAN's type cannot be derived.
    #[serde(default = "default_unknown_net_type")]
    pub unknown_net_type: String,

    #[serde(default = "default_description_conventions")]
    pub description_conventions: Vec<DescriptionConvention>,

    /// Subsystem names stamped on lifecycle events
    #[serde(default = "default_event_source")]
    pub event_source: String,
    #[serde(default = "default_event_target")]
    pub event_target: String,

    /// Hard-delete gone interfaces whose index number is reused.
    #[serde(default = "default_true")]
    pub delete_duplicate_interfaces: bool,

    /// Delete prefixes and VLANs nothing refers to anymore.
    #[serde(default = "default_true")]
    pub collect_unused_prefixes: bool,
}

fn default_router_categories() -> Vec<String> { vec!["GSW".into(), "GW".into()] }
fn default_scope_net_type() -> String { "scope".into() }
fn default_unknown_net_type() -> String { "unknown".into() }
fn default_description_conventions() -> Vec<DescriptionConvention> {
    vec![DescriptionConvention::Ntnu, DescriptionConvention::Uninett]
}
fn default_event_source() -> String { "getDeviceData".into() }
fn default_event_target() -> String { "eventEngine".into() }
fn default_true() -> bool { true }

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            router_categories: default_router_categories(),
            scope_net_type: default_scope_net_type(),
            unknown_net_type: default_unknown_net_type(),
            description_conventions: default_description_conventions(),
            event_source: default_event_source(),
            event_target: default_event_target(),
            delete_duplicate_interfaces: default_true(),
            collect_unused_prefixes: default_true(),
        }
    }
}

impl ReconcileConfig {
    /// Whether a netbox category counts as a router.
    #[must_use]
    pub fn is_router_category(&self, category: &str) -> bool {
        self.router_categories.iter().any(|c| c == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_matches_default() {
        let parsed: ReconcileConfig = serde_json::from_str("{}").unwrap();
        let default = ReconcileConfig::default();

        assert_eq!(parsed.router_categories, default.router_categories);
        assert_eq!(parsed.scope_net_type, "scope");
        assert_eq!(parsed.unknown_net_type, "unknown");
        assert_eq!(parsed.event_source, "getDeviceData");
        assert_eq!(parsed.event_target, "eventEngine");
        assert!(parsed.delete_duplicate_interfaces);
        assert!(parsed.collect_unused_prefixes);
    }

    #[test]
    fn test_conventions_are_lowercase() {
        let parsed: ReconcileConfig =
            serde_json::from_str(r#"{"description_conventions": ["uninett"]}"#).unwrap();
        assert_eq!(parsed.description_conventions, vec![DescriptionConvention::Uninett]);
    }

    #[test]
    fn test_unknown_convention_is_rejected() {
        let parsed = serde_json::from_str::<ReconcileConfig>(r#"{"description_conventions": ["cisco"]}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_router_category() {
        let config = ReconcileConfig::default();
        assert!(config.is_router_category("GW"));
        assert!(config.is_router_category("GSW"));
        assert!(!config.is_router_category("SW"));
    }
}
