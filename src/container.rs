// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Round-scoped shadow registry.
//!
//! The [`ShadowContainer`] is an arena: shadows live in one `Vec` and refer
//! to each other through [`ShadowRef`] indices. Until a shadow is committed
//! its references are only meaningful inside this container; committing
//! assigns row identities, and every referencing shadow picks the identity
//! up through the arena when it is itself committed.
//!
//! A container lives for exactly one polling round of one device. It is
//! moved into [`crate::Reconciler::run_round`] and dropped afterwards, so
//! nothing leaks between rounds or between devices.
//!
//! # Example
//!
//! ```
//! use inventory_sync::{EntityKind, ShadowContainer, ShadowKey};
//!
//! let mut container = ShadowContainer::new();
//! let netbox = container.factory(ShadowKey::Root, EntityKind::Netbox);
//!
//! let a = container.factory(12i64, EntityKind::Interface);
//! container[a].set("ifname", "Gi0/12").set("netbox", netbox);
//!
//! // Same key, same kind: the same shadow comes back.
//! let b = container.factory(12i64, EntityKind::Interface);
//! assert_eq!(a, b);
//! assert_eq!(container.all(EntityKind::Interface).count(), 1);
//! ```

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use crate::model::{EntityKind, Shadow, ShadowKey};

/// Index of a shadow inside its [`ShadowContainer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShadowRef(usize);

impl ShadowRef {
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ShadowRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "&{}", self.0)
    }
}

/// Registry of every shadow produced during one polling round.
#[derive(Debug, Default)]
pub struct ShadowContainer {
    shadows: Vec<Shadow>,
    by_kind: HashMap<EntityKind, Vec<ShadowRef>>,
    keys: HashMap<(EntityKind, ShadowKey), ShadowRef>,
}

impl ShadowContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the shadow registered under `key` for `kind`.
    pub fn factory(&mut self, key: impl Into<ShadowKey>, kind: EntityKind) -> ShadowRef {
        let key = key.into();
        if let Some(r) = self.keys.get(&(kind, key.clone())) {
            return *r;
        }
        self.register(Shadow::new(kind, key))
    }

    /// Register a shadow built elsewhere. If its key is already taken the
    /// existing shadow is kept and returned.
    pub fn insert(&mut self, shadow: Shadow) -> ShadowRef {
        if let Some(r) = self.keys.get(&(shadow.kind(), shadow.key().clone())) {
            return *r;
        }
        self.register(shadow)
    }

    fn register(&mut self, shadow: Shadow) -> ShadowRef {
        let r = ShadowRef(self.shadows.len());
        let kind = shadow.kind();
        self.keys.insert((kind, shadow.key().clone()), r);
        self.by_kind.entry(kind).or_default().push(r);
        self.shadows.push(shadow);
        r
    }

    /// Look up an existing shadow without creating one.
    #[must_use]
    pub fn get(&self, key: impl Into<ShadowKey>, kind: EntityKind) -> Option<ShadowRef> {
        self.keys.get(&(kind, key.into())).copied()
    }

    /// The round's root netbox.
    #[must_use]
    pub fn root(&self) -> Option<ShadowRef> {
        self.get(ShadowKey::Root, EntityKind::Netbox)
    }

    /// All shadows of one kind, in registration order.
    pub fn all(&self, kind: EntityKind) -> impl Iterator<Item = ShadowRef> + '_ {
        self.by_kind.get(&kind).into_iter().flatten().copied()
    }

    /// Shadows of `kind` whose `field` references `target`.
    pub fn referrers<'a>(
        &'a self,
        kind: EntityKind,
        field: &'a str,
        target: ShadowRef,
    ) -> impl Iterator<Item = ShadowRef> + 'a {
        self.all(kind)
            .filter(move |r| self[*r].reference(field) == Some(target))
    }

    #[must_use]
    pub fn contains_kind(&self, kind: EntityKind) -> bool {
        self.by_kind.get(&kind).is_some_and(|v| !v.is_empty())
    }

    /// Kinds present, in commit rank order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|k| self.contains_kind(*k))
            .collect()
    }

    /// Every shadow reference, in registration order.
    pub fn refs(&self) -> impl Iterator<Item = ShadowRef> {
        (0..self.shadows.len()).map(ShadowRef)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shadows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shadows.is_empty()
    }
}

impl Index<ShadowRef> for ShadowContainer {
    type Output = Shadow;

    fn index(&self, r: ShadowRef) -> &Shadow {
        &self.shadows[r.0]
    }
}

impl IndexMut<ShadowRef> for ShadowContainer {
    fn index_mut(&mut self, r: ShadowRef) -> &mut Shadow {
        &mut self.shadows[r.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowId;

    #[test]
    fn test_new_container_is_empty() {
        let container = ShadowContainer::new();
        assert!(container.is_empty());
        assert!(container.root().is_none());
    }

    #[test]
    fn test_factory_is_idempotent_per_kind() {
        let mut container = ShadowContainer::new();
        let a = container.factory("Gi0/1", EntityKind::Interface);
        let b = container.factory("Gi0/1", EntityKind::Interface);
        let c = container.factory("Gi0/1", EntityKind::Module);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_factory_keeps_attributes_between_observations() {
        let mut container = ShadowContainer::new();
        let r = container.factory(5i64, EntityKind::Interface);
        container[r].set("ifname", "eth0");

        let again = container.factory(5i64, EntityKind::Interface);
        container[again].set("ifdescr", "eth0 descr");

        assert_eq!(container[r].text("ifname"), Some("eth0"));
        assert_eq!(container[r].text("ifdescr"), Some("eth0 descr"));
    }

    #[test]
    fn test_get_does_not_create() {
        let mut container = ShadowContainer::new();
        assert!(container.get("x", EntityKind::Vlan).is_none());
        assert!(container.is_empty());

        let r = container.factory("x", EntityKind::Vlan);
        assert_eq!(container.get("x", EntityKind::Vlan), Some(r));
    }

    #[test]
    fn test_root_slot() {
        let mut container = ShadowContainer::new();
        let root = container.factory(ShadowKey::Root, EntityKind::Netbox);
        container[root].set_id(RowId::Serial(1));

        assert_eq!(container.root(), Some(root));
    }

    #[test]
    fn test_referrers() {
        let mut container = ShadowContainer::new();
        let vlan = container.factory(10i64, EntityKind::Vlan);
        let other = container.factory(20i64, EntityKind::Vlan);
        let p1 = container.factory("10.0.0.0/24", EntityKind::Prefix);
        let p2 = container.factory("10.0.1.0/24", EntityKind::Prefix);
        container[p1].set("vlan", vlan);
        container[p2].set("vlan", other);

        let mine: Vec<_> = container.referrers(EntityKind::Prefix, "vlan", vlan).collect();
        assert_eq!(mine, vec![p1]);
    }

    #[test]
    fn test_kinds_in_rank_order() {
        let mut container = ShadowContainer::new();
        container.factory(1i64, EntityKind::Interface);
        container.factory(ShadowKey::Root, EntityKind::Netbox);
        container.factory("lan", EntityKind::NetType);

        assert_eq!(
            container.kinds(),
            vec![EntityKind::NetType, EntityKind::Netbox, EntityKind::Interface]
        );
    }

    #[test]
    fn test_insert_keeps_existing() {
        let mut container = ShadowContainer::new();
        let first = container.factory("a", EntityKind::Usage);
        let mut dup = Shadow::new(EntityKind::Usage, ShadowKey::from("a"));
        dup.set("descr", "ignored");

        assert_eq!(container.insert(dup), first);
        assert!(container[first].get("descr").is_none());
    }
}
