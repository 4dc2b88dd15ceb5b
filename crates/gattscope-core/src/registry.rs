//! GATT name registries - Maps assigned-number codes and short names to display names
//!
//! A registry is built once from a flat list of [`RegistryEntry`] values and
//! is immutable afterwards. Two indexes are kept:
//! - by code (`0x180A`), where a later entry overwrites an earlier one
//! - by short name (`device_information`), where the first entry wins and
//!   every later collision is recorded in the [`ConflictLog`]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

use crate::identifier::Identifier;
use crate::resolver;

/// Which assigned-number table a registry was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    Service,
    Characteristic,
}

impl RegistryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Characteristic => "characteristic",
        }
    }

    /// Name returned when the registry has not been built yet
    pub fn unloaded_sentinel(&self) -> &'static str {
        match self {
            Self::Service => "Unloaded service..",
            Self::Characteristic => "Unloaded characteristic..",
        }
    }

    /// Name returned when an identifier is not in the registry
    pub fn unknown_sentinel(&self) -> &'static str {
        match self {
            Self::Service => "Unknown service",
            Self::Characteristic => "Unknown characteristic",
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry of a registry dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Dotted path, e.g. "org.bluetooth.service.device_information"
    pub id: String,
    /// Human-readable name, e.g. "Device Information"
    pub name: String,
    /// Canonical hex code, e.g. "0x180A"
    pub code: String,
}

impl RegistryEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: code.into(),
        }
    }
}

/// A registry entry with its short id derived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub id: String,
    /// Final segment of `id`
    pub short_id: String,
    pub name: String,
    pub code: String,
}

impl From<&RegistryEntry> for ResolvedItem {
    fn from(entry: &RegistryEntry) -> Self {
        Self {
            id: entry.id.clone(),
            short_id: short_id(&entry.id).to_string(),
            name: entry.name.clone(),
            code: entry.code.clone(),
        }
    }
}

/// Substring after the last '.', or the whole id when it has no dot
pub fn short_id(id: &str) -> &str {
    match id.rsplit_once('.') {
        Some((_, tail)) => tail,
        None => id,
    }
}

/// Short-name collisions found while building one registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictLog {
    entries: Vec<String>,
}

impl ConflictLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, message: String) {
        self.entries.push(message);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable name registry for one [`RegistryKind`]
#[derive(Debug, Clone)]
pub struct Registry {
    kind: RegistryKind,
    by_code: HashMap<String, ResolvedItem>,
    by_short_name: HashMap<String, ResolvedItem>,
}

impl Registry {
    /// Build a registry from entries in dataset order.
    ///
    /// Every entry lands in the by-code index (last write wins). Only the
    /// first entry for each short id lands in the by-short-name index; later
    /// ones are reported in the returned [`ConflictLog`].
    pub fn build(kind: RegistryKind, entries: &[RegistryEntry]) -> (Self, ConflictLog) {
        let mut registry = Self::empty(kind);
        let mut conflicts = ConflictLog::new();

        for entry in entries {
            let item = ResolvedItem::from(entry);

            registry.by_code.insert(item.code.clone(), item.clone());

            if registry.by_short_name.contains_key(&item.short_id) {
                debug!(kind = %kind, short_id = %item.short_id, code = %item.code, "Short name conflict");
                conflicts.push(format!("{} name conflict: {}", kind, item.short_id));
            } else {
                registry.by_short_name.insert(item.short_id.clone(), item);
            }
        }

        info!(
            kind = %kind,
            entries = entries.len(),
            codes = registry.by_code.len(),
            conflicts = conflicts.len(),
            "Built registry"
        );

        (registry, conflicts)
    }

    /// A registry with no entries; resolves everything to the unloaded sentinel
    pub fn empty(kind: RegistryKind) -> Self {
        Self {
            kind,
            by_code: HashMap::new(),
            by_short_name: HashMap::new(),
        }
    }

    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    /// Number of distinct codes
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    pub fn by_code(&self, code: &str) -> Option<&ResolvedItem> {
        self.by_code.get(code)
    }

    pub fn by_short_name(&self, short_id: &str) -> Option<&ResolvedItem> {
        self.by_short_name.get(short_id)
    }

    /// Find the item an identifier refers to, following short names to codes
    pub fn lookup(&self, identifier: &Identifier) -> Option<&ResolvedItem> {
        let code = resolver::canonical_code(identifier, self);
        self.by_code(&code)
    }

    /// Registered code for an identifier, or its normalized form when unregistered
    pub fn code_of(&self, identifier: &Identifier) -> String {
        self.lookup(identifier)
            .map(|item| item.code.clone())
            .unwrap_or_else(|| identifier.normalize())
    }

    /// Display name for an identifier, or this kind's unknown sentinel
    pub fn resolve_name(&self, identifier: &Identifier) -> String {
        resolver::resolve_name(identifier, self.kind, Some(self))
    }

    /// All items in the by-code index, sorted by code
    pub fn items(&self) -> Vec<&ResolvedItem> {
        let mut items: Vec<_> = self.by_code.values().collect();
        items.sort_by(|a, b| a.code.cmp(&b.code));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str, code: &str) -> RegistryEntry {
        RegistryEntry::new(id, name, code)
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("org.bluetooth.service.device_information"), "device_information");
        assert_eq!(short_id("battery_level"), "battery_level");
        assert_eq!(short_id("org.bluetooth."), "");
    }

    #[test]
    fn test_short_name_conflict_first_wins() {
        let entries = vec![
            entry("org.bluetooth.service.alpha", "Alpha One", "0x1001"),
            entry("com.vendor.service.alpha", "Alpha Two", "0x1002"),
            entry("org.bluetooth.service.beta", "Beta", "0x1003"),
        ];

        let (registry, conflicts) = Registry::build(RegistryKind::Service, &entries);

        assert_eq!(registry.by_short_name("alpha").unwrap().name, "Alpha One");
        assert_eq!(registry.by_short_name("beta").unwrap().name, "Beta");
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts.entries()[0].contains("alpha"));
        assert_eq!(conflicts.entries()[0], "service name conflict: alpha");

        // The dropped entry is still reachable by code
        assert_eq!(registry.by_code("0x1002").unwrap().name, "Alpha Two");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_duplicate_code_last_wins() {
        let entries = vec![
            entry("org.bluetooth.characteristic.first", "First", "0x2A00"),
            entry("org.bluetooth.characteristic.second", "Second", "0x2A00"),
            entry("org.bluetooth.characteristic.first", "Third", "0x2A00"),
        ];

        let (registry, conflicts) = Registry::build(RegistryKind::Characteristic, &entries);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.by_code("0x2A00").unwrap().name, "Third");
        // Short-name index still keeps the first writer
        assert_eq!(registry.by_short_name("first").unwrap().name, "First");
        assert_eq!(conflicts.entries(), ["characteristic name conflict: first"]);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let entries = vec![
            entry("org.bluetooth.service.device_information", "Device Information", "0x180A"),
            entry("org.bluetooth.service.battery_service", "Battery Service", "0x180F"),
            entry("vendor.battery_service", "Vendor Battery", "0xFE00"),
        ];

        let (first, first_conflicts) = Registry::build(RegistryKind::Service, &entries);
        let (second, second_conflicts) = Registry::build(RegistryKind::Service, &entries);

        assert_eq!(first_conflicts, second_conflicts);
        for id in [
            Identifier::from(0x180Au16),
            Identifier::from(0x180Fu16),
            Identifier::from(0xFE00u16),
            Identifier::from(0x1234u16),
            Identifier::parse("battery_service"),
            Identifier::parse("device_information"),
            Identifier::parse("0000180f-0000-1000-8000-00805f9b34fb"),
        ] {
            assert_eq!(first.resolve_name(&id), second.resolve_name(&id));
        }
    }

    #[test]
    fn test_lookup_follows_short_name() {
        let entries = vec![entry(
            "org.bluetooth.service.device_information",
            "Device Information",
            "0x180A",
        )];
        let (registry, _) = Registry::build(RegistryKind::Service, &entries);

        let item = registry.lookup(&Identifier::parse("device_information")).unwrap();
        assert_eq!(item.code, "0x180A");
        assert_eq!(item.short_id, "device_information");
        assert!(registry.lookup(&Identifier::parse("heart_rate")).is_none());
    }

    #[test]
    fn test_code_of_prefers_registered_code() {
        let entries = vec![entry(
            "org.bluetooth.service.battery_service",
            "Battery Service",
            "0x180F",
        )];
        let (registry, _) = Registry::build(RegistryKind::Service, &entries);

        assert_eq!(registry.code_of(&Identifier::parse("battery_service")), "0x180F");
        assert_eq!(
            registry.code_of(&Identifier::parse("0000180f-0000-1000-8000-00805f9b34fb")),
            "0x180F"
        );
        assert_eq!(registry.code_of(&Identifier::from(0x1234u16)), "0x1234");
        assert_eq!(registry.code_of(&Identifier::parse("heart_rate")), "heart_rate");
    }

    #[test]
    fn test_items_sorted_by_code() {
        let entries = vec![
            entry("a.second", "Second", "0x2A01"),
            entry("a.first", "First", "0x2A00"),
        ];
        let (registry, _) = Registry::build(RegistryKind::Characteristic, &entries);
        let codes: Vec<_> = registry.items().iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, ["0x2A00", "0x2A01"]);
    }
}
