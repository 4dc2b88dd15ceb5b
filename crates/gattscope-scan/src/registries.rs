//! Service and characteristic registries shared by scans
//!
//! The service registry is built when the set is created. The characteristic
//! registry is built the first time a scan needs it. Both live behind an
//! `Arc` so a reload can build a fresh registry and swap the pointer while
//! earlier resolutions keep reading the old one.

use gattscope_core::{
    resolve_name, ConflictLog, DatasetError, DatasetSource, Identifier, Registry, RegistryEntry,
    RegistryKind,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// A built registry together with the conflicts found while building it
#[derive(Debug, Clone)]
pub struct LoadedRegistry {
    pub registry: Arc<Registry>,
    pub conflicts: Arc<ConflictLog>,
}

impl LoadedRegistry {
    fn new((registry, conflicts): (Registry, ConflictLog)) -> Self {
        Self {
            registry: Arc::new(registry),
            conflicts: Arc::new(conflicts),
        }
    }
}

pub struct RegistrySet {
    services: RwLock<LoadedRegistry>,
    characteristics: RwLock<Option<LoadedRegistry>>,
    characteristic_source: DatasetSource,
}

impl RegistrySet {
    /// Build the service registry now and remember where characteristics come from
    pub fn new(
        service_source: &DatasetSource,
        characteristic_source: DatasetSource,
    ) -> Result<Self, DatasetError> {
        let services = LoadedRegistry::new(service_source.build(RegistryKind::Service)?);
        Ok(Self {
            services: RwLock::new(services),
            characteristics: RwLock::new(None),
            characteristic_source,
        })
    }

    /// Registries from the bundled datasets
    pub fn bundled() -> Result<Self, DatasetError> {
        Self::new(&DatasetSource::Bundled, DatasetSource::Bundled)
    }

    pub async fn services(&self) -> LoadedRegistry {
        self.services.read().await.clone()
    }

    /// The characteristic registry, `None` until it has been built
    pub async fn characteristics(&self) -> Option<LoadedRegistry> {
        self.characteristics.read().await.clone()
    }

    /// Build the characteristic registry if that has not happened yet
    pub async fn ensure_characteristics(&self) -> Result<LoadedRegistry, DatasetError> {
        if let Some(loaded) = self.characteristics.read().await.as_ref() {
            return Ok(loaded.clone());
        }

        let mut slot = self.characteristics.write().await;
        // Another task may have built it while we waited for the write lock
        if let Some(loaded) = slot.as_ref() {
            return Ok(loaded.clone());
        }

        let loaded = LoadedRegistry::new(self.characteristic_source.build(RegistryKind::Characteristic)?);
        *slot = Some(loaded.clone());
        Ok(loaded)
    }

    /// Replace a registry with one freshly built from `entries`
    pub async fn reload(&self, kind: RegistryKind, entries: &[RegistryEntry]) -> Arc<ConflictLog> {
        let loaded = LoadedRegistry::new(Registry::build(kind, entries));
        let conflicts = loaded.conflicts.clone();

        match kind {
            RegistryKind::Service => *self.services.write().await = loaded,
            RegistryKind::Characteristic => *self.characteristics.write().await = Some(loaded),
        }

        info!(kind = %kind, conflicts = conflicts.len(), "Registry reloaded");
        conflicts
    }

    /// Current registry for `kind`, if built
    pub async fn get(&self, kind: RegistryKind) -> Option<LoadedRegistry> {
        match kind {
            RegistryKind::Service => Some(self.services().await),
            RegistryKind::Characteristic => self.characteristics().await,
        }
    }

    /// Resolve against whatever registry is current for `kind`
    pub async fn resolve_name(&self, kind: RegistryKind, identifier: &Identifier) -> String {
        let loaded = self.get(kind).await;
        resolve_name(identifier, kind, loaded.as_ref().map(|l| l.registry.as_ref()))
    }

    /// Conflicts of every registry built so far, services first
    pub async fn conflicts(&self) -> Vec<String> {
        let mut all: Vec<String> = self.services().await.conflicts.entries().to_vec();
        if let Some(characteristics) = self.characteristics().await {
            all.extend(characteristics.conflicts.iter().cloned());
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_characteristics_are_lazy() {
        let set = RegistrySet::bundled().unwrap();
        let id = Identifier::from(0x2A29u16);

        assert!(set.characteristics().await.is_none());
        assert_eq!(
            set.resolve_name(RegistryKind::Characteristic, &id).await,
            "Unloaded characteristic.."
        );
        assert_eq!(
            set.resolve_name(RegistryKind::Service, &Identifier::from(0x180Au16)).await,
            "Device Information"
        );

        let first = set.ensure_characteristics().await.unwrap();
        let second = set.ensure_characteristics().await.unwrap();
        assert!(Arc::ptr_eq(&first.registry, &second.registry));
        assert_eq!(
            set.resolve_name(RegistryKind::Characteristic, &id).await,
            "Manufacturer Name String"
        );
    }

    #[tokio::test]
    async fn test_reload_swaps_without_mutating() {
        let set = RegistrySet::bundled().unwrap();
        let before = set.services().await;

        let entries = vec![
            RegistryEntry::new("x.alpha", "Alpha", "0x180A"),
            RegistryEntry::new("y.alpha", "Alpha Again", "0x180B"),
        ];
        let conflicts = set.reload(RegistryKind::Service, &entries).await;
        assert_eq!(conflicts.entries(), ["service name conflict: alpha"]);

        // The old snapshot is untouched
        assert_eq!(
            before.registry.resolve_name(&Identifier::from(0x180Au16)),
            "Device Information"
        );
        assert!(before.conflicts.is_empty());

        assert_eq!(
            set.resolve_name(RegistryKind::Service, &Identifier::from(0x180Au16)).await,
            "Alpha"
        );
        assert_eq!(set.conflicts().await, vec!["service name conflict: alpha".to_string()]);
    }
}
