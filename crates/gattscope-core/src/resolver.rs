//! Name resolution against a built registry
//!
//! Resolution never fails. It yields one of three things: the registered
//! name, the kind's unknown sentinel, or the kind's unloaded sentinel.

use crate::identifier::Identifier;
use crate::registry::{Registry, RegistryKind};

/// Canonical by-code key for an identifier.
///
/// Symbolic names are mapped through the short-name index; a name that is
/// not registered maps to the empty code so the by-code lookup misses.
pub(crate) fn canonical_code(identifier: &Identifier, registry: &Registry) -> String {
    let key = identifier.normalize();
    if identifier.is_code() {
        return key;
    }
    registry
        .by_short_name(&key)
        .map(|item| item.code.clone())
        .unwrap_or_default()
}

/// Resolve an identifier to a display name.
///
/// `registry` is `None` while the registry for `kind` has not been built.
/// A registry that is given decides the sentinel wording through its own kind.
pub fn resolve_name(identifier: &Identifier, kind: RegistryKind, registry: Option<&Registry>) -> String {
    let kind = registry.map_or(kind, Registry::kind);
    let registry = match registry {
        Some(registry) if !registry.is_empty() => registry,
        _ => return kind.unloaded_sentinel().to_string(),
    };

    let code = canonical_code(identifier, registry);
    registry
        .by_code(&code)
        .map(|item| item.name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(kind.unknown_sentinel())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryEntry;

    fn services() -> Registry {
        let entries = vec![
            RegistryEntry::new(
                "org.bluetooth.service.device_information",
                "Device Information",
                "0x180A",
            ),
            RegistryEntry::new("org.bluetooth.service.battery_service", "Battery Service", "0x180F"),
        ];
        Registry::build(RegistryKind::Service, &entries).0
    }

    #[test]
    fn test_unloaded_sentinel() {
        let id = Identifier::from(0x180Au16);
        assert_eq!(
            resolve_name(&id, RegistryKind::Service, None),
            "Unloaded service.."
        );
        assert_eq!(
            resolve_name(&id, RegistryKind::Characteristic, None),
            "Unloaded characteristic.."
        );

        let empty = Registry::empty(RegistryKind::Characteristic);
        assert_eq!(
            resolve_name(&id, RegistryKind::Characteristic, Some(&empty)),
            "Unloaded characteristic.."
        );
    }

    #[test]
    fn test_round_trip_device_information() {
        let registry = services();
        let loaded = Some(&registry);

        assert_eq!(
            resolve_name(&Identifier::from(0x180Au16), RegistryKind::Service, loaded),
            "Device Information"
        );
        assert_eq!(
            resolve_name(&Identifier::parse("device_information"), RegistryKind::Service, loaded),
            "Device Information"
        );
        assert_eq!(
            resolve_name(
                &Identifier::parse("0000180A-0000-1000-8000-00805F9B34FB"),
                RegistryKind::Service,
                loaded
            ),
            "Device Information"
        );
        assert_eq!(
            resolve_name(&Identifier::parse("0x180F"), RegistryKind::Service, loaded),
            "Battery Service"
        );
    }

    #[test]
    fn test_unknown_sentinel() {
        let registry = services();
        let loaded = Some(&registry);

        assert_eq!(
            resolve_name(&Identifier::from(0x1234u16), RegistryKind::Service, loaded),
            "Unknown service"
        );
        assert_eq!(
            resolve_name(&Identifier::parse("heart_rate"), RegistryKind::Service, loaded),
            "Unknown service"
        );
        assert_eq!(
            resolve_name(&Identifier::parse(""), RegistryKind::Service, loaded),
            "Unknown service"
        );
    }

    #[test]
    fn test_sentinel_follows_registry_kind() {
        let registry = services();
        assert_eq!(
            resolve_name(&Identifier::from(0x1234u16), RegistryKind::Characteristic, Some(&registry)),
            "Unknown service"
        );

        let empty = Registry::empty(RegistryKind::Service);
        assert_eq!(
            resolve_name(&Identifier::from(0x1234u16), RegistryKind::Characteristic, Some(&empty)),
            "Unloaded service.."
        );
    }
}
