//! GATT identifier normalization
//!
//! Peripherals and registries name services and characteristics in three
//! different ways: a numeric 16-bit (or 32-bit) alias, the full 128-bit UUID
//! text, or a symbolic name such as `device_information`. [`Identifier`]
//! classifies the raw form once at the boundary, and [`Identifier::normalize`]
//! reduces it to the canonical short hex key used by the registries.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Length of the canonical hyphenated UUID text (8-4-4-4-12 plus separators)
const HYPHENATED_UUID_LEN: usize = 36;

/// A service or characteristic identifier as supplied by a caller or a transport
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// Assigned-number alias, e.g. `0x180A`
    Numeric(u32),
    /// Full 128-bit UUID parsed from canonical hyphenated text
    Uuid(Uuid),
    /// Anything else: symbolic names, short hex strings, malformed UUIDs
    Symbolic(String),
}

impl Identifier {
    /// Classify a string identifier.
    ///
    /// Only strings that are exactly 36 characters long and in the hyphenated
    /// 8-4-4-4-12 hex form become [`Identifier::Uuid`]; braced, URN and simple
    /// UUID spellings stay symbolic.
    pub fn parse(text: &str) -> Self {
        if text.len() == HYPHENATED_UUID_LEN {
            if let Ok(uuid) = Uuid::try_parse(text) {
                return Self::Uuid(uuid);
            }
        }
        Self::Symbolic(text.to_string())
    }

    /// Canonical lookup key.
    ///
    /// Numeric aliases become `0x` plus uppercase hex at natural width, UUIDs
    /// become `0x` plus the four hex digits of the 16-bit alias embedded in
    /// the Bluetooth base UUID, and symbolic names pass through unchanged.
    pub fn normalize(&self) -> String {
        match self {
            Self::Numeric(code) => format!("0x{:X}", code),
            Self::Uuid(uuid) => format!("0x{:04X}", short_alias(uuid)),
            Self::Symbolic(name) => name.clone(),
        }
    }

    /// Whether this identifier normalizes to a hex code rather than a name
    pub fn is_code(&self) -> bool {
        self.normalize().starts_with("0x")
    }
}

/// Bits 96..112 of the UUID, i.e. characters 4..8 of its hyphenated text
fn short_alias(uuid: &Uuid) -> u16 {
    (uuid.as_u128() >> 96) as u16
}

/// Free-function form of [`Identifier::normalize`]
pub fn normalize(identifier: &Identifier) -> String {
    identifier.normalize()
}

/// Text form used in logs and reports.
///
/// UUIDs are always written in lowercase hyphenated form, whatever case
/// they were parsed from.
impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(code) => write!(f, "0x{:X}", code),
            Self::Uuid(uuid) => write!(f, "{}", uuid.hyphenated()),
            Self::Symbolic(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for Identifier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<u16> for Identifier {
    fn from(code: u16) -> Self {
        Self::Numeric(code.into())
    }
}

impl From<u32> for Identifier {
    fn from(code: u32) -> Self {
        Self::Numeric(code)
    }
}

impl From<Uuid> for Identifier {
    fn from(uuid: Uuid) -> Self {
        Self::Uuid(uuid)
    }
}

impl From<&str> for Identifier {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<String> for Identifier {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

/// On-disk form: configuration files may give either a number or a string
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawIdentifier {
    Numeric(u32),
    Text(String),
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Numeric(code) => RawIdentifier::Numeric(*code).serialize(serializer),
            other => RawIdentifier::Text(other.to_string()).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawIdentifier::deserialize(deserializer)? {
            RawIdentifier::Numeric(code) => Self::Numeric(code),
            RawIdentifier::Text(text) => Self::parse(&text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_normalization() {
        assert_eq!(Identifier::from(0x180Au16).normalize(), "0x180A");
        assert_eq!(Identifier::from(0x2A29u16).normalize(), "0x2A29");
        assert_eq!(Identifier::from(0x1u16).normalize(), "0x1");
        assert_eq!(Identifier::from(0u16).normalize(), "0x0");
        assert_eq!(Identifier::from(0xFEEDu32).normalize(), "0xFEED");
    }

    #[test]
    fn test_numeric_normalization_has_natural_width() {
        for code in (0..=u16::MAX).step_by(97) {
            let key = Identifier::from(code).normalize();
            let digits = key.strip_prefix("0x").unwrap();
            assert!(code == 0 || !digits.starts_with('0'), "padded key {}", key);
            assert_eq!(digits, digits.to_uppercase());
            assert_eq!(u16::from_str_radix(digits, 16).unwrap(), code);
        }
    }

    #[test]
    fn test_uuid_normalization() {
        let id = Identifier::parse("0000180a-0000-1000-8000-00805f9b34fb");
        assert!(matches!(id, Identifier::Uuid(_)));
        assert_eq!(id.normalize(), "0x180A");

        let id = Identifier::parse("00002A29-0000-1000-8000-00805F9B34FB");
        assert_eq!(id.normalize(), "0x2A29");

        // Leading zeros of the embedded alias are kept
        let id = Identifier::parse("00000001-0000-1000-8000-00805f9b34fb");
        assert_eq!(id.normalize(), "0x0001");

        // Vendor UUIDs still yield the digits at the alias offset
        let id = Identifier::parse("12345678-1234-5678-1234-56789abcdef0");
        assert_eq!(id.normalize(), "0x5678");
    }

    #[test]
    fn test_symbolic_passthrough() {
        for text in [
            "device_information",
            "battery_service",
            "0x180A",
            "",
            // 36 characters but not hyphenated hex
            "0000180a-0000-1000-8000-00805f9b34fg",
            "0000180a00000-1000-8000-00805f9b34fb",
            "device_information_device_informatio",
            // Valid UUID spellings that are not 36 characters long
            "0000180a00001000800000805f9b34fb",
            "{0000180a-0000-1000-8000-00805f9b34fb}",
            "urn:uuid:0000180a-0000-1000-8000-00805f9b34fb",
        ] {
            let id = Identifier::parse(text);
            assert!(matches!(id, Identifier::Symbolic(_)), "{} classified as {:?}", text, id);
            assert_eq!(id.normalize(), text);
        }
    }

    #[test]
    fn test_uuid_display_is_lowercase() {
        let id = Identifier::parse("00002A29-0000-1000-8000-00805F9B34FB");
        assert_eq!(id.to_string(), "00002a29-0000-1000-8000-00805f9b34fb");
        assert_eq!(
            serde_json::to_value(&id).unwrap(),
            serde_json::json!("00002a29-0000-1000-8000-00805f9b34fb")
        );
        assert_eq!(id.normalize(), "0x2A29");
    }

    #[test]
    fn test_is_code() {
        assert!(Identifier::from(0x180Au16).is_code());
        assert!(Identifier::parse("0x180A").is_code());
        assert!(!Identifier::parse("device_information").is_code());
    }

    #[test]
    fn test_serde_number_or_string() {
        let ids: Vec<Identifier> =
            serde_json::from_str(r#"[6154, "battery_service", "0000180f-0000-1000-8000-00805f9b34fb"]"#)
                .unwrap();
        assert_eq!(ids[0], Identifier::Numeric(0x180A));
        assert_eq!(ids[1], Identifier::Symbolic("battery_service".to_string()));
        assert_eq!(ids[2].normalize(), "0x180F");

        let json = serde_json::to_string(&ids).unwrap();
        assert_eq!(
            json,
            r#"[6154,"battery_service","0000180f-0000-1000-8000-00805f9b34fb"]"#
        );
    }
}
