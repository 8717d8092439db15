//! Accessory types: device observations, identities and accessory records

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::CoreError;

/// Namespace for name-based accessory identities.
///
/// Changing this value changes every identity and orphans all cached accessories.
pub const IDENTITY_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1e, 0x3a, 0x52, 0x0c, 0x4d, 0x4f, 0x1b, 0x9a, 0x27, 0x5d, 0x8e, 0x31, 0xc2, 0x70, 0x04,
]);

/// Context key holding the device snapshot
pub const DEVICE_CONTEXT_KEY: &str = "device";

/// A single sighting of a physical device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceObservation {
    /// Stable hardware identifier (e.g. MAC address)
    #[serde(rename = "id")]
    pub identifier: String,
    /// Human-readable device name
    #[serde(rename = "name")]
    pub display_name: String,
    /// Device category tags, e.g. "HAIKU,LIGHT"
    #[serde(rename = "type")]
    pub kind: String,
}

impl DeviceObservation {
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            kind: kind.into(),
        }
    }

    /// Device snapshot as stored in an accessory's context
    pub fn snapshot(&self) -> Value {
        json!({
            "name": self.display_name,
            "type": self.kind,
            "id": self.identifier,
        })
    }

    /// Category implied by the observation's kind tags
    pub fn category(&self) -> AccessoryCategory {
        AccessoryCategory::from_kind(&self.kind)
    }
}

/// Deterministic accessory identity derived from a device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessoryId(pub Uuid);

impl AccessoryId {
    /// Derive the identity for a device identifier.
    ///
    /// Identifiers must be non-empty and free of control characters. The same
    /// identifier always yields the same identity.
    pub fn from_identifier(identifier: &str) -> Result<Self, CoreError> {
        if identifier.trim().is_empty() || identifier.chars().any(char::is_control) {
            return Err(CoreError::InvalidIdentifier(identifier.to_string()));
        }
        Ok(Self(Uuid::new_v5(&IDENTITY_NAMESPACE, identifier.as_bytes())))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for AccessoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Accessory category, as presented to the home-automation host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessoryCategory {
    Other,
    Fan,
    Lightbulb,
    Switch,
    Sensor,
}

impl Default for AccessoryCategory {
    fn default() -> Self {
        Self::Other
    }
}

impl AccessoryCategory {
    /// Map a comma-separated kind tag list (e.g. "HAIKU,LIGHT") to a category.
    ///
    /// Tags are matched case-insensitively; lights take precedence over fans
    /// since Haiku fans with a light kit report both.
    pub fn from_kind(kind: &str) -> Self {
        let tags: Vec<String> = kind
            .split(',')
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty())
            .collect();
        let has = |tag: &str| tags.iter().any(|t| t == tag);

        if has("LIGHT") {
            Self::Lightbulb
        } else if has("FAN") {
            Self::Fan
        } else if has("SWITCH") {
            Self::Switch
        } else if has("SENSOR") {
            Self::Sensor
        } else {
            Self::Other
        }
    }

    /// HomeKit accessory category code
    pub fn hap_code(&self) -> u8 {
        match self {
            Self::Other => 1,
            Self::Fan => 3,
            Self::Lightbulb => 5,
            Self::Switch => 8,
            Self::Sensor => 10,
        }
    }
}

/// A registered accessory, addressed by its identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryRecord {
    pub identity: AccessoryId,
    pub display_name: String,
    pub category: AccessoryCategory,
    /// Opaque per-accessory data; the device snapshot lives under `"device"`
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl AccessoryRecord {
    /// Allocate a record with an empty context.
    ///
    /// Reconciliation never calls this directly; records are allocated through
    /// [`AccessoryHost::create_accessory_record`](crate::AccessoryHost::create_accessory_record).
    pub fn new(identity: AccessoryId, display_name: String, category: AccessoryCategory) -> Self {
        Self {
            identity,
            display_name,
            category,
            context: Map::new(),
        }
    }

    /// Overwrite the device snapshot with the given observation (last one wins)
    pub fn refresh_device(&mut self, observation: &DeviceObservation) {
        self.context
            .insert(DEVICE_CONTEXT_KEY.to_string(), observation.snapshot());
    }

    /// The stored device snapshot, if any
    pub fn device(&self) -> Option<DeviceObservation> {
        self.context
            .get(DEVICE_CONTEXT_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for AccessoryRecord {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for AccessoryRecord {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_deterministic() {
        let a = AccessoryId::from_identifier("20:F8:5E:E2:4C:98").unwrap();
        let b = AccessoryId::from_identifier("20:F8:5E:E2:4C:98").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 5);
    }

    #[test]
    fn test_identity_differs_per_identifier() {
        let a = AccessoryId::from_identifier("20:F8:5E:E2:4C:98").unwrap();
        let b = AccessoryId::from_identifier("20:F8:5E:E2:4D:80").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_identity_rejects_malformed() {
        assert!(matches!(
            AccessoryId::from_identifier(""),
            Err(CoreError::InvalidIdentifier(_))
        ));
        assert!(AccessoryId::from_identifier("   ").is_err());
        assert!(AccessoryId::from_identifier("20:F8\n").is_err());
    }

    #[test]
    fn test_category_from_kind() {
        assert_eq!(AccessoryCategory::from_kind("HAIKU,LIGHT"), AccessoryCategory::Lightbulb);
        assert_eq!(AccessoryCategory::from_kind("FAN,HAIKU"), AccessoryCategory::Fan);
        assert_eq!(AccessoryCategory::from_kind("fan, light"), AccessoryCategory::Lightbulb);
        assert_eq!(AccessoryCategory::from_kind("SWITCH"), AccessoryCategory::Switch);
        assert_eq!(AccessoryCategory::from_kind(""), AccessoryCategory::Other);
        assert_eq!(AccessoryCategory::Lightbulb.hap_code(), 5);
    }

    #[test]
    fn test_refresh_device_overwrites_snapshot() {
        let id = AccessoryId::from_identifier("20:F8:5E:E2:4C:98").unwrap();
        let mut record = AccessoryRecord::new(id, "Light".to_string(), AccessoryCategory::Lightbulb);
        record.context.insert("brightness".to_string(), json!(40));

        record.refresh_device(&DeviceObservation::new("20:F8:5E:E2:4C:98", "Old", "LIGHT"));
        record.refresh_device(&DeviceObservation::new("20:F8:5E:E2:4C:98", "New", "HAIKU,LIGHT"));

        let device = record.device().unwrap();
        assert_eq!(device.display_name, "New");
        assert_eq!(device.kind, "HAIKU,LIGHT");
        assert_eq!(record.context["brightness"], json!(40));
    }
}
