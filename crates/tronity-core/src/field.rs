//! Declarative table of the telemetry fields a vehicle reports.
//!
//! Observers are built from this table rather than one type per field, so
//! the key an observer reads is always the key it is described by.

use serde::Serialize;

/// Kind of physical quantity a field measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Distance (odometer, range)
    Distance,
    /// State of charge
    Battery,
    /// Electrical power
    Power,
    /// Time span
    Duration,
    /// One of a fixed set of options
    Enum,
}

impl DeviceClass {
    /// Snake-case name, as serialized.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::Battery => "battery",
            Self::Power => "power",
            Self::Duration => "duration",
            Self::Enum => "enum",
        }
    }
}

/// How a numeric field evolves over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    /// Instantaneous reading
    Measurement,
    /// Counter that only grows
    TotalIncreasing,
}

impl StateClass {
    /// Snake-case name, as serialized.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Measurement => "measurement",
            Self::TotalIncreasing => "total_increasing",
        }
    }
}

/// Metadata for one telemetry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Key in the `last_record` body
    pub key: &'static str,
    /// Unit of measurement
    pub unit: Option<&'static str>,
    /// Device class
    pub device_class: Option<DeviceClass>,
    /// State class
    pub state_class: Option<StateClass>,
    /// Display icon
    pub icon: Option<&'static str>,
}

/// Key of the latitude field.
pub const LATITUDE: &str = "latitude";
/// Key of the longitude field.
pub const LONGITUDE: &str = "longitude";

/// Every field exposed as an observer.
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "odometer",
        unit: Some("km"),
        device_class: Some(DeviceClass::Distance),
        state_class: Some(StateClass::TotalIncreasing),
        icon: Some("mdi:speedometer"),
    },
    FieldSpec {
        key: "range",
        unit: Some("km"),
        device_class: Some(DeviceClass::Distance),
        state_class: Some(StateClass::Measurement),
        icon: Some("mdi:gas-station"),
    },
    FieldSpec {
        key: "level",
        unit: Some("%"),
        device_class: Some(DeviceClass::Battery),
        state_class: Some(StateClass::Measurement),
        icon: None,
    },
    FieldSpec {
        key: "charging",
        unit: None,
        device_class: None,
        state_class: None,
        icon: Some("mdi:battery-charging"),
    },
    FieldSpec {
        key: "plugged",
        unit: None,
        device_class: Some(DeviceClass::Enum),
        state_class: None,
        icon: Some("mdi:power-plug"),
    },
    FieldSpec {
        key: "chargerPower",
        unit: Some("kW"),
        device_class: Some(DeviceClass::Power),
        state_class: Some(StateClass::Measurement),
        icon: None,
    },
    FieldSpec {
        key: "chargeRemainingTime",
        unit: Some("s"),
        device_class: Some(DeviceClass::Duration),
        state_class: Some(StateClass::Measurement),
        icon: None,
    },
    FieldSpec {
        key: LATITUDE,
        unit: Some("°"),
        device_class: None,
        state_class: None,
        icon: Some("mdi:map"),
    },
    FieldSpec {
        key: LONGITUDE,
        unit: Some("°"),
        device_class: None,
        state_class: None,
        icon: Some("mdi:map"),
    },
];

/// Look up the metadata of a field by key.
#[must_use]
pub fn field_spec(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|spec| spec.key == key)
}
