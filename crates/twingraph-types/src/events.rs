//! Change events delivered by the event source.
//!
//! The hub publishes two families of notifications: device lifecycle
//! events (identity created or deleted) and twin change events (patch or
//! full replacement of the twin document). Each event carries the twin
//! document as its payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire name of the device lifecycle message source.
pub const DEVICE_LIFECYCLE_EVENTS: &str = "deviceLifecycleEvents";

/// Wire name of the twin change message source.
pub const TWIN_CHANGE_EVENTS: &str = "twinChangeEvents";

/// The hub subsystem that produced an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageSource {
    /// `deviceLifecycleEvents`: device identity created or deleted.
    DeviceLifecycle,
    /// `twinChangeEvents`: twin document patched or replaced.
    TwinChange,
    /// Any source the engine does not handle.
    Other(String),
}

impl MessageSource {
    /// Parse the wire name of a message source.
    pub fn from_wire(value: &str) -> Self {
        match value {
            DEVICE_LIFECYCLE_EVENTS => Self::DeviceLifecycle,
            TWIN_CHANGE_EVENTS => Self::TwinChange,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The wire name of this message source.
    pub fn as_wire(&self) -> &str {
        match self {
            Self::DeviceLifecycle => DEVICE_LIFECYCLE_EVENTS,
            Self::TwinChange => TWIN_CHANGE_EVENTS,
            Self::Other(other) => other,
        }
    }
}

impl From<String> for MessageSource {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<MessageSource> for String {
    fn from(value: MessageSource) -> Self {
        value.as_wire().to_owned()
    }
}

impl core::fmt::Display for MessageSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// The operation an event reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    /// `createDeviceIdentity`: a device was provisioned.
    CreateDeviceIdentity,
    /// `deleteDeviceIdentity`: a device was deprovisioned.
    DeleteDeviceIdentity,
    /// `updateTwin`: the payload is a patch of the twin.
    UpdateTwin,
    /// `replaceTwin`: the payload is the full twin state.
    ReplaceTwin,
    /// Any operation the engine does not handle.
    Other(String),
}

impl OperationType {
    /// Parse the wire name of an operation type.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "createDeviceIdentity" => Self::CreateDeviceIdentity,
            "deleteDeviceIdentity" => Self::DeleteDeviceIdentity,
            "updateTwin" => Self::UpdateTwin,
            "replaceTwin" => Self::ReplaceTwin,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The wire name of this operation type.
    pub fn as_wire(&self) -> &str {
        match self {
            Self::CreateDeviceIdentity => "createDeviceIdentity",
            Self::DeleteDeviceIdentity => "deleteDeviceIdentity",
            Self::UpdateTwin => "updateTwin",
            Self::ReplaceTwin => "replaceTwin",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for OperationType {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<OperationType> for String {
    fn from(value: OperationType) -> Self {
        value.as_wire().to_owned()
    }
}

impl core::fmt::Display for OperationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// A single change notification as delivered by the event source.
///
/// The event source owns the event until it has been checkpointed; the
/// engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Name of the hub that owns the device.
    pub hub_name: String,
    /// Device (twin) id within the hub.
    pub device_id: String,
    /// Subsystem that produced the event.
    pub message_source: MessageSource,
    /// Reported operation.
    pub operation_type: OperationType,
    /// Twin document carried by the event.
    pub payload: serde_json::Value,
    /// Position of the event within its partition.
    pub sequence_offset: u64,
    /// When the event source accepted the event, if known.
    #[serde(default)]
    pub enqueued_at: Option<DateTime<Utc>>,
}

/// A twin as listed by the hub registry, used by the bulk sync path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwinSnapshot {
    /// Name of the hub that owns the device.
    pub hub_name: String,
    /// Device (twin) id within the hub.
    pub device_id: String,
    /// Full twin document.
    pub twin: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_wire_names_round_trip() {
        for name in [DEVICE_LIFECYCLE_EVENTS, TWIN_CHANGE_EVENTS] {
            assert_eq!(MessageSource::from_wire(name).as_wire(), name);
        }
        for name in ["createDeviceIdentity", "deleteDeviceIdentity", "updateTwin", "replaceTwin"] {
            assert_eq!(OperationType::from_wire(name).as_wire(), name);
        }
    }

    #[test]
    fn unknown_wire_names_are_preserved() {
        assert_eq!(
            MessageSource::from_wire("digitalTwinChangeEvents"),
            MessageSource::Other("digitalTwinChangeEvents".to_owned())
        );
        assert_eq!(
            OperationType::from_wire("connected"),
            OperationType::Other("connected".to_owned())
        );
    }

    #[test]
    fn change_event_deserializes_from_camel_case() {
        let json = serde_json::json!({
            "hubName": "hub",
            "deviceId": "t1",
            "messageSource": "twinChangeEvents",
            "operationType": "replaceTwin",
            "payload": {"version": 4},
            "sequenceOffset": 17
        });
        let event: Result<ChangeEvent, _> = serde_json::from_value(json);
        assert!(event.is_ok());
        if let Ok(event) = event {
            assert_eq!(event.message_source, MessageSource::TwinChange);
            assert_eq!(event.operation_type, OperationType::ReplaceTwin);
            assert_eq!(event.sequence_offset, 17);
            assert_eq!(event.enqueued_at, None);
        }
    }
}
