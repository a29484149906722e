//! Location of a device inside the building topology.
//!
//! A [`Location`] with every field set is a relocation target. A location
//! with some fields missing is a patch: only its non-blank fields replace
//! the corresponding fields of the device's current location.

use serde::{Deserialize, Serialize};

/// A `{building, floor, room}` triple. All fields are optional.
///
/// `building` matches the `address` property of a building vertex,
/// `floor` and `room` match the `name` property of floor and room vertices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Building address.
    #[serde(default)]
    pub building: Option<String>,
    /// Floor name within the building.
    #[serde(default)]
    pub floor: Option<String>,
    /// Room name within the floor.
    #[serde(default)]
    pub room: Option<String>,
}

impl Location {
    /// Create a fully-specified location.
    pub fn new(building: &str, floor: &str, room: &str) -> Self {
        Self {
            building: Some(building.to_owned()),
            floor: Some(floor.to_owned()),
            room: Some(room.to_owned()),
        }
    }

    /// Overlay the non-blank fields of `patch` onto this location.
    ///
    /// Fields that are absent or whitespace-only in `patch` keep the
    /// value from `self`.
    #[must_use]
    pub fn overlay(&self, patch: &Self) -> Self {
        Self {
            building: pick(patch.building.as_ref(), self.building.as_ref()),
            floor: pick(patch.floor.as_ref(), self.floor.as_ref()),
            room: pick(patch.room.as_ref(), self.room.as_ref()),
        }
    }

    /// Return `(building, floor, room)` if all three fields are non-blank.
    pub fn complete(&self) -> Option<(&str, &str, &str)> {
        Some((
            non_blank(self.building.as_ref())?,
            non_blank(self.floor.as_ref())?,
            non_blank(self.room.as_ref())?,
        ))
    }
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "building: {}, floor: {}, room: {}",
            self.building.as_deref().unwrap_or_default(),
            self.floor.as_deref().unwrap_or_default(),
            self.room.as_deref().unwrap_or_default(),
        )
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}

fn pick(patch: Option<&String>, current: Option<&String>) -> Option<String> {
    non_blank(patch)
        .map(ToOwned::to_owned)
        .or_else(|| current.cloned())
}
