//! Field extraction from twin documents.
//!
//! A twin document looks like:
//!
//! ```json
//! {
//!   "version": 4,
//!   "properties": { "reported": { "temperature": 21.5 } },
//!   "tags": { "location": { "building": "43", "floor": "1", "room": "1R" } }
//! }
//! ```
//!
//! Fields of an unsupported shape are skipped with a warning rather than
//! failing the command.

use serde_json::Value;
use tracing::warn;
use twingraph_types::Location;

/// Path of the reported temperature in a twin document.
pub const TEMPERATURE_PATH: &str = "properties.reported.temperature";

/// Path of the location tag in a twin document.
pub const LOCATION_PATH: &str = "tags.location";

/// The reported temperature as a string.
///
/// Numbers and strings are accepted. Returns `None` if the field is
/// absent, blank, or of another kind (with a warning for the latter).
pub fn parse_reported_temperature(twin: &Value) -> Option<String> {
    let value = twin.pointer("/properties/reported/temperature")?;
    let temperature = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => {
            warn!(path = TEMPERATURE_PATH, value = %other, "invalid temperature format");
            return None;
        }
    };
    (!temperature.trim().is_empty()).then_some(temperature)
}

/// The tagged location.
///
/// Returns `None` if the tag is absent. A tag that is present but is not
/// an object yields an empty [`Location`] with a warning. Individual
/// fields may be strings or numbers; other kinds are dropped with a
/// warning.
pub fn parse_tagged_location(twin: &Value) -> Option<Location> {
    let value = twin.pointer("/tags/location")?;
    let Some(fields) = value.as_object() else {
        warn!(path = LOCATION_PATH, value = %value, "invalid location");
        return Some(Location::default());
    };

    let field = |name: &str| -> Option<String> {
        match fields.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Null => None,
            other => {
                warn!(path = LOCATION_PATH, field = name, value = %other, "invalid location field");
                None
            }
        }
    };

    Some(Location {
        building: field("building"),
        floor: field("floor"),
        room: field("room"),
    })
}

/// The twin document's `version`, if present as an integer.
///
/// Integer-valued strings are accepted as well.
pub fn parse_version(twin: &Value) -> Option<i64> {
    match twin.get("version")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn temperature_accepts_numbers_and_strings() {
        let twin = json!({"properties": {"reported": {"temperature": 21.5}}});
        assert_eq!(parse_reported_temperature(&twin).as_deref(), Some("21.5"));

        let twin = json!({"properties": {"reported": {"temperature": 20}}});
        assert_eq!(parse_reported_temperature(&twin).as_deref(), Some("20"));

        let twin = json!({"properties": {"reported": {"temperature": "warm"}}});
        assert_eq!(parse_reported_temperature(&twin).as_deref(), Some("warm"));
    }

    #[test]
    fn temperature_rejects_other_kinds() {
        assert_eq!(parse_reported_temperature(&json!({})), None);
        let twin = json!({"properties": {"reported": {"temperature": {"c": 20}}}});
        assert_eq!(parse_reported_temperature(&twin), None);
        let twin = json!({"properties": {"reported": {"temperature": true}}});
        assert_eq!(parse_reported_temperature(&twin), None);
        let twin = json!({"properties": {"reported": {"temperature": "  "}}});
        assert_eq!(parse_reported_temperature(&twin), None);
    }

    #[test]
    fn location_absent_is_none() {
        assert_eq!(parse_tagged_location(&json!({"tags": {}})), None);
        assert_eq!(parse_tagged_location(&json!({})), None);
    }

    #[test]
    fn malformed_location_is_empty() {
        let twin = json!({"tags": {"location": "building 43"}});
        assert_eq!(parse_tagged_location(&twin), Some(Location::default()));
    }

    #[test]
    fn location_fields_accept_numbers() {
        let twin = json!({"tags": {"location": {"building": 43, "floor": "1", "room": ["x"]}}});
        let location = parse_tagged_location(&twin);
        assert_eq!(
            location,
            Some(Location {
                building: Some("43".to_owned()),
                floor: Some("1".to_owned()),
                room: None,
            })
        );
    }

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version(&json!({"version": 7})), Some(7));
        assert_eq!(parse_version(&json!({"version": "8"})), Some(8));
        assert_eq!(parse_version(&json!({"version": 1.5})), None);
        assert_eq!(parse_version(&json!({})), None);
    }
}
