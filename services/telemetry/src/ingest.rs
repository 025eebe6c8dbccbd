use crate::error::{Result, TelemetryError};
use crate::query::{join_key, PathParams};
use serde_json::{Map, Value};

pub const PROJECT_ID: &str = "ProjectId";
pub const DEVICE_ID: &str = "DeviceId";
pub const LOCATION_ID: &str = "LocationId";
pub const EPOCH_TIME: &str = "EpochTime";
pub const PROJECT_DEVICE_KEY: &str = "ProjectId#DeviceId";
pub const PROJECT_LOCATION_KEY: &str = "ProjectId#LocationId";

/// Decode a request body into a JSON object
pub fn decode_body(body: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(TelemetryError::InvalidBody(
            "expected a JSON object".to_string(),
        )),
        Err(e) => Err(TelemetryError::InvalidBody(e.to_string())),
    }
}

/// Validate a reading and add the fields derived from the request path.
///
/// `EpochTime` and `DeviceId` must be supplied by the caller. `ProjectId`
/// always comes from the path, overriding anything in the body. Composite
/// index keys are never taken from the body: any supplied value is dropped and
/// only the keys derivable from the record's own fields are written.
pub fn prepare_record(
    mut record: Map<String, Value>,
    path: &PathParams,
) -> Result<Map<String, Value>> {
    if !record.contains_key(EPOCH_TIME) {
        return Err(TelemetryError::MissingField(EPOCH_TIME));
    }
    let device_id = match record.get(DEVICE_ID) {
        Some(device_id) => key_component(device_id),
        None => return Err(TelemetryError::MissingField(DEVICE_ID)),
    };

    let project_id = path.get(PROJECT_ID).cloned().unwrap_or_default();

    record.remove(PROJECT_DEVICE_KEY);
    record.remove(PROJECT_LOCATION_KEY);
    record.insert(
        PROJECT_DEVICE_KEY.to_string(),
        Value::String(join_key(&project_id, &device_id)),
    );
    if let Some(location_id) = record.get(LOCATION_ID).map(key_component) {
        record.insert(
            PROJECT_LOCATION_KEY.to_string(),
            Value::String(join_key(&project_id, &location_id)),
        );
    }
    record.insert(PROJECT_ID.to_string(), Value::String(project_id));

    Ok(record)
}

/// Text used for a field inside a composite key.
///
/// Strings are used as-is; any other value contributes its JSON text.
fn key_component(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
