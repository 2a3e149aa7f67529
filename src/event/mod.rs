mod representation;
mod types;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub use representation::{Representation, RepresentationError, VALUES_KEY};
pub use types::{OperationType, ResourceType};

/// Epoch milliseconds, as sent by Keycloak.
pub type Timestamp = i64;

/// Who triggered an admin event.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthDetails {
    #[serde(deserialize_with = "null_as_default")]
    pub realm_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub realm_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub client_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub user_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ip_address: String,
}

/// A Keycloak admin event as it arrives on the event stream.
///
/// Missing or `null` fields decode to their empty values, the way Keycloak's own
/// consumers treat them. Only a malformed `representation` or a type mismatch rejects
/// the event.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub time: Timestamp,
    #[serde(deserialize_with = "null_as_default")]
    pub realm_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub realm_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub auth_details: AuthDetails,
    #[serde(deserialize_with = "null_as_default")]
    pub resource_type: ResourceType,
    #[serde(deserialize_with = "null_as_default")]
    pub operation_type: OperationType,
    #[serde(deserialize_with = "null_as_default")]
    pub resource_path: String,
    /// `null` here means [`Representation::Absent`].
    pub representation: Representation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub details: Map<String, Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub resource_type_as_string: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Why a message payload could not be turned into an [`Event`].
#[derive(Debug, thiserror::Error, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DecodeError {
    /// The payload is not JSON at all, or is truncated.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Valid JSON that doesn't fit the event schema, including an unusable representation.
    #[error("payload is not a valid event: {0}")]
    InvalidEvent(#[source] serde_json::Error),
}

/// Decodes one message payload. All or nothing: any bad field rejects the whole event.
pub fn decode_event(payload: &[u8]) -> Result<Event, DecodeError> {
    serde_json::from_slice(payload).map_err(|error| match error.classify() {
        serde_json::error::Category::Data => DecodeError::InvalidEvent(error),
        _ => DecodeError::InvalidJson(error),
    })
}
