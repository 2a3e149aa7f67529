use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key under which a list payload appears in the mapping form.
pub const VALUES_KEY: &str = "values";

/// The `representation` payload of an admin event.
///
/// Keycloak emits this field as a JSON object, as a JSON array of objects, or as a
/// string holding either of those. Decoding settles on one of three shapes so that
/// handlers can match on them instead of probing keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Representation {
    #[default]
    Absent,
    /// The payload was a list of objects.
    ValueList(Vec<Map<String, Value>>),
    /// The payload was a single object.
    Fields(Map<String, Value>),
}

/// Payload shape that can't be turned into a [`Representation`].
#[derive(Debug, thiserror::Error)]
pub enum RepresentationError {
    #[error("expected an object, an array of objects or a string, found {0}")]
    UnexpectedShape(&'static str),

    #[error("string-wrapped representation is not valid JSON: {0}")]
    InvalidInnerJson(#[source] serde_json::Error),
}

impl Representation {
    /// Normalizes an already parsed JSON value.
    ///
    /// Precedence: array of objects, then string holding JSON, then object. `null`
    /// is absent.
    pub fn from_value(value: Value) -> Result<Self, RepresentationError> {
        match value {
            Value::Null => Ok(Self::Absent),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    // A null item keeps its slot as an empty object.
                    Value::Null => Ok(Map::new()),
                    other => Err(RepresentationError::UnexpectedShape(shape_name(&other))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::ValueList),
            Value::String(inner) => {
                let inner: Value =
                    serde_json::from_str(&inner).map_err(RepresentationError::InvalidInnerJson)?;
                Self::from_value(inner)
            }
            Value::Object(map) => Ok(Self::Fields(map)),
            other => Err(RepresentationError::UnexpectedShape(shape_name(&other))),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The mapping form: a list payload becomes `{"values": [...]}`.
    pub fn to_map(&self) -> Option<Map<String, Value>> {
        match self {
            Self::Absent => None,
            Self::ValueList(items) => {
                let values = items.iter().cloned().map(Value::Object).collect();
                Some(Map::from_iter([(VALUES_KEY.to_string(), Value::Array(values))]))
            }
            Self::Fields(fields) => Some(fields.clone()),
        }
    }

    /// Looks up a top-level field of an object payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Fields(fields) => fields.get(key),
            _ => None,
        }
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl<'de> Deserialize<'de> for Representation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Representation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}
