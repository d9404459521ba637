//! Transaction records as delivered by the upstream producer

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A transaction to be scored.
///
/// Only `amount` feeds the model; `id` and `userId` are carried for the audit
/// trail. Any other field the producer sends is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Opaque transaction identifier
    #[serde(default, deserialize_with = "opaque_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Opaque user identifier
    #[serde(
        rename = "userId",
        default,
        deserialize_with = "opaque_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,

    /// Transaction amount; `None` when the field is absent or null
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
}

impl Transaction {
    /// Create a transaction with all audit fields populated
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, amount: f64) -> Self {
        Self {
            id: Some(id.into()),
            user_id: Some(user_id.into()),
            amount: Some(Amount::Number(amount)),
        }
    }

    /// Decode a raw message payload. The payload must be a JSON object.
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        match serde_json::from_slice::<Value>(payload)? {
            value @ Value::Object(_) => serde_json::from_value(value),
            other => Err(serde::de::Error::custom(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Numeric amount, if the transaction carries one
    pub fn amount_value(&self) -> Option<f64> {
        match self.amount {
            Some(Amount::Number(v)) => Some(v),
            _ => None,
        }
    }

    /// Identifier for logs, `"-"` when the producer did not send one
    pub fn id_or_unknown(&self) -> &str {
        self.id.as_deref().unwrap_or("-")
    }

    /// User identifier for logs, `"-"` when the producer did not send one
    pub fn user_or_unknown(&self) -> &str {
        self.user_id.as_deref().unwrap_or("-")
    }
}

/// Amount as it arrived on the wire.
///
/// Numbers and numeric strings coerce to [`Amount::Number`]; anything else is
/// kept verbatim so the extractor can reject it with context instead of the
/// whole payload failing to decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Amount {
    Number(f64),
    Unparsed(String),
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = match Value::deserialize(deserializer)? {
            Value::Number(n) => match n.as_f64() {
                Some(v) => Amount::Number(v),
                None => Amount::Unparsed(n.to_string()),
            },
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(v) => Amount::Number(v),
                Err(_) => Amount::Unparsed(s),
            },
            other => Amount::Unparsed(other.to_string()),
        };
        Ok(amount)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Amount::Number(v) => serializer.serialize_f64(*v),
            Amount::Unparsed(s) => serializer.serialize_str(s),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Identifiers are opaque: accept strings and numbers alike.
fn opaque_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
