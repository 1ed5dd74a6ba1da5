//! Canonical ingested record model.
//!
//! The backend emits records under several naming conventions (snake_case and
//! camelCase, `data` vs `raw_response`). All of that is absorbed here, at the
//! boundary: `RawRecord` is the serde view of the wire shape, and
//! `IngestedRecord::from_raw` produces the one canonical internal shape that
//! the rest of the engine operates on. Normalization never fails: malformed
//! records degrade to placeholder display values and are logged at debug only.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Display placeholder for a missing price field.
pub const PLACEHOLDER_PRICE: &str = "-";
/// Display placeholder for a missing exchange or instrument field.
pub const PLACEHOLDER_FIELD: &str = "unknown";

/// The stable identity of an ingested record.
///
/// Two records with an equal key are the same logical event; the
/// later-arriving one wins with a full replace.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(val: impl Into<String>) -> Self {
        Self(val.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The wire shape of a record arriving from the push channel or a pull batch.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RawRecord {
    /// The message type field; `connected` and `ping` are reserved control values.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "sourceId")]
    pub source_id: Option<String>,
    #[serde(default, alias = "connectorId")]
    pub connector_id: Option<String>,
    /// Produced either as a string or a number depending on the backend path.
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub instrument: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    /// Processed payload, or the raw response when processing was skipped.
    #[serde(default, alias = "raw_response", alias = "rawResponse")]
    pub data: Option<Value>,
    #[serde(default, alias = "messageType")]
    pub message_type: Option<String>,
    #[serde(default, alias = "statusCode")]
    pub status_code: Option<u16>,
    #[serde(default, alias = "responseTimeMs")]
    pub response_time_ms: Option<u64>,
}

/// One canonical unit of data attributed to a connector.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IngestedRecord {
    /// The derived dedup key of this record.
    pub key: RecordKey,
    /// The point at which the record was produced, as reported by the backend.
    pub timestamp: String,
    pub exchange: String,
    pub instrument: String,
    /// Display-formatted price; `-` when the backend omitted the field.
    pub price: String,
    /// The processed or raw payload columns.
    pub payload: Value,
    pub message_type: Option<String>,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
}

impl IngestedRecord {
    /// Normalize a raw wire record into the canonical internal shape.
    ///
    /// Never fails: missing fields degrade to placeholder display values so
    /// ingestion can never throw a malformed record away.
    pub fn from_raw(raw: RawRecord, connector_id: &str) -> Self {
        let key = identity_of(&raw, connector_id);
        if raw.price.is_none() || raw.instrument.is_none() {
            tracing::debug!(key = %key, "record is missing price or instrument fields, degrading to placeholders");
        }
        Self {
            key,
            timestamp: raw.timestamp.as_ref().and_then(value_display).unwrap_or_default(),
            exchange: raw.exchange.unwrap_or_else(|| PLACEHOLDER_FIELD.into()),
            instrument: raw.instrument.unwrap_or_else(|| PLACEHOLDER_FIELD.into()),
            price: raw.price.as_ref().and_then(value_display).unwrap_or_else(|| PLACEHOLDER_PRICE.into()),
            payload: raw.data.unwrap_or(Value::Null),
            message_type: raw.message_type,
            status_code: raw.status_code,
            response_time_ms: raw.response_time_ms,
        }
    }
}

/// Compute the stable identity of a record.
///
/// Uses the record's `id` when present and non-empty; else the `source_id`
/// (falling back to the connector ID) concatenated with the record timestamp.
/// When no identity-bearing field exists at all, a random key is generated so
/// that inserts can never collide spuriously. Always returns a key.
pub fn identity_of(raw: &RawRecord, connector_id: &str) -> RecordKey {
    if let Some(id) = raw.id.as_deref() {
        if !id.is_empty() {
            return RecordKey::new(id);
        }
    }
    if let Some(ts) = raw.timestamp.as_ref().and_then(value_display) {
        let source = raw.source_id.as_deref().filter(|val| !val.is_empty()).unwrap_or(connector_id);
        return RecordKey::new(format!("{}:{}", source, ts));
    }
    RecordKey::new(Uuid::new_v4().to_string())
}

/// Render a scalar JSON value for display, if it is displayable.
fn value_display(val: &Value) -> Option<String> {
    match val {
        Value::String(inner) => Some(inner.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: Option<&str>, source_id: Option<&str>, timestamp: Option<Value>) -> RawRecord {
        RawRecord {
            id: id.map(String::from),
            source_id: source_id.map(String::from),
            timestamp,
            ..Default::default()
        }
    }

    #[test]
    fn identity_prefers_id_field() {
        let key = identity_of(&raw(Some("rec-1"), Some("src"), Some(json!(100))), "conn");
        assert_eq!(key.as_str(), "rec-1", "expected id field to win, got {}", key);
    }

    #[test]
    fn identity_falls_back_to_source_and_timestamp() {
        let key = identity_of(&raw(None, Some("src"), Some(json!(100))), "conn");
        assert_eq!(key.as_str(), "src:100", "expected source+timestamp composite, got {}", key);
    }

    #[test]
    fn identity_empty_id_treated_as_missing() {
        let key = identity_of(&raw(Some(""), None, Some(json!("2024-01-01T00:00:00Z"))), "conn-7");
        assert_eq!(key.as_str(), "conn-7:2024-01-01T00:00:00Z", "expected connector id fallback, got {}", key);
    }

    #[test]
    fn identity_generates_unique_fallback_keys() {
        let a = identity_of(&raw(None, None, None), "conn");
        let b = identity_of(&raw(None, None, None), "conn");
        assert_ne!(a, b, "expected random fallback keys to never collide, got {} twice", a);
    }

    #[test]
    fn malformed_record_degrades_to_placeholders() {
        let rec = IngestedRecord::from_raw(raw(Some("rec-1"), None, None), "conn");
        assert_eq!(rec.price, PLACEHOLDER_PRICE, "expected price placeholder, got {}", rec.price);
        assert_eq!(rec.instrument, PLACEHOLDER_FIELD, "expected instrument placeholder, got {}", rec.instrument);
        assert_eq!(rec.exchange, PLACEHOLDER_FIELD, "expected exchange placeholder, got {}", rec.exchange);
    }

    #[test]
    fn camel_case_wire_variant_is_absorbed() {
        let raw: RawRecord = serde_json::from_value(json!({
            "type": "data",
            "sourceId": "binance",
            "connectorId": "conn-1",
            "timestamp": 1700000000,
            "instrument": "BTC-USD",
            "price": 42000.5,
            "rawResponse": {"ok": true},
            "responseTimeMs": 12,
        }))
        .expect("wire variant must deserialize");
        let rec = IngestedRecord::from_raw(raw, "conn-1");
        assert_eq!(rec.key.as_str(), "binance:1700000000", "unexpected key {}", rec.key);
        assert_eq!(rec.price, "42000.5", "unexpected price {}", rec.price);
        assert_eq!(rec.payload, json!({"ok": true}), "unexpected payload {}", rec.payload);
        assert_eq!(rec.response_time_ms, Some(12), "unexpected response time {:?}", rec.response_time_ms);
    }
}
