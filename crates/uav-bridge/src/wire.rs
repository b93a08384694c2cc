//! Wire value model and record codec.
//!
//! Every message crossing the RPC boundary is a map of field name to
//! value. [`WireValue`] is the self-describing value type;
//! [`WireRecord`] is the per-message schema seam that replaces runtime
//! field introspection with an explicit field list per record type.
//!
//! Decode contract: unknown keys are ignored for forward compatibility,
//! a field that fails to decode is logged and skipped rather than
//! aborting the message, and missing keys leave the default value.

use std::fmt;

use serde::de::{Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{BridgeError, Result};

// =============================================================================
// WIRE VALUE
// =============================================================================

/// One value in a wire message: a primitive, an ordered sequence, or a
/// nested field map. Maps preserve insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WireValue {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<WireValue>),
    Map(Vec<(String, WireValue)>),
}

impl WireValue {
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric accessor: integers widen to floats, since the engine is
    /// free to send either encoding for numeric fields.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|f| f as f32)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_seq(&self) -> Option<&[WireValue]> {
        match self {
            Self::Seq(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&[(String, WireValue)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a field in a map value. First match wins.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&WireValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Flat f32 sequence, used for point clouds.
    #[must_use]
    pub fn as_f32_seq(&self) -> Option<Vec<f32>> {
        self.as_seq()?.iter().map(WireValue::as_f32).collect()
    }

    /// Flat i32 sequence, used for segmentation ids.
    #[must_use]
    pub fn as_i32_seq(&self) -> Option<Vec<i32>> {
        self.as_seq()?
            .iter()
            .map(|v| v.as_i64().and_then(|i| i32::try_from(i).ok()))
            .collect()
    }
}

impl From<bool> for WireValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for WireValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for WireValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<f32> for WireValue {
    fn from(f: f32) -> Self {
        Self::Float(f64::from(f))
    }
}

impl From<&str> for WireValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for WireValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl Serialize for WireValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Nil => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

struct WireValueVisitor;

impl<'de> Visitor<'de> for WireValueVisitor {
    type Value = WireValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a wire value")
    }

    fn visit_unit<E>(self) -> std::result::Result<WireValue, E> {
        Ok(WireValue::Nil)
    }

    fn visit_none<E>(self) -> std::result::Result<WireValue, E> {
        Ok(WireValue::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<WireValue, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_bool<E>(self, b: bool) -> std::result::Result<WireValue, E> {
        Ok(WireValue::Bool(b))
    }

    fn visit_i64<E>(self, i: i64) -> std::result::Result<WireValue, E> {
        Ok(WireValue::Int(i))
    }

    fn visit_u64<E>(self, u: u64) -> std::result::Result<WireValue, E> {
        Ok(i64::try_from(u).map_or(WireValue::Float(u as f64), WireValue::Int))
    }

    fn visit_f64<E>(self, f: f64) -> std::result::Result<WireValue, E> {
        Ok(WireValue::Float(f))
    }

    fn visit_str<E>(self, s: &str) -> std::result::Result<WireValue, E> {
        Ok(WireValue::Str(s.to_string()))
    }

    fn visit_string<E>(self, s: String) -> std::result::Result<WireValue, E> {
        Ok(WireValue::Str(s))
    }

    fn visit_bytes<E>(self, bytes: &[u8]) -> std::result::Result<WireValue, E> {
        Ok(WireValue::Seq(
            bytes.iter().map(|b| WireValue::Int(i64::from(*b))).collect(),
        ))
    }

    fn visit_seq<A: SeqAccess<'de>>(
        self,
        mut seq: A,
    ) -> std::result::Result<WireValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(WireValue::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(
        self,
        mut map: A,
    ) -> std::result::Result<WireValue, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, WireValue>()? {
            entries.push((key, value));
        }
        Ok(WireValue::Map(entries))
    }
}

impl<'de> Deserialize<'de> for WireValue {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<WireValue, D::Error> {
        deserializer.deserialize_any(WireValueVisitor)
    }
}

// =============================================================================
// RECORD CODEC
// =============================================================================

/// Result of applying one wire field to a record under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    /// The field decoded and was stored.
    Applied,
    /// The record has no field with this name; ignored.
    Unknown,
    /// The value had the wrong shape; skipped and logged by the decoder.
    Invalid { expected: &'static str },
}

/// Explicit schema for one message type: an ordered field list for
/// encoding and a per-field application step for decoding.
pub trait WireRecord: Default {
    /// Record name used in decode diagnostics.
    const RECORD_NAME: &'static str;

    /// Fields in wire order.
    fn fields(&self) -> Vec<(&'static str, WireValue)>;

    /// Apply one incoming field. Must not touch other fields.
    fn apply_field(&mut self, key: &str, value: &WireValue) -> FieldOutcome;
}

/// Encode a record into its map-of-fields wire shape.
pub fn encode_record<R: WireRecord>(record: &R) -> WireValue {
    WireValue::Map(
        record
            .fields()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    )
}

/// Decode a wire map into a record, starting from the default value.
///
/// Per-field failures are recoverable: the field is skipped with a WARN
/// and decoding continues. Only a non-map payload fails the call.
///
/// # Errors
///
/// Returns [`BridgeError::MalformedPayload`] when `value` is not a map.
pub fn decode_record<R: WireRecord>(value: &WireValue) -> Result<R> {
    let Some(entries) = value.as_map() else {
        return Err(BridgeError::MalformedPayload(format!(
            "{} payload is not a field map",
            R::RECORD_NAME
        )));
    };

    let mut record = R::default();
    for (key, field_value) in entries {
        match record.apply_field(key, field_value) {
            FieldOutcome::Applied => {}
            FieldOutcome::Unknown => {
                trace!(record = R::RECORD_NAME, field = %key, "ignoring unknown field");
            }
            FieldOutcome::Invalid { expected } => {
                warn!(
                    record = R::RECORD_NAME,
                    field = %key,
                    expected,
                    "skipping field that failed to decode"
                );
            }
        }
    }
    Ok(record)
}

/// Decode a nested record field, folding shape errors into a
/// [`FieldOutcome`] so the parent record keeps decoding.
pub fn apply_nested<R: WireRecord>(slot: &mut R, value: &WireValue) -> FieldOutcome {
    match decode_record::<R>(value) {
        Ok(decoded) => {
            *slot = decoded;
            FieldOutcome::Applied
        }
        Err(_) => FieldOutcome::Invalid { expected: "map" },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> WireValue {
        WireValue::Map(vec![
            ("x_val".to_string(), WireValue::Float(1.5)),
            ("y_val".to_string(), WireValue::Float(-2.0)),
            ("count".to_string(), WireValue::Int(7)),
            ("name".to_string(), WireValue::Str("lidar".into())),
            ("ok".to_string(), WireValue::Bool(true)),
            (
                "cloud".to_string(),
                WireValue::Seq(vec![WireValue::Float(0.0), WireValue::Float(1.0)]),
            ),
        ])
    }

    #[test]
    fn test_msgpack_roundtrip() {
        let original = sample_map();
        let bytes = rmp_serde::to_vec(&original).unwrap();
        let decoded: WireValue = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_map_preserves_order() {
        let bytes = rmp_serde::to_vec(&sample_map()).unwrap();
        let decoded: WireValue = rmp_serde::from_slice(&bytes).unwrap();
        let keys: Vec<&str> = decoded
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, ["x_val", "y_val", "count", "name", "ok", "cloud"]);
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(WireValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(WireValue::Float(3.5).as_i64(), None);
    }

    #[test]
    fn test_get_first_match() {
        let map = sample_map();
        assert_eq!(map.get("count"), Some(&WireValue::Int(7)));
        assert_eq!(map.get("missing"), None);
    }

    #[derive(Debug, Default, PartialEq)]
    struct TestRecord {
        x: f64,
        label: String,
    }

    impl WireRecord for TestRecord {
        const RECORD_NAME: &'static str = "TestRecord";

        fn fields(&self) -> Vec<(&'static str, WireValue)> {
            vec![
                ("x", WireValue::Float(self.x)),
                ("label", WireValue::Str(self.label.clone())),
            ]
        }

        fn apply_field(&mut self, key: &str, value: &WireValue) -> FieldOutcome {
            match key {
                "x" => match value.as_f64() {
                    Some(x) => {
                        self.x = x;
                        FieldOutcome::Applied
                    }
                    None => FieldOutcome::Invalid { expected: "float" },
                },
                "label" => match value.as_str() {
                    Some(s) => {
                        self.label = s.to_string();
                        FieldOutcome::Applied
                    }
                    None => FieldOutcome::Invalid { expected: "string" },
                },
                _ => FieldOutcome::Unknown,
            }
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let record = TestRecord {
            x: 4.25,
            label: "alpha".into(),
        };
        let decoded: TestRecord = decode_record(&encode_record(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let wire = WireValue::Map(vec![
            ("x".to_string(), WireValue::Float(1.0)),
            ("added_in_v2".to_string(), WireValue::Bool(true)),
        ]);
        let decoded: TestRecord = decode_record(&wire).unwrap();
        assert_eq!(decoded.x, 1.0);
        assert_eq!(decoded.label, "");
    }

    #[test]
    fn test_bad_field_skipped_not_fatal() {
        let wire = WireValue::Map(vec![
            ("x".to_string(), WireValue::Str("not a number".into())),
            ("label".to_string(), WireValue::Str("beta".into())),
        ]);
        let decoded: TestRecord = decode_record(&wire).unwrap();
        // Bad field keeps its default, good field still lands.
        assert_eq!(decoded.x, 0.0);
        assert_eq!(decoded.label, "beta");
    }

    #[test]
    fn test_non_map_payload_rejected() {
        let err = decode_record::<TestRecord>(&WireValue::Int(1)).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedPayload(_)));
    }
}
