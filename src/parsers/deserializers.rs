use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::Value;

/// Naive layouts accepted after RFC3339 fails; interpreted as UTC
const NAIVE_FORMATS: &[&str] =
    &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Lenient timestamp deserializer for export messages.
///
/// Numbers are UNIX epoch seconds (fractional part kept); strings are parsed as
/// absolute date-times. Anything unparsable becomes `None` instead of an error
/// so the tree builder can drop the message without rejecting the export.
pub fn deserialize_lenient_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_timestamp_value(&value))
}

pub fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(epoch_seconds_to_datetime),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

fn epoch_seconds_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1_000_000_000.0).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Treat an explicit `null` like a missing field.
pub fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept strings, numbers and booleans as display names; anything else is `None`
pub fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Deserialize a JSON object into `(key, value)` pairs in document order.
///
/// Used for the ChatGPT `mapping` field where sibling order is the order in
/// which nodes appear in the export.
pub fn deserialize_ordered_map<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct OrderedMapVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of message nodes")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, T>()? {
                entries.push((key, value));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_any(OrderedMapVisitor(PhantomData))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    use super::*;
    use crate::models::{ChatGptConversation, ClaudeConversation, ClaudeMessage};

    #[test]
    fn test_epoch_seconds_with_fraction() {
        let ts = parse_timestamp_value(&json!(1700000000.5)).unwrap();
        assert_eq!(ts.timestamp(), 1700000000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_rfc3339_string() {
        let ts = parse_timestamp_value(&json!("2024-03-15T10:30:00.123456Z")).unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 3, 15));
        assert_eq!(ts.hour(), 10);
    }

    #[test]
    fn test_offset_string_normalized_to_utc() {
        let ts = parse_timestamp_value(&json!("2024-03-15T01:00:00+02:00")).unwrap();
        assert_eq!((ts.month(), ts.day(), ts.hour()), (3, 14, 23));
    }

    #[test]
    fn test_naive_string_treated_as_utc() {
        let ts = parse_timestamp_value(&json!("2024-03-15 10:30:00")).unwrap();
        assert_eq!(ts.hour(), 10);
    }

    #[test]
    fn test_unparsable_values_become_none() {
        assert!(parse_timestamp_value(&json!("not a date")).is_none());
        assert!(parse_timestamp_value(&json!("")).is_none());
        assert!(parse_timestamp_value(&json!(null)).is_none());
        assert!(parse_timestamp_value(&json!({"a": 1})).is_none());
    }

    #[test]
    fn test_missing_created_at_defaults_to_none() {
        let msg: ClaudeMessage = serde_json::from_value(json!({"uuid": "m1"})).unwrap();
        assert!(msg.created_at.is_none());

        let msg: ClaudeMessage =
            serde_json::from_value(json!({"uuid": "m1", "created_at": "garbage"})).unwrap();
        assert!(msg.created_at.is_none());
    }

    #[test]
    fn test_ordered_map_keeps_document_order() {
        let raw = r#"{"title":"t","mapping":{"zeta":{"parent":null},"alpha":{"parent":"zeta"},"mid":{"parent":"zeta"}}}"#;
        let conv: ChatGptConversation = serde_json::from_str(raw).unwrap();
        let keys: Vec<&str> = conv.mapping.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_null_lists_are_empty() {
        let conv: ClaudeConversation =
            serde_json::from_value(json!({"name": "n", "chat_messages": null})).unwrap();
        assert!(conv.chat_messages.is_empty());

        let msg: ClaudeMessage =
            serde_json::from_value(json!({"uuid": "m1", "text": "hi", "content": null})).unwrap();
        assert!(msg.content.is_empty());
        assert_eq!(msg.text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_scalar_names_become_strings() {
        let conv: ClaudeConversation =
            serde_json::from_value(json!({"name": 2024, "chat_messages": []})).unwrap();
        assert_eq!(conv.name.as_deref(), Some("2024"));

        let conv: ChatGptConversation =
            serde_json::from_value(json!({"title": {"nested": true}, "mapping": {}})).unwrap();
        assert!(conv.title.is_none());
    }

    #[test]
    fn test_null_mapping_is_empty() {
        let conv: ChatGptConversation =
            serde_json::from_value(json!({"title": "t", "mapping": null})).unwrap();
        assert!(conv.mapping.is_empty());
    }
}
