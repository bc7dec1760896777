//! Tolerant decoders for user-editable `generated_images` columns.
//!
//! The poll path only needs status and file columns. A malformed value in
//! any metadata column decodes to `None` instead of failing the whole row.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::Timestamp;

/// Any `T`, or `None` when the value has the wrong shape.
pub(crate) fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Star rating 0-5. Integral floats (`4.0`) are accepted.
pub(crate) fn rating<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .filter(|r| (0.0..=5.0).contains(r) && r.fract() == 0.0)
        .map(|r| r as u8))
}

/// Tag array, or a comma-separated string.
pub(crate) fn tags<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => return Ok(None),
    };
    Ok(Some(tags))
}

/// RFC 3339 timestamp; a timestamp without an offset is read as UTC.
pub(crate) fn timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::String(raw) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    Ok(["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
        .map(|naive| naive.and_utc()))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "rating")]
        rating: Option<u8>,
        #[serde(default, deserialize_with = "tags")]
        tags: Option<Vec<String>>,
        #[serde(default, deserialize_with = "timestamp")]
        at: Option<Timestamp>,
        #[serde(default, deserialize_with = "optional")]
        favorite: Option<bool>,
    }

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn rating_accepts_integral_floats_only_in_range() {
        assert_eq!(row(json!({"rating": 4})).rating, Some(4));
        assert_eq!(row(json!({"rating": 4.0})).rating, Some(4));
        assert_eq!(row(json!({"rating": 4.5})).rating, None);
        assert_eq!(row(json!({"rating": 9})).rating, None);
        assert_eq!(row(json!({"rating": "4"})).rating, None);
        assert_eq!(row(json!({"rating": null})).rating, None);
    }

    #[test]
    fn tags_accept_arrays_and_comma_lists() {
        assert_eq!(
            row(json!({"tags": ["beach", 3, "sunset"]})).tags,
            Some(vec!["beach".to_string(), "sunset".to_string()])
        );
        assert_eq!(
            row(json!({"tags": "beach, sunset,"})).tags,
            Some(vec!["beach".to_string(), "sunset".to_string()])
        );
        assert_eq!(row(json!({"tags": {"a": 1}})).tags, None);
    }

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let at = row(json!({"at": "2024-05-01T10:00:00.123456"})).at.unwrap();
        assert_eq!(at.to_rfc3339(), "2024-05-01T10:00:00.123456+00:00");

        let at = row(json!({"at": "2024-05-01T12:00:00+02:00"})).at.unwrap();
        assert_eq!(at.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        assert!(row(json!({"at": "yesterday"})).at.is_none());
    }

    #[test]
    fn wrong_shapes_become_none() {
        assert_eq!(row(json!({"favorite": "yes"})).favorite, None);
        assert_eq!(row(json!({})).favorite, None);
        assert_eq!(row(json!({"favorite": true})).favorite, Some(true));
    }
}
