//! Decoding generic shard records into [`Message`]s.
//!
//! | Field | Required | Shape |
//! |-------|----------|-------|
//! | `id_str` | yes | decimal string, fits in `i64` |
//! | `created_at` | yes | timestamp string |
//! | `text` | yes | string |
//! | `in_reply_to_status_id_str` | no | decimal string |
//! | `retweeted_status` | no | object with a string `id_str` |
//! | `entities.hashtags[].text` | no | string |
//! | `entities.user_mentions[].screen_name` | no | string |
//!
//! A present-but-mistyped optional field rejects the record just like a
//! missing required one. Nothing is defaulted. The geographic point is
//! never populated here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::FieldError;
use crate::models::{GenericRecord, Message};

/// Validates `record` and converts it to a [`Message`].
pub fn transform(record: &GenericRecord) -> Result<Message, FieldError> {
    let id = parse_id("id_str", required_str(record, "id_str")?)?;
    let created_at = parse_created_at(required_str(record, "created_at")?)?;
    let text = required_str(record, "text")?.to_string();

    let in_reply_to_status_id = optional_str(record, "in_reply_to_status_id_str")?
        .map(|s| parse_id("in_reply_to_status_id_str", s))
        .transpose()?;

    let retweeted_status_id = match optional(record, "retweeted_status") {
        None => None,
        Some(Value::Object(status)) => {
            Some(parse_id("retweeted_status.id_str", nested_id(status)?)?)
        }
        Some(_) => {
            return Err(FieldError::WrongType {
                field: "retweeted_status",
                expected: "an object",
            })
        }
    };

    let (hashtags, user_mentions) = match optional(record, "entities") {
        None => (Vec::new(), Vec::new()),
        Some(Value::Object(entities)) => (
            entity_strings(entities, "hashtags", "text", "entities.hashtags")?,
            entity_strings(
                entities,
                "user_mentions",
                "screen_name",
                "entities.user_mentions",
            )?,
        ),
        Some(_) => {
            return Err(FieldError::WrongType {
                field: "entities",
                expected: "an object",
            })
        }
    };

    Ok(Message {
        id,
        created_at,
        text,
        geo: None,
        is_reply: in_reply_to_status_id.is_some(),
        is_retweet: retweeted_status_id.is_some(),
        in_reply_to_status_id,
        retweeted_status_id,
        hashtags,
        user_mentions,
        raw: Value::Object(record.clone()),
    })
}

fn required_str<'a>(record: &'a GenericRecord, field: &'static str) -> Result<&'a str, FieldError> {
    match record.get(field) {
        None => Err(FieldError::Missing(field)),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(FieldError::WrongType {
            field,
            expected: "a string",
        }),
    }
}

/// A field that is absent or `null` is treated as not set.
fn optional<'a>(record: &'a GenericRecord, field: &str) -> Option<&'a Value> {
    record.get(field).filter(|v| !v.is_null())
}

fn optional_str<'a>(
    record: &'a GenericRecord,
    field: &'static str,
) -> Result<Option<&'a str>, FieldError> {
    match optional(record, field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(FieldError::WrongType {
            field,
            expected: "a string",
        }),
    }
}

fn nested_id(status: &GenericRecord) -> Result<&str, FieldError> {
    match status.get("id_str") {
        None => Err(FieldError::Missing("retweeted_status.id_str")),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(FieldError::WrongType {
            field: "retweeted_status.id_str",
            expected: "a string",
        }),
    }
}

fn entity_strings(
    entities: &GenericRecord,
    list: &str,
    key: &str,
    field: &'static str,
) -> Result<Vec<String>, FieldError> {
    let items = match entities.get(list).filter(|v| !v.is_null()) {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(FieldError::WrongType {
                field,
                expected: "an array",
            })
        }
    };

    items
        .iter()
        .map(|item| match item.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(FieldError::WrongType {
                field,
                expected: "an array of objects with string values",
            }),
        })
        .collect()
}

/// Parses a decimal id. Overflow and stray characters are errors.
fn parse_id(field: &'static str, value: &str) -> Result<i64, FieldError> {
    value.parse::<i64>().map_err(|_| FieldError::InvalidId {
        field,
        value: value.to_string(),
    })
}

/// Accepts RFC 3339, the archive's `2013-01-04 21:23:01 +0000`, the API's
/// `Fri Jan 04 21:23:01 +0000 2013`, a zone-less datetime, or a bare date.
/// Zone-less forms are read as UTC.
pub fn parse_created_at(value: &str) -> Result<DateTime<Utc>, FieldError> {
    let s = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S %z", "%a %b %d %H:%M:%S %z %Y"] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Some(naive) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }

    Err(FieldError::InvalidTimestamp {
        field: "created_at",
        value: value.to_string(),
    })
}
