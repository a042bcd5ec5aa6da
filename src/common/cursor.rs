//! Continuation cursors.
//!
//! A cursor is `base64(json({ attribute name: scalar }))` of the backend's last evaluated key.
//! Both string and number attributes become JSON strings, numbers holding their decimal
//! text so no precision is lost. Attribute kinds are not carried: decoding restores them
//! from the [`key::Prototype`] of the key shape that produced the cursor, so a cursor is only
//! valid for that shape and must name every attribute of it.

use crate::common::{self, key};

use aws_sdk_dynamodb::types;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Map, Value};

/// Why a continuation cursor was rejected.
#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    /// The cursor is not valid base64.
    #[error("invalid token: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded cursor is not valid JSON.
    #[error("invalid token: {0}")]
    Json(#[from] serde_json::Error),
    /// The decoded cursor is not a non-empty JSON object.
    #[error("invalid token: expected a non-empty object")]
    NotAnObject,
    /// The cursor names an attribute outside the key shape.
    #[error("invalid token: unknown attribute {0:?}")]
    UnknownAttribute(String),
    /// The cursor lacks an attribute of the key shape.
    #[error("invalid token: missing attribute {0:?}")]
    MissingAttribute(String),
    /// The cursor holds a value of the wrong kind for an attribute.
    #[error("invalid token: unexpected value for attribute {0:?}")]
    InvalidValue(String),
    /// The key to encode has an attribute that is neither a string nor a number.
    #[error("attribute {0:?} cannot be encoded in a cursor")]
    UnsupportedAttribute(String),
}

/// Encode a resume key as a cursor.
pub fn encode(key: &common::Item) -> Result<String, CursorError> {
    let mut object = Map::new();
    for (name, value) in key {
        let value = match value {
            types::AttributeValue::S(value) | types::AttributeValue::N(value) => {
                Value::String(value.clone())
            }
            _ => return Err(CursorError::UnsupportedAttribute(name.clone())),
        };
        object.insert(name.clone(), value);
    }
    let json = serde_json::to_vec(&Value::Object(object))?;
    Ok(BASE64.encode(json))
}

/// Decode a cursor against the key shape that produced it.
pub fn decode(prototype: &key::Prototype, token: &str) -> Result<common::Item, CursorError> {
    let bytes = BASE64.decode(token)?;
    let object = match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(object) if !object.is_empty() => object,
        _ => return Err(CursorError::NotAnObject),
    };
    let mut key = common::Item::with_capacity(object.len());
    for (name, value) in object {
        let Some(kind) = prototype.get(&name) else {
            return Err(CursorError::UnknownAttribute(name));
        };
        let value = match (kind, value) {
            (key::KeyKind::String, Value::String(value)) => types::AttributeValue::S(value),
            (key::KeyKind::Number, Value::Number(value)) if value.is_i64() || value.is_u64() => {
                types::AttributeValue::N(value.to_string())
            }
            (key::KeyKind::Number, Value::String(value)) if is_integer(&value) => {
                types::AttributeValue::N(value)
            }
            _ => return Err(CursorError::InvalidValue(name)),
        };
        key.insert(name, value);
    }
    if let Some(name) = prototype.names().find(|name| !key.contains_key(*name)) {
        return Err(CursorError::MissingAttribute(name.to_string()));
    }
    Ok(key)
}

fn is_integer(value: &str) -> bool {
    value.parse::<i128>().is_ok() || value.parse::<u128>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::key::PrimaryKeyDefinition;

    use rstest::rstest;

    fn prototype() -> key::Prototype {
        PrimaryKeyDefinition::<String, u128>::new("tenant", "seq")
            .prototype()
            .clone()
    }

    fn item(attributes: &[(&str, types::AttributeValue)]) -> common::Item {
        attributes
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_encode_wire_format() {
        let key = item(&[
            ("tenant", types::AttributeValue::S("t1".to_string())),
            ("seq", types::AttributeValue::N("3".to_string())),
        ]);
        let actual = encode(&key).unwrap();
        assert_eq!(actual, BASE64.encode(r#"{"seq":"3","tenant":"t1"}"#));
    }

    #[rstest]
    #[case::small_number(item(&[
        ("tenant", types::AttributeValue::S("t1".to_string())),
        ("seq", types::AttributeValue::N("5".to_string())),
    ]))]
    #[case::beyond_u64(item(&[
        ("tenant", types::AttributeValue::S("t1".to_string())),
        ("seq", types::AttributeValue::N("340282366920938463463374607431768211455".to_string())),
    ]))]
    #[case::negative_number(item(&[
        ("tenant", types::AttributeValue::S("".to_string())),
        ("seq", types::AttributeValue::N("-7".to_string())),
    ]))]
    fn test_round_trip(#[case] key: common::Item) {
        let token = encode(&key).unwrap();
        let decoded = decode(&prototype(), &token).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn test_round_trip_partition_only() {
        let prototype = PrimaryKeyDefinition::<String>::partition_only("tenant")
            .prototype()
            .clone();
        let key = item(&[("tenant", types::AttributeValue::S("t1".to_string()))]);
        let decoded = decode(&prototype, &encode(&key).unwrap()).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn test_decode_accepts_json_numbers() {
        let token = BASE64.encode(r#"{"tenant":"t1","seq":12}"#);
        let decoded = decode(&prototype(), &token).unwrap();
        assert_eq!(
            decoded.get("seq"),
            Some(&types::AttributeValue::N("12".to_string()))
        );
    }

    #[rstest]
    #[case::bad_base64("not base64!".to_string())]
    #[case::bad_json(BASE64.encode("{"))]
    #[case::not_object(BASE64.encode("[1]"))]
    #[case::empty_object(BASE64.encode("{}"))]
    #[case::unknown_attribute(BASE64.encode(r#"{"tenant":"t1","other":"x"}"#))]
    #[case::number_for_string(BASE64.encode(r#"{"tenant":1}"#))]
    #[case::text_for_number(BASE64.encode(r#"{"tenant":"t1","seq":"abc"}"#))]
    #[case::float_for_number(BASE64.encode(r#"{"tenant":"t1","seq":1.5}"#))]
    fn test_decode_rejects(#[case] token: String) {
        assert!(decode(&prototype(), &token).is_err());
    }

    #[rstest]
    #[case::no_partition_key(BASE64.encode(r#"{"seq":"3"}"#), "tenant")]
    #[case::no_sort_key(BASE64.encode(r#"{"tenant":"t1"}"#), "seq")]
    fn test_decode_rejects_missing_attributes(#[case] token: String, #[case] expected: &str) {
        assert!(matches!(
            decode(&prototype(), &token),
            Err(CursorError::MissingAttribute(name)) if name == expected
        ));
    }

    #[test]
    fn test_decode_rejects_cursor_of_other_shape() {
        let key = item(&[
            ("user", types::AttributeValue::S("u1".to_string())),
            ("created", types::AttributeValue::N("1".to_string())),
        ]);
        let token = encode(&key).unwrap();
        assert!(matches!(
            decode(&prototype(), &token),
            Err(CursorError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn test_encode_rejects_non_scalar_attributes() {
        let key = item(&[("tenant", types::AttributeValue::Bool(true))]);
        assert!(matches!(
            encode(&key),
            Err(CursorError::UnsupportedAttribute(name)) if name == "tenant"
        ));
    }
}
