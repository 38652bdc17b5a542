//! Conversion between plain JSON and attribute-value JSON.
//!
//! ```text
//! "x"          ⇄ {"S": "x"}
//! 12.5         ⇄ {"N": "12.5"}
//! true         ⇄ {"BOOL": true}
//! null         ⇄ {"NULL": true}
//! [..]         ⇄ {"L": [..]}
//! {..}         ⇄ {"M": {..}}
//! ```
//!
//! Sets (`SS`, `NS`, `BS`) and binary (`B`) only convert towards plain JSON,
//! as arrays and base64 strings.

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("expected a JSON object for {0}")]
    NotAnObject(String),

    #[error("expected a JSON array for {0}")]
    NotAnArray(String),

    #[error("unsupported attribute value {0}")]
    UnknownType(String),
}

/// Plain JSON value to its attribute-value form.
pub fn to_attribute(value: &Value) -> Value {
    let (tag, inner) = match value {
        Value::Null => ("NULL", Value::Bool(true)),
        Value::Bool(b) => ("BOOL", Value::Bool(*b)),
        Value::Number(n) => ("N", Value::String(n.to_string())),
        Value::String(s) => ("S", Value::String(s.clone())),
        Value::Array(items) => ("L", Value::Array(items.iter().map(to_attribute).collect())),
        Value::Object(fields) => ("M", Value::Object(to_attribute_map(fields))),
    };
    let mut wrapped = Map::with_capacity(1);
    wrapped.insert(tag.to_string(), inner);
    Value::Object(wrapped)
}

fn to_attribute_map(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), to_attribute(value)))
        .collect()
}

/// Attribute-value form back to plain JSON.
pub fn from_attribute(value: &Value) -> Result<Value, ShapeError> {
    let unknown = || ShapeError::UnknownType(value.to_string());

    let fields = value.as_object().ok_or_else(unknown)?;
    if fields.len() != 1 {
        return Err(unknown());
    }
    let (tag, inner) = fields.iter().next().ok_or_else(unknown)?;

    match (tag.as_str(), inner) {
        ("S", Value::String(s)) | ("B", Value::String(s)) => Ok(Value::String(s.clone())),
        ("N", Value::String(n)) => Ok(number(n)),
        ("BOOL", Value::Bool(b)) => Ok(Value::Bool(*b)),
        ("NULL", _) => Ok(Value::Null),
        ("L", Value::Array(items)) => items
            .iter()
            .map(from_attribute)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ("M", Value::Object(map)) => from_attribute_map(map).map(Value::Object),
        ("SS", Value::Array(items)) | ("BS", Value::Array(items)) => Ok(Value::Array(items.clone())),
        ("NS", Value::Array(items)) => items
            .iter()
            .map(|n| n.as_str().map(number).ok_or_else(unknown))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => Err(unknown()),
    }
}

fn from_attribute_map(map: &Map<String, Value>) -> Result<Map<String, Value>, ShapeError> {
    map.iter()
        .map(|(name, value)| Ok((name.clone(), from_attribute(value)?)))
        .collect()
}

/// `N` text to a JSON number, digit for digit. Text that is not a JSON
/// number stays a string.
fn number(text: &str) -> Value {
    match serde_json::from_str::<Number>(text) {
        Ok(n) if text.trim() == text => Value::Number(n),
        _ => Value::String(text.to_string()),
    }
}

/// Plain JSON object (an item or key) to an attribute map.
pub fn item_to_attributes(item: &Value, context: &str) -> Result<Value, ShapeError> {
    item.as_object()
        .map(|fields| Value::Object(to_attribute_map(fields)))
        .ok_or_else(|| ShapeError::NotAnObject(context.to_string()))
}

/// Attribute map to a plain JSON object.
pub fn attributes_to_item(attributes: &Value, context: &str) -> Result<Value, ShapeError> {
    let map = attributes
        .as_object()
        .ok_or_else(|| ShapeError::NotAnObject(context.to_string()))?;
    from_attribute_map(map).map(Value::Object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_item_to_attributes() {
        let item = json!({
            "id": "user-1",
            "age": 42,
            "score": 9.5,
            "active": true,
            "nickname": null,
            "tags": ["a", 1],
            "address": {"city": "Oslo"}
        });

        let attrs = item_to_attributes(&item, "Item").unwrap();
        assert_eq!(
            attrs,
            json!({
                "id": {"S": "user-1"},
                "age": {"N": "42"},
                "score": {"N": "9.5"},
                "active": {"BOOL": true},
                "nickname": {"NULL": true},
                "tags": {"L": [{"S": "a"}, {"N": "1"}]},
                "address": {"M": {"city": {"S": "Oslo"}}}
            })
        );
        assert_eq!(attributes_to_item(&attrs, "Item").unwrap(), item);
    }

    #[test]
    fn sets_flatten_to_arrays() {
        let attrs = json!({
            "colors": {"SS": ["red", "blue"]},
            "sizes": {"NS": ["1", "2.5"]}
        });
        assert_eq!(
            attributes_to_item(&attrs, "Item").unwrap(),
            json!({"colors": ["red", "blue"], "sizes": [1, 2.5]})
        );
    }

    #[test]
    fn numbers_widen_before_falling_back_to_strings() {
        assert_eq!(from_attribute(&json!({"N": "18446744073709551615"})).unwrap(), json!(u64::MAX));
        assert_eq!(from_attribute(&json!({"N": "-7"})).unwrap(), json!(-7));
        assert_eq!(from_attribute(&json!({"N": "not-a-number"})).unwrap(), json!("not-a-number"));
    }

    #[test]
    fn numbers_keep_every_digit() {
        const ITEM: &str =
            r#"{"big":123456789012345678901234567890,"pi":3.14159265358979323846264338327}"#;
        let item: Value = serde_json::from_str(ITEM).unwrap();

        let attrs = item_to_attributes(&item, "Item").unwrap();
        assert_eq!(attrs["big"]["N"], "123456789012345678901234567890");
        assert_eq!(attrs["pi"]["N"], "3.14159265358979323846264338327");
        assert_eq!(attributes_to_item(&attrs, "Item").unwrap().to_string(), ITEM);
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(matches!(
            from_attribute(&json!({"X": "1"})),
            Err(ShapeError::UnknownType(_))
        ));
        assert!(matches!(
            from_attribute(&json!({"S": "a", "N": "1"})),
            Err(ShapeError::UnknownType(_))
        ));
        assert_eq!(
            item_to_attributes(&json!([1]), "Item"),
            Err(ShapeError::NotAnObject("Item".into()))
        );
    }
}
