//! Request and reply body handling per route style.

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::translate::attribute::ShapeError;
use crate::translate::shape;
use crate::translate::Operation;

/// How a route treats bodies on the way to and from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Bytes pass through untouched.
    Raw,
    /// Request must be a JSON object carrying the operation's required fields.
    Validated,
    /// Like `Validated`, with plain-JSON items converted both ways.
    Simplified,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot unmarshal request body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("cannot convert request: {0}")]
    Shape(#[from] ShapeError),
}

impl Codec {
    /// Prepare a client body for the backend.
    pub fn decode_request(&self, operation: Operation, body: Bytes) -> Result<Bytes, DecodeError> {
        if *self == Codec::Raw {
            return Ok(body);
        }

        let mut value = parse_object(&body)?;
        if *self == Codec::Simplified {
            shape::expand_request(operation, &mut value)?;
        }
        for &field in operation.required_fields() {
            if value.get(field).is_none() {
                return Err(DecodeError::MissingField(field));
            }
        }
        Ok(Bytes::from(serde_json::to_vec(&value)?))
    }

    /// Prepare a backend body for the client. Bodies that do not parse are
    /// returned as they are.
    pub fn encode_reply(&self, operation: Operation, body: Bytes) -> Bytes {
        if *self != Codec::Simplified {
            return body;
        }

        let Ok(mut value) = serde_json::from_slice::<Value>(&body) else {
            return body;
        };
        if let Err(err) = shape::flatten_reply(operation, &mut value) {
            tracing::warn!(operation = %operation, error = %err, "Cannot simplify backend reply");
            return body;
        }
        match serde_json::to_vec(&value) {
            Ok(encoded) => Bytes::from(encoded),
            Err(_) => body,
        }
    }
}

/// Empty bodies count as an empty object, the way GET-style calls send them.
fn parse_object(body: &[u8]) -> Result<Value, DecodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    Ok(value)
}
