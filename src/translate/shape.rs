//! Simplified request/response shapes for the `...JSON` routes.
//!
//! Clients send items and keys as plain JSON; the backend wants attribute
//! maps. Requests are expanded before the call and replies are flattened
//! after it. Fields not listed here pass through untouched.

use serde_json::{Map, Value};

use crate::translate::attribute::{attributes_to_item, item_to_attributes, ShapeError};
use crate::translate::Operation;

/// Expand plain-JSON items and keys in a request body into attribute maps.
pub fn expand_request(operation: Operation, body: &mut Value) -> Result<(), ShapeError> {
    let root = object_mut(body, "request")?;
    match operation {
        Operation::PutItem => convert_field(root, "Item", item_to_attributes),
        Operation::GetItem | Operation::DeleteItem => convert_field(root, "Key", item_to_attributes),
        Operation::BatchGetItem => for_each_table(root, "RequestItems", |table, request| {
            let request = object_mut(request, table)?;
            convert_list(request, "Keys", item_to_attributes)
        }),
        Operation::BatchWriteItem => for_each_table(root, "RequestItems", |table, writes| {
            convert_writes(table, writes, item_to_attributes)
        }),
        _ => Ok(()),
    }
}

/// Flatten attribute maps in a backend reply into plain JSON.
pub fn flatten_reply(operation: Operation, body: &mut Value) -> Result<(), ShapeError> {
    let root = object_mut(body, "response")?;
    match operation {
        Operation::GetItem | Operation::DeleteItem => {
            convert_field(root, "Item", attributes_to_item)?;
            convert_field(root, "Attributes", attributes_to_item)
        }
        Operation::PutItem => convert_field(root, "Attributes", attributes_to_item),
        Operation::BatchGetItem => {
            for_each_table(root, "Responses", |table, items| {
                let items = items
                    .as_array_mut()
                    .ok_or_else(|| ShapeError::NotAnArray(table.to_string()))?;
                for item in items.iter_mut() {
                    *item = attributes_to_item(item, table)?;
                }
                Ok(())
            })?;
            for_each_table(root, "UnprocessedKeys", |table, request| {
                let request = object_mut(request, table)?;
                convert_list(request, "Keys", attributes_to_item)
            })
        }
        Operation::BatchWriteItem => for_each_table(root, "UnprocessedItems", |table, writes| {
            convert_writes(table, writes, attributes_to_item)
        }),
        _ => Ok(()),
    }
}

type Convert = fn(&Value, &str) -> Result<Value, ShapeError>;

fn object_mut<'a>(value: &'a mut Value, context: &str) -> Result<&'a mut Map<String, Value>, ShapeError> {
    value
        .as_object_mut()
        .ok_or_else(|| ShapeError::NotAnObject(context.to_string()))
}

fn convert_field(root: &mut Map<String, Value>, field: &str, convert: Convert) -> Result<(), ShapeError> {
    if let Some(value) = root.get_mut(field) {
        *value = convert(value, field)?;
    }
    Ok(())
}

fn convert_list(root: &mut Map<String, Value>, field: &str, convert: Convert) -> Result<(), ShapeError> {
    let Some(list) = root.get_mut(field) else {
        return Ok(());
    };
    let list = list
        .as_array_mut()
        .ok_or_else(|| ShapeError::NotAnArray(field.to_string()))?;
    for entry in list.iter_mut() {
        *entry = convert(entry, field)?;
    }
    Ok(())
}

fn convert_writes(table: &str, writes: &mut Value, convert: Convert) -> Result<(), ShapeError> {
    let writes = writes
        .as_array_mut()
        .ok_or_else(|| ShapeError::NotAnArray(table.to_string()))?;
    for write in writes.iter_mut() {
        let write = object_mut(write, table)?;
        if let Some(put) = write.get_mut("PutRequest") {
            convert_field(object_mut(put, "PutRequest")?, "Item", convert)?;
        }
        if let Some(delete) = write.get_mut("DeleteRequest") {
            convert_field(object_mut(delete, "DeleteRequest")?, "Key", convert)?;
        }
    }
    Ok(())
}

fn for_each_table<F>(root: &mut Map<String, Value>, field: &str, mut apply: F) -> Result<(), ShapeError>
where
    F: FnMut(&str, &mut Value) -> Result<(), ShapeError>,
{
    let Some(tables) = root.get_mut(field) else {
        return Ok(());
    };
    for (table, value) in object_mut(tables, field)?.iter_mut() {
        apply(table, value)?;
    }
    Ok(())
}
