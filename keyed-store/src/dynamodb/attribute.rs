/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Conversion between [`Record`]s and DynamoDB items.

use super::{ID_ATTRIBUTE, PARTITION_KEY_ATTRIBUTE};
use crate::{ItemIdentity, Record, StoreError};
use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

pub(super) type Item = HashMap<String, AttributeValue>;

pub(super) fn value_to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(a) => AttributeValue::L(a.into_iter().map(value_to_attribute).collect()),
        Value::Object(o) => AttributeValue::M(
            o.into_iter()
                .map(|(k, v)| (k, value_to_attribute(v)))
                .collect(),
        ),
    }
}

fn number(n: String) -> Value {
    match n.parse::<Number>() {
        Ok(number) => Value::Number(number),
        Err(_) => Value::String(n),
    }
}

// Binary attributes have no JSON form and read back as null.
pub(super) fn attribute_to_value(attribute: AttributeValue) -> Value {
    match attribute {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::N(n) => number(n),
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::L(l) => Value::Array(l.into_iter().map(attribute_to_value).collect()),
        AttributeValue::M(m) => Value::Object(
            m.into_iter()
                .map(|(k, v)| (k, attribute_to_value(v)))
                .collect(),
        ),
        AttributeValue::Ss(ss) => Value::Array(ss.into_iter().map(Value::String).collect()),
        AttributeValue::Ns(ns) => Value::Array(ns.into_iter().map(number).collect()),
        _ => Value::Null,
    }
}

pub(super) fn identity_to_key(identity: &ItemIdentity) -> Item {
    let mut key = HashMap::with_capacity(2);
    key.insert(
        PARTITION_KEY_ATTRIBUTE.to_string(),
        AttributeValue::S(identity.partition_key().to_string()),
    );
    key.insert(
        ID_ATTRIBUTE.to_string(),
        AttributeValue::S(identity.id().to_string()),
    );
    key
}

/// Key attributes always win over record attributes of the same name.
pub(super) fn record_to_item(record: &Record) -> Item {
    let mut item: Item = record
        .attributes()
        .iter()
        .map(|(k, v)| (k.clone(), value_to_attribute(v.clone())))
        .collect();
    item.extend(identity_to_key(record.identity()));
    item
}

fn take_string(item: &mut Item, name: &str) -> Result<String, StoreError> {
    match item.remove(name) {
        Some(AttributeValue::S(s)) => Ok(s),
        Some(other) => Err(StoreError::malformed_response(format!(
            "key attribute `{name}` is not a string: {other:?}"
        ))),
        None => Err(StoreError::malformed_response(format!(
            "item is missing key attribute `{name}`"
        ))),
    }
}

pub(super) fn record_from_item(mut item: Item) -> Result<Record, StoreError> {
    let id = take_string(&mut item, ID_ATTRIBUTE)?;
    let partition_key = take_string(&mut item, PARTITION_KEY_ATTRIBUTE)?;
    let attributes: Map<String, Value> = item
        .into_iter()
        .map(|(k, v)| (k, attribute_to_value(v)))
        .collect();
    Ok(Record::with_attributes(
        ItemIdentity::new(id, partition_key),
        attributes,
    ))
}
