//! Plan modifiers.
//!
//! Planning merges a declared document with the stored one before an update.
//! Attributes the declaration leaves unset (missing, null, or an empty list)
//! keep their stored value and declared values overwrite. List blocks are
//! merged element by element, so a nested attribute left out of a declared
//! element keeps the stored element's value. Flux queries that only differ in
//! formatting keep the stored text.

use serde_json::{Map, Value};

use crate::flux;
use crate::schema::{Attribute, PlanModifier, Schema};

/// Merge `config` with `prior` according to `schema`.
pub fn apply(schema: &Schema, config: Value, prior: Option<&Value>) -> Value {
    let Some(prior) = prior.and_then(Value::as_object) else {
        return config;
    };
    let Value::Object(mut planned) = config else {
        return config;
    };
    merge_object(&schema.attributes, &mut planned, prior);
    Value::Object(planned)
}

fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn merge_object(attributes: &[Attribute], planned: &mut Map<String, Value>, prior: &Map<String, Value>) {
    for attribute in attributes {
        let Some(stored) = prior.get(attribute.name).filter(|v| !v.is_null()) else {
            continue;
        };
        if is_unset(planned.get(attribute.name)) {
            planned.insert(attribute.name.to_string(), stored.clone());
            continue;
        }

        match (planned.get_mut(attribute.name), stored) {
            (Some(Value::String(declared)), Value::String(stored))
                if attribute.has_modifier(PlanModifier::NormalizeFlux) =>
            {
                if flux::equivalent(declared, stored) {
                    *declared = stored.clone();
                }
            }
            (Some(Value::Array(declared)), Value::Array(stored)) if !attribute.nested.is_empty() => {
                for (item, stored_item) in declared.iter_mut().zip(stored) {
                    if let (Value::Object(item), Value::Object(stored_item)) = (item, stored_item) {
                        merge_object(&attribute.nested, item, stored_item);
                    }
                }
            }
            _ => {}
        }
    }
}
