//! Declared attribute schemas for provider and resources.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ProviderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int64,
    Float64,
    Bool,
    StringMap,
    /// Ordered list of nested objects.
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanModifier {
    /// Keep the stored value when the declaration leaves the attribute unset.
    UseStateForUnknown,
    /// Keep the stored query when the declared one differs only in whitespace.
    NormalizeFlux,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plan_modifiers: Vec<PlanModifier>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<Attribute>,
}

impl Attribute {
    fn new(name: &'static str, kind: AttributeType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            description,
            plan_modifiers: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn required(name: &'static str, kind: AttributeType, description: &'static str) -> Self {
        Self {
            required: true,
            ..Self::new(name, kind, description)
        }
    }

    pub fn optional(name: &'static str, kind: AttributeType, description: &'static str) -> Self {
        Self {
            optional: true,
            ..Self::new(name, kind, description)
        }
    }

    /// Set by the server only. Stored value survives plans.
    pub fn computed(name: &'static str, kind: AttributeType, description: &'static str) -> Self {
        Self {
            computed: true,
            plan_modifiers: vec![PlanModifier::UseStateForUnknown],
            ..Self::new(name, kind, description)
        }
    }

    /// May be declared; otherwise filled from the server and kept across plans.
    pub fn optional_computed(
        name: &'static str,
        kind: AttributeType,
        description: &'static str,
    ) -> Self {
        Self {
            optional: true,
            ..Self::computed(name, kind, description)
        }
    }

    /// Ordered list block of nested objects.
    pub fn list_block(
        name: &'static str,
        description: &'static str,
        nested: Vec<Attribute>,
    ) -> Self {
        Self {
            optional: true,
            nested,
            ..Self::new(name, AttributeType::List, description)
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_modifier(mut self, modifier: PlanModifier) -> Self {
        self.plan_modifiers.push(modifier);
        self
    }

    pub fn has_modifier(&self, modifier: PlanModifier) -> bool {
        self.plan_modifiers.contains(&modifier)
    }

    fn check(&self, path: &str, value: &Value) -> Result<()> {
        let missing = match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        if missing {
            if self.required {
                return Err(ProviderError::validation(format!(
                    "missing required attribute '{path}'"
                )));
            }
            return Ok(());
        }

        let matches = match self.kind {
            AttributeType::String => value.is_string(),
            AttributeType::Int64 => value.is_i64() || value.is_u64(),
            AttributeType::Float64 => value.is_number(),
            AttributeType::Bool => value.is_boolean(),
            AttributeType::StringMap => value
                .as_object()
                .is_some_and(|m| m.values().all(Value::is_string)),
            AttributeType::List => value.is_array(),
        };
        if !matches {
            return Err(ProviderError::validation(format!(
                "attribute '{path}' must be of type {:?}, got {value}",
                self.kind
            )));
        }

        if let Value::Array(items) = value {
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{index}]");
                let object = item.as_object().ok_or_else(|| {
                    ProviderError::validation(format!("'{item_path}' must be an object"))
                })?;
                check_object(&self.nested, &item_path, object)?;
            }
        }

        Ok(())
    }
}

fn check_object(attributes: &[Attribute], prefix: &str, object: &Map<String, Value>) -> Result<()> {
    for attribute in attributes {
        let path = if prefix.is_empty() {
            attribute.name.to_string()
        } else {
            format!("{prefix}.{}", attribute.name)
        };
        let value = object.get(attribute.name).unwrap_or(&Value::Null);
        attribute.check(&path, value)?;
    }
    Ok(())
}

/// Attribute set for a provider or resource type.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub description: &'static str,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(description: &'static str, attributes: Vec<Attribute>) -> Self {
        Self {
            description,
            attributes,
        }
    }

    /// Check required attributes and value types, nested blocks included.
    /// Required strings must be non-empty.
    pub fn validate(&self, document: &Value) -> Result<()> {
        let object = document.as_object().ok_or_else(|| {
            ProviderError::validation("resource document must be a JSON object")
        })?;
        check_object(&self.attributes, "", object)
    }

    /// Names of attributes marked sensitive.
    pub fn sensitive_attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attributes
            .iter()
            .filter(|a| a.sensitive)
            .map(|a| a.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(
            "test",
            vec![
                Attribute::computed("id", AttributeType::String, "ID"),
                Attribute::required("name", AttributeType::String, "Name"),
                Attribute::optional("retention", AttributeType::Int64, "Retention"),
                Attribute::optional("headers", AttributeType::StringMap, "Headers"),
                Attribute::list_block(
                    "rules",
                    "Rules",
                    vec![
                        Attribute::required("level", AttributeType::String, "Level"),
                        Attribute::optional("value", AttributeType::Float64, "Value"),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn test_valid_document_passes() {
        let doc = json!({
            "id": null,
            "name": "b1",
            "retention": 3600,
            "headers": {"X-A": "1"},
            "rules": [{"level": "CRIT", "value": 9.5}]
        });
        assert!(schema().validate(&doc).is_ok());
    }

    #[test]
    fn test_missing_required_attribute() {
        let err = schema().validate(&json!({"name": null})).unwrap_err();
        assert_eq!(err.to_string(), "missing required attribute 'name'");

        let err = schema().validate(&json!({"name": ""})).unwrap_err();
        assert_eq!(err.to_string(), "missing required attribute 'name'");
    }

    #[test]
    fn test_nested_required_attribute_reports_path() {
        let doc = json!({"name": "b1", "rules": [{"level": "OK"}, {"value": 1.0}]});
        let err = schema().validate(&doc).unwrap_err();
        assert_eq!(err.to_string(), "missing required attribute 'rules[1].level'");
    }

    #[test]
    fn test_type_mismatch() {
        let doc = json!({"name": "b1", "retention": "forever"});
        assert!(matches!(
            schema().validate(&doc),
            Err(ProviderError::Validation(_))
        ));

        let doc = json!({"name": "b1", "headers": {"X-A": 1}});
        assert!(schema().validate(&doc).is_err());
    }

    #[test]
    fn test_computed_attributes_preserve_state() {
        let schema = schema();
        let id = &schema.attributes[0];
        assert_eq!(id.name, "id");
        assert!(id.has_modifier(PlanModifier::UseStateForUnknown));
        let name = &schema.attributes[1];
        assert_eq!(name.name, "name");
        assert!(!name.computed);
    }
}
