//! Avro record schema documents for schema-bearing input formats.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ConfigurationError;

/// One field of a record schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Avro type: a primitive name like `"string"` or a nested type object.
    #[serde(rename = "type")]
    pub field_type: Value,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }
}

/// An Avro record schema as supplied under an overlay's `schema` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub namespace: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fields: Vec<FieldDescriptor>,
}

impl SchemaDocument {
    pub fn record(
        namespace: impl Into<String>,
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            record_type: "record".into(),
            name: Some(name.into()),
            fields,
        }
    }

    /// Parse and validate a raw schema value.
    ///
    /// Checked shape: an object with a non-empty `namespace` string and a
    /// non-empty `fields` array whose entries each carry a non-empty `name`
    /// string and a `type`. A missing top-level `type` means `"record"`.
    pub fn from_value(value: &Value) -> Result<Self, ConfigurationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("schema must be an object"))?;

        let namespace = match obj.get("namespace") {
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(invalid("`namespace` must be a string")),
            None => return Err(invalid("missing `namespace`")),
        };

        let record_type = match obj.get("type") {
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(invalid("`type` must be a string")),
            None => "record".to_string(),
        };

        let name = match obj.get("name") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(invalid("`name` must be a string")),
            None => None,
        };

        let raw_fields = match obj.get("fields") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(invalid("`fields` must be a list")),
            None => return Err(invalid("missing `fields`")),
        };

        let fields = raw_fields
            .iter()
            .enumerate()
            .map(|(i, raw)| parse_field(i, raw))
            .collect::<Result<Vec<_>, _>>()?;

        let doc = Self {
            namespace,
            record_type,
            name,
            fields,
        };
        doc.validate()?;
        Ok(doc)
    }

    /// Structural checks that also apply to documents built in code.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.namespace.trim().is_empty() {
            return Err(invalid("`namespace` is empty"));
        }
        if self.fields.is_empty() {
            return Err(invalid("`fields` is empty"));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(invalid(format!("field {i} has an empty `name`")));
            }
            if field.field_type.is_null() {
                return Err(invalid(format!("field `{}` has no `type`", field.name)));
            }
        }
        Ok(())
    }

    /// The JSON payload embedded in the ingestion spec.
    pub fn to_payload(&self) -> Value {
        let fields: Vec<Value> = self
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "type": f.field_type }))
            .collect();

        let mut payload = json!({
            "namespace": self.namespace,
            "type": self.record_type,
            "fields": fields,
        });
        if let (Some(name), Some(obj)) = (&self.name, payload.as_object_mut()) {
            obj.insert("name".into(), Value::String(name.clone()));
        }
        payload
    }
}

fn parse_field(index: usize, raw: &Value) -> Result<FieldDescriptor, ConfigurationError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid(format!("field {index} must be an object")))?;

    let name = match obj.get("name") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(invalid(format!("field {index} `name` must be a string"))),
        None => return Err(invalid(format!("field {index} is missing `name`"))),
    };

    let field_type = match obj.get("type") {
        Some(Value::Null) | None => {
            return Err(invalid(format!("field `{name}` is missing `type`")))
        }
        Some(t) => t.clone(),
    };

    Ok(FieldDescriptor { name, field_type })
}

fn invalid(reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidSchema(reason.into())
}
