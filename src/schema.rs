//! Schema documents describing configuration and metadata.
//!
//! A schema document is a JSON object shaped like a (restricted) JSON-schema:
//!
//! ```json
//! { "required": [], "properties": {}, "type": "object", "additionalProperties": false }
//! ```
//!
//! Documents are built from hand-authored descriptions: [`ParamSpec`] lists
//! for extractor constructor arguments and [`FieldSpec`] lists for NWB types.

use serde_json::{json, Map, Value};

/// JSON type of a parameter or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl JsonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }
}

/// Description of one constructor argument of an extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub json_type: JsonType,
    /// Extra `format` hint, e.g. `"file"` for paths
    pub format: Option<&'static str>,
    pub description: Option<&'static str>,
    /// `None` means the argument is required
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: &'static str, json_type: JsonType) -> Self {
        ParamSpec {
            name,
            json_type,
            format: None,
            description: None,
            default: None,
        }
    }

    pub fn optional(name: &'static str, json_type: JsonType, default: Value) -> Self {
        ParamSpec {
            default: Some(default),
            ..ParamSpec::required(name, json_type)
        }
    }

    pub fn with_format(mut self, format: &'static str) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

/// Shape of an NWB type field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Plain(JsonType),
    /// Reference to another NWB object, identified by its tag
    Link(&'static str),
    /// Embedded child object, described by its own schema builder
    Child(fn() -> Value),
}

/// Description of one field of an NWB type.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub doc: &'static str,
    pub kind: FieldKind,
    /// `None` means required; `Some(Value::Null)` means optional without a default
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn required(name: &'static str, doc: &'static str, kind: FieldKind) -> Self {
        FieldSpec { name, doc, kind, default: None }
    }

    pub fn optional(name: &'static str, doc: &'static str, kind: FieldKind, default: Value) -> Self {
        FieldSpec { name, doc, kind, default: Some(default) }
    }
}

/// Returns an empty schema document, optionally tagged.
///
/// # Examples
///
/// ```rust
/// use nwbconv::schema::base_schema;
///
/// let schema = base_schema(None);
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().is_empty());
/// assert!(schema["properties"].as_object().unwrap().is_empty());
/// ```
pub fn base_schema(tag: Option<&str>) -> Value {
    let mut schema = json!({
        "required": [],
        "properties": {},
        "type": "object",
        "additionalProperties": false,
    });
    if let Some(tag) = tag {
        schema["tag"] = Value::String(tag.to_string());
    }
    schema
}

/// Builds the input schema for a list of constructor parameters.
///
/// # Examples
///
/// ```rust
/// use nwbconv::schema::{schema_from_params, JsonType, ParamSpec};
/// use serde_json::json;
///
/// let schema = schema_from_params(&[
///     ParamSpec::required("file_path", JsonType::String).with_format("file"),
///     ParamSpec::optional("gain", JsonType::Number, json!(1.0)),
/// ]);
/// assert_eq!(schema["required"], json!(["file_path"]));
/// assert_eq!(schema["properties"]["file_path"]["format"], "file");
/// assert_eq!(schema["properties"]["gain"]["default"], 1.0);
/// ```
pub fn schema_from_params(params: &[ParamSpec]) -> Value {
    let mut schema = base_schema(None);
    for param in params {
        let mut property = Map::new();
        property.insert("type".into(), json!(param.json_type.as_str()));
        if let Some(format) = param.format {
            property.insert("format".into(), json!(format));
        }
        if let Some(description) = param.description {
            property.insert("description".into(), json!(description));
        }
        match &param.default {
            None => push_required(&mut schema, param.name),
            Some(Value::Null) => {}
            Some(default) => {
                property.insert("default".into(), default.clone());
            }
        }
        insert_property(&mut schema, param.name, Value::Object(property));
    }
    schema
}

/// Builds the schema of an NWB type from its field list.
pub fn schema_from_fields(tag: &str, fields: &[FieldSpec]) -> Value {
    let mut schema = base_schema(Some(tag));
    for field in fields {
        let property = match field.kind {
            FieldKind::Child(child_schema) => child_schema(),
            FieldKind::Link(target) => json!({ "description": field.doc, "target": target }),
            FieldKind::Plain(json_type) => {
                let mut property = json!({ "description": field.doc, "type": json_type.as_str() });
                if let Some(default) = field.default.as_ref().filter(|d| !d.is_null()) {
                    property["default"] = default.clone();
                }
                property
            }
        };
        if field.default.is_none() {
            push_required(&mut schema, field.name);
        }
        insert_property(&mut schema, field.name, property);
    }
    schema
}

/// Inserts a named sub-schema into `properties` and marks it required.
pub fn require_property(schema: &mut Value, name: &str, property: Value) {
    insert_property(schema, name, property);
    push_required(schema, name);
}

fn insert_property(schema: &mut Value, name: &str, property: Value) {
    if let Some(properties) = schema["properties"].as_object_mut() {
        properties.insert(name.to_string(), property);
    }
}

fn push_required(schema: &mut Value, name: &str) {
    if let Some(required) = schema["required"].as_array_mut() {
        if !required.iter().any(|r| r == name) {
            required.push(Value::String(name.to_string()));
        }
    }
}
