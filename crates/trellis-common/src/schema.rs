//! OpenAPI v3 schemas for ClusterClass variables
//!
//! Variable schemas are derived from the Rust value types with `schemars`, so
//! the schema advertised by DiscoverVariables and the type decoded at
//! GeneratePatches time cannot drift apart. The derived JSON Schema is then
//! narrowed to the structural subset CAPI's `JSONSchemaProps` accepts:
//! - subschemas are inlined (no `$ref`/`definitions`)
//! - `Option<T>` becomes "not required" rather than a nullable type
//! - numeric formats Kubernetes does not validate (`uint32`, ...) are dropped
//! - untyped `serde_json::Value` fields become `x-kubernetes-preserve-unknown-fields`

use std::collections::BTreeMap;

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Formats understood by Kubernetes' OpenAPI validation
const SUPPORTED_FORMATS: &[&str] = &[
    "bsonobjectid",
    "uri",
    "email",
    "hostname",
    "ipv4",
    "ipv6",
    "cidr",
    "mac",
    "uuid",
    "byte",
    "password",
    "date",
    "duration",
    "date-time",
    "int32",
    "int64",
    "float",
    "double",
];

/// Keywords schemars emits that CAPI's schema type does not carry
const STRIPPED_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "definitions",
    "title",
    "nullable",
    "readOnly",
    "writeOnly",
    "deprecated",
    "examples",
];

/// Structural OpenAPI v3 schema as accepted by CAPI ClusterClass variables
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSchemaProps {
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Example value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    /// Value type: object, array, string, integer, number, boolean
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// Object properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, JsonSchemaProps>,
    /// Schema of map values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<JsonSchemaProps>>,
    /// Maximum number of properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<i64>,
    /// Minimum number of properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<i64>,
    /// Required property names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Schema of array items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchemaProps>>,
    /// Maximum array length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<i64>,
    /// Minimum array length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<i64>,
    /// Whether array items must be unique
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique_items: bool,
    /// String format (see [`SUPPORTED_FORMATS`])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Maximum string length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    /// Minimum string length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<i64>,
    /// Regular expression strings must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Inclusive (unless exclusive) upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
    /// Whether `maximum` is exclusive
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclusive_maximum: bool,
    /// Inclusive (unless exclusive) lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    /// Whether `minimum` is exclusive
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclusive_minimum: bool,
    /// Keep fields not described by `properties`
    #[serde(
        default,
        rename = "x-kubernetes-preserve-unknown-fields",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub x_kubernetes_preserve_unknown_fields: bool,
    /// Allowed values
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_: Vec<Value>,
    /// Default value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl JsonSchemaProps {
    /// Resolve a dotted field path against this schema's properties
    ///
    /// Returns `None` if any segment is not a declared property. An empty path
    /// resolves to the schema itself.
    pub fn property_at(&self, path: &[&str]) -> Option<&JsonSchemaProps> {
        path.iter()
            .try_fold(self, |schema, segment| schema.properties.get(*segment))
    }
}

/// Derive the CAPI variable schema for `T`
///
/// `variable` is only used for error context.
pub fn schema_for<T: JsonSchema>(variable: &str) -> Result<JsonSchemaProps> {
    let generator = SchemaSettings::openapi3()
        .with(|s| {
            s.inline_subschemas = true;
            s.option_nullable = false;
            s.option_add_null_type = false;
        })
        .into_generator();
    let root = generator.into_root_schema_for::<T>();

    let mut value = serde_json::to_value(&root.schema)
        .map_err(|e| Error::schema(variable, format!("failed to serialize schema: {e}")))?;
    structuralize(variable, &mut value)?;

    serde_json::from_value(value)
        .map_err(|e| Error::schema(variable, format!("schema is not structural: {e}")))
}

/// Rewrite a schemars JSON Schema node in place into CAPI's structural subset
fn structuralize(variable: &str, node: &mut Value) -> Result<()> {
    if let Value::Bool(true) = node {
        *node = serde_json::json!({ "x-kubernetes-preserve-unknown-fields": true });
        return Ok(());
    }

    let Value::Object(obj) = node else {
        return Err(Error::schema(
            variable,
            format!("unsupported schema node: {node}"),
        ));
    };

    if obj.contains_key("$ref") {
        return Err(Error::schema(
            variable,
            "recursive types cannot be used as variable values",
        ));
    }
    for keyword in ["oneOf", "anyOf", "not"] {
        if obj.contains_key(keyword) {
            return Err(Error::schema(
                variable,
                format!("`{keyword}` is not supported in variable schemas; use a plain string enum"),
            ));
        }
    }

    flatten_single_all_of(obj);

    for keyword in STRIPPED_KEYWORDS {
        obj.remove(*keyword);
    }

    // openapi3 settings turn `true` into `{}`; either way the value is untyped
    let untyped = ["type", "properties", "items", "additionalProperties", "enum"]
        .iter()
        .all(|keyword| !obj.contains_key(*keyword));
    if untyped {
        obj.insert(
            "x-kubernetes-preserve-unknown-fields".to_string(),
            Value::Bool(true),
        );
    }

    if let Some(Value::Array(types)) = obj.get("type") {
        let first = types
            .iter()
            .find(|t| t.as_str() != Some("null"))
            .cloned()
            .unwrap_or(Value::Null);
        obj.insert("type".to_string(), first);
    }

    if let Some(format) = obj.get("format").and_then(Value::as_str) {
        if !SUPPORTED_FORMATS.contains(&format) {
            obj.remove("format");
        }
    }

    if matches!(obj.get("default"), Some(Value::Null)) {
        obj.remove("default");
    }

    for bound in ["minimum", "maximum"] {
        if let Some(n) = obj.get(bound).and_then(Value::as_f64) {
            if n.fract() == 0.0 {
                obj.insert(bound.to_string(), Value::from(n as i64));
            } else {
                obj.remove(bound);
            }
        }
    }

    match obj.get_mut("additionalProperties") {
        Some(Value::Bool(_)) => {
            obj.remove("additionalProperties");
        }
        Some(additional) => structuralize(variable, additional)?,
        None => {}
    }

    if let Some(Value::Object(props)) = obj.get_mut("properties") {
        for prop in props.values_mut() {
            structuralize(variable, prop)?;
        }
    }

    if let Some(items) = obj.get_mut("items") {
        structuralize(variable, items)?;
    }

    Ok(())
}

/// schemars wraps a described subschema in a one-element `allOf`; merge it up
fn flatten_single_all_of(obj: &mut Map<String, Value>) {
    let single = match obj.get("allOf") {
        Some(Value::Array(all_of)) if all_of.len() == 1 => all_of[0].clone(),
        _ => return,
    };
    obj.remove("allOf");
    if let Value::Object(inner) = single {
        for (key, value) in inner {
            obj.entry(key).or_insert(value);
        }
    }
}
