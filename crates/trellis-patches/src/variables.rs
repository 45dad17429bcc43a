//! Variable store accessor
//!
//! CAPI sends cluster variables as a list of `(name, opaque JSON)` pairs. This
//! module flattens them into a [`VariableMap`] and resolves typed values at a
//! field path inside a variable.
//!
//! Resolution has three outcomes:
//! - `Ok(Some(value))`: the path resolved and decoded into `T`
//! - `Ok(None)`: the variable, or some segment of the path, is absent
//! - `Err(Error::Variable)`: the value exists but has the wrong shape
//!
//! A JSON `null` is treated as absent, matching how an unset optional field
//! round-trips through CAPI.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use trellis_common::hooks::ClusterVariable;
use trellis_common::{Error, Result};

/// Variable name to opaque JSON value
///
/// Ordered so iteration, and therefore anything serialized from it, is
/// deterministic.
pub type VariableMap = BTreeMap<String, Value>;

/// Build a variable map from CAPI's variable list
///
/// Later entries win when a name is repeated.
pub fn variable_map(variables: &[ClusterVariable]) -> VariableMap {
    variables
        .iter()
        .map(|v| (v.name.clone(), v.value.clone()))
        .collect()
}

/// Overlay item-scoped variables on the request-wide map
///
/// Item variables replace global variables of the same name wholesale.
pub fn merge_variable_maps(global: &VariableMap, item: &[ClusterVariable]) -> VariableMap {
    let mut merged = global.clone();
    merged.extend(variable_map(item));
    merged
}

/// Convert a variable map back into CAPI's variable list, ordered by name
pub fn to_cluster_variables(variables: &VariableMap) -> Vec<ClusterVariable> {
    variables
        .iter()
        .map(|(name, value)| ClusterVariable::new(name.clone(), value.clone()))
        .collect()
}

/// Resolve the value at `field_path` inside variable `name`
///
/// Returns `Ok(None)` when the variable or any path segment is absent. An
/// intermediate segment that is not an object, or a final value that does not
/// decode into `T`, is an error.
pub fn get<T: DeserializeOwned>(
    variables: &VariableMap,
    name: &str,
    field_path: &[&str],
) -> Result<Option<T>> {
    let Some(mut current) = variables.get(name) else {
        return Ok(None);
    };

    for (depth, segment) in field_path.iter().enumerate() {
        match current {
            Value::Null => return Ok(None),
            Value::Object(map) => match map.get(*segment) {
                Some(next) => current = next,
                None => return Ok(None),
            },
            other => {
                return Err(Error::variable(
                    name,
                    &field_path[..depth],
                    format!(
                        "expected an object to descend into {:?}, found {}",
                        segment,
                        json_type_name(other)
                    ),
                ))
            }
        }
    }

    if current.is_null() {
        return Ok(None);
    }

    T::deserialize(current)
        .map(Some)
        .map_err(|e| Error::variable(name, field_path, e.to_string()))
}

/// Write `value` at `field_path` inside variable `name`
///
/// Missing intermediate objects are created and sibling keys are left
/// untouched. An empty path replaces the whole variable. Descending through an
/// existing non-object value is an error.
pub fn set<T: Serialize>(
    value: &T,
    variables: &mut VariableMap,
    name: &str,
    field_path: &[&str],
) -> Result<()> {
    let encoded =
        serde_json::to_value(value).map_err(|e| Error::variable(name, field_path, e.to_string()))?;

    let Some((last, parents)) = field_path.split_last() else {
        variables.insert(name.to_string(), encoded);
        return Ok(());
    };

    let root = variables
        .entry(name.to_string())
        .or_insert_with(|| Value::Object(Map::new()));

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        current = descend_or_create(current, segment)
            .ok_or_else(|| not_an_object(name, &field_path[..depth], segment))?;
    }

    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), encoded);
            Ok(())
        }
        _ => Err(not_an_object(name, parents, last)),
    }
}

fn descend_or_create<'a>(current: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => Some(
            map.entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
        ),
        _ => None,
    }
}

fn not_an_object(name: &str, path: &[&str], segment: &str) -> Error {
    Error::variable(
        name,
        path,
        format!("cannot set {:?}: parent is not an object", segment),
    )
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Variable references
// =============================================================================

/// A `(variable, field path)` pair a mutator reads
///
/// Declared once as a constant and used both to check the advertised schema
/// at startup and to resolve the value at generate time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariableRef {
    /// Variable name (e.g., "clusterConfig")
    pub name: &'static str,
    /// Field path inside the variable (e.g., `["etcd"]`)
    pub path: &'static [&'static str],
}

impl VariableRef {
    /// Create a reference to `path` inside variable `name`
    pub const fn new(name: &'static str, path: &'static [&'static str]) -> Self {
        Self { name, path }
    }

    /// Resolve this reference against a variable map
    pub fn get<T: DeserializeOwned>(&self, variables: &VariableMap) -> Result<Option<T>> {
        get(variables, self.name, self.path)
    }

    /// Write a value at this reference
    pub fn set<T: Serialize>(&self, value: &T, variables: &mut VariableMap) -> Result<()> {
        set(value, variables, self.name, self.path)
    }
}

impl fmt::Display for VariableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        for segment in self.path {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use trellis_common::variables::{Etcd, Image};

    fn vars(value: Value) -> VariableMap {
        variable_map(&[ClusterVariable::new("clusterConfig", value)])
    }

    // ==========================================================================
    // Story Tests: Resolving Feature Variables
    // ==========================================================================

    /// Story: an etcd override set in the Cluster topology resolves into the
    /// typed etcd config the mutator works with.
    #[test]
    fn story_etcd_variable_resolves_to_typed_value() {
        let vars = vars(json!({"etcd": {"image": {"tag": "v3.5.9"}}}));

        let etcd: Option<Etcd> = get(&vars, "clusterConfig", &["etcd"]).unwrap();

        assert_eq!(
            etcd,
            Some(Etcd {
                image: Some(Image {
                    repository: None,
                    tag: Some("v3.5.9".to_string()),
                }),
            })
        );
    }

    /// Story: features the user did not configure are simply absent, never an error.
    #[test]
    fn story_unconfigured_features_are_not_found() {
        let vars = vars(json!({"etcd": {"image": {"tag": "v3.5.9"}}}));

        let missing_variable: Option<String> = get(&vars, "workerConfig", &["docker"]).unwrap();
        let missing_leaf: Option<String> = get(&vars, "clusterConfig", &["proxy"]).unwrap();
        let missing_middle: Option<String> =
            get(&vars, "clusterConfig", &["controlPlane", "aws", "instanceType"]).unwrap();

        assert!(missing_variable.is_none());
        assert!(missing_leaf.is_none());
        assert!(missing_middle.is_none());
    }

    /// Story: a value of the wrong shape is a hard error naming the variable
    /// and path, so the operator can fix the Cluster spec.
    #[test]
    fn story_type_mismatch_is_an_error() {
        let vars = vars(json!({"etcd": "v3.5.9"}));

        let err = get::<Etcd>(&vars, "clusterConfig", &["etcd"]).unwrap_err();

        assert_eq!(err.variable_name(), Some("clusterConfig"));
        assert!(err.to_string().contains("etcd"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn descending_through_scalar_is_an_error() {
        let vars = vars(json!({"etcd": "v3.5.9"}));

        let err = get::<String>(&vars, "clusterConfig", &["etcd", "image", "tag"]).unwrap_err();

        match err {
            Error::Variable { field_path, .. } => assert_eq!(field_path, "etcd"),
            other => panic!("expected variable error, got {other:?}"),
        }
    }

    #[test]
    fn null_is_not_found() {
        let vars = vars(json!({"etcd": null}));
        assert!(get::<Etcd>(&vars, "clusterConfig", &["etcd"]).unwrap().is_none());
        assert!(get::<String>(&vars, "clusterConfig", &["etcd", "image"])
            .unwrap()
            .is_none());
    }

    #[test]
    fn empty_path_resolves_whole_variable() {
        let vars = vars(json!({"kubernetesImageRepository": "registry.example.com"}));
        let whole: Option<Value> = get(&vars, "clusterConfig", &[]).unwrap();
        assert_eq!(
            whole,
            Some(json!({"kubernetesImageRepository": "registry.example.com"}))
        );
    }

    #[test]
    fn repeated_get_is_identical() {
        let vars = vars(json!({"users": [{"name": "ops"}]}));
        let first: Option<Value> = get(&vars, "clusterConfig", &["users"]).unwrap();
        let second: Option<Value> = get(&vars, "clusterConfig", &["users"]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn builtin_class_resolves_as_string() {
        let vars = variable_map(&[ClusterVariable::new(
            "builtin",
            json!({"machineDeployment": {"class": "default-worker"}}),
        )]);
        let class: Option<String> = get(&vars, "builtin", &["machineDeployment", "class"]).unwrap();
        assert_eq!(class.as_deref(), Some("default-worker"));
    }

    #[test]
    fn resolves_partial_structs() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Proxy {
            http: String,
        }
        let vars = vars(json!({"proxy": {"http": "http://proxy:3128", "https": "x"}}));
        let proxy: Option<Proxy> = get(&vars, "clusterConfig", &["proxy"]).unwrap();
        assert_eq!(
            proxy,
            Some(Proxy {
                http: "http://proxy:3128".to_string()
            })
        );
    }

    // ==========================================================================
    // Set
    // ==========================================================================

    #[test]
    fn set_creates_intermediate_objects() {
        let mut vars = VariableMap::new();

        set(
            &json!({"url": "https://mirror.example.com"}),
            &mut vars,
            "clusterConfig",
            &["globalImageRegistryMirror"],
        )
        .unwrap();

        assert_eq!(
            vars["clusterConfig"],
            json!({"globalImageRegistryMirror": {"url": "https://mirror.example.com"}})
        );
    }

    #[test]
    fn set_preserves_siblings() {
        let mut vars = vars(json!({"etcd": {"image": {"tag": "v3.5.9"}}, "users": []}));

        set(&"registry.example.com", &mut vars, "clusterConfig", &["etcd", "image", "repository"])
            .unwrap();

        assert_eq!(
            vars["clusterConfig"],
            json!({
                "etcd": {"image": {"tag": "v3.5.9", "repository": "registry.example.com"}},
                "users": []
            })
        );
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut vars = VariableMap::new();
        let etcd = Etcd {
            image: Some(Image {
                repository: Some("registry.example.com".to_string()),
                tag: None,
            }),
        };

        set(&etcd, &mut vars, "clusterConfig", &["etcd"]).unwrap();

        assert_eq!(get::<Etcd>(&vars, "clusterConfig", &["etcd"]).unwrap(), Some(etcd));
    }

    #[test]
    fn set_with_empty_path_replaces_variable() {
        let mut vars = vars(json!({"etcd": {}}));
        set(&json!({"users": []}), &mut vars, "clusterConfig", &[]).unwrap();
        assert_eq!(vars["clusterConfig"], json!({"users": []}));
    }

    #[test]
    fn set_through_scalar_is_an_error() {
        let mut vars = vars(json!({"etcd": "v3.5.9"}));
        let result = set(&"x", &mut vars, "clusterConfig", &["etcd", "image"]);
        assert!(matches!(result, Err(Error::Variable { .. })));
        assert_eq!(vars["clusterConfig"], json!({"etcd": "v3.5.9"}));
    }

    // ==========================================================================
    // Maps and references
    // ==========================================================================

    #[test]
    fn item_variables_override_global() {
        let global = variable_map(&[
            ClusterVariable::new("clusterConfig", json!({"etcd": {}})),
            ClusterVariable::new("builtin", json!({"cluster": {"name": "a"}})),
        ]);
        let item = [ClusterVariable::new(
            "builtin",
            json!({"machineDeployment": {"class": "workers"}}),
        )];

        let merged = merge_variable_maps(&global, &item);

        assert_eq!(merged["clusterConfig"], json!({"etcd": {}}));
        assert_eq!(merged["builtin"], json!({"machineDeployment": {"class": "workers"}}));
        assert_eq!(global["builtin"], json!({"cluster": {"name": "a"}}));
    }

    #[test]
    fn cluster_variables_are_sorted_by_name() {
        let vars = variable_map(&[
            ClusterVariable::new("workerConfig", json!({})),
            ClusterVariable::new("clusterConfig", json!({})),
        ]);
        let names: Vec<_> = to_cluster_variables(&vars)
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["clusterConfig", "workerConfig"]);
    }

    #[test]
    fn variable_ref_displays_dotted_path() {
        const ETCD_TAG: VariableRef = VariableRef::new("clusterConfig", &["etcd", "image", "tag"]);
        assert_eq!(ETCD_TAG.to_string(), "clusterConfig.etcd.image.tag");
        assert_eq!(VariableRef::new("workerConfig", &[]).to_string(), "workerConfig");
    }
}
