//! Parameter → flag descriptor compilation
//!
//! Resolves `$ref` parameters against the shared registry and derives the
//! typed flag each remaining parameter becomes on the command line.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::ParameterError;
use crate::naming::to_kebab_case;
use crate::spec::{Location, ParameterNode};

/// Source of environment variables consulted by `x-swagger-cmd-env`.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Element type of a flag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Integer,
    Boolean,
}

impl ScalarType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            // numbers are passed through to the server as written
            "string" | "number" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        })
    }
}

/// Type of a compiled flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagType {
    Scalar(ScalarType),
    Array(ScalarType),
}

impl FlagType {
    /// Derive the flag type from a parameter's `type` and `items.type`.
    pub fn from_parameter(node: &ParameterNode) -> Option<Self> {
        match node.param_type.as_deref()? {
            "array" => node
                .items
                .as_ref()
                .and_then(|items| items.item_type.as_deref())
                .and_then(ScalarType::parse)
                .map(Self::Array),
            other => ScalarType::parse(other).map(Self::Scalar),
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, Self::Array(_))
    }

    pub fn scalar(self) -> ScalarType {
        match self {
            Self::Scalar(t) | Self::Array(t) => t,
        }
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(t) => write!(f, "{t}"),
            Self::Array(t) => write!(f, "array.{t}"),
        }
    }
}

/// A parameter compiled into a command-line flag.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct FlagDescriptor {
    /// Flag name (kebab-case)
    pub name: String,
    /// Parameter name as written in the document; used for the path
    /// placeholder and the query key
    pub param_name: String,
    pub short: Option<char>,
    pub description: String,
    pub flag_type: FlagType,
    pub location: Location,
    /// Required as declared, unless an environment variable supplied a value
    pub required: bool,
    pub default: Option<String>,
    /// The parameter carries `x-swagger-cmd-env`
    pub from_env: bool,
    /// `default` holds the non-empty value of that variable
    pub env_supplied: bool,
}

impl FlagDescriptor {
    /// Whether the command line must supply this flag. Path parameters never
    /// are: their value always lands in the path template.
    pub fn cli_required(&self) -> bool {
        self.required && self.location != Location::Path
    }
}

/// Shared parameters keyed by `#/parameters/<name>`.
///
/// A `None` entry is a parameter that exists but is not a flag (body or
/// unsupported type), so references to it are skipped rather than missing.
#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    entries: HashMap<String, Option<FlagDescriptor>>,
}

impl ParameterRegistry {
    pub fn reference(name: &str) -> String {
        format!("#/parameters/{name}")
    }

    pub fn insert(&mut self, name: &str, flag: Option<FlagDescriptor>) {
        self.entries.insert(Self::reference(name), flag);
    }

    pub fn resolve(&self, reference: &str) -> Result<Option<&FlagDescriptor>, ParameterError> {
        self.entries
            .get(reference)
            .map(Option::as_ref)
            .ok_or_else(|| ParameterError::MissingReference {
                reference: reference.to_owned(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compile one parameter node into a flag.
///
/// `Ok(None)` means the parameter is not a flag: body parameters are skipped
/// silently, unsupported types with a warning.
pub fn compile_parameter(
    node: &ParameterNode,
    registry: &ParameterRegistry,
    env: &dyn Environment,
) -> Result<Option<FlagDescriptor>, ParameterError> {
    if let Some(reference) = &node.reference {
        return registry.resolve(reference).map(|flag| flag.cloned());
    }

    if node.location.is_body() {
        return Ok(None);
    }

    if node.name.is_empty() {
        tracing::warn!("skipping parameter without a name");
        return Ok(None);
    }

    let Some(flag_type) = FlagType::from_parameter(node) else {
        tracing::warn!(
            parameter = %node.name,
            r#type = node.param_type.as_deref().unwrap_or(""),
            "unknown type, skipping flag"
        );
        return Ok(None);
    };

    let mut required = node.required;
    let mut default = node.default.as_ref().and_then(render_default);
    let mut env_supplied = false;
    if let Some(var) = &node.env {
        let value = env.var(var).unwrap_or_default();
        if !value.is_empty() {
            required = false;
            default = Some(value);
            env_supplied = true;
        }
    }

    Ok(Some(FlagDescriptor {
        name: to_kebab_case(&node.name),
        param_name: node.name.clone(),
        short: parse_short(node),
        description: node.description.clone().unwrap_or_default(),
        flag_type,
        location: node.location,
        required,
        default,
        from_env: node.env.is_some(),
        env_supplied,
    }))
}

fn parse_short(node: &ParameterNode) -> Option<char> {
    let short = node.short.as_deref().filter(|s| !s.is_empty())?;
    let mut chars = short.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => {
            tracing::warn!(
                parameter = %node.name,
                short,
                "x-swagger-cmd-short must be a single character, ignoring"
            );
            None
        }
    }
}

fn render_default(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(render_default)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value) -> ParameterNode {
        serde_json::from_value(value).unwrap()
    }

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    fn env_with(key: &str, value: &str) -> HashMap<String, String> {
        HashMap::from([(key.to_string(), value.to_string())])
    }

    #[test]
    fn compile_parameter_derives_scalar_flag() {
        let flag = compile_parameter(
            &node(json!({
                "name": "podId",
                "in": "query",
                "type": "integer",
                "required": true,
                "default": 3,
                "description": "Pod ID",
                "x-swagger-cmd-short": "p"
            })),
            &ParameterRegistry::default(),
            &no_env(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(flag.name, "pod-id");
        assert_eq!(flag.param_name, "podId");
        assert_eq!(flag.short, Some('p'));
        assert_eq!(flag.description, "Pod ID");
        assert_eq!(flag.flag_type, FlagType::Scalar(ScalarType::Integer));
        assert_eq!(flag.location, Location::Query);
        assert!(flag.required);
        assert_eq!(flag.default.as_deref(), Some("3"));
        assert!(!flag.from_env);
    }

    #[test]
    fn compile_parameter_derives_array_flag() {
        let flag = compile_parameter(
            &node(json!({
                "name": "tags",
                "in": "query",
                "type": "array",
                "items": { "type": "string" },
                "default": ["a", "b"]
            })),
            &ParameterRegistry::default(),
            &no_env(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(flag.flag_type, FlagType::Array(ScalarType::String));
        assert_eq!(flag.flag_type.to_string(), "array.string");
        assert_eq!(flag.default.as_deref(), Some("a,b"));
    }

    #[test]
    fn compile_parameter_skips_unknown_types() {
        let registry = ParameterRegistry::default();
        for value in [
            json!({ "name": "f", "in": "query", "type": "file" }),
            json!({ "name": "o", "in": "query", "type": "array", "items": { "type": "object" } }),
            json!({ "name": "n", "in": "query" }),
        ] {
            assert_eq!(
                compile_parameter(&node(value), &registry, &no_env()).unwrap(),
                None
            );
        }
    }

    #[test]
    fn compile_parameter_skips_body_parameters() {
        let flag = compile_parameter(
            &node(json!({ "name": "payload", "in": "body", "type": "string" })),
            &ParameterRegistry::default(),
            &no_env(),
        )
        .unwrap();
        assert!(flag.is_none());
    }

    #[test]
    fn compile_parameter_ref_matches_inline() {
        let inline = node(json!({
            "name": "pageSize",
            "in": "query",
            "type": "integer",
            "description": "Page size",
            "default": 50
        }));
        let env = no_env();

        let mut registry = ParameterRegistry::default();
        let shared = compile_parameter(&inline, &registry, &env).unwrap();
        registry.insert("pageSize", shared);

        let by_ref = compile_parameter(
            &node(json!({ "$ref": "#/parameters/pageSize" })),
            &registry,
            &env,
        )
        .unwrap();
        let direct = compile_parameter(&inline, &ParameterRegistry::default(), &env).unwrap();

        assert!(by_ref.is_some());
        assert_eq!(by_ref, direct);
    }

    #[test]
    fn compile_parameter_missing_ref_is_error() {
        let err = compile_parameter(
            &node(json!({ "$ref": "#/parameters/nope" })),
            &ParameterRegistry::default(),
            &no_env(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            ParameterError::MissingReference {
                reference: "#/parameters/nope".into()
            }
        );
    }

    #[test]
    fn compile_parameter_ref_to_skipped_parameter_is_none() {
        let mut registry = ParameterRegistry::default();
        registry.insert("body", None);

        let flag = compile_parameter(
            &node(json!({ "$ref": "#/parameters/body" })),
            &registry,
            &no_env(),
        )
        .unwrap();
        assert!(flag.is_none());
    }

    #[test]
    fn compile_parameter_env_value_overrides_required_and_default() {
        let param = node(json!({
            "name": "token",
            "in": "query",
            "type": "string",
            "required": true,
            "default": "spec-default",
            "x-swagger-cmd-env": "API_TOKEN"
        }));

        let flag = compile_parameter(
            &param,
            &ParameterRegistry::default(),
            &env_with("API_TOKEN", "secret"),
        )
        .unwrap()
        .unwrap();

        assert!(!flag.required);
        assert_eq!(flag.default.as_deref(), Some("secret"));
        assert!(flag.from_env);
        assert!(flag.env_supplied);
    }

    #[test]
    fn compile_parameter_empty_env_keeps_declared_required() {
        let param = node(json!({
            "name": "token",
            "in": "query",
            "type": "string",
            "required": true,
            "x-swagger-cmd-env": "API_TOKEN"
        }));
        let registry = ParameterRegistry::default();

        for env in [no_env(), env_with("API_TOKEN", "")] {
            let flag = compile_parameter(&param, &registry, &env).unwrap().unwrap();
            assert!(flag.required);
            assert!(flag.from_env);
            assert!(!flag.env_supplied);
            assert_eq!(flag.default, None);
        }
    }

    #[test]
    fn compile_parameter_unset_env_keeps_document_default_unsupplied() {
        let param = node(json!({
            "name": "zone",
            "in": "query",
            "type": "string",
            "default": "doc-zone",
            "x-swagger-cmd-env": "ZONE"
        }));

        let flag = compile_parameter(&param, &ParameterRegistry::default(), &no_env())
            .unwrap()
            .unwrap();

        assert_eq!(flag.default.as_deref(), Some("doc-zone"));
        assert!(flag.from_env);
        assert!(!flag.env_supplied);
    }

    #[test]
    fn compile_parameter_ignores_multi_character_short() {
        let flag = compile_parameter(
            &node(json!({
                "name": "verbose",
                "in": "query",
                "type": "boolean",
                "x-swagger-cmd-short": "vv"
            })),
            &ParameterRegistry::default(),
            &no_env(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(flag.short, None);
    }

    #[test]
    fn compile_parameter_maps_number_to_string() {
        let flag = compile_parameter(
            &node(json!({ "name": "ratio", "in": "query", "type": "number", "default": 0.5 })),
            &ParameterRegistry::default(),
            &no_env(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(flag.flag_type, FlagType::Scalar(ScalarType::String));
        assert_eq!(flag.default.as_deref(), Some("0.5"));
    }
}
