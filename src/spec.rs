//! Swagger document → typed IR (intermediate representation)
//!
//! The override-resolved document is decoded once into plain records. Later
//! stages read fields instead of querying untyped JSON, and a malformed
//! document is rejected here in one place.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{MergeError, SpecError};
use crate::overrides::resolve_overrides_value;

/// Methods a path item may define, in the order commands are generated.
pub const METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

/// A decoded swagger document.
#[derive(Debug, Clone, Default, Deserialize)]
#[non_exhaustive]
pub struct SwaggerDoc {
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    /// Shared parameters addressable as `#/parameters/<name>`
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterNode>,
    /// Commands declared in the top-level `x-swagger-cmds` map
    #[serde(
        rename = "x-swagger-cmds",
        default,
        deserialize_with = "deserialize_command_entries"
    )]
    pub commands: BTreeMap<String, CommandEntry>,
}

/// All operations under one path template.
#[derive(Debug, Clone, Default, Deserialize)]
#[non_exhaustive]
pub struct PathItem {
    /// Path-level parameters shared by every method
    #[serde(default)]
    pub parameters: Vec<ParameterNode>,
    pub get: Option<Operation>,
    pub put: Option<Operation>,
    pub post: Option<Operation>,
    pub delete: Option<Operation>,
    pub options: Option<Operation>,
    pub head: Option<Operation>,
    pub patch: Option<Operation>,
}

impl PathItem {
    /// Look up an operation by method name, case-insensitively.
    pub fn operation(&self, method: &str) -> Option<&Operation> {
        match method.to_ascii_lowercase().as_str() {
            "get" => self.get.as_ref(),
            "put" => self.put.as_ref(),
            "post" => self.post.as_ref(),
            "delete" => self.delete.as_ref(),
            "options" => self.options.as_ref(),
            "head" => self.head.as_ref(),
            "patch" => self.patch.as_ref(),
            _ => None,
        }
    }

    /// Defined operations with their lowercase method names.
    pub fn operations(&self) -> impl Iterator<Item = (&'static str, &Operation)> {
        METHODS
            .iter()
            .filter_map(move |method| self.operation(method).map(|op| (*method, op)))
    }
}

/// One HTTP method under one path.
#[derive(Debug, Clone, Default, Deserialize)]
#[non_exhaustive]
pub struct Operation {
    /// Present when the operation should be exposed as a command
    #[serde(rename = "x-swagger-cmd", default, deserialize_with = "lenient")]
    pub command: Option<String>,
    #[serde(rename = "x-swagger-cmd-alias", default, deserialize_with = "lenient")]
    pub aliases: Vec<String>,
    #[serde(rename = "x-swagger-cmd-default", default, deserialize_with = "lenient")]
    pub is_default: bool,
    #[serde(rename = "operationId")]
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterNode>,
}

/// A parameter definition, or a `$ref` pointing at a shared one.
#[derive(Debug, Clone, Default, Deserialize)]
#[non_exhaustive]
pub struct ParameterNode {
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "in", default)]
    pub location: Location,
    #[serde(rename = "type")]
    pub param_type: Option<String>,
    pub items: Option<Items>,
    #[serde(default)]
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Single-character flag alias
    #[serde(rename = "x-swagger-cmd-short", default, deserialize_with = "lenient")]
    pub short: Option<String>,
    /// Environment variable supplying the default value
    #[serde(rename = "x-swagger-cmd-env", default, deserialize_with = "lenient")]
    pub env: Option<String>,
}

/// Element description of an `array` parameter.
#[derive(Debug, Clone, Default, Deserialize)]
#[non_exhaustive]
pub struct Items {
    #[serde(rename = "type")]
    pub item_type: Option<String>,
}

/// Where a parameter travels in the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Location {
    Path,
    Query,
    Header,
    Body,
    FormData,
    #[default]
    #[serde(other)]
    Other,
}

impl Location {
    /// Body-like parameters cannot be expressed as flags.
    pub fn is_body(self) -> bool {
        matches!(self, Self::Body | Self::FormData)
    }
}

/// An entry of the top-level `x-swagger-cmds` map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct CommandEntry {
    pub method: Option<String>,
    pub path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub alias: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub default: bool,
}

/// Decode an optional extension, falling back to its default when the value
/// has the wrong shape. A bad extension never rejects the whole document.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Ok(decoded),
        Err(err) => {
            tracing::warn!(value = %value, error = %err, "ignoring malformed swagger-cmd extension");
            Ok(T::default())
        }
    }
}

/// Array-valued entries are grouping metadata, not commands, and are dropped.
fn deserialize_command_entries<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, CommandEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    let mut entries = BTreeMap::new();
    for (name, value) in raw {
        if value.is_array() {
            continue;
        }
        let entry = serde_json::from_value(value).map_err(|err| {
            <D::Error as serde::de::Error>::custom(format!("x-swagger-cmds.{name}: {err}"))
        })?;
        entries.insert(name, entry);
    }
    Ok(entries)
}

/// Resolve overrides in `raw` and decode the result.
pub fn load_document(raw: &str) -> Result<SwaggerDoc, SpecError> {
    let value: Value = serde_json::from_str(raw).map_err(MergeError::Data)?;
    serde_json::from_value(resolve_overrides_value(value)).map_err(SpecError::Decode)
}
