//! Typed document → command set
//!
//! Every operation marked with `x-swagger-cmd`, and every entry of the
//! top-level `x-swagger-cmds` map, becomes one [`Command`]. Failures are
//! collected across the whole document and reported together.

use std::collections::{BTreeMap, HashSet};

use reqwest::Method;

use crate::error::{CompileError, FailureReason, OperationFailure, ParameterError};
use crate::flag::{compile_parameter, Environment, FlagDescriptor, ParameterRegistry};
use crate::naming::to_kebab_case;
use crate::spec::{ParameterNode, SwaggerDoc, METHODS};

/// Global flag names a compiled parameter may not take.
pub const RESERVED_FLAGS: [&str; 4] = ["help", "base-url", "swagger-path", "health-path"];

/// One API operation made executable.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Command {
    pub name: String,
    pub aliases: Vec<String>,
    pub method: Method,
    /// URL path template (e.g. "/pods/{podId}")
    pub path: String,
    pub summary: String,
    pub description: String,
    /// Compiled flags keyed by flag name
    pub flags: BTreeMap<String, FlagDescriptor>,
    /// Run this command when no subcommand is named
    pub is_default: bool,
}

impl Command {
    pub fn flag(&self, name: &str) -> Option<&FlagDescriptor> {
        self.flags.get(name)
    }
}

/// All compiled commands of one document.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CommandSet {
    pub commands: Vec<Command>,
    pub parameters: ParameterRegistry,
    pub base_url: String,
}

impl CommandSet {
    /// Find a command by name or alias.
    pub fn find(&self, name: &str) -> Option<&Command> {
        self.commands
            .iter()
            .find(|c| c.name == name || c.aliases.iter().any(|a| a == name))
    }

    pub fn default_command(&self) -> Option<&Command> {
        self.commands.iter().find(|c| c.is_default)
    }
}

/// Where a command's identity comes from before it is compiled.
struct CommandSource<'a> {
    name: Option<String>,
    method: Option<&'a str>,
    path: Option<&'a str>,
    aliases: &'a [String],
    is_default: bool,
}

impl CommandSource<'_> {
    fn label(&self) -> String {
        match (&self.name, self.method, self.path) {
            (Some(name), _, _) => name.clone(),
            (None, Some(method), Some(path)) => format!("{} {path}", method.to_uppercase()),
            (None, _, Some(path)) => path.to_owned(),
            _ => "<unnamed>".to_owned(),
        }
    }
}

/// Compile the document into a [`CommandSet`].
///
/// Either every command compiles or a [`CompileError`] listing every
/// offending operation is returned.
pub fn compile(
    doc: &SwaggerDoc,
    base_url: &str,
    env: &dyn Environment,
) -> Result<CommandSet, CompileError> {
    let mut failures = Vec::new();

    let mut parameters = ParameterRegistry::default();
    for (name, node) in &doc.parameters {
        if node.location.is_body() {
            parameters.insert(name, None);
            continue;
        }
        match compile_parameter(node, &parameters, env) {
            Ok(flag) => parameters.insert(name, flag),
            Err(err) => failures.push(OperationFailure {
                operation: ParameterRegistry::reference(name),
                reason: err.into(),
            }),
        }
    }

    let compiler = Compiler {
        doc,
        registry: &parameters,
        env,
    };

    let mut commands: Vec<Command> = Vec::new();
    let mut taken: HashSet<String> = HashSet::new();
    for source in command_sources(doc) {
        let label = source.label();
        let result = compiler.command(&source).and_then(|command| {
            let names = std::iter::once(&command.name).chain(&command.aliases);
            if names.clone().any(|n| taken.contains(n)) {
                return Err(FailureReason::DuplicateName);
            }
            taken.extend(names.cloned());
            Ok(command)
        });
        match result {
            Ok(command) => commands.push(command),
            Err(reason) => failures.push(OperationFailure {
                operation: label,
                reason,
            }),
        }
    }

    if !failures.is_empty() {
        return Err(CompileError { failures });
    }

    tracing::debug!(commands = commands.len(), "compiled swagger commands");

    Ok(CommandSet {
        commands,
        parameters,
        base_url: base_url.to_owned(),
    })
}

/// Marked operations first, in path and method order, then `x-swagger-cmds`.
fn command_sources(doc: &SwaggerDoc) -> Vec<CommandSource<'_>> {
    let mut sources = Vec::new();

    for (path, item) in &doc.paths {
        for (method, op) in item.operations() {
            let Some(marker) = &op.command else {
                continue;
            };
            let name = if marker.is_empty() {
                op.operation_id.as_deref().map(to_kebab_case)
            } else {
                Some(marker.clone())
            };
            sources.push(CommandSource {
                name,
                method: Some(method),
                path: Some(path),
                aliases: &op.aliases,
                is_default: op.is_default,
            });
        }
    }

    for (name, entry) in &doc.commands {
        sources.push(CommandSource {
            name: Some(name.clone()),
            method: entry.method.as_deref(),
            path: entry.path.as_deref(),
            aliases: &entry.alias,
            is_default: entry.default,
        });
    }

    sources
}

struct Compiler<'a> {
    doc: &'a SwaggerDoc,
    registry: &'a ParameterRegistry,
    env: &'a dyn Environment,
}

impl Compiler<'_> {
    fn command(&self, source: &CommandSource<'_>) -> Result<Command, FailureReason> {
        let method = source.method.ok_or(FailureReason::MissingMethod)?;
        let path = source.path.ok_or(FailureReason::MissingPath)?;
        let name = source.name.clone().ok_or(FailureReason::MissingName)?;
        let method = parse_method(method)?;

        let item = self.doc.paths.get(path);
        let op = item.and_then(|item| item.operation(method.as_str()));
        if op.is_none() {
            tracing::debug!(command = %name, %method, path, "no operation documented for command");
        }
        let path_params = item.map(|item| item.parameters.as_slice()).unwrap_or_default();
        let op_params = op.map(|op| op.parameters.as_slice()).unwrap_or_default();

        Ok(Command {
            flags: self.flags(path_params, op_params)?,
            aliases: source.aliases.to_vec(),
            method,
            path: path.to_owned(),
            summary: op.and_then(|op| op.summary.clone()).unwrap_or_default(),
            description: op.and_then(|op| op.description.clone()).unwrap_or_default(),
            is_default: source.is_default,
            name,
        })
    }

    /// Path-level parameters first so operation-level ones overwrite them.
    fn flags(
        &self,
        path_params: &[ParameterNode],
        op_params: &[ParameterNode],
    ) -> Result<BTreeMap<String, FlagDescriptor>, ParameterError> {
        let mut flags = BTreeMap::new();
        for node in path_params.iter().chain(op_params) {
            let Some(flag) = compile_parameter(node, self.registry, self.env)? else {
                continue;
            };
            if RESERVED_FLAGS.contains(&flag.name.as_str()) {
                tracing::warn!(flag = %flag.name, "parameter shadows a global flag, skipping");
                continue;
            }
            flags.insert(flag.name.clone(), flag);
        }

        dedupe_shorts(&mut flags);
        Ok(flags)
    }
}

fn parse_method(method: &str) -> Result<Method, FailureReason> {
    let invalid = || FailureReason::InvalidMethod {
        method: method.to_owned(),
    };
    let lower = method.to_ascii_lowercase();
    if !METHODS.contains(&lower.as_str()) {
        return Err(invalid());
    }
    Method::from_bytes(lower.to_ascii_uppercase().as_bytes()).map_err(|_| invalid())
}

/// Drop short aliases that collide with `-h` or an earlier flag.
fn dedupe_shorts(flags: &mut BTreeMap<String, FlagDescriptor>) {
    let mut seen: HashSet<char> = HashSet::from(['h']);
    for flag in flags.values_mut() {
        if let Some(short) = flag.short {
            if !seen.insert(short) {
                tracing::warn!(flag = %flag.name, %short, "short alias already in use, ignoring");
                flag.short = None;
            }
        }
    }
}
