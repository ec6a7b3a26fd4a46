//! CommandSet → clap Command tree builder
//!
//! Registers one subcommand per compiled [`Command`](crate::compile::Command),
//! plus the global flags every invocation understands. Every flag value is
//! stored as a `String` so binding does not care about the flag's type.

use std::time::Duration;

use clap::builder::{BoolishValueParser, TypedValueParser, ValueParser};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::compile::{self, CommandSet};
use crate::dispatch::{BoundValue, BoundValues};
use crate::flag::{FlagDescriptor, FlagType, ScalarType};

pub const BASE_URL_FLAG: &str = "base-url";
pub const SPEC_PATH_FLAG: &str = "swagger-path";
pub const HEALTH_PATH_FLAG: &str = "health-path";

const GLOBAL_FLAGS: [&str; 3] = [BASE_URL_FLAG, SPEC_PATH_FLAG, HEALTH_PATH_FLAG];

/// Configuration for building a CLI from a remote swagger document.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CliConfig {
    /// Root command name (e.g. "kubectl-api", "myapi"). Also the user agent.
    pub name: String,
    /// Root command about/description
    pub about: String,
    /// Default base URL for the API
    pub default_base_url: String,
    /// Default path of the swagger document on the remote
    pub default_spec_path: String,
    /// Default health probe path. Empty disables the probe.
    pub default_health_path: String,
    /// Hint printed to stderr when the health probe fails
    pub health_failed_message: Option<String>,
    /// Send the invocation as `X-Raw-Args`
    pub send_raw_args: bool,
    /// Per-request timeout
    pub timeout: Option<Duration>,
}

impl CliConfig {
    pub fn new(
        name: impl Into<String>,
        about: impl Into<String>,
        default_base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            about: about.into(),
            default_base_url: default_base_url.into(),
            default_spec_path: "/swagger.json".to_owned(),
            default_health_path: String::new(),
            health_failed_message: None,
            send_raw_args: false,
            timeout: None,
        }
    }

    pub fn spec_path(mut self, path: impl Into<String>) -> Self {
        self.default_spec_path = path.into();
        self
    }

    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.default_health_path = path.into();
        self
    }

    pub fn health_failed_message(mut self, message: impl Into<String>) -> Self {
        self.health_failed_message = Some(message.into());
        self
    }

    pub fn send_raw_args(mut self, enabled: bool) -> Self {
        self.send_raw_args = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Prefix of the environment variables backing the global flags.
    ///
    /// `"my-api"` → `"MY_API"`
    pub fn env_prefix(&self) -> String {
        self.name.to_uppercase().replace('-', "_")
    }
}

/// Values of the global flags after the bootstrap parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Globals {
    pub base_url: String,
    pub spec_path: String,
    pub health_path: String,
}

fn global_args(config: &CliConfig) -> Vec<Arg> {
    let prefix = config.env_prefix();
    let health = Arg::new(HEALTH_PATH_FLAG)
        .long(HEALTH_PATH_FLAG)
        .global(true)
        .env(format!("{prefix}_HEALTH_PATH"))
        .help("Health check path on the remote; empty to skip");
    let health = if config.default_health_path.is_empty() {
        health
    } else {
        health.default_value(config.default_health_path.clone())
    };

    vec![
        Arg::new(BASE_URL_FLAG)
            .long(BASE_URL_FLAG)
            .global(true)
            .env(format!("{prefix}_BASE_URL"))
            .default_value(config.default_base_url.clone())
            .help("API base URL"),
        Arg::new(SPEC_PATH_FLAG)
            .long(SPEC_PATH_FLAG)
            .global(true)
            .env(format!("{prefix}_SWAGGER_PATH"))
            .default_value(config.default_spec_path.clone())
            .help("Path of the swagger document on the remote"),
        health,
    ]
}

/// Root command that only knows the global flags.
pub fn bootstrap_command(config: &CliConfig) -> Command {
    Command::new(config.name.clone())
        .disable_help_flag(true)
        .args(global_args(config))
}

/// Keep the program name and global flag tokens, dropping everything else.
pub fn global_tokens(args: &[String]) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    if let Some(program) = iter.next() {
        tokens.push(program.clone());
    }

    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }
        let Some(flag) = arg.strip_prefix("--") else {
            continue;
        };
        if GLOBAL_FLAGS.contains(&flag) {
            tokens.push(arg.clone());
            if let Some(value) = iter.next() {
                tokens.push(value.clone());
            }
        } else if GLOBAL_FLAGS
            .iter()
            .any(|g| flag.strip_prefix(g).is_some_and(|rest| rest.starts_with('=')))
        {
            tokens.push(arg.clone());
        }
    }
    tokens
}

/// Resolve the global flags before the document is known.
///
/// Anything that is not a global flag is ignored.
pub fn parse_globals(config: &CliConfig, args: &[String]) -> Result<Globals, clap::Error> {
    let matches = bootstrap_command(config).try_get_matches_from(global_tokens(args))?;
    let value = |id: &str| {
        matches
            .get_one::<String>(id)
            .cloned()
            .unwrap_or_default()
    };
    Ok(Globals {
        base_url: value(BASE_URL_FLAG),
        spec_path: value(SPEC_PATH_FLAG),
        health_path: value(HEALTH_PATH_FLAG),
    })
}

/// Build a clap `Command` tree from a compiled command set.
///
/// Structure: `<name> <command> [--flags]`
pub fn build_cli(config: &CliConfig, set: &CommandSet) -> Command {
    let mut root = Command::new(config.name.clone())
        .about(config.about.clone())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args(global_args(config));

    for command in &set.commands {
        root = root.subcommand(build_command(command));
    }
    root
}

fn build_command(command: &compile::Command) -> Command {
    let mut cmd = Command::new(command.name.clone())
        .visible_aliases(command.aliases.clone())
        .about(command.summary.clone());
    if !command.description.is_empty() {
        cmd = cmd.long_about(command.description.clone());
    }

    for flag in command.flags.values() {
        cmd = cmd.arg(build_arg(flag));
    }
    cmd
}

fn build_arg(flag: &FlagDescriptor) -> Arg {
    let required = flag.cli_required();
    let mut arg = Arg::new(flag.name.clone())
        .long(flag.name.clone())
        .help(flag.description.clone())
        .required(required);
    if let Some(short) = flag.short {
        arg = arg.short(short);
    }

    arg = match flag.flag_type {
        FlagType::Scalar(ScalarType::Boolean) => arg
            .action(ArgAction::Set)
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_parser(value_parser(ScalarType::Boolean)),
        FlagType::Scalar(scalar) => arg
            .action(ArgAction::Set)
            .value_parser(value_parser(scalar)),
        FlagType::Array(scalar) => arg
            .action(ArgAction::Append)
            .value_delimiter(',')
            .value_parser(value_parser(scalar)),
    };

    // A required flag must be given explicitly, so its default is never used.
    match &flag.default {
        _ if required => arg,
        Some(default) if flag.flag_type.is_array() => {
            if default.is_empty() {
                arg
            } else {
                arg.default_values(default.split(',').map(str::to_owned).collect::<Vec<_>>())
            }
        }
        Some(default) => arg.default_value(default.clone()),
        None => arg,
    }
}

/// Validates by type but always yields a `String`.
fn value_parser(scalar: ScalarType) -> ValueParser {
    match scalar {
        ScalarType::String => ValueParser::string(),
        ScalarType::Integer => {
            ValueParser::new(clap::value_parser!(i64).map(|n: i64| n.to_string()))
        }
        ScalarType::Boolean => {
            ValueParser::new(BoolishValueParser::new().map(|b: bool| b.to_string()))
        }
    }
}

/// Extract the values clap bound to `command`'s flags.
pub fn bound_values(command: &compile::Command, matches: &ArgMatches) -> BoundValues {
    command
        .flags
        .values()
        .filter_map(|flag| {
            let values: Vec<String> = matches
                .try_get_many::<String>(&flag.name)
                .ok()
                .flatten()?
                .cloned()
                .collect();
            let explicit = matches!(
                matches.value_source(&flag.name),
                Some(ValueSource::CommandLine | ValueSource::EnvVariable)
            );
            Some((flag.name.clone(), BoundValue { values, explicit }))
        })
        .collect()
}

/// Prepend the default command when the invocation names none.
///
/// Help requests and invocations whose first positional is already a known
/// command are left alone.
pub fn with_default_command(args: Vec<String>, set: &CommandSet) -> Vec<String> {
    let Some(default) = set.default_command() else {
        return args;
    };
    if args
        .iter()
        .skip(1)
        .any(|a| a == "help" || a == "-h" || a == "--help")
    {
        return args;
    }
    if first_positional(&args).is_some_and(|name| set.find(name).is_some()) {
        return args;
    }

    tracing::debug!(command = %default.name, "running default command");
    let mut args = args;
    let at = args.len().min(1);
    args.insert(at, default.name.clone());
    args
}

fn first_positional(args: &[String]) -> Option<&str> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if let Some(flag) = arg.strip_prefix("--") {
            if GLOBAL_FLAGS.contains(&flag) {
                iter.next();
            }
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return Some(arg);
    }
    None
}
