//! Error types for the swagger-cmd crate.

use std::fmt;

use thiserror::Error;

/// Errors raised while deep-merging two JSON documents.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MergeError {
    #[error("error in data JSON")]
    Data(#[source] serde_json::Error),

    #[error("error in patch JSON")]
    Patch(#[source] serde_json::Error),

    #[error("error writing merged JSON")]
    Encode(#[source] serde_json::Error),
}

/// Errors raised while turning raw spec text into the typed document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpecError {
    #[error("failed to apply x-swagger-override")]
    Override(#[from] MergeError),

    #[error("invalid swagger document")]
    Decode(#[source] serde_json::Error),
}

/// Errors raised while compiling a single parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParameterError {
    #[error("missing reference {reference}")]
    MissingReference { reference: String },
}

/// Why one operation could not be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FailureReason {
    #[error("missing method")]
    MissingMethod,

    #[error("missing path")]
    MissingPath,

    #[error("invalid method {method}")]
    InvalidMethod { method: String },

    #[error("missing command name (set x-swagger-cmd or operationId)")]
    MissingName,

    #[error("duplicate command name")]
    DuplicateName,

    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

/// A single offending operation in an aggregated [`CompileError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    /// Command name or `METHOD path` when no name is known
    pub operation: String,
    pub reason: FailureReason,
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.reason)
    }
}

/// Every operation that failed to compile. Never partial: when this is
/// returned no commands are.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to generate commands: ({})", join_failures(.failures))]
pub struct CompileError {
    pub failures: Vec<OperationFailure>,
}

fn join_failures(failures: &[OperationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("HTTP request failed")]
    Request(#[source] reqwest::Error),

    #[error("request cancelled")]
    Cancelled,

    #[error("transport I/O failed")]
    Io(#[from] std::io::Error),
}

/// Errors raised while fetching the swagger document or probing health.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error("invalid URL: {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("HTTP {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to read response body from {url}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during API dispatch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("invalid request URL: {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("path parameter {name} was not bound")]
    UnboundPathParameter { name: String },

    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    #[error("HTTP request failed")]
    Transport(#[source] TransportError),

    #[error("failed to write output")]
    Output(#[source] std::io::Error),
}

/// Top-level errors returned by [`App::run`](crate::app::App::run).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error(transparent)]
    Cli(#[from] clap::Error),

    #[error("health check failed")]
    Health(#[source] FetchError),

    #[error("failed to get swagger")]
    Fetch(#[source] FetchError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("unknown command {name}")]
    UnknownCommand { name: String },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
