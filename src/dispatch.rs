//! Bound flag values → HTTP request dispatch
//!
//! Takes a compiled [`Command`] and the values bound to its flags, builds the
//! request (path, query, headers), sends it through the injected transport and
//! prints the response body.

use std::collections::HashMap;
use std::io::Write;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use url::Url;

use crate::compile::Command;
use crate::error::DispatchError;
use crate::flag::FlagDescriptor;
use crate::spec::Location;
use crate::trace::{Span, Tracer};
use crate::transport::{endpoint, CancelToken, HttpRequest, Transport};

/// Header carrying the raw invocation, when enabled.
pub const RAW_ARGS_HEADER: &str = "x-raw-args";

/// Values bound to one flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundValue {
    pub values: Vec<String>,
    /// Supplied by the caller rather than taken from a default
    pub explicit: bool,
}

impl BoundValue {
    pub fn explicit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            explicit: true,
        }
    }

    pub fn defaulted<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            explicit: false,
        }
    }

    /// Wire form: array values are comma-joined.
    pub fn joined(&self) -> String {
        self.values.join(",")
    }
}

/// Bound values keyed by flag name.
pub type BoundValues = HashMap<String, BoundValue>;

/// Per-process request settings.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct DispatchOptions {
    pub user_agent: String,
    /// Sent as `X-Raw-Args` when present
    pub raw_args: Option<String>,
}

impl DispatchOptions {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            raw_args: None,
        }
    }

    pub fn raw_args(mut self, raw_args: impl Into<String>) -> Self {
        self.raw_args = Some(raw_args.into());
        self
    }
}

/// Executes compiled commands.
pub struct Dispatcher<'a> {
    transport: &'a dyn Transport,
    tracer: &'a dyn Tracer,
    cancel: &'a CancelToken,
    options: DispatchOptions,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        tracer: &'a dyn Tracer,
        cancel: &'a CancelToken,
        options: DispatchOptions,
    ) -> Self {
        Self {
            transport,
            tracer,
            cancel,
            options,
        }
    }

    /// Send `command` and write the trimmed response body to `out`.
    ///
    /// A body that cannot be read is reported on `err` and is not an error.
    pub fn execute(
        &self,
        command: &Command,
        base_url: &str,
        bound: &BoundValues,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<(), DispatchError> {
        let span = self.tracer.start_span("cli-run");
        let request = self.build_request(command, base_url, bound, &span)?;

        let mut response = self
            .transport
            .send(request, self.cancel)
            .map_err(DispatchError::Transport)?;
        if !response.status.is_success() {
            tracing::warn!(command = %command.name, status = %response.status, "non-success response");
        }

        let body = match response.bytes() {
            Ok(body) => body,
            Err(read_err) => {
                tracing::error!(error = %read_err, "failed to read response body");
                writeln!(err, "ERR: {read_err}").map_err(DispatchError::Output)?;
                Vec::new()
            }
        };
        out.write_all(trim_newlines(&body))
            .and_then(|()| out.write_all(b"\n"))
            .map_err(DispatchError::Output)
    }

    fn build_request(
        &self,
        command: &Command,
        base_url: &str,
        bound: &BoundValues,
        span: &Span,
    ) -> Result<HttpRequest, DispatchError> {
        let path = bind_path(command, bound)?;
        let raw_url = endpoint(base_url, &path);
        let mut url = Url::parse(&raw_url).map_err(|source| DispatchError::InvalidUrl {
            url: raw_url.clone(),
            source,
        })?;

        let query = bind_query(command, bound);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(&query);
        }

        let mut request = HttpRequest::new(command.method.clone(), url);
        request.headers = self.headers(command, bound)?;
        self.tracer.inject(span, &mut request.headers);

        Ok(request)
    }

    fn headers(&self, command: &Command, bound: &BoundValues) -> Result<HeaderMap, DispatchError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/plain"));
        headers.insert(USER_AGENT, header_value("user-agent", &self.options.user_agent)?);
        if let Some(raw_args) = &self.options.raw_args {
            headers.insert(
                HeaderName::from_static(RAW_ARGS_HEADER),
                header_value(RAW_ARGS_HEADER, raw_args)?,
            );
        }

        for (flag, value) in sendable(command, bound, Location::Header) {
            let name = HeaderName::from_bytes(flag.param_name.as_bytes()).map_err(|_| {
                DispatchError::InvalidHeader {
                    name: flag.param_name.clone(),
                }
            })?;
            headers.insert(name, header_value(&flag.param_name, &value.joined())?);
        }

        Ok(headers)
    }
}

/// Substitute path flags into a copy of the command's path template.
///
/// Values are URL-encoded. Any placeholder left unbound is an error.
pub fn bind_path(command: &Command, bound: &BoundValues) -> Result<String, DispatchError> {
    let mut path = command.path.clone();
    for flag in command.flags.values() {
        if flag.location != Location::Path {
            continue;
        }
        let Some(value) = bound.get(&flag.name).filter(|v| !v.values.is_empty()) else {
            continue;
        };
        path = path.replace(
            &format!("{{{}}}", flag.param_name),
            &urlencoding::encode(&value.joined()),
        );
    }

    match unbound_placeholder(&path) {
        Some(name) => Err(DispatchError::UnboundPathParameter { name }),
        None => Ok(path),
    }
}

/// Query pairs in flag order, using the document's parameter names.
pub fn bind_query(command: &Command, bound: &BoundValues) -> Vec<(String, String)> {
    sendable(command, bound, Location::Query)
        .map(|(flag, value)| (flag.param_name.clone(), value.joined()))
        .collect()
}

/// Flags at `location` whose value should travel with the request: set by the
/// caller, or defaulted from a non-empty environment variable. Document
/// defaults never travel.
fn sendable<'c>(
    command: &'c Command,
    bound: &'c BoundValues,
    location: Location,
) -> impl Iterator<Item = (&'c FlagDescriptor, &'c BoundValue)> {
    command
        .flags
        .values()
        .filter(move |flag| flag.location == location)
        .filter_map(move |flag| bound.get(&flag.name).map(|value| (flag, value)))
        .filter(|(flag, value)| value.explicit || (flag.env_supplied && !value.joined().is_empty()))
}

/// Strip leading and trailing `\n` bytes, leaving everything else as sent.
fn trim_newlines(body: &[u8]) -> &[u8] {
    let start = body.iter().position(|&b| b != b'\n').unwrap_or(body.len());
    let end = body.iter().rposition(|&b| b != b'\n').map_or(start, |i| i + 1);
    &body[start..end]
}

fn unbound_placeholder(path: &str) -> Option<String> {
    let start = path.find('{')?;
    let len = path[start..].find('}')?;
    Some(path[start + 1..start + len].to_owned())
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, DispatchError> {
    HeaderValue::from_str(value).map_err(|_| DispatchError::InvalidHeader {
        name: name.to_owned(),
    })
}
