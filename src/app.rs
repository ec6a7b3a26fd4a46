//! Process orchestration
//!
//! One [`App::run`] is one invocation: resolve the global flags, probe the
//! remote, fetch and compile its swagger document, then parse the full
//! command line against the generated tree and dispatch.

use std::io::Write;

use crate::builder::{bound_values, build_cli, parse_globals, with_default_command, CliConfig};
use crate::compile::compile;
use crate::dispatch::{DispatchOptions, Dispatcher};
use crate::error::{AppError, FetchError, TransportError};
use crate::fetch::Remote;
use crate::flag::{Environment, ProcessEnv};
use crate::spec::load_document;
use crate::trace::{Tracer, W3cTracer};
use crate::transport::{CancelToken, ReqwestTransport, Transport};

/// Placeholder replaced by the probe error in
/// [`CliConfig::health_failed_message`].
pub const HEALTH_ERROR_PLACEHOLDER: &str = "{error}";

/// A configured client: transport, tracer and environment behind one
/// cancellation token.
///
/// Nothing cancels the token on its own. The caller owns it through
/// [`App::cancel_token`] and decides what triggers it, as the binary does
/// for termination signals.
pub struct App {
    config: CliConfig,
    transport: Box<dyn Transport>,
    tracer: Box<dyn Tracer>,
    env: Box<dyn Environment>,
    cancel: CancelToken,
}

impl App {
    pub fn new(
        config: CliConfig,
        transport: impl Transport + 'static,
        tracer: impl Tracer + 'static,
    ) -> Self {
        Self {
            config,
            transport: Box::new(transport),
            tracer: Box::new(tracer),
            env: Box::new(ProcessEnv),
            cancel: CancelToken::new(),
        }
    }

    /// reqwest transport honouring the configured timeout, W3C trace propagation.
    pub fn with_defaults(config: CliConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::new(config, transport, W3cTracer::new()))
    }

    /// Replace the environment consulted for `x-swagger-cmd-env`.
    pub fn with_env(mut self, env: impl Environment + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Token cancelling every network call of this app.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run one invocation. `args` includes the program name.
    pub fn run(
        &self,
        args: Vec<String>,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<(), AppError> {
        let globals = parse_globals(&self.config, &args)?;
        let remote = Remote {
            transport: self.transport.as_ref(),
            tracer: self.tracer.as_ref(),
            cancel: &self.cancel,
            user_agent: &self.config.name,
        };

        if let Err(e) = remote.check_health(&globals.base_url, &globals.health_path) {
            self.report_health_failure(&e, err);
            return Err(AppError::Health(e));
        }
        let raw = remote
            .fetch_spec(&globals.base_url, &globals.spec_path)
            .map_err(AppError::Fetch)?;

        let doc = load_document(&raw)?;
        let set = compile(&doc, &globals.base_url, self.env.as_ref())?;

        let raw_args = self.config.send_raw_args.then(|| args.join(" "));
        let args = with_default_command(args, &set);
        let matches = build_cli(&self.config, &set).try_get_matches_from(args)?;
        let (name, sub) = matches
            .subcommand()
            .ok_or_else(|| AppError::UnknownCommand {
                name: String::new(),
            })?;
        let command = set.find(name).ok_or_else(|| AppError::UnknownCommand {
            name: name.to_owned(),
        })?;

        let mut options = DispatchOptions::new(self.config.name.clone());
        if let Some(raw_args) = raw_args {
            options = options.raw_args(raw_args);
        }
        let dispatcher = Dispatcher::new(
            self.transport.as_ref(),
            self.tracer.as_ref(),
            &self.cancel,
            options,
        );
        dispatcher.execute(command, &set.base_url, &bound_values(command, sub), out, err)?;
        Ok(())
    }

    fn report_health_failure(&self, error: &FetchError, err: &mut dyn Write) {
        let Some(template) = &self.config.health_failed_message else {
            return;
        };
        let message = template.replace(HEALTH_ERROR_PLACEHOLDER, &error.to_string());
        if let Err(write_err) = writeln!(err, "{message}") {
            tracing::warn!(error = %write_err, "failed to print health hint");
        }
    }
}
