use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use signal_hook::{consts::TERM_SIGNALS, flag};
use swagger_cmd::{App, AppError, CliConfig};
use tracing_subscriber::EnvFilter;

const NAME: &str = "swagger-cmd";
const DEFAULT_BASE_URL: &str = "http://localhost:8010";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = CliConfig::new(
        NAME,
        "Run the commands a remote swagger document describes",
        DEFAULT_BASE_URL,
    )
    .send_raw_args(true)
    .health_failed_message("health check failed, is the server up? ({error})");
    let app = App::with_defaults(config).context("failed to build HTTP client")?;

    // First signal cancels the call in flight, a second one exits right away.
    let cancelled = app.cancel_token().shared_flag();
    for sig in TERM_SIGNALS {
        flag::register_conditional_shutdown(*sig, 1, Arc::clone(&cancelled))
            .context("failed to install signal handler")?;
        flag::register(*sig, Arc::clone(&cancelled)).context("failed to install signal handler")?;
    }

    let args: Vec<String> = std::env::args().collect();
    let (stdout, stderr) = (io::stdout(), io::stderr());
    match app.run(args, &mut stdout.lock(), &mut stderr.lock()) {
        Err(AppError::Cli(err)) => err.exit(),
        other => Ok(other?),
    }
}
