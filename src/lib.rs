//! Build a command-line client at runtime from a remote Swagger document.
//!
//! Fetches the document, applies its `x-swagger-override` patch, compiles
//! every marked operation into a command with typed flags, builds a clap
//! `Command` tree, and dispatches the chosen command as an HTTP request.
//!
//! # Usage
//!
//! ```no_run
//! use swagger_cmd::{App, CliConfig};
//!
//! let config = CliConfig::new("myapi", "My API CLI", "http://localhost:8010")
//!     .health_path("/healthz");
//! let app = App::with_defaults(config).unwrap();
//!
//! let args: Vec<String> = std::env::args().collect();
//! app.run(args, &mut std::io::stdout(), &mut std::io::stderr()).unwrap();
//! ```
//!
//! The pieces are usable on their own:
//!
//! ```
//! use std::collections::HashMap;
//! use swagger_cmd::{compile, load_document};
//!
//! let doc = load_document(r#"{"paths":{"/pods":{"get":{"x-swagger-cmd":"list"}}}}"#).unwrap();
//! let set = compile(&doc, "http://localhost:8010", &HashMap::<String, String>::new()).unwrap();
//! assert_eq!(set.commands[0].name, "list");
//! ```

pub mod app;
pub mod builder;
pub mod compile;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod flag;
pub mod merge;
pub mod naming;
pub mod overrides;
pub mod spec;
pub mod trace;
pub mod transport;

pub use app::App;
pub use builder::{bound_values, build_cli, parse_globals, with_default_command, CliConfig, Globals};
pub use compile::{compile, Command, CommandSet};
pub use dispatch::{bind_path, bind_query, BoundValue, BoundValues, DispatchOptions, Dispatcher};
pub use error::{
    AppError, CompileError, DispatchError, FailureReason, FetchError, MergeError, OperationFailure,
    ParameterError, SpecError, TransportError,
};
pub use fetch::Remote;
pub use flag::{compile_parameter, Environment, FlagDescriptor, FlagType, ProcessEnv, ScalarType};
pub use merge::{merge_bytes, merge_values};
pub use naming::to_kebab_case;
pub use overrides::resolve_overrides;
pub use spec::{load_document, SwaggerDoc};
pub use trace::{NoopTracer, Tracer, W3cTracer};
pub use transport::{CancelToken, HttpRequest, HttpResponse, ReqwestTransport, Transport};

// Re-export dependencies for downstream crates
pub use clap;
pub use reqwest;
