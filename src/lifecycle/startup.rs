//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn argv into validated `ServerOptions`
//! - Report the resolved configuration once logging is up
//!
//! # Design Decisions
//! - `prepare` has no side effects, so it can be driven from tests
//! - Flag errors stay `clap::Error` so the binary exits through clap

use std::ffi::OsString;

use thiserror::Error;

use crate::config::server::ServerOptions;
use crate::config::validation::OptionsError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Flags(#[from] clap::Error),

    #[error(transparent)]
    Options(#[from] OptionsError),
}

/// Parse, complete, and validate the server options from `args`.
pub fn prepare<I, A>(args: I) -> Result<ServerOptions, StartupError>
where
    I: IntoIterator<Item = A>,
    A: Into<OsString> + Clone,
{
    let (mut options, mut flags) = ServerOptions::try_parse_from(args)?;
    options.complete(&mut flags)?;
    options.validate()?;
    Ok(options)
}

/// Log the validated configuration, plugins in declaration order.
pub fn report(options: &ServerOptions) {
    tracing::info!(
        grpc_port = options.grpc_port,
        grpc_health_port = options.grpc_health_port,
        metrics_port = options.metrics_port,
        streaming = options.streaming,
        secure_serving = options.secure_serving,
        enable_pprof = options.enable_pprof,
        metrics_endpoint_auth = options.metrics_endpoint_auth,
        plugins = options.plugin_specs.len(),
        "Configuration validated"
    );

    for (index, spec) in options.plugin_specs.iter().enumerate() {
        tracing::info!(
            index,
            plugin_type = %spec.plugin_type,
            name = %spec.name,
            "Plugin declared"
        );
        if let Some(parameters) = &spec.parameters {
            tracing::debug!(name = %spec.name, %parameters, "Plugin parameters");
        }
    }
}
