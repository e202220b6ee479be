//! Server options.
//!
//! Lifecycle: `new` → `add_flags` → parse → `complete` → `validate`, then
//! read-only for the server bootstrap. Each step runs once; the options
//! are not meant to be reparsed.

use std::ffi::OsString;

use clap::{ArgAction, Args, Command};

use crate::config::flags::{self, FlagSet};
use crate::config::plugin::PluginSpecs;
use crate::config::validation::{validate_distinct_ports, validate_port, OptionsError};
use crate::observability::logging::LoggingOptions;

pub const DEFAULT_GRPC_PORT: i32 = 9004;
pub const DEFAULT_GRPC_HEALTH_PORT: i32 = 9005;
pub const DEFAULT_METRICS_PORT: i32 = 9090;

const APP_NAME: &str = "body-router";
const ABOUT: &str = "Body-based routing ext_proc sidecar for Envoy";

pub const GRPC_PORT_FLAG: &str = "grpc-port";
pub const GRPC_HEALTH_PORT_FLAG: &str = "grpc-health-port";
pub const METRICS_PORT_FLAG: &str = "metrics-port";

/// Command-line configuration of the body-based routing server.
#[derive(Debug, Clone, PartialEq, Args)]
pub struct ServerOptions {
    /// The gRPC port used for communicating with Envoy proxy.
    #[arg(
        long = "grpc-port",
        value_name = "PORT",
        default_value_t = DEFAULT_GRPC_PORT,
        allow_negative_numbers = true
    )]
    pub grpc_port: i32,

    /// Enables streaming support for Envoy full-duplex streaming mode.
    #[arg(
        long = "streaming",
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true"
    )]
    pub streaming: bool,

    /// The metrics port exposed by the server.
    #[arg(
        long = "metrics-port",
        value_name = "PORT",
        default_value_t = DEFAULT_METRICS_PORT,
        allow_negative_numbers = true
    )]
    pub metrics_port: i32,

    /// The port used for gRPC liveness and readiness probes.
    #[arg(
        long = "grpc-health-port",
        value_name = "PORT",
        default_value_t = DEFAULT_GRPC_HEALTH_PORT,
        allow_negative_numbers = true
    )]
    pub grpc_health_port: i32,

    /// Enables pprof handlers. Set to false to disable pprof handlers.
    #[arg(
        long = "enable-pprof",
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub enable_pprof: bool,

    /// Enables secure serving.
    #[arg(
        long = "secure-serving",
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub secure_serving: bool,

    /// Enables authentication and authorization of the metrics endpoint.
    #[arg(
        long = "metrics-endpoint-auth",
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub metrics_endpoint_auth: bool,

    #[command(flatten)]
    pub plugin_specs: PluginSpecs,

    #[command(flatten)]
    pub logging: LoggingOptions,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            grpc_port: DEFAULT_GRPC_PORT,
            streaming: false,
            metrics_port: DEFAULT_METRICS_PORT,
            grpc_health_port: DEFAULT_GRPC_HEALTH_PORT,
            enable_pprof: true,
            secure_serving: true,
            metrics_endpoint_auth: true,
            plugin_specs: PluginSpecs::new(),
            logging: LoggingOptions::new(),
        }
    }
}

impl ServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The top-level command with every server flag bound.
    pub fn command() -> Command {
        Self::add_flags(base_command())
    }

    /// Bind the server flags, `--plugin`, and the logging flags onto `cmd`.
    pub fn add_flags(cmd: Command) -> Command {
        Self::augment_args(cmd)
    }

    /// Parse `args` (binary name first) into options plus their flag set.
    pub fn try_parse_from<I, A>(args: I) -> Result<(Self, FlagSet), clap::Error>
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString> + Clone,
    {
        flags::parse_from(base_command(), args)
    }

    /// Post-process parsed flags.
    pub fn complete(&mut self, flags: &mut FlagSet) -> Result<(), OptionsError> {
        self.logging.complete(flags)
    }

    /// Check for invalid or conflicting values.
    pub fn validate(&self) -> Result<(), OptionsError> {
        for (flag, port) in self.ports() {
            validate_port(flag, port)?;
        }
        validate_distinct_ports(self.grpc_port, self.grpc_health_port, self.metrics_port)?;

        self.logging.validate()
    }

    /// Listener ports paired with their flag names.
    pub fn ports(&self) -> [(&'static str, i32); 3] {
        [
            (GRPC_PORT_FLAG, self.grpc_port),
            (GRPC_HEALTH_PORT_FLAG, self.grpc_health_port),
            (METRICS_PORT_FLAG, self.metrics_port),
        ]
    }
}

fn base_command() -> Command {
    Command::new(APP_NAME).about(ABOUT)
}
