//! Structured logging.
//!
//! # Responsibilities
//! - Bind `-v` and the logging backend's own flags
//! - Derive the backend level from `-v` unless `--zap-log-level` was given
//! - Install the global `tracing` subscriber
//!
//! # Design Decisions
//! - Backend levels use the inverted-severity numbering: lower is more
//!   permissive, `-1` is debug and `-N` enables verbosity `N`
//! - An explicit `--zap-log-level` always wins over `-v`
//! - JSON output for production, human-readable output for development
//! - Stacktraces are appended to events at or above the stacktrace level

use std::backtrace::Backtrace;
use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::{ArgAction, Args, Command, ValueEnum};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt as tracing_fmt, Layer, Registry};

use crate::config::flags::FlagSet;
use crate::config::validation::OptionsError;

/// Verbosity for regular operational logs.
pub const DEFAULT: i32 = 2;
/// Verbosity for extra detail about normal operation.
pub const VERBOSE: i32 = 3;
/// Verbosity for debugging output.
pub const DEBUG: i32 = 4;
/// Verbosity for per-request tracing output.
pub const TRACE: i32 = 5;

pub const VERBOSITY_FLAG: &str = "v";
pub const ZAP_LOG_LEVEL_FLAG: &str = "zap-log-level";
pub const ZAP_STACKTRACE_LEVEL_FLAG: &str = "zap-stacktrace-level";
pub const ZAP_TIME_ENCODING_FLAG: &str = "zap-time-encoding";

/// Errors from installing the log subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to install log subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// An unrecognised `--zap-log-level` value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid log level {0:?}: expected debug, info, warn, error, dpanic, panic, fatal or an integer > 0")]
pub struct LevelParseError(String);

/// Severity threshold of the logging backend.
///
/// Numerically lower levels are more permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackendLevel(pub i8);

impl BackendLevel {
    pub const DEBUG: Self = Self(-1);
    pub const INFO: Self = Self(0);
    pub const WARN: Self = Self(1);
    pub const ERROR: Self = Self(2);
    pub const DPANIC: Self = Self(3);
    pub const PANIC: Self = Self(4);
    pub const FATAL: Self = Self(5);

    /// The `tracing` filter equivalent of this level.
    ///
    /// Levels down to `-DEFAULT` keep regular logs at INFO; deeper
    /// verbosity opens DEBUG and then TRACE.
    pub fn level_filter(self) -> LevelFilter {
        match self.0 {
            2.. => LevelFilter::ERROR,
            1 => LevelFilter::WARN,
            -2..=0 => LevelFilter::INFO,
            -4..=-3 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// The backend level an event at `level` is logged at.
    ///
    /// Inverse of [`level_filter`](Self::level_filter): DEBUG and TRACE
    /// events sit at the `-DEBUG` and `-TRACE` verbosity rungs.
    pub fn from_tracing(level: &Level) -> Self {
        if *level == Level::ERROR {
            Self::ERROR
        } else if *level == Level::WARN {
            Self::WARN
        } else if *level == Level::INFO {
            Self::INFO
        } else if *level == Level::DEBUG {
            level_for_verbosity(DEBUG)
        } else {
            level_for_verbosity(TRACE)
        }
    }

    fn name(self) -> Option<&'static str> {
        match self {
            Self::DEBUG => Some("debug"),
            Self::INFO => Some("info"),
            Self::WARN => Some("warn"),
            Self::ERROR => Some("error"),
            Self::DPANIC => Some("dpanic"),
            Self::PANIC => Some("panic"),
            Self::FATAL => Some("fatal"),
            _ => None,
        }
    }
}

impl fmt::Display for BackendLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Level({})", self.0),
        }
    }
}

impl FromStr for BackendLevel {
    type Err = LevelParseError;

    /// Accepts a level name, or a positive integer `N` meaning level `-N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Self::DEBUG,
            "info" => Self::INFO,
            "warn" => Self::WARN,
            "error" => Self::ERROR,
            "dpanic" => Self::DPANIC,
            "panic" => Self::PANIC,
            "fatal" => Self::FATAL,
            other => match other.parse::<i32>() {
                Ok(n) if n > 0 => level_for_verbosity(n),
                _ => return Err(LevelParseError(s.to_string())),
            },
        };
        Ok(level)
    }
}

/// Backend level for a verbosity number: `-verbosity`, saturated to `i8`.
pub fn level_for_verbosity(verbosity: i32) -> BackendLevel {
    let level = (-i64::from(verbosity)).clamp(i8::MIN.into(), i8::MAX.into());
    BackendLevel(level as i8)
}

/// Output encoder of the logging backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Encoder {
    Json,
    Console,
}

/// Timestamp encoding of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeEncoding {
    /// Seconds since the Unix epoch, fractional.
    #[value(name = "epoch")]
    Epoch,
    /// Milliseconds since the Unix epoch, fractional.
    #[value(name = "millis")]
    Millis,
    /// Nanoseconds since the Unix epoch.
    #[value(name = "nano")]
    Nano,
    #[value(name = "iso8601")]
    Iso8601,
    #[value(name = "rfc3339")]
    Rfc3339,
    #[value(name = "rfc3339nano")]
    Rfc3339Nano,
}

impl TimeEncoding {
    pub fn format(self, now: DateTime<Utc>) -> String {
        match self {
            TimeEncoding::Epoch => format!("{:.6}", now.timestamp_micros() as f64 / 1e6),
            TimeEncoding::Millis => format!("{:.3}", now.timestamp_micros() as f64 / 1e3),
            TimeEncoding::Nano => now.timestamp_nanos_opt().unwrap_or_default().to_string(),
            TimeEncoding::Iso8601 => now.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string(),
            TimeEncoding::Rfc3339 => now.to_rfc3339_opts(SecondsFormat::Secs, true),
            TimeEncoding::Rfc3339Nano => now.to_rfc3339_opts(SecondsFormat::Nanos, true),
        }
    }
}

impl FormatTime for TimeEncoding {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        w.write_str(&self.format(Utc::now()))
    }
}

/// Event format that appends a captured backtrace at or above `threshold`.
#[derive(Debug, Clone)]
pub struct StacktraceFormat<F> {
    inner: F,
    threshold: BackendLevel,
    encoder: Encoder,
}

impl<F> StacktraceFormat<F> {
    pub fn new(inner: F, threshold: BackendLevel, encoder: Encoder) -> Self {
        Self {
            inner,
            threshold,
            encoder,
        }
    }

    pub fn captures(&self, level: &Level) -> bool {
        BackendLevel::from_tracing(level) >= self.threshold
    }
}

impl<S, N, F> FormatEvent<S, N> for StacktraceFormat<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        self.inner.format_event(ctx, writer.by_ref(), event)?;
        if !self.captures(event.metadata().level()) {
            return Ok(());
        }

        let trace = Backtrace::force_capture().to_string();
        match self.encoder {
            Encoder::Json => writeln!(writer, "{}", serde_json::json!({ "stacktrace": trace })),
            Encoder::Console => writeln!(writer, "{trace}"),
        }
    }
}

/// The logging backend's own flag surface.
#[derive(Debug, Clone, PartialEq, Args)]
pub struct BackendOptions {
    /// Development mode: console output, debug level unless one is resolved.
    #[arg(
        id = "zap-devel",
        long = "zap-devel",
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub development: bool,

    /// Log encoding (one of 'json' or 'console').
    #[arg(id = "zap-encoder", long = "zap-encoder", value_name = "ENCODER", value_enum)]
    pub encoder: Option<Encoder>,

    /// Log level threshold: debug, info, warn, error, dpanic, panic, fatal,
    /// or an integer > 0 for custom debug verbosity.
    #[arg(id = "zap-log-level", long = "zap-log-level", value_name = "LEVEL")]
    pub level: Option<BackendLevel>,

    /// Level at and above which stacktraces are captured (same values as
    /// --zap-log-level). Defaults to warn in development, error otherwise.
    #[arg(id = "zap-stacktrace-level", long = "zap-stacktrace-level", value_name = "LEVEL")]
    pub stacktrace_level: Option<BackendLevel>,

    /// Time encoding (one of 'epoch', 'millis', 'nano', 'iso8601',
    /// 'rfc3339' or 'rfc3339nano').
    #[arg(id = "zap-time-encoding", long = "zap-time-encoding", value_name = "ENCODING", value_enum)]
    pub time_encoding: Option<TimeEncoding>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            development: true,
            encoder: None,
            level: None,
            stacktrace_level: None,
            time_encoding: None,
        }
    }
}

impl BackendOptions {
    pub fn effective_encoder(&self) -> Encoder {
        match self.encoder {
            Some(encoder) => encoder,
            None if self.development => Encoder::Console,
            None => Encoder::Json,
        }
    }

    pub fn effective_level(&self) -> BackendLevel {
        match self.level {
            Some(level) => level,
            None if self.development => BackendLevel::DEBUG,
            None => BackendLevel::INFO,
        }
    }

    pub fn effective_stacktrace_level(&self) -> BackendLevel {
        match self.stacktrace_level {
            Some(level) => level,
            None if self.development => BackendLevel::WARN,
            None => BackendLevel::ERROR,
        }
    }

    pub fn effective_time_encoding(&self) -> TimeEncoding {
        self.time_encoding.unwrap_or(TimeEncoding::Rfc3339)
    }
}

/// Logging configuration from command-line flags.
#[derive(Debug, Clone, PartialEq, Args)]
pub struct LoggingOptions {
    /// Number for the log level verbosity.
    #[arg(
        id = "v",
        short = 'v',
        long = "v",
        value_name = "LEVEL",
        default_value_t = DEFAULT,
        allow_negative_numbers = true
    )]
    pub verbosity: i32,

    #[command(flatten)]
    pub backend: BackendOptions,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            verbosity: DEFAULT,
            backend: BackendOptions::default(),
        }
    }
}

impl LoggingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `-v` and the backend flags onto `cmd`.
    pub fn add_flags(cmd: Command) -> Command {
        Self::augment_args(cmd)
    }

    /// Derive the backend level from verbosity unless it was set explicitly.
    ///
    /// Marks `--zap-log-level` as changed once derived. Must run after
    /// parsing and before [`validate`](Self::validate).
    pub fn complete(&mut self, flags: &mut FlagSet) -> Result<(), OptionsError> {
        if flags.lookup(ZAP_LOG_LEVEL_FLAG) && !flags.changed(ZAP_LOG_LEVEL_FLAG) {
            self.backend.level = Some(level_for_verbosity(self.verbosity));
            flags.mark_changed(ZAP_LOG_LEVEL_FLAG);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.verbosity < 0 {
            return Err(OptionsError::InvalidLogVerbosity);
        }
        Ok(())
    }

    /// Install the global subscriber.
    ///
    /// Fails if a subscriber is already installed.
    pub fn init(&self) -> Result<(), LoggingError> {
        let filter = self.backend.effective_level().level_filter();
        let encoder = self.backend.effective_encoder();
        let timer = self.backend.effective_time_encoding();
        let stacktrace_level = self.backend.effective_stacktrace_level();

        let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match encoder {
            Encoder::Json => tracing_fmt::layer()
                .json()
                .with_timer(timer)
                .map_event_format(|inner| StacktraceFormat::new(inner, stacktrace_level, encoder))
                .boxed(),
            Encoder::Console => tracing_fmt::layer()
                .with_timer(timer)
                .map_event_format(|inner| StacktraceFormat::new(inner, stacktrace_level, encoder))
                .boxed(),
        };

        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .try_init()?;

        tracing::debug!(
            verbosity = self.verbosity,
            level = %self.backend.effective_level(),
            stacktrace_level = %stacktrace_level,
            filter = %filter,
            "Logging initialized"
        );
        Ok(())
    }
}
