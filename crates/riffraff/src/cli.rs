use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand};
use miette::{Diagnostic, Report};
use riffraff_release::Step;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Packaging step failure exit code
pub const EXIT_PIPELINE: i32 = 3;
/// Upload failure exit code
pub const EXIT_PUBLISH: i32 = 4;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("Configuration error: {message}")]
    #[diagnostic(code(riffraff::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// A packaging step failed (exit code 3)
    #[error("Packaging failed at step {step}: {message}")]
    #[diagnostic(code(riffraff::cli::pipeline))]
    Pipeline {
        /// The failing step
        step: Step,
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// An upload failed (exit code 4)
    #[error("Publish failed: {message}")]
    #[diagnostic(code(riffraff::cli::publish))]
    Publish {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Other unexpected error (exit code 3)
    #[error("Unexpected error: {message}")]
    #[diagnostic(code(riffraff::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    /// Stable code used in the JSON error envelope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Pipeline { .. } => "pipeline",
            Self::Publish { .. } => "publish",
            Self::Other { .. } => "other",
        }
    }
}

/// Convert `riffraff_release::Error` to the matching `CliError` variant.
///
/// The diagnostic help of the source error is carried over.
impl From<riffraff_release::Error> for CliError {
    fn from(err: riffraff_release::Error) -> Self {
        let help = err.help().map(|h| h.to_string());
        if err.is_configuration() {
            return Self::Config {
                message: err.to_string(),
                help,
            };
        }
        if err.is_publish() {
            return Self::Publish {
                message: err.to_string(),
                help,
            };
        }
        match err.failed_step() {
            Some(step) => Self::Pipeline {
                step,
                message: err.to_string(),
                help,
            },
            None => Self::Other {
                message: err.to_string(),
                help,
            },
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Pipeline { .. } | CliError::Other { .. } => EXIT_PIPELINE,
        CliError::Publish { .. } => EXIT_PUBLISH,
    }
}

/// Render error appropriately based on JSON flag
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let mut details = serde_json::json!({
            "code": err.code(),
            "message": err.to_string(),
        });
        if let CliError::Pipeline { step, .. } = err {
            details["step"] = serde_json::Value::from(step.name());
        }

        match serde_json::to_string(&ErrorEnvelope::new(details)) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Package a project into a RiffRaff artifact and publish it from CI.
#[derive(Parser, Debug)]
#[command(name = "riffraff-artefact")]
#[command(about = "Package a project into a RiffRaff artifact and publish it from CI")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute. Defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Project root containing package.json.
    #[arg(long, global = true, env = "ARTEFACT_PATH", value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "info",
        value_enum
    )]
    pub level: LogLevel,

    /// Log line format. Defaults to `json` with `--json`, `compact` otherwise.
    #[arg(long, global = true, value_name = "FORMAT", value_enum)]
    pub log_format: Option<TracingFormat>,

    /// Emit JSON log lines and JSON result envelopes.
    #[arg(long, global = true, help = "Emit JSON logs and result envelopes")]
    pub json: bool,
}

impl Cli {
    /// The subcommand to run, `run` when none was given.
    #[must_use]
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// The log format, following `--json` unless set explicitly.
    #[must_use]
    pub fn log_format(&self) -> TracingFormat {
        self.log_format.unwrap_or(if self.json {
            TracingFormat::Json
        } else {
            TracingFormat::Compact
        })
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Package the project, then publish it when running in CI.
    #[command(about = "Package the project, then publish it when running in CI")]
    Run(RunArgs),
    /// Package the project without publishing.
    #[command(about = "Package the project without publishing")]
    Build {
        /// Fail any packaging step running longer than this many seconds.
        #[arg(long, value_name = "SECS")]
        step_timeout: Option<u64>,
    },
    /// Print the resolved settings as JSON.
    #[command(about = "Print the resolved settings as JSON")]
    Settings,
    /// Print the build manifest that would be uploaded.
    #[command(about = "Print the build manifest that would be uploaded")]
    Manifest,
}

/// Arguments of the `run` subcommand.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Fail any packaging step running longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    pub step_timeout: Option<u64>,

    /// Fail any single upload running longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    pub upload_timeout: Option<u64>,

    /// AWS region override.
    #[arg(long, value_name = "REGION")]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint.
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Package only, even in CI.
    #[arg(long)]
    pub skip_upload: bool,
}

/// Converts an optional seconds flag to a duration.
#[must_use]
pub fn seconds(value: Option<u64>) -> Option<Duration> {
    value.map(Duration::from_secs)
}

/// Parse command line arguments into a CLI structure.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use riffraff_release::Error;
    use std::path::Path;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["riffraff-artefact"]).unwrap();

        assert_eq!(cli.level, LogLevel::Info);
        assert!(!cli.json);
        assert_eq!(cli.log_format(), TracingFormat::Compact);
        assert_eq!(cli.command(), Commands::Run(RunArgs::default()));
    }

    #[test]
    fn test_cli_log_level_parsing() {
        let cli = Cli::try_parse_from(["riffraff-artefact", "--level", "trace", "build"]).unwrap();
        assert_eq!(cli.level, LogLevel::Trace);

        let cli = Cli::try_parse_from(["riffraff-artefact", "-L", "error", "build"]).unwrap();
        assert_eq!(cli.level, LogLevel::Error);
    }

    #[test]
    fn test_log_format_flag() {
        let cli = Cli::try_parse_from(["riffraff-artefact", "--log-format", "pretty"]).unwrap();
        assert_eq!(cli.log_format(), TracingFormat::Pretty);

        let cli = Cli::try_parse_from(["riffraff-artefact", "--json"]).unwrap();
        assert_eq!(cli.log_format(), TracingFormat::Json);

        let cli = Cli::try_parse_from([
            "riffraff-artefact",
            "build",
            "--json",
            "--log-format",
            "compact",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.log_format(), TracingFormat::Compact);

        assert!(Cli::try_parse_from(["riffraff-artefact", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "riffraff-artefact",
            "run",
            "--step-timeout",
            "30",
            "--upload-timeout",
            "120",
            "--region",
            "eu-west-1",
            "--endpoint",
            "http://localhost:9000",
            "--skip-upload",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command() else {
            panic!("Expected Run command");
        };
        assert_eq!(seconds(args.step_timeout), Some(Duration::from_secs(30)));
        assert_eq!(seconds(args.upload_timeout), Some(Duration::from_secs(120)));
        assert_eq!(args.region.as_deref(), Some("eu-west-1"));
        assert_eq!(args.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(args.skip_upload);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["riffraff-artefact", "settings", "--json", "--root", "app"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.root.as_deref(), Some(Path::new("app")));
        assert_eq!(cli.command(), Commands::Settings);
    }

    #[test]
    fn test_error_mapping() {
        let config: CliError = Error::configuration("no name", None).into();
        assert_eq!(exit_code_for(&config), EXIT_CLI);

        let staging: CliError = Error::staging(
            Step::StageCloudformation,
            "missing",
            PathBuf::from("cloudformation.json"),
            None,
        )
        .into();
        assert!(matches!(
            staging,
            CliError::Pipeline {
                step: Step::StageCloudformation,
                ..
            }
        ));
        assert_eq!(exit_code_for(&staging), EXIT_PIPELINE);

        let publish: CliError = Error::publish("denied", "riffraff-builds", "demo/1/build.json").into();
        assert_eq!(exit_code_for(&publish), EXIT_PUBLISH);
        assert_eq!(publish.code(), "publish");
    }

    #[test]
    fn test_help_is_carried_over() {
        let err: CliError = Error::configuration("no name", None).into();
        let CliError::Config { help, .. } = err else {
            panic!("Expected Config error");
        };
        assert!(help.unwrap().contains("package.json"));
    }
}
