//! Subcommand implementations.
//!
//! Every command resolves [`Settings`] first and reports failures as
//! [`CliError`]; none of them exit the process.

use crate::cli::{CliError, Commands, OkEnvelope, RunArgs, seconds};
use riffraff_ci::BuildEnvironment;
use riffraff_release::{
    BuildManifest, ObjectStore, Pipeline, PipelineReport, PublishReport, Publisher, Settings,
};
use riffraff_s3::{S3Config, S3Store};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

/// Where a command runs.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Project root, possibly relative to `working_dir`.
    pub root: PathBuf,
    /// Directory the process was started in.
    pub working_dir: PathBuf,
}

impl CommandContext {
    /// Builds a context, defaulting the root to the working directory.
    #[must_use]
    pub fn new(root: Option<PathBuf>, working_dir: PathBuf) -> Self {
        Self {
            root: root.unwrap_or_else(|| working_dir.clone()),
            working_dir,
        }
    }

    /// Resolves settings against the detected CI environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the project descriptor is unusable.
    pub fn settings(&self) -> Result<Settings, CliError> {
        self.settings_with(BuildEnvironment::detect())
    }

    /// Resolves settings against an explicit environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the project descriptor is unusable.
    pub fn settings_with(&self, env: BuildEnvironment) -> Result<Settings, CliError> {
        Ok(Settings::load(&self.root, &self.working_dir, env)?)
    }
}

/// Result of a successful command, printed on stdout.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    /// Resolved settings.
    Settings(Box<Settings>),
    /// Build manifest.
    Manifest(BuildManifest),
    /// Packaging (and possibly publishing) summary.
    Build(BuildSummary),
}

impl CommandOutput {
    /// Renders the output for the terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self, json: bool) -> Result<String, CliError> {
        let rendered = if json {
            serde_json::to_string(&OkEnvelope::new(self))
        } else {
            match self {
                Self::Build(summary) => return Ok(summary.to_string()),
                other => serde_json::to_string_pretty(other),
            }
        };
        rendered.map_err(|e| CliError::other(format!("Failed to serialize output: {e}")))
    }
}

/// What `run` and `build` produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    /// Package name.
    pub project_name: String,
    /// Build id the upload keys use.
    pub build_id: String,
    /// Steps that ran.
    pub steps: Vec<&'static str>,
    /// Staged package tarball.
    pub archive: PathBuf,
    /// Artifact bundle.
    pub bundle: PathBuf,
    /// Uploaded objects, as `s3://bucket/key`.
    pub published: Vec<String>,
}

impl BuildSummary {
    fn new(settings: &Settings, report: &PipelineReport, published: Option<&PublishReport>) -> Self {
        Self {
            project_name: settings.package_name.clone(),
            build_id: settings.build_id.clone(),
            steps: report.completed.iter().map(|step| step.name()).collect(),
            archive: report.archive_path.clone(),
            bundle: report.bundle_path.clone(),
            published: published
                .map(|p| vec![p.bundle.to_string(), p.manifest.to_string()])
                .unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Packaged {} build {}", self.project_name, self.build_id)?;
        writeln!(f, "  archive: {}", self.archive.display())?;
        write!(f, "  bundle:  {}", self.bundle.display())?;
        for location in &self.published {
            write!(f, "\n  published: {location}")?;
        }
        Ok(())
    }
}

/// Runs `command` in `ctx`.
///
/// # Errors
///
/// Returns the first configuration, packaging, or publish failure.
pub async fn execute(command: Commands, ctx: &CommandContext) -> Result<CommandOutput, CliError> {
    match command {
        Commands::Run(args) => run(&ctx.settings()?, &args).await,
        Commands::Build { step_timeout } => {
            build(&ctx.settings()?, seconds(step_timeout)).await
        }
        Commands::Settings => Ok(CommandOutput::Settings(Box::new(ctx.settings()?))),
        Commands::Manifest => Ok(CommandOutput::Manifest(BuildManifest::from_settings(
            &ctx.settings()?,
        ))),
    }
}

/// Packages the project, then publishes to S3 unless in `dev` or told not to.
async fn run(settings: &Settings, args: &RunArgs) -> Result<CommandOutput, CliError> {
    let store = if uploads(settings, args) {
        Some(s3_store(args).await)
    } else {
        None
    };
    run_with_store(settings, args, store.as_ref().map(|s| s as &dyn ObjectStore)).await
}

/// Packages the project, then publishes it to `store` when one is given.
///
/// # Errors
///
/// Returns the packaging failure, or a publish error if either upload fails.
#[instrument(skip_all, fields(project = %settings.package_name, build = %settings.build_id))]
pub async fn run_with_store(
    settings: &Settings,
    args: &RunArgs,
    store: Option<&dyn ObjectStore>,
) -> Result<CommandOutput, CliError> {
    let report = package(settings, seconds(args.step_timeout)).await?;

    let Some(store) = store else {
        info!(
            environment = %settings.environment,
            skip_upload = args.skip_upload,
            "Skipping upload"
        );
        return Ok(CommandOutput::Build(BuildSummary::new(settings, &report, None)));
    };

    let published = Publisher::new(store)
        .with_upload_timeout(seconds(args.upload_timeout))
        .publish(settings)
        .await?;

    Ok(CommandOutput::Build(BuildSummary::new(
        settings,
        &report,
        Some(&published),
    )))
}

/// Whether `run` publishes: only from CI, and only without `--skip-upload`.
#[must_use]
pub fn uploads(settings: &Settings, args: &RunArgs) -> bool {
    !settings.environment.is_dev() && !args.skip_upload
}

async fn s3_store(args: &RunArgs) -> S3Store {
    let mut config = S3Config::default();
    if let Some(region) = &args.region {
        config = config.with_region(region);
    }
    if let Some(endpoint) = &args.endpoint {
        config = config.with_endpoint(endpoint);
    }
    S3Store::from_env(config).await
}

async fn build(settings: &Settings, step_timeout: Option<Duration>) -> Result<CommandOutput, CliError> {
    let report = package(settings, step_timeout).await?;
    Ok(CommandOutput::Build(BuildSummary::new(settings, &report, None)))
}

async fn package(settings: &Settings, step_timeout: Option<Duration>) -> Result<PipelineReport, CliError> {
    info!(
        project = %settings.package_name,
        root = %settings.root_dir.display(),
        "Packaging build"
    );
    Ok(Pipeline::new(settings)
        .with_step_timeout(step_timeout)
        .run()
        .await?)
}

/// Current working directory as a CLI error on failure.
///
/// # Errors
///
/// Returns an error if the working directory cannot be read.
pub fn working_dir() -> Result<PathBuf, CliError> {
    std::env::current_dir()
        .map_err(|e| CliError::other(format!("Cannot determine working directory: {e}")))
}
