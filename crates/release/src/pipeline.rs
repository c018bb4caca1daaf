//! Packaging pipeline.
//!
//! Runs the packaging steps in [`Step::ALL`] order against the staging
//! directory described by [`Settings`]. Each step starts only after the
//! previous one succeeded; the first failure ends the run and is returned with
//! the step it came from (see [`Error::failed_step`]).
//!
//! The clean step always empties the staging directory first, so re-running
//! the whole pipeline is the recovery path for any failure.

use crate::artifact::{self, TarballSource};
use crate::error::{Error, Result};
use crate::settings::{DEPLOY_DESCRIPTOR_FILE, Settings};
use futures::future::try_join_all;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tracing::{debug, error, info};

/// A packaging step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Empty the staging directory.
    Clean,
    /// Create the staging directory layout.
    PrepareDirectories,
    /// Copy the cloudformation template.
    StageCloudformation,
    /// Copy `deploy.json`.
    StageDeployDescriptor,
    /// Tar and gzip the build output to a temporary file.
    Compress,
    /// Move the tarball into the package directory.
    RelocateArchive,
    /// Zip the staging directory into the artifact bundle.
    Bundle,
}

impl Step {
    /// Every step, in execution order.
    pub const ALL: [Self; 7] = [
        Self::Clean,
        Self::PrepareDirectories,
        Self::StageCloudformation,
        Self::StageDeployDescriptor,
        Self::Compress,
        Self::RelocateArchive,
        Self::Bundle,
    ];

    /// Returns the step's stable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::PrepareDirectories => "prepare-directories",
            Self::StageCloudformation => "stage-cloudformation",
            Self::StageDeployDescriptor => "stage-deploy-descriptor",
            Self::Compress => "compress",
            Self::RelocateArchive => "relocate-archive",
            Self::Bundle => "bundle",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Steps that ran, in order.
    pub completed: Vec<Step>,
    /// The staged package tarball.
    pub archive_path: PathBuf,
    /// The artifact bundle.
    pub bundle_path: PathBuf,
    /// Number of files in the bundle.
    pub bundle_files: usize,
}

/// State handed from one step to the next.
#[derive(Default)]
struct RunState {
    temp_archive: Option<TempPath>,
    bundle_files: usize,
}

/// Sequential runner for the packaging steps.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    step_timeout: Option<Duration>,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline for the given settings.
    #[must_use]
    pub const fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            step_timeout: None,
        }
    }

    /// Fails any step that runs longer than `limit`.
    #[must_use]
    pub const fn with_step_timeout(mut self, limit: Option<Duration>) -> Self {
        self.step_timeout = limit;
        self
    }

    /// Runs every step in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step.
    pub async fn run(&self) -> Result<PipelineReport> {
        let mut state = RunState::default();
        let mut completed = Vec::with_capacity(Step::ALL.len());

        for step in Step::ALL {
            let started = Instant::now();
            debug!(step = %step, "Running step");

            let outcome = match self.step_timeout {
                Some(limit) => tokio::time::timeout(limit, self.execute(step, &mut state))
                    .await
                    .unwrap_or_else(|_| Err(Error::step_timed_out(step, limit))),
                None => self.execute(step, &mut state).await,
            };

            if let Err(e) = outcome {
                error!(step = %step, error = %e, "Pipeline step failed");
                return Err(e);
            }

            debug!(
                step = %step,
                elapsed_ms = started.elapsed().as_millis(),
                "Step completed"
            );
            completed.push(step);
        }

        Ok(PipelineReport {
            completed,
            archive_path: self.settings.archive_path(),
            bundle_path: self.settings.bundle_path(),
            bundle_files: state.bundle_files,
        })
    }

    async fn execute(&self, step: Step, state: &mut RunState) -> Result<()> {
        match step {
            Step::Clean => self.clean().await,
            Step::PrepareDirectories => self.prepare_directories().await,
            Step::StageCloudformation => self.stage_cloudformation().await,
            Step::StageDeployDescriptor => self.stage_deploy_descriptor().await,
            Step::Compress => {
                state.temp_archive = Some(self.compress().await?);
                Ok(())
            }
            Step::RelocateArchive => {
                let temp = state.temp_archive.take().ok_or_else(|| {
                    Error::staging(
                        Step::RelocateArchive,
                        "no compressed archive to relocate",
                        self.settings.archive_path(),
                        None,
                    )
                })?;
                self.relocate_archive(temp).await
            }
            Step::Bundle => {
                state.bundle_files = self.bundle().await?;
                Ok(())
            }
        }
    }

    /// Removes everything inside the staging directory.
    async fn clean(&self) -> Result<()> {
        let lead_dir = &self.settings.lead_dir;
        info!(path = %lead_dir.display(), "Cleaning target directory...");

        let mut entries = match tokio::fs::read_dir(lead_dir).await {
            Ok(entries) => entries,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
                ) =>
            {
                return Ok(());
            }
            Err(e) => {
                return Err(Error::cleanup(
                    format!("Failed to list {}: {e}", lead_dir.display()),
                    lead_dir.clone(),
                    e,
                ));
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(Error::cleanup(
                        format!("Failed to list {}: {e}", lead_dir.display()),
                        lead_dir.clone(),
                        e,
                    ));
                }
            };
            let path = entry.path();
            let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
            let removed = if is_dir {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            removed.map_err(|e| {
                Error::cleanup(format!("Failed deleting {}: {e}", path.display()), path.clone(), e)
            })?;
        }

        info!(path = %lead_dir.display(), "Cleaned target directory");
        Ok(())
    }

    /// Creates the staging layout. The directories are created concurrently.
    async fn prepare_directories(&self) -> Result<()> {
        let settings = self.settings;
        let dirs = [
            settings.target_dir.clone(),
            settings.lead_dir.clone(),
            settings.packages_dir(),
            settings.cloudformation_dir(),
            settings.package_dir.clone(),
        ];

        try_join_all(dirs.into_iter().map(|dir| async move {
            if tokio::fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
                return Ok(());
            }
            info!(path = %dir.display(), "Creating directory");
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                Error::directory(
                    format!("Failed to create {}: {e}", dir.display()),
                    dir.clone(),
                    Some(e),
                )
            })
        }))
        .await?;

        Ok(())
    }

    async fn stage_cloudformation(&self) -> Result<()> {
        let source = self.settings.root_dir.join(&self.settings.cloudformation);
        let target_dir = self.settings.cloudformation_dir();
        copy_into(Step::StageCloudformation, &source, &target_dir).await
    }

    async fn stage_deploy_descriptor(&self) -> Result<()> {
        let source = self.settings.root_dir.join(DEPLOY_DESCRIPTOR_FILE);
        copy_into(Step::StageDeployDescriptor, &source, &self.settings.lead_dir).await
    }

    /// Writes the package tarball to a temporary file.
    async fn compress(&self) -> Result<TempPath> {
        let settings = self.settings;
        let temp = tempfile::Builder::new()
            .prefix(&format!("{}-", settings.package_name))
            .suffix(".tgz")
            .tempfile()
            .map_err(|e| {
                Error::compression(
                    format!("Failed to create temporary archive: {e}"),
                    None,
                    Some(e),
                )
            })?
            .into_temp_path();

        let source = TarballSource::new(&settings.working_dir, settings.build_dir.as_deref())
            .excluding(&settings.target_dir);
        info!(
            source = ?source,
            target = %settings.archive_path().display(),
            "Creating tgz"
        );

        let output = temp.to_path_buf();
        tokio::task::spawn_blocking(move || artifact::create_tarball(&source, &output))
            .await
            .map_err(|e| Error::compression(format!("Compression task failed: {e}"), None, None))??;

        Ok(temp)
    }

    async fn relocate_archive(&self, temp: TempPath) -> Result<()> {
        let target = self.settings.archive_path();
        tokio::fs::copy(&temp, &target).await.map_err(|e| {
            Error::staging(
                Step::RelocateArchive,
                format!(
                    "Failed copying {} to {}: {e}",
                    temp.display(),
                    target.display()
                ),
                target.clone(),
                Some(e),
            )
        })?;
        info!(path = %target.display(), "Created tgz file");

        if let Err(e) = temp.close() {
            debug!(error = %e, "Failed to remove temporary archive");
        }
        Ok(())
    }

    async fn bundle(&self) -> Result<usize> {
        let lead_dir = self.settings.lead_dir.clone();
        let output = self.settings.bundle_path();
        info!(path = %output.display(), "Creating zip");

        let bundle_output = output.clone();
        let files = tokio::task::spawn_blocking(move || artifact::create_bundle(&lead_dir, &bundle_output))
            .await
            .map_err(|e| Error::bundling(format!("Bundling task failed: {e}"), None))??;

        info!(path = %output.display(), files, "Created zip file");
        Ok(files)
    }
}

/// Copies `source` into `target_dir`, keeping its file name.
async fn copy_into(step: Step, source: &Path, target_dir: &Path) -> Result<()> {
    let is_file = tokio::fs::metadata(source).await.is_ok_and(|m| m.is_file());
    if !is_file {
        return Err(Error::staging(
            step,
            format!("{} does not exist", source.display()),
            source.to_path_buf(),
            None,
        ));
    }

    let file_name = source.file_name().ok_or_else(|| {
        Error::staging(
            step,
            format!("{} has no file name", source.display()),
            source.to_path_buf(),
            None,
        )
    })?;
    let target = target_dir.join(file_name);

    tokio::fs::copy(source, &target).await.map_err(|e| {
        Error::staging(
            step,
            format!("Failed copying {}: {e}", source.display()),
            source.to_path_buf(),
            Some(e),
        )
    })?;

    info!(source = %source.display(), target = %target.display(), "Staged file");
    Ok(())
}
