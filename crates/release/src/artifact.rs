//! Archive creation for the package tarball and the artifact bundle.
//!
//! This module handles:
//! - Gzip-compressed tarballs of the build output
//! - The zip bundle of the staging directory
//!
//! Both are synchronous and meant to run on the blocking thread pool.

use crate::error::{Error, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// What goes into the package tarball.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TarballSource {
    /// A single directory, stored under its name as configured.
    BuildDir {
        /// Directory archives are resolved against.
        base: PathBuf,
        /// Configured directory, relative to `base`.
        dir: String,
    },
    /// Every non-hidden top-level entry of a directory.
    Contents {
        /// Directory whose entries are archived.
        base: PathBuf,
        /// Paths left out of the archive, with everything below them.
        exclude: Vec<PathBuf>,
    },
}

impl TarballSource {
    /// Picks the source from an optional build directory.
    #[must_use]
    pub fn new(base: &Path, build_dir: Option<&str>) -> Self {
        match build_dir {
            Some(dir) => Self::BuildDir {
                base: base.to_path_buf(),
                dir: dir.to_string(),
            },
            None => Self::Contents {
                base: base.to_path_buf(),
                exclude: Vec::new(),
            },
        }
    }

    /// Leaves `path` out of a [`TarballSource::Contents`] archive.
    ///
    /// A build directory is archived as configured, so this has no effect on
    /// [`TarballSource::BuildDir`].
    #[must_use]
    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        if let Self::Contents { exclude, .. } = &mut self {
            exclude.push(path.into());
        }
        self
    }
}

/// Writes a gzip-compressed tarball of `source` to `output`.
///
/// Symlinks are stored as links. Entries are added in name order with
/// normalized headers (no mtimes or owners), so the same tree always yields
/// the same bytes.
///
/// # Errors
///
/// Returns a compression error if the source is missing or any file cannot
/// be read or written.
pub fn create_tarball(source: &TarballSource, output: &Path) -> Result<()> {
    let file = File::create(output).map_err(|e| {
        Error::compression(
            format!("Failed to create archive {}", output.display()),
            Some(output.to_path_buf()),
            Some(e),
        )
    })?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut archive = tar::Builder::new(encoder);
    archive.follow_symlinks(false);
    archive.mode(tar::HeaderMode::Deterministic);

    match source {
        TarballSource::BuildDir { base, dir } => {
            let path = base.join(dir);
            if !path.is_dir() {
                return Err(Error::compression(
                    format!("Build directory {} does not exist", path.display()),
                    Some(path),
                    None,
                ));
            }
            archive
                .append_dir_all(dir, &path)
                .map_err(|e| tar_error(&path, e))?;
        }
        TarballSource::Contents { base, exclude } => {
            for (name, path, is_dir) in contents_entries(base, exclude)? {
                let appended = if is_dir {
                    archive.append_dir(&name, &path)
                } else {
                    archive.append_path_with_name(&path, &name)
                };
                appended.map_err(|e| tar_error(&path, e))?;
            }
        }
    }

    let encoder = archive.into_inner().map_err(|e| tar_error(output, e))?;
    let mut writer = encoder.finish().map_err(|e| tar_error(output, e))?;
    writer.flush().map_err(|e| tar_error(output, e))?;
    Ok(())
}

fn tar_error(path: &Path, source: io::Error) -> Error {
    Error::compression(
        format!("Failed to archive {}: {source}", path.display()),
        Some(path.to_path_buf()),
        Some(source),
    )
}

/// Everything below the top-level entries of `dir` a shell glob `*` would
/// match, in name order, minus the `exclude` subtrees.
fn contents_entries(dir: &Path, exclude: &[PathBuf]) -> Result<Vec<(String, PathBuf, bool)>> {
    if !dir.is_dir() {
        return Err(Error::compression(
            format!("Directory {} does not exist", dir.display()),
            Some(dir.to_path_buf()),
            None,
        ));
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let hidden =
                entry.depth() == 1 && entry.file_name().to_string_lossy().starts_with('.');
            !hidden && !exclude.iter().any(|path| path == entry.path())
        });

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            Error::compression(
                format!("Failed to walk {}: {e}", dir.display()),
                Some(dir.to_path_buf()),
                None,
            )
        })?;
        let name = relative_name(dir, entry.path()).ok_or_else(|| {
            Error::compression(
                "Entry outside archive root",
                Some(entry.path().to_path_buf()),
                None,
            )
        })?;
        entries.push((name, entry.path().to_path_buf(), entry.file_type().is_dir()));
    }
    Ok(entries)
}

/// `path` relative to `dir`, with `/` separators.
fn relative_name(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?;
    Some(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

/// Zips the full contents of `dir` into `output`.
///
/// Entry names are relative to `dir`; `output` itself is skipped when it lives
/// inside `dir`. Returns the number of file entries written.
///
/// # Errors
///
/// Returns a bundling error if the directory cannot be walked or the zip
/// cannot be written.
pub fn create_bundle(dir: &Path, output: &Path) -> Result<usize> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::bundling(format!("Failed to walk {}: {e}", dir.display()), Some(dir.to_path_buf()))
        })?;
        if entry.path() == output {
            continue;
        }
        let name = relative_name(dir, entry.path()).ok_or_else(|| {
            Error::bundling("Entry outside bundle root", Some(entry.path().to_path_buf()))
        })?;
        entries.push((name, entry.path().to_path_buf(), entry.file_type().is_dir()));
    }

    let file = File::create(output).map_err(|e| bundle_error(output, e))?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0;
    for (name, path, is_dir) in entries {
        if is_dir {
            zip.add_directory(name, options).map_err(|e| bundle_error(output, e))?;
            continue;
        }
        zip.start_file(name, options).map_err(|e| bundle_error(output, e))?;
        let mut source = File::open(&path).map_err(|e| {
            Error::bundling(format!("Failed to read {}: {e}", path.display()), Some(path.clone()))
        })?;
        io::copy(&mut source, &mut zip).map_err(|e| bundle_error(output, e))?;
        files += 1;
    }

    let mut writer = zip.finish().map_err(|e| bundle_error(output, e))?;
    writer.flush().map_err(|e| bundle_error(output, e))?;
    Ok(files)
}

fn bundle_error(output: &Path, source: impl std::fmt::Display) -> Error {
    Error::bundling(
        format!("Failed to write {}: {source}", output.display()),
        Some(output.to_path_buf()),
    )
}
