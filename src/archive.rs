//! Archive extraction primitive
//!
//! Mods and monolithic packs ship as `.zip` (occasionally `.jar`) archives;
//! `.tar.gz`/`.tgz` archives are accepted too. Extraction reports every file
//! it wrote, relative to the destination, so the caller can record ownership.
//! Entries that would land outside the destination are skipped.

use crate::{Error, Result};
use flate2::read::GzDecoder;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Component as PathComponent, Path, PathBuf};
use tar::Archive;

pub trait Extractor: Send + Sync {
    /// Relative paths of the files the archive would create
    fn list_contents(&self, archive: &Path) -> Result<BTreeSet<PathBuf>>;

    /// Extract into `dest`, returning the relative paths of the files written
    ///
    /// On failure the files already written are removed again.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<BTreeSet<PathBuf>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Zip,
    TarGz,
}

fn detect_format(archive: &Path) -> Format {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Format::TarGz
    } else {
        Format::Zip
    }
}

/// Only plain relative paths are allowed; `..`, roots and prefixes are rejected
fn enclosed(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for part in path.components() {
        match part {
            PathComponent::Normal(p) => clean.push(p),
            PathComponent::CurDir => {}
            _ => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

/// Whether `name` is exactly one plain path segment
pub(crate) fn is_plain_segment(name: &str) -> bool {
    let mut parts = Path::new(name).components();
    matches!(
        (parts.next(), parts.next()),
        (Some(PathComponent::Normal(_)), None)
    )
}

fn extract_error(archive: &Path, reason: impl std::fmt::Display) -> Error {
    Error::Extract {
        component: archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        reason: reason.to_string(),
    }
}

/// Default extractor for zip and gzipped tar archives
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self
    }

    fn open_zip(archive: &Path) -> Result<zip::ZipArchive<File>> {
        let file = File::open(archive)?;
        zip::ZipArchive::new(file).map_err(|e| extract_error(archive, e))
    }

    fn open_tar(archive: &Path) -> Result<Archive<GzDecoder<File>>> {
        let file = File::open(archive)?;
        Ok(Archive::new(GzDecoder::new(file)))
    }

    fn list_zip(archive: &Path) -> Result<BTreeSet<PathBuf>> {
        let mut zip = Self::open_zip(archive)?;
        let mut files = BTreeSet::new();

        for i in 0..zip.len() {
            let entry = zip.by_index(i).map_err(|e| extract_error(archive, e))?;
            if entry.is_dir() {
                continue;
            }
            if let Some(path) = entry.enclosed_name().as_deref().and_then(enclosed) {
                files.insert(path);
            }
        }
        Ok(files)
    }

    fn extract_zip(archive: &Path, dest: &Path, written: &mut BTreeSet<PathBuf>) -> Result<()> {
        let mut zip = Self::open_zip(archive)?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|e| extract_error(archive, e))?;

            let Some(relative) = entry.enclosed_name().as_deref().and_then(enclosed) else {
                tracing::warn!(entry = %entry.name(), "Skipping archive entry outside the destination");
                continue;
            };
            let output_path = dest.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&output_path)
                    .map_err(|e| Error::filesystem(&output_path, e))?;
                continue;
            }

            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
            }
            let mut outfile =
                File::create(&output_path).map_err(|e| Error::filesystem(&output_path, e))?;
            written.insert(relative);
            io::copy(&mut entry, &mut outfile).map_err(|e| extract_error(archive, e))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    let _ = fs::set_permissions(&output_path, fs::Permissions::from_mode(mode));
                }
            }
        }
        Ok(())
    }

    fn list_tar(archive: &Path) -> Result<BTreeSet<PathBuf>> {
        let mut tar = Self::open_tar(archive)?;
        let mut files = BTreeSet::new();

        for entry in tar.entries().map_err(|e| extract_error(archive, e))? {
            let entry = entry.map_err(|e| extract_error(archive, e))?;
            if entry.header().entry_type().is_dir() {
                continue;
            }
            let path = entry.path().map_err(|e| extract_error(archive, e))?;
            if let Some(relative) = enclosed(&path) {
                files.insert(relative);
            }
        }
        Ok(files)
    }

    fn extract_tar(archive: &Path, dest: &Path, written: &mut BTreeSet<PathBuf>) -> Result<()> {
        let mut tar = Self::open_tar(archive)?;

        for entry in tar.entries().map_err(|e| extract_error(archive, e))? {
            let mut entry = entry.map_err(|e| extract_error(archive, e))?;
            let path = entry.path().map_err(|e| extract_error(archive, e))?;

            let Some(relative) = enclosed(&path) else {
                tracing::warn!(entry = %path.display(), "Skipping archive entry outside the destination");
                continue;
            };
            let output_path = dest.join(&relative);

            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
            }
            if !entry.header().entry_type().is_dir() {
                written.insert(relative);
            }
            entry
                .unpack(&output_path)
                .map_err(|e| extract_error(archive, e))?;
        }
        Ok(())
    }
}

/// Remove what a failed extraction wrote so no file is left without an owner
///
/// Directories are left in place; other extractions may be writing into them.
fn discard_partial(dest: &Path, written: &BTreeSet<PathBuf>) {
    for relative in written {
        let path = dest.join(relative);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not remove partially extracted file")
            }
        }
    }
}

impl Extractor for ArchiveExtractor {
    fn list_contents(&self, archive: &Path) -> Result<BTreeSet<PathBuf>> {
        match detect_format(archive) {
            Format::Zip => Self::list_zip(archive),
            Format::TarGz => Self::list_tar(archive),
        }
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<BTreeSet<PathBuf>> {
        if !archive.exists() {
            return Err(extract_error(archive, "archive not found"));
        }

        let mut written = BTreeSet::new();
        let result = match detect_format(archive) {
            Format::Zip => Self::extract_zip(archive, dest, &mut written),
            Format::TarGz => Self::extract_tar(archive, dest, &mut written),
        };

        match result {
            Ok(()) => Ok(written),
            Err(e) => {
                tracing::debug!(
                    archive = %archive.display(),
                    files = written.len(),
                    "Removing output of failed extraction"
                );
                discard_partial(dest, &written);
                Err(e)
            }
        }
    }
}
