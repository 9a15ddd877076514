//! Temp-file allocation and the startup purge.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use super::DeliveryError;

/// File extensions the manager will write. Anything else is rejected before
/// touching the filesystem.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["svg", "png", "jpg", "jpeg", "pdf"];

#[derive(Debug, Clone)]
pub enum FileData {
    Text(String),
    Bytes(Vec<u8>),
}

/// Allocates unique temp filenames, persists rendered artifacts, and enforces
/// the configured allow-list of writable directory prefixes.
#[derive(Debug, Clone)]
pub struct FileManager {
    temp_dir: PathBuf,
    allowed_dirs: Vec<PathBuf>,
}

impl FileManager {
    pub fn new(temp_dir: PathBuf, allowed_dirs: Vec<PathBuf>) -> Self {
        Self { temp_dir, allowed_dirs }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Write `data` under a fresh `<uuid>.<extension>` name in the temp
    /// directory and return the generated filename.
    pub fn store(&self, data: &FileData, extension: &str) -> Result<String, DeliveryError> {
        check_extension(extension)?;
        let filename = format!("{}.{extension}", Uuid::new_v4());
        let path = self.temp_dir.join(&filename);
        self.write(&path, data)?;
        Ok(filename)
    }

    /// Write `data` to a caller-chosen path, returning the resolved absolute
    /// path. The extension and the allow-list are both enforced.
    pub fn store_at(&self, path: &Path, data: &FileData) -> Result<PathBuf, DeliveryError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| DeliveryError::UnsupportedExtension(path.display().to_string()))?;
        check_extension(&extension.to_ascii_lowercase())?;

        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_err(DeliveryError::Io)?.join(path)
        };
        let resolved = normalize(&resolved);
        self.write(&resolved, data)?;
        Ok(resolved)
    }

    fn write(&self, path: &Path, data: &FileData) -> Result<(), DeliveryError> {
        self.check_allowed(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(DeliveryError::Io)?;
        }
        match data {
            FileData::Text(text) => fs::write(path, text).map_err(DeliveryError::Io)?,
            FileData::Bytes(bytes) => fs::write(path, bytes).map_err(DeliveryError::Io)?,
        }
        Ok(())
    }

    fn check_allowed(&self, path: &Path) -> Result<(), DeliveryError> {
        if self.allowed_dirs.is_empty() {
            return Ok(());
        }
        if self.allowed_dirs.iter().any(|dir| path.starts_with(dir)) {
            return Ok(());
        }
        Err(DeliveryError::OutsideAllowedDirs {
            path: path.display().to_string(),
            allowed: self
                .allowed_dirs
                .iter()
                .map(|dir| dir.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Best-effort sweep of the temp directory, returning the number of
    /// entries deleted. Per-entry failures are logged and skipped; a missing
    /// directory counts as an empty sweep. Runs once at startup before any
    /// render traffic.
    pub fn purge(&self) -> usize {
        // The allow-list guards writes; apply the same guard to the sweep so
        // a misconfigured temp dir cannot empty an unrelated directory.
        if let Err(err) = self.check_allowed(&self.temp_dir) {
            warn!(error = %err, "refusing to purge temp directory outside the allow-list");
            return 0;
        }

        let entries = match fs::read_dir(&self.temp_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(err) => {
                warn!(error = %err, dir = %self.temp_dir.display(), "failed to list temp directory");
                return 0;
            }
        };

        let mut deleted = 0;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "failed to read temp directory entry");
                    continue;
                }
            };
            let path = entry.path();
            let result = if path.is_dir() { fs::remove_dir_all(&path) } else { fs::remove_file(&path) };
            match result {
                Ok(()) => deleted += 1,
                Err(err) => {
                    warn!(error = %err, path = %path.display(), "failed to delete temp file");
                }
            }
        }
        info!(deleted, dir = %self.temp_dir.display(), "purged temp directory");
        deleted
    }
}

/// Fold `.` and `..` components lexically. The allow-list is a prefix check,
/// so the path it sees must be the actual write target; a raw
/// `<allowed>/../elsewhere` would otherwise pass `starts_with`.
fn normalize(path: &Path) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved
}

fn check_extension(extension: &str) -> Result<(), DeliveryError> {
    if ALLOWED_EXTENSIONS.contains(&extension) {
        Ok(())
    } else {
        Err(DeliveryError::UnsupportedExtension(extension.to_owned()))
    }
}
