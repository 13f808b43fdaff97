//! On-disk storage for the command stream.
//!
//! With storage enabled the batch is written to a script file that the
//! shell executes directly, instead of being piped to its stdin.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ShellBatchError;
use crate::Result;

/// Where and how to keep the command stream on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Storage {
    /// Directory receiving the script files.
    pub dir: PathBuf,
    /// Keep the script after the run, minus the completion trailer.
    pub keep: bool,
}

impl Storage {
    /// Storage in `dir` that removes its scripts when done.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            keep: false,
        }
    }

    /// Keep scripts after the run.
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Whether storage is configured at all.
    pub fn is_enabled(&self) -> bool {
        !self.dir.as_os_str().is_empty()
    }

    /// Validate the directory.
    ///
    /// Returns `Ok(false)` when storage is disabled, `Ok(true)` when the
    /// directory exists.
    pub fn check(&self) -> Result<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }
        let meta = fs::metadata(&self.dir).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ShellBatchError::StorageNotFound(self.dir.clone()),
            _ => ShellBatchError::Io(e),
        })?;
        if !meta.is_dir() {
            return Err(ShellBatchError::StorageNotDirectory(self.dir.clone()));
        }
        Ok(true)
    }

    /// Create (or truncate) the script file `name` inside the directory.
    pub fn create_file(&self, name: &str) -> Result<(PathBuf, File)> {
        if name.is_empty() {
            return Err(ShellBatchError::EmptyId);
        }
        let path = self.dir.join(name);
        let file = File::create(&path)?;
        debug!("Storage: created {}", path.display());
        Ok((path, file))
    }

    /// Remove the script, or with `keep` trim `trailer_len` bytes off its end.
    pub fn remove_or_truncate(&self, path: &Path, trailer_len: u64) -> Result<()> {
        if self.keep {
            return truncate_tail(path, trailer_len);
        }
        fs::remove_file(path)?;
        debug!("Storage: removed {}", path.display());
        Ok(())
    }
}

/// Trim `len` bytes from the end of the file at `path`.
///
/// If `len` is not smaller than the file, only the final byte is removed.
pub fn truncate_tail(path: &Path, len: u64) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    let file = fs::OpenOptions::new().write(true).open(path)?;
    let size = file.metadata()?.len();
    let new_size = if len >= size {
        size.saturating_sub(1)
    } else {
        size - len
    };
    file.set_len(new_size)?;
    debug!(
        "Storage: truncated {} from {} to {} bytes",
        path.display(),
        size,
        new_size
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_disabled() {
        let storage = Storage::default();
        assert!(!storage.is_enabled());
        assert!(!storage.check().unwrap());
    }

    #[test]
    fn test_check_existing_dir() {
        let dir = tempdir().unwrap();
        assert!(Storage::new(dir.path()).check().unwrap());
    }

    #[test]
    fn test_check_missing_dir() {
        let dir = tempdir().unwrap();
        let err = Storage::new(dir.path().join("missing")).check().unwrap_err();
        assert!(matches!(err, ShellBatchError::StorageNotFound(_)));
    }

    #[test]
    fn test_check_not_a_dir() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        let err = Storage::new(&file).check().unwrap_err();
        assert!(matches!(err, ShellBatchError::StorageNotDirectory(_)));
    }

    #[test]
    fn test_create_file() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let (path, mut file) = storage.create_file("abc").unwrap();
        file.write_all(b"echo hi\n").unwrap();
        assert_eq!(path, dir.path().join("abc"));
        assert_eq!(fs::read(&path).unwrap(), b"echo hi\n");

        assert!(matches!(
            storage.create_file(""),
            Err(ShellBatchError::EmptyId)
        ));
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let (path, _file) = storage.create_file("gone").unwrap();
        storage.remove_or_truncate(&path, 10).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_keep_truncates_trailer() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path()).keep(true);
        let (path, mut file) = storage.create_file("kept").unwrap();
        file.write_all(b"echo user\nTRAILER\n").unwrap();
        drop(file);

        storage.remove_or_truncate(&path, 8).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"echo user\n");
    }

    #[test]
    fn test_truncate_oversized_trim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small");
        fs::write(&path, b"abc").unwrap();

        truncate_tail(&path, 3).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"ab");

        truncate_tail(&path, 100).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"a");
    }

    #[test]
    fn test_truncate_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();
        truncate_tail(&path, 5).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_truncate_zero_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("same");
        fs::write(&path, b"abc").unwrap();
        truncate_tail(&path, 0).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"abc");
    }
}
