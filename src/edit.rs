use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Whole-file replacement guarded by a hash of the content it was computed
/// from.
///
/// The transformer rewrites a file as a unit, so the write primitive is the
/// full new text plus proof that nobody touched the file in between.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Rewrite does nothing until apply() is called"]
pub struct Rewrite {
    /// Absolute path of the file to replace
    pub file: PathBuf,
    /// xxh3 of the text `new_text` was derived from
    pub expected_hash: u64,
    pub new_text: String,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Content of {file} changed since it was read (expected xxh3 {expected:016x}, found {found:016x})")]
    ContentChanged {
        file: PathBuf,
        expected: u64,
        found: u64,
    },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 validation error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Result of applying a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RewriteResult should be checked for success/already-applied"]
pub enum RewriteResult {
    Applied { file: PathBuf, bytes_written: usize },
    /// File already holds `new_text`
    AlreadyApplied { file: PathBuf },
}

impl Rewrite {
    pub fn new(file: impl Into<PathBuf>, original: &str, new_text: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            expected_hash: xxh3_64(original.as_bytes()),
            new_text: new_text.into(),
        }
    }

    /// Check `current` against the recorded hash.
    ///
    /// Returns `Ok(true)` when the rewrite is already in place.
    fn verify(&self, current: &str) -> Result<bool, EditError> {
        if current == self.new_text {
            return Ok(true);
        }
        let found = xxh3_64(current.as_bytes());
        if found != self.expected_hash {
            return Err(EditError::ContentChanged {
                file: self.file.clone(),
                expected: self.expected_hash,
                found,
            });
        }
        Ok(false)
    }

    /// Replace the file contents atomically.
    ///
    /// Uses tempfile + fsync + rename for crash safety, then bumps the mtime
    /// so bundler caches see the change.
    pub fn apply(&self) -> Result<RewriteResult, EditError> {
        let bytes = fs::read(&self.file)?;
        let current = std::str::from_utf8(&bytes)?;

        if self.verify(current)? {
            return Ok(RewriteResult::AlreadyApplied {
                file: self.file.clone(),
            });
        }

        atomic_write(&self.file, self.new_text.as_bytes())?;

        let now = filetime::FileTime::now();
        filetime::set_file_mtime(&self.file, now)?;

        Ok(RewriteResult::Applied {
            file: self.file.clone(),
            bytes_written: self.new_text.len(),
        })
    }
}

/// Atomic file write: tempfile in the same directory, fsync, rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = path.parent().ok_or_else(|| {
        EditError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
