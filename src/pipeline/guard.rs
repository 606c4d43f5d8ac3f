use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("failed to open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Exclusive, cross-process hold on one pipeline name.
///
/// Backed by an advisory lock on `<state_dir>/<name>.lock`. The lock is
/// released when the guard is dropped, including on error paths and when
/// the process dies.
#[derive(Debug)]
pub struct ExecutionGuard {
    path: PathBuf,
    _file: File,
}

impl ExecutionGuard {
    /// Try to take the lock without waiting; `Ok(None)` if another holder
    /// has it.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Option<Self>, GuardError> {
        let path = path.into();
        let open_err = |source| GuardError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        // Not truncated on open: the holder's pid must survive a failed attempt
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(open_err)?;

        if let Err(e) = fs4::fs_std::FileExt::try_lock_exclusive(&file) {
            if is_contended(&e) {
                debug!(path = %path.display(), "Lock held elsewhere");
                return Ok(None);
            }
            return Err(GuardError::Lock { path, source: e });
        }

        // Holder pid, for operators only
        if file.set_len(0).is_ok() {
            let _ = writeln!(file, "{}", std::process::id());
        }

        debug!(path = %path.display(), "Lock acquired");
        Ok(Some(Self { path, _file: file }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(error: &std::io::Error) -> bool {
    error.kind() == ErrorKind::WouldBlock
        || error.raw_os_error() == fs4::lock_contended_error().raw_os_error()
}
