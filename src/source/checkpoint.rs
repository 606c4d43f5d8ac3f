use super::identity::FileId;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const CHECKPOINT_SUFFIX: &str = "offset";

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("failed to write checkpoint '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Read position within a monitored file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Checkpoint {
    pub file_id: Option<FileId>,
    pub offset: u64,
}

/// Sidecar file holding the checkpoint of one monitored log.
///
/// The on-disk format is two plaintext lines: the file identity, then the
/// byte offset.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Checkpoint location for `log_path` inside `state_dir`
    pub fn for_log(state_dir: &Path, log_path: &Path) -> Self {
        let name = log_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "log".to_string());
        Self::new(state_dir.join(format!("{}.{}", name, CHECKPOINT_SUFFIX)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored checkpoint.
    ///
    /// Missing or unreadable files yield the default `(None, 0)`.
    pub fn load(&self) -> Checkpoint {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Unable to read checkpoint, starting from offset 0");
                }
                return Checkpoint::default();
            }
        };

        match parse_checkpoint(&content) {
            Some(checkpoint) => checkpoint,
            None => {
                tracing::warn!(path = %self.path.display(), "Malformed checkpoint, starting from offset 0");
                Checkpoint::default()
            }
        }
    }

    /// Persist a checkpoint with owner-only permissions
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let wrap = |source| CheckpointError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(wrap)?;
            }
        }

        let tmp_path = self.path.with_extension(format!("{}.tmp", CHECKPOINT_SUFFIX));
        {
            let mut file = open_private(&tmp_path).map_err(wrap)?;
            let identity = checkpoint
                .file_id
                .map(|id| id.to_string())
                .unwrap_or_default();
            write!(file, "{}\n{}\n", identity, checkpoint.offset).map_err(wrap)?;
            file.sync_all().map_err(wrap)?;
        }
        fs::rename(&tmp_path, &self.path).map_err(wrap)?;

        tracing::debug!(
            path = %self.path.display(),
            offset = checkpoint.offset,
            "Checkpoint saved"
        );
        Ok(())
    }
}

fn parse_checkpoint(content: &str) -> Option<Checkpoint> {
    let mut lines = content.lines();
    let file_id: FileId = lines.next()?.parse().ok()?;
    let offset: u64 = lines.next()?.trim().parse().ok()?;
    Some(Checkpoint {
        file_id: Some(file_id),
        offset,
    })
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
