use crate::source::checkpoint::{Checkpoint, CheckpointStore};
use crate::source::identity::{FileId, FileIdentity, PlatformIdentity};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TailError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Incremental reader for a log file that may be rotated between runs.
///
/// Reading resumes from the stored checkpoint. If the file was rotated since
/// the last run, the remainder of the rotated predecessor is drained first
/// and the tailer then switches to the live file at offset 0. The checkpoint
/// is written once, when the stream is exhausted.
pub struct Tailer {
    path: PathBuf,
    checkpoints: CheckpointStore,
    identity: Box<dyn FileIdentity>,

    // Internal state
    reader: BufReader<File>,
    file_id: FileId,
    offset: u64,
    reading_rotated: bool,
    finished: bool,
}

impl Tailer {
    /// Open `path` using the platform's notion of file identity
    pub fn open(
        path: impl Into<PathBuf>,
        rotation_suffix: &str,
        checkpoints: CheckpointStore,
    ) -> Result<Self, TailError> {
        Self::open_with_identity(path, rotation_suffix, checkpoints, Box::new(PlatformIdentity))
    }

    pub fn open_with_identity(
        path: impl Into<PathBuf>,
        rotation_suffix: &str,
        checkpoints: CheckpointStore,
        identity: Box<dyn FileIdentity>,
    ) -> Result<Self, TailError> {
        let path = path.into();
        let saved = checkpoints.load();

        let live = File::open(&path).map_err(|source| TailError::Open {
            path: path.clone(),
            source,
        })?;
        let live_meta = live.metadata()?;
        let live_id = identity.identify(&live_meta);

        let same_file = saved.file_id.is_some_and(|id| id.matches(&live_id));
        let (file, file_id, offset, reading_rotated) =
            if same_file && live_meta.len() >= saved.offset {
                (live, live_id, saved.offset, false)
            } else {
                let rotated_path = rotated_path(&path, rotation_suffix);
                match open_rotated(&rotated_path, &saved, identity.as_ref()) {
                    Some((rotated, rotated_id)) => {
                        tracing::info!(
                            path = %rotated_path.display(),
                            offset = saved.offset,
                            "Log was rotated, draining predecessor first"
                        );
                        (rotated, rotated_id, saved.offset, true)
                    }
                    None => {
                        if saved.offset > 0 {
                            tracing::warn!(
                                path = %path.display(),
                                previous_offset = saved.offset,
                                current_size = live_meta.len(),
                                "Checkpoint does not match the log and no rotated predecessor found, reading from start"
                            );
                        }
                        (live, live_id, 0, false)
                    }
                }
            };

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset))?;

        tracing::debug!(path = %path.display(), offset, rotated = reading_rotated, "Tailer opened");

        Ok(Self {
            path,
            checkpoints,
            identity,
            reader,
            file_id,
            offset,
            reading_rotated,
            finished: false,
        })
    }

    /// Read the next complete line, without its line terminator.
    ///
    /// Returns `Ok(None)` once both the rotated predecessor (if any) and the
    /// live file are exhausted; the checkpoint is persisted at that point.
    pub fn next_line(&mut self) -> Result<Option<String>, TailError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let mut buf = Vec::new();
            let bytes_read = self.reader.read_until(b'\n', &mut buf)?;

            if bytes_read > 0 {
                let complete = buf.last() == Some(&b'\n');
                // A rotated file never grows again, so its partial tail is final
                if complete || self.reading_rotated {
                    self.offset += bytes_read as u64;
                    return Ok(Some(decode_line(&buf)));
                }

                // Partial line still being written; leave it for the next run
                self.reader.seek(SeekFrom::Start(self.offset))?;
            } else if self.reading_rotated {
                self.switch_to_live()?;
                continue;
            }

            self.finish();
            return Ok(None);
        }
    }

    /// Discard everything not yet read and persist the checkpoint at the end
    /// of the live file.
    pub fn skip_rest(&mut self) -> Result<(), TailError> {
        if self.reading_rotated {
            self.switch_to_live()?;
        }
        self.offset = self.reader.seek(SeekFrom::End(0))?;
        tracing::info!(path = %self.path.display(), offset = self.offset, "Skipping unread log content");
        self.finished = true;
        self.persist();
        Ok(())
    }

    /// Current read position
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            file_id: Some(self.file_id),
            offset: self.offset,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_reading_rotated(&self) -> bool {
        self.reading_rotated
    }

    fn switch_to_live(&mut self) -> Result<(), TailError> {
        let live = File::open(&self.path).map_err(|source| TailError::Open {
            path: self.path.clone(),
            source,
        })?;
        self.file_id = self.identity.identify(&live.metadata()?);
        self.reader = BufReader::new(live);
        self.offset = 0;
        self.reading_rotated = false;
        tracing::info!(path = %self.path.display(), "Rotated predecessor drained, switching to live log");
        Ok(())
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.persist();
        }
    }

    fn persist(&self) {
        // Losing a checkpoint only causes re-delivery on the next run
        if let Err(e) = self.checkpoints.save(&self.checkpoint()) {
            tracing::warn!(error = %e, "Failed to persist checkpoint");
        }
    }
}

impl Iterator for Tailer {
    type Item = Result<String, TailError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

/// Path of the rotated predecessor, e.g. `access.log.1`
pub fn rotated_path(path: &Path, suffix: &str) -> PathBuf {
    let mut rotated = path.as_os_str().to_owned();
    rotated.push(suffix);
    PathBuf::from(rotated)
}

fn open_rotated(
    rotated_path: &Path,
    saved: &Checkpoint,
    identity: &dyn FileIdentity,
) -> Option<(File, FileId)> {
    let saved_id = saved.file_id?;
    let file = File::open(rotated_path).ok()?;
    let metadata = file.metadata().ok()?;
    let rotated_id = identity.identify(&metadata);

    if rotated_id.matches(&saved_id) && metadata.len() >= saved.offset {
        Some((file, rotated_id))
    } else {
        None
    }
}

fn decode_line(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches(&['\n', '\r'][..])
        .to_string()
}
