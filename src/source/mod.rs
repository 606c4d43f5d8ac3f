pub mod checkpoint;
pub mod identity;
pub mod tailer;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
pub use identity::{FileId, FileIdentity, PlatformIdentity};
pub use tailer::{rotated_path, TailError, Tailer};
