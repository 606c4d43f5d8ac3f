use std::fmt;
use std::fs::Metadata;
use std::str::FromStr;

/// Stable identifier of a file on disk, independent of its name.
///
/// On unix this is the `(device, inode)` pair. A checkpoint written by an
/// older release may carry a bare inode, in which case `device` is `None`
/// and only the inode takes part in comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    pub device: Option<u64>,
    pub inode: u64,
}

impl FileId {
    pub fn new(device: u64, inode: u64) -> Self {
        Self {
            device: Some(device),
            inode,
        }
    }

    /// Check whether two identifiers refer to the same file
    pub fn matches(&self, other: &FileId) -> bool {
        match (self.device, other.device) {
            (Some(a), Some(b)) => a == b && self.inode == other.inode,
            _ => self.inode == other.inode,
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device {
            Some(device) => write!(f, "{}:{}", device, self.inode),
            None => write!(f, "{}", self.inode),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid file identity '{0}'")]
pub struct ParseFileIdError(String);

impl FromStr for FileId {
    type Err = ParseFileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ParseFileIdError(s.to_string());

        match s.split_once(':') {
            Some((device, inode)) => Ok(FileId::new(
                device.parse().map_err(|_| invalid())?,
                inode.parse().map_err(|_| invalid())?,
            )),
            None => Ok(FileId {
                device: None,
                inode: s.parse().map_err(|_| invalid())?,
            }),
        }
    }
}

/// Capability for deriving a [`FileId`] from file metadata.
///
/// Injected into the tailer so rotation detection does not depend on how a
/// given platform names files.
pub trait FileIdentity: Send + Sync {
    fn identify(&self, metadata: &Metadata) -> FileId;
}

/// Platform default: device and inode where available.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformIdentity;

#[cfg(unix)]
impl FileIdentity for PlatformIdentity {
    fn identify(&self, metadata: &Metadata) -> FileId {
        use std::os::unix::fs::MetadataExt;
        FileId::new(metadata.dev(), metadata.ino())
    }
}

#[cfg(not(unix))]
impl FileIdentity for PlatformIdentity {
    fn identify(&self, metadata: &Metadata) -> FileId {
        // Creation time survives appends, unlike size or mtime
        let created = metadata
            .created()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        FileId {
            device: None,
            inode: created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_and_inode() {
        let id: FileId = "2049:131".parse().unwrap();
        assert_eq!(id, FileId::new(2049, 131));
        assert_eq!(id.to_string(), "2049:131");
    }

    #[test]
    fn test_bare_inode_matches_by_inode_only() {
        let legacy: FileId = "131".parse().unwrap();
        assert_eq!(legacy.device, None);
        assert!(legacy.matches(&FileId::new(2049, 131)));
        assert!(!legacy.matches(&FileId::new(2049, 132)));
    }

    #[test]
    fn test_device_mismatch() {
        assert!(!FileId::new(1, 131).matches(&FileId::new(2, 131)));
    }

    #[test]
    fn test_invalid_identity() {
        assert!("abc".parse::<FileId>().is_err());
        assert!("1:".parse::<FileId>().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_platform_identity_stable_across_appends() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        let before = PlatformIdentity.identify(&file.as_file().metadata().unwrap());
        writeln!(file, "more data").unwrap();
        let after = PlatformIdentity.identify(&file.as_file().metadata().unwrap());
        assert_eq!(before, after);
    }
}
