use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use fs_err as fs;
use jiff::Timestamp;

/// What we found on disk for a cache path
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum CacheEntry {
    /// Present and recent enough to be used
    Existing(PathBuf),
    NotFound(PathBuf),
    /// Present but last modified before the `min_time` threshold
    Expired(PathBuf),
}

impl CacheEntry {
    /// Looks at `path` without reading it.
    /// Only a missing file counts as not found: any other error while reading its metadata is
    /// returned.
    pub fn inspect(path: impl Into<PathBuf>, min_time: Option<Timestamp>) -> io::Result<Self> {
        let path = path.into();
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::NotFound(path)),
            Err(e) => return Err(e),
        };

        let Some(min_time) = min_time else {
            return Ok(Self::Existing(path));
        };

        let mtime = modified_at(&metadata)?;
        log::trace!(
            "Cache entry {} last modified at {mtime}, min_time is {min_time}",
            path.display()
        );
        if mtime >= min_time {
            Ok(Self::Existing(path))
        } else {
            Ok(Self::Expired(path))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Existing(p) | Self::NotFound(p) | Self::Expired(p) => p,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Self::Existing(p) | Self::NotFound(p) | Self::Expired(p) => p,
        }
    }

    /// Whether the content can be used instead of calling the function
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Existing(_))
    }

    /// Whether there is a file at that path, valid or not
    pub fn exists(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

fn modified_at(metadata: &std::fs::Metadata) -> io::Result<Timestamp> {
    let ft = FileTime::from_last_modification_time(metadata);
    Timestamp::new(ft.unix_seconds(), ft.nanoseconds() as i32).map_err(io::Error::other)
}
