use std::io;
use std::path::PathBuf;

use crate::codec::CodecError;
use crate::min_time::MinTimeError;

/// Everything that can go wrong in the caching layer itself.
/// Errors coming from the memoized function are never wrapped in this.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
#[non_exhaustive]
pub struct CacheError {
    pub source: CacheErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheErrorKind {
    /// The decorator could not be built
    #[error(transparent)]
    MinTime(#[from] MinTimeError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Failed to move the cache entry into place at {path:?}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
    #[error("Cache entry at {path:?} could not be processed")]
    Codec {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
}

impl CacheError {
    pub fn kind(&self) -> &CacheErrorKind {
        &self.source
    }

    pub fn is_config(&self) -> bool {
        matches!(self.source, CacheErrorKind::MinTime(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(
            self.source,
            CacheErrorKind::Io(_) | CacheErrorKind::Persist { .. }
        )
    }

    pub fn is_codec(&self) -> bool {
        matches!(self.source, CacheErrorKind::Codec { .. })
    }

    pub(crate) fn codec(path: impl Into<PathBuf>, source: CodecError) -> Self {
        Self {
            source: CacheErrorKind::Codec {
                path: path.into(),
                source,
            },
        }
    }

    pub(crate) fn persist(path: impl Into<PathBuf>, source: tempfile::PersistError) -> Self {
        Self {
            source: CacheErrorKind::Persist {
                path: path.into(),
                source,
            },
        }
    }
}

impl From<MinTimeError> for CacheError {
    fn from(error: MinTimeError) -> Self {
        Self {
            source: CacheErrorKind::MinTime(error),
        }
    }
}

impl From<io::Error> for CacheError {
    fn from(error: io::Error) -> Self {
        Self {
            source: CacheErrorKind::Io(error),
        }
    }
}
