//! The cache root is prefixed onto every relative cache path.
//! There is a process-wide one, set with [`set_cache_root`], and any number of isolated ones
//! created with [`CacheContext::new`].

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::consts::CACHE_DIR_ENV_VAR_NAME;

static GLOBAL_ROOT: LazyLock<Arc<RwLock<Option<PathBuf>>>> =
    LazyLock::new(|| Arc::new(RwLock::new(None)));

/// Sets the process-wide cache root. The path is not checked in any way.
/// Every decorator using the global context picks it up on its next call.
pub fn set_cache_root(path: impl Into<PathBuf>) {
    CacheContext::global().set_root(path);
}

pub fn clear_cache_root() {
    CacheContext::global().clear_root();
}

pub fn cache_root() -> Option<PathBuf> {
    CacheContext::global().root()
}

/// A handle on a cache root. Clones share the same root.
#[derive(Debug, Clone)]
pub struct CacheContext {
    root: Arc<RwLock<Option<PathBuf>>>,
}

impl CacheContext {
    /// An isolated context without a root
    pub fn new() -> Self {
        Self {
            root: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_root(path: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(RwLock::new(Some(path.into()))),
        }
    }

    /// The context behind [`set_cache_root`]
    pub fn global() -> Self {
        Self {
            root: Arc::clone(&*GLOBAL_ROOT),
        }
    }

    /// An isolated context using `CACHE_DIR` as root, if it is set to something
    pub fn from_env() -> Self {
        match env::var_os(CACHE_DIR_ENV_VAR_NAME) {
            Some(v) if !v.is_empty() => Self::with_root(v),
            _ => Self::new(),
        }
    }

    pub fn is_global(&self) -> bool {
        Arc::ptr_eq(&self.root, &*GLOBAL_ROOT)
    }

    pub fn set_root(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        log::debug!("Setting cache root to {}", path.display());
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = Some(path);
    }

    pub fn clear_root(&self) {
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn root(&self) -> Option<PathBuf> {
        self.root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Absolute paths are returned as is, relative ones are joined to the root if there is one.
    /// Without a root, the path stays relative to the current working directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        resolve_with(self.root().as_deref(), path.as_ref())
    }
}

impl Default for CacheContext {
    fn default() -> Self {
        Self::global()
    }
}

pub(crate) fn resolve_with(root: Option<&Path>, path: &Path) -> PathBuf {
    match root {
        Some(root) if !path.is_absolute() => root.join(path),
        _ => path.to_path_buf(),
    }
}
