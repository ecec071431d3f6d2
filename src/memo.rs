use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use fs_err as fs;
use jiff::Timestamp;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{Codec, MessagePack};
use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::fs::write_atomic;
use crate::min_time::{from_system_time, parse_min_time};
use crate::root::{CacheContext, resolve_with};

/// Builds a disk cache for the file at `path`.
///
/// `min_time` should be the date of the last significant change to the code of the function:
/// entries last modified before it are computed again. It is parsed right away and an invalid
/// value is an error.
///
/// ```no_run
/// let double = cachefun::cache("double.mp", None)?.wrap(|x: u64| x * 2);
/// assert_eq!(double.call(5)?, 10);
/// // The path is the key, not the arguments
/// assert_eq!(double.call(999)?, 10);
/// # Ok::<(), cachefun::CacheError>(())
/// ```
pub fn cache(path: impl Into<PathBuf>, min_time: Option<&str>) -> Result<DiskMemo, CacheError> {
    let mut builder = DiskMemo::builder(path);
    if let Some(t) = min_time {
        builder = builder.min_time(t);
    }
    builder.build()
}

#[derive(Debug, Clone)]
enum Threshold {
    Text(String),
    Instant(Timestamp),
    System(SystemTime),
}

#[derive(Debug, Clone)]
pub struct DiskMemoBuilder<C = MessagePack> {
    path: PathBuf,
    min_time: Option<Threshold>,
    cache_root: Option<PathBuf>,
    forced: bool,
    context: CacheContext,
    codec: C,
}

impl<C: Codec> DiskMemoBuilder<C> {
    /// Same format as [`crate::parse_min_time`]. Checked in [`Self::build`].
    pub fn min_time(mut self, min_time: impl Into<String>) -> Self {
        self.min_time = Some(Threshold::Text(min_time.into()));
        self
    }

    pub fn min_time_at(mut self, min_time: Timestamp) -> Self {
        self.min_time = Some(Threshold::Instant(min_time));
        self
    }

    pub fn min_time_system(mut self, min_time: SystemTime) -> Self {
        self.min_time = Some(Threshold::System(min_time));
        self
    }

    /// A root only for this cache, used instead of the one from the context
    pub fn cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Never read the entry, always compute and overwrite it
    pub fn forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    pub fn context(mut self, context: CacheContext) -> Self {
        self.context = context;
        self
    }

    pub fn codec<C2: Codec>(self, codec: C2) -> DiskMemoBuilder<C2> {
        DiskMemoBuilder {
            path: self.path,
            min_time: self.min_time,
            cache_root: self.cache_root,
            forced: self.forced,
            context: self.context,
            codec,
        }
    }

    pub fn build(self) -> Result<DiskMemo<C>, CacheError> {
        let min_time = match self.min_time {
            None => None,
            Some(Threshold::Text(s)) => Some(parse_min_time(&s)?),
            Some(Threshold::Instant(t)) => Some(t),
            Some(Threshold::System(t)) => Some(from_system_time(t)?),
        };

        Ok(DiskMemo {
            path: self.path,
            min_time,
            cache_root: self.cache_root,
            forced: self.forced,
            context: self.context,
            codec: self.codec,
        })
    }
}

/// A single cache entry on disk, standing in for calls to one function.
///
/// The key is the path alone: the arguments of the function are not looked at, so it is meant
/// for functions called once per output file.
#[derive(Debug, Clone)]
pub struct DiskMemo<C = MessagePack> {
    path: PathBuf,
    min_time: Option<Timestamp>,
    cache_root: Option<PathBuf>,
    forced: bool,
    context: CacheContext,
    codec: C,
}

impl DiskMemo {
    pub fn builder(path: impl Into<PathBuf>) -> DiskMemoBuilder {
        DiskMemoBuilder {
            path: path.into(),
            min_time: None,
            cache_root: None,
            forced: false,
            context: CacheContext::global(),
            codec: MessagePack,
        }
    }
}

impl<C: Codec> DiskMemo<C> {
    /// The path as given when building
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn min_time(&self) -> Option<Timestamp> {
        self.min_time
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Where the entry lives right now. The context root is read on every call so it can be
    /// set after the cache is built.
    pub fn resolve_path(&self) -> PathBuf {
        match &self.cache_root {
            Some(root) => resolve_with(Some(root.as_path()), &self.path),
            None => self.context.resolve(&self.path),
        }
    }

    pub fn status(&self) -> Result<CacheEntry, CacheError> {
        Ok(CacheEntry::inspect(self.resolve_path(), self.min_time)?)
    }

    /// Reads and decodes the file at `path`
    pub fn load<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T, CacheError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        self.codec
            .decode(&bytes)
            .map_err(|e| CacheError::codec(path, e))
    }

    /// Encodes `value` and atomically writes it at `path`.
    /// Nothing touches the disk if encoding fails.
    pub fn store<T: Serialize + ?Sized>(
        &self,
        path: impl AsRef<Path>,
        value: &T,
    ) -> Result<(), CacheError> {
        let path = path.as_ref();
        let bytes = self
            .codec
            .encode(value)
            .map_err(|e| CacheError::codec(path, e))?;
        write_atomic(path, &bytes)
    }

    /// Returns the cached value if there is a valid entry, otherwise runs `compute` and caches
    /// what it returns.
    /// An error from `compute` is returned as is and nothing is written.
    /// An entry that cannot be decoded is an error, it is not computed again.
    pub fn try_get_or_compute<T, E, F>(&self, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Result<T, E>,
    {
        self.run(self.forced, compute)
    }

    pub fn get_or_compute<T, F>(&self, compute: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.try_get_or_compute(|| Ok(compute()))
    }

    /// Runs `compute` and overwrites the entry, whatever its state
    pub fn try_refresh<T, E, F>(&self, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Result<T, E>,
    {
        self.run(true, compute)
    }

    pub fn refresh<T, F>(&self, compute: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.try_refresh(|| Ok(compute()))
    }

    fn run<T, E, F>(&self, forced: bool, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Result<T, E>,
    {
        let entry = self.status()?;

        if entry.is_valid() && !forced {
            log::info!("Loading cached data from {}", entry.path().display());
            let start_time = Instant::now();
            let value = self.load(entry.path())?;
            log::debug!(
                "Loading {} took: {:?}",
                entry.path().display(),
                start_time.elapsed()
            );
            return Ok(value);
        }

        if entry.exists() {
            log::info!("Recomputing data for {}", entry.path().display());
        } else {
            log::info!("Computing data for {}", entry.path().display());
        }

        let start_time = Instant::now();
        let value = compute()?;
        log::debug!(
            "Computing {} took: {:?}",
            entry.path().display(),
            start_time.elapsed()
        );

        self.store(entry.path(), &value)?;
        Ok(value)
    }

    /// Turns `f` into a function whose result is cached in this entry
    pub fn wrap<F>(self, f: F) -> Memoized<F, C> {
        Memoized { memo: self, f }
    }
}

/// A function paired with its cache entry.
/// Functions taking several arguments take them as a tuple.
#[derive(Debug, Clone)]
pub struct Memoized<F, C = MessagePack> {
    memo: DiskMemo<C>,
    f: F,
}

impl<F, C: Codec> Memoized<F, C> {
    pub fn call<A, T>(&self, args: A) -> Result<T, CacheError>
    where
        F: Fn(A) -> T,
        T: Serialize + DeserializeOwned,
    {
        self.memo.get_or_compute(|| (self.f)(args))
    }

    /// For functions returning a `Result`: their error type needs to be able to hold a
    /// [`CacheError`] and their own errors are passed through unchanged.
    pub fn try_call<A, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
    {
        self.memo.try_get_or_compute(|| (self.f)(args))
    }

    /// Ignores the cached value, if any, and overwrites it
    pub fn call_forced<A, T>(&self, args: A) -> Result<T, CacheError>
    where
        F: Fn(A) -> T,
        T: Serialize + DeserializeOwned,
    {
        self.memo.refresh(|| (self.f)(args))
    }

    pub fn try_call_forced<A, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
    {
        self.memo.try_refresh(|| (self.f)(args))
    }

    pub fn memo(&self) -> &DiskMemo<C> {
        &self.memo
    }

    /// The wrapped function, without caching
    pub fn inner(&self) -> &F {
        &self.f
    }
}
