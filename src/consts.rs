/// Read by `CacheContext::from_env` to seed the cache root
pub const CACHE_DIR_ENV_VAR_NAME: &str = "CACHE_DIR";

/// Temporary files are created next to the entry they will replace so the final rename
/// stays on the same filesystem
pub(crate) const TEMP_FILE_PREFIX: &str = ".cachefun-";
pub(crate) const TEMP_FILE_SUFFIX: &str = ".tmp";

pub(crate) const MIN_TIME_EXAMPLE: &str = "2023-12-04T20:56:48";
