//! Cache the result of expensive function calls in a file, so they are not computed again
//! after a restart.
//!
//! The file path is the cache key: calling a cached function with other arguments returns the
//! value stored by the first call. Entries older than an optional `min_time` are recomputed.

mod codec;
mod entry;
mod error;
mod fs;
mod memo;
mod min_time;
mod root;

pub mod consts;

pub use codec::{Codec, CodecError, Json, MessagePack};
pub use entry::CacheEntry;
pub use error::{CacheError, CacheErrorKind};
pub use memo::{DiskMemo, DiskMemoBuilder, Memoized, cache};
pub use min_time::{MinTimeError, parse_min_time};
pub use root::{CacheContext, cache_root, clear_cache_root, set_cache_root};

pub use jiff::Timestamp;
