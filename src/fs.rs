use std::io::Write;
use std::path::Path;

use fs_err as fs;

use crate::consts::{TEMP_FILE_PREFIX, TEMP_FILE_SUFFIX};
use crate::error::CacheError;

/// Writes `bytes` to `path`, creating the parent folders if needed.
/// The content goes to a temporary file in the same folder first and is then renamed over
/// `path`, so readers see either the previous file or the new one, never a partial write.
pub(crate) fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), CacheError> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => {
            fs::create_dir_all(p)?;
            p
        }
        // A bare file name, relative to the working directory
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_FILE_PREFIX).suffix(TEMP_FILE_SUFFIX);
    // tempfile defaults to 0600, we want the same mode as a plain write (0666 minus umask)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder.tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    // Overwriting keeps the permissions of the previous entry
    if let Ok(existing) = fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }
    tmp.persist(path).map_err(|e| CacheError::persist(path, e))?;

    Ok(())
}
