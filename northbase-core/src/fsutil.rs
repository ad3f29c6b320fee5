use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{NorthbaseError, Result};

/// Write `bytes` to `dest` through a temp file in the same directory and an
/// atomic rename, so readers see either the old file or the whole new one.
///
/// Parent directories are created as needed. With `owner_only` the file ends
/// up mode 0600 on unix.
pub(crate) fn write_atomic(dest: &Path, bytes: &[u8], owner_only: bool) -> Result<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| NorthbaseError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| NorthbaseError::io(parent, e))?;
    tmp.write_all(bytes)
        .map_err(|e| NorthbaseError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| NorthbaseError::io(tmp.path(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if owner_only { 0o600 } else { 0o644 };
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(mode))
            .map_err(|e| NorthbaseError::io(tmp.path(), e))?;
    }
    #[cfg(not(unix))]
    let _ = owner_only;

    tmp.persist(dest)
        .map_err(|e| NorthbaseError::io(dest, e.error))?;
    Ok(())
}
