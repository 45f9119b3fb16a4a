use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Replace `path` with `bytes` via a sibling temp file and a rename.
///
/// The temp file lives in the destination directory so the rename stays on
/// one filesystem. On any error before the rename the temp file is removed on
/// drop and the original is untouched.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".booru-xmp-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    // Keep the original's mode; the temp file is created 0600.
    if let Ok(meta) = fs::metadata(path) {
        if let Err(e) = fs::set_permissions(tmp.path(), meta.permissions()) {
            log::debug!("Could not copy permissions onto {}: {e}", tmp.path().display());
        }
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
