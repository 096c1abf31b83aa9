use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

pub const STAGING_SUFFIX: &str = ".staging";

/// A unique staging name for `dest_name`; removed by [`cleanup_staging`].
pub fn staging_path(dir: &Path, dest_name: &str) -> PathBuf {
    dir.join(format!("{dest_name}.{}{STAGING_SUFFIX}", Uuid::new_v4()))
}

/// Write `bytes` to `dest` through a staging file and a rename.
///
/// Readers see either the previous contents or the new ones, never a mix.
/// An `Err` means `dest` still holds its previous contents.
pub fn write_atomic(dir: &Path, dest_name: &str, bytes: &[u8]) -> io::Result<()> {
    write_atomic_with(dir, dest_name, bytes, fsync_dir)
}

fn write_atomic_with(
    dir: &Path,
    dest_name: &str,
    bytes: &[u8],
    sync_dir: impl FnOnce(&Path) -> io::Result<()>,
) -> io::Result<()> {
    let staging_path = staging_path(dir, dest_name);
    let staged = (|| {
        let mut file = File::create(&staging_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&staging_path, dir.join(dest_name))
    })();
    if let Err(e) = staged {
        let _ = fs::remove_file(&staging_path);
        return Err(e);
    }

    // The rename has landed; the new contents are what the next reader sees.
    if let Err(e) = sync_dir(dir) {
        warn!(dir = %dir.display(), file = dest_name, error = %e, "directory sync failed after rename");
    }
    Ok(())
}

pub fn fsync_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let dir = OpenOptions::new().read(true).open(path)?;
        dir.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Remove leftover staging files from an interrupted commit.
pub fn cleanup_staging(dir: &Path) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().ends_with(STAGING_SUFFIX) {
                warn!(path = %entry.path().display(), "removing orphaned staging file");
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

pub fn restrict_dir_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o700)) {
            warn!("cannot restrict permissions on {}: {}", path.display(), e);
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
