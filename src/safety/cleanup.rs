/// Workspace removal
/// Idempotent: removing a tree that is already gone succeeds.
use log::debug;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Recursively remove `path`.
///
/// User programs can leave directories without write or search permission
/// behind. When the first attempt fails, directory permissions are restored
/// (without following symlinks) and removal is retried once.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(first) => {
            debug!(
                "Removing {} failed ({}), restoring permissions and retrying",
                path.display(),
                first
            );
            restore_permissions(path);
            match fs::remove_dir_all(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            }
        }
    }
}

fn restore_permissions(path: &Path) {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return,
    };
    if !metadata.is_dir() {
        return;
    }

    let mode = metadata.permissions().mode();
    if mode & 0o700 != 0o700 {
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o700));
    }

    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            restore_permissions(&entry.path());
        }
    }
}
