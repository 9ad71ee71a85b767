/// File name validation for staged files
/// Names come straight from the request, so anything that could resolve
/// outside the workspace is refused before touching the filesystem.
use crate::config::types::{Result, RunnerError};
use std::path::{Component, Path, PathBuf};

/// Turn a request file name into a path relative to the workspace root.
///
/// Rejects empty names, absolute paths, `..` components and NUL bytes.
/// `.` components and repeated separators are dropped.
pub fn normalize_name(name: &str) -> Result<PathBuf> {
    let reject = || {
        log::warn!("Rejected file name {:?}", name);
        Err(RunnerError::PathTraversal(name.to_string()))
    };

    if name.is_empty() || name.contains('\0') {
        return reject();
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return reject(),
        }
    }

    if normalized.as_os_str().is_empty() {
        return reject();
    }

    Ok(normalized)
}
