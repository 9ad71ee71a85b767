/// Per-request workspace directories
/// Every request gets a freshly created directory that nothing else shares,
/// removed again when the request completes.
use crate::config::types::{Result, RunnerError};
use crate::core::types::File;
use crate::safety::{cleanup, path_validation};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Attempts before giving up on finding an unused directory name
const MAX_CREATE_ATTEMPTS: usize = 8;

/// Source of the unique part of workspace directory names
pub trait NameGenerator: Send + Sync {
    fn next_name(&self) -> String;
}

/// Random UUID v4 names
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidNames;

impl NameGenerator for UuidNames {
    fn next_name(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic names `<seed>-0`, `<seed>-1`, ...
#[derive(Debug)]
pub struct CounterNames {
    seed: String,
    next: AtomicU64,
}

impl CounterNames {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl NameGenerator for CounterNames {
    fn next_name(&self) -> String {
        format!("{}-{}", self.seed, self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Allocates workspaces under a base directory
pub struct WorkspaceManager {
    base_dir: PathBuf,
    prefix: String,
    names: Box<dyn NameGenerator>,
}

impl WorkspaceManager {
    /// Create the manager, creating `base_dir` if needed
    pub fn new(base_dir: PathBuf, prefix: impl Into<String>, names: Box<dyn NameGenerator>) -> Result<Self> {
        fs::create_dir_all(&base_dir).map_err(|source| RunnerError::Staging {
            action: "create workspace base directory",
            path: base_dir.clone(),
            source,
        })?;

        Ok(Self {
            base_dir,
            prefix: prefix.into(),
            names,
        })
    }

    /// Create a new, empty workspace directory.
    ///
    /// An existing directory with the generated name is never reused; a new
    /// name is drawn instead.
    pub fn create_workspace(&self) -> Result<Workspace> {
        let mut last_error = None;

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let root = self
                .base_dir
                .join(format!("{}-{}", self.prefix, self.names.next_name()));

            match fs::create_dir(&root) {
                Ok(()) => {
                    log::debug!("Created workspace {}", root.display());
                    return Ok(Workspace {
                        root,
                        released: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    log::debug!("Workspace {} already exists, drawing a new name", root.display());
                    last_error = Some((root, e));
                }
                Err(source) => {
                    return Err(RunnerError::Staging {
                        action: "create workspace",
                        path: root,
                        source,
                    })
                }
            }
        }

        let (path, source) = last_error.unwrap_or_else(|| {
            (
                self.base_dir.clone(),
                io::Error::new(io::ErrorKind::Other, "no workspace name available"),
            )
        });
        Err(RunnerError::Staging {
            action: "create workspace",
            path,
            source,
        })
    }
}

/// A request's private directory, removed on release or drop
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one file, creating intermediate directories
    pub fn write_file(&self, file: &File) -> Result<PathBuf> {
        let relative = path_validation::normalize_name(&file.name)?;
        let path = self.root.join(relative);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| RunnerError::Staging {
                action: "create directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(&path, file.content.as_bytes()).map_err(|source| RunnerError::Staging {
            action: "write file",
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }

    /// Write all files in order. Later files overwrite earlier ones with the same path.
    pub fn write_files(&self, files: &[File]) -> Result<Vec<PathBuf>> {
        files.iter().map(|file| self.write_file(file)).collect()
    }

    /// Remove the workspace and report failure
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        cleanup::remove_tree(&self.root).map_err(|source| RunnerError::Staging {
            action: "remove workspace",
            path: self.root.clone(),
            source,
        })?;
        log::debug!("Released workspace {}", self.root.display());
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = cleanup::remove_tree(&self.root) {
            log::warn!("Failed to remove workspace {}: {}", self.root.display(), e);
        }
    }
}
