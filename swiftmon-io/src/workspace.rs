//! Working directory and scoped scratch files.
//!
//! External tools run inside the workspace directory, so every name handed
//! to a tool is relative to it. Scratch names are deterministic and carry
//! the workspace namespace as a prefix; two pipelines sharing a directory
//! must use different namespaces.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory in which a pipeline runs its tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    dir: PathBuf,
    namespace: String,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Workspace {
    /// Workspace rooted at `dir` with no scratch namespace.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            namespace: String::new(),
        }
    }

    /// Prefixes every scratch name with `namespace`.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resolves a tool-relative path to one usable from this process.
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }

    /// Namespaced scratch file name, e.g. `temp_spec1.pha`.
    #[must_use]
    pub fn scratch_name(&self, name: &str) -> String {
        format!("{}{name}", self.namespace)
    }

    /// Claims a scratch file that is removed when the guard drops.
    ///
    /// The file itself is created by whoever writes to it.
    #[must_use]
    pub fn scratch(&self, name: &str) -> ScratchFile {
        let name = self.scratch_name(name);
        ScratchFile {
            path: self.resolve(&name),
            name,
            root_len: None,
        }
    }

    /// Claims a file produced under an output root, e.g. `temp` + `.img`.
    #[must_use]
    pub fn scratch_product(&self, root: &str, suffix: &str) -> ScratchFile {
        let mut file = self.scratch(&format!("{root}{suffix}"));
        file.root_len = Some(file.name.len() - suffix.len());
        file
    }
}

/// A temporary file deleted on drop, on success and error paths alike.
#[derive(Debug)]
pub struct ScratchFile {
    name: String,
    path: PathBuf,
    root_len: Option<usize>,
}

impl ScratchFile {
    /// Name relative to the workspace, as passed to tools.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output root for tools that append their own suffix.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.name[..self.root_len.unwrap_or(self.name.len())]
    }

    /// Resolved path for reading from this process.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed scratch file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove scratch file"),
        }
    }
}
