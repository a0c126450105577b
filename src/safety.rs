use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Version-control directories under the workspace. Never edited even when a
/// patch set names a file inside one.
const PROTECTED_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Keeps patch targets inside the JavaScript workspace being patched.
///
/// Every path is compared in canonical form, so `..` components and symlinks
/// pointing out of the workspace are caught.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    root: PathBuf,
    protected: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("{path} resolves outside the workspace {workspace}")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("{path} is inside protected directory {dir}")]
    ForbiddenPath { path: PathBuf, dir: PathBuf },

    #[error("cannot resolve {path}: {source}")]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn canonical(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize()
        .map_err(|source| SafetyError::Unresolvable {
            path: path.to_path_buf(),
            source,
        })
}

impl WorkspaceGuard {
    pub fn new(workspace_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = canonical(workspace_root.as_ref())?;
        // Protected directories that do not exist yet cannot hold targets.
        let protected = PROTECTED_DIRS
            .iter()
            .filter_map(|dir| root.join(dir).canonicalize().ok())
            .collect();

        Ok(Self { root, protected })
    }

    /// Resolve a target path (absolute, or relative to the workspace root) and
    /// return its canonical form if it may be edited. The file must exist.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let resolved = canonical(&self.root.join(path.as_ref()))?;
        self.ensure_contained(resolved)
    }

    /// Repeat the check on an already validated path right before writing.
    pub fn revalidate(&self, path: &Path) -> Result<PathBuf, SafetyError> {
        self.ensure_contained(canonical(path)?)
    }

    fn ensure_contained(&self, path: PathBuf) -> Result<PathBuf, SafetyError> {
        if !path.starts_with(&self.root) {
            return Err(SafetyError::OutsideWorkspace {
                path,
                workspace: self.root.clone(),
            });
        }
        if let Some(dir) = self.protected.iter().find(|dir| path.starts_with(dir)) {
            return Err(SafetyError::ForbiddenPath {
                dir: dir.clone(),
                path,
            });
        }
        Ok(path)
    }

    pub fn workspace_root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_file_in_node_modules_is_allowed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("node_modules/marked/lib/marked.esm.js");
        touch(&file);

        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();
        let relative = guard.validate_path("node_modules/marked/lib/marked.esm.js").unwrap();
        let absolute = guard.validate_path(&file).unwrap();
        assert_eq!(relative, absolute);
        assert!(relative.starts_with(guard.workspace_root()));
    }

    #[test]
    fn test_sibling_of_workspace_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("app");
        fs::create_dir_all(&workspace).unwrap();
        touch(&temp_dir.path().join("secret.js"));

        let guard = WorkspaceGuard::new(&workspace).unwrap();
        let by_traversal = guard.validate_path("../secret.js");
        let by_absolute = guard.validate_path(temp_dir.path().join("secret.js"));
        assert!(matches!(by_traversal, Err(SafetyError::OutsideWorkspace { .. })));
        assert!(matches!(by_absolute, Err(SafetyError::OutsideWorkspace { .. })));
    }

    #[test]
    fn test_git_dir_is_protected() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(&temp_dir.path().join(".git/hooks/pre-commit"));

        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();
        let result = guard.validate_path(".git/hooks/pre-commit");
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();

        let err = guard.validate_path("node_modules/nope.js").unwrap_err();
        assert!(matches!(err, SafetyError::Unresolvable { .. }));
        assert!(err.to_string().contains("nope.js"));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_out_of_workspace_is_rejected() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();
        let outside = temp_dir.path().join("outside.js");
        touch(&outside);
        symlink(&outside, workspace.join("escape.js")).unwrap();

        let guard = WorkspaceGuard::new(&workspace).unwrap();
        let result = guard.validate_path("escape.js");
        assert!(matches!(result, Err(SafetyError::OutsideWorkspace { .. })));
    }
}
