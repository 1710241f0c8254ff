//! File actions scoped to a sandbox directory

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Failure of a file action
#[derive(Debug, Error)]
pub enum FileActionError {
    /// Path is empty, absolute, or escapes the sandbox
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Target already exists (create)
    #[error("file already exists: {0}")]
    AlreadyExists(String),

    /// Target does not exist (update, delete)
    #[error("file not found: {0}")]
    NotFound(String),

    /// The operating system refused the operation
    #[error("permission denied: {0}")]
    Denied(String),

    /// Any other IO failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Arguments of `create_file` / `update_file`
#[derive(Debug, Deserialize)]
pub struct WriteFileArgs {
    pub file_name: String,
    pub content: String,
}

/// Arguments of `delete_file`
#[derive(Debug, Deserialize)]
pub struct DeleteFileArgs {
    pub file_name: String,
}

/// Creates, updates and deletes files under a single root
#[derive(Debug, Clone)]
pub struct FileActions {
    root: PathBuf,
}

impl FileActions {
    /// Scope file actions to `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Sandbox root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path inside the sandbox
    ///
    /// # Errors
    ///
    /// `InvalidPath` for empty, absolute or parent-traversing paths
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, FileActionError> {
        let trimmed = relative.trim();
        if trimmed.is_empty() {
            return Err(FileActionError::InvalidPath("empty path".to_string()));
        }

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FileActionError::InvalidPath(relative.to_string()));
                }
            }
        }

        if depth == 0 {
            return Err(FileActionError::InvalidPath(relative.to_string()));
        }
        Ok(resolved)
    }

    /// Create a new file; fails if it already exists
    ///
    /// # Errors
    ///
    /// `InvalidPath`, `AlreadyExists`, `Denied` or `Io`
    pub async fn create(&self, relative: &str, content: &str) -> Result<PathBuf, FileActionError> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| classify(e, relative))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| classify(e, relative))?;

        tokio::io::AsyncWriteExt::write_all(&mut file, content.as_bytes())
            .await
            .map_err(|e| classify(e, relative))?;
        tokio::io::AsyncWriteExt::flush(&mut file)
            .await
            .map_err(|e| classify(e, relative))?;

        tracing::info!(path = %path.display(), bytes = content.len(), "file created");
        Ok(path)
    }

    /// Replace the contents of an existing file
    ///
    /// # Errors
    ///
    /// `InvalidPath`, `NotFound`, `Denied` or `Io`
    pub async fn update(&self, relative: &str, content: &str) -> Result<PathBuf, FileActionError> {
        let path = self.resolve(relative)?;
        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| classify(e, relative))?
        {
            return Err(FileActionError::NotFound(relative.to_string()));
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| classify(e, relative))?;

        tracing::info!(path = %path.display(), bytes = content.len(), "file updated");
        Ok(path)
    }

    /// Delete an existing file
    ///
    /// # Errors
    ///
    /// `InvalidPath`, `NotFound`, `Denied` or `Io`
    pub async fn delete(&self, relative: &str) -> Result<PathBuf, FileActionError> {
        let path = self.resolve(relative)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| classify(e, relative))?;

        tracing::info!(path = %path.display(), "file deleted");
        Ok(path)
    }

    /// `create_file` handler
    ///
    /// # Errors
    ///
    /// See [`FileActions::create`]
    pub async fn handle_create(&self, args: WriteFileArgs) -> Result<Value, FileActionError> {
        self.create(&args.file_name, &args.content).await?;
        Ok(json!({ "status": "created", "file_name": args.file_name }))
    }

    /// `update_file` handler
    ///
    /// # Errors
    ///
    /// See [`FileActions::update`]
    pub async fn handle_update(&self, args: WriteFileArgs) -> Result<Value, FileActionError> {
        self.update(&args.file_name, &args.content).await?;
        Ok(json!({ "status": "updated", "file_name": args.file_name }))
    }

    /// `delete_file` handler
    ///
    /// # Errors
    ///
    /// See [`FileActions::delete`]
    pub async fn handle_delete(&self, args: DeleteFileArgs) -> Result<Value, FileActionError> {
        self.delete(&args.file_name).await?;
        Ok(json!({ "status": "deleted", "file_name": args.file_name }))
    }
}

fn classify(err: std::io::Error, relative: &str) -> FileActionError {
    match err.kind() {
        ErrorKind::AlreadyExists => FileActionError::AlreadyExists(relative.to_string()),
        ErrorKind::NotFound => FileActionError::NotFound(relative.to_string()),
        ErrorKind::PermissionDenied => FileActionError::Denied(relative.to_string()),
        _ => FileActionError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_inside_root() {
        let files = FileActions::new("/sandbox");
        assert_eq!(
            files.resolve("notes/todo.md").unwrap(),
            PathBuf::from("/sandbox/notes/todo.md")
        );
        assert_eq!(
            files.resolve("./todo.md").unwrap(),
            PathBuf::from("/sandbox/todo.md")
        );
    }

    #[test]
    fn rejects_escaping_paths() {
        let files = FileActions::new("/sandbox");
        for bad in ["", "  ", "../etc/passwd", "/etc/passwd", "a/../../b", "."] {
            assert!(
                matches!(files.resolve(bad), Err(FileActionError::InvalidPath(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
