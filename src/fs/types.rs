//! File System Types
//!
//! The filesystem is a collaborator of the interpreter: redirections,
//! globbing, `cd`, `pwd -P`, `source` and file tests all go through this
//! trait, never through the host filesystem.

use async_trait::async_trait;
use std::time::SystemTime;
use thiserror::Error;

/// File system errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("ENOENT: no such file or directory, {operation} '{path}'")]
    NotFound { path: String, operation: String },

    #[error("EEXIST: file already exists, {operation} '{path}'")]
    AlreadyExists { path: String, operation: String },

    #[error("EISDIR: illegal operation on a directory, {operation} '{path}'")]
    IsDirectory { path: String, operation: String },

    #[error("ENOTDIR: not a directory, {operation} '{path}'")]
    NotDirectory { path: String, operation: String },

    #[error("ENOTEMPTY: directory not empty, {operation} '{path}'")]
    NotEmpty { path: String, operation: String },

    #[error("ELOOP: too many levels of symbolic links, {operation} '{path}'")]
    SymlinkLoop { path: String, operation: String },

    #[error("EACCES: permission denied, {operation} '{path}'")]
    PermissionDenied { path: String, operation: String },
}

impl FsError {
    pub(crate) fn not_found(path: &str, operation: &str) -> Self {
        Self::NotFound { path: path.to_string(), operation: operation.to_string() }
    }

    pub(crate) fn is_directory(path: &str, operation: &str) -> Self {
        Self::IsDirectory { path: path.to_string(), operation: operation.to_string() }
    }

    pub(crate) fn not_directory(path: &str, operation: &str) -> Self {
        Self::NotDirectory { path: path.to_string(), operation: operation.to_string() }
    }

    /// The strerror-style text shells print after the file name.
    pub fn shell_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "No such file or directory",
            Self::AlreadyExists { .. } => "File exists",
            Self::IsDirectory { .. } => "Is a directory",
            Self::NotDirectory { .. } => "Not a directory",
            Self::NotEmpty { .. } => "Directory not empty",
            Self::SymlinkLoop { .. } => "Too many levels of symbolic links",
            Self::PermissionDenied { .. } => "Permission denied",
        }
    }
}

/// File status information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsStat {
    pub is_file: bool,
    pub is_directory: bool,
    pub is_symlink: bool,
    pub mode: u32,
    pub size: u64,
    pub mtime: SystemTime,
}

impl FsStat {
    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }
}

/// Directory entry with type information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirentEntry {
    pub name: String,
    pub is_file: bool,
    pub is_directory: bool,
    pub is_symlink: bool,
}

/// Options for rm operation
#[derive(Debug, Clone, Copy, Default)]
pub struct RmOptions {
    pub recursive: bool,
    pub force: bool,
}

/// Abstract filesystem interface that can be implemented by different backends.
/// All paths handed to it are absolute (see `resolve_path`).
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read the contents of a file as a string (lossy utf8)
    async fn read_file(&self, path: &str) -> Result<String, FsError> {
        let bytes = self.read_file_bytes(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the contents of a file as bytes
    async fn read_file_bytes(&self, path: &str) -> Result<Vec<u8>, FsError>;

    /// Write content to a file, creating or truncating it. The parent
    /// directory must exist.
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;

    /// Append content to a file, creating it if it doesn't exist
    async fn append_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;

    async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }

    /// Follows symlinks
    async fn stat(&self, path: &str) -> Result<FsStat, FsError>;

    /// Does not follow a symlink in the final component
    async fn lstat(&self, path: &str) -> Result<FsStat, FsError>;

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), FsError>;

    /// Entries sorted by name, without `.` and `..`
    async fn readdir(&self, path: &str) -> Result<Vec<DirentEntry>, FsError>;

    async fn rm(&self, path: &str, options: RmOptions) -> Result<(), FsError>;

    async fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError>;

    async fn symlink(&self, target: &str, link_path: &str) -> Result<(), FsError>;

    /// Resolve all symlinks in a path to get the canonical physical path
    async fn realpath(&self, path: &str) -> Result<String, FsError>;

    async fn utimes(&self, path: &str, mtime: SystemTime) -> Result<(), FsError>;

    /// Resolve a relative path against a base path; purely lexical
    fn resolve_path(&self, base: &str, path: &str) -> String {
        if path.starts_with('/') {
            normalize_path(path)
        } else {
            normalize_path(&format!("{}/{}", base, path))
        }
    }
}

/// Collapse `.`, `..` and duplicate slashes; always returns an absolute path.
pub fn normalize_path(path: &str) -> String {
    let mut resolved: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    if resolved.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", resolved.join("/"))
    }
}

pub fn dirname(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(pos) => normalized[..pos].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/foo/bar/"), "/foo/bar");
        assert_eq!(normalize_path("foo//bar"), "/foo/bar");
        assert_eq!(normalize_path("/foo/./bar"), "/foo/bar");
        assert_eq!(normalize_path("/foo/../bar"), "/bar");
        assert_eq!(normalize_path("/../.."), "/");
    }

    #[test]
    fn test_dirname() {
        assert_eq!(dirname("/"), "/");
        assert_eq!(dirname("/foo"), "/");
        assert_eq!(dirname("/foo/bar/baz"), "/foo/bar");
    }

    #[test]
    fn test_shell_message() {
        assert_eq!(FsError::not_found("/x", "open").shell_message(), "No such file or directory");
        assert_eq!(FsError::is_directory("/x", "open").shell_message(), "Is a directory");
    }
}
