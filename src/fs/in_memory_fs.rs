//! In-Memory File System Implementation
//!
//! A pure in-memory virtual file system for the interpreter.

use std::collections::{BTreeMap, HashSet};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::types::*;

const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone)]
enum FsEntry {
    File { content: Vec<u8>, mode: u32, mtime: SystemTime },
    Directory { mode: u32, mtime: SystemTime },
    Symlink { target: String, mtime: SystemTime },
}

impl FsEntry {
    fn dir() -> Self {
        FsEntry::Directory { mode: 0o755, mtime: SystemTime::now() }
    }

    fn file(content: Vec<u8>, mode: u32) -> Self {
        FsEntry::File { content, mode, mtime: SystemTime::now() }
    }

    fn stat(&self) -> FsStat {
        match self {
            FsEntry::File { content, mode, mtime } => FsStat {
                is_file: true,
                is_directory: false,
                is_symlink: false,
                mode: *mode,
                size: content.len() as u64,
                mtime: *mtime,
            },
            FsEntry::Directory { mode, mtime } => FsStat {
                is_file: false,
                is_directory: true,
                is_symlink: false,
                mode: *mode,
                size: 0,
                mtime: *mtime,
            },
            FsEntry::Symlink { target, mtime } => FsStat {
                is_file: false,
                is_directory: false,
                is_symlink: true,
                mode: 0o777,
                size: target.len() as u64,
                mtime: *mtime,
            },
        }
    }
}

type Tree = BTreeMap<String, FsEntry>;

/// In-memory virtual file system. Paths are kept normalized and absolute.
pub struct InMemoryFs {
    data: RwLock<Tree>,
}

impl InMemoryFs {
    /// Create a new filesystem holding only `/`.
    pub fn new() -> Self {
        Self::with_files(Vec::<(String, String)>::new())
    }

    /// Create with initial text files (mode 0644); parents are created.
    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: AsRef<str>,
        C: Into<Vec<u8>>,
    {
        let mut data = Tree::new();
        data.insert("/".to_string(), FsEntry::dir());
        for (path, content) in files {
            let normalized = normalize_path(path.as_ref());
            ensure_parent_dirs(&mut data, &normalized);
            data.insert(normalized, FsEntry::file(content.into(), 0o644));
        }
        Self { data: RwLock::new(data) }
    }

    /// Builder-style directory creation before the filesystem is shared.
    pub fn with_dirs<P: AsRef<str>>(mut self, dirs: impl IntoIterator<Item = P>) -> Self {
        let data = self.data.get_mut();
        for dir in dirs {
            let normalized = normalize_path(dir.as_ref());
            ensure_parent_dirs(data, &normalized);
            data.entry(normalized).or_insert_with(FsEntry::dir);
        }
        self
    }

    /// Builder-style executable file creation (mode 0755).
    pub fn with_executable(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        let data = self.data.get_mut();
        let normalized = normalize_path(path);
        ensure_parent_dirs(data, &normalized);
        data.insert(normalized, FsEntry::file(content.into(), 0o755));
        self
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_parent_dirs(data: &mut Tree, path: &str) {
    let dir = dirname(path);
    if dir == "/" || data.contains_key(&dir) {
        return;
    }
    ensure_parent_dirs(data, &dir);
    data.insert(dir, FsEntry::dir());
}

fn symlink_target(link_path: &str, target: &str) -> String {
    if target.starts_with('/') {
        normalize_path(target)
    } else {
        normalize_path(&format!("{}/{}", dirname(link_path), target))
    }
}

/// Resolve symlinks in every component, or in all but the last when
/// `follow_last` is false.
fn resolve(data: &Tree, path: &str, operation: &str, follow_last: bool) -> Result<String, FsError> {
    let normalized = normalize_path(path);
    if normalized == "/" {
        return Ok(normalized);
    }
    let parts: Vec<&str> = normalized[1..].split('/').collect();
    let mut resolved = String::new();
    let mut seen = HashSet::new();
    let last = parts.len() - 1;

    for (i, part) in parts.iter().enumerate() {
        resolved = if resolved == "/" { format!("/{}", part) } else { format!("{}/{}", resolved, part) };
        if i == last && !follow_last {
            break;
        }
        let mut hops = 0;
        while let Some(FsEntry::Symlink { target, .. }) = data.get(&resolved) {
            if hops >= MAX_SYMLINK_HOPS || !seen.insert(resolved.clone()) {
                return Err(FsError::SymlinkLoop { path: path.to_string(), operation: operation.to_string() });
            }
            resolved = symlink_target(&resolved, target);
            hops += 1;
        }
        if i < last {
            match data.get(&resolved) {
                Some(FsEntry::Directory { .. }) => {}
                Some(_) => return Err(FsError::not_directory(path, operation)),
                None => return Err(FsError::not_found(path, operation)),
            }
        }
    }
    Ok(resolved)
}

fn check_parent(data: &Tree, path: &str, operation: &str) -> Result<(), FsError> {
    match data.get(&dirname(path)) {
        Some(FsEntry::Directory { .. }) => Ok(()),
        Some(_) => Err(FsError::not_directory(path, operation)),
        None => Err(FsError::not_found(path, operation)),
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read_file_bytes(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let data = self.data.read().await;
        let resolved = resolve(&data, path, "open", true)?;
        match data.get(&resolved) {
            Some(FsEntry::File { content, .. }) => Ok(content.clone()),
            Some(_) => Err(FsError::is_directory(path, "read")),
            None => Err(FsError::not_found(path, "open")),
        }
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        let mut data = self.data.write().await;
        let resolved = resolve(&data, path, "open", true)?;
        check_parent(&data, &resolved, "open")?;
        let mode = match data.get(&resolved) {
            Some(FsEntry::Directory { .. }) => return Err(FsError::is_directory(path, "open")),
            Some(FsEntry::File { mode, .. }) => *mode,
            _ => 0o644,
        };
        data.insert(resolved, FsEntry::file(content.to_vec(), mode));
        Ok(())
    }

    async fn append_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        let mut data = self.data.write().await;
        let resolved = resolve(&data, path, "open", true)?;
        check_parent(&data, &resolved, "open")?;
        match data.get_mut(&resolved) {
            Some(FsEntry::Directory { .. }) => Err(FsError::is_directory(path, "open")),
            Some(FsEntry::File { content: existing, mtime, .. }) => {
                existing.extend_from_slice(content);
                *mtime = SystemTime::now();
                Ok(())
            }
            _ => {
                data.insert(resolved, FsEntry::file(content.to_vec(), 0o644));
                Ok(())
            }
        }
    }

    async fn stat(&self, path: &str) -> Result<FsStat, FsError> {
        let data = self.data.read().await;
        let resolved = resolve(&data, path, "stat", true)?;
        data.get(&resolved).map(FsEntry::stat).ok_or_else(|| FsError::not_found(path, "stat"))
    }

    async fn lstat(&self, path: &str) -> Result<FsStat, FsError> {
        let data = self.data.read().await;
        let resolved = resolve(&data, path, "lstat", false)?;
        data.get(&resolved).map(FsEntry::stat).ok_or_else(|| FsError::not_found(path, "lstat"))
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), FsError> {
        let mut data = self.data.write().await;
        let normalized = normalize_path(path);
        match data.get(&normalized) {
            Some(FsEntry::Directory { .. }) if recursive => return Ok(()),
            Some(_) => {
                return Err(FsError::AlreadyExists { path: path.to_string(), operation: "mkdir".to_string() })
            }
            None => {}
        }
        if recursive {
            ensure_parent_dirs(&mut data, &normalized);
        } else {
            check_parent(&data, &normalized, "mkdir")?;
        }
        data.insert(normalized, FsEntry::dir());
        Ok(())
    }

    async fn readdir(&self, path: &str) -> Result<Vec<DirentEntry>, FsError> {
        let data = self.data.read().await;
        let resolved = resolve(&data, path, "scandir", true)?;
        match data.get(&resolved) {
            Some(FsEntry::Directory { .. }) => {}
            Some(_) => return Err(FsError::not_directory(path, "scandir")),
            None => return Err(FsError::not_found(path, "scandir")),
        }
        let prefix = if resolved == "/" { "/".to_string() } else { format!("{}/", resolved) };
        let entries = data
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| !p[prefix.len()..].is_empty() && !p[prefix.len()..].contains('/'))
            .map(|(p, entry)| DirentEntry {
                name: p[prefix.len()..].to_string(),
                is_file: matches!(entry, FsEntry::File { .. }),
                is_directory: matches!(entry, FsEntry::Directory { .. }),
                is_symlink: matches!(entry, FsEntry::Symlink { .. }),
            })
            .collect();
        Ok(entries)
    }

    async fn rm(&self, path: &str, options: RmOptions) -> Result<(), FsError> {
        let mut data = self.data.write().await;
        let normalized = normalize_path(path);
        let Some(entry) = data.get(&normalized) else {
            return if options.force { Ok(()) } else { Err(FsError::not_found(path, "rm")) };
        };
        if matches!(entry, FsEntry::Directory { .. }) {
            let prefix = format!("{}/", normalized.trim_end_matches('/'));
            let children: Vec<String> = data.keys().filter(|k| k.starts_with(&prefix)).cloned().collect();
            if !children.is_empty() && !options.recursive {
                return Err(FsError::NotEmpty { path: path.to_string(), operation: "rm".to_string() });
            }
            for child in children {
                data.remove(&child);
            }
        }
        if normalized != "/" {
            data.remove(&normalized);
        }
        Ok(())
    }

    async fn chmod(&self, path: &str, new_mode: u32) -> Result<(), FsError> {
        let mut data = self.data.write().await;
        let resolved = resolve(&data, path, "chmod", true)?;
        match data.get_mut(&resolved) {
            Some(FsEntry::File { mode, .. }) | Some(FsEntry::Directory { mode, .. }) => {
                *mode = new_mode;
                Ok(())
            }
            _ => Err(FsError::not_found(path, "chmod")),
        }
    }

    async fn symlink(&self, target: &str, link_path: &str) -> Result<(), FsError> {
        let mut data = self.data.write().await;
        let normalized = normalize_path(link_path);
        if data.contains_key(&normalized) {
            return Err(FsError::AlreadyExists { path: link_path.to_string(), operation: "symlink".to_string() });
        }
        check_parent(&data, &normalized, "symlink")?;
        data.insert(normalized, FsEntry::Symlink { target: target.to_string(), mtime: SystemTime::now() });
        Ok(())
    }

    async fn realpath(&self, path: &str) -> Result<String, FsError> {
        let data = self.data.read().await;
        let resolved = resolve(&data, path, "realpath", true)?;
        if data.contains_key(&resolved) {
            Ok(resolved)
        } else {
            Err(FsError::not_found(path, "realpath"))
        }
    }

    async fn utimes(&self, path: &str, new_mtime: SystemTime) -> Result<(), FsError> {
        let mut data = self.data.write().await;
        let resolved = resolve(&data, path, "utimes", true)?;
        match data.get_mut(&resolved) {
            Some(FsEntry::File { mtime, .. })
            | Some(FsEntry::Directory { mtime, .. })
            | Some(FsEntry::Symlink { mtime, .. }) => {
                *mtime = new_mtime;
                Ok(())
            }
            None => Err(FsError::not_found(path, "utimes")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_basic_file_ops() {
        let fs = InMemoryFs::new();
        fs.write_file("/test.txt", b"hello").await.unwrap();
        assert!(fs.exists("/test.txt").await);
        assert_eq!(fs.read_file("/test.txt").await.unwrap(), "hello");
        fs.append_file("/test.txt", b" world").await.unwrap();
        assert_eq!(fs.read_file("/test.txt").await.unwrap(), "hello world");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_requires_parent_and_rejects_directories() {
        let fs = InMemoryFs::new().with_dirs(["/tmp"]);
        assert!(matches!(fs.write_file("/missing/f", b"x").await, Err(FsError::NotFound { .. })));
        assert!(matches!(fs.write_file("/tmp", b"x").await, Err(FsError::IsDirectory { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_with_files_creates_parents_and_readdir_sorts() {
        let fs = InMemoryFs::with_files([("/d/b.txt", "b"), ("/d/a.txt", "a"), ("/d/sub/c", "c")]);
        let names: Vec<String> = fs.readdir("/d").await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
        assert!(fs.stat("/d/sub").await.unwrap().is_directory);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mkdir_and_rm() {
        let fs = InMemoryFs::new();
        fs.mkdir("/a/b/c", true).await.unwrap();
        assert!(fs.exists("/a/b").await);
        assert!(fs.mkdir("/x/y", false).await.is_err());
        fs.write_file("/a/b/c/f", b"1").await.unwrap();
        assert!(fs.rm("/a", RmOptions::default()).await.is_err());
        fs.rm("/a", RmOptions { recursive: true, force: false }).await.unwrap();
        assert!(!fs.exists("/a/b/c/f").await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_symlinks() {
        let fs = InMemoryFs::with_files([("/a/file.txt", "x")]);
        fs.symlink("/a", "/link").await.unwrap();
        assert_eq!(fs.realpath("/link/file.txt").await.unwrap(), "/a/file.txt");
        assert!(fs.lstat("/link").await.unwrap().is_symlink);
        assert!(fs.stat("/link").await.unwrap().is_directory);
        fs.symlink("/loop2", "/loop1").await.unwrap();
        fs.symlink("/loop1", "/loop2").await.unwrap();
        assert!(matches!(fs.stat("/loop1").await, Err(FsError::SymlinkLoop { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_chmod_and_utimes() {
        let fs = InMemoryFs::new().with_executable("/bin/tool", "echo hi");
        assert!(fs.stat("/bin/tool").await.unwrap().is_executable());
        fs.chmod("/bin/tool", 0o644).await.unwrap();
        assert!(!fs.stat("/bin/tool").await.unwrap().is_executable());
        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        fs.utimes("/bin/tool", when).await.unwrap();
        assert_eq!(fs.stat("/bin/tool").await.unwrap().mtime, when);
    }

    #[test]
    fn test_resolve_path() {
        let fs = InMemoryFs::new();
        assert_eq!(fs.resolve_path("/home/user", "../x"), "/home/x");
        assert_eq!(fs.resolve_path("/home/user", "/etc/./hosts"), "/etc/hosts");
    }
}
