//! Virtual filesystem.
//!
//! The sandbox never touches the host disk at execution time: every file
//! a script reads or writes lives in an in-memory tree behind the [`Vfs`]
//! trait. Snapshots are cheap and copy-on-write, which is what makes
//! subshell isolation affordable.

pub mod memfs;
pub mod path;

pub use memfs::{FsSnapshot, MemFs};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

/// Filesystem errors, worded like the errno strings utilities print.
#[derive(Error, Debug, Clone)]
pub enum FsError {
    #[error("ENOENT: no such file or directory, {op} '{path}'")]
    NotFound { path: String, op: String },

    #[error("EEXIST: file already exists, {op} '{path}'")]
    AlreadyExists { path: String, op: String },

    #[error("EISDIR: illegal operation on a directory, {op} '{path}'")]
    IsDirectory { path: String, op: String },

    #[error("ENOTDIR: not a directory, {op} '{path}'")]
    NotDirectory { path: String, op: String },

    #[error("ENOTEMPTY: directory not empty, {op} '{path}'")]
    NotEmpty { path: String, op: String },

    #[error("ELOOP: too many levels of symbolic links, {op} '{path}'")]
    TooManyLinks { path: String, op: String },

    #[error("EINVAL: invalid argument, {op} '{path}'")]
    InvalidPath { path: String, op: String },

    #[error("EROFS: read-only file system, {op} '{path}'")]
    ReadOnly { path: String, op: String },
}

impl FsError {
    pub fn not_found(path: &str, op: &str) -> Self {
        Self::NotFound { path: path.to_string(), op: op.to_string() }
    }

    /// The short errno-style tag (`ENOENT`, `EROFS`, ...).
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ENOENT",
            Self::AlreadyExists { .. } => "EEXIST",
            Self::IsDirectory { .. } => "EISDIR",
            Self::NotDirectory { .. } => "ENOTDIR",
            Self::NotEmpty { .. } => "ENOTEMPTY",
            Self::TooManyLinks { .. } => "ELOOP",
            Self::InvalidPath { .. } => "EINVAL",
            Self::ReadOnly { .. } => "EROFS",
        }
    }
}

/// A node in the tree. Directories hold no children directly; the path
/// map owns the hierarchy and each ancestor of a stored path has its own
/// directory entry.
#[derive(Debug, Clone)]
pub enum FsEntry {
    File { content: Arc<Vec<u8>>, mode: u32, mtime: SystemTime },
    Directory { mode: u32, mtime: SystemTime },
    Symlink { target: String, mode: u32, mtime: SystemTime },
}

impl FsEntry {
    pub fn is_file(&self) -> bool {
        matches!(self, FsEntry::File { .. })
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FsEntry::Directory { .. })
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, FsEntry::Symlink { .. })
    }

    pub fn mode(&self) -> u32 {
        match self {
            FsEntry::File { mode, .. }
            | FsEntry::Directory { mode, .. }
            | FsEntry::Symlink { mode, .. } => *mode,
        }
    }

    pub fn mtime(&self) -> SystemTime {
        match self {
            FsEntry::File { mtime, .. }
            | FsEntry::Directory { mtime, .. }
            | FsEntry::Symlink { mtime, .. } => *mtime,
        }
    }
}

/// Result of `stat`/`lstat`.
#[derive(Debug, Clone)]
pub struct FsStat {
    pub is_file: bool,
    pub is_directory: bool,
    pub is_symlink: bool,
    pub mode: u32,
    pub size: u64,
    pub mtime: SystemTime,
}

/// Directory entry with type flags, for `ls -F`/`find`-style listings.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub is_file: bool,
    pub is_directory: bool,
    pub is_symlink: bool,
}

/// Content plus optional mode for seeding the filesystem at construction.
#[derive(Debug, Clone)]
pub struct SeedFile {
    pub content: Vec<u8>,
    pub mode: Option<u32>,
}

impl From<&str> for SeedFile {
    fn from(s: &str) -> Self {
        Self { content: s.as_bytes().to_vec(), mode: None }
    }
}

impl From<String> for SeedFile {
    fn from(s: String) -> Self {
        Self { content: s.into_bytes(), mode: None }
    }
}

impl From<Vec<u8>> for SeedFile {
    fn from(content: Vec<u8>) -> Self {
        Self { content, mode: None }
    }
}

/// Map of absolute path to initial content.
pub type SeedFiles = HashMap<String, SeedFile>;

/// The filesystem contract every command and builtin runs against.
#[async_trait]
pub trait Vfs: Send + Sync {
    /// Read a file as lossy UTF-8.
    async fn read_file(&self, path: &str) -> Result<String, FsError> {
        let bytes = self.read_file_bytes(path).await?;
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    async fn read_file_bytes(&self, path: &str) -> Result<Vec<u8>, FsError>;

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;

    async fn append_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;

    async fn exists(&self, path: &str) -> bool;

    /// Follows symlinks on every component including the last.
    async fn stat(&self, path: &str) -> Result<FsStat, FsError>;

    /// Follows symlinks on ancestors only.
    async fn lstat(&self, path: &str) -> Result<FsStat, FsError>;

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), FsError>;

    /// Child names, sorted lexicographically.
    async fn readdir(&self, path: &str) -> Result<Vec<String>, FsError>;

    async fn readdir_entries(&self, path: &str) -> Result<Vec<DirEntry>, FsError>;

    async fn rm(&self, path: &str, recursive: bool, force: bool) -> Result<(), FsError>;

    async fn copy_file(&self, src: &str, dest: &str) -> Result<(), FsError>;

    async fn rename(&self, src: &str, dest: &str) -> Result<(), FsError>;

    async fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError>;

    async fn symlink(&self, target: &str, link_path: &str) -> Result<(), FsError>;

    async fn readlink(&self, path: &str) -> Result<String, FsError>;

    /// Resolve every symlink; fails with ELOOP after 40 hops.
    async fn realpath(&self, path: &str) -> Result<String, FsError>;

    async fn set_mtime(&self, path: &str, mtime: SystemTime) -> Result<(), FsError>;

    /// Lexical resolution only; no symlink expansion.
    fn resolve_path(&self, base: &str, path: &str) -> String {
        path::resolve(base, path)
    }

    /// Every stored absolute path, unsorted. Glob matching walks this.
    fn all_paths(&self) -> Vec<String>;

    /// O(1) structural snapshot of the whole tree.
    fn snapshot(&self) -> FsSnapshot;

    /// Reinstate a snapshot, discarding anything written since.
    fn restore(&self, snapshot: FsSnapshot);

    /// When read-only, every mutating operation fails with EROFS.
    fn set_read_only(&self, read_only: bool);

    fn is_read_only(&self) -> bool;
}
