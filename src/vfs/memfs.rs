//! In-memory filesystem with copy-on-write snapshots.
//!
//! The whole tree is one map from normalized absolute path to entry.
//! The map sits behind an `Arc`: `snapshot` clones the pointer, and the
//! first mutation after a snapshot clones the map (`Arc::make_mut`) while
//! file bytes stay shared through their own `Arc` until rewritten.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use async_trait::async_trait;

use super::path;
use super::{DirEntry, FsEntry, FsError, FsStat, SeedFiles, Vfs};

const MAX_LINK_HOPS: usize = 40;

type PathMap = HashMap<String, FsEntry>;

/// Opaque handle returned by [`Vfs::snapshot`].
#[derive(Clone)]
pub struct FsSnapshot(Arc<PathMap>);

/// The default filesystem implementation.
pub struct MemFs {
    map: RwLock<Arc<PathMap>>,
    read_only: AtomicBool,
}

impl MemFs {
    pub fn new() -> Self {
        let mut map = PathMap::new();
        map.insert(
            "/".to_string(),
            FsEntry::Directory { mode: 0o755, mtime: SystemTime::now() },
        );
        Self {
            map: RwLock::new(Arc::new(map)),
            read_only: AtomicBool::new(false),
        }
    }

    /// Construct with an initial set of files. Parent directories are
    /// created automatically with mode 0o755.
    pub fn with_seed(files: &SeedFiles) -> Self {
        let fs = Self::new();
        {
            let mut guard = fs.map.write().unwrap_or_else(|e| e.into_inner());
            let map = Arc::make_mut(&mut guard);
            for (raw_path, seed) in files {
                let p = path::normalize(raw_path);
                create_parents(map, &p);
                map.insert(
                    p,
                    FsEntry::File {
                        content: Arc::new(seed.content.clone()),
                        mode: seed.mode.unwrap_or(0o644),
                        mtime: SystemTime::now(),
                    },
                );
            }
        }
        fs
    }

    /// Copy a host directory tree into the sandbox at `guest_root`.
    /// Symlinks are carried over verbatim; unreadable entries are skipped.
    pub fn mount_host_dir(&self, host_root: &std::path::Path, guest_root: &str) -> std::io::Result<()> {
        let guest_root = path::normalize(guest_root);
        let mut guard = self.map.write().unwrap_or_else(|e| e.into_inner());
        let map = Arc::make_mut(&mut guard);
        create_parents(map, &path::join(&guest_root, "x"));
        map.insert(
            guest_root.clone(),
            FsEntry::Directory { mode: 0o755, mtime: SystemTime::now() },
        );
        mount_walk(map, host_root, &guest_root)?;
        Ok(())
    }

    fn read_map(&self) -> Arc<PathMap> {
        self.map.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Run a mutation under the write lock, enforcing read-only mode.
    fn mutate<R>(
        &self,
        op: &str,
        target: &str,
        f: impl FnOnce(&mut PathMap) -> Result<R, FsError>,
    ) -> Result<R, FsError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(FsError::ReadOnly { path: target.to_string(), op: op.to_string() });
        }
        let mut guard = self.map.write().unwrap_or_else(|e| e.into_inner());
        f(Arc::make_mut(&mut guard))
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Map-level helpers
// ---------------------------------------------------------------------------

fn create_parents(map: &mut PathMap, p: &str) {
    let dir = path::parent(p);
    if dir != "/" && !map.contains_key(&dir) {
        create_parents(map, &dir);
        map.insert(
            dir,
            FsEntry::Directory { mode: 0o755, mtime: SystemTime::now() },
        );
    }
}

fn link_destination(link_path: &str, target: &str) -> String {
    if target.starts_with('/') {
        path::normalize(target)
    } else {
        path::resolve(&path::parent(link_path), target)
    }
}

/// Walk a normalized path expanding symlinks. When `follow_last` is false
/// the final component is kept as-is (lstat semantics).
fn expand_links(
    map: &PathMap,
    p: &str,
    op: &str,
    follow_last: bool,
) -> Result<String, FsError> {
    let normalized = path::normalize(p);
    if normalized == "/" {
        return Ok(normalized);
    }
    let parts: Vec<&str> = normalized[1..].split('/').collect();
    let last = parts.len() - 1;
    let mut resolved = String::new();
    let mut seen = HashSet::new();
    let mut hops = 0;

    for (i, part) in parts.iter().enumerate() {
        resolved = format!("{}/{}", resolved, part);
        if i == last && !follow_last {
            break;
        }
        while let Some(FsEntry::Symlink { target, .. }) = map.get(&resolved) {
            if hops >= MAX_LINK_HOPS || !seen.insert(resolved.clone()) {
                return Err(FsError::TooManyLinks { path: p.to_string(), op: op.to_string() });
            }
            resolved = link_destination(&resolved, target);
            hops += 1;
        }
    }
    Ok(resolved)
}

fn stat_of(entry: &FsEntry) -> FsStat {
    let size = match entry {
        FsEntry::File { content, .. } => content.len() as u64,
        FsEntry::Symlink { target, .. } => target.len() as u64,
        FsEntry::Directory { .. } => 0,
    };
    FsStat {
        is_file: entry.is_file(),
        is_directory: entry.is_directory(),
        is_symlink: entry.is_symlink(),
        mode: entry.mode(),
        size,
        mtime: entry.mtime(),
    }
}

/// Validate that the parent of `p` exists and is a directory.
fn check_parent(map: &PathMap, p: &str, op: &str) -> Result<(), FsError> {
    let dir = path::parent(p);
    match map.get(&dir) {
        Some(FsEntry::Directory { .. }) => Ok(()),
        Some(_) => Err(FsError::NotDirectory { path: p.to_string(), op: op.to_string() }),
        None => Err(FsError::NotFound { path: p.to_string(), op: op.to_string() }),
    }
}

fn children_of<'m>(map: &'m PathMap, dir: &str) -> Vec<(&'m String, &'m FsEntry)> {
    let prefix = if dir == "/" { "/".to_string() } else { format!("{}/", dir) };
    map.iter()
        .filter(|(p, _)| {
            p.starts_with(&prefix) && !p[prefix.len()..].contains('/') && p.as_str() != "/"
        })
        .collect()
}

fn mount_walk(map: &mut PathMap, host: &std::path::Path, guest: &str) -> std::io::Result<()> {
    for entry in std::fs::read_dir(host)? {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let name = entry.file_name().to_string_lossy().to_string();
        let guest_path = path::join(guest, &name);
        let meta = match entry.path().symlink_metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        if meta.file_type().is_symlink() {
            if let Ok(target) = std::fs::read_link(entry.path()) {
                map.insert(
                    guest_path,
                    FsEntry::Symlink {
                        target: target.to_string_lossy().to_string(),
                        mode: 0o777,
                        mtime: meta.modified().unwrap_or_else(|_| SystemTime::now()),
                    },
                );
            }
        } else if meta.is_dir() {
            map.insert(
                guest_path.clone(),
                FsEntry::Directory { mode: 0o755, mtime: meta.modified().unwrap_or_else(|_| SystemTime::now()) },
            );
            mount_walk(map, &entry.path(), &guest_path)?;
        } else if let Ok(content) = std::fs::read(entry.path()) {
            map.insert(
                guest_path,
                FsEntry::File {
                    content: Arc::new(content),
                    mode: 0o644,
                    mtime: meta.modified().unwrap_or_else(|_| SystemTime::now()),
                },
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl Vfs for MemFs {
    async fn read_file_bytes(&self, p: &str) -> Result<Vec<u8>, FsError> {
        let map = self.read_map();
        let resolved = expand_links(&map, p, "open", true)?;
        match map.get(&resolved) {
            Some(FsEntry::File { content, .. }) => Ok(content.as_ref().clone()),
            Some(FsEntry::Directory { .. }) => {
                Err(FsError::IsDirectory { path: p.to_string(), op: "read".to_string() })
            }
            _ => Err(FsError::not_found(p, "open")),
        }
    }

    async fn write_file(&self, p: &str, content: &[u8]) -> Result<(), FsError> {
        let bytes = content.to_vec();
        self.mutate("open", p, |map| {
            let resolved = expand_links(map, p, "open", true)?;
            if let Some(FsEntry::Directory { .. }) = map.get(&resolved) {
                return Err(FsError::IsDirectory { path: p.to_string(), op: "open".to_string() });
            }
            check_parent(map, &resolved, "open")?;
            let mode = match map.get(&resolved) {
                Some(FsEntry::File { mode, .. }) => *mode,
                _ => 0o644,
            };
            map.insert(
                resolved,
                FsEntry::File { content: Arc::new(bytes), mode, mtime: SystemTime::now() },
            );
            Ok(())
        })
    }

    async fn append_file(&self, p: &str, content: &[u8]) -> Result<(), FsError> {
        let suffix = content.to_vec();
        self.mutate("open", p, |map| {
            let resolved = expand_links(map, p, "open", true)?;
            match map.get(&resolved) {
                Some(FsEntry::Directory { .. }) => {
                    Err(FsError::IsDirectory { path: p.to_string(), op: "open".to_string() })
                }
                Some(FsEntry::File { content: existing, mode, .. }) => {
                    let mut combined = existing.as_ref().clone();
                    let mode = *mode;
                    combined.extend_from_slice(&suffix);
                    map.insert(
                        resolved,
                        FsEntry::File { content: Arc::new(combined), mode, mtime: SystemTime::now() },
                    );
                    Ok(())
                }
                _ => {
                    check_parent(map, &resolved, "open")?;
                    map.insert(
                        resolved,
                        FsEntry::File { content: Arc::new(suffix), mode: 0o644, mtime: SystemTime::now() },
                    );
                    Ok(())
                }
            }
        })
    }

    async fn exists(&self, p: &str) -> bool {
        let map = self.read_map();
        match expand_links(&map, p, "access", true) {
            Ok(resolved) => map.contains_key(&resolved),
            Err(_) => false,
        }
    }

    async fn stat(&self, p: &str) -> Result<FsStat, FsError> {
        let map = self.read_map();
        let resolved = expand_links(&map, p, "stat", true)?;
        match map.get(&resolved) {
            Some(entry) => {
                let mut s = stat_of(entry);
                s.is_symlink = false;
                Ok(s)
            }
            None => Err(FsError::not_found(p, "stat")),
        }
    }

    async fn lstat(&self, p: &str) -> Result<FsStat, FsError> {
        let map = self.read_map();
        let resolved = expand_links(&map, p, "lstat", false)?;
        match map.get(&resolved) {
            Some(entry) => Ok(stat_of(entry)),
            None => Err(FsError::not_found(p, "lstat")),
        }
    }

    async fn mkdir(&self, p: &str, recursive: bool) -> Result<(), FsError> {
        self.mutate("mkdir", p, |map| {
            let resolved = expand_links(map, p, "mkdir", true)?;
            match map.get(&resolved) {
                Some(FsEntry::Directory { .. }) if recursive => return Ok(()),
                Some(_) => {
                    return Err(FsError::AlreadyExists {
                        path: p.to_string(),
                        op: "mkdir".to_string(),
                    })
                }
                None => {}
            }
            let dir = path::parent(&resolved);
            match map.get(&dir) {
                Some(FsEntry::Directory { .. }) => {}
                Some(_) => {
                    return Err(FsError::NotDirectory { path: p.to_string(), op: "mkdir".to_string() })
                }
                None if recursive => create_parents(map, &resolved),
                None => return Err(FsError::not_found(p, "mkdir")),
            }
            map.insert(
                resolved,
                FsEntry::Directory { mode: 0o755, mtime: SystemTime::now() },
            );
            Ok(())
        })
    }

    async fn readdir(&self, p: &str) -> Result<Vec<String>, FsError> {
        let entries = self.readdir_entries(p).await?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    async fn readdir_entries(&self, p: &str) -> Result<Vec<DirEntry>, FsError> {
        let map = self.read_map();
        let resolved = expand_links(&map, p, "scandir", true)?;
        match map.get(&resolved) {
            Some(FsEntry::Directory { .. }) => {}
            Some(_) => {
                return Err(FsError::NotDirectory { path: p.to_string(), op: "scandir".to_string() })
            }
            None => return Err(FsError::not_found(p, "scandir")),
        }
        let mut entries: Vec<DirEntry> = children_of(&map, &resolved)
            .into_iter()
            .map(|(child, entry)| DirEntry {
                name: path::file_name(child),
                is_file: entry.is_file(),
                is_directory: entry.is_directory(),
                is_symlink: entry.is_symlink(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn rm(&self, p: &str, recursive: bool, force: bool) -> Result<(), FsError> {
        self.mutate("unlink", p, |map| {
            let resolved = expand_links(map, p, "unlink", false)?;
            if resolved == "/" {
                return Err(FsError::InvalidPath { path: p.to_string(), op: "unlink".to_string() });
            }
            match map.get(&resolved) {
                None => {
                    if force {
                        Ok(())
                    } else {
                        Err(FsError::not_found(p, "unlink"))
                    }
                }
                Some(FsEntry::Directory { .. }) => {
                    if !recursive {
                        return Err(FsError::IsDirectory {
                            path: p.to_string(),
                            op: "unlink".to_string(),
                        });
                    }
                    let prefix = format!("{}/", resolved);
                    map.retain(|k, _| k != &resolved && !k.starts_with(&prefix));
                    Ok(())
                }
                Some(_) => {
                    map.remove(&resolved);
                    Ok(())
                }
            }
        })
    }

    async fn copy_file(&self, src: &str, dest: &str) -> Result<(), FsError> {
        let (content, mode) = {
            let map = self.read_map();
            let resolved = expand_links(&map, src, "copyfile", true)?;
            match map.get(&resolved) {
                Some(FsEntry::File { content, mode, .. }) => (content.clone(), *mode),
                Some(FsEntry::Directory { .. }) => {
                    return Err(FsError::IsDirectory {
                        path: src.to_string(),
                        op: "copyfile".to_string(),
                    })
                }
                _ => return Err(FsError::not_found(src, "copyfile")),
            }
        };
        self.mutate("copyfile", dest, |map| {
            let resolved = expand_links(map, dest, "copyfile", true)?;
            if let Some(FsEntry::Directory { .. }) = map.get(&resolved) {
                return Err(FsError::IsDirectory {
                    path: dest.to_string(),
                    op: "copyfile".to_string(),
                });
            }
            check_parent(map, &resolved, "copyfile")?;
            map.insert(
                resolved,
                FsEntry::File { content, mode, mtime: SystemTime::now() },
            );
            Ok(())
        })
    }

    async fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
        self.mutate("rename", src, |map| {
            let from = expand_links(map, src, "rename", false)?;
            let to = expand_links(map, dest, "rename", false)?;
            if !map.contains_key(&from) {
                return Err(FsError::not_found(src, "rename"));
            }
            check_parent(map, &to, "rename")?;
            if path::is_within(&from, &to) && from != to {
                return Err(FsError::InvalidPath { path: dest.to_string(), op: "rename".to_string() });
            }
            if from == to {
                return Ok(());
            }
            // Move the entry and, for directories, every descendant.
            let moved: Vec<(String, FsEntry)> = map
                .iter()
                .filter(|(k, _)| path::is_within(&from, k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let dest_prefix = format!("{}/", to);
            map.retain(|k, _| !path::is_within(&from, k) && !k.starts_with(&dest_prefix) && *k != to);
            for (old, entry) in moved {
                let new = if old == from {
                    to.clone()
                } else {
                    format!("{}{}", to, &old[from.len()..])
                };
                map.insert(new, entry);
            }
            Ok(())
        })
    }

    async fn chmod(&self, p: &str, new_mode: u32) -> Result<(), FsError> {
        self.mutate("chmod", p, |map| {
            let resolved = expand_links(map, p, "chmod", true)?;
            match map.get_mut(&resolved) {
                Some(FsEntry::File { mode, .. })
                | Some(FsEntry::Directory { mode, .. })
                | Some(FsEntry::Symlink { mode, .. }) => {
                    *mode = new_mode & 0o7777;
                    Ok(())
                }
                None => Err(FsError::not_found(p, "chmod")),
            }
        })
    }

    async fn symlink(&self, target: &str, link_path: &str) -> Result<(), FsError> {
        let target = target.to_string();
        self.mutate("symlink", link_path, |map| {
            let resolved = expand_links(map, link_path, "symlink", false)?;
            if map.contains_key(&resolved) {
                return Err(FsError::AlreadyExists {
                    path: link_path.to_string(),
                    op: "symlink".to_string(),
                });
            }
            check_parent(map, &resolved, "symlink")?;
            map.insert(
                resolved,
                FsEntry::Symlink { target, mode: 0o777, mtime: SystemTime::now() },
            );
            Ok(())
        })
    }

    async fn readlink(&self, p: &str) -> Result<String, FsError> {
        let map = self.read_map();
        let resolved = expand_links(&map, p, "readlink", false)?;
        match map.get(&resolved) {
            Some(FsEntry::Symlink { target, .. }) => Ok(target.clone()),
            Some(_) => Err(FsError::InvalidPath { path: p.to_string(), op: "readlink".to_string() }),
            None => Err(FsError::not_found(p, "readlink")),
        }
    }

    async fn realpath(&self, p: &str) -> Result<String, FsError> {
        let map = self.read_map();
        let resolved = expand_links(&map, p, "realpath", true)?;
        if map.contains_key(&resolved) {
            Ok(resolved)
        } else {
            Err(FsError::not_found(p, "realpath"))
        }
    }

    async fn set_mtime(&self, p: &str, mtime: SystemTime) -> Result<(), FsError> {
        self.mutate("utimes", p, |map| {
            let resolved = expand_links(map, p, "utimes", true)?;
            match map.get_mut(&resolved) {
                Some(FsEntry::File { mtime: m, .. })
                | Some(FsEntry::Directory { mtime: m, .. })
                | Some(FsEntry::Symlink { mtime: m, .. }) => {
                    *m = mtime;
                    Ok(())
                }
                None => Err(FsError::not_found(p, "utimes")),
            }
        })
    }

    fn all_paths(&self) -> Vec<String> {
        self.read_map().keys().cloned().collect()
    }

    fn snapshot(&self) -> FsSnapshot {
        FsSnapshot(self.read_map())
    }

    fn restore(&self, snapshot: FsSnapshot) {
        let mut guard = self.map.write().unwrap_or_else(|e| e.into_inner());
        *guard = snapshot.0;
    }

    fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }
}
