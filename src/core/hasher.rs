//! CJ-013: BLAKE3 fingerprints for files, directories and work-item inputs.

use super::error::{Error, Result};
use super::types::{TaskInput, WorkItem};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const STREAM_BUF_SIZE: usize = 65536;

/// Hash a file's contents. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| Error::io("cannot open", path, e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; STREAM_BUF_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| Error::io("cannot read", path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash a directory (sorted walk, relative paths included). Skips symlinks.
pub fn hash_directory(path: &Path) -> Result<String> {
    fn walk(base: &Path, current: &Path, entries: &mut Vec<(String, String)>) -> Result<()> {
        let read_dir =
            std::fs::read_dir(current).map_err(|e| Error::io("cannot read dir", current, e))?;
        let mut children: Vec<std::fs::DirEntry> = read_dir.filter_map(|e| e.ok()).collect();
        children.sort_by_key(|e| e.file_name());

        for entry in children {
            let path = entry.path();
            let ft = entry.file_type().map_err(|e| Error::io("cannot stat", &path, e))?;
            if ft.is_symlink() {
                continue;
            }
            let rel = path
                .strip_prefix(base)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            if ft.is_file() {
                entries.push((rel, hash_file(&path)?));
            } else if ft.is_dir() {
                walk(base, &path, entries)?;
            }
        }
        Ok(())
    }

    let mut entries: Vec<(String, String)> = Vec::new();
    walk(path, path, &mut entries)?;

    let mut hasher = blake3::Hasher::new();
    for (rel, hash) in &entries {
        hasher.update(rel.as_bytes());
        hasher.update(b"\0");
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Hash a path that may be a file, a directory or missing.
pub fn hash_path(path: &Path) -> Result<String> {
    if path.is_dir() {
        hash_directory(path)
    } else if path.is_file() {
        hash_file(path)
    } else {
        Ok("absent".to_string())
    }
}

/// Compute a composite hash from multiple component hashes.
pub fn composite_hash(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in components {
        hasher.update(c.as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

/// Fingerprint of everything that decides whether a work item is up to date:
/// its action, every declared input and the fingerprints of the upstream
/// task outputs it consumes.
pub fn fingerprint(item: &WorkItem, upstream: &HashMap<String, String>) -> Result<String> {
    let action = serde_json::to_string(&item.action)
        .map_err(|e| Error::Manifest(format!("cannot encode {}: {}", item.path, e)))?;
    let mut parts = vec![hash_string(&action)];
    for input in &item.inputs {
        let part = match input {
            TaskInput::File(path) | TaskInput::Dir(path) => hash_path(path)?,
            TaskInput::TaskOutput(task) => upstream
                .get(task)
                .cloned()
                .unwrap_or_else(|| format!("pending:{}", task)),
            TaskInput::Options(options) => hash_string(&options.to_args().join(" ")),
            TaskInput::Property(key, value) => hash_string(&format!("{}={}", key, value)),
        };
        parts.push(part);
    }
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    Ok(composite_hash(&refs))
}
