//! CJ-009: Executable extraction — materialize generator distributions.
//!
//! Distributions are `.tgz` archives laid out in a local repository as
//! `<group path>/<name>/<version>/<name>-<version>.tgz`. Each coordinate is
//! unpacked at most once into a content-addressed cache directory. Unpacking
//! goes to a temporary sibling directory that is renamed into place, so a
//! reader never observes a half-written distribution.

use crate::core::error::{Error, Result};
use crate::core::hasher;
use crate::core::types::Coordinate;
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Default archive extension when a coordinate carries none.
pub const DEFAULT_EXTENSION: &str = "tgz";

/// Materializes a runnable executable for a dependency coordinate.
pub trait ExecutableExtractor: Send + Sync {
    /// Path of `executable` inside the distribution named by `coordinate`.
    /// Idempotent; repeated calls return the same path.
    fn materialize(&self, coordinate: &Coordinate, executable: &str) -> Result<PathBuf>;
}

/// Extractor reading distributions from a local repository directory.
#[derive(Debug)]
pub struct RepositoryExtractor {
    repository: PathBuf,
    cache_dir: PathBuf,
    memo: Mutex<HashMap<Coordinate, PathBuf>>,
}

impl RepositoryExtractor {
    pub fn new(repository: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            cache_dir: cache_dir.into(),
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Archive location of a coordinate inside the repository.
    pub fn archive_path(&self, coordinate: &Coordinate) -> Result<PathBuf> {
        let version = coordinate.version.as_deref().ok_or_else(|| Error::Extraction {
            coordinate: coordinate.to_string(),
            message: "no version pinned (add it under `versions`)".to_string(),
        })?;
        let extension = coordinate.extension.as_deref().unwrap_or(DEFAULT_EXTENSION);
        let mut path = self.repository.clone();
        for segment in coordinate.group.split('.') {
            path.push(segment);
        }
        Ok(path
            .join(&coordinate.name)
            .join(version)
            .join(format!("{}-{}.{}", coordinate.name, version, extension)))
    }

    /// Content-addressed cache directory of a coordinate.
    pub fn cache_path(&self, coordinate: &Coordinate) -> PathBuf {
        let digest = hasher::hash_string(&coordinate.to_string());
        let key = digest.trim_start_matches("blake3:");
        self.cache_dir.join(&key[..16.min(key.len())])
    }

    fn unpack(&self, coordinate: &Coordinate) -> Result<PathBuf> {
        let target = self.cache_path(coordinate);
        if target.is_dir() {
            debug!(coordinate = %coordinate, path = %target.display(), "distribution already cached");
            return Ok(target);
        }
        let archive = self.archive_path(coordinate)?;
        let file = File::open(&archive).map_err(|e| Error::Extraction {
            coordinate: coordinate.to_string(),
            message: format!("cannot open {}: {}", archive.display(), e),
        })?;

        std::fs::create_dir_all(&self.cache_dir)
            .map_err(|e| Error::io("cannot create dir", &self.cache_dir, e))?;
        let staging = tempfile::Builder::new()
            .prefix(".extract-")
            .tempdir_in(&self.cache_dir)
            .map_err(|e| Error::io("cannot create temp dir in", &self.cache_dir, e))?;

        tar::Archive::new(GzDecoder::new(file))
            .unpack(staging.path())
            .map_err(|e| Error::Extraction {
                coordinate: coordinate.to_string(),
                message: format!("cannot unpack {}: {}", archive.display(), e),
            })?;

        if let Err(e) = std::fs::rename(staging.path(), &target) {
            // Another writer won the race; its copy is equivalent.
            if !target.is_dir() {
                return Err(Error::io("cannot rename", staging.path(), e));
            }
        }
        info!(coordinate = %coordinate, path = %target.display(), "extracted distribution");
        Ok(target)
    }

    fn lock_memo(&self, coordinate: &Coordinate) -> Result<MutexGuard<'_, HashMap<Coordinate, PathBuf>>> {
        self.memo.lock().map_err(|_| Error::Extraction {
            coordinate: coordinate.to_string(),
            message: "extraction cache lock poisoned".to_string(),
        })
    }
}

impl ExecutableExtractor for RepositoryExtractor {
    fn materialize(&self, coordinate: &Coordinate, executable: &str) -> Result<PathBuf> {
        // A memoized root may have been deleted by a clean since.
        let cached = self
            .lock_memo(coordinate)?
            .get(coordinate)
            .filter(|root| root.is_dir())
            .cloned();
        let root = match cached {
            Some(root) => root,
            None => {
                // Unpack without holding the lock; the rename settles races.
                let root = self.unpack(coordinate)?;
                self.lock_memo(coordinate)?
                    .insert(coordinate.clone(), root.clone());
                root
            }
        };
        find_executable(&root, executable).ok_or_else(|| Error::Extraction {
            coordinate: coordinate.to_string(),
            message: format!("no bin/{} in {}", executable, root.display()),
        })
    }
}

/// Locate `bin/<executable>` at the top of a distribution or one directory down.
pub fn find_executable(root: &Path, executable: &str) -> Option<PathBuf> {
    let names = if cfg!(windows) {
        vec![format!("{}.bat", executable), executable.to_string()]
    } else {
        vec![executable.to_string()]
    };
    let mut candidates = vec![root.join("bin")];
    if let Ok(entries) = std::fs::read_dir(root) {
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        candidates.extend(dirs.into_iter().map(|d| d.join("bin")));
    }
    candidates
        .iter()
        .flat_map(|bin| names.iter().map(move |n| bin.join(n)))
        .find(|p| p.is_file())
}
