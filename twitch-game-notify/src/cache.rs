//! Persistent name cache and its single-writer lock.
//!
//! The cache maps game IDs to game titles and streamer logins to display
//! names. Only the process holding the lock marker writes it back at exit.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::mem;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::project_config_dir;
use crate::error::{Error, Result};

pub const CACHE_FILE_NAME: &str = "cache.json";
pub const LOCK_FILE_NAME: &str = "cache.lock";

/// Display names collected from the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCache {
    #[serde(default)]
    pub games: BTreeMap<String, String>,
    #[serde(default)]
    pub streamers: BTreeMap<String, String>,
}

impl NameCache {
    pub fn is_empty(&self) -> bool {
        self.games.is_empty() && self.streamers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.games.len() + self.streamers.len()
    }
}

/// Location of the cache file and lock marker.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(project_config_dir())
    }
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE_NAME)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE_NAME)
    }

    /// Load the cache. A missing, empty or unreadable file yields an empty
    /// cache; only real I/O failures are returned.
    pub fn load(&self) -> Result<NameCache> {
        let path = self.cache_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cache file, starting empty");
                return Ok(NameCache::default());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(NameCache::default());
        }

        match parse_cache(&path, &contents) {
            Ok(cache) => {
                debug!(entries = cache.len(), "Loaded name cache");
                Ok(cache)
            }
            Err(e) => {
                warn!("{e}, starting with an empty cache");
                Ok(NameCache::default())
            }
        }
    }

    /// Write the cache through a temp file and rename it into place.
    pub fn save(&self, cache: &NameCache) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.cache_path();
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(cache)?;

        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        info!(path = %path.display(), entries = cache.len(), "Saved name cache");
        Ok(())
    }

    /// Try to become the cache owner. `None` means another process holds it.
    pub fn try_claim(&self) -> Result<Option<CacheLock>> {
        fs::create_dir_all(&self.dir)?;

        let path = self.lock_path();
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!(path = %path.display(), "Claimed cache lock");
                Ok(Some(CacheLock {
                    path,
                    released: false,
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a lock left behind by a crashed process.
    pub fn force_unlock(&self) -> Result<()> {
        let path = self.lock_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Removed cache lock");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::CacheNotLocked(path)),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_cache(path: &Path, contents: &str) -> Result<NameCache> {
    serde_json::from_str(contents).map_err(|e| Error::CacheCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Ownership of the lock marker. Released on drop if not released earlier.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
    released: bool,
}

impl CacheLock {
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.released = true;
        debug!(path = %self.path.display(), "Released cache lock");
        Ok(())
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), "Failed to release cache lock: {e}");
        }
    }
}

/// The cache as seen by one run: the names loaded at startup and the lock,
/// when this process won it. Names collected by a run that does not own the
/// lock are never written.
#[derive(Debug)]
pub struct CacheSession {
    store: CacheStore,
    cache: NameCache,
    lock: Option<CacheLock>,
}

impl CacheSession {
    pub fn open(store: CacheStore) -> Result<Self> {
        let cache = store.load()?;
        let lock = store.try_claim()?;
        if lock.is_none() {
            warn!(
                lock = %store.lock_path().display(),
                "Cache is locked by another instance; names collected in this run will be discarded"
            );
        }
        Ok(Self { store, cache, lock })
    }

    pub fn is_owner(&self) -> bool {
        self.lock.is_some()
    }

    /// Hand the loaded names to whoever resolves them.
    pub fn take_cache(&mut self) -> NameCache {
        mem::take(&mut self.cache)
    }

    /// Write `cache` back if this session owns the lock, then release it.
    /// Returns whether the file was written.
    pub fn close(mut self, cache: Option<NameCache>) -> Result<bool> {
        let Some(mut lock) = self.lock.take() else {
            debug!("Not the cache owner, discarding collected names");
            return Ok(false);
        };

        let saved = match cache {
            Some(cache) => self.store.save(&cache).map(|()| true),
            None => Ok(false),
        };
        let released = lock.release();
        let saved = saved?;
        released?;
        Ok(saved)
    }
}
