use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

use nix::fcntl::{Flock, FlockArg};
use tracing::{debug, warn};

use crate::error::{Error, IoResultExt, Result};
use crate::refs::{is_pseudo_ref, validate_ref_name, RefValue};
use crate::store::disk::Repo;

/// exclusive lock on one ref, released on drop
pub struct DiskRefLock {
    name: String,
    #[allow(dead_code)]
    flock: Flock<File>,
}
// lock is released automatically when Flock is dropped

impl DiskRefLock {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Repo {
    /// filesystem path for a ref
    fn ref_path(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    fn ref_lock_path(&self, name: &str) -> PathBuf {
        self.locks_path().join(format!("{}.lock", name))
    }

    /// read a ref file, `None` if it doesn't exist
    pub(super) fn read_ref_file(&self, name: &str) -> Result<Option<RefValue>> {
        validate_ref_name(name)?;
        let path = self.ref_path(name);

        if path.is_dir() {
            return Ok(None);
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io { path, source: e }),
        };

        RefValue::parse_text(content.trim()).map(Some)
    }

    /// write or delete a ref file atomically
    pub(super) fn store_ref_file(&self, name: &str, value: Option<&RefValue>) -> Result<()> {
        validate_ref_name(name)?;
        if let Some(value) = value {
            value.validate()?;
        }
        let path = self.ref_path(name);

        match value {
            Some(value) => {
                let text = format!("{}\n", value.to_text());
                self.atomic_write(&path, text.as_bytes())?;
                debug!(name, value = %value, "wrote ref");
            }
            None => match fs::remove_file(&path) {
                Ok(()) => debug!(name, "deleted ref"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io { path, source: e }),
            },
        }

        Ok(())
    }

    /// acquire the per-ref lock without blocking
    pub(super) fn lock_ref(&self, name: &str) -> Result<DiskRefLock> {
        validate_ref_name(name)?;
        let lock_path = self.ref_lock_path(name);

        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_path(&lock_path)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => Ok(DiskRefLock {
                name: name.to_string(),
                flock,
            }),
            Err(_) => {
                warn!(name, "ref lock is held by another writer");
                Err(Error::LockContention(name.to_string()))
            }
        }
    }

    /// collect ref names under refs/ plus top-level names like HEAD
    pub(super) fn collect_refs(&self, prefix: &str) -> Result<Vec<String>> {
        let mut refs = Vec::new();

        let refs_dir = self.refs_path();
        if refs_dir.exists() {
            for entry in walkdir::WalkDir::new(&refs_dir) {
                let entry = entry.map_err(|e| Error::Io {
                    path: refs_dir.clone(),
                    source: e.into(),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Ok(rel) = entry.path().strip_prefix(self.path()) {
                    refs.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }

        for entry in fs::read_dir(self.path()).with_path(self.path())? {
            let entry = entry.with_path(self.path())?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_file() && is_pseudo_ref(&name) {
                refs.push(name);
            }
        }

        refs.retain(|r| r.starts_with(prefix));
        refs.sort();
        Ok(refs)
    }
}
