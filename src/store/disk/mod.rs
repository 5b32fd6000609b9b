mod refs;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};
use crate::handle::Handle;
use crate::hash::Oid;
use crate::refs::RefValue;
use crate::store::{codec, Store};
use crate::types::Object;

pub use refs::DiskRefLock;

/// an on-disk repository
///
/// layout:
///
/// ```text
/// config.toml
/// objects/ab/cdef...   zstd-compressed canonical encodings
/// refs/heads/...       ref files: "<hex>\n" or "ref: <name>\n"
/// HEAD
/// locks/...            per-ref flock files
/// tmp/                 staging for atomic writes
/// ```
pub struct Repo {
    path: PathBuf,
    config: Config,
}

impl Repo {
    /// initialize a new repository at the given path
    pub fn init(path: &Path) -> Result<Self> {
        let config_path = path.join("config.toml");
        if config_path.exists() {
            return Err(Error::RepoExists(path.to_path_buf()));
        }

        for dir in ["objects", "refs/heads", "refs/tags", "refs/remotes", "locks", "tmp"] {
            fs::create_dir_all(path.join(dir)).with_path(path)?;
        }

        let config = Config::default();
        config.save(&config_path)?;

        debug!(path = %path.display(), "initialized repository");

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// open an existing repository
    pub fn open(path: &Path) -> Result<Self> {
        let config_path = path.join("config.toml");
        if !config_path.exists() {
            return Err(Error::NoRepo(path.to_path_buf()));
        }

        let config = Config::load(&config_path)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// repository root path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// repository configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// mutable access to configuration
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// save configuration changes
    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path())
    }

    /// path to config.toml
    pub fn config_path(&self) -> PathBuf {
        self.path.join("config.toml")
    }

    /// path to objects directory
    pub fn objects_path(&self) -> PathBuf {
        self.path.join("objects")
    }

    /// path to refs directory
    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    /// path to lock directory
    pub fn locks_path(&self) -> PathBuf {
        self.path.join("locks")
    }

    /// path to tmp directory (for atomic writes)
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }

    /// get the filesystem path to an object
    pub fn object_path(&self, oid: &Oid) -> PathBuf {
        let (dir, file) = oid.to_path_components();
        self.objects_path().join(dir).join(file)
    }

    /// write bytes to `dest` via temp -> fsync -> rename, then fsync the parent
    fn atomic_write(&self, dest: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }

        let tmp_path = self.tmp_path().join(uuid::Uuid::new_v4().to_string());
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(bytes).with_path(&tmp_path)?;
            tmp_file.sync_all().with_path(&tmp_path)?;
        }

        fs::rename(&tmp_path, dest).with_path(dest)?;

        if let Some(parent) = dest.parent() {
            let dir = File::open(parent).with_path(parent)?;
            dir.sync_all().with_path(parent)?;
        }

        Ok(())
    }
}

impl Store for Repo {
    type Lock = DiskRefLock;

    fn read_object(&self, oid: &Oid) -> Result<Object> {
        let path = self.object_path(oid);

        let compressed = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::InvalidReference(oid.to_hex())
            } else {
                Error::Io {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        let encoded = zstd::decode_all(&compressed[..]).with_path(&path)?;

        // verify hash
        if Oid::digest(&encoded) != *oid {
            return Err(Error::CorruptObject(*oid));
        }

        codec::decode(&encoded)
    }

    fn write_object(&self, object: &Object) -> Result<Oid> {
        let encoded = codec::encode(object)?;
        let oid = Oid::digest(&encoded);
        let path = self.object_path(&oid);

        // dedup: if object already exists, we're done
        if path.exists() {
            return Ok(oid);
        }

        let compressed = zstd::encode_all(&encoded[..], self.config.core.compression_level)
            .map_err(|e| Error::Io {
                path: PathBuf::from("<zstd>"),
                source: e,
            })?;
        self.atomic_write(&path, &compressed)?;

        debug!(oid = %oid.short(), kind = %object.kind(), "wrote object");
        Ok(oid)
    }

    fn contains(&self, oid: &Oid) -> Result<bool> {
        Ok(self.object_path(oid).exists())
    }

    fn find_prefix(&self, prefix: &str) -> Result<Vec<Oid>> {
        if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::BadRevisionSyntax(format!("not a hex prefix: {}", prefix)));
        }
        let prefix = prefix.to_ascii_lowercase();
        if prefix.len() < 2 {
            return Err(Error::BadRevisionSyntax(format!(
                "oid prefix too short: {}",
                prefix
            )));
        }

        let dir = self.objects_path().join(&prefix[..2]);
        if !dir.is_dir() {
            return Ok(vec![]);
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(&dir).with_path(&dir)? {
            let entry = entry.with_path(&dir)?;
            let name = entry.file_name().to_string_lossy().to_string();
            let hex = format!("{}{}", &prefix[..2], name);
            if hex.starts_with(&prefix) {
                if let Ok(oid) = Oid::from_hex(&hex) {
                    found.push(oid);
                }
            }
        }
        found.sort();
        Ok(found)
    }

    fn ref_read(&self, name: &str) -> Result<Option<RefValue>> {
        self.read_ref_file(name)
    }

    fn ref_cas(
        &self,
        name: &str,
        expected: Option<&RefValue>,
        new: Option<&RefValue>,
    ) -> Result<bool> {
        let _lock = self.lock_ref(name)?;

        let current = self.read_ref_file(name)?;
        if current.as_ref() != expected {
            return Ok(false);
        }

        self.store_ref_file(name, new)?;
        Ok(true)
    }

    fn ref_lock(&self, name: &str) -> Result<DiskRefLock> {
        self.lock_ref(name)
    }

    fn ref_write_locked(&self, lock: &DiskRefLock, new: Option<&RefValue>) -> Result<()> {
        self.store_ref_file(lock.name(), new)
    }

    fn ref_write_unconditional(&self, name: &str, new: Option<&RefValue>) -> Result<()> {
        self.store_ref_file(name, new)
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<String>> {
        self.collect_refs(prefix)
    }

    fn default_handle(&self) -> Option<Handle> {
        self.config.user.clone()
    }

    fn push_url(&self, remote: &str) -> Result<String> {
        self.config
            .get_remote(remote)
            .map(|r| r.effective_push_url().to_string())
            .ok_or_else(|| Error::RemoteNotFound(remote.to_string()))
    }
}
