//! in-memory store for tests and ephemeral use
//!
//! [`MemoryStore`] keeps objects and refs behind `RwLock`/`Mutex` guarded
//! maps. Clones share state, so a clone handed to another thread observes
//! and contends on the same refs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::hash::Oid;
use crate::refs::{validate_ref_name, RefValue};
use crate::store::{codec, Store};
use crate::types::Object;

#[derive(Debug, Default)]
struct Inner {
    objects: RwLock<HashMap<Oid, Object>>,
    refs: Mutex<BTreeMap<String, RefValue>>,
    locks: Arc<Mutex<HashSet<String>>>,
}

/// an in-memory implementation of [`Store`]
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
    user: Option<Handle>,
}

impl MemoryStore {
    /// create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// set the identity used for commits without an explicit author
    pub fn with_user(mut self, user: Handle) -> Self {
        self.user = Some(user);
        self
    }

    /// number of stored objects
    pub fn object_count(&self) -> usize {
        self.inner
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn refs(&self) -> MutexGuard<'_, BTreeMap<String, RefValue>> {
        self.inner.refs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_locked(&self, name: &str) -> bool {
        self.inner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    fn apply(refs: &mut BTreeMap<String, RefValue>, name: &str, new: Option<&RefValue>) {
        match new {
            Some(value) => {
                debug!(name, value = %value, "wrote ref");
                refs.insert(name.to_string(), value.clone());
            }
            None => {
                debug!(name, "deleted ref");
                refs.remove(name);
            }
        }
    }
}

/// exclusive lock on one in-memory ref, released on drop
#[derive(Debug)]
pub struct MemoryRefLock {
    name: String,
    locks: Arc<Mutex<HashSet<String>>>,
}

impl MemoryRefLock {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MemoryRefLock {
    fn drop(&mut self) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

impl Store for MemoryStore {
    type Lock = MemoryRefLock;

    fn read_object(&self, oid: &Oid) -> Result<Object> {
        self.inner
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(oid)
            .cloned()
            .ok_or_else(|| Error::InvalidReference(oid.to_hex()))
    }

    fn write_object(&self, object: &Object) -> Result<Oid> {
        let oid = codec::object_id(object)?;
        let mut objects = self
            .inner
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !objects.contains_key(&oid) {
            objects.insert(oid, object.clone());
            debug!(oid = %oid.short(), kind = %object.kind(), "wrote object");
        }
        Ok(oid)
    }

    fn contains(&self, oid: &Oid) -> Result<bool> {
        Ok(self
            .inner
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(oid))
    }

    fn find_prefix(&self, prefix: &str) -> Result<Vec<Oid>> {
        if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::BadRevisionSyntax(format!("not a hex prefix: {}", prefix)));
        }
        let prefix = prefix.to_ascii_lowercase();
        let mut found: Vec<Oid> = self
            .inner
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|oid| oid.to_hex().starts_with(&prefix))
            .copied()
            .collect();
        found.sort();
        Ok(found)
    }

    fn ref_read(&self, name: &str) -> Result<Option<RefValue>> {
        validate_ref_name(name)?;
        Ok(self.refs().get(name).cloned())
    }

    fn ref_cas(
        &self,
        name: &str,
        expected: Option<&RefValue>,
        new: Option<&RefValue>,
    ) -> Result<bool> {
        validate_ref_name(name)?;
        validate_value(new)?;

        // lock check and swap happen under one guard
        let mut refs = self.refs();
        if self.is_locked(name) {
            warn!(name, "ref lock is held by another writer");
            return Err(Error::LockContention(name.to_string()));
        }
        if refs.get(name) != expected {
            return Ok(false);
        }
        Self::apply(&mut refs, name, new);
        Ok(true)
    }

    fn ref_lock(&self, name: &str) -> Result<MemoryRefLock> {
        validate_ref_name(name)?;
        let mut locks = self
            .inner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !locks.insert(name.to_string()) {
            warn!(name, "ref lock is held by another writer");
            return Err(Error::LockContention(name.to_string()));
        }
        Ok(MemoryRefLock {
            name: name.to_string(),
            locks: Arc::clone(&self.inner.locks),
        })
    }

    fn ref_write_locked(&self, lock: &MemoryRefLock, new: Option<&RefValue>) -> Result<()> {
        validate_value(new)?;
        let mut refs = self.refs();
        Self::apply(&mut refs, lock.name(), new);
        Ok(())
    }

    fn ref_write_unconditional(&self, name: &str, new: Option<&RefValue>) -> Result<()> {
        validate_ref_name(name)?;
        validate_value(new)?;
        let mut refs = self.refs();
        Self::apply(&mut refs, name, new);
        Ok(())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<String>> {
        // BTreeMap keys are already sorted
        Ok(self
            .refs()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn default_handle(&self) -> Option<Handle> {
        self.user.clone()
    }
}

fn validate_value(value: Option<&RefValue>) -> Result<()> {
    value.map_or(Ok(()), RefValue::validate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn direct(seed: &[u8]) -> RefValue {
        RefValue::Direct(Oid::digest(seed))
    }

    #[test]
    fn test_objects_are_deduplicated() {
        let store = MemoryStore::new();

        let a = store.write_object(&Object::Blob(b"x".to_vec())).unwrap();
        let b = store.write_object(&Object::Blob(b"x".to_vec())).unwrap();

        assert_eq!(a, b);
        assert_eq!(store.object_count(), 1);
    }

    #[test]
    fn test_read_unknown_object() {
        let store = MemoryStore::new();
        let err = store.read_object(&Oid::ZERO).unwrap_err();
        assert!(err.is_invalid_reference());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let store = MemoryStore::new();

        let lock = store.ref_lock("refs/heads/main").unwrap();
        assert!(matches!(
            store.ref_lock("refs/heads/main"),
            Err(Error::LockContention(_))
        ));
        // other refs are unaffected
        assert!(store.ref_lock("refs/heads/other").is_ok());

        drop(lock);
        assert!(store.ref_lock("refs/heads/main").is_ok());
    }

    #[test]
    fn test_cas_fails_while_locked() {
        let store = MemoryStore::new();
        let _lock = store.ref_lock("refs/heads/main").unwrap();

        let result = store.ref_cas("refs/heads/main", None, Some(&direct(b"a")));
        assert!(matches!(result, Err(Error::LockContention(_))));
        assert_eq!(store.ref_read("refs/heads/main").unwrap(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();

        let handle = thread::spawn(move || {
            other
                .ref_write_unconditional("refs/heads/main", Some(&direct(b"t")))
                .unwrap();
        });
        handle.join().unwrap();

        assert_eq!(
            store.ref_read("refs/heads/main").unwrap(),
            Some(direct(b"t"))
        );
    }

    #[test]
    fn test_concurrent_cas_has_one_winner() {
        let store = MemoryStore::new();

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .ref_cas("refs/heads/race", None, Some(&direct(&[i])))
                        .unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_list_refs_sorted_by_prefix() {
        let store = MemoryStore::new();
        for name in ["refs/tags/v1", "refs/heads/b", "refs/heads/a"] {
            store
                .ref_write_unconditional(name, Some(&direct(b"x")))
                .unwrap();
        }

        assert_eq!(
            store.list_refs("refs/heads/").unwrap(),
            vec!["refs/heads/a", "refs/heads/b"]
        );
    }

    #[test]
    fn test_rejects_invalid_symbolic_value() {
        let store = MemoryStore::new();
        let name = "refs/heads/main";
        let bad = RefValue::Symbolic("main".into());

        assert!(store.ref_write_unconditional(name, Some(&bad)).is_err());
        assert!(store.ref_cas(name, None, Some(&bad)).is_err());
        let lock = store.ref_lock(name).unwrap();
        assert!(store.ref_write_locked(&lock, Some(&bad)).is_err());
        drop(lock);

        assert_eq!(store.ref_read(name).unwrap(), None);
    }
}
