//! the storage seam the object model runs on
//!
//! [`Store`] is the only thing the entry, traversal, builder and ref layers
//! know about persistence. [`Repo`] keeps objects and refs on disk,
//! [`MemoryStore`] keeps them in process memory. Neither the core nor the
//! callers branch on which one is in use.

pub mod codec;
mod disk;
mod memory;

pub use disk::{DiskRefLock, Repo};
pub use memory::{MemoryRefLock, MemoryStore};

use crate::entry::{CommitEntry, Directory, Entry};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::hash::Oid;
use crate::refs::RefValue;
use crate::revision;
use crate::types::{Commit, Object, Tree, TreeEntry};

/// content-addressed object and ref storage
///
/// implementations must satisfy:
/// - writes are idempotent: writing identical content twice yields the same
///   oid and never fails because the object already exists
/// - `ref_cas`, `ref_write_locked` and `ref_write_unconditional` never leave a
///   ref partially written
/// - `ref_lock` and `ref_cas` fail immediately with
///   [`Error::LockContention`] while another holder owns the ref lock
pub trait Store: Send + Sync {
    /// guard returned by [`Store::ref_lock`]; dropping it releases the lock
    type Lock;

    /// read and decode an object; unknown oids are [`Error::InvalidReference`]
    fn read_object(&self, oid: &Oid) -> Result<Object>;

    /// store an object and return its oid
    fn write_object(&self, object: &Object) -> Result<Oid>;

    /// whether an object with this oid is stored
    fn contains(&self, oid: &Oid) -> Result<bool>;

    /// all stored oids whose hex form starts with `prefix`
    fn find_prefix(&self, prefix: &str) -> Result<Vec<Oid>>;

    /// current value of a ref, `None` when the ref is absent
    fn ref_read(&self, name: &str) -> Result<Option<RefValue>>;

    /// set `name` to `new` only if it currently equals `expected`
    ///
    /// returns `false` without writing when the current value differs.
    /// `None` stands for an absent ref on both sides.
    fn ref_cas(
        &self,
        name: &str,
        expected: Option<&RefValue>,
        new: Option<&RefValue>,
    ) -> Result<bool>;

    /// take the exclusive lock on a ref without blocking
    fn ref_lock(&self, name: &str) -> Result<Self::Lock>;

    /// write a ref while holding its lock
    fn ref_write_locked(&self, lock: &Self::Lock, new: Option<&RefValue>) -> Result<()>;

    /// write a ref ignoring locks and concurrent changes
    fn ref_write_unconditional(&self, name: &str, new: Option<&RefValue>) -> Result<()>;

    /// names of all refs starting with `prefix`, sorted
    fn list_refs(&self, prefix: &str) -> Result<Vec<String>>;

    /// identity used for commits that did not set one
    fn default_handle(&self) -> Option<Handle> {
        None
    }

    /// url to push to for a configured remote
    fn push_url(&self, remote: &str) -> Result<String> {
        Err(Error::NotYetImplemented(format!(
            "push url discovery for remote {}",
            remote
        )))
    }

    /// compute the oid an object would be stored under
    fn hash_object(&self, object: &Object) -> Result<Oid> {
        codec::object_id(object)
    }

    /// read an object as an immutable entry
    fn read(&self, oid: &Oid) -> Result<Entry> {
        Ok(Entry::from_object(*oid, self.read_object(oid)?))
    }

    /// write an object and return it as an entry
    fn write(&self, object: Object) -> Result<Entry> {
        let oid = self.write_object(&object)?;
        Ok(Entry::from_object(oid, object))
    }

    fn include(&self, oid: &Oid) -> Result<bool> {
        self.contains(oid)
    }

    /// resolve a revision expression to an oid
    fn parse(&self, expr: &str) -> Result<Oid> {
        revision::parse(self, expr)
    }

    /// persist a tree built from (name, mode, oid) entries in any order
    fn make_tree(&self, entries: Vec<TreeEntry>) -> Result<Directory> {
        let tree = Tree::new(entries)?;
        let oid = self.write_object(&Object::Tree(tree.clone()))?;
        Ok(Directory::new(oid, tree))
    }

    /// persist a commit
    fn make_commit(&self, commit: Commit) -> Result<CommitEntry> {
        let oid = self.write_object(&Object::Commit(commit.clone()))?;
        Ok(CommitEntry::new(oid, commit))
    }
}
