//! immutable, oid-addressed entries
//!
//! an [`Entry`] is what a [`Store`] hands out: a blob read by oid, or one of
//! the typed entries found inside a tree (file, executable, symlink,
//! directory), or a commit. entries are never mutated; edits go through
//! [`crate::builder`] and produce new entries with new oids.
//!
//! entries don't know where they live. [`Located`] pairs an entry with the
//! parent chain it was reached through.

mod located;

pub use located::Located;
pub(crate) use located::join;

use std::sync::{Arc, OnceLock};

use crate::builder::TreeBuilder;
use crate::error::{Error, Result};
use crate::hash::Oid;
use crate::store::Store;
use crate::types::{Commit, FileMode, Object, Tree, TreeEntry};

/// raw content read by oid, without a tree location
#[derive(Clone, Debug)]
pub struct Blob {
    oid: Oid,
    content: Arc<[u8]>,
}

impl Blob {
    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// a regular or executable file inside a tree
#[derive(Clone, Debug)]
pub struct File {
    oid: Oid,
    mode: FileMode,
}

impl File {
    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// read the file content from the store
    pub fn content<S: Store + ?Sized>(&self, store: &S) -> Result<Vec<u8>> {
        read_blob(store, &self.oid)
    }
}

/// a symlink inside a tree; the target is loaded on first use
#[derive(Clone, Debug)]
pub struct Symlink {
    oid: Oid,
    target: OnceLock<String>,
}

impl Symlink {
    fn new(oid: Oid) -> Self {
        Self {
            oid,
            target: OnceLock::new(),
        }
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// the stored target text
    pub fn target<S: Store + ?Sized>(&self, store: &S) -> Result<&str> {
        if let Some(target) = self.target.get() {
            return Ok(target);
        }
        let bytes = read_blob(store, &self.oid)?;
        let target = String::from_utf8(bytes).map_err(|_| {
            Error::CorruptObjectMessage(format!("symlink {} target is not utf-8", self.oid))
        })?;
        Ok(self.target.get_or_init(|| target))
    }
}

/// a tree: an ordered map of names to (mode, oid)
#[derive(Clone, Debug)]
pub struct Directory {
    oid: Oid,
    tree: Arc<Tree>,
}

impl Directory {
    pub fn new(oid: Oid, tree: Tree) -> Self {
        Self {
            oid,
            tree: Arc::new(tree),
        }
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// entries in stored (name) order
    pub fn entries(&self) -> &[TreeEntry] {
        self.tree.entries()
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.tree.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.tree.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// materialize the child called `name`
    pub fn entry<S: Store + ?Sized>(&self, store: &S, name: &str) -> Result<Option<Entry>> {
        self.get(name)
            .map(|te| Entry::from_tree_entry(store, te))
            .transpose()
    }

    /// start a builder that edits this directory
    pub fn to_builder(&self) -> TreeBuilder {
        TreeBuilder::from_directory(self.clone())
    }
}

/// a commit object
#[derive(Clone, Debug)]
pub struct CommitEntry {
    oid: Oid,
    commit: Arc<Commit>,
}

impl CommitEntry {
    pub fn new(oid: Oid, commit: Commit) -> Self {
        Self {
            oid,
            commit: Arc::new(commit),
        }
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// the raw commit fields
    pub fn data(&self) -> &Commit {
        &self.commit
    }

    pub fn tree_oid(&self) -> Oid {
        self.commit.tree
    }

    pub fn parent_oids(&self) -> &[Oid] {
        &self.commit.parents
    }

    pub fn message(&self) -> &str {
        &self.commit.message
    }

    /// load the root tree
    pub fn tree<S: Store + ?Sized>(&self, store: &S) -> Result<Directory> {
        read_directory(store, &self.commit.tree)
    }

    /// load the parent commits
    pub fn parents<S: Store + ?Sized>(&self, store: &S) -> Result<Vec<CommitEntry>> {
        self.commit
            .parents
            .iter()
            .map(|oid| read_commit(store, oid))
            .collect()
    }
}

/// any immutable object the model can hand out
#[derive(Clone, Debug)]
pub enum Entry {
    Blob(Blob),
    File(File),
    Executable(File),
    Symlink(Symlink),
    Directory(Directory),
    Commit(CommitEntry),
}

impl Entry {
    /// wrap a decoded object read by oid
    pub fn from_object(oid: Oid, object: Object) -> Self {
        match object {
            Object::Blob(content) => Entry::Blob(Blob {
                oid,
                content: content.into(),
            }),
            Object::Tree(tree) => Entry::Directory(Directory::new(oid, tree)),
            Object::Commit(commit) => Entry::Commit(CommitEntry::new(oid, commit)),
        }
    }

    /// materialize a tree entry; only directories are read eagerly
    pub fn from_tree_entry<S: Store + ?Sized>(store: &S, te: &TreeEntry) -> Result<Self> {
        Ok(match te.mode {
            FileMode::DIRECTORY => Entry::Directory(read_directory(store, &te.oid)?),
            FileMode::SYMLINK => Entry::Symlink(Symlink::new(te.oid)),
            FileMode::EXECUTABLE => Entry::Executable(File {
                oid: te.oid,
                mode: te.mode,
            }),
            _ => Entry::File(File {
                oid: te.oid,
                mode: te.mode,
            }),
        })
    }

    pub fn oid(&self) -> Oid {
        match self {
            Entry::Blob(b) => b.oid,
            Entry::File(f) | Entry::Executable(f) => f.oid,
            Entry::Symlink(s) => s.oid,
            Entry::Directory(d) => d.oid,
            Entry::Commit(c) => c.oid,
        }
    }

    /// tree mode, `None` for entries that can't sit in a tree
    pub fn mode(&self) -> Option<FileMode> {
        match self {
            Entry::File(f) | Entry::Executable(f) => Some(f.mode),
            Entry::Symlink(_) => Some(FileMode::SYMLINK),
            Entry::Directory(_) => Some(FileMode::DIRECTORY),
            Entry::Blob(_) | Entry::Commit(_) => None,
        }
    }

    /// get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Entry::Blob(_) => "blob",
            Entry::File(_) => "file",
            Entry::Executable(_) => "executable",
            Entry::Symlink(_) => "symlink",
            Entry::Directory(_) => "directory",
            Entry::Commit(_) => "commit",
        }
    }

    /// whether child lookup is supported
    pub fn is_container(&self) -> bool {
        matches!(self, Entry::Directory(_) | Entry::Commit(_))
    }

    pub fn as_directory(&self) -> Option<&Directory> {
        match self {
            Entry::Directory(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<&CommitEntry> {
        match self {
            Entry::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_symlink(&self) -> Option<&Symlink> {
        match self {
            Entry::Symlink(s) => Some(s),
            _ => None,
        }
    }

    /// the tree a container exposes: itself, or a commit's root tree
    pub fn child_tree<S: Store + ?Sized>(&self, store: &S) -> Result<Option<Directory>> {
        match self {
            Entry::Directory(d) => Ok(Some(d.clone())),
            Entry::Commit(c) => c.tree(store).map(Some),
            _ => Ok(None),
        }
    }
}

// entries are equal when their oids are
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.oid() == other.oid()
    }
}

impl Eq for Entry {}

impl PartialEq for Directory {
    fn eq(&self, other: &Self) -> bool {
        self.oid == other.oid
    }
}

impl PartialEq for CommitEntry {
    fn eq(&self, other: &Self) -> bool {
        self.oid == other.oid
    }
}

fn read_blob<S: Store + ?Sized>(store: &S, oid: &Oid) -> Result<Vec<u8>> {
    match store.read_object(oid)? {
        Object::Blob(content) => Ok(content),
        other => Err(Error::InvalidObjectType {
            expected: "blob",
            found: other.kind().as_str(),
        }),
    }
}

pub(crate) fn read_directory<S: Store + ?Sized>(store: &S, oid: &Oid) -> Result<Directory> {
    match store.read_object(oid)? {
        Object::Tree(tree) => Ok(Directory::new(*oid, tree)),
        other => Err(Error::InvalidObjectType {
            expected: "tree",
            found: other.kind().as_str(),
        }),
    }
}

pub(crate) fn read_commit<S: Store + ?Sized>(store: &S, oid: &Oid) -> Result<CommitEntry> {
    match store.read_object(oid)? {
        Object::Commit(commit) => Ok(CommitEntry::new(*oid, commit)),
        other => Err(Error::InvalidObjectType {
            expected: "commit",
            found: other.kind().as_str(),
        }),
    }
}
