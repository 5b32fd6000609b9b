use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::entry::{join, read_directory, Directory, Entry};
use crate::error::{Error, Result, TraversalFault};
use crate::hash::Oid;
use crate::store::Store;
use crate::types::{validate_entry_name, FileMode, Object, Tree, TreeEntry};
use crate::walk::{self, Visit, WalkMode, Walkable};

/// how [`TreeBuilder::path_set`] treats intermediate directories
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Create {
    /// a missing directory is an error
    No,
    /// create missing directories
    #[default]
    Yes,
    /// create missing directories and replace non-directories in the way
    Overwrite,
}

/// a pending value for one name in a [`TreeBuilder`]
#[derive(Clone, Debug)]
pub enum Staged {
    File(Vec<u8>),
    Executable(Vec<u8>),
    Symlink(String),
    Directory(TreeBuilder),
    /// an object that is already stored
    Stored { mode: FileMode, oid: Oid },
}

impl Staged {
    pub fn mode(&self) -> FileMode {
        match self {
            Staged::File(_) => FileMode::FILE,
            Staged::Executable(_) => FileMode::EXECUTABLE,
            Staged::Symlink(_) => FileMode::SYMLINK,
            Staged::Directory(_) => FileMode::DIRECTORY,
            Staged::Stored { mode, .. } => *mode,
        }
    }

    pub fn as_builder(&self) -> Option<&TreeBuilder> {
        match self {
            Staged::Directory(b) => Some(b),
            _ => None,
        }
    }
}

impl From<TreeBuilder> for Staged {
    fn from(builder: TreeBuilder) -> Self {
        Staged::Directory(builder)
    }
}

impl From<&Directory> for Staged {
    fn from(dir: &Directory) -> Self {
        Staged::Stored {
            mode: FileMode::DIRECTORY,
            oid: dir.oid(),
        }
    }
}

impl From<&TreeEntry> for Staged {
    fn from(te: &TreeEntry) -> Self {
        Staged::Stored {
            mode: te.mode,
            oid: te.oid,
        }
    }
}

/// one child of a builder: staged in the overlay, or untouched from the
/// original directory
#[derive(Clone, Copy, Debug)]
pub enum Child<'a> {
    Staged(&'a Staged),
    Stored(&'a TreeEntry),
}

impl<'a> Child<'a> {
    pub fn mode(&self) -> FileMode {
        match self {
            Child::Staged(s) => s.mode(),
            Child::Stored(te) => te.mode,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.mode().is_directory()
    }

    /// the nested builder, if this child has one
    pub fn as_builder(&self) -> Option<&'a TreeBuilder> {
        match self {
            Child::Staged(s) => s.as_builder(),
            Child::Stored(_) => None,
        }
    }

    /// oid known without hashing anything
    pub fn stored_oid(&self) -> Option<Oid> {
        match self {
            Child::Staged(Staged::Stored { oid, .. }) => Some(*oid),
            Child::Staged(_) => None,
            Child::Stored(te) => Some(te.oid),
        }
    }

    fn pending<S: Store + ?Sized>(&self, store: &S) -> Result<(FileMode, Oid)> {
        let oid = match self {
            Child::Staged(Staged::Directory(b)) => b.pending_oid(store)?,
            Child::Staged(Staged::Stored { oid, .. }) => *oid,
            Child::Staged(Staged::File(content) | Staged::Executable(content)) => {
                store.hash_object(&Object::Blob(content.clone()))?
            }
            Child::Staged(Staged::Symlink(target)) => {
                store.hash_object(&Object::Blob(target.clone().into_bytes()))?
            }
            Child::Stored(te) => te.oid,
        };
        Ok((self.mode(), oid))
    }
}

/// mutable mirror of a directory
///
/// edits live in an overlay over the optional original (`from`) directory;
/// names removed relative to `from` are remembered separately. nothing is
/// written until [`TreeBuilder::build`], which only stores what changed.
#[derive(Clone, Debug, Default)]
pub struct TreeBuilder {
    from: Option<Directory>,
    overlay: BTreeMap<String, Staged>,
    deleted: BTreeSet<String>,
    built: Option<Directory>,
}

impl TreeBuilder {
    /// an empty builder with nothing to derive from
    pub fn new() -> Self {
        Self::default()
    }

    /// a builder that starts out equal to `dir`
    pub fn from_directory(dir: Directory) -> Self {
        Self {
            from: Some(dir),
            ..Self::default()
        }
    }

    /// the directory this builder was derived from
    pub fn origin(&self) -> Option<&Directory> {
        self.from.as_ref()
    }

    /// no edits applied
    pub fn is_pristine(&self) -> bool {
        self.overlay.is_empty() && self.deleted.is_empty()
    }

    /// look up a direct child in the merged view
    pub fn entry(&self, name: &str) -> Option<Child<'_>> {
        if let Some(staged) = self.overlay.get(name) {
            return Some(Child::Staged(staged));
        }
        if self.deleted.contains(name) {
            return None;
        }
        self.from.as_ref()?.get(name).map(Child::Stored)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// child names in the merged view, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: BTreeSet<&str> = self.untouched().map(|te| te.name.as_str()).collect();
        names.extend(self.overlay.keys().map(String::as_str));
        names.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.untouched().count() + self.overlay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// stage `value` under `name`, replacing whatever was there
    pub fn insert(&mut self, name: &str, value: impl Into<Staged>) -> Result<&mut Self> {
        validate_entry_name(name)?;
        self.touch();
        self.deleted.remove(name);
        self.overlay.insert(name.to_string(), value.into());
        Ok(self)
    }

    pub fn file(&mut self, name: &str, content: impl Into<Vec<u8>>) -> Result<&mut Self> {
        self.insert(name, Staged::File(content.into()))
    }

    pub fn executable(&mut self, name: &str, content: impl Into<Vec<u8>>) -> Result<&mut Self> {
        self.insert(name, Staged::Executable(content.into()))
    }

    pub fn link(&mut self, name: &str, target: impl Into<String>) -> Result<&mut Self> {
        self.insert(name, Staged::Symlink(target.into()))
    }

    /// stage an existing entry by oid
    pub fn insert_entry(&mut self, name: &str, entry: &Entry) -> Result<&mut Self> {
        let mode = match entry {
            Entry::Blob(_) => FileMode::FILE,
            other => other.mode().ok_or(Error::InvalidObjectType {
                expected: "tree entry",
                found: other.type_name(),
            })?,
        };
        self.insert(
            name,
            Staged::Stored {
                mode,
                oid: entry.oid(),
            },
        )
    }

    /// edit the directory `name`
    ///
    /// an existing directory (staged or original) is edited in place;
    /// anything else at `name` is replaced by a new empty directory.
    pub fn directory<S, F>(&mut self, store: &S, name: &str, edit: F) -> Result<&mut Self>
    where
        S: Store + ?Sized,
        F: FnOnce(&mut TreeBuilder) -> Result<()>,
    {
        edit(self.subdir(store, name, Create::Overwrite, "", name)?)?;
        Ok(self)
    }

    /// stage `value` at a slash separated path
    pub fn path_set<S: Store + ?Sized>(
        &mut self,
        store: &S,
        path: &str,
        value: impl Into<Staged>,
        create: Create,
    ) -> Result<&mut Self> {
        let segments = split_path(path);
        let Some((leaf, dirs)) = segments.split_last() else {
            return Err(Error::traversal(path, TraversalFault::EmptyPath));
        };

        let mut current: &mut TreeBuilder = &mut *self;
        let mut at = String::new();
        for segment in dirs {
            current = current.subdir(store, segment, create, &at, path)?;
            at = join(&at, segment);
        }
        current.insert(leaf, value)?;
        Ok(self)
    }

    /// remove the entry at a slash separated path
    ///
    /// intermediate directories must exist. removing a name that isn't there
    /// is a no-op.
    pub fn delete<S: Store + ?Sized>(&mut self, store: &S, path: &str) -> Result<&mut Self> {
        let segments = split_path(path);
        let Some((leaf, dirs)) = segments.split_last() else {
            return Err(Error::traversal(path, TraversalFault::EmptyPath));
        };

        let mut current: &mut TreeBuilder = &mut *self;
        let mut at = String::new();
        for segment in dirs {
            current = current.subdir(store, segment, Create::No, &at, path)?;
            at = join(&at, segment);
        }
        current.remove(leaf);
        Ok(self)
    }

    /// whether `path` differs from the original directory
    ///
    /// compares the oid the path would have after [`TreeBuilder::build`]
    /// with the oid it has in `from`. absent on both sides is unchanged.
    /// nothing is written.
    pub fn changed<S: Store + ?Sized>(&self, store: &S, path: &str) -> Result<bool> {
        let segments = split_path(path);
        let new = self.pending_at(store, &segments)?;
        let old = match &self.from {
            Some(from) => stored_at(store, from, &segments)?,
            None => None,
        };
        Ok(new != old)
    }

    /// the oid [`TreeBuilder::build`] would produce
    pub fn pending_oid<S: Store + ?Sized>(&self, store: &S) -> Result<Oid> {
        if let Some(oid) = self.known_oid() {
            return Ok(oid);
        }

        let mut entries: Vec<TreeEntry> = self.untouched().cloned().collect();
        for (name, staged) in &self.overlay {
            let (mode, oid) = Child::Staged(staged).pending(store)?;
            entries.push(TreeEntry::new(name.clone(), mode, oid));
        }
        store.hash_object(&Object::Tree(Tree::new(entries)?))
    }

    /// write the builder back and return the resulting directory
    ///
    /// untouched children keep their oids and are not rewritten. building
    /// again without further edits returns the same directory.
    pub fn build<S: Store + ?Sized>(&mut self, store: &S) -> Result<Directory> {
        if let Some(built) = &self.built {
            return Ok(built.clone());
        }
        if self.is_pristine() {
            if let Some(from) = &self.from {
                self.built = Some(from.clone());
                return Ok(from.clone());
            }
        }

        let mut entries: Vec<TreeEntry> = self.untouched().cloned().collect();
        for (name, staged) in self.overlay.iter_mut() {
            let mode = staged.mode();
            let oid = match staged {
                Staged::Directory(b) => b.build(store)?.oid(),
                Staged::Stored { oid, .. } => *oid,
                Staged::File(content) | Staged::Executable(content) => {
                    store.write_object(&Object::Blob(content.clone()))?
                }
                Staged::Symlink(target) => {
                    store.write_object(&Object::Blob(target.clone().into_bytes()))?
                }
            };
            entries.push(TreeEntry::new(name.clone(), mode, oid));
        }

        let dir = store.make_tree(entries)?;
        debug!(
            oid = %dir.oid().short(),
            entries = dir.len(),
            staged = self.overlay.len(),
            deleted = self.deleted.len(),
            "built tree"
        );
        self.built = Some(dir.clone());
        Ok(dir)
    }

    /// walk the merged view, see [`walk::walk`]
    pub fn walk<'a, S, F>(&'a self, store: &S, mode: WalkMode, visit: F) -> Result<()>
    where
        S: Store + ?Sized,
        F: FnMut(&Node<'a>) -> Result<Visit>,
    {
        let root = Node {
            path: String::new(),
            mode: FileMode::DIRECTORY,
            view: View::Builder(self),
        };
        walk::walk(store, &root, mode, visit)
    }

    fn touch(&mut self) {
        self.built = None;
    }

    fn known_oid(&self) -> Option<Oid> {
        if let Some(built) = &self.built {
            return Some(built.oid());
        }
        match &self.from {
            Some(from) if self.is_pristine() => Some(from.oid()),
            _ => None,
        }
    }

    /// original entries that are neither staged over nor deleted
    fn untouched(&self) -> impl Iterator<Item = &TreeEntry> {
        self.from
            .iter()
            .flat_map(|from| from.entries())
            .filter(|te| !self.overlay.contains_key(&te.name) && !self.deleted.contains(&te.name))
    }

    fn remove(&mut self, name: &str) {
        self.touch();
        self.overlay.remove(name);
        if self.from.as_ref().is_some_and(|from| from.contains_key(name)) {
            self.deleted.insert(name.to_string());
        }
    }

    /// the builder for directory `name`, derived or created per `create`
    fn subdir<S: Store + ?Sized>(
        &mut self,
        store: &S,
        name: &str,
        create: Create,
        at: &str,
        path: &str,
    ) -> Result<&mut TreeBuilder> {
        validate_entry_name(name)?;
        let missing = || {
            Error::traversal(
                path,
                TraversalFault::Missing {
                    at: at.to_string(),
                    name: name.to_string(),
                },
            )
        };

        let replacement = match self.entry(name) {
            Some(Child::Staged(Staged::Directory(_))) => None,
            Some(child) if child.is_directory() => match child.stored_oid() {
                Some(oid) => Some(TreeBuilder::from_directory(read_directory(store, &oid)?)),
                None => None,
            },
            Some(_) if create == Create::Overwrite => Some(TreeBuilder::new()),
            Some(_) => {
                return Err(Error::traversal(
                    path,
                    TraversalFault::Occupied {
                        at: at.to_string(),
                        name: name.to_string(),
                    },
                ))
            }
            None if create == Create::No => return Err(missing()),
            None => Some(TreeBuilder::new()),
        };

        self.touch();
        if let Some(builder) = replacement {
            self.deleted.remove(name);
            self.overlay
                .insert(name.to_string(), Staged::Directory(builder));
        }
        match self.overlay.get_mut(name) {
            Some(Staged::Directory(builder)) => Ok(builder),
            _ => Err(missing()),
        }
    }

    /// mode and pending oid of the entry at `segments`
    fn pending_at<S: Store + ?Sized>(
        &self,
        store: &S,
        segments: &[&str],
    ) -> Result<Option<(FileMode, Oid)>> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(Some((FileMode::DIRECTORY, self.pending_oid(store)?)));
        };
        match self.entry(first) {
            None => Ok(None),
            Some(Child::Staged(Staged::Directory(b))) => b.pending_at(store, rest),
            Some(child) => {
                let (mode, oid) = child.pending(store)?;
                if rest.is_empty() {
                    Ok(Some((mode, oid)))
                } else if mode.is_directory() {
                    stored_at(store, &read_directory(store, &oid)?, rest)
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn nodes<'a>(&'a self, base: &str) -> Vec<Node<'a>> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let child = self.entry(name)?;
                let view = match child {
                    Child::Staged(Staged::Directory(b)) => View::Builder(b),
                    c if c.is_directory() => c.stored_oid().map_or(View::Leaf, View::Stored),
                    _ => View::Leaf,
                };
                Some(Node {
                    path: join(base, name),
                    mode: child.mode(),
                    view,
                })
            })
            .collect()
    }
}

/// mode and oid of the entry at `segments` below a stored directory
fn stored_at<S: Store + ?Sized>(
    store: &S,
    dir: &Directory,
    segments: &[&str],
) -> Result<Option<(FileMode, Oid)>> {
    let Some((first, rest)) = segments.split_first() else {
        return Ok(Some((FileMode::DIRECTORY, dir.oid())));
    };
    let Some(te) = dir.get(first) else {
        return Ok(None);
    };
    if rest.is_empty() {
        return Ok(Some((te.mode, te.oid)));
    }
    if !te.mode.is_directory() {
        return Ok(None);
    }
    stored_at(store, &read_directory(store, &te.oid)?, rest)
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

// a builder equals a directory once built, or while untouched
impl PartialEq<Directory> for TreeBuilder {
    fn eq(&self, other: &Directory) -> bool {
        self.known_oid() == Some(other.oid())
    }
}

impl PartialEq<TreeBuilder> for Directory {
    fn eq(&self, other: &TreeBuilder) -> bool {
        other == self
    }
}

/// a position in a builder's merged view, for walking
#[derive(Clone, Debug)]
pub struct Node<'a> {
    path: String,
    mode: FileMode,
    view: View<'a>,
}

#[derive(Clone, Debug)]
enum View<'a> {
    Builder(&'a TreeBuilder),
    Stored(Oid),
    Leaf,
}

impl<'a> Node<'a> {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// the builder behind this node, if it was edited
    pub fn builder(&self) -> Option<&'a TreeBuilder> {
        match self.view {
            View::Builder(b) => Some(b),
            _ => None,
        }
    }
}

impl<'a> Walkable for Node<'a> {
    fn walk_children<S: Store + ?Sized>(&self, store: &S) -> Result<Option<Vec<Self>>> {
        match self.view {
            View::Leaf => Ok(None),
            View::Builder(b) => Ok(Some(b.nodes(&self.path))),
            View::Stored(oid) => {
                let dir = read_directory(store, &oid)?;
                Ok(Some(
                    dir.entries()
                        .iter()
                        .map(|te| Node {
                            path: join(&self.path, &te.name),
                            mode: te.mode,
                            view: if te.mode.is_directory() {
                                View::Stored(te.oid)
                            } else {
                                View::Leaf
                            },
                        })
                        .collect(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    /// bar, foo/bar, foo/baz/qux, link -> bar
    fn fixture(store: &MemoryStore) -> Directory {
        let mut b = TreeBuilder::new();
        b.file("bar", "bar").unwrap();
        b.link("link", "bar").unwrap();
        b.path_set(store, "foo/bar", Staged::File(b"foo/bar".to_vec()), Create::Yes)
            .unwrap();
        b.path_set(store, "foo/baz/qux", Staged::Executable(b"qux".to_vec()), Create::Yes)
            .unwrap();
        b.build(store).unwrap()
    }

    fn all_paths(store: &MemoryStore, dir: &Directory) -> Vec<String> {
        let mut paths = Vec::new();
        let root = crate::entry::Located::root(Entry::Directory(dir.clone()));
        root.walk(store, WalkMode::Pre, |node| {
            paths.push(node.path().to_string());
            Ok(Visit::Continue)
        })
        .unwrap();
        paths
    }

    fn fault(err: Error) -> TraversalFault {
        match err {
            Error::InvalidTraversal { fault, .. } => fault,
            other => panic!("expected traversal error, got {other}"),
        }
    }

    #[test]
    fn test_zero_edit_round_trip() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let before = store.object_count();

        let mut b = dir.to_builder();
        let rebuilt = b.build(&store).unwrap();

        assert_eq!(rebuilt.oid(), dir.oid());
        assert_eq!(store.object_count(), before);
    }

    #[test]
    fn test_untouched_builder_reports_no_changes() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let b = dir.to_builder();

        for path in all_paths(&store, &dir) {
            assert!(!b.changed(&store, &path).unwrap(), "{path}");
        }
        assert!(!b.changed(&store, "").unwrap());
    }

    #[test]
    fn test_derived_but_unedited_subdir_is_unchanged() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        // allocates builders for foo and foo/baz without editing them
        b.directory(&store, "foo", |foo| {
            foo.directory(&store, "baz", |_| Ok(()))?;
            Ok(())
        })
        .unwrap();

        assert!(!b.changed(&store, "foo").unwrap());
        assert!(!b.changed(&store, "foo/baz").unwrap());
        assert!(!b.changed(&store, "").unwrap());
        assert_eq!(b.build(&store).unwrap().oid(), dir.oid());
    }

    #[test]
    fn test_insert_marks_path_and_ancestors_changed() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        b.path_set(&store, "foo/new", Staged::File(b"new".to_vec()), Create::Yes)
            .unwrap();

        assert!(b.changed(&store, "foo/new").unwrap());
        assert!(b.changed(&store, "foo").unwrap());
        assert!(b.changed(&store, "").unwrap());
        assert!(!b.changed(&store, "foo/bar").unwrap());
        assert!(!b.changed(&store, "foo/baz").unwrap());
        assert!(!b.changed(&store, "bar").unwrap());
    }

    #[test]
    fn test_delete_marks_path_changed() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        b.delete(&store, "foo/bar").unwrap();

        assert!(b.changed(&store, "foo/bar").unwrap());
        assert!(b.changed(&store, "foo").unwrap());
        assert!(!b.changed(&store, "foo/baz/qux").unwrap());
        assert!(!b.changed(&store, "bar").unwrap());

        let built = b.build(&store).unwrap();
        let foo = read_directory(&store, &built.get("foo").unwrap().oid).unwrap();
        assert!(!foo.contains_key("bar"));
        assert!(foo.contains_key("baz"));
    }

    #[test]
    fn test_rewriting_same_content_is_unchanged() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        b.path_set(&store, "foo/bar", Staged::File(b"foo/bar".to_vec()), Create::Yes)
            .unwrap();

        assert!(!b.changed(&store, "foo/bar").unwrap());
        assert!(!b.changed(&store, "").unwrap());
    }

    #[test]
    fn test_type_change_is_a_change() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        // same content, different mode
        b.executable("bar", "bar").unwrap();
        assert!(b.changed(&store, "bar").unwrap());
    }

    #[test]
    fn test_emptied_directory_is_kept_and_changed() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        b.delete(&store, "foo/baz/qux").unwrap();
        assert!(b.changed(&store, "foo/baz").unwrap());

        let built = b.build(&store).unwrap();
        let foo = read_directory(&store, &built.get("foo").unwrap().oid).unwrap();
        let baz = foo.get("baz").unwrap();
        assert_eq!(baz.mode, FileMode::DIRECTORY);
        assert!(read_directory(&store, &baz.oid).unwrap().is_empty());
    }

    #[test]
    fn test_changed_without_origin() {
        let store = MemoryStore::new();
        let mut b = TreeBuilder::new();
        b.file("a", "1").unwrap();

        assert!(b.changed(&store, "a").unwrap());
        assert!(b.changed(&store, "").unwrap());
        assert!(!b.changed(&store, "nothing").unwrap());
    }

    #[test]
    fn test_path_set_create_no() {
        let store = MemoryStore::new();
        let mut b = TreeBuilder::new();

        let err = b
            .path_set(&store, "a/b", Staged::File(b"v".to_vec()), Create::No)
            .unwrap_err();
        assert!(err.to_string().contains("doesn't contain an entry named \"a\""));
        assert_eq!(
            fault(err),
            TraversalFault::Missing {
                at: String::new(),
                name: "a".into()
            }
        );
        assert!(b.is_empty());
    }

    #[test]
    fn test_path_set_creates_directories() {
        let store = MemoryStore::new();
        let mut b = TreeBuilder::new();

        b.path_set(&store, "a/b", Staged::File(b"v".to_vec()), Create::default())
            .unwrap();
        let built = b.build(&store).unwrap();

        let a = built.get("a").unwrap();
        assert_eq!(a.mode, FileMode::DIRECTORY);
        let a = read_directory(&store, &a.oid).unwrap();
        assert_eq!(a.get("b").unwrap().mode, FileMode::FILE);
    }

    #[test]
    fn test_path_set_through_occupied_entry() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        let err = b
            .path_set(&store, "bar/x", Staged::File(b"x".to_vec()), Create::Yes)
            .unwrap_err();
        assert!(err.to_string().contains("does contain an entry named \"bar\""));
        assert!(matches!(fault(err), TraversalFault::Occupied { .. }));
        assert!(!b.changed(&store, "bar").unwrap());

        b.path_set(&store, "bar/x", Staged::File(b"x".to_vec()), Create::Overwrite)
            .unwrap();
        assert!(b.entry("bar").unwrap().is_directory());
        assert!(b.changed(&store, "bar/x").unwrap());
    }

    #[test]
    fn test_directory_merges_with_existing() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        b.directory(&store, "foo", |foo| {
            foo.file("one", "1")?;
            Ok(())
        })
        .unwrap();
        b.directory(&store, "foo", |foo| {
            foo.file("two", "2")?;
            Ok(())
        })
        .unwrap();

        let foo = b.entry("foo").unwrap().as_builder().unwrap();
        assert_eq!(foo.names(), vec!["bar", "baz", "one", "two"]);
    }

    #[test]
    fn test_directory_replaces_non_directory() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        b.directory(&store, "bar", |d| {
            d.file("inner", "x")?;
            Ok(())
        })
        .unwrap();

        let bar = b.entry("bar").unwrap().as_builder().unwrap();
        assert_eq!(bar.names(), vec!["inner"]);
    }

    #[test]
    fn test_delete_requires_intermediates() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        let err = b.delete(&store, "nope/bar").unwrap_err();
        assert!(matches!(fault(err), TraversalFault::Missing { .. }));

        // missing leaf is fine
        b.delete(&store, "foo/nope").unwrap();
        assert!(!b.changed(&store, "").unwrap());
    }

    #[test]
    fn test_delete_then_reinsert() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        b.delete(&store, "bar").unwrap();
        assert!(!b.contains("bar"));
        b.file("bar", "bar").unwrap();

        assert!(!b.changed(&store, "bar").unwrap());
        assert_eq!(b.build(&store).unwrap().oid(), dir.oid());
    }

    #[test]
    fn test_build_is_idempotent() {
        let store = MemoryStore::new();
        let mut b = TreeBuilder::new();
        b.file("a", "1").unwrap();

        let first = b.build(&store).unwrap();
        let count = store.object_count();
        let second = b.build(&store).unwrap();

        assert_eq!(first.oid(), second.oid());
        assert_eq!(store.object_count(), count);
        assert!(b == first);
        assert!(first == b);
    }

    #[test]
    fn test_edit_after_build_invalidates() {
        let store = MemoryStore::new();
        let mut b = TreeBuilder::new();
        b.file("a", "1").unwrap();
        let first = b.build(&store).unwrap();

        b.file("b", "2").unwrap();
        assert!(b != first);
        assert_ne!(b.build(&store).unwrap().oid(), first.oid());
    }

    #[test]
    fn test_untouched_children_keep_oids() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();

        b.file("new", "n").unwrap();
        let built = b.build(&store).unwrap();

        assert_eq!(built.get("foo").unwrap().oid, dir.get("foo").unwrap().oid);
        assert_eq!(built.get("link").unwrap().oid, dir.get("link").unwrap().oid);
    }

    #[test]
    fn test_edit_order_does_not_matter() {
        let store = MemoryStore::new();
        let dir = fixture(&store);

        let mut one = dir.to_builder();
        one.file("x", "x").unwrap();
        one.delete(&store, "bar").unwrap();
        one.path_set(&store, "foo/y", Staged::File(b"y".to_vec()), Create::Yes)
            .unwrap();

        let mut two = dir.to_builder();
        two.path_set(&store, "foo/y", Staged::File(b"y".to_vec()), Create::Yes)
            .unwrap();
        two.delete(&store, "bar").unwrap();
        two.file("x", "x").unwrap();

        assert_eq!(one.pending_oid(&store).unwrap(), two.pending_oid(&store).unwrap());
        assert_eq!(
            one.build(&store).unwrap().oid(),
            two.build(&store).unwrap().oid()
        );
    }

    #[test]
    fn test_pending_oid_matches_build() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();
        b.path_set(&store, "foo/baz/new", Staged::File(b"n".to_vec()), Create::Yes)
            .unwrap();

        let pending = b.pending_oid(&store).unwrap();
        assert!(!store.contains(&pending).unwrap());
        assert_eq!(b.build(&store).unwrap().oid(), pending);
    }

    #[test]
    fn test_insert_stored_entry() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = TreeBuilder::new();

        b.insert("copy", &dir).unwrap();
        let foo = dir.entry(&store, "foo").unwrap().unwrap();
        b.insert_entry("foo", &foo).unwrap();
        let built = b.build(&store).unwrap();

        assert_eq!(built.get("copy").unwrap().oid, dir.oid());
        assert_eq!(built.get("foo").unwrap().oid, foo.oid());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut b = TreeBuilder::new();
        assert!(b.file("a/b", "x").is_err());
        assert!(b.file("..", "x").is_err());
        assert!(b.file("", "x").is_err());
    }

    #[test]
    fn test_walk_merged_view() {
        let store = MemoryStore::new();
        let base = TreeBuilder::new().build(&store).unwrap();
        let mut b = base.to_builder();
        b.file("bar", "x").unwrap();
        b.path_set(&store, "foo/bar", Staged::File(b"x".to_vec()), Create::Yes)
            .unwrap();

        let collect = |mode| {
            let mut seen = Vec::new();
            b.walk(&store, mode, |node| {
                seen.push(node.path().to_string());
                Ok(Visit::Continue)
            })
            .unwrap();
            seen
        };

        assert_eq!(collect(WalkMode::Pre), vec!["bar", "foo", "foo/bar"]);
        assert_eq!(collect(WalkMode::Post), vec!["bar", "foo/bar", "foo"]);
        assert_eq!(collect(WalkMode::Leaves), vec!["bar", "foo/bar"]);
    }

    #[test]
    fn test_walk_mixes_stored_and_staged() {
        let store = MemoryStore::new();
        let dir = fixture(&store);
        let mut b = dir.to_builder();
        b.delete(&store, "link").unwrap();
        b.path_set(&store, "foo/baz/zz", Staged::File(b"z".to_vec()), Create::Yes)
            .unwrap();

        let mut seen = Vec::new();
        b.walk(&store, WalkMode::Leaves, |node| {
            seen.push(node.path().to_string());
            Ok(Visit::Continue)
        })
        .unwrap();

        assert_eq!(seen, vec!["bar", "foo/bar", "foo/baz/qux", "foo/baz/zz"]);
    }
}
