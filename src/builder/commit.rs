use tracing::debug;

use crate::builder::TreeBuilder;
use crate::entry::{CommitEntry, Directory};
use crate::error::Result;
use crate::handle::Handle;
use crate::hash::Oid;
use crate::store::Store;
use crate::types::{now, Commit};

/// staged commit: a tree builder plus parents, identities and message
///
/// unset identities fall back to the store's configured user, then to
/// [`Handle::fallback`]. unset times are taken when the commit is built.
#[derive(Clone, Debug, Default)]
pub struct CommitBuilder {
    tree: TreeBuilder,
    parents: Vec<Oid>,
    author: Option<Handle>,
    committer: Option<Handle>,
    author_time: Option<i64>,
    commit_time: Option<i64>,
    message: String,
    built: Option<CommitEntry>,
}

impl CommitBuilder {
    /// a root commit over an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// a root commit starting from `tree`
    pub fn on_tree(tree: &Directory) -> Self {
        Self {
            tree: tree.to_builder(),
            ..Self::default()
        }
    }

    /// a child of `parent` starting from its tree
    pub fn child_of<S: Store + ?Sized>(store: &S, parent: &CommitEntry) -> Result<Self> {
        Ok(Self {
            tree: parent.tree(store)?.to_builder(),
            parents: vec![parent.oid()],
            ..Self::default()
        })
    }

    pub fn tree(&self) -> &TreeBuilder {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut TreeBuilder {
        self.built = None;
        &mut self.tree
    }

    pub fn parents(&self) -> &[Oid] {
        &self.parents
    }

    pub fn parents_mut(&mut self) -> &mut Vec<Oid> {
        self.built = None;
        &mut self.parents
    }

    pub fn message(&mut self, message: impl Into<String>) -> &mut Self {
        self.built = None;
        self.message = message.into();
        self
    }

    /// set author and committer
    pub fn by(&mut self, handle: Handle) -> &mut Self {
        self.built = None;
        self.author = Some(handle.clone());
        self.committer = Some(handle);
        self
    }

    /// like [`CommitBuilder::by`], parsing `"Name <email>"` or a bare email
    pub fn by_str(&mut self, handle: &str) -> Result<&mut Self> {
        Ok(self.by(Handle::parse(handle)?))
    }

    pub fn author(&mut self, handle: Handle) -> &mut Self {
        self.built = None;
        self.author = Some(handle);
        self
    }

    pub fn committer(&mut self, handle: Handle) -> &mut Self {
        self.built = None;
        self.committer = Some(handle);
        self
    }

    /// set author and commit time, in seconds since the epoch
    pub fn at(&mut self, time: i64) -> &mut Self {
        self.built = None;
        self.author_time = Some(time);
        self.commit_time = Some(time);
        self
    }

    pub fn author_time(&mut self, time: i64) -> &mut Self {
        self.built = None;
        self.author_time = Some(time);
        self
    }

    pub fn commit_time(&mut self, time: i64) -> &mut Self {
        self.built = None;
        self.commit_time = Some(time);
        self
    }

    /// whether `path` in the tree differs from the starting tree
    pub fn changed<S: Store + ?Sized>(&self, store: &S, path: &str) -> Result<bool> {
        self.tree.changed(store, path)
    }

    /// write the tree, then the commit
    ///
    /// building again without further edits returns the same commit.
    pub fn build<S: Store + ?Sized>(&mut self, store: &S) -> Result<CommitEntry> {
        if let Some(built) = &self.built {
            return Ok(built.clone());
        }

        let tree = self.tree.build(store)?;
        let configured = store.default_handle();
        let author = self
            .author
            .clone()
            .or_else(|| configured.clone())
            .unwrap_or_else(Handle::fallback);
        let committer = self
            .committer
            .clone()
            .or(configured)
            .unwrap_or_else(Handle::fallback);
        let time = now();

        let commit = store.make_commit(Commit {
            tree: tree.oid(),
            parents: self.parents.clone(),
            author,
            author_time: self.author_time.unwrap_or(time),
            committer,
            commit_time: self.commit_time.unwrap_or(time),
            message: self.message.clone(),
        })?;
        debug!(
            oid = %commit.oid().short(),
            tree = %tree.oid().short(),
            parents = self.parents.len(),
            "built commit"
        );

        self.built = Some(commit.clone());
        Ok(commit)
    }
}

impl PartialEq<CommitEntry> for CommitBuilder {
    fn eq(&self, other: &CommitEntry) -> bool {
        self.built.as_ref().is_some_and(|built| built.oid() == other.oid())
    }
}

impl PartialEq<CommitBuilder> for CommitEntry {
    fn eq(&self, other: &CommitBuilder) -> bool {
        other == self
    }
}
