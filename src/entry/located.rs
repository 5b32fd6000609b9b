use std::sync::Arc;

use crate::entry::Entry;
use crate::error::{Error, Result, TraversalFault};
use crate::store::Store;
use crate::traverse;
use crate::types::FileMode;

/// an entry together with the way it was reached
///
/// the parent chain is only known when the entry came out of a traversal
/// from some root; a root has no name and no parent.
#[derive(Clone, Debug)]
pub struct Located {
    entry: Entry,
    name: Option<String>,
    parent: Option<Arc<Located>>,
    path: String,
}

impl Located {
    /// a traversal root with an empty path
    pub fn root(entry: Entry) -> Self {
        Self {
            entry,
            name: None,
            parent: None,
            path: String::new(),
        }
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn into_entry(self) -> Entry {
        self.entry
    }

    /// name within the parent, `None` for a root
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<&Located> {
        self.parent.as_deref()
    }

    /// slash separated path from the root, empty for the root itself
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> Option<FileMode> {
        self.entry.mode()
    }

    /// look up a direct child; commits forward to their tree
    pub fn child<S: Store + ?Sized>(&self, store: &S, name: &str) -> Result<Option<Located>> {
        let Some(dir) = self.entry.child_tree(store)? else {
            return Err(Error::traversal(
                join(&self.path, name),
                TraversalFault::NotContainer {
                    at: self.path.clone(),
                    name: name.to_string(),
                },
            ));
        };
        let Some(te) = dir.get(name) else {
            return Ok(None);
        };
        let entry = Entry::from_tree_entry(store, te)?;
        Ok(Some(self.located_child(entry, name)))
    }

    /// all children in stored order, `None` for leaves
    pub fn children<S: Store + ?Sized>(&self, store: &S) -> Result<Option<Vec<Located>>> {
        let Some(dir) = self.entry.child_tree(store)? else {
            return Ok(None);
        };
        let parent = Arc::new(self.clone());
        dir.entries()
            .iter()
            .map(|te| {
                let entry = Entry::from_tree_entry(store, te)?;
                Ok(Located {
                    entry,
                    name: Some(te.name.clone()),
                    parent: Some(Arc::clone(&parent)),
                    path: join(&self.path, &te.name),
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// follow a symlink relative to its parent; other entries resolve to themselves
    pub fn resolve<S: Store + ?Sized>(&self, store: &S) -> Result<Located> {
        let Some(link) = self.entry.as_symlink() else {
            return Ok(self.clone());
        };
        let Some(parent) = self.parent() else {
            return Err(Error::traversal(
                self.path.clone(),
                TraversalFault::NoParent {
                    at: self.path.clone(),
                },
            ));
        };
        let target = link.target(store)?.to_string();
        traverse::traverse(store, parent, &target, true)
    }

    pub(crate) fn located_child(&self, entry: Entry, name: &str) -> Located {
        Located {
            entry,
            name: Some(name.to_string()),
            parent: Some(Arc::new(self.clone())),
            path: join(&self.path, name),
        }
    }
}

impl PartialEq for Located {
    fn eq(&self, other: &Self) -> bool {
        self.entry == other.entry
    }
}

impl From<Entry> for Located {
    fn from(entry: Entry) -> Self {
        Located::root(entry)
    }
}

pub(crate) fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}
