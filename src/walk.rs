//! depth-first walks over tree-shaped values
//!
//! anything that can list its children in order implements [`Walkable`]:
//! located entries, and builder nodes (see [`crate::builder::Node`]). the
//! walk doesn't guard against symlink cycles since symlinks are leaves here.

use std::fmt;
use std::str::FromStr;

use crate::entry::Located;
use crate::error::{Error, Result};
use crate::store::Store;

/// visiting order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkMode {
    /// a node before its children
    Pre,
    /// a node after its children
    Post,
    /// only nodes without children
    Leaves,
}

impl FromStr for WalkMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pre" => Ok(WalkMode::Pre),
            "post" => Ok(WalkMode::Post),
            "leaves" => Ok(WalkMode::Leaves),
            other => Err(Error::InvalidWalkMode(other.to_string())),
        }
    }
}

impl fmt::Display for WalkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WalkMode::Pre => "pre",
            WalkMode::Post => "post",
            WalkMode::Leaves => "leaves",
        })
    }
}

/// what a visitor wants next
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visit {
    #[default]
    Continue,
    /// don't descend into this node; only meaningful in pre-order
    Skip,
}

/// a node with an ordered child list
pub trait Walkable: Sized {
    /// children in stored order, `None` for leaves
    fn walk_children<S: Store + ?Sized>(&self, store: &S) -> Result<Option<Vec<Self>>>;
}

impl Walkable for Located {
    fn walk_children<S: Store + ?Sized>(&self, store: &S) -> Result<Option<Vec<Self>>> {
        self.children(store)
    }
}

/// walk everything below `root`
///
/// a container root is not visited itself, only its descendants. a leaf root
/// is visited once.
pub fn walk<S, W, F>(store: &S, root: &W, mode: WalkMode, mut visit: F) -> Result<()>
where
    S: Store + ?Sized,
    W: Walkable,
    F: FnMut(&W) -> Result<Visit>,
{
    match root.walk_children(store)? {
        None => visit(root).map(|_| ()),
        Some(children) => children
            .iter()
            .try_for_each(|child| walk_node(store, child, mode, &mut visit)),
    }
}

fn walk_node<S, W, F>(store: &S, node: &W, mode: WalkMode, visit: &mut F) -> Result<()>
where
    S: Store + ?Sized,
    W: Walkable,
    F: FnMut(&W) -> Result<Visit>,
{
    match mode {
        WalkMode::Pre => {
            if visit(node)? == Visit::Skip {
                return Ok(());
            }
            for child in node.walk_children(store)?.into_iter().flatten() {
                walk_node(store, &child, mode, visit)?;
            }
        }
        WalkMode::Post => {
            for child in node.walk_children(store)?.into_iter().flatten() {
                walk_node(store, &child, mode, visit)?;
            }
            visit(node)?;
        }
        WalkMode::Leaves => match node.walk_children(store)? {
            None => {
                visit(node)?;
            }
            Some(children) => {
                for child in &children {
                    walk_node(store, child, mode, visit)?;
                }
            }
        },
    }
    Ok(())
}

impl Located {
    /// walk this entry's descendants, see [`walk`]
    pub fn walk<S, F>(&self, store: &S, mode: WalkMode, visit: F) -> Result<()>
    where
        S: Store + ?Sized,
        F: FnMut(&Located) -> Result<Visit>,
    {
        walk(store, self, mode, visit)
    }
}
