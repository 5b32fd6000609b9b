//! mutable staging over immutable entries
//!
//! builders hold edits in memory and write back only what changed. a
//! [`TreeBuilder`] mirrors a directory, a [`CommitBuilder`] a commit and its
//! tree.

mod commit;
mod tree;

pub use commit::CommitBuilder;
pub use tree::{Child, Create, Node, Staged, TreeBuilder};
