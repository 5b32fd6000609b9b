//! multitree - a content-addressed tree and version model
//!
//! immutable, oid-addressed trees, blobs, symlinks and commits, with a
//! mutable builder layer for staging edits, path traversal with symlink
//! semantics, and named refs that move under optimistic, pessimistic or
//! reckless concurrency control.
//!
//! # Core concepts
//!
//! - **Entry**: an immutable object read from a store (blob, file,
//!   executable, symlink, directory, commit). equal oids mean equal entries
//! - **Builder**: a mutable overlay over an entry; writing it back stores
//!   only what changed
//! - **Ref**: a named pointer to a commit or tree, or to another ref
//! - **Store**: the persistence seam; [`Repo`] on disk, [`MemoryStore`] in
//!   memory
//!
//! # Object identity
//!
//! oid = SHA256(kind | ' ' | len | '\0' | payload), where the payload is raw
//! bytes for blobs and canonical CBOR for trees and commits
//!
//! # Example usage
//!
//! ```no_run
//! use multitree::{refs, Repo, Store, UpdateStrategy};
//! use std::path::Path;
//!
//! let repo = Repo::init(Path::new("/path/to/repo")).unwrap();
//! let main = refs::branch(&repo, "main").unwrap();
//!
//! // commit on top of whatever main points at
//! main.commit(|c| {
//!     c.message("add readme");
//!     c.tree_mut().file("README", "hello\n")?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! // resolve a path in the new tip
//! let tip = repo.parse("main").unwrap();
//! let root = multitree::Located::root(repo.read(&tip).unwrap());
//! let readme = root.traverse(&repo, "README", true).unwrap();
//!
//! // move a tag without racing other writers
//! let tag = refs::tag(&repo, "v1").unwrap();
//! tag.set(UpdateStrategy::Pessimistic, Some(multitree::RefValue::Direct(tip)))
//!     .unwrap();
//! # let _ = readme;
//! ```

mod config;
mod error;
mod handle;
mod hash;
mod traverse;

pub mod builder;
pub mod entry;
pub mod ops;
pub mod refs;
pub mod revision;
pub mod store;
pub mod types;
pub mod walk;

pub use builder::{CommitBuilder, Create, Staged, TreeBuilder};
pub use config::{Config, CoreConfig, Remote};
pub use entry::{Blob, CommitEntry, Directory, Entry, File, Located, Symlink};
pub use error::{Error, Result, TraversalFault};
pub use handle::Handle;
pub use hash::Oid;
pub use refs::{Ref, RefValue, Target, UpdateStrategy};
pub use store::{MemoryStore, Repo, Store};
pub use traverse::traverse;
pub use types::{ChangeKind, Commit, DiffEntry, FileMode, Object, ObjectKind, Tree, TreeEntry};
pub use walk::{walk, Visit, WalkMode, Walkable};
