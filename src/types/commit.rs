use serde::{Deserialize, Serialize};

use crate::handle::Handle;
use crate::hash::Oid;

/// a commit object pointing to a tree with metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// root tree oid
    pub tree: Oid,
    /// parent commit oids (empty for initial, 1 for linear, 2+ for merge)
    pub parents: Vec<Oid>,
    pub author: Handle,
    /// unix timestamp (seconds since epoch)
    pub author_time: i64,
    pub committer: Handle,
    /// unix timestamp (seconds since epoch)
    pub commit_time: i64,
    pub message: String,
}

impl Commit {
    /// create a commit authored and committed by the same handle at the same time
    pub fn new(
        tree: Oid,
        parents: Vec<Oid>,
        handle: Handle,
        time: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            author: handle.clone(),
            author_time: time,
            committer: handle,
            commit_time: time,
            message: message.into(),
        }
    }

    /// is this an initial commit (no parents)
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// is this a merge commit (multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// current unix time in seconds
pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
