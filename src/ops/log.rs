use std::collections::HashSet;
use std::fmt;

use crate::entry::{read_commit, CommitEntry};
use crate::error::Result;
use crate::hash::Oid;
use crate::store::Store;

/// commit with its oid for log output
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub oid: Oid,
    pub commit: CommitEntry,
}

/// commits reachable from a revision, newest first
pub fn log<S: Store + ?Sized>(
    store: &S,
    rev: &str,
    max_count: Option<usize>,
) -> Result<Vec<LogEntry>> {
    let start = store.parse(rev)?;
    let mut entries = Vec::new();
    let mut to_visit = vec![start];
    let mut visited = HashSet::new();

    while let Some(oid) = to_visit.pop() {
        if !visited.insert(oid) {
            continue;
        }

        let commit = read_commit(store, &oid)?;

        // first parent ends up on top of the stack
        for parent in commit.parent_oids().iter().rev() {
            to_visit.push(*parent);
        }

        entries.push(LogEntry { oid, commit });
    }

    // newest first; ties keep traversal order
    entries.sort_by(|a, b| b.commit.data().commit_time.cmp(&a.commit.data().commit_time));

    if let Some(max) = max_count {
        entries.truncate(max);
    }

    Ok(entries)
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.commit.data();
        writeln!(f, "commit {}", self.oid)?;
        writeln!(f, "Author: {}", data.author)?;
        writeln!(f, "Date:   {}", data.author_time)?;

        writeln!(f)?;
        for line in data.message.lines() {
            writeln!(f, "    {}", line)?;
        }

        Ok(())
    }
}
