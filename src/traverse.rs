//! slash separated path resolution over located entries
//!
//! segments are consumed from a stack. a followed symlink pushes its own
//! target segments on top of what is left, plus a marker that drops the link
//! from the in-progress set once its target is consumed. meeting a link that
//! is still in progress is a cycle.

use std::collections::HashSet;

use tracing::debug;

use crate::entry::Located;
use crate::error::{Error, Result, TraversalFault};
use crate::store::Store;

enum Step {
    Segment(String),
    EndOfLink(String),
}

fn segments(path: &str) -> impl DoubleEndedIterator<Item = Step> + '_ {
    path.split('/').map(|s| Step::Segment(s.to_string()))
}

fn is_noop(segment: &str) -> bool {
    segment.is_empty() || segment == "."
}

/// resolve `path` starting at `root`
///
/// with `follow` disabled a symlink is only returned when it is the last
/// segment; descending through it is an error.
pub fn traverse<S: Store + ?Sized>(
    store: &S,
    root: &Located,
    path: &str,
    follow: bool,
) -> Result<Located> {
    let mut stack: Vec<Step> = segments(path).rev().collect();
    let mut in_progress: HashSet<String> = HashSet::new();
    let mut current = root.clone();

    while let Some(step) = stack.pop() {
        let segment = match step {
            Step::EndOfLink(key) => {
                in_progress.remove(&key);
                continue;
            }
            Step::Segment(segment) if is_noop(&segment) => continue,
            Step::Segment(segment) => segment,
        };

        if segment == ".." {
            current = match current.parent() {
                Some(parent) => parent.clone(),
                None => {
                    return Err(Error::traversal(
                        path,
                        TraversalFault::NoParent {
                            at: current.path().to_string(),
                        },
                    ))
                }
            };
            continue;
        }

        if !current.entry().is_container() {
            return Err(Error::traversal(
                path,
                TraversalFault::NotContainer {
                    at: current.path().to_string(),
                    name: segment,
                },
            ));
        }
        let Some(child) = current.child(store, &segment)? else {
            return Err(Error::traversal(
                path,
                TraversalFault::Missing {
                    at: current.path().to_string(),
                    name: segment,
                },
            ));
        };

        let Some(link) = child.entry().as_symlink() else {
            current = child;
            continue;
        };

        let key = child.path().to_string();
        if in_progress.contains(&key) {
            return Err(Error::CyclicSymlink {
                path: path.to_string(),
                link: key,
            });
        }

        if !follow {
            let pending = stack
                .iter()
                .any(|s| matches!(s, Step::Segment(seg) if !is_noop(seg)));
            if pending {
                return Err(Error::traversal(
                    path,
                    TraversalFault::UnresolvedSymlink { link: key },
                ));
            }
            return Ok(child);
        }

        let target = link.target(store)?.to_string();
        debug!(link = %key, target = %target, "following symlink");
        stack.push(Step::EndOfLink(key.clone()));
        stack.extend(segments(&target).rev());
        in_progress.insert(key);
    }

    Ok(current)
}

impl Located {
    /// resolve `path` relative to this entry
    pub fn traverse<S: Store + ?Sized>(&self, store: &S, path: &str, follow: bool) -> Result<Located> {
        traverse(store, self, path, follow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use crate::hash::Oid;
    use crate::store::MemoryStore;
    use crate::types::{FileMode, Object, TreeEntry};

    fn blob(store: &MemoryStore, content: &str) -> Oid {
        store
            .write_object(&Object::Blob(content.as_bytes().to_vec()))
            .unwrap()
    }

    /// root/
    ///   bar          file "bar"
    ///   foo/bar      file "foo/bar"
    ///   foo/up       -> ../bar
    ///   foo/deep/x   file "x"
    ///   foo/abs      -> /bar
    ///   self         -> self
    ///   ping         -> pong
    ///   pong         -> ping
    ///   to_foo       -> foo
    fn fixture(store: &MemoryStore) -> Located {
        let deep = store
            .make_tree(vec![TreeEntry::new("x", FileMode::FILE, blob(store, "x"))])
            .unwrap();
        let foo = store
            .make_tree(vec![
                TreeEntry::new("bar", FileMode::FILE, blob(store, "foo/bar")),
                TreeEntry::new("up", FileMode::SYMLINK, blob(store, "../bar")),
                TreeEntry::new("deep", FileMode::DIRECTORY, deep.oid()),
                TreeEntry::new("abs", FileMode::SYMLINK, blob(store, "/bar")),
            ])
            .unwrap();
        let root = store
            .make_tree(vec![
                TreeEntry::new("bar", FileMode::FILE, blob(store, "bar")),
                TreeEntry::new("foo", FileMode::DIRECTORY, foo.oid()),
                TreeEntry::new("self", FileMode::SYMLINK, blob(store, "self")),
                TreeEntry::new("ping", FileMode::SYMLINK, blob(store, "pong")),
                TreeEntry::new("pong", FileMode::SYMLINK, blob(store, "ping")),
                TreeEntry::new("to_foo", FileMode::SYMLINK, blob(store, "foo")),
            ])
            .unwrap();
        Located::root(Entry::Directory(root))
    }

    fn fault(err: Error) -> TraversalFault {
        match err {
            Error::InvalidTraversal { fault, .. } => fault,
            other => panic!("expected traversal error, got {other}"),
        }
    }

    #[test]
    fn test_matches_manual_indexing() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        for path in ["bar", "foo", "foo/bar", "foo/deep", "foo/deep/x"] {
            let mut manual = root.clone();
            for seg in path.split('/') {
                manual = manual.child(&store, seg).unwrap().unwrap();
            }
            let found = traverse(&store, &root, path, true).unwrap();
            assert_eq!(found.entry().oid(), manual.entry().oid(), "{path}");
            assert_eq!(found.path(), path);
        }
    }

    #[test]
    fn test_empty_path_is_root() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        assert_eq!(traverse(&store, &root, "", true).unwrap(), root);
        assert_eq!(traverse(&store, &root, "/./", true).unwrap(), root);
    }

    #[test]
    fn test_noop_segments() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        let plain = traverse(&store, &root, "foo/bar", true).unwrap();
        let noisy = traverse(&store, &root, "./foo//./bar/", true).unwrap();
        assert_eq!(plain, noisy);
    }

    #[test]
    fn test_dot_dot_uses_parent() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        let bar = traverse(&store, &root, "foo/deep/../../bar", true).unwrap();
        assert_eq!(bar.entry().oid(), blob(&store, "bar"));
    }

    #[test]
    fn test_dot_dot_above_root() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        let err = traverse(&store, &root, "..", true).unwrap_err();
        assert_eq!(
            fault(err),
            TraversalFault::NoParent { at: String::new() }
        );
    }

    #[test]
    fn test_missing_segment() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        let err = traverse(&store, &root, "foo/nope/x", true).unwrap_err();
        assert!(err.to_string().contains("doesn't contain an entry named \"nope\""));
        assert_eq!(
            fault(err),
            TraversalFault::Missing {
                at: "foo".into(),
                name: "nope".into()
            }
        );
    }

    #[test]
    fn test_descend_into_file() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        let err = traverse(&store, &root, "bar/x", true).unwrap_err();
        assert!(matches!(fault(err), TraversalFault::NotContainer { .. }));
    }

    #[test]
    fn test_follow_relative_symlink() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        let up = traverse(&store, &root, "foo/up", true).unwrap();
        assert_eq!(up.entry().oid(), blob(&store, "bar"));
        assert_eq!(up.path(), "bar");

        let through = traverse(&store, &root, "to_foo/deep/x", true).unwrap();
        assert_eq!(through.path(), "foo/deep/x");
    }

    #[test]
    fn test_leading_slash_in_target_is_an_empty_segment() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        // "/bar" splices "", "bar" after foo/abs, so it stays in foo
        let found = traverse(&store, &root, "foo/abs", true).unwrap();
        assert_eq!(found.path(), "foo/bar");
        assert_eq!(found.entry().oid(), blob(&store, "foo/bar"));
    }

    #[test]
    fn test_self_symlink_is_cyclic() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        assert!(matches!(
            traverse(&store, &root, "self", true),
            Err(Error::CyclicSymlink { .. })
        ));
    }

    #[test]
    fn test_mutual_symlinks_are_cyclic() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        let err = traverse(&store, &root, "ping", true).unwrap_err();
        let Error::CyclicSymlink { link, .. } = err else {
            panic!("expected cycle, got {err}");
        };
        assert_eq!(link, "ping");
    }

    #[test]
    fn test_same_link_twice_in_sequence() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        let found = traverse(&store, &root, "to_foo/../to_foo/bar", true).unwrap();
        assert_eq!(found.path(), "foo/bar");
    }

    #[test]
    fn test_no_follow_returns_last_symlink() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        let link = traverse(&store, &root, "self", false).unwrap();
        assert!(link.entry().as_symlink().is_some());
        assert_eq!(link.path(), "self");

        // trailing no-op segments don't count as pending
        assert!(traverse(&store, &root, "foo/up/", false).is_ok());
    }

    #[test]
    fn test_no_follow_through_symlink_fails() {
        let store = MemoryStore::new();
        let root = fixture(&store);

        let err = traverse(&store, &root, "to_foo/bar", false).unwrap_err();
        assert_eq!(
            fault(err),
            TraversalFault::UnresolvedSymlink {
                link: "to_foo".into()
            }
        );
    }

    #[test]
    fn test_commit_forwards_to_tree() {
        let store = MemoryStore::new();
        let root = fixture(&store);
        let tree = root.entry().as_directory().unwrap().oid();
        let commit = store
            .make_commit(crate::types::Commit::new(
                tree,
                vec![],
                crate::handle::Handle::fallback(),
                0,
                "init",
            ))
            .unwrap();

        let start = Located::root(Entry::Commit(commit));
        let found = traverse(&store, &start, "foo/bar", true).unwrap();
        assert_eq!(found.entry().oid(), blob(&store, "foo/bar"));
    }
}
