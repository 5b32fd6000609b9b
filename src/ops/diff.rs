use crate::entry::{join, read_directory, Directory};
use crate::error::Result;
use crate::hash::Oid;
use crate::store::Store;
use crate::types::{ChangeKind, DiffEntry, TreeEntry};

/// compare the trees of two revisions
pub fn diff<S: Store + ?Sized>(store: &S, rev1: &str, rev2: &str) -> Result<Vec<DiffEntry>> {
    let tree1 = store.parse(&format!("{}^{{tree}}", rev1))?;
    let tree2 = store.parse(&format!("{}^{{tree}}", rev2))?;

    diff_trees(store, &tree1, &tree2)
}

/// compare two tree oids, sorted by path
pub fn diff_trees<S: Store + ?Sized>(store: &S, tree1: &Oid, tree2: &Oid) -> Result<Vec<DiffEntry>> {
    let mut changes = Vec::new();
    diff_into(store, tree1, tree2, "", &mut changes)?;
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(changes)
}

fn diff_into<S: Store + ?Sized>(
    store: &S,
    tree1: &Oid,
    tree2: &Oid,
    prefix: &str,
    changes: &mut Vec<DiffEntry>,
) -> Result<()> {
    // identical subtrees can't contain changes
    if tree1 == tree2 {
        return Ok(());
    }

    let t1 = read_directory(store, tree1)?;
    let t2 = read_directory(store, tree2)?;

    // collect all names
    let mut all_names: Vec<&str> = t1
        .entries()
        .iter()
        .map(|e| e.name.as_str())
        .chain(t2.entries().iter().map(|e| e.name.as_str()))
        .collect();
    all_names.sort();
    all_names.dedup();

    for name in all_names {
        let path = join(prefix, name);

        match (t1.get(name), t2.get(name)) {
            (None, Some(added)) => report(store, added, &path, ChangeKind::Added, changes)?,
            (Some(deleted), None) => report(store, deleted, &path, ChangeKind::Deleted, changes)?,
            (Some(e1), Some(e2)) => {
                if e1.mode.is_directory() && e2.mode.is_directory() {
                    diff_into(store, &e1.oid, &e2.oid, &path, changes)?;
                } else if e1.mode != e2.mode {
                    changes.push(DiffEntry {
                        path,
                        kind: ChangeKind::TypeChanged,
                    });
                } else if e1.oid != e2.oid {
                    changes.push(DiffEntry {
                        path,
                        kind: ChangeKind::Modified,
                    });
                }
            }
            (None, None) => {}
        }
    }

    Ok(())
}

/// report an entry and, for directories, everything below it
fn report<S: Store + ?Sized>(
    store: &S,
    entry: &TreeEntry,
    path: &str,
    kind: ChangeKind,
    changes: &mut Vec<DiffEntry>,
) -> Result<()> {
    changes.push(DiffEntry {
        path: path.to_string(),
        kind: kind.clone(),
    });

    if entry.mode.is_directory() {
        let subtree: Directory = read_directory(store, &entry.oid)?;
        for child in subtree.entries() {
            report(store, child, &join(path, &child.name), kind.clone(), changes)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Create, Staged, TreeBuilder};
    use crate::store::{MemoryStore, Repo};
    use tempfile::tempdir;

    fn base(store: &MemoryStore) -> Directory {
        let mut b = TreeBuilder::new();
        b.file("file.txt", "content").unwrap();
        b.path_set(store, "dir/file.txt", Staged::File(b"nested".to_vec()), Create::Yes)
            .unwrap();
        b.build(store).unwrap()
    }

    #[test]
    fn test_diff_no_changes() {
        let store = MemoryStore::new();
        let tree = base(&store);

        assert!(diff_trees(&store, &tree.oid(), &tree.oid())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_diff_added_deleted_modified() {
        let store = MemoryStore::new();
        let old = base(&store);

        let mut b = old.to_builder();
        b.file("file.txt", "changed").unwrap();
        b.file("new.txt", "new").unwrap();
        b.delete(&store, "dir/file.txt").unwrap();
        let new = b.build(&store).unwrap();

        let changes = diff_trees(&store, &old.oid(), &new.oid()).unwrap();
        let rendered: Vec<String> = changes.iter().map(|c| c.to_string()).collect();

        assert_eq!(
            rendered,
            vec!["D dir/file.txt", "M file.txt", "A new.txt"]
        );
    }

    #[test]
    fn test_diff_added_directory_reports_contents() {
        let store = MemoryStore::new();
        let old = base(&store);

        let mut b = old.to_builder();
        b.directory(&store, "newdir", |d| {
            d.file("a.txt", "a")?.file("b.txt", "b")?;
            Ok(())
        })
        .unwrap();
        let new = b.build(&store).unwrap();

        let changes = diff_trees(&store, &old.oid(), &new.oid()).unwrap();

        assert_eq!(changes.len(), 3);
        assert!(changes
            .iter()
            .all(|c| c.kind == ChangeKind::Added && c.path.starts_with("newdir")));
    }

    #[test]
    fn test_diff_type_change() {
        let store = MemoryStore::new();
        let old = base(&store);

        let mut b = old.to_builder();
        b.link("file.txt", "content").unwrap();
        let new = b.build(&store).unwrap();

        let changes = diff_trees(&store, &old.oid(), &new.oid()).unwrap();
        assert_eq!(
            changes,
            vec![DiffEntry {
                path: "file.txt".into(),
                kind: ChangeKind::TypeChanged
            }]
        );
    }

    #[test]
    fn test_diff_revisions_on_disk() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        let main = crate::refs::branch(&repo, "main").unwrap();

        main.commit(|c| {
            c.tree_mut().file("file1.txt", "content1")?;
            Ok(())
        })
        .unwrap();
        main.commit(|c| {
            c.tree_mut().file("file2.txt", "content2")?;
            Ok(())
        })
        .unwrap();

        let changes = diff(&repo, "main~1", "main").unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "file2.txt");
        assert_eq!(changes[0].kind, ChangeKind::Added);
    }
}
