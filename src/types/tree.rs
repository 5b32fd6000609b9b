use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::Oid;

/// git-compatible entry mode
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct FileMode(u32);

impl FileMode {
    pub const DIRECTORY: FileMode = FileMode(0o040000);
    pub const FILE: FileMode = FileMode(0o100644);
    pub const EXECUTABLE: FileMode = FileMode(0o100755);
    pub const SYMLINK: FileMode = FileMode(0o120000);

    /// accept one of the known modes
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            0o040000 | 0o100644 | 0o100755 | 0o120000 => Ok(Self(bits)),
            _ => Err(Error::CorruptObjectMessage(format!(
                "unknown entry mode {:o}",
                bits
            ))),
        }
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_directory(self) -> bool {
        self == Self::DIRECTORY
    }

}

impl TryFrom<u32> for FileMode {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        Self::from_bits(bits)
    }
}

impl From<FileMode> for u32 {
    fn from(mode: FileMode) -> u32 {
        mode.0
    }
}

impl fmt::Debug for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.0)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.0)
    }
}

/// a directory tree - collection of entries sorted by name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// create a new tree, validating and sorting entries
    pub fn new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        for entry in &entries {
            validate_entry_name(&entry.name)?;
        }

        // sort by name (byte-wise)
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        for window in entries.windows(2) {
            if window[0].name == window[1].name {
                return Err(Error::DuplicateEntryName(window[0].name.clone()));
            }
        }

        Ok(Self { entries })
    }

    /// accept a decoded tree only in canonical form
    ///
    /// unlike [`Tree::new`] nothing is re-sorted: a stored tree whose
    /// entries are out of order is corrupt.
    pub(crate) fn check_canonical(self) -> Result<Self> {
        for entry in &self.entries {
            validate_entry_name(&entry.name)?;
        }
        for window in self.entries.windows(2) {
            if window[0].name.as_bytes() >= window[1].name.as_bytes() {
                return Err(Error::CorruptObjectMessage(format!(
                    "tree entries out of order at {:?}",
                    window[1].name
                )));
            }
        }
        Ok(self)
    }

    /// get entries slice
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// look up entry by name
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// is tree empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// validate an entry name
pub(crate) fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidEntryName(format!(
            "name contains '/': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidEntryName(format!(
            "name contains null byte: {}",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", name)));
    }
    Ok(())
}

/// a single (name, mode, oid) entry in a tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub mode: FileMode,
    pub oid: Oid,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, mode: FileMode, oid: Oid) -> Self {
        Self {
            name: name.into(),
            mode,
            oid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> TreeEntry {
        TreeEntry::new(name, FileMode::FILE, Oid::ZERO)
    }

    #[test]
    fn test_tree_empty() {
        let t = Tree::new(vec![]).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn test_tree_sorting() {
        let tree = Tree::new(vec![file("zebra"), file("alpha"), file("beta")]).unwrap();
        let names: Vec<_> = tree.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "zebra"]);
    }

    #[test]
    fn test_tree_get() {
        let tree = Tree::new(vec![file("alpha"), file("beta")]).unwrap();

        assert!(tree.get("alpha").is_some());
        assert!(tree.contains_key("beta"));
        assert!(tree.get("gamma").is_none());
    }

    #[test]
    fn test_tree_rejects_bad_names() {
        assert!(Tree::new(vec![file("")]).is_err());
        assert!(Tree::new(vec![file("foo/bar")]).is_err());
        assert!(Tree::new(vec![file("foo\0bar")]).is_err());
        assert!(Tree::new(vec![file(".")]).is_err());
        assert!(Tree::new(vec![file("..")]).is_err());
    }

    #[test]
    fn test_tree_rejects_duplicates() {
        let result = Tree::new(vec![file("same"), file("same")]);
        assert!(matches!(result, Err(Error::DuplicateEntryName(_))));
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(FileMode::FILE.to_string(), "100644");
        assert_eq!(FileMode::DIRECTORY.to_string(), "040000");
    }

    #[test]
    fn test_mode_from_bits() {
        assert_eq!(FileMode::from_bits(0o100755).unwrap(), FileMode::EXECUTABLE);
        assert!(FileMode::from_bits(0o644).is_err());
    }

    #[test]
    fn test_decoded_mode_is_checked() {
        let mut bytes = Vec::new();
        ciborium::into_writer(&0o644u32, &mut bytes).unwrap();
        assert!(ciborium::from_reader::<FileMode, _>(&bytes[..]).is_err());

        bytes.clear();
        ciborium::into_writer(&FileMode::SYMLINK, &mut bytes).unwrap();
        assert_eq!(
            ciborium::from_reader::<FileMode, _>(&bytes[..]).unwrap(),
            FileMode::SYMLINK
        );
    }

    #[test]
    fn test_check_canonical_rejects_unsorted() {
        let sorted = Tree::new(vec![file("a"), file("b")]).unwrap();
        assert!(sorted.clone().check_canonical().is_ok());

        let unsorted = Tree {
            entries: vec![file("b"), file("a")],
        };
        assert!(matches!(
            unsorted.check_canonical(),
            Err(Error::CorruptObjectMessage(_))
        ));

        let duplicated = Tree {
            entries: vec![file("a"), file("a")],
        };
        assert!(duplicated.check_canonical().is_err());
    }

    #[test]
    fn test_tree_cbor_determinism() {
        let tree1 = Tree::new(vec![file("b"), file("a")]).unwrap();
        let tree2 = Tree::new(vec![file("a"), file("b")]).unwrap();

        let mut bytes1 = Vec::new();
        let mut bytes2 = Vec::new();
        ciborium::into_writer(&tree1, &mut bytes1).unwrap();
        ciborium::into_writer(&tree2, &mut bytes2).unwrap();

        assert_eq!(bytes1, bytes2);
    }
}
