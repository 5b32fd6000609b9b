use std::fmt;
use std::path::PathBuf;

use crate::hash::Oid;

/// error type for multitree operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("repository not found at {0}")]
    NoRepo(PathBuf),

    #[error("repository already exists at {0}")]
    RepoExists(PathBuf),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("ambiguous reference: {prefix} matches {candidates} objects")]
    AmbiguousReference { prefix: String, candidates: usize },

    #[error("bad revision syntax: {0}")]
    BadRevisionSyntax(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("can't traverse to {path}: {fault}")]
    InvalidTraversal { path: String, fault: TraversalFault },

    #[error("cyclic symlink {link} detected while traversing {path}")]
    CyclicSymlink { path: String, link: String },

    #[error("ref {0} was updated concurrently")]
    ConcurrentRefUpdate(String),

    #[error("lock contention on ref {0}")]
    LockContention(String),

    #[error("not yet implemented: {0}")]
    NotYetImplemented(String),

    #[error("corrupt object: hash mismatch for {0}")]
    CorruptObject(Oid),

    #[error("corrupt object: {0}")]
    CorruptObjectMessage(String),

    #[error("invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("duplicate tree entry name: {0}")]
    DuplicateEntryName(String),

    #[error("unknown handle format: {0}, use either 'user@example.com' or 'User <user@example.com>'")]
    InvalidHandle(String),

    #[error("invalid walk mode: {0}")]
    InvalidWalkMode(String),

    #[error("invalid update strategy: {0}")]
    InvalidStrategy(String),

    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor deserialization error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),
}

impl Error {
    /// true for unknown, ambiguous and unparsable references
    pub fn is_invalid_reference(&self) -> bool {
        matches!(
            self,
            Error::InvalidReference(_)
                | Error::AmbiguousReference { .. }
                | Error::BadRevisionSyntax(_)
        )
    }

    pub(crate) fn traversal(path: impl Into<String>, fault: TraversalFault) -> Self {
        Error::InvalidTraversal {
            path: path.into(),
            fault,
        }
    }
}

/// why a path could not be walked
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraversalFault {
    /// `at` has no entry called `name`
    Missing { at: String, name: String },
    /// `at` has a non-directory entry called `name` in the way
    Occupied { at: String, name: String },
    /// `at` does not support child lookup
    NotContainer { at: String, name: String },
    /// `..` from an entry with no known parent
    NoParent { at: String },
    /// a symlink with segments pending while following is disabled
    UnresolvedSymlink { link: String },
    /// nothing to set or delete
    EmptyPath,
}

impl fmt::Display for TraversalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraversalFault::Missing { at, name } => {
                write!(f, "{} doesn't contain an entry named {:?}", display_at(at), name)
            }
            TraversalFault::Occupied { at, name } => write!(
                f,
                "{} does contain an entry named {:?} which is not a directory",
                display_at(at),
                name
            ),
            TraversalFault::NotContainer { at, name } => write!(
                f,
                "{} doesn't contain an entry named {:?} since it is not a directory",
                display_at(at),
                name
            ),
            TraversalFault::NoParent { at } => write!(
                f,
                "can't traverse to parent of {} since its location is unknown",
                display_at(at)
            ),
            TraversalFault::UnresolvedSymlink { link } => {
                write!(f, "can't descend through symlink {} without following it", link)
            }
            TraversalFault::EmptyPath => write!(f, "empty path"),
        }
    }
}

fn display_at(at: &str) -> &str {
    if at.is_empty() {
        "<root>"
    } else {
        at
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
