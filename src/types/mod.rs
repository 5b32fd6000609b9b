mod commit;
mod diff;
mod object;
mod tree;

pub use commit::{now, Commit};
pub use diff::{ChangeKind, DiffEntry};
pub use object::{Object, ObjectKind};
pub use tree::{FileMode, Tree, TreeEntry};

pub(crate) use tree::validate_entry_name;
