//! named pointers and their update protocol
//!
//! a ref is absent, points directly at a commit or tree, or points at another
//! ref by name. the value is read fresh from the store on every access.
//! [`Ref::update`] moves a ref under one of three [`UpdateStrategy`]s:
//!
//! - optimistic: read, compute, compare-and-swap; losing the race is
//!   [`Error::ConcurrentRefUpdate`] and nothing is written
//! - pessimistic: hold the ref lock across read, compute and write; other
//!   writers fail with [`Error::LockContention`] meanwhile
//! - reckless: read, compute, overwrite
//!
//! retrying is up to the caller.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::builder::CommitBuilder;
use crate::entry::{CommitEntry, Directory, Entry};
use crate::error::{Error, Result};
use crate::hash::Oid;
use crate::store::Store;

/// symbolic chains longer than this are treated as loops
const MAX_SYMBOLIC_DEPTH: usize = 10;

/// check that `name` is usable as a ref name
pub fn validate_ref_name(name: &str) -> Result<()> {
    if is_valid_ref_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidRefName(name.to_string()))
    }
}

/// `HEAD`-style pseudo refs or names under `refs/`
pub fn is_valid_ref_name(name: &str) -> bool {
    if name.is_empty()
        || name.contains('\0')
        || name.starts_with('/')
        || name.ends_with('/')
        || name.contains("//")
    {
        return false;
    }
    if is_pseudo_ref(name) {
        return true;
    }
    match name.strip_prefix("refs/") {
        Some(rest) if !rest.is_empty() => name.split('/').all(|c| c != "." && c != ".."),
        _ => false,
    }
}

/// HEAD, FETCH_HEAD and friends
pub(crate) fn is_pseudo_ref(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c == '_')
}

/// what a ref stores
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RefValue {
    /// a commit or tree
    Direct(Oid),
    /// the name of another ref
    Symbolic(String),
}

impl RefValue {
    /// git style text form: `<hex>` or `ref: <name>`
    pub fn to_text(&self) -> String {
        match self {
            RefValue::Direct(oid) => oid.to_hex(),
            RefValue::Symbolic(name) => format!("ref: {}", name),
        }
    }

    /// parse the text form, without the trailing newline
    pub fn parse_text(text: &str) -> Result<Self> {
        if let Some(name) = text.strip_prefix("ref: ") {
            let name = name.trim();
            if !is_valid_ref_name(name) {
                return Err(Error::CorruptObjectMessage(format!(
                    "symbolic ref points at invalid name: {}",
                    name
                )));
            }
            return Ok(RefValue::Symbolic(name.to_string()));
        }
        Oid::from_hex(text)
            .map(RefValue::Direct)
            .map_err(|_| Error::CorruptObjectMessage(format!("bad ref content: {:?}", text)))
    }

    /// direct value for a commit or directory entry
    pub fn from_entry(entry: &Entry) -> Result<Self> {
        match entry {
            Entry::Commit(c) => Ok(c.into()),
            Entry::Directory(d) => Ok(d.into()),
            other => Err(Error::InvalidObjectType {
                expected: "commit or tree",
                found: other.type_name(),
            }),
        }
    }

    /// reject symbolic values naming an invalid ref
    pub fn validate(&self) -> Result<()> {
        match self {
            RefValue::Direct(_) => Ok(()),
            RefValue::Symbolic(name) => validate_ref_name(name),
        }
    }

    pub fn as_oid(&self) -> Option<Oid> {
        match self {
            RefValue::Direct(oid) => Some(*oid),
            RefValue::Symbolic(_) => None,
        }
    }
}

impl fmt::Display for RefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&CommitEntry> for RefValue {
    fn from(commit: &CommitEntry) -> Self {
        RefValue::Direct(commit.oid())
    }
}

impl From<&Directory> for RefValue {
    fn from(dir: &Directory) -> Self {
        RefValue::Direct(dir.oid())
    }
}

impl<S: Store + ?Sized> From<&Ref<'_, S>> for RefValue {
    fn from(r: &Ref<'_, S>) -> Self {
        RefValue::Symbolic(r.name.clone())
    }
}

/// how [`Ref::update`] guards against concurrent writers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateStrategy {
    #[default]
    Optimistic,
    Pessimistic,
    Reckless,
}

impl FromStr for UpdateStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "optimistic" => Ok(UpdateStrategy::Optimistic),
            "pessimistic" => Ok(UpdateStrategy::Pessimistic),
            "reckless" => Ok(UpdateStrategy::Reckless),
            other => Err(Error::InvalidStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdateStrategy::Optimistic => "optimistic",
            UpdateStrategy::Pessimistic => "pessimistic",
            UpdateStrategy::Reckless => "reckless",
        })
    }
}

/// what a ref currently points at
pub enum Target<'s, S: Store + ?Sized> {
    Object(Entry),
    Ref(Ref<'s, S>),
}

impl<S: Store + ?Sized> Target<'_, S> {
    pub fn as_object(&self) -> Option<&Entry> {
        match self {
            Target::Object(entry) => Some(entry),
            Target::Ref(_) => None,
        }
    }

    pub fn as_commit(&self) -> Option<&CommitEntry> {
        self.as_object().and_then(Entry::as_commit)
    }

    /// the value that would make another ref point here
    pub fn to_value(&self) -> Result<RefValue> {
        match self {
            Target::Object(entry) => RefValue::from_entry(entry),
            Target::Ref(r) => Ok(r.into()),
        }
    }
}

impl<S: Store + ?Sized> Clone for Target<'_, S> {
    fn clone(&self) -> Self {
        match self {
            Target::Object(entry) => Target::Object(entry.clone()),
            Target::Ref(r) => Target::Ref(r.clone()),
        }
    }
}

impl<S: Store + ?Sized> fmt::Debug for Target<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Object(entry) => f.debug_tuple("Object").field(entry).finish(),
            Target::Ref(r) => f.debug_tuple("Ref").field(r).finish(),
        }
    }
}

/// a named pointer in a store
pub struct Ref<'s, S: Store + ?Sized> {
    store: &'s S,
    name: String,
}

impl<'s, S: Store + ?Sized> Ref<'s, S> {
    pub fn new(store: &'s S, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_ref_name(&name)?;
        Ok(Self { store, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// name without the `refs/heads/`, `refs/tags/` or `refs/remotes/` prefix
    pub fn short_name(&self) -> &str {
        ["refs/heads/", "refs/tags/", "refs/remotes/"]
            .iter()
            .find_map(|prefix| self.name.strip_prefix(prefix))
            .unwrap_or(&self.name)
    }

    /// stored value, `None` when absent
    pub fn value(&self) -> Result<Option<RefValue>> {
        self.store.ref_read(&self.name)
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.value()?.is_some())
    }

    pub fn is_symbolic(&self) -> Result<bool> {
        Ok(matches!(self.value()?, Some(RefValue::Symbolic(_))))
    }

    /// current target; a symbolic ref yields the ref it names
    pub fn read(&self) -> Result<Option<Target<'s, S>>> {
        self.target_of(self.value()?)
    }

    /// the last ref of a symbolic chain
    pub fn terminal(&self) -> Result<Ref<'s, S>> {
        let mut current = self.clone();
        for _ in 0..MAX_SYMBOLIC_DEPTH {
            match current.value()? {
                Some(RefValue::Symbolic(name)) => current = Ref::new(self.store, name)?,
                _ => return Ok(current),
            }
        }
        Err(Error::InvalidReference(format!(
            "symbolic ref chain from {} is too deep",
            self.name
        )))
    }

    /// follow symbolic refs down to an object
    pub fn resolve(&self) -> Result<Option<Entry>> {
        match self.terminal()?.read()? {
            Some(Target::Object(entry)) => Ok(Some(entry)),
            _ => Ok(None),
        }
    }

    /// move the ref to whatever `f` returns for the current target
    ///
    /// `None` from `f` deletes the ref. returns the new target, `None`
    /// after a delete.
    pub fn update<F>(&self, strategy: UpdateStrategy, f: F) -> Result<Option<Target<'s, S>>>
    where
        F: FnOnce(Option<&Target<'s, S>>) -> Result<Option<RefValue>>,
    {
        match strategy {
            UpdateStrategy::Optimistic => self.update_optimistic(f),
            UpdateStrategy::Pessimistic => self.update_pessimistic(f),
            UpdateStrategy::Reckless => self.update_reckless(f),
        }
    }

    /// compare-and-swap against the value read before calling `f`
    pub fn update_optimistic<F>(&self, f: F) -> Result<Option<Target<'s, S>>>
    where
        F: FnOnce(Option<&Target<'s, S>>) -> Result<Option<RefValue>>,
    {
        let old = self.value()?;
        let current = self.target_of(old.clone())?;
        let new = f(current.as_ref())?;
        let target = self.new_target(new.as_ref())?;

        if !self.store.ref_cas(&self.name, old.as_ref(), new.as_ref())? {
            warn!(name = %self.name, "ref changed since it was read");
            return Err(Error::ConcurrentRefUpdate(self.name.clone()));
        }
        self.log_update(UpdateStrategy::Optimistic, old.as_ref(), new.as_ref());
        Ok(target)
    }

    /// hold the ref lock while `f` runs
    pub fn update_pessimistic<F>(&self, f: F) -> Result<Option<Target<'s, S>>>
    where
        F: FnOnce(Option<&Target<'s, S>>) -> Result<Option<RefValue>>,
    {
        let lock = self.store.ref_lock(&self.name)?;
        let old = self.value()?;
        let current = self.target_of(old.clone())?;
        let new = f(current.as_ref())?;
        let target = self.new_target(new.as_ref())?;

        self.store.ref_write_locked(&lock, new.as_ref())?;
        drop(lock);
        self.log_update(UpdateStrategy::Pessimistic, old.as_ref(), new.as_ref());
        Ok(target)
    }

    /// overwrite regardless of concurrent changes
    pub fn update_reckless<F>(&self, f: F) -> Result<Option<Target<'s, S>>>
    where
        F: FnOnce(Option<&Target<'s, S>>) -> Result<Option<RefValue>>,
    {
        let old = self.value()?;
        let current = self.target_of(old.clone())?;
        let new = f(current.as_ref())?;
        let target = self.new_target(new.as_ref())?;

        self.store.ref_write_unconditional(&self.name, new.as_ref())?;
        self.log_update(UpdateStrategy::Reckless, old.as_ref(), new.as_ref());
        Ok(target)
    }

    /// point the ref at `value`, or delete it
    pub fn set(
        &self,
        strategy: UpdateStrategy,
        value: Option<RefValue>,
    ) -> Result<Option<Target<'s, S>>> {
        self.update(strategy, |_| Ok(value))
    }

    pub fn delete(&self, strategy: UpdateStrategy) -> Result<()> {
        self.set(strategy, None).map(|_| ())
    }

    /// commit on top of the current target and move the ref there
    ///
    /// symbolic refs move the ref at the end of their chain. an absent ref
    /// gets a root commit, a tree target a root commit starting from that
    /// tree.
    pub fn commit<F>(&self, edit: F) -> Result<CommitEntry>
    where
        F: FnOnce(&mut CommitBuilder) -> Result<()>,
    {
        let target = self.terminal()?;
        let store = self.store;
        let mut made = None;

        target.update_optimistic(|current| {
            let mut builder = match current.and_then(Target::as_object) {
                None => CommitBuilder::new(),
                Some(Entry::Commit(parent)) => CommitBuilder::child_of(store, parent)?,
                Some(Entry::Directory(tree)) => CommitBuilder::on_tree(tree),
                Some(other) => {
                    return Err(Error::InvalidObjectType {
                        expected: "commit or tree",
                        found: other.type_name(),
                    })
                }
            };
            edit(&mut builder)?;
            let commit = builder.build(store)?;
            let value = RefValue::from(&commit);
            made = Some(commit);
            Ok(Some(value))
        })?;

        made.ok_or_else(|| Error::InvalidReference(target.name))
    }

    fn target_of(&self, value: Option<RefValue>) -> Result<Option<Target<'s, S>>> {
        match value {
            None => Ok(None),
            Some(RefValue::Direct(oid)) => Ok(Some(Target::Object(self.store.read(&oid)?))),
            Some(RefValue::Symbolic(name)) => Ok(Some(Target::Ref(Ref::new(self.store, name)?))),
        }
    }

    /// resolve a value about to be written; it must name a commit, a tree
    /// or a valid ref
    fn new_target(&self, value: Option<&RefValue>) -> Result<Option<Target<'s, S>>> {
        match value {
            None => Ok(None),
            Some(RefValue::Direct(oid)) => {
                let entry = self.store.read(oid)?;
                if !matches!(entry, Entry::Commit(_) | Entry::Directory(_)) {
                    return Err(Error::InvalidObjectType {
                        expected: "commit or tree",
                        found: entry.type_name(),
                    });
                }
                Ok(Some(Target::Object(entry)))
            }
            Some(RefValue::Symbolic(name)) => Ok(Some(Target::Ref(Ref::new(self.store, name.clone())?))),
        }
    }

    fn log_update(&self, strategy: UpdateStrategy, old: Option<&RefValue>, new: Option<&RefValue>) {
        debug!(
            name = %self.name,
            %strategy,
            old = %old.map(RefValue::to_text).unwrap_or_default(),
            new = %new.map(RefValue::to_text).unwrap_or_default(),
            "updated ref"
        );
    }
}

impl<S: Store + ?Sized> Clone for Ref<'_, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            name: self.name.clone(),
        }
    }
}

impl<S: Store + ?Sized> fmt::Debug for Ref<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref").field("name", &self.name).finish()
    }
}

impl<S: Store + ?Sized> PartialEq for Ref<'_, S> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<S: Store + ?Sized> fmt::Display for Ref<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// the `HEAD` ref
pub fn head<S: Store + ?Sized>(store: &S) -> Result<Ref<'_, S>> {
    Ref::new(store, "HEAD")
}

/// a local branch, or a remote one when the name has a `/` (`origin/main`)
pub fn branch<'s, S: Store + ?Sized>(store: &'s S, name: &str) -> Result<Ref<'s, S>> {
    if name.contains('/') {
        Ref::new(store, format!("refs/remotes/{}", name))
    } else {
        Ref::new(store, format!("refs/heads/{}", name))
    }
}

pub fn tag<'s, S: Store + ?Sized>(store: &'s S, name: &str) -> Result<Ref<'s, S>> {
    Ref::new(store, format!("refs/tags/{}", name))
}

/// which branches [`branches`] lists
#[derive(Clone, Debug, Default)]
pub enum BranchFilter {
    #[default]
    All,
    Local,
    Remote,
    /// glob against the short name, e.g. `origin/*`
    Matching(glob::Pattern),
}

impl BranchFilter {
    pub fn matching(pattern: &str) -> Result<Self> {
        glob::Pattern::new(pattern)
            .map(BranchFilter::Matching)
            .map_err(|e| Error::InvalidRefName(format!("{}: {}", pattern, e)))
    }
}

/// list branches, local ones first, each group sorted by name
pub fn branches<'s, S: Store + ?Sized>(
    store: &'s S,
    filter: &BranchFilter,
) -> Result<Vec<Ref<'s, S>>> {
    let mut names = Vec::new();
    if !matches!(filter, BranchFilter::Remote) {
        names.extend(store.list_refs("refs/heads/")?);
    }
    if !matches!(filter, BranchFilter::Local) {
        names.extend(store.list_refs("refs/remotes/")?);
    }

    let refs = names
        .into_iter()
        .map(|name| Ref::new(store, name))
        .collect::<Result<Vec<_>>>()?;

    Ok(match filter {
        BranchFilter::Matching(pattern) => refs
            .into_iter()
            .filter(|r| pattern.matches(r.short_name()))
            .collect(),
        _ => refs,
    })
}

/// list tags sorted by name
pub fn tags<S: Store + ?Sized>(store: &S) -> Result<Vec<Ref<'_, S>>> {
    store
        .list_refs("refs/tags/")?
        .into_iter()
        .map(|name| Ref::new(store, name))
        .collect()
}
