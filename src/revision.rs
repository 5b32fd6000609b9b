//! revision expressions
//!
//! `<base><suffix>*` where base is a full oid, a ref name (searched as `x`,
//! `refs/x`, `refs/tags/x`, `refs/heads/x`, `refs/remotes/x`,
//! `refs/remotes/x/HEAD`) or a unique hex prefix of at least four chars.
//! suffixes: `^`, `^N` (Nth parent, `^0` is the commit itself), `~`, `~N`
//! (Nth first-parent ancestor), `^{commit}`, `^{tree}`.

use tracing::debug;

use crate::entry::{read_commit, Entry};
use crate::error::{Error, Result};
use crate::hash::Oid;
use crate::refs::{is_valid_ref_name, Ref, RefValue};
use crate::store::Store;

/// shortest accepted abbreviated oid
pub const MIN_PREFIX_LEN: usize = 4;

/// resolve `expr` to an oid
pub fn parse<S: Store + ?Sized>(store: &S, expr: &str) -> Result<Oid> {
    let split = expr.find(['^', '~']).unwrap_or(expr.len());
    let (base, suffixes) = expr.split_at(split);
    if base.is_empty() {
        return Err(Error::BadRevisionSyntax(expr.to_string()));
    }

    let mut oid = resolve_base(store, base)?;
    let mut rest = suffixes;
    while !rest.is_empty() {
        let (step, remaining) = next_suffix(expr, rest)?;
        oid = apply(store, expr, oid, step)?;
        rest = remaining;
    }

    debug!(expr, oid = %oid.short(), "parsed revision");
    Ok(oid)
}

enum Suffix {
    Parent(usize),
    Ancestor(usize),
    PeelCommit,
    PeelTree,
}

fn next_suffix<'a>(expr: &str, rest: &'a str) -> Result<(Suffix, &'a str)> {
    let bad = || Error::BadRevisionSyntax(expr.to_string());

    let mut chars = rest.chars();
    let op = chars.next().ok_or_else(bad)?;
    let tail = chars.as_str();
    if op == '^' {
        if let Some(inner) = tail.strip_prefix('{') {
            let close = inner.find('}').ok_or_else(bad)?;
            let step = match &inner[..close] {
                "commit" => Suffix::PeelCommit,
                "tree" => Suffix::PeelTree,
                _ => return Err(bad()),
            };
            return Ok((step, &inner[close + 1..]));
        }
    } else if op != '~' {
        return Err(bad());
    }

    let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
    let n = if digits == 0 {
        1
    } else {
        tail[..digits].parse().map_err(|_| bad())?
    };
    let step = if op == '^' {
        Suffix::Parent(n)
    } else {
        Suffix::Ancestor(n)
    };
    Ok((step, &tail[digits..]))
}

fn apply<S: Store + ?Sized>(store: &S, expr: &str, oid: Oid, step: Suffix) -> Result<Oid> {
    let unknown = || Error::InvalidReference(expr.to_string());

    match step {
        Suffix::Parent(0) => Ok(read_commit(store, &oid)?.oid()),
        Suffix::Parent(n) => read_commit(store, &oid)?
            .parent_oids()
            .get(n - 1)
            .copied()
            .ok_or_else(unknown),
        Suffix::Ancestor(n) => {
            let mut current = oid;
            for _ in 0..n {
                current = read_commit(store, &current)?
                    .parent_oids()
                    .first()
                    .copied()
                    .ok_or_else(unknown)?;
            }
            Ok(current)
        }
        Suffix::PeelCommit => Ok(read_commit(store, &oid)?.oid()),
        Suffix::PeelTree => match store.read(&oid)? {
            Entry::Commit(c) => Ok(c.tree_oid()),
            Entry::Directory(d) => Ok(d.oid()),
            _ => Err(unknown()),
        },
    }
}

fn resolve_base<S: Store + ?Sized>(store: &S, base: &str) -> Result<Oid> {
    if Oid::is_hex(base) {
        let oid = Oid::from_hex(base)?;
        if store.contains(&oid)? {
            return Ok(oid);
        }
        return Err(Error::InvalidReference(base.to_string()));
    }

    if let Some(oid) = resolve_ref(store, base)? {
        return Ok(oid);
    }

    if base.len() >= MIN_PREFIX_LEN && base.chars().all(|c| c.is_ascii_hexdigit()) {
        let found = store.find_prefix(base)?;
        match found.as_slice() {
            [oid] => return Ok(*oid),
            [] => {}
            many => {
                return Err(Error::AmbiguousReference {
                    prefix: base.to_string(),
                    candidates: many.len(),
                })
            }
        }
    }

    Err(Error::InvalidReference(base.to_string()))
}

/// first existing ref in search order, followed to its oid
fn resolve_ref<S: Store + ?Sized>(store: &S, name: &str) -> Result<Option<Oid>> {
    let candidates = [
        name.to_string(),
        format!("refs/{}", name),
        format!("refs/tags/{}", name),
        format!("refs/heads/{}", name),
        format!("refs/remotes/{}", name),
        format!("refs/remotes/{}/HEAD", name),
    ];

    for candidate in candidates.iter().filter(|c| is_valid_ref_name(c)) {
        let r = Ref::new(store, candidate.as_str())?;
        if !r.exists()? {
            continue;
        }
        // an unborn symbolic target doesn't name anything
        return match r.terminal()?.value()? {
            Some(RefValue::Direct(oid)) => Ok(Some(oid)),
            _ => Err(Error::InvalidReference(name.to_string())),
        };
    }
    Ok(None)
}
