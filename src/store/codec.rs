//! canonical object encoding
//!
//! every object is encoded as `"<kind> <len>\0" + payload`. blobs carry their
//! raw bytes as payload, trees and commits canonical CBOR. the oid is the
//! SHA-256 of the full encoding, so backends that compress or pack objects
//! still agree on identity.

use crate::error::{Error, Result};
use crate::hash::Oid;
use crate::types::{Object, ObjectKind, Tree};

/// encode an object into its canonical byte form
pub fn encode(object: &Object) -> Result<Vec<u8>> {
    let payload = match object {
        Object::Blob(content) => return Ok(frame(ObjectKind::Blob, content)),
        Object::Tree(tree) => {
            let mut buf = Vec::new();
            ciborium::into_writer(tree, &mut buf)?;
            buf
        }
        Object::Commit(commit) => {
            let mut buf = Vec::new();
            ciborium::into_writer(commit, &mut buf)?;
            buf
        }
    };
    Ok(frame(object.kind(), &payload))
}

/// decode an object from its canonical byte form
pub fn decode(bytes: &[u8]) -> Result<Object> {
    let nul = bytes
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| Error::CorruptObjectMessage("missing object header".to_string()))?;
    let header = std::str::from_utf8(&bytes[..nul])
        .map_err(|_| Error::CorruptObjectMessage("non-utf8 object header".to_string()))?;
    let (tag, len) = header
        .split_once(' ')
        .ok_or_else(|| Error::CorruptObjectMessage(format!("malformed header: {}", header)))?;
    let kind = ObjectKind::from_tag(tag)
        .ok_or_else(|| Error::CorruptObjectMessage(format!("unknown object kind: {}", tag)))?;
    let len: usize = len
        .parse()
        .map_err(|_| Error::CorruptObjectMessage(format!("bad object length: {}", len)))?;

    let payload = &bytes[nul + 1..];
    if payload.len() != len {
        return Err(Error::CorruptObjectMessage(format!(
            "length mismatch: header says {}, payload is {}",
            len,
            payload.len()
        )));
    }

    Ok(match kind {
        ObjectKind::Blob => Object::Blob(payload.to_vec()),
        ObjectKind::Tree => {
            let tree: Tree = ciborium::from_reader(payload)?;
            Object::Tree(tree.check_canonical()?)
        }
        ObjectKind::Commit => Object::Commit(ciborium::from_reader(payload)?),
    })
}

/// compute the oid of an object without storing it
pub fn object_id(object: &Object) -> Result<Oid> {
    Ok(Oid::digest(&encode(object)?))
}

fn frame(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let mut out = format!("{} {}\0", kind, payload.len()).into_bytes();
    out.extend_from_slice(payload);
    out
}
