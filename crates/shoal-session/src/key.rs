//! Cache key codec.
//!
//! A key is the three components `(context path, virtual host, id)`, each
//! escaped so it never contains the `_` separator, joined with `_`. Escaped
//! components are unambiguous, so distinct triples never share a key and
//! [`decode`] recovers the exact triple.
//!
//! The encoding is shared by every node in a cluster. Changing it orphans
//! every stored session.

use crate::error::{Error, Result};

const SEPARATOR: char = '_';

/// Build the cache key for a session.
pub fn encode(context_path: &str, virtual_host: &str, id: &str) -> String {
    let mut key = String::with_capacity(context_path.len() + virtual_host.len() + id.len() + 2);
    escape_into(&mut key, context_path);
    key.push(SEPARATOR);
    escape_into(&mut key, virtual_host);
    key.push(SEPARATOR);
    escape_into(&mut key, id);
    key
}

/// Split a cache key back into `(context path, virtual host, id)`.
pub fn decode(key: &str) -> Result<(String, String, String)> {
    let mut parts = key.split(SEPARATOR);
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(context_path), Some(virtual_host), Some(id), None) => Ok((
            unescape(context_path, key)?,
            unescape(virtual_host, key)?,
            unescape(id, key)?,
        )),
        _ => Err(Error::InvalidKey(key.to_string())),
    }
}

fn escape_into(out: &mut String, component: &str) {
    for c in component.chars() {
        match c {
            '%' => out.push_str("%25"),
            '_' => out.push_str("%5F"),
            c => out.push(c),
        }
    }
}

fn unescape(component: &str, key: &str) -> Result<String> {
    let mut out = String::with_capacity(component.len());
    let mut rest = component;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        match rest.get(pos..pos + 3) {
            Some("%25") => out.push('%'),
            Some("%5F") => out.push('_'),
            _ => return Err(Error::InvalidKey(key.to_string())),
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Ok(out)
}
