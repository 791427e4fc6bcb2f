//! # Typed Fact Encoding
//!
//! Maps an argument list into the two-level key space of the pack store:
//! a fact is stored at `[predicate_name, encoded_args]` with a (possibly
//! empty) value blob.
//!
//! Atoms are inlined into the path segment length-prefixed (`<len>:text`),
//! so they may contain any character including `:`. Strings are offloaded
//! into the value blob through indexed placeholders (`$:<i>`), which keeps
//! the path segment compact and lets patterns over atom-only facts be
//! matched from the path alone.
//!
//! Decoding is the inverse of encoding on well-formed input and total on
//! arbitrary input: bounds violations stop the scan and return the prefix
//! decoded so far, and a placeholder referencing a missing blob entry
//! degrades to a literal atom. Corrupted pack contents therefore produce
//! facts that simply fail to match, never a crash.

use crate::ast::Arg;

/// Upper bound accepted for a length prefix in the path segment.
pub const MAX_ATOM_LEN: usize = 1_000_000;

/// Encode an argument list into `(path_segment, value_blob)`.
pub fn encode_args(args: &[Arg]) -> (String, Vec<u8>) {
    let mut parts = Vec::with_capacity(args.len());
    let mut strings: Vec<&str> = Vec::new();

    for arg in args {
        match arg {
            Arg::Atom(s) => parts.push(format!("{}:{}", s.len(), s)),
            Arg::String(s) => {
                parts.push(format!("$:{}", strings.len()));
                strings.push(s);
            }
        }
    }

    let mut blob = Vec::new();
    for s in &strings {
        blob.extend_from_slice(format!("{}:", s.len()).as_bytes());
        blob.extend_from_slice(s.as_bytes());
    }

    (parts.join(":"), blob)
}

/// Decode a path segment and value blob back into an argument list.
///
/// Never panics; malformed input truncates the result instead.
pub fn decode_args(path: &[u8], blob: &[u8]) -> Vec<Arg> {
    let strings = decode_blob(blob);
    let mut args = Vec::new();
    let mut pos = 0;

    while pos < path.len() {
        if path[pos..].starts_with(b"$:") {
            let start = pos + 2;
            let end = path[start..]
                .iter()
                .position(|&b| b == b':')
                .map_or(path.len(), |i| start + i);
            let raw = String::from_utf8_lossy(&path[start..end]);
            match raw.parse::<usize>() {
                Ok(i) if i < strings.len() => args.push(Arg::String(strings[i].clone())),
                _ => args.push(Arg::Atom(format!("$:{raw}"))),
            }
            pos = end + 1;
        } else {
            let Some(colon) = path[pos..].iter().position(|&b| b == b':').map(|i| pos + i)
            else {
                break;
            };
            let Ok(n) = String::from_utf8_lossy(&path[pos..colon]).parse::<usize>() else {
                break;
            };
            if n > MAX_ATOM_LEN {
                break;
            }
            let start = colon + 1;
            let Some(end) = start.checked_add(n) else {
                break;
            };
            if end > path.len() {
                break;
            }
            args.push(Arg::Atom(
                String::from_utf8_lossy(&path[start..end]).into_owned(),
            ));
            if end < path.len() && path[end] != b':' {
                break;
            }
            pos = end + 1;
        }
    }

    args
}

/// Parse the length-framed string list out of a value blob.
///
/// Records are `<len>:bytes` with no separators between them; a malformed
/// tail truncates the list.
fn decode_blob(blob: &[u8]) -> Vec<String> {
    let mut strings = Vec::new();
    let mut pos = 0;

    while pos < blob.len() {
        let Some(colon) = blob[pos..].iter().position(|&b| b == b':').map(|i| pos + i)
        else {
            break;
        };
        let Ok(n) = String::from_utf8_lossy(&blob[pos..colon]).parse::<usize>() else {
            break;
        };
        let start = colon + 1;
        let Some(end) = start.checked_add(n) else {
            break;
        };
        if end > blob.len() {
            break;
        }
        strings.push(String::from_utf8_lossy(&blob[start..end]).into_owned());
        pos = end;
    }

    strings
}
