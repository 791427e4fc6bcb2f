//! Fact Line Parser
//!
//! Parses one line of predicate source into `(name, args)`. Comments (`%`
//! and `#`), blank lines and lines without a `(` yield `None`; everything
//! else parses leniently, with malformed argument tokens surviving as
//! verbatim atoms.

use crate::ast::Arg;

use super::{parse_quoted, split_args};

/// Parse a single source line into a ground fact.
///
/// Accepts the form `name(arg, arg, ...)` with an optional trailing period
/// and arbitrary internal whitespace. Arity 0 (`pred()`) is permitted.
/// Returns `None` for blank lines, comments, and lines with no `(`.
pub fn parse_fact_line(line: &str) -> Option<(String, Vec<Arg>)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('%') || line.starts_with('#') {
        return None;
    }

    let line = line.strip_suffix('.').unwrap_or(line).trim_end();

    let open = line.find('(')?;
    let name = line[..open].trim().to_string();

    let rest = line[open + 1..].trim_end();
    let rest = rest.strip_suffix(')').unwrap_or(rest);

    let args = split_args(rest).into_iter().map(parse_arg).collect();
    Some((name, args))
}

fn parse_arg(token: String) -> Arg {
    if token.starts_with('"') {
        match parse_quoted(&token) {
            Some(content) => Arg::String(content),
            // Unterminated or trailing junk: keep the raw token.
            None => Arg::Atom(token),
        }
    } else {
        Arg::Atom(token)
    }
}
