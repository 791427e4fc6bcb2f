//! Query Parser
//!
//! Parses a query string into an ordered list of predicate patterns. A
//! parenthesis-depth counter finds the top-level commas separating
//! patterns; inside a pattern's argument list the string-aware comma rule
//! from the fact parser applies.

use crate::ast::{Pattern, Query, Term};

use super::{parse_quoted, split_args};

/// Parse a conjunctive query such as `created(tina_keane, Work), shown_in(Work, E)`.
///
/// Chunks that do not look like a pattern (no `(`) are skipped; a query
/// with zero successfully parsed patterns yields `None`. Variables are
/// collected in first-occurrence order over the parsed pattern list.
pub fn parse_query(input: &str) -> Option<Query> {
    let input = input.trim();
    let input = input.strip_suffix('.').unwrap_or(input).trim_end();

    let mut patterns = Vec::new();
    for chunk in split_top_level(input) {
        if let Some(pattern) = parse_pattern(&chunk) {
            patterns.push(pattern);
        }
    }

    if patterns.is_empty() {
        None
    } else {
        Some(Query::new(patterns))
    }
}

/// Split on commas at parenthesis depth zero, ignoring commas and parens
/// inside quoted strings.
fn split_top_level(input: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            current.push(c);
        } else {
            match c {
                '"' => {
                    in_string = true;
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    // Clamp so malformed extra parens cannot push commas
                    // at the top level below depth zero.
                    depth = (depth - 1).max(0);
                    current.push(c);
                }
                ',' if depth == 0 => {
                    chunks.push(current.trim().to_string());
                    current.clear();
                }
                other => current.push(other),
            }
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        chunks.push(last.to_string());
    }

    chunks
}

fn parse_pattern(chunk: &str) -> Option<Pattern> {
    let chunk = chunk.trim();
    let open = chunk.find('(')?;
    let name = chunk[..open].trim().to_string();

    let rest = chunk[open + 1..].trim_end();
    let rest = rest.strip_suffix(')').unwrap_or(rest);

    let terms = split_args(rest).into_iter().map(classify_term).collect();
    Some(Pattern { name, terms })
}

fn classify_term(token: String) -> Term {
    if token == "_" {
        return Term::Wildcard;
    }
    if token.starts_with('"') {
        return match parse_quoted(&token) {
            Some(content) => Term::String(content),
            // Unterminated quote: fall back to the raw token as an atom.
            None => Term::Atom(token),
        };
    }
    if token.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        return Term::Var(token);
    }
    Term::Atom(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pattern() {
        let query = parse_query("created(tina_keane, Work)").unwrap();
        assert_eq!(query.patterns.len(), 1);
        assert_eq!(query.patterns[0].name, "created");
        assert_eq!(
            query.patterns[0].terms,
            vec![
                Term::Atom("tina_keane".into()),
                Term::Var("Work".into()),
            ]
        );
        assert_eq!(query.variables, vec!["Work"]);
    }

    #[test]
    fn test_conjunction() {
        let query = parse_query("created(tina_keane, Work), shown_in(Work, E)").unwrap();
        assert_eq!(query.patterns.len(), 2);
        assert_eq!(query.patterns[1].name, "shown_in");
        assert_eq!(query.variables, vec!["Work", "E"]);
    }

    #[test]
    fn test_wildcard_and_string_terms() {
        let query = parse_query(r#"keyword(_, "neural networks")"#).unwrap();
        assert_eq!(
            query.patterns[0].terms,
            vec![
                Term::Wildcard,
                Term::String("neural networks".into()),
            ]
        );
        assert!(query.variables.is_empty());
    }

    #[test]
    fn test_string_with_comma_does_not_split_patterns() {
        let query = parse_query(r#"keyword(Doc, "joins, and more")"#).unwrap();
        assert_eq!(query.patterns.len(), 1);
        assert_eq!(
            query.patterns[0].terms[1],
            Term::String("joins, and more".into())
        );
    }

    #[test]
    fn test_underscore_prefixed_name_is_atom() {
        let query = parse_query("p(_x)").unwrap();
        assert_eq!(query.patterns[0].terms, vec![Term::Atom("_x".into())]);
    }

    #[test]
    fn test_unterminated_string_is_raw_atom() {
        let query = parse_query(r#"p("broken)"#).unwrap();
        assert_eq!(
            query.patterns[0].terms,
            vec![Term::Atom(r#""broken"#.into())]
        );
    }

    #[test]
    fn test_garbage_chunks_are_skipped() {
        let query = parse_query("junk, edge(X, Y)").unwrap();
        assert_eq!(query.patterns.len(), 1);
        assert_eq!(query.patterns[0].name, "edge");
    }

    #[test]
    fn test_all_garbage_yields_none() {
        assert!(parse_query("no parens here").is_none());
        assert!(parse_query("").is_none());
    }

    #[test]
    fn test_trailing_period_tolerated() {
        let query = parse_query("edge(X, Y).").unwrap();
        assert_eq!(query.patterns.len(), 1);
        assert_eq!(query.variables, vec!["X", "Y"]);
    }

    #[test]
    fn test_arity_zero_pattern() {
        let query = parse_query("halted()").unwrap();
        assert_eq!(query.patterns[0].arity(), 0);
    }

    #[test]
    fn test_repeated_variable_recorded_once() {
        let query = parse_query("sibling(X, X)").unwrap();
        assert_eq!(query.variables, vec!["X"]);
    }
}
