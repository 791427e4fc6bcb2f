//! # Source and Query Parsers
//!
//! Hand-rolled scanners for the two textual inputs: predicate source lines
//! ([`fact`]) and query strings ([`query`]). Both share the same
//! string-aware tokenizing rules: a `"` toggles an in-string flag, a `\`
//! inside a string escapes the next character, and commas inside strings
//! never split.
//!
//! The fact parser is deliberately lenient; anything that does not fully
//! parse as a quoted string rounds-trips as a verbatim atom. Structural
//! validation (predicate names, arity uniformity) happens later, in the
//! query safety layer and the compile pipeline respectively.

pub mod fact;
pub mod query;

pub use fact::parse_fact_line;
pub use query::parse_query;

/// Split an argument list on commas that are outside quoted strings.
///
/// Tokens come back trimmed. An empty or all-whitespace input yields no
/// tokens (arity 0).
pub(crate) fn split_args(input: &str) -> Vec<String> {
    if input.trim().is_empty() {
        return Vec::new();
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
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
        } else if c == '"' {
            in_string = true;
            current.push(c);
        } else if c == ',' {
            tokens.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    tokens.push(current.trim().to_string());

    tokens
}

/// Fully parse a double-quoted token, unescaping `\n \t \r \\ \"`.
///
/// Returns `None` when the token is not a single complete quoted string
/// (unterminated quote, or trailing characters after the closing quote);
/// callers fall back to treating the raw token as an atom. An unrecognized
/// escape keeps the escaped character and drops the backslash.
pub(crate) fn parse_quoted(token: &str) -> Option<String> {
    let mut chars = token.strip_prefix('"')?.chars();
    let mut out = String::new();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                other => out.push(other),
            },
            '"' => {
                return if chars.next().is_none() {
                    Some(out)
                } else {
                    None
                };
            }
            other => out.push(other),
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_args_simple() {
        assert_eq!(split_args("a, b, c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_args_empty_is_arity_zero() {
        assert!(split_args("").is_empty());
        assert!(split_args("   ").is_empty());
    }

    #[test]
    fn test_split_args_comma_inside_string() {
        assert_eq!(
            split_args(r#"x, "a, b", y"#),
            vec!["x", r#""a, b""#, "y"]
        );
    }

    #[test]
    fn test_split_args_escaped_quote_inside_string() {
        assert_eq!(
            split_args(r#""he said \"hi, there\"", z"#),
            vec![r#""he said \"hi, there\"""#, "z"]
        );
    }

    #[test]
    fn test_split_args_trailing_empty_token() {
        assert_eq!(split_args("a,"), vec!["a", ""]);
    }

    #[test]
    fn test_parse_quoted_basic() {
        assert_eq!(parse_quoted(r#""hello""#), Some("hello".to_string()));
    }

    #[test]
    fn test_parse_quoted_escapes() {
        assert_eq!(
            parse_quoted(r#""a\nb\tc\rd\\e\"f""#),
            Some("a\nb\tc\rd\\e\"f".to_string())
        );
    }

    #[test]
    fn test_parse_quoted_unknown_escape_drops_backslash() {
        assert_eq!(parse_quoted(r#""a\xb""#), Some("axb".to_string()));
    }

    #[test]
    fn test_parse_quoted_unterminated() {
        assert_eq!(parse_quoted(r#""never ends"#), None);
        assert_eq!(parse_quoted(r#""dangling escape\"#), None);
    }

    #[test]
    fn test_parse_quoted_trailing_garbage() {
        assert_eq!(parse_quoted(r#""done"junk"#), None);
    }

    #[test]
    fn test_parse_quoted_empty_string() {
        assert_eq!(parse_quoted(r#""""#), Some(String::new()));
    }
}
