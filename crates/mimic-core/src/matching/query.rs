//! Query string canonicalization.
//!
//! Exact query matching is independent of parameter order: both the Exact
//! pattern of a rule and the query of a live request are reduced to the same
//! canonical form before they are compared or fingerprinted.

/// Separator between `key=value` tokens: `&`, or `;` for queries that use
/// only semicolons.
fn separator(query: &str) -> char {
    if !query.contains('&') && query.contains(';') {
        ';'
    } else {
        '&'
    }
}

/// Sort the tokens of a query string by their raw text.
///
/// Tokens are never decoded or rewritten, so a malformed query still
/// canonicalizes; it just won't equal a well-formed pattern.
pub fn canonicalize(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let sep = separator(query);
    let mut tokens: Vec<&str> = query.split(sep).collect();
    tokens.sort_unstable();

    let mut out = String::with_capacity(query.len());
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(sep);
        }
        out.push_str(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorts_tokens() {
        assert_eq!(canonicalize("b=2&a=1&c=3"), "a=1&b=2&c=3");
        assert_eq!(canonicalize("a=1"), "a=1");
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn test_repeated_keys_sorted_by_value() {
        assert_eq!(canonicalize("tag=z&tag=a&id=1"), "id=1&tag=a&tag=z");
    }

    #[test]
    fn test_tokens_not_decoded() {
        assert_eq!(canonicalize("q=%2F&a=%zz"), "a=%zz&q=%2F");
    }

    #[test]
    fn test_semicolon_separator() {
        assert_eq!(canonicalize("b=2;a=1"), "a=1;b=2");
        // Mixed separators split on '&' only
        assert_eq!(canonicalize("b=2;x=9&a=1"), "a=1&b=2;x=9");
    }

    #[test]
    fn test_empty_tokens_kept() {
        assert_eq!(canonicalize("b=2&&a=1"), "&a=1&b=2");
        assert_eq!(canonicalize(&canonicalize("b=2&&a=1")), "&a=1&b=2");
    }

    #[test]
    fn test_idempotent() {
        for q in ["z=1&y=2&x=3", "a", "b;a", "&&", "k=v&k=v"] {
            let once = canonicalize(q);
            assert_eq!(canonicalize(&once), once);
        }
    }
}
