//! Canonical encoding shared by both signing schemes.
//!
//! The services recompute every canonical string byte for byte; any encoding
//! deviation here invalidates the MAC for every request, so the rule set is
//! pinned by tests and must not grow.

use percent_encoding::utf8_percent_encode;
use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

/// AsciiSet for [AWS UriEncode](https://docs.aws.amazon.com/AmazonS3/latest/API/sig-v4-header-based-auth.html)
///
/// - URI encode every byte except the unreserved characters: 'A'-'Z', 'a'-'z', '0'-'9', '-', '.', '_', and '~'.
/// - Keep '/' as is, for path encoding.
pub static URI_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// AsciiSet for [AWS UriEncode](https://docs.aws.amazon.com/AmazonS3/latest/API/sig-v4-header-based-auth.html)
///
/// But used in query.
pub static QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a value the way the services expect it in canonical
/// strings.
///
/// Equivalent to standard form encoding followed by the three AWS fix-ups
/// (`+` -> `%20`, `*` -> `%2A`, `%7E` -> `~`): space encodes to `%20`, `*`
/// encodes to `%2A` and `~` stays literal. With `preserve_path_separator`
/// set, `/` also stays literal so paths keep their segment structure.
pub fn encode(value: &str, preserve_path_separator: bool) -> String {
    let set = if preserve_path_separator {
        &URI_ENCODE_SET
    } else {
        &QUERY_ENCODE_SET
    };
    utf8_percent_encode(value, set).to_string()
}

/// Escape a string for embedding in an XML request body.
///
/// Used by collaborators building XML payloads, never by signing.
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '[' => out.push_str("&#091;"),
            ']' => out.push_str("&#093;"),
            '!' => out.push_str("&#033;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_fixups() {
        // The three AWS substitution rules, and nothing else.
        assert_eq!(encode("a b", false), "a%20b");
        assert_eq!(encode("a+b", false), "a%2Bb");
        assert_eq!(encode("a*b", false), "a%2Ab");
        assert_eq!(encode("a~b", false), "a~b");
    }

    #[test]
    fn test_encode_unreserved_passthrough() {
        let unreserved = "ABCXYZabcxyz0189-._~";
        assert_eq!(encode(unreserved, false), unreserved);
        assert_eq!(encode(unreserved, true), unreserved);
    }

    #[test]
    fn test_encode_reserved() {
        assert_eq!(encode("a/b:c=d&e", false), "a%2Fb%3Ac%3Dd%26e");
        assert_eq!(encode("a/b:c=d&e", true), "a/b%3Ac%3Dd%26e");
    }

    #[test]
    fn test_encode_non_ascii() {
        // UTF-8 bytes are encoded individually.
        assert_eq!(encode("你好", false), "%E4%BD%A0%E5%A5%BD");
        assert_eq!(encode("é", true), "%C3%A9");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"a&<>"[]!z"#),
            "a&amp;&lt;&gt;&quot;&#091;&#093;&#033;z"
        );
        assert_eq!(escape_xml("plain"), "plain");
    }
}
