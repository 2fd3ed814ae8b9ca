use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters left as-is in URLs: unreserved characters plus the delimiters
/// that commonly appear in already-formed links.
const URL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b'#')
    .remove(b':')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'?')
    .remove(b'=')
    .remove(b'%')
    .remove(b'@')
    .remove(b'+')
    .remove(b',')
    .remove(b'&')
    .remove(b';');

/// Escape text content. Quotes are left alone; use [`escape_attr`] for attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape an attribute value (double-quoted).
pub fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Percent-encode a URL and escape it for use inside an `href`.
pub fn escape_url(url: &str) -> String {
    let encoded = utf8_percent_encode(url, URL_ENCODE_SET).to_string();
    escape_attr(&encoded)
}

/// Prefix every line that has non-whitespace content. Blank lines are left as they are.
pub fn indent(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if !line.trim().is_empty() {
            out.push_str(prefix);
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_text() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape_html(r#"say "hi""#), r#"say "hi""#);
    }

    #[test]
    fn escapes_attributes() {
        assert_eq!(
            escape_attr(r#"<"it's">"#),
            "&lt;&quot;it&#x27;s&quot;&gt;"
        );
    }

    #[test]
    fn url_keeps_common_delimiters() {
        assert_eq!(
            escape_url("https://example.com/a/b?x=1&y=2#top"),
            "https://example.com/a/b?x=1&amp;y=2#top"
        );
        assert_eq!(escape_url("tg://emoji?id=42"), "tg://emoji?id=42");
    }

    #[test]
    fn url_encodes_unsafe_characters() {
        assert_eq!(
            escape_url("https://example.com/a b\"c"),
            "https://example.com/a%20b%22c"
        );
        assert_eq!(
            escape_url("https://example.com/привет"),
            "https://example.com/%D0%BF%D1%80%D0%B8%D0%B2%D0%B5%D1%82"
        );
        assert_eq!(escape_url("https://example.com/%20"), "https://example.com/%20");
    }

    #[test]
    fn indent_skips_blank_lines() {
        assert_eq!(indent("a\n\nb", "  "), "  a\n\n  b");
        assert_eq!(indent("a\n   \nb", "--"), "--a\n   \n--b");
        assert_eq!(indent("", "  "), "");
    }
}
