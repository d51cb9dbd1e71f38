use std::borrow::Cow;

/// Escapes a string for safe inclusion in HTML text or a quoted attribute value.
///
/// Returns `Cow::Borrowed` when the input contains nothing that needs escaping,
/// so the common case of plain headline text does not allocate.
///
/// # Examples
///
/// ```
/// use newsroll::util::escape_html;
///
/// assert_eq!(escape_html("Plain title"), "Plain title");
/// assert_eq!(escape_html("<b>\"Q&A\"</b>"), "&lt;b&gt;&quot;Q&amp;A&quot;&lt;/b&gt;");
/// ```
pub fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Returns the trimmed value if it has any non-whitespace content.
///
/// Upstream APIs send `""` and `null` interchangeably for missing fields;
/// this folds both into `None`.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_returns_borrowed() {
        let input = "Scientists find water on Mars";
        assert!(matches!(escape_html(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escapes_markup() {
        assert_eq!(
            escape_html("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_escapes_attribute_quotes() {
        assert_eq!(escape_html("a\"b"), "a&quot;b");
    }

    #[test]
    fn test_ampersand_escaped_once() {
        assert_eq!(escape_html("AT&T"), "AT&amp;T");
        assert_eq!(escape_html("&amp;"), "&amp;amp;");
    }

    #[test]
    fn test_unicode_preserved() {
        assert_eq!(escape_html("Notícias <hoje>"), "Notícias &lt;hoje&gt;");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  science ")), Some("science"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
