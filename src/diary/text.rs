//! Plain-text projection of rich-text entry bodies.

const BLOCK_TAGS: &[&str] = &[
    "p", "br", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre",
    "tr", "td", "th",
];

/// Best-effort HTML stripping: tags removed, block tags become spaces,
/// common entities decoded, whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => {
                let tag = &rest[start + 1..start + end];
                if is_block_tag(tag) {
                    out.push(' ');
                }
                rest = &rest[start + end + 1..];
            }
            None => {
                // unterminated tag, drop the remainder
                rest = "";
            }
        }
    }
    out.push_str(rest);

    collapse_whitespace(&decode_entities(&out))
}

fn is_block_tag(tag: &str) -> bool {
    let name: String = tag
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    BLOCK_TAGS.contains(&name.as_str())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        // last, so "&amp;lt;" stays "&lt;"
        .replace("&amp;", "&")
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Canonical body text: derived from HTML when present, else the legacy plain field.
pub fn body_text_from(body_html: Option<&str>, legacy_content: Option<&str>) -> String {
    match body_html.filter(|h| !h.trim().is_empty()) {
        Some(html) => html_to_text(html),
        None => legacy_content.map(collapse_whitespace).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tags_and_collapses() {
        let html = "<p>Saw a <strong>cat</strong></p><p>in the\n park</p>";
        assert_eq!(html_to_text(html), "Saw a cat in the park");
    }

    #[test]
    fn test_line_breaks_become_spaces() {
        assert_eq!(html_to_text("one<br>two<br/>three"), "one two three");
    }

    #[test]
    fn test_inline_tags_do_not_split_words() {
        assert_eq!(html_to_text("ca<em>t</em>"), "cat");
    }

    #[test]
    fn test_decodes_entities() {
        assert_eq!(html_to_text("Tom &amp; Jerry &lt;3&nbsp;!"), "Tom & Jerry <3 !");
        assert_eq!(html_to_text("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_unterminated_tag_dropped() {
        assert_eq!(html_to_text("hello <b"), "hello");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x')</script> & co"),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; co"
        );
    }

    #[test]
    fn test_body_text_prefers_html() {
        assert_eq!(body_text_from(Some("<p>rich</p>"), Some("plain")), "rich");
        assert_eq!(body_text_from(Some("   "), Some("plain  text")), "plain text");
        assert_eq!(body_text_from(None, None), "");
    }
}
