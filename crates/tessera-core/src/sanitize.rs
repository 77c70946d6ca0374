//! Template markup sanitization.
//!
//! Markup coming from palette templates or code editors is never trusted
//! verbatim. Script elements, inline event-handler attributes and
//! `javascript:` URLs are removed; markup that cannot be scanned as tags is
//! rejected outright so it is never partially trusted.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};
use smol_str::SmolStr;

use crate::error::TreeError;
use crate::node::SnippetKind;

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static SCRIPT_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*/>|<script\b[^>]*>.*?</script\s*>").unwrap()
});

static SCRIPT_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<\s*script\b").unwrap());

static OPEN_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[A-Za-z][^<>]*>").unwrap());

// An attribute starts after whitespace, a `/` or the closing quote of the
// previous value. A quote or slash boundary is captured and put back.
static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:\s+|(["'/]))on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>"']+)"#).unwrap()
});

static SCRIPT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:\s+|(["'/]))(?:href|src|action|formaction|xlink:href)\s*=\s*(?:"\s*(?:(?:java|vb)script:|data:text/html)[^"]*"|'\s*(?:(?:java|vb)script:|data:text/html)[^']*'|(?:(?:java|vb)script:|data:text/html)[^\s>]*)"#,
    )
    .unwrap()
});

static ATTR_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(href|src)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Strip executable content from a markup fragment.
pub fn sanitize_markup(input: &str) -> Result<String, TreeError> {
    let without_comments = COMMENT.replace_all(input, "");
    let without_scripts = SCRIPT_ELEMENT.replace_all(&without_comments, "");
    if SCRIPT_OPEN.is_match(&without_scripts) {
        return Err(TreeError::MalformedTemplate(
            "unterminated <script> element".into(),
        ));
    }
    check_tags_terminated(&without_scripts)?;

    let cleaned = OPEN_TAG.replace_all(&without_scripts, |caps: &Captures<'_>| clean_tag(&caps[0]));

    if cleaned.len() != input.len() {
        tracing::warn!(
            removed = input.len() - cleaned.len(),
            "stripped executable content from template"
        );
    }
    Ok(cleaned.into_owned())
}

/// Strip handlers and script URLs from one open tag. Repeats until stable so
/// a removal cannot splice a new attribute together.
fn clean_tag(tag: &str) -> String {
    let mut current = tag.to_owned();
    loop {
        let pass = EVENT_HANDLER.replace_all(&current, "${1}");
        let pass = SCRIPT_URL.replace_all(&pass, "${1}").into_owned();
        if pass == current {
            return current;
        }
        current = pass;
    }
}

/// Whether a URL would run script when followed.
///
/// Browsers ignore ASCII whitespace and control characters inside the
/// scheme, so they are dropped before comparing.
pub fn is_script_url(value: &str) -> bool {
    let scheme: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    scheme.starts_with("javascript:")
        || scheme.starts_with("vbscript:")
        || scheme.starts_with("data:text/html")
}

/// Drop event-handler keys and script URLs from snippet settings.
pub fn sanitize_attrs(attrs: &IndexMap<SmolStr, String>) -> IndexMap<SmolStr, String> {
    let kept: IndexMap<SmolStr, String> = attrs
        .iter()
        .filter(|(k, v)| !k.to_ascii_lowercase().starts_with("on") && !is_script_url(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if kept.len() != attrs.len() {
        tracing::warn!(removed = attrs.len() - kept.len(), "stripped unsafe snippet settings");
    }
    kept
}

/// Every `<` that starts a tag must be closed by `>` before the next `<`.
fn check_tags_terminated(markup: &str) -> Result<(), TreeError> {
    let bytes = markup.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'<'
            && bytes
                .get(i + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'/' || *b == b'!')
        {
            let rest = &bytes[i + 1..];
            let close = rest.iter().position(|b| *b == b'>');
            let reopen = rest.iter().position(|b| *b == b'<');
            match (close, reopen) {
                (Some(c), Some(r)) if r < c => {
                    return Err(TreeError::MalformedTemplate(format!(
                        "tag at byte {i} is not terminated"
                    )));
                }
                (None, _) => {
                    return Err(TreeError::MalformedTemplate(format!(
                        "tag at byte {i} is not terminated"
                    )));
                }
                (Some(c), _) => i += c + 1,
            }
        }
        i += 1;
    }
    Ok(())
}

/// Guess the snippet subtype of a markup fragment from its first element.
pub fn sniff_snippet_kind(markup: &str) -> SnippetKind {
    let head = markup.trim_start().to_ascii_lowercase();
    let starts = |tag: &str| {
        head.strip_prefix('<')
            .and_then(|rest| rest.strip_prefix(tag))
            .is_some_and(|rest| rest.starts_with([' ', '>', '/', '\n', '\t']))
    };

    if starts("img") || starts("picture") || starts("figure") {
        SnippetKind::Image
    } else if starts("iframe") || starts("video") {
        SnippetKind::Video
    } else if starts("button") || starts("a") {
        SnippetKind::Button
    } else if !head.starts_with('<')
        || ["p", "h1", "h2", "h3", "h4", "h5", "h6", "span", "ul", "ol", "blockquote"]
            .iter()
            .any(|t| starts(*t))
    {
        SnippetKind::Text
    } else {
        SnippetKind::Custom
    }
}

/// First `href` or `src` value in the markup.
pub fn first_link_attr<'a>(markup: &'a str, name: &str) -> Option<&'a str> {
    ATTR_VALUE
        .captures_iter(markup)
        .find(|caps| caps[1].eq_ignore_ascii_case(name))
        .and_then(|caps| caps.get(2).or_else(|| caps.get(3)))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_markup_untouched() {
        let html = r#"<div class="x"><p>Hello <b>there</b></p></div>"#;
        assert_eq!(sanitize_markup(html).unwrap(), html);
    }

    #[test]
    fn test_script_elements_removed() {
        let html = "<p>a</p><script type=\"text/javascript\">if (a<b) go()</script><p>b</p><SCRIPT src=x.js/>";
        assert_eq!(sanitize_markup(html).unwrap(), "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_event_handlers_removed() {
        let html = r#"<img src="a.png" onerror="steal()" alt='x' onload=go>"#;
        assert_eq!(sanitize_markup(html).unwrap(), r#"<img src="a.png" alt='x'>"#);
    }

    #[test]
    fn test_handler_after_quote_or_slash_removed() {
        assert_eq!(
            sanitize_markup(r#"<img src="x"onerror="alert(1)">"#).unwrap(),
            r#"<img src="x">"#
        );
        assert_eq!(
            sanitize_markup("<img/onerror=alert(1) src=x>").unwrap(),
            "<img/ src=x>"
        );
        assert_eq!(
            sanitize_markup(r#"<a href='y'onclick='go()'>y</a>"#).unwrap(),
            "<a href='y'>y</a>"
        );
    }

    #[test]
    fn test_spliced_handler_removed() {
        // removing the first handler leaves the second right after a quote
        assert_eq!(
            sanitize_markup(r#"<img src="x" onx="a"onerror="alert(1)">"#).unwrap(),
            r#"<img src="x">"#
        );
    }

    #[test]
    fn test_script_url_after_quote_removed() {
        assert_eq!(
            sanitize_markup(r#"<a class="b"href="javascript:alert(1)">Go</a>"#).unwrap(),
            r#"<a class="b">Go</a>"#
        );
    }

    #[test]
    fn test_script_url_detection() {
        assert!(is_script_url("javascript:alert(1)"));
        assert!(is_script_url("  JavaScript:void(0)"));
        assert!(is_script_url("java\tscript:alert(1)"));
        assert!(is_script_url("vbscript:msgbox"));
        assert!(is_script_url("data:text/html,<script>x</script>"));
        assert!(!is_script_url("https://example.com/javascript:"));
        assert!(!is_script_url("/about"));
    }

    #[test]
    fn test_unsafe_attrs_dropped() {
        let mut attrs = IndexMap::new();
        attrs.insert(SmolStr::new("href"), "javascript:alert(document.cookie)".to_owned());
        attrs.insert(SmolStr::new("onClick"), "go()".to_owned());
        attrs.insert(SmolStr::new("alt"), "cat".to_owned());
        let kept = sanitize_attrs(&attrs);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.get("alt").map(String::as_str), Some("cat"));
    }

    #[test]
    fn test_text_mentioning_on_is_kept() {
        let html = "<p>turn online=yes</p>";
        assert_eq!(sanitize_markup(html).unwrap(), html);
    }

    #[test]
    fn test_javascript_urls_removed() {
        let html = r#"<a href=" javascript:alert(1)" class="btn">Go</a>"#;
        assert_eq!(sanitize_markup(html).unwrap(), r#"<a class="btn">Go</a>"#);
    }

    #[test]
    fn test_unclosed_script_is_malformed() {
        assert!(matches!(
            sanitize_markup("<p>x</p><script>alert(1)"),
            Err(TreeError::MalformedTemplate(_))
        ));
    }

    #[test]
    fn test_unterminated_tag_is_malformed() {
        assert!(sanitize_markup("<div class=\"a\"<p>").is_err());
        assert!(sanitize_markup("<div").is_err());
        assert!(sanitize_markup("1 < 2 and 3 > 2").is_ok());
    }

    #[test]
    fn test_sniff_snippet_kind() {
        assert_eq!(sniff_snippet_kind("<img src=a>"), SnippetKind::Image);
        assert_eq!(sniff_snippet_kind("  <iframe src=v></iframe>"), SnippetKind::Video);
        assert_eq!(sniff_snippet_kind("<a href=\"/x\">Go</a>"), SnippetKind::Button);
        assert_eq!(sniff_snippet_kind("<p>hi</p>"), SnippetKind::Text);
        assert_eq!(sniff_snippet_kind("plain words"), SnippetKind::Text);
        assert_eq!(sniff_snippet_kind("<article>x</article>"), SnippetKind::Custom);
        assert_eq!(sniff_snippet_kind("<abbr>x</abbr>"), SnippetKind::Custom);
    }

    #[test]
    fn test_first_link_attr() {
        let html = r#"<a class="btn" href='https://example.com'>Go</a>"#;
        assert_eq!(first_link_attr(html, "href"), Some("https://example.com"));
        assert_eq!(first_link_attr(html, "src"), None);
    }
}
