//! Embedded page-payload extraction
//!
//! The top and admin pages embed their bootstrap data as HTML attributes on
//! the `#app-wrapper` element (`data-events`, `data-login-user`,
//! `data-administrator`). The payloads are pulled out by pattern rather than
//! by DOM walk; a page that loses the wrapper or mangles the attribute fails
//! extraction and with it the check.

use std::sync::OnceLock;

use regex::Regex;

fn wrapper_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<[^>]*\bid=["']app-wrapper["'][^>]*>"#).expect("valid wrapper regex")
    })
}

/// Undo the HTML attribute escaping applied to the embedded JSON.
pub fn unescape_attribute(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// The value of `data-<name>` on the app wrapper, unescaped, or `None` when
/// the wrapper or the attribute is missing.
pub fn wrapper_attribute(html: &str, name: &str) -> Option<String> {
    let wrapper = wrapper_regex().find(html)?.as_str();
    let attr = Regex::new(&format!(
        r#"\bdata-{}=(?:"([^"]*)"|'([^']*)')"#,
        regex::escape(name)
    ))
    .expect("valid attribute regex");
    let captures = attr.captures(wrapper)?;
    let raw = captures.get(1).or_else(|| captures.get(2))?.as_str();
    Some(unescape_attribute(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <div id="app-wrapper"
             data-events="[{&quot;id&quot;:1,&quot;title&quot;:&quot;live&quot;}]"
             data-login-user="null">
        </div></body></html>"#;

    #[test]
    fn test_extracts_and_unescapes() {
        let events = wrapper_attribute(PAGE, "events").unwrap();
        assert_eq!(events, r#"[{"id":1,"title":"live"}]"#);
        assert_eq!(wrapper_attribute(PAGE, "login-user").unwrap(), "null");
    }

    #[test]
    fn test_missing_wrapper_or_attribute() {
        assert!(wrapper_attribute("<html></html>", "events").is_none());
        assert!(wrapper_attribute(PAGE, "administrator").is_none());
    }

    #[test]
    fn test_single_quoted_attribute() {
        let page = r#"<div id='app-wrapper' data-events='[1,2]'></div>"#;
        assert_eq!(wrapper_attribute(page, "events").unwrap(), "[1,2]");
    }
}
