//! Pattern-based `@import` scanning.
//!
//! The scanner does not parse CSS. It finds `@import` statements with one
//! regex and skips anything that sits inside a `/* ... */` comment. The text
//! itself is never modified here; callers get byte ranges back and splice.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;
use url::Url;

/// One `@import` directive found in a piece of CSS text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    /// The full statement, from `@import` up to and including its `;`.
    pub directive: String,
    /// Byte range of the statement in the scanned text.
    pub range: Range<usize>,
    /// The URL as written, possibly relative.
    pub url: String,
    /// Byte range of the URL in the scanned text.
    pub url_range: Range<usize>,
}

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // A comment alternative comes first so that an `@import` inside a
        // comment is consumed as part of the comment and never reported.
        Regex::new(
            r#"(?s)(?P<comment>/\*.*?\*/)|(?i:@import)\s*(?:(?i:url)\(\s*(?:['"](?P<url_quoted>[^'"]*)['"]|(?P<url_bare>[^'"\s)]+))\s*\)|['"](?P<string>[^'"]*)['"])[^;]*;"#,
        )
        .expect("import regex is valid")
    })
}

/// Every `@import` directive outside comments, in textual order.
pub fn find_imports(css: &str) -> Vec<ImportRecord> {
    import_regex()
        .captures_iter(css)
        .filter(|caps| caps.name("comment").is_none())
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let url = caps
                .name("url_quoted")
                .or_else(|| caps.name("url_bare"))
                .or_else(|| caps.name("string"))?;
            Some(ImportRecord {
                directive: whole.as_str().to_string(),
                range: whole.range(),
                url: url.as_str().to_string(),
                url_range: url.range(),
            })
        })
        .collect()
}

/// True when `css` holds at least one `@import` outside comments.
pub fn has_imports(css: &str) -> bool {
    import_regex()
        .captures_iter(css)
        .any(|caps| caps.name("comment").is_none())
}

/// Replace each range with its text. Ranges must not overlap.
pub fn splice(css: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(css.len());
    let mut cursor = 0;
    for (range, text) in edits {
        out.push_str(&css[cursor..range.start]);
        out.push_str(&text);
        cursor = range.end;
    }
    out.push_str(&css[cursor..]);
    out
}

/// Rewrite the URL of every import directive to its absolute form.
///
/// Needed when fetched text is inlined into a parent: the parent's base no
/// longer applies to the nested directives. URLs that `resolve` rejects are
/// left as written.
pub fn absolutize_imports<F>(css: &str, base: &Url, resolve: F) -> String
where
    F: Fn(&str, &Url) -> Option<Url>,
{
    let edits: Vec<_> = find_imports(css)
        .into_iter()
        .filter_map(|record| {
            let absolute = resolve(&record.url, base)?;
            (absolute.as_str() != record.url).then(|| (record.url_range, absolute.to_string()))
        })
        .collect();

    if edits.is_empty() {
        css.to_string()
    } else {
        splice(css, edits)
    }
}

/// Remove the given directives from `css`, leaving comments alone.
pub fn remove_directives<'a, I>(css: &str, directives: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let directives: Vec<&str> = directives.into_iter().collect();
    let edits: Vec<_> = find_imports(css)
        .into_iter()
        .filter(|record| directives.contains(&record.directive.as_str()))
        .map(|record| (record.range, String::new()))
        .collect();

    if edits.is_empty() {
        css.to_string()
    } else {
        splice(css, edits)
    }
}
