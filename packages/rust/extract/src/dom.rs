//! Small DOM helpers shared by the page parsers.

use scraper::{ElementRef, Selector};
use url::Url;

/// Parse a selector literal. Only called with compile-time constants.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e}"))
}

/// First descendant matching `sel`.
pub(crate) fn first<'a>(el: ElementRef<'a>, sel: &Selector) -> Option<ElementRef<'a>> {
    el.select(sel).next()
}

/// Concatenated, trimmed text content.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Trimmed text, `None` when empty.
pub(crate) fn non_empty_text(el: ElementRef<'_>) -> Option<String> {
    Some(text_of(el)).filter(|t| !t.is_empty())
}

/// A non-empty attribute value.
pub(crate) fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Resolve an `href`/`src` against the site origin. Fragments are dropped.
pub(crate) fn resolve(base: &Url, href: &str) -> Option<String> {
    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}
