pub mod detail;
pub mod fields;
pub mod index;

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

/// Parse a selector that is fixed at compile time.
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {:?}: {:?}", css, e))
}

/// Collapse every whitespace run (including non-breaking spaces) to a single
/// space and trim.
pub fn scrub(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\s+").unwrap());
    re.replace_all(text, " ").trim().to_string()
}

pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    scrub(&el.text().collect::<String>())
}
