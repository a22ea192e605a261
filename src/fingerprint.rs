//! Form fingerprints used to drop duplicate forms from the corpus.
//!
//! A fingerprint is the form's pretty serialization with blank lines removed
//! and every line trimmed. Letter case of tag and attribute names and
//! insignificant whitespace collapse; attribute values and text do not.

use crate::html::{HtmlElement, parse_form};
use crate::types::Fingerprint;

/// Fingerprint of `form`; with `only_visible`, hidden inputs are ignored.
pub fn fingerprint(form: &HtmlElement, only_visible: bool) -> Fingerprint {
    let serialized = if only_visible {
        form.pruned(&|el| !el.is_hidden_input()).to_pretty_html()
    } else {
        form.to_pretty_html()
    };
    serialized
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fingerprint of the first form in an HTML snippet.
pub fn fingerprint_html(html: &str, only_visible: bool) -> Option<Fingerprint> {
    parse_form(html).map(|form| fingerprint(&form, only_visible))
}
