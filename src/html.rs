//! Owned HTML form trees and the DOM queries used by storage and features.
//!
//! Pages are parsed with `scraper`; every `<form>` is copied into an owned
//! [`HtmlElement`] tree so annotations can be shared across threads and
//! outlive the parsed document.

use std::collections::HashSet;
use std::fmt::Write as _;

use scraper::{ElementRef, Html, Node};

use crate::text::{normalize_inline_whitespace, normalize_whitespaces};
use crate::types::FieldName;

/// Elements that never carry children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Tags kept by [`cleaned_form_html`].
const CLEANED_FORM_TAGS: &[&str] = &[
    "form", "input", "textarea", "label", "option", "select", "a", "button",
];

/// Tags whose subtree is dropped entirely by [`cleaned_form_html`].
const STRIPPED_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

const FIELD_TAGS: &[&str] = &["textarea", "select", "button"];

/// A node of an owned HTML tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HtmlNode {
    /// Element with attributes and children.
    Element(HtmlElement),
    /// Raw text run.
    Text(String),
}

/// An owned HTML element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HtmlElement {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<HtmlNode>,
}

impl HtmlElement {
    /// Attribute value by (case-insensitive) name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, or the empty string when absent.
    pub fn attr_or_empty(&self, name: &str) -> &str {
        self.attr(name).unwrap_or("")
    }

    /// Non-empty `name` attribute.
    pub fn name(&self) -> Option<&str> {
        self.attr("name").filter(|name| !name.is_empty())
    }

    /// Lowercased `type` attribute, defaulting to `text`.
    pub fn input_type(&self) -> String {
        self.attr("type")
            .map(|kind| kind.trim().to_lowercase())
            .unwrap_or_else(|| "text".to_string())
    }

    /// Whether this is an `<input type=hidden>` (any letter case).
    pub fn is_hidden_input(&self) -> bool {
        self.tag == "input"
            && self
                .attr("type")
                .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("hidden"))
    }

    /// Descendant elements in document order (pre-order), excluding `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack = Vec::new();
        push_child_elements(&mut stack, self);
        Descendants { stack }
    }

    /// Descendant elements with the given tag.
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a HtmlElement> + 'a {
        self.descendants().filter(move |el| el.tag == tag)
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Copy of this tree without the descendant elements rejected by `keep`.
    pub fn pruned(&self, keep: &dyn Fn(&HtmlElement) -> bool) -> HtmlElement {
        let children = self
            .children
            .iter()
            .filter_map(|child| match child {
                HtmlNode::Element(el) if keep(el) => Some(HtmlNode::Element(el.pruned(keep))),
                HtmlNode::Element(_) => None,
                HtmlNode::Text(text) => Some(HtmlNode::Text(text.clone())),
            })
            .collect();
        HtmlElement {
            tag: self.tag.clone(),
            attrs: self.attrs.clone(),
            children,
        }
    }

    /// Stable pretty serialization: one tag or text run per line, attributes
    /// sorted by name, text runs whitespace-collapsed, nesting indented by two
    /// spaces.
    pub fn to_pretty_html(&self) -> String {
        let mut out = String::new();
        write_pretty(self, 0, &mut out);
        out
    }
}

/// Pre-order iterator over descendant elements.
pub struct Descendants<'a> {
    stack: Vec<&'a HtmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a HtmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        push_child_elements(&mut self.stack, next);
        Some(next)
    }
}

fn push_child_elements<'a>(stack: &mut Vec<&'a HtmlElement>, el: &'a HtmlElement) {
    for child in el.children.iter().rev() {
        if let HtmlNode::Element(child) = child {
            stack.push(child);
        }
    }
}

fn collect_text(el: &HtmlElement, out: &mut String) {
    for child in &el.children {
        match child {
            HtmlNode::Text(text) => out.push_str(text),
            HtmlNode::Element(child) => collect_text(child, out),
        }
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn write_pretty(el: &HtmlElement, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let mut attrs: Vec<(String, &str)> = el
        .attrs
        .iter()
        .map(|(key, value)| (key.to_lowercase(), value.as_str()))
        .collect();
    attrs.sort();
    let _ = write!(out, "{indent}<{}", el.tag);
    for (key, value) in attrs {
        let _ = write!(out, " {key}=\"{}\"", escape_attr(value));
    }
    out.push_str(">\n");
    if VOID_ELEMENTS.contains(&el.tag.as_str()) {
        return;
    }
    for child in &el.children {
        match child {
            HtmlNode::Element(child) => write_pretty(child, depth + 1, out),
            HtmlNode::Text(text) => {
                let text = normalize_inline_whitespace(text);
                if !text.is_empty() {
                    let _ = writeln!(out, "{indent}  {}", escape_text(&text));
                }
            }
        }
    }
    let _ = writeln!(out, "{indent}</{}>", el.tag);
}

fn convert_element(element: ElementRef<'_>) -> HtmlElement {
    let value = element.value();
    let attrs = value
        .attrs()
        .map(|(key, val)| (key.to_lowercase(), val.to_string()))
        .collect();
    let children = element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => {
                let content: &str = text;
                Some(HtmlNode::Text(content.to_string()))
            }
            Node::Element(_) => ElementRef::wrap(child).map(|el| HtmlNode::Element(convert_element(el))),
            _ => None,
        })
        .collect();
    HtmlElement {
        tag: value.name().to_lowercase(),
        attrs,
        children,
    }
}

/// All `<form>` elements of a page, in document order.
pub fn parse_forms(html: &str) -> Vec<HtmlElement> {
    let document = Html::parse_document(html);
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name().eq_ignore_ascii_case("form"))
        .map(convert_element)
        .collect()
}

/// Parse a single form from an HTML snippet; `None` when the snippet has no form.
pub fn parse_form(html: &str) -> Option<HtmlElement> {
    parse_forms(html).into_iter().next()
}

/// Visible form fields (the ones users fill in), in document order.
pub fn visible_fields(form: &HtmlElement) -> Vec<&HtmlElement> {
    form.descendants()
        .filter(|el| {
            FIELD_TAGS.contains(&el.tag.as_str()) || (el.tag == "input" && !el.is_hidden_input())
        })
        .collect()
}

/// Visible fields that carry a non-empty `name`.
pub fn fields_to_annotate(form: &HtmlElement) -> Vec<&HtmlElement> {
    visible_fields(form)
        .into_iter()
        .filter(|el| el.name().is_some())
        .collect()
}

/// Unique non-empty field names in first-occurrence order.
pub fn field_names(fields: &[&HtmlElement]) -> Vec<FieldName> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for field in fields {
        if let Some(name) = field.name() {
            if seen.insert(name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

struct TextAround<'f> {
    fields: &'f [&'f HtmlElement],
    buffer: Vec<String>,
    before: Vec<String>,
}

impl TextAround<'_> {
    fn flush(&mut self) -> String {
        let joined = self
            .buffer
            .iter()
            .map(|run| normalize_whitespaces(run.trim()))
            .filter(|run| !run.is_empty())
            .collect::<Vec<_>>()
            .join("  ");
        self.buffer.clear();
        joined
    }

    fn visit(&mut self, el: &HtmlElement) {
        for child in &el.children {
            match child {
                HtmlNode::Text(text) => self.buffer.push(text.clone()),
                HtmlNode::Element(child) => {
                    if let Some(pos) = self.fields.iter().position(|f| std::ptr::eq(*f, child)) {
                        self.before[pos] = self.flush();
                    } else {
                        self.visit(child);
                    }
                }
            }
        }
    }
}

/// Text surrounding each field: `(before, after)`, one entry per field.
///
/// Text runs are collected in document order; the runs between two fields
/// become the "after" text of the first and the "before" text of the second.
/// The contents of the fields themselves are skipped. `fields` must be
/// references into `form`.
pub fn text_around_fields(form: &HtmlElement, fields: &[&HtmlElement]) -> (Vec<String>, Vec<String>) {
    if fields.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let mut walker = TextAround {
        fields,
        buffer: Vec::new(),
        before: vec![String::new(); fields.len()],
    };
    walker.visit(form);
    let trailing = walker.flush();
    let before = walker.before;
    let mut after: Vec<String> = before.iter().skip(1).cloned().collect();
    after.push(trailing);
    (before, after)
}

/// The `<label>` describing `field`: a `<label for=...>` matching the field
/// id inside `form`, or else the nearest enclosing `<label>`.
pub fn label_for<'a>(form: &'a HtmlElement, field: &HtmlElement) -> Option<&'a HtmlElement> {
    if let Some(id) = field.attr("id").filter(|id| !id.is_empty()) {
        let by_id = form
            .find_all("label")
            .find(|label| label.attr("for") == Some(id));
        if by_id.is_some() {
            return by_id;
        }
    }
    let path = path_to(form, field)?;
    path.into_iter().rev().find(|el| el.tag == "label")
}

fn path_to<'a>(root: &'a HtmlElement, target: &HtmlElement) -> Option<Vec<&'a HtmlElement>> {
    for child in &root.children {
        if let HtmlNode::Element(child) = child {
            if std::ptr::eq(child, target) {
                return Some(vec![root]);
            }
            if let Some(mut path) = path_to(child, target) {
                path.insert(0, root);
                return Some(path);
            }
        }
    }
    None
}

/// Human-readable form source restricted to form-related tags.
///
/// Script-like subtrees are removed, other tags are unwrapped (their children
/// kept), and blank lines are dropped.
pub fn cleaned_form_html(form: &HtmlElement) -> String {
    let cleaned = HtmlElement {
        tag: form.tag.clone(),
        attrs: form.attrs.clone(),
        children: cleaned_children(&form.children),
    };
    cleaned
        .to_pretty_html()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn cleaned_children(children: &[HtmlNode]) -> Vec<HtmlNode> {
    let mut out = Vec::new();
    for child in children {
        match child {
            HtmlNode::Text(text) => out.push(HtmlNode::Text(text.clone())),
            HtmlNode::Element(el) if STRIPPED_CONTENT_TAGS.contains(&el.tag.as_str()) => {}
            HtmlNode::Element(el) if CLEANED_FORM_TAGS.contains(&el.tag.as_str()) => {
                out.push(HtmlNode::Element(HtmlElement {
                    tag: el.tag.clone(),
                    attrs: el
                        .attrs
                        .iter()
                        .filter(|(key, _)| key != "style" && !key.starts_with("on"))
                        .cloned()
                        .collect(),
                    children: cleaned_children(&el.children),
                }));
            }
            HtmlNode::Element(el) => out.extend(cleaned_children(&el.children)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM1: &str = r#"
<form>
    <input name='foo'/>
    <input type='text' value='hello'>
    <input type='text' value='spam' name=''>
    <select name='bar'>
        <option value='hi'>hi</option>
    </select>
    <input type='radio' name='ch' value='v1'>
    <input type='radio' name='ch' value='v2'>
    <textarea name='baz'></textarea>
    <input type='submit' name='go'>
    <input type='button' name='cancel'>
    <input type='hidden' name='spam' value='123'>
    <input type='HIDDEN' name='spam2' value='123'>
</form>
"#;

    #[test]
    fn parse_forms_finds_every_form() {
        let forms = parse_forms(
            r#"<p>some text</p>
            <form action="/go">hi</form>
            <FORM method='post'><input name='foo'></FORM>"#,
        );
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].attr("action"), Some("/go"));
        assert_eq!(forms[1].attr("METHOD"), Some("post"));
        assert_eq!(forms[1].tag, "form");
    }

    #[test]
    fn fields_to_annotate_skip_hidden_and_unnamed() {
        let form = parse_form(FORM1).unwrap();
        assert_eq!(visible_fields(&form).len(), 9);
        let fields = fields_to_annotate(&form);
        assert!(fields.iter().all(|f| f.name().is_some()));
        assert_eq!(
            field_names(&fields),
            vec!["foo", "bar", "ch", "baz", "go", "cancel"]
        );
    }

    #[test]
    fn text_around_fields_splits_runs_between_fields() {
        let form = parse_form(
            r#"<form>
                <h1>Login</h1>
                Please <b>enter</b> your details
                Username: <input name='username'/> required
                <span>Email:</span> <input type='text' name='email'> *
                Thanks!
            </form>"#,
        )
        .unwrap();
        let fields = fields_to_annotate(&form);
        let (before, after) = text_around_fields(&form, &fields);
        assert_eq!(before.len(), 2);
        assert_eq!(before[0], "Login  Please  enter  your details Username:");
        assert_eq!(before[1], "required  Email:");
        assert_eq!(after[0], "required  Email:");
        assert_eq!(after[1], "* Thanks!");

        let (before, after) = text_around_fields(&form, &[]);
        assert!(before.is_empty() && after.is_empty());
    }

    #[test]
    fn label_for_prefers_for_attribute_then_ancestor() {
        let form = parse_form(
            r#"<form>
                <label for="em">E-mail</label><input id="em" name="email">
                <label>Password <input type="password" name="pw"></label>
                <input name="other">
            </form>"#,
        )
        .unwrap();
        let fields = fields_to_annotate(&form);
        assert_eq!(label_for(&form, fields[0]).unwrap().text_content(), "E-mail");
        assert_eq!(
            label_for(&form, fields[1]).unwrap().text_content().trim(),
            "Password"
        );
        assert!(label_for(&form, fields[2]).is_none());
    }

    #[test]
    fn label_for_ignores_labels_outside_the_form() {
        let page = r#"<html><body>
            <label for="q">Search the catalogue</label>
            <form><input id="q" name="q"></form>
        </body></html>"#;
        let form = parse_form(page).unwrap();
        let fields = fields_to_annotate(&form);
        assert_eq!(fields.len(), 1);
        assert!(label_for(&form, fields[0]).is_none());
    }

    #[test]
    fn pretty_html_sorts_attributes_and_skips_void_closers() {
        let form = parse_form(r#"<form><input value="hello" NAME="q"><b> x  y </b></form>"#)
            .unwrap();
        assert_eq!(
            form.to_pretty_html(),
            "<form>\n  <input name=\"q\" value=\"hello\">\n  <b>\n    x y\n  </b>\n</form>\n"
        );
    }

    #[test]
    fn cleaned_form_html_keeps_form_tags_only() {
        let form = parse_form(
            r#"<form><div style="x"><script>alert(1)</script><input name="q"></div><a href="/x">go</a></form>"#,
        )
        .unwrap();
        assert_eq!(
            cleaned_form_html(&form),
            "<form>\n<input name=\"q\">\n<a href=\"/x\">\ngo\n</a>\n</form>"
        );
    }

    #[test]
    fn pruned_drops_rejected_subtrees() {
        let form = parse_form(FORM1).unwrap();
        let pruned = form.pruned(&|el| !el.is_hidden_input());
        assert_eq!(pruned.find_all("input").count(), 7);
        assert_eq!(form.find_all("input").count(), 9);
    }
}
