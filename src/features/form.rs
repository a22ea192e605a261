use std::collections::{BTreeSet, HashMap};

use url::Url;

use crate::constants::features::{ACTION_BASE_URL, ENGLISH_STOP_WORDS, LINK_STOP_WORDS};
use crate::features::{
    ChannelInput, ChannelSpec, FeatureRecord, FeatureValue, TextVectorizerConfig,
    VectorizerConfig,
};
use crate::html::HtmlElement;

/// Feature channels computed from a whole `<form>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, bitcode::Encode, bitcode::Decode)]
pub enum FormChannel {
    /// Element-type counts, field-count buckets and the submit method.
    FormElements,
    /// `value` of `<input type=submit>` buttons.
    SubmitText,
    /// Text of links inside the form.
    LinkText,
    /// Text of `<label>` elements.
    LabelText,
    /// All text inside the form.
    BodyText,
    /// Form `class` and `id`.
    FormCss,
    /// Action URL path, params, query and fragment without separators.
    ActionUrl,
    /// `class` and `id` of visible inputs.
    InputCss,
    /// Names of visible inputs.
    InputNames,
    /// Names of hidden inputs.
    HiddenInputNames,
    /// `title` of visible inputs.
    InputTitles,
}

impl FormChannel {
    /// Compute this channel for `form`.
    pub fn extract(self, form: &HtmlElement) -> ChannelInput {
        match self {
            FormChannel::FormElements => ChannelInput::Record(form_elements(form)),
            FormChannel::SubmitText => ChannelInput::Text(join(
                form.find_all("input")
                    .filter(|el| el.input_type() == "submit")
                    .filter_map(|el| el.attr("value")),
            )),
            FormChannel::LinkText => {
                ChannelInput::Text(join(form.find_all("a").map(|a| a.text_content())))
            }
            FormChannel::LabelText => {
                ChannelInput::Text(join(form.find_all("label").map(|l| l.text_content())))
            }
            FormChannel::BodyText => ChannelInput::Text(form.text_content()),
            FormChannel::FormCss => ChannelInput::Text(format!(
                "{} {}",
                form.attr_or_empty("class"),
                form.attr_or_empty("id")
            )),
            FormChannel::ActionUrl => ChannelInput::Text(action_url_text(form.attr_or_empty("action"))),
            FormChannel::InputCss => ChannelInput::Text(join(visible_inputs(form).map(|el| {
                format!("{} {}", el.attr_or_empty("class"), el.attr_or_empty("id"))
            }))),
            FormChannel::InputNames => ChannelInput::Text(strip_name_punctuation(&join(
                visible_inputs(form).filter_map(|el| el.attr("name")),
            ))),
            FormChannel::HiddenInputNames => ChannelInput::Text(strip_name_punctuation(&join(
                form.find_all("input")
                    .filter(|el| el.is_hidden_input())
                    .filter_map(|el| el.attr("name")),
            ))),
            FormChannel::InputTitles => ChannelInput::Text(join(
                visible_inputs(form).filter_map(|el| el.attr("title")),
            )),
        }
    }
}

fn join<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn visible_inputs(form: &HtmlElement) -> impl Iterator<Item = &HtmlElement> {
    form.find_all("input").filter(|el| !el.is_hidden_input())
}

fn strip_name_punctuation(names: &str) -> String {
    names.replace(['_', '[', ']'], "")
}

fn strip_url_separators(part: &str) -> String {
    part.replace(['/', '_', '-'], "")
}

/// `path` + `params` + `query` + `#fragment` of the action URL with `/`, `_`
/// and `-` removed; empty when the form has no action.
fn action_url_text(action: &str) -> String {
    if action.is_empty() {
        return String::new();
    }
    let Ok(url) = Url::parse(ACTION_BASE_URL).and_then(|base| base.join(action.trim())) else {
        return strip_url_separators(action);
    };
    let (path, params) = match url.path().split_once(';') {
        Some((path, params)) => (path, params),
        None => (url.path(), ""),
    };
    format!(
        "{}{}{}#{}",
        strip_url_separators(path),
        strip_url_separators(params),
        strip_url_separators(url.query().unwrap_or("")),
        strip_url_separators(url.fragment().unwrap_or(""))
    )
}

fn form_elements(form: &HtmlElement) -> FeatureRecord {
    let mut type_counts: HashMap<String, usize> = HashMap::new();
    let mut names = BTreeSet::new();
    for el in form.descendants() {
        let kind = match el.tag.as_str() {
            "input" => el.input_type(),
            "textarea" | "select" => el.tag.clone(),
            _ => continue,
        };
        *type_counts.entry(kind).or_default() += 1;
        if let Some(name) = el.name() {
            names.insert(name.to_string());
        }
    }
    let count = |kind: &str| type_counts.get(kind).copied().unwrap_or(0);
    let method = form.attr_or_empty("method").trim().to_lowercase();

    let mut record = FeatureRecord::new();
    let mut flag = |name: &str, value: bool| record.insert(name, FeatureValue::Bool(value));
    flag("has <textarea>", count("textarea") > 0);
    flag("has <input type=radio>", count("radio") > 0);
    flag("has <select>", count("select") > 0);
    flag("has <input type=checkbox>", count("checkbox") > 0);
    flag("has <input type=email>", count("email") > 0);
    flag("2 or 3 inputs", matches!(names.len(), 2 | 3));
    flag("no <input type=password>", count("password") == 0);
    flag("exactly one <input type=password>", count("password") == 1);
    flag("exactly two <input type=password>", count("password") == 2);
    flag("no <input type=text>", count("text") == 0);
    flag("exactly one <input type=text>", count("text") == 1);
    flag("exactly two <input type=text>", count("text") == 2);
    flag("3 or more <input type=text>", count("text") >= 3);
    record.insert(
        "<form method",
        FeatureValue::Categorical(if method.is_empty() { "get".to_string() } else { method }),
    );
    record
}

/// Default ordered channel list of the form-type classifier.
pub fn default_form_channels() -> Vec<ChannelSpec> {
    vec![
        ChannelSpec::new("form elements", FormChannel::FormElements, VectorizerConfig::Dict),
        ChannelSpec::new(
            "<input type=submit value=...>",
            FormChannel::SubmitText,
            VectorizerConfig::Text(TextVectorizerConfig::words(1, 2, 1)),
        ),
        ChannelSpec::new(
            "<a> TEXT </a>",
            FormChannel::LinkText,
            VectorizerConfig::Text(
                TextVectorizerConfig::words(1, 2, 4)
                    .with_idf(true)
                    .with_stop_words(LINK_STOP_WORDS),
            ),
        ),
        ChannelSpec::new(
            "<label> TEXT </label>",
            FormChannel::LabelText,
            VectorizerConfig::Text(
                TextVectorizerConfig::words(1, 2, 3)
                    .with_idf(true)
                    .with_stop_words(ENGLISH_STOP_WORDS),
            ),
        ),
        ChannelSpec::new(
            "<form action=...>",
            FormChannel::ActionUrl,
            VectorizerConfig::Text(TextVectorizerConfig::char_wb(5, 6, 4)),
        ),
        ChannelSpec::new(
            "<form class=... id=...>",
            FormChannel::FormCss,
            VectorizerConfig::Text(TextVectorizerConfig::char_wb(4, 5, 3)),
        ),
        ChannelSpec::new(
            "<input class=... id=...>",
            FormChannel::InputCss,
            VectorizerConfig::Text(TextVectorizerConfig::char_wb(4, 5, 5)),
        ),
        ChannelSpec::new(
            "<input name=...>",
            FormChannel::InputNames,
            VectorizerConfig::Text(TextVectorizerConfig::char_wb(5, 6, 3)),
        ),
        ChannelSpec::new(
            "<input title=...>",
            FormChannel::InputTitles,
            VectorizerConfig::Text(TextVectorizerConfig::char_wb(5, 6, 3)),
        ),
    ]
}
