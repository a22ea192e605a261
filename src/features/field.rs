use std::collections::BTreeSet;

use crate::constants::features::{NUMBER_PATTERN_RATIO, TEXT_AFTER_TOKENS, TEXT_BEFORE_TOKENS};
use crate::features::{FeatureRecord, FeatureValue};
use crate::html::{HtmlElement, label_for, text_around_fields};
use crate::text::{ngrams, normalize, number_pattern, token_ngrams, tokenize};

/// One feature record per field of `form`, conditioned on `form_type`.
///
/// `fields` must be references into `form` (normally
/// [`crate::html::fields_to_annotate`]); the result has the same length and
/// order. An empty field list gives an empty result.
pub fn form_field_features(
    form: &HtmlElement,
    form_type: &str,
    fields: &[&HtmlElement],
) -> Vec<FeatureRecord> {
    let (before, after) = text_around_fields(form, fields);
    let last = fields.len().saturating_sub(1);
    fields
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let mut record = element_features(form, field);
            record.insert("is-first", FeatureValue::Bool(idx == 0));
            record.insert("is-last", FeatureValue::Bool(idx == last));
            record.insert("form-type", FeatureValue::Categorical(form_type.to_string()));

            let tokens = tokenize(&normalize(&before[idx]));
            let tail = &tokens[tokens.len().saturating_sub(TEXT_BEFORE_TOKENS)..];
            record.insert("text-before", FeatureValue::Tokens(token_ngrams(tail, 1, 2)));

            let tokens = tokenize(&normalize(&after[idx]));
            let head = &tokens[..tokens.len().min(TEXT_AFTER_TOKENS)];
            record.insert("text-after", FeatureValue::Tokens(token_ngrams(head, 1, 2)));

            record.insert("bias", FeatureValue::Numeric(1.0));
            record
        })
        .collect()
}

fn normalized_attr(el: &HtmlElement, name: &str) -> String {
    normalize(el.attr_or_empty(name))
}

fn element_features(form: &HtmlElement, el: &HtmlElement) -> FeatureRecord {
    let name = normalize(el.name().unwrap_or(""));
    let value = normalized_attr(el, "value");
    let placeholder = normalized_attr(el, "placeholder");
    let css_class = normalized_attr(el, "class");
    let id = normalized_attr(el, "id");
    let title = normalized_attr(el, "title");

    let mut record = FeatureRecord::new();
    record.insert("tag", FeatureValue::Categorical(el.tag.clone()));
    record.insert("name", FeatureValue::Tokens(tokenize(&name)));
    record.insert("name-ngrams-3-5", FeatureValue::Tokens(ngrams(&name, 3, 5)));
    record.insert("value-ngrams", FeatureValue::Tokens(ngrams(&value, 4, 6)));
    record.insert("placeholder-ngrams", FeatureValue::Tokens(ngrams(&placeholder, 4, 6)));
    record.insert("css-class-ngrams", FeatureValue::Tokens(ngrams(&css_class, 4, 6)));
    record.insert("id-ngrams", FeatureValue::Tokens(ngrams(&id, 4, 6)));
    record.insert("id", FeatureValue::Tokens(tokenize(&id)));
    record.insert("title-ngrams", FeatureValue::Tokens(ngrams(&title, 4, 6)));
    record.insert(
        "help",
        FeatureValue::Tokens(tokenize(&format!("{title} {placeholder}"))),
    );

    if let Some(label) = label_for(form, el) {
        let label_text = normalize(&label.text_content());
        record.insert("label", FeatureValue::Tokens(tokenize(&label_text)));
        record.insert("label-ngrams-3-5", FeatureValue::Tokens(ngrams(&label_text, 3, 5)));
    }

    match el.tag.as_str() {
        "input" => record.insert("input-type", FeatureValue::Categorical(el.input_type())),
        "select" => {
            let options: Vec<&HtmlElement> = el.find_all("option").collect();
            let texts: Vec<String> = options
                .iter()
                .map(|opt| normalize(&opt.text_content()))
                .collect();
            let values: Vec<String> = options
                .iter()
                .map(|opt| normalized_attr(opt, "value"))
                .collect();
            let patterns: BTreeSet<String> = texts
                .iter()
                .chain(&values)
                .map(|text| number_pattern(text, NUMBER_PATTERN_RATIO))
                .filter(|pattern| !pattern.is_empty())
                .collect();
            record.insert("option-text", FeatureValue::Tokens(texts));
            record.insert("option-value", FeatureValue::Tokens(values));
            record.insert(
                "option-num-pattern",
                FeatureValue::Tokens(patterns.into_iter().collect()),
            );
        }
        _ => {}
    }
    record
}
