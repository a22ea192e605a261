//! Feature extraction for forms and fields.
//!
//! Form features are produced per channel ([`FormChannel`]) and vectorized
//! channel by channel into one wide sparse vector ([`FittedUnion`]). Field
//! features are per-field [`FeatureRecord`]s consumed by the sequence
//! labeler.

mod field;
mod form;
mod union;
mod vectorizer;

use indexmap::IndexMap;

use crate::constants::features::CATEGORICAL_SEPARATOR;
use crate::types::FeatureName;

pub use field::form_field_features;
pub use form::{FormChannel, default_form_channels};
pub use union::{ChannelSpec, FeatureUnion, FeatureUnionBuilder, FittedUnion};
pub use vectorizer::{Analyzer, FittedVectorizer, TextVectorizerConfig, VectorizerConfig};

/// Value of one named feature slot.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureValue {
    /// Present when true, absent when false.
    Bool(bool),
    /// One-hot value, emitted as `name=value`.
    Categorical(String),
    /// Real-valued slot.
    Numeric(f64),
    /// Bag of values, each emitted as `name=value`.
    Tokens(Vec<String>),
}

/// Ordered, named feature slots of one element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureRecord {
    values: IndexMap<FeatureName, FeatureValue>,
}

impl FeatureRecord {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) a slot.
    pub fn insert(&mut self, name: impl Into<FeatureName>, value: FeatureValue) {
        self.values.insert(name.into(), value);
    }

    /// Slot value by name.
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record has no slots.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Slots in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&FeatureName, &FeatureValue)> {
        self.values.iter()
    }

    /// Flatten into weighted attributes.
    ///
    /// `true` booleans give `(name, 1)`, categoricals and tokens give
    /// `(name=value, 1)` (repeated tokens accumulate), numerics give
    /// `(name, value)`. False booleans and zero numerics are omitted.
    pub fn attributes(&self) -> IndexMap<String, f64> {
        let mut out: IndexMap<String, f64> = IndexMap::new();
        for (name, value) in &self.values {
            match value {
                FeatureValue::Bool(true) => *out.entry(name.clone()).or_default() += 1.0,
                FeatureValue::Bool(false) => {}
                FeatureValue::Categorical(value) => {
                    *out.entry(format!("{name}{CATEGORICAL_SEPARATOR}{value}"))
                        .or_default() += 1.0;
                }
                FeatureValue::Numeric(value) => {
                    if *value != 0.0 {
                        *out.entry(name.clone()).or_default() += *value;
                    }
                }
                FeatureValue::Tokens(tokens) => {
                    for token in tokens {
                        *out.entry(format!("{name}{CATEGORICAL_SEPARATOR}{token}"))
                            .or_default() += 1.0;
                    }
                }
            }
        }
        out
    }
}

/// Output of a form channel: structured slots or free text.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelInput {
    /// Structured record for dictionary vectorization.
    Record(FeatureRecord),
    /// Free text for n-gram vectorization.
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_flatten_each_kind() {
        let mut record = FeatureRecord::new();
        record.insert("is-first", FeatureValue::Bool(true));
        record.insert("is-last", FeatureValue::Bool(false));
        record.insert("tag", FeatureValue::Categorical("input".into()));
        record.insert("bias", FeatureValue::Numeric(1.0));
        record.insert(
            "name",
            FeatureValue::Tokens(vec!["user".into(), "name".into(), "user".into()]),
        );
        let attrs = record.attributes();
        assert_eq!(
            attrs.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["is-first", "tag=input", "bias", "name=user", "name=name"]
        );
        assert_eq!(attrs["name=user"], 2.0);
    }
}
