use tracing::debug;

use crate::constants::features::UNION_NAME_SEPARATOR;
use crate::errors::FormError;
use crate::features::{FittedVectorizer, FormChannel, VectorizerConfig};
use crate::html::HtmlElement;
use crate::sparse::SparseVector;
use crate::types::FeatureName;

/// One `(name, extractor, vectorizer)` entry of a feature union.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelSpec {
    /// Channel name, used as the feature-name prefix.
    pub name: String,
    /// Extractor applied to each form.
    pub channel: FormChannel,
    /// Vectorizer applied to the extractor output.
    pub vectorizer: VectorizerConfig,
}

impl ChannelSpec {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, channel: FormChannel, vectorizer: VectorizerConfig) -> Self {
        Self {
            name: name.into(),
            channel,
            vectorizer,
        }
    }
}

/// Builder composing channels, in order, into one feature union.
#[derive(Clone, Debug, Default)]
pub struct FeatureUnionBuilder {
    channels: Vec<ChannelSpec>,
}

impl FeatureUnionBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a channel.
    pub fn channel(
        mut self,
        name: impl Into<String>,
        channel: FormChannel,
        vectorizer: VectorizerConfig,
    ) -> Self {
        self.channels.push(ChannelSpec::new(name, channel, vectorizer));
        self
    }

    /// Append prepared channel specs.
    pub fn channels(mut self, specs: impl IntoIterator<Item = ChannelSpec>) -> Self {
        self.channels.extend(specs);
        self
    }

    /// Validate the channel list.
    pub fn build(self) -> Result<FeatureUnion, FormError> {
        if self.channels.is_empty() {
            return Err(FormError::Configuration(
                "feature union needs at least one channel".to_string(),
            ));
        }
        for (idx, spec) in self.channels.iter().enumerate() {
            if self.channels[..idx].iter().any(|other| other.name == spec.name) {
                return Err(FormError::Configuration(format!(
                    "duplicate feature channel '{}'",
                    spec.name
                )));
            }
        }
        Ok(FeatureUnion {
            channels: self.channels,
        })
    }
}

/// Validated, unfitted feature union.
#[derive(Clone, Debug)]
pub struct FeatureUnion {
    channels: Vec<ChannelSpec>,
}

impl FeatureUnion {
    /// Fit every channel's vectorizer on `forms`.
    pub fn fit(&self, forms: &[&HtmlElement]) -> Result<FittedUnion, FormError> {
        let mut fitted = Vec::with_capacity(self.channels.len());
        let mut offset = 0u32;
        for spec in &self.channels {
            let inputs: Vec<_> = forms.iter().map(|form| spec.channel.extract(form)).collect();
            let vectorizer = spec.vectorizer.fit(&spec.name, &inputs)?;
            let width = vectorizer.width();
            debug!(channel = %spec.name, width, "fitted feature channel");
            fitted.push(FittedChannel {
                name: spec.name.clone(),
                channel: spec.channel,
                vectorizer,
                offset,
            });
            offset += width;
        }
        Ok(FittedUnion {
            channels: fitted,
            width: offset,
        })
    }
}

/// A fitted channel and its first column in the union.
#[derive(Clone, Debug, PartialEq, bitcode::Encode, bitcode::Decode)]
struct FittedChannel {
    name: String,
    channel: FormChannel,
    vectorizer: FittedVectorizer,
    offset: u32,
}

/// Fitted feature union with a stable feature-name to column mapping.
#[derive(Clone, Debug, PartialEq, bitcode::Encode, bitcode::Decode)]
pub struct FittedUnion {
    channels: Vec<FittedChannel>,
    width: u32,
}

impl FittedUnion {
    /// Total number of columns.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Vectorize one form into the concatenated column space.
    pub fn transform(&self, form: &HtmlElement) -> Result<SparseVector, FormError> {
        let parts = self
            .channels
            .iter()
            .map(|fitted| {
                fitted
                    .vectorizer
                    .transform(&fitted.name, &fitted.channel.extract(form))
                    .map(|vector| vector.offset(fitted.offset))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SparseVector::concat(parts))
    }

    /// `channel__column` names in column order.
    pub fn feature_names(&self) -> Vec<FeatureName> {
        self.channels
            .iter()
            .flat_map(|fitted| {
                fitted
                    .vectorizer
                    .vocabulary()
                    .iter()
                    .map(move |column| format!("{}{UNION_NAME_SEPARATOR}{column}", fitted.name))
            })
            .collect()
    }
}
