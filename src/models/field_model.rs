use indexmap::IndexMap;
use tracing::info;

use crate::annotation::FormAnnotation;
use crate::config::{FieldModelConfig, FormModelConfig, TrainingPolicy};
use crate::constants::models::FIELD_MODEL_NAME;
use crate::errors::FormError;
use crate::evaluation::out_of_fold_form_labels;
use crate::features::{FeatureRecord, form_field_features};
use crate::models::{AttributeItem, CrfParams, LinearChainCrf};
use crate::text::thresholded;
use crate::types::LabelName;

/// Sequence labeler assigning a field type to every annotatable field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldTypeLabeler {
    crf: Option<LinearChainCrf>,
}

fn attribute_items(records: &[FeatureRecord]) -> Vec<AttributeItem> {
    records.iter().map(FeatureRecord::attributes).collect()
}

impl FieldTypeLabeler {
    /// Untrained labeler.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_crf(crf: Option<LinearChainCrf>) -> Self {
        Self { crf }
    }

    pub(crate) fn crf(&self) -> Option<&LinearChainCrf> {
        self.crf.as_ref()
    }

    /// Fit on per-form field records and the matching label sequences.
    pub fn train(
        sequences: &[Vec<FeatureRecord>],
        labels: &[Vec<LabelName>],
        config: &FieldModelConfig,
    ) -> Result<Self, FormError> {
        let xs: Vec<Vec<AttributeItem>> = sequences.iter().map(|seq| attribute_items(seq)).collect();
        let params = CrfParams {
            c2: config.effective_c2(),
            epochs: config.epochs,
            learning_rate: config.learning_rate,
            seed: config.seed,
        };
        let crf = LinearChainCrf::fit(&xs, labels, &params)?;
        info!(
            sequences = sequences.len(),
            labels = crf.labels().len(),
            c2 = params.c2,
            "trained field type labeler"
        );
        Ok(Self { crf: Some(crf) })
    }

    /// Whether the labeler has been fitted.
    pub fn is_trained(&self) -> bool {
        self.crf.is_some()
    }

    fn require(&self) -> Result<&LinearChainCrf, FormError> {
        self.crf
            .as_ref()
            .ok_or(FormError::UntrainedModel(FIELD_MODEL_NAME))
    }

    /// Learned field types.
    pub fn classes(&self) -> Result<&[String], FormError> {
        Ok(self.require()?.labels())
    }

    /// Best joint label sequence; empty input gives an empty result.
    pub fn predict(&self, records: &[FeatureRecord]) -> Result<Vec<LabelName>, FormError> {
        let crf = self.require()?;
        Ok(crf.predict(&attribute_items(records)))
    }

    /// Per-field label marginals, each thresholded independently.
    pub fn predict_marginals(
        &self,
        records: &[FeatureRecord],
        threshold: f64,
    ) -> Result<Vec<IndexMap<LabelName, f64>>, FormError> {
        let crf = self.require()?;
        Ok(crf
            .marginals(&attribute_items(records))
            .iter()
            .map(|marginals| thresholded(marginals, threshold))
            .collect())
    }
}

/// Field records and full-name labels for every fully annotated form with
/// at least one field, each conditioned on its paired form label.
pub(crate) fn field_training_data<'a>(
    pairs: impl IntoIterator<Item = (&'a FormAnnotation, &'a LabelName)>,
) -> Result<(Vec<Vec<FeatureRecord>>, Vec<Vec<LabelName>>), FormError> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (annotation, form_label) in pairs {
        if !annotation.fields_annotated() {
            continue;
        }
        let fields = annotation.field_elements();
        if fields.is_empty() {
            continue;
        }
        xs.push(form_field_features(annotation.form(), form_label, &fields));
        ys.push(annotation.field_types_full()?);
    }
    Ok((xs, ys))
}

pub(crate) fn annotated_form_labels(annotations: &[FormAnnotation]) -> Result<Vec<LabelName>, FormError> {
    annotations
        .iter()
        .map(FormAnnotation::form_type_full)
        .collect()
}

/// Form labels the field labeler is conditioned on in training, one per
/// annotation.
///
/// `Precise` gives the annotated form types. `Realistic` gives out-of-fold
/// predictions of a form classifier built with `form_config`.
pub fn conditioning_form_labels(
    annotations: &[FormAnnotation],
    config: &FieldModelConfig,
    form_config: &FormModelConfig,
) -> Result<Vec<LabelName>, FormError> {
    match config.policy {
        TrainingPolicy::Precise => annotated_form_labels(annotations),
        TrainingPolicy::Realistic => {
            out_of_fold_form_labels(annotations, config.realistic_folds, config.seed, form_config)
        }
    }
}

/// Train a field labeler under the configured conditioning policy.
pub fn train_field_labeler(
    annotations: &[FormAnnotation],
    config: &FieldModelConfig,
    form_config: &FormModelConfig,
) -> Result<FieldTypeLabeler, FormError> {
    let form_labels = conditioning_form_labels(annotations, config, form_config)?;
    let (xs, ys) = field_training_data(annotations.iter().zip(&form_labels))?;
    info!(
        policy = ?config.policy,
        forms = annotations.len(),
        annotated = xs.len(),
        "training field type labeler"
    );
    FieldTypeLabeler::train(&xs, &ys, config)
}
