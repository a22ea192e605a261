//! Two-stage form and field classifier.

use indexmap::IndexMap;
use tracing::info;

use crate::annotation::FormAnnotation;
use crate::config::ClassifierConfig;
use crate::errors::FormError;
use crate::features::form_field_features;
use crate::html::{HtmlElement, fields_to_annotate, parse_forms};
use crate::models::{FieldTypeLabeler, FormTypeClassifier, argmax, train_field_labeler};
use crate::storage::Storage;
use crate::text::thresholded;
use crate::types::{FieldName, LabelName};

/// Predicted form type and per-field types of one form.
#[derive(Clone, Debug, PartialEq)]
pub struct FormClassification {
    /// Form type.
    pub form: LabelName,
    /// Field type by field name.
    pub fields: IndexMap<FieldName, LabelName>,
}

/// Thresholded form type and per-field type probabilities of one form.
#[derive(Clone, Debug, PartialEq)]
pub struct FormProbabilities {
    /// Form type probabilities at or above the threshold.
    pub form: IndexMap<LabelName, f64>,
    /// Field type probabilities at or above the threshold, by field name.
    pub fields: IndexMap<FieldName, IndexMap<LabelName, f64>>,
}

/// Form-type classifier and field labeler used together.
///
/// Built explicitly from annotations or a corpus; callers own its lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct FormFieldClassifier {
    form: FormTypeClassifier,
    field: FieldTypeLabeler,
}

impl FormFieldClassifier {
    /// Combine already fitted stages.
    pub fn from_parts(form: FormTypeClassifier, field: FieldTypeLabeler) -> Self {
        Self { form, field }
    }

    /// Train both stages on `annotations`.
    pub fn train(annotations: &[FormAnnotation], config: &ClassifierConfig) -> Result<Self, FormError> {
        info!(forms = annotations.len(), "training form and field classifier");
        let form = FormTypeClassifier::train_on(annotations, &config.form)?;
        let field = train_field_labeler(annotations, &config.field, &config.form)?;
        Ok(Self { form, field })
    }

    /// Train both stages on the annotations of a corpus.
    pub fn trained_on(storage: &Storage, config: &ClassifierConfig) -> Result<Self, FormError> {
        let annotations = storage.annotations(&config.filter)?;
        Self::train(&annotations, config)
    }

    /// The form-type stage.
    pub fn form_classifier(&self) -> &FormTypeClassifier {
        &self.form
    }

    /// The field-type stage.
    pub fn field_labeler(&self) -> &FieldTypeLabeler {
        &self.field
    }

    /// Form types the classifier can predict.
    pub fn form_classes(&self) -> Result<&[String], FormError> {
        self.form.classes()
    }

    /// Field types the labeler can predict.
    pub fn field_classes(&self) -> Result<&[String], FormError> {
        self.field.classes()
    }

    fn named_fields(form: &HtmlElement) -> (Vec<&HtmlElement>, Vec<FieldName>) {
        let fields = fields_to_annotate(form);
        let names = fields
            .iter()
            .map(|field| field.name().unwrap_or_default().to_string())
            .collect();
        (fields, names)
    }

    /// Form type and field types of `form`.
    pub fn classify(&self, form: &HtmlElement) -> Result<FormClassification, FormError> {
        let form_type = self.form.predict(form)?;
        let (fields, names) = Self::named_fields(form);
        let records = form_field_features(form, &form_type, &fields);
        let labels = self.field.predict(&records)?;
        Ok(FormClassification {
            form: form_type,
            fields: names.into_iter().zip(labels).collect(),
        })
    }

    /// Thresholded probabilities of `form`.
    ///
    /// The most probable form type, before thresholding, conditions the
    /// field marginals.
    pub fn classify_proba(&self, form: &HtmlElement, threshold: f64) -> Result<FormProbabilities, FormError> {
        let probs = self.form.predict_proba(form)?;
        let values: Vec<f64> = probs.values().copied().collect();
        let form_type = probs
            .get_index(argmax(&values))
            .map(|(label, _)| label.clone())
            .unwrap_or_default();
        let (fields, names) = Self::named_fields(form);
        let records = form_field_features(form, &form_type, &fields);
        let marginals = self.field.predict_marginals(&records, threshold)?;
        Ok(FormProbabilities {
            form: thresholded(&probs, threshold),
            fields: names.into_iter().zip(marginals).collect(),
        })
    }

    /// Classify every form of an HTML page.
    pub fn extract_forms(&self, html: &str) -> Result<Vec<(HtmlElement, FormClassification)>, FormError> {
        parse_forms(html)
            .into_iter()
            .map(|form| {
                let result = self.classify(&form)?;
                Ok((form, result))
            })
            .collect()
    }

    /// Thresholded probabilities for every form of an HTML page.
    pub fn extract_forms_proba(
        &self,
        html: &str,
        threshold: f64,
    ) -> Result<Vec<(HtmlElement, FormProbabilities)>, FormError> {
        parse_forms(html)
            .into_iter()
            .map(|form| {
                let result = self.classify_proba(&form, threshold)?;
                Ok((form, result))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_form;

    #[test]
    fn untrained_stages_fail_fast() {
        let classifier = FormFieldClassifier::from_parts(FormTypeClassifier::new(), FieldTypeLabeler::new());
        let form = parse_form("<form><input name=q></form>").unwrap();
        assert!(matches!(classifier.classify(&form), Err(FormError::UntrainedModel(_))));
        assert!(matches!(
            classifier.classify_proba(&form, 0.1),
            Err(FormError::UntrainedModel(_))
        ));
        assert!(matches!(classifier.field_classes(), Err(FormError::UntrainedModel(_))));
        assert!(classifier.extract_forms("<p>no forms</p>").unwrap().is_empty());
    }
}
