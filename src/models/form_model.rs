use indexmap::IndexMap;
use tracing::info;

use crate::annotation::FormAnnotation;
use crate::config::FormModelConfig;
use crate::constants::models::FORM_MODEL_NAME;
use crate::errors::FormError;
use crate::features::{FeatureUnionBuilder, FittedUnion};
use crate::html::HtmlElement;
use crate::models::{SgdParams, SoftmaxRegression};
use crate::text::thresholded;
use crate::types::LabelName;

#[derive(Clone, Debug, PartialEq, bitcode::Encode, bitcode::Decode)]
pub(crate) struct FittedFormModel {
    union: FittedUnion,
    model: SoftmaxRegression,
}

/// Form-type classifier: a feature union feeding a softmax regression.
///
/// Predictable classes are exactly the labels seen in training.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormTypeClassifier {
    fitted: Option<FittedFormModel>,
}

impl FormTypeClassifier {
    /// Untrained classifier; every prediction fails with `UntrainedModel`.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_fitted(fitted: Option<FittedFormModel>) -> Self {
        Self { fitted }
    }

    pub(crate) fn fitted(&self) -> Option<&FittedFormModel> {
        self.fitted.as_ref()
    }

    /// Fit on `forms` with their `labels`.
    pub fn train(forms: &[&HtmlElement], labels: &[LabelName], config: &FormModelConfig) -> Result<Self, FormError> {
        let union = FeatureUnionBuilder::new()
            .channels(config.channels.iter().cloned())
            .build()?
            .fit(forms)?;
        let xs = forms
            .iter()
            .map(|form| union.transform(form))
            .collect::<Result<Vec<_>, _>>()?;
        let params = SgdParams {
            c: config.c,
            epochs: config.epochs,
            learning_rate: config.learning_rate,
            seed: config.seed,
        };
        let model = SoftmaxRegression::fit(&xs, labels, union.width(), &params)?;
        info!(
            forms = forms.len(),
            features = union.width(),
            classes = model.classes().len(),
            "trained form type classifier"
        );
        Ok(Self {
            fitted: Some(FittedFormModel { union, model }),
        })
    }

    /// Fit on annotations, labeled with full form type names.
    pub fn train_on(annotations: &[FormAnnotation], config: &FormModelConfig) -> Result<Self, FormError> {
        let forms: Vec<&HtmlElement> = annotations.iter().map(FormAnnotation::form).collect();
        let labels = annotations
            .iter()
            .map(FormAnnotation::form_type_full)
            .collect::<Result<Vec<_>, _>>()?;
        Self::train(&forms, &labels, config)
    }

    /// Whether the classifier has been fitted.
    pub fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    fn require(&self) -> Result<&FittedFormModel, FormError> {
        self.fitted
            .as_ref()
            .ok_or(FormError::UntrainedModel(FORM_MODEL_NAME))
    }

    /// Learned classes, in probability column order.
    pub fn classes(&self) -> Result<&[String], FormError> {
        Ok(self.require()?.model.classes())
    }

    /// Most probable form type.
    pub fn predict(&self, form: &HtmlElement) -> Result<LabelName, FormError> {
        let fitted = self.require()?;
        let x = fitted.union.transform(form)?;
        Ok(fitted.model.predict(&x).to_string())
    }

    /// Probability of every learned class.
    pub fn predict_proba(&self, form: &HtmlElement) -> Result<IndexMap<LabelName, f64>, FormError> {
        let fitted = self.require()?;
        let x = fitted.union.transform(form)?;
        let probs = fitted.model.predict_proba(&x);
        Ok(fitted
            .model
            .classes()
            .iter()
            .cloned()
            .zip(probs)
            .collect())
    }

    /// Classes whose probability is at least `threshold`.
    pub fn predict_distribution(&self, form: &HtmlElement, threshold: f64) -> Result<IndexMap<LabelName, f64>, FormError> {
        Ok(thresholded(&self.predict_proba(form)?, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_form;

    fn login(name: &str) -> HtmlElement {
        parse_form(&format!(
            r#"<form method="post" action="/login"><input name="{name}"><input type="password" name="pass"><input type="submit" value="Sign in"></form>"#
        ))
        .unwrap()
    }

    fn search(name: &str) -> HtmlElement {
        parse_form(&format!(
            r#"<form action="/search"><input type="search" name="{name}"><input type="submit" value="Search"></form>"#
        ))
        .unwrap()
    }

    #[test]
    fn untrained_classifier_fails_fast() {
        let classifier = FormTypeClassifier::new();
        assert!(!classifier.is_trained());
        assert!(matches!(
            classifier.predict(&login("user")),
            Err(FormError::UntrainedModel(_))
        ));
        assert!(matches!(classifier.classes(), Err(FormError::UntrainedModel(_))));
    }

    #[test]
    fn classes_are_the_observed_labels() {
        let forms: Vec<HtmlElement> = (0..6)
            .flat_map(|i| [login(&format!("user{i}")), search(&format!("q{i}"))])
            .collect();
        let refs: Vec<&HtmlElement> = forms.iter().collect();
        let labels: Vec<String> = (0..6)
            .flat_map(|_| ["login".to_string(), "search".to_string()])
            .collect();
        let classifier = FormTypeClassifier::train(&refs, &labels, &FormModelConfig::default()).unwrap();
        assert_eq!(classifier.classes().unwrap(), &["login", "search"]);
        assert_eq!(classifier.predict(&login("email")).unwrap(), "login");
        assert_eq!(classifier.predict(&search("query")).unwrap(), "search");

        let probs = classifier.predict_proba(&login("email")).unwrap();
        assert!((probs.values().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(classifier
            .predict_distribution(&login("email"), 1.1)
            .unwrap()
            .is_empty());
    }
}
