//! Domain-grouped cross-validation and reporting for both stages.

use std::fmt;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::info;

use crate::annotation::FormAnnotation;
use crate::config::{EvaluationConfig, FormModelConfig, TrainingPolicy};
use crate::errors::FormError;
use crate::features::form_field_features;
use crate::hash::fold_seed;
use crate::html::HtmlElement;
use crate::models::{
    FieldTypeLabeler, FormTypeClassifier, annotated_form_labels, field_training_data,
};
use crate::splits::{Fold, annotation_folds};
use crate::types::LabelName;

fn map_folds<T, F>(folds: &[Fold], run: F) -> Result<Vec<T>, FormError>
where
    T: Send,
    F: Fn(&Fold) -> Result<T, FormError> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        folds.par_iter().map(run).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        folds.iter().map(run).collect()
    }
}

/// Leakage-free predicted form type (full name) for every annotation.
///
/// For each domain-grouped fold a fresh classifier is trained on the other
/// folds, seeded from `config.seed` and the fold number, and predicts the
/// held-out one. Results are indexed like `annotations` and do not depend on
/// fold execution order.
pub fn out_of_fold_form_labels(
    annotations: &[FormAnnotation],
    n_folds: usize,
    seed: u64,
    config: &FormModelConfig,
) -> Result<Vec<LabelName>, FormError> {
    let folds = annotation_folds(annotations, n_folds, seed)?;
    let truth = annotated_form_labels(annotations)?;
    info!(forms = annotations.len(), folds = folds.len(), "computing out-of-fold form labels");

    let per_fold = map_folds(&folds, |fold| {
        let forms: Vec<&HtmlElement> = fold.train.iter().map(|&i| annotations[i].form()).collect();
        let labels: Vec<LabelName> = fold.train.iter().map(|&i| truth[i].clone()).collect();
        let fold_config = config.clone().with_seed(fold_seed(config.seed, fold.index));
        let classifier = FormTypeClassifier::train(&forms, &labels, &fold_config)?;
        fold.test
            .iter()
            .map(|&i| Ok((i, classifier.predict(annotations[i].form())?)))
            .collect::<Result<Vec<_>, FormError>>()
    })?;

    let mut predicted = vec![String::new(); annotations.len()];
    for (idx, label) in per_fold.into_iter().flatten() {
        predicted[idx] = label;
    }
    Ok(predicted)
}

/// Precision, recall, F1 and support of one class.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassMetrics {
    /// Class label.
    pub label: LabelName,
    /// Fraction of predictions of this class that were right.
    pub precision: f64,
    /// Fraction of true items of this class that were found.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// True items of this class.
    pub support: usize,
}

/// Per-class and averaged metrics of a labeling run.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationReport {
    /// Per-class rows, in the requested label order.
    pub classes: Vec<ClassMetrics>,
    /// Fraction of correct predictions.
    pub accuracy: f64,
    /// Unweighted mean over classes (support holds the total).
    pub macro_avg: ClassMetrics,
    /// Support-weighted mean over classes.
    pub weighted_avg: ClassMetrics,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

impl ClassificationReport {
    /// Score `predicted` against `truth`, with rows in `labels` order.
    pub fn new(truth: &[LabelName], predicted: &[LabelName], labels: &[LabelName]) -> Self {
        let total = truth.len();
        let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
        let classes: Vec<ClassMetrics> = labels
            .iter()
            .map(|label| {
                let support = truth.iter().filter(|t| *t == label).count();
                let predicted_count = predicted.iter().filter(|p| *p == label).count();
                let hits = truth
                    .iter()
                    .zip(predicted)
                    .filter(|(t, p)| *t == label && *p == label)
                    .count();
                let precision = ratio(hits, predicted_count);
                let recall = ratio(hits, support);
                ClassMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1: f1(precision, recall),
                    support,
                }
            })
            .collect();

        let n = classes.len().max(1) as f64;
        let weight_total: usize = classes.iter().map(|c| c.support).sum();
        let weighted = |get: fn(&ClassMetrics) -> f64| {
            if weight_total == 0 {
                0.0
            } else {
                classes.iter().map(|c| get(c) * c.support as f64).sum::<f64>() / weight_total as f64
            }
        };
        let macro_avg = ClassMetrics {
            label: "macro avg".to_string(),
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
            support: weight_total,
        };
        let weighted_avg = ClassMetrics {
            label: "weighted avg".to_string(),
            precision: weighted(|c: &ClassMetrics| c.precision),
            recall: weighted(|c: &ClassMetrics| c.recall),
            f1: weighted(|c: &ClassMetrics| c.f1),
            support: weight_total,
        };
        Self {
            accuracy: ratio(correct, total),
            classes,
            macro_avg,
            weighted_avg,
        }
    }

    /// Row of one class.
    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, m: &ClassMetrics, width: usize) -> fmt::Result {
    writeln!(
        f,
        "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        m.label, m.precision, m.recall, m.f1, m.support
    )
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain([self.weighted_avg.label.len()])
            .max()
            .unwrap_or(0);
        writeln!(f, "{:>width$} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for metrics in &self.classes {
            write_row(f, metrics, width)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.weighted_avg.support
        )?;
        write_row(f, &self.macro_avg, width)?;
        write_row(f, &self.weighted_avg, width)
    }
}

/// Counts of (true, predicted) label pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfusionMatrix {
    /// Row and column labels.
    pub labels: Vec<LabelName>,
    /// `counts[truth][prediction]`.
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Tally pairs whose labels both appear in `labels`.
    pub fn new(truth: &[LabelName], predicted: &[LabelName], labels: &[LabelName]) -> Self {
        let mut counts = vec![vec![0; labels.len()]; labels.len()];
        for (t, p) in truth.iter().zip(predicted) {
            let row = labels.iter().position(|l| l == t);
            let col = labels.iter().position(|l| l == p);
            if let (Some(row), Some(col)) = (row, col) {
                counts[row][col] += 1;
            }
        }
        Self {
            labels: labels.to_vec(),
            counts,
        }
    }

    /// Count of items labeled `truth` and predicted as `predicted`.
    pub fn get(&self, truth: &str, predicted: &str) -> usize {
        let row = self.labels.iter().position(|l| l == truth);
        let col = self.labels.iter().position(|l| l == predicted);
        match (row, col) {
            (Some(row), Some(col)) => self.counts[row][col],
            _ => 0,
        }
    }
}

/// Cross-validated form-type results.
#[derive(Clone, Debug)]
pub struct FormTypeEvaluation {
    /// True full names, indexed like the annotations.
    pub truth: Vec<LabelName>,
    /// Out-of-fold predictions, indexed like the annotations.
    pub predicted: Vec<LabelName>,
    /// Per-class metrics in canonical order.
    pub report: ClassificationReport,
    /// Confusion matrix in canonical order.
    pub confusion: ConfusionMatrix,
}

/// Cross-validate the form-type classifier.
pub fn evaluate_form_types(
    annotations: &[FormAnnotation],
    config: &EvaluationConfig,
) -> Result<FormTypeEvaluation, FormError> {
    let truth = annotated_form_labels(annotations)?;
    let predicted = out_of_fold_form_labels(annotations, config.n_folds, config.seed, &config.form)?;
    let labels = match annotations.first() {
        Some(first) => first
            .form_schema()
            .canonical_order(truth.iter().chain(&predicted)),
        None => Vec::new(),
    };
    let report = ClassificationReport::new(&truth, &predicted, &labels);
    info!(forms = annotations.len(), accuracy = report.accuracy, "evaluated form types");
    Ok(FormTypeEvaluation {
        confusion: ConfusionMatrix::new(&truth, &predicted, &labels),
        report,
        truth,
        predicted,
    })
}

/// Field labeling metrics.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceReport {
    /// Evaluated forms.
    pub n_sequences: usize,
    /// Evaluated fields.
    pub n_fields: usize,
    /// Fraction of fields labeled correctly.
    pub field_accuracy: f64,
    /// Fraction of forms whose whole label sequence is correct.
    pub sequence_accuracy: f64,
    /// Per-class metrics over all fields, in canonical order.
    pub report: ClassificationReport,
}

impl SequenceReport {
    /// Score predicted label sequences against the true ones.
    pub fn new(truth: &[Vec<LabelName>], predicted: &[Vec<LabelName>], labels: &[LabelName]) -> Self {
        let flat_truth: Vec<LabelName> = truth.iter().flatten().cloned().collect();
        let flat_predicted: Vec<LabelName> = predicted.iter().flatten().cloned().collect();
        let exact = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
        let report = ClassificationReport::new(&flat_truth, &flat_predicted, labels);
        Self {
            n_sequences: truth.len(),
            n_fields: flat_truth.len(),
            field_accuracy: report.accuracy,
            sequence_accuracy: ratio(exact, truth.len()),
            report,
        }
    }
}

impl fmt::Display for SequenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} forms, {} fields: field accuracy {:.3}, sequence accuracy {:.3}",
            self.n_sequences, self.n_fields, self.field_accuracy, self.sequence_accuracy
        )?;
        write!(f, "{}", self.report)
    }
}

/// Form labels used by [`evaluate_field_types`], one per annotation.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldConditioning {
    /// Labels conditioning the training folds, chosen by the field policy.
    pub training: Vec<LabelName>,
    /// Out-of-fold form predictions conditioning every test fold.
    pub testing: Vec<LabelName>,
}

/// Conditioning labels for field cross-validation.
///
/// Test folds always see predicted form types, computed with the same folds
/// and seed as the evaluation itself.
pub fn field_conditioning(
    annotations: &[FormAnnotation],
    config: &EvaluationConfig,
) -> Result<FieldConditioning, FormError> {
    let testing = out_of_fold_form_labels(annotations, config.n_folds, config.seed, &config.form)?;
    let training = match config.field.policy {
        TrainingPolicy::Precise => annotated_form_labels(annotations)?,
        TrainingPolicy::Realistic => testing.clone(),
    };
    Ok(FieldConditioning { training, testing })
}

/// Cross-validate the field labeler.
///
/// Held-out forms are always conditioned on out-of-fold predicted form
/// types; training forms follow `config.field.policy`. Only fully annotated
/// forms with at least one field are trained on and scored.
pub fn evaluate_field_types(
    annotations: &[FormAnnotation],
    config: &EvaluationConfig,
) -> Result<SequenceReport, FormError> {
    let FieldConditioning { training, testing } = field_conditioning(annotations, config)?;
    let folds = annotation_folds(annotations, config.n_folds, config.seed)?;

    let per_fold = map_folds(&folds, |fold| {
        let (xs, ys) = field_training_data(
            fold.train
                .iter()
                .map(|&i| (&annotations[i], &training[i])),
        )?;
        if xs.is_empty() {
            return Ok(Vec::new());
        }
        let field_config = config
            .field
            .clone()
            .with_seed(fold_seed(config.field.seed, fold.index));
        let labeler = FieldTypeLabeler::train(&xs, &ys, &field_config)?;
        let mut scored = Vec::new();
        for &i in &fold.test {
            let annotation = &annotations[i];
            let fields = annotation.field_elements();
            if fields.is_empty() || !annotation.fields_annotated() {
                continue;
            }
            let records = form_field_features(annotation.form(), &testing[i], &fields);
            scored.push((i, annotation.field_types_full()?, labeler.predict(&records)?));
        }
        Ok(scored)
    })?;

    let mut scored: Vec<_> = per_fold.into_iter().flatten().collect();
    scored.sort_by_key(|(i, _, _)| *i);
    let (truth, predicted): (Vec<_>, Vec<_>) = scored.into_iter().map(|(_, t, p)| (t, p)).unzip();
    let labels = match annotations.first() {
        Some(first) => first
            .field_schema()
            .canonical_order(truth.iter().chain(&predicted).flatten()),
        None => Vec::new(),
    };
    let report = SequenceReport::new(&truth, &predicted, &labels);
    info!(
        policy = ?config.field.policy,
        forms = report.n_sequences,
        field_accuracy = report.field_accuracy,
        sequence_accuracy = report.sequence_accuracy,
        "evaluated field types"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<LabelName> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn report_matches_hand_computed_metrics() {
        let truth = labels(&["login", "login", "search", "search"]);
        let predicted = labels(&["login", "search", "search", "search"]);
        let order = labels(&["search", "login"]);
        let report = ClassificationReport::new(&truth, &predicted, &order);
        assert_eq!(report.accuracy, 0.75);
        assert_eq!(report.classes[0].label, "search");
        let login = report.class("login").unwrap();
        assert_eq!(login.precision, 1.0);
        assert_eq!(login.recall, 0.5);
        let search = report.class("search").unwrap();
        assert!((search.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(search.support, 2);
        assert_eq!(report.macro_avg.support, 4);
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
    }

    #[test]
    fn confusion_matrix_counts_pairs() {
        let truth = labels(&["login", "login", "search"]);
        let predicted = labels(&["login", "search", "search"]);
        let matrix = ConfusionMatrix::new(&truth, &predicted, &labels(&["login", "search"]));
        assert_eq!(matrix.counts, vec![vec![1, 1], vec![0, 1]]);
        assert_eq!(matrix.get("login", "search"), 1);
        assert_eq!(matrix.get("other", "search"), 0);
    }

    #[test]
    fn sequence_report_counts_exact_matches() {
        let truth = vec![labels(&["username", "password"]), labels(&["search query"])];
        let predicted = vec![labels(&["username", "username"]), labels(&["search query"])];
        let report = SequenceReport::new(
            &truth,
            &predicted,
            &labels(&["username", "password", "search query"]),
        );
        assert_eq!(report.n_fields, 3);
        assert_eq!(report.sequence_accuracy, 0.5);
        assert!((report.field_accuracy - 2.0 / 3.0).abs() < 1e-12);
    }
}
