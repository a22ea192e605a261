#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Labeled forms produced by corpus scans.
pub mod annotation;
/// Model bundle persistence.
pub mod artifact;
/// Two-stage form and field classifier.
pub mod classifier;
/// Corpus scan, model, and evaluation configuration types.
pub mod config;
/// Centralized constants used across storage, features, and models.
pub mod constants;
/// URL and site-domain helpers.
pub mod domain;
/// Cross-validation, out-of-fold labels, and reports.
pub mod evaluation;
/// Form and field feature extraction.
pub mod features;
/// Form deduplication keys.
pub mod fingerprint;
mod hash;
/// Owned HTML form trees and field helpers.
pub mod html;
/// Form-type and field-type models.
pub mod models;
/// Label schemas and corpus configuration.
pub mod schema;
/// Sparse feature vectors.
pub mod sparse;
/// Domain-grouped k-fold splitting.
pub mod splits;
/// Corpus directory storage.
pub mod storage;
/// Text normalization and n-gram helpers.
pub mod text;
/// Shared type aliases.
pub mod types;

mod errors;

pub use annotation::FormAnnotation;
pub use artifact::ModelBundle;
pub use classifier::{FormClassification, FormFieldClassifier, FormProbabilities};
pub use config::{
    AnnotationFilter, ClassifierConfig, EvaluationConfig, FieldModelConfig, FormModelConfig,
    TrainingPolicy,
};
pub use errors::FormError;
pub use evaluation::{
    ClassificationReport, ConfusionMatrix, FieldConditioning, FormTypeEvaluation, SequenceReport,
    evaluate_field_types, evaluate_form_types, field_conditioning, out_of_fold_form_labels,
};
pub use fingerprint::fingerprint;
pub use html::{HtmlElement, HtmlNode, parse_forms};
pub use models::{
    FieldTypeLabeler, FormTypeClassifier, conditioning_form_labels, train_field_labeler,
};
pub use schema::{CorpusConfig, LabelFamily, LabelSchema, LabelType};
pub use splits::{Fold, GroupKFold};
pub use storage::{CorpusIndex, PageRecord, Storage};
pub use text::{number_pattern, thresholded};
pub use types::{
    FeatureName, FieldName, Fingerprint, LabelCode, LabelName, PageUrl, RelativePath, SiteDomain,
};
