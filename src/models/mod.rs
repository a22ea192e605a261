//! Statistical models for both classification stages.

mod crf;
mod field_model;
mod form_model;
mod logistic;

pub use crf::{AttributeItem, CrfParams, LinearChainCrf};
pub use field_model::{FieldTypeLabeler, conditioning_form_labels, train_field_labeler};
pub use form_model::FormTypeClassifier;
pub use logistic::{SgdParams, SoftmaxRegression};

pub(crate) use field_model::{annotated_form_labels, field_training_data};
pub(crate) use form_model::FittedFormModel;
pub(crate) use logistic::argmax;
