//! Single-file persistence of a trained [`FormFieldClassifier`].

use std::fs;
use std::path::Path;

use tracing::info;

use crate::classifier::FormFieldClassifier;
use crate::constants::artifact::{BITCODE_PREFIX, BUNDLE_VERSION};
use crate::constants::models::{FIELD_MODEL_NAME, FORM_MODEL_NAME};
use crate::errors::FormError;
use crate::models::{FieldTypeLabeler, FittedFormModel, FormTypeClassifier, LinearChainCrf};

/// Both fitted stages with their vocabularies and vectorizer state.
#[derive(Clone, Debug, PartialEq, bitcode::Encode, bitcode::Decode)]
pub struct ModelBundle {
    form: FittedFormModel,
    field: LinearChainCrf,
}

impl ModelBundle {
    /// Capture a trained classifier.
    pub fn from_classifier(classifier: &FormFieldClassifier) -> Result<Self, FormError> {
        let form = classifier
            .form_classifier()
            .fitted()
            .cloned()
            .ok_or(FormError::UntrainedModel(FORM_MODEL_NAME))?;
        let field = classifier
            .field_labeler()
            .crf()
            .cloned()
            .ok_or(FormError::UntrainedModel(FIELD_MODEL_NAME))?;
        Ok(Self { form, field })
    }

    /// Rebuild the classifier.
    pub fn into_classifier(self) -> FormFieldClassifier {
        FormFieldClassifier::from_parts(
            FormTypeClassifier::from_fitted(Some(self.form)),
            FieldTypeLabeler::from_crf(Some(self.field)),
        )
    }

    /// Prefixed, versioned bitcode bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = bitcode::encode(self);
        let mut out = Vec::with_capacity(2 + payload.len());
        out.push(BITCODE_PREFIX);
        out.push(BUNDLE_VERSION);
        out.extend_from_slice(&payload);
        out
    }

    /// Decode bytes written by [`ModelBundle::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormError> {
        match bytes {
            [BITCODE_PREFIX, BUNDLE_VERSION, payload @ ..] => bitcode::decode(payload)
                .map_err(|err| FormError::Artifact(format!("corrupt model bundle: {err}"))),
            [BITCODE_PREFIX, version, ..] => Err(FormError::Artifact(format!(
                "unsupported model bundle version {version}, expected {BUNDLE_VERSION}"
            ))),
            _ => Err(FormError::Artifact(
                "model bundle missing expected prefix".to_string(),
            )),
        }
    }
}

/// Write a trained classifier to `path` as one file.
pub fn save(classifier: &FormFieldClassifier, path: impl AsRef<Path>) -> Result<(), FormError> {
    let path = path.as_ref();
    let bytes = ModelBundle::from_classifier(classifier)?.to_bytes();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "saved model bundle");
    Ok(())
}

/// Read a classifier written by [`save`].
pub fn load(path: impl AsRef<Path>) -> Result<FormFieldClassifier, FormError> {
    let bytes = fs::read(path.as_ref())?;
    Ok(ModelBundle::from_bytes(&bytes)?.into_classifier())
}
