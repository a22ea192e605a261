use crate::constants::evaluation::DEFAULT_N_FOLDS;
use crate::constants::models::{
    DEFAULT_SEED, FIELD_EPOCHS, FIELD_LEARNING_RATE, FORM_C, FORM_EPOCHS, FORM_LEARNING_RATE,
    PRECISE_C2, REALISTIC_C2,
};
use crate::features::{ChannelSpec, default_form_channels};

/// Controls which forms `Storage::iter_annotations` yields and how labels
/// are rewritten.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationFilter {
    /// Keep only the first form of each fingerprint (in corpus order).
    pub drop_duplicates: bool,
    /// Skip forms whose type is the NA code.
    pub drop_unlabeled: bool,
    /// Skip forms whose type is the skip code.
    pub drop_skipped: bool,
    /// Rewrite form types through the schema's simplify map.
    pub simplify_form_types: bool,
    /// Rewrite field types through the schema's simplify map.
    pub simplify_field_types: bool,
}

impl Default for AnnotationFilter {
    fn default() -> Self {
        Self {
            drop_duplicates: true,
            drop_unlabeled: true,
            drop_skipped: true,
            simplify_form_types: false,
            simplify_field_types: false,
        }
    }
}

impl AnnotationFilter {
    /// Yield every form, including duplicates, unlabeled and skipped ones.
    pub fn everything() -> Self {
        Self {
            drop_duplicates: false,
            drop_unlabeled: false,
            drop_skipped: false,
            simplify_form_types: false,
            simplify_field_types: false,
        }
    }

    /// Toggle fingerprint deduplication.
    pub fn with_drop_duplicates(mut self, drop_duplicates: bool) -> Self {
        self.drop_duplicates = drop_duplicates;
        self
    }

    /// Toggle dropping of NA-labelled forms.
    pub fn with_drop_unlabeled(mut self, drop_unlabeled: bool) -> Self {
        self.drop_unlabeled = drop_unlabeled;
        self
    }

    /// Toggle dropping of skipped forms.
    pub fn with_drop_skipped(mut self, drop_skipped: bool) -> Self {
        self.drop_skipped = drop_skipped;
        self
    }

    /// Toggle simplification of both label families at once.
    pub fn with_simplified_labels(mut self, simplify: bool) -> Self {
        self.simplify_form_types = simplify;
        self.simplify_field_types = simplify;
        self
    }
}

/// Form-type classifier hyperparameters and feature channels.
#[derive(Clone, Debug)]
pub struct FormModelConfig {
    /// Inverse L2 regularization strength.
    pub c: f64,
    /// Passes over the training data.
    pub epochs: usize,
    /// Initial SGD learning rate.
    pub learning_rate: f64,
    /// Seed for the per-epoch shuffle.
    pub seed: u64,
    /// Ordered feature channels composing the form vector.
    pub channels: Vec<ChannelSpec>,
}

impl Default for FormModelConfig {
    fn default() -> Self {
        Self {
            c: FORM_C,
            epochs: FORM_EPOCHS,
            learning_rate: FORM_LEARNING_RATE,
            seed: DEFAULT_SEED,
            channels: default_form_channels(),
        }
    }
}

impl FormModelConfig {
    /// Replace the shuffle seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the feature channel list.
    pub fn with_channels(mut self, channels: Vec<ChannelSpec>) -> Self {
        self.channels = channels;
        self
    }
}

/// Source of the form-type feature conditioning the field labeler in training.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainingPolicy {
    /// Ground-truth form types.
    Precise,
    /// Out-of-fold predictions of the form-type classifier.
    Realistic,
}

impl TrainingPolicy {
    /// Default L2 strength for this policy.
    pub fn default_c2(self) -> f64 {
        match self {
            TrainingPolicy::Precise => PRECISE_C2,
            TrainingPolicy::Realistic => REALISTIC_C2,
        }
    }
}

/// Field labeler hyperparameters.
#[derive(Clone, Debug)]
pub struct FieldModelConfig {
    /// Conditioning policy used in training.
    pub policy: TrainingPolicy,
    /// L2 strength; `None` uses the policy default.
    pub c2: Option<f64>,
    /// Passes over the training sequences.
    pub epochs: usize,
    /// Initial SGD learning rate.
    pub learning_rate: f64,
    /// Seed for the per-epoch shuffle.
    pub seed: u64,
    /// Folds used to compute out-of-fold form types under `Realistic`.
    pub realistic_folds: usize,
}

impl Default for FieldModelConfig {
    fn default() -> Self {
        Self {
            policy: TrainingPolicy::Precise,
            c2: None,
            epochs: FIELD_EPOCHS,
            learning_rate: FIELD_LEARNING_RATE,
            seed: DEFAULT_SEED,
            realistic_folds: DEFAULT_N_FOLDS,
        }
    }
}

impl FieldModelConfig {
    /// Replace the training policy.
    pub fn with_policy(mut self, policy: TrainingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the L2 strength.
    pub fn with_c2(mut self, c2: f64) -> Self {
        self.c2 = Some(c2);
        self
    }

    /// Replace the shuffle seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the number of realistic-label folds.
    pub fn with_realistic_folds(mut self, folds: usize) -> Self {
        self.realistic_folds = folds;
        self
    }

    /// L2 strength in effect.
    pub fn effective_c2(&self) -> f64 {
        self.c2.unwrap_or_else(|| self.policy.default_c2())
    }
}

/// Cross-validation settings.
#[derive(Clone, Debug)]
pub struct EvaluationConfig {
    /// Number of domain-grouped folds.
    pub n_folds: usize,
    /// Seed used for fold tie-breaking.
    pub seed: u64,
    /// Form-type stage settings.
    pub form: FormModelConfig,
    /// Field-type stage settings.
    pub field: FieldModelConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            n_folds: DEFAULT_N_FOLDS,
            seed: DEFAULT_SEED,
            form: FormModelConfig::default(),
            field: FieldModelConfig::default(),
        }
    }
}

impl EvaluationConfig {
    /// Replace the fold count.
    pub fn with_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }
}

/// Settings for building a [`crate::FormFieldClassifier`].
#[derive(Clone, Debug, Default)]
pub struct ClassifierConfig {
    /// Corpus scan settings.
    pub filter: AnnotationFilter,
    /// Form-type stage settings.
    pub form: FormModelConfig,
    /// Field-type stage settings.
    pub field: FieldModelConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_filter_defaults_drop_noise() {
        let filter = AnnotationFilter::default();
        assert!(filter.drop_duplicates && filter.drop_unlabeled && filter.drop_skipped);
        assert!(!filter.simplify_form_types && !filter.simplify_field_types);
        let simplified = filter.with_simplified_labels(true).with_drop_duplicates(false);
        assert!(simplified.simplify_form_types && simplified.simplify_field_types);
        assert!(!simplified.drop_duplicates);
    }

    #[test]
    fn field_config_c2_follows_policy_unless_overridden() {
        let precise = FieldModelConfig::default();
        assert_eq!(precise.effective_c2(), PRECISE_C2);
        let realistic = precise.clone().with_policy(TrainingPolicy::Realistic);
        assert_eq!(realistic.effective_c2(), REALISTIC_C2);
        assert_eq!(realistic.with_c2(0.5).effective_c2(), 0.5);
    }
}
