/// Constants used by the on-disk corpus layout.
pub mod storage {
    /// Corpus configuration document (label schemas).
    pub const CONFIG_FILE: &str = "config.json";
    /// Corpus index document (page records keyed by relative path).
    pub const INDEX_FILE: &str = "index.json";
    /// Directory holding raw page contents.
    pub const HTML_DIR: &str = "html";
    /// Extension of stored page files.
    pub const HTML_EXTENSION: &str = "html";
    /// Upper bound on numeric suffixes tried when generating a page file name.
    pub const MAX_FILENAME_ATTEMPTS: usize = 100_000;
    /// Scheme prepended to URLs that were stored without one.
    pub const DEFAULT_URL_SCHEME: &str = "http://";
    /// Log message used when a page's stored labels disagree with its live forms.
    pub const FORM_COUNT_MISMATCH_MSG: &str = "stored form labels do not match live form count";
}

/// Constants used by schema resolution.
pub mod schema {
    /// JSON key of the form-type label family.
    pub const FORM_TYPES_KEY: &str = "form_types";
    /// JSON key of the field-type label family.
    pub const FIELD_TYPES_KEY: &str = "field_types";
    /// Full name reported for the NA code when the schema does not list it.
    pub const NA_NAME: &str = "NOT ANNOTATED";
    /// Full name reported for the skip code when the schema does not list it.
    pub const SKIP_NAME: &str = "skip";
}

/// Constants used by feature extraction.
pub mod features {
    /// Minimum share of digits for a select option to get a numeric signature.
    pub const NUMBER_PATTERN_RATIO: f64 = 0.3;
    /// Number of trailing tokens kept from the text preceding a field.
    pub const TEXT_BEFORE_TOKENS: usize = 6;
    /// Number of leading tokens kept from the text following a field.
    pub const TEXT_AFTER_TOKENS: usize = 5;
    /// Separator between channel name and column name in union feature names.
    pub const UNION_NAME_SEPARATOR: &str = "__";
    /// Base URL relative form actions are resolved against.
    pub const ACTION_BASE_URL: &str = "http://form.invalid/";
    /// Separator between a feature name and its categorical value.
    pub const CATEGORICAL_SEPARATOR: &str = "=";
    /// Stop words removed from link text.
    pub const LINK_STOP_WORDS: &[&str] = &["and", "or", "of"];
    /// Stop words removed from label text.
    pub const ENGLISH_STOP_WORDS: &[&str] = &[
        "a", "about", "above", "after", "again", "all", "am", "an", "and", "any", "are", "as",
        "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
        "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
        "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
        "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most",
        "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our",
        "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such", "than",
        "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this",
        "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were",
        "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "you",
        "your", "yours",
    ];
}

/// Constants used by the form-type and field-type models.
pub mod models {
    /// Default seed for every model that shuffles its training data.
    pub const DEFAULT_SEED: u64 = 0;
    /// Inverse L2 regularization strength of the form-type classifier.
    pub const FORM_C: f64 = 5.0;
    /// Passes over the training data for the form-type classifier.
    pub const FORM_EPOCHS: usize = 40;
    /// Initial learning rate of the form-type classifier.
    pub const FORM_LEARNING_RATE: f64 = 0.5;
    /// L2 strength of the field labeler trained on ground-truth form types.
    pub const PRECISE_C2: f64 = 0.0236;
    /// L2 strength of the field labeler trained on out-of-fold form types.
    pub const REALISTIC_C2: f64 = 0.032;
    /// Passes over the training data for the field labeler.
    pub const FIELD_EPOCHS: usize = 60;
    /// Initial learning rate of the field labeler.
    pub const FIELD_LEARNING_RATE: f64 = 0.2;
    /// Model names used in `UntrainedModel` errors.
    pub const FORM_MODEL_NAME: &str = "form type classifier";
    /// Model names used in `UntrainedModel` errors.
    pub const FIELD_MODEL_NAME: &str = "field type labeler";
}

/// Constants used by cross-validation.
pub mod evaluation {
    /// Default number of grouped folds.
    pub const DEFAULT_N_FOLDS: usize = 10;
    /// Smallest usable fold count.
    pub const MIN_N_FOLDS: usize = 2;
}

/// Constants used by model bundle encoding.
pub mod artifact {
    /// Prefix marker for bitcode-encoded payloads.
    pub const BITCODE_PREFIX: u8 = b'B';
    /// Version tag for bundle compatibility checks.
    pub const BUNDLE_VERSION: u8 = 1;
}
