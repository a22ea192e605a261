//! Label schemas: ordered full-name/short-code tables per label family.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::schema::{FIELD_TYPES_KEY, FORM_TYPES_KEY, NA_NAME, SKIP_NAME};
use crate::errors::FormError;
use crate::types::{LabelCode, LabelName};

/// One `{full, short}` entry of a label family.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelType {
    /// Human-readable label name.
    pub full: LabelName,
    /// Short code stored in the index.
    pub short: LabelCode,
}

impl LabelType {
    /// Convenience constructor.
    pub fn new(full: impl Into<LabelName>, short: impl Into<LabelCode>) -> Self {
        Self {
            full: full.into(),
            short: short.into(),
        }
    }
}

/// Serialized shape of one label family in `config.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelFamilyConfig {
    /// Ordered label types.
    pub types: Vec<LabelType>,
    /// Code of unannotated items.
    #[serde(rename = "NA_value")]
    pub na_value: LabelCode,
    /// Code of items the annotator chose to skip.
    pub skip_value: LabelCode,
    /// Fine code to coarse code mapping.
    #[serde(default)]
    pub simplify_map: IndexMap<LabelCode, LabelCode>,
}

/// Serialized corpus configuration (`config.json`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Form-type family.
    pub form_types: LabelFamilyConfig,
    /// Field-type family.
    pub field_types: LabelFamilyConfig,
}

impl CorpusConfig {
    /// Build both schemas, validating code uniqueness and simplify targets.
    pub fn schemas(&self) -> Result<(LabelSchema, LabelSchema), FormError> {
        Ok((
            LabelSchema::from_config(LabelFamily::FormTypes, &self.form_types)?,
            LabelSchema::from_config(LabelFamily::FieldTypes, &self.field_types)?,
        ))
    }
}

/// Label family a schema describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LabelFamily {
    /// Labels of whole forms.
    FormTypes,
    /// Labels of individual form fields.
    FieldTypes,
}

impl LabelFamily {
    /// JSON key of the family in `config.json`.
    pub fn as_str(self) -> &'static str {
        match self {
            LabelFamily::FormTypes => FORM_TYPES_KEY,
            LabelFamily::FieldTypes => FIELD_TYPES_KEY,
        }
    }
}

impl fmt::Display for LabelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved, immutable schema for one label family.
#[derive(Clone, Debug)]
pub struct LabelSchema {
    family: LabelFamily,
    types: IndexMap<LabelName, LabelCode>,
    names: HashMap<LabelCode, LabelName>,
    na_value: LabelCode,
    skip_value: LabelCode,
    simplify_map: IndexMap<LabelCode, LabelCode>,
}

impl LabelSchema {
    /// Build a schema from its serialized family configuration.
    ///
    /// Fails with `Configuration` on duplicate codes or names, and when a
    /// simplify-map entry refers to an unknown code.
    pub fn from_config(family: LabelFamily, config: &LabelFamilyConfig) -> Result<Self, FormError> {
        let mut types = IndexMap::new();
        let mut names = HashMap::new();
        for label in &config.types {
            if label.short.is_empty() {
                return Err(FormError::Configuration(format!(
                    "{family}: label '{}' has an empty code",
                    label.full
                )));
            }
            if names.insert(label.short.clone(), label.full.clone()).is_some() {
                return Err(FormError::Configuration(format!(
                    "{family}: duplicate code '{}'",
                    label.short
                )));
            }
            if types.insert(label.full.clone(), label.short.clone()).is_some() {
                return Err(FormError::Configuration(format!(
                    "{family}: duplicate label name '{}'",
                    label.full
                )));
            }
        }
        if config.na_value == config.skip_value {
            return Err(FormError::Configuration(format!(
                "{family}: NA_value and skip_value must differ"
            )));
        }
        let schema = Self {
            family,
            types,
            names,
            na_value: config.na_value.clone(),
            skip_value: config.skip_value.clone(),
            simplify_map: config.simplify_map.clone(),
        };
        for (fine, coarse) in &schema.simplify_map {
            for code in [fine, coarse] {
                if !schema.is_known(code) {
                    return Err(FormError::Configuration(format!(
                        "{family}: simplify_map refers to unknown code '{code}'"
                    )));
                }
            }
        }
        Ok(schema)
    }

    /// Family described by this schema.
    pub fn family(&self) -> LabelFamily {
        self.family
    }

    /// Code reserved for unannotated items.
    pub fn na_value(&self) -> &str {
        &self.na_value
    }

    /// Code reserved for skipped items.
    pub fn skip_value(&self) -> &str {
        &self.skip_value
    }

    /// Ordered `{full: short}` table.
    pub fn types(&self) -> &IndexMap<LabelName, LabelCode> {
        &self.types
    }

    /// Type codes in schema order (reserved codes only when listed).
    pub fn codes(&self) -> Vec<&str> {
        self.types.values().map(String::as_str).collect()
    }

    fn is_known(&self, code: &str) -> bool {
        self.names.contains_key(code) || code == self.na_value || code == self.skip_value
    }

    /// Accept `code` when it is a type code or a reserved code.
    pub fn validate_code(&self, code: &str) -> Result<(), FormError> {
        if self.is_known(code) {
            Ok(())
        } else {
            Err(FormError::UnknownLabel {
                family: self.family.to_string(),
                code: code.to_string(),
            })
        }
    }

    /// Full name of `code`.
    pub fn full_name(&self, code: &str) -> Result<&str, FormError> {
        if let Some(name) = self.names.get(code) {
            return Ok(name);
        }
        if code == self.na_value {
            Ok(NA_NAME)
        } else if code == self.skip_value {
            Ok(SKIP_NAME)
        } else {
            Err(FormError::UnknownLabel {
                family: self.family.to_string(),
                code: code.to_string(),
            })
        }
    }

    /// Code of the label named `full`.
    pub fn code_for(&self, full: &str) -> Option<&str> {
        self.types.get(full).map(String::as_str)
    }

    /// Coarse code for `code`; codes without a mapping map to themselves.
    pub fn simplify<'a>(&'a self, code: &'a str) -> &'a str {
        self.simplify_map.get(code).map(String::as_str).unwrap_or(code)
    }

    /// Whether `code` carries an annotation (is not the NA code).
    pub fn is_annotated(&self, code: &str) -> bool {
        code != self.na_value
    }

    fn rank(&self, label: &str) -> Option<usize> {
        self.types
            .get_index_of(label)
            .or_else(|| self.types.values().position(|code| code == label))
    }

    /// Order `labels` (codes or full names) by schema position; labels the
    /// schema does not list follow in lexical order. Duplicates are removed.
    pub fn canonical_order<I, S>(&self, labels: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = labels.into_iter().map(|l| l.as_ref().to_string()).collect();
        let mut ranked: Vec<(usize, String)> = unique
            .into_iter()
            .map(|label| (self.rank(&label).unwrap_or(usize::MAX), label))
            .collect();
        ranked.sort();
        ranked.into_iter().map(|(_, label)| label).collect()
    }
}
