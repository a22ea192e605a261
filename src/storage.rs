//! On-disk annotation corpus.
//!
//! Layout of a corpus directory:
//!
//! ```text
//! config.json          label schemas (form_types, field_types)
//! index.json           {relative path: PageRecord}
//! html/
//!     example.org-0.html
//!     foo.example.org-0.html
//! ```
//!
//! Page records are read-only during training and evaluation; annotations are
//! materialized from them on every scan and never persisted.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::annotation::FormAnnotation;
use crate::config::AnnotationFilter;
use crate::constants::storage::{
    CONFIG_FILE, FORM_COUNT_MISMATCH_MSG, HTML_DIR, HTML_EXTENSION, INDEX_FILE,
    MAX_FILENAME_ATTEMPTS,
};
use crate::domain::{site_domain, url_netloc};
use crate::errors::FormError;
use crate::html::{field_names, fields_to_annotate, parse_forms};
use crate::schema::{CorpusConfig, LabelSchema};
use crate::types::{FieldName, Fingerprint, LabelCode, PageUrl, RelativePath};

/// One stored page and its labels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// URL the page was downloaded from.
    pub url: PageUrl,
    /// One form-type code per `<form>`, in document order.
    pub forms: Vec<LabelCode>,
    /// One `{field name: field-type code}` map per `<form>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_html_fields: Option<Vec<BTreeMap<FieldName, LabelCode>>>,
}

/// Index document: page records keyed by relative content path.
pub type CorpusIndex = BTreeMap<RelativePath, PageRecord>;

/// Handle to a corpus directory.
#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Open a corpus rooted at `root` (nothing is read until needed).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Corpus root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the files and folders of a new corpus.
    pub fn initialize(&self, config: &CorpusConfig, index: Option<&CorpusIndex>) -> Result<(), FormError> {
        config.schemas()?;
        fs::create_dir_all(self.root.join(HTML_DIR))?;
        fs::write(self.root.join(CONFIG_FILE), serde_json::to_vec_pretty(config)?)?;
        self.write_index(index.unwrap_or(&CorpusIndex::new()))?;
        info!(root = %self.root.display(), "initialized corpus");
        Ok(())
    }

    /// Read `config.json`.
    pub fn config(&self) -> Result<CorpusConfig, FormError> {
        let path = self.root.join(CONFIG_FILE);
        let raw = fs::read_to_string(&path).map_err(|err| {
            FormError::Configuration(format!("failed reading {}: {err}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            FormError::Configuration(format!("failed parsing {}: {err}", path.display()))
        })
    }

    /// Form-type and field-type schemas.
    pub fn schemas(&self) -> Result<(LabelSchema, LabelSchema), FormError> {
        self.config()?.schemas()
    }

    /// Form-type schema.
    pub fn form_schema(&self) -> Result<LabelSchema, FormError> {
        Ok(self.schemas()?.0)
    }

    /// Field-type schema.
    pub fn field_schema(&self) -> Result<LabelSchema, FormError> {
        Ok(self.schemas()?.1)
    }

    /// Read `index.json`.
    pub fn read_index(&self) -> Result<CorpusIndex, FormError> {
        let path = self.root.join(INDEX_FILE);
        let raw = fs::read_to_string(&path).map_err(|err| {
            FormError::Configuration(format!("failed reading {}: {err}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            FormError::Configuration(format!("failed parsing {}: {err}", path.display()))
        })
    }

    /// Persist the index, sorted by path, through a temp file and rename.
    pub fn write_index(&self, index: &CorpusIndex) -> Result<(), FormError> {
        let path = self.root.join(INDEX_FILE);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(index)?)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Index records in scan order: sorted by `(site domain, path)`.
    pub fn load_index(&self) -> Result<Vec<(RelativePath, PageRecord)>, FormError> {
        Ok(sorted_records(self.read_index()?))
    }

    /// Raw content of a stored page.
    pub fn read_page(&self, path: &str) -> Result<String, FormError> {
        Ok(fs::read_to_string(self.root.join(path))?)
    }

    /// Stream annotations in scan order.
    ///
    /// Per form: the type code is validated, optionally simplified, dropped
    /// when NA or skip (as configured), then dropped when its fingerprint was
    /// already seen earlier in the same scan. Unknown codes and unreadable
    /// pages surface as `Err` items.
    pub fn iter_annotations(&self, filter: &AnnotationFilter) -> Result<AnnotationIter, FormError> {
        let (form_schema, field_schema) = self.schemas()?;
        let pages = self
            .load_index()?
            .into_iter()
            .map(|(path, record)| (path, Arc::new(record)))
            .collect::<Vec<_>>()
            .into_iter();
        Ok(AnnotationIter {
            root: self.root.clone(),
            filter: filter.clone(),
            form_schema: Arc::new(form_schema),
            field_schema: Arc::new(field_schema),
            pages,
            pending: VecDeque::new(),
            seen: HashSet::new(),
        })
    }

    /// Collect [`Storage::iter_annotations`], failing on the first error.
    pub fn annotations(&self, filter: &AnnotationFilter) -> Result<Vec<FormAnnotation>, FormError> {
        self.iter_annotations(filter)?.collect()
    }

    /// Every integrity violation in the corpus.
    ///
    /// A page is checked for a readable content file, a form label per live
    /// `<form>`, a field-label map per form, and map keys equal to the live
    /// annotatable field names.
    pub fn audit(&self) -> Result<Vec<FormError>, FormError> {
        let mut problems = Vec::new();
        for (path, record) in self.read_index()? {
            let content = match self.read_page(&path) {
                Ok(content) => content,
                Err(err) => {
                    problems.push(integrity(&path, format!("content not readable: {err}")));
                    continue;
                }
            };
            let forms = parse_forms(&content);
            if forms.len() != record.forms.len() {
                problems.push(integrity(
                    &path,
                    format!(
                        "{FORM_COUNT_MISMATCH_MSG}: expected {}, stored {}",
                        forms.len(),
                        record.forms.len()
                    ),
                ));
            }
            let Some(maps) = record.visible_html_fields.as_ref() else {
                problems.push(integrity(&path, "no field labels".to_string()));
                continue;
            };
            if maps.len() != forms.len() {
                problems.push(integrity(
                    &path,
                    format!(
                        "invalid number of field label maps: expected {}, stored {}",
                        forms.len(),
                        maps.len()
                    ),
                ));
                continue;
            }
            for (idx, (form, map)) in forms.iter().zip(maps).enumerate() {
                let live: BTreeSet<String> = field_names(&fields_to_annotate(form)).into_iter().collect();
                let stored: BTreeSet<String> = map.keys().cloned().collect();
                if live != stored {
                    problems.push(integrity(
                        &path,
                        format!("invalid field names for form #{idx}: expected {live:?}, found {stored:?}"),
                    ));
                }
            }
        }
        Ok(problems)
    }

    /// Log every integrity violation and return how many were found.
    pub fn check(&self) -> Result<usize, FormError> {
        let problems = self.audit()?;
        for problem in &problems {
            warn!(error = %problem, "corpus integrity violation");
        }
        if problems.is_empty() {
            info!(root = %self.root.display(), "corpus status: OK");
        } else {
            info!(root = %self.root.display(), errors = problems.len(), "corpus status: errors found");
        }
        Ok(problems.len())
    }

    /// Store a new page and its labels; returns the new relative path.
    ///
    /// Missing form labels default to the form NA code and missing field
    /// maps to the field NA code for every annotatable field. The content
    /// file is written before the index is updated.
    pub fn add_result(
        &self,
        content: &str,
        url: &str,
        form_labels: Option<Vec<LabelCode>>,
        field_label_maps: Option<Vec<BTreeMap<FieldName, LabelCode>>>,
    ) -> Result<RelativePath, FormError> {
        let (form_schema, field_schema) = self.schemas()?;
        let forms = parse_forms(content);
        let rel_path = self.generate_filename(url)?;

        let form_labels = match form_labels {
            Some(labels) => {
                if labels.len() != forms.len() {
                    return Err(integrity(
                        &rel_path,
                        format!(
                            "{FORM_COUNT_MISMATCH_MSG}: expected {}, got {}",
                            forms.len(),
                            labels.len()
                        ),
                    ));
                }
                for code in &labels {
                    form_schema.validate_code(code)?;
                }
                labels
            }
            None => vec![form_schema.na_value().to_string(); forms.len()],
        };
        let field_label_maps = match field_label_maps {
            Some(maps) => {
                if maps.len() != forms.len() {
                    return Err(integrity(
                        &rel_path,
                        format!(
                            "invalid number of field label maps: expected {}, got {}",
                            forms.len(),
                            maps.len()
                        ),
                    ));
                }
                for code in maps.iter().flat_map(|map| map.values()) {
                    field_schema.validate_code(code)?;
                }
                maps
            }
            None => forms
                .iter()
                .map(|form| {
                    field_names(&fields_to_annotate(form))
                        .into_iter()
                        .map(|name| (name, field_schema.na_value().to_string()))
                        .collect()
                })
                .collect(),
        };

        fs::create_dir_all(self.root.join(HTML_DIR))?;
        fs::write(self.root.join(&rel_path), content)?;
        let mut index = self.read_index()?;
        index.insert(
            rel_path.clone(),
            PageRecord {
                url: url.to_string(),
                forms: form_labels,
                visible_html_fields: Some(field_label_maps),
            },
        );
        self.write_index(&index)?;
        info!(path = %rel_path, url, forms = forms.len(), "stored page");
        Ok(rel_path)
    }

    /// First free `html/<host[:port]>-<n>.html` name for `url`.
    pub fn generate_filename(&self, url: &str) -> Result<RelativePath, FormError> {
        let host = url_netloc(url)?;
        for idx in 0..MAX_FILENAME_ATTEMPTS {
            let rel_path = format!("{HTML_DIR}/{host}-{idx}.{HTML_EXTENSION}");
            if !self.root.join(&rel_path).exists() {
                return Ok(rel_path);
            }
        }
        Err(FormError::FilenameExhaustion {
            host,
            attempts: MAX_FILENAME_ATTEMPTS,
        })
    }

    /// Form-type counts, most common first.
    ///
    /// Without deduplication the raw index labels are counted (NA included);
    /// otherwise the counts of a default scan.
    pub fn form_type_counts(&self, drop_duplicates: bool, simplify: bool) -> Result<IndexMap<LabelCode, usize>, FormError> {
        let mut counts: BTreeMap<LabelCode, usize> = BTreeMap::new();
        if drop_duplicates {
            let filter = AnnotationFilter::default().with_simplified_labels(simplify);
            for annotation in self.iter_annotations(&filter)? {
                *counts.entry(annotation?.form_type().to_string()).or_default() += 1;
            }
        } else {
            let form_schema = self.form_schema()?;
            for record in self.read_index()?.values() {
                for code in &record.forms {
                    let code = if simplify { form_schema.simplify(code) } else { code };
                    *counts.entry(code.to_string()).or_default() += 1;
                }
            }
        }
        let mut ordered: Vec<(LabelCode, usize)> = counts.into_iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ordered.into_iter().collect())
    }

    /// `{fingerprint: form type}` for every annotated, non-duplicate form.
    pub fn fingerprints(&self) -> Result<BTreeMap<Fingerprint, LabelCode>, FormError> {
        let mut out = BTreeMap::new();
        for annotation in self.iter_annotations(&AnnotationFilter::default())? {
            let annotation = annotation?;
            out.insert(annotation.fingerprint(), annotation.form_type().to_string());
        }
        Ok(out)
    }
}

fn integrity(path: &str, details: String) -> FormError {
    FormError::Integrity {
        path: path.to_string(),
        details,
    }
}

fn sorted_records(index: CorpusIndex) -> Vec<(RelativePath, PageRecord)> {
    let mut records: Vec<(String, RelativePath, PageRecord)> = index
        .into_iter()
        .map(|(path, record)| (site_domain(&record.url), path, record))
        .collect();
    records.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    records
        .into_iter()
        .map(|(_, path, record)| (path, record))
        .collect()
}

/// Streaming corpus scan returned by [`Storage::iter_annotations`].
pub struct AnnotationIter {
    root: PathBuf,
    filter: AnnotationFilter,
    form_schema: Arc<LabelSchema>,
    field_schema: Arc<LabelSchema>,
    pages: std::vec::IntoIter<(RelativePath, Arc<PageRecord>)>,
    pending: VecDeque<Result<FormAnnotation, FormError>>,
    seen: HashSet<Fingerprint>,
}

impl AnnotationIter {
    fn load_page(&mut self, path: RelativePath, record: Arc<PageRecord>) {
        let content = match fs::read_to_string(self.root.join(&path)) {
            Ok(content) => content,
            Err(err) => {
                self.pending.push_back(Err(err.into()));
                return;
            }
        };
        let forms = parse_forms(&content);
        if forms.len() != record.forms.len() {
            warn!(
                path = %path,
                live = forms.len(),
                stored = record.forms.len(),
                FORM_COUNT_MISMATCH_MSG
            );
        }
        for (idx, (form, code)) in forms.into_iter().zip(&record.forms).enumerate() {
            match self.resolve(&path, &record, idx, form, code) {
                Ok(Some(annotation)) => self.pending.push_back(Ok(annotation)),
                Ok(None) => {}
                Err(err) => self.pending.push_back(Err(err)),
            }
        }
    }

    fn resolve(
        &mut self,
        path: &str,
        record: &Arc<PageRecord>,
        idx: usize,
        form: crate::html::HtmlElement,
        code: &str,
    ) -> Result<Option<FormAnnotation>, FormError> {
        self.form_schema.validate_code(code)?;
        let code = if self.filter.simplify_form_types {
            self.form_schema.simplify(code)
        } else {
            code
        };
        if self.filter.drop_unlabeled && code == self.form_schema.na_value() {
            return Ok(None);
        }
        if self.filter.drop_skipped && code == self.form_schema.skip_value() {
            return Ok(None);
        }

        let mut field_labels = BTreeMap::new();
        if let Some(map) = record
            .visible_html_fields
            .as_ref()
            .and_then(|maps| maps.get(idx))
        {
            for (name, field_code) in map {
                self.field_schema.validate_code(field_code)?;
                let field_code = if self.filter.simplify_field_types {
                    self.field_schema.simplify(field_code)
                } else {
                    field_code
                };
                field_labels.insert(name.clone(), field_code.to_string());
            }
        }

        let annotation = FormAnnotation::new(
            form,
            code.to_string(),
            idx,
            path.to_string(),
            Arc::clone(record),
            field_labels,
            Arc::clone(&self.form_schema),
            Arc::clone(&self.field_schema),
        );
        if self.filter.drop_duplicates && !self.seen.insert(annotation.fingerprint()) {
            debug!(path, index = idx, "skipping duplicate form");
            return Ok(None);
        }
        Ok(Some(annotation))
    }
}

impl Iterator for AnnotationIter {
    type Item = Result<FormAnnotation, FormError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let (path, record) = self.pages.next()?;
            self.load_page(path, record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LabelFamilyConfig, LabelType};
    use tempfile::tempdir;

    fn config() -> CorpusConfig {
        CorpusConfig {
            form_types: LabelFamilyConfig {
                types: vec![
                    LabelType::new("search", "s"),
                    LabelType::new("login", "l"),
                    LabelType::new("password/login recovery", "p"),
                ],
                na_value: "X".into(),
                skip_value: "-".into(),
                simplify_map: IndexMap::from([("p".to_string(), "l".to_string())]),
            },
            field_types: LabelFamilyConfig {
                types: vec![
                    LabelType::new("username", "l"),
                    LabelType::new("password", "p"),
                    LabelType::new("search query", "q"),
                ],
                na_value: "XX".into(),
                skip_value: "--".into(),
                simplify_map: IndexMap::new(),
            },
        }
    }

    const SEARCH: &str = r#"<form action="/s"><input name="q"></form>"#;
    const LOGIN: &str =
        r#"<form method="post"><input name="user"><input type="password" name="pw"></form>"#;

    fn storage() -> (tempfile::TempDir, Storage) {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.initialize(&config(), None).unwrap();
        (dir, storage)
    }

    #[test]
    fn add_result_fills_missing_labels_with_na() {
        let (_dir, storage) = storage();
        let page = format!("<html><body>{SEARCH}{LOGIN}</body></html>");
        let path = storage.add_result(&page, "http://example.org/a", None, None).unwrap();
        assert_eq!(path, "html/example.org-0.html");
        let index = storage.read_index().unwrap();
        let record = &index[&path];
        assert_eq!(record.forms, vec!["X", "X"]);
        let maps = record.visible_html_fields.as_ref().unwrap();
        assert_eq!(maps[0].get("q").map(String::as_str), Some("XX"));
        assert_eq!(maps[1].len(), 2);
        assert_eq!(storage.check().unwrap(), 0);
    }

    #[test]
    fn add_result_rejects_label_count_mismatch() {
        let (_dir, storage) = storage();
        let err = storage
            .add_result(SEARCH, "http://example.org", Some(vec!["s".into(), "l".into()]), None)
            .unwrap_err();
        assert!(matches!(err, FormError::Integrity { .. }));
        assert!(storage.read_index().unwrap().is_empty());
    }

    #[test]
    fn generate_filename_skips_taken_names() {
        let (_dir, storage) = storage();
        storage.add_result(SEARCH, "http://example.org", None, None).unwrap();
        assert_eq!(
            storage.generate_filename("example.org/other").unwrap(),
            "html/example.org-1.html"
        );
        assert_eq!(
            storage.generate_filename("http://example.org:8080/").unwrap(),
            "html/example.org:8080-0.html"
        );
    }

    #[test]
    fn iter_annotations_drops_unlabeled_skipped_and_duplicates() {
        let (_dir, storage) = storage();
        let q = BTreeMap::from([("q".to_string(), "q".to_string())]);
        storage
            .add_result(SEARCH, "http://b.example.com", Some(vec!["s".into()]), Some(vec![q.clone()]))
            .unwrap();
        storage
            .add_result(SEARCH, "http://a.example.org", Some(vec!["s".into()]), Some(vec![q]))
            .unwrap();
        storage
            .add_result(LOGIN, "http://other.net", Some(vec!["-".into()]), None)
            .unwrap();
        storage.add_result(LOGIN, "http://third.net", None, None).unwrap();

        let all = storage.annotations(&AnnotationFilter::everything()).unwrap();
        assert_eq!(all.len(), 4);

        let kept = storage.annotations(&AnnotationFilter::default()).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].form_type(), "s");
        assert_eq!(kept[0].field_types(), vec!["q"]);
        assert!(kept[0].fields_annotated());

        let first_two = storage
            .annotations(&AnnotationFilter::default().with_drop_duplicates(false))
            .unwrap();
        assert_eq!(first_two.len(), 2);
        assert_eq!(first_two[0].site_domain(), "example");
        assert_eq!(first_two[0].url(), "http://a.example.org");
    }

    #[test]
    fn iter_annotations_simplifies_and_rejects_unknown_codes() {
        let (_dir, storage) = storage();
        storage
            .add_result(LOGIN, "http://example.org", Some(vec!["p".into()]), None)
            .unwrap();
        let simplified = storage
            .annotations(&AnnotationFilter::default().with_simplified_labels(true))
            .unwrap();
        assert_eq!(simplified[0].form_type(), "l");
        assert_eq!(simplified[0].form_type_full().unwrap(), "login");
        assert!(!simplified[0].fields_annotated());
        assert!(!simplified[0].fields_partially_annotated());

        let mut index = storage.read_index().unwrap();
        for record in index.values_mut() {
            record.forms = vec!["zz".into()];
        }
        storage.write_index(&index).unwrap();
        let err = storage.annotations(&AnnotationFilter::default()).unwrap_err();
        assert!(matches!(err, FormError::UnknownLabel { .. }));
    }

    #[test]
    fn check_counts_every_violation() {
        let (_dir, storage) = storage();
        let path = storage.add_result(LOGIN, "http://example.org", None, None).unwrap();
        let mut index = storage.read_index().unwrap();
        let record = index.get_mut(&path).unwrap();
        record.forms.push("X".into());
        if let Some(maps) = record.visible_html_fields.as_mut() {
            maps[0].remove("pw");
        }
        index.insert(
            "html/missing-0.html".into(),
            PageRecord {
                url: "http://missing.org".into(),
                forms: vec![],
                visible_html_fields: None,
            },
        );
        storage.write_index(&index).unwrap();
        assert_eq!(storage.check().unwrap(), 3);
    }

    #[test]
    fn form_type_counts_raw_and_deduplicated() {
        let (_dir, storage) = storage();
        for url in ["http://a.org", "http://b.org"] {
            storage
                .add_result(SEARCH, url, Some(vec!["s".into()]), None)
                .unwrap();
        }
        storage.add_result(LOGIN, "http://c.org", Some(vec!["p".into()]), None).unwrap();
        let raw = storage.form_type_counts(false, true).unwrap();
        assert_eq!(raw.get_index(0), Some((&"s".to_string(), &2)));
        assert_eq!(raw.get("l"), Some(&1));
        let dedup = storage.form_type_counts(true, false).unwrap();
        assert_eq!(dedup.get("s"), Some(&1));
        assert_eq!(storage.fingerprints().unwrap().len(), 2);
    }
}
