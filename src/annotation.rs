//! Labeled form values produced by a corpus scan.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::site_domain;
use crate::errors::FormError;
use crate::fingerprint::fingerprint;
use crate::html::{HtmlElement, fields_to_annotate};
use crate::schema::LabelSchema;
use crate::storage::PageRecord;
use crate::types::{FieldName, Fingerprint, LabelCode, LabelName, RelativePath, SiteDomain};

/// One labeled `<form>` with its resolved field labels.
///
/// Everything beyond the stored labels is derived on demand; the value is
/// immutable once built.
#[derive(Clone, Debug)]
pub struct FormAnnotation {
    form: HtmlElement,
    form_type: LabelCode,
    index: usize,
    path: RelativePath,
    page: Arc<PageRecord>,
    field_labels: BTreeMap<FieldName, LabelCode>,
    form_schema: Arc<LabelSchema>,
    field_schema: Arc<LabelSchema>,
}

impl FormAnnotation {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        form: HtmlElement,
        form_type: LabelCode,
        index: usize,
        path: RelativePath,
        page: Arc<PageRecord>,
        field_labels: BTreeMap<FieldName, LabelCode>,
        form_schema: Arc<LabelSchema>,
        field_schema: Arc<LabelSchema>,
    ) -> Self {
        Self {
            form,
            form_type,
            index,
            path,
            page,
            field_labels,
            form_schema,
            field_schema,
        }
    }

    /// The form element.
    pub fn form(&self) -> &HtmlElement {
        &self.form
    }

    /// Form type code (after optional simplification).
    pub fn form_type(&self) -> &str {
        &self.form_type
    }

    /// Full name of the form type.
    pub fn form_type_full(&self) -> Result<LabelName, FormError> {
        self.form_schema
            .full_name(&self.form_type)
            .map(str::to_string)
    }

    /// Position of the form among the page's forms.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Page path relative to the corpus root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Page record the form came from.
    pub fn page(&self) -> &PageRecord {
        &self.page
    }

    /// Page URL.
    pub fn url(&self) -> &str {
        &self.page.url
    }

    /// Grouping key for cross-validation.
    pub fn site_domain(&self) -> SiteDomain {
        site_domain(&self.page.url)
    }

    /// Field-name to field-type code map (after optional simplification).
    pub fn field_labels(&self) -> &BTreeMap<FieldName, LabelCode> {
        &self.field_labels
    }

    /// Form-type schema.
    pub fn form_schema(&self) -> &LabelSchema {
        &self.form_schema
    }

    /// Field-type schema.
    pub fn field_schema(&self) -> &LabelSchema {
        &self.field_schema
    }

    /// Fields to annotate, in document order.
    pub fn field_elements(&self) -> Vec<&HtmlElement> {
        fields_to_annotate(&self.form)
    }

    /// Field type code per annotatable field, in document order.
    ///
    /// Fields sharing a name share a label; names absent from the stored map
    /// read as the NA code.
    pub fn field_types(&self) -> Vec<LabelCode> {
        let na = self.field_schema.na_value();
        self.field_elements()
            .into_iter()
            .map(|field| {
                field
                    .name()
                    .and_then(|name| self.field_labels.get(name))
                    .map_or_else(|| na.to_string(), Clone::clone)
            })
            .collect()
    }

    /// Full field type name per annotatable field, in document order.
    pub fn field_types_full(&self) -> Result<Vec<LabelName>, FormError> {
        self.field_types()
            .iter()
            .map(|code| self.field_schema.full_name(code).map(str::to_string))
            .collect()
    }

    /// No annotatable field carries the NA code.
    pub fn fields_annotated(&self) -> bool {
        self.field_types()
            .iter()
            .all(|code| self.field_schema.is_annotated(code))
    }

    /// Some fields are annotated and some are not.
    pub fn fields_partially_annotated(&self) -> bool {
        let types = self.field_types();
        let annotated = types
            .iter()
            .filter(|code| self.field_schema.is_annotated(code))
            .count();
        annotated > 0 && annotated < types.len()
    }

    /// Deduplication key, hidden inputs excluded.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.form, true)
    }
}
