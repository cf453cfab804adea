use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::de::{opt_scalar_text, scalar_text};
use crate::types::{Composite, OptionItem, OptionsSource, SchemaCatalog};

/// Form and table identifiers: a letter followed by up to 19 word characters.
pub static FORM_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]{0,19}$").expect("form id pattern compiles")
});

/// Field identifiers become storage column names.
pub static FIELD_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]{0,63}$").expect("field id pattern compiles")
});

/// Maximum length of a form id.
pub const FORM_ID_MAX_LEN: usize = 20;

/// Columns the platform manages on every form table.
pub const RESERVED_FIELD_IDS: [&str; 7] = [
    "id",
    "dateCreated",
    "dateModified",
    "createdBy",
    "createdByName",
    "modifiedBy",
    "modifiedByName",
];

/// Accepted values of the universal `size` attribute.
pub const FIELD_SIZES: [&str; 3] = ["small", "medium", "large"];

#[must_use]
pub fn is_reserved_field_id(id: &str) -> bool {
    RESERVED_FIELD_IDS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(id))
}

// ---------------------------------------------------------------------------
// FormSpec
// ---------------------------------------------------------------------------

/// A declared form: metadata plus its ordered fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSpec {
    pub form: FormMeta,
    pub fields: Vec<FieldSpec>,
}

/// Form-level metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormMeta {
    pub id: String,
    #[serde(deserialize_with = "scalar_text")]
    pub name: String,
    /// Storage table; defaults to `id` during normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FormMeta {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            table_name: None,
            description: None,
        }
    }

    /// Table name, falling back to the form id.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table_name.as_deref().unwrap_or(&self.id)
    }
}

impl FormSpec {
    #[must_use]
    pub fn new(form: FormMeta, fields: Vec<FieldSpec>) -> Self {
        Self { form, fields }
    }

    /// Every form id this spec produces a document for: its own id plus the
    /// row forms, inline subforms and inline pages of its composite fields.
    #[must_use]
    pub fn declared_form_ids(&self, catalog: &SchemaCatalog) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        ids.insert(self.form.id.clone());
        collect_child_form_ids(&self.fields, catalog, &mut ids);
        ids
    }
}

fn collect_child_form_ids(
    fields: &[FieldSpec],
    catalog: &SchemaCatalog,
    ids: &mut BTreeSet<String>,
) {
    for field in fields {
        let Some(schema) = catalog.get(&field.field_type) else {
            continue;
        };
        match (schema.composite, field.body()) {
            (Composite::FormGrid, FieldBody::Columns(_)) => {
                if let Some(form_id) = field.str_attr("formId").filter(|id| !id.is_empty()) {
                    ids.insert(form_id.to_string());
                }
            }
            (Composite::Subform, FieldBody::Embedded(children)) => {
                if let Some(form_id) = field.str_attr("formId").filter(|id| !id.is_empty()) {
                    ids.insert(form_id.to_string());
                }
                collect_child_form_ids(children, catalog, ids);
            }
            (Composite::Pages, FieldBody::Pages(pages)) => {
                for page in pages {
                    if let Some(children) = &page.fields {
                        ids.insert(page.form_id.clone());
                        collect_child_form_ids(children, catalog, ids);
                    }
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// FieldSpec
// ---------------------------------------------------------------------------

/// One declared field.
///
/// The typed members cover the universal attributes and the recursive parts;
/// everything else a pattern reads lives in the flattened `attributes` bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub id: String,
    #[serde(deserialize_with = "scalar_text")]
    pub label: String,
    /// Registry key of the pattern that renders this field.
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_scalar_text"
    )]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_source: Option<OptionsSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldSpec>>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// The recursive part of a field, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldBody<'a> {
    Leaf,
    Columns(&'a [ColumnSpec]),
    Pages(&'a [PageRef]),
    Embedded(&'a [FieldSpec]),
}

impl FieldSpec {
    /// A bare field with no optional attributes set.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type: field_type.into(),
            required: None,
            readonly: None,
            default_value: None,
            size: None,
            options: None,
            options_source: None,
            columns: None,
            pages: None,
            fields: None,
            attributes: Map::new(),
        }
    }

    /// Fully-defaulted hidden field, used for foreign keys of row forms.
    #[must_use]
    pub fn hidden(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut field = Self::new(id.clone(), id, "hiddenField");
        field.required = Some(false);
        field.readonly = Some(false);
        field.default_value = Some(String::new());
        field.size = Some("medium".to_string());
        field
    }

    #[must_use]
    pub fn body(&self) -> FieldBody<'_> {
        if let Some(columns) = &self.columns {
            FieldBody::Columns(columns)
        } else if let Some(pages) = &self.pages {
            FieldBody::Pages(pages)
        } else if let Some(fields) = &self.fields {
            FieldBody::Embedded(fields)
        } else {
            FieldBody::Leaf
        }
    }

    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    #[must_use]
    pub fn str_attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn bool_attr(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn u64_attr(&self, key: &str) -> Option<u64> {
        self.attributes.get(key).and_then(Value::as_u64)
    }

    #[must_use]
    pub fn with_attr(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// ColumnSpec / PageRef
// ---------------------------------------------------------------------------

fn default_column_type() -> String {
    "textField".to_string()
}

/// Universal attributes a column carries in its bag rather than as members.
const COLUMN_BAG_KEYS: [&str; 4] = ["required", "readonly", "defaultValue", "size"];

/// One column of a grid-like field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub id: String,
    #[serde(deserialize_with = "scalar_text")]
    pub label: String,
    #[serde(rename = "type", default = "default_column_type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_source: Option<OptionsSource>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type: default_column_type(),
            editable: None,
            options: None,
            options_source: None,
            attributes: Map::new(),
        }
    }

    /// The column as a field of the row form.
    #[must_use]
    pub fn to_field(&self) -> FieldSpec {
        let mut attributes = self.attributes.clone();
        let required = attributes.remove("required").and_then(|v| v.as_bool());
        let readonly = attributes.remove("readonly").and_then(|v| v.as_bool());
        let default_value = attributes.remove("defaultValue").and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        });
        let size = attributes
            .remove("size")
            .and_then(|v| v.as_str().map(str::to_string));
        FieldSpec {
            id: self.id.clone(),
            label: self.label.clone(),
            field_type: self.field_type.clone(),
            required,
            readonly,
            default_value,
            size,
            options: self.options.clone(),
            options_source: self.options_source.clone(),
            columns: None,
            pages: None,
            fields: None,
            attributes,
        }
    }

    /// Inverse of [`ColumnSpec::to_field`]; composite members are dropped.
    #[must_use]
    pub fn from_field(field: FieldSpec, editable: Option<bool>) -> Self {
        let mut attributes = field.attributes;
        for key in COLUMN_BAG_KEYS {
            attributes.remove(key);
        }
        if let Some(required) = field.required {
            attributes.insert("required".into(), Value::Bool(required));
        }
        if let Some(readonly) = field.readonly {
            attributes.insert("readonly".into(), Value::Bool(readonly));
        }
        if let Some(default_value) = field.default_value {
            attributes.insert("defaultValue".into(), Value::String(default_value));
        }
        if let Some(size) = field.size {
            attributes.insert("size".into(), Value::String(size));
        }
        Self {
            id: field.id,
            label: field.label,
            field_type: field.field_type,
            editable,
            options: field.options,
            options_source: field.options_source,
            attributes,
        }
    }
}

/// One page of a multi-step form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRef {
    pub form_id: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Inline definition of the page's form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldSpec>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{PatternSchema, Tier};

    fn catalog() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        catalog.insert("textField", PatternSchema::new(Tier::Standard, ""));
        catalog.insert(
            "formGrid",
            PatternSchema::new(Tier::Enterprise, "").composite(Composite::FormGrid),
        );
        catalog.insert(
            "grid",
            PatternSchema::new(Tier::Advanced, "").composite(Composite::Grid),
        );
        catalog.insert(
            "multiPagedForm",
            PatternSchema::new(Tier::Enterprise, "").composite(Composite::Pages),
        );
        catalog
    }

    #[test]
    fn field_keeps_unknown_attributes_in_bag() {
        let field: FieldSpec = serde_json::from_value(json!({
            "id": "notes",
            "label": "Notes",
            "type": "textArea",
            "rows": 4,
            "placeholder": "Write here",
        }))
        .unwrap();
        assert_eq!(field.u64_attr("rows"), Some(4));
        assert_eq!(field.str_attr("placeholder"), Some("Write here"));
        assert_eq!(field.body(), FieldBody::Leaf);
    }

    #[test]
    fn field_serializes_back_to_input_shape() {
        let input = json!({
            "id": "qty",
            "label": "Quantity",
            "type": "textField",
            "required": true,
            "maxLength": 5,
        });
        let field: FieldSpec = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(serde_json::to_value(&field).unwrap(), input);
    }

    #[test]
    fn numeric_default_value_becomes_text() {
        let field: FieldSpec = serde_json::from_value(json!({
            "id": "qty", "label": 10, "type": "textField", "defaultValue": 1,
        }))
        .unwrap();
        assert_eq!(field.label, "10");
        assert_eq!(field.default_value.as_deref(), Some("1"));
    }

    #[test]
    fn body_reports_recursive_part() {
        let field: FieldSpec = serde_json::from_value(json!({
            "id": "items", "label": "Items", "type": "grid",
            "columns": [{"id": "sku", "label": "SKU"}],
        }))
        .unwrap();
        let FieldBody::Columns(columns) = field.body() else {
            panic!("expected columns");
        };
        assert_eq!(columns[0].field_type, "textField");
    }

    #[test]
    fn column_round_trips_through_field() {
        let mut column = ColumnSpec::new("sku", "SKU");
        column.attributes.insert("required".into(), json!(true));
        column.attributes.insert("placeholder".into(), json!("x"));
        let field = column.to_field();
        assert_eq!(field.required, Some(true));
        assert!(field.attr("required").is_none());
        assert_eq!(ColumnSpec::from_field(field, None), column);
    }

    #[test]
    fn reserved_ids_match_case_insensitively() {
        assert!(is_reserved_field_id("ID"));
        assert!(is_reserved_field_id("datecreated"));
        assert!(!is_reserved_field_id("identifier"));
    }

    #[test]
    fn declared_form_ids_include_children() {
        let spec: FormSpec = serde_json::from_value(json!({
            "form": {"id": "order", "name": "Order"},
            "fields": [
                {"id": "lines", "label": "Lines", "type": "formGrid", "formId": "order_lines",
                 "columns": [{"id": "sku", "label": "SKU"}]},
                {"id": "plain", "label": "Plain", "type": "grid",
                 "columns": [{"id": "a", "label": "A"}]},
                {"id": "wizard", "label": "Wizard", "type": "multiPagedForm",
                 "pages": [{"formId": "page_one", "label": "One",
                            "fields": [{"id": "x", "label": "X", "type": "textField"}]},
                           {"formId": "existing", "label": "Two"}]},
            ],
        }))
        .unwrap();
        let ids: Vec<_> = spec.declared_form_ids(&catalog()).into_iter().collect();
        assert_eq!(ids, vec!["order", "order_lines", "page_one"]);
    }

    #[test]
    fn id_patterns() {
        assert!(FORM_ID_PATTERN.is_match("customer_1"));
        assert!(!FORM_ID_PATTERN.is_match("1customer"));
        assert!(!FORM_ID_PATTERN.is_match("a23456789012345678901"));
        assert!(FIELD_ID_PATTERN.is_match("_internal"));
        assert!(!FIELD_ID_PATTERN.is_match("bad-id"));
    }
}
