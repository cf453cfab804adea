//! Defaulting pass.
//!
//! Fills every optional attribute a renderer reads so that renderers never
//! branch on absence. Filling is fill-only (present values are never
//! replaced), which makes the pass idempotent. Default tables are plain
//! `serde_json` maps a caller can merge into, and [`DerivationRule`]s compute
//! values from other attributes after the tables have been applied.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::schema::{ColumnSpec, FieldSpec, FormSpec, PageRef, FORM_ID_MAX_LEN};
use crate::traits::SpecNormalizer;

/// Form ids are clipped to this many characters before a derived suffix.
const DERIVED_PREFIX_LEN: usize = 12;

// ---------------------------------------------------------------------------
// DerivationRule
// ---------------------------------------------------------------------------

/// Computes a default from other attributes of the same field.
///
/// Rules run after the default tables, in registration order. A rule must only
/// fill what is absent so that normalization stays idempotent.
pub trait DerivationRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// `owner_form_id` is the id of the form the field is stored in.
    fn apply(&self, owner_form_id: &str, field: &mut FieldSpec);
}

/// True when the field has no validation block or an empty one.
fn lacks_validation(field: &FieldSpec) -> bool {
    match field.attr("validation") {
        None | Some(Value::Null) => true,
        Some(Value::Object(block)) => block.is_empty(),
        Some(_) => false,
    }
}

fn missing_text(field: &FieldSpec, key: &str) -> bool {
    field.str_attr(key).map_or(true, str::is_empty)
}

/// Lower-cased words of an identifier or label (`contactNumber`, `e_mail`,
/// `Email Address`, `EMAIL`).
fn tokens(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in text.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Regex validation for contact-looking text fields: email, phone, and
/// numeric quantities, detected from the id or label.
pub struct ContactValidationRule;

const EMAIL_WORDS: [&str; 2] = ["email", "mail"];
const PHONE_WORDS: [&str; 6] = ["phone", "mobile", "tel", "telephone", "cell", "contactnumber"];
const NUMERIC_WORDS: [&str; 7] = ["age", "quantity", "qty", "count", "amount", "price", "cost"];

impl ContactValidationRule {
    fn classify(field: &FieldSpec) -> Option<Value> {
        let mut words = tokens(&field.id);
        words.extend(tokens(&field.label));
        let joined: Vec<String> = words.windows(2).map(|w| format!("{}{}", w[0], w[1])).collect();
        let has = |set: &[&str]| {
            words.iter().chain(joined.iter()).any(|w| set.contains(&w.as_str()))
        };
        if has(&EMAIL_WORDS) {
            Some(json!({
                "pattern": r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$",
                "message": "Please enter a valid email address",
            }))
        } else if has(&PHONE_WORDS) {
            Some(json!({
                "pattern": r"^\+?[0-9 ()-]{7,20}$",
                "message": "Please enter a valid phone number",
            }))
        } else if has(&NUMERIC_WORDS) {
            Some(json!({
                "pattern": r"^[0-9]+(\.[0-9]+)?$",
                "message": "Please enter a valid number",
            }))
        } else {
            None
        }
    }
}

impl DerivationRule for ContactValidationRule {
    fn name(&self) -> &'static str {
        "contact_validation"
    }

    fn apply(&self, _owner_form_id: &str, field: &mut FieldSpec) {
        if field.field_type != "textField" || !lacks_validation(field) {
            return;
        }
        if let Some(validation) = Self::classify(field) {
            field.attributes.insert("validation".into(), validation);
        }
    }
}

/// Gives every field whose id ends in `suffix` a default validation block.
pub struct SuffixValidationRule {
    suffix: String,
    validation: Map<String, Value>,
}

impl SuffixValidationRule {
    pub fn new(suffix: impl Into<String>, validation: Map<String, Value>) -> Self {
        Self {
            suffix: suffix.into(),
            validation,
        }
    }
}

impl DerivationRule for SuffixValidationRule {
    fn name(&self) -> &'static str {
        "suffix_validation"
    }

    fn apply(&self, _owner_form_id: &str, field: &mut FieldSpec) {
        if field.id.ends_with(&self.suffix) && lacks_validation(field) {
            field
                .attributes
                .insert("validation".into(), Value::Object(self.validation.clone()));
        }
    }
}

/// Derives a missing `formGrid.formId` from the owning form and the field id.
pub struct FormGridFormIdRule;

/// `{owner clipped to 12}_{field}` clipped to the form id length limit.
#[must_use]
pub fn derive_row_form_id(owner_form_id: &str, field_id: &str) -> String {
    let prefix: String = owner_form_id.chars().take(DERIVED_PREFIX_LEN).collect();
    format!("{prefix}_{field_id}")
        .chars()
        .take(FORM_ID_MAX_LEN)
        .collect()
}

impl DerivationRule for FormGridFormIdRule {
    fn name(&self) -> &'static str {
        "form_grid_form_id"
    }

    fn apply(&self, owner_form_id: &str, field: &mut FieldSpec) {
        if field.field_type == "formGrid" && missing_text(field, "formId") {
            let derived = derive_row_form_id(owner_form_id, &field.id);
            field.attributes.insert("formId".into(), Value::String(derived));
        }
    }
}

/// Derives the counter variable of an `idGenerator` as `{formId}_{fieldId}`.
pub struct IdGeneratorEnvRule;

impl DerivationRule for IdGeneratorEnvRule {
    fn name(&self) -> &'static str {
        "id_generator_env"
    }

    fn apply(&self, owner_form_id: &str, field: &mut FieldSpec) {
        if field.field_type == "idGenerator" && missing_text(field, "envVariable") {
            let derived = format!("{owner_form_id}_{}", field.id);
            field.attributes.insert("envVariable".into(), Value::String(derived));
        }
    }
}

// ---------------------------------------------------------------------------
// Default tables
// ---------------------------------------------------------------------------

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn builtin_type_defaults() -> BTreeMap<String, Map<String, Value>> {
    let text_input = || json!({"placeholder": "", "maxLength": 0, "validation": {}});
    let tables = [
        ("textField", text_input()),
        ("passwordField", text_input()),
        ("textArea", json!({"rows": 5, "cols": 50, "placeholder": "", "validation": {}})),
        ("selectBox", json!({"multiple": false})),
        ("datePicker", json!({"dateFormat": "yyyy-MM-dd"})),
        ("fileUpload", json!({"maxSize": 10, "fileTypes": "*", "multiple": false})),
        ("customHTML", json!({"html": ""})),
        (
            "idGenerator",
            json!({"prefix": "", "postfix": "", "format": "{prefix}{count:05d}{postfix}"}),
        ),
        (
            "subform",
            json!({
                "addButtonLabel": "Add",
                "deleteButtonLabel": "Delete",
                "noAddButton": false,
                "noDeleteButton": false,
                "readonlyLabel": false,
                "workflowVariable": "",
                "parentField": "",
            }),
        ),
        (
            "ajaxSubform",
            json!({"readonlyLabel": false, "noFrame": false}),
        ),
        (
            "grid",
            json!({"validateMinRow": 0, "validateMaxRow": 0, "errorMessage": ""}),
        ),
        (
            "calculationField",
            json!({"storeNumeric": false, "decimalPlaces": 2}),
        ),
        (
            "richTextEditor",
            json!({"editor": "tinymce", "rows": 10, "placeholder": ""}),
        ),
        (
            "formGrid",
            json!({
                "foreignKey": "parentId",
                "allowAddRow": true,
                "allowDeleteRow": true,
                "validateMinRow": 0,
                "validateMaxRow": 0,
            }),
        ),
        (
            "multiPagedForm",
            json!({"showNavigation": true, "showProgressBar": true}),
        ),
    ];
    tables
        .into_iter()
        .map(|(key, table)| (key.to_string(), object(table)))
        .collect()
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Table-driven [`SpecNormalizer`].
///
/// Type-specific defaults take precedence over the universal field defaults
/// when both name the same attribute.
#[derive(Clone)]
pub struct Normalizer {
    form_defaults: Map<String, Value>,
    field_defaults: Map<String, Value>,
    type_defaults: BTreeMap<String, Map<String, Value>>,
    rules: Vec<Arc<dyn DerivationRule>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            form_defaults: object(json!({"description": ""})),
            field_defaults: object(json!({
                "required": false,
                "readonly": false,
                "size": "medium",
                "defaultValue": "",
            })),
            type_defaults: builtin_type_defaults(),
            rules: vec![
                Arc::new(ContactValidationRule),
                Arc::new(FormGridFormIdRule),
                Arc::new(IdGeneratorEnvRule),
            ],
        }
    }
}

impl Normalizer {
    /// Built-in tables and derivation rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_form_default(mut self, key: &str, value: Value) -> Self {
        self.form_defaults.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_field_default(mut self, key: &str, value: Value) -> Self {
        self.field_defaults.insert(key.to_string(), value);
        self
    }

    /// Merge `defaults` into the table of `type_key`; later values win.
    #[must_use]
    pub fn with_type_defaults(mut self, type_key: &str, defaults: Map<String, Value>) -> Self {
        self.type_defaults
            .entry(type_key.to_string())
            .or_default()
            .extend(defaults);
        self
    }

    /// Append a derivation rule; it runs after the existing ones.
    #[must_use]
    pub fn with_rule(mut self, rule: impl DerivationRule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Drop every derivation rule, keeping only the default tables.
    #[must_use]
    pub fn without_rules(mut self) -> Self {
        self.rules.clear();
        self
    }

    #[must_use]
    pub fn type_defaults(&self, type_key: &str) -> Option<&Map<String, Value>> {
        self.type_defaults.get(type_key)
    }

    #[must_use]
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    fn normalize_field(&self, owner_form_id: &str, field: &FieldSpec) -> FieldSpec {
        let mut field = field.clone();
        let mut filled = 0usize;
        if let Some(table) = self.type_defaults.get(&field.field_type) {
            for (key, value) in table {
                filled += usize::from(fill(&mut field, key, value));
            }
        }
        for (key, value) in &self.field_defaults {
            filled += usize::from(fill(&mut field, key, value));
        }
        for rule in &self.rules {
            rule.apply(owner_form_id, &mut field);
        }
        tracing::debug!(
            field_id = %field.id,
            type_key = %field.field_type,
            filled,
            "normalized field"
        );

        let child_owner = field
            .str_attr("formId")
            .filter(|id| !id.is_empty())
            .unwrap_or(owner_form_id)
            .to_string();
        if let Some(columns) = field.columns.take() {
            field.columns = Some(
                columns
                    .iter()
                    .map(|column| self.normalize_column(&child_owner, column))
                    .collect(),
            );
        }
        if let Some(children) = field.fields.take() {
            field.fields = Some(
                children
                    .iter()
                    .map(|child| self.normalize_field(&child_owner, child))
                    .collect(),
            );
        }
        if let Some(pages) = field.pages.take() {
            field.pages = Some(pages.iter().map(|page| self.normalize_page(page)).collect());
        }
        field
    }

    fn normalize_column(&self, owner_form_id: &str, column: &ColumnSpec) -> ColumnSpec {
        let editable = column.editable.or(Some(true));
        let field = self.normalize_field(owner_form_id, &column.to_field());
        ColumnSpec::from_field(field, editable)
    }

    fn normalize_page(&self, page: &PageRef) -> PageRef {
        let mut page = page.clone();
        if page.description.is_none() {
            page.description = Some(String::new());
        }
        if let Some(children) = page.fields.take() {
            let owner = page.form_id.clone();
            page.fields = Some(
                children
                    .iter()
                    .map(|child| self.normalize_field(&owner, child))
                    .collect(),
            );
        }
        page
    }
}

/// Fill one attribute if absent; typed members are filled from matching keys.
fn fill(field: &mut FieldSpec, key: &str, value: &Value) -> bool {
    fn text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
    match key {
        "required" if field.required.is_none() => {
            field.required = value.as_bool();
            field.required.is_some()
        }
        "readonly" if field.readonly.is_none() => {
            field.readonly = value.as_bool();
            field.readonly.is_some()
        }
        "size" if field.size.is_none() => {
            field.size = text(value);
            field.size.is_some()
        }
        "defaultValue" if field.default_value.is_none() => {
            field.default_value = text(value);
            field.default_value.is_some()
        }
        "required" | "readonly" | "size" | "defaultValue" => false,
        _ if field.attributes.contains_key(key) => false,
        _ => {
            field.attributes.insert(key.to_string(), value.clone());
            true
        }
    }
}

impl SpecNormalizer for Normalizer {
    fn normalize(&self, spec: &FormSpec) -> FormSpec {
        let mut form = spec.form.clone();
        if form.table_name.is_none() {
            form.table_name = Some(form.id.clone());
        }
        if form.description.is_none() {
            form.description = self
                .form_defaults
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        let fields = spec
            .fields
            .iter()
            .map(|field| self.normalize_field(&form.id, field))
            .collect();
        FormSpec::new(form, fields)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
