//! Built-in structural rules.
//!
//! Each rule inspects the raw tree and reports findings with a pointer path
//! and, where one can be derived, a suggested fix. Field rules apply to every
//! field list in the tree: the top-level `fields`, inline subform `fields`,
//! and the inline `fields` of each page.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{pointer, Finding, SchemaRule};
use crate::schema::{is_reserved_field_id, FIELD_ID_PATTERN, FIELD_SIZES, FORM_ID_PATTERN};
use crate::types::{Composite, PatternSchema, SchemaCatalog, OPTIONS_SOURCE_KINDS};

/// The rule set run by [`super::ValidationEngine::with_defaults`], in order.
#[must_use]
pub fn default_rules() -> Vec<Box<dyn SchemaRule>> {
    vec![
        Box::new(EnvelopeRule),
        Box::new(FormMetaRule),
        Box::new(FieldShapeRule),
        Box::new(FieldIdRule),
        Box::new(TypeAttributeRule),
        Box::new(RangeRule),
        Box::new(CascadeRule),
        Box::new(TableNameRule),
        Box::new(DuplicateLabelRule),
        Box::new(GridCardinalityRule),
        Box::new(CascadeHintRule),
    ]
}

// ---------------------------------------------------------------------------
// Tree helpers
// ---------------------------------------------------------------------------

/// A sequence of field declarations and where it sits in the tree.
struct FieldList<'a> {
    path: String,
    items: &'a [Value],
}

impl<'a> FieldList<'a> {
    /// Entries that are mappings, with their index.
    fn objects(&self) -> impl Iterator<Item = (usize, &'a Map<String, Value>)> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.as_object().map(|obj| (i, obj)))
    }

    fn item_path(&self, index: usize) -> String {
        pointer(&self.path, index)
    }

    /// Sibling ids in declaration order; the first declaration wins.
    fn ids(&self) -> HashMap<&'a str, &'a Map<String, Value>> {
        let mut ids = HashMap::new();
        for (_, obj) in self.objects() {
            if let Some(id) = str_of(obj, "id") {
                ids.entry(id).or_insert(obj);
            }
        }
        ids
    }
}

/// Every field list in the tree, outermost first.
fn field_lists(tree: &Value) -> Vec<FieldList<'_>> {
    let mut lists = Vec::new();
    if let Some(items) = tree.get("fields").and_then(Value::as_array) {
        collect_lists("/fields".to_string(), items, &mut lists);
    }
    lists
}

fn collect_lists<'a>(path: String, items: &'a [Value], lists: &mut Vec<FieldList<'a>>) {
    let nested: Vec<(String, &'a [Value])> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| item.as_object().map(|obj| (pointer(&path, i), obj)))
        .flat_map(|(item_path, obj)| {
            let mut found = Vec::new();
            if let Some(children) = obj.get("fields").and_then(Value::as_array) {
                found.push((pointer(&item_path, "fields"), children.as_slice()));
            }
            if let Some(pages) = obj.get("pages").and_then(Value::as_array) {
                for (j, page) in pages.iter().enumerate() {
                    if let Some(children) = page.get("fields").and_then(Value::as_array) {
                        let page_path = pointer(&pointer(&item_path, "pages"), j);
                        found.push((pointer(&page_path, "fields"), children.as_slice()));
                    }
                }
            }
            found
        })
        .collect();
    lists.push(FieldList { path, items });
    for (child_path, children) in nested {
        collect_lists(child_path, children, lists);
    }
}

fn str_of<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

const FORM_ID_FIX: &str = "Use a letter followed by up to 19 letters, digits or underscores";

fn is_non_empty_list(value: &Value) -> bool {
    value.as_array().is_some_and(|a| !a.is_empty())
}

fn present(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).is_some_and(|v| !v.is_null())
}

/// A whole number written either as a number or as a numeric string.
fn whole_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field_label(obj: &Map<String, Value>, index: usize) -> String {
    str_of(obj, "id").map_or_else(|| format!("#{index}"), |id| format!("'{id}'"))
}

fn type_schema<'a, 'c>(
    obj: &'a Map<String, Value>,
    catalog: &'c SchemaCatalog,
) -> Option<(&'a str, &'c PatternSchema)> {
    let key = str_of(obj, "type")?;
    catalog.get(key).map(|schema| (key, schema))
}

fn registered_types(catalog: &SchemaCatalog) -> String {
    catalog.keys().collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// Envelope and form metadata
// ---------------------------------------------------------------------------

/// Root carries a `form` mapping and a non-empty `fields` sequence.
pub struct EnvelopeRule;

impl SchemaRule for EnvelopeRule {
    fn name(&self) -> &'static str {
        "envelope"
    }

    fn check(&self, tree: &Value, _catalog: &SchemaCatalog) -> Vec<Finding> {
        let mut findings = Vec::new();
        match tree.get("form") {
            None => findings.push(
                Finding::error("/form", "missing required property 'form'")
                    .with_fix("Add a `form:` block with `id` and `name`"),
            ),
            Some(form) if !form.is_object() => {
                findings.push(Finding::error("/form", "'form' must be a mapping"));
            }
            Some(_) => {}
        }
        match tree.get("fields") {
            None => findings.push(
                Finding::error("/fields", "missing required property 'fields'")
                    .with_fix("Add a `fields:` list with at least one field"),
            ),
            Some(Value::Array(items)) if items.is_empty() => findings.push(
                Finding::error("/fields", "a form needs at least one field")
                    .with_fix("Add at least one entry with `id`, `label` and `type`"),
            ),
            Some(Value::Array(_)) => {}
            Some(_) => findings.push(Finding::error("/fields", "'fields' must be a list")),
        }
        findings
    }
}

/// `id`/`name` present, identifiers match the form id pattern.
pub struct FormMetaRule;

impl SchemaRule for FormMetaRule {
    fn name(&self) -> &'static str {
        "form_meta"
    }

    fn check(&self, tree: &Value, _catalog: &SchemaCatalog) -> Vec<Finding> {
        let Some(form) = tree.get("form").and_then(Value::as_object) else {
            return Vec::new();
        };
        let mut findings = Vec::new();
        for key in ["id", "tableName"] {
            let path = pointer("/form", key);
            match form.get(key) {
                None if key == "id" => findings.push(
                    Finding::error(path, "missing required property 'id'")
                        .with_fix("Add a form `id` such as `customer_form`"),
                ),
                None => {}
                Some(Value::String(id)) if !FORM_ID_PATTERN.is_match(id) => findings.push(
                    Finding::error(path, format!("'{id}' is not a valid {key}"))
                        .with_fix(FORM_ID_FIX),
                ),
                Some(Value::String(_)) => {}
                Some(_) => findings.push(Finding::error(path, format!("'{key}' must be a string"))),
            }
        }
        match form.get("name") {
            None => findings.push(
                Finding::error("/form/name", "missing required property 'name'")
                    .with_fix("Add a human-readable form `name`"),
            ),
            Some(Value::String(_) | Value::Number(_)) => {}
            Some(_) => findings.push(Finding::error("/form/name", "'name' must be a string")),
        }
        if form.get("description").is_some_and(|d| !d.is_string() && !d.is_null()) {
            findings.push(Finding::error("/form/description", "'description' must be a string"));
        }
        findings
    }
}

// ---------------------------------------------------------------------------
// Field shape and ids
// ---------------------------------------------------------------------------

/// Each field is a mapping with `id`, `label` and a registered `type`.
pub struct FieldShapeRule;

impl SchemaRule for FieldShapeRule {
    fn name(&self) -> &'static str {
        "field_shape"
    }

    fn check(&self, tree: &Value, catalog: &SchemaCatalog) -> Vec<Finding> {
        let mut findings = Vec::new();
        for list in field_lists(tree) {
            for (i, item) in list.items.iter().enumerate() {
                let path = list.item_path(i);
                let Some(obj) = item.as_object() else {
                    findings.push(Finding::error(path, "each field must be a mapping"));
                    continue;
                };
                check_field_shape(obj, &path, i, catalog, &mut findings);
            }
        }
        findings
    }
}

fn check_field_shape(
    obj: &Map<String, Value>,
    path: &str,
    index: usize,
    catalog: &SchemaCatalog,
    findings: &mut Vec<Finding>,
) {
    let name = field_label(obj, index);
    match obj.get("id") {
        None => findings.push(
            Finding::error(pointer(path, "id"), format!("field {name} is missing 'id'"))
                .with_fix("Give every field a unique `id`"),
        ),
        Some(Value::String(_)) => {}
        Some(_) => findings.push(Finding::error(pointer(path, "id"), "'id' must be a string")),
    }
    match obj.get("label") {
        None => findings.push(
            Finding::error(pointer(path, "label"), format!("field {name} is missing 'label'"))
                .with_fix("Add the label shown next to the field"),
        ),
        Some(Value::String(_) | Value::Number(_)) => {}
        Some(_) => {
            findings.push(Finding::error(pointer(path, "label"), "'label' must be a string"));
        }
    }
    match obj.get("type") {
        None => findings.push(
            Finding::error(pointer(path, "type"), format!("field {name} is missing 'type'"))
                .with_fix(format!("Registered types: {}", registered_types(catalog))),
        ),
        Some(Value::String(key)) if !catalog.contains(key) => {
            let closest = catalog.closest(key);
            let fix = if closest.is_empty() {
                format!("Registered types: {}", registered_types(catalog))
            } else {
                format!(
                    "Did you mean {}? Registered types: {}",
                    closest.join(" or "),
                    registered_types(catalog)
                )
            };
            findings.push(
                Finding::error(
                    pointer(path, "type"),
                    format!("unknown field type '{key}' on field {name}"),
                )
                .with_fix(fix),
            );
        }
        Some(Value::String(_)) => {}
        Some(_) => findings.push(Finding::error(pointer(path, "type"), "'type' must be a string")),
    }
    for key in ["required", "readonly"] {
        if obj.get(key).is_some_and(|v| !v.is_boolean()) {
            findings.push(
                Finding::error(pointer(path, key), format!("'{key}' must be true or false"))
                    .with_fix(format!("Write `{key}: true` or `{key}: false`")),
            );
        }
    }
    if let Some(size) = obj.get("size") {
        if !size.as_str().is_some_and(|s| FIELD_SIZES.contains(&s)) {
            findings.push(
                Finding::error(pointer(path, "size"), format!("invalid size {size}"))
                    .with_fix(format!("Use one of: {}", FIELD_SIZES.join(", "))),
            );
        }
    }
}

/// Field ids are well-formed, unique within their list, and not reserved.
pub struct FieldIdRule;

impl SchemaRule for FieldIdRule {
    fn name(&self) -> &'static str {
        "field_ids"
    }

    fn check(&self, tree: &Value, _catalog: &SchemaCatalog) -> Vec<Finding> {
        let mut findings = Vec::new();
        for list in field_lists(tree) {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            for (i, obj) in list.objects() {
                let Some(id) = str_of(obj, "id") else {
                    continue;
                };
                let path = pointer(&list.item_path(i), "id");
                if !FIELD_ID_PATTERN.is_match(id) {
                    findings.push(
                        Finding::error(path.clone(), format!("'{id}' is not a valid field id"))
                            .with_fix(
                                "Start with a letter or underscore, then use letters, digits or \
                                 underscores (max 64)",
                            ),
                    );
                }
                if is_reserved_field_id(id) {
                    findings.push(
                        Finding::error(path.clone(), format!("'{id}' is a reserved column name"))
                            .with_fix(format!("Rename the field, e.g. '{id}Value'")),
                    );
                }
                if let Some(first) = seen.get(id) {
                    findings.push(
                        Finding::error(
                            path,
                            format!(
                                "duplicate field id '{id}' (first declared at {})",
                                list.item_path(*first)
                            ),
                        )
                        .with_fix("Field ids must be unique within a form"),
                    );
                } else {
                    seen.insert(id, i);
                }
            }
        }
        findings
    }
}

// ---------------------------------------------------------------------------
// Type-specific attributes
// ---------------------------------------------------------------------------

/// Required attributes, choice sources, columns and pages per pattern schema.
pub struct TypeAttributeRule;

impl SchemaRule for TypeAttributeRule {
    fn name(&self) -> &'static str {
        "type_attributes"
    }

    fn check(&self, tree: &Value, catalog: &SchemaCatalog) -> Vec<Finding> {
        let mut findings = Vec::new();
        for list in field_lists(tree) {
            for (i, obj) in list.objects() {
                let Some((key, schema)) = type_schema(obj, catalog) else {
                    continue;
                };
                let path = list.item_path(i);
                let name = field_label(obj, i);
                check_required(obj, &path, &name, key, schema, &mut findings);
                if schema.choice {
                    check_choice(obj, &path, &name, &mut findings);
                }
                check_scalar_kinds(obj, &path, schema, &mut findings);
                match schema.composite {
                    Composite::Grid => {
                        check_columns(obj, &path, &name, catalog, false, &mut findings);
                    }
                    Composite::FormGrid => {
                        check_columns(obj, &path, &name, catalog, true, &mut findings);
                    }
                    Composite::Pages => check_pages(obj, &path, &name, &mut findings),
                    Composite::Subform => {
                        if obj.get("fields").is_some_and(|f| !is_non_empty_list(f)) {
                            findings.push(Finding::error(
                                pointer(&path, "fields"),
                                format!("inline 'fields' of {name} must be a non-empty list"),
                            ));
                        }
                    }
                    Composite::Leaf => {}
                }
            }
        }
        findings
    }
}

fn required_fix(attr: &str) -> &'static str {
    match attr {
        "formId" => "Set `formId` to the id of the form this field embeds",
        "columns" => "Add a `columns:` list of `{id, label}` entries",
        "pages" => "Add a `pages:` list of `{formId, label}` entries",
        "equation" => "Add an `equation` over sibling field ids, e.g. `price * quantity`",
        "controlField" => "Set `controlField` to the id of the choice field that drives this one",
        _ => "Add the missing attribute",
    }
}

fn check_required(
    obj: &Map<String, Value>,
    path: &str,
    name: &str,
    key: &str,
    schema: &PatternSchema,
    findings: &mut Vec<Finding>,
) {
    for attr in schema.required {
        let missing = match obj.get(*attr) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if missing {
            findings.push(
                Finding::error(pointer(path, attr), format!("{key} field {name} requires '{attr}'"))
                    .with_fix(required_fix(attr)),
            );
        }
    }
}

fn check_choice(obj: &Map<String, Value>, path: &str, name: &str, findings: &mut Vec<Finding>) {
    let has_options = present(obj, "options");
    let has_source = present(obj, "optionsSource");
    match (has_options, has_source) {
        (false, false) => findings.push(
            Finding::error(
                path,
                format!("choice field {name} needs either 'options' or 'optionsSource'"),
            )
            .with_fix(
                "Add an `options:` list of `{value, label}` entries or an `optionsSource:` block",
            ),
        ),
        (true, true) => findings.push(
            Finding::error(
                path,
                format!("choice field {name} has both 'options' and 'optionsSource'"),
            )
            .with_fix("Keep exactly one of `options` or `optionsSource`"),
        ),
        _ => {}
    }
    if let Some(options) = obj.get("options") {
        check_option_list(options, &pointer(path, "options"), findings);
    }
    if let Some(source) = obj.get("optionsSource") {
        check_options_source(source, &pointer(path, "optionsSource"), findings);
    }
}

fn check_option_list(options: &Value, path: &str, findings: &mut Vec<Finding>) {
    let Some(entries) = options.as_array() else {
        findings.push(Finding::error(path, "'options' must be a list"));
        return;
    };
    if entries.is_empty() {
        findings.push(Finding::error(path, "'options' must not be empty"));
    }
    for (k, entry) in entries.iter().enumerate() {
        let entry_path = pointer(path, k);
        let Some(entry) = entry.as_object() else {
            findings.push(
                Finding::error(entry_path, "each option must be a mapping")
                    .with_fix("Write options as `{value: ..., label: ...}`"),
            );
            continue;
        };
        for key in ["value", "label"] {
            let text = match entry.get(key) {
                Some(Value::String(_) | Value::Number(_) | Value::Bool(_)) => continue,
                Some(_) => format!("option '{key}' must be a scalar"),
                None => format!("option is missing '{key}'"),
            };
            findings.push(Finding::error(pointer(&entry_path, key), text));
        }
    }
}

fn check_options_source(source: &Value, path: &str, findings: &mut Vec<Finding>) {
    let Some(source) = source.as_object() else {
        findings.push(Finding::error(path, "'optionsSource' must be a mapping"));
        return;
    };
    let kind = str_of(source, "type");
    let requirement: Option<(&[&str], &str)> = match kind {
        Some("static") => Some((&["options"][..], "options")),
        Some("formData") => Some((&["formId"][..], "formId")),
        Some("api") => Some((&["jsonUrl", "url"][..], "jsonUrl")),
        Some("database") => Some((&["tableName", "sql"][..], "tableName")),
        _ => {
            let text = match kind {
                Some(other) => format!("unknown optionsSource type '{other}'"),
                None => "optionsSource is missing 'type'".to_string(),
            };
            findings.push(
                Finding::error(pointer(path, "type"), text)
                    .with_fix(format!("Use one of: {}", OPTIONS_SOURCE_KINDS.join(", "))),
            );
            None
        }
    };
    if let Some((any_of, reported)) = requirement {
        if !any_of.iter().any(|key| present(source, key)) {
            let kind = kind.unwrap_or_default();
            findings.push(
                Finding::error(
                    pointer(path, reported),
                    format!("{kind} optionsSource requires '{reported}'"),
                )
                .with_fix(format!("Add `{}` to the optionsSource block", any_of.join("` or `"))),
            );
        }
    }
    if kind == Some("static") {
        if let Some(options) = source.get("options") {
            check_option_list(options, &pointer(path, "options"), findings);
        }
    }
}

fn check_scalar_kinds(
    obj: &Map<String, Value>,
    path: &str,
    schema: &PatternSchema,
    findings: &mut Vec<Finding>,
) {
    for attr in schema.numeric {
        if obj.get(*attr).is_some_and(|v| !(v.is_u64() || v.is_string())) {
            let text = format!("'{attr}' must be a whole number");
            findings.push(Finding::error(pointer(path, attr), text));
        }
    }
    for attr in schema.flags {
        if obj.get(*attr).is_some_and(|v| !(v.is_boolean() || v.is_string())) {
            let text = format!("'{attr}' must be true or false");
            findings.push(Finding::error(pointer(path, attr), text));
        }
    }
}

/// Form grid columns become fields of the row form, so they are held to the
/// same attribute requirements as top-level fields.
fn check_columns(
    obj: &Map<String, Value>,
    path: &str,
    name: &str,
    catalog: &SchemaCatalog,
    row_form: bool,
    findings: &mut Vec<Finding>,
) {
    let Some(columns) = obj.get("columns") else {
        return;
    };
    let columns_path = pointer(path, "columns");
    let Some(columns) = columns.as_array().filter(|c| !c.is_empty()) else {
        findings.push(
            Finding::error(columns_path, format!("'columns' of {name} must be a non-empty list"))
                .with_fix("Add at least one `{id, label}` column"),
        );
        return;
    };
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (k, column) in columns.iter().enumerate() {
        let column_path = pointer(&columns_path, k);
        let Some(column) = column.as_object() else {
            findings.push(Finding::error(column_path, "each column must be a mapping"));
            continue;
        };
        let id_path = pointer(&column_path, "id");
        match str_of(column, "id") {
            None => findings.push(Finding::error(id_path, "column is missing 'id'")),
            Some(id) => {
                if !FIELD_ID_PATTERN.is_match(id) {
                    let text = format!("'{id}' is not a valid column id");
                    findings.push(Finding::error(id_path.clone(), text));
                }
                if let Some(first) = seen.insert(id, k) {
                    let first = pointer(&columns_path, first);
                    let text = format!("duplicate column id '{id}' (first declared at {first})");
                    findings.push(Finding::error(id_path, text));
                }
            }
        }
        if !present(column, "label") {
            let label_path = pointer(&column_path, "label");
            findings.push(Finding::error(label_path, "column is missing 'label'"));
        }
        let column_type = str_of(column, "type").unwrap_or("textField");
        match catalog.get(column_type) {
            None => findings.push(
                Finding::error(
                    pointer(&column_path, "type"),
                    format!("unknown column type '{column_type}'"),
                )
                .with_fix(format!("Registered types: {}", registered_types(catalog))),
            ),
            Some(schema) if schema.composite != Composite::Leaf || schema.structural => {
                findings.push(
                    Finding::error(
                        pointer(&column_path, "type"),
                        format!("column type '{column_type}' cannot be nested inside {name}"),
                    )
                    .with_fix("Use a simple input type for grid columns"),
                );
            }
            Some(schema) => {
                let column_name =
                    str_of(column, "id").map_or_else(|| format!("#{k}"), |id| format!("'{id}'"));
                if row_form {
                    let key = column_type;
                    check_required(column, &column_path, &column_name, key, schema, findings);
                    check_scalar_kinds(column, &column_path, schema, findings);
                }
                let has_source = present(column, "options") || present(column, "optionsSource");
                if schema.choice && (row_form || has_source) {
                    check_choice(column, &column_path, &column_name, findings);
                }
            }
        }
    }
}

fn check_pages(obj: &Map<String, Value>, path: &str, name: &str, findings: &mut Vec<Finding>) {
    let Some(pages) = obj.get("pages") else {
        return;
    };
    let pages_path = pointer(path, "pages");
    let Some(pages) = pages.as_array().filter(|p| !p.is_empty()) else {
        findings.push(
            Finding::error(pages_path, format!("'pages' of {name} must be a non-empty list"))
                .with_fix("Add at least one `{formId, label}` page"),
        );
        return;
    };
    for (k, page) in pages.iter().enumerate() {
        let page_path = pointer(&pages_path, k);
        let Some(page) = page.as_object() else {
            findings.push(Finding::error(page_path, "each page must be a mapping"));
            continue;
        };
        match str_of(page, "formId") {
            None => findings.push(
                Finding::error(pointer(&page_path, "formId"), "page is missing 'formId'")
                    .with_fix("Name the form shown on this page"),
            ),
            Some(id) if !FORM_ID_PATTERN.is_match(id) => findings.push(
                Finding::error(
                    pointer(&page_path, "formId"),
                    format!("'{id}' is not a valid form id"),
                )
                .with_fix(FORM_ID_FIX),
            ),
            Some(_) => {}
        }
        if page.get("fields").is_some_and(|f| !is_non_empty_list(f)) {
            let text = "inline page 'fields' must be a non-empty list";
            findings.push(Finding::error(pointer(&page_path, "fields"), text));
        }
    }
}

// ---------------------------------------------------------------------------
// Numeric ranges
// ---------------------------------------------------------------------------

/// Bounds on row counts, text area dimensions and upload size.
pub struct RangeRule;

const RANGES: [(&str, i64, i64); 5] = [
    ("validateMinRow", 0, 1000),
    ("validateMaxRow", 0, 1000),
    ("rows", 1, 200),
    ("cols", 1, 200),
    ("maxSize", 1, 2048),
];

impl SchemaRule for RangeRule {
    fn name(&self) -> &'static str {
        "ranges"
    }

    fn check(&self, tree: &Value, _catalog: &SchemaCatalog) -> Vec<Finding> {
        let mut findings = Vec::new();
        for list in field_lists(tree) {
            for (i, obj) in list.objects() {
                let path = list.item_path(i);
                for (attr, min, max) in RANGES {
                    let Some(n) = obj.get(attr).and_then(whole_number) else {
                        continue;
                    };
                    if n < min || n > max {
                        let text = format!("'{attr}' is {n}, outside {min}..={max}");
                        findings.push(
                            Finding::error(pointer(&path, attr), text)
                                .with_fix(format!("Use a value between {min} and {max}")),
                        );
                    }
                }
                let min_rows = obj.get("validateMinRow").and_then(whole_number);
                let max_rows = obj.get("validateMaxRow").and_then(whole_number);
                if let (Some(lo), Some(hi)) = (min_rows, max_rows) {
                    if hi > 0 && lo > hi {
                        findings.push(
                            Finding::error(
                                pointer(&path, "validateMinRow"),
                                format!("validateMinRow {lo} exceeds validateMaxRow {hi}"),
                            )
                            .with_fix(
                                "Lower validateMinRow or raise validateMaxRow (0 means unlimited)",
                            ),
                        );
                    }
                }
            }
        }
        findings
    }
}

// ---------------------------------------------------------------------------
// Cascades
// ---------------------------------------------------------------------------

/// `controlField` references resolve to siblings, and ajax-linked companions
/// point at a choice field whose source leaves `valueColumn` empty.
pub struct CascadeRule;

impl SchemaRule for CascadeRule {
    fn name(&self) -> &'static str {
        "cascade"
    }

    fn check(&self, tree: &Value, catalog: &SchemaCatalog) -> Vec<Finding> {
        let mut findings = Vec::new();
        for list in field_lists(tree) {
            let siblings = list.ids();
            for (i, obj) in list.objects() {
                let path = list.item_path(i);
                let own_id = str_of(obj, "id").unwrap_or_default();
                if let Some(source) = obj.get("optionsSource").and_then(Value::as_object) {
                    if let Some(control) = source_control(source).filter(|c| !c.is_empty()) {
                        let path = pointer(&pointer(&path, "optionsSource"), "controlField");
                        check_sibling_reference(own_id, control, &path, &siblings, &mut findings);
                    }
                }
                let companion = type_schema(obj, catalog)
                    .is_some_and(|(_, s)| s.required.contains(&"controlField"));
                if !companion {
                    continue;
                }
                let Some(control) = str_of(obj, "controlField").filter(|c| !c.is_empty()) else {
                    continue;
                };
                let path = pointer(&path, "controlField");
                let resolves =
                    check_sibling_reference(own_id, control, &path, &siblings, &mut findings);
                let Some(driver) = siblings.get(control).filter(|_| resolves) else {
                    continue;
                };
                check_companion_driver(control, driver, &list, catalog, &path, &mut findings);
            }
        }
        findings
    }
}

/// `controlField`, or its older spelling `parentField`.
fn source_control(source: &Map<String, Value>) -> Option<&str> {
    str_of(source, "controlField").or_else(|| str_of(source, "parentField"))
}

/// Report a dangling or self reference; returns whether the reference resolves.
fn check_sibling_reference(
    own_id: &str,
    target: &str,
    path: &str,
    siblings: &HashMap<&str, &Map<String, Value>>,
    findings: &mut Vec<Finding>,
) -> bool {
    if target == own_id {
        findings.push(
            Finding::error(path, format!("field '{own_id}' cannot control itself"))
                .with_fix("Point controlField at a different field of the same form"),
        );
        return false;
    }
    if !siblings.contains_key(target) {
        let mut known: Vec<&str> = siblings.keys().copied().filter(|id| *id != own_id).collect();
        known.sort_unstable();
        findings.push(
            Finding::error(
                path,
                format!("controlField '{target}' does not name a field of this form"),
            )
            .with_fix(format!("Use one of: {}", known.join(", "))),
        );
        return false;
    }
    true
}

fn check_companion_driver(
    control: &str,
    driver: &Map<String, Value>,
    list: &FieldList<'_>,
    catalog: &SchemaCatalog,
    path: &str,
    findings: &mut Vec<Finding>,
) {
    let is_choice = type_schema(driver, catalog).is_some_and(|(_, s)| s.choice);
    if !is_choice {
        findings.push(
            Finding::error(path, format!("controlField '{control}' must name a choice field"))
                .with_fix("Drive the companion from a selectBox, radio or checkBox"),
        );
        return;
    }
    let source = driver.get("optionsSource").and_then(Value::as_object);
    if source.and_then(|s| str_of(s, "type")) != Some("formData") {
        findings.push(
            Finding::error(
                path,
                format!("controlField '{control}' must load its options from formData"),
            )
            .with_fix(format!("Give '{control}' an optionsSource of type formData")),
        );
        return;
    }
    let value_column = source.and_then(|s| str_of(s, "valueColumn")).unwrap_or_default();
    if !value_column.is_empty() {
        let driver_index = list
            .objects()
            .find(|(_, obj)| str_of(obj, "id") == Some(control))
            .map_or(0, |(i, _)| i);
        let source_path = pointer(&list.item_path(driver_index), "optionsSource");
        findings.push(
            Finding::error(
                pointer(&source_path, "valueColumn"),
                format!(
                    "'{control}' drives an ajax-linked field, so its valueColumn must be empty \
                     (found '{value_column}')"
                ),
            )
            .with_fix(format!(
                "Remove valueColumn from '{control}' so the source record's primary key is used"
            )),
        );
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// `tableName` should equal `id`.
pub struct TableNameRule;

impl SchemaRule for TableNameRule {
    fn name(&self) -> &'static str {
        "table_name"
    }

    fn check(&self, tree: &Value, _catalog: &SchemaCatalog) -> Vec<Finding> {
        let Some(form) = tree.get("form").and_then(Value::as_object) else {
            return Vec::new();
        };
        match (str_of(form, "id"), str_of(form, "tableName")) {
            (Some(id), Some(table)) if id != table => vec![Finding::warning(
                "/form/tableName",
                format!("tableName '{table}' differs from form id '{id}'"),
            )
            .with_fix(format!("Set tableName to '{id}' or remove it"))],
            _ => Vec::new(),
        }
    }
}

/// Two fields of one form showing the same label.
pub struct DuplicateLabelRule;

impl SchemaRule for DuplicateLabelRule {
    fn name(&self) -> &'static str {
        "duplicate_labels"
    }

    fn check(&self, tree: &Value, catalog: &SchemaCatalog) -> Vec<Finding> {
        let mut findings = Vec::new();
        for list in field_lists(tree) {
            let mut seen: HashMap<String, &str> = HashMap::new();
            for (i, obj) in list.objects() {
                if type_schema(obj, catalog).is_some_and(|(_, s)| s.structural) {
                    continue;
                }
                let label = str_of(obj, "label").map(str::trim);
                let Some(label) = label.filter(|l| !l.is_empty()) else {
                    continue;
                };
                let id = str_of(obj, "id").unwrap_or_default();
                if let Some(first) = seen.get(label) {
                    findings.push(
                        Finding::warning(
                            pointer(&list.item_path(i), "label"),
                            format!("label '{label}' is also used by field '{first}'"),
                        )
                        .with_fix("Give each field a distinct label"),
                    );
                } else {
                    seen.insert(label.to_string(), id);
                }
            }
        }
        findings
    }
}

/// At most one grid-bearing field per form.
pub struct GridCardinalityRule;

impl SchemaRule for GridCardinalityRule {
    fn name(&self) -> &'static str {
        "grid_cardinality"
    }

    fn check(&self, tree: &Value, catalog: &SchemaCatalog) -> Vec<Finding> {
        let mut findings = Vec::new();
        for list in field_lists(tree) {
            let grids: Vec<&str> = list
                .objects()
                .filter(|(_, obj)| {
                    type_schema(obj, catalog).is_some_and(|(_, s)| s.composite.is_grid_bearing())
                })
                .filter_map(|(_, obj)| str_of(obj, "id"))
                .collect();
            if grids.len() > 1 {
                findings.push(
                    Finding::warning(
                        list.path.clone(),
                        format!(
                            "form has {} grid fields ({}); keep at most one per form",
                            grids.len(),
                            grids.join(", ")
                        ),
                    )
                    .with_fix(
                        "Move additional grids into their own forms and link them with a subform",
                    ),
                );
            }
        }
        findings
    }
}

/// Half-configured cascades, and select boxes loading a whole form unfiltered.
pub struct CascadeHintRule;

impl SchemaRule for CascadeHintRule {
    fn name(&self) -> &'static str {
        "cascade_hint"
    }

    fn check(&self, tree: &Value, _catalog: &SchemaCatalog) -> Vec<Finding> {
        let mut findings = Vec::new();
        for list in field_lists(tree) {
            for (i, obj) in list.objects() {
                let Some(source) = obj.get("optionsSource").and_then(Value::as_object) else {
                    continue;
                };
                if str_of(source, "type") != Some("formData") {
                    continue;
                }
                let path = pointer(&list.item_path(i), "optionsSource");
                let grouping =
                    str_of(source, "groupingColumn").or_else(|| str_of(source, "filterField"));
                let control = source_control(source);
                let filled = |v: Option<&str>| v.is_some_and(|s| !s.is_empty());
                match (filled(grouping), filled(control)) {
                    (true, false) => findings.push(
                        Finding::warning(path, "groupingColumn has no effect without controlField")
                            .with_fix(
                                "Add controlField naming the parent field, or drop groupingColumn",
                            ),
                    ),
                    (false, true) => findings.push(
                        Finding::warning(path, "controlField has no effect without groupingColumn")
                            .with_fix(
                                "Add groupingColumn naming the parent column of the source form",
                            ),
                    ),
                    (false, false) if str_of(obj, "type") == Some("selectBox") => {
                        let form_id = str_of(source, "formId").unwrap_or_default();
                        findings.push(Finding::warning(
                            path,
                            format!(
                                "options load every record of '{form_id}'; add groupingColumn \
                                 and controlField to filter them by another field"
                            ),
                        ));
                    }
                    _ => {}
                }
            }
        }
        findings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::Tier;
    use crate::validation::{ValidationEngine, ValidationResult};

    fn catalog() -> SchemaCatalog {
        let mut c = SchemaCatalog::new();
        c.insert("textField", PatternSchema::new(Tier::Standard, "text"));
        c.insert("textArea", PatternSchema::new(Tier::Standard, "area").numeric(&["rows", "cols"]));
        c.insert("selectBox", PatternSchema::new(Tier::Standard, "select").choice());
        c.insert("radio", PatternSchema::new(Tier::Standard, "radio").choice());
        c.insert("section", PatternSchema::new(Tier::Advanced, "section").structural());
        c.insert(
            "calculationField",
            PatternSchema::new(Tier::Advanced, "calculation").required(&["equation"]),
        );
        c.insert(
            "grid",
            PatternSchema::new(Tier::Advanced, "grid")
                .required(&["columns"])
                .numeric(&["validateMinRow", "validateMaxRow"])
                .composite(Composite::Grid),
        );
        c.insert(
            "formGrid",
            PatternSchema::new(Tier::Enterprise, "form grid")
                .required(&["columns"])
                .composite(Composite::FormGrid),
        );
        c.insert(
            "subform",
            PatternSchema::new(Tier::Advanced, "subform")
                .required(&["formId"])
                .composite(Composite::Subform),
        );
        c.insert(
            "ajaxSubform",
            PatternSchema::new(Tier::Enterprise, "ajax").required(&["formId", "controlField"]),
        );
        c
    }

    fn run(tree: &Value) -> ValidationResult {
        ValidationEngine::with_defaults().validate(tree, &catalog())
    }

    fn spec(fields: Value) -> Value {
        json!({"form": {"id": "t1", "name": "T1"}, "fields": fields})
    }

    fn error_paths(result: &ValidationResult) -> Vec<&str> {
        result.errors.iter().map(|m| m.path.as_str()).collect()
    }

    #[test]
    fn minimal_spec_passes_clean() {
        let result = run(&spec(json!([
            {"id": "f1", "label": "F1", "type": "textField", "required": true}
        ])));
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn missing_envelope_reports_both_blocks() {
        let result = run(&json!({"title": "x"}));
        assert_eq!(error_paths(&result), vec!["/form", "/fields"]);
        assert!(result.errors.iter().all(|m| m.fix.is_some()));
    }

    #[test]
    fn empty_field_list_is_an_error() {
        let result = run(&spec(json!([])));
        assert_eq!(error_paths(&result), vec!["/fields"]);
    }

    #[test]
    fn bad_form_id_gets_pattern_fix() {
        let tree = json!({
            "form": {"id": "1bad", "name": "x"},
            "fields": [{"id": "a", "label": "A", "type": "textField"}],
        });
        let result = run(&tree);
        assert_eq!(error_paths(&result), vec!["/form/id"]);
        assert!(result.errors[0].fix.as_deref().unwrap_or_default().contains("19"));
    }

    #[test]
    fn unknown_type_suggests_closest_keys() {
        let result = run(&spec(json!([{"id": "a", "label": "A", "type": "textfield"}])));
        assert_eq!(error_paths(&result), vec!["/fields/0/type"]);
        let fix = result.errors[0].fix.clone().unwrap_or_default();
        assert!(fix.starts_with("Did you mean textField"), "{fix}");
    }

    #[test]
    fn choice_field_without_options_names_the_field() {
        let result = run(&spec(json!([{"id": "status", "label": "Status", "type": "selectBox"}])));
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|m| m.text.contains("'status'") && m.text.contains("options")));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn choice_field_with_both_sources_fails() {
        let result = run(&spec(json!([{
            "id": "status", "label": "Status", "type": "radio",
            "options": [{"value": "a", "label": "A"}],
            "optionsSource": {"type": "formData", "formId": "statuses"},
        }])));
        assert!(result.errors.iter().any(|m| m.text.contains("both")));
    }

    #[test]
    fn options_source_variant_requirements() {
        let result = run(&spec(json!([
            {"id": "a", "label": "A", "type": "radio", "optionsSource": {"type": "api"}},
            {"id": "b", "label": "B", "type": "radio", "optionsSource": {"type": "ldap"}},
            {"id": "c", "label": "C", "type": "radio",
             "optionsSource": {"type": "database", "sql": "select 1"}},
        ])));
        assert_eq!(
            error_paths(&result),
            vec!["/fields/0/optionsSource/jsonUrl", "/fields/1/optionsSource/type"]
        );
    }

    #[test]
    fn duplicate_ids_fail() {
        let result = run(&spec(json!([
            {"id": "name", "label": "Name", "type": "textField"},
            {"id": "name", "label": "Other", "type": "textField"},
        ])));
        assert!(!result.valid);
        assert_eq!(error_paths(&result), vec!["/fields/1/id"]);
        assert!(result.errors[0].text.contains("/fields/0"));
    }

    #[test]
    fn reserved_ids_fail_case_insensitively() {
        let result =
            run(&spec(json!([{"id": "DateCreated", "label": "When", "type": "textField"}])));
        assert!(result.errors.iter().any(|m| m.text.contains("reserved")));
    }

    #[test]
    fn nested_field_lists_are_checked() {
        let result = run(&spec(json!([{
            "id": "child", "label": "Child", "type": "subform", "formId": "child_form",
            "fields": [
                {"id": "x", "label": "X", "type": "textField"},
                {"id": "x", "label": "Y", "type": "textField"},
            ],
        }])));
        assert_eq!(error_paths(&result), vec!["/fields/0/fields/1/id"]);
    }

    #[test]
    fn ranges_are_enforced() {
        let result = run(&spec(json!([
            {"id": "notes", "label": "Notes", "type": "textArea", "rows": 0, "cols": "500"},
            {"id": "items", "label": "Items", "type": "grid",
             "validateMinRow": 5, "validateMaxRow": 2,
             "columns": [{"id": "a", "label": "A"}]},
        ])));
        assert_eq!(
            error_paths(&result),
            vec!["/fields/0/rows", "/fields/0/cols", "/fields/1/validateMinRow"]
        );
    }

    #[test]
    fn grid_columns_are_checked() {
        let result = run(&spec(json!([{
            "id": "items", "label": "Items", "type": "grid",
            "columns": [
                {"id": "a", "label": "A"},
                {"id": "a", "label": "B", "type": "grid"},
            ],
        }])));
        assert_eq!(
            error_paths(&result),
            vec!["/fields/0/columns/1/id", "/fields/0/columns/1/type"]
        );
    }

    #[test]
    fn form_grid_columns_meet_field_requirements() {
        let result = run(&spec(json!([{
            "id": "lines", "label": "Lines", "type": "formGrid",
            "columns": [
                {"id": "colour", "label": "Colour", "type": "selectBox"},
                {"id": "total", "label": "Total", "type": "calculationField"},
            ],
        }])));
        assert_eq!(
            error_paths(&result),
            vec!["/fields/0/columns/0", "/fields/0/columns/1/equation"]
        );
        assert!(result.errors[0].text.contains("'colour'"));
    }

    #[test]
    fn plain_grid_columns_only_need_labels() {
        let result = run(&spec(json!([{
            "id": "items", "label": "Items", "type": "grid",
            "columns": [
                {"id": "colour", "label": "Colour", "type": "selectBox"},
                {"id": "total", "label": "Total", "type": "calculationField"},
            ],
        }])));
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn dangling_control_field_is_an_error() {
        let result = run(&spec(json!([{
            "id": "city", "label": "City", "type": "selectBox",
            "optionsSource": {"type": "formData", "formId": "cities",
                              "groupingColumn": "country", "controlField": "country"},
        }])));
        assert_eq!(error_paths(&result), vec!["/fields/0/optionsSource/controlField"]);
    }

    #[test]
    fn ajax_companion_rejects_value_column() {
        let result = run(&spec(json!([
            {"id": "customer", "label": "Customer", "type": "selectBox",
             "optionsSource": {"type": "formData", "formId": "customers", "valueColumn": "code"}},
            {"id": "details", "label": "Details", "type": "ajaxSubform",
             "formId": "customers", "controlField": "customer"},
        ])));
        assert!(!result.valid);
        assert_eq!(error_paths(&result), vec!["/fields/0/optionsSource/valueColumn"]);
        assert!(result.errors[0].fix.as_deref().unwrap_or_default().contains("primary key"));
    }

    #[test]
    fn ajax_companion_requires_choice_driver() {
        let result = run(&spec(json!([
            {"id": "code", "label": "Code", "type": "textField"},
            {"id": "details", "label": "Details", "type": "ajaxSubform",
             "formId": "customers", "controlField": "code"},
        ])));
        assert_eq!(error_paths(&result), vec!["/fields/1/controlField"]);
    }

    #[test]
    fn warnings_do_not_invalidate() {
        let tree = json!({
            "form": {"id": "t1", "name": "T1", "tableName": "other"},
            "fields": [
                {"id": "a", "label": "Same", "type": "textField"},
                {"id": "b", "label": "Same", "type": "textField"},
                {"id": "g1", "label": "G1", "type": "grid", "columns": [{"id": "x", "label": "X"}]},
                {"id": "g2", "label": "G2", "type": "formGrid",
                 "columns": [{"id": "y", "label": "Y"}]},
            ],
        });
        let result = run(&tree);
        assert!(result.valid, "{:?}", result.errors);
        let paths: Vec<_> = result.warnings.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["/form/tableName", "/fields/1/label", "/fields"]);
        let grid_warning = &result.warnings[2].text;
        assert!(grid_warning.contains("g1") && grid_warning.contains("g2"));
    }

    #[test]
    fn unfiltered_form_data_select_is_informational() {
        let result = run(&spec(json!([{
            "id": "country", "label": "Country", "type": "selectBox",
            "optionsSource": {"type": "formData", "formId": "countries"},
        }])));
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].text.contains("countries"));
    }
}
