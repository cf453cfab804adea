//! Typed-model pass.
//!
//! Independently of the structural rules, builds [`FormSpec`] values from the
//! raw tree. Attributes a pattern declares as numeric or boolean are coerced
//! from their string spellings first (`"10"` becomes `10`, `"false"` becomes
//! `false`); a string that only looks like a number (`"ten"`, `"1.5"`) is an
//! error here even though the structural pass accepts any string.

use serde_json::{Map, Number, Value};

use super::{pointer, Message, ValidationResult};
use crate::schema::{FieldSpec, FormMeta, FormSpec};
use crate::types::SchemaCatalog;

/// Numeric keys of a field's `validation` block.
const VALIDATION_NUMERIC: [&str; 2] = ["minLength", "maxLength"];

/// Builds typed specs, reporting every coercion and shape failure.
pub struct SemanticValidator<'c> {
    catalog: &'c SchemaCatalog,
}

impl<'c> SemanticValidator<'c> {
    #[must_use]
    pub fn new(catalog: &'c SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Build the typed model, or report why it cannot be built.
    ///
    /// # Errors
    ///
    /// Returns a failed [`ValidationResult`] listing every form or field that
    /// could not be converted.
    pub fn validate(&self, tree: &Value) -> Result<FormSpec, ValidationResult> {
        let Some(root) = tree.as_object() else {
            return Err(ValidationResult::failure(Message::new(
                "",
                "specification must be a mapping",
            )));
        };
        let mut errors = Vec::new();

        let form = match root.get("form") {
            Some(form) => serde_json::from_value::<FormMeta>(form.clone())
                .map_err(|e| {
                    errors.push(Message::new("/form", format!("invalid form metadata: {e}")));
                })
                .ok(),
            None => {
                errors.push(Message::new("/form", "missing form metadata"));
                None
            }
        };

        let mut fields = Vec::new();
        match root.get("fields").and_then(Value::as_array) {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if let Some(field) = self.field(item, &pointer("/fields", i), &mut errors) {
                        fields.push(field);
                    }
                }
            }
            None => errors.push(Message::new("/fields", "missing field list")),
        }

        match form {
            Some(form) if errors.is_empty() => Ok(FormSpec::new(form, fields)),
            _ => Err(ValidationResult {
                valid: false,
                errors,
                warnings: Vec::new(),
            }),
        }
    }

    fn field(&self, item: &Value, path: &str, errors: &mut Vec<Message>) -> Option<FieldSpec> {
        let mut coerced = item.clone();
        let before = errors.len();
        self.coerce_field(&mut coerced, path, errors);
        if errors.len() > before {
            return None;
        }
        let id = item.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
        serde_json::from_value::<FieldSpec>(coerced)
            .map_err(|e| errors.push(Message::new(path, format!("field '{id}': {e}"))))
            .ok()
    }

    /// Coerce declared numeric/boolean attributes in place, recursing into
    /// columns, inline fields and inline page fields.
    fn coerce_field(&self, field: &mut Value, path: &str, errors: &mut Vec<Message>) {
        let Some(obj) = field.as_object_mut() else {
            return;
        };
        let type_key = obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("textField")
            .to_string();
        for attr in ["required", "readonly"] {
            coerce_flag(obj, attr, path, errors);
        }
        if let Some(schema) = self.catalog.get(&type_key) {
            for attr in schema.numeric {
                coerce_number(obj, attr, path, errors);
            }
            for attr in schema.flags {
                coerce_flag(obj, attr, path, errors);
            }
        }
        match obj.get_mut("validation") {
            Some(Value::Object(block)) => {
                coerce_validation(block, &pointer(path, "validation"), errors);
            }
            Some(Value::Null) | None => {}
            Some(_) => errors.push(Message::new(
                pointer(path, "validation"),
                "'validation' must be a mapping",
            )),
        }
        if let Some(Value::Array(columns)) = obj.get_mut("columns") {
            let columns_path = pointer(path, "columns");
            for (k, column) in columns.iter_mut().enumerate() {
                let column_path = pointer(&columns_path, k);
                if let Some(col) = column.as_object_mut() {
                    coerce_flag(col, "editable", &column_path, errors);
                }
                self.coerce_field(column, &column_path, errors);
            }
        }
        if let Some(Value::Array(children)) = obj.get_mut("fields") {
            let children_path = pointer(path, "fields");
            for (k, child) in children.iter_mut().enumerate() {
                self.coerce_field(child, &pointer(&children_path, k), errors);
            }
        }
        if let Some(Value::Array(pages)) = obj.get_mut("pages") {
            let pages_path = pointer(path, "pages");
            for (j, page) in pages.iter_mut().enumerate() {
                let page_path = pointer(&pages_path, j);
                if let Some(Value::Array(children)) = page.get_mut("fields") {
                    let children_path = pointer(&page_path, "fields");
                    for (k, child) in children.iter_mut().enumerate() {
                        self.coerce_field(child, &pointer(&children_path, k), errors);
                    }
                }
            }
        }
    }
}

fn coerce_validation(block: &mut Map<String, Value>, path: &str, errors: &mut Vec<Message>) {
    for attr in VALIDATION_NUMERIC {
        coerce_number(block, attr, path, errors);
    }
    for attr in ["pattern", "message"] {
        if block.get(attr).is_some_and(|v| !v.is_string()) {
            errors.push(Message::new(pointer(path, attr), format!("'{attr}' must be a string")));
        }
    }
    let min = block.get("minLength").and_then(Value::as_u64).unwrap_or(0);
    let max = block.get("maxLength").and_then(Value::as_u64).unwrap_or(0);
    if max > 0 && min > max {
        errors.push(Message::new(
            pointer(path, "minLength"),
            format!("minLength {min} exceeds maxLength {max}"),
        ));
    }
}

fn coerce_number(obj: &mut Map<String, Value>, attr: &str, path: &str, errors: &mut Vec<Message>) {
    let Some(value) = obj.get_mut(attr) else {
        return;
    };
    let replacement = match value {
        Value::Number(n) if n.is_u64() => return,
        Value::Null => return,
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match replacement {
        Some(n) => *value = Value::Number(Number::from(n)),
        None => errors.push(Message::new(
            pointer(path, attr),
            format!("'{attr}' expects a non-negative whole number, found {value}"),
        )),
    }
}

fn coerce_flag(obj: &mut Map<String, Value>, attr: &str, path: &str, errors: &mut Vec<Message>) {
    let Some(value) = obj.get_mut(attr) else {
        return;
    };
    let replacement = match value {
        Value::Bool(_) | Value::Null => return,
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    };
    match replacement {
        Some(b) => *value = Value::Bool(b),
        None => errors.push(Message::new(
            pointer(path, attr),
            format!("'{attr}' expects true or false, found {value}"),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::FieldBody;
    use crate::types::{Composite, PatternSchema, Tier};

    fn catalog() -> SchemaCatalog {
        let mut c = SchemaCatalog::new();
        c.insert("textField", PatternSchema::new(Tier::Standard, "").numeric(&["maxLength"]));
        c.insert(
            "fileUpload",
            PatternSchema::new(Tier::Standard, "")
                .numeric(&["maxSize"])
                .flags(&["multiple"]),
        );
        c.insert(
            "grid",
            PatternSchema::new(Tier::Advanced, "")
                .numeric(&["validateMinRow", "validateMaxRow"])
                .composite(Composite::Grid),
        );
        c
    }

    fn validate(tree: &Value) -> Result<FormSpec, ValidationResult> {
        let catalog = catalog();
        SemanticValidator::new(&catalog).validate(tree)
    }

    #[test]
    fn builds_typed_model() {
        let spec = validate(&json!({
            "form": {"id": "t1", "name": "T1"},
            "fields": [{"id": "f1", "label": "F1", "type": "textField", "required": true}],
        }))
        .unwrap();
        assert_eq!(spec.form.id, "t1");
        assert_eq!(spec.fields[0].required, Some(true));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let spec = validate(&json!({
            "form": {"id": "t1", "name": "T1"},
            "fields": [{"id": "doc", "label": "Doc", "type": "fileUpload",
                        "maxSize": " 25 ", "multiple": "yes"}],
        }))
        .unwrap();
        assert_eq!(spec.fields[0].u64_attr("maxSize"), Some(25));
        assert_eq!(spec.fields[0].bool_attr("multiple"), Some(true));
    }

    #[test]
    fn numeric_looking_strings_that_are_not_numbers_fail() {
        let result = validate(&json!({
            "form": {"id": "t1", "name": "T1"},
            "fields": [
                {"id": "doc", "label": "Doc", "type": "fileUpload", "maxSize": "ten"},
                {"id": "name", "label": "Name", "type": "textField", "maxLength": "1.5"},
            ],
        }))
        .unwrap_err();
        let paths: Vec<_> = result.errors.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["/fields/0/maxSize", "/fields/1/maxLength"]);
        assert!(result.errors[0].text.contains("\"ten\""));
    }

    #[test]
    fn column_attributes_are_coerced_by_column_type() {
        let spec = validate(&json!({
            "form": {"id": "t1", "name": "T1"},
            "fields": [{"id": "items", "label": "Items", "type": "grid", "validateMaxRow": "3",
                        "columns": [{"id": "sku", "label": "SKU", "maxLength": "12",
                                     "editable": "false"}]}],
        }))
        .unwrap();
        let FieldBody::Columns(columns) = spec.fields[0].body() else {
            panic!("expected columns");
        };
        assert_eq!(columns[0].attributes.get("maxLength"), Some(&json!(12)));
        assert_eq!(columns[0].editable, Some(false));
        assert_eq!(spec.fields[0].u64_attr("validateMaxRow"), Some(3));
    }

    #[test]
    fn validation_block_is_checked() {
        let result = validate(&json!({
            "form": {"id": "t1", "name": "T1"},
            "fields": [{"id": "code", "label": "Code", "type": "textField",
                        "validation": {"minLength": "8", "maxLength": 4}}],
        }))
        .unwrap_err();
        assert_eq!(result.errors[0].path, "/fields/0/validation/minLength");
    }

    #[test]
    fn universal_flags_are_coerced_like_type_flags() {
        let spec = validate(&json!({
            "form": {"id": "t1", "name": "T1"},
            "fields": [{"id": "f1", "label": "F1", "type": "textField",
                        "required": "yes", "readonly": "false"}],
        }))
        .unwrap();
        assert_eq!(spec.fields[0].required, Some(true));
        assert_eq!(spec.fields[0].readonly, Some(false));

        let result = validate(&json!({
            "form": {"id": "t1", "name": "T1"},
            "fields": [{"id": "f1", "label": "F1", "type": "textField", "required": "sometimes"}],
        }))
        .unwrap_err();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "/fields/0/required");
    }

    #[test]
    fn wrong_universal_types_report_serde_errors() {
        let result = validate(&json!({
            "form": {"id": "t1", "name": "T1"},
            "fields": [{"id": "f1", "label": ["F", "1"], "type": "textField"}],
        }))
        .unwrap_err();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "/fields/0");
        assert!(result.errors[0].text.starts_with("field 'f1':"));
    }

    #[test]
    fn missing_form_is_reported() {
        let result = validate(&json!({"fields": []})).unwrap_err();
        assert_eq!(result.errors[0].path, "/form");
    }
}
