//! Field patterns: one renderer per field type.
//!
//! A pattern builds its JSON fragment directly as a `serde_json::Value`. All
//! scalar properties in a fragment are strings; booleans go through [`flag`]
//! so that `true` is `"true"` and `false` is `""` everywhere.

pub mod choice;
pub mod composite;
pub mod display;
pub mod input;
pub mod options;
pub mod text;
pub mod validator;

use std::sync::Arc;

use formforge_core::{FieldSpec, FormSpec, PatternSchema};
use serde_json::{json, Map, Value};

use crate::context::RenderContext;
use crate::error::RenderError;

/// Package of the standard form elements.
pub const LIB: &str = "org.joget.apps.form.lib";
/// Package of the enterprise form elements.
pub const ENTERPRISE: &str = "org.joget.plugin.enterprise";

// ---------------------------------------------------------------------------
// FieldPattern
// ---------------------------------------------------------------------------

/// Renders one normalized field into its target fragment.
///
/// Implementations read only the field and the context. Composite patterns
/// reach nested fields through [`RenderContext::render`] and return the
/// standalone forms they define in [`Rendered::child_forms`].
pub trait FieldPattern: Send + Sync {
    /// Declarative description consumed by the validators and the catalogue.
    fn schema(&self) -> PatternSchema;

    /// # Errors
    ///
    /// Returns a [`RenderError`] naming the field when an attribute the
    /// pattern needs is absent, malformed, or references something unknown.
    fn render(&self, field: &FieldSpec, ctx: &RenderContext<'_>) -> Result<Rendered, RenderError>;
}

/// Output of one pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub fragment: Value,
    /// Standalone forms defined inline by a composite field.
    pub child_forms: Vec<FormSpec>,
}

impl Rendered {
    #[must_use]
    pub fn leaf(fragment: Value) -> Self {
        Self {
            fragment,
            child_forms: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_child(mut self, form: FormSpec) -> Self {
        self.child_forms.push(form);
        self
    }
}

fn entry(
    key: &'static str,
    pattern: impl FieldPattern + 'static,
) -> (&'static str, Arc<dyn FieldPattern>) {
    (key, Arc::new(pattern))
}

/// Every built-in pattern with its registry key.
#[must_use]
pub fn builtins() -> Vec<(&'static str, Arc<dyn FieldPattern>)> {
    vec![
        entry("hiddenField", text::HiddenFieldPattern),
        entry("textField", text::TextFieldPattern),
        entry("passwordField", text::PasswordFieldPattern),
        entry("textArea", text::TextAreaPattern),
        entry("richTextEditor", text::RichTextEditorPattern),
        entry("selectBox", choice::ChoicePattern::select_box()),
        entry("checkBox", choice::ChoicePattern::check_box()),
        entry("radio", choice::ChoicePattern::radio()),
        entry("datePicker", input::DatePickerPattern),
        entry("fileUpload", input::FileUploadPattern),
        entry("idGenerator", input::IdGeneratorPattern),
        entry("calculationField", input::CalculationFieldPattern),
        entry("section", display::SectionPattern),
        entry("customHTML", display::CustomHtmlPattern),
        entry("grid", composite::GridPattern),
        entry("formGrid", composite::FormGridPattern),
        entry("subform", composite::SubformPattern),
        entry("ajaxSubform", composite::AjaxSubformPattern),
        entry("multiPagedForm", composite::MultiPagedFormPattern),
    ]
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

/// Target boolean encoding.
#[must_use]
pub fn flag(value: bool) -> Value {
    Value::String(if value { "true" } else { "" }.to_string())
}

/// A count rendered as text, with zero meaning "unset".
#[must_use]
pub fn count_text(value: u64) -> Value {
    Value::String(if value == 0 { String::new() } else { value.to_string() })
}

/// `{className, properties}` element.
#[must_use]
pub fn element(class_name: &str, properties: Map<String, Value>) -> Value {
    json!({"className": class_name, "properties": properties})
}

/// The placeholder used for an unset plugin slot (binder, validator).
#[must_use]
pub fn empty_plugin() -> Value {
    json!({"className": "", "properties": {}})
}

#[must_use]
pub fn class(package: &str, name: &str) -> String {
    format!("{package}.{name}")
}

/// Properties shared by every labelled input: id, label, readonly.
#[must_use]
pub fn base_properties(field: &FieldSpec) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("id".into(), Value::String(field.id.clone()));
    props.insert("label".into(), Value::String(field.label.clone()));
    props.insert("readonly".into(), flag(field.readonly.unwrap_or(false)));
    props
}

// ---------------------------------------------------------------------------
// Attribute access
// ---------------------------------------------------------------------------

/// A text attribute; numbers and booleans are accepted and rendered as text.
pub(crate) fn attr_text(field: &FieldSpec, key: &str) -> Result<String, RenderError> {
    match field.attr(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Null) | None => Err(RenderError::missing(&field.id, key)),
        Some(other) => Err(RenderError::invalid(
            &field.id,
            key,
            format!("expected text, found {other}"),
        )),
    }
}

/// A text attribute that must be present and non-blank.
pub(crate) fn required_text(field: &FieldSpec, key: &str) -> Result<String, RenderError> {
    let text = attr_text(field, key)?;
    if text.trim().is_empty() {
        return Err(RenderError::missing(&field.id, key));
    }
    Ok(text)
}

pub(crate) fn attr_u64(field: &FieldSpec, key: &str) -> Result<u64, RenderError> {
    match field.attr(key) {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            RenderError::invalid(&field.id, key, format!("expected a whole number, found {n}"))
        }),
        Some(Value::Null) | None => Err(RenderError::missing(&field.id, key)),
        Some(other) => Err(RenderError::invalid(
            &field.id,
            key,
            format!("expected a whole number, found {other}"),
        )),
    }
}

pub(crate) fn attr_bool(field: &FieldSpec, key: &str) -> Result<bool, RenderError> {
    match field.attr(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Null) | None => Err(RenderError::missing(&field.id, key)),
        Some(other) => Err(RenderError::invalid(
            &field.id,
            key,
            format!("expected true or false, found {other}"),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use formforge_core::{FormMeta, KnownForms};

    use super::*;
    use crate::config::GeneratorConfig;
    use crate::registry::PatternRegistry;

    /// Render `fields[index]` of `fields` inside a form `t1` with the built-in registry.
    pub(crate) fn render_in(
        fields: &[FieldSpec],
        index: usize,
        known: &KnownForms,
        config: &GeneratorConfig,
    ) -> Result<Rendered, RenderError> {
        let registry = PatternRegistry::with_builtins();
        let meta = FormMeta::new("t1", "T1");
        let ctx = RenderContext::new(&meta, fields, &registry, known, config);
        ctx.render(&fields[index])
    }

    pub(crate) fn render_one(field: FieldSpec) -> Result<Rendered, RenderError> {
        render_in(&[field], 0, &KnownForms::new(), &GeneratorConfig::default())
    }

    /// A field deserialized from JSON and run through the default normalizer.
    pub(crate) fn normalized(value: Value) -> FieldSpec {
        use formforge_core::{Normalizer, SpecNormalizer};
        let field: FieldSpec = serde_json::from_value(value).unwrap();
        let spec = FormSpec::new(FormMeta::new("t1", "T1"), vec![field]);
        Normalizer::new().normalize(&spec).fields.remove(0)
    }

    #[test]
    fn flag_encoding() {
        assert_eq!(flag(true), json!("true"));
        assert_eq!(flag(false), json!(""));
    }

    #[test]
    fn count_zero_is_unset() {
        assert_eq!(count_text(0), json!(""));
        assert_eq!(count_text(12), json!("12"));
    }

    #[test]
    fn attribute_errors_name_the_field() {
        let field = FieldSpec::new("f1", "F1", "textField").with_attr("rows", json!("many"));
        assert_eq!(
            attr_u64(&field, "rows"),
            Err(RenderError::InvalidAttribute {
                field_id: "f1".into(),
                attribute: "rows".into(),
                reason: "expected a whole number, found \"many\"".into(),
            })
        );
        assert_eq!(
            required_text(&field, "equation"),
            Err(RenderError::missing("f1", "equation"))
        );
    }

    #[test]
    fn builtin_keys_are_unique() {
        let keys: std::collections::BTreeSet<_> = builtins().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 19);
    }
}
