//! Free-text inputs.

use formforge_core::{FieldSpec, PatternSchema, Tier};
use serde_json::{Map, Value};

use super::{
    attr_text, attr_u64, base_properties, class, count_text, element, validator, FieldPattern,
    Rendered, ENTERPRISE, LIB,
};
use crate::context::RenderContext;
use crate::error::RenderError;

fn default_value(field: &FieldSpec) -> Value {
    Value::String(field.default_value.clone().unwrap_or_default())
}

/// Properties shared by single-line inputs.
fn line_input(field: &FieldSpec) -> Result<Map<String, Value>, RenderError> {
    let mut props = base_properties(field);
    props.insert("value".into(), default_value(field));
    props.insert(
        "size".into(),
        Value::String(field.size.clone().unwrap_or_default()),
    );
    props.insert("maxlength".into(), count_text(attr_u64(field, "maxLength")?));
    props.insert("placeholder".into(), Value::String(attr_text(field, "placeholder")?));
    props.insert("validator".into(), validator::build(field)?);
    Ok(props)
}

pub struct HiddenFieldPattern;

impl FieldPattern for HiddenFieldPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Standard, "Hidden value stored with the record")
    }

    fn render(&self, field: &FieldSpec, _ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let mut props = Map::new();
        props.insert("id".into(), Value::String(field.id.clone()));
        props.insert("value".into(), default_value(field));
        props.insert("useDefaultWhenEmpty".into(), Value::String(String::new()));
        Ok(Rendered::leaf(element(&class(LIB, "HiddenField"), props)))
    }
}

pub struct TextFieldPattern;

impl FieldPattern for TextFieldPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Standard, "Single-line text input").numeric(&["maxLength"])
    }

    fn render(&self, field: &FieldSpec, _ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        Ok(Rendered::leaf(element(&class(LIB, "TextField"), line_input(field)?)))
    }
}

pub struct PasswordFieldPattern;

impl FieldPattern for PasswordFieldPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Standard, "Masked text input").numeric(&["maxLength"])
    }

    fn render(&self, field: &FieldSpec, _ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        Ok(Rendered::leaf(element(&class(LIB, "PasswordField"), line_input(field)?)))
    }
}

pub struct TextAreaPattern;

impl FieldPattern for TextAreaPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Standard, "Multi-line text input").numeric(&["rows", "cols"])
    }

    fn render(&self, field: &FieldSpec, _ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let mut props = base_properties(field);
        props.insert("value".into(), default_value(field));
        props.insert("rows".into(), Value::String(attr_u64(field, "rows")?.to_string()));
        props.insert("cols".into(), Value::String(attr_u64(field, "cols")?.to_string()));
        props.insert("placeholder".into(), Value::String(attr_text(field, "placeholder")?));
        props.insert("validator".into(), validator::build(field)?);
        Ok(Rendered::leaf(element(&class(LIB, "TextArea"), props)))
    }
}

pub struct RichTextEditorPattern;

impl FieldPattern for RichTextEditorPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Enterprise, "WYSIWYG HTML editor (TinyMCE or Quill)")
            .numeric(&["rows"])
    }

    fn render(&self, field: &FieldSpec, _ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let editor = attr_text(field, "editor")?;
        if !matches!(editor.as_str(), "tinymce" | "quill") {
            return Err(RenderError::invalid(
                &field.id,
                "editor",
                format!("expected tinymce or quill, found '{editor}'"),
            ));
        }
        let mut props = base_properties(field);
        props.insert("editor".into(), Value::String(editor));
        props.insert("value".into(), default_value(field));
        props.insert("rows".into(), Value::String(attr_u64(field, "rows")?.to_string()));
        props.insert("placeholder".into(), Value::String(attr_text(field, "placeholder")?));
        props.insert("required".into(), super::flag(field.required.unwrap_or(false)));
        props.insert("validator".into(), validator::build(field)?);
        Ok(Rendered::leaf(element(&class(ENTERPRISE, "RichTextEditor"), props)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
