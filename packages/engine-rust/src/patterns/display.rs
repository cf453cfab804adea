//! Layout and display-only elements.

use formforge_core::{FieldSpec, PatternSchema, Tier};
use serde_json::{Map, Value};

use super::{attr_text, class, element, FieldPattern, Rendered, LIB};
use crate::context::RenderContext;
use crate::error::RenderError;

/// Section break. The assembler starts a new section at this element instead
/// of placing it in a column.
pub struct SectionPattern;

impl FieldPattern for SectionPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Advanced, "Starts a new titled section").structural()
    }

    fn render(&self, field: &FieldSpec, _ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let mut props = Map::new();
        props.insert("id".into(), Value::String(field.id.clone()));
        props.insert("label".into(), Value::String(field.label.clone()));
        Ok(Rendered::leaf(element("org.joget.apps.form.model.Section", props)))
    }
}

pub struct CustomHtmlPattern;

impl FieldPattern for CustomHtmlPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Advanced, "Static HTML content")
    }

    fn render(&self, field: &FieldSpec, _ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let mut props = Map::new();
        props.insert("id".into(), Value::String(field.id.clone()));
        props.insert("label".into(), Value::String(field.label.clone()));
        props.insert("value".into(), Value::String(attr_text(field, "html")?));
        props.insert("autoPopulate".into(), Value::String(String::new()));
        Ok(Rendered::leaf(element(&class(LIB, "CustomHTML"), props)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
