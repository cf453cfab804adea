//! `selectBox`, `checkBox` and `radio`.

use formforge_core::{FieldSpec, PatternSchema, Tier};
use serde_json::Value;

use super::{
    attr_bool, base_properties, class, element, flag, options, validator, FieldPattern, Rendered,
    LIB,
};
use crate::context::RenderContext;
use crate::error::RenderError;

/// One of the three choice elements; they differ only in class name and in
/// whether multiple selection is configurable.
pub struct ChoicePattern {
    class_name: &'static str,
    description: &'static str,
    multiple: bool,
}

impl ChoicePattern {
    #[must_use]
    pub fn select_box() -> Self {
        Self {
            class_name: "SelectBox",
            description: "Dropdown with static, form, API or database options and cascading",
            multiple: true,
        }
    }

    #[must_use]
    pub fn check_box() -> Self {
        Self {
            class_name: "CheckBox",
            description: "Multiple-choice check boxes",
            multiple: false,
        }
    }

    #[must_use]
    pub fn radio() -> Self {
        Self {
            class_name: "Radio",
            description: "Single-choice radio buttons",
            multiple: false,
        }
    }
}

impl FieldPattern for ChoicePattern {
    fn schema(&self) -> PatternSchema {
        let schema = PatternSchema::new(Tier::Standard, self.description).choice();
        if self.multiple {
            schema.flags(&["multiple"])
        } else {
            schema
        }
    }

    fn render(&self, field: &FieldSpec, ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let resolved = options::resolve(field, ctx)?;
        let mut props = base_properties(field);
        props.insert(
            "value".into(),
            Value::String(field.default_value.clone().unwrap_or_default()),
        );
        if self.multiple {
            props.insert("multiple".into(), flag(attr_bool(field, "multiple")?));
        }
        props.insert("options".into(), resolved.options);
        props.insert("optionsBinder".into(), resolved.binder);
        props.insert("controlField".into(), Value::String(resolved.control_field));
        props.insert("validator".into(), validator::build(field)?);
        Ok(Rendered::leaf(element(&class(LIB, self.class_name), props)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::patterns::tests::{normalized, render_one};

    #[test]
    fn static_select_box() {
        let field = normalized(json!({"id": "status", "label": "Status", "type": "selectBox",
            "options": [{"value": "active", "label": "Active"},
                        {"value": "inactive", "label": "Inactive"}]}));
        let fragment = render_one(field).unwrap().fragment;
        assert_eq!(fragment["className"], "org.joget.apps.form.lib.SelectBox");
        assert_eq!(fragment["properties"]["options"].as_array().unwrap().len(), 2);
        assert_eq!(fragment["properties"]["options"][0]["value"], "active");
        assert_eq!(fragment["properties"]["optionsBinder"]["className"], "");
        assert_eq!(fragment["properties"]["multiple"], "");
    }

    #[test]
    fn multiple_select_box() {
        let field = normalized(json!({"id": "tags", "label": "Tags", "type": "selectBox",
            "multiple": true, "options": [{"value": "a", "label": "A"}]}));
        assert_eq!(render_one(field).unwrap().fragment["properties"]["multiple"], "true");
    }

    #[test]
    fn required_check_box() {
        let field = normalized(json!({"id": "interests", "label": "Interests", "type": "checkBox",
            "required": true,
            "options": [{"value": "reading", "label": "Reading"},
                        {"value": "gaming", "label": "Gaming"}]}));
        let fragment = render_one(field).unwrap().fragment;
        assert_eq!(fragment["className"], "org.joget.apps.form.lib.CheckBox");
        assert_eq!(fragment["properties"]["options"][1]["label"], "Gaming");
        assert_eq!(fragment["properties"]["validator"]["properties"]["mandatory"], "true");
        assert!(fragment["properties"].get("multiple").is_none());
    }

    #[test]
    fn radio_without_options_fails() {
        let field = normalized(json!({"id": "r", "label": "R", "type": "radio"}));
        assert_eq!(render_one(field), Err(RenderError::missing("r", "options")));
    }
}
