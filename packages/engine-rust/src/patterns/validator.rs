//! Field validators: mandatory check, regex, length bounds.

use formforge_core::FieldSpec;
use serde_json::{Map, Value};

use super::{class, element, empty_plugin, flag, LIB};
use crate::error::RenderError;

/// Validator for `field`, or the empty plugin when nothing applies.
///
/// `required` becomes a `DefaultValidator`; the `validation` block adds a
/// `RegexValidator` and `TextFieldLengthValidator`s. More than one validator
/// is wrapped in a `MultiValidator`.
///
/// # Errors
///
/// Returns [`RenderError::InvalidAttribute`] for a malformed `validation` block.
pub fn build(field: &FieldSpec) -> Result<Value, RenderError> {
    build_with_message(field, "")
}

/// As [`build`], with the message shown when a required value is missing.
///
/// # Errors
///
/// Returns [`RenderError::InvalidAttribute`] for a malformed `validation` block.
pub fn build_with_message(field: &FieldSpec, required_message: &str) -> Result<Value, RenderError> {
    let mut validators = Vec::new();
    if field.required.unwrap_or(false) {
        let mut props = Map::new();
        props.insert("mandatory".into(), flag(true));
        props.insert("type".into(), Value::String(String::new()));
        props.insert("message".into(), Value::String(required_message.to_string()));
        validators.push(element(&class(LIB, "DefaultValidator"), props));
    }
    match field.attr("validation") {
        None | Some(Value::Null) => {}
        Some(Value::Object(block)) => validators.extend(block_validators(field, block)?),
        Some(other) => {
            return Err(RenderError::invalid(
                &field.id,
                "validation",
                format!("expected a mapping, found {other}"),
            ))
        }
    }
    Ok(match validators.len() {
        0 => empty_plugin(),
        1 => validators.remove(0),
        _ => {
            let mut props = Map::new();
            props.insert("validators".into(), Value::Array(validators));
            element(&class(LIB, "MultiValidator"), props)
        }
    })
}

fn block_validators(
    field: &FieldSpec,
    block: &Map<String, Value>,
) -> Result<Vec<Value>, RenderError> {
    let message = block.get("message").and_then(Value::as_str);
    let mut validators = Vec::new();
    if let Some(pattern) = block.get("pattern") {
        let Some(regex) = pattern.as_str() else {
            return Err(RenderError::invalid(&field.id, "validation", "'pattern' must be text"));
        };
        let mut props = Map::new();
        props.insert("regex".into(), Value::String(regex.to_string()));
        props.insert(
            "message".into(),
            Value::String(message.unwrap_or("Invalid format").to_string()),
        );
        validators.push(element(&class(LIB, "RegexValidator"), props));
    }
    for (key, default_message) in [
        ("minLength", "Minimum {} characters required"),
        ("maxLength", "Maximum {} characters allowed"),
    ] {
        let Some(bound) = block.get(key).filter(|v| !v.is_null()) else {
            continue;
        };
        let Some(bound) = bound.as_u64() else {
            return Err(RenderError::invalid(
                &field.id,
                "validation",
                format!("'{key}' must be a whole number, found {bound}"),
            ));
        };
        let mut props = Map::new();
        props.insert(key.into(), Value::String(bound.to_string()));
        let text = message.map_or_else(
            || default_message.replace("{}", &bound.to_string()),
            str::to_string,
        );
        props.insert("message".into(), Value::String(text));
        validators.push(element(&class(LIB, "TextFieldLengthValidator"), props));
    }
    Ok(validators)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nothing_to_check_renders_empty_plugin() {
        let field = FieldSpec::new("f", "F", "textField").with_attr("validation", json!({}));
        assert_eq!(build(&field).unwrap(), json!({"className": "", "properties": {}}));
    }

    #[test]
    fn required_renders_default_validator() {
        let mut field = FieldSpec::new("f", "F", "textField");
        field.required = Some(true);
        let validator = build(&field).unwrap();
        assert_eq!(validator["className"], "org.joget.apps.form.lib.DefaultValidator");
        assert_eq!(validator["properties"]["mandatory"], "true");
    }

    #[test]
    fn several_rules_are_wrapped() {
        let mut field = FieldSpec::new("code", "Code", "textField").with_attr(
            "validation",
            json!({"pattern": "^[A-Z]+$", "minLength": 2, "maxLength": 8}),
        );
        field.required = Some(true);
        let validator = build(&field).unwrap();
        assert_eq!(validator["className"], "org.joget.apps.form.lib.MultiValidator");
        let inner = validator["properties"]["validators"].as_array().unwrap();
        assert_eq!(inner.len(), 4);
        assert_eq!(inner[1]["properties"]["regex"], "^[A-Z]+$");
        assert_eq!(inner[2]["properties"]["minLength"], "2");
        assert_eq!(inner[3]["properties"]["message"], "Maximum 8 characters allowed");
    }

    #[test]
    fn custom_message_applies_to_block_rules() {
        let field = FieldSpec::new("email", "Email", "textField")
            .with_attr("validation", json!({"pattern": ".+@.+", "message": "Bad email"}));
        let validator = build(&field).unwrap();
        assert_eq!(validator["className"], "org.joget.apps.form.lib.RegexValidator");
        assert_eq!(validator["properties"]["message"], "Bad email");
    }

    #[test]
    fn required_message_is_used() {
        let mut field = FieldSpec::new("items", "Items", "subform");
        field.required = Some(true);
        let validator = build_with_message(&field, "Items is required").unwrap();
        assert_eq!(validator["properties"]["message"], "Items is required");
    }

    #[test]
    fn malformed_block_is_an_error() {
        let field = FieldSpec::new("f", "F", "textField").with_attr("validation", json!("strict"));
        assert!(matches!(build(&field), Err(RenderError::InvalidAttribute { .. })));
    }
}
