//! Typed inputs: dates, uploads, generated ids and calculated values.

use formforge_core::{FieldSpec, PatternSchema, Tier};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{
    attr_bool, attr_text, attr_u64, base_properties, class, element, flag, required_text, validator,
    FieldPattern, Rendered, ENTERPRISE, LIB,
};
use crate::context::RenderContext;
use crate::error::RenderError;

/// Widest zero-padded counter an id format may ask for.
const MAX_COUNTER_WIDTH: u32 = 12;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]*)\}").expect("placeholder pattern compiles"));

fn default_value(field: &FieldSpec) -> Value {
    Value::String(field.default_value.clone().unwrap_or_default())
}

pub struct DatePickerPattern;

impl FieldPattern for DatePickerPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Standard, "Calendar date input")
    }

    fn render(&self, field: &FieldSpec, _ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let format = required_text(field, "dateFormat")?;
        let mut props = base_properties(field);
        props.insert("value".into(), default_value(field));
        props.insert("format".into(), Value::String(format.clone()));
        props.insert("dataFormat".into(), Value::String(format));
        props.insert("validator".into(), validator::build(field)?);
        Ok(Rendered::leaf(element(&class(LIB, "DatePicker"), props)))
    }
}

pub struct FileUploadPattern;

impl FieldPattern for FileUploadPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Standard, "File attachment with size and type limits")
            .numeric(&["maxSize"])
            .flags(&["multiple"])
    }

    fn render(&self, field: &FieldSpec, _ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let mut props = base_properties(field);
        props.insert("maxSize".into(), Value::String(attr_u64(field, "maxSize")?.to_string()));
        props.insert("fileType".into(), Value::String(attr_text(field, "fileTypes")?));
        props.insert("multiple".into(), flag(attr_bool(field, "multiple")?));
        props.insert("validator".into(), validator::build(field)?);
        Ok(Rendered::leaf(element(&class(LIB, "FileUpload"), props)))
    }
}

/// Check the placeholders of an id format.
///
/// Accepted: `{prefix}`, `{postfix}`, `{count}` and `{count:0Nd}` with
/// `1 <= N <= 12`. At least one counter is required.
///
/// # Errors
///
/// Returns a description of the first problem found.
pub fn check_id_format(format: &str) -> Result<(), String> {
    let mut counters = 0usize;
    for caps in PLACEHOLDER.captures_iter(format) {
        let name = &caps[1];
        match name {
            "prefix" | "postfix" => {}
            "count" => counters += 1,
            _ => {
                let width = name
                    .strip_prefix("count:0")
                    .and_then(|rest| rest.strip_suffix('d'))
                    .and_then(|digits| digits.parse::<u32>().ok())
                    .ok_or_else(|| format!("unknown placeholder '{{{name}}}'"))?;
                if !(1..=MAX_COUNTER_WIDTH).contains(&width) {
                    return Err(format!("counter width {width} is outside 1..={MAX_COUNTER_WIDTH}"));
                }
                counters += 1;
            }
        }
    }
    if PLACEHOLDER.replace_all(format, "").contains(['{', '}']) {
        return Err("unbalanced braces".to_string());
    }
    if counters == 0 {
        return Err("needs a {count} placeholder".to_string());
    }
    Ok(())
}

pub struct IdGeneratorPattern;

impl FieldPattern for IdGeneratorPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Advanced, "Auto-numbered identifier with a padded counter")
    }

    fn render(&self, field: &FieldSpec, _ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let format = required_text(field, "format")?;
        check_id_format(&format)
            .map_err(|reason| RenderError::invalid(&field.id, "format", reason))?;
        let mut props = base_properties(field);
        props.insert("readonly".into(), flag(true));
        props.insert("value".into(), default_value(field));
        props.insert("format".into(), Value::String(format));
        props.insert("prefix".into(), Value::String(attr_text(field, "prefix")?));
        props.insert("postfix".into(), Value::String(attr_text(field, "postfix")?));
        props.insert("envVariable".into(), Value::String(required_text(field, "envVariable")?));
        props.insert("hidden".into(), flag(false));
        Ok(Rendered::leaf(element(&class(LIB, "IdGeneratorField"), props)))
    }
}

/// The equation is passed through verbatim; the platform evaluates it.
pub struct CalculationFieldPattern;

impl FieldPattern for CalculationFieldPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Enterprise, "Value computed from sibling fields")
            .required(&["equation"])
            .numeric(&["decimalPlaces"])
            .flags(&["storeNumeric"])
    }

    fn render(&self, field: &FieldSpec, _ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let mut props = base_properties(field);
        props.insert("value".into(), default_value(field));
        props.insert("equation".into(), Value::String(required_text(field, "equation")?));
        props.insert("storeNumeric".into(), flag(attr_bool(field, "storeNumeric")?));
        props.insert(
            "decimalPlaces".into(),
            Value::String(attr_u64(field, "decimalPlaces")?.to_string()),
        );
        Ok(Rendered::leaf(element(&class(ENTERPRISE, "CalculationField"), props)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
