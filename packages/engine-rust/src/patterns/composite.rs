//! Composite fields: grids, embedded forms and multi-page containers.
//!
//! Composites that define a form inline return it as a child form; the
//! assembler renders it into its own document. Row forms of a `formGrid`
//! start with a hidden foreign-key field linking each row to its owner.
//! Subforms and pages are standalone linked forms and get no such field.

use std::collections::BTreeSet;

use formforge_core::{
    ColumnSpec, Composite, FieldBody, FieldSpec, FormMeta, FormSpec, OptionsSource, PatternSchema,
    Tier,
};
use serde_json::{json, Map, Value};

use super::{
    attr_bool, attr_text, attr_u64, base_properties, class, count_text, element, flag,
    required_text, validator, FieldPattern, Rendered, ENTERPRISE, LIB,
};
use crate::context::RenderContext;
use crate::error::RenderError;

/// Metadata of a form defined inline by a composite field.
fn child_meta(form_id: &str, name: &str, description: Option<&str>) -> FormMeta {
    let mut meta = FormMeta::new(form_id, if name.is_empty() { form_id } else { name });
    meta.table_name = Some(form_id.to_string());
    meta.description = Some(description.unwrap_or_default().to_string());
    meta
}

fn columns<'f>(field: &'f FieldSpec) -> Result<&'f [ColumnSpec], RenderError> {
    match field.body() {
        FieldBody::Columns(columns) => Ok(columns),
        _ => Err(RenderError::missing(&field.id, "columns")),
    }
}

/// Every column type must be a registered, non-composite pattern.
fn check_column_types(
    field: &FieldSpec,
    columns: &[ColumnSpec],
    ctx: &RenderContext<'_>,
) -> Result<(), RenderError> {
    let mut seen = BTreeSet::new();
    for column in columns {
        if !seen.insert(column.id.as_str()) {
            return Err(RenderError::invalid(
                &field.id,
                "columns",
                format!("duplicate column id '{}'", column.id),
            ));
        }
        let schema = ctx.pattern(&field.id, &column.field_type)?.schema();
        if schema.composite != Composite::Leaf || schema.structural {
            return Err(RenderError::invalid(
                &field.id,
                "columns",
                format!("column '{}' cannot be of type {}", column.id, column.field_type),
            ));
        }
    }
    Ok(())
}

/// `validateMinRow`/`validateMaxRow` as text, zero meaning unbounded.
fn row_bounds(field: &FieldSpec, props: &mut Map<String, Value>) -> Result<(), RenderError> {
    let min = attr_u64(field, "validateMinRow")?;
    let max = attr_u64(field, "validateMaxRow")?;
    if max > 0 && min > max {
        return Err(RenderError::invalid(
            &field.id,
            "validateMinRow",
            format!("minimum {min} exceeds maximum {max}"),
        ));
    }
    props.insert("validateMinRow".into(), count_text(min));
    props.insert("validateMaxRow".into(), count_text(max));
    Ok(())
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Simple table stored as one value; columns are plain text cells.
pub struct GridPattern;

impl FieldPattern for GridPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Advanced, "Editable table stored in a single field")
            .required(&["columns"])
            .numeric(&["validateMinRow", "validateMaxRow"])
            .composite(Composite::Grid)
    }

    fn render(&self, field: &FieldSpec, ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let columns = columns(field)?;
        check_column_types(field, columns, ctx)?;
        let mut props = base_properties(field);
        props.insert(
            "options".into(),
            Value::Array(
                columns
                    .iter()
                    .map(|column| json!({"value": column.id, "label": column.label}))
                    .collect(),
            ),
        );
        row_bounds(field, &mut props)?;
        props.insert("errorMessage".into(), Value::String(attr_text(field, "errorMessage")?));
        props.insert("validator".into(), validator::build(field)?);
        Ok(Rendered::leaf(element(&class(LIB, "Grid"), props)))
    }
}

// ---------------------------------------------------------------------------
// FormGrid
// ---------------------------------------------------------------------------

/// Grid whose rows are records of a separate row form.
pub struct FormGridPattern;

impl FormGridPattern {
    fn row_form(
        field: &FieldSpec,
        form_id: &str,
        foreign_key: &str,
        columns: &[ColumnSpec],
    ) -> Result<FormSpec, RenderError> {
        if columns.iter().any(|column| column.id == foreign_key) {
            return Err(RenderError::invalid(
                &field.id,
                "foreignKey",
                format!("'{foreign_key}' collides with a column id"),
            ));
        }
        let mut fields = Vec::with_capacity(columns.len() + 1);
        fields.push(FieldSpec::hidden(foreign_key));
        for column in columns {
            let mut row_field = column.to_field();
            if column.editable == Some(false) {
                row_field.readonly = Some(true);
            }
            fields.push(row_field);
        }
        Ok(FormSpec::new(child_meta(form_id, &field.label, None), fields))
    }
}

impl FieldPattern for FormGridPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Enterprise, "Grid of row-form records linked by foreign key")
            .required(&["columns"])
            .numeric(&["validateMinRow", "validateMaxRow"])
            .flags(&["allowAddRow", "allowDeleteRow"])
            .composite(Composite::FormGrid)
    }

    fn render(&self, field: &FieldSpec, ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let columns = columns(field)?;
        check_column_types(field, columns, ctx)?;
        let form_id = required_text(field, "formId")?;
        let foreign_key = required_text(field, "foreignKey")?;

        let column_defs = columns
            .iter()
            .map(|column| {
                let mut def = Map::new();
                def.insert("id".into(), Value::String(column.id.clone()));
                def.insert("label".into(), Value::String(column.label.clone()));
                def.insert("type".into(), Value::String(column.field_type.clone()));
                def.insert("editable".into(), flag(column.editable.unwrap_or(true)));
                if let Some(options) = &column.options {
                    def.insert(
                        "options".into(),
                        Value::Array(
                            options
                                .iter()
                                .map(|option| json!({"value": option.value, "label": option.label}))
                                .collect(),
                        ),
                    );
                }
                Value::Object(def)
            })
            .collect();
        let binder = || {
            let mut props = Map::new();
            props.insert("formDefId".into(), Value::String(form_id.clone()));
            props.insert("foreignKey".into(), Value::String(foreign_key.clone()));
            element(&class(LIB, "MultirowFormBinder"), props)
        };

        let mut props = base_properties(field);
        props.insert("formDefId".into(), Value::String(form_id.clone()));
        props.insert("columns".into(), Value::Array(column_defs));
        row_bounds(field, &mut props)?;
        props.insert("allowAddRow".into(), flag(attr_bool(field, "allowAddRow")?));
        props.insert("allowDeleteRow".into(), flag(attr_bool(field, "allowDeleteRow")?));
        props.insert("loadBinder".into(), binder());
        props.insert("storeBinder".into(), binder());
        props.insert("validator".into(), validator::build(field)?);

        let row_form = Self::row_form(field, &form_id, &foreign_key, columns)?;
        Ok(Rendered::leaf(element(&class(ENTERPRISE, "FormGrid"), props)).with_child(row_form))
    }
}

// ---------------------------------------------------------------------------
// Subform / AjaxSubform
// ---------------------------------------------------------------------------

/// Embedded form; inline `fields` define that form, otherwise `formId`
/// references an existing one.
fn embedded_form(
    field: &FieldSpec,
    form_id: &str,
    ctx: &RenderContext<'_>,
) -> Result<Option<FormSpec>, RenderError> {
    match field.body() {
        FieldBody::Embedded(children) => Ok(Some(FormSpec::new(
            child_meta(form_id, &field.label, None),
            children.to_vec(),
        ))),
        _ => {
            ctx.check_form_reference(field, form_id)?;
            Ok(None)
        }
    }
}

fn with_embedded(fragment: Value, child: Option<FormSpec>) -> Rendered {
    match child {
        Some(form) => Rendered::leaf(fragment).with_child(form),
        None => Rendered::leaf(fragment),
    }
}

pub struct SubformPattern;

impl FieldPattern for SubformPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Advanced, "Embedded master-detail form")
            .required(&["formId"])
            .flags(&["noAddButton", "noDeleteButton", "readonlyLabel"])
            .composite(Composite::Subform)
    }

    fn render(&self, field: &FieldSpec, ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let form_id = required_text(field, "formId")?;
        let child = embedded_form(field, &form_id, ctx)?;
        let mut props = base_properties(field);
        props.insert("formDefId".into(), Value::String(form_id));
        props.insert("readonlyLabel".into(), flag(attr_bool(field, "readonlyLabel")?));
        props.insert("addButtonLabel".into(), Value::String(attr_text(field, "addButtonLabel")?));
        props.insert(
            "deleteButtonLabel".into(),
            Value::String(attr_text(field, "deleteButtonLabel")?),
        );
        props.insert("noAddButton".into(), flag(attr_bool(field, "noAddButton")?));
        props.insert("noDeleteButton".into(), flag(attr_bool(field, "noDeleteButton")?));
        props.insert(
            "workflowVariable".into(),
            Value::String(attr_text(field, "workflowVariable")?),
        );
        props.insert("parentSubFormId".into(), Value::String(attr_text(field, "parentField")?));
        props.insert(
            "validator".into(),
            validator::build_with_message(field, &format!("{} is required", field.label))?,
        );
        Ok(with_embedded(element(&class(LIB, "SubForm"), props), child))
    }
}

/// Read-only detail view that reloads the record selected in its
/// `controlField`.
pub struct AjaxSubformPattern;

impl FieldPattern for AjaxSubformPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Enterprise, "Detail form reloaded from a choice field's selection")
            .required(&["formId", "controlField"])
            .flags(&["readonlyLabel", "noFrame"])
            .composite(Composite::Subform)
    }

    fn render(&self, field: &FieldSpec, ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let form_id = required_text(field, "formId")?;
        let control = required_text(field, "controlField")?;
        let driver = ctx.require_sibling(field, "controlField", &control)?;
        if !matches!(driver.options_source, Some(OptionsSource::FormData(_))) {
            return Err(RenderError::invalid(
                &field.id,
                "controlField",
                format!("'{control}' must be a choice field with a formData options source"),
            ));
        }
        let child = embedded_form(field, &form_id, ctx)?;
        let mut props = base_properties(field);
        props.insert("formDefId".into(), Value::String(form_id));
        props.insert("controlField".into(), Value::String(control));
        props.insert("readonlyLabel".into(), flag(attr_bool(field, "readonlyLabel")?));
        props.insert("noFrame".into(), flag(attr_bool(field, "noFrame")?));
        props.insert("validator".into(), validator::build(field)?);
        Ok(with_embedded(element(&class(ENTERPRISE, "AjaxSubForm"), props), child))
    }
}

// ---------------------------------------------------------------------------
// MultiPagedForm
// ---------------------------------------------------------------------------

pub struct MultiPagedFormPattern;

impl FieldPattern for MultiPagedFormPattern {
    fn schema(&self) -> PatternSchema {
        PatternSchema::new(Tier::Enterprise, "Wizard of several forms shown page by page")
            .required(&["pages"])
            .flags(&["showNavigation", "showProgressBar"])
            .composite(Composite::Pages)
    }

    fn render(&self, field: &FieldSpec, ctx: &RenderContext<'_>) -> Result<Rendered, RenderError> {
        let FieldBody::Pages(pages) = field.body() else {
            return Err(RenderError::missing(&field.id, "pages"));
        };
        if pages.is_empty() {
            return Err(RenderError::missing(&field.id, "pages"));
        }
        let mut seen = BTreeSet::new();
        let mut page_defs = Vec::with_capacity(pages.len());
        let mut children = Vec::new();
        for page in pages {
            if !seen.insert(page.form_id.as_str()) {
                return Err(RenderError::invalid(
                    &field.id,
                    "pages",
                    format!("form '{}' appears on more than one page", page.form_id),
                ));
            }
            match &page.fields {
                Some(fields) => children.push(FormSpec::new(
                    child_meta(&page.form_id, &page.label, page.description.as_deref()),
                    fields.clone(),
                )),
                None => ctx.check_form_reference(field, &page.form_id)?,
            }
            page_defs.push(json!({
                "formDefId": page.form_id,
                "label": page.label,
                "description": page.description.clone().unwrap_or_default(),
            }));
        }
        let mut props = base_properties(field);
        props.insert("pages".into(), Value::Array(page_defs));
        props.insert("showNavigation".into(), flag(attr_bool(field, "showNavigation")?));
        props.insert("showProgressBar".into(), flag(attr_bool(field, "showProgressBar")?));
        let mut rendered = Rendered::leaf(element(&class(ENTERPRISE, "PageFormElement"), props));
        rendered.child_forms = children;
        Ok(rendered)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
