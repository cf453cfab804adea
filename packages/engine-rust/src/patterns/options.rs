//! Option lists and options binders for choice fields.

use formforge_core::{
    ApiSource, DatabaseSource, FieldSpec, FormDataSource, NameValue, OptionItem, OptionsSource,
};
use serde_json::{json, Map, Value};

use super::{class, element, empty_plugin, flag, LIB};
use crate::context::RenderContext;
use crate::error::RenderError;

/// The option-related properties of a choice field.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOptions {
    /// Inline `options` list (empty when a binder supplies them).
    pub options: Value,
    pub binder: Value,
    /// Sibling driving a cascade, or empty.
    pub control_field: String,
}

/// Resolve the options of `field` from its inline list or its source.
///
/// # Errors
///
/// Fails when neither is present, when a cascade names an unknown sibling,
/// when a referenced form is unknown under the strict policy, and when the
/// field drives an ajax companion while storing a business column.
pub fn resolve(field: &FieldSpec, ctx: &RenderContext<'_>) -> Result<ChoiceOptions, RenderError> {
    check_companions(field, ctx)?;
    match (&field.options, &field.options_source) {
        (Some(options), _) | (None, Some(OptionsSource::Static { options })) => Ok(ChoiceOptions {
            options: option_list(options),
            binder: empty_plugin(),
            control_field: String::new(),
        }),
        (None, Some(OptionsSource::FormData(source))) => form_data(field, source, ctx),
        (None, Some(OptionsSource::Api(source))) => Ok(ChoiceOptions {
            options: Value::Array(Vec::new()),
            binder: api_binder(source),
            control_field: String::new(),
        }),
        (None, Some(OptionsSource::Database(source))) => Ok(ChoiceOptions {
            options: Value::Array(Vec::new()),
            binder: database_binder(source),
            control_field: String::new(),
        }),
        (None, None) => Err(RenderError::missing(&field.id, "options")),
    }
}

fn option_list(options: &[OptionItem]) -> Value {
    Value::Array(
        options
            .iter()
            .map(|option| {
                let mut entry = Map::new();
                entry.insert("value".into(), Value::String(option.value.clone()));
                entry.insert("label".into(), Value::String(option.label.clone()));
                if let Some(grouping) = &option.grouping {
                    entry.insert("grouping".into(), Value::String(grouping.clone()));
                }
                Value::Object(entry)
            })
            .collect(),
    )
}

fn form_data(
    field: &FieldSpec,
    source: &FormDataSource,
    ctx: &RenderContext<'_>,
) -> Result<ChoiceOptions, RenderError> {
    if source.form_id.trim().is_empty() {
        return Err(RenderError::missing(&field.id, "optionsSource.formId"));
    }
    ctx.check_form_reference(field, &source.form_id)?;
    if !source.control_field.is_empty() {
        ctx.require_sibling(field, "optionsSource.controlField", &source.control_field)?;
    }
    let cascading = source.is_cascading();
    let mut props = Map::new();
    props.insert("formDefId".into(), Value::String(source.form_id.clone()));
    props.insert("idColumn".into(), Value::String(source.value_column.clone()));
    props.insert("labelColumn".into(), Value::String(source.label_column.clone()));
    props.insert("groupingColumn".into(), Value::String(source.grouping_column.clone()));
    props.insert("extraCondition".into(), Value::String(source.extra_condition.clone()));
    props.insert("addEmptyOption".into(), flag(source.add_empty_option));
    props.insert("emptyLabel".into(), Value::String(String::new()));
    props.insert("useAjax".into(), flag(cascading));
    Ok(ChoiceOptions {
        options: Value::Array(Vec::new()),
        binder: element(&class(LIB, "FormOptionsBinder"), props),
        control_field: if cascading {
            source.control_field.clone()
        } else {
            String::new()
        },
    })
}

fn pairs(items: &[NameValue]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|item| json!({"name": item.name, "value": item.value}))
            .collect(),
    )
}

fn api_binder(source: &ApiSource) -> Value {
    let mut props = Map::new();
    props.insert("jsonUrl".into(), Value::String(source.json_url.clone()));
    props.insert("requestType".into(), Value::String(source.request_type.to_lowercase()));
    props.insert("idColumn".into(), Value::String(source.id_column.clone()));
    props.insert("labelColumn".into(), Value::String(source.label_column.clone()));
    props.insert("groupingColumn".into(), Value::String(source.grouping_column.clone()));
    props.insert(
        "multirowBaseObject".into(),
        Value::String(source.multirow_base_object.clone()),
    );
    props.insert("postMethod".into(), Value::String(source.post_method.clone()));
    props.insert("params".into(), pairs(&source.params));
    props.insert("headers".into(), pairs(&source.headers));
    props.insert("addEmptyOption".into(), flag(source.add_empty_option));
    props.insert("emptyLabel".into(), Value::String(String::new()));
    element(&class(LIB, "JsonApiFormOptionsBinder"), props)
}

fn database_binder(source: &DatabaseSource) -> Value {
    let mut props = Map::new();
    props.insert("jdbcDatasource".into(), Value::String(source.jdbc_datasource.clone()));
    props.insert("tableName".into(), Value::String(source.table_name.clone()));
    props.insert("sql".into(), Value::String(source.sql.clone()));
    props.insert("idColumn".into(), Value::String(source.value_column.clone()));
    props.insert("labelColumn".into(), Value::String(source.label_column.clone()));
    props.insert("groupingColumn".into(), Value::String(source.grouping_column.clone()));
    props.insert("extraCondition".into(), Value::String(source.extra_condition.clone()));
    props.insert("addEmpty".into(), flag(source.add_empty));
    props.insert("useAjax".into(), flag(source.use_ajax));
    element(&class(LIB, "DatabaseWizardOptionsBinder"), props)
}

/// A choice field driving an ajax companion must store the source record's
/// primary key: a non-empty `valueColumn` breaks the companion's lookup.
fn check_companions(field: &FieldSpec, ctx: &RenderContext<'_>) -> Result<(), RenderError> {
    let Some(OptionsSource::FormData(source)) = &field.options_source else {
        return Ok(());
    };
    if source.value_column.is_empty() {
        return Ok(());
    }
    let companion = ctx.fields().find(|sibling| {
        sibling.id != field.id
            && sibling.str_attr("controlField") == Some(field.id.as_str())
            && ctx.is_lookup_companion(sibling)
    });
    match companion {
        Some(companion) => Err(RenderError::AjaxValueColumn {
            field_id: field.id.clone(),
            companion: companion.id.clone(),
            value_column: source.value_column.clone(),
        }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use formforge_core::{FormMeta, KnownForms};

    use super::*;
    use crate::config::GeneratorConfig;
    use crate::registry::PatternRegistry;

    fn field(value: Value) -> FieldSpec {
        serde_json::from_value(value).unwrap()
    }

    fn resolve_in(fields: &[FieldSpec], index: usize) -> Result<ChoiceOptions, RenderError> {
        let registry = PatternRegistry::with_builtins();
        let meta = FormMeta::new("t1", "T1");
        let known = KnownForms::new();
        let config = GeneratorConfig::default();
        let ctx = RenderContext::new(&meta, fields, &registry, &known, &config);
        resolve(&fields[index], &ctx)
    }

    #[test]
    fn static_source_renders_like_inline_options() {
        let inline = field(json!({"id": "s", "label": "S", "type": "radio",
            "options": [{"value": 1, "label": "One"}]}));
        let sourced = field(json!({"id": "s", "label": "S", "type": "radio",
            "optionsSource": {"type": "static", "options": [{"value": "1", "label": "One"}]}}));
        assert_eq!(resolve_in(&[inline], 0).unwrap(), resolve_in(&[sourced], 0).unwrap());
    }

    #[test]
    fn form_data_binder() {
        let f = field(json!({"id": "cat", "label": "Category", "type": "selectBox",
            "optionsSource": {"type": "formData", "formId": "md25equipCategory",
                              "valueColumn": "code"}}));
        let options = resolve_in(&[f], 0).unwrap();
        assert_eq!(options.binder["className"], "org.joget.apps.form.lib.FormOptionsBinder");
        assert_eq!(options.binder["properties"]["formDefId"], "md25equipCategory");
        assert_eq!(options.binder["properties"]["idColumn"], "code");
        assert_eq!(options.binder["properties"]["labelColumn"], "name");
        assert_eq!(options.binder["properties"]["useAjax"], "");
        assert_eq!(options.control_field, "");
    }

    #[test]
    fn cascade_marks_ajax_reload() {
        let fields = vec![
            field(json!({"id": "country", "label": "Country", "type": "selectBox",
                "options": [{"value": "NL", "label": "Netherlands"}]})),
            field(json!({"id": "city", "label": "City", "type": "selectBox",
                "optionsSource": {"type": "formData", "formId": "md_city",
                                  "groupingColumn": "country", "controlField": "country"}})),
        ];
        let options = resolve_in(&fields, 1).unwrap();
        assert_eq!(options.control_field, "country");
        assert_eq!(options.binder["properties"]["useAjax"], "true");
        assert_eq!(options.binder["properties"]["groupingColumn"], "country");
    }

    #[test]
    fn cascade_with_unknown_control_field_fails() {
        let fields = vec![field(json!({"id": "city", "label": "City", "type": "selectBox",
            "optionsSource": {"type": "formData", "formId": "md_city",
                              "filterField": "country", "parentField": "region"}}))];
        assert_eq!(
            resolve_in(&fields, 0),
            Err(RenderError::UnknownSibling {
                field_id: "city".into(),
                attribute: "optionsSource.controlField".into(),
                reference: "region".into(),
            })
        );
    }

    #[test]
    fn api_and_database_binders() {
        let api = field(json!({"id": "a", "label": "A", "type": "selectBox",
            "optionsSource": {"type": "api", "url": "https://example.test/items", "method": "POST",
                              "params": [{"name": "limit", "value": 50}]}}));
        let binder = resolve_in(&[api], 0).unwrap().binder;
        assert_eq!(binder["className"], "org.joget.apps.form.lib.JsonApiFormOptionsBinder");
        assert_eq!(binder["properties"]["requestType"], "post");
        assert_eq!(binder["properties"]["params"][0]["value"], "50");

        let db = field(json!({"id": "d", "label": "D", "type": "selectBox",
            "optionsSource": {"type": "database", "sql": "SELECT id, name FROM app_fd_item"}}));
        let binder = resolve_in(&[db], 0).unwrap().binder;
        assert_eq!(binder["className"], "org.joget.apps.form.lib.DatabaseWizardOptionsBinder");
        assert_eq!(binder["properties"]["jdbcDatasource"], "default");
        assert_eq!(binder["properties"]["addEmpty"], "true");
    }

    #[test]
    fn ajax_companion_rejects_value_column() {
        let fields = vec![
            field(json!({"id": "product", "label": "Product", "type": "selectBox",
                "optionsSource": {"type": "formData", "formId": "md_product",
                                  "valueColumn": "code"}})),
            field(json!({"id": "details", "label": "Details", "type": "ajaxSubform",
                "formId": "md_product", "controlField": "product"})),
        ];
        assert_eq!(
            resolve_in(&fields, 0),
            Err(RenderError::AjaxValueColumn {
                field_id: "product".into(),
                companion: "details".into(),
                value_column: "code".into(),
            })
        );
    }
}
