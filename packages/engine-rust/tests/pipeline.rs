//! End-to-end generation from YAML text.

use std::sync::Arc;

use formforge_core::{SchemaCatalog, SpecValidator, ValidationResult};
use formforge_engine::{FormGenerator, GenerateError, RenderError};
use serde_json::Value;

fn tree(yaml: &str) -> Value {
    formforge_core::load_str(yaml).unwrap()
}

/// Field fragments of a document, in layout order.
fn field_fragments(document: &Value) -> Vec<&Value> {
    document["elements"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|section| section["elements"].as_array().unwrap())
        .flat_map(|column| column["elements"].as_array().unwrap())
        .collect()
}

/// Skips structural checks so render-time defences can be observed.
struct AcceptAll;

impl SpecValidator for AcceptAll {
    fn validate(&self, _tree: &Value, _catalog: &SchemaCatalog) -> ValidationResult {
        ValidationResult::default()
    }
}

#[test]
fn minimal_spec_round_trip() {
    let docs = FormGenerator::new()
        .generate(&tree(
            "form: {id: t1, name: T1}\nfields:\n  - {id: f1, label: F1, type: textField, required: true}\n",
        ))
        .unwrap();
    assert_eq!(docs.len(), 1);
    let fields = field_fragments(&docs["t1"]);
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0]["properties"]["id"], "f1");
    assert_eq!(fields[0]["properties"]["validator"]["properties"]["mandatory"], "true");
}

#[test]
fn choice_without_options_names_the_field() {
    let result = FormGenerator::new().validate(&tree(
        "form: {id: t1, name: T1}\nfields:\n  - {id: colour, label: Colour, type: selectBox}\n",
    ));
    assert!(!result.is_valid());
    assert!(result
        .errors
        .iter()
        .any(|m| m.path == "/fields/0" && m.text.contains("colour")));
}

#[test]
fn duplicate_ids_fail_validation() {
    let result = FormGenerator::new().validate(&tree(
        "form: {id: t1, name: T1}\nfields:\n  - {id: f1, label: A, type: textField}\n  - {id: f1, label: B, type: textField}\n",
    ));
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|m| m.path == "/fields/1/id"));
}

const AJAX_WITH_VALUE_COLUMN: &str = "\
form: {id: order, name: Order}
fields:
  - id: product
    label: Product
    type: selectBox
    optionsSource: {type: formData, formId: md_product, valueColumn: code}
  - {id: productDetails, label: Details, type: ajaxSubform, formId: md_product, controlField: product}
";

#[test]
fn ajax_value_column_is_rejected_by_validation() {
    let err = FormGenerator::new().generate(&tree(AJAX_WITH_VALUE_COLUMN)).unwrap_err();
    let GenerateError::Validation { errors, .. } = err else {
        panic!("expected a validation failure");
    };
    assert!(errors.iter().any(|m| m.path == "/fields/0/optionsSource/valueColumn"));
}

#[test]
fn ajax_value_column_is_rejected_by_renderer() {
    let err = FormGenerator::new()
        .with_validator(Arc::new(AcceptAll))
        .generate(&tree(AJAX_WITH_VALUE_COLUMN))
        .unwrap_err();
    let GenerateError::Render { form_id, errors } = err else {
        panic!("expected a render failure");
    };
    assert_eq!(form_id, "order");
    assert_eq!(
        errors,
        vec![RenderError::AjaxValueColumn {
            field_id: "product".into(),
            companion: "productDetails".into(),
            value_column: "code".into(),
        }]
    );
}

#[test]
fn two_grids_warn_with_both_ids() {
    let result = FormGenerator::new().validate(&tree(
        "\
form: {id: t1, name: T1}
fields:
  - {id: gridA, label: A, type: grid, columns: [{id: c1, label: C1}]}
  - {id: gridB, label: B, type: formGrid, columns: [{id: c2, label: C2}]}
",
    ));
    assert!(result.is_valid());
    assert!(result
        .warnings
        .iter()
        .any(|m| m.text.contains("gridA") && m.text.contains("gridB")));
}

#[test]
fn batch_output_matches_independent_output() {
    let a = tree(
        "form: {id: md_country, name: Countries}\nfields:\n  - {id: code, label: Code, type: textField}\n",
    );
    let b = tree(
        "\
form: {id: address, name: Address}
fields:
  - id: country
    label: Country
    type: selectBox
    optionsSource: {type: formData, formId: md_country, labelColumn: code}
",
    );
    let generator = FormGenerator::new();
    let alone_a = generator.generate(&a).unwrap();
    let alone_b = generator.generate(&b).unwrap();
    let batch = generator.generate_batch(&[a, b]);
    assert_eq!(batch[0].as_ref().unwrap(), &alone_a);
    assert_eq!(batch[1].as_ref().unwrap(), &alone_b);

    let binder = &field_fragments(&alone_b["address"])[0]["properties"]["optionsBinder"];
    assert_eq!(binder["className"], "org.joget.apps.form.lib.FormOptionsBinder");
    assert_eq!(binder["properties"]["formDefId"], "md_country");
}

#[test]
fn form_grid_spec_yields_row_form_document() {
    let docs = FormGenerator::new()
        .generate(&tree(
            "\
form: {id: purchase_requisition, name: Purchase Requisition}
fields:
  - {id: requester, label: Requester, type: textField}
  - id: line_items
    label: Line Items
    type: formGrid
    columns:
      - {id: item, label: Item}
      - {id: qty, label: Quantity}
",
        ))
        .unwrap();
    assert_eq!(
        docs.keys().collect::<Vec<_>>(),
        vec!["purchase_req_line_it", "purchase_requisition"]
    );
    let row_fields = field_fragments(&docs["purchase_req_line_it"]);
    assert_eq!(row_fields[0]["className"], "org.joget.apps.form.lib.HiddenField");
    assert_eq!(row_fields[0]["properties"]["id"], "parentId");
    assert_eq!(row_fields.len(), 3);
    assert_eq!(docs["purchase_req_line_it"]["properties"]["tableName"], "purchase_req_line_it");

    let grid = field_fragments(&docs["purchase_requisition"])[1];
    assert_eq!(grid["properties"]["formDefId"], "purchase_req_line_it");
}

#[test]
fn cascading_dropdown_reloads_on_change() {
    let docs = FormGenerator::new()
        .generate(&tree(
            "\
form: {id: location, name: Location}
fields:
  - {id: country, label: Country, type: selectBox, optionsSource: {type: formData, formId: md_country}}
  - id: state
    label: State
    type: selectBox
    optionsSource: {type: formData, formId: md_state, groupingColumn: country, controlField: country}
",
        ))
        .unwrap();
    let fields = field_fragments(&docs["location"]);
    assert_eq!(fields[0]["properties"]["controlField"], "");
    assert_eq!(fields[1]["properties"]["controlField"], "country");
    assert_eq!(fields[1]["properties"]["optionsBinder"]["properties"]["useAjax"], "true");
}

#[test]
fn sections_split_the_layout() {
    let docs = FormGenerator::new()
        .generate(&tree(
            "\
form: {id: profile, name: Profile}
fields:
  - {id: name, label: Name, type: textField}
  - {id: contact, label: Contact Details, type: section}
  - {id: email, label: Email, type: textField}
",
        ))
        .unwrap();
    let sections = docs["profile"]["elements"].as_array().unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[1]["properties"]["label"], "Contact Details");
    let email = &sections[1]["elements"][0]["elements"][0];
    assert_eq!(
        email["properties"]["validator"]["className"],
        "org.joget.apps.form.lib.RegexValidator"
    );
}

#[test]
fn numeric_strings_are_coerced_before_rendering() {
    let docs = FormGenerator::new()
        .generate(&tree(
            "form: {id: t1, name: T1}\nfields:\n  - {id: notes, label: Notes, type: textArea, rows: '8'}\n",
        ))
        .unwrap();
    let notes = field_fragments(&docs["t1"])[0];
    assert_eq!(notes["properties"]["rows"], "8");
    assert_eq!(notes["properties"]["cols"], "50");
}

#[test]
fn form_grid_columns_fail_validation_before_rendering() {
    let spec = tree(
        "\
form: {id: order, name: Order}
fields:
  - id: lines
    label: Lines
    type: formGrid
    columns:
      - {id: colour, label: Colour, type: selectBox}
      - {id: total, label: Total, type: calculationField}
",
    );
    let generator = FormGenerator::new();
    let result = generator.validate(&spec);
    assert!(!result.is_valid());
    assert!(result
        .errors
        .iter()
        .any(|m| m.path == "/fields/0/columns/0" && m.text.contains("colour")));
    assert!(result.errors.iter().any(|m| m.path == "/fields/0/columns/1/equation"));
    assert!(matches!(
        generator.generate(&spec),
        Err(GenerateError::Validation { .. })
    ));
}

#[test]
fn batch_specs_sharing_a_form_id_fail() {
    let spec = |id: &str| {
        tree(&format!(
            "form: {{id: same, name: Same}}\nfields: [{{id: {id}, label: L, type: textField}}]"
        ))
    };
    let (first, second) = (spec("a"), spec("b"));
    let results = FormGenerator::new().generate_batch(&[first, second]);
    assert!(results[0].is_ok());
    let Err(GenerateError::Render { errors, .. }) = &results[1] else {
        panic!("expected a render failure");
    };
    assert_eq!(errors, &vec![RenderError::DuplicateDocument { form_id: "same".into() }]);

    let text = "\
forms:
  - form: {id: same, name: First}
    fields: [{id: a, label: A, type: textField}]
  - form: {id: same, name: Second}
    fields: [{id: b, label: B, type: textField}]
";
    assert!(matches!(
        FormGenerator::new().generate_str(text),
        Err(GenerateError::Render { .. })
    ));
}
