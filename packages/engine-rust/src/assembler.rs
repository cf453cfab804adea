//! Wraps rendered fragments into form documents.
//!
//! One spec yields one document for itself plus one per standalone form its
//! composite fields define inline, keyed by form id.

use std::collections::BTreeMap;

use formforge_core::{FormMeta, FormResolver, FormSpec};
use serde_json::{json, Map, Value};

use crate::config::GeneratorConfig;
use crate::context::RenderContext;
use crate::error::RenderError;
use crate::patterns::{class, element, empty_plugin, LIB};
use crate::registry::PatternRegistry;

const MODEL: &str = "org.joget.apps.form.model";

/// Output documents keyed by form id.
pub type Documents = BTreeMap<String, Value>;

/// One rendered field ready for layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedField {
    /// Starts a new section instead of being placed in the current column.
    pub structural: bool,
    pub fragment: Value,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

fn column(elements: Vec<Value>) -> Value {
    json!({
        "className": class(MODEL, "Column"),
        "properties": {"width": "100%"},
        "elements": elements,
    })
}

struct SectionBuilder {
    header: Value,
    elements: Vec<Value>,
}

impl SectionBuilder {
    fn build(self) -> Value {
        let mut section = match self.header {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        section.insert("elements".into(), Value::Array(vec![column(self.elements)]));
        Value::Object(section)
    }
}

/// Form document for `meta` laid out as section, column, fields.
///
/// Fields go into an implicit first section until a structural field opens
/// the next one; a structural field at the very start replaces the implicit
/// section instead of leaving it empty.
#[must_use]
pub fn assemble(meta: &FormMeta, fields: Vec<RenderedField>, config: &GeneratorConfig) -> Value {
    let mut sections: Vec<SectionBuilder> = Vec::new();
    let mut current = SectionBuilder {
        header: json!({
            "className": class(MODEL, "Section"),
            "properties": {"id": config.default_section_id, "label": config.default_section_label},
        }),
        elements: Vec::new(),
    };
    let mut implicit = true;
    for field in fields {
        if field.structural {
            if !(implicit && current.elements.is_empty()) {
                sections.push(current);
            }
            current = SectionBuilder {
                header: field.fragment,
                elements: Vec::new(),
            };
            implicit = false;
        } else {
            current.elements.push(field.fragment);
        }
    }
    sections.push(current);

    let binder = || element(&class(LIB, "WorkflowFormBinder"), Map::new());
    let mut props = Map::new();
    props.insert("id".into(), Value::String(meta.id.clone()));
    props.insert("name".into(), Value::String(meta.name.clone()));
    props.insert("tableName".into(), Value::String(meta.table().to_string()));
    props.insert(
        "description".into(),
        Value::String(meta.description.clone().unwrap_or_default()),
    );
    props.insert("loadBinder".into(), binder());
    props.insert("storeBinder".into(), binder());
    props.insert("permission".into(), empty_plugin());
    props.insert("postProcessor".into(), empty_plugin());
    props.insert("noPermissionMessage".into(), Value::String(String::new()));
    props.insert("postProcessorRunOn".into(), Value::String("create".into()));

    json!({
        "className": class(MODEL, "Form"),
        "properties": props,
        "elements": sections.into_iter().map(SectionBuilder::build).collect::<Vec<_>>(),
    })
}

// ---------------------------------------------------------------------------
// FormAssembler
// ---------------------------------------------------------------------------

/// Renders a normalized spec and every form it defines inline.
pub struct FormAssembler<'a> {
    registry: &'a PatternRegistry,
    forms: &'a dyn FormResolver,
    config: &'a GeneratorConfig,
}

impl<'a> FormAssembler<'a> {
    #[must_use]
    pub fn new(
        registry: &'a PatternRegistry,
        forms: &'a dyn FormResolver,
        config: &'a GeneratorConfig,
    ) -> Self {
        Self {
            registry,
            forms,
            config,
        }
    }

    /// Documents for `spec` and its inline child forms.
    ///
    /// Rendering continues past a failing field so that every problem of the
    /// form is reported at once.
    ///
    /// # Errors
    ///
    /// Returns every [`RenderError`] raised while rendering the form tree.
    pub fn assemble(&self, spec: &FormSpec) -> Result<Documents, Vec<RenderError>> {
        let mut documents = Documents::new();
        let mut errors = Vec::new();
        self.assemble_into(spec, 0, &mut documents, &mut errors);
        if errors.is_empty() {
            Ok(documents)
        } else {
            Err(errors)
        }
    }

    fn assemble_into(
        &self,
        spec: &FormSpec,
        depth: usize,
        documents: &mut Documents,
        errors: &mut Vec<RenderError>,
    ) {
        let ctx =
            RenderContext::new(&spec.form, &spec.fields, self.registry, self.forms, self.config)
                .with_depth(depth);
        let mut rendered_fields = Vec::with_capacity(spec.fields.len());
        let mut children = Vec::new();
        for field in &spec.fields {
            match ctx.render(field) {
                Ok(rendered) => {
                    let structural = self
                        .registry
                        .get(&field.field_type)
                        .is_ok_and(|pattern| pattern.schema().structural);
                    rendered_fields.push(RenderedField {
                        structural,
                        fragment: rendered.fragment,
                    });
                    if !rendered.child_forms.is_empty() && depth >= self.config.max_nesting_depth {
                        errors.push(RenderError::NestingTooDeep {
                            field_id: field.id.clone(),
                            limit: self.config.max_nesting_depth,
                        });
                        continue;
                    }
                    children.extend(rendered.child_forms);
                }
                Err(err) => errors.push(err),
            }
        }
        if errors.is_empty() {
            let document = assemble(&spec.form, rendered_fields, self.config);
            insert_document(documents, &spec.form.id, document, errors);
        }
        for child in &children {
            self.assemble_into(child, depth + 1, documents, errors);
        }
    }
}

/// Insert a document; an identical duplicate is dropped, a differing one is an error.
fn insert_document(
    documents: &mut Documents,
    form_id: &str,
    document: Value,
    errors: &mut Vec<RenderError>,
) {
    match documents.get(form_id) {
        Some(existing) if *existing == document => {
            tracing::debug!(form_id, "identical document generated twice, keeping one");
        }
        Some(_) => errors.push(RenderError::DuplicateDocument {
            form_id: form_id.to_string(),
        }),
        None => {
            documents.insert(form_id.to_string(), document);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
