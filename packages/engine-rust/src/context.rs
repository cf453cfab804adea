use std::collections::HashMap;
use std::sync::Arc;

use formforge_core::{FieldSpec, FormMeta, FormResolver};

use crate::config::{GeneratorConfig, ReferencePolicy};
use crate::error::RenderError;
use crate::patterns::{FieldPattern, Rendered};
use crate::registry::PatternRegistry;

/// Everything a pattern may consult besides its own field: the enclosing
/// form, its sibling fields, the registry for nested rendering, and the set
/// of forms known to the run.
pub struct RenderContext<'a> {
    form: &'a FormMeta,
    fields: &'a [FieldSpec],
    siblings: HashMap<&'a str, &'a FieldSpec>,
    registry: &'a PatternRegistry,
    forms: &'a dyn FormResolver,
    config: &'a GeneratorConfig,
    depth: usize,
}

impl<'a> RenderContext<'a> {
    #[must_use]
    pub fn new(
        form: &'a FormMeta,
        fields: &'a [FieldSpec],
        registry: &'a PatternRegistry,
        forms: &'a dyn FormResolver,
        config: &'a GeneratorConfig,
    ) -> Self {
        let mut siblings = HashMap::new();
        for field in fields {
            siblings.entry(field.id.as_str()).or_insert(field);
        }
        Self {
            form,
            fields,
            siblings,
            registry,
            forms,
            config,
            depth: 0,
        }
    }

    /// Nesting level of the form being rendered; the top-level form is 0.
    #[must_use]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn form_id(&self) -> &'a str {
        &self.form.id
    }

    #[must_use]
    pub fn table_name(&self) -> &'a str {
        self.form.table()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn config(&self) -> &'a GeneratorConfig {
        self.config
    }

    #[must_use]
    pub fn registry(&self) -> &'a PatternRegistry {
        self.registry
    }

    #[must_use]
    pub fn sibling(&self, id: &str) -> Option<&'a FieldSpec> {
        self.siblings.get(id).copied()
    }

    /// Fields of the enclosing form in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &'a FieldSpec> {
        self.fields.iter()
    }

    /// Resolve `reference` as another field of the enclosing form.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownSibling`] when no other field has that id.
    pub fn require_sibling(
        &self,
        field: &FieldSpec,
        attribute: &str,
        reference: &str,
    ) -> Result<&'a FieldSpec, RenderError> {
        self.sibling(reference)
            .filter(|_| reference != field.id)
            .ok_or_else(|| RenderError::UnknownSibling {
                field_id: field.id.clone(),
                attribute: attribute.to_string(),
                reference: reference.to_string(),
            })
    }

    /// Whether `form_id` is known to the run: the enclosing form, a form of
    /// the current batch, or one listed in the configuration.
    #[must_use]
    pub fn is_known_form(&self, form_id: &str) -> bool {
        form_id == self.form.id
            || self.forms.is_known(form_id)
            || self.config.known_forms.contains(form_id)
    }

    /// Check a cross-form reference according to the reference policy.
    ///
    /// # Errors
    ///
    /// Under [`ReferencePolicy::Strict`], returns [`RenderError::UnknownForm`]
    /// with similar known ids when `form_id` is not known.
    pub fn check_form_reference(
        &self,
        field: &FieldSpec,
        form_id: &str,
    ) -> Result<(), RenderError> {
        if self.is_known_form(form_id) {
            return Ok(());
        }
        match self.config.reference_policy {
            ReferencePolicy::Deferred => {
                tracing::debug!(
                    field_id = %field.id,
                    form_id,
                    "form reference left for the platform to resolve"
                );
                Ok(())
            }
            ReferencePolicy::Strict => Err(RenderError::UnknownForm {
                field_id: field.id.clone(),
                form_id: form_id.to_string(),
                suggestions: self.forms.suggest(form_id),
            }),
        }
    }

    /// The pattern registered for `field`'s type.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Registry`] for an unregistered type.
    pub fn pattern(
        &self,
        field_id: &str,
        type_key: &str,
    ) -> Result<Arc<dyn FieldPattern>, RenderError> {
        self.registry.get(type_key).map_err(|source| RenderError::Registry {
            field_id: field_id.to_string(),
            source,
        })
    }

    /// Whether `field` is a companion that looks records up through its
    /// `controlField` (its pattern requires one).
    #[must_use]
    pub fn is_lookup_companion(&self, field: &FieldSpec) -> bool {
        self.registry
            .get(&field.field_type)
            .is_ok_and(|pattern| pattern.schema().required.contains(&"controlField"))
    }

    /// Render `field` with its registered pattern.
    ///
    /// # Errors
    ///
    /// Propagates registry and pattern failures.
    pub fn render(&self, field: &FieldSpec) -> Result<Rendered, RenderError> {
        let pattern = self.pattern(&field.id, &field.field_type)?;
        let rendered = pattern.render(field, self)?;
        tracing::debug!(
            form_id = %self.form.id,
            field_id = %field.id,
            type_key = %field.field_type,
            children = rendered.child_forms.len(),
            "rendered field"
        );
        Ok(rendered)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
