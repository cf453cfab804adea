//! The generation entry point.
//!
//! [`FormGenerator`] sequences structural validation, typed-model
//! construction, normalization, rendering and assembly. Validator and
//! normalizer are injected, so callers can layer their own defaulting or
//! stricter rules without touching the engine.

use std::collections::BTreeSet;
use std::sync::Arc;

use formforge_core::{
    load_str, split_forms, FormSpec, KnownForms, Message, Normalizer, SemanticValidator,
    SpecNormalizer, SpecValidator, ValidationEngine, ValidationResult,
};
use serde_json::Value;
use tracing::{info, info_span, warn};

use crate::assembler::{Documents, FormAssembler};
use crate::config::GeneratorConfig;
use crate::error::{GenerateError, RenderError};
use crate::registry::PatternRegistry;

/// Form id of a raw tree, when it has one.
fn tree_form_id(tree: &Value) -> Option<String> {
    tree.pointer("/form/id").and_then(Value::as_str).map(str::to_string)
}

pub struct FormGenerator {
    registry: Arc<PatternRegistry>,
    validator: Arc<dyn SpecValidator>,
    normalizer: Arc<dyn SpecNormalizer>,
    config: Arc<GeneratorConfig>,
}

impl Default for FormGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl FormGenerator {
    /// Generator over the global registry with the default validator,
    /// normalizer and configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: PatternRegistry::global(),
            validator: Arc::new(ValidationEngine::with_defaults()),
            normalizer: Arc::new(Normalizer::new()),
            config: Arc::new(GeneratorConfig::default()),
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<PatternRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SpecValidator>) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Arc<dyn SpecNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: impl Into<Arc<GeneratorConfig>>) -> Self {
        self.config = config.into();
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PatternRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Structural validation only.
    #[must_use]
    pub fn validate(&self, tree: &Value) -> ValidationResult {
        self.validator.validate(tree, &self.registry.catalog())
    }

    /// Typed-model construction only.
    ///
    /// # Errors
    ///
    /// Returns the failed [`ValidationResult`] when the tree cannot be typed.
    pub fn validate_semantic(&self, tree: &Value) -> Result<FormSpec, ValidationResult> {
        SemanticValidator::new(&self.registry.catalog()).validate(tree)
    }

    /// Run both validation passes and normalize the result.
    ///
    /// Errors of the two passes are reported together, structural first. A
    /// location the structural pass already reported is not repeated.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Validation`] when either pass fails, or when
    /// warnings are present and `fail_on_warnings` is set.
    pub fn prepare(&self, tree: &Value) -> Result<FormSpec, GenerateError> {
        let catalog = self.registry.catalog();
        let structural = self.validator.validate(tree, &catalog);
        let semantic = SemanticValidator::new(&catalog).validate(tree);

        let form_id = tree_form_id(tree);
        for warning in &structural.warnings {
            warn!(form_id = form_id.as_deref().unwrap_or(""), %warning, "validation warning");
        }
        let mut errors: Vec<Message> = structural.errors;
        let spec = match semantic {
            Ok(spec) => Some(spec),
            Err(result) => {
                let reported: BTreeSet<String> = errors.iter().map(|m| m.path.clone()).collect();
                errors.extend(result.errors.into_iter().filter(|m| !reported.contains(&m.path)));
                None
            }
        };
        if self.config.fail_on_warnings {
            errors.extend(structural.warnings.iter().cloned());
        }
        match spec {
            Some(spec) if errors.is_empty() => Ok(self.normalizer.normalize(&spec)),
            _ => Err(GenerateError::Validation {
                form_id,
                errors,
                warnings: structural.warnings,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Generate every document one spec defines.
    ///
    /// # Errors
    ///
    /// Returns one [`GenerateError`] aggregating every validation or render
    /// problem of the form specification.
    pub fn generate(&self, tree: &Value) -> Result<Documents, GenerateError> {
        let spec = self.prepare(tree)?;
        let known: KnownForms =
            spec.declared_form_ids(&self.registry.catalog()).into_iter().collect();
        self.render(&spec, &known)
    }

    /// Load `text` (one spec, or a `forms:` list of specs) and generate it.
    ///
    /// # Errors
    ///
    /// Returns the load error, or the first failing spec's error.
    pub fn generate_str(&self, text: &str) -> Result<Documents, GenerateError> {
        let trees = split_forms(load_str(text)?);
        let mut documents = Documents::new();
        for result in self.generate_batch(&trees) {
            documents.extend(result?);
        }
        Ok(documents)
    }

    /// Generate several specs that may reference one another.
    ///
    /// Every spec is validated and normalized first; the form ids they
    /// declare are collected, then each spec is rendered against that set.
    /// A spec renders identically alone and in a batch, unless one of its
    /// documents is already produced by an earlier spec of the batch: that
    /// spec then fails with [`RenderError::DuplicateDocument`].
    #[must_use]
    pub fn generate_batch(&self, trees: &[Value]) -> Vec<Result<Documents, GenerateError>> {
        let catalog = self.registry.catalog();
        let prepared: Vec<Result<FormSpec, GenerateError>> =
            trees.iter().map(|tree| self.prepare(tree)).collect();
        let declared: BTreeSet<String> = prepared
            .iter()
            .filter_map(|spec| spec.as_ref().ok())
            .flat_map(|spec| spec.declared_form_ids(&catalog))
            .collect();
        info!(specs = trees.len(), forms = declared.len(), "collected batch form ids");
        let known: KnownForms = declared.into_iter().collect();

        let mut produced = BTreeSet::new();
        prepared
            .into_iter()
            .map(|spec| {
                let spec = spec?;
                let documents = self.render(&spec, &known)?;
                let errors: Vec<RenderError> = documents
                    .keys()
                    .filter(|form_id| produced.contains(*form_id))
                    .map(|form_id| RenderError::DuplicateDocument {
                        form_id: form_id.clone(),
                    })
                    .collect();
                if !errors.is_empty() {
                    warn!(
                        form_id = %spec.form.id,
                        duplicates = errors.len(),
                        "batch documents collide"
                    );
                    return Err(GenerateError::Render {
                        form_id: spec.form.id,
                        errors,
                    });
                }
                produced.extend(documents.keys().cloned());
                Ok(documents)
            })
            .collect()
    }

    fn render(&self, spec: &FormSpec, known: &KnownForms) -> Result<Documents, GenerateError> {
        let span = info_span!("generate", form_id = %spec.form.id);
        let _guard = span.enter();
        let documents = FormAssembler::new(&self.registry, known, &self.config)
            .assemble(spec)
            .map_err(|errors| GenerateError::Render {
                form_id: spec.form.id.clone(),
                errors,
            })?;
        info!(documents = documents.len(), "generated form");
        Ok(documents)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
