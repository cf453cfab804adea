use std::sync::Arc;

use dashmap::DashMap;
use formforge_core::{SchemaCatalog, Tier};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::RegistryError;
use crate::patterns::{self, FieldPattern};

static GLOBAL: Lazy<Arc<PatternRegistry>> =
    Lazy::new(|| Arc::new(PatternRegistry::with_builtins()));

/// Catalogue entry describing one registered pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternInfo {
    pub type_key: String,
    pub tier: Tier,
    pub description: String,
    pub required_attributes: Vec<String>,
}

// ---------------------------------------------------------------------------
// PatternRegistry
// ---------------------------------------------------------------------------

/// Maps field-type keys to renderers.
///
/// Exactly one pattern is registered per key; registering an existing key
/// replaces the previous pattern. Populate the registry before generation
/// starts: generation reads it concurrently but never writes it.
pub struct PatternRegistry {
    patterns: DashMap<String, Arc<dyn FieldPattern>>,
}

impl PatternRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            patterns: DashMap::new(),
        }
    }

    /// A registry holding every built-in pattern.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for (key, pattern) in patterns::builtins() {
            registry.patterns.insert(key.to_string(), pattern);
        }
        registry
    }

    /// The process-wide registry, populated with the built-ins on first use.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Register `pattern` under `type_key`, returning the pattern it replaced.
    pub fn register(
        &self,
        type_key: impl Into<String>,
        pattern: Arc<dyn FieldPattern>,
    ) -> Option<Arc<dyn FieldPattern>> {
        let type_key = type_key.into();
        let previous = self.patterns.insert(type_key.clone(), pattern);
        if previous.is_some() {
            tracing::warn!(type_key = %type_key, "replaced registered field pattern");
        } else {
            tracing::debug!(type_key = %type_key, "registered field pattern");
        }
        previous
    }

    pub fn unregister(&self, type_key: &str) -> Option<Arc<dyn FieldPattern>> {
        self.patterns.remove(type_key).map(|(_, pattern)| pattern)
    }

    /// Look up the pattern for `type_key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] listing every registered key
    /// when `type_key` is not registered.
    pub fn get(&self, type_key: &str) -> Result<Arc<dyn FieldPattern>, RegistryError> {
        self.patterns
            .get(type_key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::UnknownType {
                type_key: type_key.to_string(),
                known: self.type_keys(),
            })
    }

    #[must_use]
    pub fn contains(&self, type_key: &str) -> bool {
        self.patterns.contains_key(type_key)
    }

    /// Registered keys, sorted.
    #[must_use]
    pub fn type_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.patterns.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Schema table of the current key set; the validators' type enumeration.
    #[must_use]
    pub fn catalog(&self) -> SchemaCatalog {
        self.patterns
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().schema()))
            .collect()
    }

    /// Catalogue of registered patterns, sorted by key.
    #[must_use]
    pub fn describe(&self) -> Vec<PatternInfo> {
        let mut infos: Vec<PatternInfo> = self
            .patterns
            .iter()
            .map(|entry| {
                let schema = entry.value().schema();
                PatternInfo {
                    type_key: entry.key().clone(),
                    tier: schema.tier,
                    description: schema.description.to_string(),
                    required_attributes: schema.required.iter().map(|a| (*a).to_string()).collect(),
                }
            })
            .collect();
        infos.sort_by(|a, b| a.type_key.cmp(&b.type_key));
        infos
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use formforge_core::{FieldSpec, PatternSchema};
    use serde_json::json;

    use super::*;
    use crate::context::RenderContext;
    use crate::error::RenderError;
    use crate::patterns::{element, Rendered};

    struct ColorPicker;

    impl FieldPattern for ColorPicker {
        fn schema(&self) -> PatternSchema {
            PatternSchema::new(Tier::Advanced, "Color picker")
        }

        fn render(
            &self,
            field: &FieldSpec,
            _ctx: &RenderContext<'_>,
        ) -> Result<Rendered, RenderError> {
            let mut props = serde_json::Map::new();
            props.insert("id".into(), json!(field.id));
            Ok(Rendered::leaf(element("com.example.ColorPicker", props)))
        }
    }

    #[test]
    fn builtins_cover_the_catalogue() {
        let registry = PatternRegistry::with_builtins();
        assert_eq!(registry.len(), 19);
        let keys = [
            "textField",
            "selectBox",
            "formGrid",
            "multiPagedForm",
            "ajaxSubform",
            "section",
        ];
        for key in keys {
            assert!(registry.contains(key), "{key}");
        }
    }

    #[test]
    fn unknown_type_lists_registered_keys() {
        let registry = PatternRegistry::new();
        registry.register("radio", Arc::new(ColorPicker));
        registry.register("colorPicker", Arc::new(ColorPicker));
        let Err(RegistryError::UnknownType { type_key, known }) = registry.get("slider") else {
            panic!("expected unknown type");
        };
        assert_eq!(type_key, "slider");
        assert_eq!(known, vec!["colorPicker", "radio"]);
    }

    #[test]
    fn register_replaces_and_unregister_removes() {
        let registry = PatternRegistry::with_builtins();
        assert!(registry.register("colorPicker", Arc::new(ColorPicker)).is_none());
        assert!(registry.register("colorPicker", Arc::new(ColorPicker)).is_some());
        assert_eq!(registry.len(), 20);
        assert!(registry.catalog().contains("colorPicker"));
        assert!(registry.unregister("colorPicker").is_some());
        assert!(registry.get("colorPicker").is_err());
        assert!(!registry.catalog().contains("colorPicker"));
    }

    #[test]
    fn describe_is_sorted_with_requirements() {
        let infos = PatternRegistry::with_builtins().describe();
        let keys: Vec<_> = infos.iter().map(|i| i.type_key.as_str()).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
        let calc = infos.iter().find(|i| i.type_key == "calculationField").unwrap();
        assert_eq!(calc.tier, Tier::Enterprise);
        assert_eq!(calc.required_attributes, vec!["equation"]);
    }

    #[test]
    fn global_registry_is_shared() {
        let a = PatternRegistry::global();
        let b = PatternRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.contains("textField"));
    }
}
