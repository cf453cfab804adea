use std::collections::BTreeSet;

/// How references to forms outside the current spec are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferencePolicy {
    /// Unknown form ids are rendered unchecked; the platform resolves them.
    #[default]
    Deferred,
    /// Every referenced form id must be known to the run.
    Strict,
}

/// Generator-level configuration.
///
/// Controls cross-form reference checking, composite recursion depth and the
/// shape of the implicit section wrapper.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub reference_policy: ReferencePolicy,
    /// Forms that exist outside the current run (e.g. deployed lookup forms).
    pub known_forms: BTreeSet<String>,
    /// Bound on nested composite rendering (grid inside subform inside pages).
    pub max_nesting_depth: usize,
    /// Label of the implicit first section.
    pub default_section_label: String,
    /// Element id of the implicit first section.
    pub default_section_id: String,
    /// Treat validation warnings as errors.
    pub fail_on_warnings: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            reference_policy: ReferencePolicy::Deferred,
            known_forms: BTreeSet::new(),
            max_nesting_depth: 4,
            default_section_label: "Section".to_string(),
            default_section_id: "section1".to_string(),
            fail_on_warnings: false,
        }
    }
}

impl GeneratorConfig {
    #[must_use]
    pub fn strict() -> Self {
        Self {
            reference_policy: ReferencePolicy::Strict,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_known_forms<I, S>(mut self, forms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_forms.extend(forms.into_iter().map(Into::into));
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.reference_policy, ReferencePolicy::Deferred);
        assert!(config.known_forms.is_empty());
        assert_eq!(config.max_nesting_depth, 4);
        assert_eq!(config.default_section_label, "Section");
        assert_eq!(config.default_section_id, "section1");
        assert!(!config.fail_on_warnings);
    }

    #[test]
    fn strict_with_known_forms() {
        let config = GeneratorConfig::strict().with_known_forms(["md_country", "md_state"]);
        assert_eq!(config.reference_policy, ReferencePolicy::Strict);
        assert!(config.known_forms.contains("md_state"));
    }
}
