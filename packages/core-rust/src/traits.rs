use serde_json::Value;

use crate::schema::FormSpec;
use crate::types::SchemaCatalog;
use crate::validation::ValidationResult;

/// Structural pass over a raw tree.
///
/// Implementations must be pure: report every problem in the result and never
/// panic on malformed input.
pub trait SpecValidator: Send + Sync {
    fn validate(&self, tree: &Value, catalog: &SchemaCatalog) -> ValidationResult;
}

/// Defaulting pass over a validated spec.
///
/// Must be deterministic and idempotent: `normalize(normalize(x)) == normalize(x)`.
pub trait SpecNormalizer: Send + Sync {
    fn normalize(&self, spec: &FormSpec) -> FormSpec;
}

/// Answers whether a form id exists outside the field tree being rendered.
pub trait FormResolver: Send + Sync {
    fn is_known(&self, form_id: &str) -> bool;

    /// Known ids that look like `form_id`, best match first.
    fn suggest(&self, _form_id: &str) -> Vec<String> {
        Vec::new()
    }
}
