//! `FormForge` Core: form specification model, loading, validation and
//! normalization.

pub mod de;
pub mod loader;
pub mod normalize;
pub mod resolve;
pub mod schema;
pub mod traits;
pub mod types;
pub mod validation;

pub use loader::{load_str, split_forms, LoadError};
pub use normalize::{DerivationRule, Normalizer};
pub use resolve::KnownForms;
pub use schema::{ColumnSpec, FieldBody, FieldSpec, FormMeta, FormSpec, PageRef};
pub use traits::{FormResolver, SpecNormalizer, SpecValidator};
pub use types::{
    ApiSource, Composite, DatabaseSource, FormDataSource, NameValue, OptionItem, OptionsSource,
    PatternSchema, SchemaCatalog, Tier,
};
pub use validation::semantic::SemanticValidator;
pub use validation::{Finding, Message, SchemaRule, Severity, ValidationEngine, ValidationResult};
