//! `FormForge` Engine: pattern registry, field renderers, document assembly
//! and the generation entry point.

pub mod assembler;
pub mod config;
pub mod context;
pub mod error;
pub mod generator;
pub mod patterns;
pub mod registry;

pub use assembler::{assemble, Documents, FormAssembler, RenderedField};
pub use config::{GeneratorConfig, ReferencePolicy};
pub use context::RenderContext;
pub use error::{GenerateError, RegistryError, RenderError};
pub use generator::FormGenerator;
pub use patterns::{FieldPattern, Rendered};
pub use registry::{PatternInfo, PatternRegistry};
