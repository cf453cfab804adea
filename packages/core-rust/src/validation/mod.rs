//! Validation findings and the structural rule engine.
//!
//! The structural pass works on the raw tree handed over by the loader and
//! never short-circuits: every rule runs and every finding is reported, so an
//! author sees all problems in one pass. The semantic pass lives in
//! [`semantic`] and shares only the [`Message`] vocabulary.

pub mod semantic;
pub mod structural;

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::traits::SpecValidator;
use crate::types::SchemaCatalog;

/// Version of the declarative rule set below.
pub const SCHEMA_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// Message / Finding
// ---------------------------------------------------------------------------

/// One problem found in a specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// JSON-pointer location, e.g. `/fields/2/optionsSource/formId`.
    pub path: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl Message {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            fix: None,
        }
    }

    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: {}", self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A [`Message`] tagged with its severity, as produced by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub message: Message,
}

impl Finding {
    pub fn error(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: Message::new(path, text),
        }
    }

    pub fn warning(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: Message::new(path, text),
        }
    }

    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.message.fix = Some(fix.into());
        self
    }
}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationResult {
    /// A failed result carrying exactly one error.
    #[must_use]
    pub fn failure(message: Message) -> Self {
        Self {
            valid: false,
            errors: vec![message],
            warnings: Vec::new(),
        }
    }

    pub fn from_findings(findings: impl IntoIterator<Item = Finding>) -> Self {
        let mut result = Self::default();
        for finding in findings {
            result.push(finding);
        }
        result
    }

    pub fn push(&mut self, finding: Finding) {
        match finding.severity {
            Severity::Error => {
                self.valid = false;
                self.errors.push(finding.message);
            }
            Severity::Warning => self.warnings.push(finding.message),
        }
    }

    /// Concatenate another pass's findings after this one's.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.valid &= other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

// ---------------------------------------------------------------------------
// Rule trait / engine
// ---------------------------------------------------------------------------

/// One structural rule over the raw tree.
///
/// Rules must tolerate any shape: the envelope rule reports a missing `form`
/// block, every other rule simply skips what is not there.
pub trait SchemaRule: Send + Sync {
    /// Short, stable identifier (e.g. `"field_ids"`).
    fn name(&self) -> &'static str;

    fn check(&self, tree: &Value, catalog: &SchemaCatalog) -> Vec<Finding>;
}

/// Runs every registered [`SchemaRule`] and collects the findings in order.
pub struct ValidationEngine {
    rules: Vec<Box<dyn SchemaRule>>,
}

impl ValidationEngine {
    /// An engine with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in structural rule set.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        for rule in structural::default_rules() {
            engine.rules.push(rule);
        }
        engine
    }

    /// Append a rule; it runs after all existing ones.
    pub fn add_rule(&mut self, rule: Box<dyn SchemaRule>) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn with_rule(mut self, rule: impl SchemaRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    #[must_use]
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Run all rules against `tree`.
    ///
    /// A root that is not a mapping cannot be inspected further and yields a
    /// single top-level error.
    #[must_use]
    pub fn validate(&self, tree: &Value, catalog: &SchemaCatalog) -> ValidationResult {
        if !tree.is_object() {
            return ValidationResult::failure(
                Message::new("", "specification must be a mapping with `form` and `fields`")
                    .with_fix("Start the document with a `form:` block, then a `fields:` list"),
            );
        }
        let mut result = ValidationResult::default();
        for rule in &self.rules {
            let findings = rule.check(tree, catalog);
            if !findings.is_empty() {
                tracing::debug!(
                    rule = rule.name(),
                    findings = findings.len(),
                    "structural rule reported"
                );
            }
            for finding in findings {
                result.push(finding);
            }
        }
        result
    }

    /// Parse `text` and validate it; unparseable text is one top-level error.
    #[must_use]
    pub fn validate_text(&self, text: &str, catalog: &SchemaCatalog) -> ValidationResult {
        match crate::loader::load_str(text) {
            Ok(tree) => self.validate(&tree, catalog),
            Err(err) => ValidationResult::failure(Message::new("", err.to_string())),
        }
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SpecValidator for ValidationEngine {
    fn validate(&self, tree: &Value, catalog: &SchemaCatalog) -> ValidationResult {
        ValidationEngine::validate(self, tree, catalog)
    }
}

/// Append a reference token to a JSON pointer.
#[must_use]
pub fn pointer(base: &str, token: impl fmt::Display) -> String {
    let token = token.to_string().replace('~', "~0").replace('/', "~1");
    format!("{base}/{token}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
