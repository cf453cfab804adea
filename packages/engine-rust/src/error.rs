use formforge_core::{LoadError, Message};

/// Registry lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown field type '{type_key}' (registered types: {})", .known.join(", "))]
    UnknownType { type_key: String, known: Vec<String> },
}

/// Failures rendering one field.
///
/// Every variant names the field so an aggregated list stays actionable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("field '{field_id}': {source}")]
    Registry {
        field_id: String,
        #[source]
        source: RegistryError,
    },
    #[error("field '{field_id}' is missing required attribute '{attribute}'")]
    MissingAttribute { field_id: String, attribute: String },
    #[error("field '{field_id}' has invalid '{attribute}': {reason}")]
    InvalidAttribute {
        field_id: String,
        attribute: String,
        reason: String,
    },
    #[error("field '{field_id}': '{attribute}' references unknown sibling field '{reference}'")]
    UnknownSibling {
        field_id: String,
        attribute: String,
        reference: String,
    },
    #[error(
        "field '{field_id}' references unknown form '{form_id}'{}",
        suggestion_hint(.suggestions)
    )]
    UnknownForm {
        field_id: String,
        form_id: String,
        suggestions: Vec<String>,
    },
    #[error(
        "field '{field_id}': optionsSource.valueColumn must be empty because ajax subform \
         '{companion}' looks records up by primary key (found '{value_column}')"
    )]
    AjaxValueColumn {
        field_id: String,
        companion: String,
        value_column: String,
    },
    #[error("field '{field_id}' nests composite forms deeper than {limit} levels")]
    NestingTooDeep { field_id: String, limit: usize },
    #[error("form '{form_id}' is generated more than once")]
    DuplicateDocument { form_id: String },
}

fn suggestion_hint(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

impl RenderError {
    /// Id of the field the error belongs to, if any.
    #[must_use]
    pub fn field_id(&self) -> Option<&str> {
        match self {
            Self::Registry { field_id, .. }
            | Self::MissingAttribute { field_id, .. }
            | Self::InvalidAttribute { field_id, .. }
            | Self::UnknownSibling { field_id, .. }
            | Self::UnknownForm { field_id, .. }
            | Self::AjaxValueColumn { field_id, .. }
            | Self::NestingTooDeep { field_id, .. } => Some(field_id),
            Self::DuplicateDocument { .. } => None,
        }
    }

    pub(crate) fn missing(field_id: &str, attribute: &str) -> Self {
        Self::MissingAttribute {
            field_id: field_id.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn invalid(field_id: &str, attribute: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            field_id: field_id.to_string(),
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }
}

/// The single consolidated error returned by the generation entry points.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(
        "validation failed for {}: {} error(s), {} warning(s)",
        .form_id.as_deref().unwrap_or("specification"),
        .errors.len(),
        .warnings.len()
    )]
    Validation {
        form_id: Option<String>,
        errors: Vec<Message>,
        warnings: Vec<Message>,
    },
    #[error("generation failed for form '{form_id}': {} error(s)", .errors.len())]
    Render {
        form_id: String,
        errors: Vec<RenderError>,
    },
}

impl GenerateError {
    /// Every individual problem, one line each, in report order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Load(err) => vec![err.to_string()],
            Self::Validation { errors, .. } => errors.iter().map(ToString::to_string).collect(),
            Self::Render { errors, .. } => errors.iter().map(ToString::to_string).collect(),
        }
    }

    /// Form the error belongs to, when known.
    #[must_use]
    pub fn form_id(&self) -> Option<&str> {
        match self {
            Self::Load(_) => None,
            Self::Validation { form_id, .. } => form_id.as_deref(),
            Self::Render { form_id, .. } => Some(form_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
