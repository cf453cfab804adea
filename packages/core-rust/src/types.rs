use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::de::{opt_scalar_text, scalar_text};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// One entry of a static option list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionItem {
    /// Stored value. Numbers and booleans in the input are kept as text.
    #[serde(deserialize_with = "scalar_text")]
    pub value: String,
    /// Display text.
    #[serde(deserialize_with = "scalar_text")]
    pub label: String,
    /// Parent-category value used by cascading selects.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_scalar_text"
    )]
    pub grouping: Option<String>,
}

impl OptionItem {
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            grouping: None,
        }
    }
}

/// Name/value pair used for API request parameters and headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    #[serde(deserialize_with = "scalar_text")]
    pub value: String,
}

/// Where a choice field's selectable values come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OptionsSource {
    /// Inline list; renders exactly like a field-level `options` list.
    Static { options: Vec<OptionItem> },
    /// Records of another form.
    FormData(FormDataSource),
    /// A JSON HTTP endpoint.
    Api(ApiSource),
    /// A table or query on a named datasource.
    Database(DatabaseSource),
}

impl OptionsSource {
    /// Variant name as written in the input document.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Static { .. } => "static",
            Self::FormData(_) => "formData",
            Self::Api(_) => "api",
            Self::Database(_) => "database",
        }
    }

    /// Sibling field whose value filters this source, if any.
    #[must_use]
    pub fn control_field(&self) -> Option<&str> {
        match self {
            Self::FormData(src) if !src.control_field.is_empty() => Some(&src.control_field),
            _ => None,
        }
    }
}

/// Variant names accepted for `optionsSource.type`.
pub const OPTIONS_SOURCE_KINDS: [&str; 4] = ["static", "formData", "api", "database"];

fn default_label_column() -> String {
    "name".to_string()
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_request_type() -> String {
    "GET".to_string()
}

fn default_datasource() -> String {
    "default".to_string()
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDataSource {
    /// Id of the form whose records supply the options.
    pub form_id: String,
    /// Column stored as the option value. Empty means the record's primary key.
    #[serde(default)]
    pub value_column: String,
    #[serde(default = "default_label_column")]
    pub label_column: String,
    /// Column in the source form holding the parent-category reference.
    #[serde(default, alias = "filterField")]
    pub grouping_column: String,
    /// Sibling field in the current form supplying the active filter value.
    #[serde(default, alias = "parentField")]
    pub control_field: String,
    #[serde(default)]
    pub extra_condition: String,
    #[serde(default = "yes")]
    pub add_empty_option: bool,
}

impl FormDataSource {
    /// Both halves of the cascade are configured.
    #[must_use]
    pub fn is_cascading(&self) -> bool {
        !self.grouping_column.is_empty() && !self.control_field.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSource {
    #[serde(alias = "url")]
    pub json_url: String,
    #[serde(default = "default_request_type", alias = "method")]
    pub request_type: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_label_column")]
    pub label_column: String,
    #[serde(default)]
    pub grouping_column: String,
    /// Dotted path to the array of records inside the response body.
    #[serde(default)]
    pub multirow_base_object: String,
    #[serde(default)]
    pub post_method: String,
    #[serde(default)]
    pub params: Vec<NameValue>,
    #[serde(default)]
    pub headers: Vec<NameValue>,
    #[serde(default = "yes")]
    pub add_empty_option: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSource {
    #[serde(default = "default_datasource", alias = "datasource")]
    pub jdbc_datasource: String,
    #[serde(default)]
    pub table_name: String,
    /// Raw query used instead of `table_name` when present.
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub value_column: String,
    #[serde(default = "default_label_column")]
    pub label_column: String,
    #[serde(default)]
    pub grouping_column: String,
    #[serde(default)]
    pub extra_condition: String,
    #[serde(default = "yes")]
    pub add_empty: bool,
    #[serde(default)]
    pub use_ajax: bool,
}

// ---------------------------------------------------------------------------
// Pattern schemas
// ---------------------------------------------------------------------------

/// Catalogue tier of a field pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Standard,
    Advanced,
    Enterprise,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::Advanced => "advanced",
            Self::Enterprise => "enterprise",
        })
    }
}

/// How a pattern nests other specifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Composite {
    /// No nested specifications.
    Leaf,
    /// `columns` stored inline in the fragment.
    Grid,
    /// `columns` become a row form linked by a foreign key.
    FormGrid,
    /// `pages` each naming (or defining) a standalone form.
    Pages,
    /// Embeds another form by `formId`, optionally defined inline by `fields`.
    Subform,
}

impl Composite {
    /// Fields of this kind count towards the one-grid-per-form limit.
    #[must_use]
    pub fn is_grid_bearing(self) -> bool {
        matches!(self, Self::Grid | Self::FormGrid)
    }
}

/// Declarative description of what a field pattern accepts.
///
/// Validators consult the schema so that the accepted type enumeration is
/// always the registry's current key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSchema {
    pub tier: Tier,
    pub description: &'static str,
    /// Attributes that must be present in the input, beyond `id`, `label` and `type`.
    pub required: &'static [&'static str],
    /// Bag attributes holding whole numbers; numeric strings are coerced.
    pub numeric: &'static [&'static str],
    /// Bag attributes holding booleans; `"true"`/`"false"` strings are coerced.
    pub flags: &'static [&'static str],
    /// Takes `options` or `optionsSource`.
    pub choice: bool,
    pub composite: Composite,
    /// Starts a new layout section instead of rendering into the current one.
    pub structural: bool,
}

impl PatternSchema {
    #[must_use]
    pub fn new(tier: Tier, description: &'static str) -> Self {
        Self {
            tier,
            description,
            required: &[],
            numeric: &[],
            flags: &[],
            choice: false,
            composite: Composite::Leaf,
            structural: false,
        }
    }

    #[must_use]
    pub fn required(mut self, attrs: &'static [&'static str]) -> Self {
        self.required = attrs;
        self
    }

    #[must_use]
    pub fn numeric(mut self, attrs: &'static [&'static str]) -> Self {
        self.numeric = attrs;
        self
    }

    #[must_use]
    pub fn flags(mut self, attrs: &'static [&'static str]) -> Self {
        self.flags = attrs;
        self
    }

    #[must_use]
    pub fn choice(mut self) -> Self {
        self.choice = true;
        self
    }

    #[must_use]
    pub fn composite(mut self, kind: Composite) -> Self {
        self.composite = kind;
        self
    }

    #[must_use]
    pub fn structural(mut self) -> Self {
        self.structural = true;
        self
    }
}

/// Snapshot of the registered type keys and their schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<String, PatternSchema>,
}

impl SchemaCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_key: impl Into<String>, schema: PatternSchema) {
        self.schemas.insert(type_key.into(), schema);
    }

    #[must_use]
    pub fn get(&self, type_key: &str) -> Option<&PatternSchema> {
        self.schemas.get(type_key)
    }

    #[must_use]
    pub fn contains(&self, type_key: &str) -> bool {
        self.schemas.contains_key(type_key)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Keys that look like a misspelling of `type_key`, closest first.
    #[must_use]
    pub fn closest(&self, type_key: &str) -> Vec<&str> {
        let wanted = type_key.to_lowercase();
        let mut scored: Vec<(usize, &str)> = self
            .keys()
            .filter_map(|key| {
                let candidate = key.to_lowercase();
                if candidate == wanted {
                    return Some((0, key));
                }
                if candidate.contains(&wanted) || wanted.contains(&candidate) {
                    return Some((1, key));
                }
                let shared = candidate
                    .chars()
                    .zip(wanted.chars())
                    .take_while(|(a, b)| a == b)
                    .count();
                (shared >= 3).then_some((2, key))
            })
            .collect();
        scored.sort_unstable();
        scored.into_iter().take(3).map(|(_, key)| key).collect()
    }
}

impl FromIterator<(String, PatternSchema)> for SchemaCatalog {
    fn from_iter<I: IntoIterator<Item = (String, PatternSchema)>>(iter: I) -> Self {
        Self {
            schemas: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
