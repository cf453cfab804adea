//! Catalog of form ids known to a generation run.

use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use crate::traits::FormResolver;

/// Maximum number of suggestions returned for an unknown id.
const MAX_SUGGESTIONS: usize = 5;

/// File extensions whose stems name a form.
const FORM_FILE_EXTENSIONS: [&str; 4] = ["yaml", "yml", "json", "csv"];

/// A set of form ids, e.g. already deployed lookup forms plus every form
/// declared by the specs of the current batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownForms {
    ids: BTreeSet<String>,
}

impl KnownForms {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, form_id: impl Into<String>) -> bool {
        self.ids.insert(form_id.into())
    }

    #[must_use]
    pub fn contains(&self, form_id: &str) -> bool {
        self.ids.contains(form_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Catalog built from the file stems of form definition files
    /// (`*.yaml`, `*.yml`, `*.json`, `*.csv`) in each directory.
    ///
    /// Missing directories are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing directory cannot be read.
    pub fn from_directories<P: AsRef<Path>>(dirs: &[P]) -> io::Result<Self> {
        let mut known = Self::new();
        for dir in dirs {
            let dir = dir.as_ref();
            if !dir.is_dir() {
                tracing::debug!(dir = %dir.display(), "form directory not found, skipping");
                continue;
            }
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                let is_form_file = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        FORM_FILE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                    });
                if !is_form_file {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    known.insert(stem);
                }
            }
        }
        tracing::debug!(forms = known.len(), "loaded known form catalog");
        Ok(known)
    }

    /// Known ids similar to `form_id`, best first (at most five).
    ///
    /// Substring matches rank above ids that merely share camelCase or
    /// snake_case words longer than two characters.
    #[must_use]
    pub fn find_similar(&self, form_id: &str) -> Vec<String> {
        let wanted = form_id.to_lowercase();
        let wanted_words = words(form_id);
        let mut scored: Vec<(usize, &String)> = self
            .ids
            .iter()
            .filter_map(|known| {
                let candidate = known.to_lowercase();
                let score = if candidate.contains(&wanted) {
                    100 + wanted.len()
                } else if wanted.contains(&candidate) {
                    90 + candidate.len()
                } else {
                    let common = words(known).intersection(&wanted_words).count();
                    if common == 0 {
                        0
                    } else {
                        50 + common * 10
                    }
                };
                (score > 0).then_some((score, known))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(|(_, id)| id.clone())
            .collect()
    }
}

/// Lower-cased words of a camelCase / snake_case identifier, longer than two characters.
fn words(id: &str) -> BTreeSet<String> {
    let mut words = BTreeSet::new();
    let mut current = String::new();
    for ch in id.chars() {
        if ch == '_' || ch == '-' || ch.is_whitespace() || ch.is_uppercase() {
            if current.chars().count() > 2 {
                words.insert(std::mem::take(&mut current));
            }
            current.clear();
            if ch.is_uppercase() {
                current.extend(ch.to_lowercase());
            }
        } else {
            current.push(ch);
        }
    }
    if current.chars().count() > 2 {
        words.insert(current);
    }
    words
}

impl FromIterator<String> for KnownForms {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for KnownForms {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(str::to_string).collect()
    }
}

impl Extend<String> for KnownForms {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.ids.extend(iter);
    }
}

impl FormResolver for KnownForms {
    fn is_known(&self, form_id: &str) -> bool {
        self.contains(form_id)
    }

    fn suggest(&self, form_id: &str) -> Vec<String> {
        self.find_similar(form_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
