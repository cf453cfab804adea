//! Text to raw tree. JSON is a YAML subset, so one parser covers both.

use serde_json::Value;

/// Errors turning input text into a tree.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("specification is not valid YAML or JSON: {0}")]
    Syntax(#[from] serde_yaml::Error),
    #[error("specification is empty")]
    Empty,
}

/// Parse one specification document into an untyped tree.
///
/// # Errors
///
/// Returns [`LoadError::Syntax`] for unparseable text and [`LoadError::Empty`]
/// for a document with no content.
pub fn load_str(text: &str) -> Result<Value, LoadError> {
    let tree: Value = serde_yaml::from_str(text)?;
    if tree.is_null() {
        return Err(LoadError::Empty);
    }
    Ok(tree)
}

/// Split a multi-form document (`forms: [...]`) into one tree per form.
///
/// Any other document is returned unchanged as a single tree.
#[must_use]
pub fn split_forms(tree: Value) -> Vec<Value> {
    match tree {
        Value::Object(mut root)
            if root.len() == 1 && root.get("forms").is_some_and(Value::is_array) =>
        {
            match root.remove("forms") {
                Some(Value::Array(forms)) => forms,
                _ => Vec::new(),
            }
        }
        other => vec![other],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn loads_yaml() {
        let tree = load_str("form:\n  id: t1\n  name: T1\nfields: []\n").unwrap();
        assert_eq!(tree, json!({"form": {"id": "t1", "name": "T1"}, "fields": []}));
    }

    #[test]
    fn loads_json() {
        let tree = load_str(r#"{"form": {"id": "t1"}, "fields": [1, 2]}"#).unwrap();
        assert_eq!(tree["fields"], json!([1, 2]));
    }

    #[test]
    fn empty_document_is_an_error() {
        assert!(load_str("").is_err());
        assert!(matches!(load_str("~"), Err(LoadError::Empty)));
    }

    #[test]
    fn broken_yaml_is_a_syntax_error() {
        assert!(matches!(load_str("form: [unclosed"), Err(LoadError::Syntax(_))));
    }

    #[test]
    fn split_forms_unwraps_multi_form_documents() {
        let forms = split_forms(json!({"forms": [{"form": {"id": "a"}}, {"form": {"id": "b"}}]}));
        assert_eq!(forms.len(), 2);
        let single = split_forms(json!({"form": {"id": "a"}, "fields": []}));
        assert_eq!(single.len(), 1);
    }
}
