use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A stored word/definition record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub id: String,
    pub word: String,
    pub definition: String,
    pub created_at: DateTime<Utc>,
}

/// An entry that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub word: String,
    pub definition: String,
}

impl NewEntry {
    pub fn new(word: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            definition: definition.into(),
        }
    }

    /// Lower-cases and trims the word, trims the definition.
    pub fn normalized(&self) -> Self {
        Self {
            word: normalize_word(&self.word),
            definition: self.definition.trim().to_string(),
        }
    }

    /// Normalizes the entry and rejects it if either field ends up blank.
    pub fn validated(&self) -> Result<Self> {
        let entry = self.normalized();
        if entry.word.is_empty() {
            return Err(Error::validation("entry word cannot be empty"));
        }
        if entry.definition.is_empty() {
            return Err(Error::validation(format!(
                "definition for {:?} cannot be empty",
                entry.word
            )));
        }
        Ok(entry)
    }
}

pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Parses a pasted submission: either one `{word, definition}` object or an
/// array of them. Any defect rejects the whole submission.
pub fn parse_batch(input: &str) -> Result<Vec<NewEntry>> {
    let value: Value = serde_json::from_str(input)
        .map_err(|err| Error::validation(format!("invalid JSON: {err}")))?;
    batch_from_value(value)
}

pub fn batch_from_value(value: Value) -> Result<Vec<NewEntry>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => {
            return Err(Error::validation(
                "JSON must be an array or an object with \"word\" and \"definition\" fields",
            ));
        }
    };
    if items.is_empty() {
        return Err(Error::validation("no entries provided"));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let entry: NewEntry = serde_json::from_value(item).map_err(|_| {
                Error::validation(format!(
                    "entry #{idx} must contain \"word\" and \"definition\" fields"
                ))
            })?;
            entry.validated()?;
            Ok(entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_word_and_definition() {
        let entry = NewEntry::new("  Ephemeral ", " Lasting a short time  ").normalized();
        assert_eq!(entry.word, "ephemeral");
        assert_eq!(entry.definition, "Lasting a short time");
    }

    #[test]
    fn rejects_blank_fields_after_trimming() {
        assert!(NewEntry::new("   ", "something").validated().is_err());
        assert!(NewEntry::new("word", "\t\n").validated().is_err());
    }

    #[test]
    fn parses_single_object() {
        let entries =
            parse_batch(r#"{"word": "ephemeral", "definition": "Lasting for a very short time"}"#)
                .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].word, "ephemeral");
    }

    #[test]
    fn parses_array() {
        let entries = parse_batch(
            r#"[
                {"word": "ephemeral", "definition": "Lasting for a very short time"},
                {"word": "eloquent", "definition": "Fluent or persuasive in speaking"}
            ]"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].word, "eloquent");
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = parse_batch("[{\"word\": ").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn one_bad_entry_rejects_the_batch() {
        let err = parse_batch(r#"[{"word": "ok", "definition": "fine"}, {"word": "missing"}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("entry #1"));
    }

    #[test]
    fn rejects_scalars_and_empty_arrays() {
        assert!(parse_batch("42").is_err());
        assert!(parse_batch("\"word\"").is_err());
        assert!(parse_batch("[]").is_err());
    }
}
