use jobwarden::Validator;
use serde::{Deserialize, Serialize};

/// Payload of the document review domain: a file name, or nothing.
pub type Document = Option<String>;

/// Result of a document review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: u32,
}

impl ScoreResult {
    pub fn new(score: u32) -> Self {
        Self { score }
    }
}

/// Accepts documents that are present and not blank.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentValidator;

impl Validator<Document> for DocumentValidator {
    fn is_valid(&self, payload: &Document) -> bool {
        payload
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }
}

pub fn document(name: &str) -> Document {
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_validator() {
        assert!(DocumentValidator.is_valid(&document("resume.pdf")));
        assert!(!DocumentValidator.is_valid(&None));
        assert!(!DocumentValidator.is_valid(&document("   ")));
    }
}
