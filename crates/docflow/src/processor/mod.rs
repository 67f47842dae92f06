//! Collaborator contracts for turning a payload into a stored document, plus
//! the stock XML implementations.

pub mod validator;
pub mod xml;

use crate::error::ProcessError;

pub use validator::RequiredFieldsValidator;
pub use xml::XmlDocumentParser;

/// Structured document produced by a parser. Opaque to the engine.
pub type DocumentRecord = serde_json::Value;

/// One validation finding. Opaque to the engine.
pub type IssueRecord = serde_json::Value;

/// Classification attached to a document. Opaque to the engine.
pub type ClassificationRecord = serde_json::Value;

pub trait DocumentParser: Send + Sync {
    fn parse(&self, name: &str, payload: &[u8]) -> Result<DocumentRecord, ProcessError>;
}

pub trait DocumentValidator: Send + Sync {
    fn validate(&self, document: &DocumentRecord) -> Result<Vec<IssueRecord>, ProcessError>;
}

pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        document: &DocumentRecord,
    ) -> Result<Option<ClassificationRecord>, ProcessError>;
}

/// Validator that never reports issues.
pub struct NoopValidator;

impl DocumentValidator for NoopValidator {
    fn validate(&self, _document: &DocumentRecord) -> Result<Vec<IssueRecord>, ProcessError> {
        Ok(Vec::new())
    }
}
