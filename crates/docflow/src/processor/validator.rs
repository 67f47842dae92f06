use serde_json::json;

use crate::error::ProcessError;
use crate::processor::{DocumentRecord, DocumentValidator, IssueRecord};

/// Reports one issue for every required field that is absent or blank in the
/// document's `fields` map.
pub struct RequiredFieldsValidator {
    required: Vec<String>,
}

impl RequiredFieldsValidator {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
        }
    }
}

impl DocumentValidator for RequiredFieldsValidator {
    fn validate(&self, document: &DocumentRecord) -> Result<Vec<IssueRecord>, ProcessError> {
        let fields = document
            .get("fields")
            .and_then(|f| f.as_object())
            .ok_or_else(|| ProcessError::Validation("document has no fields map".to_string()))?;

        let issues = self
            .required
            .iter()
            .filter(|name| match fields.get(name.as_str()) {
                Some(serde_json::Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
                None => true,
            })
            .map(|name| {
                json!({
                    "code": "missing_field",
                    "field": name,
                    "message": format!("Required field '{}' is missing or empty", name),
                })
            })
            .collect();

        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_missing_and_blank_fields() {
        let validator = RequiredFieldsValidator::new(["customer", "total", "date"]);
        let doc = json!({"fields": {"customer": "Acme", "total": "  "}});

        let issues = validator.validate(&doc).unwrap();
        let fields: Vec<&str> = issues
            .iter()
            .map(|i| i["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["total", "date"]);
    }

    #[test]
    fn test_no_issues_when_complete() {
        let validator = RequiredFieldsValidator::new(["a"]);
        let doc = json!({"fields": {"a": ["x", "y"]}});
        assert!(validator.validate(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_document_without_fields_is_an_error() {
        let validator = RequiredFieldsValidator::new(["a"]);
        let result = validator.validate(&json!("plain string"));
        assert!(matches!(result, Err(ProcessError::Validation(_))));
    }
}
