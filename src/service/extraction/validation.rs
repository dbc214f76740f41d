//! Validation of extraction completions against the declared schema

use crate::model::extracted::ExtractedFields;

#[derive(Debug)]
pub struct ExtractionValidationResult {
    pub is_valid: bool,
    /// Schema violations; any error rejects the response
    pub errors: Vec<String>,
    /// Tolerated deviations, logged by the caller
    pub warnings: Vec<String>,
}

impl ExtractionValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Check that every schema field is reported
///
/// Undeclared keys are warnings; a schema field missing from the response is
/// an error.
pub fn validate_extracted_fields(
    extracted: &ExtractedFields,
    schema: &[String],
) -> ExtractionValidationResult {
    let mut result = ExtractionValidationResult::valid();

    for field in schema {
        if !extracted.fields.contains_key(field) {
            result.add_error(format!("Required field '{}' absent from response", field));
        }
    }

    for key in extracted.fields.keys() {
        if !schema.iter().any(|f| f == key) {
            result.add_warning(format!("Ignoring undeclared field '{}'", key));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn extracted(pairs: &[(&str, Option<&str>)]) -> ExtractedFields {
        ExtractedFields {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect::<BTreeMap<_, _>>(),
            requested_access: None,
        }
    }

    fn schema() -> Vec<String> {
        vec!["Justification".to_string(), "Manager Approval".to_string()]
    }

    #[test]
    fn test_complete_response_is_valid() {
        let result = validate_extracted_fields(
            &extracted(&[("Justification", Some("oncall")), ("Manager Approval", None)]),
            &schema(),
        );
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_absent_field_is_error() {
        let result =
            validate_extracted_fields(&extracted(&[("Justification", Some("oncall"))]), &schema());
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("Manager Approval"));
    }

    #[test]
    fn test_undeclared_field_is_warning() {
        let result = validate_extracted_fields(
            &extracted(&[
                ("Justification", Some("oncall")),
                ("Manager Approval", Some("Dana")),
                ("Favourite Colour", Some("blue")),
            ]),
            &schema(),
        );
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }
}
