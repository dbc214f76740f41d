//! Range and vocabulary checks for decision completions

use crate::model::Outcome;
use crate::model::extracted::ExtractedDecision;

pub const MAX_RISK_SCORE: i64 = 100;

#[derive(Debug)]
pub struct DecisionValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl DecisionValidationResult {
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

/// Out-of-range values are rejected, never clamped
pub fn validate_decision(extracted: &ExtractedDecision) -> DecisionValidationResult {
    let mut result = DecisionValidationResult::valid();

    if extracted.decision.parse::<Outcome>().is_err() {
        result.add_error(format!(
            "decision must be \"Approved\" or \"Rejected\", got '{}'",
            extracted.decision
        ));
    }

    if !(0..=MAX_RISK_SCORE).contains(&extracted.risk_score) {
        result.add_error(format!(
            "risk_score {} outside [0, {}]",
            extracted.risk_score, MAX_RISK_SCORE
        ));
    }

    if !extracted.confidence_score.is_finite()
        || !(0.0..=1.0).contains(&extracted.confidence_score)
    {
        result.add_error(format!(
            "confidence_score {} outside [0.0, 1.0]",
            extracted.confidence_score
        ));
    }

    if extracted.rationale.trim().is_empty() {
        result.add_warning("Decision rationale is empty".to_string());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(outcome: &str, risk: i64, confidence: f64) -> ExtractedDecision {
        ExtractedDecision {
            decision: outcome.to_string(),
            rationale: "Matches approved precedents".to_string(),
            risk_score: risk,
            confidence_score: confidence,
        }
    }

    #[test]
    fn test_boundaries_are_valid() {
        assert!(validate_decision(&decision("Approved", 0, 0.0)).is_valid);
        assert!(validate_decision(&decision("Rejected", 100, 1.0)).is_valid);
    }

    #[test]
    fn test_unknown_outcome_is_error() {
        let result = validate_decision(&decision("Maybe", 20, 0.5));
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("Maybe"));
    }

    #[test]
    fn test_out_of_range_scores_are_errors() {
        assert!(!validate_decision(&decision("Approved", 101, 0.5)).is_valid);
        assert!(!validate_decision(&decision("Approved", -1, 0.5)).is_valid);
        assert!(!validate_decision(&decision("Approved", 50, 1.2)).is_valid);
        assert!(!validate_decision(&decision("Approved", 50, f64::NAN)).is_valid);
    }

    #[test]
    fn test_empty_rationale_is_warning() {
        let mut d = decision("Approved", 10, 0.9);
        d.rationale = "  ".to_string();
        let result = validate_decision(&d);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }
}
