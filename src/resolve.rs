//! Decoder/validator pipeline: turn candidate strings into one outcome.
//!
//! Each candidate is decoded as JSON and validated against the spec. The
//! first candidate that validates wins. When none do, the failure reported
//! is the one from the *last* candidate tried: models tend to think out
//! loud before emitting the real answer, so later spans are the more likely
//! final attempt. That tie-break is deliberate.

use serde_json::Value;

use crate::schema::ResponseSpec;
use crate::validate::{validate, FieldError, ValidationOutcome};

/// Decode and validate candidates in order.
///
/// Malformed JSON never escapes as an error; it folds into a synthetic
/// single-entry `Failure` describing the decode problem. An empty candidate
/// list produces a "no payload" failure the orchestrator can echo back to
/// the model.
pub fn resolve(candidates: &[String], spec: &ResponseSpec) -> ValidationOutcome {
    if candidates.is_empty() {
        return ValidationOutcome::Failure(vec![FieldError {
            path: "$".to_string(),
            message: "no JSON payload found in the response".to_string(),
        }]);
    }

    let mut last_failure = None;
    for candidate in candidates {
        let outcome = match serde_json::from_str::<Value>(candidate) {
            Ok(decoded) => validate(spec, &decoded),
            Err(e) => ValidationOutcome::Failure(vec![FieldError {
                path: "$".to_string(),
                message: format!("invalid JSON: {}", e),
            }]),
        };
        match outcome {
            ValidationOutcome::Success(v) => return ValidationOutcome::Success(v),
            failure => last_failure = Some(failure),
        }
    }

    // candidates is non-empty, so a failure was recorded
    last_failure.unwrap_or_else(|| {
        ValidationOutcome::Failure(vec![FieldError {
            path: "$".to_string(),
            message: "no JSON payload found in the response".to_string(),
        }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ObjectSpec, ResponseSpec};
    use serde_json::json;

    fn user_spec() -> ResponseSpec {
        ObjectSpec::new("User")
            .field("name", ResponseSpec::String)
            .field("age", ResponseSpec::Integer)
            .into()
    }

    #[test]
    fn first_valid_candidate_wins() {
        let candidates = vec![
            r#"{"name": "Terry", "age": 60}"#.to_string(),
            r#"{"name": "Other", "age": 1}"#.to_string(),
        ];
        match resolve(&candidates, &user_spec()) {
            ValidationOutcome::Success(v) => assert_eq!(v["name"], "Terry"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn later_valid_candidate_recovers() {
        let candidates = vec![
            r#"{"scratch": true}"#.to_string(),
            r#"{"name": "Terry", "age": 60}"#.to_string(),
        ];
        assert!(resolve(&candidates, &user_spec()).is_success());
    }

    #[test]
    fn all_invalid_reports_last_failure() {
        let candidates = vec![
            r#"{"name": 1, "age": "x"}"#.to_string(),
            r#"{"name": "Terry"}"#.to_string(),
        ];
        match resolve(&candidates, &user_spec()) {
            ValidationOutcome::Failure(errs) => {
                // Failure comes from the last candidate: missing age only.
                assert_eq!(errs.len(), 1);
                assert_eq!(errs[0].path, "$.age");
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn malformed_json_becomes_synthetic_failure() {
        let candidates = vec![r#"{"name": "Terry""#.to_string()];
        match resolve(&candidates, &user_spec()) {
            ValidationOutcome::Failure(errs) => {
                assert_eq!(errs.len(), 1);
                assert!(errs[0].message.starts_with("invalid JSON:"));
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn empty_candidates_is_no_payload_failure() {
        match resolve(&[], &user_spec()) {
            ValidationOutcome::Failure(errs) => {
                assert!(errs[0].message.contains("no JSON payload"));
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn list_root_resolves() {
        let spec = ResponseSpec::list(ResponseSpec::String);
        let candidates = vec![r#"["a", "b"]"#.to_string()];
        match resolve(&candidates, &spec) {
            ValidationOutcome::Success(v) => assert_eq!(v, json!(["a", "b"])),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
