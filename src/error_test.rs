use crate::error::{Error, ProcessingError, ValidationError, Violation};

fn missing(parameter: &str) -> Violation {
  Violation::MissingParameter {
    component: "SMA".to_string(),
    parameter: parameter.to_string(),
  }
}

#[test]
fn test_check_passes_without_violations() {
  assert_eq!(ValidationError::check(Vec::new()), Ok(()));
}

#[test]
fn test_check_keeps_every_violation() {
  let err = ValidationError::check(vec![missing("Window length"), missing("Input")]).unwrap_err();
  assert_eq!(err.violations(), &[missing("Window length"), missing("Input")]);
  assert_eq!(
    err.to_string(),
    "validation failed: SMA: required parameter 'Window length' is missing; \
     SMA: required parameter 'Input' is missing"
  );
}

#[test]
fn test_status_codes() {
  let validation: Error = ValidationError::new(missing("Window length")).into();
  assert_eq!(validation.status_code(), 400);
  let processing: Error = ProcessingError::Transport("down".to_string()).into();
  assert_eq!(processing.status_code(), 200);
}
