use crate::attribute::Attribute;
use crate::component::{Compilable, Component, NodeOutcome, Parameterized, RunState};
use crate::error::Violation;
use crate::runtime::InMemoryStreamRuntime;
use crate::sources::test_source::{self, TestSource};
use crate::value::{ParamValue, ValueType};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_emits_sample_values() {
  let runtime = InMemoryStreamRuntime::new();
  let mut source = TestSource::new_template();
  source.number_of_events_mut().set(3).unwrap();
  source
    .attributes_mut()
    .add(Attribute::new("label", ValueType::String));

  let mut node = source.compile().unwrap();
  let outcome = node.run(&runtime, &CancellationToken::new()).await.unwrap();
  assert_eq!(outcome, NodeOutcome::State(RunState::Complete));

  let events: Vec<_> = runtime
    .messages(test_source::TYPE_NAME, source.id())
    .into_iter()
    .map(|m| m.event().unwrap())
    .collect();
  assert_eq!(events.len(), 3);
  assert_eq!(events[0].get("Att"), Some("0"));
  assert_eq!(events[2].get_i64("Att"), Some(2));
  assert_eq!(events[1].get("label"), Some("label_1"));
}

#[test]
fn test_number_of_events_must_be_positive() {
  let mut source = TestSource::new_template();
  assert!(source
    .set_parameter("Number of Events", &ParamValue::Integer(0))
    .is_err());
  assert_eq!(source.number_of_events().value(), Some(&10));
  assert_eq!(
    source.set_parameter("Number of Events", &ParamValue::Integer(4)),
    Ok(true)
  );
  assert_eq!(source.set_parameter("Nope", &ParamValue::Integer(4)), Ok(false));
}

#[test]
fn test_missing_count_and_attributes_reported_together() {
  let mut source = TestSource::new_template();
  source.number_of_events_mut().clear();
  source.attributes_mut().remove("Att");

  let err = source.compile().unwrap_err();
  let violations = err.violations();
  assert_eq!(violations.len(), 2);
  assert!(matches!(violations[0], Violation::MissingParameter { .. }));
  assert!(matches!(violations[1], Violation::ConstraintViolated { .. }));
}

#[test]
fn test_new_instance_gets_fresh_id() {
  let source = TestSource::new_template();
  let copy = source.copy_of();
  let fresh = source.new_instance();
  assert_eq!(copy.id(), source.id());
  assert_ne!(fresh.id(), source.id());
  assert_eq!(fresh.type_name(), test_source::TYPE_NAME);
}
