//! The component validation sequence.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::*;
use stackeval::EvalContext;
use stackeval_foundation::BUG_REPORT_SUFFIX;

const TWO_PROVIDERS: &str = r#"
required_providers:
  aws:
    source: hashicorp/aws
  google:
    source: hashicorp/google
resources:
  - type: aws_instance
    name: web
  - type: google_compute_instance
    name: web
"#;

fn two_provider_fixture(aws: FakeProvider, google: FakeProvider) -> Fixture {
    let mut fixture = Fixture::new(TWO_PROVIDERS);
    fixture.stack = Arc::new(
        FakeStack::default()
            .with_provider("hashicorp/aws", "aws")
            .with_provider("hashicorp/google", "google"),
    );
    fixture.providers = Arc::new(
        FakeProviders::default()
            .with("hashicorp/aws", aws)
            .with("hashicorp/google", google),
    );
    fixture
}

#[test]
fn test_valid_component_closes_clients() {
    let fixture = Fixture::new(AWS_MODULE);
    let component = fixture.build(declaration_with_providers(&["aws"]));

    let diags = component.validate(&EvalContext::new());
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");

    let aws = fixture.providers.get("hashicorp/aws");
    assert_eq!(aws.schema_calls.load(Ordering::SeqCst), 1);
    assert_eq!(aws.opened.load(Ordering::SeqCst), 1);
    assert_eq!(aws.closed.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.runtime.validations.load(Ordering::SeqCst), 1);
    assert_eq!(*fixture.runtime.clients_seen.lock().unwrap(), [1]);
    assert!(fixture.runtime.missing_clients.lock().unwrap().is_empty());
}

#[test]
fn test_runtime_diagnostics_are_returned() {
    let mut fixture = Fixture::new(AWS_MODULE);
    fixture.runtime = Arc::new(RuntimeState {
        diags: stackeval_foundation::Diagnostic::warning("Deprecated attribute", "Use tags_all.").into(),
        ..RuntimeState::default()
    });
    fixture.options = fixture.options.clone().with_provisioner("local-exec");
    let component = fixture.build(declaration_with_providers(&["aws"]));

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Deprecated attribute"]);
    assert!(!diags.has_errors());
    assert_eq!(*fixture.runtime.provisioners_seen.lock().unwrap(), ["local-exec"]);
}

#[test]
fn test_tree_failure_stops_validation() {
    let fixture = Fixture::new("resources: {broken\n");
    let component = fixture.build(declaration_with_providers(&["aws"]));

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Failed to read module"]);
    assert_eq!(fixture.evaluator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.runtime.instantiated.load(Ordering::SeqCst), 0);
}

#[test]
fn test_child_load_failure_stops_validation() {
    let fixture = Fixture::new("modules:\n  net:\n    source: ./net\n");
    let component = fixture.build(declaration());

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Can't load module for component"]);
    assert_eq!(fixture.runtime.instantiated.load(Ordering::SeqCst), 0);
}

#[test]
fn test_input_errors_do_not_stop_validation() {
    let mut fixture = Fixture::new(AWS_MODULE);
    fixture.evaluator = Arc::new(FakeEvaluator::failing("Invalid component inputs"));
    let component = fixture.build(declaration_with_providers(&["aws"]));

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Invalid component inputs"]);
    assert_eq!(fixture.runtime.validations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_provider_errors_stop_validation() {
    let fixture = Fixture::new(AWS_MODULE);
    let component = fixture.build(declaration());

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Missing required provider configuration"]);
    assert_eq!(fixture.providers.get("hashicorp/aws").schema_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.runtime.instantiated.load(Ordering::SeqCst), 0);
}

#[test]
fn test_schema_failure_stops_after_fetching_all() {
    let fixture = two_provider_fixture(FakeProvider::failing_schema(), FakeProvider::default());
    let component = fixture.build(declaration_with_providers(&["aws", "google"]));

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Provider initialization error"]);
    let detail = &diags.iter().next().unwrap().detail;
    assert!(detail.contains("hashicorp/aws"), "{detail}");
    assert!(detail.contains("plugin exited unexpectedly"), "{detail}");

    let google = fixture.providers.get("hashicorp/google");
    assert_eq!(google.schema_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.runtime.instantiated.load(Ordering::SeqCst), 0);
}

#[test]
fn test_runtime_instantiation_failure_is_internal() {
    let mut fixture = Fixture::new(AWS_MODULE);
    fixture.runtime = Arc::new(RuntimeState {
        fail: true,
        ..RuntimeState::default()
    });
    let component = fixture.build(declaration_with_providers(&["aws"]));

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Failed to instantiate module runtime"]);
    let detail = &diags.iter().next().unwrap().detail;
    assert!(detail.contains("schemas are inconsistent"));
    assert!(detail.ends_with(BUG_REPORT_SUFFIX));
    assert_eq!(fixture.providers.get("hashicorp/aws").opened.load(Ordering::SeqCst), 0);
}

#[test]
fn test_client_failure_closes_started_clients() {
    let fixture = two_provider_fixture(FakeProvider::default(), FakeProvider::failing_client());
    let component = fixture.build(declaration_with_providers(&["aws", "google"]));

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Cannot validate component"]);
    assert!(diags.iter().next().unwrap().detail.contains("component.web"));

    let aws = fixture.providers.get("hashicorp/aws");
    assert_eq!(aws.opened.load(Ordering::SeqCst), 1);
    assert_eq!(aws.closed.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.runtime.validations.load(Ordering::SeqCst), 0);
}

#[test]
fn test_uninstalled_provider_cannot_validate() {
    let mut fixture = two_provider_fixture(FakeProvider::default(), FakeProvider::default());
    fixture.providers = Arc::new(FakeProviders::default().with("hashicorp/aws", FakeProvider::default()));
    let component = fixture.build(declaration_with_providers(&["aws", "google"]));

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Cannot validate component"]);
    let aws = fixture.providers.get("hashicorp/aws");
    assert_eq!(aws.schema_calls.load(Ordering::SeqCst), 1);
    assert_eq!(aws.closed.load(Ordering::SeqCst), aws.opened.load(Ordering::SeqCst));
}

#[test]
fn test_validation_is_memoized() {
    let fixture = Fixture::new(AWS_MODULE);
    let component = fixture.build(declaration_with_providers(&["aws"]));
    let ctx = EvalContext::new();

    let first = component.validate(&ctx);
    fixture.bundle.write_module("", "resources: {broken\n");
    let second = component.validate(&ctx);

    assert_eq!(first, second);
    assert_eq!(fixture.parser.loads.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.runtime.validations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_plan_validates_separately() {
    let fixture = Fixture::new(AWS_MODULE);
    let component = fixture.build(declaration_with_providers(&["aws"]));
    let ctx = EvalContext::new();

    assert!(component.validate(&ctx).is_empty());
    let (changes, diags) = component.plan_changes(&ctx);
    assert!(changes.is_empty());
    assert!(diags.is_empty());

    // The module tree is shared between phases; the checks are not.
    assert_eq!(fixture.parser.loads.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.runtime.validations.load(Ordering::SeqCst), 2);
    assert_eq!(fixture.evaluator.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_inline_provider_in_root_module() {
    let fixture = Fixture::new(
        r#"
required_providers:
  aws:
    source: hashicorp/aws
providers:
  aws: {}
"#,
    );
    let component = fixture.build(declaration_with_providers(&["aws"]));

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Inline provider configuration not allowed"]);
    assert!(diags.iter().next().unwrap().detail.contains("\"providers\" argument"));
    // The rule does not prevent validating the rest of the tree.
    assert_eq!(fixture.runtime.validations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_inline_provider_in_nested_module() {
    let fixture = Fixture::new("modules:\n  net:\n    source: ./net\n");
    fixture.bundle.write_module(
        "net",
        "required_providers:\n  aws:\n    source: hashicorp/aws\nproviders:\n  aws: {}\n",
    );
    let component = fixture.build(declaration_with_providers(&["aws"]));

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Inline provider configuration not allowed"]);
    let detail = &diags.iter().next().unwrap().detail;
    assert!(detail.starts_with("module.net is not compatible"), "{detail}");
    assert!(detail.contains("Select a compatible module."));
    assert!(fixture.runtime.missing_clients.lock().unwrap().is_empty());
}

#[test]
fn test_schema_fetched_for_inline_only_provider() {
    let fixture = Fixture::new("providers:\n  aws: {}\n");
    let component = fixture.build(declaration_with_providers(&["aws"]));

    let diags = component.validate(&EvalContext::new());
    assert_eq!(summaries(&diags), ["Inline provider configuration not allowed"]);

    let aws = fixture.providers.get("hashicorp/aws");
    assert_eq!(aws.schema_calls.load(Ordering::SeqCst), 1);
    assert_eq!(aws.opened.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.runtime.validations.load(Ordering::SeqCst), 1);
}
