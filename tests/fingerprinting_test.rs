//! End-to-end fingerprinting tests.
//!
//! These tests run events through compiled rules and check the resulting
//! fingerprint and grouping variants.

use fingerprint_engine::variant::{
    APP_VARIANT, CUSTOM_VARIANT, HINT_CUSTOM_PRECEDENCE, SYSTEM_VARIANT,
};
use fingerprint_engine::{
    EngineConfig, Event, ExceptionData, FingerprintEngine, FingerprintingRules, Frame,
    RuleCompiler, SaltedPrecedence, Variant,
};
use std::sync::Arc;

fn engine(rules: &str) -> FingerprintEngine {
    let rules = RuleCompiler::new().compile_text(rules).unwrap();
    FingerprintEngine::new(rules).with_default_component(Arc::new(|_| "<default-value>".to_string()))
}

fn contributing(outcome: &fingerprint_engine::GroupingOutcome) -> usize {
    outcome.variants.values().filter(|v| v.contributes()).count()
}

#[test]
fn test_custom_fingerprint_from_error_value() {
    let engine = engine(r#"value:"*went wrong*" -> "something-went-wrong" "{{ error.value }}""#);
    let event = Event::builder()
        .exception(ExceptionData::new("EndOfWorld", "something went WRONG"))
        .build();

    let outcome = engine.evaluate(&event).unwrap();

    assert_eq!(
        outcome.fingerprint,
        vec!["something-went-wrong", "something went WRONG"]
    );
    assert_eq!(
        outcome.matched_rule.as_ref().unwrap().text,
        r#"value:"*went wrong*" -> "something-went-wrong{{ error.value }}""#
    );

    match &outcome.variants[CUSTOM_VARIANT] {
        Variant::CustomFingerprint {
            values,
            matched_rule,
            hint,
        } => {
            assert_eq!(values, &outcome.fingerprint);
            assert!(matched_rule.is_some());
            assert_eq!(hint, &None);
        }
        other => panic!("Expected custom fingerprint, got {other:?}"),
    }

    for name in [APP_VARIANT, SYSTEM_VARIANT] {
        let variant = &outcome.variants[name];
        assert!(!variant.contributes());
        assert_eq!(variant.hint(), Some(HINT_CUSTOM_PRECEDENCE));
    }
    assert_eq!(contributing(&outcome), 1);
}

#[test]
fn test_salted_default_grouping() {
    let engine = engine(
        r#"type:"DatabaseUnavailable" module:"invalid.databasestuff.*" -> "my-route" "{{ default }}""#,
    );
    let event = Event::builder()
        .exception(
            ExceptionData::new("DatabaseUnavailable", "connection refused")
                .with_frame(Frame::new().module("invalid.databasestuff.connect")),
        )
        .build();

    let outcome = engine.evaluate(&event).unwrap();

    assert_eq!(outcome.fingerprint, vec!["my-route", "<default-value>"]);
    assert!(!outcome.variants.contains_key(CUSTOM_VARIANT));

    for name in [APP_VARIANT, SYSTEM_VARIANT] {
        match &outcome.variants[name] {
            Variant::SaltedComponent {
                values,
                client_values,
                matched_rule,
                ..
            } => {
                assert_eq!(values, client_values);
                assert_eq!(client_values, &vec!["my-route", "{{ default }}"]);
                assert!(matched_rule.is_some());
            }
            other => panic!("Expected salted component, got {other:?}"),
        }
    }

    assert!(outcome.variants[SYSTEM_VARIANT].contributes());
    assert!(!outcome.variants[APP_VARIANT].contributes());
    assert_eq!(
        outcome.variants[APP_VARIANT].hint(),
        Some("exception of system takes precedence")
    );
}

#[test]
fn test_salted_precedence_is_configurable() {
    let rules = RuleCompiler::new()
        .compile_text(r#"type:A -> "{{ default }}" "tenant""#)
        .unwrap();
    let engine = FingerprintEngine::with_config(
        rules,
        EngineConfig::new().with_salted_precedence(SaltedPrecedence::App),
    );
    let event = Event::builder().exception(ExceptionData::new("A", "x")).build();

    let outcome = engine.evaluate(&event).unwrap();
    assert_eq!(outcome.contributing_variant(), Some(APP_VARIANT));
    assert_eq!(
        outcome.variants[SYSTEM_VARIANT].hint(),
        Some("exception of app takes precedence")
    );
}

#[test]
fn test_no_rule_matches() {
    let engine = engine("type:DatabaseUnavailable -> db\nmessage:*timeout* -> timeout");
    let event = Event::builder()
        .exception(ExceptionData::new("ValueError", "bad input"))
        .message("request failed")
        .build();

    let outcome = engine.evaluate(&event).unwrap();

    assert!(outcome.matched_rule.is_none());
    assert!(!outcome.variants.contains_key(CUSTOM_VARIANT));
    assert!(outcome
        .variants
        .values()
        .all(|v| !matches!(v, Variant::SaltedComponent { .. })));
    assert_eq!(outcome.fingerprint, vec!["<default-value>"]);
    assert_eq!(contributing(&outcome), 1);
}

#[test]
fn test_empty_rule_set_never_fails() {
    let engine = FingerprintEngine::new(FingerprintingRules::empty());
    let outcome = engine.evaluate(&Event::default()).unwrap();
    assert!(outcome.matched_rule.is_none());
    assert_eq!(outcome.contributing_variant(), Some(SYSTEM_VARIANT));
}

#[test]
fn test_first_matching_rule_wins() {
    let engine = engine(
        "type:Database* -> generic-database\ntype:DatabaseUnavailable -> database-unavailable",
    );
    let event = Event::builder()
        .exception(ExceptionData::new("DatabaseUnavailable", ""))
        .build();

    let outcome = engine.evaluate(&event).unwrap();
    assert_eq!(outcome.fingerprint, vec!["generic-database"]);
    assert_eq!(outcome.matched_rule.unwrap().rule_index, 0);
}

#[test]
fn test_frame_matchers_need_a_single_frame() {
    let engine = engine(r#"function:connect path:"**/db/*.py" -> db-connect"#);

    let split = Event::builder()
        .frame(Frame::new().function("connect").path("src/net/socket.py"))
        .frame(Frame::new().function("query").path("src/db/pool.py"))
        .build();
    assert!(engine.evaluate(&split).unwrap().matched_rule.is_none());

    let together = Event::builder()
        .frame(Frame::new().function("connect").path("src\\db\\pool.py"))
        .build();
    assert_eq!(
        engine.evaluate(&together).unwrap().fingerprint,
        vec!["db-connect"]
    );
}

#[test]
fn test_negated_matchers() {
    let engine = engine("type:*Error !app:yes -> library-error");

    let library = Event::builder()
        .exception(
            ExceptionData::new("KeyError", "x").with_frame(Frame::new().in_app(false)),
        )
        .build();
    assert!(engine.evaluate(&library).unwrap().matched_rule.is_some());

    let application = Event::builder()
        .exception(ExceptionData::new("KeyError", "x").with_frame(Frame::new().in_app(true)))
        .build();
    assert!(engine.evaluate(&application).unwrap().matched_rule.is_none());

    let no_frames = Event::builder()
        .exception(ExceptionData::new("KeyError", "x"))
        .build();
    assert!(engine.evaluate(&no_frames).unwrap().matched_rule.is_none());
}

#[test]
fn test_empty_pattern_matches_only_empty_value() {
    let engine = engine(r#"message:"" -> empty-message"#);

    let empty = Event::builder().message("").build();
    assert!(engine.evaluate(&empty).unwrap().matched_rule.is_some());

    let non_empty = Event::builder().message("hello").build();
    assert!(engine.evaluate(&non_empty).unwrap().matched_rule.is_none());

    assert!(engine.evaluate(&Event::default()).unwrap().matched_rule.is_none());
}

#[test]
fn test_tag_and_event_level_matchers() {
    let engine = engine(
        r#"tags.server_name:"web-*" level:error -> "web" "{{ tags.server_name }}" "{{ level }}""#,
    );
    let event = Event::builder()
        .tag("server_name", "web-3")
        .level("ERROR")
        .build();

    assert_eq!(
        engine.evaluate(&event).unwrap().fingerprint,
        vec!["web", "web-3", "ERROR"]
    );
}

#[test]
fn test_client_fingerprint_replaces_default_grouping() {
    let engine = engine("type:Unrelated -> x");
    let event = Event::builder()
        .exception(ExceptionData::new("Timeout", "slow"))
        .fingerprint(["checkout", "{{ error.type }}"])
        .build();

    let outcome = engine.evaluate(&event).unwrap();
    assert_eq!(outcome.fingerprint, vec!["checkout", "Timeout"]);
    assert!(outcome.matched_rule.is_none());
    match &outcome.variants[CUSTOM_VARIANT] {
        Variant::CustomFingerprint { matched_rule, .. } => assert_eq!(matched_rule, &None),
        other => panic!("Expected custom fingerprint, got {other:?}"),
    }
}

#[test]
fn test_client_fingerprint_ignored_in_strict_mode() {
    let rules = RuleCompiler::new().compile_text("type:Unrelated -> x").unwrap();
    let engine = FingerprintEngine::with_config(rules, EngineConfig::strict());
    let event = Event::builder().fingerprint(["checkout"]).build();

    let outcome = engine.evaluate(&event).unwrap();
    assert!(!outcome.variants.contains_key(CUSTOM_VARIANT));
}

#[test]
fn test_event_from_json_payload() {
    let engine = engine(r#"type:ZeroDivisionError app:yes -> "math" "{{ function }}""#);
    let event = Event::from_json(
        r#"{
            "platform": "python",
            "exception": {"values": [{
                "type": "ZeroDivisionError",
                "value": "division by zero",
                "stacktrace": {"frames": [
                    {"function": "main", "module": "app", "in_app": true},
                    {"function": "divide", "module": "app.math", "in_app": true}
                ]}
            }]}
        }"#,
    )
    .unwrap();

    let outcome = engine.evaluate(&event).unwrap();
    assert_eq!(outcome.fingerprint, vec!["math", "divide"]);
}

#[test]
fn test_evaluation_is_deterministic() {
    let engine = engine(r#"value:"*went wrong*" -> "wrong" "{{ error.value }}""#);
    let event = Event::builder().value("it went wrong").build();

    let first = engine.evaluate(&event).unwrap();
    for _ in 0..20 {
        assert_eq!(engine.evaluate(&event).unwrap(), first);
    }
}
