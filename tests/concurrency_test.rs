//! Batch evaluation and hot reload under concurrent use.

use fingerprint_engine::{
    EngineConfig, Event, ExceptionData, FingerprintEngine, FingerprintError, RuleCompiler,
    UnresolvedPolicy,
};
use std::sync::Arc;
use std::thread;

fn events(count: usize) -> Vec<Event> {
    (0..count)
        .map(|i| {
            Event::builder()
                .exception(ExceptionData::new(format!("Error{}", i % 3), format!("event {i}")))
                .build()
        })
        .collect()
}

#[test]
fn test_parallel_batch_matches_sequential() {
    let rules = "type:Error0 -> zero\ntype:Error1 -> \"one\" \"{{ error.value }}\"";
    let compiler = RuleCompiler::new();
    let batch = events(500);

    let parallel = FingerprintEngine::with_config(
        compiler.compile_text(rules).unwrap(),
        EngineConfig::new().with_parallel_threshold(1),
    );
    let sequential = FingerprintEngine::with_config(
        compiler.compile_text(rules).unwrap(),
        EngineConfig::new().with_parallelism(false),
    );

    let a = parallel.evaluate_batch(&batch).unwrap();
    let b = sequential.evaluate_batch(&batch).unwrap();
    assert_eq!(a, b);

    assert_eq!(a[0].fingerprint, vec!["zero"]);
    assert_eq!(a[1].fingerprint, vec!["one", "event 1"]);
    assert!(a[2].matched_rule.is_none());
    assert_eq!(a[499].fingerprint, vec!["one", "event 499"]);
}

#[test]
fn test_batch_fails_on_unresolved_placeholder() {
    let rules = RuleCompiler::new()
        .compile_text("type:A -> \"{{ message }}\"")
        .unwrap();
    let mut batch: Vec<Event> = (0..300)
        .map(|i| {
            Event::builder()
                .exception(ExceptionData::new("A", ""))
                .message(format!("message {i}"))
                .build()
        })
        .collect();
    batch.insert(150, Event::builder().exception(ExceptionData::new("A", "")).build());

    let strict = EngineConfig::new().with_unresolved_policy(UnresolvedPolicy::Fail);
    let configs = [
        strict.clone().with_parallel_threshold(1),
        strict.with_parallelism(false),
    ];

    for config in configs {
        let engine = FingerprintEngine::with_config(rules.clone(), config);
        assert_eq!(
            engine.evaluate_batch(&batch),
            Err(FingerprintError::UnresolvedPlaceholder("message".to_string()))
        );
        assert!(engine.evaluate_batch(&batch[..150]).is_ok());
    }
}

#[test]
fn test_batch_empty_policy_keeps_positions() {
    let rules = RuleCompiler::new()
        .compile_text("type:A -> \"{{ message }}\" tail")
        .unwrap();
    let batch = vec![
        Event::builder().exception(ExceptionData::new("A", "")).message("m").build(),
        Event::builder().exception(ExceptionData::new("A", "")).build(),
    ];

    let engine =
        FingerprintEngine::with_config(rules, EngineConfig::new().with_parallel_threshold(1));
    let outcomes = engine.evaluate_batch(&batch).unwrap();

    assert_eq!(outcomes[0].fingerprint, vec!["m", "tail"]);
    assert_eq!(outcomes[1].fingerprint, vec!["", "tail"]);
}

#[test]
fn test_reload_while_evaluating() {
    let compiler = RuleCompiler::new();
    let old_rules = compiler.compile_text("type:Error0 -> old").unwrap();
    let engine = Arc::new(FingerprintEngine::new(old_rules));
    let event = Event::builder().exception(ExceptionData::new("Error0", "")).build();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let event = event.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let fingerprint = engine.evaluate(&event).unwrap().fingerprint;
                    assert!(fingerprint == vec!["old"] || fingerprint == vec!["new"]);
                }
            })
        })
        .collect();

    for _ in 0..20 {
        engine.reload(compiler.compile_text("type:Error0 -> new").unwrap());
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(engine.evaluate(&event).unwrap().fingerprint, vec!["new"]);
}

#[test]
fn test_snapshot_survives_reload() {
    let compiler = RuleCompiler::new();
    let engine = FingerprintEngine::new(compiler.compile_text("type:A -> a").unwrap());

    let snapshot = engine.rules();
    engine.reload(compiler.compile_text("type:B -> b\ntype:C -> c").unwrap());

    assert_eq!(snapshot.len(), 1);
    assert_eq!(engine.rules().len(), 2);
}
