//! Fingerprint classification demo.
//!
//! Loads a small rule set and prints the grouping outcome of a few events
//! as JSON.
//!
//! Run with: `cargo run --example classify`

use anyhow::{Context, Result};
use fingerprint_engine::{Event, ExceptionData, FingerprintEngine, Frame, RuleCompiler};
use std::sync::Arc;

const RULES: &str = r#"
# outages share one issue per route
type:DatabaseUnavailable module:"invalid.databasestuff.*" -> "my-route" "{{ default }}"
value:"*went wrong*" -> "something-went-wrong" "{{ error.value }}" title="Something went wrong"
"#;

fn main() -> Result<()> {
    let rules = RuleCompiler::new()
        .compile_text(RULES)
        .context("compiling demo rules")?;
    println!("Loaded {} rules:\n{}", rules.len(), rules.to_config_string());

    let engine = FingerprintEngine::new(rules)
        .with_default_component(Arc::new(|_| "<default-value>".to_string()));

    let events = vec![
        Event::builder()
            .exception(ExceptionData::new("EndOfWorld", "something went WRONG"))
            .build(),
        Event::builder()
            .exception(
                ExceptionData::new("DatabaseUnavailable", "connection refused")
                    .with_frame(Frame::new().module("invalid.databasestuff.connect")),
            )
            .build(),
        Event::builder()
            .exception(ExceptionData::new("ValueError", "bad input"))
            .frame(Frame::new().function("main").in_app(true))
            .build(),
    ];

    for event in &events {
        let outcome = engine.evaluate(event)?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    Ok(())
}
