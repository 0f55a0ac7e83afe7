//! # Fingerprint Engine
//!
//! A Rust library for rule-based fingerprinting of error events. Rules
//! select events by matching exception, frame and event attributes against
//! glob patterns, and assign them a custom fingerprint template; the engine
//! renders the template and reports which grouping variant contributes.
//!
//! ## Quick Start
//!
//! ### Basic Usage
//!
//! ```rust
//! use fingerprint_engine::{Event, ExceptionData, FingerprintEngine, RuleCompiler};
//!
//! let rules = RuleCompiler::new().compile_text(
//!     r#"
//! ## group every database outage together
//! type:DatabaseUnavailable -> database-unavailable
//! value:"*went wrong*" -> "something-went-wrong" "{{ error.value }}"
//! "#,
//! )?;
//!
//! let engine = FingerprintEngine::new(rules);
//! let event = Event::builder()
//!     .exception(ExceptionData::new("DatabaseUnavailable", "connection refused"))
//!     .build();
//!
//! let outcome = engine.evaluate(&event)?;
//! assert_eq!(outcome.fingerprint, vec!["database-unavailable"]);
//! assert_eq!(outcome.matched_rule.unwrap().rule_index, 0);
//! # Ok::<(), fingerprint_engine::FingerprintError>(())
//! ```
//!
//! ### Salting the Default Grouping
//!
//! ```rust
//! use fingerprint_engine::{Event, FingerprintEngine, RuleCompiler, Variant};
//! use std::sync::Arc;
//!
//! let rules = RuleCompiler::new()
//!     .compile_text(r#"message:"*timeout*" -> "my-route" "{{ default }}""#)?;
//! let engine = FingerprintEngine::new(rules)
//!     .with_default_component(Arc::new(|_| "<default-value>".to_string()));
//!
//! let outcome = engine.evaluate(&Event::builder().message("upstream timeout").build())?;
//! assert_eq!(outcome.fingerprint, vec!["my-route", "<default-value>"]);
//! assert!(matches!(outcome.variants["system"], Variant::SaltedComponent { contributes: true, .. }));
//! # Ok::<(), fingerprint_engine::FingerprintError>(())
//! ```
//!
//! ### Batch Processing
//!
//! ```rust
//! use fingerprint_engine::{EngineConfig, Event, FingerprintEngine, RuleCompiler};
//!
//! let rules = RuleCompiler::new().compile_text("logger:sql.* -> sql")?;
//! let engine = FingerprintEngine::with_config(rules, EngineConfig::high_throughput());
//!
//! let events: Vec<Event> = (0..100)
//!     .map(|i| Event::builder().logger(format!("sql.pool{i}")).build())
//!     .collect();
//!
//! let outcomes = engine.evaluate_batch(&events)?;
//! assert!(outcomes.iter().all(|o| o.fingerprint == vec!["sql"]));
//! # Ok::<(), fingerprint_engine::FingerprintError>(())
//! ```

pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod ir;
pub mod matcher;
pub mod template;
pub mod variant;

// Primary engine interface
pub use engine::{select_rule, FingerprintEngine, GroupingOutcome, MatchResult, RuleStore};

// Compiler and configuration
pub use compiler::{KeyMapping, RuleCompiler};
pub use config::{BatchConfig, EngineConfig, SaltedPrecedence, UnresolvedPolicy, VariantConfig};

// Core types and errors
pub use error::{FingerprintError, Result};
pub use event::{Event, EventBuilder, ExceptionData, Family, Frame};
pub use ir::{
    FingerprintToken, FingerprintingRules, MatchLevel, MatcherKey, Rule, RuleConfig, RulesConfig,
    TemplateSegment, CONFIG_VERSION, DEFAULT_MARKER,
};

// Rendering and classification
pub use template::{DefaultComponentFn, RenderOptions, TemplateRenderer};
pub use variant::{Variant, VariantClassifier, Variants};
