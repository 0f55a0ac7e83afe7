//! Matcher evaluation for fingerprinting rules.
//!
//! Matching is split between compilation and evaluation, like everything
//! else in the crate:
//! - **Compilation Phase**: each `key:"pattern"` pair becomes a
//!   [`CompiledMatcher`] holding a prepared [`GlobPattern`] (or a boolean /
//!   family set for `app` and `family`)
//! - **Evaluation Phase**: matchers are tested against [`MatchCandidate`]s
//!   pulled from the event, without allocating
//!
//! ## Example Usage
//!
//! ```rust
//! use fingerprint_engine::matcher;
//! use fingerprint_engine::{Event, ExceptionData};
//!
//! let event = Event::builder()
//!     .exception(ExceptionData::new("DatabaseUnavailable", "timeout"))
//!     .build();
//!
//! assert!(matcher::matches(&event, "type", "Database*")?);
//! assert!(!matcher::matches(&event, "!type", "DatabaseUnavailable")?);
//! # Ok::<(), fingerprint_engine::FingerprintError>(())
//! ```

pub mod compiled;
pub mod context;
pub mod glob;

pub use compiled::{matches, matches_all, CompiledMatcher};
pub use context::MatchCandidate;
pub use glob::{GlobOptions, GlobPattern};
