//! Read-only error event representation.
//!
//! An [`Event`] carries the attributes the fingerprinting rules can look at:
//! the chained exceptions (type and value), the stack frames attached to
//! them, and a handful of event-level fields. The engine never mutates an
//! event; it is built once per error occurrence, either with
//! [`EventBuilder`] or by deserializing the usual JSON payload shape:
//!
//! ```rust
//! use fingerprint_engine::Event;
//!
//! let event = Event::from_json(r#"{
//!     "exception": {"values": [{
//!         "type": "DatabaseUnavailable",
//!         "value": "connection refused",
//!         "stacktrace": {"frames": [{"module": "invalid.databasestuff.connect"}]}
//!     }]},
//!     "level": "error"
//! }"#)?;
//!
//! assert_eq!(event.exceptions().len(), 1);
//! assert_eq!(event.level(), Some("error"));
//! # Ok::<(), fingerprint_engine::FingerprintError>(())
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One exception of a (possibly chained) error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExceptionData {
    #[serde(rename = "type", default)]
    pub ty: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Frame>,
}

impl ExceptionData {
    pub fn new(ty: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            ty: Some(ty.into()),
            value: Some(value.into()),
            frames: Vec::new(),
        }
    }

    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }
}

/// Frame family used by the `family` matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Native,
    Javascript,
    Other,
}

impl Family {
    /// Derive the family from a platform name.
    pub fn from_platform(platform: Option<&str>) -> Self {
        match platform {
            Some("native" | "c" | "cocoa" | "objc" | "swift") => Family::Native,
            Some("javascript" | "node") => Family::Javascript,
            _ => Family::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Family::Native => "native",
            Family::Javascript => "javascript",
            Family::Other => "other",
        }
    }
}

/// A single stack frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default, alias = "abs_path")]
    pub path: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub in_app: Option<bool>,
    #[serde(default)]
    pub platform: Option<String>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn in_app(mut self, in_app: bool) -> Self {
        self.in_app = Some(in_app);
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Family of this frame, falling back to the event platform.
    pub fn family(&self, event_platform: Option<&str>) -> Family {
        Family::from_platform(self.platform.as_deref().or(event_platform))
    }
}

/// Read-only error event presented to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Event {
    exceptions: Vec<ExceptionData>,
    frames: Vec<Frame>,
    message: Option<String>,
    logger: Option<String>,
    level: Option<String>,
    transaction: Option<String>,
    release: Option<String>,
    sdk: Option<String>,
    platform: Option<String>,
    tags: BTreeMap<String, String>,
    fingerprint: Option<Vec<String>>,
}

impl Event {
    pub fn builder() -> EventBuilder {
        EventBuilder::default()
    }

    /// Parse an event from its JSON payload.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawEvent = serde_json::from_str(json)?;
        Ok(raw.into())
    }

    /// Convert an already-parsed JSON value into an event.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: RawEvent = serde_json::from_value(value)?;
        Ok(raw.into())
    }

    pub fn exceptions(&self) -> &[ExceptionData] {
        &self.exceptions
    }

    /// Every frame of the event: exception stacktraces first, then the
    /// thread stacktrace.
    pub fn frames(&self) -> impl DoubleEndedIterator<Item = &Frame> + '_ {
        self.exceptions
            .iter()
            .flat_map(|exception| exception.frames.iter())
            .chain(self.frames.iter())
    }

    pub fn has_in_app_frames(&self) -> bool {
        self.frames().any(|frame| frame.in_app == Some(true))
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn logger(&self) -> Option<&str> {
        self.logger.as_deref()
    }

    pub fn level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    pub fn transaction(&self) -> Option<&str> {
        self.transaction.as_deref()
    }

    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    pub fn sdk(&self) -> Option<&str> {
        self.sdk.as_deref()
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Fingerprint sent by the client SDK, if any.
    pub fn client_fingerprint(&self) -> Option<&[String]> {
        self.fingerprint.as_deref()
    }

    /// First exception type set on the event.
    pub fn exception_type(&self) -> Option<&str> {
        self.exceptions.iter().find_map(|e| e.ty.as_deref())
    }

    /// First exception value set on the event.
    pub fn exception_value(&self) -> Option<&str> {
        self.exceptions.iter().find_map(|e| e.value.as_deref())
    }

    /// Get a frame field from the innermost frame that has it set.
    ///
    /// Exception stacktraces are searched first. The thread stacktrace is
    /// only consulted when no exception frame carries the field.
    pub fn crash_frame_field<F>(&self, field: F) -> Option<&str>
    where
        F: Fn(&Frame) -> Option<&str>,
    {
        self.exceptions
            .iter()
            .flat_map(|exception| exception.frames.iter())
            .rev()
            .find_map(&field)
            .or_else(|| self.frames.iter().rev().find_map(&field))
    }
}

/// Builder for [`Event`].
#[derive(Debug, Default)]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn exception(mut self, exception: ExceptionData) -> Self {
        self.event.exceptions.push(exception);
        self
    }

    /// Add an exception with only a value set.
    pub fn value(self, value: impl Into<String>) -> Self {
        self.exception(ExceptionData {
            value: Some(value.into()),
            ..ExceptionData::default()
        })
    }

    /// Add a thread-stacktrace frame.
    pub fn frame(mut self, frame: Frame) -> Self {
        self.event.frames.push(frame);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.event.message = Some(message.into());
        self
    }

    pub fn logger(mut self, logger: impl Into<String>) -> Self {
        self.event.logger = Some(logger.into());
        self
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.event.level = Some(level.into());
        self
    }

    pub fn transaction(mut self, transaction: impl Into<String>) -> Self {
        self.event.transaction = Some(transaction.into());
        self
    }

    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.event.release = Some(release.into());
        self
    }

    pub fn sdk(mut self, sdk: impl Into<String>) -> Self {
        self.event.sdk = Some(sdk.into());
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.event.platform = Some(platform.into());
        self
    }

    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.event.tags.insert(name.into(), value.into());
        self
    }

    pub fn fingerprint<I, S>(mut self, fingerprint: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event.fingerprint = Some(fingerprint.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}

// Wire shape of an incoming event payload.

#[derive(Debug, Default, Deserialize)]
struct RawEvent {
    #[serde(default)]
    exception: Option<RawValues<RawException>>,
    #[serde(default)]
    stacktrace: Option<RawStacktrace>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    logentry: Option<RawLogEntry>,
    #[serde(default)]
    logger: Option<String>,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default)]
    release: Option<String>,
    #[serde(default)]
    sdk: Option<RawSdk>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    tags: Option<RawTags>,
    #[serde(default)]
    fingerprint: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawValues<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawException {
    #[serde(rename = "type", default)]
    ty: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    stacktrace: Option<RawStacktrace>,
}

#[derive(Debug, Deserialize)]
struct RawStacktrace {
    #[serde(default)]
    frames: Vec<Frame>,
}

#[derive(Debug, Deserialize)]
struct RawLogEntry {
    #[serde(default)]
    formatted: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSdk {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTags {
    Map(BTreeMap<String, String>),
    Pairs(Vec<(String, String)>),
}

impl From<RawEvent> for Event {
    fn from(raw: RawEvent) -> Self {
        let exceptions = raw
            .exception
            .map(|values| values.values)
            .unwrap_or_default()
            .into_iter()
            .map(|e| ExceptionData {
                ty: e.ty,
                value: e.value,
                frames: e.stacktrace.map(|s| s.frames).unwrap_or_default(),
            })
            .collect();

        let message = raw
            .logentry
            .and_then(|entry| entry.formatted.or(entry.message))
            .or(raw.message);

        let tags = match raw.tags {
            Some(RawTags::Map(map)) => map,
            Some(RawTags::Pairs(pairs)) => pairs.into_iter().collect(),
            None => BTreeMap::new(),
        };

        Event {
            exceptions,
            frames: raw.stacktrace.map(|s| s.frames).unwrap_or_default(),
            message,
            logger: raw.logger,
            level: raw.level,
            transaction: raw.transaction,
            release: raw.release,
            sdk: raw.sdk.and_then(|sdk| sdk.name),
            platform: raw.platform,
            tags,
            fingerprint: raw.fingerprint,
        }
    }
}
