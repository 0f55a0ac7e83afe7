//! Match candidates extracted from an event.
//!
//! A rule does not look at a flat attribute map. Exception keys are tested
//! against each exception of the chain, frame keys against each frame and
//! event keys against the event itself. A [`MatchCandidate`] is one such
//! unit; all matchers of the same [`MatchLevel`] must be satisfied by the
//! same candidate.

use crate::event::{Event, ExceptionData, Family, Frame};
use crate::ir::{MatchLevel, MatcherKey};

/// One unit of an event a group of matchers is evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum MatchCandidate<'a> {
    Exception(&'a ExceptionData),
    Frame {
        frame: &'a Frame,
        platform: Option<&'a str>,
    },
    Event(&'a Event),
}

impl<'a> MatchCandidate<'a> {
    /// Iterate all candidates of `level` in the event.
    pub fn all(event: &'a Event, level: MatchLevel) -> Box<dyn Iterator<Item = Self> + 'a> {
        match level {
            MatchLevel::Exception => {
                Box::new(event.exceptions().iter().map(MatchCandidate::Exception))
            }
            MatchLevel::Frame => {
                let platform = event.platform();
                Box::new(
                    event
                        .frames()
                        .map(move |frame| MatchCandidate::Frame { frame, platform }),
                )
            }
            MatchLevel::Event => Box::new(std::iter::once(MatchCandidate::Event(event))),
        }
    }

    /// String value of `key` on this candidate, `None` when absent or when
    /// the key belongs to another level.
    pub fn text(&self, key: &MatcherKey) -> Option<&'a str> {
        match (*self, key) {
            (MatchCandidate::Exception(e), MatcherKey::Type) => e.ty.as_deref(),
            (MatchCandidate::Exception(e), MatcherKey::Value) => e.value.as_deref(),
            (MatchCandidate::Frame { frame, .. }, MatcherKey::Module) => frame.module.as_deref(),
            (MatchCandidate::Frame { frame, .. }, MatcherKey::Function) => {
                frame.function.as_deref()
            }
            (MatchCandidate::Frame { frame, .. }, MatcherKey::Path) => frame.path.as_deref(),
            (MatchCandidate::Frame { frame, .. }, MatcherKey::Package) => {
                frame.package.as_deref()
            }
            (MatchCandidate::Event(event), MatcherKey::Message) => event.message(),
            (MatchCandidate::Event(event), MatcherKey::Logger) => event.logger(),
            (MatchCandidate::Event(event), MatcherKey::Level) => event.level(),
            (MatchCandidate::Event(event), MatcherKey::Transaction) => event.transaction(),
            (MatchCandidate::Event(event), MatcherKey::Release) => event.release(),
            (MatchCandidate::Event(event), MatcherKey::Sdk) => event.sdk(),
            (MatchCandidate::Event(event), MatcherKey::Tag(tag)) => event.tag(tag),
            _ => None,
        }
    }

    pub fn in_app(&self) -> Option<bool> {
        match self {
            MatchCandidate::Frame { frame, .. } => frame.in_app,
            _ => None,
        }
    }

    pub fn family(&self) -> Option<Family> {
        match self {
            MatchCandidate::Frame { frame, platform } => Some(frame.family(*platform)),
            _ => None,
        }
    }
}
