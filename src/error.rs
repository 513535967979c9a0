//! Error Types - What can go wrong and how it surfaces
//!
//! Programming errors (unknown styles, events a kind never emits, duplicate
//! registrations) surface as `Err` values at the call site that caused them.
//! Tree inconsistencies discovered while reacting to events are logged and
//! tolerated instead, since an event handler has no caller to return to.

use thiserror::Error;

use crate::drawable::schema::Features;
use crate::event::EventName;
use crate::registry::DrawableId;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything the toolkit can report as a hard failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A linkable id was registered twice. Ids are allocated from a
    /// process-wide counter, so this indicates a re-registration bug.
    #[error("linkable id {0} is already registered")]
    DuplicateRegistration(DrawableId),

    /// A lookup named an id with no live registration.
    #[error("no drawable is registered under linkable id {0}")]
    NoSuchLinkableId(DrawableId),

    /// A style name outside the kind's schema was used explicitly.
    #[error("{kind:?} drawables have no style named {style:?}")]
    NoSuchStyle { kind: String, style: String },

    /// A style exists in the schema but is gated behind a feature the
    /// session did not enable.
    #[error("style {style:?} requires feature {feature:?}, which is not enabled")]
    UnsupportedFeature { style: String, feature: Features },

    /// A value failed (or could not be coerced by) its style's validator.
    #[error("invalid value for style {style:?}: {reason}")]
    InvalidStyleValue { style: String, reason: String },

    /// An event binding was requested on a kind that never emits that event.
    #[error("{kind:?} drawables do not emit {event:?} events")]
    EventNotSupported { kind: String, event: EventName },

    /// A custom widget kind was registered under a name already taken.
    #[error("widget kind {0:?} is already registered")]
    DuplicateWidgetRegistration(String),

    /// A widget kind was referenced before being registered.
    #[error("no widget kind named {0:?} is registered")]
    UnknownWidgetKind(String),

    /// An operation other than `destroy` was invoked on a destroyed drawable.
    #[error("drawable {0} has been destroyed")]
    Destroyed(DrawableId),

    /// A child operation targeted a kind that cannot hold children.
    #[error("{kind:?} drawables cannot contain children")]
    NotAContainer { kind: String },

    /// A re-parent would make a drawable its own ancestor.
    #[error("cannot move drawable {id} under {parent}: the move would form a cycle")]
    ParentCycle { id: DrawableId, parent: DrawableId },

    /// Handlers kept dispatching from inside dispatch past the nesting cap.
    #[error("event dispatch exceeded {0} nested levels")]
    DispatchDepthExceeded(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = Error::NoSuchStyle {
            kind: "button".to_string(),
            style: "gravity".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("button"));
        assert!(msg.contains("gravity"));
    }

    #[test]
    fn test_destroyed_message_carries_id() {
        let id = DrawableId::next();
        let msg = Error::Destroyed(id).to_string();
        assert!(msg.contains(&id.raw().to_string()));
    }
}
