//! Event Types - Names, targets, filters and payloads
//!
//! Everything that crosses between the logical tree and the display tree is
//! an [`Event`]: a name, an optional target drawable, and a payload. The
//! subscription-side wildcards live in [`NameFilter`] and [`TargetFilter`];
//! a dispatched event always carries a concrete name, so "dispatch a
//! wildcard" is not even expressible.

pub mod bus;

pub use bus::{EventBus, MAX_DISPATCH_DEPTH, SubscriptionId};

use std::fmt;

use crate::drawable::DrawableKind;
use crate::registry::DrawableId;
use crate::types::StyleMap;

// =============================================================================
// Names and Targets
// =============================================================================

/// The closed set of event names.
///
/// The first four are the tree-synchronization protocol: the display side
/// rebuilds its mirror tree purely from them. The rest are user-interface
/// events injected by the display side and consumed by application
/// handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventName {
    /// A logical drawable was constructed.
    Create,
    /// One or more styles of a drawable changed.
    PropChange,
    /// A drawable moved to a new parent (or detached).
    Parent,
    /// A drawable's life ended.
    Destroy,
    /// Pointer click on a drawable.
    Click,
    /// Pointer entered a drawable.
    Hover,
    /// Pointer left a drawable.
    Leave,
    /// An editable drawable's text changed on the display side.
    Change,
    /// Pointer moved within a drawable.
    Motion,
}

impl EventName {
    /// Wire name, as it would appear in logs and external protocols.
    pub const fn as_str(self) -> &'static str {
        match self {
            EventName::Create => "create",
            EventName::PropChange => "prop_change",
            EventName::Parent => "parent",
            EventName::Destroy => "destroy",
            EventName::Click => "click",
            EventName::Hover => "hover",
            EventName::Leave => "leave",
            EventName::Change => "change",
            EventName::Motion => "motion",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an event is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// Addressed to no drawable in particular (bus-wide announcements).
    None,
    /// Addressed to one drawable by id.
    Drawable(DrawableId),
}

impl From<DrawableId> for Target {
    fn from(id: DrawableId) -> Self {
        Target::Drawable(id)
    }
}

// =============================================================================
// Subscription Filters
// =============================================================================

/// Name side of a subscription. `Any` is the only wildcard in the system
/// and exists purely here, on the listening side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NameFilter {
    /// Match every event name.
    Any,
    /// Match exactly one event name.
    Name(EventName),
}

impl From<EventName> for NameFilter {
    fn from(name: EventName) -> Self {
        NameFilter::Name(name)
    }
}

/// Target side of a subscription.
///
/// `At(Target::None)` is not a wildcard: it matches only events dispatched
/// with no target. `Any` matches every dispatch regardless of target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetFilter {
    /// Match every target, including untargeted events.
    Any,
    /// Match exactly one target value.
    At(Target),
}

impl From<Target> for TargetFilter {
    fn from(target: Target) -> Self {
        TargetFilter::At(target)
    }
}

impl From<DrawableId> for TargetFilter {
    fn from(id: DrawableId) -> Self {
        TargetFilter::At(Target::Drawable(id))
    }
}

// =============================================================================
// Events
// =============================================================================

/// Payload carried by an event.
#[derive(Clone, Debug)]
pub enum EventData {
    /// No payload.
    None,
    /// Everything the display side needs to mirror a new drawable.
    Create {
        kind: DrawableKind,
        styles: StyleMap,
        parent: Option<DrawableId>,
    },
    /// The styles that changed, new values only.
    StyleChanges(StyleMap),
    /// The new parent id, `None` when detached.
    NewParent(Option<DrawableId>),
    /// Free text (edit line contents).
    Text(String),
    /// Pointer coordinates relative to the target drawable.
    Position { x: f64, y: f64 },
}

/// One event in flight on the bus.
#[derive(Clone, Debug)]
pub struct Event {
    pub name: EventName,
    pub target: Target,
    pub data: EventData,
}

impl Event {
    /// Builds an event from parts. The protocol constructors below are
    /// preferred where they fit.
    pub fn new(name: EventName, target: impl Into<Target>, data: EventData) -> Self {
        Event {
            name,
            target: target.into(),
            data,
        }
    }

    /// `create` event announcing a freshly constructed drawable.
    pub fn create(
        id: DrawableId,
        kind: DrawableKind,
        styles: StyleMap,
        parent: Option<DrawableId>,
    ) -> Self {
        Event::new(
            EventName::Create,
            id,
            EventData::Create {
                kind,
                styles,
                parent,
            },
        )
    }

    /// `prop_change` event carrying the changed styles of one drawable.
    pub fn prop_change(id: DrawableId, changes: StyleMap) -> Self {
        Event::new(EventName::PropChange, id, EventData::StyleChanges(changes))
    }

    /// `parent` event announcing a reparent (or detach) of one drawable.
    pub fn parent_change(id: DrawableId, parent: Option<DrawableId>) -> Self {
        Event::new(EventName::Parent, id, EventData::NewParent(parent))
    }

    /// `destroy` event ending one drawable's life.
    pub fn destroy(id: DrawableId) -> Self {
        Event::new(EventName::Destroy, id, EventData::None)
    }

    /// `click` on one drawable.
    pub fn click(id: DrawableId) -> Self {
        Event::new(EventName::Click, id, EventData::None)
    }

    /// `hover` entering one drawable.
    pub fn hover(id: DrawableId) -> Self {
        Event::new(EventName::Hover, id, EventData::None)
    }

    /// `leave` exiting one drawable.
    pub fn leave(id: DrawableId) -> Self {
        Event::new(EventName::Leave, id, EventData::None)
    }

    /// `change` carrying new display-side text of one drawable.
    pub fn change(id: DrawableId, text: impl Into<String>) -> Self {
        Event::new(EventName::Change, id, EventData::Text(text.into()))
    }

    /// `motion` at coordinates within one drawable.
    pub fn motion(id: DrawableId, x: f64, y: f64) -> Self {
        Event::new(EventName::Motion, id, EventData::Position { x, y })
    }

    /// Target id, if this event is addressed to a drawable.
    pub fn target_drawable(&self) -> Option<DrawableId> {
        match self.target {
            Target::Drawable(id) => Some(id),
            Target::None => None,
        }
    }

    /// Changed styles, if this is a `prop_change` payload.
    pub fn style_changes(&self) -> Option<&StyleMap> {
        match &self.data {
            EventData::StyleChanges(changes) => Some(changes),
            _ => None,
        }
    }

    /// Text payload, if any.
    pub fn text(&self) -> Option<&str> {
        match &self.data {
            EventData::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Pointer coordinates, if any.
    pub fn position(&self) -> Option<(f64, f64)> {
        match self.data {
            EventData::Position { x, y } => Some((x, y)),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
