//! # vetrina
//!
//! Drawable-tree GUI core: a logical widget tree mirrored into a display
//! tree over an event bus.
//!
//! ## Architecture
//!
//! vetrina keeps two parallel object trees that share nothing but small
//! integer ids and a bus. The logical tree (what the application builds
//! and mutates) validates styles against explicit per-kind schemas and
//! announces every change; the display tree rebuilds itself purely from
//! that event stream and forwards each mutation to a render sink.
//!
//! ```text
//! App/Drawable tree → create / prop_change / parent / destroy → Display tree → RenderSink
//! App/Drawable tree ← click / hover / leave / motion / change ← DisplayService injection
//! ```
//!
//! Because the display side listens only to events, it can be swapped for
//! a null backend ([`display::NullSink`]) and the whole toolkit runs
//! headless with identical semantics.
//!
//! ## Modules
//!
//! - [`types`] - Style values and ordered style dictionaries
//! - [`registry`] - Linkable ids and the id-to-entry tables
//! - [`event`] - Event vocabulary, subscription filters, the dispatch bus
//! - [`drawable`] - The logical tree: kinds, schemas, slots, lifecycles
//! - [`app`] - The session: builder context, draw commands, custom widgets
//! - [`display`] - The mirror tree, the display service, render sinks
//! - [`error`] - What can fail and how it is reported

pub mod app;
pub mod display;
pub mod drawable;
pub mod error;
pub mod event;
pub mod registry;
pub mod types;

// Re-export the working surface
pub use types::{StyleMap, StyleValue};

pub use error::{Error, Result};

pub use registry::{DrawableId, LinkableRegistry};

pub use event::{
    Event, EventBus, EventData, EventName, MAX_DISPATCH_DEPTH, NameFilter, SubscriptionId, Target,
    TargetFilter,
};

pub use drawable::{Drawable, DrawableKind, Features, WeakDrawable, WidgetDef, schema};

pub use app::App;

pub use display::{
    DisplayDrawable, DisplayService, NullSink, RecordingSink, RenderSink, SinkOp,
    WeakDisplayDrawable,
};
