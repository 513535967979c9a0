//! Style Schema - Per-kind tables of permitted styles and events
//!
//! Every drawable kind declares, up front, the styles it accepts and the
//! events it emits. Anything outside the declared set is a hard error at
//! the call site; there is no dynamic fall-through. Validators check each
//! incoming value and may coerce it into canonical form (RGB lists become
//! hex strings, numbers become text where text is expected).
//!
//! Two style groups are feature-gated: raw HTML pass-through and rotation
//! transforms. A gated style behaves as if absent from the schema unless
//! the session enabled its feature, and using it explicitly without the
//! feature is its own error so the caller learns which switch to flip.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::event::EventName;
use crate::types::{StyleMap, StyleValue};

use super::DrawableKind;

// =============================================================================
// Features
// =============================================================================

bitflags! {
    /// Optional capabilities a session opts into at construction.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Features: u32 {
        /// Raw HTML pass-through styles (`html_class`, `html_id`).
        const HTML = 1 << 0;
        /// Rotation transforms (the `rotate` style and draw command).
        const TRANSFORMS = 1 << 1;
    }
}

// =============================================================================
// Validators
// =============================================================================

/// Checks one candidate value, returning the canonical value to store or a
/// human-readable reason for rejection.
pub type Validator = fn(StyleValue) -> std::result::Result<StyleValue, String>;

/// Accepts every value unchanged.
pub fn any(value: StyleValue) -> std::result::Result<StyleValue, String> {
    Ok(value)
}

/// Accepts booleans only.
pub fn boolean(value: StyleValue) -> std::result::Result<StyleValue, String> {
    match value {
        StyleValue::Bool(_) => Ok(value),
        other => Err(format!("expected a boolean, got {}", other.type_name())),
    }
}

/// Accepts any finite numeric value (offsets may be negative) or `Nil` to
/// unset. NaN and infinities are refused.
pub fn dimension(value: StyleValue) -> std::result::Result<StyleValue, String> {
    match value {
        StyleValue::Int(_) | StyleValue::Nil => Ok(value),
        StyleValue::Float(f) if f.is_finite() => Ok(StyleValue::Float(f)),
        StyleValue::Float(_) => Err("expected a finite number".to_string()),
        other => Err(format!("expected a number, got {}", other.type_name())),
    }
}

/// Accepts finite numeric values `>= 0`, or `Nil` to unset.
pub fn non_negative(value: StyleValue) -> std::result::Result<StyleValue, String> {
    match value {
        StyleValue::Int(i) if i >= 0 => Ok(StyleValue::Int(i)),
        StyleValue::Float(f) if f.is_finite() && f >= 0.0 => Ok(StyleValue::Float(f)),
        StyleValue::Int(_) | StyleValue::Float(_) => {
            Err("expected a finite non-negative number".to_string())
        }
        StyleValue::Nil => Ok(StyleValue::Nil),
        other => Err(format!("expected a number, got {}", other.type_name())),
    }
}

/// Accepts text; numbers coerce to their decimal form.
pub fn text(value: StyleValue) -> std::result::Result<StyleValue, String> {
    match value {
        StyleValue::Text(_) => Ok(value),
        StyleValue::Int(i) => Ok(StyleValue::Text(i.to_string())),
        StyleValue::Float(f) => Ok(StyleValue::Text(f.to_string())),
        other => Err(format!("expected text, got {}", other.type_name())),
    }
}

/// Accepts colors in three forms and canonicalizes to one:
///
/// - hex text (`"#rgb"`, `"#rrggbb"`, `"#rrggbbaa"`) passes through
/// - a named color (alphabetic text) passes through for the display side
///   to resolve
/// - an RGB(A) list of integers 0-255 coerces to hex text
///
/// `Nil` passes through and means "no color".
pub fn color(value: StyleValue) -> std::result::Result<StyleValue, String> {
    match value {
        StyleValue::Nil => Ok(StyleValue::Nil),
        StyleValue::Text(s) => {
            if let Some(digits) = s.strip_prefix('#') {
                let hex_ok = matches!(digits.len(), 3 | 4 | 6 | 8)
                    && digits.chars().all(|c| c.is_ascii_hexdigit());
                if hex_ok {
                    Ok(StyleValue::Text(s))
                } else {
                    Err(format!("malformed hex color {s:?}"))
                }
            } else if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()) {
                Ok(StyleValue::Text(s))
            } else {
                Err(format!("unrecognized color {s:?}"))
            }
        }
        StyleValue::List(items) => {
            if items.len() != 3 && items.len() != 4 {
                return Err("color lists take 3 or 4 channels".to_string());
            }
            let mut channels = Vec::with_capacity(items.len());
            for item in &items {
                match item.as_int() {
                    Some(i) if (0..=255).contains(&i) => channels.push(i as u8),
                    _ => return Err("color channels are integers 0-255".to_string()),
                }
            }
            let mut hex = String::with_capacity(1 + channels.len() * 2);
            hex.push('#');
            for channel in channels {
                hex.push_str(&format!("{channel:02x}"));
            }
            Ok(StyleValue::Text(hex))
        }
        other => Err(format!("expected a color, got {}", other.type_name())),
    }
}

/// Accepts `"left"`, `"center"` or `"right"`.
pub fn align(value: StyleValue) -> std::result::Result<StyleValue, String> {
    match value.as_str() {
        Some("left") | Some("center") | Some("right") => Ok(value),
        Some(other) => Err(format!("unknown alignment {other:?}")),
        None => Err(format!("expected text, got {}", value.type_name())),
    }
}

/// Accepts a finite numeric angle and normalizes it into `[0, 360)`
/// degrees.
pub fn degrees(value: StyleValue) -> std::result::Result<StyleValue, String> {
    match value.as_float() {
        Some(f) if f.is_finite() => Ok(StyleValue::Float(f.rem_euclid(360.0))),
        Some(_) => Err("expected a finite number of degrees".to_string()),
        None => Err(format!("expected a number, got {}", value.type_name())),
    }
}

// =============================================================================
// Specs and Tables
// =============================================================================

/// Const-constructible default so specs can live in static tables.
#[derive(Clone, Copy, Debug)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(&'static str),
}

impl DefaultValue {
    fn to_value(self) -> StyleValue {
        match self {
            DefaultValue::Bool(b) => StyleValue::Bool(b),
            DefaultValue::Int(i) => StyleValue::Int(i),
            DefaultValue::Float(f) => StyleValue::Float(f),
            DefaultValue::Text(s) => StyleValue::Text(s.to_string()),
        }
    }
}

/// One permitted style of one kind.
#[derive(Clone, Copy, Debug)]
pub struct StyleSpec {
    pub name: &'static str,
    pub validator: Validator,
    pub default: Option<DefaultValue>,
    pub feature: Option<Features>,
}

const fn spec(name: &'static str, validator: Validator) -> StyleSpec {
    StyleSpec {
        name,
        validator,
        default: None,
        feature: None,
    }
}

const fn spec_with_default(
    name: &'static str,
    validator: Validator,
    default: DefaultValue,
) -> StyleSpec {
    StyleSpec {
        name,
        validator,
        default: Some(default),
        feature: None,
    }
}

const fn gated_spec(name: &'static str, validator: Validator, feature: Features) -> StyleSpec {
    StyleSpec {
        name,
        validator,
        default: None,
        feature: Some(feature),
    }
}

/// Styles every kind accepts.
const BASE_STYLES: &[StyleSpec] = &[
    spec_with_default("hidden", boolean, DefaultValue::Bool(false)),
    spec("width", non_negative),
    spec("height", non_negative),
    spec("top", dimension),
    spec("left", dimension),
    spec("tooltip", text),
    gated_spec("html_class", text, Features::HTML),
    gated_spec("html_id", text, Features::HTML),
];

const ROOT_STYLES: &[StyleSpec] = &[
    spec_with_default("title", text, DefaultValue::Text("vetrina")),
    spec_with_default("resizable", boolean, DefaultValue::Bool(true)),
];

const SLOT_STYLES: &[StyleSpec] = &[
    spec("margin", non_negative),
    spec("padding", non_negative),
    spec_with_default("scroll", boolean, DefaultValue::Bool(false)),
];

const BUTTON_STYLES: &[StyleSpec] = &[
    spec_with_default("text", text, DefaultValue::Text("")),
    spec("font_size", non_negative),
    spec("stroke", color),
];

const PARA_STYLES: &[StyleSpec] = &[
    spec_with_default("text", text, DefaultValue::Text("")),
    spec_with_default("size", non_negative, DefaultValue::Int(12)),
    spec_with_default("align", align, DefaultValue::Text("left")),
    spec("stroke", color),
];

const EDIT_LINE_STYLES: &[StyleSpec] = &[
    spec_with_default("text", text, DefaultValue::Text("")),
    spec_with_default("secret", boolean, DefaultValue::Bool(false)),
];

const RECT_STYLES: &[StyleSpec] = &[
    spec("fill", color),
    spec("stroke", color),
    spec_with_default("curve", non_negative, DefaultValue::Int(0)),
    gated_spec("rotate", degrees, Features::TRANSFORMS),
];

fn kind_specs(kind: &DrawableKind) -> &'static [StyleSpec] {
    match kind {
        DrawableKind::Root => ROOT_STYLES,
        DrawableKind::Stack | DrawableKind::Flow => SLOT_STYLES,
        DrawableKind::Button => BUTTON_STYLES,
        DrawableKind::Para => PARA_STYLES,
        DrawableKind::EditLine => EDIT_LINE_STYLES,
        DrawableKind::Rect => RECT_STYLES,
        DrawableKind::Widget(_) => &[],
    }
}

// =============================================================================
// Permitted Events
// =============================================================================

/// UI events every kind emits.
const BASE_EVENTS: &[EventName] = &[EventName::Hover, EventName::Leave, EventName::Motion];

const CLICKABLE_EVENTS: &[EventName] = &[EventName::Click];
const EDITABLE_EVENTS: &[EventName] = &[EventName::Change];

fn kind_event_extras(kind: &DrawableKind) -> &[EventName] {
    match kind {
        DrawableKind::Root | DrawableKind::Para => &[],
        DrawableKind::Stack | DrawableKind::Flow | DrawableKind::Button | DrawableKind::Rect => {
            CLICKABLE_EVENTS
        }
        DrawableKind::EditLine => EDITABLE_EVENTS,
        DrawableKind::Widget(def) => def.events(),
    }
}

/// True if `kind` drawables ever emit `event`.
pub fn event_permitted(kind: &DrawableKind, event: EventName) -> bool {
    BASE_EVENTS.contains(&event) || kind_event_extras(kind).contains(&event)
}

/// Every UI event `kind` drawables can emit.
pub fn permitted_events(kind: &DrawableKind) -> Vec<EventName> {
    let mut events = BASE_EVENTS.to_vec();
    events.extend_from_slice(kind_event_extras(kind));
    events
}

// =============================================================================
// Custom Widgets
// =============================================================================

/// Declaration of a custom drawable kind: its name, whether it holds
/// children, its extra styles and its extra events. Base styles and events
/// apply on top, exactly as for built-in kinds.
///
/// Built with a small chain:
///
/// ```
/// use vetrina::drawable::schema::{self, WidgetDef};
/// use vetrina::event::EventName;
///
/// let gauge = WidgetDef::new("gauge")
///     .style_with_default("level", schema::non_negative, 0)
///     .style("label", schema::text)
///     .event(EventName::Click);
/// assert_eq!(gauge.name(), "gauge");
/// ```
#[derive(Debug)]
pub struct WidgetDef {
    name: String,
    container: bool,
    styles: Vec<WidgetStyle>,
    events: Vec<EventName>,
}

/// One extra style of a custom widget kind.
#[derive(Clone, Debug)]
pub struct WidgetStyle {
    name: String,
    validator: Validator,
    default: Option<StyleValue>,
}

impl WidgetDef {
    /// Starts a declaration for the kind called `name`. Leaf by default.
    pub fn new(name: impl Into<String>) -> Self {
        WidgetDef {
            name: name.into(),
            container: false,
            styles: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Marks the kind as a container; instances gain the slot operations.
    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }

    /// Adds a style with no default.
    pub fn style(mut self, name: impl Into<String>, validator: Validator) -> Self {
        self.styles.push(WidgetStyle {
            name: name.into(),
            validator,
            default: None,
        });
        self
    }

    /// Adds a style with a type default. The default is stored as given,
    /// not passed through the validator, so declare canonical values.
    pub fn style_with_default(
        mut self,
        name: impl Into<String>,
        validator: Validator,
        default: impl Into<StyleValue>,
    ) -> Self {
        self.styles.push(WidgetStyle {
            name: name.into(),
            validator,
            default: Some(default.into()),
        });
        self
    }

    /// Permits an extra UI event on the kind.
    pub fn event(mut self, event: EventName) -> Self {
        self.events.push(event);
        self
    }

    /// The kind name instances report.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if instances hold children.
    pub fn is_container(&self) -> bool {
        self.container
    }

    fn find_style(&self, name: &str) -> Option<&WidgetStyle> {
        self.styles.iter().find(|style| style.name == name)
    }

    fn events(&self) -> &[EventName] {
        &self.events
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// A style spec resolved against one kind.
pub(crate) struct ResolvedStyle {
    pub validator: Validator,
    pub feature: Option<Features>,
}

/// Finds `name` in `kind`'s schema: widget styles shadow kind styles,
/// kind styles shadow base styles.
pub(crate) fn find_style(kind: &DrawableKind, name: &str) -> Option<ResolvedStyle> {
    if let DrawableKind::Widget(def) = kind {
        if let Some(style) = def.find_style(name) {
            return Some(ResolvedStyle {
                validator: style.validator,
                feature: None,
            });
        }
    }
    kind_specs(kind)
        .iter()
        .chain(BASE_STYLES.iter())
        .find(|spec| spec.name == name)
        .map(|spec| ResolvedStyle {
            validator: spec.validator,
            feature: spec.feature,
        })
}

/// Type defaults for `kind`, skipping styles gated behind features the
/// session did not enable. Base styles come first, then kind styles, then
/// widget styles.
pub(crate) fn default_styles(kind: &DrawableKind, features: Features) -> StyleMap {
    let mut out = StyleMap::new();
    for spec in BASE_STYLES.iter().chain(kind_specs(kind).iter()) {
        if let Some(gate) = spec.feature {
            if !features.contains(gate) {
                continue;
            }
        }
        if let Some(default) = spec.default {
            out.insert(spec.name.to_string(), default.to_value());
        }
    }
    if let DrawableKind::Widget(def) = kind {
        for style in &def.styles {
            if let Some(default) = &style.default {
                out.insert(style.name.clone(), default.clone());
            }
        }
    }
    out
}

/// Checks one explicit style assignment against `kind`'s schema.
///
/// # Returns
/// The canonical value to store, or the precise refusal: `NoSuchStyle`
/// for names outside the schema, `UnsupportedFeature` for gated styles,
/// `InvalidStyleValue` for validator rejections.
pub(crate) fn validate_style(
    kind: &DrawableKind,
    features: Features,
    name: &str,
    value: StyleValue,
) -> Result<StyleValue> {
    let Some(resolved) = find_style(kind, name) else {
        return Err(Error::NoSuchStyle {
            kind: kind.name().to_string(),
            style: name.to_string(),
        });
    };
    if let Some(gate) = resolved.feature {
        if !features.contains(gate) {
            return Err(Error::UnsupportedFeature {
                style: name.to_string(),
                feature: gate,
            });
        }
    }
    (resolved.validator)(value).map_err(|reason| Error::InvalidStyleValue {
        style: name.to_string(),
        reason,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_styles_stack_on_base_styles() {
        let button = DrawableKind::Button;
        assert!(find_style(&button, "text").is_some());
        assert!(find_style(&button, "hidden").is_some());
        assert!(find_style(&button, "gravity").is_none());
    }

    #[test]
    fn test_unknown_style_is_rejected_by_name() {
        let err = validate_style(
            &DrawableKind::Button,
            Features::empty(),
            "gravity",
            StyleValue::Int(1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoSuchStyle { .. }));
    }

    #[test]
    fn test_gated_style_needs_its_feature() {
        let err = validate_style(
            &DrawableKind::Button,
            Features::empty(),
            "html_class",
            StyleValue::from("wide"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedFeature { feature, .. } if feature == Features::HTML
        ));

        let ok = validate_style(
            &DrawableKind::Button,
            Features::HTML,
            "html_class",
            StyleValue::from("wide"),
        )
        .unwrap();
        assert_eq!(ok, StyleValue::from("wide"));
    }

    #[test]
    fn test_color_list_coerces_to_hex() {
        let rgb = StyleValue::List(vec![
            StyleValue::Int(255),
            StyleValue::Int(0),
            StyleValue::Int(128),
        ]);
        assert_eq!(color(rgb).unwrap(), StyleValue::from("#ff0080"));

        let rgba = StyleValue::List(vec![
            StyleValue::Int(0),
            StyleValue::Int(0),
            StyleValue::Int(0),
            StyleValue::Int(64),
        ]);
        assert_eq!(color(rgba).unwrap(), StyleValue::from("#00000040"));
    }

    #[test]
    fn test_color_rejects_malformed_values() {
        assert!(color(StyleValue::from("#12345")).is_err());
        assert!(color(StyleValue::from("#gggggg")).is_err());
        assert!(color(StyleValue::from("")).is_err());
        assert!(color(StyleValue::List(vec![StyleValue::Int(300)])).is_err());
        assert!(color(StyleValue::Bool(true)).is_err());

        // Named colors and Nil pass through.
        assert_eq!(color(StyleValue::from("red")).unwrap(), StyleValue::from("red"));
        assert_eq!(color(StyleValue::Nil).unwrap(), StyleValue::Nil);
    }

    #[test]
    fn test_degrees_normalize_into_one_turn() {
        assert_eq!(degrees(StyleValue::Int(370)).unwrap(), StyleValue::Float(10.0));
        assert_eq!(degrees(StyleValue::Int(-90)).unwrap(), StyleValue::Float(270.0));
        assert_eq!(degrees(StyleValue::Float(360.0)).unwrap(), StyleValue::Float(0.0));
    }

    #[test]
    fn test_text_coerces_numbers() {
        assert_eq!(text(StyleValue::Int(12)).unwrap(), StyleValue::from("12"));
        assert!(text(StyleValue::Bool(true)).is_err());
    }

    #[test]
    fn test_non_negative_rejects_below_zero() {
        assert!(non_negative(StyleValue::Int(-1)).is_err());
        assert!(non_negative(StyleValue::Float(-0.5)).is_err());
        assert_eq!(
            non_negative(StyleValue::Int(0)).unwrap(),
            StyleValue::Int(0)
        );
    }

    #[test]
    fn test_numeric_validators_reject_non_finite_floats() {
        assert!(dimension(StyleValue::Float(f64::NAN)).is_err());
        assert!(dimension(StyleValue::Float(f64::INFINITY)).is_err());
        assert!(degrees(StyleValue::Float(f64::NAN)).is_err());
        assert!(degrees(StyleValue::Float(f64::NEG_INFINITY)).is_err());
        assert!(non_negative(StyleValue::Float(f64::NAN)).is_err());
        assert!(non_negative(StyleValue::Float(f64::INFINITY)).is_err());

        // Ordinary negatives are still fine where offsets allow them.
        assert_eq!(
            dimension(StyleValue::Float(-2.5)).unwrap(),
            StyleValue::Float(-2.5)
        );
    }

    #[test]
    fn test_defaults_respect_feature_gates() {
        let defaults = default_styles(&DrawableKind::Para, Features::empty());
        assert_eq!(defaults.get("hidden"), Some(&StyleValue::Bool(false)));
        assert_eq!(defaults.get("size"), Some(&StyleValue::Int(12)));
        assert_eq!(defaults.get("align"), Some(&StyleValue::from("left")));
        assert_eq!(defaults.get("html_class"), None);
    }

    #[test]
    fn test_widget_styles_shadow_and_extend() {
        let def = std::rc::Rc::new(
            WidgetDef::new("gauge")
                .style_with_default("level", non_negative, 0)
                .style("tooltip", any)
                .event(EventName::Click),
        );
        let kind = DrawableKind::Widget(def);

        assert!(find_style(&kind, "level").is_some());
        assert!(find_style(&kind, "hidden").is_some());

        // The widget's own "tooltip" wins over the base spec: `any` admits
        // a boolean the base text validator would refuse.
        let ok = validate_style(&kind, Features::empty(), "tooltip", StyleValue::Bool(true));
        assert!(ok.is_ok());

        assert!(event_permitted(&kind, EventName::Click));
        assert!(event_permitted(&kind, EventName::Hover));
        assert!(!event_permitted(&kind, EventName::Change));
    }

    #[test]
    fn test_permitted_events_per_kind() {
        assert!(event_permitted(&DrawableKind::Button, EventName::Click));
        assert!(!event_permitted(&DrawableKind::Para, EventName::Click));
        assert!(event_permitted(&DrawableKind::EditLine, EventName::Change));
        assert!(!event_permitted(&DrawableKind::Button, EventName::Change));
        assert!(event_permitted(&DrawableKind::Root, EventName::Motion));

        let events = permitted_events(&DrawableKind::EditLine);
        assert_eq!(
            events,
            vec![
                EventName::Hover,
                EventName::Leave,
                EventName::Motion,
                EventName::Change,
            ]
        );
    }
}
