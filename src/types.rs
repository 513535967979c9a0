//! Core Value Types - Style values and style dictionaries
//!
//! Styles travel through the toolkit as loosely typed values. The schema
//! layer narrows them per style name (validating and sometimes coercing),
//! and the display side receives them as finalized dictionaries keyed by
//! style name in insertion order.

use indexmap::IndexMap;

// =============================================================================
// Style Values
// =============================================================================

/// A single style value.
///
/// This is the closed set of shapes a style can take on either side of the
/// drawable tree. Validators may coerce between variants, e.g. an RGB list
/// into a hex color string, or a number into text.
#[derive(Clone, Debug, PartialEq)]
pub enum StyleValue {
    /// Explicit "no value". Distinct from an absent key: a style set to
    /// `Nil` still appears in the dictionary.
    Nil,
    /// Boolean flag (`hidden`, `resizable`, ...).
    Bool(bool),
    /// Integer quantity (pixel sizes, curve radii, ...).
    Int(i64),
    /// Floating-point quantity (rotation degrees, coordinates, ...).
    Float(f64),
    /// Text content or symbolic value (`"left"`, `"#ff0000"`, ...).
    Text(String),
    /// Ordered list of values (RGB color triples, ...).
    List(Vec<StyleValue>),
}

impl StyleValue {
    /// Returns the boolean payload, if this is a `Bool`.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StyleValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `Int`.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StyleValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a float for either numeric variant.
    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            StyleValue::Int(i) => Some(*i as f64),
            StyleValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the text payload, if this is `Text`.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StyleValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list payload, if this is a `List`.
    #[inline]
    pub fn as_list(&self) -> Option<&[StyleValue]> {
        match self {
            StyleValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// True for `Nil`.
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, StyleValue::Nil)
    }

    /// Name of the variant, for validator error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            StyleValue::Nil => "nil",
            StyleValue::Bool(_) => "boolean",
            StyleValue::Int(_) => "integer",
            StyleValue::Float(_) => "float",
            StyleValue::Text(_) => "text",
            StyleValue::List(_) => "list",
        }
    }
}

impl From<bool> for StyleValue {
    fn from(b: bool) -> Self {
        StyleValue::Bool(b)
    }
}

impl From<i64> for StyleValue {
    fn from(i: i64) -> Self {
        StyleValue::Int(i)
    }
}

impl From<i32> for StyleValue {
    fn from(i: i32) -> Self {
        StyleValue::Int(i as i64)
    }
}

impl From<u32> for StyleValue {
    fn from(i: u32) -> Self {
        StyleValue::Int(i as i64)
    }
}

impl From<f64> for StyleValue {
    fn from(f: f64) -> Self {
        StyleValue::Float(f)
    }
}

impl From<&str> for StyleValue {
    fn from(s: &str) -> Self {
        StyleValue::Text(s.to_string())
    }
}

impl From<String> for StyleValue {
    fn from(s: String) -> Self {
        StyleValue::Text(s)
    }
}

impl From<Vec<StyleValue>> for StyleValue {
    fn from(items: Vec<StyleValue>) -> Self {
        StyleValue::List(items)
    }
}

impl<T: Into<StyleValue>> From<Option<T>> for StyleValue {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => StyleValue::Nil,
        }
    }
}

// =============================================================================
// Style Maps
// =============================================================================

/// A style dictionary: style name to value, preserving insertion order.
///
/// Insertion order matters at the display boundary, where finalized style
/// dictionaries are handed to the render sink in the order the application
/// supplied them.
pub type StyleMap = IndexMap<String, StyleValue>;

/// Builds a [`StyleMap`] from `"name" => value` pairs.
///
/// Values go through [`StyleValue::from`], so plain literals work:
///
/// ```
/// use vetrina::styles;
///
/// let s = styles! { "width" => 200, "hidden" => false, "tooltip" => "hi" };
/// assert_eq!(s.len(), 3);
/// ```
#[macro_export]
macro_rules! styles {
    () => {
        $crate::StyleMap::new()
    };
    ( $( $name:expr => $value:expr ),+ $(,)? ) => {{
        let mut map = $crate::StyleMap::new();
        $(
            map.insert(
                ::std::string::String::from($name),
                $crate::StyleValue::from($value),
            );
        )+
        map
    }};
}

// =============================================================================
// Tests
// =============================================================================
