//! Typed values exchanged with the engine.

use std::fmt;

/// The semantic type of a watched property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Boolean (the engine's "flag" format).
    Flag,
    /// 64-bit signed integer.
    Int,
    /// Double precision float.
    Double,
    /// UTF-8 string.
    String,
}

impl PropertyKind {
    /// Human-readable name, used in error messages and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Int => "int64",
            Self::Double => "double",
            Self::String => "string",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed value: property contents, or one argument of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Flag(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl PropertyValue {
    /// The kind of this value.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Flag(_) => PropertyKind::Flag,
            Self::Int(_) => PropertyKind::Int,
            Self::Double(_) => PropertyKind::Double,
            Self::String(_) => PropertyKind::String,
        }
    }

    /// Value as a bool, if it is a flag.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(v) => Some(*v),
            _ => None,
        }
    }

    /// Value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Value as a double. Integers widen.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Render the value the way the engine's option parser expects it.
    pub fn to_option_string(&self) -> String {
        match self {
            Self::Flag(true) => "yes".to_string(),
            Self::Flag(false) => "no".to_string(),
            Self::Int(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::String(v) => v.clone(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_option_string())
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Rust types that a watched property can be decoded into.
///
/// Decoding is strict: the value's kind must equal [`WatchedType::KIND`].
pub trait WatchedType: Clone + PartialEq + Default + Send + Sync + 'static {
    /// The engine format this type is observed with.
    const KIND: PropertyKind;

    /// Decode a value of exactly [`Self::KIND`].
    fn decode(value: &PropertyValue) -> Option<Self>;
}

impl WatchedType for bool {
    const KIND: PropertyKind = PropertyKind::Flag;

    fn decode(value: &PropertyValue) -> Option<Self> {
        value.as_flag()
    }
}

impl WatchedType for i64 {
    const KIND: PropertyKind = PropertyKind::Int;

    fn decode(value: &PropertyValue) -> Option<Self> {
        value.as_int()
    }
}

impl WatchedType for f64 {
    const KIND: PropertyKind = PropertyKind::Double;

    fn decode(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl WatchedType for String {
    const KIND: PropertyKind = PropertyKind::String;

    fn decode(value: &PropertyValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}
