//! Parameter values.

use serde::{Deserialize, Serialize};

use crate::{NamelistError, NamelistResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "a string",
            Value::Int(_) => "an integer",
            Value::Float(_) => "a float",
            Value::Bool(_) => "a logical",
            Value::List(_) => "a list",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers widen to floats; namelists write `dt = 60` as often as `dt = 60.0`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// View a value as a sequence; a scalar is a sequence of one.
    pub fn as_slice(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            scalar => std::slice::from_ref(scalar),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// The value kinds a textual override may be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    List,
}

impl ValueKind {
    /// Convert `text` to a value of this kind. List items are comma
    /// separated and converted with `item_kind`.
    pub fn convert(self, text: &str, item_kind: ValueKind) -> NamelistResult<Value> {
        let fail = |kind: &'static str| NamelistError::Conversion {
            text: text.to_string(),
            kind,
        };
        let trimmed = text.trim();
        match self {
            ValueKind::String => Ok(Value::Str(text.to_string())),
            ValueKind::Integer => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| fail("integer")),
            ValueKind::Float => trimmed
                .replace(['d', 'D'], "e")
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| fail("float")),
            ValueKind::Boolean => parse_logical(trimmed)
                .map(Value::Bool)
                .ok_or_else(|| fail("boolean")),
            ValueKind::List => {
                if item_kind == ValueKind::List {
                    return Err(fail("list of lists"));
                }
                if trimmed.is_empty() {
                    return Ok(Value::List(Vec::new()));
                }
                trimmed
                    .split(',')
                    .map(|item| item_kind.convert(item.trim(), ValueKind::String))
                    .collect::<NamelistResult<Vec<_>>>()
                    .map(Value::List)
            }
        }
    }
}

/// Fortran logical literals plus the spellings people type on command lines.
pub fn parse_logical(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        ".true." | ".t." | "t" | "true" | "1" => Some(true),
        ".false." | ".f." | "f" | "false" | "0" => Some(false),
        _ => None,
    }
}
