use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Bool,
    Int,
    Float,
    Text,
    /// Text restricted to one of the listed values.
    Choice(&'static [&'static str]),
}

impl PropertyType {
    /// Coerces a string-encoded value into the declared type.
    ///
    /// On failure returns a short description of what was expected, suitable
    /// for embedding in an error message.
    pub fn coerce(&self, raw: &str) -> Result<PropertyValue, String> {
        match self {
            PropertyType::Bool => match raw.trim() {
                "true" => Ok(PropertyValue::Bool(true)),
                "false" => Ok(PropertyValue::Bool(false)),
                _ => Err("bool (true|false)".to_string()),
            },
            PropertyType::Int => raw
                .trim()
                .parse::<i64>()
                .map(PropertyValue::Int)
                .map_err(|_| "integer".to_string()),
            PropertyType::Float => {
                let parsed = raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| "number".to_string())?;
                if !parsed.is_finite() {
                    return Err("finite number".to_string());
                }
                Ok(PropertyValue::Float(parsed))
            }
            PropertyType::Text => Ok(PropertyValue::Text(raw.to_string())),
            PropertyType::Choice(allowed) => {
                if allowed.iter().any(|candidate| *candidate == raw) {
                    Ok(PropertyValue::Text(raw.to_string()))
                } else {
                    Err(format!("one of {}", allowed.join("|")))
                }
            }
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Bool => f.write_str("bool"),
            PropertyType::Int => f.write_str("int"),
            PropertyType::Float => f.write_str("float"),
            PropertyType::Text => f.write_str("text"),
            PropertyType::Choice(allowed) => write!(f, "{}", allowed.join("|")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Integers widen to floats so authored `"time": 2` still reads as 2.0.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(value) => Some(*value),
            PropertyValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            PropertyValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Bool(value) => Value::Bool(*value),
            PropertyValue::Int(value) => Value::from(*value),
            PropertyValue::Float(value) => Value::from(*value),
            PropertyValue::Text(value) => Value::String(value.clone()),
        }
    }
}

/// A declared, configurable property of an action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub ty: PropertyType,
}

impl PropertyDescriptor {
    pub const fn new(name: &'static str, ty: PropertyType) -> Self {
        Self { name, ty }
    }
}
