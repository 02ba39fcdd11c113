use std::fmt;

use half::f16;

/// Attribute or metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Int64(i64),
    Half(f16),
    Float(f32),
    Double(f64),
    String(String),
    Token(String),
    AssetPath(String),

    Vec2f([f32; 2]),
    Vec3f([f32; 3]),
    Vec4f([f32; 4]),
    Vec2d([f64; 2]),
    Vec3d([f64; 3]),
    Vec4d([f64; 4]),

    BoolVec(Vec<bool>),
    IntVec(Vec<i32>),
    FloatVec(Vec<f32>),
    DoubleVec(Vec<f64>),
    StringVec(Vec<String>),
    TokenVec(Vec<String>),
}

impl Value {
    pub fn try_as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Half(v) => Some(f64::from(*v)),
            Value::Int(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn try_as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn try_as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn try_as_string_ref(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn try_as_token_ref(&self) -> Option<&str> {
        match self {
            Value::Token(s) => Some(s),
            _ => None,
        }
    }

    /// Linear interpolation between two samples of the same floating point type.
    ///
    /// Returns `None` for types that only support held interpolation.
    pub fn lerp(&self, other: &Value, alpha: f64) -> Option<Value> {
        match (self, other) {
            (Value::Double(a), Value::Double(b)) => Some(Value::Double(a + (b - a) * alpha)),
            (Value::Float(a), Value::Float(b)) => {
                let (a, b) = (f64::from(*a), f64::from(*b));
                Some(Value::Float((a + (b - a) * alpha) as f32))
            }
            _ => None,
        }
    }

    /// Canonical usda type name for values created without an explicit type.
    pub fn default_type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Int64(_) => "int64",
            Value::Half(_) => "half",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Token(_) => "token",
            Value::AssetPath(_) => "asset",
            Value::Vec2f(_) => "float2",
            Value::Vec3f(_) => "float3",
            Value::Vec4f(_) => "float4",
            Value::Vec2d(_) => "double2",
            Value::Vec3d(_) => "double3",
            Value::Vec4d(_) => "double4",
            Value::BoolVec(_) => "bool[]",
            Value::IntVec(_) => "int[]",
            Value::FloatVec(_) => "float[]",
            Value::DoubleVec(_) => "double[]",
            Value::StringVec(_) => "string[]",
            Value::TokenVec(_) => "token[]",
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

/// Escape a string for a double-quoted usda literal.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn write_seq<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    open: char,
    close: char,
    items: impl IntoIterator<Item = T>,
) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "{close}")
}

/// Formats a floating point number so it always reads back as a float.
struct Real(f64);

impl fmt::Display for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_infinite() {
            return f.write_str(if self.0 > 0.0 { "inf" } else { "-inf" });
        }
        if self.0.is_nan() {
            return f.write_str("nan");
        }
        write!(f, "{}", self.0)
    }
}

/// usda literal form of the value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            Value::Int(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Half(v) => write!(f, "{}", Real(f64::from(*v))),
            Value::Float(v) => write!(f, "{}", Real(f64::from(*v))),
            Value::Double(v) => write!(f, "{}", Real(*v)),
            Value::String(s) | Value::Token(s) => f.write_str(&quote(s)),
            Value::AssetPath(s) => write!(f, "@{s}@"),
            Value::Vec2f(v) => write_seq(f, '(', ')', v.iter().map(|x| Real(f64::from(*x)))),
            Value::Vec3f(v) => write_seq(f, '(', ')', v.iter().map(|x| Real(f64::from(*x)))),
            Value::Vec4f(v) => write_seq(f, '(', ')', v.iter().map(|x| Real(f64::from(*x)))),
            Value::Vec2d(v) => write_seq(f, '(', ')', v.iter().map(|x| Real(*x))),
            Value::Vec3d(v) => write_seq(f, '(', ')', v.iter().map(|x| Real(*x))),
            Value::Vec4d(v) => write_seq(f, '(', ')', v.iter().map(|x| Real(*x))),
            Value::BoolVec(v) => write_seq(f, '[', ']', v.iter().map(|b| if *b { "true" } else { "false" })),
            Value::IntVec(v) => write_seq(f, '[', ']', v.iter()),
            Value::FloatVec(v) => write_seq(f, '[', ']', v.iter().map(|x| Real(f64::from(*x)))),
            Value::DoubleVec(v) => write_seq(f, '[', ']', v.iter().map(|x| Real(*x))),
            Value::StringVec(v) | Value::TokenVec(v) => write_seq(f, '[', ']', v.iter().map(|s| quote(s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_floats_only() {
        let a = Value::Double(1.0);
        let b = Value::Double(3.0);
        assert_eq!(a.lerp(&b, 0.5), Some(Value::Double(2.0)));
        assert_eq!(Value::Int(1).lerp(&Value::Int(3), 0.5), None);
        assert_eq!(a.lerp(&Value::Float(2.0), 0.5), None);
    }

    #[test]
    fn display_literals() {
        assert_eq!(Value::Double(1.234).to_string(), "1.234");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::String("a \"b\"".into()).to_string(), r#""a \"b\"""#);
        assert_eq!(Value::Vec3d([1.0, 2.5, -3.0]).to_string(), "(1, 2.5, -3)");
        assert_eq!(Value::TokenVec(vec!["x".into(), "y".into()]).to_string(), r#"["x", "y"]"#);
        assert_eq!(Value::AssetPath("./a.usda".into()).to_string(), "@./a.usda@");
    }
}
