/// Parameter Module
///
/// Typed parameter values, their single-character type codes, and the
/// sanitization applied to every value before it is bound.

use crate::core::{Result, SafeConnError};
use std::fmt;
use std::str::FromStr;

/// A value passed to `SafeConnection::set` or `SafeConnection::query`.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Bool(bool),
    Null,
}

impl Param {
    /// Type code deduced from the variant. Anything that is not an integer,
    /// float or text falls back to `Blob`.
    pub fn type_code(&self) -> TypeCode {
        match self {
            Param::Int(_) => TypeCode::Integer,
            Param::Float(_) => TypeCode::Double,
            Param::Text(_) => TypeCode::String,
            Param::Blob(_) | Param::Bool(_) | Param::Null => TypeCode::Blob,
        }
    }

    /// Plain string form of the value, before any escaping.
    pub fn to_plain_string(&self) -> String {
        match self {
            Param::Int(i) => i.to_string(),
            Param::Float(f) => f.to_string(),
            Param::Text(s) => s.clone(),
            Param::Blob(b) => String::from_utf8_lossy(b).into_owned(),
            Param::Bool(true) => "1".to_string(),
            Param::Bool(false) | Param::Null => String::new(),
        }
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Param::Int(i64::from(value))
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Float(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<Vec<u8>> for Param {
    fn from(value: Vec<u8>) -> Self {
        Param::Blob(value)
    }
}

impl From<&[u8]> for Param {
    fn from(value: &[u8]) -> Self {
        Param::Blob(value.to_vec())
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Param::Null, Into::into)
    }
}

/// Scalar type of one bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    /// `i`
    Integer,
    /// `d`
    Double,
    /// `s`
    String,
    /// `b`
    Blob,
}

impl TypeCode {
    pub fn as_char(self) -> char {
        match self {
            TypeCode::Integer => 'i',
            TypeCode::Double => 'd',
            TypeCode::String => 's',
            TypeCode::Blob => 'b',
        }
    }
}

impl TryFrom<char> for TypeCode {
    type Error = SafeConnError;

    fn try_from(c: char) -> Result<Self> {
        match c {
            'i' => Ok(TypeCode::Integer),
            'd' => Ok(TypeCode::Double),
            's' => Ok(TypeCode::String),
            'b' => Ok(TypeCode::Blob),
            other => Err(SafeConnError::InvalidTypeSignature(other)),
        }
    }
}

/// Ordered type codes for the parameters of one statement, written as a
/// compact string such as `"isd"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSignature(Vec<TypeCode>);

impl TypeSignature {
    pub fn new(codes: Vec<TypeCode>) -> Self {
        TypeSignature(codes)
    }

    pub fn codes(&self) -> &[TypeCode] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for TypeSignature {
    type Err = SafeConnError;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .map(TypeCode::try_from)
            .collect::<Result<Vec<_>>>()
            .map(TypeSignature)
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for code in &self.0 {
            write!(f, "{}", code.as_char())?;
        }
        Ok(())
    }
}

/// Deduces a type signature from the runtime variant of each parameter.
pub fn deduce_signature(params: &[Param]) -> TypeSignature {
    TypeSignature(params.iter().map(Param::type_code).collect())
}

/// HTML-entity escapes the string form of a parameter.
///
/// Escapes `&`, `<`, `>`, `"` and `'`. Invalid UTF-8 in blobs is replaced
/// with U+FFFD. Applied to every parameter regardless of its type code.
// TODO: decide whether numeric and blob parameters should skip escaping.
pub fn sanitize(param: &Param) -> String {
    escape_html(&param.to_plain_string())
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
