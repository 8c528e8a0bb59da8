use std::fmt;

use serde_json::Value;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::mysql::{MySql, MySqlTypeInfo, MySqlValueRef};
use sqlx::{Database, Decode, Encode, Type};
use synaptic_core::SynapticError;

/// An embedding vector as stored in a TiDB `VECTOR` column.
///
/// On the wire a vector travels as a literal such as `[0.1,0.25,-3]`. Values
/// read back from the database may arrive as that literal, as its UTF-8
/// bytes, or (through JSON) as an already decoded array of numbers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vector(Vec<f32>);

impl Vector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the bracketed, comma-separated literal, e.g. `[0.1,0.25,-3]`.
    pub fn to_literal(&self) -> String {
        to_literal(&self.0)
    }

    /// Parse a vector literal.
    ///
    /// `"[]"` is the empty vector. Otherwise the first and last characters
    /// are dropped and the remainder is split on commas.
    pub fn parse_literal(literal: &str) -> Result<Self, SynapticError> {
        if literal == "[]" {
            return Ok(Self::default());
        }

        let mut chars = literal.chars();
        chars.next();
        chars.next_back();
        let inner = chars.as_str();
        if inner.trim().is_empty() {
            return Ok(Self::default());
        }

        inner
            .split(',')
            .map(|part| {
                part.trim().parse::<f32>().map_err(|e| {
                    SynapticError::Decode(format!("invalid vector element '{part}': {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Decode a raw byte payload: UTF-8 first, then [`parse_literal`](Self::parse_literal).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SynapticError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| SynapticError::Decode(format!("vector is not valid UTF-8: {e}")))?;
        Self::parse_literal(text)
    }
}

/// Render a slice as a vector literal without taking ownership.
pub fn to_literal(values: &[f32]) -> String {
    let mut out = String::with_capacity(values.len() * 8 + 2);
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

impl From<Vec<f32>> for Vector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl From<Vector> for Vec<f32> {
    fn from(vector: Vector) -> Self {
        vector.0
    }
}

impl TryFrom<&Value> for Vector {
    type Error = SynapticError;

    /// Numeric arrays pass through, strings are parsed as literals, and any
    /// other JSON shape is rejected.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_f64().map(|f| f as f32).ok_or_else(|| {
                        SynapticError::Decode(format!("vector element is not a number: {item}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self),
            Value::String(s) => Self::parse_literal(s),
            _ => Err(SynapticError::Decode("unsupported input type".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// sqlx integration
// ---------------------------------------------------------------------------

impl Type<MySql> for Vector {
    fn type_info() -> MySqlTypeInfo {
        <str as Type<MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        <str as Type<MySql>>::compatible(ty) || <[u8] as Type<MySql>>::compatible(ty)
    }
}

impl<'q> Encode<'q, MySql> for Vector {
    fn encode_by_ref(
        &self,
        buf: &mut <MySql as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        <String as Encode<'q, MySql>>::encode_by_ref(&self.to_literal(), buf)
    }
}

impl<'r> Decode<'r, MySql> for Vector {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, BoxDynError> {
        let bytes = <&[u8] as Decode<'r, MySql>>::decode(value)?;
        Ok(Vector::from_bytes(bytes)?)
    }
}
