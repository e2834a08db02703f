// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use strum::{Display as StrumDisplay, EnumIter, FromRepr};

/// The storable column types.
#[repr(u8)]
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    FromRepr,
    EnumIter,
    StrumDisplay,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ValueType {
    Boolean = 0,
    TinyInt = 1,
    SmallInt = 2,
    Integer = 3,
    BigInt = 4,
    Double = 5,
    Timestamp = 6,
    Varchar = 7,
    Varbinary = 8,
}

impl ValueType {
    /// Bytes this type occupies inline in a tile slot. Variable-length types keep only a handle
    /// into the tile's pool inline.
    pub fn inline_width(&self) -> usize {
        match self {
            ValueType::Boolean | ValueType::TinyInt => 1,
            ValueType::SmallInt => 2,
            ValueType::Integer => 4,
            ValueType::BigInt | ValueType::Double | ValueType::Timestamp => 8,
            ValueType::Varchar | ValueType::Varbinary => 8,
        }
    }

    pub fn is_inlined(&self) -> bool {
        !matches!(self, ValueType::Varchar | ValueType::Varbinary)
    }
}

// Bit patterns reserved to mean NULL inside a tile.
pub const NULL_BOOLEAN: u8 = 2;
pub const NULL_TINYINT: i8 = i8::MIN;
pub const NULL_SMALLINT: i16 = i16::MIN;
pub const NULL_INTEGER: i32 = i32::MIN;
pub const NULL_BIGINT: i64 = i64::MIN;
pub const NULL_DOUBLE: f64 = f64::MIN;
pub const NULL_TIMESTAMP: i64 = i64::MIN;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Double(f64),
    /// Microseconds since the epoch.
    Timestamp(i64),
    Varchar(String),
    Varbinary(Bytes),
}

impl Value {
    /// `None` for `Null`, which is compatible with every column type.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(ValueType::Boolean),
            Value::TinyInt(_) => Some(ValueType::TinyInt),
            Value::SmallInt(_) => Some(ValueType::SmallInt),
            Value::Integer(_) => Some(ValueType::Integer),
            Value::BigInt(_) => Some(ValueType::BigInt),
            Value::Double(_) => Some(ValueType::Double),
            Value::Timestamp(_) => Some(ValueType::Timestamp),
            Value::Varchar(_) => Some(ValueType::Varchar),
            Value::Varbinary(_) => Some(ValueType::Varbinary),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True when a non-null value collides with its type's NULL bit pattern and so cannot be
    /// stored without reading back as NULL.
    pub fn is_reserved_sentinel(&self) -> bool {
        match self {
            Value::TinyInt(v) => *v == NULL_TINYINT,
            Value::SmallInt(v) => *v == NULL_SMALLINT,
            Value::Integer(v) => *v == NULL_INTEGER,
            Value::BigInt(v) => *v == NULL_BIGINT,
            Value::Double(v) => v.to_bits() == NULL_DOUBLE.to_bits(),
            Value::Timestamp(v) => *v == NULL_TIMESTAMP,
            _ => false,
        }
    }

    /// Length in bytes of the out-of-line payload, if this is a variable-length value.
    pub fn varlen_size(&self) -> Option<usize> {
        match self {
            Value::Varchar(s) => Some(s.len()),
            Value::Varbinary(b) => Some(b.len()),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::TinyInt(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "@{v}"),
            Value::Varchar(v) => write!(f, "{v:?}"),
            Value::Varbinary(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Varchar(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Varbinary(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_inline_widths_fit_a_word() {
        for ty in ValueType::iter() {
            assert!(ty.inline_width() <= 8, "{ty} does not fit a cell");
        }
        assert!(!ValueType::Varchar.is_inlined());
        assert!(ValueType::Integer.is_inlined());
    }

    #[test]
    fn test_reserved_sentinels() {
        assert!(Value::Integer(i32::MIN).is_reserved_sentinel());
        assert!(!Value::Integer(i32::MIN + 1).is_reserved_sentinel());
        assert!(Value::Double(f64::MIN).is_reserved_sentinel());
        assert!(!Value::Null.is_reserved_sentinel());
        assert!(!Value::Varchar(String::new()).is_reserved_sentinel());
    }

    #[test]
    fn test_value_type_round_trips_through_repr() {
        for ty in ValueType::iter() {
            assert_eq!(ValueType::from_repr(ty as u8), Some(ty));
        }
        assert_eq!(ValueType::Varchar.to_string(), "VARCHAR");
    }
}
