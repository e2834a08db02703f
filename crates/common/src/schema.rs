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

use crate::tuple::Tuple;
use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Row has {actual} values, schema has {expected} columns")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("Column {column} expects {expected}, got {actual}")]
    TypeMismatch {
        column: usize,
        expected: ValueType,
        actual: ValueType,
    },
    #[error("Column {column} value of {length} bytes exceeds maximum of {max}")]
    ValueTooLong {
        column: usize,
        length: usize,
        max: usize,
    },
    #[error("Column {column} value collides with the NULL marker of its type")]
    ReservedNullSentinel { column: usize },
    #[error("Column {column} out of range for schema of {count} columns")]
    ColumnOutOfRange { column: usize, count: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub value_type: ValueType,
    /// Inline width for fixed-width types, maximum payload length for variable-length types.
    pub length: usize,
}

impl Column {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            length: value_type.inline_width(),
        }
    }

    pub fn varlen(name: &str, value_type: ValueType, max_length: usize) -> Self {
        debug_assert!(!value_type.is_inlined());
        Self {
            name: name.to_string(),
            value_type,
            length: max_length,
        }
    }

    pub fn is_inlined(&self) -> bool {
        self.value_type.is_inlined()
    }
}

/// An ordered list of columns; either a whole table's schema or one vertical fragment of it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, column: usize) -> Option<&Column> {
        self.columns.get(column)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Bytes one row of this schema occupies inline.
    pub fn tuple_length(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.value_type.inline_width())
            .sum()
    }

    /// Concatenate fragments, in order, into the schema they partition.
    pub fn concat(fragments: &[Schema]) -> Schema {
        Schema {
            columns: fragments
                .iter()
                .flat_map(|s| s.columns.iter().cloned())
                .collect(),
        }
    }

    pub fn project(&self, columns: &[usize]) -> Result<Schema, SchemaError> {
        let mut projected = Vec::with_capacity(columns.len());
        for &column in columns {
            let Some(c) = self.columns.get(column) else {
                return Err(SchemaError::ColumnOutOfRange {
                    column,
                    count: self.columns.len(),
                });
            };
            projected.push(c.clone());
        }
        Ok(Schema::new(projected))
    }

    /// Check that `tuple` can be stored under this schema without loss.
    pub fn validate(&self, tuple: &Tuple) -> Result<(), SchemaError> {
        if tuple.len() != self.columns.len() {
            return Err(SchemaError::ArityMismatch {
                expected: self.columns.len(),
                actual: tuple.len(),
            });
        }
        for (i, (column, value)) in self.columns.iter().zip(tuple.iter()).enumerate() {
            Self::validate_value(i, column, value)?;
        }
        Ok(())
    }

    fn validate_value(index: usize, column: &Column, value: &Value) -> Result<(), SchemaError> {
        let Some(actual) = value.value_type() else {
            return Ok(());
        };
        if actual != column.value_type {
            return Err(SchemaError::TypeMismatch {
                column: index,
                expected: column.value_type,
                actual,
            });
        }
        if value.is_reserved_sentinel() {
            return Err(SchemaError::ReservedNullSentinel { column: index });
        }
        if let Some(length) = value.varlen_size()
            && length > column.length
        {
            return Err(SchemaError::ValueTooLong {
                column: index,
                length,
                max: column.length,
            });
        }
        Ok(())
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", column.name, column.value_type)?;
            if !column.is_inlined() {
                write!(f, "({})", column.length)?;
            }
        }
        write!(f, "]")
    }
}
