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

//! Physical storage for one vertical fragment of a tile group.
//!
//! Slot `s` occupies `column_count` consecutive 64-bit cells; column `c` of slot `s` lives at
//! cell `s * column_count + c`. Every storable type fits a cell: fixed-width values occupy the
//! low bits of their cell, variable-length values keep a handle into the tile's own
//! `VarlenPool`. NULL is a per-type reserved bit pattern.
//!
//! Cells are atomics accessed with relaxed ordering. Writers never share a slot (slot ownership
//! comes from the header's allocator), so the cells need no read-modify-write; publication to
//! readers is ordered through the header's commit id stores.

use crate::StorageError;
use crate::pool::{VarlenHandle, VarlenPool};
use bytes::Bytes;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use tilestore_common::{
    NULL_BIGINT, NULL_BOOLEAN, NULL_DOUBLE, NULL_INTEGER, NULL_SMALLINT, NULL_TIMESTAMP,
    NULL_TINYINT, Oid, Schema, SchemaError, Tuple, Value, ValueType,
};

pub struct Tile {
    database_id: Oid,
    table_id: Oid,
    tile_group_id: Oid,
    tile_id: Oid,

    schema: Schema,
    column_count: usize,
    num_tuple_slots: usize,

    cells: Box<[AtomicU64]>,
    pool: VarlenPool,
}

fn null_word(value_type: ValueType) -> u64 {
    match value_type {
        ValueType::Boolean => NULL_BOOLEAN as u64,
        ValueType::TinyInt => NULL_TINYINT as u8 as u64,
        ValueType::SmallInt => NULL_SMALLINT as u16 as u64,
        ValueType::Integer => NULL_INTEGER as u32 as u64,
        ValueType::BigInt => NULL_BIGINT as u64,
        ValueType::Double => NULL_DOUBLE.to_bits(),
        ValueType::Timestamp => NULL_TIMESTAMP as u64,
        ValueType::Varchar | ValueType::Varbinary => VarlenHandle::NULL.as_word(),
    }
}

impl Tile {
    pub fn new(
        database_id: Oid,
        table_id: Oid,
        tile_group_id: Oid,
        tile_id: Oid,
        schema: Schema,
        num_tuple_slots: usize,
    ) -> Self {
        let column_count = schema.column_count();
        // Start every cell as NULL so a reserved-but-unwritten slot reads back as NULLs.
        let nulls: Vec<u64> = schema
            .columns()
            .iter()
            .map(|c| null_word(c.value_type))
            .collect();
        let cells = (0..num_tuple_slots * column_count)
            .map(|i| AtomicU64::new(nulls[i % column_count]))
            .collect();
        Self {
            database_id,
            table_id,
            tile_group_id,
            tile_id,
            schema,
            column_count,
            num_tuple_slots,
            cells,
            pool: VarlenPool::new(),
        }
    }

    pub fn database_id(&self) -> Oid {
        self.database_id
    }

    pub fn table_id(&self) -> Oid {
        self.table_id
    }

    /// Id of the owning tile group. The tile holds no reference to the group itself.
    pub fn tile_group_id(&self) -> Oid {
        self.tile_group_id
    }

    pub fn tile_id(&self) -> Oid {
        self.tile_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn capacity(&self) -> usize {
        self.num_tuple_slots
    }

    /// Inline bytes per slot.
    pub fn tuple_length(&self) -> usize {
        self.schema.tuple_length()
    }

    pub fn pool(&self) -> &VarlenPool {
        &self.pool
    }

    fn cell(&self, slot: Oid, column: usize) -> Option<&AtomicU64> {
        let slot = slot as usize;
        if slot >= self.num_tuple_slots || column >= self.column_count {
            return None;
        }
        self.cells.get(slot * self.column_count + column)
    }

    /// Store `value` in column `column` of `slot`. Variable-length payloads are copied into this
    /// tile's pool. Only the transaction owning `slot` may call this.
    pub fn set_value(&self, slot: Oid, column: usize, value: &Value) -> Result<(), StorageError> {
        debug_assert!((slot as usize) < self.num_tuple_slots);
        debug_assert!(column < self.column_count);
        let (Some(cell), Some(expected)) = (
            self.cell(slot, column),
            self.schema.column(column).map(|c| c.value_type),
        ) else {
            return Err(SchemaError::ColumnOutOfRange {
                column,
                count: self.column_count,
            }
            .into());
        };
        if let Some(actual) = value.value_type()
            && actual != expected
        {
            return Err(SchemaError::TypeMismatch {
                column,
                expected,
                actual,
            }
            .into());
        }
        cell.store(self.encode(expected, value), Ordering::Relaxed);
        Ok(())
    }

    /// Read column `column` of `slot`. `None` only when out of range.
    pub fn value(&self, slot: Oid, column: usize) -> Option<Value> {
        let cell = self.cell(slot, column)?;
        let value_type = self.schema.column(column)?.value_type;
        Some(self.decode(value_type, cell.load(Ordering::Relaxed)))
    }

    /// Every column of `slot`, in fragment order.
    pub fn tuple(&self, slot: Oid) -> Option<Tuple> {
        (0..self.column_count)
            .map(|column| self.value(slot, column))
            .collect()
    }

    fn encode(&self, value_type: ValueType, value: &Value) -> u64 {
        match value {
            Value::Null => null_word(value_type),
            Value::Boolean(v) => *v as u64,
            Value::TinyInt(v) => *v as u8 as u64,
            Value::SmallInt(v) => *v as u16 as u64,
            Value::Integer(v) => *v as u32 as u64,
            Value::BigInt(v) | Value::Timestamp(v) => *v as u64,
            Value::Double(v) => v.to_bits(),
            Value::Varchar(v) => self.pool.allocate(v.as_bytes()).as_word(),
            Value::Varbinary(v) => self.pool.allocate(v).as_word(),
        }
    }

    fn decode(&self, value_type: ValueType, word: u64) -> Value {
        if word == null_word(value_type) {
            return Value::Null;
        }
        match value_type {
            ValueType::Boolean => Value::Boolean(word != 0),
            ValueType::TinyInt => Value::TinyInt(word as u8 as i8),
            ValueType::SmallInt => Value::SmallInt(word as u16 as i16),
            ValueType::Integer => Value::Integer(word as u32 as i32),
            ValueType::BigInt => Value::BigInt(word as i64),
            ValueType::Double => Value::Double(f64::from_bits(word)),
            ValueType::Timestamp => Value::Timestamp(word as i64),
            ValueType::Varchar => self
                .pool
                .get(VarlenHandle::from_word(word))
                .map_or(Value::Null, |b| {
                    Value::Varchar(String::from_utf8_lossy(b).into_owned())
                }),
            ValueType::Varbinary => self
                .pool
                .get(VarlenHandle::from_word(word))
                .map_or(Value::Null, |b| Value::Varbinary(Bytes::copy_from_slice(b))),
        }
    }
}

impl Display for Tile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\t-----------------------------------------------------------")?;
        writeln!(f, "\tTILE")?;
        writeln!(
            f,
            "\tCatalog :: DB: {} Table: {} Tile Group: {} Tile: {}",
            self.database_id, self.table_id, self.tile_group_id, self.tile_id
        )?;
        writeln!(f, "\tSchema :: {}", self.schema)?;
        writeln!(
            f,
            "\tSlots: {} Tuple length: {} Pool: {} bytes in {} chunks",
            self.num_tuple_slots,
            self.tuple_length(),
            self.pool.allocated_bytes(),
            self.pool.chunk_count()
        )
    }
}
