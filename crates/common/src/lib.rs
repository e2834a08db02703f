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

//! The vocabulary shared by the tile storage engine and its callers: identifiers and their
//! sentinels, typed values, column schemas and logical rows.

mod oid;
mod schema;
pub mod tracing;
mod tuple;
mod types;
mod value;

pub use oid::OidAllocator;
pub use schema::{Column, Schema, SchemaError};
pub use tuple::Tuple;
pub use types::{
    CommitId, INVALID_ITEMPOINTER, INVALID_OID, INVALID_TXN_ID, ItemPointer, MAX_CID, Oid, TxnId,
};
pub use value::{
    NULL_BIGINT, NULL_BOOLEAN, NULL_DOUBLE, NULL_INTEGER, NULL_SMALLINT, NULL_TIMESTAMP,
    NULL_TINYINT, Value, ValueType,
};
