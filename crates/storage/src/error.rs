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

use tilestore_common::{Oid, SchemaError};

/// Failures that are not part of normal contention. Running out of slots and losing a delete race
/// are reported through `Option`/`bool` returns instead.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("Row rejected: {0}")]
    Schema(#[from] SchemaError),
    #[error("Invalid tile group layout: {0}")]
    InvalidLayout(String),
    #[error("Tile groups must hold at least one tuple")]
    ZeroCapacity,
    #[error("Catalog identifier space exhausted")]
    OidsExhausted,
    #[error("Tile group {0} not found")]
    TileGroupNotFound(Oid),
}
