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

//! Tuple storage for a relational table, split horizontally into fixed-capacity *tile groups*
//! and vertically into *tiles*.
//!
//! A `TileGroup` owns one `Tile` per schema fragment plus a `TileGroupHeader` carrying the MVCC
//! fields (transaction id, begin/end commit ids, previous version pointer) of every slot. Slot
//! allocation and delete acquisition are lock-free; neither ever blocks. Deciding which versions
//! a transaction may see is left to the transaction manager: this crate only stores the raw ids.
//!
//! `DataTable` is the thin owner of many tile groups which routes inserts and rolls over to a
//! fresh group when the current one reports that it has no free slot.

#[cfg(test)]
mod concurrent_tests;
mod config;
mod error;
pub mod pool;
pub mod table;
pub mod tile;
pub mod tile_group;
pub mod tile_group_header;

pub use config::{StorageConfig, TileGroupLayout};
pub use error::StorageError;
pub use table::DataTable;
pub use tile::Tile;
pub use tile_group::TileGroup;
pub use tile_group_header::{SlotState, TileGroupHeader};
