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

use crate::StorageError;
use crate::tile::Tile;
use crate::tile_group_header::TileGroupHeader;
use std::fmt::{Display, Formatter};
use tilestore_common::{
    CommitId, INVALID_ITEMPOINTER, MAX_CID, Oid, OidAllocator, Schema, Tuple, TxnId, Value,
};
use tracing::{debug, trace, warn};

/// A horizontal partition of a table: a fixed number of tuple slots, split vertically over one
/// tile per schema fragment, plus the header holding each slot's MVCC fields.
///
/// Slot `i` of every tile is the same logical tuple. Column `c` of the table lives in exactly one
/// tile, found by walking the fragments' column counts in order (see `locate_column`).
pub struct TileGroup {
    database_id: Oid,
    table_id: Oid,
    tile_group_id: Oid,

    tile_schemas: Vec<Schema>,
    /// All fragments concatenated; rows are validated against this.
    schema: Schema,

    tiles: Vec<Tile>,
    header: TileGroupHeader,
}

impl TileGroup {
    /// Build one tile per fragment, each with `tuple_count` slots. Tile ids are drawn from `oids`.
    /// The order of `tile_schemas` fixes the column-to-tile mapping for the life of the group.
    pub fn new(
        oids: &OidAllocator,
        database_id: Oid,
        table_id: Oid,
        tile_group_id: Oid,
        tile_schemas: Vec<Schema>,
        tuple_count: usize,
    ) -> Self {
        let tiles = tile_schemas
            .iter()
            .map(|schema| {
                Tile::new(
                    database_id,
                    table_id,
                    tile_group_id,
                    oids.next_oid(),
                    schema.clone(),
                    tuple_count,
                )
            })
            .collect();
        debug!(
            tile_group_id,
            table_id,
            tiles = tile_schemas.len(),
            tuple_count,
            "created tile group"
        );
        Self {
            database_id,
            table_id,
            tile_group_id,
            schema: Schema::concat(&tile_schemas),
            tile_schemas,
            tiles,
            header: TileGroupHeader::new(tuple_count),
        }
    }

    /// Grab the next free slot and copy `tuple` into it, fragment by fragment.
    ///
    /// `Ok(None)` means the group is full and the caller should try another one; it is not an
    /// error. A row that doesn't fit the schema is rejected before any slot is taken.
    /// The new version starts owned by `txn_id` with both commit ids at `MAX_CID`.
    pub fn insert_tuple(&self, txn_id: TxnId, tuple: &Tuple) -> Result<Option<Oid>, StorageError> {
        self.schema.validate(tuple)?;

        let Some(slot) = self.header.next_empty_tuple_slot() else {
            trace!(
                tile_group_id = self.tile_group_id,
                capacity = self.capacity(),
                "tile group full"
            );
            return Ok(None);
        };
        trace!(
            tile_group_id = self.tile_group_id,
            slot,
            capacity = self.capacity(),
            "inserting tuple"
        );

        let mut column_itr = 0;
        for tile in &self.tiles {
            for tile_column in 0..tile.column_count() {
                tile.set_value(slot, tile_column, &tuple[column_itr])?;
                column_itr += 1;
            }
        }

        self.header.begin_insert(slot, txn_id);
        self.header.set_commit_bounds(slot, MAX_CID, MAX_CID);
        self.header.set_prev_version(slot, INVALID_ITEMPOINTER);

        Ok(Some(slot))
    }

    /// Start deleting the version in `slot` on behalf of `txn_id`. Nothing is physically removed.
    /// `false` is a write-write conflict: another transaction holds or has committed the delete.
    pub fn delete_tuple(&self, txn_id: TxnId, slot: Oid) -> bool {
        if !self.is_allocated(slot) {
            return false;
        }
        let acquired = self.header.try_acquire_delete(slot, txn_id);
        if !acquired {
            trace!(
                tile_group_id = self.tile_group_id,
                slot,
                txn_id,
                holder = self.header.end_commit_id(slot),
                "delete conflict"
            );
        }
        acquired
    }

    pub fn commit_inserted_tuple(&self, slot: Oid, commit_id: CommitId) {
        debug_assert!(self.is_allocated(slot), "commit of unallocated slot {slot}");
        if !self.is_allocated(slot) {
            return;
        }
        self.header.commit_insert(slot, commit_id);
    }

    pub fn commit_deleted_tuple(&self, slot: Oid, txn_id: TxnId, commit_id: CommitId) {
        debug_assert!(self.is_allocated(slot), "commit of unallocated slot {slot}");
        if !self.is_allocated(slot) {
            return;
        }
        let holder = self.header.end_commit_id(slot);
        if holder != txn_id {
            warn!(
                tile_group_id = self.tile_group_id,
                slot, txn_id, holder, "committing a delete this transaction does not hold"
            );
        }
        self.header.commit_delete(slot, commit_id);
    }

    pub fn abort_inserted_tuple(&self, slot: Oid) {
        debug_assert!(self.is_allocated(slot), "abort of unallocated slot {slot}");
        if !self.is_allocated(slot) {
            return;
        }
        self.header.abort_insert(slot);
    }

    pub fn abort_deleted_tuple(&self, slot: Oid) {
        debug_assert!(self.is_allocated(slot), "abort of unallocated slot {slot}");
        if !self.is_allocated(slot) {
            return;
        }
        self.header.abort_delete(slot);
    }

    /// Hand `slot` back for reuse. For the garbage collector, once no reader can still see it.
    ///
    /// Variable-length payloads of the old version are not returned to the tile pools; they stay
    /// allocated until the tile group is dropped, so heavy churn on one group grows its pools.
    pub fn reclaim_tuple(&self, slot: Oid) {
        debug_assert!(self.is_allocated(slot), "reclaim of unallocated slot {slot}");
        if !self.is_allocated(slot) {
            return;
        }
        self.header.reclaim_tuple_slot(slot);
    }

    /// Reassemble the full row in `slot`. `None` if the slot was never handed out, even when it is
    /// below capacity. Visibility is not checked.
    pub fn select_tuple(&self, slot: Oid) -> Option<Tuple> {
        if !self.is_allocated(slot) {
            return None;
        }
        let mut tuple = Tuple::with_capacity(self.schema.column_count());
        for tile in &self.tiles {
            tuple.extend(tile.tuple(slot)?.into_values());
        }
        Some(tuple)
    }

    /// Only the columns held by the tile at `tile_offset`.
    pub fn select_tile_tuple(&self, tile_offset: usize, slot: Oid) -> Option<Tuple> {
        debug_assert!(
            tile_offset < self.tiles.len(),
            "tile offset {tile_offset} out of range"
        );
        if !self.is_allocated(slot) {
            return None;
        }
        self.tiles.get(tile_offset)?.tuple(slot)
    }

    /// Map a table column id to `(tile offset, column within that tile)`.
    pub fn locate_column(&self, column_id: usize) -> Option<(usize, usize)> {
        let mut tile_column_id = column_id;
        for (tile_offset, schema) in self.tile_schemas.iter().enumerate() {
            let count = schema.column_count();
            if tile_column_id < count {
                return Some((tile_offset, tile_column_id));
            }
            tile_column_id -= count;
        }
        None
    }

    pub fn tile_offset_for_column(&self, column_id: usize) -> Option<usize> {
        self.locate_column(column_id).map(|(tile_offset, _)| tile_offset)
    }

    pub fn tile_column_for_column(&self, column_id: usize) -> Option<usize> {
        self.locate_column(column_id)
            .map(|(_, tile_column_id)| tile_column_id)
    }

    /// A single field, read straight from the tile holding the column.
    pub fn get_value(&self, slot: Oid, column_id: usize) -> Option<Value> {
        if !self.is_allocated(slot) {
            return None;
        }
        let (tile_offset, tile_column_id) = self.locate_column(column_id)?;
        self.tiles[tile_offset].value(slot, tile_column_id)
    }

    fn is_allocated(&self, slot: Oid) -> bool {
        slot < self.header.next_tuple_slot()
    }

    pub fn database_id(&self) -> Oid {
        self.database_id
    }

    pub fn table_id(&self) -> Oid {
        self.table_id
    }

    pub fn tile_group_id(&self) -> Oid {
        self.tile_group_id
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile(&self, tile_offset: usize) -> Option<&Tile> {
        self.tiles.get(tile_offset)
    }

    pub fn header(&self) -> &TileGroupHeader {
        &self.header
    }

    pub fn tile_schemas(&self) -> &[Schema] {
        &self.tile_schemas
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn capacity(&self) -> Oid {
        self.header.capacity()
    }

    pub fn next_tuple_slot(&self) -> Oid {
        self.header.next_tuple_slot()
    }

    pub fn active_tuple_count(&self) -> Oid {
        self.header.active_tuple_count()
    }
}

impl Display for TileGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "============================================================="
        )?;
        writeln!(f, "TILE GROUP :")?;
        writeln!(
            f,
            "\tCatalog :: DB: {} Table: {} Tile Group: {}",
            self.database_id, self.table_id, self.tile_group_id
        )?;
        writeln!(
            f,
            "\tActive Tuples: {} out of {} slots",
            self.active_tuple_count(),
            self.capacity()
        )?;
        for tile in &self.tiles {
            write!(f, "{tile}")?;
        }
        write!(f, "{}", self.header)?;
        writeln!(
            f,
            "============================================================="
        )
    }
}
