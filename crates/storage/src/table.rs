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

//! A table as an append-only sequence of tile groups. When the newest group fills up, one
//! inserter adds the next; the others retry against it.

use crate::tile_group::TileGroup;
use crate::{StorageConfig, StorageError};
use std::sync::{Arc, Mutex, PoisonError};
use tilestore_common::{
    CommitId, INVALID_OID, ItemPointer, Oid, OidAllocator, Schema, Tuple, TxnId, Value,
};
use tracing::{debug, info};

pub struct DataTable {
    database_id: Oid,
    table_id: Oid,
    name: String,

    schema: Schema,
    tile_schemas: Vec<Schema>,
    tuples_per_tile_group: usize,

    oids: Arc<OidAllocator>,

    /// In creation order. Never shrinks.
    tile_groups: boxcar::Vec<Arc<TileGroup>>,
    by_id: papaya::HashMap<Oid, Arc<TileGroup>>,
    /// Held only while appending a tile group.
    add_lock: Mutex<()>,
}

impl DataTable {
    pub fn new(
        database_id: Oid,
        table_id: Oid,
        name: &str,
        schema: Schema,
        config: &StorageConfig,
        oids: Arc<OidAllocator>,
    ) -> Result<Self, StorageError> {
        if config.tuples_per_tile_group == 0 {
            return Err(StorageError::ZeroCapacity);
        }
        if config.tuples_per_tile_group >= INVALID_OID as usize {
            return Err(StorageError::InvalidLayout(format!(
                "{} tuples per tile group exceeds the slot id space",
                config.tuples_per_tile_group
            )));
        }
        let tile_schemas = config.layout.fragments(&schema)?;
        let table = Self {
            database_id,
            table_id,
            name: name.to_string(),
            schema,
            tile_schemas,
            tuples_per_tile_group: config.tuples_per_tile_group,
            oids,
            tile_groups: boxcar::Vec::new(),
            by_id: papaya::HashMap::new(),
            add_lock: Mutex::new(()),
        };
        table.add_tile_group_after(None)?;
        info!(
            table_id,
            name,
            tiles_per_group = table.tile_schemas.len(),
            tuples_per_tile_group = table.tuples_per_tile_group,
            "created table"
        );
        Ok(table)
    }

    /// Append a tile group unless someone already appended one after `full`.
    fn add_tile_group_after(&self, full: Option<Oid>) -> Result<(), StorageError> {
        let _guard = self.add_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let newest = self.newest_tile_group().map(|tg| tg.tile_group_id());
        if newest != full {
            return Ok(());
        }

        let tile_group_id = self.oids.next_oid();
        if tile_group_id == INVALID_OID {
            return Err(StorageError::OidsExhausted);
        }
        let tile_group = Arc::new(TileGroup::new(
            &self.oids,
            self.database_id,
            self.table_id,
            tile_group_id,
            self.tile_schemas.clone(),
            self.tuples_per_tile_group,
        ));
        self.by_id
            .pin()
            .insert(tile_group_id, tile_group.clone());
        self.tile_groups.push(tile_group);
        debug!(
            table_id = self.table_id,
            tile_group_id,
            tile_groups = self.tile_groups.count(),
            "added tile group"
        );
        Ok(())
    }

    fn newest_tile_group(&self) -> Option<Arc<TileGroup>> {
        let count = self.tile_groups.count();
        self.tile_groups.get(count.checked_sub(1)?).cloned()
    }

    /// Insert into the newest tile group, adding a new group when it is full.
    pub fn insert_tuple(&self, txn_id: TxnId, tuple: &Tuple) -> Result<ItemPointer, StorageError> {
        // Rejected rows must not trigger a rollover.
        self.schema.validate(tuple)?;
        loop {
            let newest = self.newest_tile_group();
            if let Some(tile_group) = &newest
                && let Some(slot) = tile_group.insert_tuple(txn_id, tuple)?
            {
                return Ok(ItemPointer::new(tile_group.tile_group_id(), slot));
            }
            self.add_tile_group_after(newest.map(|tg| tg.tile_group_id()))?;
        }
    }

    fn locate(&self, pointer: ItemPointer) -> Result<Arc<TileGroup>, StorageError> {
        self.tile_group_by_id(pointer.block)
            .ok_or(StorageError::TileGroupNotFound(pointer.block))
    }

    pub fn delete_tuple(&self, txn_id: TxnId, pointer: ItemPointer) -> Result<bool, StorageError> {
        Ok(self.locate(pointer)?.delete_tuple(txn_id, pointer.offset))
    }

    pub fn commit_insert(&self, pointer: ItemPointer, commit_id: CommitId) -> Result<(), StorageError> {
        self.locate(pointer)?
            .commit_inserted_tuple(pointer.offset, commit_id);
        Ok(())
    }

    pub fn commit_delete(
        &self,
        pointer: ItemPointer,
        txn_id: TxnId,
        commit_id: CommitId,
    ) -> Result<(), StorageError> {
        self.locate(pointer)?
            .commit_deleted_tuple(pointer.offset, txn_id, commit_id);
        Ok(())
    }

    pub fn abort_insert(&self, pointer: ItemPointer) -> Result<(), StorageError> {
        self.locate(pointer)?.abort_inserted_tuple(pointer.offset);
        Ok(())
    }

    pub fn abort_delete(&self, pointer: ItemPointer) -> Result<(), StorageError> {
        self.locate(pointer)?.abort_deleted_tuple(pointer.offset);
        Ok(())
    }

    /// Return the slot to its tile group's allocator. Its old variable-length payloads remain in
    /// the tile pools until the table is dropped.
    pub fn reclaim(&self, pointer: ItemPointer) -> Result<(), StorageError> {
        self.locate(pointer)?.reclaim_tuple(pointer.offset);
        Ok(())
    }

    pub fn select_tuple(&self, pointer: ItemPointer) -> Result<Option<Tuple>, StorageError> {
        Ok(self.locate(pointer)?.select_tuple(pointer.offset))
    }

    pub fn get_value(
        &self,
        pointer: ItemPointer,
        column_id: usize,
    ) -> Result<Option<Value>, StorageError> {
        Ok(self.locate(pointer)?.get_value(pointer.offset, column_id))
    }

    pub fn tile_group(&self, offset: usize) -> Option<Arc<TileGroup>> {
        self.tile_groups.get(offset).cloned()
    }

    pub fn tile_group_by_id(&self, tile_group_id: Oid) -> Option<Arc<TileGroup>> {
        self.by_id.pin().get(&tile_group_id).cloned()
    }

    pub fn tile_group_count(&self) -> usize {
        self.tile_groups.count()
    }

    /// Committed, undeleted versions across every tile group.
    pub fn active_tuple_count(&self) -> usize {
        self.tile_groups
            .iter()
            .map(|(_, tg)| tg.active_tuple_count() as usize)
            .sum()
    }

    pub fn database_id(&self) -> Oid {
        self.database_id
    }

    pub fn table_id(&self) -> Oid {
        self.table_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn tile_schemas(&self) -> &[Schema] {
        &self.tile_schemas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TileGroupLayout;
    use tilestore_common::{Column, SchemaError, ValueType};

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", ValueType::BigInt),
            Column::varlen("name", ValueType::Varchar, 16),
            Column::new("score", ValueType::Double),
        ])
    }

    fn row(id: i64) -> Tuple {
        Tuple::new(vec![
            Value::BigInt(id),
            Value::Varchar(format!("n{id}")),
            Value::Double(id as f64),
        ])
    }

    fn table(tuples_per_tile_group: usize, layout: TileGroupLayout) -> DataTable {
        let config = StorageConfig {
            tuples_per_tile_group,
            layout,
        };
        DataTable::new(0, 1, "t", schema(), &config, Arc::new(OidAllocator::new())).unwrap()
    }

    #[test]
    fn test_rejects_bad_config() {
        let oids = Arc::new(OidAllocator::new());
        let zero = StorageConfig {
            tuples_per_tile_group: 0,
            layout: TileGroupLayout::Row,
        };
        assert!(matches!(
            DataTable::new(0, 1, "t", schema(), &zero, oids.clone()),
            Err(StorageError::ZeroCapacity)
        ));
        let bad_layout = StorageConfig {
            tuples_per_tile_group: 4,
            layout: TileGroupLayout::Hybrid(vec![1, 1]),
        };
        assert!(matches!(
            DataTable::new(0, 1, "t", schema(), &bad_layout, oids),
            Err(StorageError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_exhausted_oids() {
        let oids = Arc::new(OidAllocator::starting_at(INVALID_OID));
        assert!(matches!(
            DataTable::new(0, 1, "t", schema(), &StorageConfig::default(), oids),
            Err(StorageError::OidsExhausted)
        ));
    }

    #[test]
    fn test_rolls_over_to_new_tile_group() {
        let t = table(2, TileGroupLayout::Column);
        assert_eq!(t.tile_group_count(), 1);
        let pointers: Vec<_> = (0..5).map(|i| t.insert_tuple(1, &row(i)).unwrap()).collect();
        assert_eq!(t.tile_group_count(), 3);

        let blocks: Vec<_> = pointers.iter().map(|p| p.block).collect();
        assert_eq!(blocks[0], blocks[1]);
        assert_ne!(blocks[1], blocks[2]);
        assert_eq!(blocks[2], blocks[3]);
        assert_ne!(blocks[3], blocks[4]);

        for (i, pointer) in pointers.iter().enumerate() {
            assert_eq!(t.select_tuple(*pointer).unwrap(), Some(row(i as i64)));
        }
        assert_eq!(
            t.tile_group(1).map(|tg| tg.tile_group_id()),
            Some(pointers[2].block)
        );
        assert_eq!(t.tile_group(1).unwrap().tile_count(), 3);
    }

    #[test]
    fn test_rejected_row_does_not_roll_over() {
        let t = table(1, TileGroupLayout::Row);
        t.insert_tuple(1, &row(1)).unwrap();
        assert!(matches!(
            t.insert_tuple(1, &Tuple::new(vec![Value::BigInt(1)])),
            Err(StorageError::Schema(SchemaError::ArityMismatch { .. }))
        ));
        assert_eq!(t.tile_group_count(), 1);
    }

    #[test]
    fn test_lifecycle_through_pointers() {
        let t = table(4, TileGroupLayout::Hybrid(vec![1, 2]));
        let p = t.insert_tuple(3, &row(7)).unwrap();
        t.commit_insert(p, 4).unwrap();
        assert_eq!(t.active_tuple_count(), 1);
        assert_eq!(t.get_value(p, 1).unwrap(), Some(Value::Varchar("n7".to_string())));

        assert!(t.delete_tuple(5, p).unwrap());
        assert!(!t.delete_tuple(6, p).unwrap());
        t.abort_delete(p).unwrap();
        assert!(t.delete_tuple(6, p).unwrap());
        t.commit_delete(p, 6, 7).unwrap();
        assert_eq!(t.active_tuple_count(), 0);

        t.reclaim(p).unwrap();
        let q = t.insert_tuple(8, &row(8)).unwrap();
        assert_eq!(q, p);
        t.abort_insert(q).unwrap();
    }

    #[test]
    fn test_unknown_tile_group() {
        let t = table(4, TileGroupLayout::Row);
        let missing = ItemPointer::new(9999, 0);
        assert_eq!(
            t.select_tuple(missing),
            Err(StorageError::TileGroupNotFound(9999))
        );
        assert_eq!(
            t.delete_tuple(1, missing),
            Err(StorageError::TileGroupNotFound(9999))
        );
    }

    #[test]
    fn test_concurrent_inserts_across_rollover() {
        let t = Arc::new(table(8, TileGroupLayout::Row));
        let handles: Vec<_> = (0..4)
            .map(|thread| {
                let t = t.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| {
                            let id = thread * 1000 + i;
                            (t.insert_tuple(1, &row(id)).unwrap(), id)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut seen = std::collections::HashSet::new();
        for h in handles {
            for (pointer, id) in h.join().unwrap() {
                assert!(seen.insert(pointer), "{pointer} handed out twice");
                assert_eq!(t.select_tuple(pointer).unwrap(), Some(row(id)));
            }
        }
        assert_eq!(seen.len(), 200);
        assert_eq!(t.tile_group_count(), 25);
    }
}
