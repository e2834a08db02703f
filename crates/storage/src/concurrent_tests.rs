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

#[cfg(test)]
mod tests {
    use crate::{DataTable, SlotState, StorageConfig, TileGroup, TileGroupLayout};
    use shuttle::{check_random, sync::Arc, thread};
    use std::collections::HashSet;
    use tilestore_common::{Column, MAX_CID, OidAllocator, Schema, Tuple, Value, ValueType};

    fn schema() -> Vec<Schema> {
        vec![
            Schema::new(vec![Column::new("id", ValueType::Integer)]),
            Schema::new(vec![Column::varlen("tag", ValueType::Varchar, 8)]),
        ]
    }

    fn row(id: i32) -> Tuple {
        Tuple::new(vec![Value::Integer(id), Value::Varchar(format!("t{id}"))])
    }

    fn committed_tile_group(capacity: usize) -> Arc<TileGroup> {
        let tg = TileGroup::new(&OidAllocator::new(), 0, 1, 2, schema(), capacity);
        for i in 0..capacity {
            let slot = tg.insert_tuple(1, &row(i as i32)).unwrap().unwrap();
            tg.commit_inserted_tuple(slot, 2);
        }
        Arc::new(tg)
    }

    #[test]
    fn test_concurrent_delete_single_winner() {
        check_random(
            || {
                let tg = committed_tile_group(1);
                let handles: Vec<_> = (10..14)
                    .map(|txn_id| {
                        let tg = tg.clone();
                        thread::spawn(move || (txn_id, tg.delete_tuple(txn_id, 0)))
                    })
                    .collect();
                let winners: Vec<_> = handles
                    .into_iter()
                    .map(|h| h.join().unwrap())
                    .filter(|(_, won)| *won)
                    .collect();
                assert_eq!(winners.len(), 1);
                assert_eq!(tg.header().end_commit_id(0), winners[0].0);
                assert_eq!(tg.header().slot_state(0), SlotState::DeletePending);
            },
            100,
        );
    }

    #[test]
    fn test_concurrent_allocation_is_distinct() {
        check_random(
            || {
                let tg = Arc::new(TileGroup::new(&OidAllocator::new(), 0, 1, 2, schema(), 6));
                let handles: Vec<_> = (0..3)
                    .map(|t| {
                        let tg = tg.clone();
                        thread::spawn(move || {
                            let mut slots = vec![];
                            while let Some(slot) = tg.insert_tuple(t + 1, &row(t as i32)).unwrap()
                            {
                                slots.push((slot, t as i32));
                            }
                            slots
                        })
                    })
                    .collect();
                let mut seen = HashSet::new();
                for h in handles {
                    for (slot, id) in h.join().unwrap() {
                        assert!(seen.insert(slot));
                        assert_eq!(tg.select_tuple(slot), Some(row(id)));
                    }
                }
                assert_eq!(seen.len(), 6);
                assert_eq!(tg.next_tuple_slot(), 6);
            },
            100,
        );
    }

    #[test]
    fn test_concurrent_reclaim_and_insert() {
        check_random(
            || {
                let tg = committed_tile_group(2);
                for slot in 0..2 {
                    assert!(tg.delete_tuple(3, slot));
                    tg.commit_deleted_tuple(slot, 3, 4);
                }

                let reclaimer = {
                    let tg = tg.clone();
                    thread::spawn(move || {
                        tg.reclaim_tuple(0);
                        tg.reclaim_tuple(1);
                    })
                };
                let inserter = {
                    let tg = tg.clone();
                    thread::spawn(move || tg.insert_tuple(5, &row(99)).unwrap())
                };
                reclaimer.join().unwrap();
                let inserted = inserter.join().unwrap();

                // The inserter may run before anything is reclaimed.
                if let Some(slot) = inserted {
                    assert_eq!(tg.header().slot_state(slot), SlotState::Reserved);
                    assert_eq!(tg.header().end_commit_id(slot), MAX_CID);
                    assert_eq!(tg.header().free_slot_count(), 1);
                } else {
                    assert_eq!(tg.header().free_slot_count(), 2);
                }
                assert_eq!(tg.active_tuple_count(), 0);
            },
            100,
        );
    }

    #[test]
    fn test_concurrent_table_rollover() {
        check_random(
            || {
                let config = StorageConfig {
                    tuples_per_tile_group: 2,
                    layout: TileGroupLayout::Column,
                };
                let table = Arc::new(
                    DataTable::new(
                        0,
                        1,
                        "t",
                        Schema::concat(&schema()),
                        &config,
                        std::sync::Arc::new(OidAllocator::new()),
                    )
                    .unwrap(),
                );
                let handles: Vec<_> = (0..3)
                    .map(|t| {
                        let table = table.clone();
                        thread::spawn(move || {
                            (0..3)
                                .map(|i| table.insert_tuple(1, &row(t * 10 + i)).unwrap())
                                .collect::<Vec<_>>()
                        })
                    })
                    .collect();
                let mut seen = HashSet::new();
                for h in handles {
                    for pointer in h.join().unwrap() {
                        assert!(seen.insert(pointer));
                    }
                }
                assert_eq!(seen.len(), 9);
                // Nine rows at two per group: five groups, never a spare one.
                assert_eq!(table.tile_group_count(), 5);
            },
            50,
        );
    }
}
