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

//! Per-slot MVCC metadata and the slot allocator for one tile group.
//!
//! Every slot moves through:
//!
//! ```text
//! Free          -> Reserved        next_empty_tuple_slot
//! Reserved      -> Active          commit_insert
//! Reserved      -> Free            abort_insert
//! Active        -> DeletePending   try_acquire_delete
//! DeletePending -> Active          abort_delete
//! DeletePending -> Deleted         commit_delete
//! Deleted       -> Free            reclaim_tuple_slot (garbage collector)
//! ```
//!
//! `abort_insert` returns a slot straight to `Free` *without* resetting its MVCC fields: its
//! begin commit id is still `MAX_CID`, so it can never be taken for a committed version, and the
//! next occupant overwrites everything when it is inserted.
//!
//! Only two things are contended: the allocator cursor and each slot's end commit id (the delete
//! lock). The remaining fields are written only by the transaction that owns the slot, so they
//! are plain relaxed stores.

use crossbeam_queue::SegQueue;
use std::fmt::{Display, Formatter};
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64};
use strum::{Display as StrumDisplay, FromRepr};
use tilestore_common::{
    CommitId, INVALID_ITEMPOINTER, INVALID_OID, INVALID_TXN_ID, ItemPointer, MAX_CID, Oid, TxnId,
};
use tracing::warn;

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromRepr, StrumDisplay)]
pub enum SlotState {
    /// Never handed out, or reclaimed.
    Free = 0,
    /// Handed out to an inserting transaction which has not committed yet.
    Reserved = 1,
    /// Insert committed, no delete in flight.
    Active = 2,
    /// A transaction holds the delete lock.
    DeletePending = 3,
    /// Delete committed; waiting for the garbage collector to reclaim the slot.
    Deleted = 4,
}

struct SlotHeader {
    transaction_id: AtomicU64,
    begin_commit_id: AtomicU64,
    end_commit_id: AtomicU64,
    /// Packed `ItemPointer` to the previous version of this row.
    prev_item_pointer: AtomicU64,
    state: AtomicU8,
}

impl SlotHeader {
    fn new() -> Self {
        Self {
            transaction_id: AtomicU64::new(INVALID_TXN_ID),
            begin_commit_id: AtomicU64::new(MAX_CID),
            end_commit_id: AtomicU64::new(MAX_CID),
            prev_item_pointer: AtomicU64::new(INVALID_ITEMPOINTER.pack()),
            state: AtomicU8::new(SlotState::Free as u8),
        }
    }
}

pub struct TileGroupHeader {
    slots: Box<[SlotHeader]>,
    num_tuple_slots: Oid,

    /// One past the highest slot ever handed out by the cursor. Never exceeds `num_tuple_slots`.
    next_tuple_slot: AtomicU32,
    /// Slots handed back by aborted inserts or the garbage collector, reused before the cursor
    /// advances.
    free_slots: SegQueue<Oid>,
    active_tuple_count: AtomicU32,
}

impl TileGroupHeader {
    pub fn new(num_tuple_slots: usize) -> Self {
        assert!(
            num_tuple_slots < INVALID_OID as usize,
            "tile group capacity {num_tuple_slots} exceeds the slot id space"
        );
        Self {
            slots: (0..num_tuple_slots).map(|_| SlotHeader::new()).collect(),
            num_tuple_slots: num_tuple_slots as Oid,
            next_tuple_slot: AtomicU32::new(0),
            free_slots: SegQueue::new(),
            active_tuple_count: AtomicU32::new(0),
        }
    }

    #[inline]
    fn slot(&self, slot: Oid) -> &SlotHeader {
        &self.slots[slot as usize]
    }

    fn transition(&self, slot: Oid, from: SlotState, to: SlotState) -> bool {
        self.slot(slot)
            .state
            .compare_exchange(from as u8, to as u8, AcqRel, Acquire)
            .is_ok()
    }

    /// Reserve an unused slot. Reclaimed slots are preferred; otherwise the cursor advances by one.
    /// `None` once capacity is exhausted, in which case the caller must go to another tile group.
    /// A reservation is never rolled back: an abandoned slot stays consumed until reclaimed.
    pub fn next_empty_tuple_slot(&self) -> Option<Oid> {
        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => self
                .next_tuple_slot
                .fetch_update(AcqRel, Acquire, |next| {
                    (next < self.num_tuple_slots).then(|| next + 1)
                })
                .ok()?,
        };
        let reserved = self.transition(slot, SlotState::Free, SlotState::Reserved);
        debug_assert!(reserved, "allocated slot {slot} was not free");
        Some(slot)
    }

    /// Return `slot` to the free list. The caller guarantees no reader still uses it.
    pub fn reclaim_tuple_slot(&self, slot: Oid) {
        debug_assert!(slot < self.next_tuple_slot());
        let previous = self.slot(slot).state.swap(SlotState::Free as u8, AcqRel);
        if previous == SlotState::Free as u8 {
            // Pushing it twice would let two inserters share the slot.
            warn!(slot, "ignoring reclaim of a slot that is already free");
            return;
        }
        self.free_slots.push(slot);
    }

    /// Record `txn_id` as the inserting owner of a freshly reserved slot.
    pub fn begin_insert(&self, slot: Oid, txn_id: TxnId) {
        self.slot(slot).transaction_id.store(txn_id, Relaxed);
    }

    pub fn set_commit_bounds(&self, slot: Oid, begin: CommitId, end: CommitId) {
        let header = self.slot(slot);
        header.begin_commit_id.store(begin, Release);
        header.end_commit_id.store(end, Release);
    }

    pub fn set_prev_version(&self, slot: Oid, pointer: ItemPointer) {
        self.slot(slot)
            .prev_item_pointer
            .store(pointer.pack(), Relaxed);
    }

    /// Take the delete lock on `slot` by swapping its end commit id from `MAX_CID` to `txn_id`.
    /// `false` means someone else is deleting, or has deleted, this version: a write-write
    /// conflict for the transaction manager to resolve. Never waits.
    ///
    /// A free slot (reached through a stale pointer to an aborted insert) keeps its state, so
    /// it is still handed out cleanly by the allocator.
    pub fn try_acquire_delete(&self, slot: Oid, txn_id: TxnId) -> bool {
        if self
            .slot(slot)
            .end_commit_id
            .compare_exchange(MAX_CID, txn_id, AcqRel, Acquire)
            .is_err()
        {
            return false;
        }
        let pending = self.transition(slot, SlotState::Active, SlotState::DeletePending)
            || self.transition(slot, SlotState::Reserved, SlotState::DeletePending);
        if !pending {
            warn!(
                slot,
                txn_id,
                state = %self.slot_state(slot),
                "delete lock taken on a slot with no live version"
            );
        }
        true
    }

    pub fn commit_insert(&self, slot: Oid, commit_id: CommitId) {
        self.slot(slot).begin_commit_id.store(commit_id, Release);
        // An insert deleted by its own transaction stays DeletePending.
        self.transition(slot, SlotState::Reserved, SlotState::Active);
        self.active_tuple_count.fetch_add(1, Relaxed);
    }

    /// Only a `DeletePending` slot is committed; anything else is left untouched.
    pub fn commit_delete(&self, slot: Oid, commit_id: CommitId) {
        if self.slot_state(slot) != SlotState::DeletePending {
            warn!(
                slot,
                commit_id,
                state = %self.slot_state(slot),
                "ignoring delete commit for a slot with no pending delete"
            );
            return;
        }
        self.slot(slot).end_commit_id.store(commit_id, Release);
        self.transition(slot, SlotState::DeletePending, SlotState::Deleted);
        if self
            .active_tuple_count
            .fetch_update(Relaxed, Relaxed, |count| count.checked_sub(1))
            .is_err()
        {
            warn!(slot, commit_id, "live tuple count already zero");
        }
    }

    /// Undo an uncommitted insert: the slot is immediately reusable. MVCC fields are left as they
    /// are; `begin_commit_id` is still `MAX_CID`.
    pub fn abort_insert(&self, slot: Oid) {
        debug_assert_eq!(self.begin_commit_id(slot), MAX_CID);
        self.reclaim_tuple_slot(slot);
    }

    /// Undo an uncommitted delete, restoring visibility of the version.
    pub fn abort_delete(&self, slot: Oid) {
        if self.slot_state(slot) != SlotState::DeletePending {
            return;
        }
        self.slot(slot).end_commit_id.store(MAX_CID, Release);
        let restored = if self.begin_commit_id(slot) == MAX_CID {
            SlotState::Reserved
        } else {
            SlotState::Active
        };
        self.transition(slot, SlotState::DeletePending, restored);
    }

    pub fn transaction_id(&self, slot: Oid) -> TxnId {
        self.slot(slot).transaction_id.load(Relaxed)
    }

    pub fn begin_commit_id(&self, slot: Oid) -> CommitId {
        self.slot(slot).begin_commit_id.load(Acquire)
    }

    pub fn end_commit_id(&self, slot: Oid) -> CommitId {
        self.slot(slot).end_commit_id.load(Acquire)
    }

    pub fn prev_item_pointer(&self, slot: Oid) -> ItemPointer {
        ItemPointer::unpack(self.slot(slot).prev_item_pointer.load(Relaxed))
    }

    pub fn slot_state(&self, slot: Oid) -> SlotState {
        let raw = self.slot(slot).state.load(Acquire);
        SlotState::from_repr(raw).unwrap_or(SlotState::Free)
    }

    /// The allocator's high-water mark. Slots at or above it have never been handed out.
    pub fn next_tuple_slot(&self) -> Oid {
        self.next_tuple_slot.load(Acquire)
    }

    pub fn active_tuple_count(&self) -> Oid {
        self.active_tuple_count.load(Relaxed)
    }

    pub fn capacity(&self) -> Oid {
        self.num_tuple_slots
    }

    /// Number of reclaimed slots waiting for reuse.
    pub fn free_slot_count(&self) -> usize {
        self.free_slots.len()
    }
}

struct Cid(CommitId);

impl Display for Cid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0 == MAX_CID {
            write!(f, "MAX_CID")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Display for TileGroupHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\t-----------------------------------------------------------")?;
        writeln!(f, "\tTILE GROUP HEADER")?;
        writeln!(
            f,
            "\tActive: {} Allocated: {} Free list: {} Capacity: {}",
            self.active_tuple_count(),
            self.next_tuple_slot(),
            self.free_slot_count(),
            self.num_tuple_slots
        )?;
        for slot in 0..self.next_tuple_slot() {
            writeln!(
                f,
                "\t Slot :: {slot:>6} Txn :: {:>20} Begin :: {:>20} End :: {:>20} Prev :: {} State :: {}",
                self.transaction_id(slot),
                Cid(self.begin_commit_id(slot)),
                Cid(self.end_commit_id(slot)),
                self.prev_item_pointer(slot),
                self.slot_state(slot),
            )?;
        }
        Ok(())
    }
}
