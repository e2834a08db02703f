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

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Object identifier. Used for catalog ids (database, table, tile group, tile) as well as slot
/// offsets and column ids.
pub type Oid = u32;

/// Transaction identifier, handed out by the transaction manager.
pub type TxnId = u64;

/// Commit timestamp, handed out by the transaction manager. Shares its 64-bit space with
/// `TxnId`: an in-flight delete parks its transaction id in a slot's end commit id.
pub type CommitId = u64;

pub const INVALID_OID: Oid = Oid::MAX;

/// "No transaction".
pub const INVALID_TXN_ID: TxnId = 0;

/// "Infinity": a begin commit id that was never ratified, or an end commit id with no committed
/// deletion.
pub const MAX_CID: CommitId = CommitId::MAX;

pub const INVALID_ITEMPOINTER: ItemPointer = ItemPointer {
    block: INVALID_OID,
    offset: INVALID_OID,
};

/// Physical address of a tuple version: the tile group id plus the slot inside that group.
/// Only ever used as a lookup key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemPointer {
    pub block: Oid,
    pub offset: Oid,
}

impl ItemPointer {
    pub fn new(block: Oid, offset: Oid) -> Self {
        Self { block, offset }
    }

    pub fn is_valid(&self) -> bool {
        *self != INVALID_ITEMPOINTER
    }

    /// Pack into a single word, block in the high half, so it fits an atomic cell.
    pub fn pack(&self) -> u64 {
        ((self.block as u64) << 32) | self.offset as u64
    }

    pub fn unpack(packed: u64) -> Self {
        Self {
            block: (packed >> 32) as Oid,
            offset: packed as Oid,
        }
    }
}

impl Default for ItemPointer {
    fn default() -> Self {
        INVALID_ITEMPOINTER
    }
}

impl Display for ItemPointer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if !self.is_valid() {
            return write!(f, "(invalid)");
        }
        write!(f, "({}, {})", self.block, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_pointer_packing() {
        let ptr = ItemPointer::new(7, 42);
        assert_eq!(ItemPointer::unpack(ptr.pack()), ptr);
        assert_eq!(
            ItemPointer::unpack(INVALID_ITEMPOINTER.pack()),
            INVALID_ITEMPOINTER
        );
        assert_eq!(INVALID_ITEMPOINTER.pack(), u64::MAX);
    }

    #[test]
    fn test_item_pointer_validity() {
        assert!(!ItemPointer::default().is_valid());
        assert!(ItemPointer::new(0, 0).is_valid());
        assert_eq!(INVALID_ITEMPOINTER.to_string(), "(invalid)");
        assert_eq!(ItemPointer::new(3, 9).to_string(), "(3, 9)");
    }
}
