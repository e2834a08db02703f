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

use crate::types::{INVALID_OID, Oid};
use std::sync::atomic::{AtomicU32, Ordering};

/// Hands out catalog identifiers (tile ids, tile group ids) from a single counter.
///
/// Constructed once by whoever owns the catalog and passed down explicitly; there is no global
/// instance.
#[derive(Debug)]
pub struct OidAllocator {
    next: AtomicU32,
}

impl OidAllocator {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: Oid) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Returns `INVALID_OID` if the id space is exhausted; the counter does not wrap.
    pub fn next_oid(&self) -> Oid {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                (current < INVALID_OID).then(|| current + 1)
            })
            .unwrap_or(INVALID_OID)
    }

    /// The id the next call to `next_oid` would return.
    pub fn current(&self) -> Oid {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for OidAllocator {
    fn default() -> Self {
        Self::new()
    }
}
