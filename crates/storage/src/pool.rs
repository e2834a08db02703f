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

//! Out-of-line storage for variable-length column values.
//!
//! Each tile owns exactly one pool. Allocation is append-only and lock-free, so concurrent
//! inserts into different slots of the same tile never coordinate. Nothing is freed until the
//! pool (and so its tile) is dropped; a slot that is overwritten after reclamation simply leaves
//! its old payload behind.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Reference to a payload in a `VarlenPool`, small enough to sit inline in a tile cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VarlenHandle(u64);

impl VarlenHandle {
    /// Cell value meaning "NULL, no payload".
    pub const NULL: VarlenHandle = VarlenHandle(u64::MAX);

    pub fn from_word(word: u64) -> Self {
        Self(word)
    }

    pub fn as_word(&self) -> u64 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

#[derive(Default)]
pub struct VarlenPool {
    chunks: boxcar::Vec<Box<[u8]>>,
    allocated_bytes: AtomicUsize,
}

impl VarlenPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `bytes` into the pool.
    pub fn allocate(&self, bytes: &[u8]) -> VarlenHandle {
        let index = self.chunks.push(bytes.into());
        self.allocated_bytes
            .fetch_add(bytes.len(), Ordering::Relaxed);
        VarlenHandle(index as u64)
    }

    pub fn get(&self, handle: VarlenHandle) -> Option<&[u8]> {
        if handle.is_null() {
            return None;
        }
        self.chunks.get(handle.0 as usize).map(|chunk| &chunk[..])
    }

    /// Total payload bytes ever allocated from this pool.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_allocate_get() {
        let pool = VarlenPool::new();
        let a = pool.allocate(b"hello");
        let b = pool.allocate(b"");
        assert_eq!(pool.get(a), Some(&b"hello"[..]));
        assert_eq!(pool.get(b), Some(&b""[..]));
        assert_eq!(pool.get(VarlenHandle::NULL), None);
        assert_eq!(pool.allocated_bytes(), 5);
        assert_eq!(pool.chunk_count(), 2);
    }

    #[test]
    fn test_concurrent_allocation() {
        let pool = Arc::new(VarlenPool::new());
        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    (0..250u8)
                        .map(|i| (pool.allocate(&[t, i]), [t, i]))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for h in handles {
            for (handle, expected) in h.join().unwrap() {
                assert_eq!(pool.get(handle), Some(&expected[..]));
            }
        }
        assert_eq!(pool.chunk_count(), 1000);
        assert_eq!(pool.allocated_bytes(), 2000);
    }
}
