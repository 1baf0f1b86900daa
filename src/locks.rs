// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Per-book write serialization.
//!
//! Every operation that changes a book's counters or its loans takes the
//! book's mutex first and holds it across all store calls of that operation.
//! Operations only ever hold one book lock at a time, so there is no lock
//! ordering to get wrong.
//!
//! An entry lives in the table only while some writer holds or waits on it,
//! so lookups of unknown or deleted ids leave nothing behind.

use crate::base::BookId;
use crate::error::LibraryError;
use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::sync::Arc;
use std::time::Duration;

/// Guard held for the duration of one book mutation.
///
/// Dropping it unlocks the book and removes the table entry if no other
/// writer holds a handle to the same mutex.
#[must_use = "the book is unlocked as soon as the guard is dropped"]
pub struct BookGuard<'a> {
    book: BookId,
    locks: &'a BookLocks,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl Drop for BookGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(self.book);
    }
}

/// Lazily created mutex per book id.
#[derive(Debug, Default)]
pub struct BookLocks {
    locks: DashMap<BookId, Arc<Mutex<()>>>,
    timeout: Option<Duration>,
}

impl BookLocks {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Acquires the lock for `book`.
    ///
    /// The map guard is dropped before blocking on the book mutex, so a
    /// waiting writer never stalls unrelated books sharing its shard.
    ///
    /// # Errors
    ///
    /// [`LibraryError::ConcurrencyConflict`] if a timeout is configured and
    /// the lock stays busy past it.
    pub fn acquire(&self, book: BookId) -> Result<BookGuard<'_>, LibraryError> {
        let mutex = Arc::clone(self.locks.entry(book).or_default().value());
        let guard = match self.timeout {
            None => Some(mutex.lock_arc()),
            Some(timeout) => mutex.try_lock_arc_for(timeout),
        };
        drop(mutex);
        match guard {
            Some(guard) => Ok(BookGuard {
                book,
                locks: self,
                guard: Some(guard),
            }),
            None => {
                self.release(book);
                tracing::warn!(book = %book, timeout = ?self.timeout, "book lock timed out");
                Err(LibraryError::ConcurrencyConflict)
            }
        }
    }

    /// Removes the entry once the table holds the only handle to it.
    ///
    /// Handles are cloned under the shard lock, so a count of one under that
    /// same lock means no writer holds or waits on the mutex.
    fn release(&self, book: BookId) {
        self.locks
            .remove_if(&book, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn entry_lives_only_while_held() {
        let locks = BookLocks::new(None);
        let guard = locks.acquire(BookId(1)).unwrap();
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert!(locks.is_empty());
    }

    #[test]
    fn different_books_do_not_block_each_other() {
        let locks = BookLocks::new(Some(Duration::from_millis(10)));
        let _one = locks.acquire(BookId(1)).unwrap();
        let _two = locks.acquire(BookId(2)).unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn busy_lock_times_out_with_conflict() {
        let locks = Arc::new(BookLocks::new(Some(Duration::from_millis(20))));
        let held = locks.acquire(BookId(7)).unwrap();

        let contender = Arc::clone(&locks);
        let result = thread::spawn(move || contender.acquire(BookId(7)).map(|_| ()))
            .join()
            .unwrap();
        assert_eq!(result, Err(LibraryError::ConcurrencyConflict));
        assert_eq!(locks.len(), 1);

        drop(held);
        assert!(locks.is_empty());
    }

    #[test]
    fn waiter_keeps_entry_until_it_is_done() {
        let locks = Arc::new(BookLocks::new(None));
        let held = locks.acquire(BookId(3)).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let waiter = {
            let locks = Arc::clone(&locks);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let _guard = locks.acquire(BookId(3)).unwrap();
                locks.len()
            })
        };

        barrier.wait();
        thread::sleep(Duration::from_millis(20));
        drop(held);
        assert_eq!(waiter.join().unwrap(), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn table_stays_empty_after_many_short_locks() {
        let locks = BookLocks::new(None);
        for id in 0..10_000 {
            drop(locks.acquire(BookId(id)).unwrap());
        }
        assert!(locks.is_empty());
    }
}
