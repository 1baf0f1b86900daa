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

//! Persistence seams for books and borrow records.
//!
//! The engine never writes rows directly; it goes through these traits while
//! holding the affected book's lock. Implementations only need per-call
//! atomicity: cross-store consistency is the engine's job.

mod memory;

pub use memory::{MemoryCatalog, MemoryLoanStore};

use crate::base::{BookId, LoanId, UserId};
use crate::book::{Book, NewBook};
use crate::error::StorageError;
use crate::loan::{BorrowRecord, NewLoan};
use chrono::{DateTime, Utc};

/// Storage for catalog rows.
pub trait CatalogStore: Send + Sync {
    /// Assigns a fresh id and stores a validated book.
    fn insert(&self, book: NewBook, at: DateTime<Utc>) -> Result<Book, StorageError>;

    fn get(&self, id: BookId) -> Result<Option<Book>, StorageError>;

    /// Replaces an existing row. Fails with [`StorageError::Missing`] if absent.
    fn put(&self, book: Book) -> Result<(), StorageError>;

    fn remove(&self, id: BookId) -> Result<Option<Book>, StorageError>;

    /// All rows, newest first.
    fn list(&self) -> Result<Vec<Book>, StorageError>;

    fn find_by_title_and_author(
        &self,
        title: &str,
        author: &str,
    ) -> Result<Option<Book>, StorageError>;
}

/// Append-only storage for borrow records.
pub trait LoanStore: Send + Sync {
    /// Appends an open record.
    ///
    /// Fails with [`StorageError::OpenLoanExists`] if the same user already
    /// has an open record for the same book.
    fn append(&self, loan: NewLoan) -> Result<BorrowRecord, StorageError>;

    fn get(&self, id: LoanId) -> Result<Option<BorrowRecord>, StorageError>;

    fn find_open(&self, user: UserId, book: BookId) -> Result<Option<BorrowRecord>, StorageError>;

    /// Sets `returned_at` on an open record and returns the closed record.
    fn close(&self, id: LoanId, at: DateTime<Utc>) -> Result<BorrowRecord, StorageError>;

    /// Open records of one user, newest first.
    fn open_for_user(&self, user: UserId) -> Result<Vec<BorrowRecord>, StorageError>;

    /// Every record of one user, newest first.
    fn history_for_user(&self, user: UserId) -> Result<Vec<BorrowRecord>, StorageError>;

    fn open_count_for_book(&self, book: BookId) -> Result<usize, StorageError>;

    /// Every record, newest first.
    fn all(&self) -> Result<Vec<BorrowRecord>, StorageError>;
}
