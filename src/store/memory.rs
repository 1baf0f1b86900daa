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

//! In-memory stores backed by [`DashMap`].

use super::{CatalogStore, LoanStore};
use crate::base::{BookId, LoanId, UserId};
use crate::book::{Book, NewBook};
use crate::error::{Entity, StorageError};
use crate::loan::{BorrowRecord, NewLoan};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Catalog rows keyed by id. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct MemoryCatalog {
    books: DashMap<BookId, Book>,
    next_id: AtomicU32,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore for MemoryCatalog {
    fn insert(&self, book: NewBook, at: DateTime<Utc>) -> Result<Book, StorageError> {
        let book = book
            .validated()
            .map_err(|err| StorageError::InvalidRow(err.to_string()))?;
        let id = BookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let book = Book::catalogued(id, book, at);
        self.books.insert(id, book.clone());
        Ok(book)
    }

    fn get(&self, id: BookId) -> Result<Option<Book>, StorageError> {
        Ok(self.books.get(&id).map(|book| book.clone()))
    }

    fn put(&self, book: Book) -> Result<(), StorageError> {
        match self.books.get_mut(&book.id()) {
            Some(mut row) => {
                *row = book;
                Ok(())
            }
            None => Err(StorageError::Missing(Entity::Book)),
        }
    }

    fn remove(&self, id: BookId) -> Result<Option<Book>, StorageError> {
        Ok(self.books.remove(&id).map(|(_, book)| book))
    }

    fn list(&self) -> Result<Vec<Book>, StorageError> {
        let mut books: Vec<Book> = self.books.iter().map(|row| row.value().clone()).collect();
        books.sort_by_key(|book| Reverse((book.created_at(), book.id())));
        Ok(books)
    }

    fn find_by_title_and_author(
        &self,
        title: &str,
        author: &str,
    ) -> Result<Option<Book>, StorageError> {
        Ok(self
            .books
            .iter()
            .find(|row| row.title() == title && row.author() == author)
            .map(|row| row.value().clone()))
    }
}

/// Loan log with an index of open loans per (user, book).
///
/// The open index is the uniqueness guard: [`Entry`] gives an atomic
/// check-and-insert, so two appends for the same pair cannot both land.
#[derive(Debug)]
pub struct MemoryLoanStore {
    records: DashMap<LoanId, BorrowRecord>,
    open: DashMap<(UserId, BookId), LoanId>,
    next_id: AtomicU64,
}

impl MemoryLoanStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            open: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn collect_sorted<F>(&self, keep: F) -> Vec<BorrowRecord>
    where
        F: Fn(&BorrowRecord) -> bool,
    {
        let mut records: Vec<BorrowRecord> = self
            .records
            .iter()
            .filter(|row| keep(row.value()))
            .map(|row| row.value().clone())
            .collect();
        records.sort_by_key(|record| Reverse((record.borrowed_at, record.id)));
        records
    }
}

impl Default for MemoryLoanStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LoanStore for MemoryLoanStore {
    fn append(&self, loan: NewLoan) -> Result<BorrowRecord, StorageError> {
        // Lock order: open index, then records. `close` never holds a records
        // guard while touching the open index.
        match self.open.entry((loan.user_id, loan.book_id)) {
            Entry::Occupied(_) => Err(StorageError::OpenLoanExists {
                user: loan.user_id,
                book: loan.book_id,
            }),
            Entry::Vacant(entry) => {
                let id = LoanId(self.next_id.fetch_add(1, Ordering::Relaxed));
                let record = BorrowRecord::from_new(id, loan);
                self.records.insert(id, record.clone());
                entry.insert(id);
                Ok(record)
            }
        }
    }

    fn get(&self, id: LoanId) -> Result<Option<BorrowRecord>, StorageError> {
        Ok(self.records.get(&id).map(|record| record.clone()))
    }

    fn find_open(&self, user: UserId, book: BookId) -> Result<Option<BorrowRecord>, StorageError> {
        let Some(id) = self.open.get(&(user, book)).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self
            .records
            .get(&id)
            .filter(|record| record.is_open())
            .map(|record| record.clone()))
    }

    fn close(&self, id: LoanId, at: DateTime<Utc>) -> Result<BorrowRecord, StorageError> {
        let closed = {
            let mut record = self
                .records
                .get_mut(&id)
                .ok_or(StorageError::Missing(Entity::Loan))?;
            if !record.is_open() {
                return Err(StorageError::Missing(Entity::Loan));
            }
            record.returned_at = Some(at);
            record.clone()
        };
        self.open
            .remove_if(&(closed.user_id, closed.book_id), |_, open_id| *open_id == id);
        Ok(closed)
    }

    fn open_for_user(&self, user: UserId) -> Result<Vec<BorrowRecord>, StorageError> {
        Ok(self.collect_sorted(|record| record.user_id == user && record.is_open()))
    }

    fn history_for_user(&self, user: UserId) -> Result<Vec<BorrowRecord>, StorageError> {
        Ok(self.collect_sorted(|record| record.user_id == user))
    }

    fn open_count_for_book(&self, book: BookId) -> Result<usize, StorageError> {
        Ok(self.open.iter().filter(|entry| entry.key().1 == book).count())
    }

    fn all(&self) -> Result<Vec<BorrowRecord>, StorageError> {
        Ok(self.collect_sorted(|_| true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::LoanPolicy;

    fn new_loan(user: u32, book: u32) -> NewLoan {
        LoanPolicy::default()
            .open(UserId(user), BookId(book), Utc::now())
            .unwrap()
    }

    #[test]
    fn catalog_assigns_sequential_ids() {
        let catalog = MemoryCatalog::new();
        let first = catalog.insert(NewBook::new("A", "X", 1), Utc::now()).unwrap();
        let second = catalog.insert(NewBook::new("B", "Y", 2), Utc::now()).unwrap();
        assert_eq!(first.id(), BookId(1));
        assert_eq!(second.id(), BookId(2));
    }

    #[test]
    fn catalog_rejects_rows_that_break_counter_rules() {
        let catalog = MemoryCatalog::new();
        assert!(matches!(
            catalog.insert(NewBook::new("A", "X", 0), Utc::now()),
            Err(StorageError::InvalidRow(_))
        ));
        assert!(matches!(
            catalog.insert(NewBook::new("  ", "X", 1), Utc::now()),
            Err(StorageError::InvalidRow(_))
        ));
        assert!(catalog.list().unwrap().is_empty());

        let book = catalog.insert(NewBook::new("A", "X", 1), Utc::now()).unwrap();
        assert_eq!(book.id(), BookId(1));
    }

    #[test]
    fn catalog_put_missing_row_fails() {
        let catalog = MemoryCatalog::new();
        let book = catalog.insert(NewBook::new("A", "X", 1), Utc::now()).unwrap();
        catalog.remove(book.id()).unwrap();
        assert_eq!(catalog.put(book), Err(StorageError::Missing(Entity::Book)));
    }

    #[test]
    fn catalog_lists_newest_first() {
        let catalog = MemoryCatalog::new();
        let now = Utc::now();
        catalog.insert(NewBook::new("Old", "X", 1), now).unwrap();
        catalog
            .insert(NewBook::new("New", "X", 1), now + chrono::Duration::seconds(1))
            .unwrap();
        let titles: Vec<String> = catalog
            .list()
            .unwrap()
            .iter()
            .map(|b| b.title().to_string())
            .collect();
        assert_eq!(titles, vec!["New", "Old"]);
    }

    #[test]
    fn append_rejects_second_open_loan_for_pair() {
        let loans = MemoryLoanStore::new();
        loans.append(new_loan(1, 1)).unwrap();
        let result = loans.append(new_loan(1, 1));
        assert_eq!(
            result,
            Err(StorageError::OpenLoanExists {
                user: UserId(1),
                book: BookId(1)
            })
        );
        // Other pairs are unaffected
        loans.append(new_loan(2, 1)).unwrap();
        loans.append(new_loan(1, 2)).unwrap();
        assert_eq!(loans.all().unwrap().len(), 3);
    }

    #[test]
    fn close_frees_the_pair_and_keeps_history() {
        let loans = MemoryLoanStore::new();
        let record = loans.append(new_loan(1, 1)).unwrap();
        let closed = loans.close(record.id, Utc::now()).unwrap();
        assert!(!closed.is_open());
        assert_eq!(loans.find_open(UserId(1), BookId(1)).unwrap(), None);
        assert_eq!(loans.open_count_for_book(BookId(1)).unwrap(), 0);

        loans.append(new_loan(1, 1)).unwrap();
        assert_eq!(loans.history_for_user(UserId(1)).unwrap().len(), 2);
        assert_eq!(loans.open_for_user(UserId(1)).unwrap().len(), 1);
    }

    #[test]
    fn close_twice_reports_missing() {
        let loans = MemoryLoanStore::new();
        let record = loans.append(new_loan(1, 1)).unwrap();
        loans.close(record.id, Utc::now()).unwrap();
        assert_eq!(
            loans.close(record.id, Utc::now()),
            Err(StorageError::Missing(Entity::Loan))
        );
    }
}
