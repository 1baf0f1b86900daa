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

//! Borrow/return processing.
//!
//! The [`LoanEngine`] keeps two linked pieces of state consistent: a book's
//! `available` counter and the set of open borrow records for that book.
//!
//! # Processing
//!
//! - **Borrow**: Checks the book exists, has a copy on the shelf and is not
//!   already held by the caller, then takes a copy and appends an open record.
//! - **Return**: Finds the caller's open record, puts the copy back and closes it.
//!
//! # Atomicity
//!
//! Each operation runs under the book's lock from [`BookLocks`], so borrows,
//! returns and inventory edits on one book are serialized while different
//! books proceed in parallel. Within the lock the counter is written first and
//! the record second; if the record write fails the counter write is undone,
//! so no caller ever sees a committed record without its counter change.

use crate::base::{BookId, LoanId, UserId};
use crate::book::Book;
use crate::error::{Entity, LibraryError, StorageError};
use crate::loan::{BorrowRecord, LoanPolicy};
use crate::locks::BookLocks;
use crate::principal::Principal;
use crate::store::{CatalogStore, LoanStore};
use chrono::Utc;
use std::sync::Arc;

/// Borrow/return engine over injected catalog and loan stores.
///
/// # Invariants
///
/// - `0 <= available <= total_copies` for every book.
/// - `total_copies - available` equals the number of open records for the book
///   (up to copy-count shrinks, which clamp instead of failing).
/// - At most one open record per (user, book).
#[derive(Clone)]
pub struct LoanEngine {
    catalog: Arc<dyn CatalogStore>,
    loans: Arc<dyn LoanStore>,
    locks: Arc<BookLocks>,
    policy: LoanPolicy,
}

impl LoanEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        loans: Arc<dyn LoanStore>,
        locks: Arc<BookLocks>,
        policy: LoanPolicy,
    ) -> Self {
        Self {
            catalog,
            loans,
            locks,
            policy,
        }
    }

    pub fn policy(&self) -> LoanPolicy {
        self.policy
    }

    /// Lends one copy of `book_id` to the caller.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - [`LibraryError::NotFound`] - The book does not exist.
    /// - [`LibraryError::Exhausted`] - No copy is on the shelf.
    /// - [`LibraryError::AlreadyBorrowed`] - The caller already holds an open loan for it.
    /// - [`LibraryError::DueDateOutOfRange`] - The loan period overflows the due date.
    /// - [`LibraryError::ConcurrencyConflict`] - Book lock timed out.
    /// - [`LibraryError::Storage`] - A store call failed; nothing was committed.
    pub fn borrow(
        &self,
        principal: &Principal,
        book_id: BookId,
    ) -> Result<BorrowRecord, LibraryError> {
        let user_id = principal.user_id;
        let _guard = self.locks.acquire(book_id)?;

        let mut book = self.load_book(book_id)?;
        if !book.is_available() {
            return Err(LibraryError::Exhausted);
        }
        if self.loans.find_open(user_id, book_id)?.is_some() {
            return Err(LibraryError::AlreadyBorrowed);
        }

        let now = Utc::now();
        let loan = self.policy.open(user_id, book_id, now)?;
        let before = book.clone();
        book.take_copy(now)?;
        self.catalog.put(book)?;

        let record = match self.loans.append(loan) {
            Ok(record) => record,
            Err(err) => {
                self.undo_counter(before);
                return Err(match err {
                    StorageError::OpenLoanExists { .. } => LibraryError::AlreadyBorrowed,
                    other => other.into(),
                });
            }
        };

        tracing::debug!(
            user = %user_id,
            book = %book_id,
            loan = %record.id,
            due = %record.due_date,
            "book borrowed"
        );
        Ok(record)
    }

    /// Closes the caller's open loan of `book_id` and shelves the copy.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] - The book does not exist.
    /// - [`LibraryError::NoActiveLoan`] - The caller has nothing open for this book.
    /// - [`LibraryError::ConcurrencyConflict`] - Book lock timed out.
    /// - [`LibraryError::Storage`] - A store call failed; nothing was committed.
    pub fn return_book(
        &self,
        principal: &Principal,
        book_id: BookId,
    ) -> Result<BorrowRecord, LibraryError> {
        let user_id = principal.user_id;
        let _guard = self.locks.acquire(book_id)?;

        let book = self.load_book(book_id)?;
        let record = self
            .loans
            .find_open(user_id, book_id)?
            .ok_or(LibraryError::NoActiveLoan)?;

        self.close_locked(book, record.id)
    }

    /// Closes a loan by its id, whoever holds it.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] - No such loan.
    /// - [`LibraryError::NoActiveLoan`] - The loan was already returned.
    pub fn return_loan(&self, loan_id: LoanId) -> Result<BorrowRecord, LibraryError> {
        // The record's book id never changes, so it is safe to read it before locking.
        let record = self
            .loans
            .get(loan_id)?
            .ok_or(LibraryError::NotFound(Entity::Loan))?;
        let _guard = self.locks.acquire(record.book_id)?;

        let record = self
            .loans
            .get(loan_id)?
            .ok_or(LibraryError::NotFound(Entity::Loan))?;
        if !record.is_open() {
            return Err(LibraryError::NoActiveLoan);
        }
        let book = self.load_book(record.book_id)?;

        self.close_locked(book, record.id)
    }

    /// Reports whether at least one copy of the book is on the shelf.
    pub fn check_availability(&self, book_id: BookId) -> Result<bool, LibraryError> {
        Ok(self.load_book(book_id)?.is_available())
    }

    /// Snapshot of the user's open loans, newest first.
    pub fn open_loans_for_user(&self, user_id: UserId) -> Result<Vec<BorrowRecord>, LibraryError> {
        Ok(self.loans.open_for_user(user_id)?)
    }

    /// Every loan the user ever had, newest first.
    pub fn loan_history_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<BorrowRecord>, LibraryError> {
        Ok(self.loans.history_for_user(user_id)?)
    }

    /// The books behind the user's open loans.
    pub fn borrowed_books(&self, user_id: UserId) -> Result<Vec<Book>, LibraryError> {
        let mut books = Vec::new();
        for record in self.loans.open_for_user(user_id)? {
            if let Some(book) = self.catalog.get(record.book_id)? {
                books.push(book);
            }
        }
        Ok(books)
    }

    /// Every loan in the system, newest first.
    pub fn all_loans(&self) -> Result<Vec<BorrowRecord>, LibraryError> {
        Ok(self.loans.all()?)
    }

    fn load_book(&self, book_id: BookId) -> Result<Book, LibraryError> {
        self.catalog
            .get(book_id)?
            .ok_or(LibraryError::NotFound(Entity::Book))
    }

    /// Shelves the copy then closes the record. Caller holds the book lock.
    fn close_locked(&self, mut book: Book, loan_id: LoanId) -> Result<BorrowRecord, LibraryError> {
        let now = Utc::now();
        let before = book.clone();
        book.restore_copy(now);
        self.catalog.put(book)?;

        let closed = match self.loans.close(loan_id, now) {
            Ok(closed) => closed,
            Err(err) => {
                self.undo_counter(before);
                return Err(match err {
                    StorageError::Missing(Entity::Loan) => LibraryError::NoActiveLoan,
                    other => other.into(),
                });
            }
        };

        tracing::debug!(
            user = %closed.user_id,
            book = %closed.book_id,
            loan = %closed.id,
            "book returned"
        );
        Ok(closed)
    }

    fn undo_counter(&self, before: Book) {
        let book_id = before.id();
        if let Err(err) = self.catalog.put(before) {
            tracing::warn!(book = %book_id, error = %err, "failed to undo counter change");
        } else {
            tracing::warn!(book = %book_id, "loan write failed, counter change undone");
        }
    }
}
