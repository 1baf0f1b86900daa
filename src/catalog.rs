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

//! Catalog management: CRUD, inventory edits and search.
//!
//! Writes that touch a book's counters take the same per-book lock as the
//! loan engine, so a copy-count edit or a delete never interleaves with a
//! borrow or return of that book.

use crate::base::BookId;
use crate::book::{Book, BookUpdate, NewBook, required_text};
use crate::config::SearchMode;
use crate::error::{Entity, LibraryError};
use crate::locks::BookLocks;
use crate::store::{CatalogStore, LoanStore};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct CatalogService {
    catalog: Arc<dyn CatalogStore>,
    loans: Arc<dyn LoanStore>,
    locks: Arc<BookLocks>,
    search_mode: SearchMode,
    /// Serializes creates so the duplicate check and the insert are one step.
    create_lock: Mutex<()>,
}

impl CatalogService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        loans: Arc<dyn LoanStore>,
        locks: Arc<BookLocks>,
        search_mode: SearchMode,
    ) -> Self {
        Self {
            catalog,
            loans,
            locks,
            search_mode,
            create_lock: Mutex::new(()),
        }
    }

    /// Adds a title to the catalog with every copy on the shelf.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::MissingField`] - Title or author is blank.
    /// - [`LibraryError::InvalidTotal`] - Zero copies.
    /// - [`LibraryError::DuplicateBook`] - Same title and author already catalogued.
    pub fn create_book(&self, new_book: NewBook) -> Result<Book, LibraryError> {
        let new_book = new_book.validated()?;
        let _guard = self.create_lock.lock();
        if self
            .catalog
            .find_by_title_and_author(&new_book.title, &new_book.author)?
            .is_some()
        {
            return Err(LibraryError::DuplicateBook);
        }
        let book = self.catalog.insert(new_book, Utc::now())?;
        tracing::debug!(book = %book.id(), title = book.title(), copies = book.total_copies(), "book created");
        Ok(book)
    }

    pub fn get_book(&self, book_id: BookId) -> Result<Book, LibraryError> {
        self.catalog
            .get(book_id)?
            .ok_or(LibraryError::NotFound(Entity::Book))
    }

    /// Sets a new copy count, moving `available` by the same delta.
    ///
    /// `available` is clamped to `[0, new_total]`; shrinking below the number
    /// of copies on loan is accepted and leaves nothing on the shelf.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] - The book does not exist.
    /// - [`LibraryError::InvalidTotal`] - `new_total` is zero.
    pub fn update_total_copies(
        &self,
        book_id: BookId,
        new_total: u32,
    ) -> Result<Book, LibraryError> {
        self.update_book(
            book_id,
            BookUpdate {
                total_copies: Some(new_total),
                ..BookUpdate::default()
            },
        )
    }

    /// Applies a partial edit under the book lock.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] - The book does not exist.
    /// - [`LibraryError::MissingField`] - A supplied title or author is blank.
    /// - [`LibraryError::InvalidTotal`] - A supplied copy count is zero.
    pub fn update_book(&self, book_id: BookId, update: BookUpdate) -> Result<Book, LibraryError> {
        let title = update.title.map(|t| required_text(t, "title")).transpose()?;
        let author = update.author.map(|a| required_text(a, "author")).transpose()?;
        if update.total_copies == Some(0) {
            return Err(LibraryError::InvalidTotal);
        }

        let _guard = self.locks.acquire(book_id)?;
        let mut book = self.get_book(book_id)?;
        let now = Utc::now();
        if let Some(title) = title {
            book.set_title(title);
        }
        if let Some(author) = author {
            book.set_author(author);
        }
        if let Some(total) = update.total_copies {
            book.resize(total, now)?;
        }
        self.catalog.put(book.clone())?;

        tracing::debug!(
            book = %book_id,
            total = book.total_copies(),
            available = book.available(),
            "book updated"
        );
        Ok(book)
    }

    /// Removes a book that has no copies out.
    ///
    /// The book lock is taken before the check, so a borrow racing the delete
    /// either lands first (and the delete fails) or finds the book gone.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] - The book does not exist.
    /// - [`LibraryError::HasActiveLoans`] - Copies are out, or open loans reference it.
    pub fn delete_book(&self, book_id: BookId) -> Result<Book, LibraryError> {
        let _guard = self.locks.acquire(book_id)?;
        let book = self.get_book(book_id)?;
        if !book.is_fully_shelved() || self.loans.open_count_for_book(book_id)? > 0 {
            return Err(LibraryError::HasActiveLoans);
        }
        let removed = self
            .catalog
            .remove(book_id)?
            .ok_or(LibraryError::NotFound(Entity::Book))?;

        tracing::debug!(book = %book_id, "book deleted");
        Ok(removed)
    }

    /// Every book, newest first.
    pub fn find_all(&self) -> Result<Vec<Book>, LibraryError> {
        Ok(self.catalog.list()?)
    }

    /// Books with at least one copy on the shelf, newest first.
    pub fn find_available(&self) -> Result<Vec<Book>, LibraryError> {
        Ok(self
            .catalog
            .list()?
            .into_iter()
            .filter(Book::is_available)
            .collect())
    }

    /// Substring match over title or author, taking the query as given.
    /// An empty query returns everything.
    pub fn search(&self, query: &str) -> Result<Vec<Book>, LibraryError> {
        let books = self.catalog.list()?;
        if query.is_empty() {
            return Ok(books);
        }
        Ok(books
            .into_iter()
            .filter(|book| {
                self.search_mode.matches(book.title(), query)
                    || self.search_mode.matches(book.author(), query)
            })
            .collect())
    }
}
