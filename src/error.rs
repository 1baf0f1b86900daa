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

//! Error types for catalog and loan operations.

use crate::base::{BookId, UserId};
use std::fmt;
use thiserror::Error;

/// The kind of record an operation referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Book,
    Loan,
    User,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Book => f.write_str("book"),
            Entity::Loan => f.write_str("loan"),
            Entity::User => f.write_str("user"),
        }
    }
}

/// Failures raised by a catalog or loan store.
///
/// These are retryable from the caller's point of view, except
/// [`StorageError::OpenLoanExists`] which the engine turns into
/// [`LibraryError::AlreadyBorrowed`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The open-loan index already holds a record for this pair
    #[error("open loan already recorded for user {user} and book {book}")]
    OpenLoanExists { user: UserId, book: BookId },

    /// A write targeted a row that is not in the store
    #[error("{0} row missing from store")]
    Missing(Entity),

    /// The backend could not complete the request
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// A row handed to or read from the store breaks the counter rules
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

/// Catalog and loan processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    /// Referenced book, loan or user does not exist
    #[error("{0} not found")]
    NotFound(Entity),

    /// Every copy of the book is on loan
    #[error("no copies available")]
    Exhausted,

    /// The user already holds an open loan for this book
    #[error("book already borrowed by this user")]
    AlreadyBorrowed,

    /// Return requested with no open loan to close
    #[error("no active loan to return")]
    NoActiveLoan,

    /// Delete blocked by outstanding loans
    #[error("book has active loans")]
    HasActiveLoans,

    /// Copy count is zero or otherwise unusable
    #[error("invalid total copies (must be at least 1)")]
    InvalidTotal,

    /// A required text field is blank
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A book with the same title and author is already catalogued
    #[error("book with this title and author already exists")]
    DuplicateBook,

    /// Borrow time plus the loan period does not fit a timestamp
    #[error("due date out of range")]
    DueDateOutOfRange,

    /// The book lock could not be acquired within the configured timeout
    #[error("concurrent update in progress, retry")]
    ConcurrencyConflict,

    /// Underlying store failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
