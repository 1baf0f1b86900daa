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

//! Catalog entries and their copy counters.
//!
//! A [`Book`] carries two counters: `total_copies`, owned by inventory edits,
//! and `available`, which tracks copies not currently on loan. Only the loan
//! engine and the catalog service move `available`, and only while holding the
//! book's lock.
//!
//! ```text
//!  borrow ──► available - 1        return ──► available + 1 (capped at total)
//!  resize ──► available + (new_total - old_total), clamped to [0, new_total]
//! ```

use crate::base::BookId;
use crate::error::{LibraryError, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalogued title and its copy counters.
///
/// Deserialized rows are checked against the counter rules, so a `Book` is
/// only ever built with `1 <= total_copies` and `available <= total_copies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BookRow")]
pub struct Book {
    id: BookId,
    title: String,
    author: String,
    total_copies: u32,
    available: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Book {
    /// Builds the stored form of a validated [`NewBook`]. Every copy starts on the shelf.
    pub(crate) fn catalogued(id: BookId, new_book: NewBook, at: DateTime<Utc>) -> Self {
        let book = Self {
            id,
            title: new_book.title,
            author: new_book.author,
            total_copies: new_book.total_copies,
            available: new_book.total_copies,
            created_at: at,
            updated_at: at,
        };
        book.assert_invariants();
        book
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn total_copies(&self) -> u32 {
        self.total_copies
    }

    pub fn available(&self) -> u32 {
        self.available
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Copies currently out on loan according to the counters.
    pub fn on_loan(&self) -> u32 {
        self.total_copies.saturating_sub(self.available)
    }

    pub fn is_available(&self) -> bool {
        self.available > 0
    }

    /// True when no copy is out, which is the precondition for deletion.
    pub fn is_fully_shelved(&self) -> bool {
        self.available == self.total_copies
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.total_copies >= 1,
            "Invariant violated: book {} has no copies",
            self.id
        );
        debug_assert!(
            self.available <= self.total_copies,
            "Invariant violated: book {} available {} exceeds total {}",
            self.id,
            self.available,
            self.total_copies
        );
    }

    /// Removes one copy from the shelf (borrow).
    pub(crate) fn take_copy(&mut self, at: DateTime<Utc>) -> Result<(), LibraryError> {
        if self.available == 0 {
            return Err(LibraryError::Exhausted);
        }
        self.available -= 1;
        self.updated_at = at;
        self.assert_invariants();
        Ok(())
    }

    /// Puts one copy back on the shelf (return), never past the total.
    pub(crate) fn restore_copy(&mut self, at: DateTime<Utc>) {
        self.available = (self.available + 1).min(self.total_copies);
        self.updated_at = at;
        self.assert_invariants();
    }

    /// Changes the copy count, shifting `available` by the same delta.
    ///
    /// A shrink larger than the shelf clamps `available` at zero instead of
    /// rejecting the edit.
    pub(crate) fn resize(&mut self, new_total: u32, at: DateTime<Utc>) -> Result<(), LibraryError> {
        if new_total == 0 {
            return Err(LibraryError::InvalidTotal);
        }
        if new_total != self.total_copies {
            let delta = i64::from(new_total) - i64::from(self.total_copies);
            let adjusted = (i64::from(self.available) + delta).clamp(0, i64::from(new_total));
            self.available = u32::try_from(adjusted).map_err(|_| LibraryError::InvalidTotal)?;
            self.total_copies = new_total;
        }
        self.updated_at = at;
        self.assert_invariants();
        Ok(())
    }

    pub(crate) fn set_title(&mut self, title: String) {
        self.title = title;
    }

    pub(crate) fn set_author(&mut self, author: String) {
        self.author = author;
    }
}

/// Wire form of a [`Book`], validated on the way in.
#[derive(Deserialize)]
struct BookRow {
    id: BookId,
    title: String,
    author: String,
    total_copies: u32,
    available: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookRow> for Book {
    type Error = StorageError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        if row.total_copies == 0 {
            return Err(StorageError::InvalidRow(format!(
                "book {} has no copies",
                row.id
            )));
        }
        if row.available > row.total_copies {
            return Err(StorageError::InvalidRow(format!(
                "book {} has {} available of {} copies",
                row.id, row.available, row.total_copies
            )));
        }
        Ok(Self {
            id: row.id,
            title: row.title,
            author: row.author,
            total_copies: row.total_copies,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for creating a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub total_copies: u32,
}

impl NewBook {
    pub fn new(title: impl Into<String>, author: impl Into<String>, total_copies: u32) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            total_copies,
        }
    }

    /// Trims the text fields and checks them and the copy count.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::MissingField`] - Title or author is blank.
    /// - [`LibraryError::InvalidTotal`] - `total_copies` is zero.
    pub fn validated(self) -> Result<Self, LibraryError> {
        let title = required_text(self.title, "title")?;
        let author = required_text(self.author, "author")?;
        if self.total_copies == 0 {
            return Err(LibraryError::InvalidTotal);
        }
        Ok(Self {
            title,
            author,
            total_copies: self.total_copies,
        })
    }
}

/// Partial edit of a catalog entry. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub total_copies: Option<u32>,
}

pub(crate) fn required_text(value: String, field: &'static str) -> Result<String, LibraryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::MissingField(field));
    }
    Ok(trimmed.to_string())
}
