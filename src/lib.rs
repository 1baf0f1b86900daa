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

//! # Book Loans
//!
//! This library provides the borrow/return engine of a lending library: it keeps
//! each book's available-copy counter consistent with its open borrow records
//! while borrows, returns and inventory edits run in parallel.
//!
//! ## Core Components
//!
//! - [`Library`]: Opens the stores once and shares them with both services
//! - [`LoanEngine`]: Borrow, return and loan queries
//! - [`CatalogService`]: Book CRUD, copy-count edits, guarded delete, search
//! - [`CatalogStore`] / [`LoanStore`]: Persistence seams, with in-memory implementations
//! - [`LibraryError`]: Error kinds returned to the access layer
//!
//! ## Example
//!
//! ```
//! use book_loans_rs::{Library, LibraryConfig, LibraryError, NewBook, Principal, UserId};
//!
//! let library = Library::in_memory(LibraryConfig::default()).unwrap();
//! let book = library
//!     .catalog()
//!     .create_book(NewBook::new("Dune", "Frank Herbert", 1))
//!     .unwrap();
//!
//! let alice = Principal::member(UserId(1));
//! let loan = library.engine().borrow(&alice, book.id()).unwrap();
//! assert!(loan.is_open());
//!
//! let bob = Principal::member(UserId(2));
//! assert_eq!(library.engine().borrow(&bob, book.id()), Err(LibraryError::Exhausted));
//!
//! library.engine().return_book(&alice, book.id()).unwrap();
//! assert!(library.engine().check_availability(book.id()).unwrap());
//! ```
//!
//! ## Thread Safety
//!
//! All writers of a book serialize on that book's mutex; different books are
//! processed in parallel. Stores are shared through `Arc` and must be
//! `Send + Sync`.

mod base;
pub mod book;
mod catalog;
pub mod config;
mod engine;
pub mod error;
mod library;
pub mod loan;
mod locks;
mod principal;
pub mod store;

pub use base::{BookId, LoanId, UserId};
pub use book::{Book, BookUpdate, NewBook};
pub use catalog::CatalogService;
pub use config::{LibraryConfig, SearchMode};
pub use engine::LoanEngine;
pub use error::{Entity, LibraryError, StorageError};
pub use library::Library;
pub use loan::{BorrowRecord, LoanPolicy, NewLoan};
pub use locks::{BookGuard, BookLocks};
pub use principal::{Principal, Role};
pub use store::{CatalogStore, LoanStore, MemoryCatalog, MemoryLoanStore};
