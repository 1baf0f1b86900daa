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

//! Loan engine public API integration tests.

use book_loans_rs::{
    BookId, Entity, Library, LibraryConfig, LibraryError, LoanId, NewBook, Principal, UserId,
};
use chrono::Duration;

fn library() -> Library {
    Library::in_memory(LibraryConfig::default()).unwrap()
}

fn add_book(library: &Library, title: &str, copies: u32) -> BookId {
    library
        .catalog()
        .create_book(NewBook::new(title, "Some Author", copies))
        .unwrap()
        .id()
}

fn member(id: u32) -> Principal {
    Principal::member(UserId(id))
}

fn available(library: &Library, book: BookId) -> u32 {
    library.catalog().get_book(book).unwrap().available()
}

#[test]
fn borrow_decrements_available_and_opens_record() {
    let library = library();
    let book = add_book(&library, "Dune", 3);

    let record = library.engine().borrow(&member(1), book).unwrap();

    assert_eq!(record.user_id, UserId(1));
    assert_eq!(record.book_id, book);
    assert!(record.is_open());
    assert_eq!(record.due_date - record.borrowed_at, Duration::days(14));
    assert_eq!(available(&library, book), 2);
}

/// Book{total=3} -> borrow -> duplicate borrow -> return.
#[test]
fn borrow_duplicate_then_return_scenario() {
    let library = library();
    let book = add_book(&library, "Dune", 3);
    let user = member(1);

    library.engine().borrow(&user, book).unwrap();
    assert_eq!(available(&library, book), 2);

    let result = library.engine().borrow(&user, book);
    assert_eq!(result, Err(LibraryError::AlreadyBorrowed));
    assert_eq!(available(&library, book), 2, "failed borrow must not move the counter");

    let closed = library.engine().return_book(&user, book).unwrap();
    assert!(closed.returned_at.is_some());
    assert_eq!(available(&library, book), 3);
}

#[test]
fn borrow_exhausted_book_fails() {
    let library = library();
    let book = add_book(&library, "Dune", 1);
    library.engine().borrow(&member(1), book).unwrap();
    assert_eq!(available(&library, book), 0);

    let result = library.engine().borrow(&member(2), book);
    assert_eq!(result, Err(LibraryError::Exhausted));
    assert!(library.engine().open_loans_for_user(UserId(2)).unwrap().is_empty());
}

#[test]
fn borrow_missing_book_fails() {
    let library = library();
    let result = library.engine().borrow(&member(1), BookId(42));
    assert_eq!(result, Err(LibraryError::NotFound(Entity::Book)));
}

/// Preconditions short-circuit in order: existence, availability, duplicate.
#[test]
fn exhausted_is_reported_before_already_borrowed() {
    let library = library();
    let book = add_book(&library, "Dune", 1);
    let user = member(1);
    library.engine().borrow(&user, book).unwrap();

    assert_eq!(library.engine().borrow(&user, book), Err(LibraryError::Exhausted));
}

#[test]
fn return_twice_fails_and_counter_moves_once() {
    let library = library();
    let book = add_book(&library, "Dune", 2);
    let user = member(1);
    library.engine().borrow(&user, book).unwrap();

    library.engine().return_book(&user, book).unwrap();
    assert_eq!(available(&library, book), 2);

    let result = library.engine().return_book(&user, book);
    assert_eq!(result, Err(LibraryError::NoActiveLoan));
    assert_eq!(available(&library, book), 2);
}

#[test]
fn return_without_loan_fails() {
    let library = library();
    let book = add_book(&library, "Dune", 2);
    library.engine().borrow(&member(1), book).unwrap();

    let result = library.engine().return_book(&member(2), book);
    assert_eq!(result, Err(LibraryError::NoActiveLoan));
    assert_eq!(available(&library, book), 1);
}

#[test]
fn return_missing_book_fails() {
    let library = library();
    let result = library.engine().return_book(&member(1), BookId(9));
    assert_eq!(result, Err(LibraryError::NotFound(Entity::Book)));
}

#[test]
fn return_by_loan_id() {
    let library = library();
    let book = add_book(&library, "Dune", 1);
    let record = library.engine().borrow(&member(1), book).unwrap();

    let closed = library.engine().return_loan(record.id).unwrap();
    assert_eq!(closed.id, record.id);
    assert!(!closed.is_open());
    assert_eq!(available(&library, book), 1);

    assert_eq!(
        library.engine().return_loan(record.id),
        Err(LibraryError::NoActiveLoan)
    );
    assert_eq!(
        library.engine().return_loan(LoanId(999)),
        Err(LibraryError::NotFound(Entity::Loan))
    );
}

#[test]
fn borrow_again_after_return_creates_new_record() {
    let library = library();
    let book = add_book(&library, "Dune", 1);
    let user = member(1);

    let first = library.engine().borrow(&user, book).unwrap();
    library.engine().return_book(&user, book).unwrap();
    let second = library.engine().borrow(&user, book).unwrap();

    assert_ne!(first.id, second.id);
    let history = library.engine().loan_history_for_user(UserId(1)).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|r| r.is_open()).count(), 1);
}

#[test]
fn check_availability_tracks_counter() {
    let library = library();
    let book = add_book(&library, "Dune", 1);
    assert!(library.engine().check_availability(book).unwrap());

    library.engine().borrow(&member(1), book).unwrap();
    assert!(!library.engine().check_availability(book).unwrap());

    assert_eq!(
        library.engine().check_availability(BookId(77)),
        Err(LibraryError::NotFound(Entity::Book))
    );
}

#[test]
fn open_loans_and_borrowed_books_per_user() {
    let library = library();
    let dune = add_book(&library, "Dune", 2);
    let emma = add_book(&library, "Emma", 2);
    let user = member(1);

    library.engine().borrow(&user, dune).unwrap();
    library.engine().borrow(&user, emma).unwrap();
    library.engine().borrow(&member(2), dune).unwrap();
    library.engine().return_book(&user, dune).unwrap();

    let open = library.engine().open_loans_for_user(UserId(1)).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].book_id, emma);

    let books = library.engine().borrowed_books(UserId(1)).unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title(), "Emma");

    assert_eq!(library.engine().all_loans().unwrap().len(), 3);
}

#[test]
fn all_loans_are_newest_first() {
    let library = library();
    let book = add_book(&library, "Dune", 5);
    for user in 1..=3 {
        library.engine().borrow(&member(user), book).unwrap();
    }

    let loans = library.engine().all_loans().unwrap();
    let ids: Vec<LoanId> = loans.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![LoanId(3), LoanId(2), LoanId(1)]);
}

#[test]
fn custom_loan_period_sets_due_date() {
    let config = LibraryConfig {
        loan_period_days: 30,
        ..LibraryConfig::default()
    };
    let library = Library::in_memory(config).unwrap();
    let book = add_book(&library, "Dune", 1);

    let record = library.engine().borrow(&member(1), book).unwrap();
    assert_eq!(record.due_date - record.borrowed_at, Duration::days(30));
}

#[test]
fn admin_principal_borrows_like_anyone_else() {
    let library = library();
    let book = add_book(&library, "Dune", 1);
    let admin = Principal::admin(UserId(100));
    assert!(admin.is_admin());

    let record = library.engine().borrow(&admin, book).unwrap();
    assert_eq!(record.user_id, UserId(100));
}

/// The counter matches the open loan count after a mixed sequence.
#[test]
fn counter_matches_open_loans_after_mixed_operations() {
    let library = library();
    let book = add_book(&library, "Dune", 4);

    for user in 1..=4 {
        library.engine().borrow(&member(user), book).unwrap();
    }
    library.engine().return_book(&member(2), book).unwrap();
    library.engine().return_book(&member(4), book).unwrap();
    library.engine().borrow(&member(5), book).unwrap();

    let open = library
        .engine()
        .all_loans()
        .unwrap()
        .into_iter()
        .filter(|r| r.book_id == book && r.is_open())
        .count() as u32;
    let book = library.catalog().get_book(book).unwrap();
    assert_eq!(book.total_copies() - book.available(), open);
    assert_eq!(open, 3);
}
