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

use book_loans_rs::{
    BookId, Library, LibraryConfig, LibraryError, NewBook, Principal, SearchMode, UserId,
};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Library Loans - Replay catalog and loan operations from CSV
///
/// Reads operations from a CSV file and writes the resulting catalog to stdout.
/// Supports adding books, borrowing, returning, resizing and deleting.
#[derive(Parser, Debug)]
#[command(name = "book-loans-rs")]
#[command(about = "Replays library operations from CSV and prints the catalog", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,user,book,title,author,copies
    /// Example: cargo run -- operations.csv > books.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Write the loan log as CSV to this file
    #[arg(long, value_name = "FILE")]
    loans: Option<PathBuf>,

    /// Days between borrow and due date
    #[arg(long, env = "LIBRARY_LOAN_PERIOD_DAYS", default_value_t = 14)]
    loan_period_days: u32,

    /// Match search queries case-sensitively
    #[arg(long, env = "LIBRARY_CASE_SENSITIVE_SEARCH")]
    case_sensitive_search: bool,

    /// Give up on a busy book after this many milliseconds
    #[arg(long, env = "LIBRARY_LOCK_TIMEOUT_MS")]
    lock_timeout_ms: Option<u64>,
}

impl Args {
    fn config(&self) -> LibraryConfig {
        LibraryConfig {
            loan_period_days: self.loan_period_days,
            search_mode: if self.case_sensitive_search {
                SearchMode::CaseSensitive
            } else {
                SearchMode::CaseInsensitive
            },
            lock_timeout_ms: self.lock_timeout_ms,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("book_loans_rs=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let library = match Library::in_memory(args.config()) {
        Ok(library) => library,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            process::exit(2);
        }
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    if let Err(e) = process_operations(&library, BufReader::new(file)) {
        tracing::error!("Error processing operations: {}", e);
        process::exit(1);
    }

    if let Err(e) = write_books(&library, std::io::stdout()) {
        tracing::error!("Error writing output: {}", e);
        process::exit(1);
    }

    if let Some(path) = &args.loans {
        let result = File::create(path)
            .map_err(csv::Error::from)
            .and_then(|file| write_loans(&library, file));
        if let Err(e) = result {
            tracing::error!("Error writing loans to '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, user, book, title, author, copies`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    user: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    book: Option<u32>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    copies: Option<u32>,
}

/// A decoded row.
#[derive(Debug)]
enum Operation {
    Add(NewBook),
    Borrow(UserId, BookId),
    Return(UserId, BookId),
    Resize(BookId, u32),
    Delete(BookId),
}

impl CsvRecord {
    /// Converts a CSV record to an operation.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_operation(self) -> Option<Operation> {
        match self.op.to_lowercase().as_str() {
            "add" => Some(Operation::Add(NewBook::new(
                self.title?,
                self.author?,
                self.copies?,
            ))),
            "borrow" => Some(Operation::Borrow(UserId(self.user?), BookId(self.book?))),
            "return" => Some(Operation::Return(UserId(self.user?), BookId(self.book?))),
            "resize" => Some(Operation::Resize(BookId(self.book?), self.copies?)),
            "delete" => Some(Operation::Delete(BookId(self.book?))),
            _ => None,
        }
    }
}

fn apply(library: &Library, operation: Operation) -> Result<(), LibraryError> {
    match operation {
        Operation::Add(new_book) => library.catalog().create_book(new_book).map(|_| ()),
        Operation::Borrow(user, book) => library
            .engine()
            .borrow(&Principal::member(user), book)
            .map(|_| ()),
        Operation::Return(user, book) => library
            .engine()
            .return_book(&Principal::member(user), book)
            .map(|_| ()),
        Operation::Resize(book, copies) => {
            library.catalog().update_total_copies(book, copies).map(|_| ())
        }
        Operation::Delete(book) => library.catalog().delete_book(book).map(|_| ()),
    }
}

/// Replays operations from a CSV reader against `library`.
///
/// Rows are streamed, so large files are never held in memory. Malformed rows
/// and rejected operations are logged and skipped.
///
/// # CSV Format
///
/// Expected columns: `op, user, book, title, author, copies`
/// - `op`: add, borrow, return, resize or delete
/// - `user`: User ID (borrow/return)
/// - `book`: Book ID (all but add); ids are assigned 1, 2, ... in add order
/// - `title`, `author`, `copies`: add only (`copies` also for resize)
///
/// # Example
///
/// ```csv
/// op,user,book,title,author,copies
/// add,,,Dune,Frank Herbert,2
/// borrow,7,1,,,
/// return,7,1,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the header is unreadable.
pub fn process_operations<R: Read>(library: &Library, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (line, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = line + 2, "Skipping malformed row: {}", e);
                continue;
            }
        };
        let Some(operation) = record.into_operation() else {
            tracing::warn!(line = line + 2, "Skipping invalid operation record");
            continue;
        };
        if let Err(e) = apply(library, operation) {
            tracing::info!(line = line + 2, "Operation rejected: {}", e);
        }
    }

    Ok(())
}

/// Writes the catalog as CSV, newest first.
///
/// # CSV Format
///
/// Columns: `id, title, author, total_copies, available, created_at, updated_at`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_books<W: Write>(library: &Library, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    let books = library
        .catalog()
        .find_all()
        .map_err(|e| csv::Error::from(std::io::Error::other(e)))?;
    for book in &books {
        wtr.serialize(book)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the loan log as CSV, newest first.
///
/// # CSV Format
///
/// Columns: `id, user_id, book_id, borrowed_at, due_date, returned_at`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_loans<W: Write>(library: &Library, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    let loans = library
        .engine()
        .all_loans()
        .map_err(|e| csv::Error::from(std::io::Error::other(e)))?;
    for loan in &loans {
        wtr.serialize(loan)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn replay(csv: &str) -> Library {
        let library = Library::in_memory(LibraryConfig::default()).unwrap();
        process_operations(&library, Cursor::new(csv)).unwrap();
        library
    }

    #[test]
    fn parse_add_and_borrow() {
        let library = replay(
            "op,user,book,title,author,copies\n\
             add,,,Dune,Frank Herbert,2\n\
             borrow,7,1,,,\n",
        );

        let book = library.catalog().get_book(BookId(1)).unwrap();
        assert_eq!(book.total_copies(), 2);
        assert_eq!(book.available(), 1);
        assert_eq!(library.engine().open_loans_for_user(UserId(7)).unwrap().len(), 1);
    }

    #[test]
    fn parse_borrow_return_sequence() {
        let library = replay(
            "op,user,book,title,author,copies\n\
             add,,,Dune,Frank Herbert,1\n\
             borrow,7,1,,,\n\
             return,7,1,,,\n",
        );

        let book = library.catalog().get_book(BookId(1)).unwrap();
        assert_eq!(book.available(), 1);
        assert_eq!(library.engine().all_loans().unwrap().len(), 1);
        assert!(library.engine().open_loans_for_user(UserId(7)).unwrap().is_empty());
    }

    #[test]
    fn rejected_operations_are_skipped() {
        let library = replay(
            "op,user,book,title,author,copies\n\
             add,,,Dune,Frank Herbert,1\n\
             borrow,7,1,,,\n\
             borrow,8,1,,,\n\
             delete,,1,,,\n\
             return,9,1,,,\n",
        );

        let book = library.catalog().get_book(BookId(1)).unwrap();
        assert_eq!(book.available(), 0);
        assert_eq!(library.engine().all_loans().unwrap().len(), 1);
    }

    #[test]
    fn parse_resize_and_delete() {
        let library = replay(
            "op,user,book,title,author,copies\n\
             add,,,Dune,Frank Herbert,1\n\
             add,,,Emma,Jane Austen,3\n\
             resize,,2,,,5\n\
             delete,,1,,,\n",
        );

        assert_eq!(library.catalog().find_all().unwrap().len(), 1);
        assert_eq!(library.catalog().get_book(BookId(2)).unwrap().available(), 5);
    }

    #[test]
    fn parse_with_whitespace() {
        let library = replay("op,user,book,title,author,copies\n add , , , Dune , Frank Herbert , 2 \n");
        let book = library.catalog().get_book(BookId(1)).unwrap();
        assert_eq!(book.title(), "Dune");
        assert_eq!(book.available(), 2);
    }

    #[test]
    fn skip_malformed_rows() {
        let library = replay(
            "op,user,book,title,author,copies\n\
             add,,,Dune,Frank Herbert,1\n\
             fly,to,the,moon,now,please\n\
             add,,,Emma,Jane Austen,1\n",
        );
        assert_eq!(library.catalog().find_all().unwrap().len(), 2);
    }

    #[test]
    fn write_books_to_csv() {
        let library = replay(
            "op,user,book,title,author,copies\n\
             add,,,Dune,Frank Herbert,2\n",
        );

        let mut output = Vec::new();
        write_books(&library, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.starts_with("id,title,author,total_copies,available,created_at,updated_at"));
        assert!(output_str.contains("1,Dune,Frank Herbert,2,2,"));
    }

    #[test]
    fn write_loans_to_csv() {
        let library = replay(
            "op,user,book,title,author,copies\n\
             add,,,Dune,Frank Herbert,2\n\
             borrow,7,1,,,\n",
        );

        let mut output = Vec::new();
        write_loans(&library, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.starts_with("id,user_id,book_id,borrowed_at,due_date,returned_at"));
        assert!(output_str.contains("\n1,7,1,"));
    }
}
