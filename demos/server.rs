//! Simple REST API server demo for the loan engine.
//!
//! Run with: `cargo run --example server`
//!
//! Authentication is out of scope here: the caller identity comes straight
//! from the `x-user-id` and `x-role` headers, standing in for a verified token.
//!
//! ## Endpoints
//!
//! - `GET /books?q=` - List or search books
//! - `GET /books/available` - Books with a copy on the shelf
//! - `GET /books/{id}` - Get a book
//! - `GET /books/{id}/availability` - Whether a copy is on the shelf
//! - `POST /books` - Create a book (admin)
//! - `PUT /books/{id}` - Edit a book (admin)
//! - `DELETE /books/{id}` - Delete a book (admin)
//! - `POST /books/{id}/borrow` - Borrow a copy
//! - `POST /books/{id}/return` - Return a copy
//! - `GET /loans/me` - The caller's open loans
//! - `GET /loans/me/history` - The caller's loan history
//! - `GET /loans` - All loans (admin)
//!
//! ## Example Usage
//!
//! ```bash
//! # Create a book
//! curl -X POST http://localhost:3000/books \
//!   -H "Content-Type: application/json" -H "x-user-id: 1" -H "x-role: admin" \
//!   -d '{"title": "Dune", "author": "Frank Herbert", "total_copies": 2}'
//!
//! # Borrow it
//! curl -X POST http://localhost:3000/books/1/borrow -H "x-user-id: 7"
//!
//! # See open loans
//! curl http://localhost:3000/loans/me -H "x-user-id: 7"
//! ```

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use book_loans_rs::{
    Book, BookId, BookUpdate, BorrowRecord, Entity, Library, LibraryConfig, LibraryError, NewBook,
    Principal, Role, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub book_id: BookId,
    pub available: bool,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state holding the opened library.
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<Library>,
}

// === Caller Identity ===

/// The authenticated caller, built once per request from headers.
pub struct Caller(Principal);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or(AppError::Unauthenticated)?;
        let role = match parts.headers.get("x-role").and_then(|v| v.to_str().ok()) {
            Some("admin") => Role::Admin,
            _ => Role::Member,
        };
        Ok(Caller(Principal {
            user_id: UserId(user_id),
            role,
        }))
    }
}

impl Caller {
    fn require_admin(&self) -> Result<(), AppError> {
        if self.0.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

// === Error Handling ===

/// Maps library errors and access failures onto HTTP responses.
pub enum AppError {
    Library(LibraryError),
    Unauthenticated,
    Forbidden,
}

impl From<LibraryError> for AppError {
    fn from(err: LibraryError) -> Self {
        AppError::Library(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "missing or invalid x-user-id".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "admin role required".to_string(),
            ),
            AppError::Library(err) => {
                let (status, code) = match err {
                    LibraryError::NotFound(Entity::Book) => (StatusCode::NOT_FOUND, "BOOK_NOT_FOUND"),
                    LibraryError::NotFound(Entity::Loan) => (StatusCode::NOT_FOUND, "LOAN_NOT_FOUND"),
                    LibraryError::NotFound(Entity::User) => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
                    LibraryError::Exhausted => (StatusCode::CONFLICT, "EXHAUSTED"),
                    LibraryError::AlreadyBorrowed => (StatusCode::CONFLICT, "ALREADY_BORROWED"),
                    LibraryError::NoActiveLoan => (StatusCode::CONFLICT, "NO_ACTIVE_LOAN"),
                    LibraryError::HasActiveLoans => (StatusCode::CONFLICT, "HAS_ACTIVE_LOANS"),
                    LibraryError::InvalidTotal => (StatusCode::BAD_REQUEST, "INVALID_TOTAL"),
                    LibraryError::MissingField(_) => (StatusCode::BAD_REQUEST, "MISSING_FIELD"),
                    LibraryError::DuplicateBook => (StatusCode::CONFLICT, "DUPLICATE_BOOK"),
                    LibraryError::DueDateOutOfRange => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "DUE_DATE_OUT_OF_RANGE")
                    }
                    LibraryError::ConcurrencyConflict => {
                        (StatusCode::SERVICE_UNAVAILABLE, "CONCURRENCY_CONFLICT")
                    }
                    LibraryError::Storage(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
                    }
                };
                (status, code, err.to_string())
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// GET /books - List all books, or search with `?q=`.
async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(state.library.catalog().search(&params.q)?))
}

/// GET /books/available - Books with at least one copy on the shelf.
async fn list_available(State(state): State<AppState>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(state.library.catalog().find_available()?))
}

/// GET /books/{id} - Get a book by ID.
async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(state.library.catalog().get_book(BookId(id))?))
}

/// GET /books/{id}/availability - Whether a copy can be borrowed right now.
async fn availability(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let book_id = BookId(id);
    let available = state.library.engine().check_availability(book_id)?;
    Ok(Json(AvailabilityResponse { book_id, available }))
}

/// POST /books - Create a book.
async fn create_book(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<NewBook>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    caller.require_admin()?;
    let book = state.library.catalog().create_book(request)?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// PUT /books/{id} - Edit title, author or copy count.
async fn update_book(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<u32>,
    Json(request): Json<BookUpdate>,
) -> Result<Json<Book>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.library.catalog().update_book(BookId(id), request)?))
}

/// DELETE /books/{id} - Delete a book with no copies out.
async fn delete_book(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<u32>,
) -> Result<Json<Book>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.library.catalog().delete_book(BookId(id))?))
}

/// POST /books/{id}/borrow - Borrow a copy.
async fn borrow(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<u32>,
) -> Result<(StatusCode, Json<BorrowRecord>), AppError> {
    let record = state.library.engine().borrow(&caller.0, BookId(id))?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /books/{id}/return - Return the caller's copy.
async fn return_book(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<u32>,
) -> Result<Json<BorrowRecord>, AppError> {
    Ok(Json(state.library.engine().return_book(&caller.0, BookId(id))?))
}

/// GET /loans/me - The caller's open loans.
async fn my_loans(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<BorrowRecord>>, AppError> {
    Ok(Json(state.library.engine().open_loans_for_user(caller.0.user_id)?))
}

/// GET /loans/me/history - Every loan the caller ever had.
async fn my_history(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<BorrowRecord>>, AppError> {
    Ok(Json(state.library.engine().loan_history_for_user(caller.0.user_id)?))
}

/// GET /loans - Every loan in the system.
async fn all_loans(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<BorrowRecord>>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.library.engine().all_loans()?))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/available", get(list_available))
        .route(
            "/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/books/{id}/availability", get(availability))
        .route("/books/{id}/borrow", post(borrow))
        .route("/books/{id}/return", post(return_book))
        .route("/loans", get(all_loans))
        .route("/loans/me", get(my_loans))
        .route("/loans/me/history", get(my_history))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "book_loans_rs=debug".into()),
        )
        .init();

    let library = Library::in_memory(LibraryConfig::default()).expect("default config is valid");
    let state = AppState {
        library: Arc::new(library),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    tracing::info!("Library API server running on http://127.0.0.1:3000");

    axum::serve(listener, app).await.unwrap();
}
