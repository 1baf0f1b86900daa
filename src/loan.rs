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

//! Borrow records.
//!
//! A record is created open (`returned_at == None`) and closed exactly once:
//!
//! ```text
//!  Open ──return──► Returned
//! ```
//!
//! Records are never deleted; the loan log doubles as the borrow history.

use crate::base::{BookId, LoanId, UserId};
use crate::error::LibraryError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single loan of one copy of a book to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowRecord {
    pub id: LoanId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl BorrowRecord {
    pub fn from_new(id: LoanId, loan: NewLoan) -> Self {
        Self {
            id,
            user_id: loan.user_id,
            book_id: loan.book_id,
            borrowed_at: loan.borrowed_at,
            due_date: loan.due_date,
            returned_at: None,
        }
    }

    /// An open loan has not been returned yet.
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    /// Open and past its due date at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && now > self.due_date
    }
}

/// A loan about to be appended to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewLoan {
    pub user_id: UserId,
    pub book_id: BookId,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Rules for computing due dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
    loan_period: Duration,
}

impl LoanPolicy {
    pub const DEFAULT_LOAN_DAYS: u32 = 14;

    pub fn with_days(days: u32) -> Self {
        Self {
            loan_period: Duration::days(i64::from(days)),
        }
    }

    pub fn loan_period(&self) -> Duration {
        self.loan_period
    }

    /// Builds the record for a loan starting at `now`.
    ///
    /// # Errors
    ///
    /// [`LibraryError::DueDateOutOfRange`] if the due date overflows.
    pub fn open(
        &self,
        user_id: UserId,
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> Result<NewLoan, LibraryError> {
        let due_date = now
            .checked_add_signed(self.loan_period)
            .ok_or(LibraryError::DueDateOutOfRange)?;
        Ok(NewLoan {
            user_id,
            book_id,
            borrowed_at: now,
            due_date,
        })
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self::with_days(Self::DEFAULT_LOAN_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_fourteen_days() {
        let policy = LoanPolicy::default();
        assert_eq!(policy.loan_period(), Duration::days(14));
    }

    #[test]
    fn open_sets_due_date_from_period() {
        let now = Utc::now();
        let loan = LoanPolicy::with_days(7).open(UserId(1), BookId(2), now).unwrap();
        assert_eq!(loan.borrowed_at, now);
        assert_eq!(loan.due_date - loan.borrowed_at, Duration::days(7));
    }

    #[test]
    fn record_starts_open_and_tracks_overdue() {
        let now = Utc::now();
        let loan = LoanPolicy::default().open(UserId(1), BookId(2), now).unwrap();
        let mut record = BorrowRecord::from_new(LoanId(1), loan);
        assert!(record.is_open());
        assert!(!record.is_overdue(now));
        assert!(record.is_overdue(now + Duration::days(15)));

        record.returned_at = Some(now);
        assert!(!record.is_open());
        assert!(!record.is_overdue(now + Duration::days(15)));
    }

    #[test]
    fn due_date_past_the_calendar_is_an_error() {
        let policy = LoanPolicy::with_days(u32::MAX);
        assert_eq!(
            policy.open(UserId(1), BookId(2), Utc::now()),
            Err(LibraryError::DueDateOutOfRange)
        );
    }
}
