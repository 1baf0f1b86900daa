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

//! Runtime configuration for a [`Library`](crate::Library).

use crate::loan::LoanPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// How catalog search compares the query against titles and authors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    CaseSensitive,
    #[default]
    CaseInsensitive,
}

impl SearchMode {
    /// Substring match of `query` against `haystack`.
    pub fn matches(self, haystack: &str, query: &str) -> bool {
        match self {
            SearchMode::CaseSensitive => haystack.contains(query),
            SearchMode::CaseInsensitive => {
                haystack.to_lowercase().contains(&query.to_lowercase())
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("loan period must be at least one day")]
    ZeroLoanPeriod,

    #[error("loan period of {0} days exceeds the maximum of {max} days", max = LibraryConfig::MAX_LOAN_PERIOD_DAYS)]
    LoanPeriodTooLong(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Days between borrow and due date.
    pub loan_period_days: u32,
    pub search_mode: SearchMode,
    /// How long a writer waits for a busy book before giving up with
    /// `ConcurrencyConflict`. `None` waits indefinitely.
    pub lock_timeout_ms: Option<u64>,
}

impl LibraryConfig {
    /// Ten years.
    pub const MAX_LOAN_PERIOD_DAYS: u32 = 3_650;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loan_period_days == 0 {
            return Err(ConfigError::ZeroLoanPeriod);
        }
        if self.loan_period_days > Self::MAX_LOAN_PERIOD_DAYS {
            return Err(ConfigError::LoanPeriodTooLong(self.loan_period_days));
        }
        Ok(())
    }

    pub fn loan_policy(&self) -> LoanPolicy {
        LoanPolicy::with_days(self.loan_period_days)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            loan_period_days: LoanPolicy::DEFAULT_LOAN_DAYS,
            search_mode: SearchMode::default(),
            lock_timeout_ms: None,
        }
    }
}
