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

//! Wiring of stores, locks and services.

use crate::catalog::CatalogService;
use crate::config::{ConfigError, LibraryConfig};
use crate::engine::LoanEngine;
use crate::locks::BookLocks;
use crate::store::{CatalogStore, LoanStore, MemoryCatalog, MemoryLoanStore};
use std::sync::Arc;

/// An opened library: one set of store handles shared by the loan engine and
/// the catalog service.
///
/// Open it once at startup and hand out references (or clones of the
/// `Arc`) to request handlers. Dropping it releases the stores.
pub struct Library {
    engine: LoanEngine,
    catalog: CatalogService,
    config: LibraryConfig,
}

impl Library {
    /// Opens a library over the given stores.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn open(
        config: LibraryConfig,
        catalog: Arc<dyn CatalogStore>,
        loans: Arc<dyn LoanStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let locks = Arc::new(BookLocks::new(config.lock_timeout()));
        let engine = LoanEngine::new(
            Arc::clone(&catalog),
            Arc::clone(&loans),
            Arc::clone(&locks),
            config.loan_policy(),
        );
        let catalog = CatalogService::new(catalog, loans, locks, config.search_mode);
        tracing::info!(
            loan_period_days = config.loan_period_days,
            search_mode = ?config.search_mode,
            "library opened"
        );
        Ok(Self {
            engine,
            catalog,
            config,
        })
    }

    /// Opens a library over fresh in-memory stores.
    pub fn in_memory(config: LibraryConfig) -> Result<Self, ConfigError> {
        Self::open(
            config,
            Arc::new(MemoryCatalog::new()),
            Arc::new(MemoryLoanStore::new()),
        )
    }

    pub fn engine(&self) -> &LoanEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }
}
