//! Business logic services

pub mod catalogue;
pub mod engine;
pub mod fines;
pub mod ledger;
pub mod locks;

use std::sync::Arc;

use crate::{clock::Clock, config::LoansConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalogue: catalogue::CatalogueService,
    pub ledger: ledger::LedgerService,
    pub engine: engine::InventoryEngine,
}

impl Services {
    /// Create all services over the given repository
    pub fn new(repository: Repository, loans: &LoansConfig, clock: Arc<dyn Clock>) -> Self {
        let locks = Arc::new(locks::ResourceLocks::new(loans.lock_timeout()));
        let engine = engine::InventoryEngine::new(repository.clone(), locks, clock.clone());
        Self {
            catalogue: catalogue::CatalogueService::new(repository.clone(), engine.clone()),
            ledger: ledger::LedgerService::new(repository, clock),
            engine,
        }
    }
}
