//! Bibliotheca library catalogue server
//!
//! Manages books, members and borrowings behind a REST JSON API. The
//! borrowing engine keeps per-title copy counts consistent with the open
//! borrowings in the ledger, under concurrent requests.

use std::sync::Arc;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    pub fn new(config: AppConfig, repository: repository::Repository, clock: Arc<dyn clock::Clock>) -> Self {
        let services = services::Services::new(repository, &config.loans, clock);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
