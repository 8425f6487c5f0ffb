//! Persistence and orchestration for Tally.
//!
//! This crate provides:
//! - Capability store traits composed into a unit of work
//! - An in-memory backend and a `SeaORM`/PostgreSQL backend
//! - Database migrations
//! - The execution strategy that retries transient failures
//! - `PostingEngine`, which drives every posting operation

pub mod engine;
pub mod entities;
pub mod memory;
pub mod migration;
pub mod postgres;
pub mod store;
pub mod strategy;

pub use engine::PostingEngine;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{AuditEntry, Store, StoreError, UnitOfWork};
pub use strategy::ExecutionStrategy;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tally_shared::config::DatabaseConfig;

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection sized from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
