//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Row structs (`models.rs`) and table definitions (`schema.rs`) stay
//! private to this module; repositories translate them to domain records
//! and map every database failure to a port error.
//!
//! ```ignore
//! use walkin::outbound::persistence::{DbPool, DieselRecordRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/walkin")).await?;
//! let repo = DieselRecordRepository::new(pool);
//! ```

mod diesel_basic_error_mapping;
mod diesel_record_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_record_repository::DieselRecordRepository;
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
