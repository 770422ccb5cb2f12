//! Outbound adapters implementing domain ports.
//!
//! - **persistence**: PostgreSQL record repository using Diesel ORM.
//! - **media**: filesystem attachment store confined with `cap-std`.
//!
//! Adapters translate between domain types and infrastructure
//! representations and contain no business logic.

pub mod media;
pub mod persistence;
