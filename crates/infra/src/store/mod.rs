//! Record store boundary for the person aggregate.
//!
//! This module defines an infrastructure-facing abstraction for persisting
//! persons (with their owned addresses) without making storage assumptions.
//! Two backends ship with it: an in-memory map for dev/tests and Postgres.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryPersonStore;
pub use postgres::PostgresPersonStore;
pub use r#trait::{FetchPlan, PersonStore, StoreError, StoreResult};
