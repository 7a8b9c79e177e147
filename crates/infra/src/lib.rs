//! Infrastructure layer: record store backends and the domain service over them.

pub mod service;
pub mod store;

pub use service::PersonService;
pub use store::{FetchPlan, InMemoryPersonStore, PersonStore, PostgresPersonStore, StoreError, StoreResult};
