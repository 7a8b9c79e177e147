//! People domain module (persons and their addresses).
//!
//! This crate contains the address-book data model, field validation, and the
//! query/filter predicates, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod address;
pub mod filter;
pub mod person;
mod validate;

pub use address::{Address, Country, NewAddress};
pub use filter::{
    AGE_OF_MAJORITY_YEARS, AgeBracket, AgeFilter, PersonQuery, age_cutoff, is_minor, is_of_age,
    last_name_starts_with,
};
pub use person::{NewPerson, Person};
