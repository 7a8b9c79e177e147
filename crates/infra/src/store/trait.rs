use async_trait::async_trait;
use thiserror::Error;

use addressbook_core::PersonId;
use addressbook_people::{NewAddress, NewPerson, Person, PersonQuery};

pub type StoreResult<T> = Result<T, StoreError>;

/// Record store failure. Surfaced unchanged by the service layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A write targeted a record that does not exist (e.g. delete of an unknown id).
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend rejected the write (unique, foreign key, check, not-null).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The backend could not be reached (pool closed, timeout, I/O).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn person_not_found(id: PersonId) -> Self {
        Self::NotFound(format!("person {id}"))
    }

    pub fn duplicate_address(id: PersonId) -> Self {
        Self::Constraint(format!("person {id} already owns an identical address"))
    }
}

/// How a backend should load the addresses of a single person.
///
/// Purely a performance hint: every plan returns the complete aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FetchPlan {
    /// Load the person row, then its address rows.
    #[default]
    Separate,
    /// Load person and addresses in a single joined query.
    Joined,
}

/// Keyed storage for person aggregates.
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - assign fresh ids on `save`, and set every address's owner to the new person
/// - make each write atomic (a batch is persisted or rejected as a whole)
/// - keep the owned address set free of duplicates (`add_address` of an address
///   equal to an owned one, ignoring ids, is `StoreError::Constraint`)
/// - delete a person's addresses together with the person
/// - return lists ordered by ascending person id, addresses by ascending address id
/// - report lookups of unknown ids as `None`/absent, but writes to unknown ids as
///   `StoreError::NotFound`
#[async_trait]
pub trait PersonStore: Send + Sync {
    async fn save(&self, person: NewPerson) -> StoreResult<Person>;
    async fn save_all(&self, persons: Vec<NewPerson>) -> StoreResult<Vec<Person>>;
    /// Rejects an address the person already owns.
    async fn add_address(&self, id: PersonId, address: NewAddress) -> StoreResult<Person>;
    /// Overwrite fields and the whole address set of an existing person.
    async fn replace(&self, id: PersonId, person: NewPerson) -> StoreResult<Person>;

    async fn delete(&self, id: PersonId) -> StoreResult<()>;
    async fn delete_many(&self, ids: &[PersonId]) -> StoreResult<()>;
    async fn delete_all(&self) -> StoreResult<u64>;

    async fn count(&self) -> StoreResult<u64>;
    async fn exists(&self, id: PersonId) -> StoreResult<bool>;

    async fn find_all(&self) -> StoreResult<Vec<Person>>;
    /// Unknown ids are skipped.
    async fn find_all_by_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Person>>;
    async fn find_matching(&self, query: &PersonQuery) -> StoreResult<Vec<Person>>;
    async fn find_one(&self, id: PersonId, plan: FetchPlan) -> StoreResult<Option<Person>>;
    /// Exact match; the lowest id wins if several persons share the name.
    async fn find_by_name(&self, first_name: &str, last_name: &str) -> StoreResult<Option<Person>>;
    /// Persons owning at least one address in `city` (exact match), each once.
    async fn find_living_in_city(&self, city: &str) -> StoreResult<Vec<Person>>;
}
