use chrono::NaiveDate;
use serde::Serialize;

use addressbook_core::{AddressId, DomainResult, Entity, PersonId};

use crate::address::{Address, NewAddress};
use crate::validate;

pub const FIRST_NAME_MAX: usize = 30;
pub const LAST_NAME_MAX: usize = 30;

/// Transient person aggregate: validated fields plus the addresses it will own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPerson {
    first_name: String,
    last_name: String,
    birth_date: NaiveDate,
    addresses: Vec<NewAddress>,
}

impl NewPerson {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        birth_date: NaiveDate,
    ) -> DomainResult<Self> {
        let first_name = first_name.into();
        let last_name = last_name.into();

        validate::required("first_name", &first_name, FIRST_NAME_MAX)?;
        validate::required("last_name", &last_name, LAST_NAME_MAX)?;

        Ok(Self {
            first_name,
            last_name,
            birth_date,
            addresses: Vec::new(),
        })
    }

    /// Take ownership of `address`. Returns `false` if an identical address is
    /// already owned (set semantics).
    pub fn add_address(&mut self, address: NewAddress) -> bool {
        if self.addresses.contains(&address) {
            return false;
        }
        self.addresses.push(address);
        true
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn birth_date(&self) -> NaiveDate {
        self.birth_date
    }

    pub fn addresses(&self) -> &[NewAddress] {
        &self.addresses
    }

    /// Split into scalar fields and owned address drafts (store backends).
    pub fn into_parts(self) -> (String, String, NaiveDate, Vec<NewAddress>) {
        (self.first_name, self.last_name, self.birth_date, self.addresses)
    }

    /// Assign identities. Every address is bound to `id` as its owner.
    pub fn into_person(self, id: PersonId, mut next_address_id: impl FnMut() -> AddressId) -> Person {
        let addresses = self
            .addresses
            .into_iter()
            .map(|draft| draft.attach(next_address_id(), id))
            .collect();

        Person {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            birth_date: self.birth_date,
            addresses,
        }
    }
}

/// Aggregate root: a persisted person together with the addresses it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    id: PersonId,
    first_name: String,
    last_name: String,
    birth_date: NaiveDate,
    addresses: Vec<Address>,
}

impl Person {
    /// Rehydrate a persisted aggregate from storage.
    ///
    /// Addresses are kept in ascending id order.
    pub fn restore(
        id: PersonId,
        first_name: String,
        last_name: String,
        birth_date: NaiveDate,
        mut addresses: Vec<Address>,
    ) -> Self {
        addresses.sort_by_key(|a| a.id());
        Self {
            id,
            first_name,
            last_name,
            birth_date,
            addresses,
        }
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn birth_date(&self) -> NaiveDate {
        self.birth_date
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// Invariant helper: every owned address points back at this person.
    pub fn owns_all_addresses(&self) -> bool {
        self.addresses.iter().all(|a| a.person_id() == self.id)
    }

    /// Whether an address equal to `draft` (ignoring ids) is already owned.
    pub fn owns_address(&self, draft: &NewAddress) -> bool {
        self.addresses.iter().any(|a| a.to_draft() == *draft)
    }

    pub fn lives_in(&self, city: &str) -> bool {
        self.addresses.iter().any(|a| a.city() == city)
    }

    /// Append an already-attached address (store backends).
    pub fn push_address(&mut self, address: Address) {
        debug_assert_eq!(address.person_id(), self.id);
        self.addresses.push(address);
    }
}

impl Entity for Person {
    type Id = PersonId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
