use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use addressbook_core::{AddressId, Entity, PersonId};
use addressbook_people::{NewAddress, NewPerson, Person, PersonQuery};

use super::r#trait::{FetchPlan, PersonStore, StoreError, StoreResult};

#[derive(Debug)]
struct State {
    persons: BTreeMap<PersonId, Person>,
    next_person_id: i64,
    next_address_id: i64,
}

impl State {
    fn next_person_id(&mut self) -> PersonId {
        let id = PersonId::new(self.next_person_id);
        self.next_person_id += 1;
        id
    }

    fn insert(&mut self, person: NewPerson) -> Person {
        let id = self.next_person_id();
        let next_address_id = &mut self.next_address_id;
        let person = person.into_person(id, || {
            let aid = AddressId::new(*next_address_id);
            *next_address_id += 1;
            aid
        });
        self.persons.insert(id, person.clone());
        person
    }

    fn require(&self, id: PersonId) -> StoreResult<()> {
        if self.persons.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::person_not_found(id))
        }
    }
}

/// In-memory person store.
///
/// Intended for tests/dev. Ids start at 1 and are never reused. Each write runs
/// under a single write guard and validates before mutating, so writes are atomic.
#[derive(Debug)]
pub struct InMemoryPersonStore {
    state: RwLock<State>,
}

impl InMemoryPersonStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                persons: BTreeMap::new(),
                next_person_id: 1,
                next_address_id: 1,
            }),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn collect(&self, mut keep: impl FnMut(&Person) -> bool) -> StoreResult<Vec<Person>> {
        let state = self.read()?;
        Ok(state.persons.values().filter(|p| keep(p)).cloned().collect())
    }
}

impl Default for InMemoryPersonStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersonStore for InMemoryPersonStore {
    async fn save(&self, person: NewPerson) -> StoreResult<Person> {
        let mut state = self.write()?;
        Ok(state.insert(person))
    }

    async fn save_all(&self, persons: Vec<NewPerson>) -> StoreResult<Vec<Person>> {
        let mut state = self.write()?;
        Ok(persons.into_iter().map(|p| state.insert(p)).collect())
    }

    async fn add_address(&self, id: PersonId, address: NewAddress) -> StoreResult<Person> {
        let mut state = self.write()?;
        let owner = state
            .persons
            .get(&id)
            .ok_or_else(|| StoreError::person_not_found(id))?;
        if owner.owns_address(&address) {
            return Err(StoreError::duplicate_address(id));
        }

        let aid = AddressId::new(state.next_address_id);
        state.next_address_id += 1;

        let person = state
            .persons
            .get_mut(&id)
            .ok_or_else(|| StoreError::person_not_found(id))?;
        person.push_address(address.attach(aid, id));
        Ok(person.clone())
    }

    async fn replace(&self, id: PersonId, person: NewPerson) -> StoreResult<Person> {
        let mut state = self.write()?;
        state.require(id)?;

        let next_address_id = &mut state.next_address_id;
        let replaced = person.into_person(id, || {
            let aid = AddressId::new(*next_address_id);
            *next_address_id += 1;
            aid
        });
        state.persons.insert(id, replaced.clone());
        Ok(replaced)
    }

    async fn delete(&self, id: PersonId) -> StoreResult<()> {
        let mut state = self.write()?;
        // Addresses are owned by value and go with the person.
        state
            .persons
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::person_not_found(id))
    }

    async fn delete_many(&self, ids: &[PersonId]) -> StoreResult<()> {
        let mut state = self.write()?;
        for id in ids {
            state.require(*id)?;
        }
        for id in ids {
            state.persons.remove(id);
        }
        Ok(())
    }

    async fn delete_all(&self) -> StoreResult<u64> {
        let mut state = self.write()?;
        let removed = state.persons.len() as u64;
        state.persons.clear();
        Ok(removed)
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.read()?.persons.len() as u64)
    }

    async fn exists(&self, id: PersonId) -> StoreResult<bool> {
        Ok(self.read()?.persons.contains_key(&id))
    }

    async fn find_all(&self) -> StoreResult<Vec<Person>> {
        self.collect(|_| true)
    }

    async fn find_all_by_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Person>> {
        let wanted: BTreeSet<PersonId> = ids.iter().copied().collect();
        self.collect(|p| wanted.contains(&p.id()))
    }

    async fn find_matching(&self, query: &PersonQuery) -> StoreResult<Vec<Person>> {
        self.collect(|p| query.matches(p))
    }

    async fn find_one(&self, id: PersonId, _plan: FetchPlan) -> StoreResult<Option<Person>> {
        Ok(self.read()?.persons.get(&id).cloned())
    }

    async fn find_by_name(&self, first_name: &str, last_name: &str) -> StoreResult<Option<Person>> {
        let state = self.read()?;
        Ok(state
            .persons
            .values()
            .find(|p| p.first_name() == first_name && p.last_name() == last_name)
            .cloned())
    }

    async fn find_living_in_city(&self, city: &str) -> StoreResult<Vec<Person>> {
        self.collect(|p| p.lives_in(city))
    }
}
