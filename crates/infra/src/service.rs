//! Domain service: a thin forwarding layer over a [`PersonStore`].
//!
//! No retries and no validation of its own; store errors surface unchanged.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::instrument;

use addressbook_core::{Entity, PersonId};
use addressbook_people::{NewAddress, NewPerson, Person, PersonQuery};

use crate::store::{FetchPlan, PersonStore, StoreResult};

#[derive(Clone)]
pub struct PersonService {
    store: Arc<dyn PersonStore>,
}

impl PersonService {
    pub fn new(store: Arc<dyn PersonStore>) -> Self {
        Self { store }
    }

    #[instrument(skip_all, err)]
    pub async fn save(&self, person: NewPerson) -> StoreResult<Person> {
        self.store.save(person).await
    }

    #[instrument(skip_all, fields(batch = persons.len()), err)]
    pub async fn save_all(&self, persons: Vec<NewPerson>) -> StoreResult<Vec<Person>> {
        self.store.save_all(persons).await
    }

    #[instrument(skip(self, address), err)]
    pub async fn add_address(&self, id: PersonId, address: NewAddress) -> StoreResult<Person> {
        self.store.add_address(id, address).await
    }

    #[instrument(skip(self, person), err)]
    pub async fn replace(&self, id: PersonId, person: NewPerson) -> StoreResult<Person> {
        self.store.replace(id, person).await
    }

    pub async fn delete(&self, person: &Person) -> StoreResult<()> {
        self.delete_by_id(person.id()).await
    }

    #[instrument(skip(self), err)]
    pub async fn delete_by_id(&self, id: PersonId) -> StoreResult<()> {
        self.store.delete(id).await
    }

    #[instrument(skip_all, fields(batch = persons.len()), err)]
    pub async fn delete_all_of(&self, persons: &[Person]) -> StoreResult<()> {
        let ids: Vec<PersonId> = persons.iter().map(Entity::id).collect();
        self.store.delete_many(&ids).await
    }

    #[instrument(skip(self), err)]
    pub async fn delete_all(&self) -> StoreResult<u64> {
        self.store.delete_all().await
    }

    pub async fn exists(&self, id: PersonId) -> StoreResult<bool> {
        self.store.exists(id).await
    }

    pub async fn count(&self) -> StoreResult<u64> {
        self.store.count().await
    }

    pub async fn find_all(&self) -> StoreResult<Vec<Person>> {
        self.store.find_all().await
    }

    pub async fn find_all_by_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Person>> {
        self.store.find_all_by_ids(ids).await
    }

    pub async fn find_all_of_age(&self, today: NaiveDate) -> StoreResult<Vec<Person>> {
        self.store.find_matching(&PersonQuery::of_age(today)).await
    }

    pub async fn find_all_minors(&self, today: NaiveDate) -> StoreResult<Vec<Person>> {
        self.store.find_matching(&PersonQuery::minors(today)).await
    }

    pub async fn find_all_of_age_with_last_name(
        &self,
        prefix: &str,
        today: NaiveDate,
    ) -> StoreResult<Vec<Person>> {
        let query = PersonQuery::of_age(today).with_last_name_prefix(prefix);
        self.store.find_matching(&query).await
    }

    pub async fn find_all_of_age_with_address(&self, today: NaiveDate) -> StoreResult<Vec<Person>> {
        self.store
            .find_matching(&PersonQuery::of_age(today).with_address())
            .await
    }

    /// Arbitrary conjunction of criteria; the named finders above are shorthands.
    pub async fn find_matching(&self, query: &PersonQuery) -> StoreResult<Vec<Person>> {
        self.store.find_matching(query).await
    }

    pub async fn find_by_first_and_last_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> StoreResult<Option<Person>> {
        self.store.find_by_name(first_name, last_name).await
    }

    pub async fn find_all_living_in_city(&self, city: &str) -> StoreResult<Vec<Person>> {
        self.store.find_living_in_city(city).await
    }

    pub async fn find_one(&self, id: PersonId) -> StoreResult<Option<Person>> {
        self.store.find_one(id, FetchPlan::Separate).await
    }

    pub async fn find_one_with_addresses(&self, id: PersonId) -> StoreResult<Option<Person>> {
        self.store.find_one(id, FetchPlan::Joined).await
    }

    pub async fn find_one_by_id(&self, id: PersonId) -> StoreResult<Option<Person>> {
        self.store.find_one(id, FetchPlan::Joined).await
    }

    pub async fn get_one_by_id(&self, id: PersonId) -> StoreResult<Option<Person>> {
        self.store.find_one(id, FetchPlan::Joined).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryPersonStore;
    use addressbook_people::Country;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service() -> PersonService {
        PersonService::new(Arc::new(InMemoryPersonStore::new()))
    }

    fn person(first: &str, last: &str, birth: NaiveDate) -> NewPerson {
        NewPerson::new(first, last, birth).unwrap()
    }

    #[tokio::test]
    async fn find_one_variants_return_same_aggregate() {
        let svc = service();
        let mut p = person("Jogi", "Löw", date(2008, 10, 15));
        p.add_address(NewAddress::new(None, None, "55555", "Freiburg", Country::De).unwrap());
        let saved = svc.save(p).await.unwrap();

        let a = svc.find_one(saved.id()).await.unwrap();
        let b = svc.find_one_with_addresses(saved.id()).await.unwrap();
        let c = svc.find_one_by_id(saved.id()).await.unwrap();
        let d = svc.get_one_by_id(saved.id()).await.unwrap();
        assert_eq!(a, Some(saved.clone()));
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, d);

        assert_eq!(svc.find_one(PersonId::new(999)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_all_and_delete_all_of() {
        let svc = service();
        let saved = svc
            .save_all(vec![
                person("Kai", "Hansen", date(1990, 1, 1)),
                person("Achim", "Maier", date(1991, 1, 1)),
                person("Hans", "Mustermann", date(1969, 7, 2)),
            ])
            .await
            .unwrap();
        assert_eq!(svc.count().await.unwrap(), 3);

        svc.delete_all_of(&saved[..2]).await.unwrap();
        assert_eq!(svc.count().await.unwrap(), 1);
        assert!(!svc.exists(saved[0].id()).await.unwrap());
        assert!(svc.exists(saved[2].id()).await.unwrap());

        assert_eq!(svc.delete_all().await.unwrap(), 1);
        assert_eq!(svc.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn of_age_with_address_requires_both() {
        let svc = service();
        let today = date(2015, 6, 1);

        let mut kroos = person("Toni", "Kroos", date(1958, 8, 16));
        kroos.add_address(NewAddress::new(None, None, "12345", "Bern", Country::Ch).unwrap());
        let kroos = svc.save(kroos).await.unwrap();
        svc.save(person("Hans", "Mustermann", date(1969, 7, 2))).await.unwrap();
        let mut lahm = person("Phillip", "Lahm", date(2000, 4, 6));
        lahm.add_address(NewAddress::new(None, None, "77777", "Stuttgart", Country::De).unwrap());
        svc.save(lahm).await.unwrap();

        let found = svc.find_all_of_age_with_address(today).await.unwrap();
        assert_eq!(found, vec![kroos.clone()]);

        let query = PersonQuery::of_age(today).with_address().with_last_name_prefix("K");
        assert_eq!(svc.find_matching(&query).await.unwrap(), vec![kroos]);
        let query = PersonQuery::of_age(today).with_address().with_last_name_prefix("L");
        assert!(svc.find_matching(&query).await.unwrap().is_empty());
    }
}
