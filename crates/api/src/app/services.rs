//! Boundary service and store wiring.
//!
//! `PersonManagementService` is what the HTTP handlers talk to: it turns raw
//! fields into validated domain values, supplies "today" for the age queries,
//! and forwards everything else to the domain service unchanged.

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, instrument, warn};

use addressbook_core::{Clock, DomainError, PersonId, SystemClock};
use addressbook_infra::{
    InMemoryPersonStore, PersonService, PersonStore, PostgresPersonStore, StoreError,
};
use addressbook_people::{NewAddress, NewPerson, Person, PersonQuery};

use crate::config::ApiConfig;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct PersonManagementService {
    persons: PersonService,
    clock: Arc<dyn Clock>,
}

impl PersonManagementService {
    pub fn new(persons: PersonService, clock: Arc<dyn Clock>) -> Self {
        Self { persons, clock }
    }

    /// Fresh in-memory store; used by tests and when no database is configured.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(PersonService::new(Arc::new(InMemoryPersonStore::new())), clock)
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    fn draft(
        first_name: &str,
        last_name: &str,
        birth_date: NaiveDate,
        addresses: Vec<NewAddress>,
    ) -> ServiceResult<NewPerson> {
        let mut person = NewPerson::new(first_name, last_name, birth_date)?;
        for address in addresses {
            person.add_address(address);
        }
        Ok(person)
    }

    #[instrument(skip(self, addresses), fields(addresses = addresses.len()), err)]
    pub async fn create_person(
        &self,
        first_name: &str,
        last_name: &str,
        birth_date: NaiveDate,
        addresses: Vec<NewAddress>,
    ) -> ServiceResult<Person> {
        let draft = Self::draft(first_name, last_name, birth_date, addresses)?;
        Ok(self.persons.save(draft).await?)
    }

    pub async fn add_address(&self, id: PersonId, address: NewAddress) -> ServiceResult<Person> {
        Ok(self.persons.add_address(id, address).await?)
    }

    #[instrument(skip(self, addresses), err)]
    pub async fn replace_person(
        &self,
        id: PersonId,
        first_name: &str,
        last_name: &str,
        birth_date: NaiveDate,
        addresses: Vec<NewAddress>,
    ) -> ServiceResult<Person> {
        let draft = Self::draft(first_name, last_name, birth_date, addresses)?;
        Ok(self.persons.replace(id, draft).await?)
    }

    pub async fn delete(&self, person: &Person) -> ServiceResult<()> {
        Ok(self.persons.delete(person).await?)
    }

    pub async fn delete_by_id(&self, id: PersonId) -> ServiceResult<()> {
        Ok(self.persons.delete_by_id(id).await?)
    }

    pub async fn delete_all(&self) -> ServiceResult<u64> {
        Ok(self.persons.delete_all().await?)
    }

    pub async fn exists(&self, id: PersonId) -> ServiceResult<bool> {
        Ok(self.persons.exists(id).await?)
    }

    pub async fn count(&self) -> ServiceResult<u64> {
        Ok(self.persons.count().await?)
    }

    pub async fn find_all(&self) -> ServiceResult<Vec<Person>> {
        Ok(self.persons.find_all().await?)
    }

    pub async fn find_all_by_ids(&self, ids: &[PersonId]) -> ServiceResult<Vec<Person>> {
        Ok(self.persons.find_all_by_ids(ids).await?)
    }

    pub async fn find_all_of_age(&self) -> ServiceResult<Vec<Person>> {
        Ok(self.persons.find_all_of_age(self.today()).await?)
    }

    pub async fn find_all_minors(&self) -> ServiceResult<Vec<Person>> {
        Ok(self.persons.find_all_minors(self.today()).await?)
    }

    pub async fn find_all_of_age_with_last_name(&self, prefix: &str) -> ServiceResult<Vec<Person>> {
        Ok(self
            .persons
            .find_all_of_age_with_last_name(prefix, self.today())
            .await?)
    }

    pub async fn find_all_of_age_with_address(&self) -> ServiceResult<Vec<Person>> {
        Ok(self
            .persons
            .find_all_of_age_with_address(self.today())
            .await?)
    }

    /// Of-age persons, optionally narrowed by last-name prefix and/or owning an address.
    pub async fn find_all_of_age_matching(
        &self,
        last_name_prefix: Option<&str>,
        with_address: bool,
    ) -> ServiceResult<Vec<Person>> {
        let mut query = PersonQuery::of_age(self.today());
        if let Some(prefix) = last_name_prefix {
            query = query.with_last_name_prefix(prefix);
        }
        if with_address {
            query = query.with_address();
        }
        Ok(self.persons.find_matching(&query).await?)
    }

    pub async fn find_by_first_and_last_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> ServiceResult<Option<Person>> {
        Ok(self
            .persons
            .find_by_first_and_last_name(first_name, last_name)
            .await?)
    }

    pub async fn find_all_living_in_city(&self, city: &str) -> ServiceResult<Vec<Person>> {
        Ok(self.persons.find_all_living_in_city(city).await?)
    }

    pub async fn find_one(&self, id: PersonId) -> ServiceResult<Option<Person>> {
        Ok(self.persons.find_one(id).await?)
    }

    pub async fn find_one_with_addresses(&self, id: PersonId) -> ServiceResult<Option<Person>> {
        Ok(self.persons.find_one_with_addresses(id).await?)
    }

    pub async fn find_one_by_id(&self, id: PersonId) -> ServiceResult<Option<Person>> {
        Ok(self.persons.find_one_by_id(id).await?)
    }

    pub async fn get_one_by_id(&self, id: PersonId) -> ServiceResult<Option<Person>> {
        Ok(self.persons.get_one_by_id(id).await?)
    }
}

/// Pick the store backend from config and wrap it in the boundary service.
pub async fn build_services(config: &ApiConfig) -> Result<PersonManagementService, StoreError> {
    let store: Arc<dyn PersonStore> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresPersonStore::connect(url, config.db_max_connections).await?;
            store.ensure_schema().await?;
            info!(max_connections = config.db_max_connections, "using postgres person store");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory person store");
            Arc::new(InMemoryPersonStore::new())
        }
    };

    Ok(PersonManagementService::new(
        PersonService::new(store),
        Arc::new(SystemClock),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use addressbook_core::{Entity, FixedClock};
    use addressbook_people::Country;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service() -> PersonManagementService {
        PersonManagementService::in_memory(Arc::new(FixedClock(date(2015, 6, 1))))
    }

    fn address(zip: &str, city: &str, country: Country) -> NewAddress {
        NewAddress::new(None, None, zip, city, country).unwrap()
    }

    /// The six persons used throughout; Kroos and Khedira live in Bern.
    async fn seed_six(svc: &PersonManagementService) -> Vec<Person> {
        let rows = [
            ("Hans", "Mustermann", date(1969, 7, 2), None),
            ("Erika", "Mustermann", date(1972, 9, 20), None),
            ("Sami", "Khedira", date(2010, 11, 5), Some("Bern")),
            ("Jogi", "Löw", date(2008, 10, 15), Some("Freiburg")),
            ("Phillip", "Lahm", date(2000, 4, 6), None),
            ("Toni", "Kroos", date(1958, 8, 16), Some("Bern")),
        ];
        let mut saved = Vec::new();
        for (first, last, birth, city) in rows {
            let addresses = city
                .map(|c| vec![address("12345", c, Country::Ch)])
                .unwrap_or_default();
            saved.push(svc.create_person(first, last, birth, addresses).await.unwrap());
        }
        saved
    }

    #[tokio::test]
    async fn create_person_links_addresses_to_owner() {
        let svc = service();
        let p = svc
            .create_person(
                "Jogi",
                "Löw",
                date(1960, 2, 3),
                vec![
                    address("79098", "Freiburg", Country::De),
                    address("1010", "Wien", Country::At),
                ],
            )
            .await
            .unwrap();

        assert_eq!(p.addresses().len(), 2);
        assert!(p.addresses().iter().all(|a| a.person_id() == p.id()));
    }

    #[tokio::test]
    async fn create_person_rejects_blank_name() {
        let svc = service();
        let err = svc
            .create_person("  ", "Löw", date(1960, 2, 3), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
        assert_eq!(svc.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn of_age_and_minors_partition_all() {
        let svc = service();
        seed_six(&svc).await;

        let of_age = svc.find_all_of_age().await.unwrap();
        let minors = svc.find_all_minors().await.unwrap();
        assert_eq!(of_age.len(), 3);
        assert_eq!(minors.len(), 3);

        let mut ids: Vec<PersonId> = of_age.iter().chain(&minors).map(Entity::id).collect();
        ids.sort();
        let all: Vec<PersonId> = svc.find_all().await.unwrap().iter().map(Entity::id).collect();
        assert_eq!(ids, all);
    }

    #[tokio::test]
    async fn living_in_city_returns_owners_in_id_order() {
        let svc = service();
        let six = seed_six(&svc).await;

        let bern = svc.find_all_living_in_city("Bern").await.unwrap();
        let ids: Vec<PersonId> = bern.iter().map(Entity::id).collect();
        assert_eq!(ids, vec![six[2].id(), six[5].id()]);
    }

    #[tokio::test]
    async fn delete_cascades_addresses_and_updates_count() {
        let svc = service();
        let six = seed_six(&svc).await;

        svc.delete(&six[5]).await.unwrap();
        assert_eq!(svc.count().await.unwrap(), 5);
        assert_eq!(svc.find_all().await.unwrap().len(), 5);

        let bern = svc.find_all_living_in_city("Bern").await.unwrap();
        assert_eq!(bern.len(), 1);
        assert_eq!(bern[0].id(), six[2].id());
    }

    #[tokio::test]
    async fn of_age_with_last_name_prefix() {
        let svc = service();
        seed_six(&svc).await;

        let found = svc.find_all_of_age_with_last_name("K").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name(), "Toni");
        assert_eq!(found[0].last_name(), "Kroos");
    }

    #[tokio::test]
    async fn of_age_with_address() {
        let svc = service();
        seed_six(&svc).await;

        let found = svc.find_all_of_age_with_address().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].last_name(), "Kroos");
    }

    #[tokio::test]
    async fn of_age_matching_combines_prefix_and_address() {
        let svc = service();
        seed_six(&svc).await;

        let cases: [(Option<&str>, bool, &[&str]); 5] = [
            (None, false, &["Mustermann", "Mustermann", "Kroos"]),
            (Some("M"), false, &["Mustermann", "Mustermann"]),
            (Some("M"), true, &[]),
            (Some("K"), true, &["Kroos"]),
            (None, true, &["Kroos"]),
        ];
        for (prefix, with_address, expected) in cases {
            let found = svc.find_all_of_age_matching(prefix, with_address).await.unwrap();
            let names: Vec<&str> = found.iter().map(Person::last_name).collect();
            assert_eq!(names, expected, "prefix {prefix:?}, with_address {with_address}");
        }
    }

    #[tokio::test]
    async fn lookup_and_bulk_mirrors_forward_to_store() {
        let svc = service();
        let six = seed_six(&svc).await;
        let khedira = six[2].id();
        let kroos = six[5].id();
        let missing = PersonId::new(999);

        assert!(svc.exists(kroos).await.unwrap());
        assert!(!svc.exists(missing).await.unwrap());

        let by_ids = svc.find_all_by_ids(&[kroos, missing, khedira]).await.unwrap();
        let ids: Vec<PersonId> = by_ids.iter().map(Entity::id).collect();
        assert_eq!(ids, vec![khedira, kroos]);

        for found in [
            svc.find_one(kroos).await.unwrap(),
            svc.find_one_with_addresses(kroos).await.unwrap(),
            svc.find_one_by_id(kroos).await.unwrap(),
            svc.get_one_by_id(kroos).await.unwrap(),
        ] {
            assert_eq!(found.as_ref(), Some(&six[5]));
        }
        assert_eq!(svc.find_one_by_id(missing).await.unwrap(), None);
        assert_eq!(svc.get_one_by_id(missing).await.unwrap(), None);

        svc.delete_by_id(khedira).await.unwrap();
        assert!(matches!(
            svc.delete_by_id(khedira).await,
            Err(ServiceError::Store(StoreError::NotFound(_)))
        ));

        assert_eq!(svc.delete_all().await.unwrap(), 5);
        assert_eq!(svc.count().await.unwrap(), 0);
        assert!(svc.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_address_rejects_duplicate() {
        let svc = service();
        let p = svc
            .create_person("Toni", "Kroos", date(1990, 1, 4), vec![address("3000", "Bern", Country::Ch)])
            .await
            .unwrap();

        let err = svc
            .add_address(p.id(), address("3000", "Bern", Country::Ch))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn replace_and_add_address_on_unknown_id_are_not_found() {
        let svc = service();
        let missing = PersonId::new(404);

        let err = svc
            .replace_person(missing, "A", "B", date(1990, 1, 1), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::NotFound(_))));

        let err = svc
            .add_address(missing, address("3000", "Bern", Country::Ch))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::NotFound(_))));

        assert_eq!(svc.find_one(missing).await.unwrap(), None);
    }

    #[tokio::test]
    async fn add_address_keeps_existing_ones() {
        let svc = service();
        let p = svc
            .create_person("Toni", "Kroos", date(1990, 1, 4), vec![address("3000", "Bern", Country::Ch)])
            .await
            .unwrap();

        let updated = svc
            .add_address(p.id(), address("28001", "Madrid", Country::De))
            .await
            .unwrap();
        assert_eq!(updated.addresses().len(), 2);
        assert!(updated.lives_in("Bern"));
        assert!(updated.lives_in("Madrid"));
        assert_eq!(svc.find_one_with_addresses(p.id()).await.unwrap(), Some(updated));
    }
}
