//! Postgres-backed person store.
//!
//! Persons and addresses live in two tables; `addresses.person_id` is a NOT NULL
//! foreign key with `ON DELETE CASCADE`, so deleting a person removes its
//! addresses in the same statement. Every multi-statement write runs inside a
//! single transaction.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Constraint` |
//! | Database (foreign key violation) | `23503` | `Constraint` |
//! | Database (check constraint violation) | `23514` | `Constraint` |
//! | Database (not-null violation) | `23502` | `Constraint` |
//! | Database (other) | any other | `Backend` |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` |
//! | Other | N/A | `Backend` |

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use addressbook_core::{AddressId, PersonId};
use addressbook_people::{Address, AgeBracket, Country, NewAddress, NewPerson, Person, PersonQuery};

use super::r#trait::{FetchPlan, PersonStore, StoreError, StoreResult};

const SCHEMA: &str = include_str!("schema.sql");

const PERSON_COLUMNS: &str = "id, first_name, last_name, birth_date";
const ADDRESS_COLUMNS: &str = "id, person_id, street, post_office_box, zip, city, country";

/// Postgres-backed person store.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and handles
/// connection management.
#[derive(Debug, Clone)]
pub struct PostgresPersonStore {
    pool: Arc<PgPool>,
}

impl PostgresPersonStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    /// Attach addresses to already-loaded person rows (one extra query).
    async fn hydrate(&self, rows: Vec<PersonRow>) -> StoreResult<Vec<Person>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let address_rows = sqlx::query(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE person_id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_addresses", e))?;

        let mut by_person: HashMap<i64, Vec<Address>> = HashMap::new();
        for row in &address_rows {
            let address = AddressRow::from_row(row)?.into_address()?;
            by_person
                .entry(address.person_id().get())
                .or_default()
                .push(address);
        }

        Ok(rows
            .into_iter()
            .map(|r| {
                let addresses = by_person.remove(&r.id).unwrap_or_default();
                r.into_person(addresses)
            })
            .collect())
    }

    async fn fetch_persons(&self, operation: &str, rows: Result<Vec<PgRow>, sqlx::Error>) -> StoreResult<Vec<Person>> {
        let rows = rows.map_err(|e| map_sqlx_error(operation, e))?;
        let rows = rows
            .iter()
            .map(PersonRow::from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        self.hydrate(rows).await
    }

    async fn find_one_separate(&self, id: PersonId) -> StoreResult<Option<Person>> {
        let row = sqlx::query(&format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_one", e))?;

        match row {
            Some(row) => {
                let person = PersonRow::from_row(&row)?;
                Ok(self.hydrate(vec![person]).await?.into_iter().next())
            }
            None => Ok(None),
        }
    }

    async fn find_one_joined(&self, id: PersonId) -> StoreResult<Option<Person>> {
        let rows = sqlx::query(
            r#"
            SELECT
                p.id,
                p.first_name,
                p.last_name,
                p.birth_date,
                a.id AS address_id,
                a.street,
                a.post_office_box,
                a.zip,
                a.city,
                a.country
            FROM persons p
            LEFT JOIN addresses a ON a.person_id = p.id
            WHERE p.id = $1
            ORDER BY a.id
            "#,
        )
        .bind(id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_one_joined", e))?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let person = PersonRow::from_row(first)?;

        let mut addresses = Vec::new();
        for row in &rows {
            let address_id: Option<i64> = row.try_get("address_id").map_err(decode_error)?;
            if let Some(address_id) = address_id {
                let address = AddressRow {
                    id: address_id,
                    person_id: person.id,
                    street: row.try_get("street").map_err(decode_error)?,
                    post_office_box: row.try_get("post_office_box").map_err(decode_error)?,
                    zip: row.try_get("zip").map_err(decode_error)?,
                    city: row.try_get("city").map_err(decode_error)?,
                    country: row.try_get("country").map_err(decode_error)?,
                };
                addresses.push(address.into_address()?);
            }
        }

        Ok(Some(person.into_person(addresses)))
    }

    async fn begin(&self, operation: &str) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

async fn commit(tx: Transaction<'static, Postgres>, operation: &str) -> StoreResult<()> {
    tx.commit().await.map_err(|e| map_sqlx_error(operation, e))
}

async fn insert_person(tx: &mut Transaction<'static, Postgres>, person: NewPerson) -> StoreResult<Person> {
    let (first_name, last_name, birth_date, drafts) = person.into_parts();

    let row = sqlx::query("INSERT INTO persons (first_name, last_name, birth_date) VALUES ($1, $2, $3) RETURNING id")
        .bind(&first_name)
        .bind(&last_name)
        .bind(birth_date)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_person", e))?;
    let id = PersonId::new(row.try_get("id").map_err(decode_error)?);

    let addresses = insert_addresses(tx, id, drafts).await?;
    Ok(Person::restore(id, first_name, last_name, birth_date, addresses))
}

async fn insert_addresses(
    tx: &mut Transaction<'static, Postgres>,
    person_id: PersonId,
    drafts: Vec<NewAddress>,
) -> StoreResult<Vec<Address>> {
    let mut addresses = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let row = sqlx::query(
            r#"
            INSERT INTO addresses (person_id, street, post_office_box, zip, city, country)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(person_id.get())
        .bind(draft.street())
        .bind(draft.post_office_box())
        .bind(draft.zip())
        .bind(draft.city())
        .bind(draft.country().as_str())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_address", e))?;

        let id = AddressId::new(row.try_get("id").map_err(decode_error)?);
        addresses.push(draft.attach(id, person_id));
    }
    Ok(addresses)
}

#[async_trait]
impl PersonStore for PostgresPersonStore {
    #[instrument(skip(self, person), err)]
    async fn save(&self, person: NewPerson) -> StoreResult<Person> {
        let mut tx = self.begin("save").await?;
        let saved = insert_person(&mut tx, person).await?;
        commit(tx, "save").await?;
        Ok(saved)
    }

    #[instrument(skip(self, persons), fields(batch = persons.len()), err)]
    async fn save_all(&self, persons: Vec<NewPerson>) -> StoreResult<Vec<Person>> {
        let mut tx = self.begin("save_all").await?;
        let mut saved = Vec::with_capacity(persons.len());
        for person in persons {
            saved.push(insert_person(&mut tx, person).await?);
        }
        commit(tx, "save_all").await?;
        Ok(saved)
    }

    #[instrument(skip(self, address), fields(person_id = %id), err)]
    async fn add_address(&self, id: PersonId, address: NewAddress) -> StoreResult<Person> {
        let mut tx = self.begin("add_address").await?;

        let row = sqlx::query(&format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = $1 FOR UPDATE"))
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("add_address", e))?;
        let Some(row) = row else {
            return Err(StoreError::person_not_found(id));
        };
        let address_rows = sqlx::query(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE person_id = $1 ORDER BY id"
        ))
        .bind(id.get())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("add_address", e))?;
        let existing = address_rows
            .iter()
            .map(|r| AddressRow::from_row(r)?.into_address())
            .collect::<StoreResult<Vec<_>>>()?;

        let mut person = PersonRow::from_row(&row)?.into_person(existing);
        if person.owns_address(&address) {
            return Err(StoreError::duplicate_address(id));
        }

        for added in insert_addresses(&mut tx, id, vec![address]).await? {
            person.push_address(added);
        }

        commit(tx, "add_address").await?;
        Ok(person)
    }

    #[instrument(skip(self, person), fields(person_id = %id), err)]
    async fn replace(&self, id: PersonId, person: NewPerson) -> StoreResult<Person> {
        let (first_name, last_name, birth_date, drafts) = person.into_parts();
        let mut tx = self.begin("replace").await?;

        let updated = sqlx::query(
            "UPDATE persons SET first_name = $2, last_name = $3, birth_date = $4 WHERE id = $1",
        )
        .bind(id.get())
        .bind(&first_name)
        .bind(&last_name)
        .bind(birth_date)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("replace", e))?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::person_not_found(id));
        }

        sqlx::query("DELETE FROM addresses WHERE person_id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace", e))?;
        let addresses = insert_addresses(&mut tx, id, drafts).await?;

        commit(tx, "replace").await?;
        Ok(Person::restore(id, first_name, last_name, birth_date, addresses))
    }

    #[instrument(skip(self), fields(person_id = %id), err)]
    async fn delete(&self, id: PersonId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM persons WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::person_not_found(id));
        }
        Ok(())
    }

    #[instrument(skip(self, ids), fields(batch = ids.len()), err)]
    async fn delete_many(&self, ids: &[PersonId]) -> StoreResult<()> {
        let unique: BTreeSet<i64> = ids.iter().map(|id| id.get()).collect();
        let unique: Vec<i64> = unique.into_iter().collect();

        let mut tx = self.begin("delete_many").await?;
        let result = sqlx::query("DELETE FROM persons WHERE id = ANY($1)")
            .bind(&unique)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_many", e))?;

        if result.rows_affected() != unique.len() as u64 {
            // Dropping the transaction rolls the partial delete back.
            return Err(StoreError::NotFound(format!(
                "{} of {} persons do not exist",
                unique.len() as u64 - result.rows_affected(),
                unique.len()
            )));
        }
        commit(tx, "delete_many").await
    }

    #[instrument(skip(self), err)]
    async fn delete_all(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM persons")
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_all", e))?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> StoreResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM persons")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count", e))?;
        let total: i64 = row.try_get("total").map_err(decode_error)?;
        Ok(total as u64)
    }

    async fn exists(&self, id: PersonId) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM persons WHERE id = $1) AS present")
            .bind(id.get())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists", e))?;
        row.try_get("present").map_err(decode_error)
    }

    #[instrument(skip(self), err)]
    async fn find_all(&self) -> StoreResult<Vec<Person>> {
        let rows = sqlx::query(&format!("SELECT {PERSON_COLUMNS} FROM persons ORDER BY id"))
            .fetch_all(&*self.pool)
            .await;
        self.fetch_persons("find_all", rows).await
    }

    async fn find_all_by_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Person>> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PERSON_COLUMNS} FROM persons WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await;
        self.fetch_persons("find_all_by_ids", rows).await
    }

    #[instrument(skip(self), err)]
    async fn find_matching(&self, query: &PersonQuery) -> StoreResult<Vec<Person>> {
        let (of_age_cutoff, minor_cutoff): (Option<NaiveDate>, Option<NaiveDate>) = match query.age {
            Some(age) => match age.bracket {
                AgeBracket::OfAge => (Some(age.cutoff()), None),
                AgeBracket::Minor => (None, Some(age.cutoff())),
            },
            None => (None, None),
        };

        let rows = sqlx::query(
            r#"
            SELECT p.id, p.first_name, p.last_name, p.birth_date
            FROM persons p
            WHERE ($1::date IS NULL OR p.birth_date <= $1)
                AND ($2::date IS NULL OR p.birth_date > $2)
                AND ($3::text IS NULL OR left(p.last_name, char_length($3)) = $3)
                AND (NOT $4 OR EXISTS (SELECT 1 FROM addresses a WHERE a.person_id = p.id))
            ORDER BY p.id
            "#,
        )
        .bind(of_age_cutoff)
        .bind(minor_cutoff)
        .bind(query.last_name_prefix.as_deref())
        .bind(query.has_address)
        .fetch_all(&*self.pool)
        .await;
        self.fetch_persons("find_matching", rows).await
    }

    #[instrument(skip(self), fields(person_id = %id), err)]
    async fn find_one(&self, id: PersonId, plan: FetchPlan) -> StoreResult<Option<Person>> {
        match plan {
            FetchPlan::Separate => self.find_one_separate(id).await,
            FetchPlan::Joined => self.find_one_joined(id).await,
        }
    }

    async fn find_by_name(&self, first_name: &str, last_name: &str) -> StoreResult<Option<Person>> {
        let rows = sqlx::query(&format!(
            "SELECT {PERSON_COLUMNS} FROM persons WHERE first_name = $1 AND last_name = $2 ORDER BY id LIMIT 1"
        ))
        .bind(first_name)
        .bind(last_name)
        .fetch_all(&*self.pool)
        .await;
        Ok(self.fetch_persons("find_by_name", rows).await?.into_iter().next())
    }

    #[instrument(skip(self), err)]
    async fn find_living_in_city(&self, city: &str) -> StoreResult<Vec<Person>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.first_name, p.last_name, p.birth_date
            FROM persons p
            WHERE EXISTS (
                SELECT 1 FROM addresses a WHERE a.person_id = p.id AND a.city = $1
            )
            ORDER BY p.id
            "#,
        )
        .bind(city)
        .fetch_all(&*self.pool)
        .await;
        self.fetch_persons("find_living_in_city", rows).await
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // unique, foreign key, check, not-null
                Some("23505") | Some("23503") | Some("23514") | Some("23502") => {
                    StoreError::Constraint(msg)
                }
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("i/o error in {}: {}", operation, e)),
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {err}"))
}

// SQLx row types

#[derive(Debug)]
struct PersonRow {
    id: i64,
    first_name: String,
    last_name: String,
    birth_date: NaiveDate,
}

impl PersonRow {
    fn from_row(row: &PgRow) -> StoreResult<Self> {
        Ok(PersonRow {
            id: row.try_get("id").map_err(decode_error)?,
            first_name: row.try_get("first_name").map_err(decode_error)?,
            last_name: row.try_get("last_name").map_err(decode_error)?,
            birth_date: row.try_get("birth_date").map_err(decode_error)?,
        })
    }

    fn into_person(self, addresses: Vec<Address>) -> Person {
        Person::restore(
            PersonId::new(self.id),
            self.first_name,
            self.last_name,
            self.birth_date,
            addresses,
        )
    }
}

#[derive(Debug)]
struct AddressRow {
    id: i64,
    person_id: i64,
    street: Option<String>,
    post_office_box: Option<String>,
    zip: String,
    city: String,
    country: String,
}

impl AddressRow {
    fn from_row(row: &PgRow) -> StoreResult<Self> {
        Ok(AddressRow {
            id: row.try_get("id").map_err(decode_error)?,
            person_id: row.try_get("person_id").map_err(decode_error)?,
            street: row.try_get("street").map_err(decode_error)?,
            post_office_box: row.try_get("post_office_box").map_err(decode_error)?,
            zip: row.try_get("zip").map_err(decode_error)?,
            city: row.try_get("city").map_err(decode_error)?,
            country: row.try_get("country").map_err(decode_error)?,
        })
    }

    fn into_address(self) -> StoreResult<Address> {
        let country: Country = self
            .country
            .parse()
            .map_err(|e| StoreError::Backend(format!("stored address {}: {e}", self.id)))?;
        // Fails only if the CHECK constraints and the domain rules disagree.
        let draft = NewAddress::new(self.street, self.post_office_box, self.zip, self.city, country)
            .map_err(|e| StoreError::Backend(format!("stored address {}: {e}", self.id)))?;
        Ok(draft.attach(AddressId::new(self.id), PersonId::new(self.person_id)))
    }
}

#[cfg(test)]
mod tests {
    //! Runs only when `TEST_DATABASE_URL` points at a scratch database.

    use super::*;
    use addressbook_core::Entity;

    async fn store() -> Option<PostgresPersonStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let store = PostgresPersonStore::connect(&url, 2).await.unwrap();
        store.ensure_schema().await.unwrap();
        store.delete_all().await.unwrap();
        Some(store)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn postgres_backend_round_trip() {
        let Some(store) = store().await else {
            return;
        };

        let mut p = NewPerson::new("Toni", "Kroos", date(1958, 8, 16)).unwrap();
        p.add_address(NewAddress::new(None, None, "88888", "München", Country::De).unwrap());
        p.add_address(NewAddress::new(None, None, "12345", "Bern", Country::Ch).unwrap());
        let saved = store.save(p).await.unwrap();
        assert!(saved.owns_all_addresses());

        let separate = store.find_one(saved.id(), FetchPlan::Separate).await.unwrap();
        let joined = store.find_one(saved.id(), FetchPlan::Joined).await.unwrap();
        assert_eq!(separate, joined);
        assert_eq!(joined.unwrap().addresses().len(), 2);

        let bern = NewAddress::new(None, None, "12345", "Bern", Country::Ch).unwrap();
        assert!(matches!(
            store.add_address(saved.id(), bern).await,
            Err(StoreError::Constraint(_))
        ));

        store.delete(saved.id()).await.unwrap();
        assert!(store.find_living_in_city("Bern").await.unwrap().is_empty());
        assert!(matches!(
            store.delete(saved.id()).await,
            Err(StoreError::NotFound(_))
        ));

        // SQL translation of the filter agrees with the in-process predicate.
        let today = date(2015, 6, 1);
        for (last, birth) in [("Kroos", date(1958, 8, 16)), ("Khedira", date(2010, 11, 5)), ("Lahm", date(2000, 4, 6))] {
            store.save(NewPerson::new("X", last, birth).unwrap()).await.unwrap();
        }

        let q = PersonQuery::of_age(today).with_last_name_prefix("K");
        let found = store.find_matching(&q).await.unwrap();
        let expected: Vec<_> = store
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .filter(|p| q.matches(p))
            .collect();
        assert_eq!(found, expected);
        assert_eq!(found.len(), 1);
    }
}
