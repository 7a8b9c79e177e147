//! Query/filter predicates over persons.
//!
//! Every predicate is pure given a reference date. Store backends translate a
//! [`PersonQuery`] into their own query language, but must agree with
//! [`PersonQuery::matches`].

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::person::Person;

pub const AGE_OF_MAJORITY_YEARS: u32 = 18;

/// Latest birth date that still counts as "of age" on `today`.
///
/// Subtracts whole calendar months, so 29 Feb clamps to 28 Feb in non-leap years.
pub fn age_cutoff(today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_months(Months::new(AGE_OF_MAJORITY_YEARS * 12))
        .unwrap_or(NaiveDate::MIN)
}

/// Born on or before the cutoff (the boundary day itself is of age).
pub fn is_of_age(person: &Person, today: NaiveDate) -> bool {
    person.birth_date() <= age_cutoff(today)
}

pub fn is_minor(person: &Person, today: NaiveDate) -> bool {
    person.birth_date() > age_cutoff(today)
}

/// Case-sensitive prefix match on the last name.
pub fn last_name_starts_with(person: &Person, prefix: &str) -> bool {
    person.last_name().starts_with(prefix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBracket {
    OfAge,
    Minor,
}

/// Age criterion evaluated relative to a fixed reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeFilter {
    pub bracket: AgeBracket,
    pub today: NaiveDate,
}

impl AgeFilter {
    pub fn cutoff(&self) -> NaiveDate {
        age_cutoff(self.today)
    }

    pub fn matches_birth_date(&self, birth_date: NaiveDate) -> bool {
        match self.bracket {
            AgeBracket::OfAge => birth_date <= self.cutoff(),
            AgeBracket::Minor => birth_date > self.cutoff(),
        }
    }
}

/// Conjunction of optional person criteria. An empty query matches everyone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonQuery {
    pub age: Option<AgeFilter>,
    pub last_name_prefix: Option<String>,
    /// Require at least one owned address.
    pub has_address: bool,
}

impl PersonQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_age(today: NaiveDate) -> Self {
        Self {
            age: Some(AgeFilter {
                bracket: AgeBracket::OfAge,
                today,
            }),
            ..Self::default()
        }
    }

    pub fn minors(today: NaiveDate) -> Self {
        Self {
            age: Some(AgeFilter {
                bracket: AgeBracket::Minor,
                today,
            }),
            ..Self::default()
        }
    }

    pub fn with_last_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.last_name_prefix = Some(prefix.into());
        self
    }

    pub fn with_address(mut self) -> Self {
        self.has_address = true;
        self
    }

    pub fn matches(&self, person: &Person) -> bool {
        let age_ok = self
            .age
            .is_none_or(|age| age.matches_birth_date(person.birth_date()));
        let name_ok = self
            .last_name_prefix
            .as_deref()
            .is_none_or(|prefix| last_name_starts_with(person, prefix));
        let address_ok = !self.has_address || !person.addresses().is_empty();

        age_ok && name_ok && address_ok
    }
}
