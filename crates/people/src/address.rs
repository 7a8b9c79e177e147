use core::str::FromStr;

use serde::{Deserialize, Serialize};

use addressbook_core::{AddressId, DomainError, DomainResult, Entity, PersonId};

use crate::validate;

pub const STREET_MAX: usize = 30;
pub const POST_OFFICE_BOX_MAX: usize = 30;
pub const ZIP_MAX: usize = 10;
pub const CITY_MAX: usize = 30;

/// Country of an address (closed set of ISO 3166-1 alpha-2 codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Country {
    De,
    At,
    Ch,
    Fr,
    It,
    Nl,
    Be,
    Lu,
    Li,
    Dk,
    Pl,
    Cz,
    Gb,
    Us,
}

impl Country {
    pub const ALL: [Country; 14] = [
        Country::De,
        Country::At,
        Country::Ch,
        Country::Fr,
        Country::It,
        Country::Nl,
        Country::Be,
        Country::Lu,
        Country::Li,
        Country::Dk,
        Country::Pl,
        Country::Cz,
        Country::Gb,
        Country::Us,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Country::De => "DE",
            Country::At => "AT",
            Country::Ch => "CH",
            Country::Fr => "FR",
            Country::It => "IT",
            Country::Nl => "NL",
            Country::Be => "BE",
            Country::Lu => "LU",
            Country::Li => "LI",
            Country::Dk => "DK",
            Country::Pl => "PL",
            Country::Cz => "CZ",
            Country::Gb => "GB",
            Country::Us => "US",
        }
    }
}

impl core::fmt::Display for Country {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Country {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Country::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
            .ok_or_else(|| DomainError::validation(format!("unknown country code: {code:?}")))
    }
}

/// Transient address: validated, not yet owned by a persisted person.
///
/// The only way to persist one is to attach it to a [`crate::NewPerson`], so an
/// address never reaches the store without its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NewAddress {
    street: Option<String>,
    post_office_box: Option<String>,
    zip: String,
    city: String,
    country: Country,
}

impl NewAddress {
    pub fn new(
        street: Option<String>,
        post_office_box: Option<String>,
        zip: impl Into<String>,
        city: impl Into<String>,
        country: Country,
    ) -> DomainResult<Self> {
        let zip = zip.into();
        let city = city.into();

        if let Some(street) = street.as_deref() {
            validate::max_len("street", street, STREET_MAX)?;
        }
        validate::optional("post_office_box", post_office_box.as_deref(), POST_OFFICE_BOX_MAX)?;
        validate::required("zip", &zip, ZIP_MAX)?;
        validate::required("city", &city, CITY_MAX)?;

        Ok(Self {
            street,
            post_office_box,
            zip,
            city,
            country,
        })
    }

    pub fn street(&self) -> Option<&str> {
        self.street.as_deref()
    }

    pub fn post_office_box(&self) -> Option<&str> {
        self.post_office_box.as_deref()
    }

    pub fn zip(&self) -> &str {
        &self.zip
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn country(&self) -> Country {
        self.country
    }

    /// Bind this draft to its owner once the store has assigned identities.
    pub fn attach(self, id: AddressId, person_id: PersonId) -> Address {
        Address {
            id,
            person_id,
            street: self.street,
            post_office_box: self.post_office_box,
            zip: self.zip,
            city: self.city,
            country: self.country,
        }
    }
}

/// Persisted address. Always carries the id of its owning person.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Address {
    id: AddressId,
    person_id: PersonId,
    street: Option<String>,
    post_office_box: Option<String>,
    zip: String,
    city: String,
    country: Country,
}

impl Address {
    pub fn person_id(&self) -> PersonId {
        self.person_id
    }

    pub fn street(&self) -> Option<&str> {
        self.street.as_deref()
    }

    pub fn post_office_box(&self) -> Option<&str> {
        self.post_office_box.as_deref()
    }

    pub fn zip(&self) -> &str {
        &self.zip
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn country(&self) -> Country {
        self.country
    }

    /// The address fields without id and owner.
    pub fn to_draft(&self) -> NewAddress {
        NewAddress {
            street: self.street.clone(),
            post_office_box: self.post_office_box.clone(),
            zip: self.zip.clone(),
            city: self.city.clone(),
            country: self.country,
        }
    }
}

impl Entity for Address {
    type Id = AddressId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
