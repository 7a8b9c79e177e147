use chrono::NaiveDate;
use serde::Deserialize;

use addressbook_core::{DomainError, DomainResult, Entity};
use addressbook_people::{Address, Country, NewAddress, Person};

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /person` and `PUT /person/:id`.
#[derive(Debug, Deserialize)]
pub struct PersonRequest {
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`
    pub birth_date: String,
    #[serde(default)]
    pub addresses: Vec<AddressRequest>,
}

impl PersonRequest {
    pub fn birth_date(&self) -> DomainResult<NaiveDate> {
        NaiveDate::parse_from_str(self.birth_date.trim(), "%Y-%m-%d").map_err(|_| {
            DomainError::validation(format!(
                "birth_date must be a YYYY-MM-DD date, got {:?}",
                self.birth_date
            ))
        })
    }

    pub fn addresses(&self) -> DomainResult<Vec<NewAddress>> {
        self.addresses.iter().map(AddressRequest::to_new_address).collect()
    }

    /// Birth date and addresses, both validated.
    pub fn validated_parts(&self) -> DomainResult<(NaiveDate, Vec<NewAddress>)> {
        Ok((self.birth_date()?, self.addresses()?))
    }
}

/// Body of `POST /person/:id/addresses` and each entry of `PersonRequest::addresses`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressRequest {
    pub street: Option<String>,
    pub post_office_box: Option<String>,
    pub zip: String,
    pub city: String,
    pub country: String,
}

impl AddressRequest {
    pub fn to_new_address(&self) -> DomainResult<NewAddress> {
        let country: Country = self.country.parse()?;
        NewAddress::new(
            self.street.clone(),
            self.post_office_box.clone(),
            self.zip.clone(),
            self.city.clone(),
            country,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct CityQuery {
    pub city: String,
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OfAgeQuery {
    /// Case-sensitive last-name prefix.
    pub last_name: Option<String>,
    #[serde(default)]
    pub with_address: bool,
}

// -------------------------
// Response mapping
// -------------------------

pub fn address_to_json(address: &Address) -> serde_json::Value {
    serde_json::json!({
        "id": address.id().get(),
        "person_id": address.person_id().get(),
        "street": address.street(),
        "post_office_box": address.post_office_box(),
        "zip": address.zip(),
        "city": address.city(),
        "country": address.country().as_str(),
    })
}

pub fn person_to_json(person: &Person) -> serde_json::Value {
    serde_json::json!({
        "id": person.id().get(),
        "first_name": person.first_name(),
        "last_name": person.last_name(),
        "birth_date": person.birth_date().format("%Y-%m-%d").to_string(),
        "addresses": person.addresses().iter().map(address_to_json).collect::<Vec<_>>(),
    })
}

pub fn persons_to_json(persons: &[Person]) -> serde_json::Value {
    serde_json::json!({
        "persons": persons.iter().map(person_to_json).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use addressbook_core::{AddressId, PersonId};
    use addressbook_people::NewPerson;

    fn request(birth_date: &str, country: &str) -> PersonRequest {
        serde_json::from_value(serde_json::json!({
            "first_name": "Toni",
            "last_name": "Kroos",
            "birth_date": birth_date,
            "addresses": [{ "zip": "3000", "city": "Bern", "country": country }],
        }))
        .unwrap()
    }

    #[test]
    fn parses_request_into_domain_values() {
        let req = request("1990-01-04", "ch");
        assert_eq!(req.birth_date().unwrap(), NaiveDate::from_ymd_opt(1990, 1, 4).unwrap());

        let addresses = req.addresses().unwrap();
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].country(), Country::Ch);
        assert_eq!(addresses[0].street(), None);
    }

    #[test]
    fn rejects_bad_date_and_country() {
        assert!(matches!(
            request("04.01.1990", "CH").birth_date(),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            request("1990-01-04", "XX").addresses(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn person_json_shape() {
        let mut draft = NewPerson::new("Toni", "Kroos", NaiveDate::from_ymd_opt(1990, 1, 4).unwrap()).unwrap();
        draft.add_address(NewAddress::new(None, Some("12".into()), "3000", "Bern", Country::Ch).unwrap());
        let person = draft.into_person(PersonId::new(7), || AddressId::new(3));

        let json = person_to_json(&person);
        assert_eq!(json["id"], 7);
        assert_eq!(json["birth_date"], "1990-01-04");
        assert_eq!(json["addresses"][0]["id"], 3);
        assert_eq!(json["addresses"][0]["person_id"], 7);
        assert_eq!(json["addresses"][0]["street"], serde_json::Value::Null);
        assert_eq!(json["addresses"][0]["post_office_box"], "12");
        assert_eq!(json["addresses"][0]["country"], "CH");
    }
}
