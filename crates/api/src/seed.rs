//! Example persons inserted on start-up.

use tracing::info;

use crate::app::services::{PersonManagementService, ServiceResult};

pub const EXAMPLE_PERSONS: [(&str, &str); 2] = [("Kai", "Hansen"), ("Achim", "Maier")];

/// Insert each example person (born today, no addresses) unless a person with
/// the same first and last name already exists. Returns how many were inserted.
pub async fn seed_example_persons(service: &PersonManagementService) -> ServiceResult<usize> {
    let today = service.today();
    let mut inserted = 0;

    for (first_name, last_name) in EXAMPLE_PERSONS {
        if service
            .find_by_first_and_last_name(first_name, last_name)
            .await?
            .is_some()
        {
            continue;
        }
        service
            .create_person(first_name, last_name, today, Vec::new())
            .await?;
        inserted += 1;
    }

    info!(inserted, "seed data applied");
    Ok(inserted)
}
