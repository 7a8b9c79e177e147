use addressbook_core::{DomainError, DomainResult};

/// Required text field: non-blank, at most `max` characters.
pub(crate) fn required(field: &str, value: &str, max: usize) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    max_len(field, value, max)
}

/// Optional text field: only checked when present.
pub(crate) fn optional(field: &str, value: Option<&str>, max: usize) -> DomainResult<()> {
    match value {
        Some(v) => required(field, v, max),
        None => Ok(()),
    }
}

pub(crate) fn max_len(field: &str, value: &str, max: usize) -> DomainResult<()> {
    // Limits count characters, not bytes ("Müller" is 6).
    let len = value.chars().count();
    if len > max {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max} characters (got {len})"
        )));
    }
    Ok(())
}
