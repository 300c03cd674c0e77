//! Canonical schemas, one input/output pair per object type.
//!
//! Input structs declare every field optional at the serde layer and enforce
//! required fields in [`CanonicalInput::validate`], so a missing field is
//! reported by name instead of as a generic deserialization error.

pub mod crm;
pub mod hris;
pub mod ticketing;

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub trait CanonicalInput: DeserializeOwned {
    fn validate(&self) -> Result<()>;
}

pub fn parse_input<T: CanonicalInput>(input: &Value) -> Result<T> {
    if !input.is_object() {
        return Err(Error::invalid_field(
            "<input>",
            "canonical input must be a JSON object",
        ));
    }
    let parsed: T = serde_json::from_value(input.clone())
        .map_err(|e| Error::invalid_field("<input>", e.to_string()))?;
    parsed.validate()?;
    Ok(parsed)
}

/// Returns the trimmed value of a required string field.
pub fn require<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::missing_field(field)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub email_address: String,
    #[serde(default)]
    pub email_address_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub phone_number: String,
    #[serde(default)]
    pub phone_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street_1: Option<String>,
    #[serde(default)]
    pub street_2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub address_type: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        [
            &self.street_1,
            &self.street_2,
            &self.city,
            &self.state,
            &self.postal_code,
            &self.country,
        ]
        .iter()
        .all(|v| v.as_deref().map(str::trim).unwrap_or("").is_empty())
    }
}

pub(crate) fn validate_emails(emails: &[Email]) -> Result<()> {
    for (i, e) in emails.iter().enumerate() {
        if e.email_address.trim().is_empty() {
            return Err(Error::missing_field(format!(
                "email_addresses[{i}].email_address"
            )));
        }
        if !e.email_address.contains('@') {
            return Err(Error::invalid_field(
                format!("email_addresses[{i}].email_address"),
                "not an email address",
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_phones(phones: &[Phone]) -> Result<()> {
    for (i, p) in phones.iter().enumerate() {
        if p.phone_number.trim().is_empty() {
            return Err(Error::missing_field(format!(
                "phone_numbers[{i}].phone_number"
            )));
        }
    }
    Ok(())
}
