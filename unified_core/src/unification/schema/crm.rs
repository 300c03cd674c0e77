use super::{require, validate_emails, validate_phones, Address, CanonicalInput, Email, Phone};
use crate::unification::custom_fields::FieldMappings;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedCrmContactInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<Email>,
    #[serde(default)]
    pub phone_numbers: Vec<Phone>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    /// Owner in the provider (remote user id).
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub field_mappings: FieldMappings,
}

impl CanonicalInput for UnifiedCrmContactInput {
    fn validate(&self) -> Result<()> {
        require(&self.first_name, "first_name")?;
        require(&self.last_name, "last_name")?;
        validate_emails(&self.email_addresses)?;
        validate_phones(&self.phone_numbers)?;
        Ok(())
    }
}

impl UnifiedCrmContactInput {
    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses.first().map(|e| e.email_address.as_str())
    }

    pub fn primary_phone(&self) -> Option<&str> {
        self.phone_numbers.first().map(|p| p.phone_number.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedCrmContactOutput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<Email>,
    #[serde(default)]
    pub phone_numbers: Vec<Phone>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedCrmCompanyInput {
    pub name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub number_of_employees: Option<u64>,
    #[serde(default)]
    pub email_addresses: Vec<Email>,
    #[serde(default)]
    pub phone_numbers: Vec<Phone>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub field_mappings: FieldMappings,
}

impl CanonicalInput for UnifiedCrmCompanyInput {
    fn validate(&self) -> Result<()> {
        require(&self.name, "name")?;
        if self.industry.as_deref().is_some_and(|i| i.len() > 255) {
            return Err(Error::invalid_field("industry", "longer than 255 characters"));
        }
        validate_emails(&self.email_addresses)?;
        validate_phones(&self.phone_numbers)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedCrmCompanyOutput {
    pub name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub number_of_employees: Option<u64>,
    #[serde(default)]
    pub email_addresses: Vec<Email>,
    #[serde(default)]
    pub phone_numbers: Vec<Phone>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub user_id: Option<String>,
}
