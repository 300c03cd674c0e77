use super::{require, CanonicalInput};
use crate::unification::custom_fields::FieldMappings;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedHrisBenefitInput {
    pub provider_name: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    /// MEDICAL, DENTAL, VISION, HSA, FSA, DEPENDENT_CARE_FSA, ROTH_401K, OTHER.
    pub benefit_plan_type: Option<String>,
    #[serde(default)]
    pub employee_contribution: Option<f64>,
    #[serde(default)]
    pub company_contribution: Option<f64>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub field_mappings: FieldMappings,
}

impl CanonicalInput for UnifiedHrisBenefitInput {
    fn validate(&self) -> Result<()> {
        require(&self.provider_name, "provider_name")?;
        require(&self.benefit_plan_type, "benefit_plan_type")?;
        for (field, value) in [
            ("employee_contribution", self.employee_contribution),
            ("company_contribution", self.company_contribution),
        ] {
            if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
                return Err(Error::invalid_field(field, "must be a non-negative amount"));
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(Error::invalid_field("end_date", "ends before start_date"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedHrisBenefitOutput {
    pub provider_name: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    pub benefit_plan_type: Option<String>,
    #[serde(default)]
    pub employee_contribution: Option<f64>,
    #[serde(default)]
    pub company_contribution: Option<f64>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}
