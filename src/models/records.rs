//! Write schemas of the downstream record service, one per entity kind.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodTestRecord {
    pub date: String,
    pub metric: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationRecord {
    pub name: String,
    pub disease: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecord {
    pub name: String,
    pub daily_intake: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub date: String,
    pub summary: String,
    pub text: String,
}

/// The entity kinds the record service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    BloodTest,
    Vaccination,
    Medication,
    Report,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BloodTest => "blood_test",
            Self::Vaccination => "vaccination",
            Self::Medication => "medication",
            Self::Report => "report",
        }
    }

    /// Collection path of the kind on the record service, before `/user/{id}`.
    pub fn collection_path(&self) -> &'static str {
        match self {
            Self::BloodTest => "/api/blood-tests",
            Self::Vaccination => "/api/vaccinations",
            Self::Medication => "/api/meds",
            Self::Report => "/api/reports",
        }
    }
}
