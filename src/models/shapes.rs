//! Extraction contracts: the structured output each document type must
//! conform to, as typed structs (for validation) and as JSON Schema (for
//! the model's structured-output request).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::analysis::AnalysisResult;
use super::enums::AnalysisStatus;

// ═══════════════════════════════════════════
// Typed shapes
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodParameter {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodTestAnalysis {
    pub status: AnalysisStatus,
    pub date: String,
    pub parameters: Vec<BloodParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationEntry {
    #[serde(rename = "Impfstoffname")]
    pub vaccine_name: String,
    #[serde(rename = "Krankheit")]
    pub diseases: Vec<String>,
    #[serde(rename = "Impfdatum")]
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationAnalysis {
    pub status: AnalysisStatus,
    pub impfungen: Vec<VaccinationEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportParagraph {
    pub caption: String,
    pub full_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAnalysis {
    pub status: AnalysisStatus,
    pub date: String,
    pub summary: String,
    pub paragraphs: Vec<ReportParagraph>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub name: String,
    pub daily_intake: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationAnalysis {
    pub status: AnalysisStatus,
    pub date: String,
    pub medikamente: Vec<MedicationEntry>,
}

// ═══════════════════════════════════════════
// Shape descriptor
// ═══════════════════════════════════════════

/// Structural descriptor of an extraction result, one per document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputShape {
    BloodTest,
    Vaccination,
    Report,
    Medication,
}

impl OutputShape {
    /// Name passed to the model alongside the schema.
    pub fn schema_name(&self) -> &'static str {
        match self {
            Self::BloodTest => "Blutbild",
            Self::Vaccination => "Impfpass",
            Self::Report => "Befund",
            Self::Medication => "Medikation",
        }
    }

    /// The collection field whose elements are the sub-records.
    pub fn collection_field(&self) -> &'static str {
        match self {
            Self::BloodTest => "parameters",
            Self::Vaccination => "impfungen",
            Self::Report => "paragraphs",
            Self::Medication => "medikamente",
        }
    }

    /// Strict JSON Schema for structured-output requests.
    pub fn json_schema(&self) -> Value {
        let status = json!({"type": "string", "enum": ["success", "error"]});
        match self {
            Self::BloodTest => object_schema(
                json!({
                    "status": status,
                    "date": {"type": "string"},
                    "parameters": {
                        "type": "array",
                        "items": object_schema(json!({
                            "name": {"type": "string"},
                            "value": {"type": "number"}
                        }))
                    }
                }),
            ),
            Self::Vaccination => object_schema(json!({
                "status": status,
                "impfungen": {
                    "type": "array",
                    "items": object_schema(json!({
                        "Impfstoffname": {"type": "string"},
                        "Krankheit": {"type": "array", "items": {"type": "string"}},
                        "Impfdatum": {"type": "string"}
                    }))
                }
            })),
            Self::Report => object_schema(json!({
                "status": status,
                "date": {"type": "string"},
                "summary": {"type": "string"},
                "paragraphs": {
                    "type": "array",
                    "items": object_schema(json!({
                        "caption": {"type": "string"},
                        "full_text": {"type": "string"}
                    }))
                }
            })),
            Self::Medication => object_schema(json!({
                "status": status,
                "date": {"type": "string"},
                "medikamente": {
                    "type": "array",
                    "items": object_schema(json!({
                        "name": {"type": "string"},
                        "daily_intake": {"type": "integer"}
                    }))
                }
            })),
        }
    }

    /// Check that `value` conforms to this shape and convert it.
    ///
    /// Conformance is decided by the typed struct; the returned result keeps
    /// the original JSON so no field is lost or reformatted. A rejected
    /// document (`status = error`) is returned as-is, whatever its payload.
    pub fn conform(&self, value: Value) -> Result<AnalysisResult, String> {
        let mismatch = |e: serde_json::Error| format!("{} shape mismatch: {e}", self.schema_name());

        let result = AnalysisResult::from_value(value.clone()).map_err(mismatch)?;
        if !result.is_success() {
            return Ok(result);
        }

        let checked = match self {
            Self::BloodTest => serde_json::from_value::<BloodTestAnalysis>(value).map(drop),
            Self::Vaccination => serde_json::from_value::<VaccinationAnalysis>(value).map(drop),
            Self::Report => serde_json::from_value::<ReportAnalysis>(value).map(drop),
            Self::Medication => serde_json::from_value::<MedicationAnalysis>(value).map(drop),
        };
        checked.map_err(mismatch)?;

        Ok(result)
    }
}

/// Object schema where every property is required and nothing else allowed.
fn object_schema(properties: Value) -> Value {
    let required: Vec<String> = properties
        .as_object()
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}
