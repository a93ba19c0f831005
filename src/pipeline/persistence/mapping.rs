//! Field mappings from analysis sub-records to record-service write bodies.
//!
//! Each plan names the collection it fans out over and how that collection
//! expands into writes: one per blood parameter, one per (vaccination,
//! disease) pair, one per medication, and a single aggregated write for a
//! report. Mapping failures are carried as `Err` write items so the fan-out
//! can turn them into absence markers in place.

use serde::Serialize;
use serde_json::Value;

use super::PersistError;
use crate::models::{
    present_text, AnalysisResult, BloodTestRecord, MedicationRecord, OutputShape, RecordKind,
    ReportRecord, VaccinationRecord,
};

/// Inputs shared by every sub-record of one analysis.
pub struct MappingContext<'a> {
    pub analysis: &'a AnalysisResult,
    /// Local date (`YYYY-MM-DD`) used when no date was extracted.
    pub today: String,
}

impl MappingContext<'_> {
    /// Document-level date, else today.
    fn document_date(&self) -> String {
        self.analysis
            .text_field("date")
            .map(str::to_string)
            .unwrap_or_else(|| self.today.clone())
    }
}

/// One prospective downstream write.
#[derive(Debug)]
pub struct WriteItem {
    /// Human-readable label for logs.
    pub label: String,
    pub body: Result<Value, PersistError>,
}

impl WriteItem {
    fn ok<T: Serialize>(label: String, record: &T) -> Self {
        let body = serde_json::to_value(record).map_err(|e| PersistError::Encoding(e.to_string()));
        Self { label, body }
    }

    fn failed(label: String, err: PersistError) -> Self {
        Self {
            label,
            body: Err(err),
        }
    }
}

/// How one record kind is fanned out.
#[derive(Clone, Copy)]
pub struct FanOutPlan {
    pub kind: RecordKind,
    pub shape: OutputShape,
    pub expand: fn(&MappingContext<'_>, &[Value]) -> Vec<WriteItem>,
}

impl FanOutPlan {
    pub fn collection(&self) -> &'static str {
        self.shape.collection_field()
    }
}

impl std::fmt::Debug for FanOutPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutPlan")
            .field("kind", &self.kind)
            .field("collection", &self.collection())
            .finish()
    }
}

pub const BLOOD_TESTS: FanOutPlan = FanOutPlan {
    kind: RecordKind::BloodTest,
    shape: OutputShape::BloodTest,
    expand: expand_blood_tests,
};

pub const VACCINATIONS: FanOutPlan = FanOutPlan {
    kind: RecordKind::Vaccination,
    shape: OutputShape::Vaccination,
    expand: expand_vaccinations,
};

pub const MEDICATIONS: FanOutPlan = FanOutPlan {
    kind: RecordKind::Medication,
    shape: OutputShape::Medication,
    expand: expand_medications,
};

pub const REPORT: FanOutPlan = FanOutPlan {
    kind: RecordKind::Report,
    shape: OutputShape::Report,
    expand: expand_report,
};

// ═══════════════════════════════════════════
// Blood tests: one write per parameter
// ═══════════════════════════════════════════

fn expand_blood_tests(ctx: &MappingContext<'_>, items: &[Value]) -> Vec<WriteItem> {
    items.iter().map(|item| map_blood_parameter(ctx, item)).collect()
}

fn map_blood_parameter(ctx: &MappingContext<'_>, item: &Value) -> WriteItem {
    let Some(metric) = present_text(item.get("name")) else {
        return WriteItem::failed("blood parameter".into(), PersistError::MissingField("name"));
    };
    let label = format!("blood parameter '{metric}'");

    let value = match item.get("value") {
        None | Some(Value::Null) => {
            return WriteItem::failed(label, PersistError::MissingField("value"))
        }
        Some(v) => match v.as_f64() {
            Some(value) => value,
            None => return WriteItem::failed(label, PersistError::InvalidField("value")),
        },
    };

    let date = present_text(item.get("date"))
        .map(str::to_string)
        .unwrap_or_else(|| ctx.document_date());

    WriteItem::ok(
        label,
        &BloodTestRecord {
            date,
            metric: metric.to_string(),
            value,
        },
    )
}

// ═══════════════════════════════════════════
// Vaccinations: one write per (entry, disease)
// ═══════════════════════════════════════════

fn expand_vaccinations(_ctx: &MappingContext<'_>, items: &[Value]) -> Vec<WriteItem> {
    items.iter().flat_map(map_vaccination_entry).collect()
}

fn map_vaccination_entry(item: &Value) -> Vec<WriteItem> {
    let name = present_text(item.get("Impfstoffname"));
    let date = present_text(item.get("Impfdatum"));
    let label = format!("vaccination '{}'", name.unwrap_or("?"));

    // Without a disease list the number of writes is unknown: one marker.
    let Some(diseases) = item.get("Krankheit").and_then(Value::as_array) else {
        return vec![WriteItem::failed(label, PersistError::MissingField("Krankheit"))];
    };

    diseases
        .iter()
        .map(|disease| {
            let label = format!("{label} / {}", disease.as_str().unwrap_or("?"));
            let Some(name) = name else {
                return WriteItem::failed(label, PersistError::MissingField("Impfstoffname"));
            };
            let Some(date) = date else {
                return WriteItem::failed(label, PersistError::MissingField("Impfdatum"));
            };
            let Some(disease) = present_text(Some(disease)) else {
                return WriteItem::failed(label, PersistError::InvalidField("Krankheit"));
            };
            WriteItem::ok(
                label,
                &VaccinationRecord {
                    name: name.to_string(),
                    disease: disease.to_string(),
                    date: date.to_string(),
                },
            )
        })
        .collect()
}

// ═══════════════════════════════════════════
// Medications: one write per entry
// ═══════════════════════════════════════════

fn expand_medications(_ctx: &MappingContext<'_>, items: &[Value]) -> Vec<WriteItem> {
    items.iter().map(map_medication).collect()
}

fn map_medication(item: &Value) -> WriteItem {
    let Some(name) = present_text(item.get("name")) else {
        return WriteItem::failed("medication".into(), PersistError::MissingField("name"));
    };
    let label = format!("medication '{name}'");

    let daily_intake = match item.get("daily_intake") {
        None | Some(Value::Null) => None,
        Some(v) => match as_whole_number(v) {
            Some(n) => Some(n),
            None => return WriteItem::failed(label, PersistError::InvalidField("daily_intake")),
        },
    };

    WriteItem::ok(
        label,
        &MedicationRecord {
            name: name.to_string(),
            daily_intake,
        },
    )
}

/// Integer value, accepting floats without a fractional part (`2.0`).
fn as_whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

// ═══════════════════════════════════════════
// Report: one aggregated write
// ═══════════════════════════════════════════

fn expand_report(ctx: &MappingContext<'_>, paragraphs: &[Value]) -> Vec<WriteItem> {
    let label = "report".to_string();
    let Some(summary) = ctx.analysis.text_field("summary") else {
        return vec![WriteItem::failed(label, PersistError::MissingField("summary"))];
    };

    let text = paragraphs
        .iter()
        .map(render_paragraph)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![WriteItem::ok(
        label,
        &ReportRecord {
            date: ctx.document_date(),
            summary: summary.to_string(),
            text,
        },
    )]
}

/// `caption\nfull_text`, dropping whichever part is missing.
fn render_paragraph(paragraph: &Value) -> String {
    [
        present_text(paragraph.get("caption")),
        present_text(paragraph.get("full_text")),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("\n")
}
