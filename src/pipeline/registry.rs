//! Document Type Registry: tag → (output shape, instructions, persistence).
//!
//! Built once at startup and shared read-only across requests.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use super::error::PipelineError;
use super::persistence::PersistenceGateway;
use super::prompt_templates::instructions_for;
use crate::models::{AnalysisResult, DocumentType, OutputShape, PersistenceOutcome};

/// Which gateway operation files a document type's sub-records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistAction {
    BloodTests,
    Vaccinations,
    Medications,
    Report,
}

impl PersistAction {
    /// Shape the action expects its input to have.
    pub fn input_shape(&self) -> OutputShape {
        match self {
            Self::BloodTests => OutputShape::BloodTest,
            Self::Vaccinations => OutputShape::Vaccination,
            Self::Medications => OutputShape::Medication,
            Self::Report => OutputShape::Report,
        }
    }
}

/// A persistence action bound to the gateway that performs it.
#[derive(Clone)]
pub struct PersistBinding {
    action: PersistAction,
    gateway: Arc<dyn PersistenceGateway>,
}

impl PersistBinding {
    pub fn action(&self) -> PersistAction {
        self.action
    }

    pub async fn persist(&self, user_id: i64, analysis: &AnalysisResult) -> Vec<PersistenceOutcome> {
        match self.action {
            PersistAction::BloodTests => self.gateway.save_blood_tests(user_id, analysis).await,
            PersistAction::Vaccinations => self.gateway.save_vaccinations(user_id, analysis).await,
            PersistAction::Medications => self.gateway.save_medications(user_id, analysis).await,
            PersistAction::Report => self.gateway.save_report(user_id, analysis).await,
        }
    }
}

impl std::fmt::Debug for PersistBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistBinding")
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// Persistence policy of one registry entry. An entry never lacks a policy:
/// types that must not be filed say so explicitly.
#[derive(Debug, Clone)]
pub enum Persistence {
    Bound(PersistBinding),
    NonPersisting,
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub document_type: DocumentType,
    pub output_shape: OutputShape,
    pub instructions: String,
    pub persistence: Persistence,
}

impl RegistryEntry {
    pub fn persists(&self) -> bool {
        matches!(self.persistence, Persistence::Bound(_))
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    entries: HashMap<DocumentType, RegistryEntry>,
}

impl Registry {
    /// Production registry: every medical document type bound to its
    /// gateway operation, `other` read with the report shape and never filed.
    pub fn build(gateway: Arc<dyn PersistenceGateway>) -> Self {
        let bound = |action: PersistAction| {
            Persistence::Bound(PersistBinding {
                action,
                gateway: gateway.clone(),
            })
        };

        let entries = [
            (DocumentType::BloodTest, OutputShape::BloodTest, bound(PersistAction::BloodTests)),
            (DocumentType::Vaccination, OutputShape::Vaccination, bound(PersistAction::Vaccinations)),
            (DocumentType::Report, OutputShape::Report, bound(PersistAction::Report)),
            (DocumentType::Medication, OutputShape::Medication, bound(PersistAction::Medications)),
            (DocumentType::Other, OutputShape::Report, Persistence::NonPersisting),
        ]
        .into_iter()
        .map(|(document_type, output_shape, persistence)| {
            let entry = RegistryEntry {
                document_type,
                output_shape,
                instructions: instructions_for(document_type),
                persistence,
            };
            (document_type, entry)
        })
        .collect();

        Self { entries }
    }

    /// Resolve a wire tag. Unregistered tags are rejected before any
    /// extraction happens.
    pub fn lookup(&self, tag: &str) -> Result<&RegistryEntry, PipelineError> {
        let document_type = DocumentType::from_str(tag)?;
        self.entries
            .get(&document_type)
            .ok_or_else(|| PipelineError::UnknownDocumentType(tag.to_string()))
    }

    /// Entries in declaration order of `DocumentType::all()`.
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        DocumentType::all()
            .iter()
            .filter_map(|document_type| self.entries.get(document_type))
    }
}
