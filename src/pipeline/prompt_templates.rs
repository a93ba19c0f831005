//! Extraction instructions handed to the vision model, one per document type.
//!
//! The wording is data: the registry passes it through unmodified.

use crate::models::DocumentType;

const GENERAL: &str = "\
You are a scanner for medical documents. Your task is to analyse images from our patients and \
classify the contents of the medical records into structured output. \
If the date can not be found in the document just put no_date_detected as a placeholder. \
If any other key is not present in the document just put 0 for ints and na for strings.";

const BLOOD_TEST: &str = "\
If the picture we send is not a valid blood test or anything related, give status: error then we reject the scan. \
Else put status: success. \
Each blood test parameter has a name and a value in float that is saved in the parameter list.";

const VACCINATION: &str = "\
If the picture we send is not a valid vaccination pass (Impfpass) or anything related, give status: error then we reject the scan. \
Else put status: success. \
Analyse each vaccination individually and list every disease it protects against in Krankheit. \
If a value does not exist or you can not find it, just put na.";

const REPORT: &str = "\
If the picture we send is not a doctor report in written form give status: error then we reject the scan. \
Else put status: success. \
summary should contain a 2-sentence summary of the whole report, \
each paragraph should be modeled individually with a caption and the full written text.";

const MEDICATION: &str = "\
If the picture we send is not a report on what medication the user is taking give status: error then we reject the scan. \
Else put status: success. \
List every medication with its name and the number of doses taken per day as daily_intake.";

const OTHER: &str = "\
If the document is not at all health related then give status: error then we reject the scan. \
Else put status: success. \
Try to summarize the document as concise as possible especially outlining any anomalies or diseases.";

/// Full instruction text for a document type: general preamble plus the
/// type-specific section.
pub fn instructions_for(doc_type: DocumentType) -> String {
    let specific = match doc_type {
        DocumentType::BloodTest => BLOOD_TEST,
        DocumentType::Vaccination => VACCINATION,
        DocumentType::Report => REPORT,
        DocumentType::Medication => MEDICATION,
        DocumentType::Other => OTHER,
    };
    format!("{GENERAL}\n\n{specific}")
}
