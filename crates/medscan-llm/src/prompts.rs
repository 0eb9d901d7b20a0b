//! Extraction prompts for the vision model.
//!
//! Each document kind gets its own prompt describing the exact JSON shape the
//! schema validator expects. Confidence is requested per line item so the
//! pipeline can decide what needs human verification.

use crate::DocumentKind;

/// Shared instructions prepended to every extraction prompt.
pub const SYSTEM_PREAMBLE: &str = r#"You are a medical document reader. You receive a photo of a single medical document and transcribe its content into JSON.

Rules:
- Only report what is legible on the document. Never guess missing values.
- Give every line item a "confidence" between 0.0 and 1.0 reflecting how legible and unambiguous it is.
- Use null for any field that is not present on the document.
- Answer with the JSON object only, without commentary."#;

/// Prescription extraction instructions.
pub const PRESCRIPTION_INSTRUCTIONS: &str = r#"The document is a medical prescription. Return a JSON object with:
- doctor_name: prescribing doctor as written (null if absent)
- prescription_date: date of the prescription in YYYY-MM-DD format (null if absent)
- medications: array with one entry per prescribed medication, in document order:
  - drug_name: medication name exactly as written, including brand and strength
  - dosage: amount per intake (e.g. "1 tablet", "500 mg")
  - frequency: how often (e.g. "3 times a day")
  - duration: treatment length (e.g. "7 days")
  - route: route of administration if written (e.g. "oral")
  - instructions: any additional instruction (e.g. "with meals")
  - confidence: number between 0.0 and 1.0

If the photo does not show a prescription, return {"medications": []}."#;

/// Biology report extraction instructions.
pub const BIOLOGY_REPORT_INSTRUCTIONS: &str = r#"The document is a laboratory (biology) report. Return a JSON object with:
- laboratory_name: name of the laboratory (null if absent)
- report_date: date of the sample or report in YYYY-MM-DD format (null if absent)
- test_results: array with one entry per measured biomarker, in document order:
  - biomarker_name: name of the test exactly as written
  - value: measured value as written, numbers only when possible (e.g. "5.4")
  - unit: unit of the value (e.g. "g/L", "mmol/L")
  - reference_range: normal range as written, formatted "min-max" when possible
  - confidence: number between 0.0 and 1.0

If the photo does not show a laboratory report, return {"test_results": []}."#;

/// Example answer used to anchor the expected prescription format.
pub const PRESCRIPTION_EXAMPLE: &str = r#"{"doctor_name":"Dr. Claire Martin","prescription_date":"2024-03-01","medications":[{"drug_name":"Amoxicilline 1g","dosage":"1 tablet","frequency":"2 times a day","duration":"6 days","route":"oral","instructions":null,"confidence":0.93}]}"#;

/// Example answer used to anchor the expected biology report format.
pub const BIOLOGY_REPORT_EXAMPLE: &str = r#"{"laboratory_name":"Laboratoire Central","report_date":"2024-02-12","test_results":[{"biomarker_name":"Glycémie à jeun","value":"0.92","unit":"g/L","reference_range":"0.70-1.10","confidence":0.88}]}"#;

/// Build the complete prompt for a document kind.
pub fn build_prompt(kind: DocumentKind) -> String {
    let (instructions, example) = match kind {
        DocumentKind::Prescription => (PRESCRIPTION_INSTRUCTIONS, PRESCRIPTION_EXAMPLE),
        DocumentKind::BiologyReport => (BIOLOGY_REPORT_INSTRUCTIONS, BIOLOGY_REPORT_EXAMPLE),
    };

    let mut prompt = String::with_capacity(
        SYSTEM_PREAMBLE.len() + instructions.len() + example.len() + 32,
    );
    prompt.push_str(SYSTEM_PREAMBLE);
    prompt.push_str("\n\n");
    prompt.push_str(instructions);
    prompt.push_str("\n\nExample answer:\n");
    prompt.push_str(example);
    prompt
}
