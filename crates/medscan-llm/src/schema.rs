//! Schema validation for parsed model responses.
//!
//! Both document kinds share one shape: an object with optional document
//! metadata and an optional array of line items. Each line item needs its
//! identity field and a confidence; everything else is optional.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::parser::{ResponseError, ResponseResult};

/// A medication line as extracted by the model, before catalog matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawMedication {
    pub drug_name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub route: Option<String>,
    pub instructions: Option<String>,
    pub confidence: f64,
}

/// A lab test line as extracted by the model, before catalog matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawTestResult {
    pub biomarker_name: String,
    pub value: Option<String>,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub confidence: f64,
}

/// Validated prescription response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionResponse {
    pub doctor_name: Option<String>,
    pub prescription_date: Option<String>,
    pub medications: Vec<RawMedication>,
}

/// Validated biology report response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BiologyReportResponse {
    pub laboratory_name: Option<String>,
    pub report_date: Option<String>,
    pub test_results: Vec<RawTestResult>,
}

/// Validate a parsed prescription response.
pub fn validate_prescription(value: &Value) -> ResponseResult<PrescriptionResponse> {
    let root = as_object(value)?;

    let medications = line_items(root, "medications")?
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let item = entry
                .as_object()
                .ok_or(ResponseError::EntryNotObject(index))?;

            let drug_name = required_text(item, "drug_name", index)?;
            if drug_name.is_empty() {
                return Err(ResponseError::MissingField {
                    index,
                    field: "drug_name",
                });
            }

            Ok(RawMedication {
                drug_name,
                dosage: optional_text(item, "dosage"),
                frequency: optional_text(item, "frequency"),
                duration: optional_text(item, "duration"),
                route: optional_text(item, "route"),
                instructions: optional_text(item, "instructions"),
                confidence: required_confidence(item, index)?,
            })
        })
        .collect::<ResponseResult<Vec<_>>>()?;

    Ok(PrescriptionResponse {
        doctor_name: optional_text(root, "doctor_name"),
        prescription_date: optional_text(root, "prescription_date"),
        medications,
    })
}

/// Validate a parsed biology report response.
pub fn validate_biology_report(value: &Value) -> ResponseResult<BiologyReportResponse> {
    let root = as_object(value)?;

    let test_results = line_items(root, "test_results")?
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let item = entry
                .as_object()
                .ok_or(ResponseError::EntryNotObject(index))?;

            Ok(RawTestResult {
                biomarker_name: required_text(item, "biomarker_name", index)?,
                value: optional_text(item, "value"),
                unit: optional_text(item, "unit"),
                reference_range: optional_text(item, "reference_range"),
                confidence: required_confidence(item, index)?,
            })
        })
        .collect::<ResponseResult<Vec<_>>>()?;

    Ok(BiologyReportResponse {
        laboratory_name: optional_text(root, "laboratory_name"),
        report_date: optional_text(root, "report_date"),
        test_results,
    })
}

fn as_object(value: &Value) -> ResponseResult<&Map<String, Value>> {
    value.as_object().ok_or(ResponseError::NotAnObject)
}

/// Absent, null and empty arrays all mean "no items".
fn line_items<'a>(root: &'a Map<String, Value>, field: &'static str) -> ResponseResult<&'a [Value]> {
    match root.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ResponseError::NotAnArray(field)),
    }
}

/// Text value of a field; numbers and booleans are rendered, blanks dropped.
fn optional_text(item: &Map<String, Value>, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_text(item: &Map<String, Value>, field: &'static str, index: usize) -> ResponseResult<String> {
    match item.get(field) {
        None | Some(Value::Null) => Err(ResponseError::MissingField { index, field }),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ResponseError::InvalidField {
            index,
            field,
            reason: format!("expected text, got {}", json_type(other)),
        }),
    }
}

fn required_confidence(item: &Map<String, Value>, index: usize) -> ResponseResult<f64> {
    const FIELD: &str = "confidence";

    let confidence = match item.get(FIELD) {
        None | Some(Value::Null) => {
            return Err(ResponseError::MissingField { index, field: FIELD })
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match confidence {
        Some(c) if (0.0..=1.0).contains(&c) => Ok(c),
        Some(c) => Err(ResponseError::InvalidField {
            index,
            field: FIELD,
            reason: format!("{c} is outside [0, 1]"),
        }),
        None => Err(ResponseError::InvalidField {
            index,
            field: FIELD,
            reason: "expected a number".into(),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
