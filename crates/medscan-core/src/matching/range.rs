//! Reference range resolution and out-of-range flags for lab values.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::ReferenceRange;

/// `min - max` with `.` or `,` decimals, optionally followed by a unit.
static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+(?:[.,]\d+)?)\s*[-–—]\s*(\d+(?:[.,]\d+)?)(?:\s*[^\d.,\s\-–—].*)?\s*$")
        .expect("reference range pattern is valid")
});

/// Range a value was compared against and the comparison outcome.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RangeEvaluation {
    pub range: Option<ReferenceRange>,
    /// `None` when either the range or the value is unusable
    pub out_of_range: Option<bool>,
}

/// Parse a reference range written on a report.
///
/// Accepts `"70-100"`, `"70 - 100"`, `"3,5-5,1"` and `"70-100 mg/dL"`.
/// Inverted ranges are unusable.
pub fn parse_reference_range(text: &str) -> Option<ReferenceRange> {
    let captures = RANGE_PATTERN.captures(text)?;
    let min = parse_decimal(captures.get(1)?.as_str())?;
    let max = parse_decimal(captures.get(2)?.as_str())?;
    ReferenceRange::new(min, max)
}

/// Parse a measured value. Anything but a plain decimal is unknown.
pub fn parse_value(text: &str) -> Option<f64> {
    parse_decimal(text.trim())
}

fn parse_decimal(text: &str) -> Option<f64> {
    text.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Resolve the applicable range and flag the value against it.
///
/// The range printed on the report wins over the catalog default.
pub fn evaluate_range(
    value: Option<&str>,
    extracted_range: Option<&str>,
    catalog_default: Option<ReferenceRange>,
) -> RangeEvaluation {
    let range = extracted_range
        .and_then(parse_reference_range)
        .or(catalog_default);

    let out_of_range = match (range, value.and_then(parse_value)) {
        (Some(range), Some(value)) => Some(!range.contains(value)),
        _ => None,
    };

    RangeEvaluation {
        range,
        out_of_range,
    }
}
