//! Reconciliation of extracted line items with the reference catalogs.
//!
//! Pipeline per item: EntityMatcher -> RangeEvaluator (lab values only)
//! -> ConfidenceEvaluator

mod confidence;
mod matcher;
mod range;

pub use confidence::*;
pub use matcher::*;
pub use range::*;
