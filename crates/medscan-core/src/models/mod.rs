//! Domain models for the scan pipeline.

mod catalog;
mod extraction;
mod scan;

pub use catalog::*;
pub use extraction::*;
pub use scan::*;

pub use medscan_llm::DocumentKind;
