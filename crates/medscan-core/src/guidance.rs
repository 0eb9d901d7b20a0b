//! User-facing guidance for failed scans.
//!
//! Presentation only: the typed [`ExtractionErrorKind`] is the contract, the
//! text here just tells the user what to do next.

use crate::models::{ExtractionErrorKind, ExtractionFailure};

pub const RETAKE_PHOTO: &str =
    "The photo could not be read. Retake it in good lighting, with the whole document in focus.";
pub const CHECK_DOCUMENT_TYPE: &str =
    "No document of the selected type was found. Check that you chose prescription or lab report correctly.";
pub const UNREADABLE_DOCUMENT: &str =
    "The document could not be read. Retake the photo or enter the information manually.";
pub const TRY_AGAIN: &str =
    "The reading service is busy. Try again in a few minutes or let the scan process in the background.";
pub const SERVICE_UNAVAILABLE: &str =
    "Document reading is currently unavailable. Please contact support if this persists.";
pub const REUPLOAD: &str = "The uploaded photo is missing. Please upload it again.";

const IMAGE_WORDS: &[&str] = &["image", "photo", "blur", "dark", "lighting", "focus"];
const DOCUMENT_WORDS: &[&str] = &["no document", "document type", "wrong document", "not a medical"];

/// Guidance for an error kind, refined by the wording of its message.
pub fn user_guidance(kind: ExtractionErrorKind, message: &str) -> &'static str {
    match kind {
        ExtractionErrorKind::Extraction => {
            let message = message.to_lowercase();
            if DOCUMENT_WORDS.iter().any(|w| message.contains(w)) {
                CHECK_DOCUMENT_TYPE
            } else if IMAGE_WORDS.iter().any(|w| message.contains(w)) {
                RETAKE_PHOTO
            } else {
                UNREADABLE_DOCUMENT
            }
        }
        ExtractionErrorKind::RateLimit
        | ExtractionErrorKind::ApiError
        | ExtractionErrorKind::RetriesExhausted => TRY_AGAIN,
        ExtractionErrorKind::Configuration | ExtractionErrorKind::Authentication => {
            SERVICE_UNAVAILABLE
        }
        ExtractionErrorKind::NotFound => REUPLOAD,
    }
}

pub fn guidance_for(failure: &ExtractionFailure) -> &'static str {
    user_guidance(failure.kind(), failure.message())
}
