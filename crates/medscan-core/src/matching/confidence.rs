//! Verification threshold for per-item confidence.

/// Items below this confidence need a human to check them.
pub const VERIFICATION_THRESHOLD: f64 = 0.5;

/// `true` when an item with this confidence must be verified by the user.
///
/// Exactly [`VERIFICATION_THRESHOLD`] is acceptable. NaN always requires
/// verification.
pub fn requires_verification(confidence: f64) -> bool {
    confidence.is_nan() || confidence < VERIFICATION_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        assert!(!requires_verification(0.5));
        assert!(requires_verification(0.49999));
        assert!(requires_verification(0.0));
        assert!(!requires_verification(1.0));
    }

    #[test]
    fn test_nan_requires_verification() {
        assert!(requires_verification(f64::NAN));
    }
}
