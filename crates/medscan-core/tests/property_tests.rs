//! Property tests for the reconciliation rules and the response parser.

use medscan_core::config::EstimateConfig;
use medscan_core::matching::{evaluate_range, match_entity, requires_verification};
use medscan_core::models::{Biomarker, ReferenceRange};
use medscan_core::workflow::{decide_mode, estimated_duration, ExecutionMode, ModeOverride};
use medscan_llm::parse_model_response;
use proptest::prelude::*;
use serde_json::{json, Value};

fn json_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z_]{1,10}", any::<i32>(), 0..6).prop_map(|map| {
        Value::Object(map.into_iter().map(|(k, v)| (k, json!(v))).collect())
    })
}

proptest! {
    #[test]
    fn prop_verification_threshold(c in 0.0f64..=1.0) {
        prop_assert_eq!(requires_verification(c), c < 0.5);
    }

    #[test]
    fn prop_range_flag(
        min in -1000.0f64..1000.0,
        width in 0.0f64..1000.0,
        value in -3000.0f64..3000.0,
    ) {
        let max = min + width;
        let range = ReferenceRange::new(min, max).unwrap();
        let value_text = value.to_string();

        let evaluation = evaluate_range(Some(&value_text), None, Some(range));
        prop_assert_eq!(evaluation.out_of_range, Some(value < min || value > max));

        let at_min = evaluate_range(Some(&min.to_string()), None, Some(range));
        let at_max = evaluate_range(Some(&max.to_string()), None, Some(range));
        prop_assert_eq!(at_min.out_of_range, Some(false));
        prop_assert_eq!(at_max.out_of_range, Some(false));

        let unknown = evaluate_range(Some(&value_text), None, None);
        prop_assert_eq!(unknown.out_of_range, None);
    }

    #[test]
    fn prop_fenced_and_plain_parse_alike(
        object in json_object(),
        leading in "[ \n\t]{0,4}",
        trailing in "[ \n\t]{0,4}",
    ) {
        let body = object.to_string();
        let variants = [
            format!("{leading}```json\n{body}\n```{trailing}"),
            format!("{leading}```\n{body}\n```{trailing}"),
            format!("{leading}{body}{trailing}"),
        ];
        for text in variants {
            prop_assert_eq!(parse_model_response(&text).unwrap(), object.clone());
        }
    }

    #[test]
    fn prop_matcher_never_panics(name in "\\PC{0,40}") {
        let catalog = vec![
            Biomarker::new("b1", "Glucose"),
            Biomarker::new("b2", "C"),
            Biomarker::new("b3", ""),
        ];
        let _ = match_entity(&name, &catalog);
    }

    #[test]
    fn prop_matcher_case_insensitive(upper in any::<bool>()) {
        let catalog = vec![Biomarker::new("b1", "Glucose"), Biomarker::new("b2", "Fasting Glucose")];
        let name = if upper { "FASTING GLUCOSE" } else { "fasting glucose" };
        prop_assert_eq!(match_entity(name, &catalog).map(|b| b.id.as_str()), Some("b2"));
    }

    #[test]
    fn prop_mode_override_always_wins(size in any::<u64>(), threshold in any::<u64>()) {
        prop_assert_eq!(decide_mode(size, threshold, ModeOverride::ForceSync), ExecutionMode::Sync);
        prop_assert_eq!(decide_mode(size, threshold, ModeOverride::ForceAsync), ExecutionMode::Async);
        let expected = if size > threshold { ExecutionMode::Async } else { ExecutionMode::Sync };
        prop_assert_eq!(decide_mode(size, threshold, ModeOverride::Default), expected);
    }

    #[test]
    fn prop_estimate_monotonic(a in 0u64..(1 << 40), b in 0u64..(1 << 40)) {
        let config = EstimateConfig::default();
        let (small, large) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(estimated_duration(small, &config) <= estimated_duration(large, &config));
    }
}
