//! Golden fixture replay.

mod common;

use std::path::PathBuf;

use query_runtime::fixture::{self, Fixture};

use common::entities;

/// Canonical hash of {"hash_version":1,"members":["bob","carol"]}.
const HAS_POSITION_HASH: &str =
    "d13c7a523e1a241738a4e6b052635c5e516dd2d8d4ccf2df24663735afcec3f5";

/// Canonical hash of an empty matching set.
const EMPTY_HASH: &str = "17cab02bf0cbd2e6d482944da8eaa8a5afe55af276923240a09abfbda053bc78";

fn golden_fixture() -> Fixture {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("golden")
        .join("fixture.json");
    Fixture::load(&path).expect("load golden fixture")
}

#[tokio::test]
async fn golden_fixture_passes() {
    let outcomes = fixture::run(&golden_fixture()).await.expect("run fixture");
    assert_eq!(outcomes.len(), 5);
    for outcome in &outcomes {
        assert!(outcome.passed(), "{}: {:?}", outcome.name, outcome.failures);
    }

    let by_name = |name: &str| {
        outcomes
            .iter()
            .find(|o| o.name == name)
            .unwrap_or_else(|| panic!("missing outcome {}", name))
    };
    assert_eq!(by_name("has_position").final_matching, entities(&["bob", "carol"]));
    assert_eq!(by_name("has_position").hash, HAS_POSITION_HASH);
    assert_eq!(by_name("no_health").hash, EMPTY_HASH);
    assert_eq!(by_name("mountain").hash, EMPTY_HASH);
    assert_eq!(by_name("alive").hash, by_name("position_3_5").hash);
}

#[tokio::test]
async fn wrong_expectation_is_reported_not_raised() {
    let mut fixture = golden_fixture();
    fixture.queries[0].expected[0].clear();
    let outcomes = fixture::run(&fixture).await.expect("run fixture");
    assert!(!outcomes[0].passed());
    assert!(outcomes[0].failures[0].starts_with("after batch 0"));
    assert!(outcomes[1..].iter().all(|o| o.passed()));
}

#[tokio::test]
async fn expectation_count_must_match_batches() {
    let mut fixture = golden_fixture();
    fixture.queries[1].expected.pop();
    assert!(fixture::run(&fixture).await.is_err());
}

#[test]
fn fixture_rejects_unknown_fields() {
    let json = r#"{"tables":[],"queries":[],"batches":[],"extra":true}"#;
    assert!(Fixture::from_json_str(json).is_err());
    let minimal = r#"{"tables":[],"queries":[],"batches":[]}"#;
    assert!(Fixture::from_json_str(minimal).unwrap().queries.is_empty());
}
