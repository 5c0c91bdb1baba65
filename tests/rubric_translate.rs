use std::collections::HashSet;

use rubrix::rubric::{
    AssociationMeta, Rating, RubricError, mint_key, points_from_ratings, rubric_from_remote,
    rubric_to_remote, validate_rubric,
};
use serde_json::{Value, json};

/// A well-formed Canvas rubric response: indexed-hash criteria and ratings,
/// with a deliberately stale `points` total on the first criterion.
fn wire_rubric() -> Value {
    json!({
        "rubric": {
            "id": 77,
            "title": "Sprint Review",
            "points_possible": 8.0,
            "criteria": {
                "0": {
                    "id": "77_1",
                    "description": "Teamwork",
                    "long_description": "Contribution to the team effort",
                    "points": 3.0,
                    "ratings": {
                        "0": { "id": "77_11", "description": "Full marks", "long_description": "", "points": 5.0 },
                        "1": { "id": "77_12", "description": "Partial", "long_description": "", "points": 2.0 }
                    }
                },
                "1": {
                    "id": "77_2",
                    "description": "Documentation",
                    "long_description": "",
                    "points": 3.0,
                    "ratings": {
                        "0": { "id": "77_21", "description": "Complete", "long_description": "", "points": 3.0 },
                        "1": { "id": "77_22", "description": "Missing", "long_description": "", "points": 0.0 }
                    }
                }
            }
        }
    })
}

#[test]
fn forward_translation_recomputes_criterion_points() {
    let rubric = rubric_from_remote(&wire_rubric()).expect("translation should succeed");

    // The wire said 3.0; the ratings max out at 5.0 and win.
    assert_eq!(rubric.criteria[0].points_possible, 5.0);
    assert_eq!(rubric.criteria[1].points_possible, 3.0);
    assert_eq!(rubric.points_possible, 8.0);
}

#[test]
fn forward_translation_preserves_ids_and_mints_keys() {
    let rubric = rubric_from_remote(&wire_rubric()).expect("translation should succeed");

    assert_eq!(rubric.id, Some(77));
    assert_eq!(rubric.title, "Sprint Review");
    assert_eq!(rubric.criteria[0].id, "77_1");
    assert_eq!(rubric.criteria[0].ratings[1].id, "77_12");

    let mut keys = HashSet::new();
    keys.insert(rubric.key.clone());
    for criterion in &rubric.criteria {
        keys.insert(criterion.key.clone());
        for rating in &criterion.ratings {
            keys.insert(rating.key.clone());
        }
    }
    // 1 rubric + 2 criteria + 4 ratings, all distinct, none empty.
    assert_eq!(keys.len(), 7);
    assert!(!keys.contains(""));
}

#[test]
fn round_trip_reconstructs_ids_and_points() {
    let rubric = rubric_from_remote(&wire_rubric()).expect("translation should succeed");
    let meta = AssociationMeta::builder().association_id(42u64).build();
    let body = rubric_to_remote(&rubric, &meta);

    let criteria = body["rubric"]["criteria"]
        .as_object()
        .expect("criteria should be an indexed hash");
    assert_eq!(criteria.len(), 2);
    assert_eq!(criteria["0"]["id"], "77_1");
    assert_eq!(criteria["0"]["points"], 5.0);
    assert_eq!(criteria["0"]["ratings"]["0"]["id"], "77_11");
    assert_eq!(criteria["0"]["ratings"]["0"]["points"], 5.0);
    assert_eq!(criteria["1"]["ratings"]["1"]["id"], "77_22");
    assert_eq!(criteria["1"]["ratings"]["1"]["points"], 0.0);
}

#[test]
fn reverse_translation_drops_internal_keys() {
    let rubric = rubric_from_remote(&wire_rubric()).expect("translation should succeed");
    let meta = AssociationMeta::builder().association_id(42u64).build();
    let body = rubric_to_remote(&rubric, &meta);

    assert!(body["rubric"]["criteria"]["0"].get("key").is_none());
    assert!(body["rubric"]["criteria"]["0"]["ratings"]["0"].get("key").is_none());
    assert!(body["rubric"].get("key").is_none());
}

#[test]
fn association_meta_rides_beside_the_rubric_payload() {
    let rubric = rubric_from_remote(&wire_rubric()).expect("translation should succeed");
    let meta = AssociationMeta::builder()
        .association_id(42u64)
        .hide_score_total(true)
        .build();
    let body = rubric_to_remote(&rubric, &meta);

    assert_eq!(body["rubric"]["free_form_criterion_comments"], true);
    assert_eq!(body["rubric_association"]["association_id"], 42);
    assert_eq!(body["rubric_association"]["association_type"], "Course");
    assert_eq!(body["rubric_association"]["use_for_grading"], true);
    assert_eq!(body["rubric_association"]["hide_score_total"], true);
    assert_eq!(body["rubric_association"]["purpose"], "grading");
    assert!(body["rubric"]["criteria"].get("association_id").is_none());
}

#[test]
fn missing_envelope_is_malformed() {
    let payload = json!({ "errors": [{ "message": "not found" }] });
    let err = rubric_from_remote(&payload).expect_err("translation should fail");

    match err {
        RubricError::MalformedResponse { context, payload: raw } => {
            assert_eq!(context, "rubric");
            assert_eq!(raw, payload);
        }
        other => panic!("expected MalformedResponse, got {other:?}"),
    }
}

#[test]
fn array_shaped_criteria_are_malformed() {
    let payload = json!({
        "rubric": { "id": 77, "title": "Sprint Review", "criteria": [] }
    });
    let err = rubric_from_remote(&payload).expect_err("translation should fail");
    assert!(err.to_string().contains("rubric.criteria"));
}

#[test]
fn indexed_hash_ordering_is_numeric_not_lexicographic() {
    let mut criteria = serde_json::Map::new();
    for i in 0..12 {
        criteria.insert(
            i.to_string(),
            json!({
                "id": format!("77_{i}"),
                "description": format!("Criterion {i}"),
                "long_description": "",
                "points": 1.0,
                "ratings": {
                    "0": { "id": format!("77_{i}_r"), "description": "Only", "long_description": "", "points": 1.0 }
                }
            }),
        );
    }
    let payload = json!({ "rubric": { "id": 77, "title": "Wide", "criteria": criteria } });

    let rubric = rubric_from_remote(&payload).expect("translation should succeed");
    // Lexicographic order would put "10" and "11" between "1" and "2".
    assert_eq!(rubric.criteria[2].id, "77_2");
    assert_eq!(rubric.criteria[10].id, "77_10");
    assert_eq!(rubric.criteria[11].id, "77_11");
}

#[test]
fn duplicate_rating_points_fail_validation() {
    let rubric = rubric_from_remote(&wire_rubric()).expect("translation should succeed");
    let criterion = rubric.criteria[0].with_rating(Rating {
        id:               "77_13".to_owned(),
        description:      "Also partial".to_owned(),
        long_description: String::new(),
        points:           2.0,
        key:              mint_key(),
    });
    let rubric = rubric.with_criterion(criterion);

    let err = validate_rubric(&rubric).expect_err("duplicate points should be rejected");
    assert!(err.to_string().contains("more than one rating worth 2 points"));
}

#[test]
fn rating_edits_recompute_points_possible() {
    let rubric = rubric_from_remote(&wire_rubric()).expect("translation should succeed");
    let criterion = &rubric.criteria[0];
    assert_eq!(criterion.points_possible, 5.0);

    let raised = criterion.with_rating(Rating {
        id:               "77_14".to_owned(),
        description:      "Above and beyond".to_owned(),
        long_description: String::new(),
        points:           9.0,
        key:              mint_key(),
    });
    assert_eq!(raised.points_possible, 9.0);
    assert_eq!(raised.points_possible, points_from_ratings(&raised.ratings));

    let top_key = raised
        .ratings
        .iter()
        .find(|r| r.points == 9.0)
        .expect("rating was just added")
        .key
        .clone();
    let lowered = raised.without_rating(&top_key);
    assert_eq!(lowered.points_possible, 5.0);

    let updated = rubric.with_criterion(raised);
    assert_eq!(updated.points_possible, 12.0);
}
