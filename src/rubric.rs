#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use typed_builder::TypedBuilder;

/// An enum to represent possible errors when translating rubrics to or from
/// the Canvas wire format.
#[derive(thiserror::Error, Debug)]
pub enum RubricError {
    /// The Canvas response did not match the expected shape. The raw payload
    /// is retained for diagnostics; translation never coerces a malformed
    /// response into an empty rubric.
    #[error("Canvas rubric response is missing the expected `{context}` shape")]
    MalformedResponse {
        /// Which part of the response failed to decode.
        context: String,
        /// The raw payload as received.
        payload: Value,
    },
    /// Two ratings in one criterion are worth the same number of points,
    /// which would make point-based rating resolution ambiguous.
    #[error("Criterion `{criterion}` has more than one rating worth {points} points")]
    DuplicateRatingPoints {
        /// Description of the offending criterion.
        criterion: String,
        /// The duplicated point value.
        points:    f64,
    },
}

/// One discrete point option within a criterion.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Rating {
    /// Canvas-assigned id, preserved verbatim across translations. Encodes
    /// composite Canvas identity (e.g. `"<rubricId>_<n>"`).
    pub id:               String,
    /// Short label shown on the rating button.
    pub description:      String,
    /// Longer explanation of what earns this rating.
    pub long_description: String,
    /// Point value; unique within a criterion.
    pub points:           f64,
    /// Client-only identity token, never sent to Canvas.
    pub key:              String,
}

/// One graded dimension of a rubric.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Criterion {
    /// Canvas-assigned id, preserved verbatim across translations.
    pub id:                 String,
    /// Short label for the criterion.
    pub description:        String,
    /// Longer explanation of the criterion.
    pub long_description:   String,
    /// Maximum points attainable; always the max of `ratings`' points.
    pub points_possible:    f64,
    /// Whether a rating chosen here defaults to being applied to the whole
    /// group rather than one student.
    pub is_group_criterion: bool,
    /// Client-only identity token, never sent to Canvas.
    pub key:                String,
    /// The discrete point options for this criterion.
    pub ratings:            Vec<Rating>,
}

/// A named set of weighted criteria used to grade submissions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Rubric {
    /// Canvas-assigned id; `None` until the rubric is created remotely.
    pub id:              Option<u64>,
    /// Rubric title.
    pub title:           String,
    /// Total points attainable across all criteria.
    pub points_possible: f64,
    /// Client-only identity token, never sent to Canvas.
    pub key:             String,
    /// The rubric's criteria, in display order.
    pub criteria:        Vec<Criterion>,
}

/// Association metadata sent alongside a rubric create/update request, per
/// the Canvas rubric-association contract.
#[derive(TypedBuilder, Clone, Debug)]
#[builder(field_defaults(setter(into)))]
#[builder(doc)]
pub struct AssociationMeta {
    /// Id of the object the rubric is attached to (usually a course id).
    association_id:               u64,
    /// Kind of object the rubric is attached to.
    #[builder(default = String::from("Course"))]
    association_type:             String,
    /// Whether assessments made with this rubric count as grades.
    #[builder(default = true)]
    use_for_grading:              bool,
    /// Whether students see the rubric total.
    #[builder(default = false)]
    hide_score_total:             bool,
    /// Association purpose; Canvas expects `"grading"` here.
    #[builder(default = String::from("grading"))]
    purpose:                      String,
    /// Whether graders may attach free-form comments per criterion.
    #[builder(default = true)]
    free_form_criterion_comments: bool,
}

/// Mints a fresh client-only identity token.
pub fn mint_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Computes a criterion's attainable points as the max of its ratings'
/// points. Canvas-supplied denormalized totals can go stale, so they are
/// never trusted.
pub fn points_from_ratings(ratings: &[Rating]) -> f64 {
    ratings.iter().map(|r| r.points).fold(0.0, f64::max)
}

impl Criterion {
    /// Returns a copy with `rating` replacing the rating that shares its
    /// `key` (or appended when no rating does), with `points_possible`
    /// recomputed. Edits never mutate in place; the caller owns the current
    /// rubric value.
    pub fn with_rating(&self, rating: Rating) -> Criterion {
        let mut ratings = self.ratings.clone();
        match ratings.iter().position(|r| r.key == rating.key) {
            Some(i) => ratings[i] = rating,
            None => ratings.push(rating),
        }
        let points_possible = points_from_ratings(&ratings);
        Criterion {
            points_possible,
            ratings,
            ..self.clone()
        }
    }

    /// Returns a copy without the rating carrying `key`, with
    /// `points_possible` recomputed.
    pub fn without_rating(&self, key: &str) -> Criterion {
        let ratings: Vec<Rating> =
            self.ratings.iter().filter(|r| r.key != key).cloned().collect();
        let points_possible = points_from_ratings(&ratings);
        Criterion {
            points_possible,
            ratings,
            ..self.clone()
        }
    }
}

impl Rubric {
    /// Returns a copy with `criterion` replacing the criterion that shares
    /// its `key` (or appended), with the rubric total recomputed.
    pub fn with_criterion(&self, criterion: Criterion) -> Rubric {
        let mut criteria = self.criteria.clone();
        match criteria.iter().position(|c| c.key == criterion.key) {
            Some(i) => criteria[i] = criterion,
            None => criteria.push(criterion),
        }
        let points_possible = criteria.iter().map(|c| c.points_possible).sum();
        Rubric {
            points_possible,
            criteria,
            ..self.clone()
        }
    }

    /// Looks up a criterion by its Canvas id.
    pub fn criterion(&self, criterion_id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id == criterion_id)
    }
}

/// Rejects rubrics that would be ambiguous to grade with: any criterion
/// holding two ratings worth the same points. Called before any wire
/// emission so point-based rating resolution stays unambiguous.
pub fn validate_rubric(rubric: &Rubric) -> Result<(), RubricError> {
    for criterion in &rubric.criteria {
        if let Some(bits) = criterion
            .ratings
            .iter()
            .map(|r| r.points.to_bits())
            .duplicates()
            .next()
        {
            return Err(RubricError::DuplicateRatingPoints {
                criterion: criterion.description.clone(),
                points:    f64::from_bits(bits),
            });
        }
    }
    Ok(())
}

/// Shorthand for the malformed-response error.
fn malformed(context: &str, payload: &Value) -> RubricError {
    RubricError::MalformedResponse {
        context: context.to_owned(),
        payload: payload.clone(),
    }
}

/// Decodes an indexed hash (an object with numeric-string keys standing in
/// for an array) into its values, in numeric key order. Canvas emits these
/// for rubric criteria and ratings; nothing downstream of this module ever
/// sees one.
fn indexed_values<'a>(
    map: &'a Map<String, Value>,
    context: &str,
    payload: &Value,
) -> Result<Vec<&'a Value>, RubricError> {
    let mut entries: Vec<(usize, &Value)> = Vec::with_capacity(map.len());
    for (index, value) in map {
        let index = index
            .parse::<usize>()
            .map_err(|_| malformed(context, payload))?;
        entries.push((index, value));
    }
    entries.sort_by_key(|(index, _)| *index);
    Ok(entries.into_iter().map(|(_, value)| value).collect())
}

/// Decodes one rating hash, minting a fresh client key and preserving the
/// Canvas id verbatim.
fn rating_from_remote(raw: &Value, payload: &Value) -> Result<Rating, RubricError> {
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("rating.id", payload))?
        .to_owned();
    let points = raw
        .get("points")
        .and_then(Value::as_f64)
        .ok_or_else(|| malformed("rating.points", payload))?;

    Ok(Rating {
        id,
        description: raw
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        long_description: raw
            .get("long_description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        points,
        key: mint_key(),
    })
}

/// Decodes one criterion hash along with its nested indexed rating map.
fn criterion_from_remote(raw: &Value, payload: &Value) -> Result<Criterion, RubricError> {
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("criterion.id", payload))?
        .to_owned();

    let rating_map = raw
        .get("ratings")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("criterion.ratings", payload))?;

    let mut ratings = Vec::with_capacity(rating_map.len());
    for value in indexed_values(rating_map, "criterion.ratings", payload)? {
        ratings.push(rating_from_remote(value, payload)?);
    }

    let points_possible = points_from_ratings(&ratings);

    Ok(Criterion {
        id,
        description: raw
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        long_description: raw
            .get("long_description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        points_possible,
        is_group_criterion: false,
        key: mint_key(),
        ratings,
    })
}

/// Translates a Canvas rubric response into the internal model.
///
/// The response must carry a `rubric` envelope whose `criteria` field is an
/// indexed hash of criterion hashes, each with its own indexed rating hash.
/// Canvas ids are preserved verbatim; every criterion and rating is minted a
/// fresh client-only key; point totals are recomputed from the ratings.
pub fn rubric_from_remote(response: &Value) -> Result<Rubric, RubricError> {
    let envelope = response
        .get("rubric")
        .ok_or_else(|| malformed("rubric", response))?;

    let criterion_map = envelope
        .get("criteria")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("rubric.criteria", response))?;

    let mut criteria = Vec::with_capacity(criterion_map.len());
    for value in indexed_values(criterion_map, "rubric.criteria", response)? {
        criteria.push(criterion_from_remote(value, response)?);
    }

    let points_possible = criteria.iter().map(|c| c.points_possible).sum();

    Ok(Rubric {
        id: envelope.get("id").and_then(Value::as_u64),
        title: envelope
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        points_possible,
        key: mint_key(),
        criteria,
    })
}

/// Translates the internal model into a Canvas rubric create/update request.
///
/// Criteria and ratings are emitted as indexed hashes keyed `"0"..n-1`; the
/// internal-only `key` fields are dropped entirely; the association metadata
/// rides alongside the rubric payload, never nested inside the criteria.
pub fn rubric_to_remote(rubric: &Rubric, meta: &AssociationMeta) -> Value {
    let mut criteria = Map::new();
    for (ci, criterion) in rubric.criteria.iter().enumerate() {
        let mut ratings = Map::new();
        for (ri, rating) in criterion.ratings.iter().enumerate() {
            ratings.insert(
                ri.to_string(),
                json!({
                    "id": rating.id,
                    "description": rating.description,
                    "long_description": rating.long_description,
                    "points": rating.points,
                }),
            );
        }

        criteria.insert(
            ci.to_string(),
            json!({
                "id": criterion.id,
                "description": criterion.description,
                "long_description": criterion.long_description,
                "points": criterion.points_possible,
                "ratings": Value::Object(ratings),
            }),
        );
    }

    json!({
        "rubric": {
            "title": rubric.title,
            "free_form_criterion_comments": meta.free_form_criterion_comments,
            "criteria": Value::Object(criteria),
        },
        "rubric_association": {
            "association_id": meta.association_id,
            "association_type": meta.association_type,
            "use_for_grading": meta.use_for_grading,
            "hide_score_total": meta.hide_score_total,
            "purpose": meta.purpose,
        },
    })
}
