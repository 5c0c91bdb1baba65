#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::{
    constants::{DEFAULT_PAGE_SIZE, SUBMISSION_INCLUDES},
    grading::{GradeMap, GradedSubmission},
    http::{Transport, fetch_all_pages},
    rubric::{AssociationMeta, Rubric, rubric_from_remote, rubric_to_remote, validate_rubric},
    submission::{GroupedSubmissions, group_submissions},
};

/// A course as listed for the signed-in instructor.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Course {
    /// Canvas course id.
    pub id:   u64,
    /// Course display name.
    #[serde(default)]
    pub name: String,
}

/// An assignment within a course.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Assignment {
    /// Canvas assignment id.
    pub id:              u64,
    /// Assignment display name.
    #[serde(default)]
    pub name:            String,
    /// Points the assignment is worth.
    #[serde(default)]
    pub points_possible: f64,
}

/// Fetches every course the signed-in user teaches.
pub async fn fetch_courses<C: Transport>(transport: &C) -> Result<Vec<Course>> {
    fetch_all_pages(transport, "courses?enrollment_type=teacher", DEFAULT_PAGE_SIZE)
        .await
        .context("Could not fetch the course list")
}

/// Fetches every assignment in a course.
pub async fn fetch_assignments<C: Transport>(
    transport: &C,
    course_id: u64,
) -> Result<Vec<Assignment>> {
    fetch_all_pages(
        transport,
        &format!("courses/{course_id}/assignments"),
        DEFAULT_PAGE_SIZE,
    )
    .await
    .with_context(|| format!("Could not fetch assignments for course {course_id}"))
}

/// Fetches every submission for an assignment, with group, user, comment,
/// and rubric-assessment data attached, bucketed by group.
pub async fn fetch_assignment_submissions<C: Transport>(
    transport: &C,
    course_id: u64,
    assignment_id: u64,
) -> Result<GroupedSubmissions> {
    let path = format!(
        "courses/{course_id}/assignments/{assignment_id}/submissions?{SUBMISSION_INCLUDES}"
    );
    let raw: Vec<Value> = fetch_all_pages(transport, &path, DEFAULT_PAGE_SIZE)
        .await
        .with_context(|| {
            format!("Could not fetch submissions for assignment {assignment_id}")
        })?;

    Ok(group_submissions(&raw))
}

/// Fetches one rubric and translates it into the internal model.
pub async fn fetch_course_rubric<C: Transport>(
    transport: &C,
    course_id: u64,
    rubric_id: u64,
) -> Result<Rubric> {
    let path = format!("courses/{course_id}/rubrics/{rubric_id}?include[]=associations");
    let response = transport
        .get_json(&path)
        .await
        .with_context(|| format!("Could not fetch rubric {rubric_id}"))?;

    let rubric = rubric_from_remote(&response)
        .with_context(|| format!("Could not translate rubric {rubric_id}"))?;
    Ok(rubric)
}

/// Validates a rubric and pushes it to Canvas: POST to create when it has
/// no remote id yet, PUT to update when it does. Returns the raw Canvas
/// response so callers can re-translate it for the fresh ids.
pub async fn push_rubric<C: Transport>(
    transport: &C,
    course_id: u64,
    rubric: &Rubric,
    meta: &AssociationMeta,
) -> Result<Value> {
    validate_rubric(rubric)?;
    let body = rubric_to_remote(rubric, meta);

    match rubric.id {
        Some(rubric_id) => transport
            .put_json(&format!("courses/{course_id}/rubrics/{rubric_id}"), &body)
            .await
            .with_context(|| format!("Could not update rubric {rubric_id}")),
        None => transport
            .post_json(&format!("courses/{course_id}/rubrics"), &body)
            .await
            .context("Could not create rubric"),
    }
}

/// Builds the submission-update body for one working edit: the
/// `rubric_assessment` object keyed by criterion id, plus any comment.
fn grade_update_body(graded: &GradedSubmission) -> Value {
    let mut assessment = Map::new();
    for (criterion_id, cell) in &graded.rubric_assessment {
        let mut entry = Map::new();
        if let Some(points) = cell.points {
            entry.insert("points".to_owned(), json!(points));
        }
        if !cell.rating_id.is_empty() {
            entry.insert("rating_id".to_owned(), json!(cell.rating_id));
        }
        if !cell.comments.is_empty() {
            entry.insert("comments".to_owned(), json!(cell.comments));
        }
        assessment.insert(criterion_id.clone(), Value::Object(entry));
    }

    let mut body = Map::new();
    body.insert("rubric_assessment".to_owned(), Value::Object(assessment));

    // Group comments take precedence; Canvas fans them out to the team.
    if let Some(comment) = &graded.group_comment {
        body.insert(
            "comment".to_owned(),
            json!({ "text_comment": comment, "group_comment": true }),
        );
    } else if let Some(comment) = &graded.individual_comment {
        body.insert("comment".to_owned(), json!({ "text_comment": comment }));
    }

    Value::Object(body)
}

/// Pushes one working edit to Canvas as a submission update.
pub async fn submit_grade<C: Transport>(
    transport: &C,
    course_id: u64,
    assignment_id: u64,
    graded: &GradedSubmission,
) -> Result<Value> {
    let path = format!(
        "courses/{course_id}/assignments/{assignment_id}/submissions/{}",
        graded.submission_id
    );
    transport
        .put_json(&path, &grade_update_body(graded))
        .await
        .with_context(|| {
            format!("Could not submit grades for submission {}", graded.submission_id)
        })
}

/// Pushes every working edit in a map to Canvas, sequentially, stopping at
/// the first failure.
pub async fn submit_grades<C: Transport>(
    transport: &C,
    course_id: u64,
    assignment_id: u64,
    grades: &GradeMap,
) -> Result<()> {
    for graded in grades.values() {
        submit_grade(transport, course_id, assignment_id, graded).await?;
    }
    Ok(())
}
