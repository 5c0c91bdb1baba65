#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    rubric::Rubric,
    storage::{KeyValueStore, scope_key},
    submission::{Submission, User},
};

/// The aggregate of local grading state for one scope, keyed by submission
/// id. `BTreeMap` keeps serialization deterministic, so persisting the same
/// working set twice writes byte-identical cache content.
pub type GradeMap = BTreeMap<u64, GradedSubmission>;

/// An enum to represent possible errors while editing a grading session.
#[derive(thiserror::Error, Debug)]
pub enum GradingError {
    /// The selected point value matches no rating in the criterion. The
    /// selection is rejected and the prior value retained; the caller
    /// surfaces the condition.
    #[error("No rating in criterion `{criterion_id}` is worth exactly {points} points")]
    UnresolvableRating {
        /// Canvas id of the criterion the selection was made on.
        criterion_id: String,
        /// The point value that could not be resolved.
        points:       f64,
    },
    /// The criterion id is not part of the active rubric.
    #[error("Criterion `{criterion_id}` is not part of the active rubric")]
    UnknownCriterion {
        /// The offending criterion id.
        criterion_id: String,
    },
    /// The submission id is not part of this grading session.
    #[error("Submission {submission_id} is not part of this grading session")]
    UnknownSubmission {
        /// The offending submission id.
        submission_id: u64,
    },
}

/// Serde helpers for the cache blob's `number | ""` points convention: an
/// unselected cell persists as the empty string, never as a missing field.
mod blank_points {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    /// Serializes `None` as `""` and `Some(p)` as a bare number.
    pub fn serialize<S>(points: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match points {
            Some(p) => serializer.serialize_f64(*p),
            None => serializer.serialize_str(""),
        }
    }

    /// Accepts a number, the empty string, or null; anything else degrades
    /// to unselected rather than failing the whole cache blob.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    }
}

/// One criterion's cell of a working edit.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CriterionGrade {
    /// Selected points; `None` is the explicit empty-selection marker and
    /// round-trips through the cache as `""`.
    #[serde(default, with = "blank_points")]
    pub points:    Option<f64>,
    /// Canvas id of the resolved rating, empty when unselected.
    #[serde(default)]
    pub rating_id: String,
    /// Grader comment for this criterion.
    #[serde(default)]
    pub comments:  String,
}

/// The working edit for one submission. This is the only entity the core
/// mutates directly; it is the unit persisted to the local cache and, on
/// save, translated outward to the Canvas submission-update call.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GradedSubmission {
    /// Canvas submission id.
    pub submission_id:      u64,
    /// The submitting student.
    #[serde(default)]
    pub user:               User,
    /// Per-criterion working cells, keyed by criterion id.
    #[serde(default)]
    pub rubric_assessment:  BTreeMap<String, CriterionGrade>,
    /// Comment addressed to this student alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual_comment: Option<String>,
    /// Comment addressed to the whole group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_comment:      Option<String>,
}

/// The stateful heart of a grading session: one open "grade this group"
/// view gets one reconciler, seeded from the aggregated local cache, the
/// freshly fetched Canvas assessments, and the active rubric.
///
/// Callers must finish seeding (construction) before issuing rating
/// changes; an abandoned session simply never calls [`Reconciler::persist`]
/// and its state is discarded.
pub struct Reconciler {
    /// The active rubric for this session.
    rubric:          Rubric,
    /// Submission ids in presentation order.
    order:           Vec<u64>,
    /// Working edits, one per submission.
    working:         GradeMap,
    /// Canvas-derived totals captured at seed time, for the unedited-view
    /// average fallback.
    lms_totals:      BTreeMap<u64, f64>,
    /// Session-local apply-to-group flags per criterion id. Defaulted from
    /// the rubric's persisted flags, mutable per session, never persisted
    /// back to the rubric.
    group_broadcast: BTreeMap<String, bool>,
}

impl Reconciler {
    /// Seeds a session from the active rubric, the submissions under
    /// grading, and the aggregated local cache.
    ///
    /// Per submission and criterion the cached value wins when present
    /// (including an explicit empty-selection marker), else the Canvas
    /// assessment, else the cell is unselected. A grader's in-progress work
    /// is never silently clobbered by a Canvas re-fetch.
    pub fn new(rubric: Rubric, submissions: &[Submission], cached: &GradeMap) -> Self {
        let mut order = Vec::with_capacity(submissions.len());
        let mut working = GradeMap::new();
        let mut lms_totals = BTreeMap::new();

        for submission in submissions {
            order.push(submission.id);
            let cached_entry = cached.get(&submission.id);

            let mut cells = BTreeMap::new();
            for criterion in &rubric.criteria {
                let cell = if let Some(cell) =
                    cached_entry.and_then(|g| g.rubric_assessment.get(&criterion.id))
                {
                    cell.clone()
                } else if let Some(remote) = submission
                    .rubric_assessment
                    .as_ref()
                    .and_then(|m| m.get(&criterion.id))
                {
                    CriterionGrade {
                        points:    remote.points,
                        rating_id: remote.rating_id.clone().unwrap_or_default(),
                        comments:  remote.comments.clone().unwrap_or_default(),
                    }
                } else {
                    CriterionGrade::default()
                };
                cells.insert(criterion.id.clone(), cell);
            }

            if let Some(entry) = cached_entry {
                for criterion_id in entry.rubric_assessment.keys() {
                    if rubric.criterion(criterion_id).is_none() {
                        tracing::warn!(
                            submission_id = submission.id,
                            %criterion_id,
                            "cached grade references a criterion missing from the active rubric; \
                             dropping it"
                        );
                    }
                }
            }

            let lms_total: f64 = submission
                .rubric_assessment
                .as_ref()
                .map(|m| m.values().filter_map(|entry| entry.points).sum())
                .unwrap_or(0.0);
            lms_totals.insert(submission.id, lms_total);

            working.insert(submission.id, GradedSubmission {
                submission_id:      submission.id,
                user:               submission.user.clone(),
                rubric_assessment:  cells,
                individual_comment: cached_entry.and_then(|g| g.individual_comment.clone()),
                group_comment:      cached_entry.and_then(|g| g.group_comment.clone()),
            });
        }

        let group_broadcast = rubric
            .criteria
            .iter()
            .map(|c| (c.id.clone(), c.is_group_criterion))
            .collect();

        Self {
            rubric,
            order,
            working,
            lms_totals,
            group_broadcast,
        }
    }

    /// Returns the active rubric.
    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Returns the session's submission ids in presentation order.
    pub fn submission_ids(&self) -> &[u64] {
        &self.order
    }

    /// Returns the merged working set, keyed by submission id.
    pub fn working_set(&self) -> &GradeMap {
        &self.working
    }

    /// Resolves a user-chosen point value to a rating and records it.
    ///
    /// Resolution is by exact match on `points` within the criterion's
    /// rating list (the UI only knows the selected number). When the
    /// criterion's apply-to-group flag is on, the value is applied to every
    /// submission in the working set; otherwise only the edited one. A
    /// failed resolution leaves every prior value untouched.
    pub fn set_rating(
        &mut self,
        submission_id: u64,
        criterion_id: &str,
        points: f64,
    ) -> Result<(), GradingError> {
        let criterion = self.rubric.criterion(criterion_id).ok_or_else(|| {
            GradingError::UnknownCriterion {
                criterion_id: criterion_id.to_owned(),
            }
        })?;

        if !self.working.contains_key(&submission_id) {
            return Err(GradingError::UnknownSubmission { submission_id });
        }

        let rating = criterion
            .ratings
            .iter()
            .find(|r| r.points == points)
            .ok_or_else(|| GradingError::UnresolvableRating {
                criterion_id: criterion_id.to_owned(),
                points,
            })?;
        let rating_id = rating.id.clone();

        let broadcast = self.group_broadcast.get(criterion_id).copied().unwrap_or(false);
        let targets: Vec<u64> = if broadcast {
            self.order.clone()
        } else {
            vec![submission_id]
        };

        for id in targets {
            if let Some(graded) = self.working.get_mut(&id) {
                let cell = graded
                    .rubric_assessment
                    .entry(criterion_id.to_owned())
                    .or_default();
                cell.points = Some(points);
                cell.rating_id = rating_id.clone();
            }
        }

        Ok(())
    }

    /// Flips a criterion's session-local apply-to-group flag and returns
    /// the new state. The flip affects the next edit, never values already
    /// set.
    pub fn toggle_group_broadcast(&mut self, criterion_id: &str) -> Result<bool, GradingError> {
        match self.group_broadcast.get_mut(criterion_id) {
            Some(flag) => {
                *flag = !*flag;
                Ok(*flag)
            }
            None => Err(GradingError::UnknownCriterion {
                criterion_id: criterion_id.to_owned(),
            }),
        }
    }

    /// Records a comment addressed to one student.
    pub fn set_individual_comment(
        &mut self,
        submission_id: u64,
        comment: Option<String>,
    ) -> Result<(), GradingError> {
        match self.working.get_mut(&submission_id) {
            Some(graded) => {
                graded.individual_comment = comment;
                Ok(())
            }
            None => Err(GradingError::UnknownSubmission { submission_id }),
        }
    }

    /// Records a comment addressed to the whole group on one submission's
    /// working edit.
    pub fn set_group_comment(
        &mut self,
        submission_id: u64,
        comment: Option<String>,
    ) -> Result<(), GradingError> {
        match self.working.get_mut(&submission_id) {
            Some(graded) => {
                graded.group_comment = comment;
                Ok(())
            }
            None => Err(GradingError::UnknownSubmission { submission_id }),
        }
    }

    /// A submission's displayed score: the sum of selected points across
    /// all criteria. Unselected cells contribute zero, never NaN.
    pub fn submission_total(&self, submission_id: u64) -> Result<f64, GradingError> {
        self.working
            .get(&submission_id)
            .map(Self::total_of)
            .ok_or(GradingError::UnknownSubmission { submission_id })
    }

    /// Sum of one working edit's selected points.
    fn total_of(graded: &GradedSubmission) -> f64 {
        graded
            .rubric_assessment
            .values()
            .filter_map(|cell| cell.points)
            .sum()
    }

    /// The group's displayed average: the mean of live working-set totals
    /// once any selection exists, falling back to the Canvas-derived totals
    /// captured at seed time for a session that has not started editing.
    /// A freshly opened, unedited view therefore never shows a zero
    /// average.
    pub fn group_average(&self) -> f64 {
        if self.order.is_empty() {
            return 0.0;
        }

        let any_selection = self
            .working
            .values()
            .any(|g| g.rubric_assessment.values().any(|cell| cell.points.is_some()));

        let sum: f64 = if any_selection {
            self.working.values().map(Self::total_of).sum()
        } else {
            self.lms_totals.values().sum()
        };

        sum / self.order.len() as f64
    }

    /// Writes the whole working set to the scoped local cache key, one
    /// entry per submission whether edited or not, as a single store write.
    /// Deterministic serialization makes back-to-back persists
    /// byte-identical.
    pub fn persist(
        &self,
        store: &mut impl KeyValueStore,
        course_id: u64,
        assignment_id: u64,
        group_id: Option<u64>,
    ) -> Result<()> {
        let key = scope_key(course_id, assignment_id, group_id);
        let blob = serde_json::to_string(&self.working)
            .context("Could not serialize the grading working set")?;
        store.set(&key, &blob);
        Ok(())
    }
}
