//! # rubrix
//!
//! The translation and reconciliation core for rubric-based group grading
//! against the Canvas LMS. Canvas, the application's own rubric/grading
//! model, and locally cached in-progress edits all disagree about what a
//! grade looks like; this crate is the layer that converts between them and
//! merges them into one consistent working set.
//!
//! The UI, routing, and persistence layers that drive this crate are
//! external collaborators. They supply an HTTP transport (see
//! [`http::Transport`]) and a flat key-value store (see
//! [`storage::KeyValueStore`]) and call the operations exposed here.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// High-level composed Canvas operations (course/assignment/submission
/// listings, rubric fetch and push, grade submission)
pub mod canvas;
/// Environment-sourced Canvas credentials and logging setup
pub mod config;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// The per-session grading reconciler and working-edit types
pub mod grading;
/// Canvas transport trait, shared reqwest client, and paginated bulk
/// retrieval
pub mod http;
/// Internal rubric model and the bidirectional Canvas rubric translator
pub mod rubric;
/// Local key-value cache scoping and grade-cache aggregation
pub mod storage;
/// Submission snapshots and grouping by team
pub mod submission;
