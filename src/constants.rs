#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Stem for every local grading-cache key. The bare stem is the legacy
/// unscoped cache; scoped keys append course/assignment/group ids.
pub const CACHE_KEY_PREFIX: &str = "offlineGradingCache";

/// Bucket name for submissions whose Canvas record carries no group.
pub const NO_GROUP: &str = "No Group";

/// Page size used for Canvas list endpoints unless overridden.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Query-string tail for the assignment submissions endpoint. Canvas only
/// attaches group, user, comment, and rubric-assessment data when asked.
pub const SUBMISSION_INCLUDES: &str = "include[]=group&include[]=user&include[]=submission_comments&grouped=true&include[]=rubric_assessment";
