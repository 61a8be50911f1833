/// Database models
///
/// Explicit row types and their queries.
///
/// - `lesson`: lessons and the organization earnings policy (read-only)
/// - `assessment`: assessment generation jobs and questions
/// - `session_log`: realtime voice session usage
pub mod assessment;
pub mod lesson;
pub mod session_log;
