/// API route handlers
///
/// - `health`: Health check endpoint
/// - `tokens`: Agora access tokens for lessons, chat and classrooms
/// - `realtime`: Voice tutor credentials and usage
/// - `assessments`: Assessment generation jobs
/// - `earnings`: Tutor payroll aggregation
/// - `notifications`: Transactional email
pub mod assessments;
pub mod earnings;
pub mod health;
pub mod notifications;
pub mod realtime;
pub mod tokens;
