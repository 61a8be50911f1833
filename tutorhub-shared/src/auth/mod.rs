/// Authentication and authorization
///
/// - [`jwt`]: session token validation
/// - [`authorization`]: roles, capabilities and the per-request session context
pub mod authorization;
pub mod jwt;

pub use authorization::{AuthzError, Capability, Role, SessionContext};
pub use jwt::{validate_token, Claims, JwtError};
