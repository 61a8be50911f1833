/// Role-based authorization
///
/// Every authenticated request carries a [`SessionContext`] decoded from the
/// session token. Handlers ask the context for a [`Capability`] instead of
/// comparing roles directly, so the whole policy lives in [`Role::can`].
///
/// # Capability table
///
/// | Capability          | owner | admin | tutor | parent | student |
/// |---------------------|-------|-------|-------|--------|---------|
/// | JoinLesson          |   x   |   x   |   x   |   x    |    x    |
/// | IssueAppToken       |   x   |   x   |       |        |         |
/// | UseVoiceTutor       |   x   |   x   |   x   |        |    x    |
/// | GenerateAssessment  |   x   |   x   |   x   |        |         |
/// | ViewAllEarnings     |   x   |   x   |       |        |         |
/// | ViewOwnEarnings     |   x   |   x   |   x   |        |         |
/// | SendEmail           |   x   |   x   |       |        |         |
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error type for authorization operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthzError {
    /// Role lacks the capability
    #[error("Role {role} is not allowed to {capability}")]
    MissingCapability { role: Role, capability: Capability },

    /// Resource belongs to another organization
    #[error("Resource belongs to a different organization")]
    WrongOrganization,

    /// Unknown role string
    #[error("Unknown role: {0}")]
    UnknownRole(String),
}

/// Role of a user inside an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Tutor,
    Parent,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Tutor => "tutor",
            Role::Parent => "parent",
            Role::Student => "student",
        }
    }

    /// Whether this role holds the given capability
    pub fn can(&self, capability: Capability) -> bool {
        use Capability::*;
        use Role::*;

        match capability {
            JoinLesson => true,
            IssueAppToken | ViewAllEarnings | SendEmail => matches!(self, Owner | Admin),
            UseVoiceTutor => matches!(self, Owner | Admin | Tutor | Student),
            GenerateAssessment | ViewOwnEarnings => matches!(self, Owner | Admin | Tutor),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "tutor" => Ok(Role::Tutor),
            "parent" => Ok(Role::Parent),
            "student" => Ok(Role::Student),
            other => Err(AuthzError::UnknownRole(other.to_string())),
        }
    }
}

/// Actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    JoinLesson,
    IssueAppToken,
    UseVoiceTutor,
    GenerateAssessment,
    ViewAllEarnings,
    ViewOwnEarnings,
    SendEmail,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::JoinLesson => "join lessons",
            Capability::IssueAppToken => "issue app tokens",
            Capability::UseVoiceTutor => "use the voice tutor",
            Capability::GenerateAssessment => "generate assessments",
            Capability::ViewAllEarnings => "view all earnings",
            Capability::ViewOwnEarnings => "view earnings",
            Capability::SendEmail => "send email",
        };
        f.write_str(s)
    }
}

/// Authenticated caller, inserted into request extensions by the auth layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

impl SessionContext {
    pub fn new(user_id: Uuid, organization_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            organization_id,
            role,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }

    /// Requires a capability
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::MissingCapability` if the role lacks it.
    pub fn require(&self, capability: Capability) -> Result<(), AuthzError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AuthzError::MissingCapability {
                role: self.role,
                capability,
            })
        }
    }

    /// Requires that a resource belongs to the caller's organization
    pub fn require_organization(&self, organization_id: Uuid) -> Result<(), AuthzError> {
        if self.organization_id == organization_id {
            Ok(())
        } else {
            Err(AuthzError::WrongOrganization)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLES: [Role; 5] = [Role::Owner, Role::Admin, Role::Tutor, Role::Parent, Role::Student];

    fn allowed(capability: Capability) -> Vec<Role> {
        ALL_ROLES.iter().copied().filter(|r| r.can(capability)).collect()
    }

    #[test]
    fn test_capability_table() {
        assert_eq!(allowed(Capability::JoinLesson), ALL_ROLES.to_vec());
        assert_eq!(allowed(Capability::IssueAppToken), vec![Role::Owner, Role::Admin]);
        assert_eq!(
            allowed(Capability::UseVoiceTutor),
            vec![Role::Owner, Role::Admin, Role::Tutor, Role::Student]
        );
        assert_eq!(
            allowed(Capability::GenerateAssessment),
            vec![Role::Owner, Role::Admin, Role::Tutor]
        );
        assert_eq!(allowed(Capability::ViewAllEarnings), vec![Role::Owner, Role::Admin]);
        assert_eq!(
            allowed(Capability::ViewOwnEarnings),
            vec![Role::Owner, Role::Admin, Role::Tutor]
        );
        assert_eq!(allowed(Capability::SendEmail), vec![Role::Owner, Role::Admin]);
    }

    #[test]
    fn test_require() {
        let ctx = SessionContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Parent);
        assert!(ctx.require(Capability::JoinLesson).is_ok());
        assert_eq!(
            ctx.require(Capability::GenerateAssessment),
            Err(AuthzError::MissingCapability {
                role: Role::Parent,
                capability: Capability::GenerateAssessment,
            })
        );
    }

    #[test]
    fn test_require_organization() {
        let org = Uuid::new_v4();
        let ctx = SessionContext::new(Uuid::new_v4(), org, Role::Admin);
        assert!(ctx.require_organization(org).is_ok());
        assert_eq!(
            ctx.require_organization(Uuid::new_v4()),
            Err(AuthzError::WrongOrganization)
        );
    }

    #[test]
    fn test_role_parse_and_serde() {
        for role in ALL_ROLES {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
        assert!(matches!("teacher".parse::<Role>(), Err(AuthzError::UnknownRole(_))));
    }
}
