use crate::domain_model::*;

/// Role declaration attached to a protected route.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RoleRequirement {
    /// Any verified access token, whatever its role.
    Authenticated,
    /// The token's role must be exactly one of these.
    OneOf(Vec<Role>),
}

impl RoleRequirement {
    pub fn only(role: Role) -> Self {
        RoleRequirement::OneOf(vec![role])
    }

    pub fn admits(&self, role: Role) -> bool {
        match self {
            RoleRequirement::Authenticated => true,
            RoleRequirement::OneOf(roles) => roles.contains(&role),
        }
    }
}

/// Verified claims of the current request. Only the access gate creates one.
#[derive(Debug, Clone)]
pub struct AuthContext {
    claims: Claims,
    role: Role,
}

impl AuthContext {
    pub(crate) fn new(claims: Claims, role: Role) -> Self {
        AuthContext { claims, role }
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn subject_id(&self) -> SubjectId {
        self.claims.subject_id
    }

    pub fn role(&self) -> Role {
        self.role
    }
}
