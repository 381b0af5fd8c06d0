use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::declaration::DeclarationError;

// ============================================================================
// Caller Identity
// ============================================================================
//
// Authentication happens upstream; the core only receives who is acting,
// for which company, and with which role.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub role: Role,
}

impl RequestContext {
    pub fn new(user_id: Uuid, company_id: Uuid, role: Role) -> Self {
        Self { user_id, company_id, role }
    }

    /// Admins reach every company, everyone else only their own
    pub fn authorize_company(&self, declaration_id: Uuid, company_id: Uuid) -> Result<(), DeclarationError> {
        if company_id == self.company_id || self.role == Role::Admin {
            Ok(())
        } else {
            Err(DeclarationError::Forbidden(declaration_id))
        }
    }

    /// Status changes and deletions are reserved to admins and managers
    pub fn require_manager(&self, action: &'static str) -> Result<(), DeclarationError> {
        match self.role {
            Role::Admin | Role::Manager => Ok(()),
            Role::User => Err(DeclarationError::RoleNotPermitted { role: self.role, action }),
        }
    }
}
