//! Request context, e.g. user id, its role, etc.
//!

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::{
    model::ResourceType,
    web::{WebResult, error::WebError},
};

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    user_id: uuid::Uuid,
    user_role: UserRole,
}

impl AuthenticatedUser {
    pub fn new(user_id: uuid::Uuid, user_role: UserRole) -> Self {
        Self { user_id, user_role }
    }

    pub fn admin() -> Self {
        Self {
            user_role: UserRole::Admin,
            user_id: uuid::Uuid::max(), // admin ID
        }
    }

    pub fn user_id(&self) -> uuid::Uuid {
        self.user_id
    }

    pub fn user_role(&self) -> UserRole {
        self.user_role
    }

    pub fn is_admin(&self) -> bool {
        self.user_role == UserRole::Admin
    }

    /// ADMIN or TEACHER.
    pub fn is_staff(&self) -> bool {
        matches!(self.user_role, UserRole::Admin | UserRole::Teacher)
    }

    pub fn is_student(&self) -> bool {
        self.user_role == UserRole::Student
    }

    /// Role guard: forbids the request unless the user holds one of `roles`.
    pub fn require_role(&self, roles: &[UserRole], r#type: ResourceType) -> WebResult<()> {
        if roles.contains(&self.user_role) {
            Ok(())
        } else {
            Err(WebError::resource_forbidden(r#type))
        }
    }

    pub fn require_staff(&self, r#type: ResourceType) -> WebResult<()> {
        self.require_role(&[UserRole::Admin, UserRole::Teacher], r#type)
    }

    pub fn require_admin(&self, r#type: ResourceType) -> WebResult<()> {
        self.require_role(&[UserRole::Admin], r#type)
    }

    /// Staff may act on anyone, everybody else only on themselves.
    pub fn require_self_or_staff(&self, user_id: uuid::Uuid, r#type: ResourceType) -> WebResult<()> {
        if self.is_staff() || self.user_id == user_id {
            Ok(())
        } else {
            Err(WebError::resource_forbidden(r#type))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    Teacher,
    Student,
}

impl UserRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Self::Admin),
            "TEACHER" => Some(Self::Teacher),
            "STUDENT" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Teacher => "TEACHER",
            Self::Student => "STUDENT",
        }
    }
}

impl From<&str> for UserRole {
    fn from(value: &str) -> Self {
        Self::parse(value).unwrap_or(Self::Student)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    maybe_user: Option<AuthenticatedUser>,
}

impl RequestContext {
    pub fn new(maybe_user: Option<AuthenticatedUser>) -> Self {
        Self { maybe_user }
    }

    pub fn admin() -> Self {
        Self::new(Some(AuthenticatedUser::admin()))
    }

    pub fn maybe_user(&self) -> Option<&AuthenticatedUser> {
        self.maybe_user.as_ref()
    }

    pub fn user(&self) -> WebResult<&AuthenticatedUser> {
        self.maybe_user.as_ref().ok_or(WebError::auth_required())
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts.extensions.get::<RequestContext>();
        if let Some(ctx) = ctx {
            Ok(ctx.clone())
        } else {
            Ok(RequestContext::new(None))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(UserRole::parse("teacher"), Some(UserRole::Teacher));
        assert_eq!(UserRole::parse("ADMIN"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("parent"), None);
        assert_eq!(UserRole::from("unknown"), UserRole::Student);
    }

    #[test]
    fn role_guards() {
        let teacher = AuthenticatedUser::new(uuid::Uuid::new_v4(), UserRole::Teacher);
        let student = AuthenticatedUser::new(uuid::Uuid::new_v4(), UserRole::Student);

        assert!(teacher.require_staff(ResourceType::Book).is_ok());
        assert!(teacher.require_admin(ResourceType::Book).is_err());
        assert!(student.require_staff(ResourceType::Book).is_err());
        assert!(
            student
                .require_self_or_staff(student.user_id(), ResourceType::StudentProgress)
                .is_ok()
        );
        assert!(
            student
                .require_self_or_staff(teacher.user_id(), ResourceType::StudentProgress)
                .is_err()
        );
    }
}
