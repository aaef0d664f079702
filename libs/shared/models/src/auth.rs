use std::fmt;
use std::str::FromStr;

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Coarse-grained role of whoever is calling the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Nurse,
    Staff,
    Admin,
}

impl Role {
    /// Admin and Staff may act on any record.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Staff)
    }

    /// Roles that work inside the hospital, as opposed to patients.
    pub fn is_clinical_or_office(&self) -> bool {
        !matches!(self, Role::Patient)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
            Role::Nurse => write!(f, "nurse"),
            Role::Staff => write!(f, "staff"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "nurse" => Ok(Role::Nurse),
            "staff" | "receptionist" => Ok(Role::Staff),
            "admin" | "administrator" => Ok(Role::Admin),
            other => Err(format!("Unrecognized role: {}", other)),
        }
    }
}

/// Identity of the caller, passed explicitly into every service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub id: String,
    pub role: Role,
}

impl CallerContext {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn is(&self, id: &str) -> bool {
        !self.id.is_empty() && self.id == id
    }

    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }
}

impl TryFrom<&User> for CallerContext {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        if user.id.is_empty() {
            return Err(AppError::Auth("Token has no subject".to_string()));
        }

        // A token without a role gets the least privileged one.
        let role = match user.role.as_deref() {
            None => Role::Patient,
            Some(raw) => raw.parse::<Role>().map_err(AppError::Forbidden)?,
        };

        Ok(CallerContext::new(user.id.clone(), role))
    }
}

impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<User>()
            .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))?;

        CallerContext::try_from(user)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Option<&str>) -> User {
        User {
            id: "user-1".to_string(),
            email: None,
            role: role.map(str::to_string),
            metadata: None,
            created_at: None,
        }
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" NURSE ".parse::<Role>(), Ok(Role::Nurse));
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn missing_role_defaults_to_patient() {
        let caller = CallerContext::try_from(&user(None)).unwrap();
        assert_eq!(caller.role, Role::Patient);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result = CallerContext::try_from(&user(Some("authenticated")));
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn empty_id_never_matches() {
        let caller = CallerContext::new("", Role::Patient);
        assert!(!caller.is(""));
    }
}
