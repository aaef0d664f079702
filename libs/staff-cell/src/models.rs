use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_database::StoreError;
use shared_models::access::AccessDenied;
use shared_models::error::AppError;

pub const DEPARTMENTS: &str = "departments";
pub const STAFF: &str = "staff";

// ==============================================================================
// DEPARTMENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Department {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub head_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub description: Option<String>,
    pub head_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateDepartmentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_id: Option<String>,
}

// ==============================================================================
// STAFF MEMBERS
// ==============================================================================

/// Job role of an employee. Patients are not staff.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    #[serde(alias = "Admin", alias = "administrator")]
    Admin,
    #[serde(alias = "Staff", alias = "receptionist")]
    Staff,
    #[serde(alias = "Doctor", alias = "physician")]
    Doctor,
    #[serde(alias = "Nurse")]
    Nurse,
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffRole::Admin => write!(f, "admin"),
            StaffRole::Staff => write!(f, "staff"),
            StaffRole::Doctor => write!(f, "doctor"),
            StaffRole::Nurse => write!(f, "nurse"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffMember {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: StaffRole,
    pub department_id: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StaffMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStaffRequest {
    /// Lets the record share its id with the member's auth account.
    pub id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: StaffRole,
    pub department_id: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateStaffRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaffSearchQuery {
    pub role: Option<StaffRole>,
    pub department_id: Option<String>,
    pub name: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StaffError {
    #[error("Department not found")]
    DepartmentNotFound,

    #[error("Staff member not found")]
    NotFound,

    #[error("Department {name} already exists")]
    DepartmentExists { name: String },

    #[error("Staff member with email {email} already exists")]
    EmailAlreadyExists { email: String },

    #[error("Staff id {0} is already in use")]
    IdInUse(String),

    #[error("{0}")]
    Forbidden(#[from] AccessDenied),

    #[error("Validation error: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] StoreError),
}

impl From<StaffError> for AppError {
    fn from(error: StaffError) -> Self {
        match error {
            StaffError::DepartmentNotFound | StaffError::NotFound => AppError::NotFound(error.to_string()),
            StaffError::DepartmentExists { .. }
            | StaffError::EmailAlreadyExists { .. }
            | StaffError::IdInUse(_) => {
                AppError::Conflict(error.to_string())
            }
            StaffError::Forbidden(denied) => AppError::from(denied),
            StaffError::ValidationFailed(msg) => AppError::ValidationError(msg),
            StaffError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
