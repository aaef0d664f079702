use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shared_database::{SortOrder, StoreError};
use shared_models::access::AccessDenied;
use shared_models::error::AppError;

pub const PATIENTS: &str = "patients";
pub const TREATMENTS: &str = "treatments";

// ==============================================================================
// PATIENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub blood_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    pub emergency_contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_by: Option<String>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePatientRequest {
    /// Lets the record share its id with the patient's auth account.
    pub id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub blood_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    pub emergency_contact: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdatePatientRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatientSortField {
    #[default]
    LastName,
    CreatedAt,
}

impl PatientSortField {
    pub fn column(&self) -> &'static str {
        match self {
            PatientSortField::LastName => "last_name",
            PatientSortField::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientSearchQuery {
    pub name: Option<String>,
    pub email: Option<String>,
    pub sort_by: Option<PatientSortField>,
    pub sort_order: Option<SortOrder>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ==============================================================================
// TREATMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentStatus {
    #[serde(alias = "Planned", alias = "pending")]
    Planned,
    #[serde(alias = "Ongoing", alias = "in_progress", alias = "active")]
    Ongoing,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Discontinued", alias = "stopped", alias = "cancelled")]
    Discontinued,
}

impl TreatmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TreatmentStatus::Completed | TreatmentStatus::Discontinued)
    }

    pub fn can_transition_to(&self, next: TreatmentStatus) -> bool {
        match self {
            TreatmentStatus::Planned => next != TreatmentStatus::Planned,
            TreatmentStatus::Ongoing => next.is_terminal(),
            TreatmentStatus::Completed | TreatmentStatus::Discontinued => false,
        }
    }
}

impl fmt::Display for TreatmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreatmentStatus::Planned => write!(f, "planned"),
            TreatmentStatus::Ongoing => write!(f, "ongoing"),
            TreatmentStatus::Completed => write!(f, "completed"),
            TreatmentStatus::Discontinued => write!(f, "discontinued"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Treatment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_id: Option<String>,
    pub diagnosis: String,
    pub description: Option<String>,
    pub status: TreatmentStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTreatmentRequest {
    /// Defaults to the calling doctor.
    pub doctor_id: Option<String>,
    pub appointment_id: Option<String>,
    pub diagnosis: String,
    pub description: Option<String>,
    pub status: Option<TreatmentStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateTreatmentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTreatmentStatusRequest {
    pub status: TreatmentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreatmentQuery {
    pub status: Option<TreatmentStatus>,
    pub doctor_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Treatment not found")]
    TreatmentNotFound,

    #[error("Patient with email {email} already exists")]
    EmailAlreadyExists { email: String },

    #[error("Patient id {0} is already in use")]
    IdInUse(String),

    #[error("Cannot change treatment status from {from} to {to}")]
    InvalidStatusTransition { from: TreatmentStatus, to: TreatmentStatus },

    #[error("{0}")]
    Forbidden(#[from] AccessDenied),

    #[error("Validation error: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] StoreError),
}

impl From<PatientError> for AppError {
    fn from(error: PatientError) -> Self {
        match error {
            PatientError::NotFound | PatientError::TreatmentNotFound => AppError::NotFound(error.to_string()),
            PatientError::EmailAlreadyExists { .. } | PatientError::IdInUse(_) => {
                AppError::Conflict(error.to_string())
            }
            PatientError::InvalidStatusTransition { .. } => AppError::ValidationError(error.to_string()),
            PatientError::Forbidden(denied) => AppError::from(denied),
            PatientError::ValidationFailed(msg) => AppError::ValidationError(msg),
            PatientError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
