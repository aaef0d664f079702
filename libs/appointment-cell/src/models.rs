use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shared_database::{SortOrder, StoreError};
use shared_models::access::AccessDenied;
use shared_models::error::AppError;

pub const APPOINTMENTS: &str = "appointments";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    #[serde(default)]
    pub department_id: Option<String>,
    pub appointment_date: DateTime<Utc>,
    /// Zero on legacy rows that never stored a duration.
    #[serde(default)]
    pub duration_minutes: i64,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_by: Option<String>,
}

impl Appointment {
    /// Stored duration, or `default_minutes` when none was recorded.
    pub fn effective_duration(&self, default_minutes: i64) -> i64 {
        if self.duration_minutes > 0 {
            self.duration_minutes
        } else {
            default_minutes
        }
    }

    pub fn scheduled_end_time(&self, default_minutes: i64) -> DateTime<Utc> {
        self.appointment_date + Duration::minutes(self.effective_duration(default_minutes))
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether this appointment still occupies its doctor's time.
    pub fn blocks_schedule(&self) -> bool {
        !self.is_deleted() && self.status != AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[serde(alias = "Scheduled", alias = "pending", alias = "Pending", alias = "booked")]
    Scheduled,
    #[serde(alias = "Confirmed")]
    Confirmed,
    #[serde(alias = "InProgress", alias = "in-progress", alias = "inprogress")]
    InProgress,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Cancelled", alias = "canceled", alias = "Canceled")]
    Cancelled,
    #[serde(alias = "NoShow", alias = "noshow", alias = "no-show")]
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Statuses of appointments that have not happened yet.
    pub const PENDING: [AppointmentStatus; 3] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[default]
    #[serde(
        alias = "Consultation",
        alias = "general_consultation",
        alias = "GeneralConsultation",
        alias = "general"
    )]
    Consultation,

    #[serde(alias = "FollowUp", alias = "follow-up", alias = "followup", alias = "follow_up_consultation")]
    FollowUp,

    #[serde(alias = "Emergency", alias = "urgent", alias = "emergency_consultation")]
    Emergency,

    #[serde(alias = "CheckUp", alias = "checkup", alias = "check-up")]
    CheckUp,

    #[serde(alias = "Procedure", alias = "surgery")]
    Procedure,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Consultation => write!(f, "consultation"),
            AppointmentType::FollowUp => write!(f, "follow_up"),
            AppointmentType::Emergency => write!(f, "emergency"),
            AppointmentType::CheckUp => write!(f, "check_up"),
            AppointmentType::Procedure => write!(f, "procedure"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: String,
    pub doctor_id: String,
    /// Falls back to the doctor's department.
    pub department_id: Option<String>,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub appointment_type: Option<AppointmentType>,
    pub status: Option<AppointmentStatus>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateAppointmentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_type: Option<AppointmentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UpdateAppointmentRequest {
    pub fn moves_time_window(&self) -> bool {
        self.appointment_date.is_some() || self.duration_minutes.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentSortField {
    #[default]
    AppointmentDate,
    CreatedAt,
    UpdatedAt,
    Status,
}

impl AppointmentSortField {
    pub fn as_field(&self) -> &'static str {
        match self {
            AppointmentSortField::AppointmentDate => "appointment_date",
            AppointmentSortField::CreatedAt => "created_at",
            AppointmentSortField::UpdatedAt => "updated_at",
            AppointmentSortField::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentQuery {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub department_id: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub appointment_type: Option<AppointmentType>,
    /// Appointments starting on this UTC calendar day.
    pub date: Option<NaiveDate>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub sort_by: Option<AppointmentSortField>,
    pub sort_order: Option<SortOrder>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: String,
    pub start: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub exclude_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpcomingQuery {
    pub hours_ahead: Option<i64>,
    pub limit: Option<usize>,
}

/// A window on a doctor's calendar, without who booked it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BusySlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub doctor_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
    pub conflicts: Vec<BusySlot>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor {doctor_id} is not available at {start}")]
    SlotUnavailable { doctor_id: String, start: DateTime<Utc> },

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("{0}")]
    Forbidden(#[from] AccessDenied),

    #[error("Validation error: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] StoreError),
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound => AppError::NotFound(error.to_string()),
            AppointmentError::SlotUnavailable { .. } => AppError::Conflict(error.to_string()),
            AppointmentError::InvalidStatusTransition { .. } => AppError::ValidationError(error.to_string()),
            AppointmentError::Forbidden(denied) => AppError::from(denied),
            AppointmentError::ValidationFailed(msg) => AppError::ValidationError(msg),
            AppointmentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
