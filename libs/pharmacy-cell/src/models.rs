use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shared_database::StoreError;
use shared_models::access::AccessDenied;
use shared_models::error::AppError;

pub const MEDICINES: &str = "medicines";
pub const PRESCRIPTIONS: &str = "prescriptions";

// ==============================================================================
// MEDICINES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub dosage_form: String,
    pub strength: String,
    pub unit_price: f64,
    pub stock_quantity: i64,
    pub reorder_level: i64,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_by: Option<String>,
}

impl Medicine {
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMedicineRequest {
    pub name: String,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub dosage_form: String,
    pub strength: String,
    pub unit_price: f64,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub reorder_level: i64,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateMedicineRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage_form: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustStockRequest {
    /// Positive to receive stock, negative to write it off.
    pub delta: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicineQuery {
    pub name: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    #[serde(alias = "Active", alias = "pending")]
    Active,
    #[serde(alias = "Dispensed")]
    Dispensed,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Cancelled", alias = "canceled")]
    Cancelled,
}

impl PrescriptionStatus {
    pub fn can_transition_to(&self, next: PrescriptionStatus) -> bool {
        matches!(
            (self, next),
            (PrescriptionStatus::Active, PrescriptionStatus::Dispensed)
                | (PrescriptionStatus::Active, PrescriptionStatus::Cancelled)
                | (PrescriptionStatus::Dispensed, PrescriptionStatus::Completed)
        )
    }
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrescriptionStatus::Active => write!(f, "active"),
            PrescriptionStatus::Dispensed => write!(f, "dispensed"),
            PrescriptionStatus::Completed => write!(f, "completed"),
            PrescriptionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionItem {
    pub medicine_id: String,
    #[serde(default)]
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: u32,
    pub quantity: i64,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_id: Option<String>,
    pub items: Vec<PrescriptionItem>,
    pub status: PrescriptionStatus,
    pub issued_at: DateTime<Utc>,
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
pub struct CreatePrescriptionRequest {
    pub patient_id: String,
    /// Defaults to the calling doctor.
    pub doctor_id: Option<String>,
    pub appointment_id: Option<String>,
    pub items: Vec<PrescriptionItem>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePrescriptionStatusRequest {
    pub status: PrescriptionStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionQuery {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub status: Option<PrescriptionStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PharmacyError {
    #[error("Medicine not found")]
    MedicineNotFound,

    #[error("Prescription not found")]
    PrescriptionNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Insufficient stock for {name}: {available} available, {requested} requested")]
    InsufficientStock { name: String, available: i64, requested: i64 },

    #[error("Cannot change prescription status from {from} to {to}")]
    InvalidStatusTransition { from: PrescriptionStatus, to: PrescriptionStatus },

    #[error("{0}")]
    Forbidden(#[from] AccessDenied),

    #[error("Validation error: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] StoreError),
}

impl From<PharmacyError> for AppError {
    fn from(error: PharmacyError) -> Self {
        match error {
            PharmacyError::MedicineNotFound
            | PharmacyError::PrescriptionNotFound
            | PharmacyError::PatientNotFound => AppError::NotFound(error.to_string()),
            PharmacyError::InsufficientStock { .. } | PharmacyError::InvalidStatusTransition { .. } => {
                AppError::ValidationError(error.to_string())
            }
            PharmacyError::Forbidden(denied) => AppError::from(denied),
            PharmacyError::ValidationFailed(msg) => AppError::ValidationError(msg),
            PharmacyError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescription_transitions() {
        use PrescriptionStatus::*;
        assert!(Active.can_transition_to(Dispensed));
        assert!(Active.can_transition_to(Cancelled));
        assert!(Dispensed.can_transition_to(Completed));
        assert!(!Dispensed.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Active));
    }
}
