use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use appointment_cell::{Appointment, AppointmentError};
use patient_cell::{PatientError, Treatment};
use pharmacy_cell::{PharmacyError, Prescription};
use shared_models::access::AccessDenied;
use shared_models::error::AppError;
use staff_cell::StaffError;

/// What the dashboard shows depends on who is looking.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum DashboardSummary {
    Hospital(HospitalOverview),
    Doctor(DoctorOverview),
    Patient(PatientOverview),
}

/// Hospital-wide figures for office and nursing roles.
#[derive(Debug, Clone, Serialize)]
pub struct HospitalOverview {
    pub generated_at: DateTime<Utc>,
    pub patients: u64,
    pub staff: u64,
    pub departments: u64,
    pub appointments_today: u64,
    pub appointments_by_status: BTreeMap<String, u64>,
    pub low_stock_medicines: u64,
    pub upcoming_appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorOverview {
    pub generated_at: DateTime<Utc>,
    pub appointments_today: u64,
    pub upcoming_appointments: Vec<Appointment>,
    pub ongoing_treatments: u64,
    pub active_prescriptions: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientOverview {
    pub generated_at: DateTime<Utc>,
    pub upcoming_appointments: Vec<Appointment>,
    pub active_prescriptions: Vec<Prescription>,
    pub ongoing_treatments: Vec<Treatment>,
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("{0}")]
    Forbidden(#[from] AccessDenied),

    #[error(transparent)]
    Appointments(#[from] AppointmentError),

    #[error(transparent)]
    Patients(#[from] PatientError),

    #[error(transparent)]
    Pharmacy(#[from] PharmacyError),

    #[error(transparent)]
    Staff(#[from] StaffError),
}

impl From<DashboardError> for AppError {
    fn from(error: DashboardError) -> Self {
        match error {
            DashboardError::Forbidden(denied) => AppError::from(denied),
            DashboardError::Appointments(e) => AppError::from(e),
            DashboardError::Patients(e) => AppError::from(e),
            DashboardError::Pharmacy(e) => AppError::from(e),
            DashboardError::Staff(e) => AppError::from(e),
        }
    }
}
