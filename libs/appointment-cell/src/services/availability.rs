use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use shared_database::{decode_all, AppState, DocumentStore, Filter, FindOptions};

use crate::models::{Appointment, AppointmentError, BusySlot, APPOINTMENTS};

/// Decides whether a doctor is free for a requested window.
///
/// Windows are half-open, `[start, start + duration)`, so an appointment that
/// ends at 09:30 does not collide with one that starts at 09:30.
pub struct AvailabilityChecker {
    store: Arc<dyn DocumentStore>,
    default_minutes: i64,
    max_minutes: i64,
}

impl AvailabilityChecker {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            default_minutes: state.config.scheduling.default_duration_minutes,
            max_minutes: state.config.scheduling.max_duration_minutes,
        }
    }

    pub fn default_minutes(&self) -> i64 {
        self.default_minutes
    }

    /// Missing or zero means the default length.
    pub fn resolve_duration(&self, requested: Option<i64>) -> Result<i64, AppointmentError> {
        match requested {
            None | Some(0) => Ok(self.default_minutes),
            Some(minutes) if minutes < 0 => Err(AppointmentError::ValidationFailed(
                "duration_minutes cannot be negative".to_string(),
            )),
            Some(minutes) if minutes > self.max_minutes => Err(AppointmentError::ValidationFailed(format!(
                "duration_minutes cannot exceed {}",
                self.max_minutes
            ))),
            Some(minutes) => Ok(minutes),
        }
    }

    /// Live, non-cancelled appointments of `doctor_id` that intersect the window.
    pub async fn conflicts(
        &self,
        doctor_id: &str,
        start: DateTime<Utc>,
        duration_minutes: Option<i64>,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if doctor_id.trim().is_empty() {
            return Err(AppointmentError::ValidationFailed("doctor_id is required".to_string()));
        }
        let duration = self.resolve_duration(duration_minutes)?;
        let end = start + Duration::minutes(duration);
        debug!("Checking conflicts for doctor {} from {} to {}", doctor_id, start, end);

        // No date pre-filter: long appointments that began earlier still count.
        let filter = Filter::new().eq("doctor_id", doctor_id).live();
        let existing: Vec<Appointment> =
            decode_all(self.store.find(APPOINTMENTS, &filter, &FindOptions::new()).await?)?;

        let conflicting: Vec<Appointment> = existing
            .into_iter()
            .filter(|appointment| appointment.blocks_schedule())
            .filter(|appointment| exclude_id != Some(appointment.id.as_str()))
            .filter(|appointment| {
                windows_overlap(
                    start,
                    end,
                    appointment.appointment_date,
                    appointment.scheduled_end_time(self.default_minutes),
                )
            })
            .collect();

        if !conflicting.is_empty() {
            warn!(
                "Conflict detected for doctor {} - {} conflicting appointments",
                doctor_id,
                conflicting.len()
            );
        }
        Ok(conflicting)
    }

    pub async fn is_available(
        &self,
        doctor_id: &str,
        start: DateTime<Utc>,
        duration_minutes: Option<i64>,
    ) -> Result<bool, AppointmentError> {
        Ok(self.conflicts(doctor_id, start, duration_minutes, None).await?.is_empty())
    }

    /// Same as [`Self::is_available`], ignoring the appointment being moved.
    pub async fn is_available_excluding(
        &self,
        doctor_id: &str,
        start: DateTime<Utc>,
        duration_minutes: Option<i64>,
        exclude_id: &str,
    ) -> Result<bool, AppointmentError> {
        Ok(self
            .conflicts(doctor_id, start, duration_minutes, Some(exclude_id))
            .await?
            .is_empty())
    }

    pub fn busy_slots(&self, appointments: &[Appointment]) -> Vec<BusySlot> {
        appointments
            .iter()
            .map(|appointment| BusySlot {
                start: appointment.appointment_date,
                end: appointment.scheduled_end_time(self.default_minutes),
                status: appointment.status,
            })
            .collect()
    }
}

/// Half-open interval intersection.
pub fn windows_overlap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 < end2 && start2 < end1
}
