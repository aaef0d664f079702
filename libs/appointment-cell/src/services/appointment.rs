use std::sync::Arc;

use chrono::{Duration, NaiveTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{
    decode, decode_all, fields_of, to_document, AppState, DocumentStore, Filter, FindOptions, KeyedLocks,
    SortOrder,
};
use shared_models::access::{AccessPolicy, Action, Resource};
use shared_models::auth::{CallerContext, Role};
use staff_cell::{StaffError, StaffService};

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, AvailabilityQuery, AvailabilityResponse,
    CreateAppointmentRequest, UpcomingQuery, UpdateAppointmentRequest, APPOINTMENTS,
};
use crate::services::availability::AvailabilityChecker;
use crate::services::lifecycle::AppointmentLifecycleService;

const DEFAULT_UPCOMING_HOURS: i64 = 24;

/// Booking and rescheduling for one doctor run one at a time.
fn schedule_lock_key(doctor_id: &str) -> String {
    format!("doctor-schedule:{}", doctor_id)
}

fn not_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub struct AppointmentService {
    store: Arc<dyn DocumentStore>,
    locks: Arc<KeyedLocks>,
    policy: AccessPolicy,
    availability: AvailabilityChecker,
    lifecycle: AppointmentLifecycleService,
    staff: StaffService,
}

impl AppointmentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            locks: state.locks.clone(),
            policy: AccessPolicy::new(state.config.scheduling.cancellation_window_hours),
            availability: AvailabilityChecker::new(state),
            lifecycle: AppointmentLifecycleService::new(),
            staff: StaffService::new(state),
        }
    }

    pub fn availability(&self) -> &AvailabilityChecker {
        &self.availability
    }

    fn check(&self, action: Action, resource: &Resource<'_>, caller: &CallerContext) -> Result<(), AppointmentError> {
        self.policy.check(action, resource, caller, Utc::now()).map_err(|denied| {
            warn!("Appointment {} denied for {}: {}", action, caller.id, denied);
            AppointmentError::from(denied)
        })
    }

    fn authorize(
        &self,
        action: Action,
        appointment: &Appointment,
        caller: &CallerContext,
    ) -> Result<(), AppointmentError> {
        self.check(action, &Self::resource_of(appointment), caller)
    }

    fn resource_of(appointment: &Appointment) -> Resource<'_> {
        Resource::Appointment {
            patient_id: &appointment.patient_id,
            doctor_id: &appointment.doctor_id,
            created_by: appointment.created_by.as_deref(),
            starts_at: appointment.appointment_date,
        }
    }

    /// Collection-level check for the given patient/doctor scope.
    fn authorize_scope(
        &self,
        action: Action,
        patient_id: Option<&str>,
        doctor_id: Option<&str>,
        caller: &CallerContext,
    ) -> Result<(), AppointmentError> {
        let resource = Resource::Appointment {
            patient_id: patient_id.unwrap_or_default(),
            doctor_id: doctor_id.unwrap_or_default(),
            created_by: None,
            starts_at: Utc::now(),
        };
        self.check(action, &resource, caller)
    }

    async fn load(&self, appointment_id: &str, include_deleted: bool) -> Result<Appointment, AppointmentError> {
        let mut filter = Filter::by_id(appointment_id);
        if !include_deleted {
            filter = filter.live();
        }
        let document = self
            .store
            .find_one(APPOINTMENTS, &filter)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        Ok(decode(document)?)
    }

    async fn write(&self, appointment_id: &str, fields: Map<String, Value>) -> Result<Appointment, AppointmentError> {
        let updated = self
            .store
            .update_one(APPOINTMENTS, appointment_id, fields)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        Ok(decode(updated)?)
    }

    async fn department_of(&self, doctor_id: &str) -> Result<Option<String>, AppointmentError> {
        self.staff.department_of(doctor_id).await.map_err(|e| match e {
            StaffError::Database(e) => AppointmentError::Database(e),
            other => AppointmentError::ValidationFailed(other.to_string()),
        })
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        caller: &CallerContext,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = request.patient_id.trim().to_string();
        let doctor_id = request.doctor_id.trim().to_string();
        if patient_id.is_empty() {
            return Err(AppointmentError::ValidationFailed("patient_id is required".to_string()));
        }
        if doctor_id.is_empty() {
            return Err(AppointmentError::ValidationFailed("doctor_id is required".to_string()));
        }

        let resource = Resource::Appointment {
            patient_id: &patient_id,
            doctor_id: &doctor_id,
            created_by: None,
            starts_at: request.appointment_date,
        };
        self.check(Action::Create, &resource, caller)?;

        let duration = self.availability.resolve_duration(request.duration_minutes)?;
        let status = request.status.unwrap_or(AppointmentStatus::Scheduled);
        if status.is_terminal() {
            return Err(AppointmentError::ValidationFailed(format!(
                "New appointments cannot start as {}",
                status
            )));
        }

        let department_id = match not_blank(request.department_id) {
            Some(id) => Some(id),
            None => self.department_of(&doctor_id).await?,
        };

        // Only office roles may book on someone else's behalf.
        let created_by = match not_blank(request.created_by) {
            Some(id) if caller.is_privileged() => id,
            _ => caller.id.clone(),
        };

        debug!(
            "Booking appointment for patient {} with doctor {} at {} ({} min)",
            patient_id, doctor_id, request.appointment_date, duration
        );

        let _schedule_guard = self.locks.acquire(&schedule_lock_key(&doctor_id)).await;

        let conflicts = self
            .availability
            .conflicts(&doctor_id, request.appointment_date, Some(duration), None)
            .await?;
        if !conflicts.is_empty() {
            return Err(AppointmentError::SlotUnavailable {
                doctor_id,
                start: request.appointment_date,
            });
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            patient_id,
            doctor_id,
            department_id,
            appointment_date: request.appointment_date,
            duration_minutes: duration,
            appointment_type: request.appointment_type.unwrap_or_default(),
            status,
            reason: request.reason,
            notes: request.notes,
            created_at: now,
            updated_at: now,
            created_by: Some(created_by),
            deleted_at: None,
            deleted_by: None,
        };

        self.store.insert_one(APPOINTMENTS, to_document(&appointment)?).await?;
        info!(
            "Appointment {} booked for patient {} with doctor {} at {}",
            appointment.id, appointment.patient_id, appointment.doctor_id, appointment.appointment_date
        );
        Ok(appointment)
    }

    pub async fn check_availability(
        &self,
        query: AvailabilityQuery,
        _caller: &CallerContext,
    ) -> Result<AvailabilityResponse, AppointmentError> {
        let duration = self.availability.resolve_duration(query.duration_minutes)?;
        let exclude_id = query.exclude_id.as_deref().filter(|id| !id.is_empty());
        let conflicts = self
            .availability
            .conflicts(&query.doctor_id, query.start, Some(duration), exclude_id)
            .await?;

        Ok(AvailabilityResponse {
            doctor_id: query.doctor_id,
            start: query.start,
            end: query.start + Duration::minutes(duration),
            available: conflicts.is_empty(),
            conflicts: self.availability.busy_slots(&conflicts),
        })
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get_appointment(
        &self,
        appointment_id: &str,
        caller: &CallerContext,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);
        let appointment = self.load(appointment_id, false).await?;
        self.authorize(Action::View, &appointment, caller)?;
        Ok(appointment)
    }

    /// Builds the filter for a listing. Patients are pinned to themselves and
    /// doctors to their own calendar, whatever the query asks for.
    fn scoped_filter(&self, query: &AppointmentQuery, caller: &CallerContext) -> Result<Filter, AppointmentError> {
        let patient_id = match caller.role {
            Role::Patient => Some(caller.id.as_str()),
            _ => query.patient_id.as_deref(),
        };
        let doctor_id = match caller.role {
            Role::Doctor => Some(caller.id.as_str()),
            _ => query.doctor_id.as_deref(),
        };
        self.authorize_scope(Action::List, patient_id, doctor_id, caller)?;

        let mut filter = Filter::new();
        if let Some(patient_id) = patient_id {
            filter = filter.eq("patient_id", patient_id);
        }
        if let Some(doctor_id) = doctor_id {
            filter = filter.eq("doctor_id", doctor_id);
        }
        if let Some(department_id) = query.department_id.as_deref() {
            filter = filter.eq("department_id", department_id);
        }
        if let Some(status) = query.status {
            filter = filter.eq("status", status);
        }
        if let Some(appointment_type) = query.appointment_type {
            filter = filter.eq("appointment_type", appointment_type);
        }
        if let Some(date) = query.date {
            let day_start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
            filter = filter
                .gte("appointment_date", day_start)
                .lt("appointment_date", day_start + Duration::days(1));
        }
        if let Some(from) = query.from_date {
            filter = filter.gte("appointment_date", from);
        }
        if let Some(to) = query.to_date {
            filter = filter.lt("appointment_date", to);
        }
        Ok(filter)
    }

    pub async fn list_appointments(
        &self,
        query: AppointmentQuery,
        caller: &CallerContext,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments for {} ({}) with query: {:?}", caller.id, caller.role, query);

        let mut filter = self.scoped_filter(&query, caller)?;
        if query.include_deleted {
            self.authorize_scope(Action::ViewDeleted, None, None, caller)?;
        } else {
            filter = filter.live();
        }

        let options = FindOptions::new()
            .sort_by(
                query.sort_by.unwrap_or_default().as_field(),
                query.sort_order.unwrap_or(SortOrder::Asc),
            )
            .page(query.limit, query.offset);

        let documents = self.store.find(APPOINTMENTS, &filter, &options).await?;
        Ok(decode_all(documents)?)
    }

    pub async fn list_deleted_appointments(
        &self,
        query: AppointmentQuery,
        caller: &CallerContext,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.authorize_scope(Action::ViewDeleted, None, None, caller)?;
        debug!("Listing deleted appointments");

        let filter = self.scoped_filter(&query, caller)?.deleted();
        let options = FindOptions::new()
            .sort_by("deleted_at", query.sort_order.unwrap_or(SortOrder::Desc))
            .page(query.limit, query.offset);

        let documents = self.store.find(APPOINTMENTS, &filter, &options).await?;
        Ok(decode_all(documents)?)
    }

    pub async fn count_appointments(
        &self,
        query: AppointmentQuery,
        caller: &CallerContext,
    ) -> Result<u64, AppointmentError> {
        let filter = self.scoped_filter(&query, caller)?.live();
        Ok(self.store.count(APPOINTMENTS, &filter).await?)
    }

    /// Live appointment count per status, within the caller's scope.
    pub async fn status_breakdown(
        &self,
        caller: &CallerContext,
    ) -> Result<Vec<(AppointmentStatus, u64)>, AppointmentError> {
        let mut breakdown = Vec::with_capacity(AppointmentStatus::ALL.len());
        for status in AppointmentStatus::ALL {
            let query = AppointmentQuery { status: Some(status), ..Default::default() };
            breakdown.push((status, self.count_appointments(query, caller).await?));
        }
        Ok(breakdown)
    }

    /// Appointments that have not happened yet, starting within the next hours.
    pub async fn upcoming_appointments(
        &self,
        query: UpcomingQuery,
        caller: &CallerContext,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let hours_ahead = query.hours_ahead.unwrap_or(DEFAULT_UPCOMING_HOURS);
        if hours_ahead <= 0 {
            return Err(AppointmentError::ValidationFailed("hours_ahead must be positive".to_string()));
        }

        let now = Utc::now();
        let until = Duration::try_hours(hours_ahead)
            .and_then(|ahead| now.checked_add_signed(ahead))
            .ok_or_else(|| AppointmentError::ValidationFailed(format!("hours_ahead {} is out of range", hours_ahead)))?;
        let window = AppointmentQuery {
            from_date: Some(now),
            to_date: Some(until),
            ..Default::default()
        };
        let filter = self
            .scoped_filter(&window, caller)?
            .live()
            .one_of("status", AppointmentStatus::PENDING);
        let options = FindOptions::new()
            .sort_by("appointment_date", SortOrder::Asc)
            .page(query.limit, None);

        let documents = self.store.find(APPOINTMENTS, &filter, &options).await?;
        let upcoming: Vec<Appointment> = decode_all(documents)?;
        debug!("{} upcoming appointments in the next {} hours for {}", upcoming.len(), hours_ahead, caller.id);
        Ok(upcoming)
    }

    // ==========================================================================
    // CHANGES
    // ==========================================================================

    pub async fn update_appointment(
        &self,
        appointment_id: &str,
        request: UpdateAppointmentRequest,
        caller: &CallerContext,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id, false).await?;
        self.authorize(Action::Update, &current, caller)?;
        if let Some(new_start) = request.appointment_date {
            // The change window also applies to where the appointment is moved.
            let moved = Resource::Appointment {
                patient_id: &current.patient_id,
                doctor_id: &current.doctor_id,
                created_by: current.created_by.as_deref(),
                starts_at: new_start,
            };
            self.check(Action::Update, &moved, caller)?;
        }

        let duration = request
            .duration_minutes
            .map(|minutes| self.availability.resolve_duration(Some(minutes)))
            .transpose()?;

        let mut fields = fields_of(&request)?;
        if let Some(duration) = duration {
            fields.insert("duration_minutes".to_string(), json!(duration));
        }
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        if !(request.moves_time_window() && current.blocks_schedule()) {
            let updated = self.write(appointment_id, fields).await?;
            info!("Appointment {} updated successfully", appointment_id);
            return Ok(updated);
        }

        let start = request.appointment_date.unwrap_or(current.appointment_date);
        let duration = duration.unwrap_or_else(|| current.effective_duration(self.availability.default_minutes()));

        let _schedule_guard = self.locks.acquire(&schedule_lock_key(&current.doctor_id)).await;
        let available = self
            .availability
            .is_available_excluding(&current.doctor_id, start, Some(duration), &current.id)
            .await?;
        if !available {
            return Err(AppointmentError::SlotUnavailable {
                doctor_id: current.doctor_id,
                start,
            });
        }

        let updated = self.write(appointment_id, fields).await?;
        info!("Appointment {} rescheduled to {} ({} min)", appointment_id, start, duration);
        Ok(updated)
    }

    pub async fn update_status(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
        caller: &CallerContext,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id, false).await?;
        self.authorize(Action::UpdateStatus, &appointment, caller)?;

        if appointment.status == status {
            debug!("Appointment {} already {}", appointment_id, status);
            return Ok(appointment);
        }
        self.lifecycle.validate_status_transition(appointment.status, status)?;

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(status));
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self.write(appointment_id, fields).await?;
        info!(
            "Appointment {} moved from {} to {} by {}",
            appointment_id, appointment.status, status, caller.id
        );
        Ok(updated)
    }

    /// Cancels and hides the appointment. An appointment that is already
    /// cancelled is returned unchanged.
    pub async fn soft_delete_appointment(
        &self,
        appointment_id: &str,
        caller: &CallerContext,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id, true).await?;

        if appointment.is_deleted() || appointment.status == AppointmentStatus::Cancelled {
            // Repeats skip the patient change window.
            self.policy
                .check_ownership(Action::Cancel, &Self::resource_of(&appointment), caller)
                .map_err(|denied| {
                    warn!("Appointment {} denied for {}: {}", Action::Cancel, caller.id, denied);
                    AppointmentError::from(denied)
                })?;
            debug!("Appointment {} already cancelled", appointment_id);
            return Ok(appointment);
        }

        self.authorize(Action::Cancel, &appointment, caller)?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let now = json!(Utc::now());
        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(AppointmentStatus::Cancelled));
        fields.insert("deleted_at".to_string(), now.clone());
        fields.insert("deleted_by".to_string(), json!(caller.id));
        fields.insert("updated_at".to_string(), now);

        let updated = self.write(appointment_id, fields).await?;
        info!("Appointment {} cancelled by {}", appointment_id, caller.id);
        Ok(updated)
    }

    /// Brings a soft-deleted appointment back as `scheduled`, if its slot is still free.
    pub async fn restore_appointment(
        &self,
        appointment_id: &str,
        caller: &CallerContext,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id, true).await?;
        self.authorize(Action::Restore, &appointment, caller)?;
        if !appointment.is_deleted() {
            return Err(AppointmentError::NotFound);
        }

        let duration = appointment.effective_duration(self.availability.default_minutes());
        let _schedule_guard = self.locks.acquire(&schedule_lock_key(&appointment.doctor_id)).await;
        let available = self
            .availability
            .is_available_excluding(&appointment.doctor_id, appointment.appointment_date, Some(duration), &appointment.id)
            .await?;
        if !available {
            return Err(AppointmentError::SlotUnavailable {
                doctor_id: appointment.doctor_id,
                start: appointment.appointment_date,
            });
        }

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(AppointmentStatus::Scheduled));
        fields.insert("deleted_at".to_string(), Value::Null);
        fields.insert("deleted_by".to_string(), Value::Null);
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self.write(appointment_id, fields).await?;
        info!("Appointment {} restored by {}", appointment_id, caller.id);
        Ok(updated)
    }

    pub async fn hard_delete_appointment(
        &self,
        appointment_id: &str,
        caller: &CallerContext,
    ) -> Result<(), AppointmentError> {
        let appointment = self.load(appointment_id, true).await?;
        self.authorize(Action::HardDelete, &appointment, caller)?;

        if !self.store.delete_one(APPOINTMENTS, appointment_id).await? {
            return Err(AppointmentError::NotFound);
        }
        info!("Appointment {} permanently deleted by {}", appointment_id, caller.id);
        Ok(())
    }
}
