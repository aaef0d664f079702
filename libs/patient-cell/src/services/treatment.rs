use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{
    decode, decode_all, fields_of, to_document, AppState, DocumentStore, Filter, FindOptions, SortOrder,
};
use shared_models::access::{AccessPolicy, Action, Resource};
use shared_models::auth::{CallerContext, Role};
use shared_utils::validation::require_text;

use crate::models::{
    CreateTreatmentRequest, PatientError, Treatment, TreatmentQuery, TreatmentStatus, UpdateTreatmentRequest,
    PATIENTS, TREATMENTS,
};

pub struct TreatmentService {
    store: Arc<dyn DocumentStore>,
    policy: AccessPolicy,
}

fn check_dates(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), PatientError> {
    match end {
        Some(end) if end < start => Err(PatientError::ValidationFailed(
            "end_date cannot be before start_date".to_string(),
        )),
        _ => Ok(()),
    }
}

impl TreatmentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            policy: AccessPolicy::new(state.config.scheduling.cancellation_window_hours),
        }
    }

    fn authorize(
        &self,
        action: Action,
        patient_id: &str,
        doctor_id: &str,
        caller: &CallerContext,
    ) -> Result<(), PatientError> {
        self.policy
            .check(action, &Resource::ClinicalRecord { patient_id, doctor_id }, caller, Utc::now())
            .map_err(|denied| {
                warn!("Treatment {} denied for {}: {}", action, caller.id, denied);
                PatientError::from(denied)
            })
    }

    async fn load(&self, treatment_id: &str, include_deleted: bool) -> Result<Treatment, PatientError> {
        let mut filter = Filter::by_id(treatment_id);
        if !include_deleted {
            filter = filter.live();
        }
        let document = self
            .store
            .find_one(TREATMENTS, &filter)
            .await?
            .ok_or(PatientError::TreatmentNotFound)?;
        Ok(decode(document)?)
    }

    async fn write(&self, treatment_id: &str, fields: Map<String, Value>) -> Result<Treatment, PatientError> {
        let updated = self
            .store
            .update_one(TREATMENTS, treatment_id, fields)
            .await?
            .ok_or(PatientError::TreatmentNotFound)?;
        Ok(decode(updated)?)
    }

    pub async fn create_treatment(
        &self,
        patient_id: &str,
        request: CreateTreatmentRequest,
        caller: &CallerContext,
    ) -> Result<Treatment, PatientError> {
        let doctor_id = match request.doctor_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None if caller.role == Role::Doctor => caller.id.clone(),
            None => return Err(PatientError::ValidationFailed("doctor_id is required".to_string())),
        };
        self.authorize(Action::Create, patient_id, &doctor_id, caller)?;
        debug!("Creating treatment for patient {} by doctor {}", patient_id, doctor_id);

        let patient_exists = self
            .store
            .find_one(PATIENTS, &Filter::by_id(patient_id).live())
            .await?
            .is_some();
        if !patient_exists {
            return Err(PatientError::NotFound);
        }

        let diagnosis = require_text("diagnosis", &request.diagnosis).map_err(PatientError::ValidationFailed)?;
        let start_date = request.start_date.unwrap_or_else(|| Utc::now().date_naive());
        check_dates(start_date, request.end_date)?;

        let now = Utc::now();
        let treatment = Treatment {
            id: Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            doctor_id,
            appointment_id: request.appointment_id,
            diagnosis,
            description: request.description,
            status: request.status.unwrap_or(TreatmentStatus::Planned),
            start_date,
            end_date: request.end_date,
            notes: request.notes,
            created_at: now,
            updated_at: now,
            created_by: Some(caller.id.clone()),
            deleted_at: None,
            deleted_by: None,
        };

        self.store.insert_one(TREATMENTS, to_document(&treatment)?).await?;
        info!("Treatment {} created successfully", treatment.id);
        Ok(treatment)
    }

    pub async fn list_for_patient(
        &self,
        patient_id: &str,
        query: TreatmentQuery,
        caller: &CallerContext,
    ) -> Result<Vec<Treatment>, PatientError> {
        debug!("Fetching treatments for patient: {}", patient_id);
        self.authorize(Action::List, patient_id, "", caller)?;

        let mut filter = Filter::new().eq("patient_id", patient_id).live();
        if let Some(status) = query.status {
            filter = filter.eq("status", status);
        }
        if let Some(doctor_id) = &query.doctor_id {
            filter = filter.eq("doctor_id", doctor_id);
        }

        let options = FindOptions::new()
            .sort_by("start_date", SortOrder::Desc)
            .page(query.limit, query.offset);
        let documents = self.store.find(TREATMENTS, &filter, &options).await?;
        Ok(decode_all(documents)?)
    }

    pub async fn count_treatments(
        &self,
        patient_id: Option<&str>,
        doctor_id: Option<&str>,
        status: Option<TreatmentStatus>,
    ) -> Result<u64, PatientError> {
        let mut filter = Filter::new().live();
        if let Some(patient_id) = patient_id {
            filter = filter.eq("patient_id", patient_id);
        }
        if let Some(doctor_id) = doctor_id {
            filter = filter.eq("doctor_id", doctor_id);
        }
        if let Some(status) = status {
            filter = filter.eq("status", status);
        }
        Ok(self.store.count(TREATMENTS, &filter).await?)
    }

    pub async fn get_treatment(&self, treatment_id: &str, caller: &CallerContext) -> Result<Treatment, PatientError> {
        debug!("Fetching treatment: {}", treatment_id);
        let treatment = self.load(treatment_id, false).await?;
        self.authorize(Action::View, &treatment.patient_id, &treatment.doctor_id, caller)?;
        Ok(treatment)
    }

    pub async fn update_treatment(
        &self,
        treatment_id: &str,
        request: UpdateTreatmentRequest,
        caller: &CallerContext,
    ) -> Result<Treatment, PatientError> {
        let treatment = self.load(treatment_id, false).await?;
        self.authorize(Action::Update, &treatment.patient_id, &treatment.doctor_id, caller)?;

        if let Some(diagnosis) = &request.diagnosis {
            require_text("diagnosis", diagnosis).map_err(PatientError::ValidationFailed)?;
        }
        check_dates(
            request.start_date.unwrap_or(treatment.start_date),
            request.end_date.or(treatment.end_date),
        )?;

        let mut fields = fields_of(&request)?;
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self.write(treatment_id, fields).await?;
        info!("Treatment {} updated successfully", treatment_id);
        Ok(updated)
    }

    pub async fn update_status(
        &self,
        treatment_id: &str,
        status: TreatmentStatus,
        caller: &CallerContext,
    ) -> Result<Treatment, PatientError> {
        let treatment = self.load(treatment_id, false).await?;
        self.authorize(Action::UpdateStatus, &treatment.patient_id, &treatment.doctor_id, caller)?;

        if treatment.status == status {
            debug!("Treatment {} already {}", treatment_id, status);
            return Ok(treatment);
        }
        if !treatment.status.can_transition_to(status) {
            return Err(PatientError::InvalidStatusTransition { from: treatment.status, to: status });
        }

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(status));
        fields.insert("updated_at".to_string(), json!(Utc::now()));
        if status.is_terminal() && treatment.end_date.is_none() {
            fields.insert("end_date".to_string(), json!(Utc::now().date_naive()));
        }

        let updated = self.write(treatment_id, fields).await?;
        info!("Treatment {} moved from {} to {}", treatment_id, treatment.status, status);
        Ok(updated)
    }

    pub async fn soft_delete_treatment(
        &self,
        treatment_id: &str,
        caller: &CallerContext,
    ) -> Result<Treatment, PatientError> {
        let treatment = self.load(treatment_id, false).await?;
        self.authorize(Action::Cancel, &treatment.patient_id, &treatment.doctor_id, caller)?;

        let now = json!(Utc::now());
        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), now.clone());
        fields.insert("deleted_by".to_string(), json!(caller.id));
        fields.insert("updated_at".to_string(), now);

        let updated = self.write(treatment_id, fields).await?;
        info!("Treatment {} soft deleted by {}", treatment_id, caller.id);
        Ok(updated)
    }

    pub async fn restore_treatment(
        &self,
        treatment_id: &str,
        caller: &CallerContext,
    ) -> Result<Treatment, PatientError> {
        let treatment = self.load(treatment_id, true).await?;
        self.authorize(Action::Restore, &treatment.patient_id, &treatment.doctor_id, caller)?;
        if treatment.deleted_at.is_none() {
            return Err(PatientError::TreatmentNotFound);
        }

        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), Value::Null);
        fields.insert("deleted_by".to_string(), Value::Null);
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self.write(treatment_id, fields).await?;
        info!("Treatment {} restored by {}", treatment_id, caller.id);
        Ok(updated)
    }

    pub async fn hard_delete_treatment(&self, treatment_id: &str, caller: &CallerContext) -> Result<(), PatientError> {
        let treatment = self.load(treatment_id, true).await?;
        self.authorize(Action::HardDelete, &treatment.patient_id, &treatment.doctor_id, caller)?;

        self.store.delete_one(TREATMENTS, treatment_id).await?;
        info!("Treatment {} permanently deleted by {}", treatment_id, caller.id);
        Ok(())
    }
}
