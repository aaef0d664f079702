use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{
    decode, decode_all, fields_of, to_document, AppState, Condition, DocumentStore, Filter, FindOptions,
    StoreError,
};
use shared_models::access::{AccessPolicy, Action, Resource};
use shared_models::auth::CallerContext;
use shared_utils::validation::{require_text, validate_email, validate_phone};

use crate::models::{
    CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest, PATIENTS,
};

pub struct PatientService {
    store: Arc<dyn DocumentStore>,
    policy: AccessPolicy,
}

impl PatientService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            policy: AccessPolicy::new(state.config.scheduling.cancellation_window_hours),
        }
    }

    fn authorize(&self, action: Action, patient_id: &str, caller: &CallerContext) -> Result<(), PatientError> {
        self.policy
            .check(action, &Resource::Patient { patient_id }, caller, Utc::now())
            .map_err(|denied| {
                warn!("Patient {} denied for {}: {}", action, caller.id, denied);
                PatientError::from(denied)
            })
    }

    async fn load(&self, patient_id: &str, include_deleted: bool) -> Result<Patient, PatientError> {
        let mut filter = Filter::by_id(patient_id);
        if !include_deleted {
            filter = filter.live();
        }
        let document = self
            .store
            .find_one(PATIENTS, &filter)
            .await?
            .ok_or(PatientError::NotFound)?;
        Ok(decode(document)?)
    }

    /// Live patient record, without an access check. Used by sibling services.
    pub async fn find_live(&self, patient_id: &str) -> Result<Patient, PatientError> {
        self.load(patient_id, false).await
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        caller: &CallerContext,
    ) -> Result<Patient, PatientError> {
        self.authorize(Action::Create, "", caller)?;
        debug!("Creating new patient record for: {}", request.email);

        let email = request.email.trim().to_lowercase();
        if !validate_email(&email) {
            return Err(PatientError::ValidationFailed(format!("Invalid email address: {}", request.email)));
        }
        if let Some(phone) = &request.phone {
            if !validate_phone(phone) {
                return Err(PatientError::ValidationFailed(format!("Invalid phone number: {}", phone)));
            }
        }
        if request.date_of_birth.is_some_and(|dob| dob > Utc::now().date_naive()) {
            return Err(PatientError::ValidationFailed("Date of birth cannot be in the future".to_string()));
        }
        let first_name = require_text("first_name", &request.first_name).map_err(PatientError::ValidationFailed)?;
        let last_name = require_text("last_name", &request.last_name).map_err(PatientError::ValidationFailed)?;

        let existing = self
            .store
            .find_one(PATIENTS, &Filter::new().eq("email", &email).live())
            .await?;
        if existing.is_some() {
            return Err(PatientError::EmailAlreadyExists { email });
        }

        let now = Utc::now();
        let patient = Patient {
            id: request
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            first_name,
            last_name,
            email,
            phone: request.phone,
            date_of_birth: request.date_of_birth,
            gender: request.gender,
            address: request.address,
            blood_type: request.blood_type,
            allergies: request.allergies,
            emergency_contact: request.emergency_contact,
            created_at: now,
            updated_at: now,
            created_by: Some(caller.id.clone()),
            deleted_at: None,
            deleted_by: None,
        };

        self.store
            .insert_one(PATIENTS, to_document(&patient)?)
            .await
            .map_err(|e| match e {
                StoreError::DuplicateId(id) => PatientError::IdInUse(id),
                other => PatientError::Database(other),
            })?;

        info!("Patient record {} created successfully", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: &str, caller: &CallerContext) -> Result<Patient, PatientError> {
        debug!("Fetching patient record: {}", patient_id);
        self.authorize(Action::View, patient_id, caller)?;
        self.load(patient_id, false).await
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
        caller: &CallerContext,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient record: {}", patient_id);
        self.authorize(Action::Update, patient_id, caller)?;
        self.load(patient_id, false).await?;

        if let Some(phone) = &request.phone {
            if !validate_phone(phone) {
                return Err(PatientError::ValidationFailed(format!("Invalid phone number: {}", phone)));
            }
        }

        let mut fields = fields_of(&request)?;
        fields.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));

        let updated = self
            .store
            .update_one(PATIENTS, patient_id, fields)
            .await?
            .ok_or(PatientError::NotFound)?;

        info!("Patient record {} updated successfully", patient_id);
        Ok(decode(updated)?)
    }

    fn search_filter(query: &PatientSearchQuery) -> Filter {
        let mut filter = Filter::new();
        if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            filter = filter.any_of(vec![
                Condition::Contains("first_name".to_string(), name.to_string()),
                Condition::Contains("last_name".to_string(), name.to_string()),
                Condition::Contains("email".to_string(), name.to_string()),
            ]);
        }
        if let Some(email) = query.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            filter = filter.contains("email", email);
        }
        filter
    }

    fn search_options(query: &PatientSearchQuery) -> FindOptions {
        let sort_by = query.sort_by.unwrap_or_default();
        FindOptions::new()
            .sort_by(sort_by.column(), query.sort_order.unwrap_or_default())
            .page(Some(query.limit.unwrap_or(50)), query.offset)
    }

    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        caller: &CallerContext,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Searching patients with query: {:?}", query);
        self.authorize(Action::List, "", caller)?;

        let filter = Self::search_filter(&query).live();
        let documents = self.store.find(PATIENTS, &filter, &Self::search_options(&query)).await?;
        Ok(decode_all(documents)?)
    }

    pub async fn list_deleted_patients(
        &self,
        query: PatientSearchQuery,
        caller: &CallerContext,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Listing deleted patients");
        self.authorize(Action::ViewDeleted, "", caller)?;

        let filter = Self::search_filter(&query).deleted();
        let documents = self.store.find(PATIENTS, &filter, &Self::search_options(&query)).await?;
        Ok(decode_all(documents)?)
    }

    pub async fn count_patients(&self) -> Result<u64, PatientError> {
        Ok(self.store.count(PATIENTS, &Filter::new().live()).await?)
    }

    pub async fn soft_delete_patient(&self, patient_id: &str, caller: &CallerContext) -> Result<Patient, PatientError> {
        self.authorize(Action::Cancel, patient_id, caller)?;
        self.load(patient_id, false).await?;

        let now = Utc::now().to_rfc3339();
        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), Value::String(now.clone()));
        fields.insert("deleted_by".to_string(), Value::String(caller.id.clone()));
        fields.insert("updated_at".to_string(), Value::String(now));

        let updated = self
            .store
            .update_one(PATIENTS, patient_id, fields)
            .await?
            .ok_or(PatientError::NotFound)?;

        info!("Patient record {} soft deleted by {}", patient_id, caller.id);
        Ok(decode(updated)?)
    }

    pub async fn restore_patient(&self, patient_id: &str, caller: &CallerContext) -> Result<Patient, PatientError> {
        self.authorize(Action::Restore, patient_id, caller)?;
        let patient = self.load(patient_id, true).await?;
        if patient.deleted_at.is_none() {
            return Err(PatientError::NotFound);
        }

        let clash = self
            .store
            .find_one(PATIENTS, &Filter::new().eq("email", &patient.email).live())
            .await?;
        if clash.is_some() {
            return Err(PatientError::EmailAlreadyExists { email: patient.email });
        }

        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), Value::Null);
        fields.insert("deleted_by".to_string(), Value::Null);
        fields.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));

        let updated = self
            .store
            .update_one(PATIENTS, patient_id, fields)
            .await?
            .ok_or(PatientError::NotFound)?;

        info!("Patient record {} restored by {}", patient_id, caller.id);
        Ok(decode(updated)?)
    }

    pub async fn hard_delete_patient(&self, patient_id: &str, caller: &CallerContext) -> Result<(), PatientError> {
        self.authorize(Action::HardDelete, patient_id, caller)?;
        if !self.store.delete_one(PATIENTS, patient_id).await? {
            return Err(PatientError::NotFound);
        }
        info!("Patient record {} permanently deleted by {}", patient_id, caller.id);
        Ok(())
    }
}
