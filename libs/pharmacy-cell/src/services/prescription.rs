use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use patient_cell::{PatientError, PatientService};
use shared_database::{
    decode, decode_all, to_document, AppState, DocumentStore, Filter, FindOptions, KeyedGuard, KeyedLocks,
    SortOrder,
};
use shared_models::access::{AccessPolicy, Action, Resource};
use shared_models::auth::{CallerContext, Role};

use crate::models::{
    CreatePrescriptionRequest, PharmacyError, Prescription, PrescriptionQuery, PrescriptionStatus, PRESCRIPTIONS,
};
use crate::services::{stock_lock_key, MedicineService};

pub struct PrescriptionService {
    store: Arc<dyn DocumentStore>,
    locks: Arc<KeyedLocks>,
    policy: AccessPolicy,
    patients: PatientService,
    medicines: MedicineService,
}

impl PrescriptionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            locks: state.locks.clone(),
            policy: AccessPolicy::new(state.config.scheduling.cancellation_window_hours),
            patients: PatientService::new(state),
            medicines: MedicineService::new(state),
        }
    }

    fn authorize(
        &self,
        action: Action,
        patient_id: &str,
        doctor_id: &str,
        caller: &CallerContext,
    ) -> Result<(), PharmacyError> {
        self.policy
            .check(action, &Resource::ClinicalRecord { patient_id, doctor_id }, caller, Utc::now())
            .map_err(|denied| {
                warn!("Prescription {} denied for {}: {}", action, caller.id, denied);
                PharmacyError::from(denied)
            })
    }

    async fn load(&self, prescription_id: &str, include_deleted: bool) -> Result<Prescription, PharmacyError> {
        let mut filter = Filter::by_id(prescription_id);
        if !include_deleted {
            filter = filter.live();
        }
        let document = self
            .store
            .find_one(PRESCRIPTIONS, &filter)
            .await?
            .ok_or(PharmacyError::PrescriptionNotFound)?;
        Ok(decode(document)?)
    }

    async fn write(&self, prescription_id: &str, fields: Map<String, Value>) -> Result<Prescription, PharmacyError> {
        let updated = self
            .store
            .update_one(PRESCRIPTIONS, prescription_id, fields)
            .await?
            .ok_or(PharmacyError::PrescriptionNotFound)?;
        Ok(decode(updated)?)
    }

    pub async fn create_prescription(
        &self,
        request: CreatePrescriptionRequest,
        caller: &CallerContext,
    ) -> Result<Prescription, PharmacyError> {
        let doctor_id = match request.doctor_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None if caller.role == Role::Doctor => caller.id.clone(),
            None => return Err(PharmacyError::ValidationFailed("doctor_id is required".to_string())),
        };
        self.authorize(Action::Create, &request.patient_id, &doctor_id, caller)?;
        debug!("Creating prescription for patient {} by doctor {}", request.patient_id, doctor_id);

        match self.patients.find_live(&request.patient_id).await {
            Ok(_) => {}
            Err(PatientError::NotFound) => return Err(PharmacyError::PatientNotFound),
            Err(PatientError::Database(e)) => return Err(PharmacyError::Database(e)),
            Err(e) => return Err(PharmacyError::ValidationFailed(e.to_string())),
        }

        if request.items.is_empty() {
            return Err(PharmacyError::ValidationFailed("A prescription needs at least one item".to_string()));
        }

        let mut items = request.items;
        for item in items.iter_mut() {
            if item.quantity <= 0 {
                return Err(PharmacyError::ValidationFailed(format!(
                    "Quantity for medicine {} must be positive",
                    item.medicine_id
                )));
            }
            let medicine = match self.medicines.find_live(&item.medicine_id).await {
                Ok(medicine) => medicine,
                Err(PharmacyError::MedicineNotFound) => {
                    return Err(PharmacyError::ValidationFailed(format!(
                        "Medicine {} does not exist",
                        item.medicine_id
                    )))
                }
                Err(e) => return Err(e),
            };
            item.medicine_name = medicine.name;
        }

        let now = Utc::now();
        let prescription = Prescription {
            id: Uuid::new_v4().to_string(),
            patient_id: request.patient_id,
            doctor_id,
            appointment_id: request.appointment_id,
            items,
            status: PrescriptionStatus::Active,
            issued_at: now,
            notes: request.notes,
            created_at: now,
            updated_at: now,
            created_by: Some(caller.id.clone()),
            deleted_at: None,
            deleted_by: None,
        };

        self.store.insert_one(PRESCRIPTIONS, to_document(&prescription)?).await?;
        info!("Prescription {} created successfully", prescription.id);
        Ok(prescription)
    }

    pub async fn get_prescription(
        &self,
        prescription_id: &str,
        caller: &CallerContext,
    ) -> Result<Prescription, PharmacyError> {
        debug!("Fetching prescription: {}", prescription_id);
        let prescription = self.load(prescription_id, false).await?;
        self.authorize(Action::View, &prescription.patient_id, &prescription.doctor_id, caller)?;
        Ok(prescription)
    }

    fn scoped_filter(query: &PrescriptionQuery, caller: &CallerContext) -> Filter {
        let mut filter = Filter::new().live();

        let patient_id = match caller.role {
            Role::Patient => Some(caller.id.as_str()),
            _ => query.patient_id.as_deref(),
        };
        let doctor_id = match caller.role {
            Role::Doctor => Some(caller.id.as_str()),
            _ => query.doctor_id.as_deref(),
        };

        if let Some(patient_id) = patient_id {
            filter = filter.eq("patient_id", patient_id);
        }
        if let Some(doctor_id) = doctor_id {
            filter = filter.eq("doctor_id", doctor_id);
        }
        if let Some(status) = query.status {
            filter = filter.eq("status", status);
        }
        filter
    }

    /// Patients only ever see their own prescriptions and doctors the ones they wrote.
    pub async fn list_prescriptions(
        &self,
        query: PrescriptionQuery,
        caller: &CallerContext,
    ) -> Result<Vec<Prescription>, PharmacyError> {
        debug!("Listing prescriptions for {} ({})", caller.id, caller.role);

        let filter = Self::scoped_filter(&query, caller);
        let options = FindOptions::new()
            .sort_by("issued_at", SortOrder::Desc)
            .page(query.limit, query.offset);
        let documents = self.store.find(PRESCRIPTIONS, &filter, &options).await?;
        Ok(decode_all(documents)?)
    }

    pub async fn count_prescriptions(
        &self,
        query: PrescriptionQuery,
        caller: &CallerContext,
    ) -> Result<u64, PharmacyError> {
        Ok(self.store.count(PRESCRIPTIONS, &Self::scoped_filter(&query, caller)).await?)
    }

    pub async fn update_status(
        &self,
        prescription_id: &str,
        status: PrescriptionStatus,
        caller: &CallerContext,
    ) -> Result<Prescription, PharmacyError> {
        let prescription = self.load(prescription_id, false).await?;

        if status == PrescriptionStatus::Dispensed {
            self.medicines.authorize(Action::UpdateStatus, caller)?;
        } else {
            self.authorize(Action::UpdateStatus, &prescription.patient_id, &prescription.doctor_id, caller)?;
        }

        if prescription.status == status {
            debug!("Prescription {} already {}", prescription_id, status);
            return Ok(prescription);
        }
        if !prescription.status.can_transition_to(status) {
            return Err(PharmacyError::InvalidStatusTransition { from: prescription.status, to: status });
        }

        if status == PrescriptionStatus::Dispensed {
            return self.dispense(prescription, caller).await;
        }

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(status));
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self.write(prescription_id, fields).await?;
        info!("Prescription {} moved from {} to {}", prescription_id, prescription.status, status);
        Ok(updated)
    }

    /// Takes every item's quantity out of stock, or nothing if any medicine runs short.
    async fn dispense(&self, prescription: Prescription, caller: &CallerContext) -> Result<Prescription, PharmacyError> {
        let _prescription_guard = self.locks.acquire(&format!("prescription:{}", prescription.id)).await;
        let prescription = self.load(&prescription.id, false).await?;
        if !prescription.status.can_transition_to(PrescriptionStatus::Dispensed) {
            return Err(PharmacyError::InvalidStatusTransition {
                from: prescription.status,
                to: PrescriptionStatus::Dispensed,
            });
        }

        let mut needed: BTreeMap<&str, i64> = BTreeMap::new();
        for item in &prescription.items {
            let total = needed.entry(item.medicine_id.as_str()).or_insert(0);
            *total = total.checked_add(item.quantity).ok_or_else(|| {
                PharmacyError::ValidationFailed(format!("Total quantity of {} is too large", item.medicine_name))
            })?;
        }

        // Ordered acquisition keeps two dispensers from deadlocking.
        let mut guards: Vec<KeyedGuard> = Vec::with_capacity(needed.len());
        for medicine_id in needed.keys() {
            guards.push(self.locks.acquire(&stock_lock_key(medicine_id)).await);
        }

        let mut remaining = Vec::with_capacity(needed.len());
        for (medicine_id, quantity) in &needed {
            let medicine = self.medicines.find_live(medicine_id).await?;
            if medicine.stock_quantity < *quantity {
                return Err(PharmacyError::InsufficientStock {
                    name: medicine.name,
                    available: medicine.stock_quantity,
                    requested: *quantity,
                });
            }
            remaining.push((*medicine_id, medicine.stock_quantity - quantity));
        }

        for (medicine_id, stock) in remaining {
            self.medicines.write_stock(medicine_id, stock).await?;
        }

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(PrescriptionStatus::Dispensed));
        fields.insert("updated_at".to_string(), json!(Utc::now()));
        let updated = self.write(&prescription.id, fields).await?;
        drop(guards);

        info!("Prescription {} dispensed by {}", prescription.id, caller.id);
        Ok(updated)
    }

    pub async fn soft_delete_prescription(
        &self,
        prescription_id: &str,
        caller: &CallerContext,
    ) -> Result<Prescription, PharmacyError> {
        let prescription = self.load(prescription_id, false).await?;
        self.authorize(Action::Cancel, &prescription.patient_id, &prescription.doctor_id, caller)?;

        let now = json!(Utc::now());
        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), now.clone());
        fields.insert("deleted_by".to_string(), json!(caller.id));
        fields.insert("updated_at".to_string(), now);

        let updated = self.write(prescription_id, fields).await?;
        info!("Prescription {} soft deleted by {}", prescription_id, caller.id);
        Ok(updated)
    }

    pub async fn restore_prescription(
        &self,
        prescription_id: &str,
        caller: &CallerContext,
    ) -> Result<Prescription, PharmacyError> {
        let prescription = self.load(prescription_id, true).await?;
        self.authorize(Action::Restore, &prescription.patient_id, &prescription.doctor_id, caller)?;
        if prescription.deleted_at.is_none() {
            return Err(PharmacyError::PrescriptionNotFound);
        }

        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), Value::Null);
        fields.insert("deleted_by".to_string(), Value::Null);
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self.write(prescription_id, fields).await?;
        info!("Prescription {} restored by {}", prescription_id, caller.id);
        Ok(updated)
    }

    pub async fn hard_delete_prescription(
        &self,
        prescription_id: &str,
        caller: &CallerContext,
    ) -> Result<(), PharmacyError> {
        let prescription = self.load(prescription_id, true).await?;
        self.authorize(Action::HardDelete, &prescription.patient_id, &prescription.doctor_id, caller)?;

        self.store.delete_one(PRESCRIPTIONS, prescription_id).await?;
        info!("Prescription {} permanently deleted by {}", prescription_id, caller.id);
        Ok(())
    }
}
