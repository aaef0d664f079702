use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{
    decode, decode_all, fields_of, to_document, AppState, DocumentStore, Filter, FindOptions, KeyedLocks,
    SortOrder,
};
use shared_models::access::{AccessPolicy, Action, Resource};
use shared_models::auth::CallerContext;
use shared_utils::validation::require_text;

use crate::models::{
    AdjustStockRequest, CreateMedicineRequest, Medicine, MedicineQuery, PharmacyError, UpdateMedicineRequest,
    MEDICINES,
};
use crate::services::stock_lock_key;

pub struct MedicineService {
    store: Arc<dyn DocumentStore>,
    locks: Arc<KeyedLocks>,
    policy: AccessPolicy,
}

impl MedicineService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            locks: state.locks.clone(),
            policy: AccessPolicy::new(state.config.scheduling.cancellation_window_hours),
        }
    }

    pub(crate) fn authorize(&self, action: Action, caller: &CallerContext) -> Result<(), PharmacyError> {
        self.policy
            .check(action, &Resource::Medicine, caller, Utc::now())
            .map_err(|denied| {
                warn!("Medicine {} denied for {}: {}", action, caller.id, denied);
                PharmacyError::from(denied)
            })
    }

    async fn load(&self, medicine_id: &str, include_deleted: bool) -> Result<Medicine, PharmacyError> {
        let mut filter = Filter::by_id(medicine_id);
        if !include_deleted {
            filter = filter.live();
        }
        let document = self
            .store
            .find_one(MEDICINES, &filter)
            .await?
            .ok_or(PharmacyError::MedicineNotFound)?;
        Ok(decode(document)?)
    }

    /// Live medicine, without an access check.
    pub async fn find_live(&self, medicine_id: &str) -> Result<Medicine, PharmacyError> {
        self.load(medicine_id, false).await
    }

    fn validate_numbers(unit_price: f64, stock: i64, reorder_level: i64) -> Result<(), PharmacyError> {
        if !unit_price.is_finite() || unit_price < 0.0 {
            return Err(PharmacyError::ValidationFailed("unit_price cannot be negative".to_string()));
        }
        if stock < 0 || reorder_level < 0 {
            return Err(PharmacyError::ValidationFailed(
                "stock_quantity and reorder_level cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn create_medicine(
        &self,
        request: CreateMedicineRequest,
        caller: &CallerContext,
    ) -> Result<Medicine, PharmacyError> {
        self.authorize(Action::Create, caller)?;
        let name = require_text("name", &request.name).map_err(PharmacyError::ValidationFailed)?;
        debug!("Creating medicine: {}", name);
        Self::validate_numbers(request.unit_price, request.stock_quantity, request.reorder_level)?;

        let now = Utc::now();
        let medicine = Medicine {
            id: Uuid::new_v4().to_string(),
            name,
            generic_name: request.generic_name,
            manufacturer: request.manufacturer,
            dosage_form: request.dosage_form,
            strength: request.strength,
            unit_price: request.unit_price,
            stock_quantity: request.stock_quantity,
            reorder_level: request.reorder_level,
            expiry_date: request.expiry_date,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        };

        self.store.insert_one(MEDICINES, to_document(&medicine)?).await?;
        info!("Medicine {} created successfully", medicine.id);
        Ok(medicine)
    }

    pub async fn get_medicine(&self, medicine_id: &str) -> Result<Medicine, PharmacyError> {
        debug!("Fetching medicine: {}", medicine_id);
        self.load(medicine_id, false).await
    }

    pub async fn list_medicines(&self, query: MedicineQuery) -> Result<Vec<Medicine>, PharmacyError> {
        debug!("Listing medicines with query: {:?}", query);

        let mut filter = Filter::new().live();
        if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            filter = filter.contains("name", name);
        }

        let mut options = FindOptions::new().sort_by("name", SortOrder::Asc);
        if !query.low_stock {
            options = options.page(query.limit, query.offset);
        }

        let medicines: Vec<Medicine> = decode_all(self.store.find(MEDICINES, &filter, &options).await?)?;
        if !query.low_stock {
            return Ok(medicines);
        }

        // Stock is compared against each row's own reorder level, so page after filtering.
        Ok(medicines
            .into_iter()
            .filter(Medicine::is_low_stock)
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    pub async fn count_low_stock(&self) -> Result<u64, PharmacyError> {
        let low = self
            .list_medicines(MedicineQuery { low_stock: true, ..Default::default() })
            .await?;
        Ok(low.len() as u64)
    }

    pub async fn update_medicine(
        &self,
        medicine_id: &str,
        request: UpdateMedicineRequest,
        caller: &CallerContext,
    ) -> Result<Medicine, PharmacyError> {
        self.authorize(Action::Update, caller)?;
        let current = self.load(medicine_id, false).await?;

        if let Some(name) = &request.name {
            require_text("name", name).map_err(PharmacyError::ValidationFailed)?;
        }
        Self::validate_numbers(
            request.unit_price.unwrap_or(current.unit_price),
            current.stock_quantity,
            request.reorder_level.unwrap_or(current.reorder_level),
        )?;

        let mut fields = fields_of(&request)?;
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self
            .store
            .update_one(MEDICINES, medicine_id, fields)
            .await?
            .ok_or(PharmacyError::MedicineNotFound)?;

        info!("Medicine {} updated successfully", medicine_id);
        Ok(decode(updated)?)
    }

    /// Writes a new stock level. Callers hold the medicine's stock lock.
    pub(crate) async fn write_stock(&self, medicine_id: &str, stock_quantity: i64) -> Result<Medicine, PharmacyError> {
        let mut fields = Map::new();
        fields.insert("stock_quantity".to_string(), json!(stock_quantity));
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self
            .store
            .update_one(MEDICINES, medicine_id, fields)
            .await?
            .ok_or(PharmacyError::MedicineNotFound)?;
        Ok(decode(updated)?)
    }

    pub async fn adjust_stock(
        &self,
        medicine_id: &str,
        request: AdjustStockRequest,
        caller: &CallerContext,
    ) -> Result<Medicine, PharmacyError> {
        self.authorize(Action::UpdateStatus, caller)?;
        if request.delta == 0 {
            return Err(PharmacyError::ValidationFailed("delta must not be zero".to_string()));
        }

        let _guard = self.locks.acquire(&stock_lock_key(medicine_id)).await;
        let medicine = self.load(medicine_id, false).await?;

        let new_stock = medicine.stock_quantity.checked_add(request.delta).ok_or_else(|| {
            PharmacyError::ValidationFailed(format!(
                "Stock adjustment {} for {} is out of range",
                request.delta, medicine.name
            ))
        })?;
        if new_stock < 0 {
            return Err(PharmacyError::ValidationFailed(format!(
                "Stock for {} cannot go below zero ({} available, adjustment {})",
                medicine.name, medicine.stock_quantity, request.delta
            )));
        }

        let updated = self.write_stock(medicine_id, new_stock).await?;
        info!(
            "Stock for medicine {} adjusted by {} to {} ({})",
            medicine_id,
            request.delta,
            new_stock,
            request.reason.as_deref().unwrap_or("no reason given")
        );
        Ok(updated)
    }

    pub async fn soft_delete_medicine(
        &self,
        medicine_id: &str,
        caller: &CallerContext,
    ) -> Result<Medicine, PharmacyError> {
        self.authorize(Action::Cancel, caller)?;
        self.load(medicine_id, false).await?;

        let now = json!(Utc::now());
        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), now.clone());
        fields.insert("deleted_by".to_string(), json!(caller.id));
        fields.insert("updated_at".to_string(), now);

        let updated = self
            .store
            .update_one(MEDICINES, medicine_id, fields)
            .await?
            .ok_or(PharmacyError::MedicineNotFound)?;

        info!("Medicine {} soft deleted by {}", medicine_id, caller.id);
        Ok(decode(updated)?)
    }

    pub async fn restore_medicine(&self, medicine_id: &str, caller: &CallerContext) -> Result<Medicine, PharmacyError> {
        self.authorize(Action::Restore, caller)?;
        let medicine = self.load(medicine_id, true).await?;
        if medicine.deleted_at.is_none() {
            return Err(PharmacyError::MedicineNotFound);
        }

        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), Value::Null);
        fields.insert("deleted_by".to_string(), Value::Null);
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self
            .store
            .update_one(MEDICINES, medicine_id, fields)
            .await?
            .ok_or(PharmacyError::MedicineNotFound)?;

        info!("Medicine {} restored by {}", medicine_id, caller.id);
        Ok(decode(updated)?)
    }

    pub async fn hard_delete_medicine(&self, medicine_id: &str, caller: &CallerContext) -> Result<(), PharmacyError> {
        self.authorize(Action::HardDelete, caller)?;
        if !self.store.delete_one(MEDICINES, medicine_id).await? {
            return Err(PharmacyError::MedicineNotFound);
        }
        info!("Medicine {} permanently deleted by {}", medicine_id, caller.id);
        Ok(())
    }
}
