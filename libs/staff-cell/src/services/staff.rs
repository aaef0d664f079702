use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{
    decode, decode_all, fields_of, to_document, AppState, Condition, DocumentStore, Filter, FindOptions,
    SortOrder, StoreError,
};
use shared_models::access::{AccessPolicy, Action, Resource};
use shared_models::auth::CallerContext;
use shared_utils::validation::{require_text, validate_email, validate_phone};

use crate::models::{
    CreateStaffRequest, StaffError, StaffMember, StaffRole, StaffSearchQuery, UpdateStaffRequest, DEPARTMENTS, STAFF,
};

pub struct StaffService {
    store: Arc<dyn DocumentStore>,
    policy: AccessPolicy,
}

impl StaffService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            policy: AccessPolicy::new(state.config.scheduling.cancellation_window_hours),
        }
    }

    fn authorize(&self, action: Action, staff_id: &str, caller: &CallerContext) -> Result<(), StaffError> {
        self.policy
            .check(action, &Resource::StaffMember { staff_id }, caller, Utc::now())
            .map_err(|denied| {
                warn!("Staff {} denied for {}: {}", action, caller.id, denied);
                StaffError::from(denied)
            })
    }

    async fn ensure_department(&self, department_id: &str) -> Result<(), StaffError> {
        let filter = Filter::by_id(department_id).live();
        if self.store.find_one(DEPARTMENTS, &filter).await?.is_none() {
            return Err(StaffError::DepartmentNotFound);
        }
        Ok(())
    }

    async fn load(&self, staff_id: &str, include_deleted: bool) -> Result<StaffMember, StaffError> {
        let mut filter = Filter::by_id(staff_id);
        if !include_deleted {
            filter = filter.live();
        }
        let document = self.store.find_one(STAFF, &filter).await?.ok_or(StaffError::NotFound)?;
        Ok(decode(document)?)
    }

    pub async fn create_staff(
        &self,
        request: CreateStaffRequest,
        caller: &CallerContext,
    ) -> Result<StaffMember, StaffError> {
        self.authorize(Action::Create, "", caller)?;
        debug!("Creating staff member for: {}", request.email);

        let email = request.email.trim().to_lowercase();
        if !validate_email(&email) {
            return Err(StaffError::ValidationFailed(format!("Invalid email address: {}", request.email)));
        }
        if let Some(phone) = &request.phone {
            if !validate_phone(phone) {
                return Err(StaffError::ValidationFailed(format!("Invalid phone number: {}", phone)));
            }
        }
        let first_name = require_text("first_name", &request.first_name).map_err(StaffError::ValidationFailed)?;
        let last_name = require_text("last_name", &request.last_name).map_err(StaffError::ValidationFailed)?;

        let existing = self.store.find_one(STAFF, &Filter::new().eq("email", &email).live()).await?;
        if existing.is_some() {
            return Err(StaffError::EmailAlreadyExists { email });
        }

        if let Some(department_id) = &request.department_id {
            self.ensure_department(department_id).await?;
        }

        let now = Utc::now();
        let member = StaffMember {
            id: request
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            first_name,
            last_name,
            email,
            phone: request.phone,
            role: request.role,
            department_id: request.department_id,
            specialization: request.specialization,
            license_number: request.license_number,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        self.store
            .insert_one(STAFF, to_document(&member)?)
            .await
            .map_err(|e| match e {
                StoreError::DuplicateId(id) => StaffError::IdInUse(id),
                other => StaffError::Database(other),
            })?;
        info!("Staff member {} ({}) created successfully", member.id, member.role);
        Ok(member)
    }

    pub async fn get_staff(&self, staff_id: &str) -> Result<StaffMember, StaffError> {
        debug!("Fetching staff member: {}", staff_id);
        self.load(staff_id, false).await
    }

    pub async fn list_staff(&self, query: StaffSearchQuery) -> Result<Vec<StaffMember>, StaffError> {
        debug!("Listing staff members with filters: {:?}", query);

        let mut filter = Filter::new().live();
        if let Some(role) = query.role {
            filter = filter.eq("role", role);
        }
        if let Some(department_id) = &query.department_id {
            filter = filter.eq("department_id", department_id);
        }
        if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            filter = filter.any_of(vec![
                Condition::Contains("first_name".to_string(), name.to_string()),
                Condition::Contains("last_name".to_string(), name.to_string()),
            ]);
        }

        let options = FindOptions::new()
            .sort_by("last_name", SortOrder::Asc)
            .sort_by("first_name", SortOrder::Asc)
            .page(query.limit, query.offset);

        let documents = self.store.find(STAFF, &filter, &options).await?;
        Ok(decode_all(documents)?)
    }

    /// Department of a doctor, if the doctor has a live staff record with one.
    pub async fn department_of(&self, staff_id: &str) -> Result<Option<String>, StaffError> {
        match self.load(staff_id, false).await {
            Ok(member) => Ok(member.department_id),
            Err(StaffError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn count_by_role(&self, role: Option<StaffRole>) -> Result<u64, StaffError> {
        let mut filter = Filter::new().live();
        if let Some(role) = role {
            filter = filter.eq("role", role);
        }
        Ok(self.store.count(STAFF, &filter).await?)
    }

    pub async fn update_staff(
        &self,
        staff_id: &str,
        request: UpdateStaffRequest,
        caller: &CallerContext,
    ) -> Result<StaffMember, StaffError> {
        self.authorize(Action::Update, staff_id, caller)?;
        self.load(staff_id, false).await?;

        if let Some(phone) = &request.phone {
            if !validate_phone(phone) {
                return Err(StaffError::ValidationFailed(format!("Invalid phone number: {}", phone)));
            }
        }
        if let Some(department_id) = &request.department_id {
            self.ensure_department(department_id).await?;
        }

        let mut fields = fields_of(&request)?;
        fields.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));

        let updated = self
            .store
            .update_one(STAFF, staff_id, fields)
            .await?
            .ok_or(StaffError::NotFound)?;

        info!("Staff member {} updated successfully", staff_id);
        Ok(decode(updated)?)
    }

    pub async fn soft_delete_staff(&self, staff_id: &str, caller: &CallerContext) -> Result<StaffMember, StaffError> {
        self.authorize(Action::Cancel, staff_id, caller)?;
        self.load(staff_id, false).await?;

        let now = Utc::now().to_rfc3339();
        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), Value::String(now.clone()));
        fields.insert("updated_at".to_string(), Value::String(now));

        let updated = self
            .store
            .update_one(STAFF, staff_id, fields)
            .await?
            .ok_or(StaffError::NotFound)?;

        info!("Staff member {} soft deleted by {}", staff_id, caller.id);
        Ok(decode(updated)?)
    }

    pub async fn restore_staff(&self, staff_id: &str, caller: &CallerContext) -> Result<StaffMember, StaffError> {
        self.authorize(Action::Restore, staff_id, caller)?;
        let member = self.load(staff_id, true).await?;
        if member.deleted_at.is_none() {
            return Err(StaffError::NotFound);
        }

        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), Value::Null);
        fields.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));

        let updated = self
            .store
            .update_one(STAFF, staff_id, fields)
            .await?
            .ok_or(StaffError::NotFound)?;

        info!("Staff member {} restored", staff_id);
        Ok(decode(updated)?)
    }

    pub async fn hard_delete_staff(&self, staff_id: &str, caller: &CallerContext) -> Result<(), StaffError> {
        self.authorize(Action::HardDelete, staff_id, caller)?;
        if !self.store.delete_one(STAFF, staff_id).await? {
            return Err(StaffError::NotFound);
        }
        info!("Staff member {} permanently deleted by {}", staff_id, caller.id);
        Ok(())
    }
}
