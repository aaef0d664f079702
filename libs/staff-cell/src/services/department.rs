use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{
    decode, decode_all, fields_of, to_document, AppState, DocumentStore, Filter, FindOptions, SortOrder,
};
use shared_models::access::{AccessPolicy, Action, Resource};
use shared_models::auth::CallerContext;
use shared_utils::validation::require_text;

use crate::models::{CreateDepartmentRequest, Department, StaffError, UpdateDepartmentRequest, DEPARTMENTS};

pub struct DepartmentService {
    store: Arc<dyn DocumentStore>,
    policy: AccessPolicy,
}

impl DepartmentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            policy: AccessPolicy::new(state.config.scheduling.cancellation_window_hours),
        }
    }

    fn authorize(&self, action: Action, caller: &CallerContext) -> Result<(), StaffError> {
        self.policy
            .check(action, &Resource::Department, caller, Utc::now())
            .map_err(|denied| {
                warn!("Department {} denied for {}: {}", action, caller.id, denied);
                StaffError::from(denied)
            })
    }

    async fn ensure_unique_name(&self, name: &str, except_id: Option<&str>) -> Result<(), StaffError> {
        let existing = self
            .store
            .find(DEPARTMENTS, &Filter::new().live(), &FindOptions::new())
            .await?;

        let taken = existing.iter().any(|doc| {
            let same_name = doc
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.eq_ignore_ascii_case(name));
            let same_doc = except_id.is_some_and(|id| doc.get("id").and_then(Value::as_str) == Some(id));
            same_name && !same_doc
        });

        if taken {
            return Err(StaffError::DepartmentExists { name: name.to_string() });
        }
        Ok(())
    }

    async fn load(&self, department_id: &str, include_deleted: bool) -> Result<Department, StaffError> {
        let mut filter = Filter::by_id(department_id);
        if !include_deleted {
            filter = filter.live();
        }
        let document = self
            .store
            .find_one(DEPARTMENTS, &filter)
            .await?
            .ok_or(StaffError::DepartmentNotFound)?;
        Ok(decode(document)?)
    }

    pub async fn create_department(
        &self,
        request: CreateDepartmentRequest,
        caller: &CallerContext,
    ) -> Result<Department, StaffError> {
        self.authorize(Action::Create, caller)?;

        let name = require_text("name", &request.name).map_err(StaffError::ValidationFailed)?;
        debug!("Creating department: {}", name);
        self.ensure_unique_name(&name, None).await?;

        let now = Utc::now();
        let department = Department {
            id: Uuid::new_v4().to_string(),
            name,
            description: request.description,
            head_id: request.head_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        self.store.insert_one(DEPARTMENTS, to_document(&department)?).await?;
        info!("Department {} created successfully", department.id);
        Ok(department)
    }

    pub async fn get_department(&self, department_id: &str) -> Result<Department, StaffError> {
        debug!("Fetching department: {}", department_id);
        self.load(department_id, false).await
    }

    pub async fn list_departments(&self) -> Result<Vec<Department>, StaffError> {
        debug!("Listing departments");
        let options = FindOptions::new().sort_by("name", SortOrder::Asc);
        let documents = self.store.find(DEPARTMENTS, &Filter::new().live(), &options).await?;
        Ok(decode_all(documents)?)
    }

    pub async fn update_department(
        &self,
        department_id: &str,
        request: UpdateDepartmentRequest,
        caller: &CallerContext,
    ) -> Result<Department, StaffError> {
        self.authorize(Action::Update, caller)?;
        self.load(department_id, false).await?;

        if let Some(name) = &request.name {
            let name = require_text("name", name).map_err(StaffError::ValidationFailed)?;
            self.ensure_unique_name(&name, Some(department_id)).await?;
        }

        let mut fields = fields_of(&request)?;
        fields.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));

        let updated = self
            .store
            .update_one(DEPARTMENTS, department_id, fields)
            .await?
            .ok_or(StaffError::DepartmentNotFound)?;

        info!("Department {} updated successfully", department_id);
        Ok(decode(updated)?)
    }

    pub async fn soft_delete_department(
        &self,
        department_id: &str,
        caller: &CallerContext,
    ) -> Result<Department, StaffError> {
        self.authorize(Action::Cancel, caller)?;
        self.load(department_id, false).await?;

        let now = Utc::now().to_rfc3339();
        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), Value::String(now.clone()));
        fields.insert("updated_at".to_string(), Value::String(now));

        let updated = self
            .store
            .update_one(DEPARTMENTS, department_id, fields)
            .await?
            .ok_or(StaffError::DepartmentNotFound)?;

        info!("Department {} soft deleted by {}", department_id, caller.id);
        Ok(decode(updated)?)
    }

    pub async fn restore_department(
        &self,
        department_id: &str,
        caller: &CallerContext,
    ) -> Result<Department, StaffError> {
        self.authorize(Action::Restore, caller)?;
        let department = self.load(department_id, true).await?;
        if department.deleted_at.is_none() {
            return Err(StaffError::DepartmentNotFound);
        }
        self.ensure_unique_name(&department.name, Some(department_id)).await?;

        let mut fields = Map::new();
        fields.insert("deleted_at".to_string(), Value::Null);
        fields.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));

        let updated = self
            .store
            .update_one(DEPARTMENTS, department_id, fields)
            .await?
            .ok_or(StaffError::DepartmentNotFound)?;

        info!("Department {} restored", department_id);
        Ok(decode(updated)?)
    }

    pub async fn hard_delete_department(
        &self,
        department_id: &str,
        caller: &CallerContext,
    ) -> Result<(), StaffError> {
        self.authorize(Action::HardDelete, caller)?;
        if !self.store.delete_one(DEPARTMENTS, department_id).await? {
            return Err(StaffError::DepartmentNotFound);
        }
        info!("Department {} permanently deleted by {}", department_id, caller.id);
        Ok(())
    }
}
