use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_database::AppState;
use shared_models::auth::CallerContext;
use shared_models::error::AppError;

use crate::models::{
    CreateDepartmentRequest, CreateStaffRequest, StaffSearchQuery, UpdateDepartmentRequest, UpdateStaffRequest,
};
use crate::services::{DepartmentService, StaffService};

// ==============================================================================
// DEPARTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_department(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Json(request): Json<CreateDepartmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = DepartmentService::new(&state);
    let department = service.create_department(request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "department": department,
        "message": "Department created successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_departments(
    State(state): State<Arc<AppState>>,
    _caller: CallerContext,
) -> Result<Json<Value>, AppError> {
    let service = DepartmentService::new(&state);
    let departments = service.list_departments().await?;

    Ok(Json(json!({
        "departments": departments,
        "total": departments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_department(
    State(state): State<Arc<AppState>>,
    _caller: CallerContext,
    Path(department_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = DepartmentService::new(&state);
    let department = service.get_department(&department_id).await?;

    Ok(Json(json!(department)))
}

#[axum::debug_handler]
pub async fn update_department(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(department_id): Path<String>,
    Json(request): Json<UpdateDepartmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = DepartmentService::new(&state);
    let department = service.update_department(&department_id, request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "department": department,
        "message": "Department updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn delete_department(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(department_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = DepartmentService::new(&state);
    let department = service.soft_delete_department(&department_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "department": department,
        "message": "Department deleted"
    })))
}

#[axum::debug_handler]
pub async fn restore_department(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(department_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = DepartmentService::new(&state);
    let department = service.restore_department(&department_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "department": department,
        "message": "Department restored"
    })))
}

#[axum::debug_handler]
pub async fn purge_department(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(department_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = DepartmentService::new(&state);
    service.hard_delete_department(&department_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Department permanently deleted"
    })))
}

// ==============================================================================
// STAFF HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_staff(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Json(request): Json<CreateStaffRequest>,
) -> Result<Json<Value>, AppError> {
    let service = StaffService::new(&state);
    let member = service.create_staff(request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "staff": member,
        "message": "Staff member created successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_staff(
    State(state): State<Arc<AppState>>,
    _caller: CallerContext,
    Query(query): Query<StaffSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = StaffService::new(&state);
    let staff = service.list_staff(query).await?;

    Ok(Json(json!({
        "staff": staff,
        "total": staff.len()
    })))
}

#[axum::debug_handler]
pub async fn get_staff(
    State(state): State<Arc<AppState>>,
    _caller: CallerContext,
    Path(staff_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = StaffService::new(&state);
    let member = service.get_staff(&staff_id).await?;

    Ok(Json(json!(member)))
}

#[axum::debug_handler]
pub async fn update_staff(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(staff_id): Path<String>,
    Json(request): Json<UpdateStaffRequest>,
) -> Result<Json<Value>, AppError> {
    let service = StaffService::new(&state);
    let member = service.update_staff(&staff_id, request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "staff": member,
        "message": "Staff member updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn delete_staff(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(staff_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = StaffService::new(&state);
    let member = service.soft_delete_staff(&staff_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "staff": member,
        "message": "Staff member deleted"
    })))
}

#[axum::debug_handler]
pub async fn restore_staff(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(staff_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = StaffService::new(&state);
    let member = service.restore_staff(&staff_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "staff": member,
        "message": "Staff member restored"
    })))
}

#[axum::debug_handler]
pub async fn purge_staff(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(staff_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = StaffService::new(&state);
    service.hard_delete_staff(&staff_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Staff member permanently deleted"
    })))
}
