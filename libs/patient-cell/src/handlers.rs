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
    CreatePatientRequest, CreateTreatmentRequest, PatientSearchQuery, TreatmentQuery, UpdatePatientRequest,
    UpdateTreatmentRequest, UpdateTreatmentStatusRequest,
};
use crate::services::{PatientService, TreatmentService};

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    let patient = service.create_patient(request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "message": "Patient created successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    let patient = service.get_patient(&patient_id, &caller).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(patient_id): Path<String>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    let patient = service.update_patient(&patient_id, request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "message": "Patient updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    let patients = service.search_patients(query, &caller).await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn list_deleted_patients(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    let patients = service.list_deleted_patients(query, &caller).await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    let patient = service.soft_delete_patient(&patient_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "message": "Patient deleted"
    })))
}

#[axum::debug_handler]
pub async fn restore_patient(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    let patient = service.restore_patient(&patient_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "message": "Patient restored"
    })))
}

#[axum::debug_handler]
pub async fn purge_patient(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    service.hard_delete_patient(&patient_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Patient permanently deleted"
    })))
}

// ==============================================================================
// TREATMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_treatment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(patient_id): Path<String>,
    Json(request): Json<CreateTreatmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentService::new(&state);
    let treatment = service.create_treatment(&patient_id, request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "treatment": treatment,
        "message": "Treatment recorded successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_patient_treatments(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(patient_id): Path<String>,
    Query(query): Query<TreatmentQuery>,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentService::new(&state);
    let treatments = service.list_for_patient(&patient_id, query, &caller).await?;

    Ok(Json(json!({
        "treatments": treatments,
        "total": treatments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_treatment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(treatment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentService::new(&state);
    let treatment = service.get_treatment(&treatment_id, &caller).await?;

    Ok(Json(json!(treatment)))
}

#[axum::debug_handler]
pub async fn update_treatment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(treatment_id): Path<String>,
    Json(request): Json<UpdateTreatmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentService::new(&state);
    let treatment = service.update_treatment(&treatment_id, request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "treatment": treatment,
        "message": "Treatment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_treatment_status(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(treatment_id): Path<String>,
    Json(request): Json<UpdateTreatmentStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentService::new(&state);
    let treatment = service.update_status(&treatment_id, request.status, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "treatment": treatment,
        "message": format!("Treatment is now {}", treatment.status)
    })))
}

#[axum::debug_handler]
pub async fn delete_treatment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(treatment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentService::new(&state);
    let treatment = service.soft_delete_treatment(&treatment_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "treatment": treatment,
        "message": "Treatment deleted"
    })))
}

#[axum::debug_handler]
pub async fn restore_treatment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(treatment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentService::new(&state);
    let treatment = service.restore_treatment(&treatment_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "treatment": treatment,
        "message": "Treatment restored"
    })))
}

#[axum::debug_handler]
pub async fn purge_treatment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(treatment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentService::new(&state);
    service.hard_delete_treatment(&treatment_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Treatment permanently deleted"
    })))
}
