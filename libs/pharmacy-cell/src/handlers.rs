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
    AdjustStockRequest, CreateMedicineRequest, CreatePrescriptionRequest, MedicineQuery, PrescriptionQuery,
    UpdateMedicineRequest, UpdatePrescriptionStatusRequest,
};
use crate::services::{MedicineService, PrescriptionService};

// ==============================================================================
// MEDICINE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_medicine(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Json(request): Json<CreateMedicineRequest>,
) -> Result<Json<Value>, AppError> {
    let service = MedicineService::new(&state);
    let medicine = service.create_medicine(request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "medicine": medicine,
        "message": "Medicine added successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_medicines(
    State(state): State<Arc<AppState>>,
    _caller: CallerContext,
    Query(query): Query<MedicineQuery>,
) -> Result<Json<Value>, AppError> {
    let service = MedicineService::new(&state);
    let medicines = service.list_medicines(query).await?;

    Ok(Json(json!({
        "medicines": medicines,
        "total": medicines.len()
    })))
}

#[axum::debug_handler]
pub async fn get_medicine(
    State(state): State<Arc<AppState>>,
    _caller: CallerContext,
    Path(medicine_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = MedicineService::new(&state);
    let medicine = service.get_medicine(&medicine_id).await?;

    Ok(Json(json!(medicine)))
}

#[axum::debug_handler]
pub async fn update_medicine(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(medicine_id): Path<String>,
    Json(request): Json<UpdateMedicineRequest>,
) -> Result<Json<Value>, AppError> {
    let service = MedicineService::new(&state);
    let medicine = service.update_medicine(&medicine_id, request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "medicine": medicine,
        "message": "Medicine updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(medicine_id): Path<String>,
    Json(request): Json<AdjustStockRequest>,
) -> Result<Json<Value>, AppError> {
    let service = MedicineService::new(&state);
    let medicine = service.adjust_stock(&medicine_id, request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "medicine": medicine,
        "low_stock": medicine.is_low_stock(),
        "message": format!("Stock is now {}", medicine.stock_quantity)
    })))
}

#[axum::debug_handler]
pub async fn delete_medicine(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(medicine_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = MedicineService::new(&state);
    let medicine = service.soft_delete_medicine(&medicine_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "medicine": medicine,
        "message": "Medicine deleted"
    })))
}

#[axum::debug_handler]
pub async fn restore_medicine(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(medicine_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = MedicineService::new(&state);
    let medicine = service.restore_medicine(&medicine_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "medicine": medicine,
        "message": "Medicine restored"
    })))
}

#[axum::debug_handler]
pub async fn purge_medicine(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(medicine_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = MedicineService::new(&state);
    service.hard_delete_medicine(&medicine_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Medicine permanently deleted"
    })))
}

// ==============================================================================
// PRESCRIPTION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_prescription(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&state);
    let prescription = service.create_prescription(request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription,
        "message": "Prescription issued successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Query(query): Query<PrescriptionQuery>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&state);
    let prescriptions = service.list_prescriptions(query, &caller).await?;

    Ok(Json(json!({
        "prescriptions": prescriptions,
        "total": prescriptions.len()
    })))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(prescription_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&state);
    let prescription = service.get_prescription(&prescription_id, &caller).await?;

    Ok(Json(json!(prescription)))
}

#[axum::debug_handler]
pub async fn update_prescription_status(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(prescription_id): Path<String>,
    Json(request): Json<UpdatePrescriptionStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&state);
    let prescription = service.update_status(&prescription_id, request.status, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription,
        "message": format!("Prescription is now {}", prescription.status)
    })))
}

#[axum::debug_handler]
pub async fn delete_prescription(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(prescription_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&state);
    let prescription = service.soft_delete_prescription(&prescription_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription,
        "message": "Prescription deleted"
    })))
}

#[axum::debug_handler]
pub async fn restore_prescription(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(prescription_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&state);
    let prescription = service.restore_prescription(&prescription_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription,
        "message": "Prescription restored"
    })))
}

#[axum::debug_handler]
pub async fn purge_prescription(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(prescription_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&state);
    service.hard_delete_prescription(&prescription_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Prescription permanently deleted"
    })))
}
