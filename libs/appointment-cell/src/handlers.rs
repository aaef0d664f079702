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
    AppointmentQuery, AvailabilityQuery, CreateAppointmentRequest, UpcomingQuery, UpdateAppointmentRequest,
    UpdateStatusRequest,
};
use crate::services::AppointmentService;

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);
    let appointment = service.create_appointment(request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);
    let availability = service.check_availability(query, &caller).await?;

    Ok(Json(json!(availability)))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);
    let appointments = service.list_appointments(query, &caller).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_deleted_appointments(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);
    let appointments = service.list_deleted_appointments(query, &caller).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);
    let appointments = service.upcoming_appointments(query, &caller).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(patient_id): Path<String>,
    Query(mut query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    query.patient_id = Some(patient_id);
    let service = AppointmentService::new(&state);
    let appointments = service.list_appointments(query, &caller).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(doctor_id): Path<String>,
    Query(mut query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    query.doctor_id = Some(doctor_id);
    let service = AppointmentService::new(&state);
    let appointments = service.list_appointments(query, &caller).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

// ==============================================================================
// SINGLE APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);
    let appointment = service.get_appointment(&appointment_id, &caller).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(appointment_id): Path<String>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);
    let appointment = service.update_appointment(&appointment_id, request, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(appointment_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);
    let appointment = service.update_status(&appointment_id, request.status, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": format!("Appointment is now {}", appointment.status)
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);
    let appointment = service.soft_delete_appointment(&appointment_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn restore_appointment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);
    let appointment = service.restore_appointment(&appointment_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment restored"
    })))
}

#[axum::debug_handler]
pub async fn purge_appointment(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);
    service.hard_delete_appointment(&appointment_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment permanently deleted"
    })))
}
