use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_patient_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(search_patients).post(create_patient))
        .route("/deleted", get(list_deleted_patients))
        .route("/{id}", get(get_patient).put(update_patient).delete(delete_patient))
        .route("/{id}/restore", post(restore_patient))
        .route("/{id}/permanent", delete(purge_patient))
        .route("/{id}/treatments", get(list_patient_treatments).post(create_treatment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

pub fn create_treatment_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{id}", get(get_treatment).put(update_treatment).delete(delete_treatment))
        .route("/{id}/status", patch(update_treatment_status))
        .route("/{id}/restore", post(restore_treatment))
        .route("/{id}/permanent", delete(purge_treatment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
