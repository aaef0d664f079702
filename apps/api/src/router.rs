use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use dashboard_cell::router::dashboard_routes;
use patient_cell::router::{create_patient_router, create_treatment_router};
use pharmacy_cell::router::{medicine_routes, prescription_routes};
use shared_database::AppState;
use staff_cell::router::{department_routes, staff_routes};

pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/patients", create_patient_router(state.clone()))
        .nest("/treatments", create_treatment_router(state.clone()))
        .nest("/medicines", medicine_routes(state.clone()))
        .nest("/prescriptions", prescription_routes(state.clone()))
        .nest("/departments", department_routes(state.clone()))
        .nest("/staff", staff_routes(state.clone()))
        .nest("/dashboard", dashboard_routes(state));

    Router::new()
        .route("/", get(|| async { "Hospital API is running!" }))
        .nest("/api", api)
}
