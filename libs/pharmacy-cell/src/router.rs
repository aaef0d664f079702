use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn medicine_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_medicines).post(handlers::create_medicine))
        .route(
            "/{medicine_id}",
            get(handlers::get_medicine)
                .put(handlers::update_medicine)
                .delete(handlers::delete_medicine),
        )
        .route("/{medicine_id}/stock", patch(handlers::adjust_stock))
        .route("/{medicine_id}/restore", post(handlers::restore_medicine))
        .route("/{medicine_id}/permanent", delete(handlers::purge_medicine))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

pub fn prescription_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_prescriptions).post(handlers::create_prescription))
        .route(
            "/{prescription_id}",
            get(handlers::get_prescription).delete(handlers::delete_prescription),
        )
        .route("/{prescription_id}/status", patch(handlers::update_prescription_status))
        .route("/{prescription_id}/restore", post(handlers::restore_prescription))
        .route("/{prescription_id}/permanent", delete(handlers::purge_prescription))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
