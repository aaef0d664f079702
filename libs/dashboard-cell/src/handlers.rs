use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use shared_database::AppState;
use shared_models::auth::CallerContext;
use shared_models::error::AppError;

use crate::services::DashboardService;

#[axum::debug_handler]
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
) -> Result<Json<Value>, AppError> {
    let service = DashboardService::new(&state);
    let summary = service.summary(&caller).await?;

    Ok(Json(json!(summary)))
}
