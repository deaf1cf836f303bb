//! Search and model-listing endpoints

use axum::{extract::State, Json};
use serde_json::json;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::query::SearchQuery;
use crate::types::response::QueryResponse;

/// POST /search - answer a question over the indexed corpus
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchQuery>,
) -> Result<Json<QueryResponse>> {
    let response = state.query().search(&request).await?;
    Ok(Json(response))
}

/// GET /available-models - models a request may select
pub async fn available_models(State(state): State<AppState>) -> Json<serde_json::Value> {
    let models: Vec<serde_json::Value> = state
        .query()
        .available_models()
        .iter()
        .map(|m| json!({ "id": m }))
        .collect();
    Json(json!({ "models": models }))
}
