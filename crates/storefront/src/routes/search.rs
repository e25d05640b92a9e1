//! Quick search route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// `GET /api/search?q=`
///
/// Matching catalog entries in catalog order. A blank query matches
/// nothing.
#[instrument(skip(state), fields(q = %query.q))]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<serde_json::Value> {
    let catalog = state.search().catalog();
    let results = catalog.search(&query.q);
    Json(json!({ "query": query.q, "results": results }))
}

/// `GET /api/search/resolve?q=`
///
/// Where pressing enter on the query navigates to.
pub async fn resolve(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>> {
    let catalog = state.search().catalog();
    let route = catalog
        .resolve(&query.q)
        .ok_or_else(|| AppError::NotFound(format!("search result for `{}`", query.q.trim())))?;
    Ok(Json(json!({ "route": route })))
}
