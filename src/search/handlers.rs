use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::auth::extractor::AuthenticatedUser;
use crate::error::AppResult;
use crate::search::query::{search, SearchParams, SearchRequest, SearchResponse};
use crate::AppState;

pub async fn search_entries(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<SearchResponse>> {
    let owner_id = claims.owner_id()?;
    let request = SearchRequest::from_params(&params)?;

    let response = search(&state.db, owner_id, &request).await?;

    tracing::info!(
        user_id = %owner_id,
        text    = request.text.is_some(),
        total   = response.total,
        limit   = response.limit,
        offset  = response.offset,
        "Search served"
    );

    Ok(Json(response))
}
