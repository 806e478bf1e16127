use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::Item;
use crate::search::reindex::gather_metrics;
use crate::search::{SearchRequest, SearchResponse};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        reindex_running: state
            .search
            .reindex_snapshot()
            .map_or(false, |job| job.is_active()),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub reindex_running: bool,
}

/// Prometheus scrape endpoint
pub async fn metrics() -> String {
    gather_metrics()
}

/// Page through indexed identifiers
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    params.validate()?;

    let request = SearchRequest {
        rows: params.rows,
        set: params.set,
        format: params.format,
        from_date: params.from_date,
        until_date: params.until_date,
        cursor_token: params.cursor_token,
    };

    Ok(Json(state.search.search(&request).await?))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[validate(range(min = 1, max = 1000))]
    pub rows: usize,
    #[validate(length(min = 1))]
    pub set: Option<String>,
    #[validate(length(min = 1))]
    pub format: String,
    pub from_date: Option<DateTime<Utc>>,
    pub until_date: Option<DateTime<Utc>>,
    pub cursor_token: Option<String>,
}

/// Store an item and index it
pub async fn put_item(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(request): Json<PutItemRequest>,
) -> Result<Json<Item>> {
    let item = Item {
        identifier,
        datestamp: request.datestamp.unwrap_or_else(Utc::now),
        deleted: request.deleted,
        sets: request.sets,
        formats: request.formats,
    };
    item.validate()?;

    state.store.save_item(&item).await?;
    state.search.upsert_document(&item).await?;

    Ok(Json(item))
}

#[derive(Debug, Deserialize)]
pub struct PutItemRequest {
    pub datestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub sets: BTreeSet<String>,
    #[serde(default)]
    pub formats: BTreeSet<String>,
}

/// Remove an item from the store and the index
pub async fn delete_item(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<StatusCode> {
    let item = state
        .store
        .get_item(&identifier)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {} not found", identifier)))?;

    state.store.delete_item(&identifier).await?;
    match state.search.delete_document(&item).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::warn!(identifier = %identifier, "Deleted item was not indexed");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Trigger a full rebuild
pub async fn reindex_all(State(state): State<AppState>) -> Result<(StatusCode, Json<ReindexResponse>)> {
    let accepted = state.search.reindex_all();
    let status = if accepted {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ReindexResponse { accepted })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReindexResponse {
    pub accepted: bool,
}

/// Cancel the running rebuild
pub async fn stop_reindex(
    State(state): State<AppState>,
    Query(params): Query<StopParams>,
) -> Result<Json<StopResponse>> {
    params.validate()?;

    let defaults = state.search.reindex_config();
    let attempts = params.attempts.unwrap_or(defaults.stop_attempts);
    let delay_ms = params.delay_ms.unwrap_or(defaults.stop_delay_ms);

    let stopped = state.search.stop_reindex_all(attempts, delay_ms).await;
    Ok(Json(StopResponse { stopped }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct StopParams {
    #[validate(range(max = 100))]
    pub attempts: Option<u32>,
    #[validate(range(max = 60000))]
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub stopped: bool,
}

/// Verbose plain-text rebuild report
pub async fn reindex_status(State(state): State<AppState>) -> String {
    state.search.reindex_status()
}
