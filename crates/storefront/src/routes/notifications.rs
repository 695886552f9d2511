//! Notification route handlers for the merchant dashboard.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use stablemart_core::NotificationId;

use crate::error::{AppError, Result};
use crate::notifications::{Notification, NotificationRepository};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountView {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedView {
    pub updated: u64,
}

/// `GET /notifications`
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let repo = NotificationRepository::new(state.pool());
    Ok(Json(repo.list(limit).await?))
}

/// `GET /notifications/unread-count`
#[instrument(skip(state))]
pub async fn unread_count(State(state): State<AppState>) -> Result<Json<UnreadCountView>> {
    let repo = NotificationRepository::new(state.pool());
    Ok(Json(UnreadCountView {
        unread: repo.unread_count().await?,
    }))
}

/// `POST /notifications/{id}/read`
#[instrument(skip(state))]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<Json<UpdatedView>> {
    let repo = NotificationRepository::new(state.pool());
    if repo.mark_read(id).await? {
        Ok(Json(UpdatedView { updated: 1 }))
    } else {
        Err(AppError::NotFound(format!("notification {id}")))
    }
}

/// `POST /notifications/read-all`
#[instrument(skip(state))]
pub async fn mark_all_read(State(state): State<AppState>) -> Result<Json<UpdatedView>> {
    let repo = NotificationRepository::new(state.pool());
    Ok(Json(UpdatedView {
        updated: repo.mark_all_read().await?,
    }))
}

/// `DELETE /notifications/{id}`
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<Json<UpdatedView>> {
    let repo = NotificationRepository::new(state.pool());
    if repo.delete(id).await? {
        Ok(Json(UpdatedView { updated: 1 }))
    } else {
        Err(AppError::NotFound(format!("notification {id}")))
    }
}
