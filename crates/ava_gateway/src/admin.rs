//! Operator routes under `/admin`: memory statistics, backups, manual edits
//! and the recent error log.

use crate::server::AppState;
use crate::types::{
    AccessEntry, AccessStats, AccessStatsResponse, AdminStatsResponse, ApiError, BackupRequest,
    BackupResponse, BackupsResponse, EditMemoryResponse, ErrorsQuery, ErrorsResponse,
    ImportanceDistribution, RestoreRequest, StatusResponse, STATUS_SUCCESS,
};
use ava_core::{Memory, MemoryEdit};
use ava_runtime::health::memory_summary;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

const ACCESS_STATS_TOP: usize = 10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(admin_stats))
        .route("/admin/backup", post(create_backup))
        .route("/admin/restore", post(restore_backup))
        .route("/admin/backups", get(list_backups))
        .route("/admin/memory/edit", post(edit_memory))
        .route("/admin/memory/access-stats", get(access_stats))
        .route("/admin/errors", get(recent_errors))
}

fn internal(what: &str, e: anyhow::Error) -> ApiError {
    tracing::error!("{}: {:#}", what, e);
    ApiError::internal(e)
}

async fn all_memories(orchestrator: &AppState) -> Result<Vec<Memory>, ApiError> {
    orchestrator
        .subsystems()
        .memory
        .get_memories(None)
        .await
        .map_err(|e| internal("Memory listing failed", e))
}

async fn admin_stats(
    State(orchestrator): State<AppState>,
) -> Result<Json<AdminStatsResponse>, ApiError> {
    let memories = all_memories(&orchestrator).await?;
    Ok(Json(AdminStatsResponse {
        memory_stats: memory_summary(&memories),
        health_status: orchestrator.health_record().await,
        timestamp: Utc::now(),
    }))
}

async fn create_backup(
    State(orchestrator): State<AppState>,
    Json(req): Json<BackupRequest>,
) -> Result<Json<BackupResponse>, ApiError> {
    let backup = orchestrator
        .subsystems()
        .admin
        .create_backup(req.description)
        .await
        .map_err(|e| internal("Backup failed", e))?;
    Ok(Json(BackupResponse {
        status: STATUS_SUCCESS.into(),
        backup_id: backup.id,
    }))
}

async fn restore_backup(
    State(orchestrator): State<AppState>,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let restored = orchestrator
        .subsystems()
        .admin
        .restore_backup(&req.backup_id)
        .await
        .map_err(|e| internal("Restore failed", e))?;
    if !restored {
        return Err(ApiError::not_found(format!("backup {} not found", req.backup_id)));
    }
    Ok(Json(StatusResponse {
        status: STATUS_SUCCESS.into(),
    }))
}

async fn list_backups(
    State(orchestrator): State<AppState>,
) -> Result<Json<BackupsResponse>, ApiError> {
    let backups = orchestrator
        .subsystems()
        .admin
        .list_backups()
        .await
        .map_err(|e| internal("Backup listing failed", e))?;
    Ok(Json(BackupsResponse { backups }))
}

/// POST /admin/memory/edit. A backup is taken first so the edit can be
/// undone with `/admin/restore`.
async fn edit_memory(
    State(orchestrator): State<AppState>,
    Json(edit): Json<MemoryEdit>,
) -> Result<Json<EditMemoryResponse>, ApiError> {
    if let Some(importance) = edit.importance {
        if !(0.0..=1.0).contains(&importance) {
            return Err(ApiError::bad_request("importance must be between 0 and 1"));
        }
    }
    let memory_id = edit.memory_id;
    let exists = all_memories(&orchestrator)
        .await?
        .iter()
        .any(|m| m.id == memory_id);
    if !exists {
        return Err(ApiError::not_found(format!("memory {} not found", memory_id)));
    }

    let admin = &orchestrator.subsystems().admin;
    let backup = admin
        .create_backup(Some(format!("Before editing memory {}", memory_id)))
        .await
        .map_err(|e| internal("Backup before edit failed", e))?;
    match admin
        .edit_memory(edit)
        .await
        .map_err(|e| internal("Memory edit failed", e))?
    {
        Some(_) => Ok(Json(EditMemoryResponse {
            status: STATUS_SUCCESS.into(),
            memory_id,
            backup_id: backup.id,
        })),
        None => Err(ApiError::not_found(format!("memory {} not found", memory_id))),
    }
}

fn compute_access_stats(memories: &[Memory]) -> AccessStats {
    let mut accessed: Vec<&Memory> = memories.iter().filter(|m| m.access_count > 0).collect();
    accessed.sort_by(|a, b| b.access_count.cmp(&a.access_count));
    let most_accessed = accessed
        .iter()
        .take(ACCESS_STATS_TOP)
        .map(|m| AccessEntry::from(*m))
        .collect();

    let mut recent: Vec<&Memory> = memories.iter().filter(|m| m.last_accessed.is_some()).collect();
    recent.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
    let recent_access = recent
        .iter()
        .take(ACCESS_STATS_TOP)
        .map(|m| AccessEntry::from(*m))
        .collect();

    let mut importance_distribution = ImportanceDistribution::default();
    for m in memories {
        match m.importance {
            i if i < 0.3 => importance_distribution.low += 1,
            i if i < 0.7 => importance_distribution.medium += 1,
            _ => importance_distribution.high += 1,
        }
    }

    AccessStats {
        most_accessed,
        recent_access,
        importance_distribution,
    }
}

async fn access_stats(
    State(orchestrator): State<AppState>,
) -> Result<Json<AccessStatsResponse>, ApiError> {
    let memories = all_memories(&orchestrator).await?;
    Ok(Json(AccessStatsResponse {
        access_stats: compute_access_stats(&memories),
        timestamp: Utc::now(),
    }))
}

async fn recent_errors(
    State(orchestrator): State<AppState>,
    Query(query): Query<ErrorsQuery>,
) -> Json<ErrorsResponse> {
    let limit = query.limit.unwrap_or(ErrorsQuery::DEFAULT_LIMIT);
    Json(ErrorsResponse {
        errors: orchestrator.error_log().recent(limit),
        timestamp: Utc::now(),
    })
}
