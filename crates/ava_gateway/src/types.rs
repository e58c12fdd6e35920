use ava_core::{BackupInfo, ErrorEvent, Memory, MemoryFilter, MemoryKind};
use ava_runtime::HealthRecord;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Body of `POST /message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndConversationResponse {
    /// `None` when there was nothing to summarize.
    pub summary: Option<String>,
}

/// Query string of `GET /memories`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoriesQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub kind: Option<MemoryKind>,
}

impl MemoriesQuery {
    pub const DEFAULT_LIMIT: usize = 20;

    pub fn into_filter(self) -> MemoryFilter {
        MemoryFilter {
            kind: self.kind,
            min_importance: None,
            limit: Some(self.limit.unwrap_or(Self::DEFAULT_LIMIT)),
        }
    }
}

// ============================================================================
// Admin
// ============================================================================

pub const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Clone, Serialize)]
pub struct AdminStatsResponse {
    pub memory_stats: Value,
    pub health_status: HealthRecord,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupRequest {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupResponse {
    pub status: String,
    pub backup_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub backup_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupsResponse {
    pub backups: Vec<BackupInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditMemoryResponse {
    pub status: String,
    pub memory_id: Uuid,
    /// Backup taken just before the edit.
    pub backup_id: String,
}

/// One row of the access statistics.
#[derive(Debug, Clone, Serialize)]
pub struct AccessEntry {
    pub id: Uuid,
    pub kind: MemoryKind,
    pub content: String,
    pub importance: f32,
    pub access_count: u32,
    pub last_accessed: Option<DateTime<Utc>>,
}

impl From<&Memory> for AccessEntry {
    fn from(m: &Memory) -> Self {
        Self {
            id: m.id,
            kind: m.kind,
            content: m.content.clone(),
            importance: m.importance,
            access_count: m.access_count,
            last_accessed: m.last_accessed,
        }
    }
}

/// Memory counts per importance band: low `< 0.3`, medium `< 0.7`, high.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportanceDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessStats {
    pub most_accessed: Vec<AccessEntry>,
    pub recent_access: Vec<AccessEntry>,
    pub importance_distribution: ImportanceDistribution,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessStatsResponse {
    pub access_stats: AccessStats,
    pub timestamp: DateTime<Utc>,
}

/// Query string of `GET /admin/errors`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ErrorsQuery {
    pub const DEFAULT_LIMIT: usize = 50;
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorsResponse {
    pub errors: Vec<ErrorEvent>,
    pub timestamp: DateTime<Utc>,
}

/// Error reply: the status code plus a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: detail.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: format!("{:#}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}
