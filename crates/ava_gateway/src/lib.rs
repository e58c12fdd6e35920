pub mod admin;
pub mod server;
pub mod types;

pub use server::GatewayServer;
pub use types::{
    AccessStats, AdminStatsResponse, ApiError, BackupRequest, EndConversationResponse,
    ErrorsQuery, MemoriesQuery, MessageRequest, MessageResponse, RestoreRequest,
};
