// External API collaborators
pub mod cloudflare;
pub mod error;
pub mod telegram;

use crate::models::{Resource, ResourceKind, TimeWindow};
use async_trait::async_trait;
use std::path::Path;

pub use cloudflare::CloudflareClient;
pub use error::ApiError;
pub use telegram::TelegramSink;

/// Source of per-resource request counts
#[async_trait]
pub trait MetricsClient: Send + Sync {
    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<Resource>, ApiError>;

    async fn fetch_count(
        &self,
        kind: ResourceKind,
        resource: &Resource,
        window: &TimeWindow,
    ) -> Result<u64, ApiError>;
}

/// Chat channel the report is delivered to
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_text(&self, message: &str) -> Result<(), ApiError>;

    async fn send_image(&self, path: &Path, caption: &str) -> Result<(), ApiError>;
}
