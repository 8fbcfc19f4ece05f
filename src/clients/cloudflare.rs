use crate::clients::{ApiError, MetricsClient};
use crate::models::{Resource, ResourceKind, TimeWindow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";

/// Standard Cloudflare v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    errors: Vec<EnvelopeMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeMessage {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListedResource {
    name: String,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequestTotals {
    requests: u64,
}

#[derive(Debug, Deserialize)]
struct PagesRequests {
    all: Option<RequestTotals>,
}

#[derive(Debug, Deserialize)]
struct WorkersRequests {
    sum: Option<RequestTotals>,
}

/// Cloudflare account analytics over the v4 REST API
#[derive(Debug, Clone)]
pub struct CloudflareClient {
    client: Client,
    base_url: String,
    account_id: String,
    api_token: String,
}

impl CloudflareClient {
    pub fn with_base_url(
        base_url: &str,
        account_id: &str,
        api_token: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}/accounts/{}/{}", self.base_url, self.account_id, path);
        debug!(%url, "Cloudflare request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), body));
        }

        let envelope: Envelope<T> = response.json().await?;
        if envelope.success == Some(false) {
            let message = envelope
                .errors
                .iter()
                .map(|e| match e.code {
                    Some(code) => format!("{} ({})", e.message, code),
                    None => e.message.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApiError::Api { message });
        }

        envelope.result.ok_or(ApiError::MissingField { field: "result" })
    }
}

#[async_trait]
impl MetricsClient for CloudflareClient {
    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<Resource>, ApiError> {
        let path = match kind {
            ResourceKind::PageProject => "pages/projects",
            ResourceKind::WorkerService => "workers/services",
        };

        let listed: Vec<ListedResource> = self.get(path, &[]).await?;
        Ok(listed
            .into_iter()
            .map(|r| Resource { name: r.name, id: r.id })
            .collect())
    }

    async fn fetch_count(
        &self,
        kind: ResourceKind,
        resource: &Resource,
        window: &TimeWindow,
    ) -> Result<u64, ApiError> {
        match kind {
            ResourceKind::PageProject => {
                let project_id = resource.id.as_deref().unwrap_or(&resource.name);
                let path = format!("analytics/pages/projects/{project_id}/requests");
                let query = [
                    ("since", window.start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ("until", window.end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ];
                let result: PagesRequests = self.get(&path, &query).await?;
                result
                    .all
                    .map(|totals| totals.requests)
                    .ok_or(ApiError::MissingField { field: "result.all.requests" })
            }
            ResourceKind::WorkerService => {
                let query = [
                    ("service", resource.name.clone()),
                    ("from", window.start.timestamp().to_string()),
                    ("to", window.end.timestamp().to_string()),
                ];
                let result: WorkersRequests = self.get("workers/analytics/requests", &query).await?;
                result
                    .sum
                    .map(|totals| totals.requests)
                    .ok_or(ApiError::MissingField { field: "result.sum.requests" })
            }
        }
    }
}
