use crate::clients::{ApiError, NotificationSink};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API delivery to a single chat
#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn with_base_url(
        base_url: &str,
        bot_token: &str,
        chat_id: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    async fn post_message(&self, message: &str, markdown: bool) -> Result<(), ApiError> {
        let mut form = vec![("chat_id", self.chat_id.as_str()), ("text", message)];
        if markdown {
            form.push(("parse_mode", "Markdown"));
        }

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .form(&form)
            .send()
            .await?;
        check_response(response).await
    }
}

/// Photos Telegram renders inline; anything else goes out as a document
fn upload_method(path: &Path) -> (&'static str, &'static str, &'static str) {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("png") => ("sendPhoto", "photo", "image/png"),
        Some("jpg") | Some("jpeg") => ("sendPhoto", "photo", "image/jpeg"),
        _ => ("sendDocument", "document", "application/octet-stream"),
    }
}

async fn check_response(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(status.as_u16(), body));
    }

    let parsed: TelegramResponse = response.json().await?;
    if !parsed.ok {
        return Err(ApiError::Api {
            message: parsed.description.unwrap_or_else(|| "ok=false".to_string()),
        });
    }
    Ok(())
}

fn is_markup_rejection(error: &ApiError) -> bool {
    matches!(error, ApiError::Status { status: 400, body } if body.contains("can't parse entities"))
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send_text(&self, message: &str) -> Result<(), ApiError> {
        match self.post_message(message, true).await {
            Err(e) if is_markup_rejection(&e) => {
                // Resource names with `_` or `*` break legacy Markdown
                warn!("Telegram rejected Markdown, resending as plain text");
                self.post_message(message, false).await?;
            }
            other => other?,
        }
        info!("Telegram message sent");
        Ok(())
    }

    async fn send_image(&self, path: &Path, caption: &str) -> Result<(), ApiError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart".to_string());
        let (method, field, mime) = upload_method(path);

        let part = Part::bytes(bytes).file_name(file_name).mime_str(mime)?;
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .part(field, part);

        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await?;
        check_response(response).await?;

        info!(path = %path.display(), "Telegram image sent");
        Ok(())
    }
}
