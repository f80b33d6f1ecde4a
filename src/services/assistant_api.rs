use async_trait::async_trait;
use log::{debug, info};
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::config;
use crate::models::analytics::AnalyticsSummary;
use crate::models::email::{EmailRecord, Priority, Sentiment};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Outcome of a bulk ingest (sample load or CSV upload).
#[derive(Debug, Clone, Deserialize)]
pub struct IngestReport {
    pub message: String,
    #[serde(default, alias = "total_processed")]
    pub processed: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub ai_engine: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClearReport {
    pub message: String,
    #[serde(default)]
    pub deleted_emails: u64,
    #[serde(default)]
    pub deleted_responses: u64,
}

/// A previously generated response as stored server-side.
///
/// `has_response: false` means nothing has been generated yet; the other
/// fields come back empty in that case.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredResponse {
    #[serde(default)]
    pub generated_response: String,
    #[serde(default)]
    pub final_response: String,
    #[serde(default)]
    pub is_sent: u8,
    #[serde(default)]
    pub has_response: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedResponse {
    pub response: String,
    #[serde(default)]
    pub email_priority: Option<Priority>,
    #[serde(default)]
    pub email_sentiment: Option<Sentiment>,
    #[serde(default)]
    pub ai_engine: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendReport {
    pub message: String,
    #[serde(default)]
    pub sent: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub gemini_available: bool,
}

#[derive(Debug, Deserialize)]
struct AckBody {
    #[serde(default)]
    message: String,
}

/// Backend surface the dashboard controller talks to.
///
/// Kept behind a trait so tests can stand in a scripted backend instead of
/// a live HTTP server.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn fetch_emails(&self) -> Result<Vec<EmailRecord>, ApiError>;
    async fn fetch_analytics(&self) -> Result<AnalyticsSummary, ApiError>;
    async fn health(&self) -> Result<HealthReport, ApiError>;
    async fn load_sample_emails(&self) -> Result<IngestReport, ApiError>;
    async fn upload_csv(&self, filename: &str, bytes: Vec<u8>) -> Result<IngestReport, ApiError>;
    async fn clear_database(&self) -> Result<ClearReport, ApiError>;
    async fn fetch_response(&self, email_id: i64) -> Result<StoredResponse, ApiError>;
    async fn resolve_email(&self, email_id: i64) -> Result<(), ApiError>;
    async fn generate_response(&self, email_id: i64) -> Result<GeneratedResponse, ApiError>;
    async fn send_response(&self, email_id: i64, response_text: &str) -> Result<SendReport, ApiError>;
    async fn save_draft(&self, email_id: i64, response_text: &str) -> Result<(), ApiError>;
}

/// HTTP client for the assistant backend.
pub struct AssistantClient {
    http: reqwest::Client,
    base: String,
}

impl AssistantClient {
    pub fn new(base_url: Url) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config::REQUEST_TIMEOUT)
            .build()?;
        Ok(AssistantClient {
            http,
            base: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    /// Turns a raw HTTP response into `T`, absorbing the backend's habit of
    /// reporting failures as HTTP 200 with an `{"error": ...}` body.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| extract_detail(&body))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body: Value = response.json().await?;
        if let Some(detail) = body.get("error").and_then(Value::as_str) {
            return Err(ApiError::Backend(detail.to_string()));
        }
        Ok(serde_json::from_value(body)?)
    }
}

fn extract_detail(body: &Value) -> Option<String> {
    body.get("detail")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(String::from)
}

#[async_trait]
impl AssistantApi for AssistantClient {
    async fn fetch_emails(&self) -> Result<Vec<EmailRecord>, ApiError> {
        debug!("Fetching email list");
        let response = self.http.get(self.endpoint("emails")).send().await?;
        let emails: Vec<EmailRecord> = Self::decode(response).await?;
        debug!("Fetched {} emails", emails.len());
        Ok(emails)
    }

    async fn fetch_analytics(&self) -> Result<AnalyticsSummary, ApiError> {
        debug!("Fetching analytics summary");
        let response = self.http.get(self.endpoint("analytics")).send().await?;
        Self::decode(response).await
    }

    async fn health(&self) -> Result<HealthReport, ApiError> {
        let response = self.http.get(self.endpoint("health")).send().await?;
        Self::decode(response).await
    }

    async fn load_sample_emails(&self) -> Result<IngestReport, ApiError> {
        info!("Requesting sample email load");
        let response = self.http.post(self.endpoint("load-emails")).send().await?;
        Self::decode(response).await
    }

    async fn upload_csv(&self, filename: &str, bytes: Vec<u8>) -> Result<IngestReport, ApiError> {
        info!("Uploading CSV {} ({} bytes)", filename, bytes.len());
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.endpoint("upload-csv"))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn clear_database(&self) -> Result<ClearReport, ApiError> {
        info!("Requesting database clear");
        let response = self
            .http
            .post(self.endpoint("clear-database"))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn fetch_response(&self, email_id: i64) -> Result<StoredResponse, ApiError> {
        debug!("Fetching stored response for email {}", email_id);
        let response = self
            .http
            .get(self.endpoint(&format!("emails/{}/response", email_id)))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn resolve_email(&self, email_id: i64) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.endpoint(&format!("emails/{}/resolve", email_id)))
            .send()
            .await?;
        let ack: AckBody = Self::decode(response).await?;
        info!("Resolve acknowledged: {}", ack.message);
        Ok(())
    }

    async fn generate_response(&self, email_id: i64) -> Result<GeneratedResponse, ApiError> {
        info!("Requesting generated response for email {}", email_id);
        let response = self
            .http
            .post(self.endpoint(&format!("emails/{}/generate-response", email_id)))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn send_response(&self, email_id: i64, response_text: &str) -> Result<SendReport, ApiError> {
        info!("Sending response for email {}", email_id);
        let payload = json!({
            "email_id": email_id,
            "response_text": response_text,
            "send_immediately": true,
        });
        let response = self
            .http
            .post(self.endpoint(&format!("emails/{}/send", email_id)))
            .json(&payload)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn save_draft(&self, email_id: i64, response_text: &str) -> Result<(), ApiError> {
        debug!("Saving draft for email {}", email_id);
        let payload = json!({
            "email_id": email_id,
            "response_text": response_text,
            "send_immediately": false,
        });
        let response = self
            .http
            .post(self.endpoint(&format!("emails/{}/save-draft", email_id)))
            .json(&payload)
            .send()
            .await?;
        let ack: AckBody = Self::decode(response).await?;
        debug!("Draft save acknowledged: {}", ack.message);
        Ok(())
    }
}
