use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use MailTriageDesk::models::analytics::AnalyticsSummary;
use MailTriageDesk::models::email::{EmailRecord, Priority, Sentiment, Status};
use MailTriageDesk::services::assistant_api::{
    ApiError, AssistantApi, ClearReport, GeneratedResponse, HealthReport, IngestReport,
    SendReport, StoredResponse,
};

/// Pair of signals around a parked backend call: `entered` fires when the
/// call reaches the fake, `release` lets it proceed.
#[derive(Clone)]
pub struct FetchGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl FetchGate {
    fn new() -> Self {
        FetchGate {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[derive(Default)]
struct ServerState {
    emails: Vec<EmailRecord>,
    responses: HashMap<i64, String>,
    fail_fetches: bool,
    fail_generate: bool,
    fail_upload: bool,
}

#[derive(Default)]
struct Inner {
    state: Mutex<ServerState>,
    gates: Mutex<HashMap<String, FetchGate>>,
    calls: Mutex<Vec<String>>,
}

/// Scripted in-memory stand-in for the assistant backend. Clones share the
/// same server state, so a test can keep a handle while the controller owns
/// another.
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Inner>,
}

impl FakeBackend {
    pub fn new() -> Self {
        FakeBackend::default()
    }

    pub async fn seed_emails(&self, emails: Vec<EmailRecord>) {
        self.inner.state.lock().await.emails = emails;
    }

    pub async fn push_email(&self, email: EmailRecord) {
        self.inner.state.lock().await.emails.push(email);
    }

    pub async fn set_response(&self, id: i64, text: &str) {
        self.inner.state.lock().await.responses.insert(id, text.to_string());
    }

    pub async fn stored_response(&self, id: i64) -> Option<String> {
        self.inner.state.lock().await.responses.get(&id).cloned()
    }

    pub async fn set_fail_fetches(&self, fail: bool) {
        self.inner.state.lock().await.fail_fetches = fail;
    }

    pub async fn set_fail_generate(&self, fail: bool) {
        self.inner.state.lock().await.fail_generate = fail;
    }

    pub async fn set_fail_upload(&self, fail: bool) {
        self.inner.state.lock().await.fail_upload = fail;
    }

    /// Parks the next call matching `key` ("emails", "generate",
    /// "response-{id}", ...) until the returned gate is released.
    pub async fn park_next(&self, key: impl Into<String>) -> FetchGate {
        let gate = FetchGate::new();
        self.inner.gates.lock().await.insert(key.into(), gate.clone());
        gate
    }

    pub async fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().await.clone()
    }

    /// The backend's current truth, shaped the way the API would serve it.
    pub async fn snapshot(&self) -> (Vec<EmailRecord>, AnalyticsSummary) {
        let state = self.inner.state.lock().await;
        (sorted_emails(&state), analytics_of(&state))
    }

    async fn record(&self, call: impl Into<String>) {
        self.inner.calls.lock().await.push(call.into());
    }

    async fn maybe_park(&self, key: &str) {
        let gate = self.inner.gates.lock().await.remove(key);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

fn sorted_emails(state: &ServerState) -> Vec<EmailRecord> {
    let mut emails = state.emails.clone();
    emails.sort_by_key(|e| e.priority.rank());
    emails
}

fn analytics_of(state: &ServerState) -> AnalyticsSummary {
    let total = state.emails.len() as u64;
    let resolved = state
        .emails
        .iter()
        .filter(|e| e.status == Status::Resolved)
        .count() as u64;
    let with_responses = state
        .emails
        .iter()
        .filter(|e| state.responses.contains_key(&e.id))
        .count() as u64;

    let mut sentiment_distribution = HashMap::new();
    let mut priority_distribution = HashMap::new();
    for email in &state.emails {
        *sentiment_distribution
            .entry(format!("{:?}", email.sentiment))
            .or_insert(0) += 1;
        *priority_distribution
            .entry(format!("{:?}", email.priority))
            .or_insert(0) += 1;
    }

    AnalyticsSummary {
        total_emails: total,
        resolved_emails: resolved,
        pending_emails: total - resolved,
        emails_with_responses: with_responses,
        emails_without_responses: total - with_responses,
        sentiment_distribution,
        priority_distribution,
        ai_engine: Some("Gemini Pro".to_string()),
    }
}

#[async_trait]
impl AssistantApi for FakeBackend {
    async fn fetch_emails(&self) -> Result<Vec<EmailRecord>, ApiError> {
        self.record("GET /emails").await;
        self.maybe_park("emails").await;
        let state = self.inner.state.lock().await;
        if state.fail_fetches {
            return Err(ApiError::Backend("simulated outage".to_string()));
        }
        Ok(sorted_emails(&state))
    }

    async fn fetch_analytics(&self) -> Result<AnalyticsSummary, ApiError> {
        self.record("GET /analytics").await;
        let state = self.inner.state.lock().await;
        if state.fail_fetches {
            return Err(ApiError::Backend("simulated outage".to_string()));
        }
        Ok(analytics_of(&state))
    }

    async fn health(&self) -> Result<HealthReport, ApiError> {
        self.record("GET /health").await;
        Ok(HealthReport {
            status: "healthy".to_string(),
            gemini_available: true,
        })
    }

    async fn load_sample_emails(&self) -> Result<IngestReport, ApiError> {
        self.record("POST /load-emails").await;
        let fixture = sample_fixture();
        let processed = fixture.len() as u64;
        self.inner.state.lock().await.emails = fixture;
        Ok(IngestReport {
            message: format!(
                "Successfully processed {} emails with Gemini analysis (skipped 0 duplicates).",
                processed
            ),
            processed,
            skipped: 0,
            ai_engine: Some("Gemini Pro".to_string()),
        })
    }

    async fn upload_csv(&self, filename: &str, bytes: Vec<u8>) -> Result<IngestReport, ApiError> {
        self.record(format!("POST /upload-csv {}", filename)).await;
        self.maybe_park("upload").await;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let mut state = self.inner.state.lock().await;
        if state.fail_upload {
            return Err(ApiError::Backend("Gemini client not available".to_string()));
        }
        let base_id = state.emails.iter().map(|e| e.id).max().unwrap_or(0);
        let mut processed = 0;
        for (i, line) in text.lines().skip(1).enumerate() {
            let mut fields = line.splitn(3, ',');
            let sender = fields.next().unwrap_or("unknown@example.com").to_string();
            let subject = fields.next().unwrap_or("(no subject)").to_string();
            let body = fields.next().unwrap_or("").to_string();
            state.emails.push(EmailRecord {
                id: base_id + 1 + i as i64,
                sender,
                subject,
                body,
                sent_date: Some("2024-03-02T10:00:00".to_string()),
                sentiment: Sentiment::Neutral,
                sentiment_confidence: 0.6,
                priority: Priority::Normal,
                status: Status::Pending,
                has_response: false,
            });
            processed += 1;
        }
        Ok(IngestReport {
            message: format!("Successfully uploaded {} emails with Gemini analysis.", processed),
            processed,
            skipped: 0,
            ai_engine: Some("Gemini Pro".to_string()),
        })
    }

    async fn clear_database(&self) -> Result<ClearReport, ApiError> {
        self.record("POST /clear-database").await;
        self.maybe_park("clear").await;
        let mut state = self.inner.state.lock().await;
        let deleted_emails = state.emails.len() as u64;
        let deleted_responses = state.responses.len() as u64;
        state.emails.clear();
        state.responses.clear();
        Ok(ClearReport {
            message: format!(
                "Database cleared successfully. Deleted {} emails and {} responses.",
                deleted_emails, deleted_responses
            ),
            deleted_emails,
            deleted_responses,
        })
    }

    async fn fetch_response(&self, email_id: i64) -> Result<StoredResponse, ApiError> {
        self.record(format!("GET /emails/{}/response", email_id)).await;
        self.maybe_park(&format!("response-{}", email_id)).await;
        let state = self.inner.state.lock().await;
        match state.responses.get(&email_id) {
            Some(text) => Ok(StoredResponse {
                generated_response: text.clone(),
                final_response: text.clone(),
                is_sent: 0,
                has_response: true,
            }),
            None => Ok(StoredResponse {
                generated_response: String::new(),
                final_response: String::new(),
                is_sent: 0,
                has_response: false,
            }),
        }
    }

    async fn resolve_email(&self, email_id: i64) -> Result<(), ApiError> {
        self.record(format!("POST /emails/{}/resolve", email_id)).await;
        let mut state = self.inner.state.lock().await;
        match state.emails.iter_mut().find(|e| e.id == email_id) {
            Some(email) => {
                email.status = Status::Resolved;
                Ok(())
            }
            None => Err(ApiError::Status {
                status: 404,
                detail: "Email not found".to_string(),
            }),
        }
    }

    async fn generate_response(&self, email_id: i64) -> Result<GeneratedResponse, ApiError> {
        self.record(format!("POST /emails/{}/generate-response", email_id)).await;
        self.maybe_park("generate").await;
        let mut state = self.inner.state.lock().await;
        if state.fail_generate {
            return Err(ApiError::Backend("Gemini client not available".to_string()));
        }
        let (priority, sentiment) = match state.emails.iter().find(|e| e.id == email_id) {
            Some(email) => (Some(email.priority), Some(email.sentiment)),
            None => {
                return Err(ApiError::Status {
                    status: 404,
                    detail: "Email not found".to_string(),
                })
            }
        };
        let text = format!("Generated reply for email {}", email_id);
        state.responses.insert(email_id, text.clone());
        Ok(GeneratedResponse {
            response: text,
            email_priority: priority,
            email_sentiment: sentiment,
            ai_engine: Some("Gemini Pro".to_string()),
        })
    }

    async fn send_response(&self, email_id: i64, response_text: &str) -> Result<SendReport, ApiError> {
        self.record(format!("POST /emails/{}/send", email_id)).await;
        let mut state = self.inner.state.lock().await;
        state.responses.insert(email_id, response_text.to_string());
        if let Some(email) = state.emails.iter_mut().find(|e| e.id == email_id) {
            email.status = Status::Resolved;
        }
        Ok(SendReport {
            message: "Email sent successfully (simulated)".to_string(),
            sent: true,
        })
    }

    async fn save_draft(&self, email_id: i64, response_text: &str) -> Result<(), ApiError> {
        self.record(format!("POST /emails/{}/save-draft", email_id)).await;
        let mut state = self.inner.state.lock().await;
        state.responses.insert(email_id, response_text.to_string());
        Ok(())
    }
}

pub fn sample_email(id: i64) -> EmailRecord {
    EmailRecord {
        id,
        sender: format!("customer{}@example.com", id),
        subject: format!("Support request {}", id),
        body: "I need help with my account.".to_string(),
        sent_date: Some("2024-03-01T09:30:00".to_string()),
        sentiment: Sentiment::Neutral,
        sentiment_confidence: 0.7,
        priority: Priority::Normal,
        status: Status::Pending,
        has_response: false,
    }
}

/// Twenty classified emails covering all sentiment and priority labels,
/// shaped like the backend's bundled sample CSV after analysis.
pub fn sample_fixture() -> Vec<EmailRecord> {
    let sentiments = [Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive];
    let priorities = [
        Priority::Urgent,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];
    (1..=20)
        .map(|i| {
            let mut email = sample_email(i);
            email.sentiment = sentiments[(i as usize - 1) % sentiments.len()];
            email.priority = priorities[(i as usize - 1) % priorities.len()];
            email.sentiment_confidence = 0.5 + (i as f32) * 0.02;
            email
        })
        .collect()
}
