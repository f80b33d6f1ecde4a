use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Server-computed aggregate counts and distributions over all emails.
///
/// The client never derives these locally; each refresh replaces the whole
/// summary with whatever the backend reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_emails: u64,
    pub resolved_emails: u64,
    pub pending_emails: u64,
    pub emails_with_responses: u64,
    pub emails_without_responses: u64,
    #[serde(default)]
    pub sentiment_distribution: HashMap<String, u64>,
    #[serde(default)]
    pub priority_distribution: HashMap<String, u64>,
    #[serde(default)]
    pub ai_engine: Option<String>,
}
