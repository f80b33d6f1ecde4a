use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentiment label assigned by the backend's analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// Priority label assigned by the backend's analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Urgent,
    High,
    Normal,
    Low,
}

impl Priority {
    /// Sort weight matching the backend's list ordering (Urgent first).
    pub fn rank(self) -> u8 {
        match self {
            Priority::Urgent => 1,
            Priority::High => 2,
            Priority::Normal => 3,
            Priority::Low => 4,
        }
    }
}

/// Workflow status of a support email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Resolved,
}

/// A single classified support email as served by the backend.
///
/// The backend owns every field; the client holds a read-mostly copy that
/// is replaced wholesale on each refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: i64,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub sent_date: Option<String>,
    pub sentiment: Sentiment,
    pub sentiment_confidence: f32,
    pub priority: Priority,
    pub status: Status,
    pub has_response: bool,
}

impl fmt::Display for EmailRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{:?}/{:?}] {} - {} ({:?})",
            self.id, self.priority, self.sentiment, self.sender, self.subject, self.status
        )
    }
}
