use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::models::analytics::AnalyticsSummary;
use crate::models::email::EmailRecord;

/// The email currently under inspection plus its editable draft reply.
///
/// The record is a snapshot taken at selection time, decoupled from the
/// polled list: a background refresh replaces `DashboardState::emails` but
/// never reaches into the selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub email: EmailRecord,
    pub draft: String,
}

/// A CSV file staged for upload but not yet sent to the backend.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub filename: String,
    pub path: PathBuf,
}

/// Local mirror of server state plus the interaction state layered on top.
///
/// Mutated only while holding the controller's lock; never across an await
/// of a network call.
#[derive(Debug, Default)]
pub struct DashboardState {
    pub emails: Vec<EmailRecord>,
    pub analytics: Option<AnalyticsSummary>,
    pub selection: Option<Selection>,
    pub staged_upload: Option<StagedUpload>,
    /// Bumped on every selection change. A response fetch that started under
    /// an older epoch is dropped instead of applied.
    pub(crate) selection_epoch: u64,
    pub last_refreshed: Option<DateTime<Utc>>,
}
