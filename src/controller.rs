use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::{watch, Mutex};

use crate::models::analytics::AnalyticsSummary;
use crate::models::email::EmailRecord;
use crate::services::assistant_api::{
    ApiError, AssistantApi, ClearReport, GeneratedResponse, IngestReport, SendReport,
};
use crate::state::{DashboardState, Selection, StagedUpload};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("A {0} action is already in progress")]
    Busy(&'static str),

    #[error("No email is selected")]
    NoSelection,

    #[error("No file is staged for upload")]
    NoStagedFile,

    #[error("Only CSV files can be uploaded, got {0:?}")]
    NotCsv(String),

    #[error("Draft is empty")]
    EmptyDraft,

    #[error("Could not read staged file: {0}")]
    StagedFileRead(#[from] std::io::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

// Clears the flag when the action handler returns, on every path.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>, label: &'static str) -> Result<Self, ControllerError> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(ControllerError::Busy(label));
        }
        Ok(BusyGuard(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct PollerHandle {
    stop_tx: watch::Sender<bool>,
}

/// Keeps the local email list and analytics summary eventually consistent
/// with the backend, and dispatches one-shot user actions against it.
///
/// The server is the sole source of truth for derived fields (status,
/// has_response, aggregate counts), so every mutating action ends by
/// re-fetching both collections instead of patching locally.
pub struct DashboardController<A: AssistantApi> {
    api: Arc<A>,
    state: Arc<Mutex<DashboardState>>,
    bulk_busy: Arc<AtomicBool>,
    respond_busy: Arc<AtomicBool>,
    poller: Mutex<Option<PollerHandle>>,
    poll_interval: Duration,
}

impl<A: AssistantApi + 'static> DashboardController<A> {
    pub fn new(api: A, poll_interval: Duration) -> Self {
        DashboardController {
            api: Arc::new(api),
            state: Arc::new(Mutex::new(DashboardState::default())),
            bulk_busy: Arc::new(AtomicBool::new(false)),
            respond_busy: Arc::new(AtomicBool::new(false)),
            poller: Mutex::new(None),
            poll_interval,
        }
    }

    /// Spawns the background poller: one refresh immediately, then one per
    /// interval until [`stop`](Self::stop). No-op if already running.
    pub async fn start(&self) {
        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            debug!("Poller already running");
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        let every = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                let snapshot = fetch_snapshot(api.as_ref()).await;
                // The fetch is not cancelled on stop(); a result landing
                // after teardown must not be written into state.
                if *stop_rx.borrow() {
                    break;
                }
                match snapshot {
                    Ok((emails, analytics)) => apply_snapshot(&state, emails, analytics).await,
                    Err(e) => {
                        warn!("Background refresh failed, keeping previous snapshot: {}", e)
                    }
                }
            }
            debug!("Poller loop exited");
        });

        *poller = Some(PollerHandle { stop_tx });
        info!("Poller started (every {:?})", every);
    }

    /// Signals the poller to stop. Does not wait for an in-flight fetch;
    /// its result is discarded when it lands. Idempotent.
    pub async fn stop(&self) {
        if let Some(handle) = self.poller.lock().await.take() {
            let _ = handle.stop_tx.send(true);
            info!("Poller stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.poller.lock().await.is_some()
    }

    /// Replaces both server-derived collections with fresh server truth.
    pub async fn refresh_all(&self) -> Result<(), ControllerError> {
        let (emails, analytics) = fetch_snapshot(self.api.as_ref()).await?;
        apply_snapshot(&self.state, emails, analytics).await;
        Ok(())
    }

    async fn refresh_after(&self, action: &str) {
        if let Err(e) = self.refresh_all().await {
            warn!("Refresh after {} failed, local view may lag the server: {}", action, e);
        }
    }

    /// Selects an email for inspection and pulls any previously generated
    /// response into the draft. A missing stored response is not an error:
    /// the draft simply starts empty.
    pub async fn select_email(&self, email: EmailRecord) {
        let id = email.id;
        let epoch = {
            let mut state = self.state.lock().await;
            state.selection = Some(Selection {
                email,
                draft: String::new(),
            });
            state.selection_epoch += 1;
            state.selection_epoch
        };
        info!("Selected email {}", id);

        let draft = match self.api.fetch_response(id).await {
            Ok(stored) if stored.has_response => stored.generated_response,
            Ok(_) => String::new(),
            Err(e) => {
                warn!("Could not fetch stored response for email {}: {}", id, e);
                String::new()
            }
        };

        let mut state = self.state.lock().await;
        if state.selection_epoch != epoch {
            debug!("Selection moved on while fetching response for email {}; dropping result", id);
            return;
        }
        if let Some(selection) = state.selection.as_mut() {
            selection.draft = draft;
        }
    }

    pub async fn clear_selection(&self) {
        let mut state = self.state.lock().await;
        state.selection = None;
        state.selection_epoch += 1;
    }

    /// Local-only draft edit. Nothing reaches the backend until an explicit
    /// send or save.
    pub async fn edit_draft(&self, text: impl Into<String>) -> Result<(), ControllerError> {
        let mut state = self.state.lock().await;
        match state.selection.as_mut() {
            Some(selection) => {
                selection.draft = text.into();
                Ok(())
            }
            None => Err(ControllerError::NoSelection),
        }
    }

    /// Stages a file for upload, replacing any previously staged one.
    pub async fn stage_upload(&self, filename: impl Into<String>, path: impl Into<PathBuf>) {
        let staged = StagedUpload {
            filename: filename.into(),
            path: path.into(),
        };
        let mut state = self.state.lock().await;
        if let Some(prev) = state.staged_upload.replace(staged) {
            debug!("Replacing previously staged file {}", prev.filename);
        }
    }

    pub async fn clear_staged_upload(&self) {
        self.state.lock().await.staged_upload = None;
    }

    /// Asks the backend to ingest and classify its bundled sample CSV.
    pub async fn load_sample_data(&self) -> Result<IngestReport, ControllerError> {
        let _busy = BusyGuard::acquire(&self.bulk_busy, "bulk")?;
        let report = self.api.load_sample_emails().await?;
        info!(
            "Loaded {} sample emails ({} skipped) via {}",
            report.processed,
            report.skipped,
            report.ai_engine.as_deref().unwrap_or("unknown engine")
        );
        self.refresh_after("load-emails").await;
        Ok(report)
    }

    /// Uploads the staged CSV. The staging slot is cleared only on success,
    /// so a failed upload can be retried without re-staging.
    pub async fn upload_staged_csv(&self) -> Result<IngestReport, ControllerError> {
        let _busy = BusyGuard::acquire(&self.bulk_busy, "bulk")?;
        let staged = self
            .state
            .lock()
            .await
            .staged_upload
            .clone()
            .ok_or(ControllerError::NoStagedFile)?;
        if !staged.filename.to_ascii_lowercase().ends_with(".csv") {
            return Err(ControllerError::NotCsv(staged.filename));
        }

        let bytes = tokio::fs::read(&staged.path).await?;
        let report = self.api.upload_csv(&staged.filename, bytes).await?;
        info!("Uploaded {}: {}", staged.filename, report.message);

        self.state.lock().await.staged_upload = None;
        self.refresh_after("upload-csv").await;
        Ok(report)
    }

    /// Destructive: wipes the backend database. Callers are expected to
    /// have confirmed the intent with the user first. Always drops the
    /// current selection so nothing references deleted records.
    pub async fn clear_all_data(&self) -> Result<ClearReport, ControllerError> {
        let _busy = BusyGuard::acquire(&self.bulk_busy, "bulk")?;
        let report = self.api.clear_database().await?;
        info!("{}", report.message);
        {
            let mut state = self.state.lock().await;
            state.selection = None;
            state.selection_epoch += 1;
        }
        self.refresh_after("clear-database").await;
        Ok(report)
    }

    pub async fn resolve_email(&self, email_id: i64) -> Result<(), ControllerError> {
        let _busy = BusyGuard::acquire(&self.bulk_busy, "bulk")?;
        self.api.resolve_email(email_id).await?;
        info!("Email {} marked resolved", email_id);
        self.refresh_after("resolve").await;
        Ok(())
    }

    /// Generates (or regenerates) a response for the selected email. On
    /// success the draft is replaced and the selected snapshot's
    /// has_response flips immediately; the polled list catches up on the
    /// follow-up refresh. On failure the draft is left untouched.
    pub async fn generate_response(&self) -> Result<GeneratedResponse, ControllerError> {
        let _busy = BusyGuard::acquire(&self.respond_busy, "generate-response")?;
        let (id, epoch) = {
            let state = self.state.lock().await;
            match state.selection.as_ref() {
                Some(selection) => (selection.email.id, state.selection_epoch),
                None => return Err(ControllerError::NoSelection),
            }
        };

        let generated = self.api.generate_response(id).await?;
        {
            let mut state = self.state.lock().await;
            if state.selection_epoch == epoch {
                if let Some(selection) = state.selection.as_mut() {
                    selection.draft = generated.response.clone();
                    selection.email.has_response = true;
                }
            } else {
                debug!("Selection moved on while generating for email {}; dropping draft update", id);
            }
        }
        self.refresh_after("generate-response").await;
        Ok(generated)
    }

    /// Sends the current draft as the reply. The draft is kept locally even
    /// on success so the panel still shows what went out; on failure it is
    /// kept so the user can retry.
    pub async fn send_response(&self) -> Result<SendReport, ControllerError> {
        let _busy = BusyGuard::acquire(&self.bulk_busy, "bulk")?;
        let (id, draft) = self.selected_draft().await?;
        if draft.trim().is_empty() {
            return Err(ControllerError::EmptyDraft);
        }

        let report = self.api.send_response(id, &draft).await?;
        info!("{}", report.message);
        self.refresh_after("send").await;
        Ok(report)
    }

    /// Persists the current draft server-side without sending it.
    pub async fn save_draft(&self) -> Result<(), ControllerError> {
        let _busy = BusyGuard::acquire(&self.bulk_busy, "bulk")?;
        let (id, draft) = self.selected_draft().await?;
        self.api.save_draft(id, &draft).await?;
        info!("Draft saved for email {}", id);
        self.refresh_after("save-draft").await;
        Ok(())
    }

    async fn selected_draft(&self) -> Result<(i64, String), ControllerError> {
        let state = self.state.lock().await;
        state
            .selection
            .as_ref()
            .map(|s| (s.email.id, s.draft.clone()))
            .ok_or(ControllerError::NoSelection)
    }

    pub async fn emails(&self) -> Vec<EmailRecord> {
        self.state.lock().await.emails.clone()
    }

    pub async fn analytics(&self) -> Option<AnalyticsSummary> {
        self.state.lock().await.analytics.clone()
    }

    pub async fn selection(&self) -> Option<Selection> {
        self.state.lock().await.selection.clone()
    }

    pub async fn staged_upload(&self) -> Option<StagedUpload> {
        self.state.lock().await.staged_upload.clone()
    }

    pub async fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_refreshed
    }
}

async fn fetch_snapshot<A: AssistantApi + ?Sized>(
    api: &A,
) -> Result<(Vec<EmailRecord>, AnalyticsSummary), ApiError> {
    let emails = api.fetch_emails().await?;
    let analytics = api.fetch_analytics().await?;
    Ok((emails, analytics))
}

async fn apply_snapshot(
    state: &Mutex<DashboardState>,
    emails: Vec<EmailRecord>,
    analytics: AnalyticsSummary,
) {
    let mut state = state.lock().await;
    debug!("Applying server snapshot: {} emails", emails.len());
    state.emails = emails;
    state.analytics = Some(analytics);
    state.last_refreshed = Some(Utc::now());
}
