//! Session cost ledger.
//!
//! A single JSON file records which endpoint is being paid for, since when,
//! and at what rate, so `cost` and `down` can run as separate processes.
//! Concurrent processes racing on the same file are not guarded against.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::providers::PodError;

/// Current time as fractional seconds since the Unix epoch.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Format a USD amount for display.
#[must_use]
pub fn format_usd(amount: f64) -> String {
    format!("${amount:.2}")
}

/// A paid session against one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Endpoint being billed.
    pub endpoint_id: String,
    /// Session start, seconds since the Unix epoch.
    pub start_timestamp: f64,
    /// Price in USD per second.
    pub rate_per_second: f64,
}

impl SessionRecord {
    /// Start a session now.
    #[must_use]
    pub fn start(endpoint_id: impl Into<String>, rate_per_second: f64) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            start_timestamp: now_timestamp(),
            rate_per_second,
        }
    }

    /// Seconds elapsed at `now`, never negative.
    #[must_use]
    pub fn elapsed_at(&self, now: f64) -> f64 {
        (now - self.start_timestamp).max(0.0)
    }

    /// Estimated cost in USD at `now`.
    #[must_use]
    pub fn cost_at(&self, now: f64) -> f64 {
        self.elapsed_at(now) * self.rate_per_second
    }
}

/// Cost estimate for the recorded session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    /// Active session, if any.
    pub session: Option<SessionRecord>,
    /// Seconds since the session started.
    pub elapsed_secs: f64,
    /// Estimated spend in USD.
    pub amount_usd: f64,
}

impl CostReport {
    /// Report for `session` evaluated at `now`.
    #[must_use]
    pub fn at(session: Option<SessionRecord>, now: f64) -> Self {
        let (elapsed_secs, amount_usd) = session
            .as_ref()
            .map_or((0.0, 0.0), |s| (s.elapsed_at(now), s.cost_at(now)));
        Self {
            session,
            elapsed_secs,
            amount_usd,
        }
    }

    /// Report with no active session.
    #[must_use]
    pub fn none() -> Self {
        Self::at(None, 0.0)
    }
}

impl std::fmt::Display for CostReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_usd(self.amount_usd))
    }
}

/// File-backed store holding at most one [`SessionRecord`].
#[derive(Debug, Clone)]
pub struct SessionLedger {
    path: PathBuf,
}

impl SessionLedger {
    /// Ledger stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the active session, if any.
    ///
    /// # Errors
    /// Returns [`PodError::State`] if the file exists but is not a valid
    /// record, or [`PodError::Io`] if it cannot be read.
    pub fn load(&self) -> Result<Option<SessionRecord>, PodError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: SessionRecord = serde_json::from_str(&content).map_err(|e| {
            PodError::State(format!(
                "malformed session record {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(endpoint_id = %record.endpoint_id, "Loaded session record");
        Ok(Some(record))
    }

    /// Replace the active session with `record`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, record: &SessionRecord) -> Result<(), PodError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(record)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        info!(
            endpoint_id = %record.endpoint_id,
            path = %self.path.display(),
            "Session record saved"
        );
        Ok(())
    }

    /// Remove the active session. Returns whether a record was present.
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be removed.
    pub fn clear(&self) -> Result<bool, PodError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Session record cleared");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Cost of the active session at the current time, zero when there is none.
    ///
    /// # Errors
    /// Returns [`PodError::State`] if the file holds a malformed record.
    pub fn cost(&self) -> Result<CostReport, PodError> {
        self.cost_at(now_timestamp())
    }

    /// Like [`cost`](Self::cost), evaluated at `now` (seconds since the epoch).
    ///
    /// # Errors
    /// Returns [`PodError::State`] if the file holds a malformed record.
    pub fn cost_at(&self, now: f64) -> Result<CostReport, PodError> {
        Ok(CostReport::at(self.load()?, now))
    }
}
