//! Process-wide log sessions.
//!
//! A session owns one directory under a base log directory. Every trace saved
//! through it lands at `<base>/<session_id>/trace_<trace_id>.json`, and
//! `end` writes a `session.json` summary next to them. Only one session may
//! be open per process at a time.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, PoisonError,
    },
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use warden_contracts::{
    error::{WardenError, WardenResult},
    trace::Trace,
};

use crate::persist;

static SESSION_OPEN: AtomicBool = AtomicBool::new(false);

/// Summary written to `session.json` when a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// File names of the traces saved during the session, in save order.
    pub traces: Vec<String>,
}

#[derive(Debug)]
pub struct LogSession {
    session_id: String,
    dir: PathBuf,
    started_at: DateTime<Utc>,
    saved: Mutex<Vec<String>>,
    released: AtomicBool,
}

impl LogSession {
    /// Open a new session directory under `base_dir`.
    ///
    /// Fails with `SessionError` while another session is open in this process.
    pub fn start(base_dir: impl AsRef<Path>) -> WardenResult<Self> {
        if SESSION_OPEN
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WardenError::SessionError {
                reason: "a log session is already open in this process".to_string(),
            });
        }

        let started_at = Utc::now();
        let session_id = format!(
            "session_{}_{}",
            started_at.format("%Y%m%d_%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let dir = base_dir.as_ref().join(&session_id);
        if let Err(err) = std::fs::create_dir_all(&dir) {
            SESSION_OPEN.store(false, Ordering::Release);
            return Err(err.into());
        }

        info!(session_id = %session_id, dir = %dir.display(), "log session started");
        Ok(Self {
            session_id,
            dir,
            started_at,
            saved: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True while a session is open anywhere in the process.
    pub fn is_active() -> bool {
        SESSION_OPEN.load(Ordering::Acquire)
    }

    /// Write `trace` into the session directory and return its path.
    pub fn save_trace(&self, trace: &Trace) -> WardenResult<PathBuf> {
        if self.released.load(Ordering::Acquire) {
            return Err(WardenError::SessionError {
                reason: format!("session {} has ended", self.session_id),
            });
        }
        let file_name = format!("trace_{}.json", trace.trace_id);
        let path = self.dir.join(&file_name);
        persist::save_trace(&path, trace)?;
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(file_name);
        Ok(path)
    }

    /// File names saved so far.
    pub fn saved_traces(&self) -> Vec<String> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Close the session, write `session.json` and release the process slot.
    pub fn end(&self) -> WardenResult<SessionSummary> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Err(WardenError::SessionError {
                reason: format!("session {} has already ended", self.session_id),
            });
        }
        SESSION_OPEN.store(false, Ordering::Release);

        let summary = SessionSummary {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            ended_at: Utc::now(),
            traces: self.saved_traces(),
        };
        let json = serde_json::to_string_pretty(&summary).map_err(|e| WardenError::Serialization {
            reason: format!("failed to serialize session summary: {}", e),
        })?;
        std::fs::write(self.dir.join("session.json"), json)?;

        info!(session_id = %self.session_id, traces = summary.traces.len(), "log session ended");
        Ok(summary)
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            warn!(session_id = %self.session_id, "log session dropped without end(); releasing");
            SESSION_OPEN.store(false, Ordering::Release);
        }
    }
}
