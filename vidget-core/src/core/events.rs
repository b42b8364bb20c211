use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub type Metadata = HashMap<String, String>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Queued,
    Downloading,
    Paused,
    Completed,
    Error,
    Cancelled,
}

impl DownloadStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Error | DownloadStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadItem {
    pub id: String,
    pub url: String,
    pub metadata: Metadata,
    pub status: DownloadStatus,
    pub progress: u8,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub filename: String,
    pub file_path: Option<PathBuf>,
    /// `Content-Type` of the response being written, once headers arrive.
    #[serde(default)]
    pub content_type: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DownloadItem {
    pub fn new(id: String, url: String, metadata: Metadata, filename: String) -> Self {
        Self {
            id,
            url,
            metadata,
            status: DownloadStatus::Queued,
            progress: 0,
            downloaded_bytes: 0,
            total_bytes: 0,
            filename,
            file_path: None,
            content_type: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn title(&self) -> &str {
        self.metadata
            .get("title")
            .map(String::as_str)
            .unwrap_or(&self.filename)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub id: String,
    pub progress: u8,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum DownloadEvent {
    Queued(DownloadItem),
    Started(DownloadItem),
    Progress(ProgressUpdate),
    Completed(DownloadItem),
    Error {
        id: String,
        url: String,
        message: String,
    },
    Cancelled(DownloadItem),
    Paused(DownloadItem),
}

impl DownloadEvent {
    pub fn id(&self) -> &str {
        match self {
            DownloadEvent::Queued(item)
            | DownloadEvent::Started(item)
            | DownloadEvent::Completed(item)
            | DownloadEvent::Cancelled(item)
            | DownloadEvent::Paused(item) => &item.id,
            DownloadEvent::Progress(p) => &p.id,
            DownloadEvent::Error { id, .. } => id,
        }
    }

    /// Channel name a host forwards the event under, e.g. `download:progress`.
    pub fn name(&self) -> &'static str {
        match self {
            DownloadEvent::Queued(_) => "download:queued",
            DownloadEvent::Started(_) => "download:started",
            DownloadEvent::Progress(_) => "download:progress",
            DownloadEvent::Completed(_) => "download:completed",
            DownloadEvent::Error { .. } => "download:error",
            DownloadEvent::Cancelled(_) => "download:cancelled",
            DownloadEvent::Paused(_) => "download:paused",
        }
    }
}

pub trait EventEmitter: Send + Sync + Clone + 'static {
    fn emit(&self, event: DownloadEvent);
}

/// Forwards events into an unbounded channel. Emitting never blocks and a
/// dropped receiver silently discards events.
#[derive(Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<DownloadEvent>,
}

impl ChannelEmitter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DownloadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(&self, event: DownloadEvent) {
        let _ = self.tx.send(event);
    }
}
