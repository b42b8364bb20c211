use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use vidget_core::core::events::{DownloadItem, DownloadStatus};

use crate::core::transfer::progress_percent;

/// Legal status changes. Terminal statuses have no outgoing edges.
pub fn can_transition(from: DownloadStatus, to: DownloadStatus) -> bool {
    use DownloadStatus::*;
    matches!(
        (from, to),
        (Queued, Downloading)
            | (Queued, Cancelled)
            | (Downloading, Completed)
            | (Downloading, Error)
            | (Downloading, Cancelled)
            | (Downloading, Paused)
            | (Paused, Queued)
            | (Paused, Cancelled)
    )
}

/// Every submitted item, keyed by id, in submission order. Holds records
/// only; live transfer handles belong to the queue.
#[derive(Default)]
pub struct ItemRegistry {
    items: HashMap<String, DownloadItem>,
    order: Vec<String>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses duplicate ids.
    pub fn insert(&mut self, item: DownloadItem) -> bool {
        if self.items.contains_key(&item.id) {
            return false;
        }
        self.order.push(item.id.clone());
        self.items.insert(item.id.clone(), item);
        true
    }

    pub fn get(&self, id: &str) -> Option<&DownloadItem> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DownloadItem> {
        self.items.get_mut(id)
    }

    pub fn status(&self, id: &str) -> Option<DownloadStatus> {
        self.items.get(id).map(|i| i.status)
    }

    /// Applies a status change if the state machine allows it, stamping
    /// timestamps and resetting counters on a fresh admission.
    pub fn transition(&mut self, id: &str, to: DownloadStatus) -> Option<&mut DownloadItem> {
        let item = self.items.get_mut(id)?;
        if !can_transition(item.status, to) {
            tracing::debug!(
                "[registry] rejected {:?} -> {:?} for {}",
                item.status,
                to,
                id
            );
            return None;
        }

        item.status = to;
        match to {
            DownloadStatus::Downloading => {
                item.started_at = Some(Utc::now());
                item.progress = 0;
                item.downloaded_bytes = 0;
                item.total_bytes = 0;
                item.content_type = None;
            }
            DownloadStatus::Completed => {
                item.progress = 100;
                item.completed_at = Some(Utc::now());
            }
            DownloadStatus::Error | DownloadStatus::Cancelled => {
                item.completed_at = Some(Utc::now());
            }
            DownloadStatus::Queued | DownloadStatus::Paused => {}
        }
        Some(item)
    }

    /// Byte counters for a running item. The stored percentage tops out at 99
    /// until the item actually completes.
    pub fn record_bytes(
        &mut self,
        id: &str,
        downloaded: u64,
        total: u64,
    ) -> Option<&mut DownloadItem> {
        let item = self.items.get_mut(id)?;
        if item.status != DownloadStatus::Downloading {
            return None;
        }
        item.downloaded_bytes = downloaded;
        item.total_bytes = total;
        if let Some(pct) = progress_percent(downloaded, total) {
            item.progress = item.progress.max(pct.min(99));
        }
        Some(item)
    }

    pub fn snapshot<'a>(&self, ids: impl IntoIterator<Item = &'a String>) -> Vec<DownloadItem> {
        ids.into_iter()
            .filter_map(|id| self.items.get(id))
            .cloned()
            .collect()
    }

    pub fn history(&self) -> Vec<DownloadItem> {
        self.snapshot(self.order.iter())
    }

    /// Whether a live (non-terminal) item already writes to `path`.
    pub fn path_in_use(&self, path: &Path) -> bool {
        self.items.values().any(|i| {
            !i.status.is_terminal() && i.file_path.as_deref() == Some(path)
        })
    }

    pub fn remove_finished(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|_, i| !i.status.is_terminal());
        let items = &self.items;
        self.order.retain(|id| items.contains_key(id));
        before - self.items.len()
    }
}
