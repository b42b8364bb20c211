use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;
use vidget_core::core::events::{
    DownloadEvent, DownloadItem, DownloadStatus, EventEmitter, Metadata,
};
use vidget_core::models::settings::AppSettings;

use crate::core::error::DownloadError;
use crate::core::filename::{dedupe_path, resolve_filename};
use crate::core::http_client::build_client;
use crate::core::queue::DownloadQueue;
use crate::core::registry::ItemRegistry;
use crate::core::transfer::{spawn_transfer, TransferJob};

pub(crate) struct SchedulerState {
    pub registry: ItemRegistry,
    pub queue: DownloadQueue,
}

pub(crate) struct Shared<E: EventEmitter> {
    pub state: Mutex<SchedulerState>,
    pub emitter: E,
    pub client: reqwest::Client,
    pub output_dir: PathBuf,
    pub max_redirects: u32,
    pub idle_timeout: Duration,
}

/// Bounded download scheduler. Cheap to clone; all clones drive the same
/// queue.
///
/// Every mutation of the registry and the queue happens under one lock, and
/// events are emitted inside that critical section, so observers see
/// transitions in the order they were applied.
pub struct Scheduler<E: EventEmitter> {
    shared: Arc<Shared<E>>,
}

impl<E: EventEmitter> Clone for Scheduler<E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<E: EventEmitter> Scheduler<E> {
    /// Creates the output directory if needed and builds the HTTP client.
    pub fn new(settings: &AppSettings, emitter: E) -> Result<Self, DownloadError> {
        let dir = &settings.download.output_dir;
        std::fs::create_dir_all(dir).map_err(|e| DownloadError::fs(dir, e))?;
        let client = build_client(settings)?;
        Ok(Self::with_client(settings, client, emitter))
    }

    pub fn with_client(settings: &AppSettings, client: reqwest::Client, emitter: E) -> Self {
        let download = &settings.download;
        let state = SchedulerState {
            registry: ItemRegistry::new(),
            queue: DownloadQueue::new(download.concurrency_bound()),
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                emitter,
                client,
                output_dir: download.output_dir.clone(),
                max_redirects: download.max_redirects,
                idle_timeout: Duration::from_secs(download.idle_timeout_secs.max(1)),
            }),
        }
    }

    pub fn output_dir(&self) -> &std::path::Path {
        &self.shared.output_dir
    }

    pub async fn submit(&self, url: impl Into<String>, metadata: Metadata) -> String {
        let url = url.into();
        let id = new_download_id();
        let filename = resolve_filename(&url, &metadata);
        let item = DownloadItem::new(id.clone(), url, metadata, filename);

        let mut state = self.shared.state.lock().await;
        state.registry.insert(item.clone());
        state.queue.enqueue(id.clone());
        tracing::info!("[queue] {} queued: {}", id, item.url);
        self.shared.emitter.emit(DownloadEvent::Queued(item));
        try_start_next(&self.shared, &mut state);
        id
    }

    /// Returns once an aborted transfer has removed its partial file.
    pub async fn cancel(&self, id: &str) -> bool {
        let guard = {
            let mut state = self.shared.state.lock().await;
            let guard = match state.registry.status(id) {
                Some(DownloadStatus::Queued) | Some(DownloadStatus::Paused) => {
                    state.queue.remove_pending(id);
                    state.queue.release(id)
                }
                Some(DownloadStatus::Downloading) => {
                    if let Some(slot) = state.queue.take_active(id) {
                        slot.cancel.cancel();
                    }
                    state.queue.release(id)
                }
                _ => return false,
            };

            if let Some(item) = state.registry.transition(id, DownloadStatus::Cancelled) {
                tracing::info!("[queue] {} cancelled", id);
                self.shared
                    .emitter
                    .emit(DownloadEvent::Cancelled(item.clone()));
            }
            try_start_next(&self.shared, &mut state);
            guard
        };

        if let Some(guard) = guard {
            let _settled = guard.lock().await;
        }
        true
    }

    pub async fn get(&self, id: &str) -> Option<DownloadItem> {
        let state = self.shared.state.lock().await;
        state.registry.get(id).cloned()
    }

    /// Active items in admission order, then pending items in queue order.
    pub async fn list(&self) -> Vec<DownloadItem> {
        let state = self.shared.state.lock().await;
        let mut items = state.registry.snapshot(state.queue.active_ids());
        items.extend(state.registry.snapshot(state.queue.pending_ids()));
        items
    }

    /// Every record including finished ones, in submission order.
    pub async fn history(&self) -> Vec<DownloadItem> {
        let state = self.shared.state.lock().await;
        state.registry.history()
    }

    pub async fn active_count(&self) -> usize {
        self.shared.state.lock().await.queue.active_count()
    }

    pub async fn is_paused(&self) -> bool {
        self.shared.state.lock().await.queue.is_halted()
    }

    /// Aborts every running transfer, parks the items at the head of the
    /// queue and stops admission. Returns after the aborted transfers have
    /// released their files.
    pub async fn pause_all(&self) {
        let guards = {
            let mut state = self.shared.state.lock().await;
            state.queue.halt();

            let drained = state.queue.drain_active();
            let mut paused = Vec::with_capacity(drained.len());
            let mut guards = Vec::with_capacity(drained.len());
            for slot in drained {
                slot.cancel.cancel();
                if let Some(guard) = state.queue.io_guard(&slot.id) {
                    guards.push(guard);
                }
                if let Some(item) = state.registry.transition(&slot.id, DownloadStatus::Paused) {
                    self.shared.emitter.emit(DownloadEvent::Paused(item.clone()));
                }
                paused.push(slot.id);
            }
            if !paused.is_empty() {
                tracing::info!("[queue] paused {} transfer(s)", paused.len());
            }
            state.queue.requeue_front(paused);
            guards
        };

        for guard in guards {
            let _settled = guard.lock().await;
        }
    }

    pub async fn resume_all(&self) {
        let mut state = self.shared.state.lock().await;
        let state = &mut *state;
        state.queue.unhalt();

        let parked: Vec<String> = state
            .queue
            .pending_ids()
            .filter(|id| state.registry.status(id) == Some(DownloadStatus::Paused))
            .cloned()
            .collect();
        for id in parked {
            if let Some(item) = state.registry.transition(&id, DownloadStatus::Queued) {
                self.shared.emitter.emit(DownloadEvent::Queued(item.clone()));
            }
        }
        try_start_next(&self.shared, state);
    }

    /// Re-submits a failed or cancelled item under a new id.
    pub async fn retry(&self, id: &str) -> Result<String, DownloadError> {
        let (url, metadata) = {
            let state = self.shared.state.lock().await;
            let item = state
                .registry
                .get(id)
                .ok_or_else(|| DownloadError::NotFound(id.to_string()))?;
            match item.status {
                DownloadStatus::Error | DownloadStatus::Cancelled => {
                    (item.url.clone(), item.metadata.clone())
                }
                status => {
                    return Err(DownloadError::NotRetryable {
                        id: id.to_string(),
                        status,
                    })
                }
            }
        };
        Ok(self.submit(url, metadata).await)
    }

    /// Drops finished records; returns how many were removed.
    pub async fn clear_finished(&self) -> usize {
        let mut state = self.shared.state.lock().await;
        state.registry.remove_finished()
    }
}

fn new_download_id() -> String {
    format!("dl_{}", Uuid::new_v4().simple())
}

/// Admits pending items until the bound is reached. Must be called with the
/// state lock held.
pub(crate) fn try_start_next<E: EventEmitter>(shared: &Arc<Shared<E>>, state: &mut SchedulerState) {
    while let Some(id) = state.queue.next_admissible() {
        let Some(item) = state.registry.get(&id) else {
            continue;
        };
        if item.status != DownloadStatus::Queued {
            tracing::debug!("[queue] skipping {} in state {:?}", id, item.status);
            continue;
        }

        let file_path = match &item.file_path {
            Some(path) => path.clone(),
            None => {
                let registry = &state.registry;
                dedupe_path(&shared.output_dir, &item.filename, |p| registry.path_in_use(p))
            }
        };

        let Some(item) = state.registry.transition(&id, DownloadStatus::Downloading) else {
            continue;
        };
        item.file_path = Some(file_path.clone());
        let url = item.url.clone();
        let started = item.clone();

        let (slot, io_guard) = state.queue.activate(&id);
        tracing::info!(
            "[queue] {} started ({}/{}): {}",
            id,
            state.queue.active_count(),
            state.queue.max_concurrent(),
            url
        );
        shared.emitter.emit(DownloadEvent::Started(started));

        spawn_transfer(
            shared.clone(),
            TransferJob {
                id,
                generation: slot.generation,
                url,
                file_path,
                cancel: slot.cancel,
                io_guard,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = new_download_id();
        let b = new_download_id();
        assert!(a.starts_with("dl_"));
        assert_ne!(a, b);
    }
}
