use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use vidget_core::core::events::{DownloadEvent, DownloadStatus, EventEmitter, ProgressUpdate};

use crate::core::error::DownloadError;
use crate::core::queue::IoGuard;
use crate::core::redirect::{is_redirect, redirect_target, RedirectBudget};
use crate::core::scheduler::{try_start_next, Shared};

const WRITE_BUFFER_SIZE: usize = 256 * 1024;

pub(crate) struct TransferJob {
    pub id: String,
    pub generation: u64,
    pub url: String,
    pub file_path: PathBuf,
    pub cancel: CancellationToken,
    pub io_guard: IoGuard,
}

pub(crate) fn spawn_transfer<E: EventEmitter>(shared: Arc<Shared<E>>, job: TransferJob) {
    tokio::spawn(run_transfer(shared, job));
}

/// `floor(downloaded * 100 / total)`, capped at 100. `None` while the total
/// is unknown.
pub fn progress_percent(downloaded: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let pct = (downloaded as u128 * 100) / total as u128;
    Some(pct.min(100) as u8)
}

async fn run_transfer<E: EventEmitter>(shared: Arc<Shared<E>>, job: TransferJob) {
    // Held until the partial file is settled; a re-admission of the same
    // item waits here for the previous attempt.
    let _io = job.io_guard.clone().lock_owned().await;
    if job.cancel.is_cancelled() {
        return;
    }

    let result = tokio::select! {
        biased;
        _ = job.cancel.cancelled() => Err(DownloadError::Aborted),
        r = fetch_to_file(&shared, &job) => r,
    };

    if result.is_err() {
        discard_partial(&job.file_path).await;
    }
    if finish(&shared, &job, result).await {
        discard_partial(&job.file_path).await;
    }
}

/// Connect, follow redirects, stream the body. Returns the byte count.
async fn fetch_to_file<E: EventEmitter>(
    shared: &Shared<E>,
    job: &TransferJob,
) -> Result<u64, DownloadError> {
    let mut url = job.url.clone();
    let mut budget = RedirectBudget::new(shared.max_redirects);

    loop {
        if let Some(parent) = job.file_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::fs(parent, e))?;
        }
        let file = tokio::fs::File::create(&job.file_path)
            .await
            .map_err(|e| DownloadError::fs(&job.file_path, e))?;

        let response = tokio::time::timeout(shared.idle_timeout, shared.client.get(&url).send())
            .await
            .map_err(|_| DownloadError::Stalled(shared.idle_timeout))??;

        let status = response.status();
        if is_redirect(status) {
            drop(file);
            discard_partial(&job.file_path).await;

            let Some(target) = redirect_target(&url, &response) else {
                return Err(DownloadError::HttpStatus {
                    status: status.as_u16(),
                    url,
                });
            };
            budget.hop(&target)?;
            tracing::debug!(
                "[transfer] {} redirect {} ({}/{}) -> {}",
                job.id,
                status.as_u16(),
                budget.hops(),
                shared.max_redirects,
                target
            );
            update_url(shared, job, &target).await;
            url = target;
            continue;
        }

        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        return stream_body(shared, job, response, file).await;
    }
}

async fn stream_body<E: EventEmitter>(
    shared: &Shared<E>,
    job: &TransferJob,
    response: reqwest::Response,
    file: tokio::fs::File,
) -> Result<u64, DownloadError> {
    let total = response.content_length().unwrap_or(0);
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    record_response(shared, job, total, content_type).await;

    let mut file = tokio::io::BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut reported: Option<u8> = None;

    loop {
        match tokio::time::timeout(shared.idle_timeout, stream.next()).await {
            Ok(Some(Ok(chunk))) => {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| DownloadError::fs(&job.file_path, e))?;
                downloaded += chunk.len() as u64;

                let pct = progress_percent(downloaded, total);
                let advanced = pct.filter(|p| Some(*p) > reported);
                if advanced.is_some() {
                    reported = advanced;
                }
                record_progress(shared, job, downloaded, total, advanced).await;
            }
            Ok(Some(Err(e))) => return Err(DownloadError::Network(e)),
            Ok(None) => break,
            Err(_) => return Err(DownloadError::Stalled(shared.idle_timeout)),
        }
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::fs(&job.file_path, e))?;

    if total > 0 && downloaded < total {
        return Err(DownloadError::Incomplete {
            received: downloaded,
            expected: total,
        });
    }
    Ok(downloaded)
}

async fn update_url<E: EventEmitter>(shared: &Shared<E>, job: &TransferJob, url: &str) {
    let mut state = shared.state.lock().await;
    if !state.queue.is_current(&job.id, job.generation) {
        return;
    }
    if let Some(item) = state.registry.get_mut(&job.id) {
        item.url = url.to_string();
    }
}

async fn record_response<E: EventEmitter>(
    shared: &Shared<E>,
    job: &TransferJob,
    total: u64,
    content_type: Option<String>,
) {
    let mut state = shared.state.lock().await;
    if !state.queue.is_current(&job.id, job.generation) {
        return;
    }
    if let Some(item) = state.registry.record_bytes(&job.id, 0, total) {
        item.content_type = content_type;
    }
}

/// `report` carries the percentage to announce when it has advanced. The
/// event reports the true figure; the stored one waits for completion to
/// reach 100.
async fn record_progress<E: EventEmitter>(
    shared: &Shared<E>,
    job: &TransferJob,
    downloaded: u64,
    total: u64,
    report: Option<u8>,
) {
    let mut state = shared.state.lock().await;
    if !state.queue.is_current(&job.id, job.generation) {
        return;
    }
    if state.registry.record_bytes(&job.id, downloaded, total).is_none() {
        return;
    }
    if let Some(progress) = report {
        shared.emitter.emit(DownloadEvent::Progress(ProgressUpdate {
            id: job.id.clone(),
            progress,
            downloaded_bytes: downloaded,
            total_bytes: total,
        }));
    }
}

/// Records the outcome and frees the slot. Returns true when the attempt was
/// superseded (cancelled or paused) and its file must go.
async fn finish<E: EventEmitter>(
    shared: &Arc<Shared<E>>,
    job: &TransferJob,
    result: Result<u64, DownloadError>,
) -> bool {
    let mut state = shared.state.lock().await;
    if !state.queue.is_current(&job.id, job.generation) {
        tracing::debug!("[transfer] {} attempt {} superseded", job.id, job.generation);
        return true;
    }
    state.queue.take_active(&job.id);
    state.queue.release(&job.id);

    match result {
        Ok(bytes) => {
            if let Some(item) = state.registry.transition(&job.id, DownloadStatus::Completed) {
                item.downloaded_bytes = bytes;
                if item.total_bytes == 0 {
                    item.total_bytes = bytes;
                }
                tracing::info!(
                    "[transfer] {} completed: {} bytes -> {}",
                    job.id,
                    bytes,
                    job.file_path.display()
                );
                shared.emitter.emit(DownloadEvent::Completed(item.clone()));
            }
        }
        Err(e) => {
            let message = e.to_string();
            if let Some(item) = state.registry.transition(&job.id, DownloadStatus::Error) {
                item.error_message = Some(message.clone());
                tracing::warn!("[transfer] {} failed: {}", job.id, message);
                shared.emitter.emit(DownloadEvent::Error {
                    id: item.id.clone(),
                    url: item.url.clone(),
                    message,
                });
            }
        }
    }

    try_start_next(shared, &mut state);
    false
}

async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("[transfer] removed partial {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("[transfer] could not remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_unknown_total() {
        assert_eq!(progress_percent(1234, 0), None);
    }

    #[test]
    fn percent_floors() {
        assert_eq!(progress_percent(0, 3), Some(0));
        assert_eq!(progress_percent(1, 3), Some(33));
        assert_eq!(progress_percent(2, 3), Some(66));
        assert_eq!(progress_percent(3, 3), Some(100));
        assert_eq!(progress_percent(999, 1000), Some(99));
    }

    #[test]
    fn percent_caps_overrun() {
        assert_eq!(progress_percent(2000, 1000), Some(100));
    }

    #[test]
    fn percent_handles_huge_sizes() {
        assert_eq!(progress_percent(u64::MAX / 2, u64::MAX), Some(49));
    }
}
