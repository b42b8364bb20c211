use vidget_core::core::events::{DownloadEvent, EventEmitter};

/// Logs each event through `tracing`, then hands it to the wrapped emitter.
#[derive(Clone)]
pub struct LoggingEmitter<E: EventEmitter> {
    inner: E,
}

impl<E: EventEmitter> LoggingEmitter<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: EventEmitter> EventEmitter for LoggingEmitter<E> {
    fn emit(&self, event: DownloadEvent) {
        match &event {
            DownloadEvent::Progress(p) => tracing::trace!(
                "[events] {} {} {}% ({}/{})",
                event.name(),
                p.id,
                p.progress,
                p.downloaded_bytes,
                p.total_bytes
            ),
            DownloadEvent::Error { id, message, .. } => {
                tracing::debug!("[events] {} {}: {}", event.name(), id, message)
            }
            _ => tracing::debug!("[events] {} {}", event.name(), event.id()),
        }
        self.inner.emit(event);
    }
}
