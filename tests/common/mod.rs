#![allow(dead_code)]

pub mod trickle_server;

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use vidget_core::core::events::{ChannelEmitter, DownloadEvent};
use vidget_core::models::settings::AppSettings;
use vidget_lib::Scheduler;

const EVENT_TIMEOUT: Duration = Duration::from_secs(20);

pub fn settings(root: &Path, bound: u32) -> AppSettings {
    let mut s = AppSettings::default();
    s.download.output_dir = root.join("out");
    s.download.max_concurrent_downloads = bound;
    s.download.idle_timeout_secs = 10;
    s
}

pub fn scheduler(settings: &AppSettings) -> (Scheduler<ChannelEmitter>, EventLog) {
    let (emitter, rx) = ChannelEmitter::new();
    let scheduler = Scheduler::new(settings, emitter).expect("scheduler");
    (scheduler, EventLog::new(rx))
}

pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Records every event received so assertions can look back over the run.
pub struct EventLog {
    rx: UnboundedReceiver<DownloadEvent>,
    pub seen: Vec<DownloadEvent>,
}

impl EventLog {
    pub fn new(rx: UnboundedReceiver<DownloadEvent>) -> Self {
        Self {
            rx,
            seen: Vec::new(),
        }
    }

    pub async fn next(&mut self) -> DownloadEvent {
        let event = tokio::time::timeout(EVENT_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed");
        self.seen.push(event.clone());
        event
    }

    pub async fn until(&mut self, pred: impl Fn(&DownloadEvent) -> bool) -> DownloadEvent {
        loop {
            let event = self.next().await;
            if pred(&event) {
                return event;
            }
        }
    }

    pub async fn until_finished(&mut self, n: usize) {
        while self.seen.iter().filter(|e| is_terminal(e)).count() < n {
            self.next().await;
        }
    }

    /// Pulls whatever is already buffered without waiting.
    pub fn drain(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.seen.push(event);
        }
    }

    pub fn count(&self, name: &str, id: &str) -> usize {
        self.seen
            .iter()
            .filter(|e| e.name() == name && e.id() == id)
            .count()
    }

    pub fn started_ids(&self) -> Vec<String> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                DownloadEvent::Started(item) => Some(item.id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn progress_for(&self, id: &str) -> Vec<u8> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                DownloadEvent::Progress(p) if p.id == id => Some(p.progress),
                _ => None,
            })
            .collect()
    }

    /// Highest number of simultaneously running transfers implied by the
    /// event order.
    pub fn peak_concurrency(&self) -> usize {
        let mut running = HashSet::new();
        let mut peak = 0usize;
        for e in &self.seen {
            match e {
                DownloadEvent::Started(item) => {
                    running.insert(item.id.clone());
                    peak = peak.max(running.len());
                }
                DownloadEvent::Progress(_) | DownloadEvent::Queued(_) => {}
                other => {
                    running.remove(other.id());
                }
            }
        }
        peak
    }
}

pub fn is_terminal(event: &DownloadEvent) -> bool {
    matches!(
        event,
        DownloadEvent::Completed(_) | DownloadEvent::Error { .. } | DownloadEvent::Cancelled(_)
    )
}
