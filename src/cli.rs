use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use vidget_core::core::events::{ChannelEmitter, DownloadEvent, Metadata};
use vidget_core::models::settings::AppSettings;

use crate::core::events::LoggingEmitter;
use crate::core::scheduler::Scheduler;
use crate::storage::config;

#[derive(Debug, Parser)]
#[command(name = "vidget")]
#[command(about = "Download videos through a bounded-concurrency queue", long_about = None)]
pub struct Cli {
    /// HTTP/HTTPS URLs to download.
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Maximum simultaneous transfers.
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<u32>,

    /// Destination directory (created if absent).
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, value_name = "N")]
    pub max_redirects: Option<u32>,

    /// Abort a transfer after this many seconds without data.
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u64>,

    /// Output file name; only valid with a single URL.
    #[arg(long)]
    pub filename: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    /// Persist the effective settings to the config file.
    #[arg(long)]
    pub save_config: bool,
}

impl Cli {
    pub fn apply(&self, settings: &mut AppSettings) {
        let d = &mut settings.download;
        if let Some(n) = self.concurrency {
            d.max_concurrent_downloads = n;
        }
        if let Some(dir) = &self.output_dir {
            d.output_dir = dir.clone();
        }
        if let Some(n) = self.max_redirects {
            d.max_redirects = n;
        }
        if let Some(secs) = self.idle_timeout {
            d.idle_timeout_secs = secs;
        }
    }

    pub fn metadata(&self) -> Metadata {
        let mut m = Metadata::new();
        if let Some(name) = &self.filename {
            m.insert("filename".into(), name.clone());
        }
        if let Some(title) = &self.title {
            m.insert("title".into(), title.clone());
        }
        m
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.filename.is_some() && cli.urls.len() > 1 {
        bail!("--filename needs exactly one URL");
    }

    let mut settings = config::load_settings();
    cli.apply(&mut settings);
    if cli.save_config {
        config::save_settings(&settings)?;
    }

    let (channel, mut events) = ChannelEmitter::new();
    let scheduler = Scheduler::new(&settings, LoggingEmitter::new(channel))
        .context("starting download queue")?;

    let mut outstanding = HashSet::new();
    for url in &cli.urls {
        outstanding.insert(scheduler.submit(url.clone(), cli.metadata()).await);
    }

    let mut failed = 0usize;
    let mut interrupted = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !outstanding.is_empty() {
        tokio::select! {
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                eprintln!("interrupted, cancelling {} download(s)", outstanding.len());
                for id in outstanding.clone() {
                    scheduler.cancel(&id).await;
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                print_event(&event);
                match &event {
                    DownloadEvent::Completed(item) => {
                        outstanding.remove(&item.id);
                    }
                    DownloadEvent::Cancelled(item) => {
                        failed += 1;
                        outstanding.remove(&item.id);
                    }
                    DownloadEvent::Error { id, .. } => {
                        failed += 1;
                        outstanding.remove(id);
                    }
                    _ => {}
                }
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} download(s) did not complete", failed, cli.urls.len());
    }
    Ok(())
}

fn print_event(event: &DownloadEvent) {
    match event {
        DownloadEvent::Queued(item) => println!("queued     {}  {}", item.id, item.url),
        DownloadEvent::Started(item) => println!(
            "started    {}  {} -> {}",
            item.id,
            item.title(),
            item.file_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        ),
        DownloadEvent::Progress(p) if p.progress % 10 == 0 => println!(
            "progress   {}  {:>3}%  {}/{} bytes",
            p.id, p.progress, p.downloaded_bytes, p.total_bytes
        ),
        DownloadEvent::Progress(_) => {}
        DownloadEvent::Completed(item) => {
            println!("completed  {}  {} bytes", item.id, item.downloaded_bytes)
        }
        DownloadEvent::Error { id, message, .. } => println!("error      {}  {}", id, message),
        DownloadEvent::Cancelled(item) => println!("cancelled  {}", item.id),
        DownloadEvent::Paused(item) => println!("paused     {}", item.id),
    }
}
