use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::fs_paths::{AppPaths, DesktopPaths};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub proxy: ProxySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: u32,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl DownloadSettings {
    /// A bound of zero would never admit anything.
    pub fn concurrency_bound(&self) -> usize {
        self.max_concurrent_downloads.max(1) as usize
    }
}

fn default_schema_version() -> u32 {
    1
}

fn default_output_dir() -> PathBuf {
    DesktopPaths.downloads_dir()
}

fn default_max_concurrent_downloads() -> u32 {
    5
}

fn default_max_redirects() -> u32 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    45
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    concat!("vidget/", env!("CARGO_PKG_VERSION")).into()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProxySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_proxy_type")]
    pub proxy_type: String,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_proxy_type() -> String {
    "http".into()
}

fn default_proxy_port() -> u16 {
    8080
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            max_redirects: default_max_redirects(),
            idle_timeout_secs: default_idle_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            download: DownloadSettings::default(),
            proxy: ProxySettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = AppSettings::default();
        assert_eq!(s.download.max_concurrent_downloads, 5);
        assert_eq!(s.download.max_redirects, 10);
        assert_eq!(s.download.idle_timeout_secs, 45);
        assert_eq!(s.download.output_dir, DesktopPaths.downloads_dir());
        assert!(!s.proxy.enabled);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: AppSettings =
            serde_json::from_str(r#"{"download":{"max_concurrent_downloads":2}}"#).unwrap();
        assert_eq!(s.schema_version, 1);
        assert_eq!(s.download.max_concurrent_downloads, 2);
        assert_eq!(s.download.max_redirects, 10);
        assert_eq!(s.proxy.proxy_type, "http");
        assert_eq!(s.proxy.port, 8080);
    }

    #[test]
    fn zero_bound_is_clamped() {
        let s = DownloadSettings {
            max_concurrent_downloads: 0,
            ..DownloadSettings::default()
        };
        assert_eq!(s.concurrency_bound(), 1);
    }
}
