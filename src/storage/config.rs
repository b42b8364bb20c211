use std::path::{Path, PathBuf};

use anyhow::Context;
use vidget_core::fs_paths::{AppPaths, DesktopPaths, PortablePaths};
use vidget_core::models::settings::AppSettings;

const CONFIG_DIR_ENV: &str = "VIDGET_CONFIG_DIR";

pub fn settings_path() -> PathBuf {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) => PortablePaths {
            root: PathBuf::from(dir),
        }
        .settings_file(),
        None => DesktopPaths.settings_file(),
    }
}

pub fn load_settings() -> AppSettings {
    load_settings_from(&settings_path())
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings_from(path: &Path) -> AppSettings {
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return AppSettings::default(),
    };
    match serde_json::from_str::<AppSettings>(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("[config] ignoring {}: {}", path.display(), e);
            AppSettings::default()
        }
    }
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn save_settings(settings: &AppSettings) -> anyhow::Result<()> {
    save_settings_to(&settings_path(), settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from(&dir.path().join("nope.json"));
        assert_eq!(s.download.max_concurrent_downloads, 5);
    }

    #[test]
    fn garbage_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(load_settings_from(&path).download.max_redirects, 10);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut s = AppSettings::default();
        s.download.max_concurrent_downloads = 3;
        s.download.output_dir = dir.path().join("out");
        save_settings_to(&path, &s).unwrap();

        let loaded = load_settings_from(&path);
        assert_eq!(loaded.download.max_concurrent_downloads, 3);
        assert_eq!(loaded.download.output_dir, dir.path().join("out"));
    }
}
