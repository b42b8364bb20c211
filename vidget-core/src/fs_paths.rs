use std::path::PathBuf;

pub trait AppPaths: Send + Sync {
    fn downloads_dir(&self) -> PathBuf;
    fn config_dir(&self) -> PathBuf;

    fn settings_file(&self) -> PathBuf {
        self.config_dir().join("settings.json")
    }
}

pub struct DesktopPaths;

impl AppPaths for DesktopPaths {
    fn downloads_dir(&self) -> PathBuf {
        dirs::download_dir()
            .map(|d| d.join("vidget"))
            .unwrap_or_else(|| PathBuf::from("downloads"))
    }

    fn config_dir(&self) -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("vidget"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Rooted under one directory; for portable installs and tests.
pub struct PortablePaths {
    pub root: PathBuf,
}

impl AppPaths for PortablePaths {
    fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    fn config_dir(&self) -> PathBuf {
        self.root.clone()
    }
}
