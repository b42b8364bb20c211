use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use vidget_core::core::events::DownloadStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    HttpStatus,
    Filesystem,
    RedirectLoop,
    NotFound,
    Aborted,
    InvalidState,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("no data received for {}s", .0.as_secs())]
    Stalled(Duration),

    #[error("connection closed after {received} of {expected} bytes")]
    Incomplete { received: u64, expected: u64 },

    #[error("HTTP error: {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("cannot write {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("redirect limit of {limit} exceeded at {url}")]
    RedirectLoop { limit: u32, url: String },

    #[error("no download with id {0}")]
    NotFound(String),

    #[error("download {id} is {status:?} and cannot be retried")]
    NotRetryable { id: String, status: DownloadStatus },

    #[error("transfer aborted")]
    Aborted,
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::Network(_)
            | DownloadError::Stalled(_)
            | DownloadError::Incomplete { .. } => ErrorKind::Network,
            DownloadError::HttpStatus { .. } => ErrorKind::HttpStatus,
            DownloadError::Filesystem { .. } => ErrorKind::Filesystem,
            DownloadError::RedirectLoop { .. } => ErrorKind::RedirectLoop,
            DownloadError::NotFound(_) => ErrorKind::NotFound,
            DownloadError::NotRetryable { .. } => ErrorKind::InvalidState,
            DownloadError::Aborted => ErrorKind::Aborted,
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DownloadError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_message_names_code() {
        let e = DownloadError::HttpStatus {
            status: 404,
            url: "http://h/x.mp4".into(),
        };
        assert_eq!(e.to_string(), "HTTP error: 404 from http://h/x.mp4");
        assert_eq!(e.kind(), ErrorKind::HttpStatus);
    }

    #[test]
    fn stalled_is_a_network_error() {
        let e = DownloadError::Stalled(Duration::from_secs(45));
        assert_eq!(e.kind(), ErrorKind::Network);
        assert_eq!(e.to_string(), "no data received for 45s");
    }

    #[test]
    fn filesystem_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e = DownloadError::fs("/tmp/x.mp4", io);
        assert_eq!(e.kind(), ErrorKind::Filesystem);
        assert!(std::error::Error::source(&e).is_some());
        assert!(e.to_string().contains("/tmp/x.mp4"));
    }

    #[test]
    fn redirect_loop_kind() {
        let e = DownloadError::RedirectLoop {
            limit: 10,
            url: "http://h/loop".into(),
        };
        assert_eq!(e.kind(), ErrorKind::RedirectLoop);
    }
}
