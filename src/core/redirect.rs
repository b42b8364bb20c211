use reqwest::header::LOCATION;
use reqwest::StatusCode;

use crate::core::error::DownloadError;

pub fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Resolves a `Location` value against the URL that produced it, so relative
/// targets like `/cdn/x.mp4` work.
pub fn resolve_location(current: &str, location: &str) -> Option<String> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }
    let base = url::Url::parse(current).ok()?;
    base.join(location).ok().map(|u| u.to_string())
}

pub fn redirect_target(current: &str, response: &reqwest::Response) -> Option<String> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    resolve_location(current, location)
}

/// Counts hops for one transfer.
pub struct RedirectBudget {
    limit: u32,
    hops: u32,
}

impl RedirectBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, hops: 0 }
    }

    pub fn hops(&self) -> u32 {
        self.hops
    }

    pub fn hop(&mut self, target: &str) -> Result<(), DownloadError> {
        if self.hops >= self.limit {
            return Err(DownloadError::RedirectLoop {
                limit: self.limit,
                url: target.to_string(),
            });
        }
        self.hops += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_statuses() {
        for code in [301u16, 302, 303, 307, 308] {
            assert!(is_redirect(StatusCode::from_u16(code).unwrap()), "{}", code);
        }
        for code in [200u16, 204, 304, 404, 500] {
            assert!(!is_redirect(StatusCode::from_u16(code).unwrap()), "{}", code);
        }
    }

    #[test]
    fn absolute_location_wins() {
        assert_eq!(
            resolve_location("http://a.example/x", "https://b.example/y.mp4").as_deref(),
            Some("https://b.example/y.mp4")
        );
    }

    #[test]
    fn relative_location_joins_base() {
        assert_eq!(
            resolve_location("http://a.example/dir/x", "/cdn/y.mp4").as_deref(),
            Some("http://a.example/cdn/y.mp4")
        );
        assert_eq!(
            resolve_location("http://a.example/dir/x", "y.mp4").as_deref(),
            Some("http://a.example/dir/y.mp4")
        );
    }

    #[test]
    fn blank_location_is_unusable() {
        assert!(resolve_location("http://a.example/x", "  ").is_none());
    }

    #[test]
    fn budget_allows_exactly_limit_hops() {
        let mut budget = RedirectBudget::new(2);
        assert!(budget.hop("http://h/1").is_ok());
        assert!(budget.hop("http://h/2").is_ok());
        let err = budget.hop("http://h/3").unwrap_err();
        assert!(matches!(err, DownloadError::RedirectLoop { limit: 2, .. }));
        assert_eq!(budget.hops(), 2);
    }

    #[test]
    fn zero_budget_rejects_first_hop() {
        assert!(RedirectBudget::new(0).hop("http://h/").is_err());
    }
}
