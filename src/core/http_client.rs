use std::time::Duration;

use vidget_core::models::settings::{AppSettings, ProxySettings};

use crate::core::error::DownloadError;

/// Redirects are followed by the transfer itself so the item URL tracks each
/// hop; the client must hand 3xx responses back untouched.
pub fn build_client(settings: &AppSettings) -> Result<reqwest::Client, DownloadError> {
    let builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(settings.download.connect_timeout_secs))
        .user_agent(settings.download.user_agent.clone());
    let builder = apply_proxy(builder, &settings.proxy);
    Ok(builder.build()?)
}

pub fn proxy_url(proxy: &ProxySettings) -> Option<String> {
    if !proxy.enabled || proxy.host.is_empty() {
        return None;
    }
    let scheme = match proxy.proxy_type.as_str() {
        "socks5" => "socks5",
        "https" => "https",
        _ => "http",
    };
    if !proxy.username.is_empty() {
        Some(format!(
            "{}://{}:{}@{}:{}",
            scheme, proxy.username, proxy.password, proxy.host, proxy.port
        ))
    } else {
        Some(format!("{}://{}:{}", scheme, proxy.host, proxy.port))
    }
}

pub fn apply_proxy(
    builder: reqwest::ClientBuilder,
    proxy: &ProxySettings,
) -> reqwest::ClientBuilder {
    let Some(url) = proxy_url(proxy) else {
        return builder;
    };
    match reqwest::Proxy::all(&url) {
        Ok(p) => builder.proxy(p),
        Err(e) => {
            tracing::warn!("[http] invalid proxy URL: {}", e);
            builder
        }
    }
}
