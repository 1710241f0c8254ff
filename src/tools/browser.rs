//! Browser launch

use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

/// Arguments of `open_browser`
#[derive(Debug, Deserialize)]
pub struct OpenBrowserArgs {
    pub url: String,
}

/// Normalize a spoken or typed URL to an http(s) URL
///
/// A bare host such as `example.com` gets an `https://` scheme.
///
/// # Errors
///
/// Returns a message if the URL cannot be parsed or uses another scheme
pub fn normalize_url(raw: &str) -> Result<Url, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("url is empty".to_string());
    }

    let parsed = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{raw}"))
            .map_err(|e| format!("invalid url {raw}: {e}"))?,
        Err(e) => return Err(format!("invalid url {raw}: {e}")),
    };

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(format!("unsupported url scheme: {other}")),
    }
}

/// Open `url` in the default browser without waiting for it
///
/// Launch failures are logged and never reach the caller.
pub fn open_detached(url: &Url) {
    let target = url.to_string();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = open::that(&target) {
            tracing::warn!(url = %target, error = %e, "failed to open browser");
        } else {
            tracing::debug!(url = %target, "browser opened");
        }
    });
}

/// `open_browser` handler
///
/// # Errors
///
/// Returns a message if the URL is rejected
#[allow(clippy::unused_async)]
pub async fn handle_open(args: OpenBrowserArgs) -> Result<Value, String> {
    let url = normalize_url(&args.url)?;
    open_detached(&url);
    Ok(json!({ "status": "opening", "url": url.as_str() }))
}
