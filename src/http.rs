use reqwest::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{SourceError, SourceResult};

/// Issue a GET and decode the JSON body into `T`.
///
/// 404 maps to [`SourceError::NotFound`], any other non-2xx status to
/// [`SourceError::Status`].
pub async fn get_json<T, Q>(
    client: &Client,
    url: &str,
    query: &Q,
    bearer: Option<&str>,
) -> SourceResult<T>
where
    T: DeserializeOwned,
    Q: serde::Serialize + ?Sized,
{
    tracing::debug!("GET {}", url);

    let mut request = client
        .get(url)
        .query(query)
        .header(reqwest::header::ACCEPT, "application/json");
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(|source| SourceError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|source| SourceError::Transport {
        url: url.to_string(),
        source,
    })?;

    serde_json::from_str(&body).map_err(|source| SourceError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Trim trailing slashes off a configured base URL
pub fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Upper bound on any caller-supplied result count
pub const MAX_LIMIT: usize = 50;

/// Resolve a caller-supplied limit: absent or non-positive falls back to
/// `default`, anything above [`MAX_LIMIT`] is clamped to it
pub fn resolve_limit(limit: Option<i64>, default: usize) -> usize {
    match limit {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(MAX_LIMIT).min(MAX_LIMIT),
        _ => default,
    }
}
