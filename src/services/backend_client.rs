use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use url::Url;

use crate::error::{AppError, AppResult};

const ERROR_DETAIL_MAX_CHARS: usize = 240;

/// Read-only access to the REST backend on behalf of one caller.
#[derive(Clone, Copy)]
pub struct BackendClient<'a> {
    http_client: &'a Client,
    base_url: &'a str,
    access_token: Option<&'a str>,
}

impl<'a> BackendClient<'a> {
    pub fn new(http_client: &'a Client, base_url: &'a str, access_token: Option<&'a str>) -> Self {
        Self {
            http_client,
            base_url,
            access_token: access_token.filter(|token| !token.trim().is_empty()),
        }
    }

    /// Lists `path` scoped by `query`. Any failure (transport, non-2xx, bad
    /// JSON, missing `data` array) yields an empty list for this resource only.
    pub async fn fetch_scoped_rows<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Vec<T> {
        let url = match build_url(self.base_url, path, query) {
            Ok(url) => url,
            Err(error) => {
                tracing::warn!(path, error = %error, "Invalid backend URL, using empty list");
                return Vec::new();
            }
        };

        let response = match self.get(url).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(path, error = %error, "Backend list request failed, using empty list");
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(path, status = status.as_u16(), "Backend list returned non-success, using empty list");
            return Vec::new();
        }

        match response.json::<Value>().await {
            Ok(payload) => decode_rows(path, payload),
            Err(error) => {
                tracing::warn!(path, error = %error, "Backend list body is not JSON, using empty list");
                Vec::new()
            }
        }
    }

    /// Loads one record by id from `collection` (e.g. `/properties`).
    pub async fn fetch_record(&self, collection: &str, record_id: &str) -> AppResult<Map<String, Value>> {
        let mut url = build_url(self.base_url, collection, &[])
            .map_err(|error| AppError::Internal(format!("Invalid backend URL: {error}")))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Backend URL cannot carry a path.".to_string()))?
            .push(record_id);

        let response = self.get(url).send().await.map_err(|error| {
            AppError::Dependency(format!("Backend request failed for {collection}: {error}"))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("{collection} record not found.")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = parse_backend_error_text(&body);
            let suffix = if detail.is_empty() {
                String::new()
            } else {
                format!(": {}", detail.chars().take(ERROR_DETAIL_MAX_CHARS).collect::<String>())
            };
            let message = format!("HTTP {} for {collection}{suffix}", status.as_u16());
            let membership_error = status == StatusCode::FORBIDDEN
                && is_org_membership_error(if detail.is_empty() { &message } else { &detail });
            return Err(AppError::Backend {
                status: status.as_u16(),
                message,
                membership_error,
            });
        }

        match response.json::<Value>().await {
            Ok(Value::Object(record)) => Ok(record),
            Ok(_) => Err(AppError::Dependency(format!(
                "Backend returned a non-object record for {collection}."
            ))),
            Err(error) => Err(AppError::Dependency(format!(
                "Backend returned invalid JSON for {collection}: {error}"
            ))),
        }
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.http_client.get(url).header(ACCEPT, "application/json");
        match self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// `{base}{path}` with the non-empty query pairs appended in order.
pub fn build_url(base_url: &str, path: &str, query: &[(&str, String)]) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("{base_url}{path}"))?;
    let mut pairs = query
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .peekable();
    if pairs.peek().is_some() {
        let mut serializer = url.query_pairs_mut();
        for (key, value) in pairs {
            serializer.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Rows of the `data` array; non-object entries and undecodable rows are skipped.
pub fn decode_rows<T: DeserializeOwned>(path: &str, payload: Value) -> Vec<T> {
    let Value::Object(mut body) = payload else {
        tracing::warn!(path, "Backend list body is not an object, using empty list");
        return Vec::new();
    };
    let Some(Value::Array(rows)) = body.remove("data") else {
        tracing::warn!(path, "Backend list body has no data array, using empty list");
        return Vec::new();
    };

    rows.into_iter()
        .filter(Value::is_object)
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                tracing::debug!(path, error = %error, "Skipping undecodable backend row");
                None
            }
        })
        .collect()
}

/// Human-readable detail from a backend error body (`detail`, `error` or
/// `message`; validation lists are joined with `; `). Non-JSON bodies are
/// returned as-is.
pub fn parse_backend_error_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let Ok(parsed) = serde_json::from_str::<Value>(text) else {
        return text.to_string();
    };

    let detail = ["detail", "error", "message"]
        .iter()
        .find_map(|key| parsed.get(*key).filter(|value| !value.is_null()))
        .unwrap_or(&parsed);

    match detail {
        Value::String(message) => message.clone(),
        Value::Array(items) => {
            let messages = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .filter(|message| !message.is_empty())
                .collect::<Vec<_>>();
            if messages.is_empty() {
                detail.to_string()
            } else {
                messages.join("; ")
            }
        }
        other => other.to_string(),
    }
}

pub fn is_org_membership_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("not a member of this organization") || lower.contains("organization membership")
}
