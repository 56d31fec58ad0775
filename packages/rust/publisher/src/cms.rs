//! Headless CMS REST client (Strapi-style collection endpoints).

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use pagesmith_shared::{CmsConfig, PagesmithError, PublishAction, Result, ServiceEndpoint};

/// User-Agent string for CMS requests.
const USER_AGENT: &str = concat!("Pagesmith/", env!("CARGO_PKG_VERSION"));

/// Result of a confirmed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmsWrite {
    pub id: String,
    pub action: PublishAction,
}

/// Client for one CMS collection.
#[derive(Debug, Clone)]
pub struct CmsClient {
    client: Client,
    endpoint: String,
    token: String,
    wrap_data: bool,
}

impl CmsClient {
    pub fn new(config: &CmsConfig, service: &ServiceEndpoint) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PagesmithError::Publish(format!("failed to build HTTP client: {e}")))?;

        let path = config.collection_path.trim_matches('/');
        Ok(Self {
            client,
            endpoint: format!("{}/{path}", service.base_url.trim_end_matches('/')),
            token: service.token.clone(),
            wrap_data: config.wrap_data,
        })
    }

    /// Create the record for `slug`, or update it if one already exists.
    #[instrument(skip(self, payload), fields(endpoint = %self.endpoint))]
    pub async fn upsert<T: Serialize>(&self, slug: &str, payload: &T) -> Result<CmsWrite> {
        let body = if self.wrap_data {
            serde_json::json!({ "data": payload })
        } else {
            serde_json::to_value(payload)
                .map_err(|e| PagesmithError::Publish(format!("serialize payload: {e}")))?
        };

        let (request, action) = match self.find_by_slug(slug).await? {
            Some(id) => {
                debug!(%id, "existing record found, updating");
                (
                    self.client.put(format!("{}/{id}", self.endpoint)),
                    PublishAction::Updated,
                )
            }
            None => (self.client.post(&self.endpoint), PublishAction::Created),
        };

        let response = request
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PagesmithError::Publish(format!("CMS unreachable: {e}")))?;

        let json = read_json(response).await?;
        let id = record_id(&json).ok_or_else(|| {
            PagesmithError::Publish("CMS response carries no record identifier".into())
        })?;

        Ok(CmsWrite { id, action })
    }

    /// Look up an existing record's identifier by slug.
    async fn find_by_slug(&self, slug: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("filters[slug][$eq]", slug)])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| PagesmithError::Publish(format!("CMS unreachable: {e}")))?;

        // Collections without filter support answer 404/405; treat as "not found".
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED
        ) {
            debug!(status = %response.status(), "slug lookup unsupported");
            return Ok(None);
        }

        let json = read_json(response).await?;
        let items: &[Value] = match json.get("data") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => match &json {
                Value::Array(items) => items.as_slice(),
                _ => &[],
            },
        };

        // Some routes ignore the filter and list everything.
        let found = items.iter().find(|item| item_slug(item) == Some(slug));
        if found.is_none() && !items.is_empty() {
            debug!(listed = items.len(), "no listed record matches the slug");
        }

        Ok(found.and_then(|item| {
            item.get("documentId")
                .or_else(|| item.get("id"))
                .and_then(id_string)
        }))
    }
}

/// Check the status and decode the body, mapping failures to publish errors.
async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| PagesmithError::Publish(format!("failed to read CMS response: {e}")))?;

    if !status.is_success() {
        let detail = error_message(&text);
        warn!(%status, error = %detail, "CMS rejected request");
        let kind = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "authentication failed",
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => "validation failed",
            _ => "request failed",
        };
        return Err(PagesmithError::Publish(format!(
            "{kind} (HTTP {status}): {detail}"
        )));
    }

    serde_json::from_str(&text)
        .map_err(|e| PagesmithError::Publish(format!("invalid CMS response body: {e}")))
}

/// Strapi errors look like `{"error": {"message": ...}}`; fall back to raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Identifier of a written record: `data.documentId`, `data.id`, `id`, or
/// `documentId`.
fn record_id(json: &Value) -> Option<String> {
    [
        json.pointer("/data/documentId"),
        json.pointer("/data/id"),
        json.get("id"),
        json.get("documentId"),
    ]
    .into_iter()
    .flatten()
    .find_map(id_string)
}

/// Slug of a listed record, flat (v5) or under `attributes` (v4).
fn item_slug(item: &Value) -> Option<&str> {
    item.get("slug")
        .or_else(|| item.pointer("/attributes/slug"))
        .and_then(Value::as_str)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
