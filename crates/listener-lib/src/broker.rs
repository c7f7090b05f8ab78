//! SkyPortal API client
//!
//! Thin reqwest wrapper over the broker endpoints the pipeline needs:
//! liveness, token check, spectra search/detail, source detail, and comment
//! creation. The [`SpectraBroker`] trait is the seam the poll loop and the
//! reporters are written against, so tests can run without a live broker.

use crate::error::ListenerError;
use crate::models::{SourceInfo, Spectrum, SpectrumSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Map, Value};
use url::Url;

/// Timestamp format the broker accepts for modified-time filters
/// (ISO, no UTC offset suffix).
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Filters for the spectra search endpoint.
#[derive(Debug, Clone, Default)]
pub struct SpectraQuery {
    pub obj_id: Option<String>,
    pub instrument_ids: Vec<i64>,
    pub group_ids: Vec<i64>,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    /// Request metadata-only summaries instead of full flux arrays.
    pub minimal: bool,
}

impl SpectraQuery {
    fn to_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        if let Some(obj_id) = &self.obj_id {
            params.insert("objID".to_string(), json!(obj_id));
        }
        if !self.instrument_ids.is_empty() {
            params.insert("instrumentIDs".to_string(), json!(join_ids(&self.instrument_ids)));
        }
        if !self.group_ids.is_empty() {
            params.insert("groupIDs".to_string(), json!(join_ids(&self.group_ids)));
        }
        if let Some(after) = &self.modified_after {
            params.insert("modifiedAfter".to_string(), json!(after.format(TIME_FORMAT).to_string()));
        }
        if let Some(before) = &self.modified_before {
            params.insert("modifiedBefore".to_string(), json!(before.format(TIME_FORMAT).to_string()));
        }
        if self.minimal {
            params.insert("minimalPayload".to_string(), json!(true));
        }
        params
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Base64-encoded image attached to a broker comment.
#[derive(Debug, Clone)]
pub struct CommentAttachment {
    pub name: String,
    pub body_base64: String,
}

/// Broker operations the pipeline depends on.
#[async_trait]
pub trait SpectraBroker: Send + Sync {
    async fn search_spectra(
        &self,
        query: &SpectraQuery,
    ) -> Result<Vec<SpectrumSummary>, ListenerError>;

    async fn get_spectrum(&self, id: i64) -> Result<Spectrum, ListenerError>;

    async fn get_source(&self, obj_id: &str) -> Result<SourceInfo, ListenerError>;

    async fn post_comment(
        &self,
        obj_id: &str,
        text: &str,
        attachment: Option<&CommentAttachment>,
    ) -> Result<(), ListenerError>;
}

/// SkyPortal REST client.
pub struct SkyPortalClient {
    client: Client,
    base_url: Url,
}

impl SkyPortalClient {
    /// Build a client for `base_url` authenticating with `token`.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("token {token}"))
            .context("API token contains invalid header characters")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid broker URL")?;

        Ok(Self { client, base_url })
    }

    /// Liveness check against the broker's sysinfo endpoint.
    pub async fn ping(&self) -> Result<(), ListenerError> {
        let unavailable = || ListenerError::BrokerUnavailable {
            url: self.base_url.to_string(),
        };
        let (status, _) = self
            .request(Method::GET, "api/sysinfo", None)
            .await
            .map_err(|_| unavailable())?;
        if status.is_success() {
            Ok(())
        } else {
            Err(unavailable())
        }
    }

    /// Token check against the broker's config endpoint.
    pub async fn check_auth(&self) -> Result<(), ListenerError> {
        let (status, _) = self.request(Method::GET, "api/config", None).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(ListenerError::AuthenticationFailed)
        }
    }

    /// Generic broker request in the `(status, JSON body)` shape.
    ///
    /// A GET payload is flattened into query parameters; any other method
    /// sends it as a JSON body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
    ) -> Result<(StatusCode, Value), ListenerError> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ListenerError::FetchFailed {
                status: 0,
                detail: format!("invalid endpoint path {path:?}: {e}"),
            })?;

        let mut request = self.client.request(method.clone(), url);
        if let Some(payload) = payload {
            if method == Method::GET {
                request = request.query(&query_pairs(&payload));
            } else {
                request = request.json(&payload);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .unwrap_or_else(|e| json!({ "message": format!("invalid JSON body: {e}") }));
        Ok((status, body))
    }

    async fn get_data(&self, path: &str, payload: Option<Value>) -> Result<Value, ListenerError> {
        let (status, mut body) = self.request(Method::GET, path, payload).await?;
        if !status.is_success() {
            return Err(fetch_failed(status, &body));
        }
        Ok(body
            .as_object_mut()
            .and_then(|o| o.remove("data"))
            .unwrap_or(Value::Null))
    }
}

fn fetch_failed(status: StatusCode, body: &Value) -> ListenerError {
    let detail = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    ListenerError::FetchFailed {
        status: status.as_u16(),
        detail,
    }
}

fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    match payload {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: Value, what: &str) -> Result<T, ListenerError> {
    serde_json::from_value(data).map_err(|e| ListenerError::FetchFailed {
        status: 0,
        detail: format!("unexpected {what} payload shape: {e}"),
    })
}

#[async_trait]
impl SpectraBroker for SkyPortalClient {
    async fn search_spectra(
        &self,
        query: &SpectraQuery,
    ) -> Result<Vec<SpectrumSummary>, ListenerError> {
        let params = query.to_params();
        if params.is_empty() {
            return Err(ListenerError::FetchFailed {
                status: 0,
                detail: "spectra search needs at least one filter".to_string(),
            });
        }
        let data = self
            .get_data("api/spectra", Some(Value::Object(params)))
            .await?;
        decode(data, "spectra search")
    }

    async fn get_spectrum(&self, id: i64) -> Result<Spectrum, ListenerError> {
        let data = self.get_data(&format!("api/spectra/{id}"), None).await?;
        decode(data, "spectrum detail")
    }

    async fn get_source(&self, obj_id: &str) -> Result<SourceInfo, ListenerError> {
        let data = self.get_data(&format!("api/sources/{obj_id}"), None).await?;
        decode(data, "source detail")
    }

    async fn post_comment(
        &self,
        obj_id: &str,
        text: &str,
        attachment: Option<&CommentAttachment>,
    ) -> Result<(), ListenerError> {
        let mut payload = json!({ "text": text });
        if let Some(attachment) = attachment {
            payload["attachment"] = json!({
                "body": attachment.body_base64,
                "name": attachment.name,
            });
        }

        let (status, body) = self
            .request(
                Method::POST,
                &format!("api/sources/{obj_id}/comments"),
                Some(payload),
            )
            .await?;
        if !status.is_success() {
            return Err(fetch_failed(status, &body));
        }
        Ok(())
    }
}
