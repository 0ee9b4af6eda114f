//! REST and streaming calls against the console backend.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use genie_core::constants::USER_AGENT;
use genie_core::errors::DirectoryError;
use genie_core::events::Notification;
use genie_core::ids::SessionId;
use genie_core::sessions::{SessionDirectory, SessionSummary};
use genie_core::text::truncate_str;
use genie_settings::ServerSettings;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::ClientError;
use crate::sse::{frame_to_notification, parse_sse_frames};

/// Maximum characters of an error body kept in [`ClientError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP client for the console backend.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    server: ServerSettings,
}

impl ApiClient {
    /// Build a client from server settings.
    ///
    /// The configured timeout applies to REST calls only; the notification
    /// stream stays open indefinitely.
    pub fn new(server: ServerSettings) -> Result<Self, ClientError> {
        let _ = parse_url(&server.url(""))?;
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http, server })
    }

    /// Server settings this client was built with.
    pub fn server(&self) -> &ServerSettings {
        &self.server
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.server.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetch one page of the session listing.
    #[instrument(skip(self))]
    pub async fn list_sessions_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SessionSummary>, ClientError> {
        let mut url = parse_url(&self.server.url(&self.server.sessions_path))?;
        let _ = url
            .query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());

        let body = self.fetch_json(url).await?;
        let entries = unwrap_list(body, "sessions")?;
        Ok(decode_entries(entries, "session"))
    }

    /// Fetch the event history of one session, oldest first.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn session_history(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Notification>, ClientError> {
        let mut url = parse_url(&self.server.url(&self.server.sessions_path))?;
        let _ = url
            .path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.server.base_url.clone()))?
            .pop_if_empty()
            .push(session_id.as_str())
            .push("events");

        let body = self.fetch_json(url).await?;
        let entries = unwrap_list(body, "events")?;
        Ok(decode_entries(entries, "event"))
    }

    /// Open the notification stream, optionally scoped to one session.
    ///
    /// The returned stream ends when the server closes the connection.
    #[instrument(skip(self))]
    pub async fn subscribe(
        &self,
        session_id: Option<&SessionId>,
    ) -> Result<BoxStream<'static, Notification>, ClientError> {
        let mut url = parse_url(&self.server.url(&self.server.notifications_path))?;
        if let Some(id) = session_id {
            let _ = url.query_pairs_mut().append_pair("session_id", id.as_str());
        }

        let response = self
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = check_status(response).await?;
        debug!("notification stream open");

        Ok(parse_sse_frames(response.bytes_stream())
            .filter_map(|frame| futures::future::ready(frame_to_notification(&frame)))
            .boxed())
    }

    async fn fetch_json(&self, url: Url) -> Result<Value, ClientError> {
        let response = self
            .get(url)
            .timeout(self.server.request_timeout())
            .send()
            .await?;
        let response = check_status(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SessionDirectory for ApiClient {
    async fn list_sessions(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SessionSummary>, DirectoryError> {
        self.list_sessions_page(limit, offset)
            .await
            .map_err(DirectoryError::from)
    }
}

fn parse_url(raw: &str) -> Result<Url, ClientError> {
    Url::parse(raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body: truncate_str(&body, MAX_ERROR_BODY_CHARS).to_string(),
    })
}

/// Accept either a bare array or an object wrapping the array under `key`.
fn unwrap_list(body: Value, key: &str) -> Result<Vec<Value>, ClientError> {
    match body {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(entries)) => Ok(entries),
            _ => Err(ClientError::Decode(format!("expected an array under {key:?}"))),
        },
        other => Err(ClientError::Decode(format!(
            "expected an array, got {}",
            json_type(&other)
        ))),
    }
}

/// Decode entries one by one, skipping malformed ones.
fn decode_entries<T: DeserializeOwned>(entries: Vec<Value>, what: &str) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!(entry = what, error = %e, "skipping malformed entry");
                None
            }
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
