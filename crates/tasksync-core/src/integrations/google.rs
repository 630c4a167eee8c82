//! Google Calendar client.
//!
//! Every call carries a bearer token from the injected [`TokenSource`] and is
//! wrapped in the rate-limit backoff loop. A 403 whose first error reason is
//! `rateLimitExceeded` is retried; any other failure is returned at once.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::oauth::TokenSource;
use crate::error::SyncError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::sync::retry::{retry_with_backoff, Attempt, RetryPolicy};
use crate::sync::types::{CalendarEvent, EventPayload, Plan};

const RATE_LIMIT_REASON: &str = "rateLimitExceeded";

/// `{"error": {...}}` envelope returned by Google APIs on failure.
#[derive(Debug, Default, Deserialize)]
struct GoogleApiErrorResponse {
    #[serde(default)]
    error: Option<GoogleApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleApiError {
    #[serde(default)]
    errors: Vec<GoogleApiErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleApiErrorDetail {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

/// Reason text when `resp` is a rate-limit refusal, `None` otherwise.
fn rate_limit_reason(resp: &HttpResponse) -> Option<String> {
    if resp.status != 403 {
        return None;
    }
    let envelope: GoogleApiErrorResponse = resp.json().ok()?;
    let error = envelope.error?;
    let first = error.errors.first()?;
    if first.reason != RATE_LIMIT_REASON {
        return None;
    }

    let message = if first.message.is_empty() {
        error.message.unwrap_or_else(|| "Rate limit exceeded".to_string())
    } else {
        first.message.clone()
    };
    Some(message)
}

/// Authenticated client for one calendar.
pub struct CalendarClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenSource>,
    api_base: String,
    calendar_id: String,
    retry: RetryPolicy,
}

impl CalendarClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<dyn TokenSource>,
        api_base: impl Into<String>,
        calendar_id: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            tokens,
            api_base: api_base.into(),
            calendar_id: calendar_id.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `{api_base}/calendars/{calendarId}/events`
    pub fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.calendar_id)
        )
    }

    /// `{api_base}/calendars/{calendarId}/events/{eventId}`
    pub fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    /// One authenticated call, classified for the backoff loop.
    async fn attempt<T>(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Attempt<T>
    where
        T: DeserializeOwned + Default,
    {
        let token = match self.tokens.get_token().await {
            Ok(token) => token,
            Err(err) => return Attempt::Fatal(err),
        };

        let mut request = HttpRequest::new(method, url)
            .bearer_auth(&token)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(body.clone());
        }

        let resp = match self.transport.send(request).await {
            Ok(resp) => resp,
            Err(err) => return Attempt::Fatal(err.into()),
        };

        if let Some(reason) = rate_limit_reason(&resp) {
            return Attempt::Retryable(reason);
        }
        if !resp.is_success() {
            return Attempt::Fatal(SyncError::ApiRequest {
                status: resp.status,
                body: resp.body,
            });
        }
        if method == Method::Delete {
            return Attempt::Ok(T::default());
        }

        match resp.json() {
            Ok(value) => Attempt::Ok(value),
            Err(err) => Attempt::Fatal(err.into()),
        }
    }

    /// Issue `method url` with an optional JSON body, retrying rate limits.
    ///
    /// A successful DELETE yields `T::default()` since Google sends no body.
    ///
    /// # Errors
    /// `RateLimit` once retries are exhausted, `ApiRequest` for any other
    /// non-success status, and token errors as returned by the token source.
    pub async fn request<T>(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, SyncError>
    where
        T: DeserializeOwned + Default,
    {
        tracing::debug!(%method, url, "calendar request");
        retry_with_backoff(&self.retry, move || self.attempt(method, url, body)).await
    }

    pub async fn create_event(&self, payload: &EventPayload) -> Result<CalendarEvent, SyncError> {
        let body = serde_json::to_value(payload)?;
        self.request(Method::Post, &self.events_url(), Some(&body)).await
    }

    pub async fn update_event(
        &self,
        event_id: &str,
        payload: &EventPayload,
    ) -> Result<CalendarEvent, SyncError> {
        let body = serde_json::to_value(payload)?;
        self.request(Method::Put, &self.event_url(event_id), Some(&body))
            .await
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<CalendarEvent, SyncError> {
        self.request(Method::Delete, &self.event_url(event_id), None)
            .await
    }

    /// Carry out a plan. Skips make no call and return `None`.
    pub async fn apply(&self, plan: &Plan) -> Result<Option<CalendarEvent>, SyncError> {
        let event = match plan {
            Plan::Skip(_) => return Ok(None),
            Plan::Create(payload) => self.create_event(payload).await?,
            Plan::Update { event_id, payload } => self.update_event(event_id, payload).await?,
            Plan::Delete { event_id } => self.delete_event(event_id).await?,
        };
        Ok(Some(event))
    }
}
