//! Notion database as the task record store.
//!
//! Pages are read with a single database query and decoded into [`Task`]
//! snapshots. Write-backs patch the event-id and last-update properties of
//! one page.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::traits::{RecordStore, WriteBack};
use crate::config::PropertyNames;
use crate::error::SyncError;
use crate::http::{HttpRequest, HttpTransport, Method};
use crate::sync::event_mapper::render_instant;
use crate::sync::types::{InvalidTaskTime, Task, TaskTime};

pub const NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_API_BASE: &str = "https://api.notion.com/v1";

const UNTITLED: &str = "Untitled";

/// Response of `POST /databases/{id}/query`.
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<Page>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub in_trash: bool,
    /// Pre-2024 spelling of `in_trash`.
    #[serde(default)]
    pub archived: bool,
    pub last_edited_time: DateTime<Utc>,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

/// A page property, tagged by its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title {
        #[serde(default)]
        title: Vec<RichText>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RichText>,
    },
    Date {
        #[serde(default)]
        date: Option<DateValue>,
    },
    Status {
        #[serde(default)]
        status: Option<SelectOption>,
    },
    Select {
        #[serde(default)]
        select: Option<SelectOption>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub text: Option<TextContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateValue {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub name: String,
}

impl RichText {
    fn text(&self) -> &str {
        if !self.plain_text.is_empty() {
            return &self.plain_text;
        }
        self.text.as_ref().map(|t| t.content.as_str()).unwrap_or("")
    }
}

impl PropertyValue {
    /// Text of the first title or rich-text fragment.
    pub fn first_text(&self) -> Option<&str> {
        let fragments = match self {
            PropertyValue::Title { title } => title,
            PropertyValue::RichText { rich_text } => rich_text,
            _ => return None,
        };
        fragments.first().map(RichText::text).filter(|t| !t.is_empty())
    }

    pub fn date(&self) -> Option<&DateValue> {
        match self {
            PropertyValue::Date { date } => date.as_ref(),
            _ => None,
        }
    }

    /// Option name of a status or select property.
    pub fn option_name(&self) -> Option<&str> {
        match self {
            PropertyValue::Status { status } => status.as_ref().map(|o| o.name.as_str()),
            PropertyValue::Select { select } => select.as_ref().map(|o| o.name.as_str()),
            _ => None,
        }
    }
}

fn parse_optional(raw: Option<&str>) -> Result<Option<TaskTime>, InvalidTaskTime> {
    raw.filter(|s| !s.is_empty()).map(TaskTime::parse).transpose()
}

/// Date-only values count as midnight UTC.
fn to_instant(time: TaskTime) -> DateTime<Utc> {
    match time {
        TaskTime::Date(date) => date.and_time(NaiveTime::MIN).and_utc(),
        TaskTime::DateTime { at, .. } => at.with_timezone(&Utc),
    }
}

impl Page {
    fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Decode into a task snapshot using the configured property names.
    ///
    /// # Errors
    /// Fails when a date property is neither a calendar date nor RFC3339.
    pub fn to_task(&self, names: &PropertyNames) -> Result<Task, InvalidTaskTime> {
        let name = self
            .property(&names.name)
            .and_then(PropertyValue::first_text)
            .unwrap_or(UNTITLED)
            .to_string();

        let dates = self.property(&names.date).and_then(PropertyValue::date);
        let start = parse_optional(dates.and_then(|d| d.start.as_deref()))?;
        let end = parse_optional(dates.and_then(|d| d.end.as_deref()))?;

        let status = self
            .property(&names.status)
            .and_then(PropertyValue::option_name)
            .unwrap_or_default()
            .to_string();

        let stored_event_id = self
            .property(&names.event_id)
            .and_then(PropertyValue::first_text)
            .map(str::to_string);

        let last_update_at = parse_optional(
            self.property(&names.last_update_at)
                .and_then(PropertyValue::date)
                .and_then(|d| d.start.as_deref()),
        )?
        .map(to_instant);

        let location = self
            .property(&names.location)
            .and_then(PropertyValue::first_text)
            .map(str::to_string);

        Ok(Task {
            id: self.id.clone(),
            name,
            start,
            end,
            status,
            in_trash: self.in_trash || self.archived,
            stored_event_id,
            last_update_at,
            last_edited_time: self.last_edited_time,
            location,
        })
    }
}

/// Notion client bound to one tasks database.
pub struct NotionClient {
    transport: Arc<dyn HttpTransport>,
    api_key: String,
    database_id: String,
    api_base: String,
    version: String,
    properties: PropertyNames,
}

impl NotionClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_key: impl Into<String>,
        database_id: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
            database_id: database_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            version: NOTION_VERSION.to_string(),
            properties: PropertyNames::default(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_properties(mut self, properties: PropertyNames) -> Self {
        self.properties = properties;
        self
    }

    fn base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    fn request(&self, method: Method, url: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", self.version.as_str())
            .header("Content-Type", "application/json")
    }

    /// Run the database query. Only the first page of results is returned.
    ///
    /// # Errors
    /// Any failure is a `RecordFetch`.
    pub async fn query(&self) -> Result<QueryResponse, SyncError> {
        let url = format!(
            "{}/databases/{}/query",
            self.base(),
            urlencoding::encode(&self.database_id)
        );
        let resp = self
            .transport
            .send(self.request(Method::Post, url))
            .await
            .map_err(|e| SyncError::RecordFetch(e.to_string()))?;

        if !resp.is_success() {
            return Err(SyncError::RecordFetch(format!(
                "HTTP {}: {}",
                resp.status, resp.body
            )));
        }

        let page: QueryResponse = resp
            .json()
            .map_err(|e| SyncError::RecordFetch(format!("invalid query response: {e}")))?;
        if page.has_more {
            tracing::warn!(
                database = %self.database_id,
                returned = page.results.len(),
                next_cursor = page.next_cursor.as_deref().unwrap_or(""),
                "query has more results; only the first page is synced"
            );
        }
        Ok(page)
    }

    /// `{"properties": ...}` body for a write-back.
    pub fn write_back_body(&self, update: &WriteBack) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        properties.insert(
            self.properties.event_id.clone(),
            json!({
                "rich_text": [{
                    "type": "text",
                    "text": { "content": update.event_id },
                }]
            }),
        );
        properties.insert(
            self.properties.last_update_at.clone(),
            json!({
                "date": { "start": render_instant(update.updated_at) }
            }),
        );
        json!({ "properties": properties })
    }
}

#[async_trait]
impl RecordStore for NotionClient {
    fn name(&self) -> &str {
        "notion"
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>, SyncError> {
        let response = self.query().await?;

        let mut tasks = Vec::with_capacity(response.results.len());
        for page in &response.results {
            match page.to_task(&self.properties) {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    tracing::warn!(page_id = %page.id, error = %err, "dropping undecodable page");
                }
            }
        }
        Ok(tasks)
    }

    async fn write_back(&self, page_id: &str, update: &WriteBack) -> Result<(), SyncError> {
        let url = format!("{}/pages/{}", self.base(), urlencoding::encode(page_id));
        let request = self
            .request(Method::Patch, url)
            .json(self.write_back_body(update));

        let resp = self.transport.send(request).await?;
        if !resp.is_success() {
            return Err(SyncError::RecordPatch {
                page_id: page_id.to_string(),
                status: resp.status,
                body: resp.body,
            });
        }
        Ok(())
    }
}
