use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::sync::types::Task;

/// Fields written back to a task record after a successful calendar call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBack {
    /// Id of the calendar event, empty after a delete.
    pub event_id: String,
    /// Becomes the record's `lastUpdateAt`.
    pub updated_at: DateTime<Utc>,
}

/// Source of task records and sink for their write-backs.
///
/// A failed `fetch_tasks` aborts the run; a failed `write_back` only affects
/// the task it was for.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Unique identifier (e.g. "notion").
    fn name(&self) -> &str;

    /// Read every task in the store as an immutable snapshot.
    async fn fetch_tasks(&self) -> Result<Vec<Task>, SyncError>;

    /// Store the event id and write timestamp on one record.
    async fn write_back(&self, page_id: &str, update: &WriteBack) -> Result<(), SyncError>;
}
