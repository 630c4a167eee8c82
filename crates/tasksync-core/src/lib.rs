//! # tasksync core library
//!
//! Reconciles tasks kept in a Notion database with events on a Google
//! Calendar. Every task with a due date becomes (or updates) a calendar
//! event; trashed tasks delete theirs. The `tasksync` CLI is a thin trigger
//! layer over [`Reconciler::run`].
//!
//! ## Architecture
//!
//! - **HTTP**: every outbound call goes through an injected [`HttpTransport`]
//! - **Auth**: RS256 service-account assertions exchanged for cached bearer
//!   tokens
//! - **Calendar client**: authenticated requests with rate-limit backoff
//! - **Event mapper**: pure task → event state machine
//! - **Dispatcher**: fixed-size windows with a pause in between
//! - **Reconciler**: per-task skip rules, API call and write-back
//!
//! ## Key Components
//!
//! - [`Reconciler`]: one reconciliation pass
//! - [`Config`]: TOML configuration
//! - [`SyncError`]: error taxonomy, split into fatal and per-task errors

pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod integrations;
pub mod sync;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, Secrets};
pub use error::{ConfigError, CredentialError, SyncError, TransportError};
pub use http::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
pub use integrations::{CalendarClient, NotionClient, RecordStore, TokenSource};
pub use sync::{FixedWindow, Reconciler, RetryPolicy, RunSummary, Task};
