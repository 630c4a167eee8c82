//! Reconciliation run: fetch tasks, plan each one, call Calendar, write back.
//!
//! A run fails as a whole only when it cannot start: the configuration or
//! credentials are unusable, the pre-flight token exchange is rejected, or
//! the task query fails. Anything that goes wrong for a single task is logged
//! and counted, and that task's record is left untouched so the next run
//! tries again.

use std::fmt;
use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, Secrets};
use crate::error::SyncError;
use crate::http::HttpTransport;
use crate::integrations::google::CalendarClient;
use crate::integrations::notion::NotionClient;
use crate::integrations::oauth::{
    CachedTokenProvider, ServiceAccountKey, ServiceAccountSigner, TokenSource,
};
use crate::integrations::traits::{RecordStore, WriteBack};
use crate::sync::dispatch::{dispatch, FixedWindow};
use crate::sync::event_mapper::plan_task;
use crate::sync::types::{Plan, SkipReason, Task};

/// What happened to one task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Skipped(SkipReason),
    /// Dry run: the call that would have been made.
    Planned(Plan),
    Created { event_id: String },
    Updated { event_id: String },
    Deleted,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Skipped(_) => self.skipped += 1,
            TaskOutcome::Created { .. } | TaskOutcome::Planned(Plan::Create(_)) => {
                self.created += 1
            }
            TaskOutcome::Updated { .. } | TaskOutcome::Planned(Plan::Update { .. }) => {
                self.updated += 1
            }
            TaskOutcome::Deleted | TaskOutcome::Planned(Plan::Delete { .. }) => self.deleted += 1,
            TaskOutcome::Planned(Plan::Skip(_)) => self.skipped += 1,
        }
    }

    /// Tasks that reached the calendar successfully (or would have, in a dry run).
    pub fn synced(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}fetched {}, created {}, updated {}, deleted {}, skipped {}, failed {}",
            if self.dry_run { "[dry run] " } else { "" },
            self.fetched,
            self.created,
            self.updated,
            self.deleted,
            self.skipped,
            self.failed
        )
    }
}

/// Drives one record store against one calendar.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    calendar: CalendarClient,
    tokens: Arc<dyn TokenSource>,
    window: FixedWindow,
    clock: Arc<dyn Clock>,
    dry_run: bool,
}

impl Reconciler {
    /// `tokens` should be the source `calendar` authenticates with; it is
    /// used for the pre-flight check.
    pub fn new(
        store: Arc<dyn RecordStore>,
        calendar: CalendarClient,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            store,
            calendar,
            tokens,
            window: FixedWindow::default(),
            clock: Arc::new(SystemClock),
            dry_run: false,
        }
    }

    /// Wire the Notion store, token provider and Calendar client from
    /// configuration and secrets, all sharing `transport`.
    ///
    /// # Errors
    /// Configuration and credential problems, all of them fatal.
    pub fn from_config(
        config: &Config,
        secrets: &Secrets,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let key = ServiceAccountKey::parse(&secrets.service_account_key)?;
        let signer =
            ServiceAccountSigner::new(key, &config.google.scope, &config.google.token_url)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let tokens: Arc<dyn TokenSource> = Arc::new(
            CachedTokenProvider::new(signer, Arc::clone(&transport), Arc::clone(&clock))
                .with_refresh_margin(config.refresh_margin()?)
                .with_cache(config.auth.cache_tokens),
        );

        let calendar = CalendarClient::new(
            Arc::clone(&transport),
            Arc::clone(&tokens),
            &config.google.api_base,
            &config.google.calendar_id,
        )
        .with_retry_policy(config.retry_policy());

        let store = NotionClient::new(
            transport,
            &secrets.notion_api_key,
            &config.notion.database_id,
        )
        .with_api_base(&config.notion.api_base)
        .with_version(&config.notion.version)
        .with_properties(config.notion.properties.clone());

        Ok(Self::new(Arc::new(store), calendar, tokens)
            .with_window(config.fixed_window())
            .with_clock(clock))
    }

    pub fn with_window(mut self, window: FixedWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Plan only: no Calendar calls, no write-backs.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one reconciliation pass.
    ///
    /// # Errors
    /// Only fatal errors; per-task failures are counted in the summary.
    pub async fn run(&self) -> Result<RunSummary, SyncError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("sync_run", %run_id, dry_run = self.dry_run);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunSummary, SyncError> {
        if !self.dry_run {
            if let Err(err) = self.tokens.get_token().await {
                tracing::error!(error = %err, "token pre-flight failed");
                return Err(err);
            }
        }

        let tasks = match self.store.fetch_tasks().await {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::error!(store = self.store.name(), error = %err, "task query failed");
                return Err(err);
            }
        };
        tracing::info!(store = self.store.name(), tasks = tasks.len(), "fetched tasks");

        let results = dispatch(&self.window, &tasks, |task| self.process_task(task)).await;

        let mut summary = RunSummary {
            run_id,
            dry_run: self.dry_run,
            fetched: tasks.len(),
            ..RunSummary::default()
        };
        for (task, result) in tasks.iter().zip(results) {
            match result {
                Ok(outcome) => summary.record(&outcome),
                Err(err) => {
                    // Rate limits and API errors clear up by the next run;
                    // fatal kinds here (credentials, config) hit every task.
                    tracing::error!(
                        task_id = %task.id,
                        task = %task.name,
                        error = %err,
                        fatal = err.is_fatal(),
                        rate_limited = err.is_retryable(),
                        "failed to sync task"
                    );
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(%summary, "run finished");
        Ok(summary)
    }

    /// Plan, call Calendar and write back for one task.
    pub async fn process_task(&self, task: &Task) -> Result<TaskOutcome, SyncError> {
        let plan = plan_task(task, self.clock.now());

        if let Plan::Skip(reason) = &plan {
            tracing::debug!(task_id = %task.id, ?reason, "skipping task");
            return Ok(TaskOutcome::Skipped(*reason));
        }
        if self.dry_run {
            tracing::info!(task_id = %task.id, task = %task.name, op = plan.label(), "planned");
            return Ok(TaskOutcome::Planned(plan));
        }

        let event = self.calendar.apply(&plan).await?.unwrap_or_default();

        self.store
            .write_back(
                &task.id,
                &WriteBack {
                    event_id: event.id.clone(),
                    updated_at: self.clock.now(),
                },
            )
            .await?;

        tracing::info!(
            task_id = %task.id,
            task = %task.name,
            op = plan.label(),
            event_id = %event.id,
            "synced task"
        );

        Ok(match plan {
            Plan::Create(_) => TaskOutcome::Created { event_id: event.id },
            Plan::Update { .. } => TaskOutcome::Updated { event_id: event.id },
            Plan::Delete { .. } => TaskOutcome::Deleted,
            Plan::Skip(reason) => TaskOutcome::Skipped(reason),
        })
    }
}
