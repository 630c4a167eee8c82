//! Tests for sync_engine module.

#[cfg(test)]
mod tests {
    use super::super::sync_engine::*;
    use crate::clock::FixedClock;
    use crate::error::SyncError;
    use crate::http::fake::FakeTransport;
    use crate::http::{Body, HttpResponse, Method};
    use crate::integrations::google::test_support::StaticToken;
    use crate::integrations::google::CalendarClient;
    use crate::integrations::oauth::TokenSource;
    use crate::integrations::traits::{RecordStore, WriteBack};
    use crate::sync::dispatch::FixedWindow;
    use crate::sync::types::{Plan, SkipReason, Task, TaskTime};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const BASE: &str = "https://www.googleapis.com/calendar/v3";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 8, 30, 0).unwrap()
    }

    #[derive(Default)]
    struct MemoryStore {
        tasks: Vec<Task>,
        fail_fetch: bool,
        fail_patch_for: Option<&'static str>,
        fetches: AtomicUsize,
        writes: Mutex<Vec<(String, WriteBack)>>,
    }

    impl MemoryStore {
        fn with_tasks(tasks: Vec<Task>) -> Self {
            Self {
                tasks,
                ..Self::default()
            }
        }

        fn writes(&self) -> Vec<(String, WriteBack)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        fn name(&self) -> &str {
            "memory"
        }

        async fn fetch_tasks(&self) -> Result<Vec<Task>, SyncError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch {
                return Err(SyncError::RecordFetch("HTTP 500: boom".into()));
            }
            Ok(self.tasks.clone())
        }

        async fn write_back(&self, page_id: &str, update: &WriteBack) -> Result<(), SyncError> {
            if self.fail_patch_for == Some(page_id) {
                return Err(SyncError::RecordPatch {
                    page_id: page_id.to_string(),
                    status: 500,
                    body: "unavailable".into(),
                });
            }
            self.writes
                .lock()
                .unwrap()
                .push((page_id.to_string(), update.clone()));
            Ok(())
        }
    }

    /// Calendar stand-in: POST mints `evt-new`, PUT echoes the id, DELETE is
    /// empty, any url containing `missing` is a 404.
    fn calendar() -> Arc<FakeTransport> {
        Arc::new(FakeTransport::new(|req| {
            if req.url.contains("missing") {
                return Ok(HttpResponse::new(
                    404,
                    r#"{"error":{"code":404,"message":"Not Found"}}"#,
                ));
            }
            Ok(match req.method {
                Method::Post => HttpResponse::new(200, r#"{"id":"evt-new"}"#),
                Method::Put => {
                    let id = req.url.rsplit('/').next().unwrap_or_default();
                    HttpResponse::new(200, format!(r#"{{"id":"{id}"}}"#))
                }
                _ => HttpResponse::new(204, ""),
            })
        }))
    }

    fn reconciler(
        store: &Arc<MemoryStore>,
        transport: &Arc<FakeTransport>,
        token: Option<&'static str>,
    ) -> Reconciler {
        let tokens: Arc<dyn TokenSource> = Arc::new(StaticToken(token));
        let calendar = CalendarClient::new(transport.clone(), tokens.clone(), BASE, "primary");
        Reconciler::new(store.clone(), calendar, tokens)
            .with_window(FixedWindow::new(5, Duration::ZERO))
            .with_clock(Arc::new(FixedClock(now())))
    }

    fn task(id: &str, start: Option<&str>, event_id: Option<&str>, in_trash: bool) -> Task {
        Task {
            id: id.to_string(),
            name: format!("Task {id}"),
            start: start.map(|s| TaskTime::parse(s).unwrap()),
            end: None,
            status: "Todo".into(),
            in_trash,
            stored_event_id: event_id.map(str::to_string),
            last_update_at: None,
            last_edited_time: now() - chrono::Duration::hours(2),
            location: None,
        }
    }

    fn echo(id: &str) -> Task {
        let mut t = task(id, Some("2024-06-01"), Some("evt-echo"), false);
        t.last_update_at = Some(t.last_edited_time - chrono::Duration::milliseconds(40));
        t
    }

    #[tokio::test]
    async fn create_update_delete_and_skip() {
        let store = Arc::new(MemoryStore::with_tasks(vec![
            task("new", Some("2024-06-20"), None, false),
            task("existing", Some("2024-06-01"), Some("evt-1"), false),
            task("trashed", Some("2024-06-01"), Some("evt-2"), true),
            task("undated", None, None, false),
            echo("echo"),
        ]));
        let transport = calendar();

        let summary = reconciler(&store, &transport, Some("tok")).run().await.unwrap();

        assert_eq!(summary.fetched, 5);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 0);
        assert!(!summary.dry_run);

        let methods: Vec<(Method, String)> = transport
            .requests()
            .into_iter()
            .map(|r| (r.method, r.url))
            .collect();
        assert_eq!(
            methods,
            vec![
                (Method::Post, format!("{BASE}/calendars/primary/events")),
                (Method::Put, format!("{BASE}/calendars/primary/events/evt-1")),
                (Method::Delete, format!("{BASE}/calendars/primary/events/evt-2")),
            ]
        );

        let writes = store.writes();
        assert_eq!(writes.len(), 3);
        let ids: Vec<(&str, &str)> = writes
            .iter()
            .map(|(page, wb)| (page.as_str(), wb.event_id.as_str()))
            .collect();
        assert!(ids.contains(&("new", "evt-new")));
        assert!(ids.contains(&("existing", "evt-1")));
        assert!(ids.contains(&("trashed", "")));
        assert!(writes.iter().all(|(_, wb)| wb.updated_at == now()));
    }

    #[tokio::test]
    async fn created_event_carries_mapped_dates() {
        let store = Arc::new(MemoryStore::with_tasks(vec![task(
            "future",
            Some("2024-06-20"),
            None,
            false,
        )]));
        let transport = calendar();
        reconciler(&store, &transport, Some("tok")).run().await.unwrap();

        let sent = transport.requests();
        assert_eq!(
            sent[0].body,
            Some(Body::Json(serde_json::json!({
                "summary": "Task future",
                "start": {"date": "2024-06-10"},
                "end": {"date": "2024-06-20"},
            })))
        );
    }

    #[tokio::test]
    async fn failed_call_skips_write_back_for_that_task_only() {
        let store = Arc::new(MemoryStore::with_tasks(vec![
            task("gone", Some("2024-06-01"), Some("missing-evt"), false),
            task("ok", Some("2024-06-01"), None, false),
        ]));
        let transport = calendar();

        let summary = reconciler(&store, &transport, Some("tok")).run().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "ok");
    }

    #[tokio::test]
    async fn failed_write_back_is_counted_per_task() {
        let store = Arc::new(MemoryStore {
            tasks: vec![
                task("a", Some("2024-06-01"), None, false),
                task("b", Some("2024-06-01"), None, false),
            ],
            fail_patch_for: Some("a"),
            ..MemoryStore::default()
        });
        let transport = calendar();

        let summary = reconciler(&store, &transport, Some("tok")).run().await.unwrap();

        assert_eq!(transport.requests().len(), 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_the_run() {
        let store = Arc::new(MemoryStore {
            fail_fetch: true,
            ..MemoryStore::default()
        });
        let transport = calendar();

        let err = reconciler(&store, &transport, Some("tok"))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::RecordFetch(_)));
        assert!(err.is_fatal());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn token_preflight_failure_aborts_before_fetch() {
        let store = Arc::new(MemoryStore::with_tasks(vec![task(
            "a",
            Some("2024-06-01"),
            None,
            false,
        )]));
        let transport = calendar();

        let err = reconciler(&store, &transport, None).run().await.unwrap_err();

        assert!(matches!(err, SyncError::Credential(_)));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn dry_run_plans_without_calls() {
        let store = Arc::new(MemoryStore::with_tasks(vec![
            task("new", Some("2024-06-20"), None, false),
            task("trashed", Some("2024-06-01"), Some("evt-2"), true),
            echo("echo"),
        ]));
        let transport = calendar();

        let summary = reconciler(&store, &transport, None)
            .with_dry_run(true)
            .run()
            .await
            .unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.skipped, 1);
        assert!(transport.requests().is_empty());
        assert!(store.writes().is_empty());
        assert!(summary.to_string().starts_with("[dry run] fetched 3"));
    }

    #[tokio::test]
    async fn process_task_reports_outcome() {
        let store = Arc::new(MemoryStore::default());
        let transport = calendar();
        let engine = reconciler(&store, &transport, Some("tok"));

        let outcome = engine
            .process_task(&task("x", Some("2024-06-01"), Some("evt-5"), false))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TaskOutcome::Updated {
                event_id: "evt-5".into()
            }
        );

        let outcome = engine.process_task(&task("y", None, None, false)).await.unwrap();
        assert_eq!(outcome, TaskOutcome::Skipped(SkipReason::NoStartDate));

        let planned = reconciler(&store, &transport, Some("tok"))
            .with_dry_run(true)
            .process_task(&task("z", Some("2024-06-01"), None, false))
            .await
            .unwrap();
        assert!(matches!(planned, TaskOutcome::Planned(Plan::Create(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn windows_are_separated_by_the_pause() {
        let tasks = (0..7)
            .map(|i| task(&format!("t{i}"), Some("2024-06-01"), None, false))
            .collect();
        let store = Arc::new(MemoryStore::with_tasks(tasks));
        let transport = calendar();
        let engine = reconciler(&store, &transport, Some("tok"))
            .with_window(FixedWindow::default());

        let started = tokio::time::Instant::now();
        let summary = engine.run().await.unwrap();

        assert_eq!(summary.created, 7);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000) && elapsed < Duration::from_millis(1100));
    }
}
