use super::*;
use std::{collections::VecDeque, sync::Arc, time::Duration};

use tokio::sync::{Mutex, Notify, Semaphore};

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq)]
struct TestItem {
    id: i64,
    cursor: Option<String>,
}

impl CursorItem for TestItem {
    type Key = i64;

    fn item_key(&self) -> i64 {
        self.id
    }

    fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }
}

fn item(id: i64, cursor: &str) -> TestItem {
    TestItem {
        id,
        cursor: Some(cursor.to_string()),
    }
}

fn page(items: Vec<TestItem>, has_next: bool) -> ClientResult<PageResponse<TestItem>> {
    Ok(PageResponse {
        content: items,
        has_next,
    })
}

#[derive(Default)]
struct ScriptedSource {
    responses: Mutex<VecDeque<ClientResult<PageResponse<TestItem>>>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
    entered: Arc<Notify>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedSource {
    fn new(responses: Vec<ClientResult<PageResponse<TestItem>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl PageSource for Arc<ScriptedSource> {
    type Item = TestItem;
    type Query = String;

    async fn fetch_page(
        &self,
        query: &String,
        cursor: Option<&str>,
    ) -> ClientResult<PageResponse<TestItem>> {
        let response = {
            self.calls
                .lock()
                .await
                .push((query.clone(), cursor.map(str::to_owned)));
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| page(Vec::new(), false))
        };
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        response
    }
}

fn ids(items: &[TestItem]) -> Vec<i64> {
    items.iter().map(|item| item.id).collect()
}

#[tokio::test]
async fn second_page_uses_cursor_of_last_item() {
    let source = Arc::new(ScriptedSource::new(vec![
        page(vec![item(1, "a"), item(2, "b")], true),
        page(vec![item(3, "c")], false),
    ]));
    let paginator = Paginator::new("feeds", Arc::clone(&source), String::new());

    paginator.load_next().await.expect("page 1");
    let outcome = paginator.load_next().await.expect("page 2");

    assert_eq!(outcome, LoadOutcome::Appended(vec![item(3, "c")]));
    let snapshot = paginator.snapshot().await;
    assert_eq!(ids(&snapshot.items), vec![1, 2, 3]);
    assert!(!snapshot.has_next);
    assert_eq!(snapshot.next_cursor, None);

    let calls = source.calls.lock().await;
    assert_eq!(calls[0].1, None);
    assert_eq!(calls[1].1.as_deref(), Some("b"));
}

#[tokio::test]
async fn exhausted_list_does_not_fetch() {
    let source = Arc::new(ScriptedSource::new(vec![page(vec![item(1, "a")], false)]));
    let paginator = Paginator::new("feeds", Arc::clone(&source), String::new());

    paginator.load_next().await.expect("page 1");
    let outcome = paginator.load_next().await.expect("no-op");

    assert_eq!(outcome, LoadOutcome::Skipped(SkipReason::Exhausted));
    assert_eq!(source.calls.lock().await.len(), 1);
}

#[tokio::test]
async fn missing_cursor_stops_pagination() {
    let source = Arc::new(ScriptedSource::new(vec![page(
        vec![
            item(1, "a"),
            TestItem {
                id: 2,
                cursor: None,
            },
        ],
        true,
    )]));
    let paginator = Paginator::new("clubs", Arc::clone(&source), String::new());

    paginator.load_next().await.expect("page 1");

    let snapshot = paginator.snapshot().await;
    assert!(!snapshot.has_next);
    assert_eq!(
        paginator.load_next().await.expect("no-op"),
        LoadOutcome::Skipped(SkipReason::Exhausted)
    );
}

#[tokio::test]
async fn empty_page_claiming_more_stops_pagination() {
    let source = Arc::new(ScriptedSource::new(vec![page(Vec::new(), true)]));
    let paginator = Paginator::new("clubs", Arc::clone(&source), String::new());

    paginator.load_next().await.expect("page 1");
    assert!(!paginator.snapshot().await.has_next);
}

#[tokio::test]
async fn duplicate_items_across_pages_are_dropped() {
    let source = Arc::new(ScriptedSource::new(vec![
        page(vec![item(1, "a"), item(2, "b")], true),
        page(vec![item(2, "b"), item(3, "c")], true),
    ]));
    let paginator = Paginator::new("feeds", Arc::clone(&source), String::new());

    paginator.load_next().await.expect("page 1");
    let outcome = paginator.load_next().await.expect("page 2");

    assert_eq!(outcome, LoadOutcome::Appended(vec![item(3, "c")]));
    assert_eq!(ids(&paginator.items().await), vec![1, 2, 3]);
    assert_eq!(paginator.snapshot().await.next_cursor.as_deref(), Some("c"));
}

#[tokio::test]
async fn failed_fetch_keeps_aggregate_and_retries_same_cursor() {
    let source = Arc::new(ScriptedSource::new(vec![
        page(vec![item(1, "a")], true),
        Err(ClientError::Timeout),
        page(vec![item(2, "b")], false),
    ]));
    let paginator = Paginator::new("feeds", Arc::clone(&source), String::new());

    paginator.load_next().await.expect("page 1");
    let err = paginator.load_next().await.expect_err("timeout");
    assert_eq!(err, ClientError::Timeout);

    let snapshot = paginator.snapshot().await;
    assert_eq!(ids(&snapshot.items), vec![1]);
    assert!(snapshot.has_next);
    assert!(!snapshot.loading);

    paginator.load_next().await.expect("retry");
    assert_eq!(ids(&paginator.items().await), vec![1, 2]);
    let calls = source.calls.lock().await;
    assert_eq!(calls[1].1.as_deref(), Some("a"));
    assert_eq!(calls[2].1.as_deref(), Some("a"));
}

#[tokio::test]
async fn refresh_yields_exactly_first_page() {
    let source = Arc::new(ScriptedSource::new(vec![
        page(vec![item(1, "a"), item(2, "b")], true),
        page(vec![item(3, "c")], true),
        page(vec![item(9, "z"), item(1, "a")], true),
    ]));
    let paginator = Paginator::new("feeds", Arc::clone(&source), String::new());

    paginator.load_next().await.expect("page 1");
    paginator.load_next().await.expect("page 2");
    let outcome = paginator.refresh().await.expect("refresh");

    assert_eq!(
        outcome,
        LoadOutcome::Replaced(vec![item(9, "z"), item(1, "a")])
    );
    let snapshot = paginator.snapshot().await;
    assert_eq!(ids(&snapshot.items), vec![9, 1]);
    assert_eq!(snapshot.next_cursor.as_deref(), Some("a"));
    assert_eq!(source.calls.lock().await[2].1, None);
}

#[tokio::test]
async fn failed_refresh_leaves_previous_items_visible() {
    let source = Arc::new(ScriptedSource::new(vec![
        page(vec![item(1, "a")], true),
        Err(ClientError::Server { status: 500 }),
    ]));
    let paginator = Paginator::new("feeds", Arc::clone(&source), String::new());

    paginator.load_next().await.expect("page 1");
    paginator.refresh().await.expect_err("server error");

    assert_eq!(ids(&paginator.items().await), vec![1]);
}

#[tokio::test]
async fn load_while_pending_is_dropped() {
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(
        ScriptedSource::new(vec![page(vec![item(1, "a")], true)]).gated(Arc::clone(&gate)),
    );
    let paginator = Arc::new(Paginator::new("feeds", Arc::clone(&source), String::new()));

    let first = tokio::spawn({
        let paginator = Arc::clone(&paginator);
        async move { paginator.load_next().await }
    });
    source.entered.notified().await;

    assert!(paginator.snapshot().await.loading);
    let second = paginator.load_next().await.expect("second");
    assert_eq!(second, LoadOutcome::Skipped(SkipReason::InFlight));

    gate.add_permits(1);
    let first = first.await.expect("join").expect("first");
    assert_eq!(first, LoadOutcome::Appended(vec![item(1, "a")]));
    assert_eq!(source.calls.lock().await.len(), 1);
}

#[tokio::test]
async fn refresh_makes_pending_page_inert() {
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(
        ScriptedSource::new(vec![
            page(vec![item(1, "old")], true),
            page(vec![item(5, "new")], false),
        ])
        .gated(Arc::clone(&gate)),
    );
    let paginator = Arc::new(Paginator::new("feeds", Arc::clone(&source), String::new()));

    let stale = tokio::spawn({
        let paginator = Arc::clone(&paginator);
        async move { paginator.load_next().await }
    });
    source.entered.notified().await;

    let refresh = tokio::spawn({
        let paginator = Arc::clone(&paginator);
        async move { paginator.refresh().await }
    });
    source.entered.notified().await;

    gate.add_permits(2);
    let outcomes = [
        stale.await.expect("join").expect("stale"),
        refresh.await.expect("join").expect("refresh"),
    ];

    assert!(outcomes.contains(&LoadOutcome::Skipped(SkipReason::Superseded)));
    assert_eq!(ids(&paginator.items().await), vec![5]);
    assert!(!paginator.snapshot().await.loading);
}

#[tokio::test]
async fn closed_paginator_ignores_late_completion() {
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(
        ScriptedSource::new(vec![page(vec![item(1, "a")], true)]).gated(Arc::clone(&gate)),
    );
    let paginator = Arc::new(Paginator::new("clubs", Arc::clone(&source), String::new()));

    let pending = tokio::spawn({
        let paginator = Arc::clone(&paginator);
        async move { paginator.load_next().await }
    });
    source.entered.notified().await;
    paginator.close().await;
    gate.add_permits(1);

    assert_eq!(
        pending.await.expect("join").expect("late"),
        LoadOutcome::Skipped(SkipReason::Superseded)
    );
    assert!(paginator.items().await.is_empty());
    assert_eq!(
        paginator.load_next().await.expect("closed"),
        LoadOutcome::Skipped(SkipReason::Closed)
    );
}

#[tokio::test]
async fn set_query_refetches_with_new_parameters() {
    let source = Arc::new(ScriptedSource::new(vec![
        page(vec![item(1, "a")], true),
        page(vec![item(7, "g")], false),
    ]));
    let paginator = Paginator::new("clubs", Arc::clone(&source), "all".to_string());

    paginator.load_next().await.expect("page 1");
    paginator
        .set_query("recruiting".to_string())
        .await
        .expect("requery");

    assert_eq!(ids(&paginator.items().await), vec![7]);
    assert_eq!(paginator.query().await, "recruiting");
    let calls = source.calls.lock().await;
    assert_eq!(calls[1], ("recruiting".to_string(), None));
}

#[tokio::test]
async fn reset_starts_over_from_first_page() {
    let source = Arc::new(ScriptedSource::new(vec![
        page(vec![item(1, "a")], false),
        page(vec![item(2, "b")], false),
    ]));
    let paginator = Paginator::new("feeds", Arc::clone(&source), String::new());

    paginator.load_next().await.expect("page 1");
    paginator.reset().await;
    assert!(paginator.items().await.is_empty());
    assert!(paginator.snapshot().await.has_next);

    paginator.load_next().await.expect("page 1 again");
    assert_eq!(ids(&paginator.items().await), vec![2]);
    assert_eq!(source.calls.lock().await[1].1, None);
}

#[tokio::test]
async fn abandoned_load_does_not_block_the_list() {
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(
        ScriptedSource::new(vec![
            page(vec![item(1, "a")], true),
            page(vec![item(2, "b")], false),
        ])
        .gated(Arc::clone(&gate)),
    );
    let paginator = Paginator::new("feeds", Arc::clone(&source), String::new());

    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), paginator.load_next()).await;
    assert!(abandoned.is_err());
    assert!(!paginator.snapshot().await.loading);

    gate.add_permits(1);
    let retry = paginator.load_next().await.expect("retry");

    assert_eq!(retry, LoadOutcome::Appended(vec![item(2, "b")]));
    assert_eq!(
        *source.calls.lock().await,
        vec![(String::new(), None), (String::new(), None)]
    );
}

#[tokio::test]
async fn abandoned_refresh_keeps_items_and_frees_the_list() {
    let gate = Arc::new(Semaphore::new(1));
    let source = Arc::new(
        ScriptedSource::new(vec![
            page(vec![item(1, "a")], true),
            page(vec![item(9, "z")], false),
            page(vec![item(2, "b")], false),
        ])
        .gated(Arc::clone(&gate)),
    );
    let paginator = Paginator::new("feeds", Arc::clone(&source), String::new());
    paginator.load_next().await.expect("first page");

    let abandoned = tokio::time::timeout(Duration::from_millis(20), paginator.refresh()).await;
    assert!(abandoned.is_err());
    assert_eq!(ids(&paginator.items().await), vec![1]);

    gate.add_permits(1);
    let next = paginator.load_next().await.expect("next page");

    assert_eq!(next, LoadOutcome::Appended(vec![item(2, "b")]));
    assert_eq!(ids(&paginator.items().await), vec![1, 2]);
}
