//! End-to-end behaviour of the orchestrator against scripted adapters.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rstest::rstest;

use pagesync_core::{BackendName, Document, DocumentId, Phase};
use pagesync_sync::{
    adapter::{MockEdge, MockEventLog},
    AdapterError, CancellationToken, DocumentAdapter, FailureKind, MockAdapter, Orchestrator,
    SyncError, SyncOptions,
};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

fn page() -> Document {
    Document::new("p1", "X", "Y", at(0))
}

fn replica(title: &str, hour: u32) -> Document {
    Document::new("p1", title, "Y", at(hour))
}

fn arcs(mocks: &[MockAdapter]) -> Vec<Arc<dyn DocumentAdapter>> {
    mocks
        .iter()
        .cloned()
        .map(|m| Arc::new(m) as Arc<dyn DocumentAdapter>)
        .collect()
}

fn name(s: &str) -> BackendName {
    BackendName::from(s)
}

// ---------------------------------------------------------------------------
// 1. Outcome aggregation and selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn all_succeeding_selects_max_timestamp_and_records_no_failures() {
    let mocks = [
        MockAdapter::new("wiki").reading(replica("wiki", 2)),
        MockAdapter::new("kb").reading(replica("kb", 7)),
        MockAdapter::new("board").reading(replica("board", 4)),
    ];
    let report = Orchestrator::default()
        .sync(&page(), &arcs(&mocks))
        .await
        .expect("sync");

    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.successful_reads().count(), 3);
    let selected = report.selected.expect("selected");
    assert_eq!(selected.backend, name("kb"));
    assert_eq!(selected.document.timestamp, at(7));
}

#[tokio::test]
async fn concrete_three_backend_scenario() {
    let mocks = [
        MockAdapter::new("A").reading(replica("from A", 1)),
        MockAdapter::new("B").reading(replica("from B", 2)),
        MockAdapter::new("C").failing(Phase::Read, AdapterError::Transport("refused".into())),
    ];
    let report = Orchestrator::default()
        .sync(&page(), &arcs(&mocks))
        .await
        .expect("sync");

    for phase in [Phase::Create, Phase::Update, Phase::Delete] {
        assert_eq!(report.failures_in(phase).count(), 0, "no {phase} failures expected");
    }
    let read_failures: Vec<_> = report.failures_in(Phase::Read).collect();
    assert_eq!(read_failures.len(), 1);
    assert_eq!(read_failures[0].backend, name("C"));
    assert_eq!(read_failures[0].kind, FailureKind::Adapter);

    let selected = report.selected.expect("selected");
    assert_eq!(selected.backend, name("B"));
    assert_eq!(selected.document.title, "from B");
}

#[rstest]
#[case(1, 0)]
#[case(4, 1)]
#[case(5, 3)]
#[case(3, 3)]
#[tokio::test]
async fn read_failures_shrink_successful_reads(#[case] total: usize, #[case] failing: usize) {
    let mocks: Vec<MockAdapter> = (0..total)
        .map(|i| {
            let mock = MockAdapter::new(format!("b{i}")).reading(replica("r", i as u32));
            if i < failing {
                mock.failing(Phase::Read, AdapterError::NotFound(DocumentId::from("p1")))
            } else {
                mock
            }
        })
        .collect();

    let report = Orchestrator::default()
        .sync(&page(), &arcs(&mocks))
        .await
        .expect("sync");

    assert_eq!(report.reads.len(), total);
    assert_eq!(report.successful_reads().count(), total - failing);
    match report.selected {
        Some(selected) => {
            assert!(failing < total);
            assert_eq!(selected.backend, name(&format!("b{}", total - 1)));
        }
        None => assert_eq!(failing, total, "selection only absent when every read failed"),
    }
}

#[tokio::test]
async fn every_read_failing_selects_none() {
    let mocks = [
        MockAdapter::new("a").failing(Phase::Read, AdapterError::MalformedResponse("no title".into())),
        MockAdapter::new("b").failing(Phase::Read, AdapterError::Timeout),
    ];
    let report = Orchestrator::default()
        .sync(&page(), &arcs(&mocks))
        .await
        .expect("sync");

    assert!(report.selected.is_none());
    assert_eq!(report.reads.len(), 2);
    assert!(report.reads.values().all(|o| !o.is_success()));
    assert_eq!(
        report.failures[&name("a")][0].kind,
        FailureKind::MalformedResponse
    );
}

#[tokio::test]
async fn equal_timestamps_resolve_to_greatest_backend_name() {
    let mocks = [
        MockAdapter::new("zendesk").reading(replica("z", 3)),
        MockAdapter::new("confluence").reading(replica("c", 3)),
        MockAdapter::new("guru").reading(replica("g", 1)),
    ];
    let report = Orchestrator::default()
        .sync(&page(), &arcs(&mocks))
        .await
        .expect("sync");
    assert_eq!(report.selected.expect("selected").backend, name("zendesk"));
}

#[tokio::test]
async fn empty_adapter_set_is_not_an_error() {
    let report = Orchestrator::default()
        .sync(&page(), &[])
        .await
        .expect("sync");
    assert!(report.reads.is_empty());
    assert!(report.failures.is_empty());
    assert!(report.created_ids.is_empty());
    assert!(report.selected.is_none());
}

#[tokio::test]
async fn shared_backend_label_is_rejected_before_any_call() {
    let a = MockAdapter::new("same");
    let b = MockAdapter::new("same");
    let err = Orchestrator::default()
        .sync(&page(), &arcs(&[a.clone(), b.clone()]))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::PreconditionViolation(_)), "got: {err}");
    assert!(a.calls().is_empty() && b.calls().is_empty());
}

// ---------------------------------------------------------------------------
// 2. Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_failure_does_not_stop_other_backends_or_later_phases() {
    let a = MockAdapter::new("a").failing(
        Phase::Create,
        AdapterError::Status {
            status: 500,
            message: "internal".into(),
        },
    );
    let b = MockAdapter::new("b");
    let report = Orchestrator::default()
        .sync(&page(), &arcs(&[a.clone(), b.clone()]))
        .await
        .expect("sync");

    for phase in Phase::ALL {
        assert_eq!(a.call_count(phase), 1, "a must still see {phase}");
        assert_eq!(b.call_count(phase), 1, "b must see {phase}");
    }
    assert_eq!(report.failures[&name("a")].len(), 1);
    assert_eq!(report.failures[&name("a")][0].phase, Phase::Create);
    assert!(!report.failures.contains_key(&name("b")));
    assert!(report.created_ids.contains_key(&name("b")));
    assert!(!report.created_ids.contains_key(&name("a")));
}

#[tokio::test]
async fn panicking_adapter_is_recorded_not_propagated() {
    let a = MockAdapter::new("a").panicking(Phase::Update);
    let b = MockAdapter::new("b");
    let report = Orchestrator::default()
        .sync(&page(), &arcs(&[a.clone(), b]))
        .await
        .expect("sync");

    let failures = &report.failures[&name("a")];
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].phase, Phase::Update);
    assert_eq!(failures[0].kind, FailureKind::Panicked);
    assert_eq!(a.call_count(Phase::Read), 1, "later phases still run");
}

#[tokio::test]
async fn repeated_runs_with_pure_adapters_agree() {
    let mocks = [
        MockAdapter::new("a").reading(replica("a", 1)),
        MockAdapter::new("b").failing(Phase::Delete, AdapterError::Conflict(DocumentId::from("p1"))),
        MockAdapter::new("c").failing(Phase::Read, AdapterError::NotFound(DocumentId::from("p1"))),
    ];
    let orchestrator = Orchestrator::default();
    let first = orchestrator.sync(&page(), &arcs(&mocks)).await.expect("first");
    let second = orchestrator.sync(&page(), &arcs(&mocks)).await.expect("second");

    assert_eq!(first.failures, second.failures);
    assert_eq!(first.reads, second.reads);
    assert_eq!(first.selected, second.selected);
}

// ---------------------------------------------------------------------------
// 3. Barrier, deadlines, cancellation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn no_phase_starts_before_previous_phase_finished_everywhere() {
    let log = MockEventLog::new();
    let mocks = [
        MockAdapter::new("slow")
            .with_latency(Phase::Create, Duration::from_millis(80))
            .with_latency(Phase::Delete, Duration::from_millis(30))
            .logging_to(&log),
        MockAdapter::new("fast").logging_to(&log),
        MockAdapter::new("medium")
            .with_latency(Phase::Update, Duration::from_millis(40))
            .logging_to(&log),
    ];
    Orchestrator::default()
        .sync(&page(), &arcs(&mocks))
        .await
        .expect("sync");

    let events = log.events();
    assert_eq!(events.len(), 3 * 4 * 2);
    for pair in Phase::ALL.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let last_finish = events
            .iter()
            .rposition(|e| e.phase == current && e.edge == MockEdge::Finished)
            .expect("finish recorded");
        let first_start = events
            .iter()
            .position(|e| e.phase == next && e.edge == MockEdge::Started)
            .expect("start recorded");
        assert!(
            last_finish < first_start,
            "{next} started before every {current} call finished"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn hung_adapter_times_out_and_run_completes() {
    let hung = MockAdapter::new("hung").hanging(Phase::Read);
    let ok = MockAdapter::new("ok").reading(replica("ok", 2));
    let orchestrator = Orchestrator::new(SyncOptions {
        call_timeout: Some(Duration::from_secs(2)),
    });

    let report = orchestrator
        .sync(&page(), &arcs(&[hung, ok]))
        .await
        .expect("sync");

    let failures = &report.failures[&name("hung")];
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::Timeout);
    assert_eq!(report.selected.expect("selected").backend, name("ok"));
}

#[tokio::test]
async fn huge_call_timeout_means_no_deadline() {
    let a = MockAdapter::new("a").reading(replica("a", 1));
    let orchestrator = Orchestrator::new(SyncOptions {
        call_timeout: Some(Duration::MAX),
    });

    let report = orchestrator
        .sync(&page(), &arcs(&[a]))
        .await
        .expect("sync");

    assert!(report.is_clean(), "failures: {:?}", report.failures);
    assert_eq!(report.selected.expect("selected").backend, name("a"));
}

#[tokio::test]
async fn cancelled_run_still_reports_every_backend() {
    let token = CancellationToken::new();
    token.cancel();
    let mocks = [MockAdapter::new("a"), MockAdapter::new("b")];

    let report = Orchestrator::default()
        .sync_with_cancel(&page(), &arcs(&mocks), token)
        .await
        .expect("sync");

    for backend in ["a", "b"] {
        let failures = &report.failures[&name(backend)];
        assert_eq!(failures.len(), 4, "{backend}: one cancelled failure per phase");
        assert!(failures.iter().all(|f| f.kind == FailureKind::Cancelled));
    }
    assert!(report.selected.is_none());
    assert!(mocks.iter().all(|m| m.calls().is_empty()), "no adapter call once cancelled");
}

#[tokio::test(start_paused = true)]
async fn cancellation_releases_a_hung_phase() {
    let token = CancellationToken::new();
    let hung = MockAdapter::new("hung").hanging(Phase::Create);
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        trigger.cancel();
    });

    let report = Orchestrator::default()
        .sync_with_cancel(&page(), &arcs(&[hung.clone()]), token)
        .await
        .expect("sync");

    let kinds: Vec<_> = report.failures[&name("hung")]
        .iter()
        .map(|f| (f.phase, f.kind))
        .collect();
    assert_eq!(
        kinds,
        Phase::ALL
            .iter()
            .map(|p| (*p, FailureKind::Cancelled))
            .collect::<Vec<_>>()
    );
    assert_eq!(hung.call_count(Phase::Create), 1);
    assert_eq!(hung.call_count(Phase::Update), 0);
}

// ---------------------------------------------------------------------------
// 4. Read-only reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconcile_only_reads() {
    let a = MockAdapter::new("a").reading(replica("a", 1));
    let b = MockAdapter::new("b").reading(replica("b", 9));
    let report = Orchestrator::default()
        .reconcile(&DocumentId::from("p1"), &arcs(&[a.clone(), b.clone()]))
        .await
        .expect("reconcile");

    assert_eq!(a.calls(), vec![(Phase::Read, DocumentId::from("p1"))]);
    assert_eq!(b.call_count(Phase::Create), 0);
    assert!(report.created_ids.is_empty());
    assert_eq!(report.selected.expect("selected").backend, name("b"));
}

#[tokio::test]
async fn orchestrator_is_shareable_across_concurrent_runs() {
    let orchestrator = Arc::new(Orchestrator::default());
    let left = arcs(&[MockAdapter::new("left").reading(replica("l", 1))]);
    let right = arcs(&[MockAdapter::new("right").reading(replica("r", 2))]);

    let (l, r) = tokio::join!(
        {
            let o = orchestrator.clone();
            async move { o.sync(&page(), &left).await }
        },
        {
            let o = orchestrator.clone();
            async move { o.sync(&page(), &right).await }
        }
    );
    assert_eq!(l.expect("left").backends, vec![name("left")]);
    assert_eq!(r.expect("right").backends, vec![name("right")]);
}
