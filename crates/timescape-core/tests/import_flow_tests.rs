//! End-to-end tests for the import controller.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use common::{fast_pairing, service, FakeAd, FakeSource, MockCompanion, Script};
use timescape_core::discovery::Discoverer;
use timescape_core::import::{ImportController, ImportState};
use timescape_core::pairing::PairingClient;
use timescape_core::SERVICE_TYPE;

fn controller(source: FakeSource, discovery_timeout: Duration) -> ImportController {
    ImportController::new(
        Discoverer::new(Arc::new(source), SERVICE_TYPE),
        PairingClient::new(fast_pairing()).unwrap(),
        "Test Watch",
        discovery_timeout,
    )
}

/// Collect updates until the controller settles.
async fn settle(controller: &mut ImportController) -> Vec<ImportState> {
    let mut seen = Vec::new();
    while controller.state().is_busy() {
        let state = tokio::time::timeout(Duration::from_secs(5), controller.next_update())
            .await
            .expect("controller stalled");
        seen.push(state);
    }
    seen
}

#[tokio::test]
async fn test_discover_select_and_import() {
    let companion = MockCompanion::start(Script::default()).await;
    let port = companion.addr.port();

    let source = FakeSource {
        finish_after_announce: true,
        ..FakeSource::new(vec![
            FakeAd::instant(service("Pixel", "127.0.0.1", port)),
            FakeAd::instant(service("Galaxy", "127.0.0.1", 9)),
        ])
    };
    let mut controller = controller(source, Duration::from_secs(2));

    controller.discover();
    assert_eq!(controller.state(), &ImportState::Searching);

    let states = settle(&mut controller).await;
    let ImportState::DeviceList(services) = states.last().unwrap() else {
        panic!("expected device list, got {states:?}");
    };
    assert_eq!(services.len(), 2);
    assert_eq!(services[0].display_name, "Galaxy");
    assert_eq!(services[1].display_name, "Pixel");

    assert!(controller.select_index(1));
    assert_eq!(
        controller.state(),
        &ImportState::RequestingApproval(companion.target())
    );

    let states = settle(&mut controller).await;
    assert_eq!(
        states,
        vec![
            ImportState::Waiting(companion.target()),
            ImportState::Downloading(companion.target()),
            ImportState::Imported(2),
        ]
    );
    assert_eq!(controller.notes().len(), 2);

    controller.close();
    assert_eq!(controller.state(), &ImportState::Idle);
}

#[tokio::test]
async fn test_manual_connect_denied() {
    let companion = MockCompanion::start(Script {
        statuses: vec![(StatusCode::OK, json!({ "status": "DENIED" }))],
        ..Script::default()
    })
    .await;
    let mut controller = controller(FakeSource::default(), Duration::from_millis(50));

    controller.manual_connect(&companion.address()).unwrap();
    let states = settle(&mut controller).await;

    assert_eq!(
        states.last(),
        Some(&ImportState::Failed("Denied on phone".to_string()))
    );
    assert!(controller.notes().is_empty());

    controller.close();
    assert_eq!(controller.state(), &ImportState::Idle);
}

#[tokio::test]
async fn test_retry_after_failure_searches_again() {
    let companion = MockCompanion::start(Script {
        session: (StatusCode::INTERNAL_SERVER_ERROR, json!({})),
        ..Script::default()
    })
    .await;
    let source = FakeSource::new(vec![FakeAd::instant(service("Pixel", "10.0.0.5", 8765))]);
    let mut controller = controller(source, Duration::from_millis(100));

    controller.manual_connect(&companion.address()).unwrap();
    let states = settle(&mut controller).await;
    assert!(matches!(states.last(), Some(ImportState::Failed(_))));

    controller.retry();
    assert_eq!(controller.state(), &ImportState::Searching);

    let states = settle(&mut controller).await;
    assert!(matches!(states.last(), Some(ImportState::DeviceList(list)) if list.len() == 1));
}

#[tokio::test]
async fn test_second_discovery_supersedes_first() {
    let source = FakeSource {
        rescans: vec![vec![FakeAd::instant(service("New", "10.0.0.6", 8765))]],
        ..FakeSource::new(vec![FakeAd::instant(service("Old", "10.0.0.5", 8765))])
    };
    let starts = Arc::clone(&source.starts);
    let mut controller = controller(source, Duration::from_millis(150));

    controller.discover();
    let first = controller.attempt();
    // Let the first scan announce and resolve before it is replaced.
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.discover();
    assert!(controller.attempt() > first);

    let states = settle(&mut controller).await;
    assert_eq!(starts.load(Ordering::SeqCst), 2);
    assert_eq!(states.len(), 1);
    let ImportState::DeviceList(list) = &states[0] else {
        panic!("expected a device list, got {:?}", states[0]);
    };
    let names: Vec<_> = list.iter().map(|s| s.display_name.as_str()).collect();
    assert_eq!(names, ["New"]);
}

#[tokio::test]
async fn test_manual_connect_replaces_pending_approval() {
    let slow = MockCompanion::start(Script {
        statuses: vec![(StatusCode::OK, json!({ "status": "PENDING" }))],
        ..Script::default()
    })
    .await;
    let fast = MockCompanion::start(Script::default()).await;
    let mut controller = controller(FakeSource::default(), Duration::from_millis(50));

    controller.manual_connect(&slow.address()).unwrap();
    let waiting = tokio::time::timeout(Duration::from_secs(5), controller.next_update())
        .await
        .unwrap();
    assert_eq!(waiting, ImportState::Waiting(slow.target()));

    controller.manual_connect(&fast.address()).unwrap();
    let states = settle(&mut controller).await;

    assert_eq!(states.last(), Some(&ImportState::Imported(2)));
    assert!(states
        .iter()
        .all(|state| state.target().is_none_or(|t| *t == fast.target())));
}

#[tokio::test]
async fn test_cancel_while_waiting() {
    let companion = MockCompanion::start(Script {
        statuses: vec![(StatusCode::OK, json!({ "status": "PENDING" }))],
        ..Script::default()
    })
    .await;
    let mut controller = controller(FakeSource::default(), Duration::from_millis(50));
    let watcher = controller.subscribe();

    controller.manual_connect(&companion.address()).unwrap();
    let state = tokio::time::timeout(Duration::from_secs(5), controller.next_update())
        .await
        .unwrap();
    assert!(matches!(state, ImportState::Waiting(_)));

    controller.cancel();
    assert_eq!(controller.state(), &ImportState::Idle);
    assert_eq!(*watcher.borrow(), ImportState::Idle);

    // Nothing from the cancelled attempt may surface.
    let late = tokio::time::timeout(Duration::from_millis(100), controller.next_update()).await;
    assert!(late.is_err());
    assert_eq!(controller.state(), &ImportState::Idle);
}
