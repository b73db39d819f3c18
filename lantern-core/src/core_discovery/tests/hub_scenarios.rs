//! Report scheduling driven by hub messages, under paused time

use std::time::Duration;

use crate::core_discovery::{AdmissionOutcome, CategoryKind, EventOutcome, InboundEvent, PlainMessage};
use crate::test_utils::*;

fn scheduled(outcome: &EventOutcome) -> Option<bool> {
    match outcome {
        EventOutcome::Hub(hub) => hub.report_scheduled,
        other => panic!("expected hub outcome, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_second_update_time_inside_debounce_is_dropped() {
    let t = TestEngineBuilder::new()
        .reachable("a@appspot.com", 443)
        .build()
        .await
        .unwrap();

    // t = 0
    let first = t.engine.handle_event(hub_event(&["a@appspot.com"], Some(5000))).await;
    assert_eq!(scheduled(&first), Some(true));
    if let EventOutcome::Hub(hub) = &first {
        assert_eq!(hub.admissions, vec![AdmissionOutcome::Admitted(CategoryKind::ServerManaged)]);
    }

    // t = 3000
    advance_and_settle(Duration::from_millis(3000)).await;
    let second = t.engine.handle_event(hub_event(&["a@appspot.com"], Some(5000))).await;
    assert_eq!(scheduled(&second), Some(false));

    // t = 4999: nothing yet
    advance_and_settle(Duration::from_millis(1999)).await;
    assert!(t.memory.channel.sent_plain().is_empty());

    // t = 5000: the first report fires
    advance_and_settle(Duration::from_millis(1)).await;
    assert_eq!(t.memory.channel.sent_plain().len(), 1);

    // t = 20000: the dropped request never fires
    advance_and_settle(Duration::from_millis(15000)).await;
    assert_eq!(t.memory.channel.sent_plain().len(), 1);
    assert_eq!(t.memory.usage.reported_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_requests_after_window_are_scheduled_again() {
    let t = TestEngineBuilder::new().build().await.unwrap();

    assert_eq!(scheduled(&t.engine.handle_event(hub_event(&[], Some(1000))).await), Some(true));
    advance_and_settle(Duration::from_secs(10)).await;
    assert_eq!(scheduled(&t.engine.handle_event(hub_event(&[], Some(1000))).await), Some(true));
    advance_and_settle(Duration::from_secs(1)).await;

    assert_eq!(t.memory.channel.sent_plain().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_report_keeps_usage_for_next_time() {
    let t = TestEngineBuilder::new().build().await.unwrap();
    t.memory.usage.set(crate::core_discovery::UsageSnapshot {
        bytes_proxied: 4096,
        ..Default::default()
    });
    t.memory.channel.fail_sends(true);

    t.engine.handle_event(hub_event(&[], Some(1000))).await;
    advance_and_settle(Duration::from_secs(1)).await;
    assert_eq!(t.memory.usage.reported_count(), 0);

    // Next scheduled report carries the same counters
    t.memory.channel.fail_sends(false);
    advance_and_settle(Duration::from_secs(10)).await;
    t.engine.handle_event(hub_event(&[], Some(1000))).await;
    advance_and_settle(Duration::from_secs(1)).await;

    let reports = t.memory.channel.sent_plain();
    assert_eq!(reports.len(), 1);
    let json: serde_json::Value = serde_json::from_str(reports[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(json["bytesProxied"], 4096);
    assert_eq!(t.memory.usage.reported_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drops_pending_report() {
    let t = TestEngineBuilder::new().build().await.unwrap();

    t.engine.handle_event(hub_event(&[], Some(5000))).await;
    settle().await;
    t.engine.shutdown();
    assert!(t.engine.is_shut_down());

    advance_and_settle(Duration::from_secs(10)).await;
    assert!(t.memory.channel.sent_plain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_null_servers_still_schedule_report() {
    let t = TestEngineBuilder::new().build().await.unwrap();

    let outcome = t
        .engine
        .handle_event(InboundEvent::Plain(PlainMessage {
            from: HUB.to_string(),
            body: Some(r#"{"servers": null, "update_time": 5000}"#.to_string()),
        }))
        .await;
    match &outcome {
        EventOutcome::Hub(hub) => {
            assert!(hub.admissions.is_empty());
            assert_eq!(hub.report_scheduled, Some(true));
        }
        other => panic!("expected hub outcome, got {:?}", other),
    }

    advance_and_settle(Duration::from_millis(5000)).await;
    assert_eq!(t.memory.channel.sent_plain().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_debounced_message_still_admits_servers() {
    let t = TestEngineBuilder::new()
        .reachable("10.0.0.5", 8080)
        .build()
        .await
        .unwrap();

    assert_eq!(scheduled(&t.engine.handle_event(hub_event(&[], Some(5000))).await), Some(true));

    advance_and_settle(Duration::from_millis(1000)).await;
    let second = t.engine.handle_event(hub_event(&["10.0.0.5:8080"], Some(5000))).await;
    assert_eq!(scheduled(&second), Some(false));
    if let EventOutcome::Hub(hub) = &second {
        assert_eq!(hub.admissions, vec![AdmissionOutcome::Admitted(CategoryKind::GeneralDirect)]);
    }
    assert_eq!(t.engine.pool_sizes().general, 1);
}
