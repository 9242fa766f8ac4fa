// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use common::tracking::TrackingState;
use module_core::{
    Event, EventBus, EventKind, EventKindType, payload_ref,
    test_helper::{collect_events, wait_for_event},
};
use std::time::Duration;

#[test_log::test(tokio::test)]
pub async fn events_delivered() {
    let event_bus = EventBus::new();
    let mut receiver = event_bus.subscribe();
    let event = Event {
        kind: EventKind::QuitEvent,
    };
    event_bus.publish(&event);
    let received_event = tokio::time::timeout(Duration::from_millis(100), receiver.recv())
        .await
        .expect("Failed to receive event in required time")
        .unwrap();
    assert_eq!(received_event.event_type(), event.event_type());
}

#[test_log::test(tokio::test)]
pub async fn wait_for_event_skips_other_events() {
    let event_bus = EventBus::new();
    let ctx = event_bus.context();
    let mut receiver = event_bus.subscribe();
    ctx.publish_event(EventKind::ToggleTrackingEvent(true))
        .unwrap();
    ctx.publish_event(EventKind::TrackingStateEvent(TrackingState::Requesting))
        .unwrap();

    let event = wait_for_event(
        &mut receiver,
        Duration::from_millis(100),
        EventKindType::TrackingStateEvent,
    )
    .await;
    assert_eq!(
        payload_ref!(event.kind, EventKind::TrackingStateEvent),
        Some(&TrackingState::Requesting)
    );
}

#[test_log::test(tokio::test)]
pub async fn collect_events_of_one_type() {
    let event_bus = EventBus::new();
    let mut receiver = event_bus.subscribe();
    for state in [TrackingState::Requesting, TrackingState::Active] {
        event_bus.publish(&Event {
            kind: EventKind::TrackingStateEvent(state),
        });
        event_bus.publish(&Event {
            kind: EventKind::ToggleTrackingEvent(false),
        });
    }
    let events = collect_events(
        &mut receiver,
        Duration::from_millis(50),
        EventKindType::TrackingStateEvent,
    )
    .await;
    assert_eq!(events.len(), 2);
}

#[test]
pub fn context_outlives_bus() {
    let event_bus = EventBus::new();
    let ctx = event_bus.context();
    drop(event_bus);
    assert_eq!(ctx.sender.receiver_count(), 1);
    assert!(ctx.publish_event(EventKind::QuitEvent).is_ok());
}
