//! Tests for event subscribers

use super::*;

fn progress(connector_type: ConnectorType, description: &str) -> SyncEvent {
    SyncEvent::progress(connector_type, description)
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_subscribe_unique_ids() {
    let subscribers = EventSubscribers::default();

    let (id1, _rx1) = subscribers.subscribe(EventFilter::all()).unwrap();
    let (id2, _rx2) = subscribers.subscribe(EventFilter::all()).unwrap();

    assert_ne!(id1, id2);
    assert_eq!(subscribers.count(), 2);
    assert!(subscribers.has_subscribers());
}

#[test]
fn test_unsubscribe() {
    let subscribers = EventSubscribers::default();
    let (id, _rx) = subscribers.subscribe(EventFilter::all()).unwrap();

    subscribers.unsubscribe(id).unwrap();
    assert_eq!(subscribers.count(), 0);
    assert!(matches!(
        subscribers.unsubscribe(id),
        Err(IpcError::SubscriberNotFound { .. })
    ));
}

#[test]
fn test_max_subscribers_reclaims_closed() {
    let subscribers = EventSubscribers::new(4, 2);
    let (_a, rx_a) = subscribers.subscribe(EventFilter::all()).unwrap();
    let (_b, _rx_b) = subscribers.subscribe(EventFilter::all()).unwrap();

    assert!(matches!(
        subscribers.subscribe(EventFilter::all()),
        Err(IpcError::MaxSubscribers { max: 2 })
    ));

    drop(rx_a);
    assert!(subscribers.subscribe(EventFilter::all()).is_ok());
}

// ============================================================================
// Fan-out
// ============================================================================

#[test]
fn test_publish_filters_by_connector_type() {
    let subscribers = EventSubscribers::default();
    let (_all, mut rx_all) = subscribers.subscribe(EventFilter::all()).unwrap();
    let (_file, mut rx_file) = subscribers
        .subscribe(EventFilter::connector(ConnectorType::File))
        .unwrap();

    assert_eq!(
        subscribers.publish(&progress(ConnectorType::Remote, "page 1")),
        1
    );
    assert_eq!(
        subscribers.publish(&progress(ConnectorType::File, "scanning")),
        2
    );

    assert_eq!(rx_all.try_recv().unwrap().connector_type, ConnectorType::Remote);
    assert_eq!(rx_all.try_recv().unwrap().connector_type, ConnectorType::File);
    assert_eq!(rx_file.try_recv().unwrap().connector_type, ConnectorType::File);
    assert!(rx_file.try_recv().is_err());
}

#[test]
fn test_slow_subscriber_does_not_affect_others() {
    let subscribers = EventSubscribers::new(2, 8);
    let (slow, _rx_slow) = subscribers.subscribe(EventFilter::all()).unwrap();
    let (_fast, mut rx_fast) = subscribers.subscribe(EventFilter::all()).unwrap();

    for i in 0..4 {
        subscribers.publish(&progress(ConnectorType::File, &i.to_string()));
        // The fast subscriber keeps up
        assert!(rx_fast.try_recv().is_ok());
    }

    assert_eq!(subscribers.dropped(slow), Some(2));
}

#[test]
fn test_terminal_event_recorded_even_when_queue_full() {
    let subscribers = EventSubscribers::new(1, 8);
    let (id, mut rx) = subscribers
        .subscribe(EventFilter::connector(ConnectorType::File))
        .unwrap();
    let mut terminals = subscribers.watch_terminals();
    assert!(terminals.borrow_and_update().is_empty());

    subscribers.publish(&progress(ConnectorType::File, "scanning"));
    assert_eq!(subscribers.publish(&SyncEvent::stopped(ConnectorType::File, false)), 0);
    assert_eq!(subscribers.dropped(id), Some(1));

    assert!(terminals.has_changed().unwrap());
    let (seq, event) = terminals.borrow_and_update()[&ConnectorType::File].clone();
    assert_eq!(seq, 1);
    assert!(event.is_terminal());

    assert!(!rx.try_recv().unwrap().is_terminal());
    assert!(rx.try_recv().is_err());

    // non-terminal events leave the record alone
    subscribers.publish(&progress(ConnectorType::File, "again"));
    assert!(!terminals.has_changed().unwrap());

    subscribers.publish(&SyncEvent::stopped(ConnectorType::File, true));
    assert_eq!(terminals.borrow()[&ConnectorType::File].0, 2);
    assert!(!terminals.borrow().contains_key(&ConnectorType::Remote));
}

#[test]
fn test_cleanup_disconnected() {
    let subscribers = EventSubscribers::default();
    let (_a, rx_a) = subscribers.subscribe(EventFilter::all()).unwrap();
    let (_b, _rx_b) = subscribers.subscribe(EventFilter::all()).unwrap();

    drop(rx_a);
    assert_eq!(subscribers.publish(&progress(ConnectorType::File, "x")), 1);
    assert_eq!(subscribers.cleanup_disconnected(), 1);
    assert_eq!(subscribers.count(), 1);
}
