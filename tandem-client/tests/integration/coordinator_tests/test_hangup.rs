use tandem_client::{CallState, CoordinatorError, CoordinatorEvent};
use tandem_core::SessionDescription;

use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::{EVENT_TIMEOUT_MS, TransportCall, drain, wait_until};

#[tokio::test]
async fn test_hangup_is_idempotent() {
    init_tracing();

    let (coordinator, mut events, factory) = create_test_coordinator();

    coordinator.hangup().await;
    coordinator.hangup().await;
    assert!(drain(&mut events).is_empty());

    coordinator.start_call().await.unwrap();
    drain(&mut events);

    coordinator.hangup().await;
    coordinator.hangup().await;

    let handle = factory.handle(0).await.unwrap();
    assert!(handle.is_closed().await);
    assert_eq!(coordinator.call_state().await, CallState::Idle);

    let events = drain(&mut events);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        CoordinatorEvent::CallStateChanged(CallState::Idle)
    ));

    // A fresh attempt is allowed afterwards.
    coordinator.start_call().await.unwrap();
    assert_eq!(factory.created_count().await, 2);
}

#[tokio::test]
async fn test_send_requires_active_call() {
    init_tracing();

    let (coordinator, _events, _factory) = create_test_coordinator();

    let result = coordinator.send_text("hello").await;
    assert!(matches!(result, Err(CoordinatorError::NoActiveCall)));
}

#[tokio::test]
async fn test_hangup_during_offer_discards_result() {
    init_tracing();

    let (coordinator, mut events, factory) = create_test_coordinator();
    let gate = factory.gate_offers().await;

    let caller = coordinator.clone();
    let pending = tokio::spawn(async move { caller.start_call().await });

    let f = &factory;
    wait_until(EVENT_TIMEOUT_MS, move || async move { f.created_count().await == 1 })
        .await
        .unwrap();

    coordinator.hangup().await;
    gate.notify_one();

    pending.await.unwrap().unwrap();

    let handle = factory.handle(0).await.unwrap();
    assert!(handle.is_closed().await);
    assert_eq!(coordinator.call_state().await, CallState::Idle);
    assert!(!coordinator.is_active().await);

    let events = drain(&mut events);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, CoordinatorEvent::LocalOffer(_))),
        "late offer leaked: {events:?}"
    );
}

#[tokio::test]
async fn test_callee_hangup_during_offer_discards_answer() {
    init_tracing();

    let (coordinator, mut events, factory) = create_test_coordinator();
    let gate = factory.gate_remote_descriptions().await;

    let callee = coordinator.clone();
    let pending = tokio::spawn(async move {
        callee
            .on_remote_offer(SessionDescription::offer("v=0\r\n"))
            .await
    });

    let f = &factory;
    wait_until(EVENT_TIMEOUT_MS, move || async move {
        match f.handle(0).await {
            Some(handle) => handle.calls().await.contains(&TransportCall::AcceptDataChannel),
            None => false,
        }
    })
    .await
    .unwrap();

    coordinator.hangup().await;
    gate.notify_one();
    pending.await.unwrap();

    let handle = factory.handle(0).await.unwrap();
    assert!(handle.is_closed().await);
    assert!(!handle.calls().await.contains(&TransportCall::CreateAnswer));
    assert_eq!(coordinator.call_state().await, CallState::Idle);
    assert!(!coordinator.is_active().await);

    let events = drain(&mut events);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, CoordinatorEvent::LocalAnswer(_))),
        "late answer leaked: {events:?}"
    );
}
