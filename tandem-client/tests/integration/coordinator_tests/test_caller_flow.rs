use bytes::Bytes;
use tandem_client::{CallState, CoordinatorEvent, TransportEvent, TransportState};
use tandem_core::{IceCandidate, SdpType, SessionDescription};

use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::{EVENT_TIMEOUT_MS, TransportCall, wait_for_event};

#[tokio::test]
async fn test_caller_flow() {
    init_tracing();

    let (coordinator, mut events, factory) = create_test_coordinator();

    coordinator.start_call().await.unwrap();
    let handle = factory.handle(0).await.unwrap();

    // Candidates racing ahead of the answer wait for it.
    coordinator
        .on_remote_ice_candidate(IceCandidate::new("remote-1"))
        .await;
    assert!(handle.applied_candidates().await.is_empty());

    coordinator
        .on_remote_answer(SessionDescription::answer("v=0\r\n"))
        .await;
    assert_eq!(coordinator.call_state().await, CallState::HaveRemoteAnswer);
    assert_eq!(handle.applied_candidates().await, vec!["remote-1"]);

    // A duplicate answer is dropped.
    coordinator
        .on_remote_answer(SessionDescription::answer("v=0\r\n"))
        .await;
    let remotes = handle
        .calls()
        .await
        .into_iter()
        .filter(|c| *c == TransportCall::SetRemote(SdpType::Answer))
        .count();
    assert_eq!(remotes, 1);

    handle.emit(TransportEvent::StateChanged(TransportState::Connected));
    wait_for_event(&mut events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, CoordinatorEvent::CallStateChanged(CallState::Connected))
    })
    .await
    .unwrap();

    handle.emit(TransportEvent::DataChannelReady);
    wait_for_event(&mut events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, CoordinatorEvent::DataChannelOpen)
    })
    .await
    .unwrap();

    handle.emit(TransportEvent::Message(Bytes::from_static(b"hi")));
    let received = wait_for_event(&mut events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, CoordinatorEvent::DataReceived(_))
    })
    .await
    .unwrap();
    assert!(matches!(received, CoordinatorEvent::DataReceived(ref d) if d == "hi"));

    handle.emit(TransportEvent::RemoteTrack("video-1".to_owned()));
    let media = wait_for_event(&mut events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, CoordinatorEvent::RemoteMedia(_))
    })
    .await
    .unwrap();
    assert!(matches!(media, CoordinatorEvent::RemoteMedia(ref t) if t == "video-1"));

    coordinator.send_text("hello").await.unwrap();
    assert!(
        handle
            .calls()
            .await
            .contains(&TransportCall::Send(Bytes::from_static(b"hello")))
    );
}

#[tokio::test]
async fn test_rejected_answer_can_be_retried() {
    init_tracing();

    let (coordinator, _events, factory) = create_test_coordinator();

    coordinator.start_call().await.unwrap();
    factory.fail_remote_descriptions().await;
    coordinator
        .on_remote_answer(SessionDescription::answer("broken"))
        .await;

    // The attempt survives and still waits for a usable answer.
    assert_eq!(coordinator.call_state().await, CallState::HaveLocalOffer);
    assert!(coordinator.is_active().await);
}

#[tokio::test]
async fn test_concurrent_answers_apply_once() {
    init_tracing();

    let (coordinator, _events, factory) = create_test_coordinator();

    coordinator.start_call().await.unwrap();
    let handle = factory.handle(0).await.unwrap();
    let gate = factory.gate_remote_descriptions().await;

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move {
            coordinator
                .on_remote_answer(SessionDescription::answer("v=0\r\n"))
                .await
        }
    });

    // The first answer is parked inside the transport; give it time to get there.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    coordinator
        .on_remote_answer(SessionDescription::answer("v=0\r\n"))
        .await;
    assert_eq!(coordinator.call_state().await, CallState::HaveLocalOffer);

    gate.notify_one();
    first.await.unwrap();

    let remotes = handle
        .calls()
        .await
        .into_iter()
        .filter(|c| *c == TransportCall::SetRemote(SdpType::Answer))
        .count();
    assert_eq!(remotes, 1);
    assert_eq!(coordinator.call_state().await, CallState::HaveRemoteAnswer);
}
