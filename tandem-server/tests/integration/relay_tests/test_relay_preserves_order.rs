use tandem_core::{ConnectionId, IceCandidate, SessionDescription, SignalEvent, SignalMessage};

use crate::integration::{create_test_rooms, init_tracing};
use crate::utils::Delivery;

#[tokio::test]
async fn test_relay_preserves_order() {
    init_tracing();

    let (rooms, signaling, mut rx) = create_test_rooms(None);
    let x = ConnectionId::new();
    let y = ConnectionId::new();

    rooms.join(x, "demo").await;
    rooms.join(y, "demo").await;
    while rx.try_recv().is_ok() {}

    let offer = serde_json::to_string(&SignalMessage::offer(
        "demo",
        SessionDescription::offer("v=0\r\n"),
    ))
    .unwrap();
    let ice = serde_json::to_string(&SignalMessage::ice(
        "demo",
        IceCandidate::new("candidate:1 1 udp 2122260223 10.0.0.2 5000 typ host"),
    ))
    .unwrap();

    assert_eq!(rooms.relay(x, "demo", SignalEvent::Offer, &offer).await, 1);
    assert_eq!(rooms.relay(x, "demo", SignalEvent::Ice, &ice).await, 1);

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.recipient(), y);
    assert_eq!(first.event(), Some(SignalEvent::Offer));
    assert_eq!(second.event(), Some(SignalEvent::Ice));

    // Frames go out exactly as they came in.
    assert_eq!(signaling.frames_for(&y).await, vec![offer, ice]);
    assert!(signaling.frames_for(&x).await.is_empty());
    assert!(matches!(first, Delivery::Forward { .. }));
}
