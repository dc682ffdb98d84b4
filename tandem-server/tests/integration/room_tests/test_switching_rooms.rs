use tandem_core::{ConnectionId, SignalEvent};

use crate::integration::{create_test_rooms, init_tracing};

#[tokio::test]
async fn test_switching_rooms_leaves_previous() {
    init_tracing();

    let (rooms, signaling, _rx) = create_test_rooms(None);
    let x = ConnectionId::new();
    let y = ConnectionId::new();

    rooms.join(x, "demo").await;
    rooms.join(y, "demo").await;
    rooms.join(y, "other").await;

    assert_eq!(rooms.room_of(&y).as_deref(), Some("other"));
    assert_eq!(rooms.members("demo"), vec![x]);
    assert_eq!(rooms.members("other"), vec![y]);
    assert_eq!(signaling.count_for(&x, SignalEvent::PeerLeft).await, 1);
}
