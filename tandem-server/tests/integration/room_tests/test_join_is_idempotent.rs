use tandem_core::{ConnectionId, SignalEvent};
use tandem_server::JoinOutcome;

use crate::integration::{create_test_rooms, init_tracing};

#[tokio::test]
async fn test_join_is_idempotent() {
    init_tracing();

    let (rooms, signaling, _rx) = create_test_rooms(None);
    let x = ConnectionId::new();
    let y = ConnectionId::new();

    rooms.join(x, "demo").await;
    rooms.join(y, "demo").await;
    assert_eq!(rooms.join(y, "demo").await, JoinOutcome::AlreadyMember);

    assert_eq!(rooms.members("demo"), vec![x, y]);
    // Re-acknowledged, but the other member is not told twice.
    assert_eq!(signaling.count_for(&y, SignalEvent::Joined).await, 2);
    assert_eq!(signaling.count_for(&x, SignalEvent::PeerJoined).await, 1);
}
