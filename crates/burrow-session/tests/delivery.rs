//! Fan-out and slow-client eviction.

use burrow_protocol::{EntityId, ServerMessage};
use burrow_session::{SessionConfig, SessionManager};
use burrow_world::Recipient;

fn small() -> SessionManager {
    SessionManager::new(SessionConfig { outbox_capacity: 2 })
}

#[test]
fn test_broadcast_reaches_every_session() {
    let mut mgr = small();
    let mut a = mgr.create(EntityId(1), "a").unwrap();
    let mut b = mgr.create(EntityId(2), "b").unwrap();

    let msg = ServerMessage::update("hello");
    let report = mgr.deliver(&Recipient::All, &msg);

    assert_eq!(report.delivered, 2);
    assert_eq!(a.try_recv().unwrap(), msg);
    assert_eq!(b.try_recv().unwrap(), msg);
}

#[test]
fn test_targeted_delivery_skips_others_and_unknowns() {
    let mut mgr = small();
    let mut a = mgr.create(EntityId(1), "a").unwrap();
    let mut b = mgr.create(EntityId(2), "b").unwrap();

    let report = mgr.deliver(
        &Recipient::Players(vec![EntityId(2), EntityId(77)]),
        &ServerMessage::Death,
    );

    assert_eq!(report.delivered, 1);
    assert!(a.try_recv().is_err());
    assert_eq!(b.try_recv().unwrap(), ServerMessage::Death);
}

#[test]
fn test_full_outbox_evicts_the_session() {
    let mut mgr = small();
    let mut slow = mgr.create(EntityId(1), "slow").unwrap();
    let mut fast = mgr.create(EntityId(2), "fast").unwrap();

    for n in 0..2 {
        mgr.deliver(&Recipient::All, &ServerMessage::update(format!("{n}")));
        fast.try_recv().unwrap();
    }
    let report = mgr.deliver(&Recipient::All, &ServerMessage::update("one too many"));

    assert_eq!(report.evicted, vec![EntityId(1)]);
    assert_eq!(report.delivered, 1);
    assert!(mgr.get(EntityId(1)).is_none());
    assert!(mgr.get(EntityId(2)).is_some());

    // The evicted outbox still yields what was queued, then reports closed.
    assert!(slow.try_recv().is_ok());
    assert!(slow.try_recv().is_ok());
    assert!(matches!(
        slow.try_recv(),
        Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
    ));
}

#[test]
fn test_closed_outbox_removes_the_session() {
    let mut mgr = small();
    let outbox = mgr.create(EntityId(1), "gone").unwrap();
    drop(outbox);

    let report = mgr.deliver(&Recipient::Player(EntityId(1)), &ServerMessage::Death);

    assert_eq!(report.closed, vec![EntityId(1)]);
    assert!(mgr.is_empty());
    assert_eq!(mgr.find_by_username("gone"), None);
}

#[test]
fn test_queued_counts_pending_messages() {
    let mut mgr = small();
    let _outbox = mgr.create(EntityId(1), "a").unwrap();
    assert!(mgr.send_to(EntityId(1), &ServerMessage::Death));
    assert_eq!(mgr.get(EntityId(1)).unwrap().queued(), 1);
}
