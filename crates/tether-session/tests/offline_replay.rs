//! The session layer pieces working together through one outage:
//! actions issued offline are held, the rejoin goes first, then the
//! survivors are replayed in order.

use std::time::Duration;

use serde_json::{Value, json};
use tether_protocol::{ClientMessage, GameStatus, RoomCode, RoomSnapshot};
use tether_session::{
    ActionRoute, GameLoopLiaison, OutboundQueue, PauseReason, SessionIdentity,
    SessionReconciler,
};
use tokio::time::{self, Instant};

fn action(kind: &str, payload: &Value) -> ClientMessage {
    ClientMessage::Action {
        kind: kind.to_string(),
        payload: payload.clone(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_outage_rejoin_then_replay() {
    let mut identity = SessionIdentity {
        session_token: Some("old-token".into()),
        room_code: Some(RoomCode::new("KQZT")),
        display_name: Some("ada".into()),
    };
    let mut queue = OutboundQueue::new(100, Duration::from_secs(30));
    let mut liaison = GameLoopLiaison::new();
    let mut reconciler = SessionReconciler::new();
    let mut wire: Vec<ClientMessage> = Vec::new();

    // Link drops.
    assert!(liaison.pause(PauseReason::ConnectionLost));

    // The player keeps acting; one early action will be too old to replay.
    let route = liaison.send_action(false, &mut queue, "chat".into(), json!("brb"), |_, _| {
        Err::<(), _>("offline")
    });
    assert_eq!(route, ActionRoute::Queued { evicted: None });
    time::advance(Duration::from_secs(25)).await;
    for step in 1..=2 {
        liaison.send_action(false, &mut queue, "move".into(), json!({ "step": step }), |_, _| {
            Err::<(), _>("offline")
        });
    }
    time::advance(Duration::from_secs(6)).await;

    // Reconnected: rejoin with the previous token, then adopt the new one.
    wire.push(reconciler.begin_rejoin(&identity).unwrap());
    identity.session_token = Some("new-token".into());
    liaison.send_action(
        !reconciler.is_awaiting(),
        &mut queue,
        "move".into(),
        json!({ "step": 3 }),
        |k, p| {
            wire.push(action(k, p));
            Ok::<(), ()>(())
        },
    );
    assert_eq!(wire.len(), 1, "nothing overtakes the rejoin");

    let rejoined = reconciler.on_rejoin_success(
        RoomSnapshot {
            code: RoomCode::new("KQZT"),
            players: Vec::new(),
            status: GameStatus::InProgress,
            data: json!({}),
        },
        &mut identity,
        &mut liaison,
    );
    assert!(rejoined.resumed);

    let report = queue.flush(Instant::now(), |k, p| {
        wire.push(action(k, p));
        Ok::<(), ()>(())
    });
    assert_eq!(report.expired, 1, "the 31 s old chat line is dropped");
    assert_eq!(report.sent, 3);

    assert_eq!(
        wire,
        vec![
            ClientMessage::Rejoin {
                room_code: RoomCode::new("KQZT"),
                display_name: Some("ada".into()),
                session_token: Some("old-token".into()),
            },
            action("move", &json!({ "step": 1 })),
            action("move", &json!({ "step": 2 })),
            action("move", &json!({ "step": 3 })),
        ]
    );
}
